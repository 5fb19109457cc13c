use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Extracted fields in the order the backend returned them.
pub type FieldMap = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Serialize)]
pub(crate) struct Credentials<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: String,
    pub access_token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignupResponse {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
}

/// A processed document as listed by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub file_name: String,
    pub document_type: String,
    #[serde(default)]
    pub pdf_url: Option<String>,
    pub processed_at: String,
    #[serde(default)]
    pub fields: FieldMap,
}

impl Document {
    /// Fields as `(name, value)` text pairs, in backend order.
    pub fn field_pairs(&self) -> impl Iterator<Item = (&str, String)> + '_ {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), field_text(value)))
    }

    /// `processed_at` as `YYYY-MM-DD HH:MM:SS`, or the raw string if unparseable.
    pub fn processed_at_display(&self) -> String {
        let raw = self.processed_at.as_str();
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return ts.format("%Y-%m-%d %H:%M:%S").to_string();
        }
        match NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
            Ok(ts) => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
            Err(_) => raw.to_string(),
        }
    }
}

/// Response to a document upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedDocument {
    pub document_id: String,
    #[serde(default)]
    pub fields: FieldMap,
    #[serde(default)]
    pub pdf_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub field_name: String,
    pub field_value: String,
    pub document_name: String,
    #[serde(default)]
    pub pdf_url: Option<String>,
    #[serde(default)]
    pub match_score: Option<f64>,
}

/// One named bucket of categorized fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub name: String,
    pub fields: FieldMap,
}

/// Backend grouping of every extracted field into named buckets.
///
/// Category names are opaque; whatever the backend sends is kept, in order.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "RawCategorized")]
pub struct CategorizedData {
    pub categories: Vec<Category>,
}

impl CategorizedData {
    pub fn is_empty(&self) -> bool {
        self.categories.iter().all(|c| c.fields.is_empty())
    }

    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name == name)
    }
}

#[derive(Deserialize)]
struct RawCategorized {
    #[serde(default)]
    categories: serde_json::Map<String, serde_json::Value>,
}

impl From<RawCategorized> for CategorizedData {
    fn from(raw: RawCategorized) -> Self {
        let categories = raw
            .categories
            .into_iter()
            .filter_map(|(name, value)| match value {
                serde_json::Value::Object(fields) => Some(Category { name, fields }),
                _ => None,
            })
            .collect();
        Self { categories }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

/// Text form of a field value. Strings are taken as-is, anything else as JSON.
pub fn field_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
