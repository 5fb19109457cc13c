pub mod render;

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::api::types::{CategorizedData, Document, ProcessedDocument, SearchResult};
use crate::api::DocumentBackend;
use crate::error::ApiError;

/// One line of the field list: a single extracted field and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRow {
    pub field_name: String,
    pub field_value: String,
    pub document_name: String,
    pub pdf_url: Option<String>,
}

impl From<SearchResult> for FieldRow {
    fn from(result: SearchResult) -> Self {
        Self {
            field_name: result.field_name,
            field_value: result.field_value,
            document_name: result.document_name,
            pdf_url: result.pdf_url,
        }
    }
}

/// Every field of every document, documents in list order and fields in the
/// order the backend returned them.
pub fn flatten_documents(documents: &[Document]) -> Vec<FieldRow> {
    documents
        .iter()
        .flat_map(|doc| {
            doc.field_pairs().map(move |(name, value)| FieldRow {
                field_name: name.to_string(),
                field_value: value,
                document_name: doc.file_name.clone(),
                pdf_url: doc.pdf_url.clone(),
            })
        })
        .collect()
}

/// A user's view over their documents.
///
/// Holds the last fetched document list until something invalidates it.
/// Uploads invalidate and reload; nothing else is cached.
pub struct Dashboard<D> {
    backend: Arc<D>,
    cached: RwLock<Option<Vec<Document>>>,
}

impl<D: DocumentBackend> Dashboard<D> {
    pub fn new(backend: Arc<D>) -> Self {
        Self {
            backend,
            cached: RwLock::new(None),
        }
    }

    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }

    /// Drop the cached list and fetch it again.
    pub async fn reload(&self, token: &str) -> Result<Vec<Document>, ApiError> {
        self.invalidate().await;
        self.documents(token).await
    }

    /// The cached list, fetched first if it was invalidated.
    pub async fn documents(&self, token: &str) -> Result<Vec<Document>, ApiError> {
        if let Some(docs) = self.cached.read().await.as_ref() {
            return Ok(docs.clone());
        }

        let docs = self.backend.get_documents(token).await?;
        debug!(count = docs.len(), "document list loaded");
        *self.cached.write().await = Some(docs.clone());
        Ok(docs)
    }

    /// Upload a PDF, then reload the list so it includes the new document.
    ///
    /// The document is stored once processing returns, so a failed reload is
    /// only logged; the list is fetched again on next use.
    pub async fn upload(
        &self,
        token: &str,
        file_name: &str,
        pdf: Vec<u8>,
    ) -> Result<ProcessedDocument, ApiError> {
        let processed = self
            .backend
            .process_document(token, file_name, pdf)
            .await?;
        if let Err(e) = self.reload(token).await {
            warn!(document_id = %processed.document_id, error = %e, "reload after upload failed");
        }
        Ok(processed)
    }

    /// Rows for the field list.
    ///
    /// Empty search text flattens the document list; anything else is passed
    /// to the backend search and its results are shown as-is.
    pub async fn field_rows(
        &self,
        token: &str,
        search: &str,
        min_score: Option<u8>,
    ) -> Result<Vec<FieldRow>, ApiError> {
        if search.is_empty() {
            let docs = self.documents(token).await?;
            return Ok(flatten_documents(&docs));
        }

        let results = self
            .backend
            .search_documents(token, search, min_score)
            .await?;
        Ok(results.into_iter().map(FieldRow::from).collect())
    }

    pub async fn categories(&self, token: &str) -> Result<CategorizedData, ApiError> {
        self.backend.categorize(token).await
    }
}
