use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tracing::info;

use super::types::{CategorizedData, Document, HealthStatus, ProcessedDocument, SearchResult};
use super::{bearer, check_response, HttpApi};
use crate::error::ApiError;

const PROCESS_FALLBACK: &str = "Error processing document";
const LIST_FALLBACK: &str = "Error fetching documents";
const SEARCH_FALLBACK: &str = "Error searching documents";
const CATEGORIZE_FALLBACK: &str = "Error categorizing fields";
const HEALTH_FALLBACK: &str = "Backend health check failed";

/// Authenticated calls against `/documents`.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// Upload a PDF for extraction.
    async fn process_document(
        &self,
        token: &str,
        file_name: &str,
        pdf: Vec<u8>,
    ) -> Result<ProcessedDocument, ApiError>;

    async fn get_documents(&self, token: &str) -> Result<Vec<Document>, ApiError>;

    /// Fuzzy search over field names and values. `min_score` is 0..=100;
    /// `None` leaves the threshold to the backend.
    async fn search_documents(
        &self,
        token: &str,
        query: &str,
        min_score: Option<u8>,
    ) -> Result<Vec<SearchResult>, ApiError>;

    async fn categorize(&self, token: &str) -> Result<CategorizedData, ApiError>;
}

#[derive(Clone)]
pub struct DocumentClient {
    http: HttpApi,
}

impl DocumentClient {
    pub fn new(http: HttpApi) -> Self {
        Self { http }
    }

    /// Unauthenticated liveness probe.
    pub async fn health(&self) -> Result<String, ApiError> {
        let response = self
            .http
            .client()
            .get(self.http.url("/health"))
            .send()
            .await
            .map_err(ApiError::network(HEALTH_FALLBACK))?;

        let health: HealthStatus = check_response(response, HEALTH_FALLBACK)
            .await?
            .json()
            .await
            .map_err(ApiError::network("Failed to parse health response"))?;
        Ok(health.status)
    }
}

#[async_trait]
impl DocumentBackend for DocumentClient {
    #[tracing::instrument(skip(self, token, pdf), fields(size = pdf.len()))]
    async fn process_document(
        &self,
        token: &str,
        file_name: &str,
        pdf: Vec<u8>,
    ) -> Result<ProcessedDocument, ApiError> {
        let part = Part::bytes(pdf)
            .file_name(file_name.to_string())
            .mime_str("application/pdf")
            .map_err(ApiError::network("Failed to build upload form"))?;
        let form = Form::new().part("file", part);

        let response = self
            .http
            .client()
            .post(self.http.url("/documents/process"))
            .header("Authorization", bearer(token))
            .multipart(form)
            .send()
            .await
            .map_err(ApiError::network("Upload request failed"))?;

        let processed: ProcessedDocument = check_response(response, PROCESS_FALLBACK)
            .await?
            .json()
            .await
            .map_err(ApiError::network("Failed to parse processing result"))?;

        info!(
            document_id = %processed.document_id,
            field_count = processed.fields.len(),
            "document processed"
        );
        Ok(processed)
    }

    #[tracing::instrument(skip_all)]
    async fn get_documents(&self, token: &str) -> Result<Vec<Document>, ApiError> {
        let response = self
            .http
            .client()
            .get(self.http.url("/documents"))
            .header("Authorization", bearer(token))
            .send()
            .await
            .map_err(ApiError::network("Document list request failed"))?;

        check_response(response, LIST_FALLBACK)
            .await?
            .json()
            .await
            .map_err(ApiError::network("Failed to parse document list"))
    }

    #[tracing::instrument(skip(self, token))]
    async fn search_documents(
        &self,
        token: &str,
        query: &str,
        min_score: Option<u8>,
    ) -> Result<Vec<SearchResult>, ApiError> {
        let mut request = self
            .http
            .client()
            .get(self.http.url("/documents/search"))
            .header("Authorization", bearer(token))
            .query(&[("query", query)]);
        if let Some(score) = min_score {
            request = request.query(&[("min_score", score.min(100))]);
        }

        let response = request
            .send()
            .await
            .map_err(ApiError::network("Search request failed"))?;

        check_response(response, SEARCH_FALLBACK)
            .await?
            .json()
            .await
            .map_err(ApiError::network("Failed to parse search results"))
    }

    #[tracing::instrument(skip_all)]
    async fn categorize(&self, token: &str) -> Result<CategorizedData, ApiError> {
        let response = self
            .http
            .client()
            .get(self.http.url("/documents/categorize"))
            .header("Authorization", bearer(token))
            .send()
            .await
            .map_err(ApiError::network("Categorize request failed"))?;

        check_response(response, CATEGORIZE_FALLBACK)
            .await?
            .json()
            .await
            .map_err(ApiError::network("Failed to parse categories"))
    }
}
