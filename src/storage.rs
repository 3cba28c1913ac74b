use crate::config::StorageEndpoint;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use log::trace;
use reqwest::header::{HeaderMap, HeaderValue, InvalidHeaderValue};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid storage client configuration: {0}")]
    Config(String),

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Storage service returned {status}: {message}")]
    Api { status: u16, message: String },
}

impl From<InvalidHeaderValue> for StorageError {
    fn from(e: InvalidHeaderValue) -> Self {
        StorageError::Config(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoredFile {
    #[serde(rename = "$id", default)]
    pub id: Option<String>,

    #[serde(rename = "$createdAt")]
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait StorageService: Send + Sync {
    /// Lists at most `limit` files created strictly before `created_before`.
    async fn list_files(
        &self,
        bucket_id: &str,
        created_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<StoredFile>, StorageError>;

    async fn delete_file(&self, bucket_id: &str, file_id: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<StoredFile>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

/// Appwrite Storage over its REST API, authenticated with a server API key.
#[derive(Debug, Clone)]
pub struct AppwriteStorage {
    client: reqwest::Client,
    endpoint: String,
}

impl AppwriteStorage {
    pub fn new(endpoint: &StorageEndpoint, api_key: &str) -> Result<Self, StorageError> {
        let mut headers = HeaderMap::new();
        headers.insert("X-Appwrite-Project", HeaderValue::from_str(&endpoint.project_id)?);

        let mut key = HeaderValue::from_str(api_key)?;
        key.set_sensitive(true);
        headers.insert("X-Appwrite-Key", key);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn files_url(&self, bucket_id: &str) -> String {
        format!("{}/storage/buckets/{bucket_id}/files", self.endpoint)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, StorageError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&text)
            .ok()
            .and_then(|body| body.message)
            .unwrap_or(text);

        Err(StorageError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

pub fn created_before_query(created_before: DateTime<Utc>) -> String {
    json!({
        "method": "lessThan",
        "attribute": "$createdAt",
        "values": [created_before.to_rfc3339_opts(SecondsFormat::Millis, true)],
    })
    .to_string()
}

pub fn limit_query(limit: usize) -> String {
    json!({"method": "limit", "values": [limit]}).to_string()
}

#[async_trait]
impl StorageService for AppwriteStorage {
    async fn list_files(
        &self,
        bucket_id: &str,
        created_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<StoredFile>, StorageError> {
        trace!("Listing up to {limit} files in {bucket_id} created before {created_before}");

        let response = self
            .client
            .get(self.files_url(bucket_id))
            .query(&[
                ("queries[]", created_before_query(created_before)),
                ("queries[]", limit_query(limit)),
            ])
            .send()
            .await?;

        let list: FileList = Self::check(response).await?.json().await?;
        Ok(list.files)
    }

    async fn delete_file(&self, bucket_id: &str, file_id: &str) -> Result<(), StorageError> {
        let response = self
            .client
            .delete(format!("{}/{file_id}", self.files_url(bucket_id)))
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }
}
