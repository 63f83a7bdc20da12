//! Google Drive API connector implementation
//!
//! Implements the `RemoteStore` trait for Google Drive API v3.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use bridge_traits::store::RemoteStore;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::error::GoogleDriveError;
use crate::types::{CreatedFile, FileMetadata, FilesListResponse};

/// Google Drive API base URL
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Google Drive upload endpoint base URL
const UPLOAD_API_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// MIME type that marks a Drive file as a folder
const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Boundary marker for multipart upload bodies
const MULTIPART_BOUNDARY: &str = "drive_export_boundary";

/// Maximum retry attempts for transient API failures
const MAX_RETRIES: u32 = 3;

/// Google Drive API connector
///
/// Implements [`RemoteStore`] for Google Drive API v3:
/// - Folder lookup scoped to exact name, parent, and `trashed=false`
/// - Folder creation via `files.create`
/// - CSV upload via the multipart upload endpoint
/// - Exponential backoff for rate limiting and server errors
///
/// The access token is assumed to be valid for the connector's lifetime;
/// token acquisition and refresh are the embedding application's concern.
///
/// # Example
///
/// ```ignore
/// use provider_google_drive::GoogleDriveConnector;
/// use bridge_traits::store::RemoteStore;
///
/// let store = GoogleDriveConnector::new(http_client, access_token);
/// let folder = store.list_folder("Auto", "root").await?;
/// ```
pub struct GoogleDriveConnector {
    /// HTTP client for API requests
    http_client: Arc<dyn HttpClient>,

    /// OAuth 2.0 access token
    access_token: String,
}

impl GoogleDriveConnector {
    /// Create a new Google Drive connector
    ///
    /// # Arguments
    ///
    /// * `http_client` - HTTP client implementation
    /// * `access_token` - OAuth 2.0 access token with `drive` scope
    pub fn new(http_client: Arc<dyn HttpClient>, access_token: String) -> Self {
        Self {
            http_client,
            access_token,
        }
    }

    /// Build authorization header value
    fn auth_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    /// Escape a value for embedding in a files.list `q` expression
    fn escape_query_value(value: &str) -> String {
        value.replace('\\', "\\\\").replace('\'', "\\'")
    }

    /// Build the multipart/related body for an upload: a JSON metadata part
    /// followed by the file content part.
    fn multipart_body(metadata: &FileMetadata, data: &Bytes) -> Result<Bytes> {
        let metadata_json = serde_json::to_vec(metadata).map_err(|e| {
            GoogleDriveError::ParseError(format!("Failed to encode upload metadata: {}", e))
        })?;

        let mut body = Vec::with_capacity(data.len() + metadata_json.len() + 256);
        body.extend_from_slice(format!("--{}\r\n", MULTIPART_BOUNDARY).as_bytes());
        body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
        body.extend_from_slice(&metadata_json);
        body.extend_from_slice(format!("\r\n--{}\r\n", MULTIPART_BOUNDARY).as_bytes());
        body.extend_from_slice(b"Content-Type: text/csv\r\n\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", MULTIPART_BOUNDARY).as_bytes());

        Ok(Bytes::from(body))
    }

    /// Execute an API request with retry logic
    ///
    /// Retries with exponential backoff on rate limiting (429) and server
    /// errors (5xx); client errors are returned immediately.
    #[instrument(skip(self, request), fields(url = %request.url))]
    async fn send_with_retry(
        &self,
        request: HttpRequest,
    ) -> Result<bridge_traits::http::HttpResponse> {
        let mut attempt = 0;

        loop {
            match self.http_client.execute(request.clone()).await {
                Ok(response) => {
                    let status = response.status;

                    if response.is_success() {
                        debug!("API request succeeded: status={}", status);
                        return Ok(response);
                    } else if status == 429 || response.is_server_error() {
                        attempt += 1;
                        if attempt >= MAX_RETRIES {
                            warn!(
                                "API request failed after {} attempts: status={}",
                                MAX_RETRIES, status
                            );
                            return Err(GoogleDriveError::ApiError {
                                status_code: status,
                                message: format!("Request failed after {} retries", MAX_RETRIES),
                            }
                            .into());
                        }

                        let backoff_ms = 100u64 * 2u64.pow(attempt);
                        warn!(
                            "API request failed (attempt {}/{}): status={}, retrying in {}ms",
                            attempt, MAX_RETRIES, status, backoff_ms
                        );
                        tokio::time::sleep(tokio::time::Duration::from_millis(backoff_ms)).await;
                    } else {
                        warn!("API request failed: status={}", status);
                        return Err(GoogleDriveError::ApiError {
                            status_code: status,
                            message: String::from_utf8_lossy(&response.body).to_string(),
                        }
                        .into());
                    }
                }
                Err(e) => {
                    attempt += 1;
                    if attempt >= MAX_RETRIES {
                        warn!("API request failed after {} attempts: {}", MAX_RETRIES, e);
                        return Err(e);
                    }

                    let backoff_ms = 100u64 * 2u64.pow(attempt);
                    warn!(
                        "API request failed (attempt {}/{}): {}, retrying in {}ms",
                        attempt, MAX_RETRIES, e, backoff_ms
                    );
                    tokio::time::sleep(tokio::time::Duration::from_millis(backoff_ms)).await;
                }
            }
        }
    }
}

#[async_trait]
impl RemoteStore for GoogleDriveConnector {
    #[instrument(skip(self), fields(name = %name, parent_id = %parent_id))]
    async fn list_folder(&self, name: &str, parent_id: &str) -> Result<Option<String>> {
        debug!("Looking up folder on Google Drive");

        let query = format!(
            "mimeType='{}' and name='{}' and '{}' in parents and trashed=false",
            FOLDER_MIME_TYPE,
            Self::escape_query_value(name),
            parent_id
        );

        let url = format!(
            "{}/files?q={}&fields=files(id,name)&pageSize=10",
            DRIVE_API_BASE,
            urlencoding::encode(&query)
        );

        let request = HttpRequest::new(HttpMethod::Get, url)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
            .timeout(std::time::Duration::from_secs(30));

        let response = self.send_with_retry(request).await?;

        let list_response: FilesListResponse =
            serde_json::from_slice(&response.body).map_err(|e| {
                GoogleDriveError::ParseError(format!("Failed to parse folder list: {}", e))
            })?;

        Ok(list_response.files.into_iter().next().map(|f| f.id))
    }

    #[instrument(skip(self), fields(name = %name, parent_id = %parent_id))]
    async fn create_folder(&self, name: &str, parent_id: &str) -> Result<String> {
        info!("Creating folder on Google Drive");

        let metadata = FileMetadata {
            name: name.to_string(),
            mime_type: Some(FOLDER_MIME_TYPE.to_string()),
            parents: vec![parent_id.to_string()],
        };

        let url = format!("{}/files?fields=id", DRIVE_API_BASE);
        let request = HttpRequest::new(HttpMethod::Post, url)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
            .timeout(std::time::Duration::from_secs(30))
            .json(&metadata)?;

        let response = self.send_with_retry(request).await?;

        let created: CreatedFile = serde_json::from_slice(&response.body).map_err(|e| {
            GoogleDriveError::ParseError(format!("Failed to parse created folder: {}", e))
        })?;

        Ok(created.id)
    }

    #[instrument(skip(self, data), fields(name = %name, parent_id = %parent_id, bytes = data.len()))]
    async fn upload_file(&self, name: &str, data: Bytes, parent_id: &str) -> Result<String> {
        info!("Uploading file to Google Drive");

        let metadata = FileMetadata {
            name: name.to_string(),
            mime_type: None,
            parents: vec![parent_id.to_string()],
        };

        let body = Self::multipart_body(&metadata, &data)?;

        let url = format!(
            "{}/files?uploadType=multipart&fields=id",
            UPLOAD_API_BASE
        );
        let request = HttpRequest::new(HttpMethod::Post, url)
            .header("Authorization", self.auth_header())
            .header(
                "Content-Type",
                format!("multipart/related; boundary={}", MULTIPART_BOUNDARY),
            )
            .timeout(std::time::Duration::from_secs(120))
            .body(body);

        let response = self.send_with_retry(request).await?;

        let created: CreatedFile = serde_json::from_slice(&response.body).map_err(|e| {
            GoogleDriveError::ParseError(format!("Failed to parse upload response: {}", e))
        })?;

        info!("Uploaded {} bytes as file {}", data.len(), created.id);

        Ok(created.id)
    }
}
