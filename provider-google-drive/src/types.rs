//! Google Drive API request and response types
//!
//! Data structures for the subset of the Drive v3 API the export engine
//! uses: folder lookup, folder creation, and multipart file upload.

use serde::{Deserialize, Serialize};

/// Google Drive API file resource
///
/// See: https://developers.google.com/drive/api/v3/reference/files#resource
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    /// File ID
    pub id: String,

    /// File name
    pub name: String,

    /// MIME type
    #[serde(default)]
    pub mime_type: Option<String>,

    /// Whether the file is trashed
    #[serde(default)]
    pub trashed: bool,
}

/// Google Drive API files.list response
///
/// See: https://developers.google.com/drive/api/v3/reference/files/list
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesListResponse {
    /// Matching files
    #[serde(default)]
    pub files: Vec<DriveFile>,

    /// Token for the next page
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Metadata body for files.create requests
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    /// File name
    pub name: String,

    /// MIME type; set for folders, omitted for uploaded content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// Parent folder IDs
    pub parents: Vec<String>,
}

/// Minimal files.create response (`fields=id`)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedFile {
    /// Identifier of the created file or folder
    pub id: String,
}
