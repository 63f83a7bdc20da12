//! Remote Object Store Abstraction
//!
//! Provides a provider-agnostic trait for the hierarchical blob store that
//! receives exported files. Folder identity is opaque: the engine only ever
//! holds identifiers handed back by the store.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Folder-and-upload capability consumed by the export engine.
///
/// The handle is assumed to be already authenticated; session setup is the
/// embedding application's concern. Implementations must treat
/// `list_folder` as scoped to non-trashed folders with that exact name
/// directly under the given parent.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Look up a folder by exact name under a parent.
    ///
    /// Returns `None` when no such folder exists. When several folders
    /// share the name, any one of them may be returned.
    async fn list_folder(&self, name: &str, parent_id: &str) -> Result<Option<String>>;

    /// Create a folder under a parent and return its identifier.
    async fn create_folder(&self, name: &str, parent_id: &str) -> Result<String>;

    /// Upload a file into a folder and return the new file identifier.
    async fn upload_file(&self, name: &str, data: Bytes, parent_id: &str) -> Result<String>;
}
