//! # Remote Folder Resolution
//!
//! Maps an ordered list of folder names under a root into a stable remote
//! folder identifier with get-or-create semantics.
//!
//! ## Overview
//!
//! The resolver walks a [`FolderPath`] left to right. For each segment it
//! first consults a process-local `(parent_id, name) → id` cache; on a miss
//! it asks the store for a non-trashed folder of that exact name under the
//! current parent, creating one if none exists, and caches the result.
//!
//! This is lookup-then-create, not atomic: two resolvers racing on the same
//! path against the same store can create duplicate remote folders. A
//! single resolver instance per process avoids the race, and the cache
//! guarantees this process never creates two folders for the same
//! `(parent, name)` pair.
//!
//! Cache entries never expire: an external rename or delete of a resolved
//! folder is not detected within a process lifetime.

use bridge_traits::store::RemoteStore;
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::error::{ExportError, Result};

/// An ordered sequence of folder-name segments from a root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderPath(Vec<String>);

impl FolderPath {
    pub fn new(segments: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// The destination path of a scheduled cycle starting at `now`:
    /// `<auto>/<year>/<date>/<timestamp>`, e.g.
    /// `Auto/2024/20240115/20240115153000`.
    pub fn auto_cycle(auto_folder_name: &str, now: NaiveDateTime) -> Self {
        Self(vec![
            auto_folder_name.to_string(),
            now.format("%Y").to_string(),
            now.format("%Y%m%d").to_string(),
            now.format("%Y%m%d%H%M%S").to_string(),
        ])
    }

    pub fn push(&mut self, segment: impl Into<String>) {
        self.0.push(segment.into());
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FolderPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

/// Where a pipeline run uploads to: a path still to be resolved, or a
/// folder identifier supplied directly by the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Path(FolderPath),
    FolderId(String),
}

/// Idempotent folder-path resolver with a process-local cache.
pub struct FolderResolver {
    store: Arc<dyn RemoteStore>,
    cache: Mutex<HashMap<(String, String), String>>,
}

impl FolderResolver {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self {
            store,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a path under a root folder, creating missing segments.
    ///
    /// # Errors
    ///
    /// Returns `ExportError::RemoteStore` when the backing store is
    /// unreachable or returns an unexpected response.
    #[instrument(skip(self), fields(path = %path, root_id = %root_id))]
    pub async fn resolve(&self, path: &FolderPath, root_id: &str) -> Result<String> {
        let mut parent = root_id.to_string();
        for segment in path.segments() {
            parent = self.resolve_segment(segment, &parent).await?;
        }
        Ok(parent)
    }

    async fn resolve_segment(&self, name: &str, parent_id: &str) -> Result<String> {
        let key = (parent_id.to_string(), name.to_string());

        {
            let cache = self.cache.lock().await;
            if let Some(id) = cache.get(&key) {
                return Ok(id.clone());
            }
        }

        let id = match self
            .store
            .list_folder(name, parent_id)
            .await
            .map_err(ExportError::remote_store)?
        {
            Some(id) => id,
            None => {
                debug!(name, parent_id, "Folder not found, creating");
                self.store
                    .create_folder(name, parent_id)
                    .await
                    .map_err(ExportError::remote_store)?
            }
        };

        self.cache.lock().await.insert(key, id.clone());
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bytes::Bytes;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store stub that creates every folder it is asked about and counts
    /// calls per operation.
    struct CountingStore {
        existing: Vec<(String, String, String)>,
        list_calls: AtomicUsize,
        create_calls: AtomicUsize,
    }

    impl CountingStore {
        fn empty() -> Self {
            Self {
                existing: Vec::new(),
                list_calls: AtomicUsize::new(0),
                create_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl RemoteStore for CountingStore {
        async fn list_folder(&self, name: &str, parent_id: &str) -> BridgeResult<Option<String>> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .existing
                .iter()
                .find(|(n, p, _)| n == name && p == parent_id)
                .map(|(_, _, id)| id.clone()))
        }

        async fn create_folder(&self, name: &str, parent_id: &str) -> BridgeResult<String> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{}/{}", parent_id, name))
        }

        async fn upload_file(&self, _: &str, _: Bytes, _: &str) -> BridgeResult<String> {
            Err(BridgeError::RemoteStore("not a file store".to_string()))
        }
    }

    #[tokio::test]
    async fn test_resolve_creates_missing_segments() {
        let store = Arc::new(CountingStore::empty());
        let resolver = FolderResolver::new(store.clone());

        let path = FolderPath::new(["A", "B", "C"]);
        let id = resolver.resolve(&path, "root").await.unwrap();

        assert_eq!(id, "root/A/B/C");
        assert_eq!(store.create_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent() {
        let store = Arc::new(CountingStore::empty());
        let resolver = FolderResolver::new(store.clone());
        let path = FolderPath::new(["A", "B", "C"]);

        let first = resolver.resolve(&path, "root").await.unwrap();
        let second = resolver.resolve(&path, "root").await.unwrap();

        assert_eq!(first, second);
        // At most one create per segment across both invocations, and the
        // second resolve never reached the store at all.
        assert_eq!(store.create_calls.load(Ordering::SeqCst), 3);
        assert_eq!(store.list_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_resolve_reuses_existing_remote_folder() {
        let store = Arc::new(CountingStore {
            existing: vec![("Auto".to_string(), "root".to_string(), "auto1".to_string())],
            list_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
        });
        let resolver = FolderResolver::new(store.clone());

        let id = resolver
            .resolve(&FolderPath::new(["Auto"]), "root")
            .await
            .unwrap();

        assert_eq!(id, "auto1");
        assert_eq!(store.create_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_shared_prefix_resolves_once() {
        let store = Arc::new(CountingStore::empty());
        let resolver = FolderResolver::new(store.clone());

        resolver
            .resolve(&FolderPath::new(["A", "B"]), "root")
            .await
            .unwrap();
        resolver
            .resolve(&FolderPath::new(["A", "C"]), "root")
            .await
            .unwrap();

        // "A" is cached after the first resolve; only "B" and "C" are new.
        assert_eq!(store.create_calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_auto_cycle_path() {
        let now = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(15, 30, 0)
            .unwrap();

        let path = FolderPath::auto_cycle("Auto", now);
        assert_eq!(path.segments(), ["Auto", "2024", "20240115", "20240115153000"]);
        assert_eq!(path.to_string(), "Auto/2024/20240115/20240115153000");
    }
}
