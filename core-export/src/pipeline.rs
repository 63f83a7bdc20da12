//! # Export Pipeline
//!
//! Executes one unit of work for one target: fetch rows, serialize them to
//! CSV, resolve the destination folder, upload, and optionally delete the
//! exported source rows.
//!
//! ## Overview
//!
//! Each step is a potential failure point and maps onto the engine error
//! taxonomy. A fetch that returns only the header row short-circuits the
//! run as `SkippedEmpty`: no destination resolution, no upload, no delete.
//! Side effects (remote store mutation, source mutation) are externally
//! visible and irreversible; there is no compensating transaction, so a
//! delete failure after a successful upload is reported but never rolled
//! back.
//!
//! A cycle (`run_cycle`) processes targets strictly in the caller-supplied
//! order, sequentially, continuing past per-target failures; all uploads of
//! one cycle share a single timestamped destination path.

use bridge_traits::source::RowSource;
use bridge_traits::store::RemoteStore;
use bridge_traits::time::Clock;
use bytes::Bytes;
use core_runtime::events::{CoreEvent, EventBus, ExportEvent};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{ExportError, Result};
use crate::resolver::{Destination, FolderPath, FolderResolver};
use crate::run::{RunOutcome, SyncRun};
use crate::serialize;
use crate::target::{ExportTarget, TimeBound};

/// Per-run options supplied by the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions<'a> {
    /// Time bound applied to the fetch (and to the delete, verbatim).
    pub time_bound: Option<&'a TimeBound>,
    /// Explicit upload file name; valid only for single-target invocations.
    pub file_name: Option<&'a str>,
    /// Delete the exported rows after a successful upload.
    pub delete_after: bool,
}

/// Options for a one-shot manual export.
#[derive(Debug, Clone, Default)]
pub struct ManualExportOptions {
    /// Time bound applied to every target's fetch.
    pub time_bound: Option<TimeBound>,
    /// Explicit upload file name; requires exactly one target.
    pub file_name: Option<String>,
    /// Upload directly into this folder id instead of resolving a path.
    pub folder_id: Option<String>,
    /// Optional subfolder under the manual folder.
    pub subfolder: Option<String>,
    /// Delete the exported rows after a successful upload.
    pub delete_after: bool,
}

/// The outcome of one cycle across a target set.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Destination path shared by every upload of the cycle.
    pub destination: FolderPath,
    /// One run record per target, in processing order.
    pub runs: Vec<SyncRun>,
}

impl CycleReport {
    pub fn uploaded_count(&self) -> u64 {
        self.runs.iter().filter(|r| r.is_uploaded()).count() as u64
    }

    pub fn skipped_count(&self) -> u64 {
        self.runs.iter().filter(|r| r.is_skipped()).count() as u64
    }

    pub fn failed_count(&self) -> u64 {
        self.runs.iter().filter(|r| r.is_failed()).count() as u64
    }

    pub fn has_failures(&self) -> bool {
        self.runs.iter().any(|r| r.is_failed())
    }
}

/// Pipeline executor shared by all schedule workers.
pub struct ExportPipeline {
    source: Arc<dyn RowSource>,
    store: Arc<dyn RemoteStore>,
    resolver: FolderResolver,
    events: EventBus,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl ExportPipeline {
    pub fn new(
        source: Arc<dyn RowSource>,
        store: Arc<dyn RemoteStore>,
        events: EventBus,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self {
            source,
            resolver: FolderResolver::new(Arc::clone(&store)),
            store,
            events,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run the pipeline once for one target.
    ///
    /// Failures are captured in the returned run record; this never
    /// returns an error, so a caller iterating a target set always
    /// continues to the next target.
    #[instrument(skip(self, destination, options), fields(target = %target.name))]
    pub async fn run(
        &self,
        target: &ExportTarget,
        destination: &Destination,
        options: RunOptions<'_>,
    ) -> SyncRun {
        let run_id = Uuid::new_v4();
        let resolved_query = target.query_for(options.time_bound);

        match self
            .run_inner(run_id, target, &resolved_query, destination, options)
            .await
        {
            Ok(run) => run,
            Err(e) => {
                warn!(target = %target.name, error = %e, "Target export failed");
                self.events
                    .emit(CoreEvent::Export(ExportEvent::Failed {
                        run_id: run_id.to_string(),
                        target: target.name.clone(),
                        message: e.to_string(),
                    }))
                    .ok();

                SyncRun {
                    run_id,
                    target: target.name.clone(),
                    resolved_query,
                    row_count: 0,
                    destination_folder_id: None,
                    outcome: RunOutcome::Failed(e.to_string()),
                }
            }
        }
    }

    async fn run_inner(
        &self,
        run_id: Uuid,
        target: &ExportTarget,
        resolved_query: &str,
        destination: &Destination,
        options: RunOptions<'_>,
    ) -> Result<SyncRun> {
        // Fetch
        debug!(query = resolved_query, "Fetching rows");
        let rows = self
            .source
            .execute(&self.config.connection, resolved_query)
            .await
            .map_err(ExportError::data_source)?;

        if rows.is_empty() {
            info!(target = %target.name, "No data rows, skipping upload");
            self.events
                .emit(CoreEvent::Export(ExportEvent::SkippedEmpty {
                    run_id: run_id.to_string(),
                    target: target.name.clone(),
                }))
                .ok();

            return Ok(SyncRun {
                run_id,
                target: target.name.clone(),
                resolved_query: resolved_query.to_string(),
                row_count: 0,
                destination_folder_id: None,
                outcome: RunOutcome::SkippedEmpty,
            });
        }

        let row_count = rows.row_count();

        // Serialize
        let data = serialize::to_csv(&rows)?;

        // Resolve destination
        let folder_id = match destination {
            Destination::FolderId(id) => id.clone(),
            Destination::Path(path) => {
                self.resolver
                    .resolve(path, &self.config.root_folder_id)
                    .await?
            }
        };

        // Upload
        let file_name = options
            .file_name
            .map(str::to_string)
            .unwrap_or_else(|| target.file_name());

        self.upload(&file_name, data, &folder_id).await?;

        info!(
            target = %target.name,
            file_name,
            rows = row_count,
            "Uploaded target"
        );
        self.events
            .emit(CoreEvent::Export(ExportEvent::Uploaded {
                run_id: run_id.to_string(),
                target: target.name.clone(),
                file_name,
                rows: row_count,
                folder_id: folder_id.clone(),
            }))
            .ok();

        // Optional delete; the upload stands whatever happens here.
        if options.delete_after {
            self.delete_exported_rows(target, options.time_bound).await;
        }

        Ok(SyncRun {
            run_id,
            target: target.name.clone(),
            resolved_query: resolved_query.to_string(),
            row_count,
            destination_folder_id: Some(folder_id),
            outcome: RunOutcome::Uploaded,
        })
    }

    async fn upload(&self, file_name: &str, data: Bytes, folder_id: &str) -> Result<()> {
        self.store
            .upload_file(file_name, data, folder_id)
            .await
            .map_err(ExportError::remote_store)?;
        Ok(())
    }

    /// Delete the rows the fetch step selected, reusing its predicate
    /// verbatim. Custom-query targets carry no delete statement; a
    /// requested delete is then skipped with a warning.
    async fn delete_exported_rows(&self, target: &ExportTarget, bound: Option<&TimeBound>) {
        let Some(statement) = target.delete_statement(bound) else {
            warn!(
                target = %target.name,
                "Delete requested for a custom-query target, skipping"
            );
            return;
        };

        match self
            .source
            .execute_mutation(&self.config.connection, &statement)
            .await
        {
            Ok(rows) => {
                info!(target = %target.name, rows, "Deleted exported rows");
                self.events
                    .emit(CoreEvent::Export(ExportEvent::RowsDeleted {
                        target: target.name.clone(),
                        rows,
                    }))
                    .ok();
            }
            Err(e) => {
                warn!(target = %target.name, error = %e, "Post-upload delete failed");
                self.events
                    .emit(CoreEvent::Export(ExportEvent::DeleteFailed {
                        target: target.name.clone(),
                        message: e.to_string(),
                    }))
                    .ok();
            }
        }
    }

    /// Run one scheduled cycle across a target set.
    ///
    /// Every upload of the cycle lands in one timestamped folder path
    /// derived from the cycle start instant; the path is resolved lazily,
    /// on the first non-empty target.
    #[instrument(skip(self, targets), fields(targets = targets.len()))]
    pub async fn run_cycle(&self, targets: &[ExportTarget]) -> CycleReport {
        let now = self.clock.now_local().naive_local();
        let path = FolderPath::auto_cycle(&self.config.auto_folder_name, now);

        info!(destination = %path, "Starting sync cycle");
        self.events
            .emit(CoreEvent::Export(ExportEvent::CycleStarted {
                destination: path.to_string(),
            }))
            .ok();

        let destination = Destination::Path(path.clone());
        let options = RunOptions {
            time_bound: self.config.auto_time_bound.as_ref(),
            file_name: None,
            delete_after: self.config.delete_after,
        };

        let mut runs = Vec::with_capacity(targets.len());
        for target in targets {
            runs.push(self.run(target, &destination, options).await);
        }

        CycleReport {
            destination: path,
            runs,
        }
    }

    /// Run a one-shot manual export across a target set.
    ///
    /// # Errors
    ///
    /// Returns `ExportError::Configuration` when the target set is empty or
    /// an explicit file name is combined with more than one target. Unlike
    /// scheduled cycles, per-target failures still continue the remaining
    /// targets; they are reported in the returned run records.
    #[instrument(skip(self, targets, options), fields(targets = targets.len()))]
    pub async fn run_once(
        &self,
        targets: &[ExportTarget],
        options: &ManualExportOptions,
    ) -> Result<Vec<SyncRun>> {
        if targets.is_empty() {
            return Err(ExportError::Configuration(
                "No targets selected for export".to_string(),
            ));
        }

        if options.file_name.is_some() && targets.len() != 1 {
            return Err(ExportError::Configuration(
                "An explicit file name is only valid for a single target".to_string(),
            ));
        }

        let destination = match &options.folder_id {
            Some(id) => Destination::FolderId(id.clone()),
            None => {
                let mut path = FolderPath::new([self.config.manual_folder_name.clone()]);
                if let Some(subfolder) = &options.subfolder {
                    path.push(subfolder.clone());
                }
                Destination::Path(path)
            }
        };

        let run_options = RunOptions {
            time_bound: options.time_bound.as_ref(),
            file_name: options.file_name.as_deref(),
            delete_after: options.delete_after,
        };

        let mut runs = Vec::with_capacity(targets.len());
        for target in targets {
            runs.push(self.run(target, &destination, run_options).await);
        }

        Ok(runs)
    }
}
