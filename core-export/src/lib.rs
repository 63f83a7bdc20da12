//! # Export Engine
//!
//! Scheduled extraction of relational rows into CSV files on a
//! hierarchical remote store.
//!
//! ## Overview
//!
//! This crate manages the lifecycle of scheduled export jobs:
//! - Rendering per-target fetch queries and matching delete statements
//! - Serializing fetched rows to the CSV transfer format
//! - Resolving destination folder paths with get-or-create semantics
//! - Driving the fetch → serialize → resolve → upload → delete pipeline
//! - Running cancellable interval and daily-clock workers
//!
//! ## Components
//!
//! - **Targets** (`target`): named queries with time-bound rewriting
//! - **Schedules** (`schedule`): interval and daily-clock specifications
//! - **Serialization** (`serialize`): row set to CSV rendering
//! - **Folder Resolution** (`resolver`): cached get-or-create path walking
//! - **Pipeline** (`pipeline`): one export execution per target per cycle
//! - **Workers** (`worker`): cancellable per-schedule background loops
//! - **Controller** (`controller`): worker set ownership and start/stop

pub mod config;
pub mod controller;
pub mod error;
pub mod pipeline;
pub mod resolver;
pub mod run;
pub mod schedule;
pub mod serialize;
pub mod target;
pub mod worker;

pub use config::EngineConfig;
pub use controller::{StartOutcome, SyncController};
pub use error::{ExportError, Result};
pub use pipeline::{CycleReport, ExportPipeline, ManualExportOptions, RunOptions};
pub use resolver::{Destination, FolderPath, FolderResolver};
pub use run::{RunOutcome, SyncRun};
pub use schedule::ScheduleSpec;
pub use target::{ExportTarget, QuerySpec, TimeBound};
pub use worker::{RunState, WorkerHandle};
