//! # Boundary Traits
//!
//! Contracts between the export engine and its external collaborators.
//!
//! ## Overview
//!
//! The engine core never talks to MySQL, Google Drive, or the network
//! directly. Each external system is reached through a trait defined here,
//! implemented by an adapter crate:
//!
//! - [`RowSource`](source::RowSource) - parameterized query execution
//!   against the relational data source
//! - [`RemoteStore`](store::RemoteStore) - folder lookup/creation and file
//!   upload in the hierarchical object store
//! - [`HttpClient`](http::HttpClient) - async HTTP for store providers
//! - [`Clock`](time::Clock) - injectable time source
//! - [`LoggerSink`](time::LoggerSink) - structured log forwarding to the
//!   host observer
//!
//! ## Error Handling
//!
//! All boundary traits use [`BridgeError`](error::BridgeError). Adapters
//! convert backend-specific errors into the `DataSource` or `RemoteStore`
//! variant so the engine can map them onto its own taxonomy.
//!
//! ## Thread Safety
//!
//! All traits require `Send + Sync`: one adapter instance is shared across
//! every schedule worker.

pub mod error;
pub mod http;
pub mod source;
pub mod store;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use source::{CellValue, ConnectionParams, RowSet, RowSource};
pub use store::RemoteStore;
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, SystemClock};
