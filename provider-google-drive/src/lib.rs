//! # Google Drive Provider
//!
//! Implements the `RemoteStore` trait for Google Drive API v3.
//!
//! ## Overview
//!
//! This module provides:
//! - Folder lookup by exact name under a parent, ignoring trashed entries
//! - Folder creation via `files.create`
//! - File upload via the multipart upload endpoint
//! - Rate limiting and exponential backoff
//!
//! Authentication is out of scope: the connector receives an already-valid
//! OAuth 2.0 bearer token from the embedding application.

pub mod connector;
pub mod error;
pub mod types;

pub use connector::GoogleDriveConnector;
pub use error::{GoogleDriveError, Result};
