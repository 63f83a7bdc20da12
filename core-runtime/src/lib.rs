//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the export engine:
//! - Logging and tracing initialization
//! - Event bus system for observer integration
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the engine crates depend on.
//! It establishes the logging conventions and the event broadcasting
//! mechanism used throughout the system.

pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus, EventSeverity, EventStream, ExportEvent, WorkerEvent};
