//! # Engine Configuration
//!
//! Everything the embedding application decides and the engine consumes:
//! data-source connection parameters, destination folder naming, the
//! delete-after-upload flag, and the timing constants of the worker loops.

use bridge_traits::source::ConnectionParams;
use std::time::Duration;

use crate::error::{ExportError, Result};
use crate::target::TimeBound;

/// Granularity of cancellable sleeps.
///
/// A worker waiting out an interval or a clock occurrence re-checks its
/// cancellation token this often. Lower values reduce cancellation latency
/// at the cost of more wakeups; one second is the accepted trade-off.
pub const DEFAULT_CANCEL_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Back-off between retry attempts of a failed clock-triggered cycle.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(60);

/// Bounded wait applied when joining a cancelled worker.
pub const DEFAULT_STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Export engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Data source connection parameters
    pub connection: ConnectionParams,

    /// Identifier of the remote root folder all paths resolve under
    pub root_folder_id: String,

    /// Top-level folder name for scheduled cycles
    pub auto_folder_name: String,

    /// Top-level folder name for one-shot manual exports
    pub manual_folder_name: String,

    /// Time bound applied to every scheduled cycle's fetch (and delete)
    pub auto_time_bound: Option<TimeBound>,

    /// Whether scheduled cycles delete exported rows after upload
    pub delete_after: bool,

    /// Cancellation polling granularity for worker sleeps
    pub cancel_poll_interval: Duration,

    /// Back-off before retrying a failed clock-triggered cycle
    pub retry_backoff: Duration,

    /// Bounded wait when joining cancelled workers
    pub stop_join_timeout: Duration,
}

impl EngineConfig {
    /// Create a configuration with defaults for everything but the
    /// connection parameters.
    pub fn new(connection: ConnectionParams) -> Self {
        Self {
            connection,
            root_folder_id: "root".to_string(),
            auto_folder_name: "Auto".to_string(),
            manual_folder_name: "Manual".to_string(),
            auto_time_bound: None,
            delete_after: false,
            cancel_poll_interval: DEFAULT_CANCEL_POLL_INTERVAL,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            stop_join_timeout: DEFAULT_STOP_JOIN_TIMEOUT,
        }
    }

    /// Set the time bound applied to scheduled cycles.
    pub fn with_auto_time_bound(mut self, bound: TimeBound) -> Self {
        self.auto_time_bound = Some(bound);
        self
    }

    /// Enable or disable post-upload deletion for scheduled cycles.
    pub fn with_delete_after(mut self, delete_after: bool) -> Self {
        self.delete_after = delete_after;
        self
    }

    /// Set the remote root folder identifier.
    pub fn with_root_folder_id(mut self, id: impl Into<String>) -> Self {
        self.root_folder_id = id.into();
        self
    }

    /// Set the cancellation polling granularity.
    pub fn with_cancel_poll_interval(mut self, interval: Duration) -> Self {
        self.cancel_poll_interval = interval;
        self
    }

    /// Set the retry back-off for failed clock cycles.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ExportError::Configuration` when a timing constant is zero
    /// or a folder name is empty.
    pub fn validate(&self) -> Result<()> {
        if self.cancel_poll_interval.is_zero() {
            return Err(ExportError::Configuration(
                "Cancellation poll interval must be greater than zero".to_string(),
            ));
        }

        if self.retry_backoff.is_zero() {
            return Err(ExportError::Configuration(
                "Retry back-off must be greater than zero".to_string(),
            ));
        }

        if self.root_folder_id.is_empty() {
            return Err(ExportError::Configuration(
                "Root folder identifier cannot be empty".to_string(),
            ));
        }

        if self.auto_folder_name.is_empty() || self.manual_folder_name.is_empty() {
            return Err(ExportError::Configuration(
                "Destination folder names cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ConnectionParams {
        ConnectionParams::new("db.local", "exporter", "secret", "production")
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::new(params());

        assert_eq!(config.root_folder_id, "root");
        assert_eq!(config.auto_folder_name, "Auto");
        assert_eq!(config.manual_folder_name, "Manual");
        assert_eq!(config.cancel_poll_interval, Duration::from_secs(1));
        assert_eq!(config.retry_backoff, Duration::from_secs(60));
        assert!(!config.delete_after);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_poll_interval() {
        let config = EngineConfig::new(params()).with_cancel_poll_interval(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_root() {
        let config = EngineConfig::new(params()).with_root_folder_id("");
        assert!(config.validate().is_err());
    }
}
