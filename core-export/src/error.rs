use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Data source error: {0}")]
    DataSource(String),

    #[error("Remote store error: {0}")]
    RemoteStore(String),

    #[error("Serialization error: {0}")]
    Serialize(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Sync cancelled")]
    Cancelled,
}

impl ExportError {
    /// Wrap a boundary failure from the data source side.
    pub fn data_source(err: impl std::fmt::Display) -> Self {
        Self::DataSource(err.to_string())
    }

    /// Wrap a boundary failure from the remote store side.
    pub fn remote_store(err: impl std::fmt::Display) -> Self {
        Self::RemoteStore(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ExportError>;
