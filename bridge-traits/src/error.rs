use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Data source error: {0}")]
    DataSource(String),

    #[error("Remote store error: {0}")]
    RemoteStore(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
