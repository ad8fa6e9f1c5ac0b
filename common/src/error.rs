use thiserror::Error;

// Core internal errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Rpc error: {0}")]
    Rpc(#[from] RpcError),
    #[error("Store error: {0}")]
    Store(String),
    #[error("Embedding error: {0}")]
    Embedding(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Processing error: {0}")]
    Processing(String),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Failures of the caller/worker message layer. Kept separate from
/// `AppError` so callers can tell a cancelled in-flight call apart from a
/// worker-side failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    #[error("worker channel closed before a reply arrived")]
    ChannelClosed,
    #[error("call cancelled: worker proxy terminated")]
    Terminated,
    #[error("worker initialization failed: {0}")]
    InitializationFailed(String),
    #[error("reply did not match the issued request: {0}")]
    UnexpectedReply(String),
    #[error("worker error: {0}")]
    Worker(String),
}

impl RpcError {
    /// True when the call was cancelled rather than failed, i.e. the
    /// in-flight call is unretryable but the process is healthy.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, RpcError::Terminated | RpcError::ChannelClosed)
    }
}
