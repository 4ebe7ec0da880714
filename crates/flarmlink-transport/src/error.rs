/// Errors that can occur in port operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to connect to the specified endpoint.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// An I/O error occurred on the underlying stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The deadline passed before the operation completed.
    #[error("deadline passed before the operation completed")]
    Timeout,

    /// The operation was cancelled through its [`CancelToken`](crate::CancelToken).
    #[error("operation cancelled")]
    Cancelled,

    /// The remote end closed the stream.
    #[error("port closed")]
    Closed,
}

impl TransportError {
    /// Returns true if this error only means the deadline passed.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout)
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
