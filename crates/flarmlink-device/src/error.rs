use flarmlink_frame::FrameError;
use flarmlink_transport::TransportError;

/// Errors that can occur in device operations.
///
/// Corrupted frames and wait timeouts are not errors at this level: the
/// former are discarded while waiting, the latter are reported through
/// [`WaitOutcome::TimedOut`](crate::WaitOutcome::TimedOut). Only a bare send
/// that misses its deadline surfaces as `Transport(Timeout)`.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// Transport-level error. The port should be considered unusable.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame-level error while building an outbound frame.
    #[error("frame error: {0}")]
    Frame(FrameError),
}

impl DeviceError {
    /// Returns true if the deadline passed before a send completed.
    pub fn is_timeout(&self) -> bool {
        matches!(self, DeviceError::Transport(TransportError::Timeout))
    }

    /// Returns true if the operation was stopped through a cancel token.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DeviceError::Transport(TransportError::Cancelled))
    }
}

impl From<FrameError> for DeviceError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Transport(err) => DeviceError::Transport(err),
            other => DeviceError::Frame(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, DeviceError>;
