use flarmlink_transport::TransportError;

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// An escape byte was followed by something other than a known escape code.
    #[error("invalid escape sequence (0x78 followed by {0:#04x})")]
    EscapeSequenceInvalid(u8),

    /// The input ended right after an escape byte.
    #[error("truncated escape sequence")]
    TruncatedEscape,

    /// The payload does not fit the 16-bit frame length field.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The underlying port failed.
    #[error("frame transport error: {0}")]
    Transport(#[from] TransportError),
}

impl FrameError {
    /// Returns true for errors caused by corrupted or foreign bytes on the wire.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            FrameError::EscapeSequenceInvalid(_) | FrameError::TruncatedEscape
        )
    }

    /// Returns true if the port only ran out of time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, FrameError::Transport(err) if err.is_timeout())
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
