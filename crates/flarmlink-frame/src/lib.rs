//! Byte-stuffed message framing for the FLARM binary protocol.
//!
//! Every frame on the wire is:
//! - a raw `START_FRAME` byte (0x73) for synchronization
//! - an escaped 8-byte [`FrameHeader`] (length, version, sequence, type, CRC)
//! - the escaped payload
//!
//! Escaping guarantees that `START_FRAME` never appears inside a frame, so a
//! receiver can always resynchronize on the next marker.

pub mod crc;
pub mod error;
pub mod escape;
pub mod header;
pub mod message;

pub use crate::crc::{calculate_crc, FRAME_CRC};
pub use error::{FrameError, Result};
pub use escape::{
    escape_into, find_special, receive_escaped, receive_some_unescape, send_escaped, unescape,
    ESCAPE, ESCAPE_ESCAPE, ESCAPE_START, START_FRAME,
};
pub use header::{FrameHeader, HEADER_SIZE, MAX_PAYLOAD, PROTOCOL_VERSION};
pub use message::MessageType;
