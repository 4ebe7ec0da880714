use bytes::{Buf, BufMut};

use crate::crc::calculate_crc;
use crate::error::{FrameError, Result};
use crate::message::MessageType;

/// Frame header: length (2) + version (1) + sequence (2) + type (1) + crc (2) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// The only protocol version this crate speaks.
pub const PROTOCOL_VERSION: u8 = 0;

/// Largest payload whose total length still fits the 16-bit length field.
pub const MAX_PAYLOAD: usize = u16::MAX as usize - HEADER_SIZE;

/// A decoded or freshly prepared frame header.
///
/// Wire format (before escaping):
/// ```text
/// ┌──────────┬─────────┬──────────┬────────┬──────────┬─────────────────┐
/// │ Length   │ Version │ Sequence │ Type   │ CRC      │ Payload         │
/// │ (2B LE)  │ (1B)    │ (2B LE)  │ (1B)   │ (2B LE)  │ (Length - 8 B)  │
/// └──────────┴─────────┴──────────┴────────┴──────────┴─────────────────┘
/// ```
///
/// `Length` counts the header itself plus the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    length: u16,
    version: u8,
    sequence_number: u16,
    message_type: MessageType,
    crc: u16,
}

impl FrameHeader {
    /// Build the header for an outbound frame.
    ///
    /// Stores `*sequence` in the header and then advances it, wrapping on
    /// overflow. The counter is left untouched when the payload is too large.
    pub fn prepare(sequence: &mut u16, message_type: MessageType, payload: &[u8]) -> Result<Self> {
        if payload.len() > MAX_PAYLOAD {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD,
            });
        }

        let mut header = Self {
            length: (HEADER_SIZE + payload.len()) as u16,
            version: PROTOCOL_VERSION,
            sequence_number: *sequence,
            message_type,
            crc: 0,
        };
        *sequence = sequence.wrapping_add(1);
        header.crc = calculate_crc(&header, payload);
        Ok(header)
    }

    /// Decode a header from its 8 wire bytes (already unescaped).
    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Self {
        let mut src = &bytes[..];
        Self {
            length: src.get_u16_le(),
            version: src.get_u8(),
            sequence_number: src.get_u16_le(),
            message_type: MessageType::from_u8(src.get_u8()),
            crc: src.get_u16_le(),
        }
    }

    /// Encode the header into its 8 wire bytes (before escaping).
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        let mut dst = &mut bytes[..];
        dst.put_u16_le(self.length);
        dst.put_u8(self.version);
        dst.put_u16_le(self.sequence_number);
        dst.put_u8(self.message_type.as_u8());
        dst.put_u16_le(self.crc);
        bytes
    }

    /// Recompute the CRC over this header and `payload` and compare.
    pub fn verify(&self, payload: &[u8]) -> bool {
        self.crc == calculate_crc(self, payload)
    }

    /// Total frame length including the header.
    pub fn length(&self) -> u16 {
        self.length
    }

    /// Payload length implied by `length`, or `None` if `length` is smaller
    /// than the header itself.
    pub fn payload_len(&self) -> Option<usize> {
        (self.length as usize).checked_sub(HEADER_SIZE)
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn sequence_number(&self) -> u16 {
        self.sequence_number
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    pub fn crc(&self) -> u16 {
        self.crc
    }
}
