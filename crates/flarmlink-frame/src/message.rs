//! FLARM binary message types.
//!
//! Only PING, EXIT, ACK and NACK carry meaning inside this workspace. The
//! remaining kinds are named for readability and otherwise passed through
//! opaquely, as is any byte without a name ([`MessageType::Other`]).

use std::fmt;

/// The `type` field of a frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Error,
    Ping,
    SetBaudRate,
    FlashUpload,
    /// Leave binary mode and reset the device.
    Exit,
    SelectRecord,
    GetRecordInfo,
    GetIgcData,
    Ack,
    Nack,
    /// A byte without a named kind. Never holds a named kind's value when
    /// built through [`MessageType::from_u8`].
    Other(u8),
}

impl MessageType {
    pub const fn as_u8(self) -> u8 {
        match self {
            MessageType::Error => 0x00,
            MessageType::Ping => 0x01,
            MessageType::SetBaudRate => 0x02,
            MessageType::FlashUpload => 0x10,
            MessageType::Exit => 0x12,
            MessageType::SelectRecord => 0x20,
            MessageType::GetRecordInfo => 0x21,
            MessageType::GetIgcData => 0x22,
            MessageType::Ack => 0xA0,
            MessageType::Nack => 0xB7,
            MessageType::Other(value) => value,
        }
    }

    pub const fn from_u8(value: u8) -> Self {
        match value {
            0x00 => MessageType::Error,
            0x01 => MessageType::Ping,
            0x02 => MessageType::SetBaudRate,
            0x10 => MessageType::FlashUpload,
            0x12 => MessageType::Exit,
            0x20 => MessageType::SelectRecord,
            0x21 => MessageType::GetRecordInfo,
            0x22 => MessageType::GetIgcData,
            0xA0 => MessageType::Ack,
            0xB7 => MessageType::Nack,
            other => MessageType::Other(other),
        }
    }

    /// Returns a human-readable name for the message type.
    pub fn name(self) -> &'static str {
        match self {
            MessageType::Error => "ERROR",
            MessageType::Ping => "PING",
            MessageType::SetBaudRate => "SETBAUDRATE",
            MessageType::FlashUpload => "FLASHUPLOAD",
            MessageType::Exit => "EXIT",
            MessageType::SelectRecord => "SELECTRECORD",
            MessageType::GetRecordInfo => "GETRECORDINFO",
            MessageType::GetIgcData => "GETIGCDATA",
            MessageType::Ack => "ACK",
            MessageType::Nack => "NACK",
            MessageType::Other(_) => "OTHER",
        }
    }

    /// Returns true for the acknowledgment kinds a device sends back.
    pub fn is_reply(self) -> bool {
        matches!(self, MessageType::Ack | MessageType::Nack)
    }
}

impl From<u8> for MessageType {
    fn from(value: u8) -> Self {
        Self::from_u8(value)
    }
}

impl From<MessageType> for u8 {
    fn from(value: MessageType) -> Self {
        value.as_u8()
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#04x})", self.name(), self.as_u8())
    }
}
