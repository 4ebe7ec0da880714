//! Binary-mode link to FLARM collision avoidance devices.
//!
//! flarmlink talks the byte-stuffed binary protocol FLARM units switch to for
//! flight log download and firmware updates: framing, CRC protection and the
//! command/acknowledgment exchange on top of a blocking byte port.
//!
//! # Crate Structure
//!
//! - [`transport`]: the `Port` contract, clocks and deadlines, TCP/Unix and in-memory ports
//! - [`frame`]: escaping codec, frame header, CRC and message types
//! - [`device`]: `FlarmDevice`, the send / wait-for-ACK exchange engine

/// Re-export transport types.
pub mod transport {
    pub use flarmlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use flarmlink_frame::*;
}

/// Re-export device types.
pub mod device {
    pub use flarmlink_device::*;
}
