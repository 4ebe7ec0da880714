//! Byte-oriented port abstraction for FLARM links.
//!
//! The protocol layers above only need a handful of blocking primitives:
//! writes, reads bounded by a deadline, and wait-for-byte. This crate defines
//! that contract ([`Port`]), the time model used to bound it ([`Clock`],
//! [`Deadline`]) and two implementations:
//! - [`StreamPort`] over TCP or Unix domain socket streams
//! - [`MemoryPort`], a scripted port driven by a [`ManualClock`]
//!
//! This is the lowest layer of flarmlink. Everything else builds on top of
//! the [`Port`] trait provided here.

pub mod cancel;
pub mod clock;
pub mod error;
pub mod memory;
pub mod stream;
pub mod traits;

pub use cancel::CancelToken;
pub use clock::{Clock, Deadline, ManualClock, SystemClock, MAX_TIMEOUT};
pub use error::{Result, TransportError};
pub use memory::MemoryPort;
pub use stream::{PortConfig, StreamPort, TimeoutStream};
pub use traits::Port;
