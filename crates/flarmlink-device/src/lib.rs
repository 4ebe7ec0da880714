//! Command/acknowledgment exchange with FLARM devices.
//!
//! A [`FlarmDevice`] wraps a [`Port`](flarmlink_transport::Port) and speaks the
//! binary protocol on it: it numbers outbound frames, sends them, and waits
//! for the ACK or NACK echoing that number. Waiting tolerates noise, corrupted
//! frames and replies to other commands; only transport failures are errors.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use flarmlink_device::FlarmDevice;
//! use flarmlink_transport::{PortConfig, StreamPort};
//!
//! let port = StreamPort::connect_tcp("127.0.0.1:4353", PortConfig::default())?;
//! let mut device = FlarmDevice::new(port);
//! if device.ping(Duration::from_secs(1))? {
//!     device.reset(Duration::from_secs(1))?;
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod device;
pub mod error;
pub mod exchange;

pub use config::DeviceConfig;
pub use device::FlarmDevice;
pub use error::{DeviceError, Result};
pub use exchange::{Reply, WaitOutcome};
