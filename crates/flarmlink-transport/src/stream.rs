use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info, trace};

use crate::cancel::CancelToken;
use crate::clock::{Deadline, SystemClock};
use crate::error::{Result, TransportError};
use crate::traits::Port;

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// A connected `std` stream whose blocking reads can be bounded.
pub trait TimeoutStream: Read + Write {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()>;
    fn set_write_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()>;
}

impl TimeoutStream for TcpStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        TcpStream::set_write_timeout(self, timeout)
    }
}

#[cfg(unix)]
impl TimeoutStream for std::os::unix::net::UnixStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        std::os::unix::net::UnixStream::set_read_timeout(self, timeout)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        std::os::unix::net::UnixStream::set_write_timeout(self, timeout)
    }
}

/// Configuration for stream-backed ports.
#[derive(Debug, Clone)]
pub struct PortConfig {
    /// Longest single blocking read before the cancel token is checked again.
    pub poll_interval: Duration,
    /// Longest a single write may block, even when the caller's deadline is
    /// later. `None` leaves writes bounded by the deadline alone.
    pub write_timeout: Option<Duration>,
    /// Timeout for establishing a TCP connection.
    pub connect_timeout: Duration,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            write_timeout: Some(Duration::from_secs(5)),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// A [`Port`] over a connected byte stream (TCP bridge, Unix socket).
///
/// Reads and writes are split into slices of at most
/// [`PortConfig::poll_interval`] so that cancellation and the caller's
/// deadline are noticed promptly, both while waiting on a silent device and
/// while a stalled peer leaves the send buffer full.
pub struct StreamPort<S> {
    inner: S,
    config: PortConfig,
    cancel: CancelToken,
    clock: SystemClock,
}

impl StreamPort<TcpStream> {
    /// Connect to a TCP endpoint, e.g. a serial-to-network bridge.
    pub fn connect_tcp(addr: &str, config: PortConfig) -> Result<Self> {
        let addrs = addr
            .to_socket_addrs()
            .map_err(|source| TransportError::Connect {
                addr: addr.to_string(),
                source,
            })?;

        let mut last_err = std::io::Error::new(ErrorKind::NotFound, "address resolved to nothing");
        for socket_addr in addrs {
            match TcpStream::connect_timeout(&socket_addr, config.connect_timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    info!(%socket_addr, "connected over tcp");
                    return Self::new(stream, config);
                }
                Err(err) => {
                    debug!(%socket_addr, error = %err, "tcp connect attempt failed");
                    last_err = err;
                }
            }
        }

        Err(TransportError::Connect {
            addr: addr.to_string(),
            source: last_err,
        })
    }
}

#[cfg(unix)]
impl StreamPort<std::os::unix::net::UnixStream> {
    /// Connect to a Unix domain socket, e.g. one exported by a serial daemon.
    pub fn connect_unix(path: impl AsRef<std::path::Path>, config: PortConfig) -> Result<Self> {
        let path = path.as_ref();
        let stream = std::os::unix::net::UnixStream::connect(path).map_err(|source| {
            TransportError::Connect {
                addr: path.display().to_string(),
                source,
            }
        })?;
        info!(?path, "connected over unix domain socket");
        Self::new(stream, config)
    }
}

impl<S: TimeoutStream> StreamPort<S> {
    /// Wrap an already connected stream.
    pub fn new(inner: S, config: PortConfig) -> Result<Self> {
        inner.set_write_timeout(Some(config.poll_interval.max(MIN_POLL_INTERVAL)))?;
        Ok(Self {
            inner,
            config,
            cancel: CancelToken::new(),
            clock: SystemClock,
        })
    }

    /// Observe `cancel` in every blocking call.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The token this port observes.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Current port configuration.
    pub fn config(&self) -> &PortConfig {
        &self.config
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Consume the port and return the inner stream.
    pub fn into_inner(self) -> S {
        self.inner
    }

    /// The earlier of `deadline` and the configured write timeout.
    fn write_deadline(&self, deadline: Deadline) -> Deadline {
        match self.config.write_timeout {
            Some(limit) => deadline.min(Deadline::after(&self.clock, limit)),
            None => deadline,
        }
    }

    /// Next blocking slice before `deadline`, or `Timeout` once it has passed.
    fn slice(&self, deadline: Deadline) -> Result<Duration> {
        let remaining = deadline.remaining(&self.clock);
        if remaining.is_zero() {
            return Err(TransportError::Timeout);
        }
        Ok(remaining
            .min(self.config.poll_interval)
            .max(MIN_POLL_INTERVAL))
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        Ok(())
    }
}

impl<S: TimeoutStream> Port for StreamPort<S> {
    fn write(&mut self, data: &[u8], deadline: Deadline) -> Result<usize> {
        let deadline = self.write_deadline(deadline);
        loop {
            self.check_cancelled()?;
            let slice = self.slice(deadline)?;
            self.inner.set_write_timeout(Some(slice))?;

            match self.inner.write(data) {
                Ok(n) => {
                    trace!(n, "stream port wrote");
                    return Ok(n);
                }
                Err(err)
                    if matches!(
                        err.kind(),
                        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                    ) =>
                {
                    continue
                }
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    fn write_all(&mut self, mut data: &[u8], deadline: Deadline) -> Result<()> {
        let deadline = self.write_deadline(deadline);
        while !data.is_empty() {
            match self.write(data, deadline)? {
                0 => return Err(TransportError::Closed),
                n => data = &data[n..],
            }
        }

        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    fn read_available(&mut self, buf: &mut [u8], deadline: Deadline) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            self.check_cancelled()?;
            let slice = self.slice(deadline)?;
            self.inner.set_read_timeout(Some(slice))?;

            match self.inner.read(buf) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => {
                    trace!(n, "stream port read");
                    return Ok(n);
                }
                Err(err)
                    if matches!(
                        err.kind(),
                        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                    ) =>
                {
                    continue
                }
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }
}

impl<S> std::fmt::Debug for StreamPort<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamPort")
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
