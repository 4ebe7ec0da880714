//! Scripted in-memory port driven by a [`ManualClock`].
//!
//! Inbound traffic is a queue of bytes, delays and injected failures. When a
//! read finds the queue empty, the clock jumps to the read's deadline and the
//! read times out, so timeout behaviour can be tested without sleeping. Writes
//! can be stalled the same way to simulate a peer that stops draining.

use std::collections::VecDeque;
use std::io::ErrorKind;
use std::time::Duration;

use tracing::trace;

use crate::cancel::CancelToken;
use crate::clock::{Clock, Deadline, ManualClock};
use crate::error::{Result, TransportError};
use crate::traits::Port;

#[derive(Debug)]
enum Inbound {
    Byte(u8),
    Delay(Duration),
    Fail(ErrorKind),
}

/// In-memory [`Port`] for tests and simulations.
#[derive(Debug)]
pub struct MemoryPort {
    clock: ManualClock,
    inbound: VecDeque<Inbound>,
    outbound: Vec<u8>,
    read_chunk: usize,
    write_failure: Option<ErrorKind>,
    write_stall: Duration,
    cancel: CancelToken,
}

impl MemoryPort {
    /// Create a port with its own clock.
    pub fn new() -> Self {
        Self::with_clock(ManualClock::new())
    }

    /// Create a port sharing `clock` with the caller.
    pub fn with_clock(clock: ManualClock) -> Self {
        Self {
            clock,
            inbound: VecDeque::new(),
            outbound: Vec::new(),
            read_chunk: usize::MAX,
            write_failure: None,
            write_stall: Duration::ZERO,
            cancel: CancelToken::new(),
        }
    }

    /// Attach a cancellation token checked by every read.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The clock this port advances while simulating waits.
    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    /// Queue bytes to be read.
    pub fn push_inbound(&mut self, data: &[u8]) {
        self.inbound.extend(data.iter().copied().map(Inbound::Byte));
    }

    /// Queue a pause: reads reaching it advance the clock by `delay` first.
    pub fn push_delay(&mut self, delay: Duration) {
        self.inbound.push_back(Inbound::Delay(delay));
    }

    /// Queue a read failure with the given I/O error kind.
    pub fn push_read_error(&mut self, kind: ErrorKind) {
        self.inbound.push_back(Inbound::Fail(kind));
    }

    /// Limit how many bytes a single `read_available` call returns.
    pub fn set_read_chunk(&mut self, read_chunk: usize) {
        self.read_chunk = read_chunk.max(1);
    }

    /// Make the next write fail with the given I/O error kind.
    pub fn fail_next_write(&mut self, kind: ErrorKind) {
        self.write_failure = Some(kind);
    }

    /// Block the next writes for `stall` in total before they are accepted.
    ///
    /// A write whose deadline comes first consumes the time up to it and
    /// times out; the rest of the stall carries over to the next write.
    pub fn stall_writes(&mut self, stall: Duration) {
        self.write_stall += stall;
    }

    /// Bytes written so far.
    pub fn outbound(&self) -> &[u8] {
        &self.outbound
    }

    /// Take and clear the bytes written so far.
    pub fn take_outbound(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.outbound)
    }

    /// Move everything written so far into the inbound queue.
    pub fn loop_back(&mut self) {
        let written = self.take_outbound();
        self.push_inbound(&written);
    }

    /// Number of queued inbound bytes not read yet.
    pub fn pending_inbound(&self) -> usize {
        self.inbound
            .iter()
            .filter(|event| matches!(event, Inbound::Byte(_)))
            .count()
    }

    fn expire(&mut self, deadline: Deadline) -> TransportError {
        self.clock.advance_to(deadline.instant());
        TransportError::Timeout
    }
}

impl Default for MemoryPort {
    fn default() -> Self {
        Self::new()
    }
}

impl Port for MemoryPort {
    fn write(&mut self, data: &[u8], deadline: Deadline) -> Result<usize> {
        if self.cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        if let Some(kind) = self.write_failure.take() {
            return Err(TransportError::Io(kind.into()));
        }
        if !self.write_stall.is_zero() {
            let remaining = deadline.remaining(&self.clock);
            if self.write_stall >= remaining {
                self.write_stall -= remaining;
                return Err(self.expire(deadline));
            }
            self.clock.advance(self.write_stall);
            self.write_stall = Duration::ZERO;
        }
        self.outbound.extend_from_slice(data);
        Ok(data.len())
    }

    fn read_available(&mut self, buf: &mut [u8], deadline: Deadline) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            if self.cancel.is_cancelled() {
                return Err(TransportError::Cancelled);
            }

            match self.inbound.front_mut() {
                None => return Err(self.expire(deadline)),
                Some(Inbound::Delay(delay)) => {
                    let remaining = deadline.remaining(&self.clock);
                    if *delay >= remaining {
                        *delay -= remaining;
                        return Err(self.expire(deadline));
                    }
                    let delay = *delay;
                    self.inbound.pop_front();
                    self.clock.advance(delay);
                }
                Some(Inbound::Fail(kind)) => {
                    let kind = *kind;
                    self.inbound.pop_front();
                    return Err(TransportError::Io(kind.into()));
                }
                Some(Inbound::Byte(_)) => break,
            }
        }

        let limit = buf.len().min(self.read_chunk);
        let mut read = 0;
        while read < limit {
            match self.inbound.front() {
                Some(Inbound::Byte(byte)) => {
                    buf[read] = *byte;
                    read += 1;
                    self.inbound.pop_front();
                }
                _ => break,
            }
        }

        trace!(read, at = ?self.clock.now(), "memory port read");
        Ok(read)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deadline(port: &MemoryPort, millis: u64) -> Deadline {
        Deadline::after(port.clock(), Duration::from_millis(millis))
    }

    #[test]
    fn reads_respect_chunk_size() {
        let mut port = MemoryPort::new();
        port.push_inbound(b"abcdef");
        port.set_read_chunk(4);
        let deadline = deadline(&port, 10);

        let mut buf = [0u8; 8];
        assert_eq!(port.read_available(&mut buf, deadline).unwrap(), 4);
        assert_eq!(&buf[..4], b"abcd");
        assert_eq!(port.read_available(&mut buf, deadline).unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");
    }

    #[test]
    fn empty_queue_times_out_at_deadline() {
        let mut port = MemoryPort::new();
        let start = port.clock().now();
        let deadline = deadline(&port, 50);

        let err = port.read_available(&mut [0u8; 4], deadline).unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(port.clock().now() - start, Duration::from_millis(50));
    }

    #[test]
    fn delay_advances_clock_before_data() {
        let mut port = MemoryPort::new();
        let start = port.clock().now();
        port.push_delay(Duration::from_millis(20));
        port.push_inbound(b"x");
        let deadline = deadline(&port, 50);

        assert_eq!(port.read_byte(deadline).unwrap(), b'x');
        assert_eq!(port.clock().now() - start, Duration::from_millis(20));
    }

    #[test]
    fn delay_past_deadline_keeps_remainder() {
        let mut port = MemoryPort::new();
        port.push_delay(Duration::from_millis(80));
        port.push_inbound(b"y");

        let first = deadline(&port, 50);
        assert!(port.read_byte(first).unwrap_err().is_timeout());

        let second = deadline(&port, 50);
        assert_eq!(port.read_byte(second).unwrap(), b'y');
    }

    #[test]
    fn injected_failures_surface_as_io() {
        let mut port = MemoryPort::new();
        port.push_read_error(ErrorKind::BrokenPipe);
        port.fail_next_write(ErrorKind::BrokenPipe);
        let deadline = deadline(&port, 10);

        assert!(matches!(
            port.read_byte(deadline),
            Err(TransportError::Io(e)) if e.kind() == ErrorKind::BrokenPipe
        ));
        assert!(matches!(port.write(b"z", deadline), Err(TransportError::Io(_))));
        assert_eq!(port.write(b"z", deadline).unwrap(), 1);
    }

    #[test]
    fn cancelled_token_stops_reads() {
        let cancel = CancelToken::new();
        let mut port = MemoryPort::new().with_cancel_token(cancel.clone());
        port.push_inbound(b"data");
        cancel.cancel();

        let deadline = deadline(&port, 10);
        assert!(matches!(
            port.read_byte(deadline),
            Err(TransportError::Cancelled)
        ));
    }

    #[test]
    fn loop_back_replays_outbound() {
        let mut port = MemoryPort::new();
        let deadline = deadline(&port, 10);
        port.write_all(b"echo", deadline).unwrap();
        port.loop_back();

        assert!(port.outbound().is_empty());
        assert_eq!(port.pending_inbound(), 4);
    }

    #[test]
    fn stalled_write_times_out_and_carries_over() {
        let mut port = MemoryPort::new();
        let start = port.clock().now();
        port.stall_writes(Duration::from_millis(80));

        let first = deadline(&port, 50);
        assert!(port.write_all(b"ab", first).unwrap_err().is_timeout());
        assert_eq!(port.clock().now() - start, Duration::from_millis(50));
        assert!(port.outbound().is_empty());

        let second = deadline(&port, 50);
        port.write_all(b"ab", second).unwrap();
        assert_eq!(port.clock().now() - start, Duration::from_millis(80));
        assert_eq!(port.outbound(), b"ab");
    }

    #[test]
    fn cancelled_token_stops_writes() {
        let cancel = CancelToken::new();
        let mut port = MemoryPort::new().with_cancel_token(cancel.clone());
        cancel.cancel();

        let deadline = deadline(&port, 10);
        assert!(matches!(
            port.write_byte(0x73, deadline),
            Err(TransportError::Cancelled)
        ));
    }
}
