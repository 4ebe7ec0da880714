//! Sending frames and waiting for matching replies.
//!
//! A wait is a loop of attempts sharing one deadline. Each attempt
//! resynchronizes on the next `START_FRAME`, decodes a header, reads the
//! declared payload, checks the CRC and finally matches type and sequence.
//! A failed attempt only discards that frame; the loop keeps going with
//! whatever time is left.

use std::fmt;

use bytes::{Bytes, BytesMut};
use flarmlink_frame::{
    receive_escaped, send_escaped, FrameError, FrameHeader, MessageType, HEADER_SIZE, START_FRAME,
};
use flarmlink_transport::{Clock, Deadline, Port};
use tracing::{debug, trace};

use crate::error::{DeviceError, Result};

/// A frame accepted by a wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub message_type: MessageType,
    /// The whole payload, starting with the echoed sequence number.
    pub payload: Bytes,
}

impl Reply {
    /// Payload bytes after the echoed sequence number.
    pub fn body(&self) -> &[u8] {
        self.payload.get(2..).unwrap_or_default()
    }
}

/// How a wait ended, short of a transport failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// A frame of an expected type acknowledging the expected sequence number.
    Matched(Reply),
    /// The deadline passed without a matching frame.
    TimedOut,
}

impl WaitOutcome {
    /// The matched message type, if any.
    pub fn message_type(&self) -> Option<MessageType> {
        match self {
            WaitOutcome::Matched(reply) => Some(reply.message_type),
            WaitOutcome::TimedOut => None,
        }
    }

    pub fn into_reply(self) -> Option<Reply> {
        match self {
            WaitOutcome::Matched(reply) => Some(reply),
            WaitOutcome::TimedOut => None,
        }
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, WaitOutcome::TimedOut)
    }
}

/// What a wait is looking for.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Expectation<'a> {
    pub sequence: u16,
    pub types: &'a [MessageType],
    pub max_payload_size: usize,
}

/// Why a single attempt was abandoned. Never leaves this module.
enum Rejection {
    Malformed(FrameError),
    Timeout,
    Undersized(u16),
    Oversized(usize),
    CrcMismatch,
    UnexpectedType(MessageType),
    MissingSequence(usize),
    SequenceMismatch(u16),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Malformed(err) => write!(f, "malformed: {err}"),
            Rejection::Timeout => write!(f, "frame incomplete at deadline"),
            Rejection::Undersized(length) => write!(f, "length {length} below header size"),
            Rejection::Oversized(len) => write!(f, "payload of {len} bytes over limit"),
            Rejection::CrcMismatch => write!(f, "crc mismatch"),
            Rejection::UnexpectedType(message_type) => write!(f, "unexpected type {message_type}"),
            Rejection::MissingSequence(len) => write!(f, "payload of {len} bytes has no sequence"),
            Rejection::SequenceMismatch(echoed) => write!(f, "acknowledges sequence {echoed}"),
        }
    }
}

enum Attempt {
    Accepted(MessageType),
    Rejected(Rejection),
}

/// Write a complete frame: raw start marker, escaped header, escaped payload.
///
/// Every write is bounded by `deadline`.
pub(crate) fn send_frame<P: Port + ?Sized>(
    port: &mut P,
    header: &FrameHeader,
    payload: &[u8],
    deadline: Deadline,
) -> Result<()> {
    debug_assert_eq!(header.payload_len(), Some(payload.len()));

    port.write_byte(START_FRAME, deadline)?;
    send_escaped(port, &header.to_bytes(), deadline)?;
    if !payload.is_empty() {
        send_escaped(port, payload, deadline)?;
    }

    debug!(
        sequence = header.sequence_number(),
        message_type = %header.message_type(),
        payload_len = payload.len(),
        "sent frame"
    );
    Ok(())
}

/// Receive frames until one satisfies `expect` or `deadline` passes.
pub(crate) fn wait_for<P, C>(
    port: &mut P,
    clock: &C,
    expect: Expectation<'_>,
    deadline: Deadline,
) -> Result<WaitOutcome>
where
    P: Port + ?Sized,
    C: Clock,
{
    let mut payload = BytesMut::new();

    while !deadline.has_expired(clock) {
        match port.wait_for_byte(START_FRAME, deadline) {
            Ok(()) => {}
            Err(err) if err.is_timeout() => break,
            Err(err) => return Err(err.into()),
        }

        match attempt(port, &mut payload, expect, deadline)? {
            Attempt::Accepted(message_type) => {
                debug!(
                    sequence = expect.sequence,
                    %message_type,
                    "matched reply"
                );
                return Ok(WaitOutcome::Matched(Reply {
                    message_type,
                    payload: payload.split().freeze(),
                }));
            }
            Attempt::Rejected(reason) => {
                debug!(
                    sequence = expect.sequence,
                    %reason,
                    remaining = ?deadline.remaining(clock),
                    "discarded frame"
                );
            }
        }
    }

    trace!(sequence = expect.sequence, "no matching reply before deadline");
    Ok(WaitOutcome::TimedOut)
}

/// One pass after a start marker. `payload` is resized to the frame's payload.
fn attempt<P: Port + ?Sized>(
    port: &mut P,
    payload: &mut BytesMut,
    expect: Expectation<'_>,
    deadline: Deadline,
) -> Result<Attempt> {
    let mut raw = [0u8; HEADER_SIZE];
    if let Err(err) = receive_escaped(port, &mut raw, deadline) {
        return recover(err);
    }
    let header = FrameHeader::from_bytes(&raw);

    let Some(payload_len) = header.payload_len() else {
        return Ok(Attempt::Rejected(Rejection::Undersized(header.length())));
    };
    if payload_len > expect.max_payload_size {
        return Ok(Attempt::Rejected(Rejection::Oversized(payload_len)));
    }

    payload.resize(payload_len, 0);
    if payload_len > 0 {
        if let Err(err) = receive_escaped(port, &mut payload[..], deadline) {
            return recover(err);
        }
    }

    if !header.verify(&payload[..]) {
        return Ok(Attempt::Rejected(Rejection::CrcMismatch));
    }

    Ok(match_reply(&header, &payload[..], expect))
}

fn match_reply(header: &FrameHeader, payload: &[u8], expect: Expectation<'_>) -> Attempt {
    let message_type = header.message_type();
    if !expect.types.contains(&message_type) {
        return Attempt::Rejected(Rejection::UnexpectedType(message_type));
    }

    let Some(echoed) = payload.get(..2) else {
        return Attempt::Rejected(Rejection::MissingSequence(payload.len()));
    };
    let echoed = u16::from_le_bytes([echoed[0], echoed[1]]);
    if echoed != expect.sequence {
        return Attempt::Rejected(Rejection::SequenceMismatch(echoed));
    }

    Attempt::Accepted(message_type)
}

/// Malformed bytes and timeouts end the attempt; anything else is fatal.
fn recover(err: FrameError) -> Result<Attempt> {
    if err.is_malformed() {
        return Ok(Attempt::Rejected(Rejection::Malformed(err)));
    }
    if err.is_timeout() {
        return Ok(Attempt::Rejected(Rejection::Timeout));
    }
    Err(DeviceError::from(err))
}
