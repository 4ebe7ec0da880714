//! Byte-stuffing codec.
//!
//! `START_FRAME` marks the first byte of a frame and must never appear inside
//! frame data, so both it and `ESCAPE` are replaced by two-byte sequences:
//!
//! | Raw byte       | On the wire                |
//! |----------------|----------------------------|
//! | `START_FRAME`  | `ESCAPE`, `ESCAPE_START`   |
//! | `ESCAPE`       | `ESCAPE`, `ESCAPE_ESCAPE`  |
//!
//! Everything else is written verbatim.

use bytes::{BufMut, BytesMut};
use flarmlink_transport::{Deadline, Port};
use tracing::trace;

use crate::error::{FrameError, Result};

/// First byte of every frame. Sent raw only as the synchronization marker.
pub const START_FRAME: u8 = 0x73;
/// Introduces an escaped byte.
pub const ESCAPE: u8 = 0x78;
/// Follows `ESCAPE` to stand for `START_FRAME`.
pub const ESCAPE_START: u8 = 0x31;
/// Follows `ESCAPE` to stand for `ESCAPE`.
pub const ESCAPE_ESCAPE: u8 = 0x55;

/// Index of the first reserved byte in `data`, found in a single pass.
pub fn find_special(data: &[u8]) -> Option<usize> {
    data.iter().position(|&b| b == START_FRAME || b == ESCAPE)
}

fn escape_code(byte: u8) -> u8 {
    if byte == START_FRAME {
        ESCAPE_START
    } else {
        ESCAPE_ESCAPE
    }
}

fn unescape_code(code: u8) -> Result<u8> {
    match code {
        ESCAPE_START => Ok(START_FRAME),
        ESCAPE_ESCAPE => Ok(ESCAPE),
        other => {
            trace!(code = other, "unknown escape code");
            Err(FrameError::EscapeSequenceInvalid(other))
        }
    }
}

/// Write `data` to `port`, escaping reserved bytes.
///
/// Runs of harmless bytes are written in bulk. Every write is bounded by
/// `deadline`.
pub fn send_escaped<P: Port + ?Sized>(port: &mut P, data: &[u8], deadline: Deadline) -> Result<()> {
    debug_assert!(!data.is_empty(), "send_escaped called with empty data");

    let mut rest = data;
    loop {
        let special = find_special(rest).unwrap_or(rest.len());
        if special > 0 {
            port.write_all(&rest[..special], deadline)?;
        }

        let Some(&byte) = rest.get(special) else {
            return Ok(());
        };
        port.write_all(&[ESCAPE, escape_code(byte)], deadline)?;
        rest = &rest[special + 1..];
    }
}

/// Append the escaped form of `data` to `dst`.
pub fn escape_into(data: &[u8], dst: &mut BytesMut) {
    dst.reserve(data.len());

    let mut rest = data;
    while let Some(special) = find_special(rest) {
        dst.put_slice(&rest[..special]);
        dst.put_u8(ESCAPE);
        dst.put_u8(escape_code(rest[special]));
        rest = &rest[special + 1..];
    }
    dst.put_slice(rest);
}

/// Reverse [`escape_into`] on a complete buffer.
pub fn unescape(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len());
    let mut bytes = data.iter().copied();
    while let Some(byte) = bytes.next() {
        if byte == ESCAPE {
            let code = bytes.next().ok_or(FrameError::TruncatedEscape)?;
            out.push(unescape_code(code)?);
        } else {
            out.push(byte);
        }
    }
    Ok(out)
}

/// Read once from `port` into `dest` and unescape in place.
///
/// The read optimistically asks for `dest.len()` raw bytes, as if nothing
/// were escaped. If the last byte read is `ESCAPE`, one more byte is read to
/// complete the sequence. Returns the number of unescaped bytes now at the
/// start of `dest`, which may be less than `dest.len()`.
pub fn receive_some_unescape<P: Port + ?Sized>(
    port: &mut P,
    dest: &mut [u8],
    deadline: Deadline,
) -> Result<usize> {
    let nbytes = port.read_available(dest, deadline)?;

    // The write cursor never passes the read cursor.
    let mut read = 0;
    let mut written = 0;
    while read < nbytes {
        let byte = dest[read];
        read += 1;

        dest[written] = if byte != ESCAPE {
            byte
        } else if read < nbytes {
            read += 1;
            unescape_code(dest[read - 1])?
        } else {
            unescape_code(port.read_byte(deadline)?)?
        };
        written += 1;
    }

    Ok(written)
}

/// Fill `dest` completely with unescaped bytes from `port`.
pub fn receive_escaped<P: Port + ?Sized>(
    port: &mut P,
    dest: &mut [u8],
    deadline: Deadline,
) -> Result<()> {
    debug_assert!(!dest.is_empty(), "receive_escaped called with empty buffer");

    let mut filled = 0;
    while filled < dest.len() {
        filled += receive_some_unescape(port, &mut dest[filled..], deadline)?;
    }
    Ok(())
}
