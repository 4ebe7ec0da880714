use crate::clock::Deadline;
use crate::error::{Result, TransportError};

/// A blocking, byte-oriented link to a device.
///
/// Implementors provide [`write`](Port::write) and
/// [`read_available`](Port::read_available); the remaining primitives have
/// default implementations built on those two and may be overridden when the
/// underlying link can do better.
///
/// Every blocking call takes the [`Deadline`] of the operation it belongs to,
/// so one budget bounds a whole send-then-wait exchange. A `read_available`
/// implementation blocks until at least one byte arrives or `deadline`
/// passes, and never returns `Ok(0)` for a non-empty buffer. A `write` that
/// cannot make progress before `deadline` fails with
/// [`TransportError::Timeout`].
pub trait Port {
    /// Write some bytes, returning how many were accepted.
    fn write(&mut self, data: &[u8], deadline: Deadline) -> Result<usize>;

    /// Fill `buf` with whatever is available, blocking for at least one byte.
    fn read_available(&mut self, buf: &mut [u8], deadline: Deadline) -> Result<usize>;

    /// Write every byte of `data`.
    fn write_all(&mut self, mut data: &[u8], deadline: Deadline) -> Result<()> {
        while !data.is_empty() {
            match self.write(data, deadline)? {
                0 => return Err(TransportError::Closed),
                n => data = &data[n..],
            }
        }
        Ok(())
    }

    /// Write a single byte.
    fn write_byte(&mut self, byte: u8, deadline: Deadline) -> Result<()> {
        self.write_all(&[byte], deadline)
    }

    /// Read exactly one byte.
    fn read_byte(&mut self, deadline: Deadline) -> Result<u8> {
        let mut byte = [0u8; 1];
        match self.read_available(&mut byte, deadline)? {
            0 => Err(TransportError::Closed),
            _ => Ok(byte[0]),
        }
    }

    /// Consume and discard bytes until `value` has been read.
    fn wait_for_byte(&mut self, value: u8, deadline: Deadline) -> Result<()> {
        while self.read_byte(deadline)? != value {}
        Ok(())
    }
}

impl<P: Port + ?Sized> Port for &mut P {
    fn write(&mut self, data: &[u8], deadline: Deadline) -> Result<usize> {
        (**self).write(data, deadline)
    }

    fn read_available(&mut self, buf: &mut [u8], deadline: Deadline) -> Result<usize> {
        (**self).read_available(buf, deadline)
    }

    fn write_all(&mut self, data: &[u8], deadline: Deadline) -> Result<()> {
        (**self).write_all(data, deadline)
    }

    fn write_byte(&mut self, byte: u8, deadline: Deadline) -> Result<()> {
        (**self).write_byte(byte, deadline)
    }

    fn read_byte(&mut self, deadline: Deadline) -> Result<u8> {
        (**self).read_byte(deadline)
    }

    fn wait_for_byte(&mut self, value: u8, deadline: Deadline) -> Result<()> {
        (**self).wait_for_byte(value, deadline)
    }
}

impl<P: Port + ?Sized> Port for Box<P> {
    fn write(&mut self, data: &[u8], deadline: Deadline) -> Result<usize> {
        (**self).write(data, deadline)
    }

    fn read_available(&mut self, buf: &mut [u8], deadline: Deadline) -> Result<usize> {
        (**self).read_available(buf, deadline)
    }

    fn write_all(&mut self, data: &[u8], deadline: Deadline) -> Result<()> {
        (**self).write_all(data, deadline)
    }

    fn write_byte(&mut self, byte: u8, deadline: Deadline) -> Result<()> {
        (**self).write_byte(byte, deadline)
    }

    fn read_byte(&mut self, deadline: Deadline) -> Result<u8> {
        (**self).read_byte(deadline)
    }

    fn wait_for_byte(&mut self, value: u8, deadline: Deadline) -> Result<()> {
        (**self).wait_for_byte(value, deadline)
    }
}
