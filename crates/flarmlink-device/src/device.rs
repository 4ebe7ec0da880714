use std::time::Duration;

use flarmlink_frame::{FrameHeader, MessageType};
use flarmlink_transport::{Clock, Deadline, Port, SystemClock};
use tracing::{debug, info};

use crate::config::DeviceConfig;
use crate::error::Result;
use crate::exchange::{self, Expectation, WaitOutcome};

const ACK_OR_NACK: &[MessageType] = &[MessageType::Ack, MessageType::Nack];

/// One binary-mode connection to a FLARM device.
///
/// Owns the port and the outbound sequence counter. All operations take
/// `&mut self`, so sends and waits on one connection never overlap.
pub struct FlarmDevice<P, C = SystemClock> {
    port: P,
    clock: C,
    sequence: u16,
    config: DeviceConfig,
}

impl<P: Port> FlarmDevice<P> {
    /// Create a device on `port` with default configuration and the system clock.
    pub fn new(port: P) -> Self {
        Self::with_config(port, SystemClock, DeviceConfig::default())
    }
}

impl<P: Port, C: Clock> FlarmDevice<P, C> {
    /// Create a device with an explicit clock and configuration.
    ///
    /// The clock must be the one the port measures its deadlines against.
    pub fn with_config(port: P, clock: C, config: DeviceConfig) -> Self {
        Self {
            port,
            clock,
            sequence: config.initial_sequence,
            config,
        }
    }

    /// Build the header for an outbound frame, consuming one sequence number.
    pub fn prepare_header(
        &mut self,
        message_type: MessageType,
        payload: &[u8],
    ) -> Result<FrameHeader> {
        Ok(FrameHeader::prepare(
            &mut self.sequence,
            message_type,
            payload,
        )?)
    }

    /// Send a prepared frame within `timeout`. Does not wait for any reply.
    pub fn send_frame(
        &mut self,
        header: &FrameHeader,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<()> {
        let deadline = Deadline::after(&self.clock, timeout);
        exchange::send_frame(&mut self.port, header, payload, deadline)
    }

    /// Prepare and send a frame, returning the sequence number it carries.
    pub fn send(
        &mut self,
        message_type: MessageType,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<u16> {
        let deadline = Deadline::after(&self.clock, timeout);
        self.send_until(message_type, payload, deadline)
    }

    /// Wait for a frame of one of `expected` types acknowledging `sequence`.
    ///
    /// Frames that are corrupted or do not match are discarded; the wait
    /// keeps going until `timeout` is used up.
    pub fn wait_for(
        &mut self,
        sequence: u16,
        expected: &[MessageType],
        timeout: Duration,
    ) -> Result<WaitOutcome> {
        let deadline = Deadline::after(&self.clock, timeout);
        self.wait_until(sequence, expected, deadline)
    }

    /// Wait for an ACK or NACK of `sequence`.
    pub fn wait_for_ack_or_nack(&mut self, sequence: u16, timeout: Duration) -> Result<WaitOutcome> {
        self.wait_for(sequence, ACK_OR_NACK, timeout)
    }

    /// Returns true only if `sequence` is ACKed within `timeout`.
    ///
    /// A NACK and a timeout both yield `false`.
    pub fn wait_for_ack(&mut self, sequence: u16, timeout: Duration) -> Result<bool> {
        let outcome = self.wait_for_ack_or_nack(sequence, timeout)?;
        Ok(outcome.message_type() == Some(MessageType::Ack))
    }

    /// Send a frame and wait for its ACK or NACK, all within `timeout`.
    ///
    /// A send that cannot finish before the deadline counts as no response.
    pub fn request(
        &mut self,
        message_type: MessageType,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<WaitOutcome> {
        let deadline = Deadline::after(&self.clock, timeout);
        let sequence = match self.send_until(message_type, payload, deadline) {
            Ok(sequence) => sequence,
            Err(err) if err.is_timeout() => {
                debug!(%message_type, "send did not complete before deadline");
                return Ok(WaitOutcome::TimedOut);
            }
            Err(err) => return Err(err),
        };
        self.wait_until(sequence, ACK_OR_NACK, deadline)
    }

    /// Check whether the device answers in binary mode.
    ///
    /// A device that does not respond within `timeout` is not an error:
    /// the result is simply `false`.
    pub fn ping(&mut self, timeout: Duration) -> Result<bool> {
        let outcome = self.request(MessageType::Ping, &[], timeout)?;
        let alive = outcome.message_type() == Some(MessageType::Ack);
        debug!(alive, "binary ping finished");
        Ok(alive)
    }

    /// Tell the device to leave binary mode and reset. No reply is awaited.
    pub fn reset(&mut self, timeout: Duration) -> Result<()> {
        let sequence = self.send(MessageType::Exit, &[], timeout)?;
        info!(sequence, "sent binary reset");
        Ok(())
    }

    /// Sequence number the next outbound frame will carry.
    pub fn sequence_number(&self) -> u16 {
        self.sequence
    }

    /// Current device configuration.
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Borrow the underlying port.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Mutably borrow the underlying port.
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Consume the device and return the port.
    pub fn into_port(self) -> P {
        self.port
    }

    fn send_until(
        &mut self,
        message_type: MessageType,
        payload: &[u8],
        deadline: Deadline,
    ) -> Result<u16> {
        let header = self.prepare_header(message_type, payload)?;
        exchange::send_frame(&mut self.port, &header, payload, deadline)?;
        Ok(header.sequence_number())
    }

    fn wait_until(
        &mut self,
        sequence: u16,
        expected: &[MessageType],
        deadline: Deadline,
    ) -> Result<WaitOutcome> {
        let expect = Expectation {
            sequence,
            types: expected,
            max_payload_size: self.config.max_payload_size,
        };
        exchange::wait_for(&mut self.port, &self.clock, expect, deadline)
    }
}

impl<P, C> std::fmt::Debug for FlarmDevice<P, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlarmDevice")
            .field("sequence", &self.sequence)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::ErrorKind;

    use bytes::{BufMut, BytesMut};
    use flarmlink_frame::{escape_into, unescape, HEADER_SIZE, START_FRAME};
    use flarmlink_transport::{CancelToken, ManualClock, MemoryPort, TransportError};

    use super::*;
    use crate::error::DeviceError;

    const TIMEOUT: Duration = Duration::from_millis(500);

    fn device(initial_sequence: u16) -> FlarmDevice<MemoryPort, ManualClock> {
        let clock = ManualClock::new();
        let port = MemoryPort::with_clock(clock.clone());
        FlarmDevice::with_config(
            port,
            clock,
            DeviceConfig {
                initial_sequence,
                ..DeviceConfig::default()
            },
        )
    }

    fn reply(message_type: MessageType, acked: u16) -> Vec<u8> {
        let payload = acked.to_le_bytes();
        let mut sequence = 0x4000;
        let header = FrameHeader::prepare(&mut sequence, message_type, &payload).unwrap();
        let mut wire = BytesMut::new();
        wire.put_u8(START_FRAME);
        escape_into(&header.to_bytes(), &mut wire);
        escape_into(&payload, &mut wire);
        wire.to_vec()
    }

    fn decode_sent(wire: &[u8]) -> (FrameHeader, Vec<u8>) {
        assert_eq!(wire[0], START_FRAME);
        let frame = unescape(&wire[1..]).unwrap();
        let mut raw = [0u8; HEADER_SIZE];
        raw.copy_from_slice(&frame[..HEADER_SIZE]);
        (FrameHeader::from_bytes(&raw), frame[HEADER_SIZE..].to_vec())
    }

    fn elapsed(device: &FlarmDevice<MemoryPort, ManualClock>, since: std::time::Instant) -> Duration {
        device.port().clock().now() - since
    }

    #[test]
    fn ping_frame_decodes_on_the_peer_side() {
        let mut dev = device(7);
        dev.port_mut().push_inbound(&reply(MessageType::Ack, 7));

        assert!(dev.ping(TIMEOUT).unwrap());

        let (header, payload) = decode_sent(&dev.port_mut().take_outbound());
        assert_eq!(header.sequence_number(), 7);
        assert_eq!(header.message_type(), MessageType::Ping);
        assert_eq!(header.version(), 0);
        assert_eq!(header.length() as usize, HEADER_SIZE);
        assert!(header.verify(&payload));
        assert!(payload.is_empty());
    }

    #[test]
    fn ack_for_matching_sequence_satisfies_wait() {
        let mut dev = device(0);
        dev.port_mut().push_inbound(&reply(MessageType::Ack, 7));
        assert!(dev.wait_for_ack(7, TIMEOUT).unwrap());
    }

    #[test]
    fn ack_for_other_sequence_does_not() {
        let mut dev = device(0);
        let start = dev.port().clock().now();
        dev.port_mut().push_inbound(&reply(MessageType::Ack, 8));

        assert!(!dev.wait_for_ack(7, TIMEOUT).unwrap());
        assert_eq!(elapsed(&dev, start), TIMEOUT);
    }

    #[test]
    fn mismatched_sequence_keeps_waiting_for_the_right_one() {
        let mut dev = device(0);
        dev.port_mut().push_inbound(&reply(MessageType::Ack, 6));
        dev.port_mut().push_delay(Duration::from_millis(100));
        dev.port_mut().push_inbound(&reply(MessageType::Ack, 7));

        assert!(dev.wait_for_ack(7, TIMEOUT).unwrap());
    }

    #[test]
    fn corrupted_frame_then_valid_ack_resynchronizes() {
        let mut dev = device(0);
        let start = dev.port().clock().now();

        let mut corrupted = reply(MessageType::Ack, 7);
        let last = corrupted.len() - 1;
        corrupted[last] ^= 0x01;
        dev.port_mut().push_inbound(&corrupted);
        dev.port_mut().push_delay(Duration::from_millis(200));
        dev.port_mut().push_inbound(&reply(MessageType::Ack, 7));

        assert!(dev.wait_for_ack(7, TIMEOUT).unwrap());
        assert_eq!(elapsed(&dev, start), Duration::from_millis(200));
    }

    #[test]
    fn reply_after_deadline_is_not_matched() {
        let mut dev = device(0);
        dev.port_mut().push_delay(Duration::from_millis(600));
        dev.port_mut().push_inbound(&reply(MessageType::Ack, 7));

        assert!(!dev.wait_for_ack(7, TIMEOUT).unwrap());
    }

    #[test]
    fn rejected_frames_never_extend_the_budget() {
        let mut dev = device(0);
        let start = dev.port().clock().now();
        for acked in 0..5 {
            dev.port_mut().push_delay(Duration::from_millis(90));
            dev.port_mut().push_inbound(&reply(MessageType::Ack, 100 + acked));
        }
        dev.port_mut().push_delay(Duration::from_millis(90));
        dev.port_mut().push_inbound(&[START_FRAME, 0x0A]);
        dev.port_mut().push_delay(Duration::from_millis(90));
        dev.port_mut().push_inbound(&reply(MessageType::Ack, 7));

        let outcome = dev.wait_for_ack_or_nack(7, TIMEOUT).unwrap();
        assert!(outcome.is_timed_out());
        assert!(elapsed(&dev, start) <= TIMEOUT);
    }

    #[test]
    fn nack_is_reported_but_not_an_ack() {
        let mut dev = device(0);
        dev.port_mut().push_inbound(&reply(MessageType::Nack, 3));
        let outcome = dev.wait_for_ack_or_nack(3, TIMEOUT).unwrap();
        assert_eq!(outcome.message_type(), Some(MessageType::Nack));

        dev.port_mut().push_inbound(&reply(MessageType::Nack, 4));
        assert!(!dev.wait_for_ack(4, TIMEOUT).unwrap());
    }

    #[test]
    fn ping_without_response_is_false() {
        let mut dev = device(0);
        let start = dev.port().clock().now();

        assert!(!dev.ping(TIMEOUT).unwrap());
        assert_eq!(elapsed(&dev, start), TIMEOUT);
    }

    #[test]
    fn garbage_before_start_marker_is_ignored() {
        let mut dev = device(1);
        dev.port_mut().push_inbound(b"$PFLAU,0,0,0,1*4F\r\n");
        dev.port_mut().push_inbound(&reply(MessageType::Ack, 1));

        assert!(dev.ping(TIMEOUT).unwrap());
    }

    #[test]
    fn transport_failure_is_fatal() {
        let mut dev = device(0);
        dev.port_mut().push_read_error(ErrorKind::BrokenPipe);
        dev.port_mut().push_inbound(&reply(MessageType::Ack, 0));

        let err = dev.ping(TIMEOUT).unwrap_err();
        assert!(matches!(err, DeviceError::Transport(TransportError::Io(_))));
    }

    #[test]
    fn failure_while_reading_a_frame_is_fatal() {
        let mut dev = device(0);
        dev.port_mut().push_inbound(&[START_FRAME, 0x0A]);
        dev.port_mut().push_read_error(ErrorKind::ConnectionReset);

        let err = dev.wait_for_ack(0, TIMEOUT).unwrap_err();
        assert!(matches!(err, DeviceError::Transport(TransportError::Io(_))));
    }

    #[test]
    fn write_failure_is_fatal() {
        let mut dev = device(0);
        dev.port_mut().fail_next_write(ErrorKind::BrokenPipe);
        assert!(dev.ping(TIMEOUT).is_err());
    }

    #[test]
    fn cancellation_stops_the_wait() {
        let clock = ManualClock::new();
        let cancel = CancelToken::new();
        let port = MemoryPort::with_clock(clock.clone()).with_cancel_token(cancel.clone());
        let mut dev = FlarmDevice::with_config(port, clock, DeviceConfig::default());
        dev.port_mut().push_inbound(&reply(MessageType::Ack, 0));
        cancel.cancel();

        let err = dev.wait_for_ack(0, TIMEOUT).unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn stalled_send_makes_ping_false_within_budget() {
        let mut dev = device(0);
        let start = dev.port().clock().now();
        dev.port_mut().stall_writes(Duration::from_secs(2));
        dev.port_mut().push_inbound(&reply(MessageType::Ack, 0));

        assert!(!dev.ping(TIMEOUT).unwrap());
        assert_eq!(elapsed(&dev, start), TIMEOUT);
    }

    #[test]
    fn send_and_wait_share_one_budget() {
        let mut dev = device(0);
        let start = dev.port().clock().now();
        dev.port_mut().stall_writes(Duration::from_millis(300));
        dev.port_mut().push_delay(Duration::from_millis(300));
        dev.port_mut().push_inbound(&reply(MessageType::Ack, 0));

        assert!(!dev.ping(TIMEOUT).unwrap());
        assert_eq!(elapsed(&dev, start), TIMEOUT);
    }

    #[test]
    fn slow_send_still_matches_within_budget() {
        let mut dev = device(0);
        let start = dev.port().clock().now();
        dev.port_mut().stall_writes(Duration::from_millis(300));
        dev.port_mut().push_delay(Duration::from_millis(100));
        dev.port_mut().push_inbound(&reply(MessageType::Ack, 0));

        assert!(dev.ping(TIMEOUT).unwrap());
        assert_eq!(elapsed(&dev, start), Duration::from_millis(400));
    }

    #[test]
    fn plain_send_reports_stall_as_timeout() {
        let mut dev = device(0);
        dev.port_mut().stall_writes(Duration::from_secs(2));

        let err = dev.reset(TIMEOUT).unwrap_err();
        assert!(err.is_timeout());
        assert!(!err.is_cancelled());
    }

    #[test]
    #[cfg(unix)]
    fn ping_over_stalled_socket_is_false_within_budget() {
        use std::io::Write;
        use std::os::unix::net::UnixStream;
        use std::time::Instant;

        use flarmlink_transport::{PortConfig, StreamPort};

        let (left, _right) = UnixStream::pair().unwrap();
        left.set_nonblocking(true).unwrap();
        for chunk in [&[0u8; 4096][..], &[0u8; 1][..]] {
            loop {
                match (&left).write(chunk) {
                    Ok(_) => {}
                    Err(err) if err.kind() == ErrorKind::WouldBlock => break,
                    Err(err) => panic!("unexpected write error: {err}"),
                }
            }
        }
        left.set_nonblocking(false).unwrap();

        let config = PortConfig {
            poll_interval: Duration::from_millis(10),
            write_timeout: Some(Duration::from_millis(800)),
            ..PortConfig::default()
        };
        let mut dev = FlarmDevice::new(StreamPort::new(left, config).unwrap());

        let start = Instant::now();
        let alive = dev.ping(Duration::from_millis(100)).unwrap();

        assert!(!alive);
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert!(start.elapsed() < Duration::from_millis(700));
    }

    #[test]
    fn reset_sends_exit_without_waiting() {
        let mut dev = device(0x0078);
        let start = dev.port().clock().now();

        dev.reset(TIMEOUT).unwrap();

        assert_eq!(elapsed(&dev, start), Duration::ZERO);
        let (header, payload) = decode_sent(&dev.port_mut().take_outbound());
        assert_eq!(header.message_type(), MessageType::Exit);
        assert_eq!(header.sequence_number(), 0x0078);
        assert!(payload.is_empty());
    }

    #[test]
    fn each_command_consumes_one_sequence_number() {
        let mut dev = device(u16::MAX);
        assert_eq!(dev.send(MessageType::Ping, &[], TIMEOUT).unwrap(), u16::MAX);
        assert_eq!(dev.send(MessageType::Ping, &[], TIMEOUT).unwrap(), 0);
        assert_eq!(dev.sequence_number(), 1);
    }

    #[test]
    fn request_returns_reply_body() {
        let mut dev = device(2);
        let mut sequence = 0x10;
        let payload = [0x02, 0x00, 0x11, 0x22];
        let header = FrameHeader::prepare(&mut sequence, MessageType::Ack, &payload).unwrap();
        let mut wire = BytesMut::new();
        wire.put_u8(START_FRAME);
        escape_into(&header.to_bytes(), &mut wire);
        escape_into(&payload, &mut wire);
        dev.port_mut().push_inbound(&wire);

        let outcome = dev
            .request(MessageType::GetRecordInfo, &[0x05], TIMEOUT)
            .unwrap();
        let reply = outcome.into_reply().unwrap();
        assert_eq!(reply.body(), &[0x11, 0x22]);

        let (sent, sent_payload) = decode_sent(&dev.port_mut().take_outbound());
        assert_eq!(sent.message_type(), MessageType::GetRecordInfo);
        assert_eq!(sent_payload, vec![0x05]);
    }
}
