use flarmlink_frame::MAX_PAYLOAD;

/// Configuration for a [`FlarmDevice`](crate::FlarmDevice).
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Largest inbound payload accepted. Frames declaring more are discarded.
    pub max_payload_size: usize,
    /// First sequence number assigned to an outbound frame.
    pub initial_sequence: u16,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            max_payload_size: MAX_PAYLOAD,
            initial_sequence: 0,
        }
    }
}
