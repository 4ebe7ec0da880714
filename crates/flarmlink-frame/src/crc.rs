use ::crc::{Crc, CRC_16_XMODEM};

use crate::header::{FrameHeader, HEADER_SIZE};

/// CRC-16/CCITT with a zero initial value, as used by FLARM frames.
pub const FRAME_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// Offset of the crc field inside the encoded header.
const CRC_OFFSET: usize = HEADER_SIZE - 2;

/// Compute the integrity code of a frame.
///
/// The header is fed with its crc field zeroed, followed by the payload.
pub fn calculate_crc(header: &FrameHeader, payload: &[u8]) -> u16 {
    let mut bytes = header.to_bytes();
    bytes[CRC_OFFSET..].fill(0);

    let mut digest = FRAME_CRC.digest();
    digest.update(&bytes);
    digest.update(payload);
    digest.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_ccitt_check_value() {
        assert_eq!(FRAME_CRC.checksum(b"123456789"), 0x31C3);
    }

    #[test]
    fn crc_field_does_not_affect_result() {
        let header = FrameHeader::from_bytes(&[0x0A, 0x00, 0x00, 0x07, 0x00, 0xA0, 0xFF, 0xFF]);
        let zeroed = FrameHeader::from_bytes(&[0x0A, 0x00, 0x00, 0x07, 0x00, 0xA0, 0x00, 0x00]);

        assert_eq!(
            calculate_crc(&header, &[0x07, 0x00]),
            calculate_crc(&zeroed, &[0x07, 0x00])
        );
    }

    #[test]
    fn payload_is_covered() {
        let header = FrameHeader::from_bytes(&[0x0A, 0x00, 0x00, 0x07, 0x00, 0xA0, 0x00, 0x00]);
        assert_ne!(
            calculate_crc(&header, &[0x07, 0x00]),
            calculate_crc(&header, &[0x08, 0x00])
        );
    }
}
