//! Self-test frame codec
//!
//! A frame is a length-prefixed, checksum-terminated byte sequence:
//!
//! ```text
//! +----------+----------+---------------------------+----------+
//! | size/256 | size%256 | payload: 0, 1, 2, ... %256 | checksum |
//! +----------+----------+---------------------------+----------+
//!   byte 0     byte 1     size - 3 bytes              1 byte
//! ```
//!
//! The encoded length is always exactly `size`. The checksum is `0xFF`
//! XOR-folded with every index in `0..size - 2`: that range has one more
//! index than the payload carries, so the last folded index is never sent.
//! The checksum depends on `size` only, never on the transmitted payload.
//!
//! This layout is not byte-identical to the legacy `spiraw` frame, which
//! carried `size - 1` payload bytes (`size + 2` bytes in total).
//! Counterpart firmware must expect the layout above.

use alloc::vec::Vec;
use core::fmt;

use crate::error::{Error, Result};

/// Smallest frame the self-test generates
pub const MIN_FRAME_SIZE: usize = 10;

/// Largest frame the self-test generates
pub const MAX_FRAME_SIZE: usize = 1009;

/// Extra bytes read back after a frame to absorb adapter pipeline latency
pub const READBACK_MARGIN: usize = 60;

/// Length of the size prefix
pub const PREFIX_LEN: usize = 2;

/// Initial value of the checksum fold
const CHECKSUM_SEED: u8 = 0xFF;

/// An encoded self-test frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Vec<u8>,
}

impl Frame {
    /// Build the frame for `size`
    ///
    /// Fails with [`Error::InvalidFrameSize`] outside
    /// `MIN_FRAME_SIZE..=MAX_FRAME_SIZE`.
    pub fn new(size: usize) -> Result<Self> {
        if !(MIN_FRAME_SIZE..=MAX_FRAME_SIZE).contains(&size) {
            return Err(Error::InvalidFrameSize(size));
        }

        let mut bytes = Vec::with_capacity(size);
        bytes.extend_from_slice(&encode_prefix(size));
        bytes.extend((0..size - PREFIX_LEN - 1).map(|i| (i % 256) as u8));
        bytes.push(checksum(size));
        debug_assert_eq!(bytes.len(), size);

        Ok(Self { bytes })
    }

    /// Encoded length (equal to the size in the prefix)
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// The two prefix bytes
    pub fn prefix(&self) -> [u8; PREFIX_LEN] {
        [self.bytes[0], self.bytes[1]]
    }

    /// Payload between prefix and checksum
    pub fn payload(&self) -> &[u8] {
        &self.bytes[PREFIX_LEN..self.bytes.len() - 1]
    }

    /// Trailing checksum byte
    pub fn checksum(&self) -> u8 {
        self.bytes[self.bytes.len() - 1]
    }

    /// Whole encoded frame
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Bytes that should be clocked in to capture the echoed frame
    pub fn readback_len(&self) -> usize {
        self.size() + READBACK_MARGIN
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Encode a frame size as its big-endian two-byte prefix
pub fn encode_prefix(size: usize) -> [u8; PREFIX_LEN] {
    [(size / 256) as u8, (size % 256) as u8]
}

/// Decode a two-byte size prefix
pub fn decode_prefix(prefix: [u8; PREFIX_LEN]) -> usize {
    prefix[0] as usize * 256 + prefix[1] as usize
}

/// Checksum byte for a frame of `size` bytes
pub fn checksum(size: usize) -> u8 {
    (0..size.saturating_sub(PREFIX_LEN)).fold(CHECKSUM_SEED, |acc, i| acc ^ (i % 256) as u8)
}

/// Offset of the first occurrence of `prefix` in `haystack`
pub fn locate(haystack: &[u8], prefix: &[u8; PREFIX_LEN]) -> Option<usize> {
    haystack.windows(PREFIX_LEN).position(|w| w == prefix)
}

/// Hex formatter for diagnostics: `0a 0b 0c`
#[derive(Clone, Copy)]
pub struct HexBytes<'a>(pub &'a [u8]);

impl fmt::Display for HexBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for HexBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;

    #[test]
    fn test_prefix_round_trip() {
        for size in MIN_FRAME_SIZE..=MAX_FRAME_SIZE {
            let frame = Frame::new(size).unwrap();
            let [hi, lo] = frame.prefix();
            assert_eq!(hi as usize * 256 + lo as usize, size);
            assert_eq!(decode_prefix(frame.prefix()), size);
            assert_eq!(frame.size(), size);
        }
    }

    #[test]
    fn test_minimum_frame_layout() {
        let frame = Frame::new(10).unwrap();
        assert_eq!(
            frame.as_bytes(),
            &[0x00, 0x0A, 0, 1, 2, 3, 4, 5, 6, 0xFF][..]
        );
        assert_eq!(frame.payload(), &[0, 1, 2, 3, 4, 5, 6][..]);
    }

    #[test]
    fn test_checksum_folds_one_index_past_payload() {
        let frame = Frame::new(20).unwrap();
        let sent = frame.payload().iter().fold(0xFFu8, |acc, b| acc ^ b);
        let last_index = (frame.payload().len() % 256) as u8;
        assert_eq!(frame.checksum(), sent ^ last_index);
        assert_eq!(frame.as_bytes().len(), 20);
    }

    #[test]
    fn test_checksum_of_size_10() {
        let expected = (0u8..=7).fold(0xFF, |acc, i| acc ^ i);
        assert_eq!(checksum(10), expected);
        assert_eq!(Frame::new(10).unwrap().checksum(), expected);
    }

    #[test]
    fn test_checksum_is_function_of_size() {
        for size in [10, 11, 255, 256, 257, 500, 1009] {
            let a = Frame::new(size).unwrap();
            let b = Frame::new(size).unwrap();
            assert_eq!(a.checksum(), b.checksum());
            assert_eq!(a.checksum(), checksum(size));
        }
    }

    #[test]
    fn test_payload_wraps_at_256() {
        let frame = Frame::new(600).unwrap();
        let payload = frame.payload();
        assert_eq!(payload.len(), 597);
        assert_eq!(payload[255], 255);
        assert_eq!(payload[256], 0);
        assert_eq!(payload[300], 44);
    }

    #[test]
    fn test_size_out_of_range() {
        assert_eq!(Frame::new(9), Err(Error::InvalidFrameSize(9)));
        assert_eq!(Frame::new(1010), Err(Error::InvalidFrameSize(1010)));
        assert_eq!(Frame::new(0), Err(Error::InvalidFrameSize(0)));
    }

    #[test]
    fn test_locate_prefix() {
        let frame = Frame::new(300).unwrap();
        let mut readback = alloc::vec![0xFFu8; 5];
        readback.extend_from_slice(frame.as_bytes());
        assert_eq!(locate(&readback, &frame.prefix()), Some(5));
        assert_eq!(locate(&[0xFF; 16], &frame.prefix()), None);
        assert_eq!(locate(&[0x01], &frame.prefix()), None);
    }

    #[test]
    fn test_hex_bytes() {
        assert_eq!(format!("{}", HexBytes(&[0x00, 0x0A, 0xFF])), "00 0a ff");
        assert_eq!(format!("{}", HexBytes(&[])), "");
    }
}
