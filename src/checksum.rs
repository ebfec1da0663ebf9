use std::fmt::{Debug, Formatter};

use crc::Crc;

const CRC32: Crc<u32> = Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);

/// CRC-32 checksum over a frame's integrity region, i.e. everything after the checksum
///  field itself. This is a detection-only mechanism: any mismatch means "message wrong",
///  and it is up to the caller to drop the frame or answer with a repeated acknowledgement.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct Checksum(pub u32);

impl Debug for Checksum {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:08x?}", self.0)
    }
}

impl Checksum {
    pub fn of(region: &[u8]) -> Checksum {
        let mut digest = CRC32.digest();
        digest.update(region);
        Checksum(digest.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::check_value(b"123456789".as_slice(), 0xCBF43926)]
    #[case::empty(b"".as_slice(), 0)]
    fn test_well_known_values(#[case] input: &[u8], #[case] expected: u32) {
        assert_eq!(Checksum::of(input), Checksum(expected));
    }

    #[rstest]
    #[case::last_byte(b"abcdef".as_slice(), b"abcdeg".as_slice())]
    #[case::first_byte(b"abcdef".as_slice(), b"bbcdef".as_slice())]
    #[case::length(b"abcdef".as_slice(), b"abcde".as_slice())]
    fn test_differing_input(#[case] a: &[u8], #[case] b: &[u8]) {
        assert_ne!(Checksum::of(a), Checksum::of(b));
    }

    #[test]
    fn test_debug_format() {
        assert_eq!(format!("{:?}", Checksum(0x1a2b3c4d)), "1a2b3c4d");
    }
}
