//! Byte-escape codec for the serial link
//!
//! The link reserves 0x7F as an out-of-band control marker. Payload bytes are
//! restricted to `[0, ENCODE_MAX]` and mapped onto the wire alphabet by a
//! branch-free monotonic bijection that skips the reserved value. Both ends
//! must agree on the map exactly, so [`self_test`] runs the whole domain at
//! startup and any mismatch is fatal.

use crate::error::{CodecError, CodecResult};

/// Reserved link control byte; never appears in encoded payload.
pub const RESERVED: u8 = 0x7F;

/// Largest encodable payload byte. Wire values above `encode(ENCODE_MAX)`
/// (other than the reserved byte) are headroom for future link control use.
pub const ENCODE_MAX: u8 = 189;

/// Map a payload byte onto the wire alphabet, skipping the reserved value.
///
/// Out-of-domain input clamps to zero; callers must not rely on that.
#[inline]
pub fn encode(b: u8) -> u8 {
    if b > ENCODE_MAX {
        return 0;
    }
    b + ((b + 1) >> 7)
}

/// Invert [`encode`] for any byte the encoder can produce.
#[inline]
pub fn decode(b: u8) -> u8 {
    b - (b >> 7)
}

/// Decode four wire bytes packed in one word at once.
///
/// Bit-identical to applying [`decode`] to each of the four bytes. Each lane
/// subtracts its own bit 7, so no borrow can cross a lane boundary.
#[inline]
pub fn decode_packed(w: u32) -> u32 {
    w - ((w & 0x8080_8080) >> 7)
}

/// Exhaustive round-trip check over the payload domain.
///
/// Run once at process start; a failure means the two link endpoints would
/// disagree on the byte map and no session may begin.
pub fn self_test() -> CodecResult<()> {
    for value in 0..=ENCODE_MAX {
        let enc = encode(value);
        if enc == RESERVED {
            return Err(CodecError::Reserved { value });
        }
        let got = decode(enc);
        if got != value {
            return Err(CodecError::RoundTrip { value, got });
        }
    }
    Ok(())
}

/// Escape a whole payload buffer in place.
///
/// The current boards populate seven endpoint lanes per byte, so each byte is
/// masked to its low seven bits before escaping. Masked bits correspond to
/// unpopulated lanes and carry no channel data.
pub fn encode_payload(buf: &mut [u8]) {
    for b in buf.iter_mut() {
        *b = encode(*b & 0x7F);
    }
}

/// Unescape a whole buffer in place (scalar path; the device receive path
/// uses [`decode_packed`] on whole words instead).
pub fn decode_payload(buf: &mut [u8]) {
    for b in buf.iter_mut() {
        *b = decode(*b);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_full_domain() {
        for b in 0..=ENCODE_MAX {
            assert_eq!(decode(encode(b)), b, "byte {}", b);
        }
    }

    #[test]
    fn test_reserved_never_produced() {
        for b in 0..=ENCODE_MAX {
            assert_ne!(encode(b), RESERVED, "byte {}", b);
        }
    }

    #[test]
    fn test_encode_is_monotonic_bijection() {
        let mut prev = None;
        for b in 0..=ENCODE_MAX {
            let e = encode(b);
            if let Some(p) = prev {
                assert!(e > p, "encode not strictly increasing at {}", b);
            }
            prev = Some(e);
        }
        // Values below the reserved byte map to themselves, values at or
        // above it shift up by one.
        assert_eq!(encode(0x7E), 0x7E);
        assert_eq!(encode(0x7F), 0x80);
        assert_eq!(encode(ENCODE_MAX), 190);
    }

    #[test]
    fn test_out_of_domain_clamps() {
        assert_eq!(encode(190), 0);
        assert_eq!(encode(0xFF), 0);
    }

    #[test]
    fn test_packed_decode_matches_scalar() {
        // Walk a spread of word patterns including lane-boundary values.
        let words = [
            0x0000_0000u32,
            0x8080_8080,
            0x7F80_007F,
            0xBE00_8001,
            0x1234_5678,
            0xFFFF_FFFF,
            0x8000_0080,
        ];
        for &w in &words {
            let packed = decode_packed(w);
            let bytes = w.to_le_bytes();
            let scalar = u32::from_le_bytes([
                decode(bytes[0]),
                decode(bytes[1]),
                decode(bytes[2]),
                decode(bytes[3]),
            ]);
            assert_eq!(packed, scalar, "word {:#010X}", w);
        }
    }

    #[test]
    fn test_self_test_passes() {
        assert!(self_test().is_ok());
    }

    #[test]
    fn test_payload_round_trip_on_populated_lanes() {
        let mut buf: Vec<u8> = (0u8..=0x7E).collect();
        let original = buf.clone();
        encode_payload(&mut buf);
        assert!(buf.iter().all(|&b| b != RESERVED));
        decode_payload(&mut buf);
        assert_eq!(buf, original);
    }
}
