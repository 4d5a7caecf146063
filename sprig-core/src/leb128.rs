//! LEB128 variable-length integer codec.
//!
//! Every integer field of the binary module goes through these
//! encoders: section ids and sizes, entry counts, type and function
//! indices, local slots, and `i32.const` immediates.

use crate::error::CoreError;

const CONTINUATION: u8 = 0x80;
const PAYLOAD: u8 = 0x7f;
const SIGN: u8 = 0x40;

/// Append the unsigned LEB128 encoding of `value` to `sink`.
pub fn write_unsigned(sink: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value as u8) & PAYLOAD;
        value >>= 7;
        if value == 0 {
            sink.push(byte);
            return;
        }
        sink.push(byte | CONTINUATION);
    }
}

/// Append the signed LEB128 encoding of `value` to `sink`.
///
/// Emission stops as soon as the remaining bits are pure sign extension
/// of the sign bit carried by the byte just written, which keeps the
/// output at its minimal length.
pub fn write_signed(sink: &mut Vec<u8>, mut value: i64) {
    loop {
        let byte = (value as u8) & PAYLOAD;
        value >>= 7;
        let sign_clear = byte & SIGN == 0;
        if (value == 0 && sign_clear) || (value == -1 && !sign_clear) {
            sink.push(byte);
            return;
        }
        sink.push(byte | CONTINUATION);
    }
}

pub fn encode_unsigned(value: u64) -> Vec<u8> {
    let mut sink = Vec::new();
    write_unsigned(&mut sink, value);
    sink
}

pub fn encode_signed(value: i64) -> Vec<u8> {
    let mut sink = Vec::new();
    write_signed(&mut sink, value);
    sink
}

/// Decode an unsigned value from the front of `bytes`.
///
/// Returns the value and the number of bytes consumed.
pub fn read_unsigned(bytes: &[u8]) -> Result<(u64, usize), CoreError> {
    let mut result = 0u64;
    let mut shift = 0u32;
    for (index, &byte) in bytes.iter().enumerate() {
        if shift == 63 {
            // Only the lowest payload bit still fits in a u64.
            if byte & !1 != 0 {
                return Err(CoreError::MalformedLeb128(index));
            }
            result |= u64::from(byte) << shift;
            return Ok((result, index + 1));
        }
        result |= u64::from(byte & PAYLOAD) << shift;
        if byte & CONTINUATION == 0 {
            return Ok((result, index + 1));
        }
        shift += 7;
    }
    Err(CoreError::MalformedLeb128(bytes.len()))
}

/// Decode a signed value from the front of `bytes`.
///
/// Returns the value and the number of bytes consumed.
pub fn read_signed(bytes: &[u8]) -> Result<(i64, usize), CoreError> {
    let mut result = 0i64;
    let mut shift = 0u32;
    for (index, &byte) in bytes.iter().enumerate() {
        if shift == 63 {
            // Tenth byte: bit 0 is the sign bit, the rest must extend it.
            let payload = byte & PAYLOAD;
            if byte & CONTINUATION != 0 || (payload != 0 && payload != PAYLOAD) {
                return Err(CoreError::MalformedLeb128(index));
            }
            result |= i64::from(payload) << shift;
            return Ok((result, index + 1));
        }
        result |= i64::from(byte & PAYLOAD) << shift;
        shift += 7;
        if byte & CONTINUATION == 0 {
            if byte & SIGN != 0 {
                result |= -1i64 << shift;
            }
            return Ok((result, index + 1));
        }
    }
    Err(CoreError::MalformedLeb128(bytes.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use wasm_encoder::Encode;

    fn minimal_unsigned_len(value: u64) -> usize {
        let bits = (64 - value.leading_zeros()).max(1) as usize;
        bits.div_ceil(7)
    }

    fn minimal_signed_len(value: i64) -> usize {
        let redundant = if value < 0 {
            value.leading_ones()
        } else {
            value.leading_zeros()
        };
        // Magnitude bits plus one sign bit.
        let bits = (64 - redundant + 1) as usize;
        bits.div_ceil(7)
    }

    #[test]
    fn encodes_known_unsigned_values() {
        assert_eq!(encode_unsigned(0), vec![0x00]);
        assert_eq!(encode_unsigned(127), vec![0x7f]);
        assert_eq!(encode_unsigned(128), vec![0x80, 0x01]);
        assert_eq!(encode_unsigned(624_485), vec![0xe5, 0x8e, 0x26]);
        assert_eq!(encode_unsigned(u64::MAX).len(), 10);
    }

    #[test]
    fn encodes_known_signed_values() {
        assert_eq!(encode_signed(0), vec![0x00]);
        assert_eq!(encode_signed(-1), vec![0x7f]);
        assert_eq!(encode_signed(63), vec![0x3f]);
        assert_eq!(encode_signed(64), vec![0xc0, 0x00]);
        assert_eq!(encode_signed(-64), vec![0x40]);
        assert_eq!(encode_signed(-65), vec![0xbf, 0x7f]);
        assert_eq!(encode_signed(-123_456), vec![0xc0, 0xbb, 0x78]);
        assert_eq!(encode_signed(i64::MIN).len(), 10);
        assert_eq!(encode_signed(i64::MAX).len(), 10);
    }

    #[test]
    fn encodes_module_type_codes() {
        // i32, func, and the empty block type.
        assert_eq!(encode_signed(-0x01), vec![0x7f]);
        assert_eq!(encode_signed(-0x20), vec![0x60]);
        assert_eq!(encode_signed(-0x40), vec![0x40]);
    }

    #[test]
    fn rejects_truncated_input() {
        assert_eq!(read_unsigned(&[0x80, 0x80]), Err(CoreError::MalformedLeb128(2)));
        assert_eq!(read_signed(&[]), Err(CoreError::MalformedLeb128(0)));
    }

    #[test]
    fn rejects_overlong_input() {
        let mut bytes = vec![0xff; 9];
        bytes.push(0x02);
        assert_eq!(read_unsigned(&bytes), Err(CoreError::MalformedLeb128(9)));

        let mut bytes = vec![0x80; 9];
        bytes.push(0x3f);
        assert_eq!(read_signed(&bytes), Err(CoreError::MalformedLeb128(9)));
    }

    #[test]
    fn reports_consumed_length() {
        let bytes = [0xe5, 0x8e, 0x26, 0xff];
        assert_eq!(read_unsigned(&bytes), Ok((624_485, 3)));
    }

    proptest! {
        #[test]
        fn unsigned_round_trips_at_minimal_length(value in any::<u64>()) {
            let bytes = encode_unsigned(value);
            prop_assert_eq!(bytes.len(), minimal_unsigned_len(value));
            prop_assert_eq!(read_unsigned(&bytes), Ok((value, bytes.len())));
        }

        #[test]
        fn signed_round_trips_at_minimal_length(value in any::<i64>()) {
            let bytes = encode_signed(value);
            prop_assert_eq!(bytes.len(), minimal_signed_len(value));
            prop_assert_eq!(read_signed(&bytes), Ok((value, bytes.len())));
        }

        #[test]
        fn matches_wasm_encoder_for_32_bit_values(unsigned in any::<u32>(), signed in any::<i32>()) {
            let mut expected = Vec::new();
            unsigned.encode(&mut expected);
            prop_assert_eq!(encode_unsigned(u64::from(unsigned)), expected);

            let mut expected = Vec::new();
            signed.encode(&mut expected);
            prop_assert_eq!(encode_signed(i64::from(signed)), expected);
        }

        #[test]
        fn matches_wasm_encoder_for_64_bit_signed(value in any::<i64>()) {
            let mut expected = Vec::new();
            value.encode(&mut expected);
            prop_assert_eq!(encode_signed(value), expected);
        }
    }

    #[test]
    fn round_trips_extremes() {
        for value in [0, 1, u64::from(u32::MAX), u64::MAX] {
            let bytes = encode_unsigned(value);
            assert_eq!(read_unsigned(&bytes), Ok((value, bytes.len())));
        }
        for value in [0, -1, i64::from(i32::MIN), i64::MIN, i64::MAX] {
            let bytes = encode_signed(value);
            assert_eq!(read_signed(&bytes), Ok((value, bytes.len())));
        }
    }
}
