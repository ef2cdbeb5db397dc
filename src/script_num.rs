//! Script number codec
//!
//! Numbers on the stack are little-endian sign-magnitude byte strings: the
//! top bit of the last byte carries the sign and the empty string is zero.

use thiserror::Error;

use crate::error::ScriptError;

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum ScriptNumError {
    #[error("script number of {len} bytes exceeds {max} bytes")]
    Overflow { len: usize, max: usize },
    #[error("non-minimally encoded script number")]
    NonMinimal,
}

impl From<ScriptNumError> for ScriptError {
    fn from(_: ScriptNumError) -> Self {
        ScriptError::UnknownError
    }
}

/// Minimal encoding of `value`.
pub fn encode(value: i64) -> Vec<u8> {
    if value == 0 {
        return Vec::new();
    }

    let negative = value < 0;
    let mut abs_value = value.unsigned_abs();
    let mut result = Vec::with_capacity(9);
    while abs_value > 0 {
        result.push((abs_value & 0xff) as u8);
        abs_value >>= 8;
    }

    // The last byte must leave its top bit free for the sign.
    let last = result.len() - 1;
    if result[last] & 0x80 != 0 {
        result.push(if negative { 0x80 } else { 0x00 });
    } else if negative {
        result[last] |= 0x80;
    }
    result
}

/// Decodes at most `max_size` bytes, optionally insisting on the minimal form.
pub fn decode(bytes: &[u8], require_minimal: bool, max_size: usize) -> Result<i64, ScriptNumError> {
    if bytes.len() > max_size {
        return Err(ScriptNumError::Overflow { len: bytes.len(), max: max_size });
    }
    if require_minimal && !is_minimally_encoded(bytes) {
        return Err(ScriptNumError::NonMinimal);
    }
    Ok(decode_unchecked(bytes))
}

/// True unless the last byte is a redundant sign/padding byte.
pub fn is_minimally_encoded(bytes: &[u8]) -> bool {
    match bytes.split_last() {
        None => true,
        Some((&last, rest)) => {
            if last & 0x7f != 0 {
                return true;
            }
            // 0x00 or 0x80 alone is a non-minimal zero; otherwise the padding
            // is only needed when the previous byte has its top bit set.
            matches!(rest.last(), Some(&prev) if prev & 0x80 != 0)
        }
    }
}

fn decode_unchecked(bytes: &[u8]) -> i64 {
    let Some(&last) = bytes.last() else {
        return 0;
    };

    let mut result: i64 = 0;
    for (i, &byte) in bytes.iter().enumerate() {
        result |= (byte as i64) << (8 * i);
    }

    if last & 0x80 != 0 {
        -(result & !(0x80i64 << (8 * (bytes.len() - 1))))
    } else {
        result
    }
}

/// Boolean interpretation of a stack element: false for any encoding of zero,
/// including negative zero.
pub fn cast_to_bool(data: &[u8]) -> bool {
    for (i, &byte) in data.iter().enumerate() {
        if byte != 0 {
            return !(i == data.len() - 1 && byte == 0x80);
        }
    }
    false
}

/// Stack encoding of a boolean result.
pub fn encode_bool(value: bool) -> Vec<u8> {
    if value {
        vec![1]
    } else {
        Vec::new()
    }
}
