//! Value codec: packing and unpacking field values into register words.
//!
//! Pure, stateless conversion between [`Value`]s and sequences of 16-bit
//! registers at a given word offset. Every kind has an encode and a decode
//! routine and they are exact inverses for all representable bit patterns.
//!
//! # Word order
//!
//! - `U16`: one register, direct value.
//! - `I32` / `F32`: two registers, **little-endian word order** — the
//!   register at the field offset holds the low 16 bits of the 32-bit
//!   pattern, the next register the high 16 bits.
//! - `I64`: four registers, little-endian word order (bits 0–15 first).
//! - `F64`: four registers, **big-endian word order** — the register at the
//!   field offset holds the *most* significant 16 bits of the IEEE-754
//!   pattern. This is the opposite of `I64` and matches deployed device
//!   behavior; `tests` pin it so it cannot be "corrected" accidentally.
//!
//! Bounds handling follows the register image's sentinel policy: encoding
//! into registers beyond the image is dropped (and logged), decoding from
//! them yields sentinel words. The codec itself never panics.

use crate::core::data::Value;
use crate::core::error::CodecError;
use crate::image::RegisterImage;
use crate::schema::DataKind;

/// Encode a value into its field registers at `offset`.
///
/// Touches exactly [`DataKind::word_count`] consecutive registers starting at
/// `offset` and no others. Fails if the value cannot be represented in the
/// field kind; never fails on offsets (out-of-range registers are dropped by
/// the image).
pub fn encode_field(
    image: &mut RegisterImage,
    offset: usize,
    kind: DataKind,
    value: &Value,
) -> Result<(), CodecError> {
    match kind {
        DataKind::U16 => {
            let v = int_value(value, kind)?;
            // accept the full signed-16 .. unsigned-16 window; negative
            // values store their two's-complement word
            if !(i16::MIN as i64..=u16::MAX as i64).contains(&v) {
                return Err(CodecError::OutOfRange {
                    value: v,
                    kind: kind.name(),
                });
            }
            image.set_or_log(offset, v as u16);
        }

        DataKind::I32 => {
            let v = int_value(value, kind)?;
            if !(i32::MIN as i64..=u32::MAX as i64).contains(&v) {
                return Err(CodecError::OutOfRange {
                    value: v,
                    kind: kind.name(),
                });
            }
            put_u32(image, offset, v as u32);
        }

        DataKind::F32 => {
            let bits = (value.as_f64() as f32).to_bits();
            put_u32(image, offset, bits);
        }

        DataKind::I64 => {
            let bits = int_value(value, kind)? as u64;
            for i in 0..4 {
                image.set_or_log(offset + i, (bits >> (16 * i)) as u16);
            }
        }

        DataKind::F64 => {
            // big-endian byte-buffer serialization split into words in
            // address-ascending = significance-descending order
            let bytes = value.as_f64().to_bits().to_be_bytes();
            for i in 0..4 {
                let word = u16::from_be_bytes([bytes[2 * i], bytes[2 * i + 1]]);
                image.set_or_log(offset + i, word);
            }
        }
    }

    Ok(())
}

/// Decode the field registers at `offset` into a value.
pub fn decode_field(image: &RegisterImage, offset: usize, kind: DataKind) -> Value {
    match kind {
        DataKind::U16 => Value::Integer(image.get_or_sentinel(offset) as i64),

        DataKind::I32 => {
            let bits = take_u32(image, offset);
            Value::Integer(bits as i32 as i64)
        }

        DataKind::F32 => {
            let bits = take_u32(image, offset);
            Value::Float(f32::from_bits(bits) as f64)
        }

        DataKind::I64 => {
            let mut bits = 0u64;
            for i in 0..4 {
                bits |= (image.get_or_sentinel(offset + i) as u64) << (16 * i);
            }
            Value::Integer(bits as i64)
        }

        DataKind::F64 => {
            let mut bytes = [0u8; 8];
            for i in 0..4 {
                let word = image.get_or_sentinel(offset + i);
                bytes[2 * i..2 * i + 2].copy_from_slice(&word.to_be_bytes());
            }
            Value::Float(f64::from_bits(u64::from_be_bytes(bytes)))
        }
    }
}

/// Store a 32-bit pattern as two registers, low word first.
fn put_u32(image: &mut RegisterImage, offset: usize, bits: u32) {
    image.set_or_log(offset, bits as u16);
    image.set_or_log(offset + 1, (bits >> 16) as u16);
}

/// Assemble a 32-bit pattern from two registers, low word first.
fn take_u32(image: &RegisterImage, offset: usize) -> u32 {
    let low = image.get_or_sentinel(offset) as u32;
    let high = image.get_or_sentinel(offset + 1) as u32;
    (high << 16) | low
}

/// Integer payload of a value for the integer kinds.
///
/// Finite floats are truncated toward zero; non-finite floats cannot become
/// integers.
fn int_value(value: &Value, kind: DataKind) -> Result<i64, CodecError> {
    value.as_i64().ok_or_else(|| CodecError::NotNumeric {
        value: format!("{:?}", value),
        kind: kind.name(),
    })
}
