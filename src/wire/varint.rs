//! Variable-length integers with nine length classes.
//!
//! The first byte carries a prefix code selecting the class (its count of
//! leading one bits) and the high payload bits; the remaining bytes are
//! big-endian payload:
//!
//! ```text
//! 0.......                                 7 bit number  (1 byte)
//! 10......  [.... 1 byte ....]            14 bit number  (2 bytes)
//! 110.....  [.... 2 bytes ...]            21 bit number  (3 bytes)
//! 1110....  [.... 3 bytes ...]            28 bit number  (4 bytes)
//! 11110...  [.... 4 bytes ...]            35 bit number  (5 bytes)
//! 111110..  [.... 5 bytes ...]            42 bit number  (6 bytes)
//! 1111110.  [.... 6 bytes ...]            49 bit number  (7 bytes)
//! 11111110  [.... 7 bytes ...]            56 bit number  (8 bytes)
//! 11111111  [.... 8 bytes ...]            64 bit number  (9 bytes)
//! ```
//!
//! Signed values store two's-complement payload bits; the sign lives in the
//! bit just below the class prefix for classes 1..=7 and in the top bit of
//! the first payload byte for classes 8 and 9.

use bytes::{BufMut, BytesMut};

use crate::error::LlsnError;
use crate::stream::ByteSource;

/// Encodes an unsigned integer using the smallest class that covers it.
pub fn encode_unumber(buf: &mut BytesMut, value: u64) {
    match value {
        v if v & 0x7f == v => pack(buf, v, 1),
        v if v & 0x3fff == v => pack(buf, (0x2 << 14) | v, 2),
        v if v & 0x1f_ffff == v => pack(buf, (0x6 << 21) | v, 3),
        v if v & 0xfff_ffff == v => pack(buf, (0xe << 28) | v, 4),
        v if v & 0x7_ffff_ffff == v => pack(buf, (0x1e << 35) | v, 5),
        v if v & 0x3ff_ffff_ffff == v => pack(buf, (0x3e << 42) | v, 6),
        v if v & 0x1_ffff_ffff_ffff == v => pack(buf, (0x7e << 49) | v, 7),
        v if v & 0xff_ffff_ffff_ffff == v => pack(buf, v, 8),
        v => pack(buf, v, 9),
    }
}

/// Encodes a signed integer. Class selection is by magnitude; the payload
/// keeps the two's-complement bits so the sign bit lands inside the class
/// payload.
pub fn encode_number(buf: &mut BytesMut, value: i64) {
    let magnitude = value.unsigned_abs();
    let v = value as u64;
    match magnitude {
        m if m & 0x3f == m => pack(buf, v & 0x7f, 1),
        m if m & 0x1fff == m => pack(buf, (0x2 << 14) | (v & 0x3fff), 2),
        m if m & 0x0f_ffff == m => pack(buf, (0x6 << 21) | (v & 0x1f_ffff), 3),
        m if m & 0x7ff_ffff == m => pack(buf, (0xe << 28) | (v & 0xfff_ffff), 4),
        m if m & 0x3_ffff_ffff == m => pack(buf, (0x1e << 35) | (v & 0x7_ffff_ffff), 5),
        m if m & 0x1ff_ffff_ffff == m => pack(buf, (0x3e << 42) | (v & 0x3ff_ffff_ffff), 6),
        m if m & 0xffff_ffff_ffff == m => pack(buf, (0x7e << 49) | (v & 0x1_ffff_ffff_ffff), 7),
        m if m & 0x7f_ffff_ffff_ffff == m => pack(buf, v, 8),
        _ => pack(buf, v, 9),
    }
}

/// Big-endian emit of the low `len` bytes. Classes 8 and 9 carry the class
/// in a dedicated first byte instead of sharing it with payload bits.
fn pack(buf: &mut BytesMut, value: u64, len: usize) {
    match len {
        8 => {
            buf.put_u8(0xfe);
            for i in (0..7).rev() {
                buf.put_u8((value >> (i * 8)) as u8);
            }
        }
        9 => {
            buf.put_u8(0xff);
            buf.put_u64(value);
        }
        _ => {
            for i in (0..len).rev() {
                buf.put_u8((value >> (i * 8)) as u8);
            }
        }
    }
}

/// Decodes an unsigned integer from the source.
pub async fn decode_unumber(src: &mut ByteSource) -> Result<u64, LlsnError> {
    let b0 = src.read_u8().await?;
    let (len, first) = match b0.leading_ones() {
        0 => return Ok(u64::from(b0)),
        1 => (2usize, b0 & 0x3f),
        2 => (3, b0 & 0x1f),
        3 => (4, b0 & 0x0f),
        4 => (5, b0 & 0x07),
        5 => (6, b0 & 0x03),
        6 => (7, b0 & 0x01),
        7 => (8, 0),
        _ => (9, 0),
    };
    Ok(unpack(src, len, first).await?)
}

/// Decodes a signed integer from the source.
pub async fn decode_number(src: &mut ByteSource) -> Result<i64, LlsnError> {
    let b0 = src.read_u8().await?;
    let (len, first, ext): (usize, u8, u64) = match b0.leading_ones() {
        0 => {
            // Complete in the prefix byte.
            return if b0 & 0x40 != 0 {
                Ok((u64::from(b0 | 0x80) | 0xffff_ffff_ffff_ff00) as i64)
            } else {
                Ok(i64::from(b0 & 0x3f))
            };
        }
        1 => signed_class(b0, 2, 0x20, 0x40, 0x1f, 0xffff_ffff_ffff_8000),
        2 => signed_class(b0, 3, 0x10, 0x20, 0x0f, 0xffff_ffff_ffc0_0000),
        3 => signed_class(b0, 4, 0x08, 0x10, 0x07, 0xffff_ffff_e000_0000),
        4 => signed_class(b0, 5, 0x04, 0x08, 0x03, 0xffff_fff0_0000_0000),
        5 => signed_class(b0, 6, 0x02, 0x04, 0x01, 0xffff_f800_0000_0000),
        6 => signed_class(b0, 7, 0x01, 0x02, 0x00, 0xfffc_0000_0000_0000),
        7 => {
            // Sign comes from the top bit of the first payload byte.
            let next = src.peek(1).await?[0];
            let ext = if next & 0x80 != 0 {
                0xff00_0000_0000_0000
            } else {
                0
            };
            (8, 0, ext)
        }
        _ => (9, 0, 0),
    };
    let value = unpack(src, len, first).await?;
    Ok((value | ext) as i64)
}

/// Per-class sign handling for classes 2..=7: if the sign bit (just below
/// the prefix) is set, force it back into the payload and sign-extend,
/// otherwise strip the prefix bits.
fn signed_class(
    b0: u8,
    len: usize,
    sign_bit: u8,
    restore: u8,
    clear: u8,
    ext: u64,
) -> (usize, u8, u64) {
    if b0 & sign_bit != 0 {
        (len, b0 | restore, ext)
    } else {
        (len, b0 & clear, 0)
    }
}

async fn unpack(src: &mut ByteSource, len: usize, first: u8) -> Result<u64, LlsnError> {
    let rest = src.read(len - 1).await?;
    // Classes 8 and 9 carry no payload bits in the first byte.
    let mut value = if len < 8 { u64::from(first) } else { 0 };
    for b in rest.iter() {
        value = (value << 8) | u64::from(*b);
    }
    Ok(value)
}
