//! FLOAT wire codec: power-of-ten exponent plus signed VarInt mantissa.

use bytes::{BufMut, BytesMut};

use super::varint;
use crate::error::LlsnError;
use crate::stream::ByteSource;

/// Exponent search cap. Beyond fifteen decimal digits an f64 carries no
/// further precision, and values that never scale to an integer (for
/// example 0.1 + 0.2) would otherwise loop on rounding noise.
const MAX_POWER: u8 = 15;

/// Encodes a float as the smallest power of ten `p` such that `value * 10^p`
/// is integral, followed by that integer as a signed VarInt.
pub fn encode_float(buf: &mut BytesMut, value: f64) {
    let mut power: u8 = 0;
    let mut scaled = value;
    while power < MAX_POWER && scaled.fract() != 0.0 {
        power += 1;
        scaled = value * 10f64.powi(i32::from(power));
    }
    buf.put_u8(power);
    varint::encode_number(buf, scaled as i64);
}

/// Decodes a float: `mantissa / 10^power`.
pub async fn decode_float(src: &mut ByteSource) -> Result<f64, LlsnError> {
    let power = src.read_u8().await?;
    let mantissa = varint::decode_number(src).await?;
    Ok(mantissa as f64 / 10f64.powi(i32::from(power)))
}
