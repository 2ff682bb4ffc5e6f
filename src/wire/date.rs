//! DATE wire codec: 48 bits of calendar fields packed after a 16-bit year.
//!
//! Layout, high bit first:
//!
//! ```text
//! bits  0..15  year (i16)
//! bits 16..19  month (1..12)
//! bits 20..24  day (1..31)
//! bits 25..29  hour (0..23)
//! bits 30..35  minute (0..59)
//! bits 36..41  second (0..59)
//! bits 42..51  millisecond (0..999)
//! bits 52..57  tz hour offset (signed)
//! bits 58..63  tz minute offset (unsigned)
//! ```

use bytes::{BufMut, BytesMut};

use crate::error::LlsnError;
use crate::stream::ByteSource;
use crate::types::Date;

/// Encodes a date into its eight-byte packed form.
pub fn encode_date(buf: &mut BytesMut, d: &Date) {
    let mut bits: u64 = 0;
    bits |= (d.year as u64 & 0xffff) << 48;
    bits |= u64::from(d.month) << 44;
    bits |= u64::from(d.day) << 39;
    bits |= u64::from(d.hour) << 34;
    bits |= u64::from(d.minute) << 28;
    bits |= u64::from(d.second) << 22;

    // The millisecond field is declared 0..=999 but the layout leaves it 12
    // bits; an out-of-range source value is divided by ten to fit.
    let ms = u64::from(d.millisecond);
    if ms > 4095 {
        bits |= (ms / 10) << 12;
    } else {
        bits |= ms << 12;
    }

    bits |= (d.tz_hour as u64 & 0x3f) << 6;
    bits |= u64::from(d.tz_minute & 0x3f);
    buf.put_u64(bits);
}

/// Decodes the eight-byte packed form.
pub async fn decode_date(src: &mut ByteSource) -> Result<Date, LlsnError> {
    let raw = src.read(8).await?;

    let tz_hour_bits = ((raw[6] & 0x0f) << 2) | (raw[7] >> 6);

    Ok(Date {
        year: i16::from_be_bytes([raw[0], raw[1]]),
        month: raw[2] >> 4,
        day: ((raw[2] & 0x0f) << 1) | (raw[3] >> 7),
        hour: (raw[3] & 0x7f) >> 2,
        minute: ((raw[3] & 0x03) << 4) | (raw[4] >> 4),
        second: ((raw[4] & 0x0f) << 2) | (raw[5] >> 6),
        millisecond: (u16::from(raw[5] & 0x3f) << 4) | u16::from(raw[6] >> 4),
        // Sign-extend the six-bit offset hour.
        tz_hour: ((tz_hour_bits << 2) as i8) >> 2,
        tz_minute: raw[7] & 0x3f,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[tokio::test]
    async fn known_vector() {
        let d = Date {
            year: 2015,
            month: 4,
            day: 15,
            hour: 16,
            minute: 56,
            second: 39,
            millisecond: 678,
            tz_hour: 0,
            tz_minute: 0,
        };
        let mut buf = BytesMut::new();
        encode_date(&mut buf, &d);
        assert_eq!(&buf[..], &[7, 223, 71, 195, 137, 234, 96, 0]);

        let mut src = ByteSource::from_bytes(&buf);
        assert_eq!(decode_date(&mut src).await.unwrap(), d);
    }

    #[tokio::test]
    async fn random_round_trip() {
        let mut rng = rand::thread_rng();
        for _ in 0..20_000 {
            let d = Date {
                year: rng.gen_range(-9999..=9999),
                month: rng.gen_range(1..=12),
                day: rng.gen_range(1..=31),
                hour: rng.gen_range(0..=23),
                minute: rng.gen_range(0..=59),
                second: rng.gen_range(0..=59),
                millisecond: rng.gen_range(0..=999),
                tz_hour: rng.gen_range(-12..=14),
                tz_minute: rng.gen_range(0..=59),
            };
            let mut buf = BytesMut::new();
            encode_date(&mut buf, &d);
            assert_eq!(buf.len(), 8);
            let mut src = ByteSource::from_bytes(&buf);
            assert_eq!(decode_date(&mut src).await.unwrap(), d, "failed for {d}");
        }
    }

    #[tokio::test]
    async fn negative_offset_does_not_smear_into_other_fields() {
        let d = Date {
            year: 1990,
            month: 12,
            day: 31,
            hour: 23,
            minute: 59,
            second: 59,
            millisecond: 999,
            tz_hour: -3,
            tz_minute: 30,
        };
        let mut buf = BytesMut::new();
        encode_date(&mut buf, &d);
        let mut src = ByteSource::from_bytes(&buf);
        assert_eq!(decode_date(&mut src).await.unwrap(), d);
    }

    #[tokio::test]
    async fn oversize_millisecond_is_divided() {
        let d = Date {
            millisecond: 5000,
            month: 1,
            day: 1,
            ..Date::default()
        };
        let mut buf = BytesMut::new();
        encode_date(&mut buf, &d);
        let mut src = ByteSource::from_bytes(&buf);
        assert_eq!(decode_date(&mut src).await.unwrap().millisecond, 500);
    }
}
