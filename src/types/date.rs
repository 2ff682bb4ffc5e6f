//! Calendar timestamp carried by DATE values.

/// A calendar timestamp with millisecond precision and a fixed UTC offset.
///
/// This mirrors the wire layout: the fields are stored as written, without
/// conversion to an epoch. The offset hour is signed, the offset minute is
/// unsigned (an offset of -03:30 is `tz_hour: -3, tz_minute: 30`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Date {
    pub year: i16,
    /// 1..=12
    pub month: u8,
    /// 1..=31
    pub day: u8,
    /// 0..=23
    pub hour: u8,
    /// 0..=59
    pub minute: u8,
    /// 0..=59
    pub second: u8,
    /// 0..=999
    pub millisecond: u16,
    /// Signed UTC offset hours, -32..=31.
    pub tz_hour: i8,
    /// Unsigned UTC offset minutes, 0..=59.
    pub tz_minute: u8,
}

impl std::fmt::Display for Date {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}{:+03}:{:02}",
            self.year,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
            self.millisecond,
            self.tz_hour,
            self.tz_minute,
        )
    }
}
