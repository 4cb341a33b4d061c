//! Conversions between device time representations and `chrono`.
//!
//! Devices count time in seconds since 1989-12-31 00:00:00 UTC. A value of
//! `0xFFFFFFFF` means "no time recorded". The clock record ([`DeviceTime`])
//! stores a broken-down calendar date instead.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Timelike, Utc};

use crate::types::{DeviceTime, FixType, Pvt};

/// Unix timestamp of the device epoch, 1989-12-31 00:00:00 UTC.
pub const DEVICE_EPOCH_UNIX: i64 = 631_065_600;

/// Raw timestamp value meaning "no time recorded".
pub const INVALID_TIMESTAMP: u32 = 0xFFFF_FFFF;

/// Largest time of week a fix can carry, with room for a week rollover.
const MAX_TIME_OF_WEEK: f64 = 2.0 * 604_800.0;

/// Convert a raw device timestamp to UTC. Returns `None` for the invalid
/// sentinel.
pub fn from_device_seconds(secs: u32) -> Option<DateTime<Utc>> {
    if secs == INVALID_TIMESTAMP {
        return None;
    }
    DateTime::<Utc>::from_timestamp(DEVICE_EPOCH_UNIX + i64::from(secs), 0)
}

/// Convert UTC to a raw device timestamp. Sub-second precision is dropped.
///
/// Returns `None` when the instant is before the device epoch or too far in
/// the future to be represented.
pub fn to_device_seconds(time: &DateTime<Utc>) -> Option<u32> {
    let secs = time.timestamp() - DEVICE_EPOCH_UNIX;
    u32::try_from(secs).ok().filter(|&s| s != INVALID_TIMESTAMP)
}

/// Encode an optional timestamp, using the sentinel for `None`.
pub fn to_device_seconds_or_invalid(time: Option<&DateTime<Utc>>) -> u32 {
    time.and_then(to_device_seconds).unwrap_or(INVALID_TIMESTAMP)
}

impl DeviceTime {
    /// Convert to UTC. Returns `None` if the fields do not form a valid
    /// calendar date and time.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        let date = NaiveDate::from_ymd_opt(
            i32::from(self.year),
            u32::from(self.month),
            u32::from(self.day),
        )?;
        let naive = date.and_hms_opt(
            u32::from(self.hour),
            u32::from(self.minute),
            u32::from(self.second),
        )?;
        Some(Utc.from_utc_datetime(&naive))
    }

    /// Break a UTC instant down into device clock fields.
    ///
    /// Years outside `0..=65535` are clamped; devices cannot represent them.
    pub fn from_datetime(time: &DateTime<Utc>) -> Self {
        DeviceTime {
            year: u16::try_from(time.year().max(0)).unwrap_or(u16::MAX),
            month: time.month() as u8,
            day: time.day() as u8,
            hour: time.hour() as u16,
            minute: time.minute() as u8,
            second: time.second() as u8,
        }
    }
}

impl Pvt {
    /// Interpret the raw fix code.
    pub fn fix_type(&self) -> FixType {
        match self.fix {
            0 => FixType::Unusable,
            2 => FixType::TwoD,
            3 => FixType::ThreeD,
            4 => FixType::TwoDDifferential,
            5 => FixType::ThreeDDifferential,
            _ => FixType::Invalid,
        }
    }

    /// UTC time of this fix: epoch + week days + time of week - leap seconds.
    ///
    /// Returns `None` when `tow` is not finite or the sum leaves the range
    /// `chrono` can represent.
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        if !self.tow.is_finite() || self.tow < 0.0 || self.tow > MAX_TIME_OF_WEEK {
            return None;
        }
        let whole = self.tow.floor();
        let nanos = (((self.tow - whole) * 1e9) as u32).min(999_999_999);
        let secs = i64::from(self.week_number_days)
            .checked_mul(86_400)?
            .checked_add(DEVICE_EPOCH_UNIX)?
            .checked_add(whole as i64)?
            .checked_sub(i64::from(self.leap_seconds))?;
        DateTime::<Utc>::from_timestamp(secs, nanos)
    }

    /// Altitude above mean sea level (m).
    pub fn msl_altitude(&self) -> f32 {
        self.alt + self.msl_height
    }
}
