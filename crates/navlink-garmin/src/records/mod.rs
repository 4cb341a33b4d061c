//! Record codecs: device record formats to and from the entity model.
//!
//! Every category has a format enum whose variants are the datatypes a
//! device may negotiate for it ([`WaypointFormat::D109`] and so on). The
//! enum is chosen once from the device profile and then passed to every
//! `decode`/`encode` call, so format selection is a plain `match`.
//!
//! Conventions shared by all formats:
//!
//! - integers and floats are little-endian
//! - positions are two `i32` semicircle values, latitude first
//! - times are `u32` seconds since 1989-12-31 00:00:00 UTC, with
//!   `0xFFFFFFFF` meaning "none"
//! - floats of `1.0e25` mean "none"
//! - strings are Latin-1; fixed-width fields are space padded, variable
//!   fields are NUL terminated
//!
//! Decoding is all-or-nothing: a record either decodes completely or yields
//! [`Error::MalformedRecord`](navlink_core::Error::MalformedRecord).

mod almanac;
mod clock;
mod fitness;
mod flight;
mod memory;
mod route;
pub(crate) mod screen;
mod track;
mod waypoint;

pub use almanac::AlmanacFormat;
pub use clock::{decode_satellites, PositionFormat, PvtFormat, TimeFormat};
pub use fitness::{LapFormat, RunFormat};
pub use flight::FlightFormat;
pub use memory::{decode_capacity, write_packets, MemoryFile};
pub use screen::ScreenReader;
pub use route::{RouteHeaderFormat, RouteLinkFormat};
pub use track::{TrackHeaderFormat, TrackPointFormat};
pub use waypoint::{CategoryFormat, ProximityFormat, WaypointFormat};

use std::fmt::{self, Display};

use bytes::{Buf, BufMut, BytesMut};
use chrono::{DateTime, Utc};

use navlink_core::time::{from_device_seconds, to_device_seconds_or_invalid};
use navlink_core::{Error, Position, RadianPosition, Result};

use crate::capability::DataType;

/// Float value meaning "not recorded".
pub const UNKNOWN_FLOAT: f32 = 1.0e25;

/// Decode a Latin-1 byte string.
pub fn latin1_decode(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Encode a string as Latin-1. Characters outside Latin-1 become `?`.
pub fn latin1_encode(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

pub(crate) fn opt_float(v: f32) -> Option<f32> {
    if v == UNKNOWN_FLOAT {
        None
    } else {
        Some(v)
    }
}

/// Non-empty strings only.
pub(crate) fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Narrow an entity value into a byte-wide field, for encoders.
pub(crate) fn narrow_u8(value: u16, field: &str, format: DataType) -> Result<u8> {
    u8::try_from(value).map_err(|_| {
        Error::InvalidParameter(format!("{field} {value} does not fit format {format}"))
    })
}

/// Name of a record layout, for error messages.
#[derive(Debug, Clone, Copy)]
pub(crate) enum FormatName {
    Data(DataType),
    /// Layouts without a datatype number, such as the satellite array.
    Other(&'static str),
}

impl From<DataType> for FormatName {
    fn from(dt: DataType) -> Self {
        FormatName::Data(dt)
    }
}

impl Display for FormatName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatName::Data(dt) => write!(f, "{dt}"),
            FormatName::Other(name) => f.write_str(name),
        }
    }
}

/// Cursor over one record's bytes.
pub(crate) struct RecordReader<'a> {
    format: FormatName,
    buf: &'a [u8],
}

impl<'a> RecordReader<'a> {
    pub fn new(format: impl Into<FormatName>, buf: &'a [u8]) -> Self {
        RecordReader {
            format: format.into(),
            buf,
        }
    }

    fn need(&self, n: usize) -> Result<()> {
        if self.buf.remaining() < n {
            return Err(Error::malformed(
                self.format.to_string(),
                format!("truncated: needed {n} more bytes, {} left", self.buf.remaining()),
            ));
        }
        Ok(())
    }

    /// An out-of-range enumerated field.
    pub fn invalid(&self, field: &str, value: impl Display) -> Error {
        Error::malformed(self.format.to_string(), format!("invalid {field} {value}"))
    }

    pub fn u8(&mut self) -> Result<u8> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    /// A flag byte. Anything but 0 or 1 is out of range.
    pub fn bool(&mut self, field: &str) -> Result<bool> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(self.invalid(field, other)),
        }
    }

    pub fn u16(&mut self) -> Result<u16> {
        self.need(2)?;
        Ok(self.buf.get_u16_le())
    }

    pub fn i16(&mut self) -> Result<i16> {
        self.need(2)?;
        Ok(self.buf.get_i16_le())
    }

    pub fn u32(&mut self) -> Result<u32> {
        self.need(4)?;
        Ok(self.buf.get_u32_le())
    }

    pub fn i32(&mut self) -> Result<i32> {
        self.need(4)?;
        Ok(self.buf.get_i32_le())
    }

    pub fn f32(&mut self) -> Result<f32> {
        self.need(4)?;
        Ok(self.buf.get_f32_le())
    }

    pub fn f64(&mut self) -> Result<f64> {
        self.need(8)?;
        Ok(self.buf.get_f64_le())
    }

    /// A float that may hold the "not recorded" sentinel.
    pub fn opt_f32(&mut self) -> Result<Option<f32>> {
        Ok(opt_float(self.f32()?))
    }

    pub fn bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        self.need(n)?;
        let out = self.buf[..n].to_vec();
        self.buf.advance(n);
        Ok(out)
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.need(n)?;
        self.buf.advance(n);
        Ok(())
    }

    /// Everything not yet consumed.
    pub fn rest(&mut self) -> &'a [u8] {
        std::mem::take(&mut self.buf)
    }

    /// A fixed-width string with trailing spaces and NULs removed.
    pub fn fixed_str(&mut self, width: usize) -> Result<String> {
        let raw = self.bytes(width)?;
        let end = raw
            .iter()
            .rposition(|&b| b != b' ' && b != 0)
            .map_or(0, |i| i + 1);
        Ok(latin1_decode(&raw[..end]))
    }

    pub fn opt_fixed_str(&mut self, width: usize) -> Result<Option<String>> {
        self.fixed_str(width).map(non_empty)
    }

    /// A NUL-terminated string.
    pub fn cstr(&mut self) -> Result<String> {
        let end = self.buf.iter().position(|&b| b == 0).ok_or_else(|| {
            Error::malformed(self.format.to_string(), "unterminated string")
        })?;
        let s = latin1_decode(&self.buf[..end]);
        self.buf.advance(end + 1);
        Ok(s)
    }

    pub fn opt_cstr(&mut self) -> Result<Option<String>> {
        self.cstr().map(non_empty)
    }

    pub fn position(&mut self) -> Result<Position> {
        let lat = self.i32()?;
        let lon = self.i32()?;
        Ok(Position { lat, lon })
    }

    pub fn radians(&mut self) -> Result<RadianPosition> {
        let lat = self.f64()?;
        let lon = self.f64()?;
        Ok(RadianPosition { lat, lon })
    }

    pub fn time(&mut self) -> Result<Option<DateTime<Utc>>> {
        Ok(from_device_seconds(self.u32()?))
    }

    /// Fail unless every byte has been consumed.
    pub fn finish(self) -> Result<()> {
        if self.buf.has_remaining() {
            return Err(Error::malformed(
                self.format.to_string(),
                format!("{} unexpected trailing bytes", self.buf.remaining()),
            ));
        }
        Ok(())
    }
}

/// Builder for one record's bytes.
pub(crate) struct RecordWriter {
    buf: BytesMut,
}

impl RecordWriter {
    pub fn new() -> Self {
        RecordWriter {
            buf: BytesMut::with_capacity(128),
        }
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.buf.put_u8(v);
        self
    }

    pub fn bool(&mut self, v: bool) -> &mut Self {
        self.u8(u8::from(v))
    }

    pub fn u16(&mut self, v: u16) -> &mut Self {
        self.buf.put_u16_le(v);
        self
    }

    pub fn i16(&mut self, v: i16) -> &mut Self {
        self.buf.put_i16_le(v);
        self
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        self.buf.put_u32_le(v);
        self
    }

    pub fn i32(&mut self, v: i32) -> &mut Self {
        self.buf.put_i32_le(v);
        self
    }

    pub fn f32(&mut self, v: f32) -> &mut Self {
        self.buf.put_f32_le(v);
        self
    }

    pub fn f64(&mut self, v: f64) -> &mut Self {
        self.buf.put_f64_le(v);
        self
    }

    pub fn opt_f32(&mut self, v: Option<f32>) -> &mut Self {
        self.f32(v.unwrap_or(UNKNOWN_FLOAT))
    }

    pub fn bytes(&mut self, v: &[u8]) -> &mut Self {
        self.buf.put_slice(v);
        self
    }

    pub fn zeros(&mut self, n: usize) -> &mut Self {
        self.buf.put_bytes(0, n);
        self
    }

    /// A fixed-width field: truncated to `width` and padded with `pad`.
    pub fn fixed_str(&mut self, s: &str, width: usize, pad: u8) -> &mut Self {
        let mut raw = latin1_encode(s);
        raw.truncate(width);
        raw.resize(width, pad);
        self.bytes(&raw)
    }

    /// A NUL-terminated string of at most `max` characters.
    pub fn cstr(&mut self, s: &str, max: usize) -> &mut Self {
        let mut raw = latin1_encode(s);
        raw.truncate(max);
        self.bytes(&raw);
        self.u8(0)
    }

    pub fn position(&mut self, p: &Position) -> &mut Self {
        self.i32(p.lat).i32(p.lon)
    }

    pub fn radians(&mut self, p: &RadianPosition) -> &mut Self {
        self.f64(p.lat).f64(p.lon)
    }

    pub fn time(&mut self, t: Option<&DateTime<Utc>>) -> &mut Self {
        self.u32(to_device_seconds_or_invalid(t))
    }

    pub fn finish(&mut self) -> Vec<u8> {
        self.buf.split().to_vec()
    }
}
