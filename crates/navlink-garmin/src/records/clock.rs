//! Clock, position and PVT formats, plus the satellite array that rides
//! along with the PVT stream.

use navlink_core::{Category, DeviceTime, Error, Pvt, RadianPosition, Result, Satellite};

use super::{FormatName, RecordReader, RecordWriter};
use crate::capability::DataType;

const SATELLITE_LEN: usize = 7;

/// Date and time record formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeFormat {
    D600,
}

impl TimeFormat {
    pub fn from_datatype(datatype: DataType) -> Result<Self> {
        match datatype.0 {
            600 => Ok(Self::D600),
            n => Err(Error::UnsupportedFormat {
                category: Category::Time,
                datatype: n,
            }),
        }
    }

    pub fn datatype(self) -> DataType {
        DataType(600)
    }

    pub fn decode(self, data: &[u8]) -> Result<DeviceTime> {
        let mut r = RecordReader::new(self.datatype(), data);
        let month = r.u8()?;
        let day = r.u8()?;
        let year = r.u16()?;
        let hour = r.u16()?;
        let minute = r.u8()?;
        let second = r.u8()?;
        if !(1..=12).contains(&month) {
            return Err(r.invalid("month", month));
        }
        if !(1..=31).contains(&day) {
            return Err(r.invalid("day", day));
        }
        if hour > 23 {
            return Err(r.invalid("hour", hour));
        }
        if minute > 59 {
            return Err(r.invalid("minute", minute));
        }
        if second > 59 {
            return Err(r.invalid("second", second));
        }
        r.finish()?;
        Ok(DeviceTime {
            year,
            month,
            day,
            hour,
            minute,
            second,
        })
    }

    pub fn encode(self, time: &DeviceTime) -> Vec<u8> {
        RecordWriter::new()
            .u8(time.month)
            .u8(time.day)
            .u16(time.year)
            .u16(time.hour)
            .u8(time.minute)
            .u8(time.second)
            .finish()
    }
}

/// Position record formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PositionFormat {
    /// Latitude and longitude in radians.
    D700,
}

impl PositionFormat {
    pub fn from_datatype(datatype: DataType) -> Result<Self> {
        match datatype.0 {
            700 => Ok(Self::D700),
            n => Err(Error::UnsupportedFormat {
                category: Category::Position,
                datatype: n,
            }),
        }
    }

    pub fn datatype(self) -> DataType {
        DataType(700)
    }

    pub fn decode(self, data: &[u8]) -> Result<RadianPosition> {
        let mut r = RecordReader::new(self.datatype(), data);
        let position = r.radians()?;
        r.finish()?;
        Ok(position)
    }

    pub fn encode(self, position: &RadianPosition) -> Vec<u8> {
        RecordWriter::new().radians(position).finish()
    }
}

/// PVT record formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PvtFormat {
    D800,
}

impl PvtFormat {
    pub fn from_datatype(datatype: DataType) -> Result<Self> {
        match datatype.0 {
            800 => Ok(Self::D800),
            n => Err(Error::UnsupportedFormat {
                category: Category::Pvt,
                datatype: n,
            }),
        }
    }

    pub fn datatype(self) -> DataType {
        DataType(800)
    }

    pub fn decode(self, data: &[u8]) -> Result<Pvt> {
        let mut r = RecordReader::new(self.datatype(), data);
        let pvt = Pvt {
            alt: r.f32()?,
            epe: r.f32()?,
            eph: r.f32()?,
            epv: r.f32()?,
            fix: r.u16()?,
            tow: r.f64()?,
            position: r.radians()?,
            east: r.f32()?,
            north: r.f32()?,
            up: r.f32()?,
            msl_height: r.f32()?,
            leap_seconds: r.i16()?,
            week_number_days: r.u32()?,
        };
        r.finish()?;
        Ok(pvt)
    }

    pub fn encode(self, pvt: &Pvt) -> Vec<u8> {
        RecordWriter::new()
            .f32(pvt.alt)
            .f32(pvt.epe)
            .f32(pvt.eph)
            .f32(pvt.epv)
            .u16(pvt.fix)
            .f64(pvt.tow)
            .radians(&pvt.position)
            .f32(pvt.east)
            .f32(pvt.north)
            .f32(pvt.up)
            .f32(pvt.msl_height)
            .i16(pvt.leap_seconds)
            .u32(pvt.week_number_days)
            .finish()
    }
}

/// Decode a satellite data packet: a run of 7-byte entries, one per
/// receiver channel.
pub fn decode_satellites(data: &[u8]) -> Result<Vec<Satellite>> {
    let mut r = RecordReader::new(FormatName::Other("satellite"), data);
    if data.len() % SATELLITE_LEN != 0 {
        return Err(r.invalid("array length", data.len()));
    }
    let mut out = Vec::with_capacity(data.len() / SATELLITE_LEN);
    for _ in 0..data.len() / SATELLITE_LEN {
        out.push(Satellite {
            svid: r.u8()?,
            snr: r.u16()?,
            elevation: r.u8()?,
            azimuth: r.u16()?,
            status: r.u8()?,
        });
    }
    r.finish()?;
    Ok(out)
}
