//! Almanac formats.
//!
//! D500 and D501 records carry no satellite id; the device sends one record
//! per satellite in id order and the session fills `svid` in from the
//! record's position. D550 and D551 carry the id explicitly.

use navlink_core::{Almanac, Category, Error, Result};

use super::{RecordReader, RecordWriter};
use crate::capability::DataType;

/// Almanac record formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlmanacFormat {
    D500,
    /// D500 plus satellite health.
    D501,
    /// Satellite id plus D500.
    D550,
    /// Satellite id plus D501.
    D551,
}

impl AlmanacFormat {
    pub fn from_datatype(datatype: DataType) -> Result<Self> {
        match datatype.0 {
            500 => Ok(Self::D500),
            501 => Ok(Self::D501),
            550 => Ok(Self::D550),
            551 => Ok(Self::D551),
            n => Err(Error::UnsupportedFormat {
                category: Category::Almanac,
                datatype: n,
            }),
        }
    }

    pub fn datatype(self) -> DataType {
        DataType(match self {
            Self::D500 => 500,
            Self::D501 => 501,
            Self::D550 => 550,
            Self::D551 => 551,
        })
    }

    /// Whether records carry their own satellite id.
    pub fn has_svid(self) -> bool {
        matches!(self, Self::D550 | Self::D551)
    }

    fn has_health(self) -> bool {
        matches!(self, Self::D501 | Self::D551)
    }

    pub fn decode(self, data: &[u8]) -> Result<Almanac> {
        let mut r = RecordReader::new(self.datatype(), data);
        let svid = if self.has_svid() {
            let svid = r.u8()?;
            if svid > 31 {
                return Err(r.invalid("satellite id", svid));
            }
            Some(svid)
        } else {
            None
        };
        let mut alm = Almanac {
            svid,
            week_number: r.i16()?,
            toa: r.f32()?,
            af0: r.f32()?,
            af1: r.f32()?,
            e: r.f32()?,
            sqrta: r.f32()?,
            m0: r.f32()?,
            w: r.f32()?,
            omg0: r.f32()?,
            odot: r.f32()?,
            i: r.f32()?,
            health: None,
        };
        if self.has_health() {
            alm.health = Some(r.u8()?);
        }
        r.finish()?;
        Ok(alm)
    }

    pub fn encode(self, alm: &Almanac) -> Vec<u8> {
        let mut w = RecordWriter::new();
        if self.has_svid() {
            w.u8(alm.svid.unwrap_or(0));
        }
        w.i16(alm.week_number)
            .f32(alm.toa)
            .f32(alm.af0)
            .f32(alm.af1)
            .f32(alm.e)
            .f32(alm.sqrta)
            .f32(alm.m0)
            .f32(alm.w)
            .f32(alm.omg0)
            .f32(alm.odot)
            .f32(alm.i);
        if self.has_health() {
            w.u8(alm.health.unwrap_or(0));
        }
        w.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Almanac {
        Almanac {
            svid: None,
            week_number: 1042,
            toa: 405_504.0,
            af0: 1.5e-5,
            af1: 0.0,
            e: 0.004,
            sqrta: 5153.6,
            m0: 1.2,
            w: -1.7,
            omg0: 2.9,
            odot: -8.0e-9,
            i: 0.96,
            health: None,
        }
    }

    #[test]
    fn sizes() {
        let alm = sample();
        assert_eq!(AlmanacFormat::D500.encode(&alm).len(), 42);
        assert_eq!(AlmanacFormat::D501.encode(&alm).len(), 43);
        assert_eq!(AlmanacFormat::D550.encode(&alm).len(), 43);
        assert_eq!(AlmanacFormat::D551.encode(&alm).len(), 44);
    }

    #[test]
    fn d551_round_trip() {
        let alm = Almanac {
            svid: Some(12),
            health: Some(0),
            ..sample()
        };
        let bytes = AlmanacFormat::D551.encode(&alm);
        assert_eq!(AlmanacFormat::D551.decode(&bytes).unwrap(), alm);
    }

    #[test]
    fn every_format_round_trips_its_fields() {
        for format in [
            AlmanacFormat::D500,
            AlmanacFormat::D501,
            AlmanacFormat::D550,
            AlmanacFormat::D551,
        ] {
            let alm = Almanac {
                svid: format.has_svid().then_some(27),
                af1: 3.6e-12,
                health: format.has_health().then_some(0x3F),
                ..sample()
            };
            let bytes = format.encode(&alm);
            assert_eq!(format.decode(&bytes).unwrap(), alm, "{format:?}");
        }
    }

    #[test]
    fn negative_week_number_means_no_data() {
        let alm = Almanac {
            week_number: -1,
            ..sample()
        };
        let bytes = AlmanacFormat::D500.encode(&alm);
        assert_eq!(AlmanacFormat::D500.decode(&bytes).unwrap().week_number, -1);
    }

    #[test]
    fn d550_svid_range() {
        let mut bytes = AlmanacFormat::D550.encode(&sample());
        bytes[0] = 32;
        assert!(AlmanacFormat::D550.decode(&bytes).is_err());
    }
}
