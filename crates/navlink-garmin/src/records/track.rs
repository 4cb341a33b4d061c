//! Track point and track header formats.

use navlink_core::{Category, Error, Result, TrackHeader, TrackPoint};

use super::{RecordReader, RecordWriter};
use crate::capability::DataType;

/// Cadence value meaning "no sensor reading".
const CADENCE_INVALID: u8 = 0xFF;

/// Track point record formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackPointFormat {
    D300,
    D301,
    D302,
    D303,
    D304,
}

impl TrackPointFormat {
    pub fn from_datatype(datatype: DataType) -> Result<Self> {
        let format = match datatype.0 {
            300 => Self::D300,
            301 => Self::D301,
            302 => Self::D302,
            303 => Self::D303,
            304 => Self::D304,
            n => {
                return Err(Error::UnsupportedFormat {
                    category: Category::Tracks,
                    datatype: n,
                })
            }
        };
        Ok(format)
    }

    pub fn datatype(self) -> DataType {
        DataType(match self {
            Self::D300 => 300,
            Self::D301 => 301,
            Self::D302 => 302,
            Self::D303 => 303,
            Self::D304 => 304,
        })
    }

    pub fn decode(self, data: &[u8]) -> Result<TrackPoint> {
        let mut r = RecordReader::new(self.datatype(), data);
        let mut point = TrackPoint {
            position: r.position()?,
            time: r.time()?,
            ..Default::default()
        };
        match self {
            Self::D300 => {
                point.new_segment = r.bool("new_trk")?;
            }
            Self::D301 | Self::D302 => {
                point.altitude = r.opt_f32()?;
                point.depth = r.opt_f32()?;
                if self == Self::D302 {
                    point.temperature = r.opt_f32()?;
                }
                point.new_segment = r.bool("new_trk")?;
            }
            Self::D303 => {
                point.altitude = r.opt_f32()?;
                point.heart_rate = heart_rate(r.u8()?);
            }
            Self::D304 => {
                point.altitude = r.opt_f32()?;
                point.distance = r.opt_f32()?;
                point.heart_rate = heart_rate(r.u8()?);
                let cadence = r.u8()?;
                point.cadence = (cadence != CADENCE_INVALID).then_some(cadence);
                point.sensor = Some(r.bool("sensor")?);
            }
        }
        r.finish()?;
        Ok(point)
    }

    pub fn encode(self, point: &TrackPoint) -> Vec<u8> {
        let mut w = RecordWriter::new();
        w.position(&point.position).time(point.time.as_ref());
        match self {
            Self::D300 => {
                w.bool(point.new_segment);
            }
            Self::D301 | Self::D302 => {
                w.opt_f32(point.altitude).opt_f32(point.depth);
                if self == Self::D302 {
                    w.opt_f32(point.temperature);
                }
                w.bool(point.new_segment);
            }
            Self::D303 => {
                w.opt_f32(point.altitude).u8(point.heart_rate.unwrap_or(0));
            }
            Self::D304 => {
                w.opt_f32(point.altitude)
                    .opt_f32(point.distance)
                    .u8(point.heart_rate.unwrap_or(0))
                    .u8(point.cadence.unwrap_or(CADENCE_INVALID))
                    .bool(point.sensor.unwrap_or(false));
            }
        }
        w.finish()
    }
}

fn heart_rate(bpm: u8) -> Option<u8> {
    (bpm != 0).then_some(bpm)
}

/// Track header record formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackHeaderFormat {
    /// Display flag, color and name.
    D310,
    /// Track index.
    D311,
    /// Display flag, extended color set and name.
    D312,
}

impl TrackHeaderFormat {
    pub fn from_datatype(datatype: DataType) -> Result<Self> {
        match datatype.0 {
            310 => Ok(Self::D310),
            311 => Ok(Self::D311),
            312 => Ok(Self::D312),
            n => Err(Error::UnsupportedFormat {
                category: Category::Tracks,
                datatype: n,
            }),
        }
    }

    pub fn datatype(self) -> DataType {
        DataType(match self {
            Self::D310 => 310,
            Self::D311 => 311,
            Self::D312 => 312,
        })
    }

    pub fn decode(self, data: &[u8]) -> Result<TrackHeader> {
        let mut r = RecordReader::new(self.datatype(), data);
        let header = match self {
            Self::D311 => TrackHeader {
                index: Some(r.u16()?),
                ..Default::default()
            },
            Self::D310 | Self::D312 => {
                let display = r.bool("dspl")?;
                let color = r.u8()?;
                let max_color = if self == Self::D310 { 15 } else { 16 };
                if color > max_color && color != 0xFF {
                    return Err(r.invalid("color", color));
                }
                TrackHeader {
                    display: Some(display),
                    color: Some(color),
                    ident: r.opt_cstr()?,
                    index: None,
                }
            }
        };
        r.finish()?;
        Ok(header)
    }

    pub fn encode(self, header: &TrackHeader) -> Vec<u8> {
        let mut w = RecordWriter::new();
        match self {
            Self::D311 => {
                w.u16(header.index.unwrap_or(0));
            }
            Self::D310 | Self::D312 => {
                w.bool(header.display.unwrap_or(true))
                    .u8(header.color.unwrap_or(0xFF))
                    .cstr(header.ident.as_deref().unwrap_or(""), 50);
            }
        }
        w.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use navlink_core::Position;

    #[test]
    fn d300_layout() {
        let point = TrackPoint {
            position: Position::new(100, -200),
            time: Some(Utc.with_ymd_and_hms(1999, 6, 1, 8, 30, 0).unwrap()),
            new_segment: true,
            ..Default::default()
        };
        let bytes = TrackPointFormat::D300.encode(&point);
        assert_eq!(bytes.len(), 13);
        assert_eq!(bytes[12], 1);
        assert_eq!(TrackPointFormat::D300.decode(&bytes).unwrap(), point);
    }

    #[test]
    fn sizes() {
        let point = TrackPoint {
            heart_rate: Some(140),
            cadence: Some(90),
            sensor: Some(true),
            ..Default::default()
        };
        for (format, size) in [
            (TrackPointFormat::D301, 21),
            (TrackPointFormat::D302, 25),
            (TrackPointFormat::D303, 17),
            (TrackPointFormat::D304, 23),
        ] {
            let bytes = format.encode(&point);
            assert_eq!(bytes.len(), size, "{format:?}");
            assert!(format.decode(&bytes[..size - 1]).is_err());
        }
    }

    #[test]
    fn d301_sentinels() {
        let point = TrackPoint {
            position: Position::new(1, 2),
            altitude: Some(250.0),
            ..Default::default()
        };
        let bytes = TrackPointFormat::D301.encode(&point);
        let decoded = TrackPointFormat::D301.decode(&bytes).unwrap();
        assert_eq!(decoded.altitude, Some(250.0));
        assert_eq!(decoded.depth, None);
        assert_eq!(decoded.time, None);
        assert_eq!(&bytes[8..12], &[0xFF; 4]);
    }

    #[test]
    fn d304_fitness_point() {
        let point = TrackPoint {
            position: Position::INVALID,
            time: Some(Utc.with_ymd_and_hms(2005, 3, 2, 7, 0, 0).unwrap()),
            altitude: None,
            distance: Some(1609.3),
            heart_rate: Some(151),
            cadence: None,
            sensor: Some(false),
            ..Default::default()
        };
        let bytes = TrackPointFormat::D304.encode(&point);
        let decoded = TrackPointFormat::D304.decode(&bytes).unwrap();
        assert_eq!(decoded, point);
        assert!(!decoded.position.is_valid());
    }

    #[test]
    fn d310_round_trip() {
        let header = TrackHeader {
            ident: Some("ACTIVE LOG".into()),
            display: Some(true),
            color: Some(0xFF),
            index: None,
        };
        let bytes = TrackHeaderFormat::D310.encode(&header);
        assert_eq!(TrackHeaderFormat::D310.decode(&bytes).unwrap(), header);
    }

    #[test]
    fn d312_color_range() {
        let header = TrackHeader {
            ident: Some("T".into()),
            display: Some(false),
            color: Some(16),
            index: None,
        };
        let bytes = TrackHeaderFormat::D312.encode(&header);
        assert!(TrackHeaderFormat::D312.decode(&bytes).is_ok());
        assert!(TrackHeaderFormat::D310.decode(&bytes).is_err());
    }

    fn populated_point(format: TrackPointFormat) -> TrackPoint {
        let mut point = TrackPoint {
            position: Position::from_degrees(47.6205, -122.3493),
            time: Some(Utc.with_ymd_and_hms(2007, 9, 14, 16, 20, 5).unwrap()),
            ..Default::default()
        };
        match format {
            TrackPointFormat::D300 => point.new_segment = true,
            TrackPointFormat::D301 | TrackPointFormat::D302 => {
                point.altitude = Some(56.5);
                point.depth = Some(2.25);
                if format == TrackPointFormat::D302 {
                    point.temperature = Some(14.75);
                }
                point.new_segment = true;
            }
            TrackPointFormat::D303 => {
                point.altitude = Some(56.5);
                point.heart_rate = Some(162);
            }
            TrackPointFormat::D304 => {
                point.altitude = Some(56.5);
                point.distance = Some(10_000.5);
                point.heart_rate = Some(162);
                point.cadence = Some(88);
                point.sensor = Some(true);
            }
        }
        point
    }

    #[test]
    fn every_point_format_round_trips_its_fields() {
        for format in [
            TrackPointFormat::D300,
            TrackPointFormat::D301,
            TrackPointFormat::D302,
            TrackPointFormat::D303,
            TrackPointFormat::D304,
        ] {
            let point = populated_point(format);
            let bytes = format.encode(&point);
            assert_eq!(format.decode(&bytes).unwrap(), point, "{format:?}");
        }
    }

    #[test]
    fn every_header_format_round_trips_its_fields() {
        for (format, header) in [
            (
                TrackHeaderFormat::D310,
                TrackHeader {
                    ident: Some("MORNING RIDE".into()),
                    display: Some(false),
                    color: Some(9),
                    index: None,
                },
            ),
            (
                TrackHeaderFormat::D311,
                TrackHeader {
                    index: Some(513),
                    ..Default::default()
                },
            ),
            (
                TrackHeaderFormat::D312,
                TrackHeader {
                    ident: Some("Evening Loop".into()),
                    display: Some(true),
                    color: Some(16),
                    index: None,
                },
            ),
        ] {
            let bytes = format.encode(&header);
            assert_eq!(format.decode(&bytes).unwrap(), header, "{format:?}");
        }
    }

    #[test]
    fn d301_flag_out_of_range() {
        let mut bytes = TrackPointFormat::D301.encode(&populated_point(TrackPointFormat::D301));
        bytes[20] = 7;
        let err = TrackPointFormat::D301.decode(&bytes).unwrap_err();
        assert_eq!(err.to_string(), "malformed D301 record: invalid new_trk 7");
    }

    #[test]
    fn d311_index() {
        let header = TrackHeaderFormat::D311.decode(&[0x02, 0x01]).unwrap();
        assert_eq!(header.index, Some(0x0102));
    }
}
