use navlink_core::{Category, Error, FlightRecord, Result};

use super::{RecordReader, RecordWriter};
use crate::capability::DataType;

/// Flightbook record formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlightFormat {
    D650,
}

impl FlightFormat {
    pub fn from_datatype(datatype: DataType) -> Result<Self> {
        match datatype.0 {
            650 => Ok(Self::D650),
            n => Err(Error::UnsupportedFormat {
                category: Category::Flightbook,
                datatype: n,
            }),
        }
    }

    pub fn datatype(self) -> DataType {
        DataType(650)
    }

    pub fn decode(self, data: &[u8]) -> Result<FlightRecord> {
        let mut r = RecordReader::new(self.datatype(), data);
        let record = FlightRecord {
            takeoff_time: r.time()?,
            landing_time: r.time()?,
            takeoff_position: r.position()?,
            landing_position: r.position()?,
            night_time: r.u32()?,
            num_landings: r.u32()?,
            max_speed: r.f32()?,
            max_altitude: r.f32()?,
            distance: r.f32()?,
            cross_country: r.bool("cross_country")?,
            departure_name: r.cstr()?,
            departure_ident: r.cstr()?,
            arrival_name: r.cstr()?,
            arrival_ident: r.cstr()?,
            aircraft_id: r.cstr()?,
        };
        r.finish()?;
        Ok(record)
    }

    pub fn encode(self, record: &FlightRecord) -> Vec<u8> {
        RecordWriter::new()
            .time(record.takeoff_time.as_ref())
            .time(record.landing_time.as_ref())
            .position(&record.takeoff_position)
            .position(&record.landing_position)
            .u32(record.night_time)
            .u32(record.num_landings)
            .f32(record.max_speed)
            .f32(record.max_altitude)
            .f32(record.distance)
            .bool(record.cross_country)
            .cstr(&record.departure_name, 50)
            .cstr(&record.departure_ident, 50)
            .cstr(&record.arrival_name, 50)
            .cstr(&record.arrival_ident, 50)
            .cstr(&record.aircraft_id, 50)
            .finish()
    }
}
