//! Waypoint, proximity waypoint and waypoint category formats.

use navlink_core::{Category, Error, Proximity, Result, Waypoint, WaypointCategory};

use super::{narrow_u8, RecordReader, RecordWriter};
use crate::capability::DataType;

/// Subclass bytes of a user waypoint in the 18-byte subclass formats.
const DEFAULT_SUBCLASS: [u8; 18] = [
    0, 0, 0, 0, 0, 0, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
];

/// D106 subclass bytes of a user waypoint.
const DEFAULT_SUBCLASS_13: [u8; 13] = [0; 13];

/// Longest string the variable-length formats accept, without the NUL.
const STRING_MAX: usize = 50;

/// Marker byte at the start of D109/D110 records.
const EXTENDED_RECORD_TYPE: u8 = 0x01;

/// Waypoint classes of the D108-D110 formats.
fn is_extended_class(class: u8) -> bool {
    matches!(class, 0x00 | 0x40..=0x46 | 0x80 | 0x81)
}

/// Waypoint record formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaypointFormat {
    D100,
    D101,
    D102,
    D103,
    D104,
    D105,
    D106,
    D107,
    D108,
    D109,
    D110,
    D150,
    D151,
    D152,
    D154,
    D155,
}

impl WaypointFormat {
    pub fn from_datatype(datatype: DataType) -> Result<Self> {
        let format = match datatype.0 {
            100 => Self::D100,
            101 => Self::D101,
            102 => Self::D102,
            103 => Self::D103,
            104 => Self::D104,
            105 => Self::D105,
            106 => Self::D106,
            107 => Self::D107,
            108 => Self::D108,
            109 => Self::D109,
            110 => Self::D110,
            150 => Self::D150,
            151 => Self::D151,
            152 => Self::D152,
            154 => Self::D154,
            155 => Self::D155,
            n => {
                return Err(Error::UnsupportedFormat {
                    category: Category::Waypoints,
                    datatype: n,
                })
            }
        };
        Ok(format)
    }

    pub fn datatype(self) -> DataType {
        DataType(match self {
            Self::D100 => 100,
            Self::D101 => 101,
            Self::D102 => 102,
            Self::D103 => 103,
            Self::D104 => 104,
            Self::D105 => 105,
            Self::D106 => 106,
            Self::D107 => 107,
            Self::D108 => 108,
            Self::D109 => 109,
            Self::D110 => 110,
            Self::D150 => 150,
            Self::D151 => 151,
            Self::D152 => 152,
            Self::D154 => 154,
            Self::D155 => 155,
        })
    }

    pub fn decode(self, data: &[u8]) -> Result<Waypoint> {
        let mut r = RecordReader::new(self.datatype(), data);
        let wpt = self.read(&mut r)?;
        r.finish()?;
        Ok(wpt)
    }

    pub fn encode(self, wpt: &Waypoint) -> Result<Vec<u8>> {
        let mut w = RecordWriter::new();
        self.write(&mut w, wpt)?;
        Ok(w.finish())
    }

    pub(crate) fn read(self, r: &mut RecordReader<'_>) -> Result<Waypoint> {
        match self {
            Self::D100 | Self::D101 | Self::D102 | Self::D103 | Self::D104 | Self::D107 => {
                self.read_basic(r)
            }
            Self::D105 => {
                let position = r.position()?;
                let symbol = r.u16()?;
                let ident = r.cstr()?;
                Ok(Waypoint {
                    symbol: Some(symbol),
                    ..Waypoint::new(ident, position)
                })
            }
            Self::D106 => {
                let class = r.u8()?;
                let subclass = r.bytes(13)?;
                let position = r.position()?;
                let symbol = r.u16()?;
                let ident = r.cstr()?;
                let link_ident = r.opt_cstr()?;
                Ok(Waypoint {
                    class: Some(class),
                    subclass: (subclass != DEFAULT_SUBCLASS_13).then_some(subclass),
                    symbol: Some(symbol),
                    link_ident,
                    ..Waypoint::new(ident, position)
                })
            }
            Self::D108 | Self::D109 | Self::D110 => self.read_extended(r),
            Self::D150 => {
                let ident = r.fixed_str(6)?;
                let country_code = r.opt_fixed_str(2)?;
                let class = r.u8()?;
                if class > 4 {
                    return Err(r.invalid("class", class));
                }
                let position = r.position()?;
                let altitude = r.i16()?;
                let city = r.opt_fixed_str(24)?;
                let state = r.opt_fixed_str(2)?;
                let name = r.opt_fixed_str(30)?;
                let comment = r.opt_fixed_str(40)?;
                Ok(Waypoint {
                    country_code,
                    class: Some(class),
                    altitude: Some(f32::from(altitude)),
                    city,
                    state,
                    name,
                    comment,
                    ..Waypoint::new(ident, position)
                })
            }
            Self::D151 | Self::D152 | Self::D154 | Self::D155 => self.read_aviation(r),
        }
    }

    /// D100-D104 and D107: the fixed-width layout of the early handhelds.
    fn read_basic(self, r: &mut RecordReader<'_>) -> Result<Waypoint> {
        let ident = r.fixed_str(6)?;
        let position = r.position()?;
        r.skip(4)?;
        let comment = r.opt_fixed_str(40)?;
        let mut wpt = Waypoint {
            comment,
            ..Waypoint::new(ident, position)
        };
        match self {
            Self::D101 => {
                wpt.proximity_distance = Some(r.f32()?);
                wpt.symbol = Some(u16::from(r.u8()?));
            }
            Self::D102 => {
                wpt.proximity_distance = Some(r.f32()?);
                wpt.symbol = Some(r.u16()?);
            }
            Self::D103 => {
                wpt.symbol = Some(read_small_symbol(r)?);
                wpt.display = Some(read_display(r)?);
            }
            Self::D104 => {
                wpt.proximity_distance = Some(r.f32()?);
                wpt.symbol = Some(r.u16()?);
                let display = r.u8()?;
                if !matches!(display, 0 | 1 | 3 | 5) {
                    return Err(r.invalid("display option", display));
                }
                wpt.display = Some(display);
            }
            Self::D107 => {
                wpt.symbol = Some(read_small_symbol(r)?);
                wpt.display = Some(read_display(r)?);
                wpt.proximity_distance = Some(r.f32()?);
                let color = r.u8()?;
                if color > 3 {
                    return Err(r.invalid("color", color));
                }
                wpt.color = Some(color);
            }
            _ => {}
        }
        Ok(wpt)
    }

    /// D108-D110: class/subclass header, then variable-length strings.
    fn read_extended(self, r: &mut RecordReader<'_>) -> Result<Waypoint> {
        if self != Self::D108 {
            let record_type = r.u8()?;
            if record_type != EXTENDED_RECORD_TYPE {
                return Err(r.invalid("record type", record_type));
            }
        }
        let class = r.u8()?;
        if !is_extended_class(class) {
            return Err(r.invalid("class", format!("{class:#04x}")));
        }
        let (color, display) = if self == Self::D108 {
            let color = r.u8()?;
            if color > 15 && color != 0xFF {
                return Err(r.invalid("color", color));
            }
            (color, r.u8()?)
        } else {
            let packed = r.u8()?;
            (packed & 0x1F, (packed >> 5) & 0x03)
        };
        if display > 2 {
            return Err(r.invalid("display option", display));
        }
        r.skip(1)?; // attributes
        let symbol = r.u16()?;
        let subclass = r.bytes(18)?;
        let position = r.position()?;
        let altitude = r.opt_f32()?;
        let depth = r.opt_f32()?;
        let proximity_distance = r.opt_f32()?;
        let state = r.opt_fixed_str(2)?;
        let country_code = r.opt_fixed_str(2)?;

        let mut wpt = Waypoint {
            position,
            symbol: Some(symbol),
            display: Some(display),
            color: Some(color),
            class: Some(class),
            subclass: (subclass != DEFAULT_SUBCLASS).then_some(subclass),
            altitude,
            depth,
            proximity_distance,
            state,
            country_code,
            ..Default::default()
        };
        if self != Self::D108 {
            let ete = r.u32()?;
            wpt.ete = (ete != u32::MAX).then_some(ete);
        }
        if self == Self::D110 {
            wpt.temperature = r.opt_f32()?;
            wpt.time = r.time()?;
            wpt.category = Some(r.u16()?);
        }
        wpt.ident = r.cstr()?;
        wpt.comment = r.opt_cstr()?;
        wpt.facility = r.opt_cstr()?;
        wpt.city = r.opt_cstr()?;
        wpt.address = r.opt_cstr()?;
        wpt.cross_road = r.opt_cstr()?;
        Ok(wpt)
    }

    /// D151, D152, D154 and D155: aviation handhelds.
    fn read_aviation(self, r: &mut RecordReader<'_>) -> Result<Waypoint> {
        let ident = r.fixed_str(6)?;
        let position = r.position()?;
        r.skip(4)?;
        let comment = r.opt_fixed_str(40)?;
        let distance = r.f32()?;
        let name = r.opt_fixed_str(30)?;
        let city = r.opt_fixed_str(24)?;
        let state = r.opt_fixed_str(2)?;
        let altitude = r.i16()?;
        let country_code = r.opt_fixed_str(2)?;
        r.skip(1)?;
        let class = r.u8()?;
        let max_class = match self {
            Self::D151 => 3,
            Self::D152 => 5,
            _ => 9,
        };
        if class > max_class {
            return Err(r.invalid("class", class));
        }
        let mut wpt = Waypoint {
            comment,
            proximity_distance: Some(distance),
            name,
            city,
            state,
            altitude: Some(f32::from(altitude)),
            country_code,
            class: Some(class),
            ..Waypoint::new(ident, position)
        };
        if matches!(self, Self::D154 | Self::D155) {
            wpt.symbol = Some(r.u16()?);
        }
        if self == Self::D155 {
            let display = r.u8()?;
            if !matches!(display, 1 | 3 | 5) {
                return Err(r.invalid("display option", display));
            }
            wpt.display = Some(display);
        }
        Ok(wpt)
    }

    pub(crate) fn write(self, w: &mut RecordWriter, wpt: &Waypoint) -> Result<()> {
        let dt = self.datatype();
        let comment = wpt.comment.as_deref().unwrap_or("");
        let symbol = wpt.symbol.unwrap_or(0);
        let display = wpt.display.unwrap_or(0);
        match self {
            Self::D100 | Self::D101 | Self::D102 | Self::D103 | Self::D104 | Self::D107 => {
                w.fixed_str(&wpt.ident, 6, b' ')
                    .position(&wpt.position)
                    .u32(0)
                    .fixed_str(comment, 40, b' ');
                let distance = wpt.proximity_distance.unwrap_or(0.0);
                match self {
                    Self::D101 => {
                        w.f32(distance).u8(narrow_u8(symbol, "symbol", dt)?);
                    }
                    Self::D102 => {
                        w.f32(distance).u16(symbol);
                    }
                    Self::D103 => {
                        w.u8(narrow_u8(symbol, "symbol", dt)?).u8(display);
                    }
                    Self::D104 => {
                        w.f32(distance).u16(symbol).u8(display);
                    }
                    Self::D107 => {
                        w.u8(narrow_u8(symbol, "symbol", dt)?)
                            .u8(display)
                            .f32(distance)
                            .u8(wpt.color.unwrap_or(0));
                    }
                    _ => {}
                }
            }
            Self::D105 => {
                w.position(&wpt.position)
                    .u16(symbol)
                    .cstr(&wpt.ident, STRING_MAX);
            }
            Self::D106 => {
                w.u8(wpt.class.unwrap_or(0));
                write_subclass(w, wpt.subclass.as_deref(), &DEFAULT_SUBCLASS_13, dt)?;
                w.position(&wpt.position)
                    .u16(symbol)
                    .cstr(&wpt.ident, STRING_MAX)
                    .cstr(wpt.link_ident.as_deref().unwrap_or(""), STRING_MAX);
            }
            Self::D108 | Self::D109 | Self::D110 => self.write_extended(w, wpt)?,
            Self::D150 => {
                w.fixed_str(&wpt.ident, 6, b' ')
                    .fixed_str(wpt.country_code.as_deref().unwrap_or(""), 2, b' ')
                    .u8(wpt.class.unwrap_or(4))
                    .position(&wpt.position)
                    .i16(altitude_i16(wpt.altitude))
                    .fixed_str(wpt.city.as_deref().unwrap_or(""), 24, b' ')
                    .fixed_str(wpt.state.as_deref().unwrap_or(""), 2, b' ')
                    .fixed_str(wpt.name.as_deref().unwrap_or(""), 30, b' ')
                    .fixed_str(comment, 40, b' ');
            }
            Self::D151 | Self::D152 | Self::D154 | Self::D155 => {
                let user_class = if self == Self::D151 { 2 } else { 4 };
                w.fixed_str(&wpt.ident, 6, b' ')
                    .position(&wpt.position)
                    .u32(0)
                    .fixed_str(comment, 40, b' ')
                    .f32(wpt.proximity_distance.unwrap_or(0.0))
                    .fixed_str(wpt.name.as_deref().unwrap_or(""), 30, b' ')
                    .fixed_str(wpt.city.as_deref().unwrap_or(""), 24, b' ')
                    .fixed_str(wpt.state.as_deref().unwrap_or(""), 2, b' ')
                    .i16(altitude_i16(wpt.altitude))
                    .fixed_str(wpt.country_code.as_deref().unwrap_or(""), 2, b' ')
                    .u8(0)
                    .u8(wpt.class.unwrap_or(user_class));
                if matches!(self, Self::D154 | Self::D155) {
                    w.u16(symbol);
                }
                if self == Self::D155 {
                    w.u8(wpt.display.unwrap_or(1));
                }
            }
        }
        Ok(())
    }

    fn write_extended(self, w: &mut RecordWriter, wpt: &Waypoint) -> Result<()> {
        let display = wpt.display.unwrap_or(0);
        if self == Self::D108 {
            w.u8(wpt.class.unwrap_or(0))
                .u8(wpt.color.unwrap_or(0xFF))
                .u8(display)
                .u8(0x60);
        } else {
            let packed = (wpt.color.unwrap_or(0x1F) & 0x1F) | ((display & 0x03) << 5);
            let attributes = if self == Self::D109 { 0x70 } else { 0x80 };
            w.u8(EXTENDED_RECORD_TYPE)
                .u8(wpt.class.unwrap_or(0))
                .u8(packed)
                .u8(attributes);
        }
        w.u16(wpt.symbol.unwrap_or(0));
        write_subclass(w, wpt.subclass.as_deref(), &DEFAULT_SUBCLASS, self.datatype())?;
        w.position(&wpt.position)
            .opt_f32(wpt.altitude)
            .opt_f32(wpt.depth)
            .opt_f32(wpt.proximity_distance)
            .fixed_str(wpt.state.as_deref().unwrap_or(""), 2, b' ')
            .fixed_str(wpt.country_code.as_deref().unwrap_or(""), 2, b' ');
        if self != Self::D108 {
            w.u32(wpt.ete.unwrap_or(u32::MAX));
        }
        if self == Self::D110 {
            w.opt_f32(wpt.temperature)
                .time(wpt.time.as_ref())
                .u16(wpt.category.unwrap_or(0));
        }
        w.cstr(&wpt.ident, STRING_MAX);
        for field in [
            &wpt.comment,
            &wpt.facility,
            &wpt.city,
            &wpt.address,
            &wpt.cross_road,
        ] {
            w.cstr(field.as_deref().unwrap_or(""), STRING_MAX);
        }
        Ok(())
    }
}

fn read_small_symbol(r: &mut RecordReader<'_>) -> Result<u16> {
    let symbol = r.u8()?;
    if symbol > 15 {
        return Err(r.invalid("symbol", symbol));
    }
    Ok(u16::from(symbol))
}

fn read_display(r: &mut RecordReader<'_>) -> Result<u8> {
    let display = r.u8()?;
    if display > 2 {
        return Err(r.invalid("display option", display));
    }
    Ok(display)
}

fn write_subclass(
    w: &mut RecordWriter,
    subclass: Option<&[u8]>,
    default: &[u8],
    format: DataType,
) -> Result<()> {
    match subclass {
        None => {
            w.bytes(default);
        }
        Some(bytes) if bytes.len() == default.len() => {
            w.bytes(bytes);
        }
        Some(bytes) => {
            return Err(Error::InvalidParameter(format!(
                "{format} subclass must be {} bytes, got {}",
                default.len(),
                bytes.len()
            )))
        }
    }
    Ok(())
}

fn altitude_i16(altitude: Option<f32>) -> i16 {
    // Float to int casts saturate.
    altitude.unwrap_or(0.0).round() as i16
}

/// Proximity waypoint record formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProximityFormat {
    /// D100 waypoint plus alarm distance.
    D400,
    /// D103 waypoint plus alarm distance.
    D403,
    /// Index, D150 waypoint, alarm distance.
    D450,
}

impl ProximityFormat {
    pub fn from_datatype(datatype: DataType) -> Result<Self> {
        match datatype.0 {
            400 => Ok(Self::D400),
            403 => Ok(Self::D403),
            450 => Ok(Self::D450),
            n => Err(Error::UnsupportedFormat {
                category: Category::Proximities,
                datatype: n,
            }),
        }
    }

    pub fn datatype(self) -> DataType {
        DataType(match self {
            Self::D400 => 400,
            Self::D403 => 403,
            Self::D450 => 450,
        })
    }

    pub fn decode(self, data: &[u8]) -> Result<Proximity> {
        let mut r = RecordReader::new(self.datatype(), data);
        let index = match self {
            Self::D450 => Some(r.i16()?),
            _ => None,
        };
        let waypoint = self.waypoint_format().read(&mut r)?;
        let distance = r.f32()?;
        r.finish()?;
        Ok(Proximity {
            index,
            waypoint,
            distance,
        })
    }

    pub fn encode(self, prx: &Proximity) -> Result<Vec<u8>> {
        let mut w = RecordWriter::new();
        if self == Self::D450 {
            w.i16(prx.index.unwrap_or(0));
        }
        self.waypoint_format().write(&mut w, &prx.waypoint)?;
        w.f32(prx.distance);
        Ok(w.finish())
    }

    fn waypoint_format(self) -> WaypointFormat {
        match self {
            Self::D400 => WaypointFormat::D100,
            Self::D403 => WaypointFormat::D103,
            Self::D450 => WaypointFormat::D150,
        }
    }
}

/// Waypoint category record format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoryFormat {
    D120,
}

impl CategoryFormat {
    pub fn from_datatype(datatype: DataType) -> Result<Self> {
        match datatype.0 {
            120 => Ok(Self::D120),
            n => Err(Error::UnsupportedFormat {
                category: Category::WaypointCategories,
                datatype: n,
            }),
        }
    }

    pub fn datatype(self) -> DataType {
        DataType(120)
    }

    pub fn decode(self, data: &[u8]) -> Result<WaypointCategory> {
        let mut r = RecordReader::new(self.datatype(), data);
        let name = r.fixed_str(17)?;
        r.finish()?;
        Ok(WaypointCategory { name })
    }

    pub fn encode(self, category: &WaypointCategory) -> Vec<u8> {
        let mut w = RecordWriter::new();
        w.fixed_str(&category.name, 17, 0);
        w.finish()
    }
}
