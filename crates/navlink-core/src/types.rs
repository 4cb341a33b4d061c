//! Core types used throughout navlink.
//!
//! These types form the normalized entity model: every device record
//! format decodes into one of them, whatever byte layout the receiver
//! uses on the wire. Fields that only some formats carry are `Option`s and
//! are `None` for formats that lack them.

use std::fmt;

use chrono::{DateTime, Utc};

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

/// A data category exchanged with a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Waypoints,
    WaypointCategories,
    Routes,
    Tracks,
    Proximities,
    Almanac,
    Time,
    Flightbook,
    Position,
    Pvt,
    Laps,
    Runs,
    Maps,
    Screenshot,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::Waypoints => "waypoints",
            Category::WaypointCategories => "waypoint categories",
            Category::Routes => "routes",
            Category::Tracks => "tracks",
            Category::Proximities => "proximity waypoints",
            Category::Almanac => "almanac",
            Category::Time => "date and time",
            Category::Flightbook => "flightbook",
            Category::Position => "position",
            Category::Pvt => "PVT data",
            Category::Laps => "laps",
            Category::Runs => "runs",
            Category::Maps => "maps",
            Category::Screenshot => "screenshots",
        };
        write!(f, "{s}")
    }
}

/// Direction of a transfer, seen from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Device to host.
    Read,
    /// Host to device.
    Write,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Read => write!(f, "download"),
            Direction::Write => write!(f, "upload"),
        }
    }
}

/// Static identification of a connected device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Product id reported by the device.
    pub product_id: u16,
    /// Software version in hundredths (`230` is version 2.30).
    pub software_version: i16,
    /// Product description string.
    pub description: String,
}

impl DeviceInfo {
    /// Software version as a decimal number.
    pub fn software_version_f32(&self) -> f32 {
        f32::from(self.software_version) / 100.0
    }
}

// ---------------------------------------------------------------------------
// Positions and time
// ---------------------------------------------------------------------------

/// Degrees per semicircle: 2^31 semicircles equal 180 degrees.
pub const SEMICIRCLE_DEGREES: f64 = 180.0 / 2_147_483_648.0;

/// A position in semicircle units, as stored in waypoint and track records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    pub lat: i32,
    pub lon: i32,
}

impl Position {
    /// Value used by fitness records for "no position recorded".
    pub const INVALID: Position = Position {
        lat: 0x7FFF_FFFF,
        lon: 0x7FFF_FFFF,
    };

    pub fn new(lat: i32, lon: i32) -> Self {
        Position { lat, lon }
    }

    /// Build a position from decimal degrees, rounding to the nearest
    /// semicircle. Longitudes of +180 wrap to -180.
    pub fn from_degrees(lat: f64, lon: f64) -> Self {
        Position {
            lat: degrees_to_semicircles(lat),
            lon: degrees_to_semicircles(lon),
        }
    }

    pub fn lat_degrees(&self) -> f64 {
        f64::from(self.lat) * SEMICIRCLE_DEGREES
    }

    pub fn lon_degrees(&self) -> f64 {
        f64::from(self.lon) * SEMICIRCLE_DEGREES
    }

    pub fn is_valid(&self) -> bool {
        *self != Position::INVALID
    }
}

fn degrees_to_semicircles(deg: f64) -> i32 {
    let semis = (deg / SEMICIRCLE_DEGREES).round();
    if semis >= 2_147_483_648.0 {
        // +180 degrees is the same meridian as -180.
        i32::MIN
    } else {
        semis as i32
    }
}

/// A position in radians, as used by the position and PVT records.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RadianPosition {
    pub lat: f64,
    pub lon: f64,
}

impl RadianPosition {
    pub fn lat_degrees(&self) -> f64 {
        self.lat.to_degrees()
    }

    pub fn lon_degrees(&self) -> f64 {
        self.lon.to_degrees()
    }
}

/// Calendar date and time as kept by the device clock (D600 layout).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u16,
    pub minute: u8,
    pub second: u8,
}

// ---------------------------------------------------------------------------
// Waypoints
// ---------------------------------------------------------------------------

/// A waypoint, normalized over every waypoint record format.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Waypoint {
    /// Identifier (device charset, upper case on older units).
    pub ident: String,
    pub position: Position,
    pub comment: Option<String>,
    /// Symbol code. Older formats use an 8-bit symbol set.
    pub symbol: Option<u16>,
    /// Display option (symbol only, with name, with comment...).
    pub display: Option<u8>,
    pub color: Option<u8>,
    /// Waypoint class (user, airport, intersection, ...).
    pub class: Option<u8>,
    /// Opaque class-specific bytes; only meaningful to the device.
    pub subclass: Option<Vec<u8>>,
    /// Altitude in meters.
    pub altitude: Option<f32>,
    /// Depth in meters.
    pub depth: Option<f32>,
    /// Proximity alarm distance in meters.
    pub proximity_distance: Option<f32>,
    pub state: Option<String>,
    pub country_code: Option<String>,
    pub facility: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
    pub cross_road: Option<String>,
    /// Facility name on aviation units.
    pub name: Option<String>,
    /// Ident of the waypoint this one is linked to.
    pub link_ident: Option<String>,
    /// Estimated time en route, in seconds.
    pub ete: Option<u32>,
    /// Temperature in degrees Celsius.
    pub temperature: Option<f32>,
    pub time: Option<DateTime<Utc>>,
    /// Category membership bit mask.
    pub category: Option<u16>,
}

impl Waypoint {
    /// A waypoint with just an identifier and a position.
    pub fn new(ident: impl Into<String>, position: Position) -> Self {
        Waypoint {
            ident: ident.into(),
            position,
            ..Default::default()
        }
    }
}

/// A waypoint category name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaypointCategory {
    pub name: String,
}

/// A proximity waypoint: a waypoint plus the distance at which the device
/// raises an alarm.
#[derive(Debug, Clone, PartialEq)]
pub struct Proximity {
    /// Position of this entry in the device's proximity list, if the format
    /// carries one.
    pub index: Option<i16>,
    pub waypoint: Waypoint,
    /// Alarm distance in meters.
    pub distance: f32,
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

/// Route-level metadata. Which fields are set depends on the header format.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RouteHeader {
    pub number: Option<u8>,
    pub comment: Option<String>,
    pub ident: Option<String>,
}

/// Per-leg data connecting two consecutive route waypoints.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RouteLink {
    /// Link class: line, link, net, direct or snap.
    pub class: u16,
    pub subclass: Vec<u8>,
    pub ident: String,
}

/// A route: a header, its waypoints in order and, on units that support
/// autorouting, the links between them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Route {
    pub header: RouteHeader,
    pub waypoints: Vec<Waypoint>,
    /// `links[i]` describes the leg from `waypoints[i]` to `waypoints[i + 1]`.
    pub links: Vec<RouteLink>,
}

// ---------------------------------------------------------------------------
// Tracks
// ---------------------------------------------------------------------------

/// Track metadata. Which fields are set depends on the header format.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrackHeader {
    pub ident: Option<String>,
    pub display: Option<bool>,
    pub color: Option<u8>,
    /// Track index on fitness units (laps refer to tracks by it).
    pub index: Option<u16>,
}

/// A single recorded track point.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackPoint {
    pub position: Position,
    pub time: Option<DateTime<Utc>>,
    /// Altitude in meters.
    pub altitude: Option<f32>,
    /// Depth in meters.
    pub depth: Option<f32>,
    /// Temperature in degrees Celsius.
    pub temperature: Option<f32>,
    /// Cumulative distance in meters.
    pub distance: Option<f32>,
    /// Heart rate in beats per minute.
    pub heart_rate: Option<u8>,
    /// Cadence in revolutions per minute.
    pub cadence: Option<u8>,
    /// Whether a wheel sensor was present.
    pub sensor: Option<bool>,
    /// Marks the first point of a new track segment.
    pub new_segment: bool,
}

/// A track: optional header plus its points in recording order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Track {
    pub header: Option<TrackHeader>,
    pub points: Vec<TrackPoint>,
}

// ---------------------------------------------------------------------------
// Almanac, PVT
// ---------------------------------------------------------------------------

/// Almanac data for one satellite.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Almanac {
    /// Satellite id. Formats without an explicit id get it from the
    /// record's position in the transfer.
    pub svid: Option<u8>,
    /// Week number; negative if the satellite has no data.
    pub week_number: i16,
    /// Almanac data reference time (s).
    pub toa: f32,
    /// Clock correction coefficient (s).
    pub af0: f32,
    /// Clock correction coefficient (s/s).
    pub af1: f32,
    /// Eccentricity.
    pub e: f32,
    /// Square root of semi-major axis (a) (m**1/2).
    pub sqrta: f32,
    /// Mean anomaly at reference time (r).
    pub m0: f32,
    /// Argument of perigee (r).
    pub w: f32,
    /// Right ascension (r).
    pub omg0: f32,
    /// Rate of change of right ascension (r/s).
    pub odot: f32,
    /// Inclination angle (r).
    pub i: f32,
    pub health: Option<u8>,
}

/// Quality of a position fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FixType {
    Unusable,
    Invalid,
    TwoD,
    ThreeD,
    TwoDDifferential,
    ThreeDDifferential,
}

/// A position/velocity/time fix (D800 layout).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Pvt {
    /// Altitude above WGS 84 ellipsoid (m).
    pub alt: f32,
    /// Estimated position error, 2 sigma (m).
    pub epe: f32,
    /// Horizontal position error (m).
    pub eph: f32,
    /// Vertical position error (m).
    pub epv: f32,
    /// Raw fix code; see [`Pvt::fix_type`].
    pub fix: u16,
    /// Time of week (s).
    pub tow: f64,
    pub position: RadianPosition,
    /// Velocity east (m/s).
    pub east: f32,
    /// Velocity north (m/s).
    pub north: f32,
    /// Velocity up (m/s).
    pub up: f32,
    /// Height of WGS 84 ellipsoid above MSL (m).
    pub msl_height: f32,
    /// Difference between GPS and UTC (s).
    pub leap_seconds: i16,
    /// Week number days since the device epoch.
    pub week_number_days: u32,
}

/// Signal data for one tracked satellite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Satellite {
    pub svid: u8,
    /// Signal to noise ratio (dB-Hz * 100).
    pub snr: u16,
    /// Elevation in degrees.
    pub elevation: u8,
    /// Azimuth in degrees from true north.
    pub azimuth: u16,
    /// Status bits: ephemeris, differential, used in solution.
    pub status: u8,
}

impl Satellite {
    pub fn has_ephemeris(&self) -> bool {
        self.status & 0x01 != 0
    }

    pub fn is_differential(&self) -> bool {
        self.status & 0x02 != 0
    }

    pub fn is_used(&self) -> bool {
        self.status & 0x04 != 0
    }
}

/// One item of the live PVT stream.
#[derive(Debug, Clone, PartialEq)]
pub enum PvtEvent {
    Fix(Pvt),
    Satellites(Vec<Satellite>),
}

// ---------------------------------------------------------------------------
// Fitness and aviation
// ---------------------------------------------------------------------------

/// A lap recorded by a fitness unit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Lap {
    pub index: Option<u32>,
    pub start_time: Option<DateTime<Utc>>,
    /// Duration in hundredths of a second.
    pub total_time: u32,
    /// Distance in meters.
    pub total_distance: f32,
    /// Maximum speed in meters per second.
    pub max_speed: Option<f32>,
    pub begin: Position,
    pub end: Position,
    pub calories: u16,
    pub track_index: Option<u8>,
    pub avg_heart_rate: Option<u8>,
    pub max_heart_rate: Option<u8>,
    /// 0 = active, 1 = rest.
    pub intensity: Option<u8>,
    pub avg_cadence: Option<u8>,
    /// Manual, distance, location, time or heart rate.
    pub trigger_method: Option<u8>,
}

/// A flightbook entry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlightRecord {
    pub takeoff_time: Option<DateTime<Utc>>,
    pub landing_time: Option<DateTime<Utc>>,
    pub takeoff_position: Position,
    pub landing_position: Position,
    /// Night flight time in seconds.
    pub night_time: u32,
    pub num_landings: u32,
    /// Maximum speed in meters per second.
    pub max_speed: f32,
    /// Maximum altitude in meters.
    pub max_altitude: f32,
    /// Distance in meters.
    pub distance: f32,
    pub cross_country: bool,
    pub departure_name: String,
    pub departure_ident: String,
    pub arrival_name: String,
    pub arrival_ident: String,
    pub aircraft_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semicircle_conversion() {
        let p = Position::from_degrees(52.0, 5.0);
        assert!((p.lat_degrees() - 52.0).abs() < 1e-6);
        assert!((p.lon_degrees() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn semicircle_scale_is_exact_at_90() {
        let p = Position::new(1 << 30, -(1 << 30));
        assert_eq!(p.lat_degrees(), 90.0);
        assert_eq!(p.lon_degrees(), -90.0);
    }

    #[test]
    fn plus_180_wraps_to_minus_180() {
        let p = Position::from_degrees(0.0, 180.0);
        assert_eq!(p.lon, i32::MIN);
        assert_eq!(p.lon_degrees(), -180.0);
    }

    #[test]
    fn invalid_position_sentinel() {
        assert!(!Position::INVALID.is_valid());
        assert!(Position::default().is_valid());
    }

    #[test]
    fn category_display() {
        assert_eq!(Category::Waypoints.to_string(), "waypoints");
        assert_eq!(Category::Proximities.to_string(), "proximity waypoints");
        assert_eq!(Category::Pvt.to_string(), "PVT data");
    }

    #[test]
    fn direction_display() {
        assert_eq!(Direction::Read.to_string(), "download");
        assert_eq!(Direction::Write.to_string(), "upload");
    }

    #[test]
    fn software_version_decimal() {
        let info = DeviceInfo {
            product_id: 55,
            software_version: 230,
            description: "GPS 120 Chinese".into(),
        };
        assert!((info.software_version_f32() - 2.30).abs() < 1e-6);
    }

    #[test]
    fn satellite_status_bits() {
        let sat = Satellite {
            status: 0x05,
            ..Default::default()
        };
        assert!(sat.has_ephemeris());
        assert!(!sat.is_differential());
        assert!(sat.is_used());
    }

    #[test]
    fn waypoint_new_leaves_optionals_empty() {
        let wpt = Waypoint::new("HOME", Position::new(1, 2));
        assert_eq!(wpt.ident, "HOME");
        assert!(wpt.comment.is_none());
        assert!(wpt.symbol.is_none());
    }
}

/// One step of a workout.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorkoutStep {
    pub custom_name: String,
    /// Lower bound of the target zone; its unit depends on `target_type`.
    pub target_zone_low: f32,
    pub target_zone_high: f32,
    pub duration_value: u16,
    /// 0 = active, 1 = rest.
    pub intensity: u8,
    pub duration_type: u8,
    pub target_type: u8,
    pub target_value: u8,
}

/// A workout program attached to a run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Workout {
    pub name: String,
    pub sport_type: u8,
    pub steps: Vec<WorkoutStep>,
}

/// A run recorded by a fitness unit. Laps and track points live in their
/// own transfers; the run points at them by index.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Run {
    pub track_index: u16,
    pub first_lap_index: u16,
    pub last_lap_index: u16,
    /// Running, biking or other.
    pub sport_type: u8,
    pub program_type: u8,
    pub multisport: u8,
    /// Quick workout duration in hundredths of a second.
    pub quick_workout_time: u32,
    /// Quick workout distance in meters.
    pub quick_workout_distance: f32,
    pub workout: Workout,
}

/// Map memory as the device reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryProperties {
    pub region: u16,
    pub max_tiles: u16,
    /// Region size in bytes.
    pub size: u32,
}

/// A raw screen capture.
///
/// `pixels` holds `height` rows of `bytes_per_line` bytes in device order.
/// Indexed formats (8 bits per pixel or fewer) come with a palette of
/// 4-byte entries.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Screenshot {
    pub width: u32,
    pub height: u32,
    pub bits_per_pixel: u32,
    pub bytes_per_line: u32,
    pub palette: Vec<u8>,
    pub pixels: Vec<u8>,
}
