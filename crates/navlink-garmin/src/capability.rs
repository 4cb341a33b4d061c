//! Capability resolution: which protocols and record formats a unit speaks.
//!
//! A session opens with the product exchange. The host sends Product_Rqst,
//! the device answers with Product_Data (id, software version,
//! description) and, on units that implement the capability protocol,
//! follows up with a Protocol_Array listing every protocol and record
//! datatype it supports. Older units stay silent after Product_Data; their
//! capabilities come from the [`ProductTable`].
//!
//! The result is a [`DeviceProfile`], fixed for the life of the session.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, info, warn};

use navlink_core::{Category, DeviceInfo, Direction, Error, Result};

use crate::commands::{self, PID_EXT_PRODUCT_DATA, PID_PRODUCT_DATA, PID_PROTOCOL_ARRAY};
use crate::link::Link;
use crate::models::ProductTable;
use crate::records::latin1_decode;

/// Layer a protocol belongs to, from the tag letter in its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolKind {
    /// `P`: physical.
    Physical,
    /// `L`: link.
    Link,
    /// `A`: application (including device command protocols).
    Application,
    /// `T`: transmission.
    Transmission,
}

impl ProtocolKind {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            b'P' => Some(ProtocolKind::Physical),
            b'L' => Some(ProtocolKind::Link),
            b'A' => Some(ProtocolKind::Application),
            b'T' => Some(ProtocolKind::Transmission),
            _ => None,
        }
    }

    pub fn tag(self) -> char {
        match self {
            ProtocolKind::Physical => 'P',
            ProtocolKind::Link => 'L',
            ProtocolKind::Application => 'A',
            ProtocolKind::Transmission => 'T',
        }
    }
}

/// A protocol name such as `L001` or `A100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProtocolId {
    pub kind: ProtocolKind,
    pub number: u16,
}

impl ProtocolId {
    pub const fn new(kind: ProtocolKind, number: u16) -> Self {
        ProtocolId { kind, number }
    }

    const fn app(number: u16) -> Self {
        Self::new(ProtocolKind::Application, number)
    }

    pub const L000: ProtocolId = ProtocolId::new(ProtocolKind::Link, 0);
    pub const L001: ProtocolId = ProtocolId::new(ProtocolKind::Link, 1);
    pub const L002: ProtocolId = ProtocolId::new(ProtocolKind::Link, 2);
    pub const A010: ProtocolId = ProtocolId::app(10);
    pub const A011: ProtocolId = ProtocolId::app(11);
    pub const A100: ProtocolId = ProtocolId::app(100);
    pub const A101: ProtocolId = ProtocolId::app(101);
    pub const A200: ProtocolId = ProtocolId::app(200);
    pub const A201: ProtocolId = ProtocolId::app(201);
    pub const A300: ProtocolId = ProtocolId::app(300);
    pub const A301: ProtocolId = ProtocolId::app(301);
    pub const A302: ProtocolId = ProtocolId::app(302);
    pub const A400: ProtocolId = ProtocolId::app(400);
    pub const A500: ProtocolId = ProtocolId::app(500);
    pub const A600: ProtocolId = ProtocolId::app(600);
    pub const A650: ProtocolId = ProtocolId::app(650);
    pub const A700: ProtocolId = ProtocolId::app(700);
    pub const A800: ProtocolId = ProtocolId::app(800);
    pub const A900: ProtocolId = ProtocolId::app(900);
    pub const A906: ProtocolId = ProtocolId::app(906);
    pub const A1000: ProtocolId = ProtocolId::app(1000);

    /// The data category this application protocol transfers, if any.
    pub fn category(self) -> Option<Category> {
        let category = match self {
            Self::A100 => Category::Waypoints,
            Self::A101 => Category::WaypointCategories,
            Self::A200 | Self::A201 => Category::Routes,
            Self::A300 | Self::A301 | Self::A302 => Category::Tracks,
            Self::A400 => Category::Proximities,
            Self::A500 => Category::Almanac,
            Self::A600 => Category::Time,
            Self::A650 => Category::Flightbook,
            Self::A700 => Category::Position,
            Self::A800 => Category::Pvt,
            Self::A900 => Category::Maps,
            Self::A906 => Category::Laps,
            Self::A1000 => Category::Runs,
            _ => return None,
        };
        Some(category)
    }

    /// Whether the host may upload records with this protocol.
    pub fn is_writable(self) -> bool {
        matches!(
            self,
            Self::A100
                | Self::A200
                | Self::A201
                | Self::A300
                | Self::A301
                | Self::A400
                | Self::A600
                | Self::A900
        )
    }
}

impl fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:03}", self.kind.tag(), self.number)
    }
}

impl FromStr for ProtocolId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match parse_tag(s)? {
            Tag::Protocol(id) => Ok(id),
            Tag::DataType(_) => Err(Error::InvalidParameter(format!(
                "{s} is a datatype, not a protocol"
            ))),
        }
    }
}

/// A record datatype number, e.g. `DataType(109)` for D109.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DataType(pub u16);

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "D{:03}", self.0)
    }
}

/// One protocol a device supports, with the record datatypes it uses for
/// it in order (e.g. A201 lists header, waypoint and link datatypes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolCapability {
    pub protocol: ProtocolId,
    pub datatypes: Vec<DataType>,
}

impl ProtocolCapability {
    /// The `index`th datatype, or a protocol error if the device listed
    /// too few.
    pub fn datatype(&self, index: usize) -> Result<DataType> {
        self.datatypes.get(index).copied().ok_or_else(|| {
            Error::Protocol(format!(
                "{} capability lists {} datatypes, needs at least {}",
                self.protocol,
                self.datatypes.len(),
                index + 1
            ))
        })
    }
}

enum Tag {
    Protocol(ProtocolId),
    DataType(DataType),
}

fn parse_tag(s: &str) -> Result<Tag> {
    let invalid = || Error::InvalidParameter(format!("invalid protocol tag {s:?}"));
    let (&letter, digits) = s.as_bytes().split_first().ok_or_else(invalid)?;
    let number: u16 = std::str::from_utf8(digits)
        .ok()
        .filter(|d| !d.is_empty() && d.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|d| d.parse().ok())
        .ok_or_else(invalid)?;
    if letter == b'D' {
        return Ok(Tag::DataType(DataType(number)));
    }
    let kind = ProtocolKind::from_tag(letter).ok_or_else(invalid)?;
    Ok(Tag::Protocol(ProtocolId::new(kind, number)))
}

/// Attach each datatype to the protocol that precedes it.
fn group(tags: impl IntoIterator<Item = Tag>) -> Vec<ProtocolCapability> {
    let mut caps: Vec<ProtocolCapability> = Vec::new();
    for tag in tags {
        match tag {
            Tag::Protocol(protocol) => caps.push(ProtocolCapability {
                protocol,
                datatypes: Vec::new(),
            }),
            Tag::DataType(dt) => match caps.last_mut() {
                Some(cap) => cap.datatypes.push(dt),
                None => warn!(datatype = %dt, "Datatype listed before any protocol"),
            },
        }
    }
    caps
}

/// Parse a Protocol_Array payload: 3-byte records of a tag letter and a
/// little-endian `u16`.
pub fn parse_protocol_array(data: &[u8]) -> Result<Vec<ProtocolCapability>> {
    if data.len() % 3 != 0 {
        return Err(Error::Protocol(format!(
            "protocol array length {} is not a multiple of 3",
            data.len()
        )));
    }
    let mut tags = Vec::with_capacity(data.len() / 3);
    for record in data.chunks_exact(3) {
        let number = u16::from_le_bytes([record[1], record[2]]);
        match record[0] {
            b'D' => tags.push(Tag::DataType(DataType(number))),
            letter => match ProtocolKind::from_tag(letter) {
                Some(kind) => tags.push(Tag::Protocol(ProtocolId::new(kind, number))),
                None => debug!(tag = letter, number, "Skipping unknown protocol tag"),
            },
        }
    }
    Ok(group(tags))
}

/// Parse a whitespace-separated capability list such as
/// `"L001 A010 A100 D100 A200 D200 D100"`.
pub fn parse_capability_list(s: &str) -> Result<Vec<ProtocolCapability>> {
    let tags = s.split_whitespace().map(parse_tag).collect::<Result<Vec<_>>>()?;
    Ok(group(tags))
}

/// Contents of a Product_Data packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductData {
    pub product_id: u16,
    /// Software version in hundredths.
    pub software_version: i16,
    pub description: String,
    /// Any further strings in the packet.
    pub extra: Vec<String>,
}

impl ProductData {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(Error::Protocol(format!(
                "Product_Data packet too short ({} bytes)",
                data.len()
            )));
        }
        let product_id = u16::from_le_bytes([data[0], data[1]]);
        let software_version = i16::from_le_bytes([data[2], data[3]]);
        let mut strings = split_strings(&data[4..]).into_iter();
        Ok(ProductData {
            product_id,
            software_version,
            description: strings.next().unwrap_or_default(),
            extra: strings.collect(),
        })
    }
}

/// Split a run of NUL-terminated strings. A final unterminated string is
/// kept.
fn split_strings(data: &[u8]) -> Vec<String> {
    let mut parts: Vec<&[u8]> = data.split(|&b| b == 0).collect();
    if parts.last().is_some_and(|p| p.is_empty()) {
        parts.pop();
    }
    parts.into_iter().map(latin1_decode).collect()
}

/// Where a profile's capabilities came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilitySource {
    /// The device sent a Protocol_Array.
    Device,
    /// Looked up in the product table.
    ProductTable,
}

/// Everything the session knows about the connected unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceProfile {
    info: DeviceInfo,
    extra_descriptions: Vec<String>,
    source: CapabilitySource,
    capabilities: Vec<ProtocolCapability>,
}

impl DeviceProfile {
    pub fn new(
        info: DeviceInfo,
        source: CapabilitySource,
        capabilities: Vec<ProtocolCapability>,
    ) -> Self {
        DeviceProfile {
            info,
            extra_descriptions: Vec::new(),
            source,
            capabilities,
        }
    }

    pub fn with_extra_descriptions(mut self, extra: Vec<String>) -> Self {
        self.extra_descriptions = extra;
        self
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    pub fn product_id(&self) -> u16 {
        self.info.product_id
    }

    pub fn software_version(&self) -> i16 {
        self.info.software_version
    }

    pub fn description(&self) -> &str {
        &self.info.description
    }

    /// Strings from Ext_Product_Data and extra Product_Data strings.
    pub fn extra_descriptions(&self) -> &[String] {
        &self.extra_descriptions
    }

    pub fn source(&self) -> CapabilitySource {
        self.source
    }

    pub fn capabilities(&self) -> &[ProtocolCapability] {
        &self.capabilities
    }

    pub fn supports(&self, protocol: ProtocolId) -> bool {
        self.capabilities.iter().any(|c| c.protocol == protocol)
    }

    /// The link protocol in use. Units that list none speak L001.
    pub fn link_protocol(&self) -> ProtocolId {
        self.capabilities
            .iter()
            .map(|c| c.protocol)
            .find(|p| p.kind == ProtocolKind::Link && *p != ProtocolId::L000)
            .unwrap_or(ProtocolId::L001)
    }

    /// The device command protocol. Defaults to the one paired with the
    /// link protocol.
    pub fn command_protocol(&self) -> ProtocolId {
        if self.supports(ProtocolId::A011) {
            ProtocolId::A011
        } else if self.supports(ProtocolId::A010) {
            ProtocolId::A010
        } else if self.link_protocol() == ProtocolId::L002 {
            ProtocolId::A011
        } else {
            ProtocolId::A010
        }
    }

    /// The capability serving `category`, if the unit has one.
    pub fn capability(&self, category: Category) -> Option<&ProtocolCapability> {
        self.capabilities
            .iter()
            .find(|c| c.protocol.category() == Some(category))
    }

    /// Every data category this unit supports, in profile order.
    pub fn categories(&self) -> Vec<Category> {
        let mut out = Vec::new();
        for category in self.capabilities.iter().filter_map(|c| c.protocol.category()) {
            if !out.contains(&category) {
                out.push(category);
            }
        }
        out
    }

    /// Check that `category` can be transferred in `direction` and return
    /// the capability to use.
    pub fn check(&self, category: Category, direction: Direction) -> Result<&ProtocolCapability> {
        let cap = self
            .capability(category)
            .ok_or(Error::UnsupportedCategory(category))?;
        if direction == Direction::Write && !cap.protocol.is_writable() {
            return Err(Error::UnsupportedDirection {
                category,
                direction,
            });
        }
        Ok(cap)
    }

    /// Check that the unit can send a screen bitmap. Only the A010 command
    /// set has a command for it.
    pub fn check_screenshot(&self) -> Result<()> {
        if self.command_protocol() == ProtocolId::A010 {
            Ok(())
        } else {
            Err(Error::UnsupportedCategory(Category::Screenshot))
        }
    }
}

/// Build a profile from the product exchange. Pure: the same responses and
/// table always give the same profile.
pub fn build_profile(
    product: ProductData,
    ext_strings: Vec<String>,
    reported: Option<Vec<ProtocolCapability>>,
    table: &ProductTable,
) -> Result<DeviceProfile> {
    let (source, capabilities) = match reported {
        Some(caps) => (CapabilitySource::Device, caps),
        None => {
            let caps = table
                .capabilities(product.product_id, product.software_version)?
                .ok_or(Error::UnknownDevice {
                    product_id: product.product_id,
                    software_version: product.software_version,
                })?;
            (CapabilitySource::ProductTable, caps)
        }
    };
    let info = DeviceInfo {
        product_id: product.product_id,
        software_version: product.software_version,
        description: product.description,
    };
    let mut extra = product.extra;
    extra.extend(ext_strings);
    Ok(DeviceProfile::new(info, source, capabilities).with_extra_descriptions(extra))
}

/// Run the product exchange over `link` and resolve the device profile.
pub async fn resolve(link: &mut Link, table: &ProductTable) -> Result<DeviceProfile> {
    link.send_packet(&commands::product_request()).await?;
    let reply = link.receive_packet().await?;
    if reply.id() != PID_PRODUCT_DATA {
        return Err(Error::Protocol(format!(
            "expected Product_Data, got packet {}",
            reply.id()
        )));
    }
    let product = ProductData::parse(reply.data())?;
    debug!(
        product_id = product.product_id,
        software_version = product.software_version,
        description = %product.description,
        "Product data received"
    );

    let mut ext_strings = Vec::new();
    let mut reported = None;
    while let Some(packet) = link.probe_packet().await? {
        match packet.id() {
            PID_EXT_PRODUCT_DATA => ext_strings.extend(split_strings(packet.data())),
            PID_PROTOCOL_ARRAY => {
                reported = Some(parse_protocol_array(packet.data())?);
                break;
            }
            other => debug!(pid = other, "Ignoring packet during capability probe"),
        }
    }

    let profile = build_profile(product, ext_strings, reported, table)?;
    info!(
        product_id = profile.product_id(),
        software_version = profile.software_version(),
        description = %profile.description(),
        source = ?profile.source(),
        protocols = profile.capabilities().len(),
        "Device profile resolved"
    );
    Ok(profile)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::link::tests::{ack, frame};
    use crate::link::LinkConfig;
    use crate::models::ProductEntry;
    use crate::packet::Packet;
    use navlink_test_harness::MockTransport;

    pub(crate) fn product_data(id: u16, version: i16, desc: &str) -> Packet {
        let mut data = id.to_le_bytes().to_vec();
        data.extend_from_slice(&version.to_le_bytes());
        data.extend_from_slice(desc.as_bytes());
        data.push(0);
        Packet::new(PID_PRODUCT_DATA, data).unwrap()
    }

    pub(crate) fn protocol_array(tags: &str) -> Packet {
        let mut data = Vec::new();
        for tag in tags.split_whitespace() {
            data.push(tag.as_bytes()[0]);
            let n: u16 = tag[1..].parse().unwrap();
            data.extend_from_slice(&n.to_le_bytes());
        }
        Packet::new(PID_PROTOCOL_ARRAY, data).unwrap()
    }

    #[test]
    fn protocol_id_display_and_parse() {
        assert_eq!(ProtocolId::A100.to_string(), "A100");
        assert_eq!(ProtocolId::L001.to_string(), "L001");
        assert_eq!("A302".parse::<ProtocolId>().unwrap(), ProtocolId::A302);
        assert!("D100".parse::<ProtocolId>().is_err());
        assert!("X100".parse::<ProtocolId>().is_err());
        assert!("A".parse::<ProtocolId>().is_err());
        assert_eq!(DataType(7).to_string(), "D007");
    }

    #[test]
    fn protocol_categories() {
        assert_eq!(ProtocolId::A201.category(), Some(Category::Routes));
        assert_eq!(ProtocolId::A302.category(), Some(Category::Tracks));
        assert_eq!(ProtocolId::A010.category(), None);
        assert!(ProtocolId::A301.is_writable());
        assert!(!ProtocolId::A302.is_writable());
        assert!(!ProtocolId::A500.is_writable());
    }

    #[test]
    fn parse_array_groups_datatypes() {
        let packet = protocol_array("P000 L001 A010 A100 D109 A201 D202 D109 D210 A302 D312 D302");
        let caps = parse_protocol_array(packet.data()).unwrap();
        assert_eq!(caps.len(), 6);
        assert_eq!(caps[0].protocol, ProtocolId::new(ProtocolKind::Physical, 0));
        assert_eq!(caps[3].protocol, ProtocolId::A100);
        assert_eq!(caps[3].datatypes, vec![DataType(109)]);
        assert_eq!(
            caps[4].datatypes,
            vec![DataType(202), DataType(109), DataType(210)]
        );
        assert_eq!(caps[5].datatype(1).unwrap(), DataType(302));
        assert!(caps[5].datatype(2).is_err());
    }

    #[test]
    fn parse_array_rejects_ragged_length() {
        let err = parse_protocol_array(&[b'A', 100]).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn parse_capability_list_matches_array() {
        let list = "L001 A010 A100 D100 A200 D201 D100";
        let from_list = parse_capability_list(list).unwrap();
        let from_array = parse_protocol_array(protocol_array(list).data()).unwrap();
        assert_eq!(from_list, from_array);
        assert!(parse_capability_list("A100 D1x0").is_err());
    }

    #[test]
    fn product_data_strings() {
        let mut data = vec![55, 0, 230, 0];
        data.extend_from_slice(b"GPS 120 Chinese\0Software v2.30\0");
        let p = ProductData::parse(&data).unwrap();
        assert_eq!(p.product_id, 55);
        assert_eq!(p.software_version, 230);
        assert_eq!(p.description, "GPS 120 Chinese");
        assert_eq!(p.extra, vec!["Software v2.30".to_string()]);

        let p = ProductData::parse(&[1, 0, 0, 0]).unwrap();
        assert_eq!(p.description, "");
        assert!(ProductData::parse(&[1, 0]).is_err());
    }

    #[test]
    fn profile_checks_direction() {
        let caps = parse_capability_list("L001 A010 A100 D108 A302 D312 D302 A500 D501").unwrap();
        let info = DeviceInfo {
            product_id: 1,
            software_version: 100,
            description: "test".into(),
        };
        let profile = DeviceProfile::new(info, CapabilitySource::Device, caps);
        assert!(profile.check(Category::Waypoints, Direction::Write).is_ok());
        assert!(profile.check(Category::Tracks, Direction::Read).is_ok());
        assert!(matches!(
            profile.check(Category::Tracks, Direction::Write),
            Err(Error::UnsupportedDirection {
                category: Category::Tracks,
                direction: Direction::Write
            })
        ));
        assert!(matches!(
            profile.check(Category::Routes, Direction::Read),
            Err(Error::UnsupportedCategory(Category::Routes))
        ));
        assert_eq!(
            profile.categories(),
            vec![Category::Waypoints, Category::Tracks, Category::Almanac]
        );
        assert_eq!(profile.link_protocol(), ProtocolId::L001);
        assert_eq!(profile.command_protocol(), ProtocolId::A010);
        assert!(profile.check_screenshot().is_ok());
    }

    #[test]
    fn maps_runs_and_screenshots() {
        let info = DeviceInfo {
            product_id: 484,
            software_version: 250,
            description: "Forerunner".into(),
        };
        let caps = parse_capability_list("L001 A010 A900 A906 D1015 A1000 D1009").unwrap();
        let profile = DeviceProfile::new(info.clone(), CapabilitySource::Device, caps);
        assert!(profile.check(Category::Maps, Direction::Write).is_ok());
        let runs = profile.check(Category::Runs, Direction::Read).unwrap();
        assert_eq!(runs.datatypes, vec![DataType(1009)]);
        assert!(matches!(
            profile.check(Category::Runs, Direction::Write),
            Err(Error::UnsupportedDirection { .. })
        ));
        assert_eq!(
            profile.categories(),
            vec![Category::Maps, Category::Laps, Category::Runs]
        );

        let caps = parse_capability_list("L002 A011 A100 D150").unwrap();
        let profile = DeviceProfile::new(info, CapabilitySource::Device, caps);
        assert!(matches!(
            profile.check_screenshot(),
            Err(Error::UnsupportedCategory(Category::Screenshot))
        ));
        assert!(matches!(
            profile.check(Category::Maps, Direction::Read),
            Err(Error::UnsupportedCategory(Category::Maps))
        ));
    }

    #[test]
    fn link_protocol_defaults() {
        let info = DeviceInfo {
            product_id: 1,
            software_version: 100,
            description: String::new(),
        };
        let caps = parse_capability_list("A100 D100").unwrap();
        let profile = DeviceProfile::new(info.clone(), CapabilitySource::ProductTable, caps);
        assert_eq!(profile.link_protocol(), ProtocolId::L001);

        let caps = parse_capability_list("L002 A100 D150").unwrap();
        let profile = DeviceProfile::new(info, CapabilitySource::ProductTable, caps);
        assert_eq!(profile.command_protocol(), ProtocolId::A011);
    }

    #[test]
    fn build_profile_is_idempotent() {
        let product = ProductData {
            product_id: 55,
            software_version: 230,
            description: "GPS 120 Chinese".into(),
            extra: vec![],
        };
        let table = ProductTable::builtin();
        let a = build_profile(product.clone(), vec![], None, &table).unwrap();
        let b = build_profile(product, vec![], None, &table).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn build_profile_unknown_device() {
        let product = ProductData {
            product_id: 9999,
            software_version: 100,
            description: String::new(),
            extra: vec![],
        };
        let err = build_profile(product, vec![], None, &ProductTable::empty()).unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownDevice {
                product_id: 9999,
                software_version: 100
            }
        ));
    }

    #[tokio::test]
    async fn resolve_from_product_table() {
        let mut mock = MockTransport::new();
        let mut reply = ack();
        reply.extend(frame(&product_data(55, 230, "GPS 120 Chinese")));
        mock.expect(&frame(&commands::product_request()), &reply);
        mock.expect_no_reply(&ack());

        let mut link = Link::new(Box::new(mock), LinkConfig::default());
        let profile = resolve(&mut link, &ProductTable::builtin()).await.unwrap();

        assert_eq!(profile.product_id(), 55);
        assert_eq!(profile.software_version(), 230);
        assert_eq!(profile.source(), CapabilitySource::ProductTable);
        let wpt = profile.capability(Category::Waypoints).unwrap();
        assert_eq!(wpt.protocol, ProtocolId::A100);
        assert_eq!(wpt.datatypes, vec![DataType(100)]);
    }

    #[tokio::test]
    async fn resolve_from_protocol_array() {
        let mut mock = MockTransport::new();
        let mut reply = ack();
        reply.extend(frame(&product_data(404, 300, "eTrex Vista")));
        mock.expect(&frame(&commands::product_request()), &reply);
        let mut ext = vec![];
        ext.extend_from_slice(b"VERBMAP Americas\0");
        mock.expect(
            &ack(),
            &frame(&Packet::new(PID_EXT_PRODUCT_DATA, ext).unwrap()),
        );
        mock.expect(
            &ack(),
            &frame(&protocol_array("P000 L001 A010 A100 D108 A201 D202 D108 D210")),
        );
        mock.expect_no_reply(&ack());

        let mut link = Link::new(Box::new(mock), LinkConfig::default());
        // An empty table: the array alone must be enough.
        let profile = resolve(&mut link, &ProductTable::empty()).await.unwrap();

        assert_eq!(profile.source(), CapabilitySource::Device);
        assert_eq!(profile.extra_descriptions(), &["VERBMAP Americas".to_string()]);
        let routes = profile.capability(Category::Routes).unwrap();
        assert_eq!(routes.protocol, ProtocolId::A201);
        assert_eq!(routes.datatypes.len(), 3);
    }

    #[tokio::test]
    async fn resolve_with_injected_table() {
        let mut mock = MockTransport::new();
        let mut reply = ack();
        reply.extend(frame(&product_data(7000, 100, "Synthetic")));
        mock.expect(&frame(&commands::product_request()), &reply);
        mock.expect_no_reply(&ack());

        let table = ProductTable::empty().with_entry(ProductEntry {
            product_id: 7000,
            name: "Synthetic",
            min_version: None,
            max_version: None,
            protocols: "L001 A010 A100 D103",
        });
        let mut link = Link::new(Box::new(mock), LinkConfig::default());
        let profile = resolve(&mut link, &table).await.unwrap();
        assert_eq!(
            profile.capability(Category::Waypoints).unwrap().datatypes,
            vec![DataType(103)]
        );
    }

    #[tokio::test]
    async fn resolve_unknown_device() {
        let mut mock = MockTransport::new();
        let mut reply = ack();
        reply.extend(frame(&product_data(9999, 100, "Mystery")));
        mock.expect(&frame(&commands::product_request()), &reply);
        mock.expect_no_reply(&ack());

        let mut link = Link::new(Box::new(mock), LinkConfig::default());
        let err = resolve(&mut link, &ProductTable::builtin()).await.unwrap_err();
        assert!(matches!(err, Error::UnknownDevice { product_id: 9999, .. }));
    }
}
