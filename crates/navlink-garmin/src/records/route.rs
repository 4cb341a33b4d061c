//! Route header and route link formats. Route waypoints use
//! [`WaypointFormat`](super::WaypointFormat).

use navlink_core::{Category, Error, Result, RouteHeader, RouteLink};

use super::{RecordReader, RecordWriter};
use crate::capability::DataType;

const LINK_SUBCLASS_DEFAULT: [u8; 18] = [
    0, 0, 0, 0, 0, 0, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
];

/// Route link classes: line, link, net, direct, and snap (0xFF).
fn is_link_class(class: u16) -> bool {
    class <= 3 || class == 0xFF
}

/// Route header record formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteHeaderFormat {
    /// Route number only.
    D200,
    /// Route number and a 20-character comment.
    D201,
    /// Route name.
    D202,
}

impl RouteHeaderFormat {
    pub fn from_datatype(datatype: DataType) -> Result<Self> {
        match datatype.0 {
            200 => Ok(Self::D200),
            201 => Ok(Self::D201),
            202 => Ok(Self::D202),
            n => Err(Error::UnsupportedFormat {
                category: Category::Routes,
                datatype: n,
            }),
        }
    }

    pub fn datatype(self) -> DataType {
        DataType(match self {
            Self::D200 => 200,
            Self::D201 => 201,
            Self::D202 => 202,
        })
    }

    pub fn decode(self, data: &[u8]) -> Result<RouteHeader> {
        let mut r = RecordReader::new(self.datatype(), data);
        let header = match self {
            Self::D200 => RouteHeader {
                number: Some(r.u8()?),
                ..Default::default()
            },
            Self::D201 => RouteHeader {
                number: Some(r.u8()?),
                comment: r.opt_fixed_str(20)?,
                ident: None,
            },
            Self::D202 => RouteHeader {
                ident: r.opt_cstr()?,
                ..Default::default()
            },
        };
        r.finish()?;
        Ok(header)
    }

    pub fn encode(self, header: &RouteHeader) -> Vec<u8> {
        let mut w = RecordWriter::new();
        match self {
            Self::D200 => {
                w.u8(header.number.unwrap_or(0));
            }
            Self::D201 => {
                w.u8(header.number.unwrap_or(0))
                    .fixed_str(header.comment.as_deref().unwrap_or(""), 20, b' ');
            }
            Self::D202 => {
                w.cstr(header.ident.as_deref().unwrap_or(""), 50);
            }
        }
        w.finish()
    }
}

/// Route link record formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteLinkFormat {
    D210,
}

impl RouteLinkFormat {
    pub fn from_datatype(datatype: DataType) -> Result<Self> {
        match datatype.0 {
            210 => Ok(Self::D210),
            n => Err(Error::UnsupportedFormat {
                category: Category::Routes,
                datatype: n,
            }),
        }
    }

    pub fn datatype(self) -> DataType {
        DataType(210)
    }

    pub fn decode(self, data: &[u8]) -> Result<RouteLink> {
        let mut r = RecordReader::new(self.datatype(), data);
        let class = r.u16()?;
        if !is_link_class(class) {
            return Err(r.invalid("link class", class));
        }
        let subclass = r.bytes(18)?;
        let ident = r.cstr()?;
        r.finish()?;
        Ok(RouteLink {
            class,
            subclass: if subclass == LINK_SUBCLASS_DEFAULT {
                Vec::new()
            } else {
                subclass
            },
            ident,
        })
    }

    pub fn encode(self, link: &RouteLink) -> Result<Vec<u8>> {
        let mut w = RecordWriter::new();
        w.u16(link.class);
        match link.subclass.len() {
            0 => {
                w.bytes(&LINK_SUBCLASS_DEFAULT);
            }
            18 => {
                w.bytes(&link.subclass);
            }
            n => {
                return Err(Error::InvalidParameter(format!(
                    "D210 subclass must be 18 bytes, got {n}"
                )))
            }
        }
        w.cstr(&link.ident, 50);
        Ok(w.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn d200_number() {
        let header = RouteHeaderFormat::D200.decode(&[7]).unwrap();
        assert_eq!(header.number, Some(7));
        assert!(RouteHeaderFormat::D200.decode(&[]).is_err());
    }

    #[test]
    fn d201_round_trip() {
        let header = RouteHeader {
            number: Some(3),
            comment: Some("TO THE COAST".into()),
            ident: None,
        };
        let bytes = RouteHeaderFormat::D201.encode(&header);
        assert_eq!(bytes.len(), 21);
        assert_eq!(RouteHeaderFormat::D201.decode(&bytes).unwrap(), header);
    }

    #[test]
    fn d202_name() {
        let header = RouteHeaderFormat::D202.decode(b"Coast road\0").unwrap();
        assert_eq!(header.ident.as_deref(), Some("Coast road"));
        assert!(RouteHeaderFormat::D202.decode(b"Coast road").is_err());
    }

    #[test]
    fn d210_round_trip() {
        let link = RouteLink {
            class: 3,
            subclass: Vec::new(),
            ident: String::new(),
        };
        let bytes = RouteLinkFormat::D210.encode(&link).unwrap();
        assert_eq!(bytes.len(), 2 + 18 + 1);
        assert_eq!(RouteLinkFormat::D210.decode(&bytes).unwrap(), link);
    }

    #[test]
    fn every_header_format_round_trips_its_fields() {
        for (format, header) in [
            (
                RouteHeaderFormat::D200,
                RouteHeader {
                    number: Some(19),
                    ..Default::default()
                },
            ),
            (
                RouteHeaderFormat::D201,
                RouteHeader {
                    number: Some(19),
                    comment: Some("TO THE COAST".into()),
                    ident: None,
                },
            ),
            (
                RouteHeaderFormat::D202,
                RouteHeader {
                    ident: Some("Highway 101 north".into()),
                    ..Default::default()
                },
            ),
        ] {
            let bytes = format.encode(&header);
            assert_eq!(format.decode(&bytes).unwrap(), header, "{format:?}");
        }
    }

    #[test]
    fn d210_keeps_subclass_and_ident() {
        let link = RouteLink {
            class: 0xFF,
            subclass: (10..28).collect(),
            ident: "US-101".into(),
        };
        let bytes = RouteLinkFormat::D210.encode(&link).unwrap();
        assert_eq!(RouteLinkFormat::D210.decode(&bytes).unwrap(), link);
    }

    #[test]
    fn d210_rejects_unknown_class() {
        let mut bytes = RouteLinkFormat::D210
            .encode(&RouteLink::default())
            .unwrap();
        bytes[0] = 9;
        let err = RouteLinkFormat::D210.decode(&bytes).unwrap_err();
        assert_eq!(err.to_string(), "malformed D210 record: invalid link class 9");
    }

    #[test]
    fn unsupported_header_format() {
        assert!(matches!(
            RouteHeaderFormat::from_datatype(DataType(203)),
            Err(Error::UnsupportedFormat {
                category: Category::Routes,
                datatype: 203
            })
        ));
    }
}
