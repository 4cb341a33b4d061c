//! Garmin device interface protocol backend for navlink.
//!
//! This crate implements the binary protocol spoken by Garmin-family GPS
//! receivers over a serial cable or, with the `usb` feature, a native USB
//! port. It provides:
//!
//! - **Framing** ([`packet`]) -- encode and decode `DLE`-delimited serial
//!   packets with byte stuffing and checksums, and 12-byte-header USB
//!   packets.
//! - **Link layer** ([`link`]) -- ACK/NAK acknowledgement, bounded
//!   retransmission, USB session start and the Records / Xfer_Cmplt
//!   transfer exchange with progress reporting.
//! - **Packet ids and commands** ([`commands`]) -- the L001/L002 packet id
//!   tables and the A010/A011 command tables.
//! - **Capability resolution** ([`capability`], [`models`]) -- the product
//!   exchange, protocol array parsing and the product table fallback for
//!   units that do not report their protocols.
//! - **Record codecs** ([`records`]) -- every supported `Dnnn` record
//!   format mapped onto the `navlink-core` entity model.
//! - **GarminSession** ([`session`]) -- the per-category dispatcher,
//!   screenshots, map memory and the
//!   [`NavDevice`](navlink_core::NavDevice) implementation.
//! - **GarminBuilder** ([`builder`]) -- fluent builder for opening sessions.
//!
//! # Example
//!
//! ```
//! use navlink_garmin::packet::{decode_frame, encode_frame, DecodeResult, Packet};
//!
//! // Product_Rqst: id 254, no payload
//! let frame = encode_frame(&Packet::empty(254)).unwrap();
//! assert_eq!(frame, vec![0x10, 0xFE, 0x00, 0x02, 0x10, 0x03]);
//!
//! if let DecodeResult::Frame(packet, consumed) = decode_frame(&frame) {
//!     assert_eq!(packet.id(), 254);
//!     assert_eq!(consumed, frame.len());
//! }
//! ```

pub mod builder;
pub mod capability;
pub mod commands;
pub mod link;
pub mod models;
pub mod packet;
pub mod records;
pub mod session;

pub use builder::{connect, GarminBuilder, USB_PORT};
pub use capability::{DeviceProfile, ProtocolCapability, ProtocolId};
pub use link::{AckPayload, Framing, LinkConfig, ProgressFn};
pub use models::ProductTable;
pub use session::GarminSession;
