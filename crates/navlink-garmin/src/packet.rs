//! Packet frame encoder/decoder.
//!
//! Every exchange with the device is a sequence of packets. This module
//! handles the pure byte-level encoding and decoding of packets on the
//! wire: checksums, DLE framing and DLE stuffing on the serial line, and
//! the fixed header of USB packets.
//!
//! # Serial frame format
//!
//! ```text
//! DLE <id> <len> [<data>...] <checksum> DLE ETX
//! ```
//!
//! - `DLE` is `0x10`, `ETX` is `0x03`
//! - `id`: packet id
//! - `len`: number of data bytes (0..=255)
//! - `checksum`: two's complement of the sum of `id`, `len` and every data
//!   byte, so that all of them plus the checksum sum to zero modulo 256
//! - any `DLE` occurring in `len`, `data` or `checksum` is sent twice
//!
//! # USB packet format
//!
//! ```text
//! <type> 0 0 0 <id:u16> 0 0 <size:u32> [<data>...]
//! ```
//!
//! - `type`: [`UsbLayer`], 0 for the USB protocol layer, 20 for
//!   application packets
//! - `id` and `size` are little-endian; there is no checksum and no
//!   acknowledgement

use bytes::{BufMut, BytesMut};
use navlink_core::error::{Error, Result};

/// Data link escape: frame delimiter and stuffing byte.
pub const DLE: u8 = 0x10;

/// End of text: second byte of the frame trailer.
pub const ETX: u8 = 0x03;

/// Largest payload a serial frame can carry.
pub const MAX_SERIAL_DATA_LEN: usize = u8::MAX as usize;

/// Largest payload any packet can carry.
pub const MAX_DATA_LEN: usize = 4096;

/// Length of the USB packet header.
pub const USB_HEADER_LEN: usize = 12;

/// A single packet: an id and its data.
///
/// Ids [`DLE`] and [`ETX`] are never assigned; [`decode_frame`] relies on
/// that to find frame starts. Serial frames carry one-byte ids and at most
/// [`MAX_SERIAL_DATA_LEN`] bytes; [`encode_frame`] rejects anything wider.
///
/// The length on the wire is always derived from `data`, so a packet can
/// never declare a length that differs from its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    id: u16,
    data: Vec<u8>,
}

impl Packet {
    /// Build a packet, rejecting payloads longer than [`MAX_DATA_LEN`].
    pub fn new(id: u16, data: Vec<u8>) -> Result<Self> {
        if data.len() > MAX_DATA_LEN {
            return Err(Error::InvalidParameter(format!(
                "packet {id} payload is {} bytes, limit is {MAX_DATA_LEN}",
                data.len()
            )));
        }
        Ok(Packet { id, data })
    }

    /// A packet with no data.
    pub fn empty(id: u16) -> Self {
        Packet {
            id,
            data: Vec::new(),
        }
    }

    /// A packet carrying a single byte.
    pub fn with_u8(id: u16, value: u8) -> Self {
        Packet {
            id,
            data: vec![value],
        }
    }

    /// A packet carrying one little-endian `u16` (commands, record counts).
    pub fn with_u16(id: u16, value: u16) -> Self {
        Packet {
            id,
            data: value.to_le_bytes().to_vec(),
        }
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Interpret the payload as a single little-endian `u16`.
    pub fn data_u16(&self) -> Option<u16> {
        match self.data.as_slice() {
            [lo, hi, ..] => Some(u16::from_le_bytes([*lo, *hi])),
            _ => None,
        }
    }

    /// Interpret the first four payload bytes as a little-endian `u32`.
    pub fn data_u32(&self) -> Option<u32> {
        match self.data.as_slice() {
            [a, b, c, d, ..] => Some(u32::from_le_bytes([*a, *b, *c, *d])),
            _ => None,
        }
    }
}

/// Compute the checksum over a packet id and its data.
///
/// # Example
///
/// ```
/// use navlink_garmin::packet::checksum;
///
/// // Product request: id 0xFE, no data.
/// assert_eq!(checksum(0xFE, &[]), 0x02);
/// ```
pub fn checksum(id: u8, data: &[u8]) -> u8 {
    let sum = data
        .iter()
        .fold(id.wrapping_add(data.len() as u8), |acc, &b| acc.wrapping_add(b));
    0u8.wrapping_sub(sum)
}

/// Encode a packet into a serial frame ready for transmission.
///
/// Fails for packet ids above 255 and payloads longer than
/// [`MAX_SERIAL_DATA_LEN`]; such packets only exist on USB.
///
/// # Example
///
/// ```
/// use navlink_garmin::packet::{encode_frame, Packet};
///
/// let bytes = encode_frame(&Packet::empty(0xFE)).unwrap();
/// assert_eq!(bytes, vec![0x10, 0xFE, 0x00, 0x02, 0x10, 0x03]);
/// ```
pub fn encode_frame(packet: &Packet) -> Result<Vec<u8>> {
    let id = u8::try_from(packet.id).map_err(|_| {
        Error::InvalidParameter(format!(
            "packet id {} does not fit a serial frame",
            packet.id
        ))
    })?;
    let len = u8::try_from(packet.data.len()).map_err(|_| {
        Error::InvalidParameter(format!(
            "packet {id} payload is {} bytes, a serial frame holds {MAX_SERIAL_DATA_LEN}",
            packet.data.len()
        ))
    })?;
    // Worst case every stuffable byte is a DLE.
    let mut buf = BytesMut::with_capacity(6 + 2 * (packet.data.len() + 2));
    buf.put_u8(DLE);
    buf.put_u8(id);
    put_stuffed(&mut buf, len);
    for &b in &packet.data {
        put_stuffed(&mut buf, b);
    }
    put_stuffed(&mut buf, checksum(id, &packet.data));
    buf.put_u8(DLE);
    buf.put_u8(ETX);
    Ok(buf.to_vec())
}

fn put_stuffed(buf: &mut BytesMut, b: u8) {
    buf.put_u8(b);
    if b == DLE {
        buf.put_u8(DLE);
    }
}

/// Result of attempting to decode a frame from a byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeResult {
    /// A complete, valid packet. The `usize` is the number of bytes consumed
    /// from the input buffer (including framing).
    Frame(Packet, usize),

    /// The buffer does not yet contain a complete frame. More data is needed.
    Incomplete,

    /// Bytes before the next possible frame start that belong to no frame
    /// (line noise, the tail of a frame whose start was lost). The `usize`
    /// is the number of bytes to discard. Not a protocol error.
    Noise(usize),

    /// A frame was started but is damaged: bad checksum, bad trailer, or an
    /// unstuffed DLE inside the body. The receiver should NAK it.
    Corrupt {
        /// Packet id from the frame header, for the NAK.
        id: u8,
        /// Number of bytes to discard.
        consumed: usize,
    },
}

/// Outcome of reading one unstuffed body byte.
enum BodyByte {
    Byte(u8),
    NeedMore,
    /// A DLE not followed by a second DLE, at the given offset.
    LoneDle(usize),
}

fn read_body_byte(buf: &[u8], pos: &mut usize) -> BodyByte {
    let Some(&b) = buf.get(*pos) else {
        return BodyByte::NeedMore;
    };
    if b != DLE {
        *pos += 1;
        return BodyByte::Byte(b);
    }
    match buf.get(*pos + 1) {
        None => BodyByte::NeedMore,
        Some(&DLE) => {
            *pos += 2;
            BodyByte::Byte(DLE)
        }
        Some(_) => BodyByte::LoneDle(*pos),
    }
}

/// Find the offset of the next frame start: a DLE followed by a byte that
/// is neither DLE nor ETX. Returns `Err(offset)` when the buffer ends in a
/// lone DLE at `offset` and more data is needed to decide.
fn find_frame_start(buf: &[u8]) -> std::result::Result<Option<usize>, usize> {
    let mut i = 0;
    while i < buf.len() {
        if buf[i] != DLE {
            i += 1;
            continue;
        }
        match buf.get(i + 1) {
            None => return Err(i),
            // Stuffed DLE or frame trailer: skip the pair.
            Some(&DLE) | Some(&ETX) => i += 2,
            Some(_) => return Ok(Some(i)),
        }
    }
    Ok(None)
}

/// Attempt to decode one frame from a byte buffer.
///
/// Returns [`DecodeResult::Frame`] on success with the number of bytes
/// consumed (the caller should drain these from the buffer),
/// [`DecodeResult::Noise`] when leading bytes must be skipped first,
/// [`DecodeResult::Corrupt`] for a damaged frame and
/// [`DecodeResult::Incomplete`] if no complete frame is available yet.
///
/// # Example
///
/// ```
/// use navlink_garmin::packet::{decode_frame, DecodeResult};
///
/// // ACK with no data.
/// let buf = vec![0x10, 0x06, 0x00, 0xFA, 0x10, 0x03];
/// match decode_frame(&buf) {
///     DecodeResult::Frame(packet, consumed) => {
///         assert_eq!(packet.id(), 0x06);
///         assert_eq!(consumed, 6);
///     }
///     _ => panic!("expected a frame"),
/// }
/// ```
pub fn decode_frame(buf: &[u8]) -> DecodeResult {
    let start = match find_frame_start(buf) {
        Ok(Some(pos)) => pos,
        Ok(None) => {
            if buf.is_empty() {
                return DecodeResult::Incomplete;
            }
            return DecodeResult::Noise(buf.len());
        }
        Err(pos) if pos > 0 => return DecodeResult::Noise(pos),
        Err(_) => return DecodeResult::Incomplete,
    };
    if start > 0 {
        return DecodeResult::Noise(start);
    }

    let id = buf[1];
    let mut pos = 2;
    let corrupt = |consumed: usize| DecodeResult::Corrupt { id, consumed };

    let len = match read_body_byte(buf, &mut pos) {
        BodyByte::Byte(b) => b as usize,
        BodyByte::NeedMore => return DecodeResult::Incomplete,
        BodyByte::LoneDle(at) => return corrupt(at),
    };

    let mut data = Vec::with_capacity(len);
    while data.len() < len {
        match read_body_byte(buf, &mut pos) {
            BodyByte::Byte(b) => data.push(b),
            BodyByte::NeedMore => return DecodeResult::Incomplete,
            BodyByte::LoneDle(at) => return corrupt(at),
        }
    }

    let received = match read_body_byte(buf, &mut pos) {
        BodyByte::Byte(b) => b,
        BodyByte::NeedMore => return DecodeResult::Incomplete,
        BodyByte::LoneDle(at) => return corrupt(at),
    };

    match (buf.get(pos), buf.get(pos + 1)) {
        (Some(&DLE), Some(&ETX)) => pos += 2,
        (Some(&DLE), None) | (None, _) => return DecodeResult::Incomplete,
        // Resume scanning at the unexpected byte; it may start the next frame.
        _ => return corrupt(pos),
    }

    if received != checksum(id, &data) {
        return corrupt(pos);
    }

    DecodeResult::Frame(
        Packet {
            id: u16::from(id),
            data,
        },
        pos,
    )
}

/// Layer a USB packet belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UsbLayer {
    /// Session control between host and device (type 0).
    Protocol,
    /// Application packets, the same ids the serial link carries (type 20).
    Application,
}

impl UsbLayer {
    pub fn packet_type(self) -> u8 {
        match self {
            UsbLayer::Protocol => 0,
            UsbLayer::Application => 20,
        }
    }

    pub fn from_packet_type(packet_type: u8) -> Option<Self> {
        match packet_type {
            0 => Some(UsbLayer::Protocol),
            20 => Some(UsbLayer::Application),
            _ => None,
        }
    }
}

/// Encode a packet for a USB bulk endpoint.
///
/// # Example
///
/// ```
/// use navlink_garmin::packet::{encode_usb_packet, Packet, UsbLayer};
///
/// // Start_Session: protocol layer, id 5, no data.
/// let bytes = encode_usb_packet(UsbLayer::Protocol, &Packet::empty(5));
/// assert_eq!(bytes, vec![0, 0, 0, 0, 5, 0, 0, 0, 0, 0, 0, 0]);
/// ```
pub fn encode_usb_packet(layer: UsbLayer, packet: &Packet) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(USB_HEADER_LEN + packet.data.len());
    buf.put_u8(layer.packet_type());
    buf.put_bytes(0, 3);
    buf.put_u16_le(packet.id);
    buf.put_bytes(0, 2);
    buf.put_u32_le(packet.data.len() as u32);
    buf.put_slice(&packet.data);
    buf.to_vec()
}

/// Result of attempting to decode a USB packet from a byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsbDecodeResult {
    /// A complete packet and the number of bytes it occupied.
    Packet(UsbLayer, Packet, usize),

    /// The buffer does not yet hold a complete packet.
    Incomplete,

    /// The header cannot belong to any packet. USB delivers whole
    /// transfers, so there is no resynchronizing; the buffer is garbage.
    Invalid(String),
}

/// Attempt to decode one USB packet from the front of `buf`.
pub fn decode_usb_packet(buf: &[u8]) -> UsbDecodeResult {
    if buf.len() < USB_HEADER_LEN {
        return UsbDecodeResult::Incomplete;
    }
    let Some(layer) = UsbLayer::from_packet_type(buf[0]) else {
        return UsbDecodeResult::Invalid(format!("unknown USB packet type {}", buf[0]));
    };
    let id = u16::from_le_bytes([buf[4], buf[5]]);
    let size = u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]) as usize;
    if size > MAX_DATA_LEN {
        return UsbDecodeResult::Invalid(format!(
            "USB packet {id} declares {size} data bytes, limit is {MAX_DATA_LEN}"
        ));
    }
    let end = USB_HEADER_LEN + size;
    if buf.len() < end {
        return UsbDecodeResult::Incomplete;
    }
    let packet = Packet {
        id,
        data: buf[USB_HEADER_LEN..end].to_vec(),
    };
    UsbDecodeResult::Packet(layer, packet, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_sums_to_zero() {
        let data = [0x01, 0x02, 0xFF, 0x80];
        let c = checksum(0x23, &data);
        let total = data
            .iter()
            .fold(0x23u8.wrapping_add(4), |a, &b| a.wrapping_add(b))
            .wrapping_add(c);
        assert_eq!(total, 0);
    }

    fn frame(packet: &Packet) -> Vec<u8> {
        encode_frame(packet).unwrap()
    }

    #[test]
    fn packet_rejects_oversize_payload() {
        assert!(Packet::new(35, vec![0; MAX_DATA_LEN]).is_ok());
        let result = Packet::new(35, vec![0; MAX_DATA_LEN + 1]);
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn serial_frame_limits() {
        assert!(encode_frame(&Packet::new(35, vec![0; 255]).unwrap()).is_ok());
        let err = encode_frame(&Packet::new(35, vec![0; 256]).unwrap()).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)), "got {err:?}");
        let err = encode_frame(&Packet::empty(990)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid parameter: packet id 990 does not fit a serial frame"
        );
    }

    #[test]
    fn encode_command_packet() {
        // Command_Data(10) "transfer waypoints" (7).
        let bytes = frame(&Packet::with_u16(10, 7));
        assert_eq!(bytes, vec![0x10, 0x0A, 0x02, 0x07, 0x00, 0xED, 0x10, 0x03]);
    }

    #[test]
    fn encode_stuffs_dle_in_body() {
        // Length 0x10 and every data DLE get doubled.
        let packet = Packet::new(35, vec![DLE; 16]).unwrap();
        let bytes = frame(&packet);
        assert_eq!(&bytes[..4], &[DLE, 35, DLE, DLE]);
        assert_eq!(bytes.len(), 2 + 2 + 32 + 1 + 2);
        match decode_frame(&bytes) {
            DecodeResult::Frame(decoded, consumed) => {
                assert_eq!(decoded, packet);
                assert_eq!(consumed, bytes.len());
            }
            other => panic!("expected a frame, got {other:?}"),
        }
    }

    #[test]
    fn checksum_equal_to_dle_is_stuffed() {
        // id 0xF0 with no data: checksum = 0x10.
        let bytes = frame(&Packet::empty(0xF0));
        assert_eq!(bytes, vec![DLE, 0xF0, 0x00, DLE, DLE, DLE, ETX]);
        assert!(matches!(decode_frame(&bytes), DecodeResult::Frame(_, 7)));
    }

    #[test]
    fn decode_round_trip() {
        let packet = Packet::new(35, (0u8..=200).collect()).unwrap();
        let bytes = frame(&packet);
        assert_eq!(
            decode_frame(&bytes),
            DecodeResult::Frame(packet, bytes.len())
        );
    }

    #[test]
    fn decode_needs_more_data() {
        let bytes = frame(&Packet::with_u16(27, 3));
        for cut in 0..bytes.len() {
            assert_eq!(
                decode_frame(&bytes[..cut]),
                DecodeResult::Incomplete,
                "cut at {cut}"
            );
        }
    }

    #[test]
    fn decode_bad_checksum_is_corrupt() {
        let mut bytes = frame(&Packet::with_u16(27, 3));
        bytes[3] ^= 0x01;
        assert_eq!(
            decode_frame(&bytes),
            DecodeResult::Corrupt {
                id: 27,
                consumed: bytes.len()
            }
        );
    }

    #[test]
    fn decode_skips_leading_noise() {
        let mut bytes = vec![0x55, 0xAA, DLE, ETX];
        let frame = frame(&Packet::empty(6));
        bytes.extend_from_slice(&frame);
        assert_eq!(decode_frame(&bytes), DecodeResult::Noise(4));
        assert!(matches!(
            decode_frame(&bytes[4..]),
            DecodeResult::Frame(_, 6)
        ));
    }

    #[test]
    fn decode_all_noise() {
        assert_eq!(decode_frame(&[0x01, 0x02]), DecodeResult::Noise(2));
        assert_eq!(decode_frame(&[]), DecodeResult::Incomplete);
        assert_eq!(decode_frame(&[0x01, DLE]), DecodeResult::Noise(1));
        assert_eq!(decode_frame(&[DLE]), DecodeResult::Incomplete);
    }

    #[test]
    fn truncated_frame_followed_by_new_frame() {
        // A frame that lost its tail, then a complete frame.
        let good = frame(&Packet::with_u16(10, 7));
        let mut bytes = vec![DLE, 35, 20, 0x01, 0x02];
        bytes.extend_from_slice(&good);

        match decode_frame(&bytes) {
            DecodeResult::Corrupt { id, consumed } => {
                assert_eq!(id, 35);
                assert_eq!(consumed, 5);
                assert_eq!(
                    decode_frame(&bytes[consumed..]),
                    DecodeResult::Frame(Packet::with_u16(10, 7), good.len())
                );
            }
            other => panic!("expected corrupt, got {other:?}"),
        }
    }

    #[test]
    fn bad_trailer_is_corrupt() {
        let mut bytes = frame(&Packet::empty(6));
        let n = bytes.len();
        bytes[n - 1] = 0x04;
        assert!(matches!(
            decode_frame(&bytes),
            DecodeResult::Corrupt { id: 6, .. }
        ));
    }

    #[test]
    fn data_u16_reads_little_endian() {
        assert_eq!(Packet::with_u16(27, 0x0102).data_u16(), Some(0x0102));
        assert_eq!(Packet::empty(12).data_u16(), None);
    }

    #[test]
    fn data_u32_reads_little_endian() {
        let packet = Packet::new(6, vec![0x78, 0x56, 0x34, 0x12]).unwrap();
        assert_eq!(packet.data_u32(), Some(0x1234_5678));
        assert_eq!(Packet::with_u16(6, 1).data_u32(), None);
    }

    #[test]
    fn usb_packet_layout() {
        let packet = Packet::new(990, vec![1, 2, 3]).unwrap();
        let bytes = encode_usb_packet(UsbLayer::Application, &packet);
        assert_eq!(
            bytes,
            vec![20, 0, 0, 0, 0xDE, 0x03, 0, 0, 3, 0, 0, 0, 1, 2, 3]
        );
        assert_eq!(
            decode_usb_packet(&bytes),
            UsbDecodeResult::Packet(UsbLayer::Application, packet, 15)
        );
    }

    #[test]
    fn usb_packet_needs_more_data() {
        let bytes = encode_usb_packet(UsbLayer::Application, &Packet::with_u16(10, 7));
        for cut in 0..bytes.len() {
            assert_eq!(
                decode_usb_packet(&bytes[..cut]),
                UsbDecodeResult::Incomplete,
                "cut at {cut}"
            );
        }
    }

    #[test]
    fn usb_packet_decodes_first_of_several() {
        let mut bytes = encode_usb_packet(UsbLayer::Protocol, &Packet::with_u8(6, 9));
        let first_len = bytes.len();
        bytes.extend(encode_usb_packet(UsbLayer::Application, &Packet::empty(12)));
        match decode_usb_packet(&bytes) {
            UsbDecodeResult::Packet(UsbLayer::Protocol, packet, consumed) => {
                assert_eq!(packet.id(), 6);
                assert_eq!(consumed, first_len);
            }
            other => panic!("expected a protocol packet, got {other:?}"),
        }
    }

    #[test]
    fn usb_packet_rejects_bad_header() {
        let mut bytes = encode_usb_packet(UsbLayer::Application, &Packet::empty(12));
        bytes[0] = 7;
        assert!(matches!(
            decode_usb_packet(&bytes),
            UsbDecodeResult::Invalid(_)
        ));
        let mut bytes = encode_usb_packet(UsbLayer::Application, &Packet::empty(12));
        bytes[8..12].copy_from_slice(&(MAX_DATA_LEN as u32 + 1).to_le_bytes());
        assert!(matches!(
            decode_usb_packet(&bytes),
            UsbDecodeResult::Invalid(_)
        ));
    }
}
