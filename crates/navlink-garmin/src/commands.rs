//! Packet ids, device command codes and packet builders.
//!
//! Packet ids come in three layers. The basic link protocol (L000) ids are
//! fixed for every device, as are the USB session control ids. The application packet ids depend on the link
//! protocol the device reports (L001 or L002), and the command codes sent
//! inside Command_Data packets depend on the device command protocol
//! (A010 or A011). The tables here are selected once per session from the
//! resolved device profile.
//!
//! All functions are pure; they produce [`Packet`]s without performing any
//! I/O.

use navlink_core::{Error, Result};

use crate::capability::ProtocolId;
use crate::packet::Packet;

// ---------------------------------------------------------------
// Basic link protocol (L000)
// ---------------------------------------------------------------

/// Positive acknowledgement.
pub const PID_ACK: u16 = 6;

/// Negative acknowledgement.
pub const PID_NAK: u16 = 21;

/// Protocol capability array, sent unsolicited after Product_Data.
pub const PID_PROTOCOL_ARRAY: u16 = 253;

/// Host request for the product description.
pub const PID_PRODUCT_RQST: u16 = 254;

/// Product id, software version and description strings.
pub const PID_PRODUCT_DATA: u16 = 255;

/// Additional description strings, sent by some units after Product_Data.
pub const PID_EXT_PRODUCT_DATA: u16 = 248;

// ---------------------------------------------------------------
// USB protocol layer
// ---------------------------------------------------------------

/// Device has bulk data queued; the host should read the bulk endpoint.
pub const USB_DATA_AVAILABLE: u16 = 2;

/// Host request to open a USB session.
pub const USB_START_SESSION: u16 = 5;

/// Reply to Start_Session, carrying the unit id.
pub const USB_SESSION_STARTED: u16 = 6;

// ---------------------------------------------------------------
// Memory and screen packets
// ---------------------------------------------------------------

/// Write the given memory chunk.
pub const PID_MEM_WRITE: u16 = 36;

/// Leave write mode for a memory region.
pub const PID_MEM_WRDI: u16 = 45;

/// Screen bitmap section (header, color table or pixel rows).
pub const PID_SCREEN_DATA: u16 = 69;

/// Device reply to Mem_Wren: the region is erased and writable.
pub const PID_MEM_WEL: u16 = 74;

/// Enter write mode for a memory region, erasing it.
pub const PID_MEM_WREN: u16 = 75;

/// Request a file from a memory region.
pub const PID_MEM_READ: u16 = 89;

/// One chunk of a memory file, or a bare result code.
pub const PID_MEM_DATA: u16 = 90;

/// Number of Mem_Data chunks that follow.
pub const PID_MEM_RECORDS: u16 = 91;

/// Memory region, tile count and size.
pub const PID_CAPACITY_DATA: u16 = 95;

// ---------------------------------------------------------------
// Application packet ids
// ---------------------------------------------------------------

/// Application packet ids for one link protocol.
///
/// Packets that only exist on the L001 link are `None` on L002.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkPids {
    pub protocol: ProtocolId,
    pub command_data: u16,
    pub xfer_cmplt: u16,
    pub date_time_data: u16,
    pub position_data: u16,
    pub prx_wpt_data: u16,
    pub records: u16,
    pub rte_hdr: u16,
    pub rte_wpt_data: u16,
    pub almanac_data: u16,
    pub wpt_data: u16,
    pub trk_data: Option<u16>,
    pub pvt_data: Option<u16>,
    pub rte_link_data: Option<u16>,
    pub trk_hdr: Option<u16>,
    pub flightbook_record: Option<u16>,
    pub lap: Option<u16>,
    pub wpt_cat: Option<u16>,
    /// Satellite signal array, streamed alongside PVT data.
    pub satellite_data: Option<u16>,
    pub unit_id: Option<u16>,
    /// Fitness run records; id 990 only fits a USB packet.
    pub run: Option<u16>,
}

/// Link protocol 1, used by most units.
pub static L001: LinkPids = LinkPids {
    protocol: ProtocolId::L001,
    command_data: 10,
    xfer_cmplt: 12,
    date_time_data: 14,
    position_data: 17,
    prx_wpt_data: 19,
    records: 27,
    rte_hdr: 29,
    rte_wpt_data: 30,
    almanac_data: 31,
    wpt_data: 35,
    trk_data: Some(34),
    pvt_data: Some(51),
    rte_link_data: Some(98),
    trk_hdr: Some(99),
    flightbook_record: Some(134),
    lap: Some(149),
    wpt_cat: Some(152),
    satellite_data: Some(114),
    unit_id: Some(38),
    run: Some(990),
};

/// Link protocol 2, used by panel-mounted aviation units.
pub static L002: LinkPids = LinkPids {
    protocol: ProtocolId::L002,
    almanac_data: 4,
    command_data: 11,
    xfer_cmplt: 12,
    date_time_data: 20,
    position_data: 24,
    prx_wpt_data: 27,
    records: 35,
    rte_hdr: 37,
    rte_wpt_data: 39,
    wpt_data: 43,
    trk_data: None,
    pvt_data: None,
    rte_link_data: None,
    trk_hdr: None,
    flightbook_record: None,
    lap: None,
    wpt_cat: None,
    satellite_data: None,
    unit_id: None,
    run: None,
};

impl LinkPids {
    /// Select the packet id table for a link protocol.
    pub fn for_protocol(protocol: ProtocolId) -> Result<&'static LinkPids> {
        match protocol {
            ProtocolId::L001 => Ok(&L001),
            ProtocolId::L002 => Ok(&L002),
            other => Err(Error::Protocol(format!(
                "unsupported link protocol {other}"
            ))),
        }
    }

    /// Unwrap an L001-only packet id.
    pub fn require(&self, pid: Option<u16>, what: &str) -> Result<u16> {
        pid.ok_or_else(|| {
            Error::Protocol(format!(
                "link protocol {} has no {what} packet",
                self.protocol
            ))
        })
    }
}

// ---------------------------------------------------------------
// Device command codes
// ---------------------------------------------------------------

/// Command codes for one device command protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSet {
    pub protocol: ProtocolId,
    pub abort_transfer: u16,
    pub transfer_alm: u16,
    pub transfer_prx: u16,
    pub transfer_rte: u16,
    pub transfer_time: u16,
    pub transfer_wpt: u16,
    pub turn_off_pwr: u16,
    pub transfer_posn: Option<u16>,
    pub transfer_trk: Option<u16>,
    pub start_pvt_data: Option<u16>,
    pub stop_pvt_data: Option<u16>,
    pub flightbook_transfer: Option<u16>,
    pub transfer_laps: Option<u16>,
    pub transfer_wpt_cats: Option<u16>,
    pub transfer_unit_id: Option<u16>,
    pub transfer_screenbitmap: Option<u16>,
    pub transfer_mem: Option<u16>,
    pub transfer_runs: Option<u16>,
}

/// Device command protocol 1.
pub static A010: CommandSet = CommandSet {
    protocol: ProtocolId::A010,
    abort_transfer: 0,
    transfer_alm: 1,
    transfer_posn: Some(2),
    transfer_prx: 3,
    transfer_rte: 4,
    transfer_time: 5,
    transfer_trk: Some(6),
    transfer_wpt: 7,
    turn_off_pwr: 8,
    transfer_unit_id: Some(14),
    transfer_screenbitmap: Some(32),
    start_pvt_data: Some(49),
    stop_pvt_data: Some(50),
    transfer_mem: Some(63),
    flightbook_transfer: Some(92),
    transfer_laps: Some(117),
    transfer_wpt_cats: Some(121),
    transfer_runs: Some(450),
};

/// Device command protocol 2, paired with the L002 link.
pub static A011: CommandSet = CommandSet {
    protocol: ProtocolId::A011,
    abort_transfer: 0,
    transfer_alm: 4,
    transfer_prx: 17,
    transfer_rte: 8,
    transfer_time: 20,
    transfer_wpt: 21,
    turn_off_pwr: 26,
    transfer_posn: None,
    transfer_trk: None,
    start_pvt_data: None,
    stop_pvt_data: None,
    flightbook_transfer: None,
    transfer_laps: None,
    transfer_wpt_cats: None,
    transfer_unit_id: None,
    transfer_screenbitmap: None,
    transfer_mem: None,
    transfer_runs: None,
};

impl CommandSet {
    /// Select the command table for a device command protocol.
    pub fn for_protocol(protocol: ProtocolId) -> Result<&'static CommandSet> {
        match protocol {
            ProtocolId::A010 => Ok(&A010),
            ProtocolId::A011 => Ok(&A011),
            other => Err(Error::Protocol(format!(
                "unsupported device command protocol {other}"
            ))),
        }
    }

    /// Unwrap an A010-only command code.
    pub fn require(&self, cmd: Option<u16>, what: &str) -> Result<u16> {
        cmd.ok_or_else(|| {
            Error::Protocol(format!(
                "device command protocol {} has no {what} command",
                self.protocol
            ))
        })
    }
}

// ---------------------------------------------------------------
// Packet builders
// ---------------------------------------------------------------

/// Build the Product_Rqst packet that opens every session.
pub fn product_request() -> Packet {
    Packet::empty(PID_PRODUCT_RQST)
}

/// Build a Command_Data packet.
pub fn command(pids: &LinkPids, cmd: u16) -> Packet {
    Packet::with_u16(pids.command_data, cmd)
}

/// Build the Records packet announcing `count` data packets.
pub fn records(pids: &LinkPids, count: u16) -> Packet {
    Packet::with_u16(pids.records, count)
}

/// Build the Xfer_Cmplt packet closing a transfer started by `cmd`.
pub fn xfer_cmplt(pids: &LinkPids, cmd: u16) -> Packet {
    Packet::with_u16(pids.xfer_cmplt, cmd)
}

/// Build a Mem_Read request for `filename` in memory `region`. An empty
/// name reads the whole region.
pub fn mem_read(region: u16, filename: &str) -> Result<Packet> {
    let mut data = vec![0; 4];
    data.extend_from_slice(&region.to_le_bytes());
    data.extend_from_slice(filename.as_bytes());
    data.push(0);
    Packet::new(PID_MEM_READ, data)
}

/// Build a Mem_Write packet carrying `chunk` at byte `offset`.
pub fn mem_write(offset: u32, chunk: &[u8]) -> Result<Packet> {
    let mut data = Vec::with_capacity(4 + chunk.len());
    data.extend_from_slice(&offset.to_le_bytes());
    data.extend_from_slice(chunk);
    Packet::new(PID_MEM_WRITE, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::encode_frame;

    #[test]
    fn link_tables_by_protocol() {
        assert_eq!(LinkPids::for_protocol(ProtocolId::L001).unwrap().wpt_data, 35);
        assert_eq!(LinkPids::for_protocol(ProtocolId::L002).unwrap().wpt_data, 43);
        assert!(LinkPids::for_protocol(ProtocolId::A100).is_err());
    }

    #[test]
    fn l002_lacks_tracks() {
        let err = L002.require(L002.trk_data, "track data").unwrap_err();
        assert_eq!(
            err.to_string(),
            "protocol error: link protocol L002 has no track data packet"
        );
        assert_eq!(L001.require(L001.trk_data, "track data").unwrap(), 34);
    }

    #[test]
    fn command_tables_by_protocol() {
        assert_eq!(CommandSet::for_protocol(ProtocolId::A010).unwrap().transfer_wpt, 7);
        assert_eq!(CommandSet::for_protocol(ProtocolId::A011).unwrap().transfer_wpt, 21);
        assert!(A011.require(A011.start_pvt_data, "PVT").is_err());
    }

    #[test]
    fn product_request_frame() {
        assert_eq!(
            encode_frame(&product_request()).unwrap(),
            vec![0x10, 0xFE, 0x00, 0x02, 0x10, 0x03]
        );
    }

    #[test]
    fn a011_lacks_memory_and_screen_commands() {
        assert_eq!(A010.require(A010.transfer_mem, "memory").unwrap(), 63);
        assert!(A011.require(A011.transfer_mem, "memory").is_err());
        assert!(A011.transfer_screenbitmap.is_none());
        assert_eq!(L001.run, Some(990));
        assert_eq!(L002.run, None);
    }

    #[test]
    fn memory_packets() {
        let read = mem_read(10, "MAPSOURC.MPS").unwrap();
        assert_eq!(read.id(), PID_MEM_READ);
        assert_eq!(&read.data()[..6], &[0, 0, 0, 0, 10, 0]);
        assert_eq!(&read.data()[6..], b"MAPSOURC.MPS\0");
        let write = mem_write(0x0102, &[9, 8]).unwrap();
        assert_eq!(write.data(), &[0x02, 0x01, 0, 0, 9, 8]);
    }

    #[test]
    fn transfer_packets() {
        assert_eq!(command(&L001, 7), Packet::with_u16(10, 7));
        assert_eq!(command(&L002, 21), Packet::with_u16(11, 21));
        assert_eq!(records(&L001, 3).data(), &[3, 0]);
        assert_eq!(xfer_cmplt(&L001, 7), Packet::with_u16(12, 7));
    }
}
