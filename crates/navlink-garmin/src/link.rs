//! Reliable packet exchange over a [`Transport`].
//!
//! [`Link`] owns the transport and implements the acknowledgement protocol:
//! every data packet is answered with ACK or NAK, a sender retransmits on
//! NAK or silence, and a receiver NAKs each corrupt frame it sees. On top
//! of that it runs the multi-packet transfer exchange (Records, data
//! packets, Xfer_Cmplt) that every bulk category uses.
//!
//! Over USB ([`Framing::Usb`]) the bus already guarantees delivery, so no
//! ACK or NAK is exchanged; the link instead opens a session with the
//! device before the first application packet.
//!
//! Retries are bounded by [`LinkConfig::max_retries`]; once exhausted the
//! link reports [`Error::Link`].

use std::time::Duration;

use tracing::{debug, trace, warn};

use navlink_core::error::{Error, Result};
use navlink_core::transport::Transport;

use crate::commands::{self, LinkPids, PID_ACK, PID_NAK, USB_SESSION_STARTED, USB_START_SESSION};
use crate::packet::{
    decode_frame, decode_usb_packet, encode_frame, encode_usb_packet, DecodeResult, Packet,
    UsbDecodeResult, UsbLayer,
};

/// Transfer progress callback, called with (packets done, packets total).
pub type ProgressFn = dyn FnMut(usize, usize) + Send;

/// What ACK and NAK packets carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckPayload {
    /// No data.
    #[default]
    Empty,
    /// The id of the packet being acknowledged, as one byte. Some units
    /// want this (and some send it).
    PacketId,
}

/// How packets are laid out on the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Framing {
    /// DLE-stuffed frames with checksums, acknowledged one by one.
    #[default]
    Serial,
    /// 12-byte header packets on USB bulk/interrupt endpoints.
    Usb,
}

/// Link-layer timing and retry policy.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// How long to wait for the next packet before counting a retry.
    pub read_timeout: Duration,
    /// How long to wait for optional packets (Protocol_Array,
    /// Ext_Product_Data) before concluding the device does not send them.
    pub probe_timeout: Duration,
    /// Retransmissions (or re-reads) allowed after the first attempt.
    pub max_retries: u32,
    pub ack_payload: AckPayload,
    pub framing: Framing,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            read_timeout: Duration::from_secs(1),
            probe_timeout: Duration::from_millis(500),
            max_retries: 3,
            ack_payload: AckPayload::Empty,
            framing: Framing::Serial,
        }
    }
}

/// One frame pulled off the wire.
enum Incoming {
    Packet(Packet),
    /// USB protocol-layer packet.
    Control(Packet),
    Corrupt(u8),
}

/// Reliable packet link to a device.
pub struct Link {
    transport: Box<dyn Transport>,
    config: LinkConfig,
    /// Bytes received but not yet decoded.
    rx_buf: Vec<u8>,
}

impl Link {
    pub fn new(transport: Box<dyn Transport>, config: LinkConfig) -> Self {
        Link {
            transport,
            config,
            rx_buf: Vec::with_capacity(1024),
        }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn framing(&self) -> Framing {
        self.config.framing
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Discard anything buffered, both here and in the transport.
    pub async fn clear_input(&mut self) -> Result<()> {
        self.rx_buf.clear();
        self.transport.clear_input().await
    }

    pub async fn close(&mut self) -> Result<()> {
        self.rx_buf.clear();
        self.transport.close().await
    }

    /// Read the next frame, waiting at most `timeout` for each chunk.
    async fn read_frame(&mut self, timeout: Duration) -> Result<Incoming> {
        match self.config.framing {
            Framing::Serial => self.read_serial_frame(timeout).await,
            Framing::Usb => self.read_usb_packet(timeout).await,
        }
    }

    async fn fill(&mut self, timeout: Duration) -> Result<()> {
        let mut chunk = [0u8; 512];
        let n = self.transport.receive(&mut chunk, timeout).await?;
        self.rx_buf.extend_from_slice(&chunk[..n]);
        Ok(())
    }

    async fn read_serial_frame(&mut self, timeout: Duration) -> Result<Incoming> {
        loop {
            match decode_frame(&self.rx_buf) {
                DecodeResult::Frame(packet, consumed) => {
                    self.rx_buf.drain(..consumed);
                    trace!(pid = packet.id(), len = packet.data().len(), "Received packet");
                    return Ok(Incoming::Packet(packet));
                }
                DecodeResult::Corrupt { id, consumed } => {
                    self.rx_buf.drain(..consumed);
                    return Ok(Incoming::Corrupt(id));
                }
                DecodeResult::Noise(n) => {
                    trace!(bytes = n, "Discarding bytes outside any frame");
                    self.rx_buf.drain(..n);
                }
                DecodeResult::Incomplete => self.fill(timeout).await?,
            }
        }
    }

    async fn read_usb_packet(&mut self, timeout: Duration) -> Result<Incoming> {
        loop {
            match decode_usb_packet(&self.rx_buf) {
                UsbDecodeResult::Packet(layer, packet, consumed) => {
                    self.rx_buf.drain(..consumed);
                    trace!(?layer, pid = packet.id(), len = packet.data().len(), "Received USB packet");
                    return Ok(match layer {
                        UsbLayer::Protocol => Incoming::Control(packet),
                        UsbLayer::Application => Incoming::Packet(packet),
                    });
                }
                UsbDecodeResult::Invalid(msg) => {
                    warn!(bytes = self.rx_buf.len(), "Dropping undecodable USB data");
                    self.rx_buf.clear();
                    return Err(Error::Protocol(msg));
                }
                UsbDecodeResult::Incomplete => self.fill(timeout).await?,
            }
        }
    }

    fn ack_packet(&self, pid: u16, id: u16) -> Packet {
        match self.config.ack_payload {
            AckPayload::Empty => Packet::empty(pid),
            // Serial ids never exceed one byte.
            AckPayload::PacketId => Packet::with_u8(pid, id as u8),
        }
    }

    async fn send_raw(&mut self, packet: &Packet) -> Result<()> {
        trace!(pid = packet.id(), len = packet.data().len(), "Sending packet");
        let bytes = match self.config.framing {
            Framing::Serial => encode_frame(packet)?,
            Framing::Usb => encode_usb_packet(UsbLayer::Application, packet),
        };
        self.transport.send(&bytes).await
    }

    async fn send_control(&mut self, packet: &Packet) -> Result<()> {
        trace!(pid = packet.id(), "Sending USB control packet");
        self.transport
            .send(&encode_usb_packet(UsbLayer::Protocol, packet))
            .await
    }

    async fn send_ack(&mut self, id: u16) -> Result<()> {
        if self.config.framing == Framing::Usb {
            return Ok(());
        }
        let ack = self.ack_packet(PID_ACK, id);
        self.send_raw(&ack).await
    }

    async fn send_nak(&mut self, id: u16) -> Result<()> {
        let nak = self.ack_packet(PID_NAK, id);
        self.send_raw(&nak).await
    }

    /// Open a USB session: send Start_Session until the device answers
    /// Session_Started, and return the unit id it reports.
    ///
    /// Serial links have no session layer and return `None` without any
    /// traffic.
    pub async fn start_session(&mut self) -> Result<Option<u32>> {
        if self.config.framing == Framing::Serial {
            return Ok(None);
        }
        let start = Packet::empty(USB_START_SESSION);
        self.send_control(&start).await?;
        let mut misses = 0u32;
        loop {
            match self.read_frame(self.config.read_timeout).await {
                Ok(Incoming::Control(p)) if p.id() == USB_SESSION_STARTED => {
                    let unit_id = p.data_u32().ok_or_else(|| {
                        Error::Protocol("Session_Started packet without a unit id".into())
                    })?;
                    debug!(unit_id, "USB session started");
                    return Ok(Some(unit_id));
                }
                Ok(Incoming::Packet(p) | Incoming::Control(p)) => {
                    misses += 1;
                    debug!(pid = p.id(), "Ignoring packet before Session_Started");
                }
                Ok(Incoming::Corrupt(_)) => misses += 1,
                Err(e) if e.is_transient() => {
                    misses += 1;
                    if misses <= self.config.max_retries {
                        debug!(misses, "No Session_Started reply, resending");
                        self.send_control(&start).await?;
                    }
                }
                Err(e) => return Err(e),
            }
            if misses > self.config.max_retries {
                return Err(Error::Link(format!(
                    "no Session_Started reply after {misses} attempts"
                )));
            }
        }
    }

    /// Send a packet and wait for the device to acknowledge it.
    ///
    /// Retransmits on NAK, on a corrupt reply and on timeout, up to
    /// `max_retries` times. Over USB the packet is sent once.
    pub async fn send_packet(&mut self, packet: &Packet) -> Result<()> {
        if self.config.framing == Framing::Usb {
            return self.send_raw(packet).await;
        }
        let attempts = self.config.max_retries + 1;
        for attempt in 1..=attempts {
            if attempt > 1 {
                warn!(pid = packet.id(), attempt, "Retransmitting packet");
            }
            self.send_raw(packet).await?;
            match self.wait_for_ack(packet.id()).await {
                Ok(true) => return Ok(()),
                Ok(false) => debug!(pid = packet.id(), "Packet rejected by device"),
                Err(e) if e.is_transient() => debug!(pid = packet.id(), "No acknowledgement"),
                Err(e) => return Err(e),
            }
        }
        Err(Error::Link(format!(
            "packet {} not acknowledged after {attempts} attempts",
            packet.id()
        )))
    }

    /// Wait for the reply to a sent packet. `Ok(true)` is an ACK,
    /// `Ok(false)` a NAK, a damaged reply, or more unrelated data packets
    /// than the retry budget allows.
    async fn wait_for_ack(&mut self, id: u16) -> Result<bool> {
        let mut discarded = 0u32;
        loop {
            match self.read_frame(self.config.read_timeout).await? {
                Incoming::Packet(p) if p.id() == PID_ACK => {
                    if let Some(&acked) = p.data().first() {
                        if u16::from(acked) != id {
                            debug!(expected = id, acked, "ACK names a different packet");
                        }
                    }
                    return Ok(true);
                }
                Incoming::Packet(p) if p.id() == PID_NAK => return Ok(false),
                Incoming::Packet(p) | Incoming::Control(p) => {
                    // A unit streaming PVT data keeps sending while we wait.
                    debug!(pid = p.id(), "Discarding data packet while awaiting ACK");
                    self.send_ack(p.id()).await?;
                    discarded += 1;
                    if discarded > self.config.max_retries {
                        return Ok(false);
                    }
                }
                Incoming::Corrupt(_) => return Ok(false),
            }
        }
    }

    /// Receive the next data packet and acknowledge it.
    ///
    /// A corrupt frame is answered with exactly one NAK and counts against
    /// the retry budget, as does each timeout. Stray ACK/NAK packets are
    /// ignored.
    pub async fn receive_packet(&mut self) -> Result<Packet> {
        let mut failures = 0u32;
        loop {
            let reason = match self.read_frame(self.config.read_timeout).await {
                Ok(Incoming::Packet(p)) if p.id() == PID_ACK || p.id() == PID_NAK => {
                    debug!(pid = p.id(), "Ignoring stray acknowledgement");
                    continue;
                }
                Ok(Incoming::Packet(p)) => {
                    self.send_ack(p.id()).await?;
                    return Ok(p);
                }
                Ok(Incoming::Control(p)) => {
                    failures += 1;
                    debug!(pid = p.id(), "Ignoring USB control packet");
                    "control packets"
                }
                Ok(Incoming::Corrupt(id)) => {
                    failures += 1;
                    if failures <= self.config.max_retries {
                        warn!(pid = id, failures, "Corrupt packet, sending NAK");
                        self.send_nak(u16::from(id)).await?;
                    }
                    "corrupt packets"
                }
                Err(e) if e.is_transient() => {
                    failures += 1;
                    debug!(failures, "Timeout waiting for packet");
                    "timeouts"
                }
                Err(e) => return Err(e),
            };
            if failures > self.config.max_retries {
                return Err(Error::Link(format!(
                    "no valid packet after {failures} {reason}"
                )));
            }
        }
    }

    /// Wait once for an optional packet, using the probe timeout.
    ///
    /// Returns `None` if nothing arrives. Corrupt frames are NAKed and the
    /// wait continues, so the device can retransmit.
    pub async fn probe_packet(&mut self) -> Result<Option<Packet>> {
        let mut naks = 0u32;
        loop {
            match self.read_frame(self.config.probe_timeout).await {
                Ok(Incoming::Packet(p)) if p.id() == PID_ACK || p.id() == PID_NAK => continue,
                Ok(Incoming::Packet(p)) => {
                    self.send_ack(p.id()).await?;
                    return Ok(Some(p));
                }
                Ok(Incoming::Control(p)) => {
                    debug!(pid = p.id(), "Ignoring USB control packet");
                }
                Ok(Incoming::Corrupt(id)) => {
                    naks += 1;
                    if naks > self.config.max_retries {
                        return Err(Error::Link(format!(
                            "no valid packet after {naks} corrupt packets"
                        )));
                    }
                    self.send_nak(u16::from(id)).await?;
                }
                Err(e) if e.is_transient() => return Ok(None),
                Err(e) => return Err(e),
            }
        }
    }

    /// Receive a transfer: Records(count), `count` data packets, then
    /// Xfer_Cmplt. Returns the data packets in arrival order.
    ///
    /// The caller has already sent (and had acknowledged) the command that
    /// starts the transfer. `progress` sees `(0, count)` once the count is
    /// known and then each received packet.
    pub async fn receive_transfer(
        &mut self,
        pids: &LinkPids,
        progress: &mut (dyn FnMut(usize, usize) + Send + '_),
    ) -> Result<Vec<Packet>> {
        let first = self.receive_packet().await?;
        if first.id() != pids.records {
            return Err(Error::Protocol(format!(
                "expected Records packet, got packet {}",
                first.id()
            )));
        }
        let expected = first.data_u16().ok_or_else(|| {
            Error::Protocol("Records packet without a record count".into())
        })?;
        let total = usize::from(expected);
        debug!(expected, "Transfer started");
        progress(0, total);

        let mut packets = Vec::with_capacity(total);
        loop {
            let packet = match self.receive_packet().await {
                Ok(p) => p,
                Err(Error::Link(msg)) => {
                    return Err(Error::Link(format!(
                        "transfer interrupted after {} of {expected} packets: {msg}",
                        packets.len()
                    )))
                }
                Err(e) => return Err(e),
            };
            if packet.id() == pids.xfer_cmplt {
                break;
            }
            packets.push(packet);
            progress(packets.len(), total);
        }

        if packets.len() != total {
            return Err(Error::Protocol(format!(
                "transfer announced {expected} packets, received {}",
                packets.len()
            )));
        }
        debug!(count = packets.len(), "Transfer complete");
        Ok(packets)
    }

    /// Send a transfer: Records(count), each packet, then Xfer_Cmplt(cmd).
    pub async fn send_transfer(
        &mut self,
        pids: &LinkPids,
        cmd: u16,
        packets: &[Packet],
        progress: &mut (dyn FnMut(usize, usize) + Send + '_),
    ) -> Result<()> {
        let count = u16::try_from(packets.len()).map_err(|_| {
            Error::InvalidParameter(format!(
                "{} records do not fit in one transfer",
                packets.len()
            ))
        })?;
        debug!(count, "Sending transfer");
        self.send_packet(&commands::records(pids, count)).await?;
        progress(0, packets.len());
        for (i, packet) in packets.iter().enumerate() {
            self.send_packet(packet).await?;
            progress(i + 1, packets.len());
        }
        self.send_packet(&commands::xfer_cmplt(pids, cmd)).await
    }
}
