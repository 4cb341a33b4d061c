//! GarminSession -- the per-category request dispatcher.
//!
//! A session owns the [`Link`] and the [`DeviceProfile`] resolved when it
//! was opened. Every category method follows the same path: look the
//! category up in the profile (failing before any wire traffic if the unit
//! lacks it), pick the record formats the profile negotiated, send the
//! transfer command, and decode the records of the reply in device order.
//!
//! Screenshots and map memory are not record transfers. They have their
//! own packet exchanges and hand back raw bytes.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use navlink_core::device::NavDevice;
use navlink_core::error::{Error, Result};
use navlink_core::transport::Transport;
use navlink_core::types::*;

use crate::capability::{self, DeviceProfile, ProtocolId};
use crate::commands::{
    self, CommandSet, LinkPids, PID_CAPACITY_DATA, PID_MEM_DATA, PID_MEM_RECORDS, PID_MEM_WEL,
    PID_MEM_WRDI, PID_MEM_WREN, PID_SCREEN_DATA,
};
use crate::link::{Framing, Link, LinkConfig, ProgressFn};
use crate::models::ProductTable;
use crate::packet::Packet;
use crate::records::{
    decode_capacity, decode_satellites, write_packets, AlmanacFormat, CategoryFormat,
    FlightFormat, LapFormat, MemoryFile, PositionFormat, ProximityFormat, PvtFormat,
    RouteHeaderFormat, RouteLinkFormat, RunFormat, ScreenReader, TimeFormat, TrackHeaderFormat,
    TrackPointFormat, WaypointFormat,
};

/// Link class used between route waypoints when the caller gives none.
const DIRECT_LINK_CLASS: u16 = 3;

/// Memory region holding map images.
const MAP_REGION: u16 = 10;

/// Map directory file read by [`GarminSession::get_map_properties`].
const MAP_PROPERTIES_FILE: &str = "MAPSOURC.MPS";

/// Map bytes per Mem_Write packet. Each chunk is preceded by a 4-byte offset.
const SERIAL_MAP_CHUNK: usize = 240;
const USB_MAP_CHUNK: usize = 4080;

/// Forward transfer progress to the session's callback, if one is set.
fn report(progress: &mut Option<Box<ProgressFn>>) -> impl FnMut(usize, usize) + Send + '_ {
    move |done, total| {
        if let Some(f) = progress.as_mut() {
            f(done, total);
        }
    }
}

fn unexpected(packet: &Packet, what: &str) -> Error {
    Error::Protocol(format!(
        "expected {what} packet, got packet {}",
        packet.id()
    ))
}

/// Route records as they arrive, before they are grouped into routes.
enum RoutePart {
    Header(RouteHeader),
    Waypoint(Waypoint),
    Link(RouteLink),
}

/// A connected Garmin-protocol device.
///
/// Constructed via [`GarminBuilder`](crate::builder::GarminBuilder) or
/// [`GarminSession::connect`].
pub struct GarminSession {
    link: Link,
    profile: DeviceProfile,
    pids: &'static LinkPids,
    commands: &'static CommandSet,
    progress: Option<Box<ProgressFn>>,
    pvt_active: bool,
    closed: bool,
}

impl fmt::Debug for GarminSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GarminSession")
            .field("profile", &self.profile)
            .field("link_protocol", &self.pids.protocol)
            .field("command_protocol", &self.commands.protocol)
            .field("framing", &self.link.framing())
            .field("pvt_active", &self.pvt_active)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl GarminSession {
    /// Open a session: flush stale input, run the product exchange and
    /// select the packet id and command tables for the device.
    pub async fn connect(
        transport: Box<dyn Transport>,
        config: LinkConfig,
        table: &ProductTable,
    ) -> Result<Self> {
        let mut link = Link::new(transport, config);
        link.clear_input().await?;
        if let Some(unit_id) = link.start_session().await? {
            info!(unit_id, "USB session open");
        }
        let profile = capability::resolve(&mut link, table).await?;
        let pids = LinkPids::for_protocol(profile.link_protocol())?;
        let commands = CommandSet::for_protocol(profile.command_protocol())?;
        debug!(
            link = %pids.protocol,
            commands = %commands.protocol,
            "Selected protocol tables"
        );
        Ok(GarminSession {
            link,
            profile,
            pids,
            commands,
            progress: None,
            pvt_active: false,
            closed: false,
        })
    }

    /// The device profile resolved at connect time.
    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    /// Report transfer progress to `f` as (done, total). Record transfers
    /// count packets; screenshots and map transfers count bytes or chunks.
    pub fn set_progress(&mut self, f: impl FnMut(usize, usize) + Send + 'static) {
        self.progress = Some(Box::new(f));
    }

    pub fn clear_progress(&mut self) {
        self.progress = None;
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::NotConnected);
        }
        Ok(())
    }

    async fn send_command(&mut self, cmd: u16) -> Result<()> {
        self.ensure_open()?;
        debug!(cmd, "Sending device command");
        self.link.send_packet(&commands::command(self.pids, cmd)).await
    }

    /// Send a transfer command and collect the data packets of the reply.
    async fn request_records(&mut self, cmd: u16) -> Result<Vec<Packet>> {
        self.send_command(cmd).await?;
        self.link
            .receive_transfer(self.pids, &mut report(&mut self.progress))
            .await
    }

    /// Upload a transfer closed by Xfer_Cmplt(`cmd`).
    async fn send_records(&mut self, cmd: u16, packets: &[Packet]) -> Result<()> {
        self.ensure_open()?;
        self.link
            .send_transfer(self.pids, cmd, packets, &mut report(&mut self.progress))
            .await
    }

    /// Send a command that is answered with a single data packet.
    async fn request_single(&mut self, cmd: u16, pid: u16, what: &str) -> Result<Packet> {
        self.send_command(cmd).await?;
        let packet = self.link.receive_packet().await?;
        if packet.id() != pid {
            return Err(unexpected(&packet, what));
        }
        Ok(packet)
    }

    /// Receive a transfer whose packets all carry the same id and decode
    /// each one.
    async fn list_uniform<T>(
        &mut self,
        cmd: u16,
        pid: u16,
        what: &str,
        decode: impl Fn(&[u8]) -> Result<T>,
    ) -> Result<Vec<T>> {
        let packets = self.request_records(cmd).await?;
        packets
            .iter()
            .map(|p| {
                if p.id() != pid {
                    return Err(unexpected(p, what));
                }
                decode(p.data())
            })
            .collect()
    }

    // ---------------------------------------------------------------
    // Waypoints
    // ---------------------------------------------------------------

    /// Download all waypoints, in device order.
    pub async fn list_waypoints(&mut self) -> Result<Vec<Waypoint>> {
        let cap = self.profile.check(Category::Waypoints, Direction::Read)?;
        let format = WaypointFormat::from_datatype(cap.datatype(0)?)?;
        let (cmd, pid) = (self.commands.transfer_wpt, self.pids.wpt_data);
        let waypoints = self
            .list_uniform(cmd, pid, "waypoint", |d| format.decode(d))
            .await?;
        info!(count = waypoints.len(), "Waypoints received");
        Ok(waypoints)
    }

    /// Upload waypoints. The device adds them to (or replaces same-named
    /// entries in) its waypoint list.
    pub async fn put_waypoints(&mut self, waypoints: &[Waypoint]) -> Result<()> {
        let cap = self.profile.check(Category::Waypoints, Direction::Write)?;
        let format = WaypointFormat::from_datatype(cap.datatype(0)?)?;
        let packets = waypoints
            .iter()
            .map(|w| Packet::new(self.pids.wpt_data, format.encode(w)?))
            .collect::<Result<Vec<_>>>()?;
        self.send_records(self.commands.transfer_wpt, &packets)
            .await?;
        info!(count = packets.len(), "Waypoints sent");
        Ok(())
    }

    /// Download the user waypoint category names.
    pub async fn list_waypoint_categories(&mut self) -> Result<Vec<WaypointCategory>> {
        let cap = self
            .profile
            .check(Category::WaypointCategories, Direction::Read)?;
        let format = CategoryFormat::from_datatype(cap.datatype(0)?)?;
        let cmd = self
            .commands
            .require(self.commands.transfer_wpt_cats, "waypoint category")?;
        let pid = self.pids.require(self.pids.wpt_cat, "waypoint category")?;
        self.list_uniform(cmd, pid, "waypoint category", |d| format.decode(d))
            .await
    }

    // ---------------------------------------------------------------
    // Routes
    // ---------------------------------------------------------------

    fn route_formats(
        &self,
        direction: Direction,
    ) -> Result<(RouteHeaderFormat, WaypointFormat, Option<RouteLinkFormat>)> {
        let cap = self.profile.check(Category::Routes, direction)?;
        let header = RouteHeaderFormat::from_datatype(cap.datatype(0)?)?;
        let waypoint = WaypointFormat::from_datatype(cap.datatype(1)?)?;
        let link = if cap.protocol == ProtocolId::A201 {
            Some(RouteLinkFormat::from_datatype(cap.datatype(2)?)?)
        } else {
            None
        };
        Ok((header, waypoint, link))
    }

    /// Download all routes, in device order.
    pub async fn list_routes(&mut self) -> Result<Vec<Route>> {
        let (header_fmt, wpt_fmt, link_fmt) = self.route_formats(Direction::Read)?;
        let packets = self.request_records(self.commands.transfer_rte).await?;

        let mut parts = Vec::with_capacity(packets.len());
        for p in &packets {
            let part = if p.id() == self.pids.rte_hdr {
                RoutePart::Header(header_fmt.decode(p.data())?)
            } else if p.id() == self.pids.rte_wpt_data {
                RoutePart::Waypoint(wpt_fmt.decode(p.data())?)
            } else if let (Some(fmt), Some(pid)) = (link_fmt, self.pids.rte_link_data) {
                if p.id() != pid {
                    return Err(unexpected(p, "route"));
                }
                RoutePart::Link(fmt.decode(p.data())?)
            } else {
                return Err(unexpected(p, "route"));
            };
            parts.push(part);
        }

        let mut routes: Vec<Route> = Vec::new();
        for part in parts {
            match part {
                RoutePart::Header(header) => routes.push(Route {
                    header,
                    ..Default::default()
                }),
                RoutePart::Waypoint(w) => match routes.last_mut() {
                    Some(route) => route.waypoints.push(w),
                    None => return Err(Error::Protocol("route waypoint before any header".into())),
                },
                RoutePart::Link(l) => match routes.last_mut() {
                    Some(route) => route.links.push(l),
                    None => return Err(Error::Protocol("route link before any header".into())),
                },
            }
        }
        info!(count = routes.len(), "Routes received");
        Ok(routes)
    }

    /// Upload routes. On units with route links, a route without links gets
    /// a direct link between each pair of waypoints.
    pub async fn put_routes(&mut self, routes: &[Route]) -> Result<()> {
        let (header_fmt, wpt_fmt, link_fmt) = self.route_formats(Direction::Write)?;
        let link_pid = match link_fmt {
            Some(_) => Some(self.pids.require(self.pids.rte_link_data, "route link")?),
            None => None,
        };

        let direct = RouteLink {
            class: DIRECT_LINK_CLASS,
            ..Default::default()
        };
        let mut packets = Vec::new();
        for route in routes {
            packets.push(Packet::new(self.pids.rte_hdr, header_fmt.encode(&route.header))?);
            let legs = route.waypoints.len().saturating_sub(1);
            if link_fmt.is_some() && !route.links.is_empty() && route.links.len() != legs {
                return Err(Error::InvalidParameter(format!(
                    "route with {} waypoints needs {legs} links, got {}",
                    route.waypoints.len(),
                    route.links.len()
                )));
            }
            for (i, wpt) in route.waypoints.iter().enumerate() {
                if let (Some(fmt), Some(pid)) = (link_fmt, link_pid) {
                    if i > 0 {
                        let link = route.links.get(i - 1).unwrap_or(&direct);
                        packets.push(Packet::new(pid, fmt.encode(link)?)?);
                    }
                }
                packets.push(Packet::new(self.pids.rte_wpt_data, wpt_fmt.encode(wpt)?)?);
            }
        }

        self.send_records(self.commands.transfer_rte, &packets)
            .await?;
        info!(count = routes.len(), "Routes sent");
        Ok(())
    }

    // ---------------------------------------------------------------
    // Tracks
    // ---------------------------------------------------------------

    fn track_formats(
        &self,
        direction: Direction,
    ) -> Result<(Option<TrackHeaderFormat>, TrackPointFormat)> {
        let cap = self.profile.check(Category::Tracks, direction)?;
        if cap.protocol == ProtocolId::A300 {
            return Ok((None, TrackPointFormat::from_datatype(cap.datatype(0)?)?));
        }
        let header = TrackHeaderFormat::from_datatype(cap.datatype(0)?)?;
        let point = TrackPointFormat::from_datatype(cap.datatype(1)?)?;
        Ok((Some(header), point))
    }

    /// Download all track logs, in device order.
    ///
    /// Units without track headers (A300) return a single headerless track;
    /// its segments are marked by [`TrackPoint::new_segment`].
    pub async fn list_tracks(&mut self) -> Result<Vec<Track>> {
        let (header_fmt, point_fmt) = self.track_formats(Direction::Read)?;
        let cmd = self.commands.require(self.commands.transfer_trk, "track")?;
        let trk_pid = self.pids.require(self.pids.trk_data, "track data")?;
        let hdr_pid = match header_fmt {
            Some(_) => Some(self.pids.require(self.pids.trk_hdr, "track header")?),
            None => None,
        };
        let packets = self.request_records(cmd).await?;

        let mut tracks: Vec<Track> = Vec::new();
        for p in &packets {
            if Some(p.id()) == hdr_pid {
                if let Some(fmt) = header_fmt {
                    tracks.push(Track {
                        header: Some(fmt.decode(p.data())?),
                        points: Vec::new(),
                    });
                }
            } else if p.id() == trk_pid {
                let point = point_fmt.decode(p.data())?;
                match tracks.last_mut() {
                    Some(track) => track.points.push(point),
                    None if header_fmt.is_none() => tracks.push(Track {
                        header: None,
                        points: vec![point],
                    }),
                    None => {
                        return Err(Error::Protocol("track point before any header".into()))
                    }
                }
            } else {
                return Err(unexpected(p, "track"));
            }
        }
        info!(count = tracks.len(), "Tracks received");
        Ok(tracks)
    }

    /// Upload track logs. On units without track headers every track after
    /// the first starts a new segment of the single track log.
    pub async fn put_tracks(&mut self, tracks: &[Track]) -> Result<()> {
        let (header_fmt, point_fmt) = self.track_formats(Direction::Write)?;
        let cmd = self.commands.require(self.commands.transfer_trk, "track")?;
        let trk_pid = self.pids.require(self.pids.trk_data, "track data")?;

        let mut packets = Vec::new();
        for track in tracks {
            match header_fmt {
                Some(fmt) => {
                    let hdr_pid = self.pids.require(self.pids.trk_hdr, "track header")?;
                    let header = track.header.clone().unwrap_or_default();
                    packets.push(Packet::new(hdr_pid, fmt.encode(&header))?);
                    for point in &track.points {
                        packets.push(Packet::new(trk_pid, point_fmt.encode(point))?);
                    }
                }
                None => {
                    for (i, point) in track.points.iter().enumerate() {
                        let bytes = if i == 0 && !point.new_segment {
                            point_fmt.encode(&TrackPoint {
                                new_segment: true,
                                ..point.clone()
                            })
                        } else {
                            point_fmt.encode(point)
                        };
                        packets.push(Packet::new(trk_pid, bytes)?);
                    }
                }
            }
        }

        self.send_records(cmd, &packets).await?;
        info!(count = tracks.len(), "Tracks sent");
        Ok(())
    }

    // ---------------------------------------------------------------
    // Proximity waypoints, almanac
    // ---------------------------------------------------------------

    pub async fn list_proximities(&mut self) -> Result<Vec<Proximity>> {
        let cap = self.profile.check(Category::Proximities, Direction::Read)?;
        let format = ProximityFormat::from_datatype(cap.datatype(0)?)?;
        let (cmd, pid) = (self.commands.transfer_prx, self.pids.prx_wpt_data);
        self.list_uniform(cmd, pid, "proximity waypoint", |d| format.decode(d))
            .await
    }

    pub async fn put_proximities(&mut self, proximities: &[Proximity]) -> Result<()> {
        let cap = self.profile.check(Category::Proximities, Direction::Write)?;
        let format = ProximityFormat::from_datatype(cap.datatype(0)?)?;
        let packets = proximities
            .iter()
            .map(|p| Packet::new(self.pids.prx_wpt_data, format.encode(p)?))
            .collect::<Result<Vec<_>>>()?;
        self.send_records(self.commands.transfer_prx, &packets)
            .await
    }

    /// Download the almanac. Formats without a satellite id get one from
    /// the record's position in the transfer.
    pub async fn get_almanac(&mut self) -> Result<Vec<Almanac>> {
        let cap = self.profile.check(Category::Almanac, Direction::Read)?;
        let format = AlmanacFormat::from_datatype(cap.datatype(0)?)?;
        let (cmd, pid) = (self.commands.transfer_alm, self.pids.almanac_data);
        let mut almanac = self
            .list_uniform(cmd, pid, "almanac", |d| format.decode(d))
            .await?;
        if !format.has_svid() {
            for (i, alm) in almanac.iter_mut().enumerate() {
                alm.svid = u8::try_from(i).ok();
            }
        }
        Ok(almanac)
    }

    // ---------------------------------------------------------------
    // Time and position
    // ---------------------------------------------------------------

    /// Read the device clock as raw calendar fields.
    pub async fn get_device_time(&mut self) -> Result<DeviceTime> {
        let cap = self.profile.check(Category::Time, Direction::Read)?;
        let format = TimeFormat::from_datatype(cap.datatype(0)?)?;
        let (cmd, pid) = (self.commands.transfer_time, self.pids.date_time_data);
        let packet = self.request_single(cmd, pid, "date and time").await?;
        format.decode(packet.data())
    }

    /// Read the device clock.
    pub async fn get_time(&mut self) -> Result<DateTime<Utc>> {
        let time = self.get_device_time().await?;
        time.to_datetime().ok_or_else(|| {
            Error::malformed(
                TimeFormat::D600.datatype().to_string(),
                format!(
                    "{:04}-{:02}-{:02} is not a calendar date",
                    time.year, time.month, time.day
                ),
            )
        })
    }

    /// Set the device clock.
    pub async fn set_time(&mut self, time: DateTime<Utc>) -> Result<()> {
        let cap = self.profile.check(Category::Time, Direction::Write)?;
        let format = TimeFormat::from_datatype(cap.datatype(0)?)?;
        let bytes = format.encode(&DeviceTime::from_datetime(&time));
        self.ensure_open()?;
        self.link
            .send_packet(&Packet::new(self.pids.date_time_data, bytes)?)
            .await
    }

    /// Read the current position.
    pub async fn get_position(&mut self) -> Result<RadianPosition> {
        let cap = self.profile.check(Category::Position, Direction::Read)?;
        let format = PositionFormat::from_datatype(cap.datatype(0)?)?;
        let cmd = self.commands.require(self.commands.transfer_posn, "position")?;
        let pid = self.pids.position_data;
        let packet = self.request_single(cmd, pid, "position").await?;
        format.decode(packet.data())
    }

    // ---------------------------------------------------------------
    // PVT stream
    // ---------------------------------------------------------------

    /// Ask the device to start streaming PVT fixes.
    pub async fn start_pvt(&mut self) -> Result<()> {
        self.profile.check(Category::Pvt, Direction::Read)?;
        let cmd = self.commands.require(self.commands.start_pvt_data, "PVT start")?;
        self.send_command(cmd).await?;
        self.pvt_active = true;
        info!("PVT stream started");
        Ok(())
    }

    /// Wait for the next item of the PVT stream: a fix, or a satellite
    /// array on units that send one.
    pub async fn next_pvt(&mut self) -> Result<PvtEvent> {
        self.ensure_open()?;
        if !self.pvt_active {
            return Err(Error::InvalidParameter("PVT stream is not running".into()));
        }
        let cap = self.profile.check(Category::Pvt, Direction::Read)?;
        let format = PvtFormat::from_datatype(cap.datatype(0)?)?;
        let pvt_pid = self.pids.require(self.pids.pvt_data, "PVT")?;
        loop {
            let packet = self.link.receive_packet().await?;
            if packet.id() == pvt_pid {
                return Ok(PvtEvent::Fix(format.decode(packet.data())?));
            }
            if Some(packet.id()) == self.pids.satellite_data {
                return Ok(PvtEvent::Satellites(decode_satellites(packet.data())?));
            }
            debug!(pid = packet.id(), "Ignoring packet in PVT stream");
        }
    }

    /// Stop the PVT stream.
    pub async fn stop_pvt(&mut self) -> Result<()> {
        let cmd = self.commands.require(self.commands.stop_pvt_data, "PVT stop")?;
        self.send_command(cmd).await?;
        self.pvt_active = false;
        info!("PVT stream stopped");
        Ok(())
    }

    // ---------------------------------------------------------------
    // Fitness and aviation
    // ---------------------------------------------------------------

    pub async fn list_laps(&mut self) -> Result<Vec<Lap>> {
        let cap = self.profile.check(Category::Laps, Direction::Read)?;
        let format = LapFormat::from_datatype(cap.datatype(0)?)?;
        let cmd = self.commands.require(self.commands.transfer_laps, "lap")?;
        let pid = self.pids.require(self.pids.lap, "lap")?;
        self.list_uniform(cmd, pid, "lap", |d| format.decode(d)).await
    }

    /// Download all runs. Run packets (id 990) only fit a USB packet, so a
    /// serial link is refused before any traffic.
    pub async fn list_runs(&mut self) -> Result<Vec<Run>> {
        let cap = self.profile.check(Category::Runs, Direction::Read)?;
        let format = RunFormat::from_datatype(cap.datatype(0)?)?;
        let cmd = self.commands.require(self.commands.transfer_runs, "run")?;
        let pid = self.pids.require(self.pids.run, "run")?;
        if self.link.framing() == Framing::Serial {
            return Err(Error::Protocol(format!(
                "run packets (id {pid}) need a USB link"
            )));
        }
        let runs = self.list_uniform(cmd, pid, "run", |d| format.decode(d)).await?;
        info!(count = runs.len(), "Runs received");
        Ok(runs)
    }

    pub async fn list_flightbook(&mut self) -> Result<Vec<FlightRecord>> {
        let cap = self.profile.check(Category::Flightbook, Direction::Read)?;
        let format = FlightFormat::from_datatype(cap.datatype(0)?)?;
        let cmd = self
            .commands
            .require(self.commands.flightbook_transfer, "flightbook")?;
        let pid = self
            .pids
            .require(self.pids.flightbook_record, "flightbook record")?;
        self.list_uniform(cmd, pid, "flightbook", |d| format.decode(d))
            .await
    }

    // ---------------------------------------------------------------
    // Screen and map memory
    // ---------------------------------------------------------------

    /// Capture the unit's display as a raw bitmap.
    pub async fn get_screenshot(&mut self) -> Result<Screenshot> {
        self.profile.check_screenshot()?;
        let cmd = self
            .commands
            .require(self.commands.transfer_screenbitmap, "screenshot")?;
        self.send_command(cmd).await?;

        let mut reader = ScreenReader::new();
        let mut progress = report(&mut self.progress);
        while !reader.is_complete() {
            let packet = self.link.receive_packet().await?;
            if packet.id() != PID_SCREEN_DATA {
                return Err(unexpected(&packet, "screen data"));
            }
            reader.push(packet.data())?;
            let (done, total) = reader.progress();
            progress(done, total);
        }
        let shot = reader
            .finish()
            .ok_or_else(|| Error::Protocol("screen bitmap incomplete".into()))?;
        info!(
            width = shot.width,
            height = shot.height,
            bpp = shot.bits_per_pixel,
            "Screenshot received"
        );
        Ok(shot)
    }

    /// Read the map memory region, tile limit and size.
    pub async fn memory_properties(&mut self) -> Result<MemoryProperties> {
        self.profile.check(Category::Maps, Direction::Read)?;
        let cmd = self.commands.require(self.commands.transfer_mem, "memory")?;
        let packet = self.request_single(cmd, PID_CAPACITY_DATA, "capacity").await?;
        let props = decode_capacity(packet.data())?;
        debug!(region = props.region, size = props.size, "Memory properties");
        Ok(props)
    }

    /// Read the map directory file. `None` means no map is installed.
    pub async fn get_map_properties(&mut self) -> Result<Option<Vec<u8>>> {
        self.read_memory_file(MAP_PROPERTIES_FILE).await
    }

    /// Download the installed map image. `None` means no map is installed.
    pub async fn get_map(&mut self) -> Result<Option<Vec<u8>>> {
        self.read_memory_file("").await
    }

    async fn read_memory_file(&mut self, filename: &str) -> Result<Option<Vec<u8>>> {
        self.profile.check(Category::Maps, Direction::Read)?;
        self.ensure_open()?;
        debug!(filename, "Reading map memory");
        self.link
            .send_packet(&commands::mem_read(MAP_REGION, filename)?)
            .await?;
        let first = self.link.receive_packet().await?;
        match first.id() {
            PID_MEM_DATA => match first.data_u32() {
                Some(0) => {
                    info!(filename, "No map data on device");
                    Ok(None)
                }
                code => Err(Error::Protocol(format!(
                    "memory read failed with result {code:?}"
                ))),
            },
            PID_MEM_RECORDS => {
                let count = first.data_u32().ok_or_else(|| {
                    Error::Protocol("Mem_Records packet without a chunk count".into())
                })? as usize;
                let mut file = MemoryFile::new();
                let mut progress = report(&mut self.progress);
                progress(0, count);
                for done in 1..=count {
                    let packet = self.link.receive_packet().await?;
                    if packet.id() != PID_MEM_DATA {
                        return Err(unexpected(&packet, "memory data"));
                    }
                    file.push(packet.data())?;
                    progress(done, count);
                }
                info!(filename, bytes = file.len(), "Map data received");
                Ok(Some(file.into_bytes()))
            }
            _ => Err(unexpected(&first, "memory records")),
        }
    }

    /// Put `region` in write mode. The device erases it before answering.
    async fn enable_write(&mut self, region: u16) -> Result<()> {
        self.link
            .send_packet(&Packet::with_u16(PID_MEM_WREN, region))
            .await?;
        let reply = self.link.receive_packet().await?;
        if reply.id() != PID_MEM_WEL {
            return Err(unexpected(&reply, "Mem_Wel"));
        }
        Ok(())
    }

    async fn disable_write(&mut self, region: u16) -> Result<()> {
        self.link
            .send_packet(&Packet::with_u16(PID_MEM_WRDI, region))
            .await
    }

    /// Replace the installed map with `image`, a complete map file.
    pub async fn put_map(&mut self, image: &[u8]) -> Result<()> {
        self.profile.check(Category::Maps, Direction::Write)?;
        let props = self.memory_properties().await?;
        if image.len() > props.size as usize {
            return Err(Error::InvalidParameter(format!(
                "map of {} bytes exceeds the {} bytes of map memory",
                image.len(),
                props.size
            )));
        }
        let chunk = match self.link.framing() {
            Framing::Serial => SERIAL_MAP_CHUNK,
            Framing::Usb => USB_MAP_CHUNK,
        };
        let packets = write_packets(image, chunk)?;

        self.enable_write(props.region).await?;
        let mut progress = report(&mut self.progress);
        progress(0, packets.len());
        for (i, packet) in packets.iter().enumerate() {
            self.link.send_packet(packet).await?;
            progress(i + 1, packets.len());
        }
        drop(progress);
        self.disable_write(props.region).await?;
        info!(bytes = image.len(), chunks = packets.len(), "Map sent");
        Ok(())
    }

    /// Erase the installed map.
    pub async fn erase_map(&mut self) -> Result<()> {
        self.profile.check(Category::Maps, Direction::Write)?;
        let props = self.memory_properties().await?;
        self.enable_write(props.region).await?;
        self.disable_write(props.region).await?;
        info!("Map memory erased");
        Ok(())
    }

    // ---------------------------------------------------------------
    // Device commands
    // ---------------------------------------------------------------

    /// Read the unit's 32-bit serial number.
    pub async fn unit_id(&mut self) -> Result<u32> {
        let cmd = self.commands.require(self.commands.transfer_unit_id, "unit id")?;
        let pid = self.pids.require(self.pids.unit_id, "unit id")?;
        let packet = self.request_single(cmd, pid, "unit id").await?;
        let bytes: [u8; 4] = packet
            .data()
            .get(..4)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| {
                Error::Protocol(format!(
                    "unit id packet has {} bytes, expected 4",
                    packet.data().len()
                ))
            })?;
        Ok(u32::from_le_bytes(bytes))
    }

    /// Tell the device to abandon the transfer in progress.
    pub async fn abort_transfer(&mut self) -> Result<()> {
        self.send_command(self.commands.abort_transfer).await
    }

    /// Switch the unit off and close the session.
    pub async fn power_off(&mut self) -> Result<()> {
        self.send_command(self.commands.turn_off_pwr).await?;
        info!("Device powered off");
        self.closed = true;
        self.pvt_active = false;
        self.link.close().await
    }

    /// Release the transport. A running PVT stream is stopped first.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if self.pvt_active {
            if let Err(e) = self.stop_pvt().await {
                warn!(error = %e, "Failed to stop PVT stream on close");
            }
        }
        self.closed = true;
        info!(product_id = self.profile.product_id(), "Closing session");
        self.link.close().await
    }
}

#[async_trait]
impl NavDevice for GarminSession {
    fn info(&self) -> &DeviceInfo {
        self.profile.info()
    }

    async fn list_waypoints(&mut self) -> Result<Vec<Waypoint>> {
        GarminSession::list_waypoints(self).await
    }

    async fn list_routes(&mut self) -> Result<Vec<Route>> {
        GarminSession::list_routes(self).await
    }

    async fn list_tracks(&mut self) -> Result<Vec<Track>> {
        GarminSession::list_tracks(self).await
    }

    async fn get_time(&mut self) -> Result<DateTime<Utc>> {
        GarminSession::get_time(self).await
    }

    async fn set_time(&mut self, time: DateTime<Utc>) -> Result<()> {
        GarminSession::set_time(self, time).await
    }

    async fn close(&mut self) -> Result<()> {
        GarminSession::close(self).await
    }
}
