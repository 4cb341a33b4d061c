//! The `NavDevice` trait -- the request/response surface front-ends use.
//!
//! Viewers, exporters and command-line tools program against
//! `dyn NavDevice` and never see packets, acknowledgements or record
//! formats. Protocol backends (`navlink-garmin`) provide the concrete
//! session type.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::*;

/// A connected navigation device.
///
/// Methods take `&mut self`: a device link carries one request/reply
/// exchange at a time, so a session cannot be shared between tasks. Run it
/// on its own task and send results back if you need concurrency.
///
/// Every category method returns
/// [`Error::UnsupportedCategory`](crate::Error::UnsupportedCategory) when
/// the device cannot speak that category at all, and an empty `Vec` when it
/// can but holds no records.
#[async_trait]
pub trait NavDevice: Send {
    /// Static identification of the connected device.
    fn info(&self) -> &DeviceInfo;

    /// Download all waypoints, in device order.
    async fn list_waypoints(&mut self) -> Result<Vec<Waypoint>>;

    /// Download all routes, in device order.
    async fn list_routes(&mut self) -> Result<Vec<Route>>;

    /// Download all tracks, in device order.
    async fn list_tracks(&mut self) -> Result<Vec<Track>>;

    /// Read the device clock.
    async fn get_time(&mut self) -> Result<DateTime<Utc>>;

    /// Set the device clock.
    async fn set_time(&mut self, time: DateTime<Utc>) -> Result<()>;

    /// Release the device link. Further calls fail with
    /// [`Error::NotConnected`](crate::Error::NotConnected).
    async fn close(&mut self) -> Result<()>;
}
