//! # navlink -- Data transfer for Garmin-family GPS receivers
//!
//! `navlink` is an asynchronous Rust library for exchanging waypoints,
//! routes, tracks, proximity alarms, almanacs, laps, runs, flightbook
//! entries, map images, screenshots and live position fixes with handheld
//! GPS receivers over a serial cable or USB, using the receivers' native
//! binary protocol.
//!
//! ## Quick Start
//!
//! ```no_run
//! use navlink::NavDevice;
//!
//! #[tokio::main]
//! async fn main() -> navlink::Result<()> {
//!     let mut gps = navlink::connect("/dev/ttyUSB0").await?;
//!     println!("Connected: {}", gps.info().description);
//!
//!     for wpt in gps.list_waypoints().await? {
//!         println!("{:<10} {:.5} {:.5}", wpt.ident, wpt.position.lat_degrees(), wpt.position.lon_degrees());
//!     }
//!     gps.close().await
//! }
//! ```
//!
//! ## Architecture
//!
//! | Crate                  | Purpose                                         |
//! |------------------------|-------------------------------------------------|
//! | `navlink-core`         | [`NavDevice`] trait, entity model, errors       |
//! | `navlink-transport`    | Serial and USB transports                       |
//! | `navlink-garmin`       | Framing, link layer, capability resolution, record codecs |
//! | `navlink-test-harness` | Scripted mock transport for protocol tests      |
//! | **`navlink`**          | This facade crate -- re-exports everything      |
//!
//! Front-ends that only need the entity model and the [`NavDevice`] trait
//! can depend on `navlink-core` alone.
//!
//! ## Feature Flags
//!
//! | Feature  | Enables                                   | Default |
//! |----------|-------------------------------------------|---------|
//! | `garmin` | [`garmin`] module and [`connect`]         | yes     |
//! | `usb`    | USB transport and `connect("usb:")`       | no      |
//!
//! ## Capability checks
//!
//! Every session resolves a device profile when it opens. Requests for a
//! category the unit does not speak fail with
//! [`Error::UnsupportedCategory`] before anything is sent, and uploads to a
//! read-only category fail with [`Error::UnsupportedDirection`].

pub use navlink_core::*;

/// Serial and USB transports.
pub mod transport {
    pub use navlink_transport::*;
}

/// Garmin protocol backend.
///
/// Provides [`GarminSession`](garmin::GarminSession) and
/// [`GarminBuilder`](garmin::GarminBuilder), plus the lower layers (framing,
/// link, record codecs) for callers that want to drive them directly.
#[cfg(feature = "garmin")]
pub mod garmin {
    pub use navlink_garmin::*;
}

/// Open a session on a serial port with default settings. `"usb:"`
/// opens the first USB unit instead (feature `usb`).
///
/// Use [`GarminBuilder`](garmin::GarminBuilder) to change timeouts, the
/// retry budget or the product table.
#[cfg(feature = "garmin")]
pub async fn connect(port: &str) -> Result<garmin::GarminSession> {
    navlink_garmin::connect(port).await
}

/// One entry of the built-in product table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedDevice {
    pub product_id: u16,
    pub name: &'static str,
}

/// Every product in the built-in table of the enabled backends, for model
/// pickers and diagnostics. Units that report their own protocols work
/// whether or not they are listed.
///
/// # Example
///
/// ```
/// let devices = navlink::supported_devices();
/// assert!(devices.iter().any(|d| d.product_id == 55));
/// ```
pub fn supported_devices() -> Vec<SupportedDevice> {
    #[allow(unused_mut)]
    let mut devices = Vec::new();

    #[cfg(feature = "garmin")]
    {
        devices.extend(
            garmin::ProductTable::builtin()
                .entries()
                .iter()
                .map(|e| SupportedDevice {
                    product_id: e.product_id,
                    name: e.name,
                }),
        );
        devices.dedup();
    }

    devices
}

#[cfg(all(test, feature = "garmin"))]
mod tests {
    use super::*;

    #[test]
    fn builtin_devices_listed() {
        let devices = supported_devices();
        assert!(!devices.is_empty());
        let gps120 = devices.iter().find(|d| d.product_id == 55).unwrap();
        assert_eq!(gps120.name, "GPS 120 Chinese");
    }
}
