//! Transport implementations for navlink.
//!
//! This crate provides concrete implementations of the
//! [`Transport`](navlink_core::Transport) trait from `navlink-core`:
//!
//! - [`SerialTransport`]: RS-232 data cables and USB-to-serial adapters
//! - `UsbTransport`: units with a native USB port (feature `usb`)
//!
//! # Example
//!
//! ```no_run
//! use navlink_transport::SerialTransport;
//! use navlink_core::transport::Transport;
//! use std::time::Duration;
//!
//! # async fn example() -> navlink_core::Result<()> {
//! let mut transport = SerialTransport::open("/dev/ttyUSB0", 9600).await?;
//!
//! let mut buf = [0u8; 256];
//! let n = transport.receive(&mut buf, Duration::from_secs(1)).await?;
//! # Ok(())
//! # }
//! ```

pub mod serial;
#[cfg(feature = "usb")]
pub mod usb;

pub use serial::{
    DataBits, FlowControl, Parity, SerialConfig, SerialTransport, StopBits, DEFAULT_BAUD_RATE,
};
#[cfg(feature = "usb")]
pub use usb::{UsbConfig, UsbTransport, GARMIN_PRODUCT_ID, GARMIN_VENDOR_ID};
