//! GarminBuilder -- fluent builder for opening [`GarminSession`]s.
//!
//! Separates configuration from connection so that callers can set the
//! port, link timing, retry budget and product table before the product
//! exchange runs. With the `usb` feature, [`GarminBuilder::usb`] selects a
//! native USB unit instead of a serial port.
//!
//! # Example
//!
//! ```no_run
//! use navlink_garmin::builder::GarminBuilder;
//! use std::time::Duration;
//!
//! # async fn example() -> navlink_core::Result<()> {
//! let mut session = GarminBuilder::new()
//!     .serial_port("/dev/ttyUSB0")
//!     .read_timeout(Duration::from_secs(2))
//!     .build()
//!     .await?;
//! let waypoints = session.list_waypoints().await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use tracing::info;

use navlink_core::error::{Error, Result};
use navlink_core::transport::Transport;
use navlink_transport::{SerialConfig, DEFAULT_BAUD_RATE};

use crate::link::{AckPayload, Framing, LinkConfig};
use crate::models::ProductTable;
use crate::session::GarminSession;

/// Port name that selects the USB transport in [`connect`].
pub const USB_PORT: &str = "usb:";

/// Fluent builder for [`GarminSession`].
///
/// Defaults: 9600 baud, one second read timeout, three retries, empty
/// ACK payloads and the built-in product table.
pub struct GarminBuilder {
    serial_port: Option<String>,
    #[cfg(feature = "usb")]
    usb: Option<navlink_transport::UsbConfig>,
    baud_rate: u32,
    link: LinkConfig,
    product_table: ProductTable,
}

impl Default for GarminBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GarminBuilder {
    pub fn new() -> Self {
        GarminBuilder {
            serial_port: None,
            #[cfg(feature = "usb")]
            usb: None,
            baud_rate: DEFAULT_BAUD_RATE,
            link: LinkConfig::default(),
            product_table: ProductTable::builtin(),
        }
    }

    /// Set the serial port path (e.g. `/dev/ttyUSB0` or `COM3`).
    pub fn serial_port(mut self, port: &str) -> Self {
        self.serial_port = Some(port.to_string());
        self
    }

    /// Override the baud rate. Units that support faster rates still
    /// start at 9600.
    pub fn baud_rate(mut self, baud: u32) -> Self {
        self.baud_rate = baud;
        self
    }

    /// How long to wait for each packet before retrying (default: 1s).
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.link.read_timeout = timeout;
        self
    }

    /// How long to wait for optional packets during the product exchange
    /// (default: 500ms).
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.link.probe_timeout = timeout;
        self
    }

    /// Set the maximum number of retransmissions per packet (default: 3).
    pub fn max_retries(mut self, n: u32) -> Self {
        self.link.max_retries = n;
        self
    }

    pub fn ack_payload(mut self, payload: AckPayload) -> Self {
        self.link.ack_payload = payload;
        self
    }

    /// Packet layout on the transport. [`usb()`](Self::usb) sets this
    /// already; callers of [`build_with_transport`](Self::build_with_transport)
    /// with a USB transport of their own set it here.
    pub fn framing(mut self, framing: Framing) -> Self {
        self.link.framing = framing;
        self
    }

    /// Talk to the first unit found on the USB bus.
    #[cfg(feature = "usb")]
    pub fn usb(mut self) -> Self {
        self.usb = Some(navlink_transport::UsbConfig::default());
        self.link.framing = Framing::Usb;
        self
    }

    /// Replace the product table consulted for units that do not report
    /// their protocols.
    pub fn product_table(mut self, table: ProductTable) -> Self {
        self.product_table = table;
        self
    }

    /// Open a session over a caller-provided transport.
    ///
    /// This is the entry point for tests (pass a `MockTransport` from
    /// `navlink-test-harness`) and for callers that manage the transport
    /// themselves.
    pub async fn build_with_transport(self, transport: Box<dyn Transport>) -> Result<GarminSession> {
        if self.link.read_timeout.is_zero() {
            return Err(Error::InvalidParameter(
                "read_timeout must be greater than zero".into(),
            ));
        }
        GarminSession::connect(transport, self.link, &self.product_table).await
    }

    /// Open a session over the configured port.
    ///
    /// Requires that [`serial_port()`](Self::serial_port) (or, with the
    /// `usb` feature, [`usb()`](Self::usb)) has been called.
    pub async fn build(self) -> Result<GarminSession> {
        #[cfg(feature = "usb")]
        {
            if let Some(config) = self.usb.clone() {
                let transport = navlink_transport::UsbTransport::open_with_config(config).await?;
                info!("USB device opened");
                return self.build_with_transport(Box::new(transport)).await;
            }
        }
        let port = self
            .serial_port
            .as_ref()
            .ok_or_else(|| Error::InvalidParameter("serial_port is required for build()".into()))?;
        let config = SerialConfig {
            baud_rate: self.baud_rate,
            ..Default::default()
        };
        let transport = navlink_transport::SerialTransport::open_with_config(port, config).await?;
        info!(port = %port, baud = self.baud_rate, "Serial port opened");
        self.build_with_transport(Box::new(transport)).await
    }
}

/// Open a session on `port` with default settings. The port name
/// [`USB_PORT`] (`"usb:"`) selects the USB transport.
pub async fn connect(port: &str) -> Result<GarminSession> {
    if port == USB_PORT {
        return connect_usb().await;
    }
    GarminBuilder::new().serial_port(port).build().await
}

#[cfg(feature = "usb")]
async fn connect_usb() -> Result<GarminSession> {
    GarminBuilder::new().usb().build().await
}

#[cfg(not(feature = "usb"))]
async fn connect_usb() -> Result<GarminSession> {
    Err(Error::Connect(
        "USB support is not compiled in; enable the `usb` feature".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::tests::product_data;
    use crate::commands::product_request;
    use crate::link::tests::{ack, frame};
    use crate::models::ProductEntry;
    use crate::packet::Packet;
    use navlink_core::NavDevice;
    use navlink_test_harness::MockTransport;

    fn handshake(product_id: u16) -> MockTransport {
        let mut mock = MockTransport::new();
        let mut reply = ack();
        reply.extend(frame(&product_data(product_id, 230, "GPS 120 Chinese")));
        mock.expect(&frame(&product_request()), &reply);
        mock.expect_no_reply(&ack());
        mock
    }

    #[tokio::test]
    async fn builder_defaults() {
        let session = GarminBuilder::new()
            .build_with_transport(Box::new(handshake(55)))
            .await
            .unwrap();
        assert_eq!(session.info().product_id, 55);
        assert_eq!(session.info().description, "GPS 120 Chinese");
    }

    #[tokio::test]
    async fn builder_serial_port_required_for_build() {
        let err = GarminBuilder::new().build().await.unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }

    #[tokio::test]
    async fn builder_rejects_zero_timeout() {
        let result = GarminBuilder::new()
            .read_timeout(Duration::ZERO)
            .build_with_transport(Box::new(MockTransport::new()))
            .await;
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[cfg(not(feature = "usb"))]
    #[tokio::test]
    async fn usb_port_needs_feature() {
        let err = connect(USB_PORT).await.unwrap_err();
        assert!(matches!(err, Error::Connect(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn builder_framing_reaches_link() {
        use crate::commands::USB_START_SESSION;
        use crate::link::tests::{session_started, usb, usb_control};

        let mut mock = MockTransport::new();
        mock.expect(&usb_control(&Packet::empty(USB_START_SESSION)), &session_started(7));
        mock.expect(
            &usb(&product_request()),
            &usb(&product_data(55, 230, "GPS 120 Chinese")),
        );
        let session = GarminBuilder::new()
            .framing(Framing::Usb)
            .build_with_transport(Box::new(mock))
            .await
            .unwrap();
        assert_eq!(session.info().product_id, 55);
    }

    #[tokio::test]
    async fn builder_custom_product_table() {
        let table = ProductTable::empty().with_entry(ProductEntry {
            product_id: 55,
            name: "Bench unit",
            min_version: None,
            max_version: None,
            protocols: "L001 A010 A100 D103",
        });
        let session = GarminBuilder::new()
            .product_table(table)
            .build_with_transport(Box::new(handshake(55)))
            .await
            .unwrap();
        let cap = session
            .profile()
            .capability(navlink_core::Category::Waypoints)
            .unwrap();
        assert_eq!(cap.datatypes[0].0, 103);
    }

    #[tokio::test]
    async fn builder_ack_payload_reaches_link() {
        let mut mock = MockTransport::new();
        let mut reply = ack();
        reply.extend(frame(&product_data(55, 230, "GPS 120 Chinese")));
        mock.expect(&frame(&product_request()), &reply);
        mock.expect_no_reply(&frame(&Packet::with_u8(6, 255)));

        let session = GarminBuilder::new()
            .serial_port("/dev/ttyUSB0")
            .baud_rate(19_200)
            .max_retries(5)
            .probe_timeout(Duration::from_millis(100))
            .ack_payload(AckPayload::PacketId)
            .build_with_transport(Box::new(mock))
            .await
            .unwrap();
        assert_eq!(session.profile().product_id(), 55);
    }
}
