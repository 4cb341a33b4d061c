//! USB transport for units with a native USB port.
//!
//! These units enumerate as vendor-specific devices with three endpoints.
//! The device raises a Data_Available packet on the interrupt endpoint when
//! it has bulk data queued; the host then reads the bulk endpoint until it
//! returns an empty transfer. Host packets always go out on the bulk OUT
//! endpoint.
//!
//! [`UsbTransport`] hides that dance behind the byte-stream
//! [`Transport`] interface, so the link layer sees one stream of USB
//! packets regardless of which endpoint carried them.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use navlink_core::error::{Error, Result};
use navlink_core::transport::Transport;
use nusb::transfer::{Completion, RequestBuffer, TransferError};
use nusb::Interface;
use tokio::time::Instant;

/// Garmin's USB vendor id.
pub const GARMIN_VENDOR_ID: u16 = 0x091E;

/// Product id shared by the handheld units.
pub const GARMIN_PRODUCT_ID: u16 = 0x0003;

/// Largest bulk IN transfer requested at once.
const BULK_READ_LEN: usize = 4096 + 12;

/// Bound on a single bulk OUT transfer.
const SEND_TIMEOUT: Duration = Duration::from_secs(2);

/// Header of the protocol-layer Data_Available packet: type 0, id 2.
const DATA_AVAILABLE: [u8; 12] = [0, 0, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0];

/// USB device selection and endpoint layout.
#[derive(Debug, Clone)]
pub struct UsbConfig {
    pub vendor_id: u16,
    pub product_id: u16,
    pub interrupt_in: u8,
    pub bulk_in: u8,
    pub bulk_out: u8,
    /// Bulk OUT packet size; transfers of a multiple of it are followed by
    /// a zero-length packet.
    pub max_packet_size: usize,
}

impl Default for UsbConfig {
    fn default() -> Self {
        UsbConfig {
            vendor_id: GARMIN_VENDOR_ID,
            product_id: GARMIN_PRODUCT_ID,
            interrupt_in: 0x81,
            bulk_in: 0x83,
            bulk_out: 0x02,
            max_packet_size: 64,
        }
    }
}

/// A claimed USB interface speaking the device's packet protocol.
pub struct UsbTransport {
    interface: Option<Interface>,
    config: UsbConfig,
    /// Received bytes not yet handed to the caller.
    pending: Vec<u8>,
    /// Reading the bulk endpoint after a Data_Available notification.
    bulk_mode: bool,
}

impl UsbTransport {
    /// Open the first Garmin unit on the bus.
    pub async fn open() -> Result<Self> {
        Self::open_with_config(UsbConfig::default()).await
    }

    /// Open the first device matching `config` and claim interface 0.
    ///
    /// Failures to find, open or claim the device are reported as
    /// [`Error::Connect`].
    pub async fn open_with_config(config: UsbConfig) -> Result<Self> {
        tracing::debug!(
            vendor_id = config.vendor_id,
            product_id = config.product_id,
            "Searching for USB device"
        );
        let info = nusb::list_devices()
            .map_err(|e| Error::Connect(format!("cannot enumerate USB devices: {e}")))?
            .find(|d| d.vendor_id() == config.vendor_id && d.product_id() == config.product_id)
            .ok_or_else(|| {
                Error::Connect(format!(
                    "no USB device {:04x}:{:04x} found",
                    config.vendor_id, config.product_id
                ))
            })?;
        tracing::info!(
            bus = info.bus_number(),
            address = info.device_address(),
            "Found USB device"
        );

        let device = info.open().map_err(|e| {
            tracing::error!(error = %e, "Failed to open USB device");
            Error::Connect(format!("failed to open USB device: {e}"))
        })?;
        let interface = device
            .detach_and_claim_interface(0)
            .map_err(|e| Error::Connect(format!("failed to claim USB interface: {e}")))?;

        Ok(UsbTransport {
            interface: Some(interface),
            config,
            pending: Vec::new(),
            bulk_mode: false,
        })
    }

    fn interface(&self) -> Result<&Interface> {
        self.interface.as_ref().ok_or(Error::NotConnected)
    }
}

fn map_transfer_error(e: TransferError) -> Error {
    match e {
        TransferError::Disconnected => Error::ConnectionLost,
        other => Error::Io(std::io::Error::other(other.to_string())),
    }
}

fn is_data_available(data: &[u8]) -> bool {
    data == DATA_AVAILABLE
}

fn needs_zero_length_packet(len: usize, max_packet_size: usize) -> bool {
    len > 0 && max_packet_size > 0 && len % max_packet_size == 0
}

async fn read_until(
    transfer: impl Future<Output = Completion<Vec<u8>>>,
    deadline: Instant,
) -> Result<Vec<u8>> {
    match tokio::time::timeout_at(deadline, transfer).await {
        Ok(completion) => completion.into_result().map_err(map_transfer_error),
        Err(_) => Err(Error::Timeout),
    }
}

#[async_trait]
impl Transport for UsbTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let interface = self.interface()?;
        let endpoint = self.config.bulk_out;
        tracing::trace!(bytes = data.len(), data = ?data, "Sending USB data");

        let mut transfers = vec![data.to_vec()];
        if needs_zero_length_packet(data.len(), self.config.max_packet_size) {
            transfers.push(Vec::new());
        }
        for transfer in transfers {
            let write = interface.bulk_out(endpoint, transfer);
            let completion = tokio::time::timeout(SEND_TIMEOUT, write)
                .await
                .map_err(|_| Error::Timeout)?;
            completion.into_result().map_err(|e| {
                tracing::error!(error = %e, "USB bulk write failed");
                map_transfer_error(e)
            })?;
        }
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let deadline = Instant::now() + timeout;
        loop {
            if !self.pending.is_empty() {
                let n = self.pending.len().min(buf.len());
                buf[..n].copy_from_slice(&self.pending[..n]);
                self.pending.drain(..n);
                return Ok(n);
            }

            let interface = self.interface()?;
            let data = if self.bulk_mode {
                let request = RequestBuffer::new(BULK_READ_LEN);
                let transfer = interface.bulk_in(self.config.bulk_in, request);
                read_until(transfer, deadline).await?
            } else {
                let request = RequestBuffer::new(self.config.max_packet_size);
                let transfer = interface.interrupt_in(self.config.interrupt_in, request);
                read_until(transfer, deadline).await?
            };

            if self.bulk_mode && data.is_empty() {
                tracing::trace!("Bulk endpoint drained");
                self.bulk_mode = false;
            } else if !self.bulk_mode && is_data_available(&data) {
                tracing::trace!("Data available on bulk endpoint");
                self.bulk_mode = true;
            } else {
                tracing::trace!(bytes = data.len(), data = ?data, "Received USB data");
                self.pending = data;
            }
        }
    }

    async fn clear_input(&mut self) -> Result<()> {
        self.interface()?;
        self.pending.clear();
        self.bulk_mode = false;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.interface.take().is_some() {
            tracing::info!("USB interface released");
        }
        self.pending.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.interface.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usb_config_default() {
        let config = UsbConfig::default();
        assert_eq!(config.vendor_id, 0x091E);
        assert_eq!(config.product_id, 0x0003);
        assert_eq!(config.bulk_out, 0x02);
    }

    #[test]
    fn data_available_notification() {
        assert!(is_data_available(&DATA_AVAILABLE));
        let mut session_started = DATA_AVAILABLE;
        session_started[4] = 6;
        assert!(!is_data_available(&session_started));
        assert!(!is_data_available(&DATA_AVAILABLE[..8]));
    }

    #[test]
    fn zero_length_packet_rule() {
        assert!(needs_zero_length_packet(64, 64));
        assert!(needs_zero_length_packet(128, 64));
        assert!(!needs_zero_length_packet(12, 64));
        assert!(!needs_zero_length_packet(0, 64));
    }

    #[test]
    fn disconnect_maps_to_connection_lost() {
        assert!(matches!(
            map_transfer_error(TransferError::Disconnected),
            Error::ConnectionLost
        ));
        assert!(matches!(
            map_transfer_error(TransferError::Stall),
            Error::Io(_)
        ));
    }
}
