//! Transport trait for device communication.
//!
//! The [`Transport`] trait abstracts over the physical link to a receiver.
//! The serial implementation lives in `navlink-transport`; the scripted
//! `MockTransport` in `navlink-test-harness` lets protocol engines be tested
//! without hardware.
//!
//! A transport carries bytes only. Packet framing, acknowledgement and
//! retries belong to the link layer of the protocol engine that owns it.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Asynchronous byte-level transport to a device.
///
/// A transport is owned by exactly one session at a time; none of its
/// methods need to be safe against interleaved callers.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send raw bytes to the device.
    ///
    /// Returns once all bytes have been handed to the underlying link.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive bytes from the device into the provided buffer.
    ///
    /// Returns the number of bytes actually read. Waits up to `timeout` for
    /// data to arrive; returns [`Error::Timeout`](crate::error::Error::Timeout)
    /// if nothing is received within the deadline.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Discard any bytes buffered on the input side.
    ///
    /// Used before a session's first exchange so that stale bytes from a
    /// previous session (or line noise) do not desynchronize the framing.
    async fn clear_input(&mut self) -> Result<()> {
        Ok(())
    }

    /// Close the transport connection.
    ///
    /// After calling `close()`, subsequent `send()` and `receive()` calls
    /// should return [`Error::NotConnected`](crate::error::Error::NotConnected).
    async fn close(&mut self) -> Result<()>;

    /// Check whether the transport is currently connected.
    fn is_connected(&self) -> bool;
}
