//! Mock transport for deterministic testing of protocol engines.
//!
//! [`MockTransport`] implements the [`Transport`] trait with a scripted
//! device: every `send()` must match the next expected request, and the
//! scripted reply bytes are appended to the input stream for subsequent
//! `receive()` calls. Bytes that are not consumed by one exchange stay in
//! the stream for the next, just as they would on a real serial line.
//!
//! # Example
//!
//! ```
//! use navlink_test_harness::MockTransport;
//!
//! let mut mock = MockTransport::new();
//! // When the host sends this frame, the "device" answers with an ACK
//! // followed by a data packet.
//! mock.expect(&[0x10, 0xFE, 0x00, 0x02, 0x10, 0x03],
//!             &[0x10, 0x06, 0x00, 0xFA, 0x10, 0x03]);
//! // The host's ACK for the last packet gets no reply.
//! mock.expect_no_reply(&[0x10, 0x06, 0x00, 0xFA, 0x10, 0x03]);
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;

use navlink_core::error::{Error, Result};
use navlink_core::transport::Transport;

/// A scripted request/reply pair.
#[derive(Debug, Clone)]
struct Expectation {
    /// The exact bytes we expect to be sent.
    request: Vec<u8>,
    /// The bytes the device emits after seeing the request.
    reply: Vec<u8>,
}

/// A mock [`Transport`] for testing protocol engines without hardware.
///
/// Expectations are consumed in order. A `send()` that does not match the
/// next expectation, or arrives after the script is exhausted, fails with
/// [`Error::Protocol`]. A `receive()` with no buffered input fails with
/// [`Error::Timeout`] immediately, regardless of the timeout passed.
#[derive(Debug)]
pub struct MockTransport {
    /// Ordered queue of expected request/reply pairs.
    expectations: VecDeque<Expectation>,
    /// Bytes the device has emitted that the host has not yet read.
    incoming: VecDeque<u8>,
    /// Maximum bytes returned by one `receive()`; models a slow line.
    chunk_size: Option<usize>,
    connected: bool,
    /// Log of all bytes sent through this transport.
    sent_log: Vec<Vec<u8>>,
    clear_count: usize,
}

impl MockTransport {
    /// Create a new mock transport in the connected state.
    pub fn new() -> Self {
        MockTransport {
            expectations: VecDeque::new(),
            incoming: VecDeque::new(),
            chunk_size: None,
            connected: true,
            sent_log: Vec::new(),
            clear_count: 0,
        }
    }

    /// Add an expected request and the device's reply to it.
    pub fn expect(&mut self, request: &[u8], reply: &[u8]) {
        self.expectations.push_back(Expectation {
            request: request.to_vec(),
            reply: reply.to_vec(),
        });
    }

    /// Add an expected request the device does not answer.
    pub fn expect_no_reply(&mut self, request: &[u8]) {
        self.expect(request, &[]);
    }

    /// Queue bytes the device emits without being asked (e.g. a stream
    /// that starts before the host's first request).
    pub fn push_incoming(&mut self, data: &[u8]) {
        self.incoming.extend(data.iter().copied());
    }

    /// Deliver at most `n` bytes per `receive()` call.
    pub fn set_chunk_size(&mut self, n: usize) {
        self.chunk_size = Some(n.max(1));
    }

    /// All data sent through this transport, one element per `send()`.
    pub fn sent_data(&self) -> &[Vec<u8>] {
        &self.sent_log
    }

    /// Number of expectations that have not yet been consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.expectations.len()
    }

    /// Number of buffered bytes the host has not read.
    pub fn unread_bytes(&self) -> usize {
        self.incoming.len()
    }

    /// How many times `clear_input()` was called.
    pub fn clear_count(&self) -> usize {
        self.clear_count
    }

    /// Set the connected state of the mock transport.
    ///
    /// When set to `false`, subsequent `send()` and `receive()` calls will
    /// return [`Error::NotConnected`].
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        self.sent_log.push(data.to_vec());

        let expectation = self.expectations.pop_front().ok_or_else(|| {
            Error::Protocol(format!(
                "no more expectations in mock transport, got {data:02X?}"
            ))
        })?;
        if data != expectation.request.as_slice() {
            return Err(Error::Protocol(format!(
                "unexpected send data: expected {:02X?}, got {:02X?}",
                expectation.request, data
            )));
        }
        self.incoming.extend(expectation.reply);
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        if self.incoming.is_empty() {
            return Err(Error::Timeout);
        }

        let limit = self.chunk_size.unwrap_or(usize::MAX);
        let n = self.incoming.len().min(buf.len()).min(limit);
        for (slot, byte) in buf.iter_mut().zip(self.incoming.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    async fn clear_input(&mut self) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        self.clear_count += 1;
        self.incoming.clear();
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.connected = false;
        self.incoming.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use navlink_core::transport::Transport;

    #[tokio::test]
    async fn reply_follows_matching_send() {
        let mut mock = MockTransport::new();
        let request = &[0x10, 0xFE, 0x00, 0x02, 0x10, 0x03];
        let reply = &[0x10, 0x06, 0x00, 0xFA, 0x10, 0x03];
        mock.expect(request, reply);

        mock.send(request).await.unwrap();

        let mut buf = [0u8; 64];
        let n = mock
            .receive(&mut buf, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(&buf[..n], reply);
    }

    #[tokio::test]
    async fn unread_bytes_carry_over() {
        let mut mock = MockTransport::new();
        mock.expect(&[0x01], &[0xAA, 0xBB]);
        mock.expect(&[0x02], &[0xCC]);

        mock.send(&[0x01]).await.unwrap();
        mock.send(&[0x02]).await.unwrap();
        assert_eq!(mock.unread_bytes(), 3);

        let mut buf = [0u8; 8];
        let n = mock.receive(&mut buf, Duration::ZERO).await.unwrap();
        assert_eq!(&buf[..n], &[0xAA, 0xBB, 0xCC]);
    }

    #[tokio::test]
    async fn tracks_sent_data() {
        let mut mock = MockTransport::new();
        mock.expect_no_reply(&[0x01, 0x02]);
        mock.expect_no_reply(&[0x03, 0x04]);

        mock.send(&[0x01, 0x02]).await.unwrap();
        mock.send(&[0x03, 0x04]).await.unwrap();

        assert_eq!(mock.sent_data().len(), 2);
        assert_eq!(mock.sent_data()[1], vec![0x03, 0x04]);
        assert_eq!(mock.remaining_expectations(), 0);
    }

    #[tokio::test]
    async fn wrong_data_errors() {
        let mut mock = MockTransport::new();
        mock.expect(&[0x01], &[0xFF]);

        let result = mock.send(&[0x99]).await;
        assert!(matches!(result.unwrap_err(), Error::Protocol(_)));
    }

    #[tokio::test]
    async fn exhausted_script_errors() {
        let mut mock = MockTransport::new();
        let result = mock.send(&[0x01]).await;
        assert!(matches!(result.unwrap_err(), Error::Protocol(_)));
    }

    #[tokio::test]
    async fn empty_input_times_out() {
        let mut mock = MockTransport::new();
        let mut buf = [0u8; 64];
        let result = mock.receive(&mut buf, Duration::from_millis(10)).await;
        assert!(matches!(result.unwrap_err(), Error::Timeout));
    }

    #[tokio::test]
    async fn no_reply_expectation_times_out() {
        let mut mock = MockTransport::new();
        mock.expect_no_reply(&[0x01]);
        mock.send(&[0x01]).await.unwrap();

        let mut buf = [0u8; 8];
        let result = mock.receive(&mut buf, Duration::ZERO).await;
        assert!(matches!(result.unwrap_err(), Error::Timeout));
    }

    #[tokio::test]
    async fn chunked_delivery() {
        let mut mock = MockTransport::new();
        mock.push_incoming(&[0xAA, 0xBB, 0xCC, 0xDD]);
        mock.set_chunk_size(3);

        let mut buf = [0u8; 16];
        let n = mock.receive(&mut buf, Duration::ZERO).await.unwrap();
        assert_eq!(&buf[..n], &[0xAA, 0xBB, 0xCC]);
        let n = mock.receive(&mut buf, Duration::ZERO).await.unwrap();
        assert_eq!(&buf[..n], &[0xDD]);
    }

    #[tokio::test]
    async fn clear_input_discards_buffered_bytes() {
        let mut mock = MockTransport::new();
        mock.push_incoming(&[0x01, 0x02]);
        mock.clear_input().await.unwrap();
        assert_eq!(mock.unread_bytes(), 0);
        assert_eq!(mock.clear_count(), 1);
    }

    #[tokio::test]
    async fn close_disconnects() {
        let mut mock = MockTransport::new();
        assert!(mock.is_connected());

        mock.close().await.unwrap();
        assert!(!mock.is_connected());

        let result = mock.send(&[0x01]).await;
        assert!(matches!(result.unwrap_err(), Error::NotConnected));
        let mut buf = [0u8; 8];
        let result = mock.receive(&mut buf, Duration::from_millis(10)).await;
        assert!(matches!(result.unwrap_err(), Error::NotConnected));
    }
}
