//! Error types for navlink.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. Transport failures, link-layer
//! exhaustion, capability resolution, category dispatch and record decoding
//! errors are all captured here so a front-end can map each kind to its own
//! message ("device not supported" vs. "connection lost").

use crate::types::{Category, Direction};

/// The error type for all navlink operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The transport could not be opened (missing port, permissions,
    /// unsupported settings).
    #[error("connect error: {0}")]
    Connect(String),

    /// The link layer gave up after exhausting its retry budget.
    ///
    /// Raised when a packet was never acknowledged, when corrupt frames kept
    /// arriving, or when an expected continuation packet never arrived.
    #[error("link error: {0}")]
    Link(String),

    /// Timed out waiting for bytes from the device.
    ///
    /// The link layer retries this locally; callers normally only see it
    /// from raw [`Transport`](crate::Transport) use.
    #[error("timeout waiting for response")]
    Timeout,

    /// The device did not report its protocols and its product id matches
    /// nothing in the product table.
    #[error("unknown device: product id {product_id}, software version {software_version}")]
    UnknownDevice {
        /// Product id reported by the device.
        product_id: u16,
        /// Software version in hundredths, as reported.
        software_version: i16,
    },

    /// The device profile has no protocol for this data category.
    #[error("device does not support {0}")]
    UnsupportedCategory(Category),

    /// The device speaks this category, but not in this direction.
    #[error("device does not support {direction} of {category}")]
    UnsupportedDirection {
        /// Category that was requested.
        category: Category,
        /// Direction that was refused.
        direction: Direction,
    },

    /// The device negotiated a record format this library cannot decode.
    #[error("unsupported {category} record format D{datatype:03}")]
    UnsupportedFormat {
        /// Category the record belongs to.
        category: Category,
        /// Datatype number (e.g. `109` for D109).
        datatype: u16,
    },

    /// A record did not match the layout of its declared format.
    #[error("malformed {format} record: {reason}")]
    MalformedRecord {
        /// Format name, e.g. `"D109"`.
        format: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The device sent a well-formed packet that does not fit the exchange
    /// in progress.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// An invalid parameter was passed by the caller.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The transport has been closed.
    #[error("not connected")]
    NotConnected,

    /// The connection to the device was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for building a [`Error::MalformedRecord`].
    pub fn malformed(format: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MalformedRecord {
            format: format.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` for errors the link layer treats as transient.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Timeout)
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_connect() {
        let e = Error::Connect("/dev/ttyUSB0: permission denied".into());
        assert_eq!(e.to_string(), "connect error: /dev/ttyUSB0: permission denied");
    }

    #[test]
    fn error_display_link() {
        let e = Error::Link("no ACK after 4 attempts".into());
        assert_eq!(e.to_string(), "link error: no ACK after 4 attempts");
    }

    #[test]
    fn error_display_unknown_device() {
        let e = Error::UnknownDevice {
            product_id: 999,
            software_version: 250,
        };
        assert_eq!(
            e.to_string(),
            "unknown device: product id 999, software version 250"
        );
    }

    #[test]
    fn error_display_unsupported_category() {
        let e = Error::UnsupportedCategory(Category::Routes);
        assert_eq!(e.to_string(), "device does not support routes");
    }

    #[test]
    fn error_display_unsupported_direction() {
        let e = Error::UnsupportedDirection {
            category: Category::Laps,
            direction: Direction::Write,
        };
        assert_eq!(e.to_string(), "device does not support upload of laps");
    }

    #[test]
    fn error_display_unsupported_format() {
        let e = Error::UnsupportedFormat {
            category: Category::Waypoints,
            datatype: 99,
        };
        assert_eq!(e.to_string(), "unsupported waypoints record format D099");
    }

    #[test]
    fn error_display_malformed() {
        let e = Error::malformed("D103", "invalid symbol 42");
        assert_eq!(e.to_string(), "malformed D103 record: invalid symbol 42");
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broken");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
        assert!(e.to_string().contains("pipe broken"));
    }

    #[test]
    fn only_timeout_is_transient() {
        assert!(Error::Timeout.is_transient());
        assert!(!Error::Link("x".into()).is_transient());
        assert!(!Error::NotConnected.is_transient());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
