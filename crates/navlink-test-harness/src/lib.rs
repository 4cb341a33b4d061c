//! navlink-test-harness: Test utilities and mock transports for navlink.
//!
//! This crate provides [`MockTransport`], a scripted stand-in for a serial
//! line, for deterministic unit testing of protocol engines without real
//! receivers attached.

pub mod mock_serial;

pub use mock_serial::MockTransport;
