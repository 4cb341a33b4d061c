//! navlink-core: Core traits, entity model, and error definitions for navlink.
//!
//! This crate defines the protocol-agnostic abstractions shared by every
//! navlink backend. Front-ends depend on these types without pulling in a
//! specific device protocol.
//!
//! # Key types
//!
//! - [`NavDevice`] -- request/response interface to a connected receiver
//! - [`Transport`] -- byte-level communication channel
//! - [`Waypoint`], [`Route`], [`Track`] and friends -- normalized entities
//! - [`Error`] / [`Result`] -- error handling

pub mod device;
pub mod error;
pub mod time;
pub mod transport;
pub mod types;

// Re-export key types at crate root for ergonomic `use navlink_core::*`.
pub use device::NavDevice;
pub use error::{Error, Result};
pub use transport::Transport;
pub use types::*;
