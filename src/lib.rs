//! BluFi provisioning library.
//!
//! Host-side engine for the BluFi protocol: frames, fragments and
//! checksums messages for a BLE GATT link, reassembles the device's
//! notifications and correlates them with outstanding requests. The radio
//! is reached only through the [`app::ports`] traits.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod discovery;
pub mod error;
pub mod protocol;
pub mod session;

pub use config::SessionConfig;
pub use error::{Error, FrameError, Result, TransportError};
pub use session::{LinkState, Session};
