//! Session configuration parameters
//!
//! All tunables for a BluFi provisioning session. Values can be loaded
//! from JSON; missing fields take their defaults.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Smallest write size that still fits a header, checksum and one
/// fragment byte after the length prefix.
pub const MIN_FRAME_BYTES: usize = 9;

/// Session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    // --- Discovery ---
    /// Substring a device's advertised name must contain
    pub device_prefix: String,

    // --- Framing ---
    /// Append CRC16 to every outbound frame and request it from the device
    pub checksum_enabled: bool,
    /// Largest single GATT write (bytes)
    pub max_frame_bytes: usize,
    /// Pause between fragment writes (milliseconds)
    pub inter_frame_delay_ms: u32,

    // --- Timeouts ---
    /// Wi-Fi status request timeout (milliseconds)
    pub status_timeout_ms: u32,
    /// Wi-Fi scan collection window (milliseconds)
    pub scan_timeout_ms: u32,
    /// Firmware version request timeout (milliseconds)
    pub version_timeout_ms: u32,

    // --- Security ---
    /// Wait for the device to ack SetSecurityMode before going Active
    pub await_security_ack: bool,
    /// SetSecurityMode ack timeout (milliseconds)
    pub security_ack_timeout_ms: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            device_prefix: "BLUFI_".into(),

            checksum_enabled: false,
            max_frame_bytes: 18,
            inter_frame_delay_ms: 50,

            status_timeout_ms: 10_000,
            scan_timeout_ms: 3_000,
            version_timeout_ms: 3_000,

            await_security_ack: false,
            security_ack_timeout_ms: 2_000,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.max_frame_bytes < MIN_FRAME_BYTES {
            return Err(Error::Config("max_frame_bytes must be at least 9"));
        }
        if self.status_timeout_ms == 0 || self.scan_timeout_ms == 0 || self.version_timeout_ms == 0
        {
            return Err(Error::Config("request timeouts must be non-zero"));
        }
        if self.await_security_ack && self.security_ack_timeout_ms == 0 {
            return Err(Error::Config("security_ack_timeout_ms must be non-zero"));
        }
        Ok(())
    }

    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let config: Self =
            serde_json::from_str(json).map_err(|_| Error::Config("malformed JSON"))?;
        config.validate()?;
        Ok(config)
    }
}
