//! Unified error types for the BluFi engine.
//!
//! A single `Error` enum that every subsystem converts into, so callers of
//! the session API handle one taxonomy. Sub-enums are `Copy` so they can be
//! carried inside events without allocation.

use core::fmt;

use crate::session::pending::ResponseKind;
use crate::session::state::LinkState;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible session operation funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The GATT transport reported a failure.
    Transport(TransportError),
    /// An inbound frame was malformed or failed its checksum.
    Frame(FrameError),
    /// No response of the given kind arrived before the deadline.
    Timeout(ResponseKind),
    /// The BluFi service is not advertised by the device.
    ServiceNotFound,
    /// A required characteristic is missing from the BluFi service.
    CharacteristicNotFound(u128),
    /// The session is not connected, or was disconnected while waiting.
    NotConnected,
    /// The operation is not valid in the current link state.
    InvalidState(LinkState),
    /// A request of the same kind is already outstanding.
    RequestPending(ResponseKind),
    /// The message cannot be described by the 16-bit fragment length.
    PayloadTooLarge { len: usize, max: usize },
    /// Wi-Fi credentials failed validation.
    InvalidCredentials(&'static str),
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Frame(e) => write!(f, "frame: {e}"),
            Self::Timeout(kind) => write!(f, "timed out waiting for {kind}"),
            Self::ServiceNotFound => write!(f, "BluFi service not found"),
            Self::CharacteristicNotFound(uuid) => {
                write!(f, "characteristic {uuid:032x} not found")
            }
            Self::NotConnected => write!(f, "not connected"),
            Self::InvalidState(state) => write!(f, "invalid in state {state:?}"),
            Self::RequestPending(kind) => write!(f, "{kind} request already pending"),
            Self::PayloadTooLarge { len, max } => {
                write!(f, "payload of {len} bytes exceeds {max}")
            }
            Self::InvalidCredentials(msg) => write!(f, "credentials: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Frame(e) => Some(e),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    ConnectFailed,
    NotConnected,
    DiscoveryFailed,
    NotifyFailed,
    WriteFailed,
    /// The link closed underneath the operation.
    Closed,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectFailed => write!(f, "connect failed"),
            Self::NotConnected => write!(f, "link not connected"),
            Self::DiscoveryFailed => write!(f, "GATT discovery failed"),
            Self::NotifyFailed => write!(f, "enabling notifications failed"),
            Self::WriteFailed => write!(f, "characteristic write failed"),
            Self::Closed => write!(f, "link closed"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Frame errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Fewer than the 4 header bytes.
    TooShort { len: usize },
    /// The declared payload length runs past the buffer.
    Truncated { declared: usize, available: usize },
    /// Checksum bit set but the trailing two bytes are absent.
    ChecksumMissing,
    ChecksumMismatch { expected: u16, received: u16 },
    /// Bytes remain after the payload and checksum.
    TrailingBytes { expected: usize, len: usize },
    /// A single frame cannot carry more than 255 payload bytes.
    PayloadTooLong { len: usize },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { len } => write!(f, "frame too short ({len} bytes)"),
            Self::Truncated {
                declared,
                available,
            } => write!(f, "frame declares {declared} payload bytes, {available} present"),
            Self::ChecksumMissing => write!(f, "checksum missing"),
            Self::ChecksumMismatch { expected, received } => write!(
                f,
                "checksum mismatch (expected {expected:#06x}, got {received:#06x})"
            ),
            Self::TrailingBytes { expected, len } => {
                write!(f, "frame is {len} bytes, header implies {expected}")
            }
            Self::PayloadTooLong { len } => write!(f, "frame payload of {len} bytes exceeds 255"),
        }
    }
}

impl std::error::Error for FrameError {}

impl From<FrameError> for Error {
    fn from(e: FrameError) -> Self {
        Self::Frame(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
