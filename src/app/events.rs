//! Outbound session events.
//!
//! The [`Session`](crate::session::Session) emits these through the
//! [`EventSink`](super::ports::EventSink) port. Adapters on the other side
//! decide what to do with them: log, update a UI, record for a test.

use crate::error::FrameError;
use crate::protocol::frame::MessageKind;
use crate::protocol::payloads::{FirmwareVersion, WifiNetwork, WifiStatus};
use crate::session::pending::ResponseKind;
use crate::session::state::LinkState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
}

/// Structured events emitted by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The link moved between lifecycle states.
    StateChanged { from: LinkState, to: LinkState },

    /// An inbound frame was malformed or failed its checksum and was dropped.
    FrameDropped(FrameError),

    Ack { acked_sequence: Option<u8> },

    WifiStatus(WifiStatus),

    /// Networks from one Wi-Fi list message (already deduplicated).
    WifiNetworks(Vec<WifiNetwork>),

    Version(FirmwareVersion),

    CustomData(Vec<u8>),

    /// Peer negotiation data of the given length was recorded.
    Negotiation { len: usize },

    /// The device reported an error code.
    DeviceError(u8),

    /// A recognised message with no handler.
    Unhandled { kind: MessageKind, len: usize },

    /// An unknown (type, subtype) pair was discarded.
    Unrecognized { type_bits: u8, subtype: u8 },

    RequestTimedOut(ResponseKind),
}

impl SessionEvent {
    pub fn severity(&self) -> Severity {
        match self {
            Self::FrameDropped(_)
            | Self::DeviceError(_)
            | Self::Unrecognized { .. }
            | Self::RequestTimedOut(_) => Severity::Warning,
            _ => Severity::Info,
        }
    }
}
