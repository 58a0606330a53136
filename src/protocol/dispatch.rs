//! Routing of reassembled messages to typed [`Message`] values.
//!
//! A closed match over [`MessageKind`]; anything the table does not name
//! lands in [`Message::Other`] or, for unknown (type, subtype) pairs,
//! [`Message::Unrecognized`]. Routing never fails.

use super::chunked::CompleteMessage;
use super::frame::{CtrlSubtype, DataSubtype, MessageKind};
use super::payloads::{FirmwareVersion, WifiNetwork, WifiStatus, parse_wifi_list};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// The device acknowledged the frame with this sequence.
    Ack { acked_sequence: Option<u8> },
    WifiStatus(WifiStatus),
    WifiList(Vec<WifiNetwork>),
    Version(FirmwareVersion),
    CustomData(Vec<u8>),
    /// Key material from the peer's side of the negotiation.
    Negotiation(Vec<u8>),
    /// Error code reported by the device.
    DeviceError(u8),
    /// A known kind with no dedicated handler.
    Other { kind: MessageKind, payload: Vec<u8> },
    Unrecognized {
        type_bits: u8,
        subtype: u8,
        payload_len: usize,
    },
}

pub fn route(msg: CompleteMessage) -> Message {
    let Some(kind) = msg.kind() else {
        return Message::Unrecognized {
            type_bits: msg.type_bits,
            subtype: msg.subtype,
            payload_len: msg.payload.len(),
        };
    };

    let payload = msg.payload;
    match kind {
        MessageKind::Control(CtrlSubtype::Ack) => Message::Ack {
            acked_sequence: payload.first().copied(),
        },
        MessageKind::Data(DataSubtype::WifiConnectionState) => {
            Message::WifiStatus(WifiStatus::parse(&payload))
        }
        MessageKind::Data(DataSubtype::WifiList) => Message::WifiList(parse_wifi_list(&payload)),
        MessageKind::Data(DataSubtype::Version) => {
            Message::Version(FirmwareVersion::parse(&payload))
        }
        MessageKind::Data(DataSubtype::CustomData) => Message::CustomData(payload),
        MessageKind::Data(DataSubtype::Negotiation) => Message::Negotiation(payload),
        MessageKind::Data(DataSubtype::Error) => {
            Message::DeviceError(payload.first().copied().unwrap_or(0))
        }
        kind => Message::Other { kind, payload },
    }
}

// ── Tests ────────────────────────────────────────────────────
