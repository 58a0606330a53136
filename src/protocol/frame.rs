//! Frame model: types, subtypes, control bits and header.
//!
//! ```text
//! ┌──────────────────────┬──────┬─────┬─────┬─────────────┬──────────────┐
//! │ type | subtype << 2  │ ctrl │ seq │ len │ payload     │ crc (LE u16) │
//! │ 1B                   │ 1B   │ 1B  │ 1B  │ len bytes   │ optional     │
//! └──────────────────────┴──────┴─────┴─────┴─────────────┴──────────────┘
//! ```

use core::fmt;

/// Size of the fixed frame header.
pub const HEADER_LEN: usize = 4;

/// Size of the optional trailing checksum.
pub const CHECKSUM_LEN: usize = 2;

/// Size of the total-length prefix on non-final fragments.
pub const TOTAL_LEN_PREFIX: usize = 2;

/// Largest payload a single frame can declare.
pub const MAX_FRAME_PAYLOAD: usize = u8::MAX as usize;

// ── Frame type ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    Control = 0,
    Data = 1,
}

impl FrameType {
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(Self::Control),
            1 => Some(Self::Data),
            _ => None,
        }
    }
}

// ── Control subtypes ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CtrlSubtype {
    Ack = 0x00,
    SetSecurityMode = 0x01,
    SetOpMode = 0x02,
    ConnectWifi = 0x03,
    DisconnectWifi = 0x04,
    GetWifiStatus = 0x05,
    DisconnectSta = 0x06,
    GetVersion = 0x07,
    DisconnectBle = 0x08,
    GetWifiList = 0x09,
}

impl CtrlSubtype {
    pub const fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0x00 => Self::Ack,
            0x01 => Self::SetSecurityMode,
            0x02 => Self::SetOpMode,
            0x03 => Self::ConnectWifi,
            0x04 => Self::DisconnectWifi,
            0x05 => Self::GetWifiStatus,
            0x06 => Self::DisconnectSta,
            0x07 => Self::GetVersion,
            0x08 => Self::DisconnectBle,
            0x09 => Self::GetWifiList,
            _ => return None,
        })
    }
}

// ── Data subtypes ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataSubtype {
    Negotiation = 0x00,
    StaBssid = 0x01,
    StaSsid = 0x02,
    StaPassword = 0x03,
    SoftApSsid = 0x04,
    SoftApPassword = 0x05,
    SoftApMaxConnNum = 0x06,
    SoftApAuthMode = 0x07,
    SoftApChannel = 0x08,
    Username = 0x09,
    CaCertification = 0x0A,
    ClientCertification = 0x0B,
    ServerCertification = 0x0C,
    ClientPrivateKey = 0x0D,
    ServerPrivateKey = 0x0E,
    WifiConnectionState = 0x0F,
    Version = 0x10,
    WifiList = 0x11,
    Error = 0x12,
    CustomData = 0x13,
    MaxReconnect = 0x14,
    WifiErrorReason = 0x15,
    WifiErrorRssi = 0x16,
}

impl DataSubtype {
    pub const fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0x00 => Self::Negotiation,
            0x01 => Self::StaBssid,
            0x02 => Self::StaSsid,
            0x03 => Self::StaPassword,
            0x04 => Self::SoftApSsid,
            0x05 => Self::SoftApPassword,
            0x06 => Self::SoftApMaxConnNum,
            0x07 => Self::SoftApAuthMode,
            0x08 => Self::SoftApChannel,
            0x09 => Self::Username,
            0x0A => Self::CaCertification,
            0x0B => Self::ClientCertification,
            0x0C => Self::ServerCertification,
            0x0D => Self::ClientPrivateKey,
            0x0E => Self::ServerPrivateKey,
            0x0F => Self::WifiConnectionState,
            0x10 => Self::Version,
            0x11 => Self::WifiList,
            0x12 => Self::Error,
            0x13 => Self::CustomData,
            0x14 => Self::MaxReconnect,
            0x15 => Self::WifiErrorReason,
            0x16 => Self::WifiErrorRssi,
            _ => return None,
        })
    }
}

// ── Message kind ─────────────────────────────────────────────

/// A recognised (type, subtype) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Control(CtrlSubtype),
    Data(DataSubtype),
}

impl MessageKind {
    pub const fn frame_type(self) -> FrameType {
        match self {
            Self::Control(_) => FrameType::Control,
            Self::Data(_) => FrameType::Data,
        }
    }

    pub const fn subtype(self) -> u8 {
        match self {
            Self::Control(s) => s as u8,
            Self::Data(s) => s as u8,
        }
    }

    /// The first wire byte: `type | subtype << 2`.
    pub const fn type_subtype_byte(self) -> u8 {
        (self.frame_type() as u8 & 0b11) | ((self.subtype() & 0x3F) << 2)
    }

    /// Map raw header fields back to a known kind.
    pub const fn from_parts(type_bits: u8, subtype: u8) -> Option<Self> {
        match FrameType::from_bits(type_bits) {
            Some(FrameType::Control) => match CtrlSubtype::from_u8(subtype) {
                Some(s) => Some(Self::Control(s)),
                None => None,
            },
            Some(FrameType::Data) => match DataSubtype::from_u8(subtype) {
                Some(s) => Some(Self::Data(s)),
                None => None,
            },
            None => None,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Control(s) => write!(f, "ctrl/{s:?}"),
            Self::Data(s) => write!(f, "data/{s:?}"),
        }
    }
}

// ── Control byte ─────────────────────────────────────────────

/// The frame control byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameCtrl(pub u8);

impl FrameCtrl {
    pub const ENCRYPTED: u8 = 0x01;
    pub const CHECKSUM: u8 = 0x02;
    /// Set on frames travelling device → phone.
    pub const DATA_DIRECTION: u8 = 0x04;
    pub const REQUIRE_ACK: u8 = 0x08;
    pub const FRAGMENTED: u8 = 0x10;

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn with(self, flag: u8, on: bool) -> Self {
        if on { Self(self.0 | flag) } else { Self(self.0 & !flag) }
    }

    pub const fn is_encrypted(self) -> bool {
        self.0 & Self::ENCRYPTED != 0
    }

    pub const fn has_checksum(self) -> bool {
        self.0 & Self::CHECKSUM != 0
    }

    pub const fn is_from_device(self) -> bool {
        self.0 & Self::DATA_DIRECTION != 0
    }

    pub const fn requires_ack(self) -> bool {
        self.0 & Self::REQUIRE_ACK != 0
    }

    pub const fn is_fragmented(self) -> bool {
        self.0 & Self::FRAGMENTED != 0
    }
}

// ── Header / decoded frame ───────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Low two bits of the first byte. Values 2 and 3 are carried through
    /// undecoded.
    pub type_bits: u8,
    pub subtype: u8,
    pub ctrl: FrameCtrl,
    pub sequence: u8,
}

impl FrameHeader {
    pub const fn from_first_byte(byte: u8, ctrl: u8, sequence: u8) -> Self {
        Self {
            type_bits: byte & 0b11,
            subtype: byte >> 2,
            ctrl: FrameCtrl(ctrl),
            sequence,
        }
    }

    pub const fn kind(&self) -> Option<MessageKind> {
        MessageKind::from_parts(self.type_bits, self.subtype)
    }
}

/// A validated inbound frame with its (possibly decrypted) payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub header: FrameHeader,
    pub payload: Vec<u8>,
}

// ── Tests ────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_subtype_packing() {
        assert_eq!(
            MessageKind::Control(CtrlSubtype::SetSecurityMode).type_subtype_byte(),
            0x04
        );
        assert_eq!(MessageKind::Data(DataSubtype::StaSsid).type_subtype_byte(), 0x09);
        assert_eq!(MessageKind::Data(DataSubtype::CustomData).type_subtype_byte(), 0x4D);
        assert_eq!(MessageKind::Control(CtrlSubtype::Ack).type_subtype_byte(), 0x00);
    }

    #[test]
    fn first_byte_unpacks_back_to_kind() {
        for raw in 0u8..=0x09 {
            let kind = MessageKind::Control(CtrlSubtype::from_u8(raw).unwrap());
            let hdr = FrameHeader::from_first_byte(kind.type_subtype_byte(), 0, 0);
            assert_eq!(hdr.kind(), Some(kind));
        }
        for raw in 0u8..=0x16 {
            let kind = MessageKind::Data(DataSubtype::from_u8(raw).unwrap());
            let hdr = FrameHeader::from_first_byte(kind.type_subtype_byte(), 0, 0);
            assert_eq!(hdr.kind(), Some(kind));
        }
    }

    #[test]
    fn unknown_parts_are_not_a_kind() {
        assert_eq!(MessageKind::from_parts(2, 0), None);
        assert_eq!(MessageKind::from_parts(0, 0x0A), None);
        assert_eq!(MessageKind::from_parts(1, 0x17), None);
    }

    #[test]
    fn ctrl_flag_helpers() {
        let ctrl = FrameCtrl::default()
            .with(FrameCtrl::CHECKSUM, true)
            .with(FrameCtrl::FRAGMENTED, true);
        assert!(ctrl.has_checksum());
        assert!(ctrl.is_fragmented());
        assert!(!ctrl.is_encrypted());
        assert!(!ctrl.requires_ack());
        assert_eq!(ctrl.bits(), 0x12);
        assert!(!ctrl.with(FrameCtrl::FRAGMENTED, false).is_fragmented());
    }
}
