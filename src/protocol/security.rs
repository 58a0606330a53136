//! Session security: mode byte, negotiation packets and the cipher hook.
//!
//! The handshake *shape* is implemented here; real key agreement is not.
//! [`XorKeystream`] is a reversible placeholder that provides no
//! confidentiality and must be replaced by an integrator-supplied
//! [`FrameCipher`] before encrypted frames carry anything sensitive.
//!
//! ```text
//!   phone                                 device
//!     │  Negotiation [0x00, len_hi, len_lo] │
//!     │────────────────────────────────────▶│
//!     │  Negotiation [0x01, params…]        │
//!     │────────────────────────────────────▶│
//!     │            Negotiation [key data…]  │
//!     │◀────────────────────────────────────│
//!     │  install_cipher(…)                  │
//! ```

use log::{info, warn};

// ── Security mode byte ───────────────────────────────────────

/// Security policy for one frame class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SecurityPolicy {
    pub checksum: bool,
    pub encrypt: bool,
}

impl SecurityPolicy {
    const fn nibble(self) -> u8 {
        (self.checksum as u8) | ((self.encrypt as u8) << 1)
    }

    const fn from_nibble(n: u8) -> Self {
        Self {
            checksum: n & 0b01 != 0,
            encrypt: n & 0b10 != 0,
        }
    }
}

/// Payload of the SetSecurityMode control frame.
///
/// High nibble applies to control frames, low nibble to data frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SecurityMode {
    pub control: SecurityPolicy,
    pub data: SecurityPolicy,
}

impl SecurityMode {
    /// Same checksum policy on both frame classes, encryption off.
    pub const fn checksum_only(checksum: bool) -> Self {
        let p = SecurityPolicy {
            checksum,
            encrypt: false,
        };
        Self { control: p, data: p }
    }

    pub const fn to_byte(self) -> u8 {
        (self.control.nibble() << 4) | self.data.nibble()
    }

    pub const fn from_byte(b: u8) -> Self {
        Self {
            control: SecurityPolicy::from_nibble(b >> 4),
            data: SecurityPolicy::from_nibble(b & 0x0F),
        }
    }
}

// ── Cipher hook ──────────────────────────────────────────────

/// Transforms frame payloads for frames that carry the Encrypted bit.
pub trait FrameCipher {
    /// Decrypt (or encrypt) `data` in place for the frame with `sequence`.
    fn apply(&self, sequence: u8, data: &mut [u8]);
}

/// Reversible XOR keystream keyed by the shared secret and an IV whose
/// first byte is the frame sequence.
///
/// **Insecure.** A placeholder for AES-128-CFB; never enabled by default.
#[derive(Debug, Clone)]
pub struct XorKeystream {
    key: Vec<u8>,
    iv: [u8; 16],
}

impl XorKeystream {
    /// Returns `None` for an empty key.
    pub fn new(key: &[u8], iv: [u8; 16]) -> Option<Self> {
        if key.is_empty() {
            return None;
        }
        warn!("security: XOR keystream installed, frames are NOT confidential");
        Some(Self {
            key: key.to_vec(),
            iv,
        })
    }
}

impl FrameCipher for XorKeystream {
    fn apply(&self, sequence: u8, data: &mut [u8]) {
        let mut iv = self.iv;
        iv[0] = sequence;
        for (i, b) in data.iter_mut().enumerate() {
            *b ^= self.key[i % self.key.len()] ^ iv[i % iv.len()];
        }
    }
}

// ── Negotiation packets ──────────────────────────────────────

const NEG_TYPE_LENGTH: u8 = 0x00;
const NEG_TYPE_DATA: u8 = 0x01;

/// Longest parameter block whose Data packet still fits one message.
pub const MAX_NEGOTIATION_PARAMS: usize = crate::protocol::chunked::MAX_MESSAGE_LEN - 1;

/// Outbound negotiation packets, each sent as one Negotiation data message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiationPacket {
    /// Announces the byte length of the parameter block (big-endian).
    Length(u16),
    /// The parameter block itself.
    Data(Vec<u8>),
}

impl NegotiationPacket {
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Length(len) => {
                let [hi, lo] = len.to_be_bytes();
                vec![NEG_TYPE_LENGTH, hi, lo]
            }
            Self::Data(params) => {
                let mut out = Vec::with_capacity(1 + params.len());
                out.push(NEG_TYPE_DATA);
                out.extend_from_slice(params);
                out
            }
        }
    }
}

/// Progress of the negotiation handshake.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NegotiationState {
    #[default]
    Plain,
    AwaitingPeer,
    /// Peer key material received; a cipher may now be installed.
    PeerKeyReceived,
    Established,
}

/// Tracks the negotiation handshake and owns the installed cipher.
#[derive(Default)]
pub struct SecurityNegotiator {
    state: NegotiationState,
    peer_key: Vec<u8>,
    cipher: Option<Box<dyn FrameCipher>>,
}

impl SecurityNegotiator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &NegotiationState {
        &self.state
    }

    /// Build the two packets that open a handshake and start waiting for
    /// the peer's reply.
    ///
    /// Returns `None`, leaving the state untouched, when the Data packet
    /// would not fit one message.
    pub fn begin(&mut self, params: &[u8]) -> Option<[NegotiationPacket; 2]> {
        if params.len() > MAX_NEGOTIATION_PARAMS {
            return None;
        }
        let len = u16::try_from(params.len()).ok()?;
        self.state = NegotiationState::AwaitingPeer;
        self.peer_key.clear();
        Some([
            NegotiationPacket::Length(len),
            NegotiationPacket::Data(params.to_vec()),
        ])
    }

    /// Record a Negotiation payload received from the device.
    pub fn on_peer_data(&mut self, payload: &[u8]) {
        if self.state != NegotiationState::AwaitingPeer {
            warn!(
                "security: unsolicited negotiation data ({} bytes) in state {:?}",
                payload.len(),
                self.state
            );
        }
        self.peer_key.clear();
        self.peer_key.extend_from_slice(payload);
        self.state = NegotiationState::PeerKeyReceived;
        info!("security: peer key material received ({} bytes)", payload.len());
    }

    pub fn peer_key(&self) -> &[u8] {
        &self.peer_key
    }

    pub fn install_cipher(&mut self, cipher: Box<dyn FrameCipher>) {
        self.cipher = Some(cipher);
        self.state = NegotiationState::Established;
    }

    pub fn cipher(&self) -> Option<&dyn FrameCipher> {
        self.cipher.as_deref()
    }

    pub fn reset(&mut self) {
        self.state = NegotiationState::Plain;
        self.peer_key.clear();
        self.cipher = None;
    }
}

// ── Tests ────────────────────────────────────────────────────
