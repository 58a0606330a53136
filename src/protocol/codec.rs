//! BluFi frame codec.
//!
//! [`FrameEncoder`] owns the session's sequence counter and turns logical
//! messages into wire frames; [`decode_frame`] validates a single inbound
//! notification and returns its header and payload.
//!
//! Encoding never sets the Encrypted bit. Decoding honours it when a
//! [`FrameCipher`] is installed.

use log::warn;

use super::checksum::checksum;
use super::chunked::{self, Fragment};
use super::frame::{
    CHECKSUM_LEN, DecodedFrame, FrameCtrl, FrameHeader, HEADER_LEN, MAX_FRAME_PAYLOAD, MessageKind,
};
use super::security::FrameCipher;
use crate::error::{Error, FrameError};

// ── Sequence counter ─────────────────────────────────────────

/// Per-session frame sequence, advanced once per frame and wrapping at 256.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceCounter(u8);

impl SequenceCounter {
    pub const fn new() -> Self {
        Self(0)
    }

    /// The sequence the next frame will carry.
    pub const fn peek(&self) -> u8 {
        self.0
    }

    /// Take the current sequence and advance.
    pub fn advance(&mut self) -> u8 {
        let seq = self.0;
        self.0 = self.0.wrapping_add(1);
        seq
    }

    pub fn reset(&mut self) {
        self.0 = 0;
    }
}

// ── Encoder ──────────────────────────────────────────────────

#[derive(Debug)]
pub struct FrameEncoder {
    sequence: SequenceCounter,
    checksum: bool,
    from_device: bool,
}

impl FrameEncoder {
    /// Phone-side encoder.
    pub fn new(checksum: bool) -> Self {
        Self {
            sequence: SequenceCounter::new(),
            checksum,
            from_device: false,
        }
    }

    /// Device-side encoder; frames carry the DataDirection bit.
    pub fn to_phone(checksum: bool) -> Self {
        Self {
            from_device: true,
            ..Self::new(checksum)
        }
    }

    pub fn checksum_enabled(&self) -> bool {
        self.checksum
    }

    pub fn set_checksum(&mut self, enabled: bool) {
        self.checksum = enabled;
    }

    pub fn next_sequence(&self) -> u8 {
        self.sequence.peek()
    }

    /// Restart the sequence at 0 for a new session.
    pub fn reset(&mut self) {
        self.sequence.reset();
    }

    /// Encode a single unfragmented frame.
    ///
    /// `want_checksum = None` applies the encoder's checksum policy.
    pub fn encode(
        &mut self,
        kind: MessageKind,
        payload: &[u8],
        want_ack: bool,
        want_checksum: Option<bool>,
    ) -> Result<Vec<u8>, FrameError> {
        let ctrl = FrameCtrl::default().with(FrameCtrl::REQUIRE_ACK, want_ack);
        self.encode_with(kind, ctrl, payload, want_checksum.unwrap_or(self.checksum))
    }

    /// Encode one fragment produced by [`chunked::split`].
    pub fn encode_fragment(
        &mut self,
        kind: MessageKind,
        fragment: &Fragment<'_>,
        want_ack: bool,
    ) -> Result<Vec<u8>, FrameError> {
        let mut body = Vec::with_capacity(fragment.wire_len());
        fragment.write_payload(&mut body);
        let ctrl = FrameCtrl::default()
            .with(FrameCtrl::FRAGMENTED, !fragment.is_final())
            .with(FrameCtrl::REQUIRE_ACK, want_ack);
        self.encode_with(kind, ctrl, &body, self.checksum)
    }

    /// Split and encode a whole logical message for a transport whose
    /// writes are limited to `max_frame_bytes`.
    pub fn encode_chunked(
        &mut self,
        kind: MessageKind,
        payload: &[u8],
        max_frame_bytes: usize,
    ) -> Result<Vec<Vec<u8>>, Error> {
        let max = chunked::max_payload(max_frame_bytes, self.checksum);
        chunked::split(payload, max)?
            .iter()
            .map(|f| self.encode_fragment(kind, f, false).map_err(Error::from))
            .collect()
    }

    fn encode_with(
        &mut self,
        kind: MessageKind,
        ctrl: FrameCtrl,
        payload: &[u8],
        with_checksum: bool,
    ) -> Result<Vec<u8>, FrameError> {
        if payload.len() > MAX_FRAME_PAYLOAD {
            return Err(FrameError::PayloadTooLong { len: payload.len() });
        }

        let ctrl = ctrl
            .with(FrameCtrl::CHECKSUM, with_checksum)
            .with(FrameCtrl::DATA_DIRECTION, self.from_device);

        let mut out = Vec::with_capacity(HEADER_LEN + payload.len() + CHECKSUM_LEN);
        out.push(kind.type_subtype_byte());
        out.push(ctrl.bits());
        out.push(self.sequence.advance());
        out.push(payload.len() as u8);
        out.extend_from_slice(payload);

        if with_checksum {
            let crc = checksum(&out[2..]);
            out.extend_from_slice(&crc.to_le_bytes());
        }

        Ok(out)
    }
}

// ── Decoder ──────────────────────────────────────────────────

/// Validate and decode one inbound frame.
///
/// The buffer must hold exactly the header, the declared payload and,
/// when the checksum bit is set, the two CRC bytes.
pub fn decode_frame(
    bytes: &[u8],
    cipher: Option<&dyn FrameCipher>,
) -> Result<DecodedFrame, FrameError> {
    let Some((&[first, ctrl, sequence, declared], rest)) = bytes.split_first_chunk::<HEADER_LEN>()
    else {
        return Err(FrameError::TooShort { len: bytes.len() });
    };

    let header = FrameHeader::from_first_byte(first, ctrl, sequence);
    let declared = usize::from(declared);

    if rest.len() < declared {
        return Err(FrameError::Truncated {
            declared,
            available: rest.len(),
        });
    }

    if header.ctrl.has_checksum() && rest.len() < declared + CHECKSUM_LEN {
        return Err(FrameError::ChecksumMissing);
    }

    let expected_len =
        HEADER_LEN + declared + if header.ctrl.has_checksum() { CHECKSUM_LEN } else { 0 };
    if bytes.len() != expected_len {
        return Err(FrameError::TrailingBytes {
            expected: expected_len,
            len: bytes.len(),
        });
    }

    if header.ctrl.has_checksum() {
        let Some(&[lo, hi]) = rest[declared..].first_chunk::<CHECKSUM_LEN>() else {
            return Err(FrameError::ChecksumMissing);
        };
        let received = u16::from_le_bytes([lo, hi]);
        let expected = checksum(&bytes[2..HEADER_LEN + declared]);
        if received != expected {
            return Err(FrameError::ChecksumMismatch { expected, received });
        }
    }

    let mut payload = rest[..declared].to_vec();

    if header.ctrl.is_encrypted() {
        match cipher {
            Some(c) => c.apply(header.sequence, &mut payload),
            None => warn!(
                "codec: encrypted frame seq={} but no cipher installed, passing through",
                header.sequence
            ),
        }
    }

    Ok(DecodedFrame { header, payload })
}

// ── Tests ────────────────────────────────────────────────────
