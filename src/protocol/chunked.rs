//! Fragmentation of logical messages into MTU-sized frames, and the
//! per-(type, subtype) reassembly cache on the receive side.
//!
//! ```text
//! Frame 1:   [FRAGMENTED]  total_len(LE u16) ‖ data[0 .. k)
//! Frame 2:   [FRAGMENTED]  total_len(LE u16) ‖ data[k .. 2k)
//! Frame N:   []                                data[(N-1)k .. len)
//! ```
//!
//! `k = max_payload - 2`. The total-length prefix is repeated on every
//! non-final fragment; receivers only read it from the first one.

use std::collections::HashMap;

use log::{debug, warn};

use super::frame::{
    CHECKSUM_LEN, DecodedFrame, HEADER_LEN, MAX_FRAME_PAYLOAD, MessageKind, TOTAL_LEN_PREFIX,
};
use crate::error::Error;

/// Largest logical message the 16-bit total-length prefix can describe.
pub const MAX_MESSAGE_LEN: usize = u16::MAX as usize;

/// Payload capacity of one frame for a given transport write size.
pub fn max_payload(max_frame_bytes: usize, checksum: bool) -> usize {
    let overhead = HEADER_LEN + if checksum { CHECKSUM_LEN } else { 0 };
    max_frame_bytes.saturating_sub(overhead).min(MAX_FRAME_PAYLOAD)
}

// ── Fragmenter ───────────────────────────────────────────────

/// One outbound fragment of a logical message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment<'a> {
    /// Total message length; present on every non-final fragment.
    pub total_len: Option<u16>,
    pub data: &'a [u8],
}

impl Fragment<'_> {
    pub fn is_final(&self) -> bool {
        self.total_len.is_none()
    }

    /// Bytes this fragment occupies in the frame payload field.
    pub fn wire_len(&self) -> usize {
        self.data.len() + if self.is_final() { 0 } else { TOTAL_LEN_PREFIX }
    }

    pub fn write_payload(&self, out: &mut Vec<u8>) {
        if let Some(total) = self.total_len {
            out.extend_from_slice(&total.to_le_bytes());
        }
        out.extend_from_slice(self.data);
    }
}

/// Split `payload` into fragments whose wire length fits `max_payload`.
pub fn split(payload: &[u8], max_payload: usize) -> Result<Vec<Fragment<'_>>, Error> {
    let total = u16::try_from(payload.len()).map_err(|_| Error::PayloadTooLarge {
        len: payload.len(),
        max: MAX_MESSAGE_LEN,
    })?;

    if payload.len() <= max_payload {
        return Ok(vec![Fragment {
            total_len: None,
            data: payload,
        }]);
    }

    if max_payload <= TOTAL_LEN_PREFIX {
        return Err(Error::Config("frame too small to carry a fragment"));
    }

    let step = max_payload - TOTAL_LEN_PREFIX;
    let count = payload.len().div_ceil(step);

    Ok(payload
        .chunks(step)
        .enumerate()
        .map(|(i, data)| Fragment {
            total_len: (i + 1 < count).then_some(total),
            data,
        })
        .collect())
}

// ── Reassembler ──────────────────────────────────────────────

/// A fully reassembled logical message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompleteMessage {
    pub type_bits: u8,
    pub subtype: u8,
    pub payload: Vec<u8>,
}

impl CompleteMessage {
    pub fn kind(&self) -> Option<MessageKind> {
        MessageKind::from_parts(self.type_bits, self.subtype)
    }
}

struct Chain {
    total: usize,
    buf: Vec<u8>,
}

/// Receive-side reassembly cache, at most one open chain per key.
#[derive(Default)]
pub struct Reassembler {
    chains: HashMap<(u8, u8), Chain>,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one decoded frame.
    ///
    /// Returns the complete message when this frame finishes one.
    pub fn feed(&mut self, frame: DecodedFrame) -> Option<CompleteMessage> {
        let DecodedFrame { header, payload } = frame;
        let key = (header.type_bits, header.subtype);
        let fragmented = header.ctrl.is_fragmented();

        let (mut chain, body) = match self.chains.remove(&key) {
            Some(chain) if fragmented => {
                (chain, payload.get(TOTAL_LEN_PREFIX..).unwrap_or_default())
            }
            Some(chain) => (chain, payload.as_slice()),
            None if fragmented => {
                let Some((prefix, rest)) = payload.split_first_chunk::<TOTAL_LEN_PREFIX>() else {
                    warn!(
                        "reassembly: fragment for {:?} too short for length prefix ({} bytes)",
                        key,
                        payload.len()
                    );
                    return None;
                };
                let total = usize::from(u16::from_le_bytes(*prefix));
                debug!("reassembly: open chain {:?}, total={}", key, total);
                let chain = Chain {
                    total,
                    buf: Vec::with_capacity(total),
                };
                (chain, rest)
            }
            None => {
                return Some(CompleteMessage {
                    type_bits: header.type_bits,
                    subtype: header.subtype,
                    payload,
                });
            }
        };

        let room = chain.total - chain.buf.len();
        if body.len() > room {
            warn!(
                "reassembly: {} bytes beyond declared total {} for {:?} discarded",
                body.len() - room,
                chain.total,
                key
            );
        }
        chain.buf.extend_from_slice(&body[..body.len().min(room)]);

        if fragmented && chain.buf.len() < chain.total {
            self.chains.insert(key, chain);
            return None;
        }

        if chain.buf.len() < chain.total {
            warn!(
                "reassembly: chain {:?} ended at {} of {} bytes",
                key,
                chain.buf.len(),
                chain.total
            );
        }

        Some(CompleteMessage {
            type_bits: header.type_bits,
            subtype: header.subtype,
            payload: chain.buf,
        })
    }

    /// Drop every open chain (e.g. on disconnect).
    pub fn clear(&mut self) {
        self.chains.clear();
    }

    pub fn open_chains(&self) -> usize {
        self.chains.len()
    }
}

// ── Tests ────────────────────────────────────────────────────
