//! BluFi frame protocol engine.
//!
//! ```text
//!  outbound                                   inbound
//!  ────────                                   ───────
//!  logical message                            notification bytes
//!        │                                           │
//!        ▼                                           ▼
//!  chunked::split ─▶ FrameEncoder            codec::decode_frame
//!        │            (sequence, crc)                │ (crc, cipher)
//!        ▼                                           ▼
//!  GattTransport::write                      chunked::Reassembler
//!                                                    │
//!                                                    ▼
//!                                            dispatch::route ─▶ Message
//! ```
//!
//! Everything in this module is synchronous and I/O-free; the session
//! layer drives it.

pub mod checksum;
pub mod chunked;
pub mod codec;
pub mod dispatch;
pub mod frame;
pub mod payloads;
pub mod security;
