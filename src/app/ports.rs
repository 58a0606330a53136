//! Port traits — the hexagonal boundary between the BluFi engine and the
//! host platform.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Session (domain)
//! ```
//!
//! The radio stack, timers and event consumers implement these traits.
//! [`Session`](crate::session::Session) consumes them via generics, so the
//! protocol core never touches a BLE API directly.
//!
//! All methods take `&self`: a session is driven cooperatively on one
//! thread and several of its futures (a fragment chain being written, a
//! response being awaited, the inbound pump) hold the transport at once.
//! Implementations use interior mutability where they need state.

#![allow(async_fn_in_trait)]

use crate::app::events::SessionEvent;
use crate::error::TransportError;

// ───────────────────────────────────────────────────────────────
// GATT transport (driven adapter: domain → radio)
// ───────────────────────────────────────────────────────────────

/// GATT client operations needed to run a BluFi session.
///
/// Service and characteristic identifiers are full 128-bit UUIDs.
pub trait GattTransport {
    /// Open a link to the device with the given platform identifier.
    async fn connect(&self, device_id: &str) -> Result<(), TransportError>;

    /// Primary services exposed by the connected device.
    async fn services(&self) -> Result<Vec<u128>, TransportError>;

    /// Characteristics of one service.
    async fn characteristics(&self, service: u128) -> Result<Vec<u128>, TransportError>;

    async fn enable_notifications(
        &self,
        service: u128,
        characteristic: u128,
    ) -> Result<(), TransportError>;

    /// Write one frame. Implementations must not split or coalesce writes.
    async fn write(
        &self,
        service: u128,
        characteristic: u128,
        data: &[u8],
    ) -> Result<(), TransportError>;

    async fn disconnect(&self) -> Result<(), TransportError>;
}

// ───────────────────────────────────────────────────────────────
// Notification source (driving adapter: radio → domain)
// ───────────────────────────────────────────────────────────────

/// Stream of notification payloads from the BluFi notify characteristic.
///
/// Platforms that deliver notifications through callbacks can skip this
/// and call [`Session::handle_notification`](crate::session::Session::handle_notification)
/// directly.
pub trait NotificationSource {
    /// Next notification, or `None` once the link is gone.
    async fn next_notification(&self) -> Option<Vec<u8>>;
}

// ───────────────────────────────────────────────────────────────
// Delay (driven adapter: domain → timer)
// ───────────────────────────────────────────────────────────────

pub trait Delay {
    async fn delay_ms(&self, ms: u32);
}

// ───────────────────────────────────────────────────────────────
// Event sink (driven adapter: domain → logging / UI)
// ───────────────────────────────────────────────────────────────

/// The session emits structured [`SessionEvent`]s through this port.
/// Adapters decide where they go (log, UI, test recorder).
pub trait EventSink {
    fn emit(&mut self, event: &SessionEvent);
}

impl<F> EventSink for F
where
    F: FnMut(&SessionEvent),
{
    fn emit(&mut self, event: &SessionEvent) {
        self(event);
    }
}
