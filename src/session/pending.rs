//! Typed one-shot waiters for device responses.
//!
//! One slot per [`ResponseKind`]. Arming a slot hands out a guard; the
//! inbound path resolves the slot when a matching message arrives, and
//! dropping the guard (completion, timeout, or the caller giving up)
//! disarms it again. A second request of the same kind while a slot is
//! armed is rejected.
//!
//! The scan slot differs: Wi-Fi list messages accumulate until the scan
//! window closes, so it collects rather than resolves.

use core::cell::{Cell, RefCell};
use core::fmt;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::signal::Signal;

use crate::error::Error;
use crate::protocol::payloads::{FirmwareVersion, WifiNetwork, WifiStatus, merge_networks};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    WifiStatus,
    WifiList,
    Version,
    Ack,
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WifiStatus => write!(f, "Wi-Fi status"),
            Self::WifiList => write!(f, "Wi-Fi list"),
            Self::Version => write!(f, "version"),
            Self::Ack => write!(f, "ack"),
        }
    }
}

// ── Single-response slot ─────────────────────────────────────

/// `None` in the signal means the wait was cancelled by disconnect.
pub struct Slot<T> {
    kind: ResponseKind,
    armed: Cell<bool>,
    signal: Signal<NoopRawMutex, Option<T>>,
}

impl<T: Send> Slot<T> {
    pub const fn new(kind: ResponseKind) -> Self {
        Self {
            kind,
            armed: Cell::new(false),
            signal: Signal::new(),
        }
    }

    pub fn kind(&self) -> ResponseKind {
        self.kind
    }

    pub fn is_armed(&self) -> bool {
        self.armed.get()
    }

    pub fn arm(&self) -> Result<SlotGuard<'_, T>, Error> {
        if self.armed.replace(true) {
            return Err(Error::RequestPending(self.kind));
        }
        self.signal.reset();
        Ok(SlotGuard { slot: self })
    }

    /// Deliver a response. Returns `false` if nobody is waiting.
    pub fn resolve(&self, value: T) -> bool {
        if !self.armed.get() {
            return false;
        }
        self.signal.signal(Some(value));
        true
    }

    pub fn cancel(&self) {
        if self.armed.get() {
            self.signal.signal(None);
        }
    }
}

pub struct SlotGuard<'a, T: Send> {
    slot: &'a Slot<T>,
}

impl<T: Send> SlotGuard<'_, T> {
    /// Wait for the next resolution of this slot.
    pub async fn wait(&self) -> Result<T, Error> {
        self.slot.signal.wait().await.ok_or(Error::NotConnected)
    }
}

impl<T: Send> Drop for SlotGuard<'_, T> {
    fn drop(&mut self) {
        self.slot.armed.set(false);
        self.slot.signal.reset();
    }
}

// ── Scan collector ───────────────────────────────────────────

pub struct ScanCollector {
    armed: Cell<bool>,
    found: RefCell<Vec<WifiNetwork>>,
    cancelled: Signal<NoopRawMutex, ()>,
}

impl ScanCollector {
    pub const fn new() -> Self {
        Self {
            armed: Cell::new(false),
            found: RefCell::new(Vec::new()),
            cancelled: Signal::new(),
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.get()
    }

    pub fn arm(&self) -> Result<ScanGuard<'_>, Error> {
        if self.armed.replace(true) {
            return Err(Error::RequestPending(ResponseKind::WifiList));
        }
        self.found.borrow_mut().clear();
        self.cancelled.reset();
        Ok(ScanGuard { scan: self })
    }

    /// Merge networks from one Wi-Fi list message. Returns `false` if no
    /// scan is running.
    pub fn offer(&self, networks: Vec<WifiNetwork>) -> bool {
        if !self.armed.get() {
            return false;
        }
        merge_networks(&mut self.found.borrow_mut(), networks);
        true
    }

    pub fn cancel(&self) {
        if self.armed.get() {
            self.cancelled.signal(());
        }
    }
}

impl Default for ScanCollector {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ScanGuard<'a> {
    scan: &'a ScanCollector,
}

impl ScanGuard<'_> {
    /// Resolves only if the scan is cancelled.
    pub async fn cancelled(&self) -> Error {
        self.scan.cancelled.wait().await;
        Error::NotConnected
    }

    pub fn take(&self) -> Vec<WifiNetwork> {
        core::mem::take(&mut *self.scan.found.borrow_mut())
    }
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.scan.armed.set(false);
        self.scan.found.borrow_mut().clear();
        self.scan.cancelled.reset();
    }
}

// ── Registry ─────────────────────────────────────────────────

pub struct PendingRequests {
    pub status: Slot<WifiStatus>,
    pub version: Slot<FirmwareVersion>,
    /// Resolved with the acknowledged sequence number.
    pub ack: Slot<Option<u8>>,
    pub scan: ScanCollector,
}

impl PendingRequests {
    pub const fn new() -> Self {
        Self {
            status: Slot::new(ResponseKind::WifiStatus),
            version: Slot::new(ResponseKind::Version),
            ack: Slot::new(ResponseKind::Ack),
            scan: ScanCollector::new(),
        }
    }

    pub fn is_pending(&self, kind: ResponseKind) -> bool {
        match kind {
            ResponseKind::WifiStatus => self.status.is_armed(),
            ResponseKind::WifiList => self.scan.is_armed(),
            ResponseKind::Version => self.version.is_armed(),
            ResponseKind::Ack => self.ack.is_armed(),
        }
    }

    /// Wake every waiter with `Error::NotConnected`.
    pub fn cancel_all(&self) {
        self.status.cancel();
        self.version.cancel();
        self.ack.cancel();
        self.scan.cancel();
    }
}

impl Default for PendingRequests {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ────────────────────────────────────────────────────
