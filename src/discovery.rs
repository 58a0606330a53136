//! Advertisement filtering.
//!
//! A scan reports the same peripheral many times; [`DeviceFilter`] keeps
//! the first sighting of each device whose name contains the configured
//! prefix.

use log::debug;

/// One BLE advertisement as reported by the platform scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    pub id: String,
    pub name: Option<String>,
    pub rssi: i8,
}

pub struct DeviceFilter {
    prefix: String,
    seen: Vec<String>,
}

impl DeviceFilter {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.into(),
            seen: Vec::new(),
        }
    }

    /// Whether the advertised name contains the prefix. An empty prefix
    /// matches named and unnamed devices alike.
    pub fn matches(&self, adv: &Advertisement) -> bool {
        if self.prefix.is_empty() {
            return true;
        }
        adv.name
            .as_deref()
            .is_some_and(|name| name.contains(self.prefix.as_str()))
    }

    /// Returns `true` the first time a matching device is offered.
    pub fn offer(&mut self, adv: &Advertisement) -> bool {
        if !self.matches(adv) || self.seen.iter().any(|id| *id == adv.id) {
            return false;
        }
        debug!("DISC: {} {:?} ({} dBm)", adv.id, adv.name, adv.rssi);
        self.seen.push(adv.id.clone());
        true
    }

    pub fn seen(&self) -> &[String] {
        &self.seen
    }

    pub fn reset(&mut self) {
        self.seen.clear();
    }
}

// ── Tests ────────────────────────────────────────────────────
