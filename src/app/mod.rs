//! Application boundary — ports and the events that cross them.
//!
//! The session core talks to the radio, timers and consumers only through
//! the **port traits** defined in [`ports`], keeping the protocol engine
//! testable without a BLE stack.

pub mod events;
pub mod ports;
