//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured session events to the
//! `log` facade. Warnings go out at `warn` level, everything else at
//! `info`. A UI adapter would implement the same trait.

use log::{Level, log};

use crate::app::events::{SessionEvent, Severity};
use crate::app::ports::EventSink;

/// Adapter that logs every [`SessionEvent`].
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &SessionEvent) {
        let level = match event.severity() {
            Severity::Info => Level::Info,
            Severity::Warning => Level::Warn,
        };
        match event {
            SessionEvent::StateChanged { from, to } => {
                log!(level, "STATE | {:?} -> {:?}", from, to);
            }
            SessionEvent::FrameDropped(e) => {
                log!(level, "FRAME | dropped: {}", e);
            }
            SessionEvent::Ack { acked_sequence } => {
                log!(level, "ACK   | seq={:?}", acked_sequence);
            }
            SessionEvent::WifiStatus(s) => {
                log!(
                    level,
                    "WIFI  | {} | sta={}",
                    s,
                    if s.is_station_connected() { "UP" } else { "DOWN" }
                );
            }
            SessionEvent::WifiNetworks(list) => {
                for net in list {
                    log!(level, "SCAN  | {:>4} dBm {:?}", net.rssi_dbm(), net.ssid);
                }
            }
            SessionEvent::Version(v) => {
                log!(level, "VER   | firmware {}", v);
            }
            SessionEvent::CustomData(data) => {
                log!(level, "DATA  | custom {} bytes: {:02x?}", data.len(), data);
            }
            SessionEvent::Negotiation { len } => {
                log!(level, "NEG   | peer sent {} bytes", len);
            }
            SessionEvent::DeviceError(code) => {
                log!(level, "ERROR | device code {}", code);
            }
            SessionEvent::Unhandled { kind, len } => {
                log!(level, "MSG   | {} ({} bytes) unhandled", kind, len);
            }
            SessionEvent::Unrecognized { type_bits, subtype } => {
                log!(
                    level,
                    "MSG   | unrecognized type={} subtype={:#04x}",
                    type_bits,
                    subtype
                );
            }
            SessionEvent::RequestTimedOut(kind) => {
                log!(level, "TIME  | {} request timed out", kind);
            }
        }
    }
}
