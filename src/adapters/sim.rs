//! In-memory BluFi device.
//!
//! Implements [`GattTransport`] and [`NotificationSource`] by running the
//! device side of the protocol against the crate's own codec. Used by
//! the integration tests and by the `blufi-sim` binary.
//!
//! ```text
//!   Session ── write ──▶ SimulatedDevice ── decode ▶ reassemble ▶ act
//!      ▲                        │
//!      └── next_notification ◀──┴── outbox (Channel) ◀── encode replies
//! ```
//!
//! Sequence numbers of inbound frames are checked strictly; a gap is
//! counted in [`SimulatedDevice::sequence_errors`] rather than rejected, so
//! tests can assert the host never skips or repeats one.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Channel;
use log::{debug, info, warn};

use crate::app::ports::{GattTransport, NotificationSource};
use crate::error::TransportError;
use crate::protocol::chunked::{CompleteMessage, Reassembler};
use crate::protocol::codec::{FrameEncoder, decode_frame};
use crate::protocol::frame::{CtrlSubtype, DataSubtype, MessageKind};
use crate::protocol::payloads::{FirmwareVersion, OpMode};
use crate::protocol::security::SecurityMode;
use crate::session::{BLUFI_NOTIFY_CHAR_UUID, BLUFI_SERVICE_UUID, BLUFI_WRITE_CHAR_UUID};

/// Generic Access service, advertised alongside BluFi.
const GAP_SERVICE_UUID: u128 = 0x00001800_0000_1000_8000_00805f9b34fb;

const OUTBOX_DEPTH: usize = 64;

/// Networks per Wi-Fi list message; longer scans span several messages.
const NETWORKS_PER_MESSAGE: usize = 4;

/// Behaviour switches for the simulated device.
#[derive(Debug, Clone)]
pub struct SimOptions {
    pub advertise_service: bool,
    pub advertise_write_char: bool,
    pub advertise_notify_char: bool,
    pub fail_connect: bool,
    /// Answer status, list and version requests.
    pub answer_requests: bool,
    /// Reply to frames with RequireAck set.
    pub ack_frames: bool,
    /// Fail every write after this many have succeeded.
    pub fail_write_after: Option<usize>,
    /// Device-side notification size.
    pub max_frame_bytes: usize,
    pub version: FirmwareVersion,
    /// `(ssid, rssi_dbm)` reported by scans.
    pub networks: Vec<(String, i8)>,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            advertise_service: true,
            advertise_write_char: true,
            advertise_notify_char: true,
            fail_connect: false,
            answer_requests: true,
            ack_frames: true,
            fail_write_after: None,
            max_frame_bytes: 20,
            version: FirmwareVersion { major: 1, minor: 3 },
            networks: vec![
                ("HomeNet".into(), -48),
                ("Office-5G".into(), -61),
                ("Guest".into(), -77),
            ],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SoftApState {
    pub ssid: String,
    pub password: String,
    pub max_connections: u8,
    pub auth_mode: u8,
    pub channel: u8,
}

struct DeviceState {
    connected: bool,
    notifying: bool,
    writes: usize,
    expected_seq: u8,
    sequence_errors: usize,
    frame_errors: usize,
    raw_writes: Vec<Vec<u8>>,
    received: Vec<CompleteMessage>,
    reassembler: Reassembler,
    encoder: FrameEncoder,
    security: Option<SecurityMode>,
    op_mode: u8,
    sta_ssid: String,
    sta_password: String,
    sta_connected: bool,
    softap: SoftApState,
    negotiation_len: Option<u16>,
}

impl DeviceState {
    fn new() -> Self {
        Self {
            connected: false,
            notifying: false,
            writes: 0,
            expected_seq: 0,
            sequence_errors: 0,
            frame_errors: 0,
            raw_writes: Vec::new(),
            received: Vec::new(),
            reassembler: Reassembler::new(),
            encoder: FrameEncoder::to_phone(false),
            security: None,
            op_mode: OpMode::Null as u8,
            sta_ssid: String::new(),
            sta_password: String::new(),
            sta_connected: false,
            softap: SoftApState::default(),
            negotiation_len: None,
        }
    }

    /// Link-level reset on (re)connect; provisioned settings survive.
    fn reset_link(&mut self) {
        self.notifying = false;
        self.expected_seq = 0;
        self.reassembler.clear();
        self.encoder = FrameEncoder::to_phone(false);
        self.security = None;
        self.negotiation_len = None;
    }
}

pub struct SimulatedDevice {
    options: SimOptions,
    state: RefCell<DeviceState>,
    outbox: Channel<NoopRawMutex, Option<Vec<u8>>, OUTBOX_DEPTH>,
}

impl SimulatedDevice {
    pub fn new(options: SimOptions) -> Self {
        Self {
            options,
            state: RefCell::new(DeviceState::new()),
            outbox: Channel::new(),
        }
    }

    pub fn options(&self) -> &SimOptions {
        &self.options
    }

    pub fn is_connected(&self) -> bool {
        self.state.borrow().connected
    }

    /// Inbound frames whose sequence was not the expected one.
    pub fn sequence_errors(&self) -> usize {
        self.state.borrow().sequence_errors
    }

    /// Inbound frames that failed to decode.
    pub fn frame_errors(&self) -> usize {
        self.state.borrow().frame_errors
    }

    /// Every frame written by the host, in order.
    pub fn raw_writes(&self) -> Vec<Vec<u8>> {
        self.state.borrow().raw_writes.clone()
    }

    /// Kinds of the complete messages received so far.
    pub fn received_kinds(&self) -> Vec<Option<MessageKind>> {
        self.state
            .borrow()
            .received
            .iter()
            .map(CompleteMessage::kind)
            .collect()
    }

    pub fn received(&self) -> Vec<CompleteMessage> {
        self.state.borrow().received.clone()
    }

    pub fn security_mode(&self) -> Option<SecurityMode> {
        self.state.borrow().security
    }

    pub fn op_mode(&self) -> u8 {
        self.state.borrow().op_mode
    }

    /// Provisioned station `(ssid, password)`.
    pub fn station(&self) -> (String, String) {
        let s = self.state.borrow();
        (s.sta_ssid.clone(), s.sta_password.clone())
    }

    pub fn station_connected(&self) -> bool {
        self.state.borrow().sta_connected
    }

    pub fn softap(&self) -> SoftApState {
        self.state.borrow().softap.clone()
    }

    /// Queue raw bytes as if the device had notified them.
    pub fn inject(&self, bytes: Vec<u8>) {
        self.push(Some(bytes));
    }

    /// Send a message from the device, fragmented to its frame size.
    pub fn notify(&self, kind: MessageKind, payload: &[u8]) {
        let frames = {
            let mut s = self.state.borrow_mut();
            s.encoder
                .encode_chunked(kind, payload, self.options.max_frame_bytes)
        };
        match frames {
            Ok(frames) => frames.into_iter().for_each(|f| self.push(Some(f))),
            Err(e) => warn!("SIM: cannot encode {}: {}", kind, e),
        }
    }

    /// Simulate the radio link dropping; ends the notification stream.
    pub fn drop_link(&self) {
        info!("SIM: link dropped");
        self.state.borrow_mut().connected = false;
        self.push(None);
    }

    fn push(&self, item: Option<Vec<u8>>) {
        if self.outbox.try_send(item).is_err() {
            warn!("SIM: outbox full, notification dropped");
        }
    }

    fn check_connected(&self) -> Result<(), TransportError> {
        if self.state.borrow().connected {
            Ok(())
        } else {
            Err(TransportError::NotConnected)
        }
    }

    // ── Device-side protocol ─────────────────────────────────

    fn on_frame(&self, bytes: &[u8]) {
        let complete = {
            let mut s = self.state.borrow_mut();
            s.raw_writes.push(bytes.to_vec());

            let frame = match decode_frame(bytes, None) {
                Ok(f) => f,
                Err(e) => {
                    warn!("SIM: bad frame from host: {}", e);
                    s.frame_errors += 1;
                    return;
                }
            };

            let seq = frame.header.sequence;
            if seq != s.expected_seq {
                warn!("SIM: sequence gap, expected {} got {}", s.expected_seq, seq);
                s.sequence_errors += 1;
            }
            s.expected_seq = seq.wrapping_add(1);

            let wants_ack = frame.header.ctrl.requires_ack();
            let complete = s.reassembler.feed(frame);
            drop(s);

            if wants_ack && self.options.ack_frames {
                self.notify(MessageKind::Control(CtrlSubtype::Ack), &[seq]);
            }
            complete
        };

        if let Some(msg) = complete {
            self.state.borrow_mut().received.push(msg.clone());
            self.on_message(msg);
        }
    }

    fn on_message(&self, msg: CompleteMessage) {
        let Some(kind) = msg.kind() else {
            warn!("SIM: unknown message type={} subtype={}", msg.type_bits, msg.subtype);
            return;
        };
        debug!("SIM: <- {} ({} bytes)", kind, msg.payload.len());
        let payload = msg.payload;
        let text = || String::from_utf8_lossy(&payload).into_owned();
        let first = payload.first().copied().unwrap_or(0);

        match kind {
            MessageKind::Control(CtrlSubtype::SetSecurityMode) => {
                let mode = SecurityMode::from_byte(first);
                let mut s = self.state.borrow_mut();
                s.security = Some(mode);
                s.encoder.set_checksum(mode.data.checksum);
            }
            MessageKind::Control(CtrlSubtype::SetOpMode) => {
                self.state.borrow_mut().op_mode = first;
            }
            MessageKind::Control(CtrlSubtype::ConnectWifi) => {
                let mut s = self.state.borrow_mut();
                s.sta_connected = !s.sta_ssid.is_empty();
                info!("SIM: station join {:?} -> {}", s.sta_ssid, s.sta_connected);
            }
            MessageKind::Control(CtrlSubtype::DisconnectWifi) => {
                self.state.borrow_mut().sta_connected = false;
            }
            MessageKind::Control(CtrlSubtype::GetWifiStatus) if self.options.answer_requests => {
                let reply = {
                    let s = self.state.borrow();
                    let mut reply = vec![s.op_mode, u8::from(!s.sta_connected), 0];
                    if s.sta_connected {
                        reply.extend_from_slice(s.sta_ssid.as_bytes());
                    }
                    reply
                };
                self.notify(
                    MessageKind::Data(DataSubtype::WifiConnectionState),
                    &reply,
                );
            }
            MessageKind::Control(CtrlSubtype::GetWifiList) if self.options.answer_requests => {
                for batch in self.options.networks.chunks(NETWORKS_PER_MESSAGE) {
                    let mut records = Vec::new();
                    for (ssid, rssi) in batch {
                        let Ok(record_len) = u8::try_from(ssid.len() + 1) else {
                            warn!("SIM: SSID of {} bytes does not fit a record", ssid.len());
                            continue;
                        };
                        records.push(record_len);
                        records.push(*rssi as u8);
                        records.extend_from_slice(ssid.as_bytes());
                    }
                    self.notify(MessageKind::Data(DataSubtype::WifiList), &records);
                }
            }
            MessageKind::Control(CtrlSubtype::GetVersion) if self.options.answer_requests => {
                let v = self.options.version;
                self.notify(MessageKind::Data(DataSubtype::Version), &[v.major, v.minor]);
            }
            MessageKind::Control(CtrlSubtype::DisconnectBle) => self.drop_link(),
            MessageKind::Data(DataSubtype::StaSsid) => {
                self.state.borrow_mut().sta_ssid = text();
            }
            MessageKind::Data(DataSubtype::StaPassword) => {
                self.state.borrow_mut().sta_password = text();
            }
            MessageKind::Data(DataSubtype::SoftApSsid) => {
                self.state.borrow_mut().softap.ssid = text();
            }
            MessageKind::Data(DataSubtype::SoftApPassword) => {
                self.state.borrow_mut().softap.password = text();
            }
            MessageKind::Data(DataSubtype::SoftApMaxConnNum) => {
                self.state.borrow_mut().softap.max_connections = first;
            }
            MessageKind::Data(DataSubtype::SoftApAuthMode) => {
                self.state.borrow_mut().softap.auth_mode = first;
            }
            MessageKind::Data(DataSubtype::SoftApChannel) => {
                self.state.borrow_mut().softap.channel = first;
            }
            MessageKind::Data(DataSubtype::CustomData) => {
                self.notify(MessageKind::Data(DataSubtype::CustomData), &payload);
            }
            MessageKind::Data(DataSubtype::Negotiation) => self.on_negotiation(&payload),
            other => debug!("SIM: ignoring {}", other),
        }
    }

    fn on_negotiation(&self, payload: &[u8]) {
        match payload.split_first() {
            Some((&0x00, &[hi, lo])) => {
                self.state.borrow_mut().negotiation_len = Some(u16::from_be_bytes([hi, lo]));
            }
            Some((&0x01, params)) => {
                let announced = self.state.borrow_mut().negotiation_len.take();
                if announced.is_none() || announced != u16::try_from(params.len()).ok() {
                    warn!(
                        "SIM: negotiation length mismatch: announced {:?}, got {}",
                        announced,
                        params.len()
                    );
                    self.notify(MessageKind::Data(DataSubtype::Error), &[0x08]);
                    return;
                }
                let key: Vec<u8> = params.iter().rev().map(|b| b ^ 0x5A).collect();
                self.notify(MessageKind::Data(DataSubtype::Negotiation), &key);
            }
            _ => warn!("SIM: malformed negotiation packet"),
        }
    }
}

// ── Port implementations ─────────────────────────────────────

impl GattTransport for SimulatedDevice {
    async fn connect(&self, device_id: &str) -> Result<(), TransportError> {
        if self.options.fail_connect {
            return Err(TransportError::ConnectFailed);
        }
        let mut s = self.state.borrow_mut();
        s.reset_link();
        s.connected = true;
        info!("SIM: {} connected", device_id);
        Ok(())
    }

    async fn services(&self) -> Result<Vec<u128>, TransportError> {
        self.check_connected()?;
        let mut services = vec![GAP_SERVICE_UUID];
        if self.options.advertise_service {
            services.push(BLUFI_SERVICE_UUID);
        }
        Ok(services)
    }

    async fn characteristics(&self, service: u128) -> Result<Vec<u128>, TransportError> {
        self.check_connected()?;
        if service != BLUFI_SERVICE_UUID || !self.options.advertise_service {
            return Ok(Vec::new());
        }
        let mut chars = Vec::new();
        if self.options.advertise_write_char {
            chars.push(BLUFI_WRITE_CHAR_UUID);
        }
        if self.options.advertise_notify_char {
            chars.push(BLUFI_NOTIFY_CHAR_UUID);
        }
        Ok(chars)
    }

    async fn enable_notifications(
        &self,
        service: u128,
        characteristic: u128,
    ) -> Result<(), TransportError> {
        self.check_connected()?;
        if service != BLUFI_SERVICE_UUID || characteristic != BLUFI_NOTIFY_CHAR_UUID {
            return Err(TransportError::NotifyFailed);
        }
        self.state.borrow_mut().notifying = true;
        Ok(())
    }

    async fn write(
        &self,
        service: u128,
        characteristic: u128,
        data: &[u8],
    ) -> Result<(), TransportError> {
        self.check_connected()?;
        if service != BLUFI_SERVICE_UUID || characteristic != BLUFI_WRITE_CHAR_UUID {
            return Err(TransportError::WriteFailed);
        }
        {
            let mut s = self.state.borrow_mut();
            if self.options.fail_write_after.is_some_and(|n| s.writes >= n) {
                return Err(TransportError::WriteFailed);
            }
            s.writes += 1;
        }
        self.on_frame(data);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let mut s = self.state.borrow_mut();
        s.connected = false;
        s.notifying = false;
        info!("SIM: host disconnected");
        Ok(())
    }
}

impl NotificationSource for SimulatedDevice {
    async fn next_notification(&self) -> Option<Vec<u8>> {
        loop {
            let item = self.outbox.receive().await?;
            if self.state.borrow().notifying {
                return Some(item);
            }
            debug!("SIM: notification discarded, notifications disabled");
        }
    }
}

// ── Tests ────────────────────────────────────────────────────
