//! BluFi provisioning session.
//!
//! ```text
//!  ┌──────────────────────────────────────────────────────────────┐
//!  │ Session<T: GattTransport, D: Delay>                          │
//!  │                                                              │
//!  │  send path  ── Mutex<FrameEncoder> ──▶ split ▶ encode ▶ write│
//!  │                  (holds the sequence counter; one message's  │
//!  │                   fragments stay contiguous across awaits)   │
//!  │                                                              │
//!  │  recv path  ── handle_notification ▶ decode ▶ Reassembler    │
//!  │                  ▶ route ▶ PendingRequests / EventSink       │
//!  │                  (synchronous, never waits on the send path) │
//!  └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The session is single-threaded and shared by reference between the
//! caller's futures and the inbound pump ([`Session::run_inbound`] or a
//! platform callback calling [`Session::handle_notification`]).

pub mod pending;
pub mod state;

use core::cell::{Cell, RefCell};
use std::collections::VecDeque;
use core::future::Future;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::mutex::Mutex;
use futures_lite::future;
use log::{debug, info, warn};

use crate::adapters::log_sink::LogEventSink;
use crate::app::events::SessionEvent;
use crate::app::ports::{Delay, EventSink, GattTransport, NotificationSource};
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::protocol::chunked::{self, Reassembler};
use crate::protocol::codec::{FrameEncoder, decode_frame};
use crate::protocol::dispatch::{Message, route};
use crate::protocol::frame::{CtrlSubtype, DataSubtype, MessageKind};
use crate::protocol::payloads::{
    FirmwareVersion, OpMode, SoftApConfig, WifiCredentials, WifiNetwork, WifiStatus,
};
use crate::protocol::security::{
    FrameCipher, MAX_NEGOTIATION_PARAMS, NegotiationState, SecurityMode, SecurityNegotiator,
};

use pending::{PendingRequests, ResponseKind};
pub use state::LinkState;

// ── GATT identifiers ─────────────────────────────────────────

pub const BLUFI_SERVICE_UUID: u128 = 0x0000ffff_0000_1000_8000_00805f9b34fb;
/// Phone → device frames.
pub const BLUFI_WRITE_CHAR_UUID: u128 = 0x0000ff01_0000_1000_8000_00805f9b34fb;
/// Device → phone frames.
pub const BLUFI_NOTIFY_CHAR_UUID: u128 = 0x0000ff02_0000_1000_8000_00805f9b34fb;

// ── Session ──────────────────────────────────────────────────

pub struct Session<T, D> {
    transport: T,
    delay: D,
    config: SessionConfig,
    link: Cell<LinkState>,
    encoder: Mutex<NoopRawMutex, FrameEncoder>,
    receiver: RefCell<Reassembler>,
    negotiator: RefCell<SecurityNegotiator>,
    pending: PendingRequests,
    sink: RefCell<Box<dyn EventSink>>,
    /// Set while the sink runs; events raised meanwhile wait in `deferred`.
    emitting: Cell<bool>,
    sink_replaced: Cell<bool>,
    deferred: RefCell<VecDeque<SessionEvent>>,
}

impl<T: GattTransport, D: Delay> Session<T, D> {
    pub fn new(transport: T, delay: D, config: SessionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            transport,
            delay,
            encoder: Mutex::new(FrameEncoder::new(config.checksum_enabled)),
            config,
            link: Cell::new(LinkState::Disconnected),
            receiver: RefCell::new(Reassembler::new()),
            negotiator: RefCell::new(SecurityNegotiator::new()),
            pending: PendingRequests::new(),
            sink: RefCell::new(Box::new(LogEventSink::new())),
            emitting: Cell::new(false),
            sink_replaced: Cell::new(false),
            deferred: RefCell::new(VecDeque::new()),
        })
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn link_state(&self) -> LinkState {
        self.link.get()
    }

    /// Replace the event sink (defaults to [`LogEventSink`]).
    ///
    /// May be called from inside the sink; the new sink receives every
    /// event raised after the call.
    pub fn set_event_sink(&self, sink: impl EventSink + 'static) {
        *self.sink.borrow_mut() = Box::new(sink);
        self.sink_replaced.set(self.emitting.get());
    }

    pub fn is_pending(&self, kind: ResponseKind) -> bool {
        self.pending.is_pending(kind)
    }

    /// Number of partially received messages.
    pub fn open_chains(&self) -> usize {
        self.receiver.borrow().open_chains()
    }

    pub fn negotiation_state(&self) -> NegotiationState {
        self.negotiator.borrow().state().clone()
    }

    /// Key material the device sent during negotiation.
    pub fn peer_key(&self) -> Vec<u8> {
        self.negotiator.borrow().peer_key().to_vec()
    }

    // ── Lifecycle ────────────────────────────────────────────

    /// Connect, discover the BluFi service, enable notifications and send
    /// the security mode. On success the session is `Active`.
    pub async fn connect(&self, device_id: &str) -> Result<()> {
        let state = self.link.get();
        if state != LinkState::Disconnected {
            return Err(Error::InvalidState(state));
        }

        self.encoder.lock().await.reset();
        self.receiver.borrow_mut().clear();

        self.set_state(LinkState::Connecting);
        if let Err(e) = self.transport.connect(device_id).await {
            warn!("session: connect to {} failed: {}", device_id, e);
            self.set_state(LinkState::Disconnected);
            return Err(e.into());
        }

        self.set_state(LinkState::Discovering);
        if let Err(e) = self.discover().await {
            self.abort_connect(e).await;
            return Err(e);
        }

        self.set_state(LinkState::Ready);
        if let Err(e) = self
            .transport
            .enable_notifications(BLUFI_SERVICE_UUID, BLUFI_NOTIFY_CHAR_UUID)
            .await
        {
            self.abort_connect(e.into()).await;
            return Err(e.into());
        }

        self.set_state(LinkState::SecuringSession);
        if let Err(e) = self.secure_session().await {
            self.abort_connect(e).await;
            return Err(e);
        }

        self.set_state(LinkState::Active);
        info!("session: {} active", device_id);
        Ok(())
    }

    /// Close the link and drop all per-session state.
    pub async fn disconnect(&self) -> Result<()> {
        if self.link.get() == LinkState::Disconnected {
            return Ok(());
        }
        let result = self.transport.disconnect().await;
        self.teardown();
        result.map_err(Error::from)
    }

    /// The platform reported the link gone; tear down without touching
    /// the transport.
    pub fn handle_link_lost(&self) {
        if self.link.get() == LinkState::Disconnected {
            return;
        }
        warn!("session: link lost in {:?}", self.link.get());
        self.teardown();
    }

    async fn discover(&self) -> Result<()> {
        let services = self.transport.services().await?;
        if !services.contains(&BLUFI_SERVICE_UUID) {
            return Err(Error::ServiceNotFound);
        }
        let chars = self.transport.characteristics(BLUFI_SERVICE_UUID).await?;
        for uuid in [BLUFI_WRITE_CHAR_UUID, BLUFI_NOTIFY_CHAR_UUID] {
            if !chars.contains(&uuid) {
                return Err(Error::CharacteristicNotFound(uuid));
            }
        }
        Ok(())
    }

    async fn secure_session(&self) -> Result<()> {
        let mode = SecurityMode::checksum_only(self.config.checksum_enabled);
        let kind = MessageKind::Control(CtrlSubtype::SetSecurityMode);
        info!("session: security mode {:#04x}", mode.to_byte());

        if !self.config.await_security_ack {
            self.write_message(kind, &[mode.to_byte()], false).await?;
            return Ok(());
        }

        let guard = self.pending.ack.arm()?;
        let seq = self.write_message(kind, &[mode.to_byte()], true).await?;
        self.with_timeout(ResponseKind::Ack, self.config.security_ack_timeout_ms, async {
            loop {
                if guard.wait().await? == Some(seq) {
                    return Ok::<(), Error>(());
                }
            }
        })
        .await
    }

    async fn abort_connect(&self, cause: Error) {
        warn!("session: connect aborted: {}", cause);
        if let Err(e) = self.transport.disconnect().await {
            debug!("session: disconnect after abort failed: {}", e);
        }
        self.teardown();
    }

    fn teardown(&self) {
        self.receiver.borrow_mut().clear();
        self.pending.cancel_all();
        self.negotiator.borrow_mut().reset();
        self.set_state(LinkState::Disconnected);
    }

    fn set_state(&self, to: LinkState) {
        let from = self.link.replace(to);
        if from == to {
            return;
        }
        if !from.can_transition_to(to) {
            warn!("session: unexpected transition {:?} -> {:?}", from, to);
        }
        debug!("session: {:?} -> {:?}", from, to);
        self.emit(&SessionEvent::StateChanged { from, to });
    }

    fn ensure_active(&self) -> Result<()> {
        match self.link.get() {
            LinkState::Active => Ok(()),
            LinkState::Disconnected => Err(Error::NotConnected),
            other => Err(Error::InvalidState(other)),
        }
    }

    // ── Outbound ─────────────────────────────────────────────

    pub async fn send_control(&self, subtype: CtrlSubtype, payload: &[u8]) -> Result<()> {
        self.ensure_active()?;
        self.write_message(MessageKind::Control(subtype), payload, false)
            .await
            .map(drop)
    }

    pub async fn send_data(&self, subtype: DataSubtype, payload: &[u8]) -> Result<()> {
        self.ensure_active()?;
        self.write_message(MessageKind::Data(subtype), payload, false)
            .await
            .map(drop)
    }

    pub async fn send_custom_data(&self, data: &[u8]) -> Result<()> {
        self.send_data(DataSubtype::CustomData, data).await
    }

    /// Push station credentials and ask the device to join.
    pub async fn configure_station(&self, credentials: &WifiCredentials) -> Result<()> {
        self.ensure_active()?;
        info!("session: configuring station for {:?}", credentials.ssid());
        self.send_control(CtrlSubtype::SetOpMode, &[OpMode::Station as u8])
            .await?;
        self.send_data(DataSubtype::StaSsid, credentials.ssid().as_bytes())
            .await?;
        if !credentials.is_open() {
            self.send_data(DataSubtype::StaPassword, credentials.password().as_bytes())
                .await?;
        }
        self.connect_wifi().await
    }

    /// Configure the device's own access point.
    pub async fn configure_softap(&self, ap: &SoftApConfig) -> Result<()> {
        ap.validate()?;
        self.ensure_active()?;
        info!("session: configuring SoftAP {:?}", ap.credentials.ssid());
        self.send_control(CtrlSubtype::SetOpMode, &[OpMode::SoftAp as u8])
            .await?;
        self.send_data(DataSubtype::SoftApSsid, ap.credentials.ssid().as_bytes())
            .await?;
        if !ap.credentials.is_open() {
            self.send_data(
                DataSubtype::SoftApPassword,
                ap.credentials.password().as_bytes(),
            )
            .await?;
        }
        self.send_data(DataSubtype::SoftApMaxConnNum, &[ap.max_connections])
            .await?;
        self.send_data(DataSubtype::SoftApAuthMode, &[ap.auth_mode as u8])
            .await?;
        self.send_data(DataSubtype::SoftApChannel, &[ap.channel]).await
    }

    pub async fn connect_wifi(&self) -> Result<()> {
        self.send_control(CtrlSubtype::ConnectWifi, &[]).await
    }

    pub async fn disconnect_wifi(&self) -> Result<()> {
        self.send_control(CtrlSubtype::DisconnectWifi, &[]).await
    }

    /// Open the negotiation handshake with `params` (the host's public
    /// parameters). The device's reply is kept as [`Session::peer_key`].
    ///
    /// Oversized parameters are refused before anything is written. If a
    /// write fails the negotiator returns to [`NegotiationState::Plain`].
    pub async fn begin_negotiation(&self, params: &[u8]) -> Result<()> {
        self.ensure_active()?;
        let packets = self
            .negotiator
            .borrow_mut()
            .begin(params)
            .ok_or(Error::PayloadTooLarge {
                len: params.len(),
                max: MAX_NEGOTIATION_PARAMS,
            })?;
        for packet in packets {
            let sent = self
                .write_message(
                    MessageKind::Data(DataSubtype::Negotiation),
                    &packet.to_bytes(),
                    false,
                )
                .await;
            if let Err(e) = sent {
                warn!("session: negotiation aborted: {}", e);
                self.negotiator.borrow_mut().reset();
                return Err(e);
            }
        }
        Ok(())
    }

    /// Install the cipher used to decrypt inbound frames carrying the
    /// Encrypted bit. Outbound frames are never encrypted.
    pub fn install_cipher(&self, cipher: Box<dyn FrameCipher>) {
        self.negotiator.borrow_mut().install_cipher(cipher);
    }

    // ── Requests ─────────────────────────────────────────────

    /// `timeout_ms = None` uses `status_timeout_ms`.
    pub async fn request_wifi_status(&self, timeout_ms: Option<u32>) -> Result<WifiStatus> {
        self.ensure_active()?;
        let guard = self.pending.status.arm()?;
        self.write_message(MessageKind::Control(CtrlSubtype::GetWifiStatus), &[], false)
            .await?;
        let ms = timeout_ms.unwrap_or(self.config.status_timeout_ms);
        self.with_timeout(ResponseKind::WifiStatus, ms, guard.wait())
            .await
    }

    /// `timeout_ms = None` uses `version_timeout_ms`.
    pub async fn request_version(&self, timeout_ms: Option<u32>) -> Result<FirmwareVersion> {
        self.ensure_active()?;
        let guard = self.pending.version.arm()?;
        self.write_message(MessageKind::Control(CtrlSubtype::GetVersion), &[], false)
            .await?;
        let ms = timeout_ms.unwrap_or(self.config.version_timeout_ms);
        self.with_timeout(ResponseKind::Version, ms, guard.wait())
            .await
    }

    /// Ask the device to scan and collect every network reported within
    /// the window (`None` uses `scan_timeout_ms`). An empty list is a
    /// valid result.
    pub async fn scan_wifi_networks(&self, timeout_ms: Option<u32>) -> Result<Vec<WifiNetwork>> {
        self.ensure_active()?;
        let guard = self.pending.scan.arm()?;
        self.write_message(MessageKind::Control(CtrlSubtype::GetWifiList), &[], false)
            .await?;

        let ms = timeout_ms.unwrap_or(self.config.scan_timeout_ms);
        future::or(async { Err(guard.cancelled().await) }, async {
            self.delay.delay_ms(ms).await;
            Ok::<(), Error>(())
        })
        .await?;

        let networks = guard.take();
        info!("session: scan found {} networks", networks.len());
        Ok(networks)
    }

    async fn with_timeout<R>(
        &self,
        kind: ResponseKind,
        ms: u32,
        response: impl Future<Output = Result<R>>,
    ) -> Result<R> {
        let result = future::or(response, async {
            self.delay.delay_ms(ms).await;
            Err(Error::Timeout(kind))
        })
        .await;
        if let Err(Error::Timeout(kind)) = result {
            warn!("session: no {} response within {} ms", kind, ms);
            self.emit(&SessionEvent::RequestTimedOut(kind));
        }
        result
    }

    /// Fragment, encode and write one logical message. Returns the
    /// sequence of the first frame.
    ///
    /// A write failure aborts the remaining fragments.
    async fn write_message(&self, kind: MessageKind, payload: &[u8], want_ack: bool) -> Result<u8> {
        let mut encoder = self.encoder.lock().await;
        let max = chunked::max_payload(self.config.max_frame_bytes, encoder.checksum_enabled());
        let fragments = chunked::split(payload, max)?;
        let first_seq = encoder.next_sequence();
        let single = fragments.len() == 1;

        for (i, fragment) in fragments.iter().enumerate() {
            if i > 0 {
                self.delay.delay_ms(self.config.inter_frame_delay_ms).await;
            }
            if !self.link.get().has_channel() {
                return Err(Error::NotConnected);
            }
            let frame = encoder.encode_fragment(kind, fragment, want_ack && single)?;
            self.transport
                .write(BLUFI_SERVICE_UUID, BLUFI_WRITE_CHAR_UUID, &frame)
                .await?;
        }

        debug!(
            "session: sent {} ({} bytes, {} frame(s), seq {})",
            kind,
            payload.len(),
            fragments.len(),
            first_seq
        );
        Ok(first_seq)
    }

    // ── Inbound ──────────────────────────────────────────────

    /// Process one notification from the notify characteristic.
    pub fn handle_notification(&self, bytes: &[u8]) {
        if !self.link.get().has_channel() {
            debug!(
                "session: notification ignored in {:?} ({} bytes)",
                self.link.get(),
                bytes.len()
            );
            return;
        }

        let decoded = decode_frame(bytes, self.negotiator.borrow().cipher());
        let frame = match decoded {
            Ok(frame) => frame,
            Err(e) => {
                warn!("session: dropped inbound frame: {}", e);
                self.emit(&SessionEvent::FrameDropped(e));
                return;
            }
        };

        let complete = self.receiver.borrow_mut().feed(frame);
        if let Some(msg) = complete {
            self.dispatch(route(msg));
        }
    }

    fn dispatch(&self, message: Message) {
        match message {
            Message::Ack { acked_sequence } => {
                info!("session: ack for seq {:?}", acked_sequence);
                self.pending.ack.resolve(acked_sequence);
                self.emit(&SessionEvent::Ack { acked_sequence });
            }
            Message::WifiStatus(status) => {
                info!("session: wifi status {}", status);
                self.emit(&SessionEvent::WifiStatus(status.clone()));
                if !self.pending.status.resolve(status) {
                    debug!("session: unsolicited wifi status");
                }
            }
            Message::WifiList(networks) => {
                debug!("session: {} networks in list message", networks.len());
                self.emit(&SessionEvent::WifiNetworks(networks.clone()));
                if !self.pending.scan.offer(networks) {
                    debug!("session: wifi list outside a scan");
                }
            }
            Message::Version(version) => {
                info!("session: firmware version {}", version);
                self.emit(&SessionEvent::Version(version));
                self.pending.version.resolve(version);
            }
            Message::CustomData(data) => {
                self.emit(&SessionEvent::CustomData(data));
            }
            Message::Negotiation(data) => {
                self.negotiator.borrow_mut().on_peer_data(&data);
                self.emit(&SessionEvent::Negotiation { len: data.len() });
            }
            Message::DeviceError(code) => {
                warn!("session: device reported error {}", code);
                self.emit(&SessionEvent::DeviceError(code));
            }
            Message::Other { kind, payload } => {
                info!("session: no handler for {} ({} bytes)", kind, payload.len());
                self.emit(&SessionEvent::Unhandled {
                    kind,
                    len: payload.len(),
                });
            }
            Message::Unrecognized {
                type_bits,
                subtype,
                payload_len,
            } => {
                warn!(
                    "session: unrecognized frame type={} subtype={:#04x} ({} bytes)",
                    type_bits, subtype, payload_len
                );
                self.emit(&SessionEvent::Unrecognized { type_bits, subtype });
            }
        }
    }

    /// Deliver `event` with the sink moved out of its cell, so the sink
    /// may call back into the session. Nested events are queued and
    /// delivered in order before this returns.
    fn emit(&self, event: &SessionEvent) {
        if self.emitting.replace(true) {
            self.deferred.borrow_mut().push_back(event.clone());
            return;
        }

        let mut sink = self.sink.replace(idle_sink());
        sink.emit(event);
        loop {
            if self.sink_replaced.take() {
                sink = self.sink.replace(idle_sink());
            }
            let Some(next) = self.deferred.borrow_mut().pop_front() else {
                break;
            };
            sink.emit(&next);
        }
        *self.sink.borrow_mut() = sink;
        self.emitting.set(false);
    }
}

fn idle_sink() -> Box<dyn EventSink> {
    Box::new(|_: &SessionEvent| {})
}

impl<T: GattTransport + NotificationSource, D: Delay> Session<T, D> {
    /// Pump notifications from the transport until its stream ends, then
    /// treat the link as lost.
    pub async fn run_inbound(&self) {
        while let Some(bytes) = self.transport.next_notification().await {
            self.handle_notification(&bytes);
        }
        info!("session: notification stream ended");
        self.handle_link_lost();
    }
}
