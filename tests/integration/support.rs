//! Shared fixtures: virtual delay, event recorder, session runner.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use blufi::adapters::sim::{SimOptions, SimulatedDevice};
use blufi::app::events::SessionEvent;
use blufi::app::ports::Delay;
use blufi::{Session, SessionConfig};
use futures_lite::future;

/// Delay that advances only when the executor polls: one yield per ms.
#[derive(Debug, Clone, Copy, Default)]
pub struct VirtualDelay;

impl Delay for VirtualDelay {
    async fn delay_ms(&self, ms: u32) {
        for _ in 0..ms {
            future::yield_now().await;
        }
    }
}

pub type SimSession = Session<SimulatedDevice, VirtualDelay>;

/// Short timeouts so failing paths finish quickly under virtual time.
pub fn test_config() -> SessionConfig {
    SessionConfig {
        inter_frame_delay_ms: 1,
        status_timeout_ms: 50,
        scan_timeout_ms: 30,
        version_timeout_ms: 50,
        security_ack_timeout_ms: 50,
        ..SessionConfig::default()
    }
}

pub fn session_with(options: SimOptions, config: SessionConfig) -> SimSession {
    Session::new(SimulatedDevice::new(options), VirtualDelay, config).unwrap()
}

pub fn session() -> SimSession {
    session_with(SimOptions::default(), test_config())
}

/// Install a sink that records every event.
pub fn record_events(session: &SimSession) -> Rc<RefCell<Vec<SessionEvent>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    session.set_event_sink(move |e: &SessionEvent| sink.borrow_mut().push(e.clone()));
    events
}

/// Run `flow` to completion while pumping the device's notifications
/// into the session.
pub fn run<F: Future>(session: &SimSession, flow: F) -> F::Output {
    future::block_on(future::or(flow, async {
        session.run_inbound().await;
        future::pending::<F::Output>().await
    }))
}

/// Connect and assert the session came up.
pub async fn connect(session: &SimSession) {
    session.connect("24:0A:C4:00:00:01").await.unwrap();
    assert!(session.link_state().is_active());
}
