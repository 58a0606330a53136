//! Lifecycle tests: connect, discovery failures, security mode, link loss.

use blufi::adapters::sim::SimOptions;
use blufi::app::events::SessionEvent;
use blufi::protocol::frame::{CtrlSubtype, MessageKind};
use blufi::protocol::payloads::WifiCredentials;
use blufi::protocol::security::SecurityMode;
use blufi::session::BLUFI_NOTIFY_CHAR_UUID;
use blufi::session::pending::ResponseKind;
use blufi::{Error, LinkState, SessionConfig, TransportError};
use futures_lite::future;
use std::cell::RefCell;
use std::rc::Rc;

use crate::support::{self, connect, record_events, run, session, session_with, test_config};

#[test]
fn connect_walks_every_state_and_sends_security_mode() {
    let s = session();
    let events = record_events(&s);

    run(&s, connect(&s));

    let states: Vec<LinkState> = events
        .borrow()
        .iter()
        .filter_map(|e| match e {
            SessionEvent::StateChanged { to, .. } => Some(*to),
            _ => None,
        })
        .collect();
    assert_eq!(
        states,
        [
            LinkState::Connecting,
            LinkState::Discovering,
            LinkState::Ready,
            LinkState::SecuringSession,
            LinkState::Active,
        ]
    );

    let writes = s.transport().raw_writes();
    assert_eq!(writes, [vec![0x04, 0x00, 0x00, 0x01, 0x00]]);
    assert_eq!(
        s.transport().security_mode(),
        Some(SecurityMode::checksum_only(false))
    );
}

#[test]
fn checksum_session_sends_exact_security_frame() {
    let s = session_with(
        SimOptions::default(),
        SessionConfig {
            checksum_enabled: true,
            ..test_config()
        },
    );
    run(&s, connect(&s));
    assert_eq!(
        s.transport().raw_writes(),
        [vec![0x04, 0x02, 0x00, 0x01, 0x11, 0x42, 0x02]]
    );
    assert_eq!(s.transport().frame_errors(), 0);
}

#[test]
fn connect_failure_returns_to_disconnected() {
    let s = session_with(
        SimOptions {
            fail_connect: true,
            ..SimOptions::default()
        },
        test_config(),
    );
    let err = run(&s, s.connect("dev")).unwrap_err();
    assert_eq!(err, Error::Transport(TransportError::ConnectFailed));
    assert_eq!(s.link_state(), LinkState::Disconnected);
}

#[test]
fn missing_service_aborts_and_disconnects() {
    let s = session_with(
        SimOptions {
            advertise_service: false,
            ..SimOptions::default()
        },
        test_config(),
    );
    let err = run(&s, s.connect("dev")).unwrap_err();
    assert_eq!(err, Error::ServiceNotFound);
    assert_eq!(s.link_state(), LinkState::Disconnected);
    assert!(!s.transport().is_connected());
}

#[test]
fn missing_notify_characteristic_aborts() {
    let s = session_with(
        SimOptions {
            advertise_notify_char: false,
            ..SimOptions::default()
        },
        test_config(),
    );
    let err = run(&s, s.connect("dev")).unwrap_err();
    assert_eq!(err, Error::CharacteristicNotFound(BLUFI_NOTIFY_CHAR_UUID));
    assert_eq!(s.link_state(), LinkState::Disconnected);
}

#[test]
fn connect_twice_is_rejected() {
    let s = session();
    run(&s, async {
        connect(&s).await;
        assert_eq!(
            s.connect("dev").await,
            Err(Error::InvalidState(LinkState::Active))
        );
    });
}

#[test]
fn operations_require_a_connection() {
    let s = session();
    let creds = WifiCredentials::new("HomeNet", "password1").unwrap();
    run(&s, async {
        assert_eq!(s.request_wifi_status(None).await, Err(Error::NotConnected));
        assert_eq!(s.configure_station(&creds).await, Err(Error::NotConnected));
        assert_eq!(s.send_custom_data(b"x").await, Err(Error::NotConnected));
    });
    assert!(s.transport().raw_writes().is_empty());
}

#[test]
fn awaited_security_ack_completes_connect() {
    let s = session_with(
        SimOptions::default(),
        SessionConfig {
            await_security_ack: true,
            ..test_config()
        },
    );
    let events = record_events(&s);
    run(&s, connect(&s));

    let writes = s.transport().raw_writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0][1] & 0x08, 0x08, "RequireAck set on SetSecurityMode");
    assert!(
        events
            .borrow()
            .contains(&SessionEvent::Ack { acked_sequence: Some(0) })
    );
}

#[test]
fn missing_security_ack_times_out() {
    let s = session_with(
        SimOptions {
            ack_frames: false,
            ..SimOptions::default()
        },
        SessionConfig {
            await_security_ack: true,
            ..test_config()
        },
    );
    let err = run(&s, s.connect("dev")).unwrap_err();
    assert_eq!(err, Error::Timeout(ResponseKind::Ack));
    assert_eq!(s.link_state(), LinkState::Disconnected);
    assert!(!s.transport().is_connected());
}

#[test]
fn disconnect_resets_state_and_allows_reconnect() {
    let s = session();
    run(&s, async {
        connect(&s).await;
        s.send_custom_data(b"one").await.unwrap();
        s.disconnect().await.unwrap();
        assert_eq!(s.link_state(), LinkState::Disconnected);
        assert!(!s.transport().is_connected());

        connect(&s).await;
    });

    // Sequence numbers restart from zero on the new link.
    let writes = s.transport().raw_writes();
    assert_eq!(writes.len(), 3);
    assert_eq!(writes[2][0], 0x04);
    assert_eq!(writes[2][2], 0);
    assert_eq!(s.transport().sequence_errors(), 0);
}

#[test]
fn link_loss_fails_pending_request() {
    let s = session_with(
        SimOptions {
            answer_requests: false,
            ..SimOptions::default()
        },
        SessionConfig {
            status_timeout_ms: 10_000,
            ..test_config()
        },
    );
    run(&s, async {
        connect(&s).await;
        let (result, ()) = future::zip(s.request_wifi_status(None), async {
            for _ in 0..3 {
                future::yield_now().await;
            }
            assert!(s.is_pending(ResponseKind::WifiStatus));
            s.transport().drop_link();
        })
        .await;
        assert_eq!(result, Err(Error::NotConnected));
    });
    assert_eq!(s.link_state(), LinkState::Disconnected);
    assert!(!s.is_pending(ResponseKind::WifiStatus));
}

#[test]
fn link_loss_cancels_scan() {
    let s = session_with(
        SimOptions {
            answer_requests: false,
            ..SimOptions::default()
        },
        SessionConfig {
            scan_timeout_ms: 10_000,
            ..test_config()
        },
    );
    run(&s, async {
        connect(&s).await;
        let (result, ()) = future::zip(s.scan_wifi_networks(None), async {
            future::yield_now().await;
            s.transport().drop_link();
        })
        .await;
        assert_eq!(result, Err(Error::NotConnected));
    });
}

#[test]
fn disconnect_ble_request_drops_link() {
    let s = session();
    run(&s, async {
        connect(&s).await;
        s.send_control(CtrlSubtype::DisconnectBle, &[]).await.unwrap();
        for _ in 0..3 {
            future::yield_now().await;
        }
    });
    assert_eq!(s.link_state(), LinkState::Disconnected);
    assert_eq!(
        s.transport().received_kinds().last().copied().flatten(),
        Some(MessageKind::Control(CtrlSubtype::DisconnectBle))
    );
}

#[test]
fn config_rejects_tiny_frames() {
    let config = SessionConfig {
        max_frame_bytes: 8,
        ..SessionConfig::default()
    };
    assert!(matches!(
        blufi::Session::new(
            blufi::adapters::sim::SimulatedDevice::new(SimOptions::default()),
            support::VirtualDelay,
            config
        ),
        Err(Error::Config(_))
    ));
}

#[test]
fn sink_may_feed_notifications_back_into_session() {
    let s = Rc::new(session());
    run(&s, connect(&s));

    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = seen.clone();
    let weak = Rc::downgrade(&s);
    s.set_event_sink(move |e: &SessionEvent| {
        log.borrow_mut().push(e.clone());
        if *e == SessionEvent::CustomData(b"ping".to_vec()) {
            if let Some(s) = weak.upgrade() {
                s.handle_notification(&[0x4D, 0x04, 0x01, 0x04, b'p', b'o', b'n', b'g']);
            }
        }
    });

    s.handle_notification(&[0x4D, 0x04, 0x00, 0x04, b'p', b'i', b'n', b'g']);
    assert_eq!(
        *seen.borrow(),
        [
            SessionEvent::CustomData(b"ping".to_vec()),
            SessionEvent::CustomData(b"pong".to_vec()),
        ]
    );
}

#[test]
fn sink_may_replace_itself() {
    let s = Rc::new(session());
    run(&s, connect(&s));

    let later = Rc::new(RefCell::new(Vec::new()));
    let log = later.clone();
    let weak = Rc::downgrade(&s);
    s.set_event_sink(move |_: &SessionEvent| {
        let log = log.clone();
        if let Some(s) = weak.upgrade() {
            s.set_event_sink(move |e: &SessionEvent| log.borrow_mut().push(e.clone()));
        }
    });

    s.handle_notification(&[0x4D, 0x04, 0x00, 0x01, b'a']);
    s.handle_notification(&[0x4D, 0x04, 0x01, 0x01, b'b']);
    assert_eq!(*later.borrow(), [SessionEvent::CustomData(b"b".to_vec())]);
}
