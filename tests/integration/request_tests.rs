//! Request/response correlation: status, version, scan, timeouts.

use blufi::adapters::sim::SimOptions;
use blufi::app::events::SessionEvent;
use blufi::protocol::frame::{CtrlSubtype, DataSubtype, MessageKind};
use blufi::protocol::payloads::{
    FirmwareVersion, OpMode, SoftApAuthMode, SoftApConfig, WifiCredentials,
};
use blufi::protocol::security::NegotiationState;
use blufi::session::pending::ResponseKind;
use blufi::{Error, FrameError, SessionConfig, TransportError};
use futures_lite::future;

use crate::support::{connect, record_events, run, session, session_with, test_config};

fn silent_device() -> SimOptions {
    SimOptions {
        answer_requests: false,
        ..SimOptions::default()
    }
}

#[test]
fn provisioning_flow_end_to_end() {
    let s = session();
    let creds = WifiCredentials::new("HomeNet", "correct-horse-battery").unwrap();

    let (before, after) = run(&s, async {
        connect(&s).await;
        let before = s.request_wifi_status(None).await.unwrap();
        s.configure_station(&creds).await.unwrap();
        let after = s.request_wifi_status(None).await.unwrap();
        (before, after)
    });

    assert!(!before.is_station_connected());
    assert!(after.is_station_connected());
    assert_eq!(after.mode(), Some(OpMode::Station));
    assert_eq!(after.ssid, "HomeNet");
    assert_eq!(
        s.transport().station(),
        ("HomeNet".to_string(), "correct-horse-battery".to_string())
    );
    assert_eq!(s.transport().sequence_errors(), 0);
    assert_eq!(s.transport().frame_errors(), 0);
}

#[test]
fn open_network_skips_password() {
    let s = session();
    let creds = WifiCredentials::new("Cafe", "").unwrap();
    run(&s, async {
        connect(&s).await;
        s.configure_station(&creds).await.unwrap();
    });
    let kinds: Vec<_> = s.transport().received_kinds().into_iter().flatten().collect();
    assert!(!kinds.contains(&MessageKind::Data(DataSubtype::StaPassword)));
    assert_eq!(
        kinds.last(),
        Some(&MessageKind::Control(CtrlSubtype::ConnectWifi))
    );
}

#[test]
fn version_is_reported() {
    let s = session();
    let version = run(&s, async {
        connect(&s).await;
        s.request_version(None).await
    });
    assert_eq!(version, Ok(FirmwareVersion { major: 1, minor: 3 }));
}

#[test]
fn status_times_out_and_clears_pending() {
    let s = session_with(silent_device(), test_config());
    let events = record_events(&s);

    let result = run(&s, async {
        connect(&s).await;
        s.request_wifi_status(Some(10)).await
    });

    assert_eq!(result, Err(Error::Timeout(ResponseKind::WifiStatus)));
    assert!(!s.is_pending(ResponseKind::WifiStatus));
    assert!(
        events
            .borrow()
            .contains(&SessionEvent::RequestTimedOut(ResponseKind::WifiStatus))
    );
}

#[test]
fn version_times_out() {
    let s = session_with(silent_device(), test_config());
    let result = run(&s, async {
        connect(&s).await;
        s.request_version(Some(5)).await
    });
    assert_eq!(result, Err(Error::Timeout(ResponseKind::Version)));
}

#[test]
fn duplicate_request_is_rejected() {
    let s = session();
    let (first, second) = run(&s, async {
        connect(&s).await;
        future::zip(s.request_wifi_status(None), s.request_wifi_status(None)).await
    });
    assert!(first.is_ok());
    assert_eq!(second, Err(Error::RequestPending(ResponseKind::WifiStatus)));
}

#[test]
fn request_can_be_repeated_after_timeout() {
    let s = session_with(silent_device(), test_config());
    run(&s, async {
        connect(&s).await;
        assert!(s.request_wifi_status(Some(2)).await.is_err());
        assert_eq!(
            s.request_wifi_status(Some(2)).await,
            Err(Error::Timeout(ResponseKind::WifiStatus))
        );
    });
}

#[test]
fn scan_collects_and_deduplicates_across_messages() {
    let options = SimOptions {
        networks: vec![
            ("Alpha".into(), -40),
            ("Bravo".into(), -55),
            ("Charlie".into(), -60),
            ("Delta".into(), -65),
            ("Alpha".into(), -70),
            ("Echo".into(), -80),
        ],
        ..SimOptions::default()
    };
    let s = session_with(options, test_config());

    let networks = run(&s, async {
        connect(&s).await;
        s.scan_wifi_networks(None).await.unwrap()
    });

    let ssids: Vec<&str> = networks.iter().map(|n| n.ssid.as_str()).collect();
    assert_eq!(ssids, ["Alpha", "Bravo", "Charlie", "Delta", "Echo"]);
    assert_eq!(networks[0].rssi_dbm(), -40);
    assert!(!s.is_pending(ResponseKind::WifiList));
}

#[test]
fn scan_with_no_replies_is_empty() {
    let s = session_with(silent_device(), test_config());
    let networks = run(&s, async {
        connect(&s).await;
        s.scan_wifi_networks(Some(5)).await
    });
    assert_eq!(networks, Ok(Vec::new()));
}

#[test]
fn custom_data_round_trips_through_events() {
    let s = session();
    let events = record_events(&s);
    run(&s, async {
        connect(&s).await;
        s.send_custom_data(b"hello device").await.unwrap();
        for _ in 0..5 {
            future::yield_now().await;
        }
    });
    assert!(
        events
            .borrow()
            .contains(&SessionEvent::CustomData(b"hello device".to_vec()))
    );
}

#[test]
fn softap_configuration_reaches_device() {
    let s = session();
    let ap = SoftApConfig {
        credentials: WifiCredentials::new("Setup-AP", "ap-password").unwrap(),
        auth_mode: SoftApAuthMode::WpaPsk,
        channel: 6,
        max_connections: 3,
    };
    run(&s, async {
        connect(&s).await;
        s.configure_softap(&ap).await.unwrap();
    });

    let ap_state = s.transport().softap();
    assert_eq!(ap_state.ssid, "Setup-AP");
    assert_eq!(ap_state.password, "ap-password");
    assert_eq!(ap_state.channel, 6);
    assert_eq!(ap_state.max_connections, 3);
    assert_eq!(ap_state.auth_mode, SoftApAuthMode::WpaPsk as u8);
    assert_eq!(s.transport().op_mode(), OpMode::SoftAp as u8);
}

#[test]
fn invalid_softap_is_rejected_before_writing() {
    let s = session();
    let ap = SoftApConfig {
        credentials: WifiCredentials::new("Setup-AP", "ap-password").unwrap(),
        auth_mode: SoftApAuthMode::WpaPsk,
        channel: 15,
        max_connections: 3,
    };
    let result = run(&s, async {
        connect(&s).await;
        s.configure_softap(&ap).await
    });
    assert!(matches!(result, Err(Error::InvalidCredentials(_))));
    assert_eq!(s.transport().raw_writes().len(), 1);
}

#[test]
fn negotiation_records_peer_key() {
    let s = session();
    let params = [0x10, 0x20, 0x30];
    run(&s, async {
        connect(&s).await;
        s.begin_negotiation(&params).await.unwrap();
        for _ in 0..5 {
            future::yield_now().await;
        }
    });
    let expected: Vec<u8> = params.iter().rev().map(|b| b ^ 0x5A).collect();
    assert_eq!(s.peer_key(), expected);
}

#[test]
fn oversized_negotiation_writes_nothing() {
    let s = session();
    let result = run(&s, async {
        connect(&s).await;
        s.begin_negotiation(&vec![0xAA; 65_535]).await
    });
    assert_eq!(
        result,
        Err(Error::PayloadTooLarge {
            len: 65_535,
            max: 65_534
        })
    );
    assert_eq!(s.transport().raw_writes().len(), 1);
    assert_eq!(s.negotiation_state(), NegotiationState::Plain);
}

#[test]
fn failed_negotiation_write_returns_to_plain() {
    // Security mode and Length packet go out; the Data packet fails.
    let s = session_with(
        SimOptions {
            fail_write_after: Some(2),
            ..SimOptions::default()
        },
        test_config(),
    );
    let result = run(&s, async {
        connect(&s).await;
        s.begin_negotiation(&[0x10, 0x20]).await
    });
    assert_eq!(result, Err(Error::Transport(TransportError::WriteFailed)));
    assert_eq!(s.transport().raw_writes().len(), 2);
    assert_eq!(s.negotiation_state(), NegotiationState::Plain);
}

#[test]
fn notification_with_trailing_bytes_is_dropped() {
    let s = session();
    let events = record_events(&s);
    run(&s, async {
        connect(&s).await;
        // Version reply [1, 3] followed by two stray bytes.
        s.transport().inject(vec![0x41, 0x04, 0x00, 0x02, 0x01, 0x03, 0xEE, 0xEE]);
        for _ in 0..3 {
            future::yield_now().await;
        }
    });
    let events = events.borrow();
    assert!(events.contains(&SessionEvent::FrameDropped(FrameError::TrailingBytes {
        expected: 6,
        len: 8
    })));
    assert!(!events.iter().any(|e| matches!(e, SessionEvent::Version(_))));
}

#[test]
fn corrupted_notification_is_dropped() {
    let s = session_with(
        SimOptions::default(),
        SessionConfig {
            checksum_enabled: true,
            ..test_config()
        },
    );
    let events = record_events(&s);
    run(&s, async {
        connect(&s).await;
        s.transport().inject(vec![0x45, 0x02, 0x00, 0x02, 0x01, 0x03, 0x00, 0x00]);
        for _ in 0..3 {
            future::yield_now().await;
        }
        // The session keeps working after the bad frame.
        assert!(s.request_version(None).await.is_ok());
    });
    assert!(events.borrow().iter().any(|e| matches!(
        e,
        SessionEvent::FrameDropped(FrameError::ChecksumMismatch { .. })
    )));
}

#[test]
fn unsolicited_status_is_reported_without_request() {
    let s = session();
    let events = record_events(&s);
    run(&s, async {
        connect(&s).await;
        s.transport()
            .notify(MessageKind::Data(DataSubtype::WifiConnectionState), &[1, 0, 0]);
        for _ in 0..3 {
            future::yield_now().await;
        }
    });
    assert!(
        events
            .borrow()
            .iter()
            .any(|e| matches!(e, SessionEvent::WifiStatus(st) if st.is_station_connected()))
    );
}
