//! Fragmented writes and reassembled notifications over the full stack.

use blufi::adapters::sim::SimOptions;
use blufi::protocol::codec::decode_frame;
use blufi::protocol::frame::{DataSubtype, MessageKind};
use blufi::protocol::payloads::WifiCredentials;
use blufi::{Error, SessionConfig, TransportError};
use futures_lite::future;

use crate::support::{connect, run, session, session_with, test_config};

#[test]
fn long_password_is_fragmented_in_order() {
    let s = session();
    let password = "p".repeat(64);
    let creds = WifiCredentials::new("HomeNet", &password).unwrap();

    run(&s, async {
        connect(&s).await;
        s.configure_station(&creds).await.unwrap();
    });

    let writes = s.transport().raw_writes();
    let password_frames: Vec<_> = writes
        .iter()
        .map(|w| decode_frame(w, None).unwrap())
        .filter(|f| f.header.kind() == Some(MessageKind::Data(DataSubtype::StaPassword)))
        .collect();

    // 18-byte writes carry 14 payload bytes, 12 of data after the prefix.
    assert_eq!(password_frames.len(), 6);
    let (last, rest) = password_frames.split_last().unwrap();
    for frame in rest {
        assert!(frame.header.ctrl.is_fragmented());
        assert_eq!(&frame.payload[..2], &64u16.to_le_bytes());
        assert_eq!(frame.payload.len(), 14);
    }
    assert!(!last.header.ctrl.is_fragmented());
    assert_eq!(last.payload.len(), 4);

    for pair in writes.windows(2) {
        assert_eq!(pair[1][2], pair[0][2].wrapping_add(1));
    }
    assert_eq!(s.transport().station().1, password);
    assert_eq!(s.transport().sequence_errors(), 0);
}

#[test]
fn checksum_shrinks_fragment_capacity() {
    let s = session_with(
        SimOptions::default(),
        SessionConfig {
            checksum_enabled: true,
            ..test_config()
        },
    );
    let data = vec![0xAB; 30];
    run(&s, async {
        connect(&s).await;
        s.send_custom_data(&data).await.unwrap();
    });

    // Security mode frame plus ceil(30 / 10) custom data frames.
    let writes = s.transport().raw_writes();
    assert_eq!(writes.len(), 4);
    assert!(writes.iter().all(|w| w.len() <= 18));
    assert_eq!(s.transport().frame_errors(), 0);
    assert_eq!(s.transport().received().last().unwrap().payload, data);
}

#[test]
fn concurrent_messages_do_not_interleave() {
    let s = session();
    let a = vec![0xAA; 40];
    let b = vec![0xBB; 40];
    run(&s, async {
        connect(&s).await;
        let (ra, rb) = future::zip(s.send_custom_data(&a), s.send_custom_data(&b)).await;
        ra.unwrap();
        rb.unwrap();
    });

    let received = s.transport().received();
    let customs: Vec<&Vec<u8>> = received
        .iter()
        .filter(|m| m.kind() == Some(MessageKind::Data(DataSubtype::CustomData)))
        .map(|m| &m.payload)
        .collect();
    assert_eq!(customs, [&a, &b]);
    assert_eq!(s.transport().sequence_errors(), 0);
}

#[test]
fn oversized_message_is_rejected_before_writing() {
    let s = session();
    let data = vec![0; 70_000];
    let result = run(&s, async {
        connect(&s).await;
        s.send_custom_data(&data).await
    });
    assert_eq!(
        result,
        Err(Error::PayloadTooLarge {
            len: 70_000,
            max: 65_535
        })
    );
    assert_eq!(s.transport().raw_writes().len(), 1);
}

#[test]
fn write_failure_aborts_remaining_fragments() {
    let s = session_with(
        SimOptions {
            fail_write_after: Some(3),
            ..SimOptions::default()
        },
        test_config(),
    );
    let result = run(&s, async {
        connect(&s).await;
        s.send_custom_data(&[0x11; 60]).await
    });
    assert_eq!(result, Err(Error::Transport(TransportError::WriteFailed)));
    assert_eq!(s.transport().raw_writes().len(), 3);
    assert!(s.link_state().is_active());
}

#[test]
fn large_device_reply_is_reassembled() {
    let s = session();
    let echo: Vec<u8> = (0..=199).collect();
    let events = crate::support::record_events(&s);
    run(&s, async {
        connect(&s).await;
        s.send_custom_data(&echo).await.unwrap();
        for _ in 0..40 {
            future::yield_now().await;
        }
    });
    assert_eq!(s.open_chains(), 0);
    assert!(
        events
            .borrow()
            .contains(&blufi::app::events::SessionEvent::CustomData(echo))
    );
}
