//! Fuzz target: `Reassembler::feed`
//!
//! Treats the input as a stream of length-prefixed notifications and feeds
//! every one that decodes. The reassembler must never panic and never
//! yield a message longer than its declared total.
//!
//! cargo fuzz run fuzz_reassembler

#![no_main]

use blufi::protocol::chunked::Reassembler;
use blufi::protocol::codec::decode_frame;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut rx = Reassembler::new();
    let mut rest = data;

    while let Some((&len, tail)) = rest.split_first() {
        let (chunk, next) = tail.split_at(usize::from(len).min(tail.len()));
        rest = next;

        if let Ok(frame) = decode_frame(chunk, None) {
            if let Some(msg) = rx.feed(frame) {
                assert!(msg.payload.len() <= usize::from(u16::MAX));
            }
        }
    }

    rx.clear();
    assert_eq!(rx.open_chains(), 0);
});
