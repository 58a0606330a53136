//! Fuzz target: `decode_frame`
//!
//! Arbitrary notification bytes must decode or fail with a typed error,
//! never panic. An accepted frame is exactly header, payload and checksum.
//!
//! cargo fuzz run fuzz_frame_decoder

#![no_main]

use blufi::protocol::codec::decode_frame;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(frame) = decode_frame(data, None) {
        assert!(frame.payload.len() <= 255, "payload exceeds u8 length field");
        let crc = if frame.header.ctrl.has_checksum() { 2 } else { 0 };
        assert_eq!(data.len(), 4 + frame.payload.len() + crc);
    }
});
