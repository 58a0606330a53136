//! Fuzz target: `parse_wifi_list`
//!
//! cargo fuzz run fuzz_wifi_list

#![no_main]

use blufi::protocol::payloads::{WifiStatus, parse_wifi_list};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let nets = parse_wifi_list(data);
    // Every record takes at least a length and an RSSI byte.
    assert!(nets.len() <= data.len() / 2);

    let _ = WifiStatus::parse(data).to_string();
});
