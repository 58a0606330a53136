//! Integration test driver for `tests/integration/` submodules.
//!
//! Each `mod` below maps to a file that exercises the session against the
//! in-memory BluFi device. Time is virtual: a delay of `n` ms yields to
//! the executor `n` times, so timeouts are deterministic.

mod fragmentation_tests;
mod request_tests;
mod session_flow_tests;
mod support;
