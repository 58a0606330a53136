//! Timer adapter.
//!
//! Implements the [`Delay`] port with the `async-io-mini` reactor timer,
//! so waiting between fragments or on a response timeout parks the task
//! instead of spinning.

use core::time::Duration;

use crate::app::ports::Delay;

/// Reactor-backed delay.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimerDelay;

impl TimerDelay {
    pub fn new() -> Self {
        Self
    }
}

impl Delay for TimerDelay {
    async fn delay_ms(&self, ms: u32) {
        if ms == 0 {
            return;
        }
        async_io_mini::Timer::after(Duration::from_millis(u64::from(ms))).await;
    }
}
