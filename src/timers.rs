//! Non-blocking millisecond timers for the polling loop.
//!
//! Both timers work on the wrapping `u32` uptime the rest of the firmware
//! uses, so they keep firing correctly across the ~49-day rollover.

/// Fires every `interval_ms`.
///
/// The next deadline is measured from the instant the timer fired, not
/// from the previous deadline: a loop that stalls does not produce a
/// burst of catch-up fires.
#[derive(Debug, Clone, Copy)]
pub struct IntervalTimer {
    interval_ms: u32,
    last_ms: u32,
}

impl IntervalTimer {
    /// Start counting from `now_ms`.
    pub fn new(interval_ms: u32, now_ms: u32) -> Self {
        Self {
            interval_ms,
            last_ms: now_ms,
        }
    }

    /// `true` once per elapsed interval.
    pub fn is_ready(&mut self, now_ms: u32) -> bool {
        if now_ms.wrapping_sub(self.last_ms) >= self.interval_ms {
            self.last_ms = now_ms;
            true
        } else {
            false
        }
    }

    /// Restart the interval at `now_ms`.
    pub fn restart(&mut self, now_ms: u32) {
        self.last_ms = now_ms;
    }

    pub fn set_interval(&mut self, interval_ms: u32) {
        self.interval_ms = interval_ms;
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }
}

/// A single deadline, armed on demand.  Used for the indicator flash.
#[derive(Debug, Clone, Copy, Default)]
pub struct OneShotTimer {
    started_ms: Option<u32>,
}

impl OneShotTimer {
    pub fn start(&mut self, now_ms: u32) {
        self.started_ms = Some(now_ms);
    }

    pub fn is_running(&self) -> bool {
        self.started_ms.is_some()
    }

    /// `true` exactly once, on the first call at or after the deadline.
    pub fn expired(&mut self, now_ms: u32, duration_ms: u32) -> bool {
        match self.started_ms {
            Some(t) if now_ms.wrapping_sub(t) >= duration_ms => {
                self.started_ms = None;
                true
            }
            _ => false,
        }
    }
}
