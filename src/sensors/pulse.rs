//! Edge classifier for the meter pulse input.
//!
//! The ISR fires on both edges.  A rising edge only stamps
//! `last_rising_ms`.  A falling edge is a pulse candidate and is accepted
//! only when **both** hold:
//!
//! 1. `now - last_falling_ms > debounce_ms` (time since last accepted pulse)
//! 2. `now - last_rising_ms > stable_high_ms` (signal sat HIGH long enough)
//!
//! The debounce window alone lets through bounce that outlasts it; the
//! stable-HIGH requirement rejects a falling edge that follows a short
//! HIGH glitch.
//!
//! Timestamps are milliseconds since boot truncated to `u32`; all
//! differences use `wrapping_sub`.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::events::PulseChannel;

/// Direction of an electrical transition on the input pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
}

impl Edge {
    /// Map the pin level read inside the ISR to the edge that produced it.
    pub fn from_level(level_high: bool) -> Self {
        if level_high { Self::Rising } else { Self::Falling }
    }
}

/// What the detector decided about one transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Boot guard closed; not classified.
    Discarded,
    /// Rising edge recorded.
    Armed,
    /// Falling edge counted as a pulse.
    Accepted,
    /// Falling edge rejected by one or both thresholds.
    Rejected {
        debounce_gap_ms: u32,
        stable_high_ms: u32,
    },
}

/// Dual-threshold falling-edge classifier.  Lives in a `static`, so every
/// field is atomic; the ISR is the only writer of the timestamps.
pub struct EdgeClassifier {
    debounce_ms: AtomicU32,
    stable_high_ms: AtomicU32,
    last_falling_ms: AtomicU32,
    last_rising_ms: AtomicU32,
}

impl EdgeClassifier {
    pub const fn new(debounce_ms: u32, stable_high_ms: u32) -> Self {
        Self {
            debounce_ms: AtomicU32::new(debounce_ms),
            stable_high_ms: AtomicU32::new(stable_high_ms),
            last_falling_ms: AtomicU32::new(0),
            last_rising_ms: AtomicU32::new(0),
        }
    }

    /// Update both thresholds.  Safe to call while the ISR is live; an
    /// edge classified concurrently may see either the old or new pair.
    pub fn set_thresholds(&self, debounce_ms: u32, stable_high_ms: u32) {
        self.debounce_ms.store(debounce_ms, Ordering::Relaxed);
        self.stable_high_ms.store(stable_high_ms, Ordering::Relaxed);
    }

    /// `(debounce_ms, stable_high_ms)`.
    pub fn thresholds(&self) -> (u32, u32) {
        (
            self.debounce_ms.load(Ordering::Relaxed),
            self.stable_high_ms.load(Ordering::Relaxed),
        )
    }

    /// Start the stable-HIGH clock at `now_ms`.  Called the instant the
    /// boot guard opens so a line that idled LOW through the guard window
    /// is not judged against a stale timestamp.
    pub fn seed_stability(&self, now_ms: u32) {
        self.last_rising_ms.store(now_ms, Ordering::Relaxed);
    }

    /// Forget both timestamps.
    pub fn reset(&self) {
        self.last_falling_ms.store(0, Ordering::Relaxed);
        self.last_rising_ms.store(0, Ordering::Relaxed);
    }

    /// Classify one transition.  On acceptance the pulse is recorded on
    /// `channel`; on rejection the ignored flag is raised.  Bounded time,
    /// no allocation, no logging.
    pub fn on_edge(&self, edge: Edge, now_ms: u32, channel: &PulseChannel) -> Verdict {
        match edge {
            Edge::Rising => {
                self.last_rising_ms.store(now_ms, Ordering::Relaxed);
                Verdict::Armed
            }
            Edge::Falling => {
                let (debounce_ms, stable_ms) = self.thresholds();
                let debounce_gap_ms =
                    now_ms.wrapping_sub(self.last_falling_ms.load(Ordering::Relaxed));
                let stable_high_ms =
                    now_ms.wrapping_sub(self.last_rising_ms.load(Ordering::Relaxed));

                if debounce_gap_ms > debounce_ms && stable_high_ms > stable_ms {
                    self.last_falling_ms.store(now_ms, Ordering::Relaxed);
                    channel.record_pulse();
                    Verdict::Accepted
                } else {
                    channel.record_ignored(debounce_gap_ms);
                    Verdict::Rejected {
                        debounce_gap_ms,
                        stable_high_ms,
                    }
                }
            }
        }
    }
}
