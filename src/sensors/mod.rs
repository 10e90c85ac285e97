//! Pulse input subsystem: boot guard, edge classifier, and the
//! aggregating [`PulseDetector`] the GPIO ISR feeds.
//!
//! ```text
//!  GPIO edge ──▶ BootGuard ──▶ EdgeClassifier ──▶ PulseChannel
//!   (ISR)        (discard?)     (accept/reject)    (tally + flags)
//! ```
//!
//! Everything reachable from [`pulse_isr_handler`] is lock-free and
//! allocation-free.

pub mod boot_guard;
pub mod flow;
pub mod pulse;

use crate::config::MeterConfig;
use crate::events::PulseChannel;
use boot_guard::{Admission, BootGuard};
use pulse::{Edge, EdgeClassifier, Verdict};

/// The detector the device ISR writes into.
/// `static` because ESP-IDF ISR callbacks cannot capture state.
pub static PULSE_DETECTOR: PulseDetector = PulseDetector::new();

/// Called from the GPIO ISR on every edge of the pulse input.
///
/// `level_high` is the pin level sampled inside the ISR (HIGH after a
/// rising edge); `now_ms` is milliseconds since boot.
pub fn pulse_isr_handler(level_high: bool, now_ms: u32) {
    let _ = PULSE_DETECTOR.on_transition(level_high, now_ms);
}

/// Boot guard, classifier, and the channel they report through.
pub struct PulseDetector {
    guard: BootGuard,
    classifier: EdgeClassifier,
    channel: PulseChannel,
}

impl PulseDetector {
    pub const fn new() -> Self {
        Self {
            guard: BootGuard::new(3000),
            classifier: EdgeClassifier::new(500, 150),
            channel: PulseChannel::new(),
        }
    }

    /// Load thresholds from `config`, clear stale flags and timestamps,
    /// and close the boot guard starting at `now_ms`.  Does not touch
    /// the pulse tally.
    pub fn arm(&self, config: &MeterConfig, now_ms: u32) {
        self.classifier.reset();
        self.classifier
            .set_thresholds(config.pulse_debounce_ms, config.pulse_high_stable_ms);
        self.channel.clear_flags();
        self.guard.arm(now_ms, config.boot_guard_ms);
    }

    /// Run one transition through the guard and the classifier.
    pub fn on_transition(&self, level_high: bool, now_ms: u32) -> Verdict {
        match self.guard.admit(now_ms) {
            Admission::Discard => return Verdict::Discarded,
            Admission::Opened => {
                self.classifier.seed_stability(now_ms);
                self.channel.record_guard_opened();
            }
            Admission::Pass => {}
        }
        self.classifier
            .on_edge(Edge::from_level(level_high), now_ms, &self.channel)
    }

    pub fn channel(&self) -> &PulseChannel {
        &self.channel
    }

    pub fn guard(&self) -> &BootGuard {
        &self.guard
    }

    pub fn classifier(&self) -> &EdgeClassifier {
        &self.classifier
    }
}

impl Default for PulseDetector {
    fn default() -> Self {
        Self::new()
    }
}
