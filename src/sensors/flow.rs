//! Flow-rate estimate from the pulse tally.
//!
//! Simple differencing: litres counted since the previous sample divided
//! by the time between samples.  Sampled once per telemetry publish, so
//! the window is the publish interval (5 s by default).  Good enough for
//! a "water is running" indicator; not a calibrated flow meter.

/// Result of a flow measurement.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FlowReading {
    /// Pulses counted in the measurement window.
    pub pulse_count: u64,
    /// Calculated flow rate (L/min).
    pub liters_per_min: f32,
}

/// Differencing flow estimator.
#[derive(Debug, Default)]
pub struct FlowEstimator {
    /// `(tally, timestamp_ms)` at the previous sample.
    last: Option<(u64, u32)>,
}

impl FlowEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a sample of the lifetime tally at `now_ms`.
    ///
    /// The first sample only establishes a baseline.  A tally that moved
    /// backwards (administrative override) also rebases and reports zero.
    pub fn sample(&mut self, tally: u64, now_ms: u32, liters_per_pulse: f32) -> FlowReading {
        let reading = match self.last {
            Some((prev_tally, prev_ms)) if tally >= prev_tally => {
                let pulses = tally - prev_tally;
                let elapsed_ms = now_ms.wrapping_sub(prev_ms);
                let liters_per_min = if elapsed_ms > 0 {
                    pulses as f32 * liters_per_pulse * 60_000.0 / elapsed_ms as f32
                } else {
                    0.0
                };
                FlowReading {
                    pulse_count: pulses,
                    liters_per_min,
                }
            }
            _ => FlowReading::default(),
        };

        self.last = Some((tally, now_ms));
        reading
    }

    /// Forget the baseline; the next sample starts a fresh window.
    pub fn reset(&mut self) {
        self.last = None;
    }
}
