//! Meter configuration parameters
//!
//! All tunable parameters for the water meter.  Values can be overridden
//! via NVS (non-volatile storage) or a runtime `UpdateConfig` command.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::pins;

/// Core meter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterConfig {
    // --- Hardware ---
    /// GPIO for pulse detection (input-only, interrupt capable)
    pub pulse_input_gpio: i32,
    /// GPIO for the pulse indicator LED
    pub status_led_gpio: i32,

    // --- Meter ---
    /// Volume per pulse in litres
    pub liters_per_pulse: f32,
    /// Minimum time between two accepted pulses (milliseconds)
    pub pulse_debounce_ms: u32,
    /// Minimum stable HIGH time before a falling edge is trusted (milliseconds)
    pub pulse_high_stable_ms: u32,
    /// Quiet window after boot during which every edge is discarded (milliseconds)
    pub boot_guard_ms: u32,

    // --- Timing ---
    /// Periodic save interval (milliseconds)
    pub save_interval_ms: u32,
    /// Telemetry publish interval (milliseconds)
    pub publish_interval_ms: u32,
    /// Indicator flash length (milliseconds)
    pub led_flash_ms: u32,
    /// Polling loop cadence (milliseconds)
    pub poll_interval_ms: u32,

    // --- Feature flags ---
    /// Enable/disable the meter entirely
    pub enabled: bool,
    /// Enable/disable LED feedback on each pulse
    pub enable_led: bool,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            // Hardware
            pulse_input_gpio: pins::PULSE_INPUT_GPIO,
            status_led_gpio: pins::STATUS_LED_GPIO,

            // Meter
            liters_per_pulse: 1.0,
            pulse_debounce_ms: 500, // magnetic reed, ≤ 2 pulses/s
            pulse_high_stable_ms: 150,
            boot_guard_ms: 3000,

            // Timing
            save_interval_ms: 30_000,
            publish_interval_ms: 5_000,
            led_flash_ms: 50,
            poll_interval_ms: 100,

            // Features
            enabled: true,
            enable_led: true,
        }
    }
}

impl MeterConfig {
    /// Range-check every field.  Rejects rather than clamps, so a bad
    /// command never silently changes the metering behaviour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.liters_per_pulse > 0.0 && self.liters_per_pulse <= 1000.0) {
            return Err(ConfigError::ValidationFailed(
                "liters_per_pulse must be > 0 and <= 1000",
            ));
        }
        if !(1..=60_000).contains(&self.pulse_debounce_ms) {
            return Err(ConfigError::ValidationFailed(
                "pulse_debounce_ms must be 1–60000",
            ));
        }
        if self.pulse_high_stable_ms > self.pulse_debounce_ms {
            return Err(ConfigError::ValidationFailed(
                "pulse_high_stable_ms must be <= pulse_debounce_ms",
            ));
        }
        if self.boot_guard_ms > 60_000 {
            return Err(ConfigError::ValidationFailed(
                "boot_guard_ms must be 0–60000",
            ));
        }
        if !(1_000..=3_600_000).contains(&self.save_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "save_interval_ms must be 1000–3600000",
            ));
        }
        if !(1_000..=3_600_000).contains(&self.publish_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "publish_interval_ms must be 1000–3600000",
            ));
        }
        if !(1..=1_000).contains(&self.led_flash_ms) {
            return Err(ConfigError::ValidationFailed(
                "led_flash_ms must be 1–1000",
            ));
        }
        if !(10..=1_000).contains(&self.poll_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "poll_interval_ms must be 10–1000",
            ));
        }
        Ok(())
    }
}
