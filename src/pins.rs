//! Default GPIO assignments for the meter interface board.
//!
//! These seed [`MeterConfig`](crate::config::MeterConfig); the live pin
//! numbers come from the loaded configuration so a board revision can be
//! re-wired without a firmware rebuild.

// ---------------------------------------------------------------------------
// Pulse input
// ---------------------------------------------------------------------------

/// Meter pulse input, buffered through an NPN stage (signal is inverted).
///
/// - Sensor HIGH (no magnet) → transistor ON → GPIO LOW
/// - Sensor LOW (magnet)     → transistor OFF → GPIO HIGH (pull-up)
///
/// GPIO34 is input-only and interrupt capable on the ESP32; the falling
/// edge (magnet leaving the sensor) marks a completed pulse.
pub const PULSE_INPUT_GPIO: i32 = 34;

// ---------------------------------------------------------------------------
// Indicator
// ---------------------------------------------------------------------------

/// External pulse indicator LED.  GPIO32 floats high-Z while the ESP32 is
/// unpowered, so the LED stays dark through brown-outs.
pub const STATUS_LED_GPIO: i32 = 32;
