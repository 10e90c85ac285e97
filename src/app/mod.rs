//! Application core: pure domain logic, zero I/O.
//!
//! Business rules for the water meter: applying pulses to the ledger,
//! calendar resets, persistence triggers, overrides, and telemetry.
//! All interaction with hardware happens through **port traits** defined
//! in [`ports`], keeping this layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
