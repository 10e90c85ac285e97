//! WaterMeter firmware library.
//!
//! Exposes the pulse-detection and counter-lifecycle engine for the
//! `espidf` binary and for host-side integration testing.  All
//! ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod calendar;
pub mod config;
pub mod error;
pub mod events;
pub mod ledger;
pub mod persistence;
pub mod pins;
pub mod timers;

pub mod adapters;
pub mod drivers;
pub mod sensors;
