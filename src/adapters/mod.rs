//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements    | Connects to                  |
//! |------------|---------------|------------------------------|
//! | `log_sink` | EventSink     | Serial log output            |
//! | `nvs`      | ConfigPort    | NVS / in-memory store        |
//! |            | StoragePort   |                              |
//! | `time`     | ClockPort     | ESP32 timer + SNTP wall clock|
//!
//! The indicator LED implements `IndicatorPort` directly in
//! [`drivers::status_led`](crate::drivers::status_led).

pub mod log_sink;
pub mod nvs;
pub mod time;
