//! Log-based telemetry sink.
//!
//! Implements [`EventSink`] as the serial stand-in for the MQTT data
//! topic: each telemetry event goes out as one JSON line.  Every other
//! event is already logged by the service where it happens, so this
//! sink ignores it.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        if let AppEvent::Telemetry(t) = event {
            match serde_json::to_string(t) {
                Ok(json) => info!("TELEM: {}", json),
                Err(e) => warn!("TELEM: encode failed: {}", e),
            }
        }
    }
}
