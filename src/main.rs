//! WaterMeter firmware entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  NvsAdapter        Esp32TimeAdapter   LogEventSink   PulseLed  │
//! │  (Config+Storage)  (ClockPort)        (EventSink)    (LED)     │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              MeterService (pure logic)                 │    │
//! │  │  Ledger · Calendar resets · Persistence · Audit        │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                              ▲                                 │
//! │          PULSE_DETECTOR (static, atomics) ◀── GPIO ISR         │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use log::{error, info, warn};

use watermeter::adapters::log_sink::LogEventSink;
use watermeter::adapters::nvs::NvsAdapter;
use watermeter::adapters::time::Esp32TimeAdapter;
use watermeter::app::ports::{ClockPort, ConfigPort};
use watermeter::app::service::MeterService;
use watermeter::config::MeterConfig;
use watermeter::drivers::hw_init;
use watermeter::drivers::status_led::{GpioOutput, PulseLed};
use watermeter::drivers::watchdog::Watchdog;
use watermeter::sensors::PULSE_DETECTOR;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  WaterMeter v{}                      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. NVS + config ───────────────────────────────────────
    let nvs = match NvsAdapter::new() {
        Ok(n) => Some(n),
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults and no persistence", e);
            None
        }
    };
    let config = match nvs.as_ref().map(|n| n.load()) {
        Some(Ok(cfg)) => cfg,
        Some(Err(e)) => {
            warn!("NVS config load failed ({}), using defaults", e);
            MeterConfig::default()
        }
        None => MeterConfig::default(),
    };
    let config = match config.validate() {
        Ok(()) => config,
        Err(e) => {
            warn!("Stored config invalid ({}), using defaults", e);
            MeterConfig::default()
        }
    };

    // ── 3. Service ────────────────────────────────────────────
    let clock = Esp32TimeAdapter::new();
    let mut sink = LogEventSink::new();
    let mut meter = MeterService::new(config.clone(), &PULSE_DETECTOR, nvs);

    // Arm the detector and seed the tally before the ISR can fire.
    meter.begin(clock.uptime_ms(), &mut sink);

    // ── 4. Hardware bring-up ──────────────────────────────────
    if config.enabled {
        if let Err(e) = hw_init::init_gpio(config.pulse_input_gpio, config.status_led_gpio) {
            error!("GPIO init failed: {}", e);
        } else if let Err(e) = hw_init::init_isr_service(config.pulse_input_gpio) {
            error!("Pulse ISR init failed: {}, pulses will not be counted", e);
        }
    }
    let mut led = PulseLed::new(GpioOutput::new(config.status_led_gpio));
    let watchdog = Watchdog::new(Watchdog::timeout_for(config.poll_interval_ms));

    info!("System ready. Entering polling loop.");

    // ── 5. Polling loop ───────────────────────────────────────
    loop {
        meter.poll(&clock, &mut sink, &mut led);
        meter.flush_config();
        watchdog.feed();

        #[cfg(target_os = "espidf")]
        esp_idf_hal::delay::FreeRtos::delay_ms(config.poll_interval_ms);

        #[cfg(not(target_os = "espidf"))]
        std::thread::sleep(std::time::Duration::from_millis(u64::from(
            config.poll_interval_ms,
        )));
    }
}
