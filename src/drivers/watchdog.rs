//! Task watchdog for the metering loop.
//!
//! The loop feeds once per poll.  If it stalls for longer than the
//! timeout the TWDT panics and the device reboots, after which the
//! journal restores the last saved counters.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

/// Never arm the watchdog tighter than this.
pub const MIN_TIMEOUT_MS: u32 = 5_000;

pub struct Watchdog {
    timeout_ms: u32,
    #[cfg(target_os = "espidf")]
    subscribed: bool,
}

impl Watchdog {
    /// Timeout for a loop that polls every `poll_interval_ms`.
    pub fn timeout_for(poll_interval_ms: u32) -> u32 {
        poll_interval_ms.saturating_mul(50).max(MIN_TIMEOUT_MS)
    }

    /// Subscribe the calling task with `timeout_ms`.
    pub fn new(timeout_ms: u32) -> Self {
        #[cfg(target_os = "espidf")]
        {
            unsafe {
                let cfg = esp_task_wdt_config_t {
                    timeout_ms,
                    idle_core_mask: 0,
                    trigger_panic: true,
                };
                let ret = esp_task_wdt_reconfigure(&cfg);
                if ret != ESP_OK {
                    log::warn!("Watchdog: reconfigure -> {}, keeping current TWDT config", ret);
                }

                let ret = esp_task_wdt_add(core::ptr::null_mut());
                let subscribed = ret == ESP_OK;
                if subscribed {
                    info!("Watchdog: metering task armed, {} ms", timeout_ms);
                } else {
                    log::warn!("Watchdog: metering task not subscribed ({}), loop unguarded", ret);
                }

                Self {
                    timeout_ms,
                    subscribed,
                }
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            log::info!("Watchdog: host build, {} ms timeout not enforced", timeout_ms);
            Self { timeout_ms }
        }
    }

    /// Reset the countdown.
    pub fn feed(&self) {
        #[cfg(target_os = "espidf")]
        {
            if self.subscribed {
                unsafe {
                    esp_task_wdt_reset();
                }
            }
        }
    }

    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }
}
