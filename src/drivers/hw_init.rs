//! One-shot hardware peripheral initialisation.
//!
//! Configures the pulse input and the indicator LED GPIOs and registers
//! the pulse ISR, using raw ESP-IDF sys calls.  Called once from `main()`
//! after the meter service has armed the detector and before the polling
//! loop starts.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
    IsrInstallFailed(i32),
    IsrAttachFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::IsrInstallFailed(rc) => write!(f, "GPIO ISR service install failed (rc={})", rc),
            Self::IsrAttachFailed(rc) => write!(f, "pulse ISR attach failed (rc={})", rc),
        }
    }
}

// ── GPIO ──────────────────────────────────────────────────────

/// Configure the pulse input (no pulls: the sensor drives the line) and
/// the LED output, LED off.
#[cfg(target_os = "espidf")]
pub fn init_gpio(pulse_gpio: i32, led_gpio: i32) -> Result<(), HwInitError> {
    // SAFETY: called once from main() before the ISR is attached.
    unsafe {
        let input = gpio_config_t {
            pin_bit_mask: 1u64 << pulse_gpio,
            mode: gpio_mode_t_GPIO_MODE_INPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_ANYEDGE,
        };
        let ret = gpio_config(&input);
        if ret != ESP_OK { return Err(HwInitError::GpioConfigFailed(ret)); }

        let output = gpio_config_t {
            pin_bit_mask: 1u64 << led_gpio,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = gpio_config(&output);
        if ret != ESP_OK { return Err(HwInitError::GpioConfigFailed(ret)); }
        gpio_set_level(led_gpio, 0);

        info!(
            "hw_init: pulse input GPIO{} (level={}), LED GPIO{}",
            pulse_gpio,
            gpio_get_level(pulse_gpio),
            led_gpio
        );
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_gpio(pulse_gpio: i32, led_gpio: i32) -> Result<(), HwInitError> {
    log::info!("hw_init(sim): GPIO{} / GPIO{} skipped", pulse_gpio, led_gpio);
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: pin was configured as an output in init_gpio(). Main-loop only.
    unsafe { gpio_set_level(pin, u32::from(high)); }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(_pin: i32, _high: bool) {}

// ── GPIO ISR Service ──────────────────────────────────────────

/// Runs on every edge of the pulse input.  The pin number travels in
/// `arg` so the handler can sample the level that caused the interrupt.
#[cfg(target_os = "espidf")]
unsafe extern "C" fn pulse_gpio_isr(arg: *mut core::ffi::c_void) {
    let pin = arg as usize as i32;
    // SAFETY: register read and RTC counter read; both ISR-safe.
    let level_high = unsafe { gpio_get_level(pin) } != 0;
    let now_ms = (unsafe { esp_timer_get_time() } / 1_000) as u32;
    crate::sensors::pulse_isr_handler(level_high, now_ms);
}

/// Install the per-pin ISR service and attach the pulse handler.
#[cfg(target_os = "espidf")]
pub fn init_isr_service(pulse_gpio: i32) -> Result<(), HwInitError> {
    // SAFETY: gpio_install_isr_service is idempotent; ESP_ERR_INVALID_STATE
    // means it was already installed.  The handler only touches atomics.
    unsafe {
        let ret = gpio_install_isr_service(0);
        if ret != ESP_OK && ret != ESP_ERR_INVALID_STATE {
            return Err(HwInitError::IsrInstallFailed(ret));
        }

        gpio_set_intr_type(pulse_gpio, gpio_int_type_t_GPIO_INTR_ANYEDGE);
        let ret = gpio_isr_handler_add(
            pulse_gpio,
            Some(pulse_gpio_isr),
            pulse_gpio as usize as *mut core::ffi::c_void,
        );
        if ret != ESP_OK {
            return Err(HwInitError::IsrAttachFailed(ret));
        }
        gpio_intr_enable(pulse_gpio);
    }
    info!("hw_init: pulse ISR attached on GPIO{} (any edge)", pulse_gpio);
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_isr_service(pulse_gpio: i32) -> Result<(), HwInitError> {
    log::info!("hw_init(sim): ISR for GPIO{} skipped", pulse_gpio);
    Ok(())
}
