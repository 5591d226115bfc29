//! One-shot hardware peripheral initialization.
//!
//! Configures ADC channels, GPIO directions, LEDC timers/channels and the
//! console UART using raw ESP-IDF sys calls.  Called from `main()` before the
//! scheduler starts.  Safe to call more than once: only the first successful
//! call touches the hardware.
//!
//! The GPIO ISR service is installed separately by
//! [`init_capture_interrupts`], from the capture worker's own thread: ESP-IDF
//! allocates the interrupt on the calling core, so edge handling stays off
//! the scheduler core.

use core::sync::atomic::{AtomicBool, Ordering};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
use log::info;

#[cfg(target_os = "espidf")]
use crate::pins;
#[cfg(target_os = "espidf")]
use crate::state::{FAN_COUNT, MBFAN_COUNT};

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    AdcInitFailed(i32),
    GpioConfigFailed(i32),
    LedcInitFailed(i32),
    IsrInstallFailed(i32),
    UartInstallFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AdcInitFailed(rc) => write!(f, "ADC1 init failed (rc={})", rc),
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::LedcInitFailed(rc) => write!(f, "LEDC timer/channel config failed (rc={})", rc),
            Self::IsrInstallFailed(rc) => write!(f, "GPIO ISR service install failed (rc={})", rc),
            Self::UartInstallFailed(rc) => write!(f, "UART driver install failed (rc={})", rc),
        }
    }
}

impl std::error::Error for HwInitError {}

static INITIALISED: AtomicBool = AtomicBool::new(false);

/// Whether [`init_peripherals`] has completed.
pub fn is_initialised() -> bool {
    INITIALISED.load(Ordering::Acquire)
}

/// Bring up every peripheral the firmware uses.  Fans start at 0 % duty.
pub fn init_peripherals() -> Result<(), HwInitError> {
    if INITIALISED.swap(true, Ordering::AcqRel) {
        return Ok(());
    }
    if let Err(e) = init_all() {
        INITIALISED.store(false, Ordering::Release);
        return Err(e);
    }
    Ok(())
}

#[cfg(target_os = "espidf")]
fn init_all() -> Result<(), HwInitError> {
    // SAFETY: guarded by INITIALISED; runs once on the boot thread before
    // any other task exists.
    unsafe {
        init_adc()?;
        init_gpio()?;
        init_ledc()?;
        init_uart()?;
    }
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
fn init_all() -> Result<(), HwInitError> {
    info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

static CAPTURE_IRQS: AtomicBool = AtomicBool::new(false);

/// Whether [`init_capture_interrupts`] has completed.
pub fn capture_interrupts_attached() -> bool {
    CAPTURE_IRQS.load(Ordering::Acquire)
}

/// Install the GPIO ISR service and hook the tach and PWM-input edges.
/// Must run on the core that should take the interrupts.  Idempotent.
pub fn init_capture_interrupts() -> Result<(), HwInitError> {
    if CAPTURE_IRQS.swap(true, Ordering::AcqRel) {
        return Ok(());
    }
    // SAFETY: guarded by CAPTURE_IRQS; pins were configured as inputs by
    // init_peripherals().
    #[cfg(target_os = "espidf")]
    let result = unsafe { init_isr_service() };
    #[cfg(not(target_os = "espidf"))]
    let result = {
        info!("hw_init(sim): capture interrupts skipped");
        Ok(())
    };
    if result.is_err() {
        CAPTURE_IRQS.store(false, Ordering::Release);
    }
    result
}

#[cfg(target_os = "espidf")]
fn check(ret: esp_err_t, err: fn(i32) -> HwInitError) -> Result<(), HwInitError> {
    if ret == ESP_OK as i32 { Ok(()) } else { Err(err(ret)) }
}

// ── ADC (oneshot) ─────────────────────────────────────────────

#[cfg(target_os = "espidf")]
static mut ADC1_HANDLE: adc_oneshot_unit_handle_t = core::ptr::null_mut();

#[cfg(target_os = "espidf")]
unsafe fn init_adc() -> Result<(), HwInitError> {
    let init_cfg = adc_oneshot_unit_init_cfg_t {
        unit_id: adc_unit_t_ADC_UNIT_1,
        ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
        ..Default::default()
    };
    // SAFETY: ADC1_HANDLE is only written here, once at boot.
    check(
        unsafe { adc_oneshot_new_unit(&init_cfg, &raw mut ADC1_HANDLE) },
        HwInitError::AdcInitFailed,
    )?;

    let chan_cfg = adc_oneshot_chan_cfg_t {
        atten: adc_atten_t_ADC_ATTEN_DB_12,
        bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
    };
    for &ch in &pins::TEMP_ADC_CHANNEL {
        check(
            unsafe { adc_oneshot_config_channel(ADC1_HANDLE, ch, &chan_cfg) },
            HwInitError::AdcInitFailed,
        )?;
    }

    info!("hw_init: ADC1 configured ({} temperature channels)", pins::TEMP_ADC_CHANNEL.len());
    Ok(())
}

/// One raw 12-bit ADC1 sample, or `None` if the driver reported an error.
#[cfg(target_os = "espidf")]
pub fn adc1_read(channel: u32) -> Option<u16> {
    let mut raw: i32 = 0;
    // SAFETY: ADC1_HANDLE is written once during init_adc(); only the
    // scheduler core reads the ADC.
    let ret = unsafe { adc_oneshot_read(ADC1_HANDLE, channel, &mut raw) };
    (ret == ESP_OK as i32).then(|| raw.max(0) as u16)
}

// ── GPIO ──────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio() -> Result<(), HwInitError> {
    let mut input_mask = 0u64;
    for &pin in pins::FAN_TACH_GPIO.iter().chain(pins::MBFAN_PWM_GPIO.iter()) {
        input_mask |= 1u64 << pin;
    }
    let inputs = gpio_config_t {
        pin_bit_mask: input_mask,
        mode: gpio_mode_t_GPIO_MODE_INPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    check(unsafe { gpio_config(&inputs) }, HwInitError::GpioConfigFailed)?;

    let led = gpio_config_t {
        pin_bit_mask: 1u64 << pins::STATUS_LED_GPIO,
        mode: gpio_mode_t_GPIO_MODE_OUTPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    check(unsafe { gpio_config(&led) }, HwInitError::GpioConfigFailed)?;
    unsafe { gpio_set_level(pins::STATUS_LED_GPIO, 0) };

    info!("hw_init: GPIO configured (tach×{}, pwm-in×{}, led)", FAN_COUNT, MBFAN_COUNT);
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: pin was configured as an output in init_gpio().
    unsafe {
        gpio_set_level(pin, u32::from(high));
    }
}

// ── LEDC PWM ─────────────────────────────────────────────────

/// LEDC channel of fan `n` is `LEDC_CH_FAN0 + n` (timer 0).
pub const LEDC_CH_FAN0: u32 = 0;
/// LEDC channel of mbfan tach output `n` is `LEDC_CH_TACH0 + n`
/// (timer `LEDC_TIMER_TACH0 + n`, one timer per output since the
/// frequencies differ).
pub const LEDC_CH_TACH0: u32 = 4;
pub const LEDC_TIMER_TACH0: u32 = 1;

/// Maximum raw duty for the fan channels.
pub const FAN_DUTY_MAX: u32 = (1 << crate::pins::FAN_PWM_RESOLUTION_BITS) - 1;

#[cfg(target_os = "espidf")]
unsafe fn init_ledc() -> Result<(), HwInitError> {
    let fan_timer = ledc_timer_config_t {
        speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
        timer_num: ledc_timer_t_LEDC_TIMER_0,
        duty_resolution: pins::FAN_PWM_RESOLUTION_BITS,
        freq_hz: pins::FAN_PWM_FREQ_HZ,
        clk_cfg: soc_periph_ledc_clk_src_legacy_t_LEDC_AUTO_CLK,
        ..Default::default()
    };
    check(unsafe { ledc_timer_config(&fan_timer) }, HwInitError::LedcInitFailed)?;

    for (i, &gpio) in pins::FAN_PWM_GPIO.iter().enumerate() {
        // Duty 0: every fan output starts stopped.
        check(
            unsafe {
                ledc_channel_config(&ledc_channel_config_t {
                    speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
                    channel: LEDC_CH_FAN0 + i as u32,
                    timer_sel: ledc_timer_t_LEDC_TIMER_0,
                    gpio_num: gpio,
                    duty: 0,
                    hpoint: 0,
                    ..Default::default()
                })
            },
            HwInitError::LedcInitFailed,
        )?;
    }

    for (i, &gpio) in pins::MBFAN_TACH_GPIO.iter().enumerate() {
        let timer = LEDC_TIMER_TACH0 + i as u32;
        check(
            unsafe {
                ledc_timer_config(&ledc_timer_config_t {
                    speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
                    timer_num: timer,
                    duty_resolution: pins::TACH_OUT_RESOLUTION_BITS,
                    freq_hz: pins::TACH_OUT_MIN_HZ as u32,
                    clk_cfg: soc_periph_ledc_clk_src_legacy_t_LEDC_AUTO_CLK,
                    ..Default::default()
                })
            },
            HwInitError::LedcInitFailed,
        )?;
        check(
            unsafe {
                ledc_channel_config(&ledc_channel_config_t {
                    speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
                    channel: LEDC_CH_TACH0 + i as u32,
                    timer_sel: timer,
                    gpio_num: gpio,
                    duty: 0,
                    hpoint: 0,
                    ..Default::default()
                })
            },
            HwInitError::LedcInitFailed,
        )?;
    }

    info!(
        "hw_init: LEDC configured (fans=CH0-{}, tach out=CH{}-{})",
        FAN_COUNT - 1,
        LEDC_CH_TACH0,
        LEDC_CH_TACH0 as usize + MBFAN_COUNT - 1
    );
    Ok(())
}

/// Write a raw duty to an LEDC channel.
#[cfg(target_os = "espidf")]
pub fn set_channel_duty(channel: u32, duty: u32) -> Result<(), i32> {
    // SAFETY: channels were configured in init_ledc(); only the scheduler
    // core writes duty registers.
    unsafe {
        let ret = esp_idf_svc::sys::ledc_set_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, channel, duty);
        if ret != ESP_OK as i32 {
            return Err(ret);
        }
        let ret = esp_idf_svc::sys::ledc_update_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, channel);
        if ret != ESP_OK as i32 {
            return Err(ret);
        }
    }
    Ok(())
}

/// Retune an LEDC timer.
#[cfg(target_os = "espidf")]
pub fn set_timer_freq(timer: u32, hz: u32) -> Result<(), i32> {
    // SAFETY: timer was configured in init_ledc().
    let ret = unsafe { esp_idf_svc::sys::ledc_set_freq(ledc_mode_t_LEDC_LOW_SPEED_MODE, timer, hz) };
    if ret == ESP_OK as i32 { Ok(()) } else { Err(ret) }
}

// ── GPIO ISR Service ──────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe extern "C" fn tach_gpio_isr(arg: *mut core::ffi::c_void) {
    crate::sensors::tach::tach_isr_handler(arg as usize);
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn pwm_in_gpio_isr(arg: *mut core::ffi::c_void) {
    let ch = arg as usize;
    // SAFETY: register and RTC counter reads; safe in ISR context.
    let (level, now_us) = unsafe {
        (
            gpio_get_level(pins::MBFAN_PWM_GPIO[ch]) != 0,
            esp_timer_get_time() as u64,
        )
    };
    crate::sensors::pwm_input::pwm_edge_isr_handler(ch, level, now_us);
}

#[cfg(target_os = "espidf")]
unsafe fn init_isr_service() -> Result<(), HwInitError> {
    // ESP_ERR_INVALID_STATE means the service is already installed.
    let ret = unsafe { gpio_install_isr_service(0) };
    if ret != ESP_OK && ret != ESP_ERR_INVALID_STATE {
        return Err(HwInitError::IsrInstallFailed(ret));
    }

    // Channel index travels in the ISR argument pointer.
    for (ch, &pin) in pins::FAN_TACH_GPIO.iter().enumerate() {
        unsafe {
            gpio_set_intr_type(pin, gpio_int_type_t_GPIO_INTR_POSEDGE);
            gpio_isr_handler_add(pin, Some(tach_gpio_isr), ch as *mut core::ffi::c_void);
            gpio_intr_enable(pin);
        }
    }
    for (ch, &pin) in pins::MBFAN_PWM_GPIO.iter().enumerate() {
        unsafe {
            gpio_set_intr_type(pin, gpio_int_type_t_GPIO_INTR_ANYEDGE);
            gpio_isr_handler_add(pin, Some(pwm_in_gpio_isr), ch as *mut core::ffi::c_void);
            gpio_intr_enable(pin);
        }
    }

    info!(
        "hw_init: ISR service installed on {:?} (tach×{}, pwm-in×{})",
        esp_idf_hal::cpu::core(),
        FAN_COUNT,
        MBFAN_COUNT
    );
    Ok(())
}

// ── UART console ──────────────────────────────────────────────

#[cfg(target_os = "espidf")]
const UART_BUF_SIZE: i32 = 1024;

#[cfg(target_os = "espidf")]
unsafe fn init_uart() -> Result<(), HwInitError> {
    let cfg = uart_config_t {
        baud_rate: pins::UART_BAUD as i32,
        data_bits: uart_word_length_t_UART_DATA_8_BITS,
        parity: uart_parity_t_UART_PARITY_DISABLE,
        stop_bits: uart_stop_bits_t_UART_STOP_BITS_1,
        flow_ctrl: uart_hw_flowcontrol_t_UART_HW_FLOWCTRL_DISABLE,
        ..Default::default()
    };
    check(
        unsafe {
            uart_driver_install(
                pins::UART_NUM,
                UART_BUF_SIZE * 2,
                UART_BUF_SIZE * 2,
                0,
                core::ptr::null_mut(),
                0,
            )
        },
        HwInitError::UartInstallFailed,
    )?;
    check(
        unsafe { uart_param_config(pins::UART_NUM, &cfg) },
        HwInitError::UartInstallFailed,
    )?;
    check(
        unsafe { uart_set_pin(pins::UART_NUM, pins::UART_TX_GPIO, pins::UART_RX_GPIO, -1, -1) },
        HwInitError::UartInstallFailed,
    )?;
    info!("hw_init: UART{} console at {} baud", pins::UART_NUM, pins::UART_BAUD);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        assert!(init_peripherals().is_ok());
        assert!(is_initialised());
        assert!(init_peripherals().is_ok());
        assert!(is_initialised());
    }

    #[test]
    fn capture_interrupts_install_once() {
        assert!(init_peripherals().is_ok());
        assert!(init_capture_interrupts().is_ok());
        assert!(capture_interrupts_attached());
        assert!(init_capture_interrupts().is_ok());
    }
}
