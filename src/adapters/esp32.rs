//! ESP32 board adapter: the controller UART and its RTS/CTS GPIOs through raw
//! ESP-IDF driver calls.
//!
//! The UART driver is thread-safe per direction, so the TX and RX halves are
//! just the port number and can live on different worker threads.

use core::time::Duration;

use embedded_hal::digital::{self, ErrorKind, ErrorType, InputPin, OutputPin};
use esp_idf_svc::sys::*;
use log::info;

use crate::error::{Error, UartError};
use crate::pins;
use crate::ports::{Board, BoardParts, LineSettings, UartControl, UartRx, UartTx};

/// Receive buffer used when the peripheral handles RTS/CTS. The driver
/// rejects anything not larger than the 128-byte hardware FIFO.
const MIN_DRIVER_RX_BUFFER: usize = 256;

fn esp_check(ret: esp_err_t) -> Result<(), UartError> {
    if ret == ESP_OK as i32 {
        Ok(())
    } else {
        Err(UartError::Driver(ret))
    }
}

fn to_ticks(timeout: Option<Duration>) -> TickType_t {
    match timeout {
        None => TickType_t::MAX,
        Some(d) => ((d.as_millis() as u64 * u64::from(configTICK_RATE_HZ)) / 1000) as TickType_t,
    }
}

// ── UART halves ──────────────────────────────────────────────

pub struct EspUartTx {
    port: uart_port_t,
}

impl UartTx for EspUartTx {
    fn write_all(&mut self, data: &[u8]) -> Result<(), UartError> {
        // SAFETY: `data` is valid for `data.len()` bytes for the duration of
        // the call; the driver copies it into its TX FIFO/ring.
        let written = unsafe { uart_write_bytes(self.port, data.as_ptr().cast(), data.len()) };
        if written < 0 {
            return Err(UartError::Driver(written));
        }
        // SAFETY: port was installed by `EspUartControl::configure`.
        esp_check(unsafe { uart_wait_tx_done(self.port, TickType_t::MAX) })
    }
}

pub struct EspUartRx {
    port: uart_port_t,
}

impl UartRx for EspUartRx {
    fn read(&mut self, buf: &mut [u8], timeout: Option<Duration>) -> Result<usize, UartError> {
        if buf.is_empty() {
            return Ok(0);
        }
        // SAFETY: `buf` is valid for writes of `buf.len()` bytes.
        let n = unsafe {
            uart_read_bytes(self.port, buf.as_mut_ptr().cast(), buf.len() as u32, to_ticks(timeout))
        };
        if n < 0 {
            return Err(UartError::Driver(n));
        }
        Ok(n as usize)
    }
}

// ── Line control ─────────────────────────────────────────────

pub struct EspUartControl {
    port: uart_port_t,
    installed: bool,
}

impl UartControl for EspUartControl {
    fn configure(&mut self, settings: &LineSettings) -> Result<(), UartError> {
        let flow_ctrl = if settings.hardware_flow_control {
            uart_hw_flowcontrol_t_UART_HW_FLOWCTRL_CTS_RTS
        } else {
            uart_hw_flowcontrol_t_UART_HW_FLOWCTRL_DISABLE
        };
        let cfg = uart_config_t {
            baud_rate: settings.baud_rate as i32,
            data_bits: uart_word_length_t_UART_DATA_8_BITS,
            parity: uart_parity_t_UART_PARITY_DISABLE,
            stop_bits: uart_stop_bits_t_UART_STOP_BITS_1,
            flow_ctrl,
            rx_flow_ctrl_thresh: 64,
            ..Default::default()
        };
        let (rts, cts) = if settings.hardware_flow_control {
            (pins::BT_UART_RTS_GPIO, pins::BT_UART_CTS_GPIO)
        } else {
            (UART_PIN_NO_CHANGE, UART_PIN_NO_CHANGE)
        };
        let rx_buffer = settings.rx_ring_buffer.unwrap_or(MIN_DRIVER_RX_BUFFER).max(MIN_DRIVER_RX_BUFFER);

        // SAFETY: called once from the main context during `open()`, before
        // either worker touches the port.
        unsafe {
            esp_check(uart_param_config(self.port, &cfg))?;
            esp_check(uart_set_pin(
                self.port,
                pins::BT_UART_TX_GPIO,
                pins::BT_UART_RX_GPIO,
                rts,
                cts,
            ))?;
            if !self.installed {
                esp_check(uart_driver_install(
                    self.port,
                    rx_buffer as i32,
                    0,
                    0,
                    core::ptr::null_mut(),
                    0,
                ))?;
                self.installed = true;
            }
        }
        info!(
            "esp32: UART{} configured, {} baud, hw flow {}, rx buffer {}",
            self.port, settings.baud_rate, settings.hardware_flow_control, rx_buffer
        );
        Ok(())
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<bool, UartError> {
        // SAFETY: the port is installed; changing the divider is safe while
        // the driver is running.
        esp_check(unsafe { uart_set_baudrate(self.port, baud_rate) })?;
        Ok(true)
    }
}

// ── RTS / CTS GPIOs ──────────────────────────────────────────

/// Raw `esp_err_t` from a GPIO call.
#[derive(Debug, Clone, Copy)]
pub struct GpioFault(pub esp_err_t);

impl digital::Error for GpioFault {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

pub struct GpioOutput(i32);

impl ErrorType for GpioOutput {
    type Error = GpioFault;
}

impl OutputPin for GpioOutput {
    fn set_low(&mut self) -> Result<(), GpioFault> {
        // SAFETY: pin configured as output in `Esp32Board::new`.
        let ret = unsafe { gpio_set_level(self.0, 0) };
        if ret == ESP_OK as i32 { Ok(()) } else { Err(GpioFault(ret)) }
    }

    fn set_high(&mut self) -> Result<(), GpioFault> {
        // SAFETY: pin configured as output in `Esp32Board::new`.
        let ret = unsafe { gpio_set_level(self.0, 1) };
        if ret == ESP_OK as i32 { Ok(()) } else { Err(GpioFault(ret)) }
    }
}

pub struct GpioInput(i32);

impl ErrorType for GpioInput {
    type Error = GpioFault;
}

impl InputPin for GpioInput {
    fn is_high(&mut self) -> Result<bool, GpioFault> {
        // SAFETY: reading a configured input has no side effects.
        Ok(unsafe { gpio_get_level(self.0) } != 0)
    }

    fn is_low(&mut self) -> Result<bool, GpioFault> {
        self.is_high().map(|high| !high)
    }
}

// ── Board ────────────────────────────────────────────────────

/// The reference board: controller on UART1 with GPIO flow control.
pub struct Esp32Board {
    manual_rts_cts: bool,
}

impl Esp32Board {
    /// Configure the flow-control GPIOs and power the controller up.
    pub fn new() -> Result<Self, Error> {
        let out_mask = (1u64 << pins::BT_UART_RTS_GPIO) | (1u64 << pins::BT_REG_ON_GPIO);
        let outputs = gpio_config_t {
            pin_bit_mask: out_mask,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let inputs = gpio_config_t {
            pin_bit_mask: 1u64 << pins::BT_UART_CTS_GPIO,
            mode: gpio_mode_t_GPIO_MODE_INPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        // SAFETY: called once from main() before the transport exists.
        unsafe {
            esp_check(gpio_config(&outputs))?;
            esp_check(gpio_config(&inputs))?;
            esp_check(gpio_set_level(pins::BT_REG_ON_GPIO, 1))?;
        }
        info!("esp32: controller powered, flow-control GPIOs configured");
        Ok(Self {
            manual_rts_cts: pins::BT_MANUAL_RTS_CTS,
        })
    }
}

impl Board for Esp32Board {
    type Tx = EspUartTx;
    type Rx = EspUartRx;
    type Control = EspUartControl;
    type Rts = GpioOutput;
    type Cts = GpioInput;

    fn manual_rts_cts(&self) -> bool {
        self.manual_rts_cts
    }

    fn into_parts(self) -> BoardParts<Self> {
        let port = pins::BT_UART_PORT;
        BoardParts {
            tx: EspUartTx { port },
            rx: EspUartRx { port },
            control: EspUartControl {
                port,
                installed: false,
            },
            rts: Some(GpioOutput(pins::BT_UART_RTS_GPIO)),
            cts: Some(GpioInput(pins::BT_UART_CTS_GPIO)),
        }
    }
}
