//! Port traits: the boundary between the transfer engine and the board.
//!
//! ```text
//!   Board adapter ──▶ Port traits ──▶ UartTransport (engine)
//! ```
//!
//! The engine never touches a peripheral directly. A [`Board`] hands over the
//! UART halves, the line control interface and the optional RTS/CTS pins once,
//! at `open()`. The TX half and the CTS pin then move to the TX worker, the RX
//! half and the RTS pin to the RX worker.
//!
//! RTS/CTS pins use the `embedded-hal` digital traits so any HAL pin driver
//! plugs in unchanged.

use core::time::Duration;

use embedded_hal::digital::{InputPin, OutputPin};

use crate::error::UartError;

// ───────────────────────────────────────────────────────────────
// UART halves (driven adapters: engine → peripheral)
// ───────────────────────────────────────────────────────────────

/// Transmit half of the UART.
pub trait UartTx: Send + 'static {
    /// Blocking transmit of every byte in `data`.
    fn write_all(&mut self, data: &[u8]) -> Result<(), UartError>;
}

/// Receive half of the UART.
pub trait UartRx: Send + 'static {
    /// Read into `buf`, returning the number of bytes stored.
    ///
    /// With `timeout == None` the call blocks until at least one byte has
    /// arrived and may return before `buf` is full; block reads loop until
    /// satisfied. With a timeout it returns whatever arrived before the
    /// deadline, possibly 0.
    fn read(&mut self, buf: &mut [u8], timeout: Option<Duration>) -> Result<usize, UartError>;
}

// ───────────────────────────────────────────────────────────────
// Line control (stays on the main context)
// ───────────────────────────────────────────────────────────────

/// Static line parameters applied when the transport opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSettings {
    pub baud_rate: u32,
    /// Let the peripheral drive RTS/CTS itself.
    pub hardware_flow_control: bool,
    /// Size of the driver-side receive ring buffer, if one is wanted.
    pub rx_ring_buffer: Option<usize>,
}

/// Peripheral configuration interface.
pub trait UartControl {
    /// Apply 8N1 framing with the given rate and flow-control setting.
    fn configure(&mut self, settings: &LineSettings) -> Result<(), UartError>;

    /// Reprogram the baud rate on a running link.
    ///
    /// Returns `Ok(false)` when the platform cannot change the rate at runtime.
    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<bool, UartError>;
}

// ───────────────────────────────────────────────────────────────
// Board
// ───────────────────────────────────────────────────────────────

/// Everything the transport takes ownership of at `open()`.
pub struct BoardParts<B: Board + ?Sized> {
    pub tx: B::Tx,
    pub rx: B::Rx,
    pub control: B::Control,
    /// Host RTS output, if wired.
    pub rts: Option<B::Rts>,
    /// Controller CTS input, if wired.
    pub cts: Option<B::Cts>,
}

/// A board that connects a Bluetooth controller over UART.
pub trait Board {
    type Tx: UartTx;
    type Rx: UartRx;
    type Control: UartControl;
    type Rts: OutputPin + Send + 'static;
    type Cts: InputPin + Send + 'static;

    /// The controller's RTS/CTS lines are on plain GPIOs, not on the UART's
    /// automatic flow-control inputs, so they must be toggled in software.
    fn manual_rts_cts(&self) -> bool;

    /// Split the board into the pieces the engine distributes.
    fn into_parts(self) -> BoardParts<Self>;
}
