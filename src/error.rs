//! Unified error types for the UART transport.
//!
//! A single `Error` enum that every layer converts into. All variants are
//! `Copy` so they can travel inside completion messages from the worker
//! threads to the main context without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Transfer direction
// ---------------------------------------------------------------------------

/// Which half of the link a request or fault belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Tx,
    Rx,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tx => write!(f, "TX"),
            Self::Rx => write!(f, "RX"),
        }
    }
}

// ---------------------------------------------------------------------------
// Top-level transport error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A transfer was requested while the previous one in that direction
    /// has not been reported complete yet.
    Busy(Direction),
    /// `open()` was called before `initialize()`.
    NotInitialized,
    /// A transfer or line change was requested before `open()`.
    NotOpen,
    /// The operation is not available on this platform or transport variant.
    Unsupported(&'static str),
    /// The UART peripheral reported a fault.
    Uart(UartError),
    /// An RTS/CTS pin could not be read or driven.
    Gpio(Direction),
    /// Bring-up of the peripheral or a worker thread failed.
    Init(&'static str),
    /// A flow-control wait was abandoned because the transport went away.
    Cancelled,
    /// Waited for a completion with no transfer in flight.
    Idle,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy(dir) => write!(f, "{dir} transfer already in flight"),
            Self::NotInitialized => write!(f, "transport not initialized"),
            Self::NotOpen => write!(f, "transport not open"),
            Self::Unsupported(what) => write!(f, "{what} not implemented"),
            Self::Uart(e) => write!(f, "uart: {e}"),
            Self::Gpio(dir) => write!(f, "flow-control pin fault on {dir} side"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Cancelled => write!(f, "flow-control wait cancelled"),
            Self::Idle => write!(f, "no transfer in flight"),
        }
    }
}

// ---------------------------------------------------------------------------
// Peripheral errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UartError {
    /// Receive FIFO overflowed before the driver drained it.
    Overrun,
    /// Stop bit missing on a received character.
    Framing,
    /// Parity check failed on a received character.
    Parity,
    /// The driver rejected the request (bad handle, bad parameters).
    Driver(i32),
}

impl fmt::Display for UartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overrun => write!(f, "receive overrun"),
            Self::Framing => write!(f, "framing error"),
            Self::Parity => write!(f, "parity error"),
            Self::Driver(code) => write!(f, "driver error {code}"),
        }
    }
}

impl From<UartError> for Error {
    fn from(e: UartError) -> Self {
        Self::Uart(e)
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
