//! Transport configuration.
//!
//! `UartConfig` is what the host stack hands to `initialize()`. The constants
//! below size the static buffers and set the worker/flow-control timing; they
//! are compile-time so a missing capacity is a build error, not a runtime one.

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Maximum size of one encoded SLIP chunk handed to the UART.
pub const SLIP_TX_CHUNK_LEN: usize = 128;

/// Capacity of the SLIP receive accumulation buffer.
pub const SLIP_RECEIVE_BUFFER_SIZE: usize = 128;

/// Driver-side RX ring buffer used whenever the peripheral does not do
/// RTS/CTS itself. Lets the controller overrun a stopped reader by up to
/// half of it.
pub const RX_RING_BUFFER_SIZE: usize = 512;

/// CTS poll period while waiting for the controller in manual mode.
pub const CTS_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Settle time after a baud-rate change when there is no flow control.
pub const BAUD_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Worker thread priority. Above the network stack so RTS is serviced
/// promptly.
pub const WORKER_PRIORITY: u8 = 20;

/// Worker thread stack size.
pub const WORKER_STACK_KB: usize = 4;

// Static buffer sizing checks.
const _: () = assert!(SLIP_TX_CHUNK_LEN > 0);
const _: () = assert!(SLIP_RECEIVE_BUFFER_SIZE > 0);

/// UART line configuration requested by the host stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UartConfig {
    /// Initial baud rate.
    pub baud_rate: u32,
    /// Whether RTS/CTS flow control is wanted.
    pub flow_control: bool,
}

impl Default for UartConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            flow_control: true,
        }
    }
}

impl UartConfig {
    pub fn new(baud_rate: u32, flow_control: bool) -> Self {
        Self {
            baud_rate,
            flow_control,
        }
    }

    /// Reject settings no peripheral can satisfy.
    pub fn validate(&self) -> Result<()> {
        if self.baud_rate == 0 {
            return Err(Error::Init("baud rate must be non-zero"));
        }
        Ok(())
    }
}
