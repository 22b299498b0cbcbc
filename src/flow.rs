//! RTS/CTS flow-control policy and the manual handshake helpers.
//!
//! | Mode               | RTS at open      | CTS                | Per-transfer work            |
//! |--------------------|------------------|--------------------|------------------------------|
//! | `None`             | output, LOW      | ignored            | nothing                      |
//! | `HardwareAssisted` | peripheral-owned | peripheral-owned   | nothing                      |
//! | `Manual`           | output, HIGH     | input              | TX waits for CTS LOW, RX     |
//! |                    |                  |                    | drops RTS around each read   |
//!
//! Both lines are active-low: LOW means "ready to receive".

use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use std::sync::Arc;

use embedded_hal::digital::{InputPin, OutputPin};
use log::warn;

use crate::error::{Direction, Error, Result};

/// Active flow-control strategy. Decided once by `initialize()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControlMode {
    None,
    HardwareAssisted,
    Manual,
}

impl FlowControlMode {
    /// Pick the mode from the requested configuration and the board wiring.
    pub const fn decide(requested: bool, manual_rts_cts: bool) -> Self {
        match (requested, manual_rts_cts) {
            (false, _) => Self::None,
            (true, true) => Self::Manual,
            (true, false) => Self::HardwareAssisted,
        }
    }

    pub const fn is_manual(self) -> bool {
        matches!(self, Self::Manual)
    }
}

// ── Cancellation ─────────────────────────────────────────────

/// Shared flag that aborts pending flow-control waits.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Poll `ready` every `interval` until it returns true.
///
/// Returns `Err(Error::Cancelled)` if `cancel` fires first. A target with an
/// edge interrupt on CTS can replace the polling without changing callers.
pub fn wait_until(
    cancel: &CancelToken,
    interval: Duration,
    mut ready: impl FnMut() -> bool,
) -> Result<()> {
    loop {
        if ready() {
            return Ok(());
        }
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        std::thread::sleep(interval);
    }
}

/// Block until the controller pulls CTS low.
///
/// A pin that cannot be read is treated as asserted so a broken input
/// degrades to "no flow control" instead of stalling the TX worker forever.
pub fn wait_clear_to_send<P: InputPin>(
    cts: &mut P,
    cancel: &CancelToken,
    interval: Duration,
) -> Result<()> {
    wait_until(cancel, interval, || match cts.is_low() {
        Ok(low) => low,
        Err(_) => {
            warn!("flow: CTS read failed, assuming clear");
            true
        }
    })
}

/// Drive RTS low: host ready to receive.
pub fn assert_rts<P: OutputPin>(rts: &mut P) -> Result<()> {
    rts.set_low().map_err(|_| Error::Gpio(Direction::Rx))
}

/// Drive RTS high: host not receiving.
pub fn deassert_rts<P: OutputPin>(rts: &mut P) -> Result<()> {
    rts.set_high().map_err(|_| Error::Gpio(Direction::Rx))
}
