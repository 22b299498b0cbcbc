//! Completion hooks and their dispatch on the main context.
//!
//! Workers never call a hook. They post a [`Completion`] and the main
//! context, inside `UartTransport::dispatch_pending` or
//! `wait_for_completion`, runs the registered handler. The host stack can
//! therefore consume completions without locking.

use log::debug;

use crate::error::Result;

/// A finished transmit: the lent buffer comes back with the outcome.
#[derive(Debug)]
pub struct Sent {
    pub buffer: &'static [u8],
    pub status: Result<()>,
}

/// A finished receive.
///
/// For blocks `len == buffer.len()`; for frames `len` is the decoded frame
/// size. On failure `len` is 0.
#[derive(Debug)]
pub struct Received {
    pub buffer: &'static mut [u8],
    pub len: usize,
    pub status: Result<()>,
}

impl Received {
    /// The bytes that were actually received.
    pub fn data(&self) -> &[u8] {
        &self.buffer[..self.len]
    }
}

type SentHook = Box<dyn FnMut(Sent)>;
type ReceivedHook = Box<dyn FnMut(Received)>;

/// Registered completion handlers. Each slot holds at most one handler;
/// setting a slot replaces the previous one.
#[derive(Default)]
pub(crate) struct Hooks {
    pub block_sent: Option<SentHook>,
    pub block_received: Option<ReceivedHook>,
    #[cfg(feature = "h5")]
    pub frame_sent: Option<SentHook>,
    #[cfg(feature = "h5")]
    pub frame_received: Option<ReceivedHook>,
}

impl Hooks {
    pub fn block_sent(&mut self, sent: Sent) {
        match self.block_sent.as_mut() {
            Some(hook) => hook(sent),
            None => debug!("uart: block sent ({} bytes), no hook", sent.buffer.len()),
        }
    }

    pub fn block_received(&mut self, received: Received) {
        match self.block_received.as_mut() {
            Some(hook) => hook(received),
            None => debug!("uart: block received ({} bytes), no hook", received.len),
        }
    }

    #[cfg(feature = "h5")]
    pub fn frame_sent(&mut self, sent: Sent) {
        match self.frame_sent.as_mut() {
            Some(hook) => hook(sent),
            None => debug!("uart: frame sent ({} bytes), no hook", sent.buffer.len()),
        }
    }

    #[cfg(feature = "h5")]
    pub fn frame_received(&mut self, received: Received) {
        match self.frame_received.as_mut() {
            Some(hook) => hook(received),
            None => debug!("uart: frame received ({} bytes), no hook", received.len),
        }
    }
}
