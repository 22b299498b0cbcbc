//! Inter-context channels of the transport.
//!
//! Uses `embassy-sync` bounded channels to hand work from the main context to
//! the two worker threads and to carry completions back. Each worker has a
//! single-slot job queue; the completion channel only ever holds one entry
//! per direction.
//!
//! ```text
//! ┌──────────────┐  TxJob (1)  ┌──────────────┐
//! │              │────────────▶│  TX worker   │──┐
//! │ Main context │  RxJob (1)  ┌──────────────┐  │ Completion (2)
//! │              │────────────▶│  RX worker   │──┤
//! │              │◀────────────────────────────────┘
//! └──────────────┘
//! ```
//!
//! Buffers are lent, not copied: a job carries the caller's `'static` slice
//! and the matching completion hands it back.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

#[cfg(feature = "h5")]
use super::rx_state::SlipReceiveState;
use super::dispatch::{Received, Sent};
#[cfg(feature = "h5")]
use crate::slip::{SlipDecoder, SlipEncoder};

/// Completion channel depth: one in-flight transfer per direction.
pub(crate) const COMPLETION_DEPTH: usize = 2;

/// Single-slot work queue of a worker thread.
pub(crate) type JobChannel<T> = Channel<CriticalSectionRawMutex, T, 1>;

/// Worker → main context notifications.
pub(crate) type CompletionChannel = Channel<CriticalSectionRawMutex, Completion, COMPLETION_DEPTH>;

/// Work for the TX thread.
pub(crate) enum TxJob {
    Block(&'static [u8]),
    #[cfg(feature = "h5")]
    Frame(SlipEncoder<'static>),
}

/// Frame receive in progress: the decoder over the caller's buffer plus the
/// accumulation state it is fed from.
#[cfg(feature = "h5")]
pub(crate) struct FrameRx {
    pub decoder: SlipDecoder<'static>,
    pub state: SlipReceiveState,
}

/// Work for the RX thread.
pub(crate) enum RxJob {
    /// The first `filled` bytes were already served from bytes buffered
    /// behind the last frame.
    Block {
        buffer: &'static mut [u8],
        filled: usize,
    },
    #[cfg(feature = "h5")]
    Frame(FrameRx),
}

/// A finished transfer, posted by a worker for the main context.
pub(crate) enum Completion {
    BlockSent(Sent),
    BlockReceived(Received),
    #[cfg(feature = "h5")]
    FrameSent(Sent),
    /// Carries the accumulation state back to the main context together with
    /// the decoded frame.
    #[cfg(feature = "h5")]
    FrameReceived {
        received: Received,
        state: SlipReceiveState,
    },
}
