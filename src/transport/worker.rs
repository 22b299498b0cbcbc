//! TX and RX worker threads.
//!
//! Each worker blocks on its single-slot job channel, performs the transfer
//! with blocking UART calls, and posts exactly one completion per job.
//!
//! ```text
//!  TX worker                          RX worker
//!  ─────────                          ─────────
//!  job = receive()                    job = receive()
//!  [manual] wait CTS low              [manual] RTS ← low
//!  write_all(block | chunks)          read until block full | frame done
//!  post BlockSent | FrameSent         [manual] RTS ← high
//!                                     post BlockReceived | FrameReceived
//! ```
//!
//! The CTS pin lives on the TX worker and the RTS pin on the RX worker; each
//! is `Some` only when the manual handshake is active.

use std::sync::Arc;

use embedded_hal::digital::{InputPin, OutputPin};
use futures_lite::future::block_on;
use log::{debug, warn};

use super::channels::{Completion, CompletionChannel, JobChannel, RxJob, TxJob};
#[cfg(feature = "h5")]
use super::channels::FrameRx;
use super::dispatch::{Received, Sent};
#[cfg(feature = "h5")]
use crate::config::SLIP_TX_CHUNK_LEN;
use crate::config::CTS_POLL_INTERVAL;
use crate::error::Result;
use crate::flow::{self, CancelToken};
use crate::ports::{UartRx, UartTx};
#[cfg(feature = "h5")]
use crate::slip::SlipEncoder;

// ── TX ───────────────────────────────────────────────────────

pub(crate) struct TxWorker<T, C> {
    pub uart: T,
    /// Controller CTS, polled before each block in manual mode.
    pub cts: Option<C>,
    pub jobs: Arc<JobChannel<TxJob>>,
    pub completions: Arc<CompletionChannel>,
    pub cancel: CancelToken,
}

impl<T: UartTx, C: InputPin> TxWorker<T, C> {
    pub fn run(mut self) {
        #[cfg(feature = "h5")]
        let mut chunk = [0u8; SLIP_TX_CHUNK_LEN];

        loop {
            let completion = match block_on(self.jobs.receive()) {
                TxJob::Block(buffer) => {
                    let status = self.send_block(buffer);
                    Completion::BlockSent(Sent { buffer, status })
                }
                #[cfg(feature = "h5")]
                TxJob::Frame(mut encoder) => {
                    let status = self.send_frame(&mut encoder, &mut chunk);
                    Completion::FrameSent(Sent {
                        buffer: encoder.frame(),
                        status,
                    })
                }
            };
            block_on(self.completions.send(completion));
        }
    }

    fn send_block(&mut self, data: &[u8]) -> Result<()> {
        if let Some(cts) = self.cts.as_mut() {
            flow::wait_clear_to_send(cts, &self.cancel, CTS_POLL_INTERVAL)?;
        }
        self.uart.write_all(data).map_err(|e| {
            warn!("uart: block transmit failed: {}", e);
            e.into()
        })
    }

    /// Transmit the encoded frame in chunks of at most `chunk.len()` bytes.
    #[cfg(feature = "h5")]
    fn send_frame(&mut self, encoder: &mut SlipEncoder<'_>, chunk: &mut [u8]) -> Result<()> {
        while encoder.has_data() {
            let n = encoder.fill(chunk);
            if let Err(e) = self.uart.write_all(&chunk[..n]) {
                warn!("uart: frame transmit failed: {}", e);
                return Err(e.into());
            }
        }
        Ok(())
    }
}

// ── RX ───────────────────────────────────────────────────────

pub(crate) struct RxWorker<R, P> {
    pub uart: R,
    /// Host RTS, lowered around each read in manual mode.
    pub rts: Option<P>,
    pub jobs: Arc<JobChannel<RxJob>>,
    pub completions: Arc<CompletionChannel>,
}

impl<R: UartRx, P: OutputPin> RxWorker<R, P> {
    pub fn run(mut self) {
        loop {
            let completion = match block_on(self.jobs.receive()) {
                RxJob::Block { buffer, filled } => {
                    let status = self.with_rts(|uart| read_exact(uart, &mut buffer[filled..]));
                    let len = if status.is_ok() { buffer.len() } else { 0 };
                    Completion::BlockReceived(Received {
                        buffer,
                        len,
                        status,
                    })
                }
                #[cfg(feature = "h5")]
                RxJob::Frame(frame) => self.receive_frame(frame),
            };
            block_on(self.completions.send(completion));
        }
    }

    #[cfg(feature = "h5")]
    fn receive_frame(&mut self, mut frame: FrameRx) -> Completion {
        let result = self.with_rts(|uart| {
            loop {
                frame.state.fill(uart)?;
                let size = frame.state.process(&mut frame.decoder);
                if size != 0 {
                    return Ok(size);
                }
            }
        });

        let FrameRx { decoder, state } = frame;
        let (len, status) = match result {
            Ok(size) => {
                debug!("uart: frame decoded, {} bytes", size);
                (size, Ok(()))
            }
            Err(e) => (0, Err(e)),
        };
        Completion::FrameReceived {
            received: Received {
                buffer: decoder.into_buffer(),
                len,
                status,
            },
            state,
        }
    }

    /// Run `read` with RTS asserted. RTS is raised again whatever the read
    /// returned.
    fn with_rts<U>(&mut self, read: impl FnOnce(&mut R) -> Result<U>) -> Result<U> {
        if let Some(rts) = self.rts.as_mut() {
            flow::assert_rts(rts)?;
        }

        let result = read(&mut self.uart);

        if let Some(rts) = self.rts.as_mut() {
            if let Err(e) = flow::deassert_rts(rts) {
                warn!("uart: failed to raise RTS after read");
                return result.and(Err(e));
            }
        }
        result
    }
}

/// Block until `buf` is completely filled.
fn read_exact<R: UartRx>(uart: &mut R, buf: &mut [u8]) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match uart.read(&mut buf[filled..], None) {
            Ok(n) => filled += n,
            Err(e) => {
                warn!("uart: block receive failed after {} bytes: {}", filled, e);
                return Err(e.into());
            }
        }
    }
    Ok(())
}
