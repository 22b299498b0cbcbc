//! SLIP receive accumulation buffer.
//!
//! Bytes read from the UART land here before the decoder sees them. A read
//! can return more than one frame's worth of bytes; whatever follows the end
//! of a frame stays buffered and is offered to the decoder first on the next
//! `receive_frame`, so a back-to-back frame is delivered without another read.
//!
//! Invariant: `pos <= len <= SLIP_RECEIVE_BUFFER_SIZE`.

use core::time::Duration;

use crate::config::SLIP_RECEIVE_BUFFER_SIZE;
use crate::error::UartError;
use crate::ports::UartRx;
use crate::slip::SlipDecoder;

pub(crate) struct SlipReceiveState {
    buf: [u8; SLIP_RECEIVE_BUFFER_SIZE],
    /// Next byte to hand to the decoder.
    pos: usize,
    /// Valid bytes in `buf`.
    len: usize,
}

impl SlipReceiveState {
    pub const fn new() -> Self {
        Self {
            buf: [0; SLIP_RECEIVE_BUFFER_SIZE],
            pos: 0,
            len: 0,
        }
    }

    /// Bytes read earlier that the decoder has not consumed yet.
    pub fn has_pending(&self) -> bool {
        self.pos < self.len
    }

    /// Feed buffered bytes into `decoder`, stopping right after a frame
    /// completes. Returns the decoded size, 0 if the buffer ran dry first.
    pub fn process(&mut self, decoder: &mut SlipDecoder<'_>) -> usize {
        let mut size = 0;
        while self.pos < self.len && size == 0 {
            decoder.process(self.buf[self.pos]);
            self.pos += 1;
            size = decoder.frame_size();
        }
        size
    }

    /// Move unconsumed bytes into `out` for a raw block read that follows a
    /// frame. Returns how many were moved.
    pub fn take_pending(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.len - self.pos);
        out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        n
    }

    /// Refill from the UART: one blocking byte, then whatever the driver has
    /// already buffered, up to capacity. Only called once fully drained.
    pub fn fill<R: UartRx>(&mut self, uart: &mut R) -> Result<usize, UartError> {
        if self.pos == self.len {
            self.pos = 0;
            self.len = 0;
        }
        if self.len == self.buf.len() {
            return Ok(0);
        }

        let first = uart.read(&mut self.buf[self.len..=self.len], None)?;
        self.len += first;

        let mut more = 0;
        if self.len < self.buf.len() {
            more = uart.read(&mut self.buf[self.len..], Some(Duration::ZERO))?;
            self.len += more;
        }
        Ok(first + more)
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        self.len - self.pos
    }
}
