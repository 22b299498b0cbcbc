//! SLIP byte-stuffing for the three-wire (H5) transport.
//!
//! Wire format:
//! ```text
//! ┌──────┬────────────────────────────────────┬──────┐
//! │ 0xC0 │ payload, 0xC0 → DB DC, 0xDB → DB DD │ 0xC0 │
//! └──────┴────────────────────────────────────┴──────┘
//! ```
//!
//! Both halves are incremental so neither needs a buffer of its own: the
//! encoder yields one wire byte at a time from the caller's frame, and the
//! decoder writes payload bytes straight into the caller's receive buffer.

use log::{debug, warn};

/// Frame delimiter.
pub const SLIP_END: u8 = 0xC0;
/// Escape introducer.
pub const SLIP_ESC: u8 = 0xDB;
/// Escaped `SLIP_END`.
pub const SLIP_ESC_END: u8 = 0xDC;
/// Escaped `SLIP_ESC`.
pub const SLIP_ESC_ESC: u8 = 0xDD;

/// Worst-case encoded length of a `len`-byte payload.
pub const fn max_encoded_len(len: usize) -> usize {
    2 * len + 2
}

// ── Encoder ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EncoderState {
    Start,
    Payload,
    /// Second byte of an escape sequence is pending.
    Escaped(u8),
    End,
    Done,
}

/// Streaming SLIP encoder over a borrowed frame.
#[derive(Debug)]
pub struct SlipEncoder<'a> {
    frame: &'a [u8],
    pos: usize,
    state: EncoderState,
}

impl<'a> SlipEncoder<'a> {
    /// Prepare to encode `frame`.
    pub fn new(frame: &'a [u8]) -> Self {
        Self {
            frame,
            pos: 0,
            state: EncoderState::Start,
        }
    }

    /// The frame being encoded.
    pub fn frame(&self) -> &'a [u8] {
        self.frame
    }

    pub fn has_data(&self) -> bool {
        self.state != EncoderState::Done
    }

    /// Next wire byte. Returns `SLIP_END` after the frame is exhausted;
    /// callers check `has_data` first.
    pub fn next_byte(&mut self) -> u8 {
        match self.state {
            EncoderState::Start => {
                self.state = self.after_payload_byte();
                SLIP_END
            }
            EncoderState::Payload => {
                let byte = self.frame[self.pos];
                self.pos += 1;
                match byte {
                    SLIP_END => {
                        self.state = EncoderState::Escaped(SLIP_ESC_END);
                        SLIP_ESC
                    }
                    SLIP_ESC => {
                        self.state = EncoderState::Escaped(SLIP_ESC_ESC);
                        SLIP_ESC
                    }
                    other => {
                        self.state = self.after_payload_byte();
                        other
                    }
                }
            }
            EncoderState::Escaped(second) => {
                self.state = self.after_payload_byte();
                second
            }
            EncoderState::End | EncoderState::Done => {
                self.state = EncoderState::Done;
                SLIP_END
            }
        }
    }

    /// Fill `out` with as many wire bytes as fit. Returns the count written.
    pub fn fill(&mut self, out: &mut [u8]) -> usize {
        let mut n = 0;
        while self.has_data() && n < out.len() {
            out[n] = self.next_byte();
            n += 1;
        }
        n
    }

    fn after_payload_byte(&self) -> EncoderState {
        if self.pos < self.frame.len() {
            EncoderState::Payload
        } else {
            EncoderState::End
        }
    }
}

// ── Decoder ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    /// Hunting for a frame delimiter.
    Unknown,
    /// Delimiter seen, no payload yet.
    Delimited,
    /// Inside a frame.
    Active,
    /// Escape byte seen, waiting for its partner.
    Escape,
    /// A full frame sits in the buffer.
    Complete,
}

/// Streaming SLIP decoder writing into a borrowed buffer.
#[derive(Debug)]
pub struct SlipDecoder<'a> {
    buf: &'a mut [u8],
    len: usize,
    state: DecoderState,
}

impl<'a> SlipDecoder<'a> {
    /// Decode the next frame into `buf`. Frames longer than `buf` are dropped.
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self {
            buf,
            len: 0,
            state: DecoderState::Unknown,
        }
    }

    /// Feed one wire byte.
    pub fn process(&mut self, byte: u8) {
        match self.state {
            DecoderState::Unknown => {
                if byte == SLIP_END {
                    self.reset();
                    self.state = DecoderState::Delimited;
                }
            }
            DecoderState::Complete => {
                debug!("slip: byte after complete frame ignored");
            }
            DecoderState::Delimited => match byte {
                SLIP_END => {}
                SLIP_ESC => self.state = DecoderState::Escape,
                other => {
                    self.store(other);
                    if self.state == DecoderState::Delimited {
                        self.state = DecoderState::Active;
                    }
                }
            },
            DecoderState::Escape => match byte {
                SLIP_ESC_END => {
                    self.state = DecoderState::Active;
                    self.store(SLIP_END);
                }
                SLIP_ESC_ESC => {
                    self.state = DecoderState::Active;
                    self.store(SLIP_ESC);
                }
                _ => {
                    warn!("slip: invalid escape 0x{:02x}, resyncing", byte);
                    self.reset();
                }
            },
            DecoderState::Active => match byte {
                SLIP_END => {
                    if self.len > 0 {
                        self.state = DecoderState::Complete;
                    } else {
                        self.reset();
                    }
                }
                SLIP_ESC => self.state = DecoderState::Escape,
                other => self.store(other),
            },
        }
    }

    /// Decoded size once a frame is complete, 0 before that.
    pub fn frame_size(&self) -> usize {
        match self.state {
            DecoderState::Complete => self.len,
            _ => 0,
        }
    }

    /// Give the receive buffer back.
    pub fn into_buffer(self) -> &'a mut [u8] {
        self.buf
    }

    fn store(&mut self, byte: u8) {
        if self.len >= self.buf.len() {
            warn!("slip: frame exceeds {} byte buffer, dropped", self.buf.len());
            self.reset();
            return;
        }
        self.buf[self.len] = byte;
        self.len += 1;
    }

    fn reset(&mut self) {
        self.len = 0;
        self.state = DecoderState::Unknown;
    }
}
