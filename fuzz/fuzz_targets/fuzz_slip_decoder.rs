//! Fuzz target: `SlipDecoder::process`
//!
//! Drives arbitrary byte sequences into the streaming SLIP decoder with a
//! receive buffer whose size comes from the first input byte, and checks
//! that it never panics and never reports a frame larger than the buffer.
//! Any completed frame must re-encode to a wire form that decodes back to
//! the same bytes.
//!
//! cargo fuzz run fuzz_slip_decoder

#![no_main]

use btuart::slip::{SlipDecoder, SlipEncoder};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&cap, wire)) = data.split_first() else {
        return;
    };
    let mut buf = vec![0u8; usize::from(cap) + 1];
    let capacity = buf.len();

    let mut decoder = SlipDecoder::new(&mut buf);
    for &b in wire {
        decoder.process(b);
    }
    let size = decoder.frame_size();
    assert!(size <= capacity, "frame exceeds receive buffer");
    if size == 0 {
        return;
    }

    let frame = decoder.into_buffer()[..size].to_vec();
    let mut encoder = SlipEncoder::new(&frame);
    let mut again = vec![0u8; capacity];
    let mut redecoder = SlipDecoder::new(&mut again);
    while encoder.has_data() {
        redecoder.process(encoder.next_byte());
    }
    assert_eq!(redecoder.frame_size(), size);
    assert_eq!(&redecoder.into_buffer()[..size], &frame[..]);
});
