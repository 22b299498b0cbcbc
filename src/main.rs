//! HCI UART bring-up check.
//!
//! Opens the controller link in H4 mode, sends HCI_Reset, then listens for
//! event packets: a three-byte header followed by as many parameter bytes as
//! the header announces. The Command Complete for the reset is logged when it
//! arrives.
//!
//! ```text
//! host ── 01 03 0C 00 ───────────────────────▶ controller
//! host ◀── 04 0E 04 01 03 0C 00 ───────────── controller
//! ```

use std::cell::Cell;
use std::rc::Rc;

use anyhow::{Context, Result};
use log::{info, warn};

use btuart::adapters::esp32::Esp32Board;
use btuart::{Received, UartConfig, UartTransport, Variant};

/// H4 packet indicator + HCI_Reset (OGF 0x03, OCF 0x0003), no parameters.
static HCI_RESET: [u8; 4] = [0x01, 0x03, 0x0C, 0x00];

/// H4 event header: indicator, event code, parameter length.
const EVENT_HEADER_LEN: usize = 3;

const EVT_COMMAND_COMPLETE: u8 = 0x0E;

/// Parameter buffers, one per length, leaked on first use and reused after.
struct ParamPool(Vec<Option<&'static mut [u8]>>);

impl ParamPool {
    fn new() -> Self {
        Self((0..=u8::MAX as usize).map(|_| None).collect())
    }

    fn take(&mut self, len: usize) -> &'static mut [u8] {
        self.0[len]
            .take()
            .unwrap_or_else(|| Box::leak(vec![0u8; len].into_boxed_slice()))
    }

    fn put(&mut self, buffer: &'static mut [u8]) {
        let len = buffer.len();
        self.0[len] = Some(buffer);
    }
}

fn log_event(code: u8, params: &[u8]) {
    match (code, params) {
        (EVT_COMMAND_COMPLETE, [_, 0x03, 0x0C, status, ..]) => {
            info!("HCI_Reset complete, status 0x{:02x}", status)
        }
        _ => info!("event 0x{:02x}: {:02x?}", code, params),
    }
}

fn main() -> Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("btuart v{}", env!("CARGO_PKG_VERSION"));

    let board = Esp32Board::new().context("board bring-up")?;
    let mut uart = UartTransport::new(board, Variant::RawBlock);
    uart.initialize(UartConfig::new(115_200, true))?;
    uart.open()?;
    info!("flow control: {:?}", uart.flow_control_mode());

    // The receive hook hands each completed read back here to be re-armed.
    let returned: Rc<Cell<Option<Received>>> = Rc::new(Cell::new(None));

    uart.set_block_sent(|sent| {
        if let Err(e) = sent.status {
            warn!("HCI_Reset transmit failed: {}", e);
        }
    });
    let slot = returned.clone();
    uart.set_block_received(move |rx| slot.set(Some(rx)));

    // `header` is None while the header buffer is lent to the transport.
    let mut header: Option<&'static mut [u8]> = None;
    let mut params = ParamPool::new();
    let mut event_code = 0u8;

    uart.receive_block(Box::leak(Box::new([0u8; EVENT_HEADER_LEN])))?;
    uart.send_block(&HCI_RESET)?;

    loop {
        uart.wait_for_completion()?;
        let Some(rx) = returned.take() else {
            continue;
        };

        let mut param_len = 0;
        if header.is_none() {
            match &rx.status {
                Ok(()) => match rx.data() {
                    [0x04, code, 0] => log_event(*code, &[]),
                    [0x04, code, len] => {
                        event_code = *code;
                        param_len = usize::from(*len);
                    }
                    other => warn!("not an event packet: {:02x?}", other),
                },
                Err(e) => warn!("header read failed: {}", e),
            }
            header = Some(rx.buffer);
        } else {
            match &rx.status {
                Ok(()) => log_event(event_code, rx.data()),
                Err(e) => warn!("parameter read failed: {}", e),
            }
            params.put(rx.buffer);
        }

        if param_len == 0 {
            let buffer = header.take().context("header buffer missing")?;
            uart.receive_block(buffer)?;
        } else {
            uart.receive_block(params.take(param_len))?;
        }
    }
}
