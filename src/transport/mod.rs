//! UART transport for an HCI host stack.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      UartTransport                          │
//! │                                                             │
//! │  send_block / send_frame ──▶ TX job ──▶ TX worker ──┐       │
//! │  receive_block / frame   ──▶ RX job ──▶ RX worker ──┤       │
//! │                                                     ▼       │
//! │  dispatch_pending / wait_for_completion ◀── completion chan │
//! │        │                                                    │
//! │        ▼                                                    │
//! │  hooks (main context only)                                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lifecycle: `Uninitialized → initialize() → Initialized → open() → Open`.
//! Repeating either step is a logged no-op and `close()` never tears anything
//! down. Every method is called from the main context; only the workers run
//! elsewhere.

mod channels;
mod dispatch;
#[cfg(feature = "h5")]
mod rx_state;
mod worker;

use std::sync::Arc;
use std::thread::JoinHandle;

use embassy_sync::channel::TrySendError;
use embedded_hal::digital::OutputPin;
use futures_lite::future::block_on;
use heapless::Vec;
use log::{debug, error, info, warn};

pub use dispatch::{Received, Sent};

use channels::{Completion, CompletionChannel, JobChannel, RxJob, TxJob};
#[cfg(feature = "h5")]
use channels::FrameRx;
use dispatch::Hooks;
#[cfg(feature = "h5")]
use rx_state::SlipReceiveState;
use worker::{RxWorker, TxWorker};

use crate::config::{
    BAUD_SETTLE_DELAY, RX_RING_BUFFER_SIZE, UartConfig, WORKER_PRIORITY, WORKER_STACK_KB,
};
use crate::error::{Direction, Error, Result};
use crate::flow::{CancelToken, FlowControlMode};
use crate::ports::{Board, BoardParts, LineSettings, UartControl};
#[cfg(feature = "h5")]
use crate::slip::{SlipDecoder, SlipEncoder};
use crate::thread::{Core, WorkerSpec, spawn_worker};

/// Transfer style the transport was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// H4: fixed-length blocks only.
    RawBlock,
    /// H5: SLIP frames, blocks still available.
    #[cfg(feature = "h5")]
    Framed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Uninitialized,
    Initialized,
    Open,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// Controller sleep handshakes. None are implemented on this transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepMode {
    Off,
    RtsHighWakeOnCtsPulse,
    RtsLowWakeOnRxEdge,
}

const TX_WORKER: WorkerSpec = WorkerSpec {
    name: "bt-uart-tx\0",
    core: Core::Pro,
    priority: WORKER_PRIORITY,
    stack_kb: WORKER_STACK_KB,
};

const RX_WORKER: WorkerSpec = WorkerSpec {
    name: "bt-uart-rx\0",
    core: Core::Pro,
    priority: WORKER_PRIORITY,
    stack_kb: WORKER_STACK_KB,
};

/// Resources that exist once the transport is open.
struct Link<B: Board> {
    control: B::Control,
    tx_jobs: Arc<JobChannel<TxJob>>,
    rx_jobs: Arc<JobChannel<RxJob>>,
    completions: Arc<CompletionChannel>,
    cancel: CancelToken,
    tx_busy: bool,
    rx_busy: bool,
    /// `None` while a frame receive owns it.
    #[cfg(feature = "h5")]
    slip_rx: Option<SlipReceiveState>,
    // Pins no worker needs are kept here so their configured level holds.
    _idle_rts: Option<B::Rts>,
    _idle_cts: Option<B::Cts>,
    _workers: [JoinHandle<()>; 2],
}

impl<B: Board> Link<B> {
    fn submit_tx(&mut self, job: TxJob) -> Result<()> {
        if self.tx_busy {
            return Err(Error::Busy(Direction::Tx));
        }
        match self.tx_jobs.try_send(job) {
            Ok(()) => {
                self.tx_busy = true;
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                error!("uart: TX slot occupied while idle");
                Err(Error::Busy(Direction::Tx))
            }
        }
    }

    fn submit_rx(&mut self, job: RxJob) -> Result<()> {
        if self.rx_busy {
            return Err(Error::Busy(Direction::Rx));
        }
        match self.rx_jobs.try_send(job) {
            Ok(()) => {
                self.rx_busy = true;
                Ok(())
            }
            Err(TrySendError::Full(job)) => {
                error!("uart: RX slot occupied while idle");
                #[cfg(feature = "h5")]
                if let RxJob::Frame(frame) = job {
                    self.slip_rx = Some(frame.state);
                }
                #[cfg(not(feature = "h5"))]
                drop(job);
                Err(Error::Busy(Direction::Rx))
            }
        }
    }
}

/// The transport. Owns the board until `open()`, then the link resources.
pub struct UartTransport<B: Board> {
    variant: Variant,
    state: LinkState,
    board: Option<B>,
    config: UartConfig,
    mode: FlowControlMode,
    link: Option<Link<B>>,
    hooks: Hooks,
}

impl<B: Board> UartTransport<B> {
    pub fn new(board: B, variant: Variant) -> Self {
        Self {
            variant,
            state: LinkState::Uninitialized,
            board: Some(board),
            config: UartConfig::default(),
            mode: FlowControlMode::None,
            link: None,
            hooks: Hooks::default(),
        }
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Flow-control mode decided by `initialize()`.
    pub fn flow_control_mode(&self) -> FlowControlMode {
        self.mode
    }

    pub fn config(&self) -> &UartConfig {
        &self.config
    }

    /// Whether a transfer in `dir` has been submitted but not yet dispatched.
    pub fn is_busy(&self, dir: Direction) -> bool {
        self.link.as_ref().is_some_and(|link| match dir {
            Direction::Tx => link.tx_busy,
            Direction::Rx => link.rx_busy,
        })
    }

    // ── Lifecycle ────────────────────────────────────────────

    /// Capture the configuration and decide the flow-control mode.
    pub fn initialize(&mut self, config: UartConfig) -> Result<()> {
        if self.state != LinkState::Uninitialized {
            info!("uart: init / already initialized");
            return Ok(());
        }
        config.validate()?;
        let board = self.board.as_ref().ok_or(Error::Init("board unavailable"))?;

        self.mode = FlowControlMode::decide(config.flow_control, board.manual_rts_cts());
        self.config = config;
        self.state = LinkState::Initialized;

        #[cfg(feature = "h5")]
        info!("uart: init / h5 supported, flow control {:?}", self.mode);
        #[cfg(not(feature = "h5"))]
        info!("uart: init / h5 not supported, flow control {:?}", self.mode);
        Ok(())
    }

    /// Configure the peripheral and the RTS/CTS pins and start both workers.
    pub fn open(&mut self) -> Result<()> {
        match self.state {
            LinkState::Open => {
                info!("uart: open (already)");
                return Ok(());
            }
            LinkState::Uninitialized => return Err(Error::NotInitialized),
            LinkState::Initialized => {}
        }
        let board = self
            .board
            .take()
            .ok_or_else(|| {
                error!("uart: open refused, board was released by an earlier failed open");
                Error::Init("board consumed by an earlier failed open")
            })?;

        info!("uart: open, {} baud", self.config.baud_rate);
        match Self::bring_up(board, &self.config, self.mode) {
            Ok(link) => {
                self.link = Some(link);
                self.state = LinkState::Open;
                Ok(())
            }
            Err(e) => {
                error!("uart: open failed ({}), board released; transport cannot be reopened", e);
                Err(e)
            }
        }
    }

    fn bring_up(board: B, config: &UartConfig, mode: FlowControlMode) -> Result<Link<B>> {
        let BoardParts {
            tx,
            rx,
            mut control,
            mut rts,
            cts,
        } = board.into_parts();

        // RTS idles LOW (always ready) without flow control and HIGH in
        // manual mode until a read is armed.
        if let Some(pin) = rts.as_mut() {
            let level = match mode {
                FlowControlMode::None => pin.set_low(),
                FlowControlMode::Manual => pin.set_high(),
                FlowControlMode::HardwareAssisted => Ok(()),
            };
            level.map_err(|_| Error::Gpio(Direction::Rx))?;
        }

        let settings = LineSettings {
            baud_rate: config.baud_rate,
            hardware_flow_control: mode == FlowControlMode::HardwareAssisted,
            rx_ring_buffer: (mode != FlowControlMode::HardwareAssisted).then_some(RX_RING_BUFFER_SIZE),
        };
        control.configure(&settings)?;

        // The handshake needs a wired CTS; RTS is toggled only alongside it.
        let handshake = mode.is_manual() && cts.is_some();
        let (worker_rts, idle_rts) = if handshake { (rts, None) } else { (None, rts) };
        let (worker_cts, idle_cts) = if handshake { (cts, None) } else { (None, cts) };
        if mode.is_manual() && !handshake {
            warn!("uart: manual flow control requested but CTS is not wired");
        }

        let tx_jobs = Arc::new(JobChannel::new());
        let rx_jobs = Arc::new(JobChannel::new());
        let completions = Arc::new(CompletionChannel::new());
        let cancel = CancelToken::new();

        let tx_worker = TxWorker {
            uart: tx,
            cts: worker_cts,
            jobs: tx_jobs.clone(),
            completions: completions.clone(),
            cancel: cancel.clone(),
        };
        let rx_worker = RxWorker {
            uart: rx,
            rts: worker_rts,
            jobs: rx_jobs.clone(),
            completions: completions.clone(),
        };
        let tx_handle = spawn_worker(TX_WORKER, move || tx_worker.run())?;
        let rx_handle = spawn_worker(RX_WORKER, move || rx_worker.run()).inspect_err(|_| {
            error!("uart: RX worker spawn failed, TX worker left parked");
        })?;

        Ok(Link {
            control,
            tx_jobs,
            rx_jobs,
            completions,
            cancel,
            tx_busy: false,
            rx_busy: false,
            #[cfg(feature = "h5")]
            slip_rx: Some(SlipReceiveState::new()),
            _idle_rts: idle_rts,
            _idle_cts: idle_cts,
            _workers: [tx_handle, rx_handle],
        })
    }

    /// Accepted for API symmetry; resources stay up for the process lifetime.
    pub fn close(&mut self) -> Result<()> {
        debug!("uart: close (no-op)");
        Ok(())
    }

    // ── Hook registration ────────────────────────────────────

    pub fn set_block_sent(&mut self, hook: impl FnMut(Sent) + 'static) {
        self.hooks.block_sent = Some(Box::new(hook));
    }

    pub fn set_block_received(&mut self, hook: impl FnMut(Received) + 'static) {
        self.hooks.block_received = Some(Box::new(hook));
    }

    #[cfg(feature = "h5")]
    pub fn set_frame_sent(&mut self, hook: impl FnMut(Sent) + 'static) {
        self.hooks.frame_sent = Some(Box::new(hook));
    }

    #[cfg(feature = "h5")]
    pub fn set_frame_received(&mut self, hook: impl FnMut(Received) + 'static) {
        self.hooks.frame_received = Some(Box::new(hook));
    }

    // ── Raw blocks ───────────────────────────────────────────

    /// Transmit `buffer` as-is. The block-sent hook gets it back.
    pub fn send_block(&mut self, buffer: &'static [u8]) -> Result<()> {
        let link = self.link.as_mut().ok_or(Error::NotOpen)?;
        debug!("uart: send block, {} bytes", buffer.len());
        link.submit_tx(TxJob::Block(buffer))
    }

    /// Fill `buffer` completely. The block-received hook gets it back.
    ///
    /// On a framed link, bytes already read in behind the last frame are used
    /// first. If they cover the whole block the hook runs before this call
    /// returns and no read is issued.
    pub fn receive_block(&mut self, buffer: &'static mut [u8]) -> Result<()> {
        let link = self.link.as_mut().ok_or(Error::NotOpen)?;
        if link.rx_busy {
            return Err(Error::Busy(Direction::Rx));
        }
        debug!("uart: receive block, {} bytes", buffer.len());

        #[cfg(feature = "h5")]
        let filled = link
            .slip_rx
            .as_mut()
            .map_or(0, |state| state.take_pending(&mut *buffer));
        #[cfg(not(feature = "h5"))]
        let filled = 0;

        if filled > 0 && filled == buffer.len() {
            self.hooks.block_received(Received {
                len: filled,
                buffer,
                status: Ok(()),
            });
            return Ok(());
        }
        link.submit_rx(RxJob::Block { buffer, filled })
    }

    // ── SLIP frames ──────────────────────────────────────────

    /// SLIP-encode and transmit `frame`. The frame-sent hook gets it back.
    #[cfg(feature = "h5")]
    pub fn send_frame(&mut self, frame: &'static [u8]) -> Result<()> {
        self.require_framed()?;
        let link = self.link.as_mut().ok_or(Error::NotOpen)?;
        debug!("uart: send frame, {} bytes", frame.len());
        link.submit_tx(TxJob::Frame(SlipEncoder::new(frame)))
    }

    /// Decode the next frame into `buffer`.
    ///
    /// If bytes left over from an earlier read already hold a complete frame,
    /// the frame-received hook runs before this call returns and no read is
    /// issued. Otherwise the RX worker reads until a frame completes.
    #[cfg(feature = "h5")]
    pub fn receive_frame(&mut self, buffer: &'static mut [u8]) -> Result<()> {
        self.require_framed()?;
        let link = self.link.as_mut().ok_or(Error::NotOpen)?;
        if link.rx_busy {
            return Err(Error::Busy(Direction::Rx));
        }
        let mut state = link.slip_rx.take().ok_or(Error::Busy(Direction::Rx))?;
        debug!("uart: receive frame, capacity {}", buffer.len());

        let mut decoder = SlipDecoder::new(buffer);
        if state.has_pending() {
            let size = state.process(&mut decoder);
            if size != 0 {
                link.slip_rx = Some(state);
                self.hooks.frame_received(Received {
                    buffer: decoder.into_buffer(),
                    len: size,
                    status: Ok(()),
                });
                return Ok(());
            }
        }
        link.submit_rx(RxJob::Frame(FrameRx { decoder, state }))
    }

    #[cfg(feature = "h5")]
    fn require_framed(&self) -> Result<()> {
        match self.variant {
            Variant::Framed => Ok(()),
            Variant::RawBlock => Err(Error::Unsupported("SLIP framing on a raw block transport")),
        }
    }

    // ── Completion dispatch ──────────────────────────────────

    /// Run hooks for every completion already posted. Never blocks.
    pub fn dispatch_pending(&mut self) -> usize {
        let Some(completions) = self.link.as_ref().map(|l| l.completions.clone()) else {
            return 0;
        };
        let mut count = 0;
        while let Ok(completion) = completions.try_receive() {
            self.dispatch(completion);
            count += 1;
        }
        count
    }

    /// Block until at least one completion arrives, then dispatch everything
    /// pending. Returns the number of hooks run.
    ///
    /// Fails with `Error::Idle` when nothing is in flight, since no
    /// completion could ever arrive.
    pub fn wait_for_completion(&mut self) -> Result<usize> {
        let link = self.link.as_ref().ok_or(Error::NotOpen)?;
        if !link.tx_busy && !link.rx_busy {
            return Err(Error::Idle);
        }
        let completions = link.completions.clone();
        let first = block_on(completions.receive());
        self.dispatch(first);
        Ok(1 + self.dispatch_pending())
    }

    fn dispatch(&mut self, completion: Completion) {
        let Some(link) = self.link.as_mut() else {
            return;
        };
        match completion {
            Completion::BlockSent(sent) => {
                link.tx_busy = false;
                self.hooks.block_sent(sent);
            }
            Completion::BlockReceived(received) => {
                link.rx_busy = false;
                self.hooks.block_received(received);
            }
            #[cfg(feature = "h5")]
            Completion::FrameSent(sent) => {
                link.tx_busy = false;
                self.hooks.frame_sent(sent);
            }
            #[cfg(feature = "h5")]
            Completion::FrameReceived { received, state } => {
                link.rx_busy = false;
                link.slip_rx = Some(state);
                self.hooks.frame_received(received);
            }
        }
    }

    // ── Line control ─────────────────────────────────────────

    /// Change the baud rate of the open link.
    ///
    /// Without flow control the controller gets a settle delay afterwards.
    pub fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()> {
        let link = self.link.as_mut().ok_or(Error::NotOpen)?;
        info!("uart: set baud {}", baud_rate);
        if link.control.set_baud_rate(baud_rate)? {
            self.config.baud_rate = baud_rate;
        } else {
            error!("uart: set_baud_rate not implemented for this platform");
        }
        if self.mode == FlowControlMode::None {
            std::thread::sleep(BAUD_SETTLE_DELAY);
        }
        Ok(())
    }

    pub fn set_parity(&mut self, parity: Parity) -> Result<()> {
        error!("uart: set_parity({:?}) not implemented", parity);
        Err(Error::Unsupported("set_parity"))
    }

    pub fn set_flow_control(&mut self, enabled: bool) -> Result<()> {
        error!("uart: set_flow_control({}) not implemented", enabled);
        Err(Error::Unsupported("set_flow_control"))
    }

    pub fn supported_sleep_modes(&self) -> Vec<SleepMode, 3> {
        Vec::new()
    }

    pub fn set_sleep(&mut self, mode: SleepMode) -> Result<()> {
        error!("uart: set_sleep({:?}) not implemented", mode);
        Err(Error::Unsupported("set_sleep"))
    }
}

impl<B: Board> Drop for UartTransport<B> {
    fn drop(&mut self) {
        if let Some(link) = self.link.as_ref() {
            link.cancel.cancel();
        }
    }
}
