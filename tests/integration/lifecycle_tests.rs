//! Initialize/open/close lifecycle and the line-control surface.

use std::time::{Duration, Instant};

use btuart::{
    Error, FlowControlMode, LinkState, Parity, SleepMode, UartConfig, UartError, UartTransport,
    Variant,
};

use crate::mock_hw::{HwEvent, MockBoard, rx_buffer, tx_buffer};
use crate::open_transport;

#[test]
fn initialize_and_open_are_idempotent() {
    let board = MockBoard::manual();
    let wire = board.wire.clone();
    let mut uart = UartTransport::new(board, Variant::RawBlock);
    assert_eq!(uart.state(), LinkState::Uninitialized);

    uart.initialize(UartConfig::new(921_600, true)).unwrap();
    uart.initialize(UartConfig::new(115_200, false)).unwrap();
    assert_eq!(uart.state(), LinkState::Initialized);
    assert_eq!(uart.config().baud_rate, 921_600, "second init ignored");
    assert_eq!(uart.flow_control_mode(), FlowControlMode::Manual);

    uart.open().unwrap();
    uart.open().unwrap();
    assert_eq!(uart.state(), LinkState::Open);

    let configures = wire
        .events()
        .iter()
        .filter(|e| matches!(e, HwEvent::Configure(_)))
        .count();
    assert_eq!(configures, 1, "peripheral set up once");

    // Still one worker per direction.
    uart.send_block(tx_buffer(&[1])).unwrap();
    uart.wait_for_completion().unwrap();
    assert_eq!(wire.writes().len(), 1);
}

#[test]
fn open_before_initialize_is_refused() {
    let mut uart = UartTransport::new(MockBoard::hardware(), Variant::RawBlock);
    assert_eq!(uart.open(), Err(Error::NotInitialized));
    assert_eq!(uart.state(), LinkState::Uninitialized);
}

#[test]
fn zero_baud_is_rejected() {
    let mut uart = UartTransport::new(MockBoard::hardware(), Variant::RawBlock);
    assert!(matches!(
        uart.initialize(UartConfig::new(0, true)),
        Err(Error::Init(_))
    ));
    assert_eq!(uart.state(), LinkState::Uninitialized);
}

#[test]
fn transfers_need_an_open_link() {
    let mut uart = UartTransport::new(MockBoard::hardware(), Variant::RawBlock);
    uart.initialize(UartConfig::default()).unwrap();
    assert_eq!(uart.send_block(tx_buffer(&[1])), Err(Error::NotOpen));
    assert_eq!(uart.receive_block(rx_buffer(1)), Err(Error::NotOpen));
    assert_eq!(uart.wait_for_completion(), Err(Error::NotOpen));
    assert_eq!(uart.dispatch_pending(), 0);
}

#[test]
fn waiting_with_nothing_in_flight_is_an_error() {
    let (mut uart, _wire) = open_transport(MockBoard::hardware(), Variant::RawBlock, true);
    assert_eq!(uart.wait_for_completion(), Err(Error::Idle));

    uart.send_block(tx_buffer(&[1])).unwrap();
    assert_eq!(uart.wait_for_completion(), Ok(1));
    assert_eq!(uart.wait_for_completion(), Err(Error::Idle));
}

#[test]
fn failed_open_is_reported_and_not_retried() {
    let board = MockBoard::hardware();
    board.wire.fail_configure();
    let mut uart = UartTransport::new(board, Variant::RawBlock);
    uart.initialize(UartConfig::default()).unwrap();

    assert_eq!(uart.open(), Err(Error::Uart(UartError::Driver(-2))));
    assert_eq!(uart.state(), LinkState::Initialized);
    assert!(matches!(uart.open(), Err(Error::Init(_))));
    assert_eq!(uart.send_block(tx_buffer(&[1])), Err(Error::NotOpen));
}

#[test]
fn close_leaves_the_link_usable() {
    let (mut uart, wire) = open_transport(MockBoard::hardware(), Variant::RawBlock, true);
    uart.close().unwrap();
    assert_eq!(uart.state(), LinkState::Open);

    uart.send_block(tx_buffer(&[5])).unwrap();
    uart.wait_for_completion().unwrap();
    assert_eq!(wire.written_bytes(), vec![5]);
}

// ── Line control ─────────────────────────────────────────────

#[test]
fn baud_change_without_flow_control_settles() {
    let (mut uart, wire) = open_transport(MockBoard::hardware(), Variant::RawBlock, false);
    let start = Instant::now();
    uart.set_baud_rate(3_000_000).unwrap();
    assert!(start.elapsed() >= Duration::from_millis(100));
    assert_eq!(uart.config().baud_rate, 3_000_000);
    assert!(wire.events().contains(&HwEvent::SetBaud(3_000_000)));
}

#[test]
fn baud_change_with_flow_control_does_not_wait() {
    let (mut uart, _wire) = open_transport(MockBoard::hardware(), Variant::RawBlock, true);
    let start = Instant::now();
    uart.set_baud_rate(921_600).unwrap();
    assert!(start.elapsed() < Duration::from_millis(100));
}

#[test]
fn unsupported_baud_change_is_tolerated() {
    let (mut uart, _wire) = open_transport(
        MockBoard::hardware().without_runtime_baud(),
        Variant::RawBlock,
        true,
    );
    uart.set_baud_rate(921_600).unwrap();
    assert_eq!(uart.config().baud_rate, 115_200);
}

#[test]
fn unimplemented_controls_report_unsupported() {
    let (mut uart, _wire) = open_transport(MockBoard::hardware(), Variant::RawBlock, true);
    assert!(matches!(uart.set_parity(Parity::Even), Err(Error::Unsupported(_))));
    assert!(matches!(uart.set_flow_control(false), Err(Error::Unsupported(_))));
    assert!(matches!(
        uart.set_sleep(SleepMode::RtsHighWakeOnCtsPulse),
        Err(Error::Unsupported(_))
    ));
    assert!(uart.supported_sleep_modes().is_empty());

    // Nothing above disturbed the link.
    uart.send_block(tx_buffer(&[1])).unwrap();
    uart.wait_for_completion().unwrap();
}

#[test]
fn independent_transports_do_not_share_state() {
    let (mut a, wire_a) = open_transport(MockBoard::hardware(), Variant::RawBlock, true);
    let (mut b, wire_b) = open_transport(MockBoard::hardware(), Variant::RawBlock, true);

    a.send_block(tx_buffer(&[0xA])).unwrap();
    b.send_block(tx_buffer(&[0xB])).unwrap();
    a.wait_for_completion().unwrap();
    b.wait_for_completion().unwrap();

    assert_eq!(wire_a.written_bytes(), vec![0xA]);
    assert_eq!(wire_b.written_bytes(), vec![0xB]);
}
