//! Flow-control mode selection and the manual RTS/CTS handshake.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use btuart::ports::LineSettings;
use btuart::{FlowControlMode, UartConfig, UartTransport, Variant};

use crate::mock_hw::{HwEvent, MockBoard, rx_buffer, tx_buffer};
use crate::open_transport;

fn mode_for(board: MockBoard, flow_control: bool) -> FlowControlMode {
    let mut uart = UartTransport::new(board, Variant::RawBlock);
    uart.initialize(UartConfig::new(115_200, flow_control)).unwrap();
    uart.flow_control_mode()
}

#[test]
fn mode_follows_request_and_wiring() {
    assert_eq!(mode_for(MockBoard::manual(), false), FlowControlMode::None);
    assert_eq!(mode_for(MockBoard::hardware(), false), FlowControlMode::None);
    assert_eq!(mode_for(MockBoard::manual(), true), FlowControlMode::Manual);
    assert_eq!(
        mode_for(MockBoard::hardware(), true),
        FlowControlMode::HardwareAssisted
    );
}

// ── Manual scenario ──────────────────────────────────────────

#[test]
fn manual_receive_toggles_rts_around_the_read() {
    let (mut uart, wire) = open_transport(MockBoard::manual(), Variant::RawBlock, true);
    assert_eq!(uart.flow_control_mode(), FlowControlMode::Manual);

    let got = Rc::new(RefCell::new(Vec::new()));
    let g = got.clone();
    uart.set_block_received(move |rx| g.borrow_mut().push(rx.data().to_vec()));

    uart.receive_block(rx_buffer(4)).unwrap();
    wire.feed(&[0x01, 0x02, 0x03, 0x04]);
    assert_eq!(uart.wait_for_completion().unwrap(), 1);
    assert_eq!(*got.borrow(), vec![vec![0x01, 0x02, 0x03, 0x04]]);

    let rx_events: Vec<HwEvent> = wire
        .events()
        .into_iter()
        .skip_while(|e| !matches!(e, HwEvent::Configure(_)))
        .skip(1)
        .collect();
    assert_eq!(
        rx_events,
        vec![
            HwEvent::RtsLow,
            HwEvent::ReadBegin(4),
            HwEvent::ReadEnd(4),
            HwEvent::RtsHigh,
        ]
    );
}

#[test]
fn rts_window_spans_every_piece_of_a_split_read() {
    let (mut uart, wire) = open_transport(MockBoard::manual(), Variant::RawBlock, true);
    wire.set_read_piece(1);
    let got = Rc::new(RefCell::new(Vec::new()));
    let g = got.clone();
    uart.set_block_received(move |rx| g.borrow_mut().push(rx.data().to_vec()));

    uart.receive_block(rx_buffer(4)).unwrap();
    wire.feed(&[0x01, 0x02, 0x03, 0x04]);
    assert_eq!(uart.wait_for_completion().unwrap(), 1);
    assert_eq!(uart.dispatch_pending(), 0);
    assert_eq!(*got.borrow(), vec![vec![0x01, 0x02, 0x03, 0x04]]);

    let rx_events: Vec<HwEvent> = wire
        .events()
        .into_iter()
        .skip_while(|e| !matches!(e, HwEvent::Configure(_)))
        .skip(1)
        .collect();
    assert_eq!(
        rx_events,
        vec![
            HwEvent::RtsLow,
            HwEvent::ReadBegin(4),
            HwEvent::ReadEnd(1),
            HwEvent::ReadBegin(3),
            HwEvent::ReadEnd(1),
            HwEvent::ReadBegin(2),
            HwEvent::ReadEnd(1),
            HwEvent::ReadBegin(1),
            HwEvent::ReadEnd(1),
            HwEvent::RtsHigh,
        ]
    );
}

#[test]
fn rts_is_raised_even_when_the_read_fails() {
    let (mut uart, wire) = open_transport(MockBoard::manual(), Variant::RawBlock, true);
    wire.fail_next_read();
    uart.receive_block(rx_buffer(2)).unwrap();
    uart.wait_for_completion().unwrap();

    let events = wire.events();
    let tail = &events[events.len() - 4..];
    assert_eq!(
        tail,
        &[
            HwEvent::RtsLow,
            HwEvent::ReadBegin(2),
            HwEvent::ReadEnd(0),
            HwEvent::RtsHigh,
        ]
    );
}

#[test]
fn every_receive_gets_its_own_rts_window() {
    let (mut uart, wire) = open_transport(MockBoard::manual(), Variant::RawBlock, true);
    for round in 0..3u8 {
        uart.receive_block(rx_buffer(2)).unwrap();
        wire.feed(&[round, round]);
        uart.wait_for_completion().unwrap();
    }
    let lows = wire.events().iter().filter(|e| **e == HwEvent::RtsLow).count();
    // One extra RtsHigh from open().
    let highs = wire.events().iter().filter(|e| **e == HwEvent::RtsHigh).count();
    assert_eq!(lows, 3);
    assert_eq!(highs, 4);
}

#[test]
fn manual_send_waits_for_cts_low() {
    let (mut uart, wire) = open_transport(MockBoard::manual(), Variant::RawBlock, true);
    wire.set_cts_high(true);

    uart.send_block(tx_buffer(&[0xAB])).unwrap();
    std::thread::sleep(Duration::from_millis(50));
    assert!(wire.writes().is_empty(), "must not transmit while CTS is high");

    wire.set_cts_high(false);
    uart.wait_for_completion().unwrap();
    assert_eq!(wire.written_bytes(), vec![0xAB]);

    let events = wire.events();
    let write_at = events.iter().position(|e| matches!(e, HwEvent::Write(_))).unwrap();
    assert_eq!(events[write_at - 1], HwEvent::CtsPoll { low: true });
}

// ── Other modes ──────────────────────────────────────────────

#[test]
fn manual_without_cts_skips_the_handshake() {
    let (mut uart, wire) =
        open_transport(MockBoard::manual().without_cts(), Variant::RawBlock, true);
    uart.receive_block(rx_buffer(1)).unwrap();
    wire.feed(&[1]);
    uart.send_block(tx_buffer(&[2])).unwrap();
    let mut done = 0;
    while done < 2 {
        done += uart.wait_for_completion().unwrap();
    }
    let events = wire.events();
    assert!(!events.contains(&HwEvent::RtsLow));
    assert!(!events.iter().any(|e| matches!(e, HwEvent::CtsPoll { .. })));
}

#[test]
fn open_drives_rts_by_mode() {
    let (_uart, wire) = open_transport(MockBoard::manual(), Variant::RawBlock, false);
    assert_eq!(wire.events()[0], HwEvent::RtsLow, "None mode: always ready");

    let (_uart, wire) = open_transport(MockBoard::manual(), Variant::RawBlock, true);
    assert_eq!(wire.events()[0], HwEvent::RtsHigh, "Manual: not ready until a read");

    let (_uart, wire) = open_transport(MockBoard::hardware(), Variant::RawBlock, true);
    assert!(matches!(wire.events()[0], HwEvent::Configure(_)));
}

#[test]
fn line_settings_follow_mode() {
    let configured = |board, flow| {
        let (_uart, wire) = open_transport(board, Variant::RawBlock, flow);
        wire.events()
            .into_iter()
            .find_map(|e| match e {
                HwEvent::Configure(s) => Some(s),
                _ => None,
            })
            .unwrap()
    };

    assert_eq!(
        configured(MockBoard::hardware(), true),
        LineSettings {
            baud_rate: 115_200,
            hardware_flow_control: true,
            rx_ring_buffer: None,
        }
    );
    assert_eq!(
        configured(MockBoard::manual(), true),
        LineSettings {
            baud_rate: 115_200,
            hardware_flow_control: false,
            rx_ring_buffer: Some(512),
        }
    );
    assert_eq!(
        configured(MockBoard::manual(), false).rx_ring_buffer,
        Some(512)
    );
}
