//! Bluetooth HCI UART transport.
//!
//! Moves HCI traffic between a host stack and a Bluetooth controller over a
//! UART, either as raw fixed-length blocks (H4) or as SLIP-framed packets
//! (H5, behind the `h5` feature). Transfers run on two worker threads;
//! completion hooks always run on the caller's context.
//!
//! All ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`,
//! so the engine and its tests build on the host against mock ports.

#![deny(unused_must_use)]

pub mod adapters;
pub mod config;
pub mod flow;
pub mod pins;
pub mod ports;
#[cfg(feature = "h5")]
pub mod slip;
pub mod thread;
pub mod transport;

mod error;

pub use config::UartConfig;
pub use error::{Direction, Error, Result, UartError};
pub use flow::FlowControlMode;
pub use transport::{LinkState, Parity, Received, Sent, SleepMode, UartTransport, Variant};
