//! GPIO / peripheral assignments for the Bluetooth controller link.
//!
//! Single source of truth for the reference board wiring. The controller
//! sits on UART1; its flow-control lines are on plain GPIOs, so the
//! transport drives them in software.

// ---------------------------------------------------------------------------
// Controller UART
// ---------------------------------------------------------------------------

/// UART peripheral number the controller is attached to.
pub const BT_UART_PORT: i32 = 1;

/// Host TX → controller RX.
pub const BT_UART_TX_GPIO: i32 = 17;
/// Controller TX → host RX.
pub const BT_UART_RX_GPIO: i32 = 18;

// ---------------------------------------------------------------------------
// Flow control (active-low)
// ---------------------------------------------------------------------------

/// Host RTS output. LOW = host ready to receive.
pub const BT_UART_RTS_GPIO: i32 = 19;
/// Controller CTS input. LOW = controller ready to receive.
pub const BT_UART_CTS_GPIO: i32 = 20;

/// RTS/CTS are wired to GPIOs rather than the UART's own flow-control pins.
pub const BT_MANUAL_RTS_CTS: bool = true;

// ---------------------------------------------------------------------------
// Controller power
// ---------------------------------------------------------------------------

/// Controller REG_ON. HIGH = powered.
pub const BT_REG_ON_GPIO: i32 = 21;
