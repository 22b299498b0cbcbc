//! Board adapters implementing the port traits on real hardware.

#[cfg(target_os = "espidf")]
pub mod esp32;
