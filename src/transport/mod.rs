//! Transport module - the physical byte channel.
//!
//! The protocol core is transport-agnostic; this module provides the
//! serial-port implementation for real hardware.

pub mod serial;

pub use serial::{open, SerialConfig};
