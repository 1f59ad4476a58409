//! Serial port transport.
//!
//! Opens an already-identified serial port as an async duplex byte
//! stream. Port discovery, enumeration, and firmware concerns stay
//! outside this crate; the client consumes any `AsyncRead + AsyncWrite`
//! stream and this module only produces the real-hardware one.

use tokio_serial::{SerialPortBuilderExt, SerialStream};

use crate::error::{PinwireError, Result};

/// Serial line configuration.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Line speed in baud. Default: 57600, the usual rate for small
    /// microcontroller bridges.
    pub baud_rate: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self { baud_rate: 57_600 }
    }
}

/// Open a serial port with the given configuration.
///
/// Failure is fatal to this connection attempt only; callers retry by
/// opening again.
pub fn open(port: &str, config: &SerialConfig) -> Result<SerialStream> {
    tokio_serial::new(port, config.baud_rate)
        .open_native_async()
        .map_err(|source| PinwireError::TransportOpen {
            port: port.to_string(),
            source,
        })
}
