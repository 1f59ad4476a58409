//! # pinwire
//!
//! Host-side client for a SLIP-framed microcontroller capability bridge.
//!
//! This crate speaks a framed, checksummed, bidirectional protocol over a
//! serial link and exposes the remote device's hardware as addressable,
//! asynchronously invoked operations (`"ardu1.gpio.digitalWrite"`).
//!
//! ## Architecture
//!
//! - **Protocol**: SLIP-delimited frames with an XOR-8 checksum; the
//!   decoder tolerates noise and resynchronizes after corrupt frames.
//! - **Correlation**: every command borrows a sequence id; responses
//!   match strictly by id, so out-of-order replies resolve correctly.
//! - **Capabilities**: a static manifest builds an immutable dotted-path
//!   namespace of operations with fixed argument/result encodings.
//! - **Lifecycle**: one read-loop task and one writer task per
//!   connection; callers suspend on `invoke`/`close`, never the reader.
//!
//! ## Example
//!
//! ```ignore
//! use pinwire::{Arg, Client, Manifest};
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = Client::builder(Manifest::single_board("ardu1", 1))
//!         .connect_serial("/dev/ttyACM0", &Default::default())
//!         .await
//!         .unwrap();
//!
//!     client
//!         .invoke("ardu1.gpio.digitalWrite", &[Arg::U8(11), Arg::U8(1)])
//!         .await
//!         .unwrap();
//! }
//! ```

pub mod capability;
pub mod correlator;
pub mod error;
pub mod events;
pub mod protocol;
pub mod transport;

mod client;
mod writer;

pub use capability::{Arg, ArgKind, Manifest, ResultKind, ResultValue};
pub use client::{Client, ClientBuilder, ConnectionState};
pub use error::PinwireError;
pub use events::ProtocolEvent;
