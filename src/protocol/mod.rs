//! Protocol module - wire format, checksum, and framing.
//!
//! Implements the SLIP-delimited binary protocol spoken over the serial
//! link:
//! - SLIP byte stuffing and frame type tags
//! - XOR-8 checksum over the unescaped frame body
//! - Frame buffer for accumulating partial reads with corruption recovery

pub mod checksum;
mod frame;
mod frame_buffer;
mod wire_format;

pub use frame::{encode_frame, Frame};
pub use frame_buffer::{CorruptReason, Corruption, Decoded, FrameBuffer};
pub use wire_format::{
    escape_into, max_wire_len, FrameType, END, ESC, ESC_END, ESC_ESC, MAX_FRAME_BODY, MAX_PAYLOAD,
    MIN_FRAME_BODY, SEQUENCE_IDS, UNSOLICITED_SEQUENCE,
};
