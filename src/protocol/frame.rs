//! Frame struct with typed accessors and wire encoding.
//!
//! Represents one complete protocol message. Uses `bytes::Bytes` for
//! zero-copy payload sharing between the decoder, the correlator, and
//! notification consumers.

use bytes::Bytes;

use super::checksum;
use super::wire_format::{
    escape_into, max_wire_len, FrameType, END, MAX_PAYLOAD, UNSOLICITED_SEQUENCE,
};
use crate::error::{PinwireError, Result};

/// A complete protocol frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Frame type tag.
    pub frame_type: FrameType,
    /// Sequence id (`UNSOLICITED_SEQUENCE` for unsolicited frames).
    pub sequence: u8,
    /// Payload bytes (zero-copy via `bytes::Bytes`).
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(frame_type: FrameType, sequence: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            frame_type,
            sequence,
            payload: payload.into(),
        }
    }

    /// Create a command frame carrying the given sequence id.
    pub fn command(sequence: u8, payload: impl Into<Bytes>) -> Self {
        Self::new(FrameType::Command, sequence, payload)
    }

    /// Create a response frame answering the given sequence id.
    pub fn response(sequence: u8, payload: impl Into<Bytes>) -> Self {
        Self::new(FrameType::Response, sequence, payload)
    }

    /// Create an unsolicited event frame.
    pub fn event(payload: impl Into<Bytes>) -> Self {
        Self::new(FrameType::Event, UNSOLICITED_SEQUENCE, payload)
    }

    /// Create an unsolicited error frame carrying a one-byte code.
    pub fn error(code: u8) -> Self {
        Self::new(FrameType::Error, UNSOLICITED_SEQUENCE, vec![code])
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Check if this is a response to a command.
    #[inline]
    pub fn is_response(&self) -> bool {
        self.frame_type == FrameType::Response
    }

    /// Check if this frame is unsolicited (error or event).
    #[inline]
    pub fn is_unsolicited(&self) -> bool {
        matches!(self.frame_type, FrameType::Error | FrameType::Event)
    }

    /// The checksum this frame carries on the wire.
    #[inline]
    pub fn checksum(&self) -> u8 {
        checksum::compute(self.frame_type, self.sequence, &self.payload)
    }
}

/// Encode a frame into its SLIP-escaped wire form.
///
/// Escapes type, sequence, payload and checksum, then appends the
/// unescaped `END` terminator. Payloads over [`MAX_PAYLOAD`] are rejected
/// before anything touches the wire.
pub fn encode_frame(frame: &Frame) -> Result<Vec<u8>> {
    if frame.payload.len() > MAX_PAYLOAD {
        return Err(PinwireError::PayloadTooLarge {
            size: frame.payload.len(),
            max: MAX_PAYLOAD,
        });
    }

    let mut out = Vec::with_capacity(max_wire_len(frame.payload.len()));
    escape_into(frame.frame_type.wire(), &mut out);
    escape_into(frame.sequence, &mut out);
    for &byte in frame.payload.iter() {
        escape_into(byte, &mut out);
    }
    escape_into(frame.checksum(), &mut out);
    out.push(END);
    Ok(out)
}
