//! XOR-8 frame checksum.
//!
//! The checksum is the XOR of the type tag, the sequence byte, and every
//! payload byte, computed over the unescaped body. Both ends compute it
//! the same way, so encode and decode stay symmetric. XOR-8 flips for any
//! single-byte change, which is the sensitivity the framing needs: a
//! mismatch is reported per-frame and never tears down the connection.

use super::wire_format::FrameType;

/// Compute the checksum for a frame body.
#[inline]
pub fn compute(frame_type: FrameType, sequence: u8, payload: &[u8]) -> u8 {
    payload
        .iter()
        .fold(frame_type.wire() ^ sequence, |acc, &b| acc ^ b)
}

/// Verify a received checksum against the frame body.
#[inline]
pub fn verify(frame_type: FrameType, sequence: u8, payload: &[u8], received: u8) -> bool {
    compute(frame_type, sequence, payload) == received
}
