//! Frame buffer for accumulating partial reads.
//!
//! Feeds raw stream bytes through the SLIP state machine and yields
//! complete frames or per-frame corruption reports. Corruption never
//! poisons the stream: after a bad frame the decoder discards bytes until
//! the next `END` terminator and resumes (the firmware side runs the same
//! recovery discipline).
//!
//! # Example
//!
//! ```ignore
//! use pinwire::protocol::{Decoded, FrameBuffer};
//!
//! let mut buffer = FrameBuffer::new();
//! for event in buffer.push(&chunk) {
//!     match event {
//!         Decoded::Frame(frame) => println!("frame seq {}", frame.sequence),
//!         Decoded::Corrupt(c) => eprintln!("corrupt frame: {:?}", c.reason),
//!     }
//! }
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use super::checksum;
use super::frame::Frame;
use super::wire_format::{
    FrameType, END, ESC, ESC_END, ESC_ESC, MAX_FRAME_BODY, MIN_FRAME_BODY,
};

/// Decoder state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Collecting unescaped body bytes for the current frame.
    Accumulating,
    /// Current frame is unusable; discard until the next `END`.
    Recovering,
}

/// One decoder output: a valid frame or a corruption report.
#[derive(Debug, Clone)]
pub enum Decoded {
    /// A complete, checksum-verified frame.
    Frame(Frame),
    /// A frame that failed validation; recoverable, reported per-frame.
    Corrupt(Corruption),
}

/// Why a frame was rejected, with the offending raw bytes.
#[derive(Debug, Clone)]
pub struct Corruption {
    /// The unescaped body bytes collected before the frame was rejected.
    pub raw: Bytes,
    /// Rejection reason.
    pub reason: CorruptReason,
}

impl Corruption {
    /// Computed-vs-received checksums, when the reason is a mismatch.
    pub fn checksums(&self) -> Option<(u8, u8)> {
        match self.reason {
            CorruptReason::ChecksumMismatch { computed, received } => Some((computed, received)),
            _ => None,
        }
    }
}

/// Frame rejection reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorruptReason {
    /// Body checksum does not match the trailing checksum byte.
    ChecksumMismatch { computed: u8, received: u8 },
    /// Frame body shorter than type + sequence + checksum.
    Truncated { len: usize },
    /// `ESC` followed by a byte that is not a valid escape code.
    BadEscape { byte: u8 },
    /// Frame body exceeds the maximum frame size.
    Oversized { len: usize },
    /// Unknown frame type tag.
    UnknownType { byte: u8 },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
///
/// Handles reads fragmented at arbitrary byte boundaries; partial frames
/// are carried across calls to [`push`](FrameBuffer::push).
#[derive(Debug)]
pub struct FrameBuffer {
    /// Unescaped body bytes of the frame in progress.
    body: BytesMut,
    /// Set when `ESC` was seen and the next byte must be de-escaped.
    escaped: bool,
    state: State,
}

impl FrameBuffer {
    /// Create a new empty frame buffer.
    pub fn new() -> Self {
        Self {
            body: BytesMut::with_capacity(MAX_FRAME_BODY),
            escaped: false,
            state: State::Accumulating,
        }
    }

    /// Push data into the buffer and extract everything that completed.
    ///
    /// Returns frames and corruption reports in wire order. May return an
    /// empty vector while a frame is still incomplete.
    pub fn push(&mut self, data: &[u8]) -> Vec<Decoded> {
        let mut out = Vec::new();

        for &byte in data {
            match self.state {
                State::Recovering => {
                    if byte == END {
                        self.body.clear();
                        self.escaped = false;
                        self.state = State::Accumulating;
                    }
                }
                State::Accumulating => {
                    if self.escaped {
                        self.escaped = false;
                        match byte {
                            ESC_END => self.accept(END, &mut out),
                            ESC_ESC => self.accept(ESC, &mut out),
                            other => {
                                out.push(self.corrupt(CorruptReason::BadEscape { byte: other }));
                            }
                        }
                    } else if byte == ESC {
                        self.escaped = true;
                    } else if byte == END {
                        if let Some(decoded) = self.finish() {
                            out.push(decoded);
                        }
                    } else {
                        self.accept(byte, &mut out);
                    }
                }
            }
        }

        out
    }

    /// Number of body bytes buffered for the frame in progress.
    pub fn len(&self) -> usize {
        self.body.len()
    }

    /// Check if no partial frame is buffered.
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Append an unescaped body byte, rejecting oversized frames.
    fn accept(&mut self, byte: u8, out: &mut Vec<Decoded>) {
        if self.body.len() >= MAX_FRAME_BODY {
            let len = self.body.len() + 1;
            out.push(self.corrupt(CorruptReason::Oversized { len }));
            return;
        }
        self.body.put_u8(byte);
    }

    /// Reject the frame in progress and switch to END-scanning recovery.
    fn corrupt(&mut self, reason: CorruptReason) -> Decoded {
        let raw = self.body.split().freeze();
        self.escaped = false;
        self.state = State::Recovering;
        Decoded::Corrupt(Corruption { raw, reason })
    }

    /// Terminator seen: validate the collected body.
    ///
    /// The `END` is already consumed, so validation failures here do not
    /// need the recovery state; the next byte starts a fresh frame.
    fn finish(&mut self) -> Option<Decoded> {
        if self.body.is_empty() {
            // Idle-line END between frames; not a frame.
            return None;
        }

        let body = self.body.split().freeze();

        if body.len() < MIN_FRAME_BODY {
            return Some(Decoded::Corrupt(Corruption {
                reason: CorruptReason::Truncated { len: body.len() },
                raw: body,
            }));
        }

        let frame_type = match FrameType::from_wire(body[0]) {
            Some(ty) => ty,
            None => {
                return Some(Decoded::Corrupt(Corruption {
                    reason: CorruptReason::UnknownType { byte: body[0] },
                    raw: body,
                }));
            }
        };

        let sequence = body[1];
        let received = body[body.len() - 1];
        let payload = body.slice(2..body.len() - 1);
        let computed = checksum::compute(frame_type, sequence, &payload);

        if computed != received {
            return Some(Decoded::Corrupt(Corruption {
                reason: CorruptReason::ChecksumMismatch { computed, received },
                raw: body,
            }));
        }

        Some(Decoded::Frame(Frame {
            frame_type,
            sequence,
            payload,
        }))
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
