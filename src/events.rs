//! Notification events surfaced outside the request/response path.
//!
//! Everything the read loop sees that is not a matched response is
//! delivered here, in arrival order: corrupt frames, responses with no
//! pending request, and unsolicited frames from the device. None of these
//! close the connection; consumers decide what to log or act on (the
//! usual consumer is an error-logging listener).

use bytes::Bytes;

use crate::protocol::{Corruption, Frame};

/// An out-of-band notification from the connection's read loop.
#[derive(Debug, Clone)]
pub enum ProtocolEvent {
    /// A frame failed checksum or structural validation. Carries the raw
    /// body bytes and, for checksum failures, computed-vs-received values
    /// via [`Corruption::checksums`].
    Corruption(Corruption),

    /// A valid response frame arrived whose sequence id matches no
    /// pending request (stale, duplicate, or cancelled).
    UnmatchedResponse(Frame),

    /// The device reported an error condition out-of-band.
    RemoteError {
        /// One-byte error code, when the payload carries one.
        code: Option<u8>,
        /// The full error frame.
        frame: Frame,
    },

    /// The device pushed an event (e.g. an input toggle notice or a text
    /// message). The payload is owned by the caller's protocol.
    RemoteEvent(Frame),

    /// The device sent a command frame. The host drives all requests on
    /// this link, so peer commands are surfaced rather than dispatched.
    RemoteCommand(Frame),
}

impl ProtocolEvent {
    /// Classify a decoded inbound frame that is not a matched response.
    pub(crate) fn from_frame(frame: Frame) -> Self {
        use crate::protocol::FrameType;

        match frame.frame_type {
            FrameType::Response => ProtocolEvent::UnmatchedResponse(frame),
            FrameType::Error => ProtocolEvent::RemoteError {
                code: frame.payload.first().copied(),
                frame,
            },
            FrameType::Event => ProtocolEvent::RemoteEvent(frame),
            FrameType::Command => ProtocolEvent::RemoteCommand(frame),
        }
    }

    /// The raw frame body this event refers to, when one exists.
    pub fn raw(&self) -> Option<&Bytes> {
        match self {
            ProtocolEvent::Corruption(c) => Some(&c.raw),
            ProtocolEvent::UnmatchedResponse(frame)
            | ProtocolEvent::RemoteError { frame, .. }
            | ProtocolEvent::RemoteEvent(frame)
            | ProtocolEvent::RemoteCommand(frame) => Some(&frame.payload),
        }
    }
}
