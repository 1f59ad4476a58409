//! Capability registry: dotted-path lookup and payload encoding rules.
//!
//! The registry is built once from a [`Manifest`](super::Manifest) and is
//! immutable afterwards, so concurrent lookups need no locking. Each node
//! owns the fixed encoding for its command payload:
//!
//! ```text
//! ┌───────────┬──────────────┬─────────┬─────────────────┐
//! │ Device id │ Subsystem id │ Op code │ Encoded args    │
//! │ 1 byte    │ 1 byte       │ 1 byte  │ per ArgKind     │
//! └───────────┴──────────────┴─────────┴─────────────────┘
//! ```
//!
//! and the fixed decoding for its response payload (many operations, like
//! a write, expect an empty ack and decode to [`ResultValue::Empty`]).

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;

use super::manifest::{ArgKind, Manifest, ResultKind};
use crate::error::{PinwireError, Result};

/// One invocation argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arg {
    U8(u8),
    U16(u16),
}

impl Arg {
    fn kind(&self) -> ArgKind {
        match self {
            Arg::U8(_) => ArgKind::U8,
            Arg::U16(_) => ArgKind::U16,
        }
    }
}

/// A decoded operation result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultValue {
    /// Ack-style empty response.
    Empty,
    U8(u8),
    U16(u16),
    /// Opaque response bytes.
    Bytes(Bytes),
}

/// An addressable remote operation, immutable once built.
#[derive(Debug, Clone)]
pub struct CapabilityNode {
    /// Full dotted path, e.g. `"ardu1.gpio.digitalWrite"`.
    pub path: String,
    pub device_id: u8,
    pub subsystem_id: u8,
    pub op_code: u8,
    /// Argument encoding rule.
    pub args: Vec<ArgKind>,
    /// Result decoding rule.
    pub result: ResultKind,
}

impl CapabilityNode {
    /// Encode invocation arguments into a command payload.
    ///
    /// Fails with `ArgumentEncoding` when the arity or any argument kind
    /// does not match the node's rule; nothing reaches the wire then.
    pub fn encode_args(&self, args: &[Arg]) -> Result<Vec<u8>> {
        if args.len() != self.args.len() {
            return Err(PinwireError::ArgumentEncoding(format!(
                "{} expects {} argument(s), got {}",
                self.path,
                self.args.len(),
                args.len()
            )));
        }

        let mut payload = Vec::with_capacity(3 + args.len() * 2);
        payload.push(self.device_id);
        payload.push(self.subsystem_id);
        payload.push(self.op_code);

        for (index, (arg, expected)) in args.iter().zip(&self.args).enumerate() {
            if arg.kind() != *expected {
                return Err(PinwireError::ArgumentEncoding(format!(
                    "{} argument {}: expected {:?}, got {:?}",
                    self.path,
                    index,
                    expected,
                    arg.kind()
                )));
            }
            match arg {
                Arg::U8(value) => payload.push(*value),
                Arg::U16(value) => payload.extend_from_slice(&value.to_be_bytes()),
            }
        }

        Ok(payload)
    }

    /// Decode a response payload according to the node's result rule.
    pub fn decode_result(&self, payload: Bytes) -> Result<ResultValue> {
        match self.result {
            ResultKind::Empty => {
                if payload.is_empty() {
                    Ok(ResultValue::Empty)
                } else {
                    Err(PinwireError::Protocol(format!(
                        "{}: expected empty response, got {} byte(s)",
                        self.path,
                        payload.len()
                    )))
                }
            }
            ResultKind::U8 => {
                if payload.len() == 1 {
                    Ok(ResultValue::U8(payload[0]))
                } else {
                    Err(PinwireError::Protocol(format!(
                        "{}: expected 1 response byte, got {}",
                        self.path,
                        payload.len()
                    )))
                }
            }
            ResultKind::U16 => {
                if payload.len() == 2 {
                    Ok(ResultValue::U16(u16::from_be_bytes([payload[0], payload[1]])))
                } else {
                    Err(PinwireError::Protocol(format!(
                        "{}: expected 2 response bytes, got {}",
                        self.path,
                        payload.len()
                    )))
                }
            }
            ResultKind::Bytes => Ok(ResultValue::Bytes(payload)),
        }
    }
}

/// Static lookup tree mapping dotted paths to capability nodes.
#[derive(Debug)]
pub struct CapabilityRegistry {
    nodes: HashMap<String, Arc<CapabilityNode>>,
}

impl CapabilityRegistry {
    /// Build the registry from a manifest. Later entries shadow earlier
    /// ones with the same path.
    pub fn from_manifest(manifest: &Manifest) -> Self {
        let mut nodes = HashMap::new();

        for device in &manifest.devices {
            for subsystem in &device.subsystems {
                for op in &subsystem.operations {
                    let path = format!("{}.{}.{}", device.name, subsystem.name, op.name);
                    let node = CapabilityNode {
                        path: path.clone(),
                        device_id: device.id,
                        subsystem_id: subsystem.id,
                        op_code: op.code,
                        args: op.args.clone(),
                        result: op.result,
                    };
                    nodes.insert(path, Arc::new(node));
                }
            }
        }

        Self { nodes }
    }

    /// Resolve a dotted path to its capability node.
    pub fn resolve(&self, path: &str) -> Result<Arc<CapabilityNode>> {
        self.nodes
            .get(path)
            .cloned()
            .ok_or_else(|| PinwireError::UnknownCapability(path.to_string()))
    }

    /// All registered paths, in arbitrary order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
