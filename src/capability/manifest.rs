//! Capability manifest.
//!
//! The manifest is the static description of everything the remote device
//! can do: devices → subsystems → operations, each operation with a fixed
//! wire code, argument encoding, and result shape. It is supplied at
//! startup (declared in code or loaded from JSON) and never renegotiated
//! at runtime.
//!
//! # Example
//!
//! ```
//! use pinwire::capability::Manifest;
//!
//! let manifest = Manifest::single_board("ardu1", 1);
//! let json = manifest.to_json().unwrap();
//! let parsed = Manifest::from_json(&json).unwrap();
//! assert_eq!(parsed.devices.len(), 1);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Wire codes for the standard GPIO subsystem.
pub mod gpio {
    /// Subsystem id of the GPIO surface.
    pub const SUBSYSTEM: u8 = 0x01;

    pub const PIN_MODE: u8 = 0x01;
    pub const DIGITAL_WRITE: u8 = 0x02;
    pub const DIGITAL_READ: u8 = 0x03;
    pub const ANALOG_WRITE: u8 = 0x04;
    pub const ANALOG_READ: u8 = 0x05;
}

/// Kind of one encoded argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgKind {
    /// One byte.
    U8,
    /// Two bytes, big endian.
    U16,
}

/// Shape of an operation's response payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    /// Ack-style: the response payload must be empty.
    #[default]
    Empty,
    /// One byte.
    U8,
    /// Two bytes, big endian.
    U16,
    /// Opaque bytes, passed through.
    Bytes,
}

/// One remote operation: name, wire code, and encoding rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationSpec {
    pub name: String,
    pub code: u8,
    #[serde(default)]
    pub args: Vec<ArgKind>,
    #[serde(default)]
    pub result: ResultKind,
}

impl OperationSpec {
    pub fn new(name: impl Into<String>, code: u8) -> Self {
        Self {
            name: name.into(),
            code,
            args: Vec::new(),
            result: ResultKind::Empty,
        }
    }

    /// Append an argument to the operation's encoding rule.
    pub fn arg(mut self, kind: ArgKind) -> Self {
        self.args.push(kind);
        self
    }

    /// Set the operation's result shape.
    pub fn result(mut self, kind: ResultKind) -> Self {
        self.result = kind;
        self
    }
}

/// A named group of operations sharing one subsystem id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubsystemSpec {
    pub name: String,
    pub id: u8,
    pub operations: Vec<OperationSpec>,
}

impl SubsystemSpec {
    pub fn new(name: impl Into<String>, id: u8) -> Self {
        Self {
            name: name.into(),
            id,
            operations: Vec::new(),
        }
    }

    pub fn operation(mut self, op: OperationSpec) -> Self {
        self.operations.push(op);
        self
    }

    /// The standard GPIO surface: pin modes, digital and analog I/O.
    pub fn gpio() -> Self {
        Self::new("gpio", gpio::SUBSYSTEM)
            .operation(
                OperationSpec::new("pinMode", gpio::PIN_MODE)
                    .arg(ArgKind::U8)
                    .arg(ArgKind::U8),
            )
            .operation(
                OperationSpec::new("digitalWrite", gpio::DIGITAL_WRITE)
                    .arg(ArgKind::U8)
                    .arg(ArgKind::U8),
            )
            .operation(
                OperationSpec::new("digitalRead", gpio::DIGITAL_READ)
                    .arg(ArgKind::U8)
                    .result(ResultKind::U8),
            )
            .operation(
                OperationSpec::new("analogWrite", gpio::ANALOG_WRITE)
                    .arg(ArgKind::U8)
                    .arg(ArgKind::U8),
            )
            .operation(
                OperationSpec::new("analogRead", gpio::ANALOG_READ)
                    .arg(ArgKind::U8)
                    .result(ResultKind::U16),
            )
    }
}

/// One logical remote device with its subsystems.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSpec {
    pub name: String,
    pub id: u8,
    pub subsystems: Vec<SubsystemSpec>,
}

impl DeviceSpec {
    pub fn new(name: impl Into<String>, id: u8) -> Self {
        Self {
            name: name.into(),
            id,
            subsystems: Vec::new(),
        }
    }

    pub fn subsystem(mut self, subsystem: SubsystemSpec) -> Self {
        self.subsystems.push(subsystem);
        self
    }
}

/// The full capability description supplied at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    pub devices: Vec<DeviceSpec>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn device(mut self, device: DeviceSpec) -> Self {
        self.devices.push(device);
        self
    }

    /// A manifest for a single attached board exposing the standard GPIO
    /// surface, addressable as `<name>.gpio.<operation>`.
    pub fn single_board(name: impl Into<String>, device_id: u8) -> Self {
        Self::new().device(DeviceSpec::new(name, device_id).subsystem(SubsystemSpec::gpio()))
    }

    /// Parse a manifest from its JSON form.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the manifest to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_board_exposes_the_gpio_surface() {
        let manifest = Manifest::single_board("ardu1", 1);
        assert_eq!(manifest.devices.len(), 1);

        let device = &manifest.devices[0];
        assert_eq!(device.name, "ardu1");
        assert_eq!(device.id, 1);

        let gpio_sub = &device.subsystems[0];
        assert_eq!(gpio_sub.id, gpio::SUBSYSTEM);
        let names: Vec<&str> = gpio_sub
            .operations
            .iter()
            .map(|op| op.name.as_str())
            .collect();
        assert_eq!(
            names,
            [
                "pinMode",
                "digitalWrite",
                "digitalRead",
                "analogWrite",
                "analogRead"
            ]
        );
    }

    #[test]
    fn json_roundtrip() {
        let manifest = Manifest::single_board("ardu1", 1);
        let json = manifest.to_json().unwrap();
        let parsed = Manifest::from_json(&json).unwrap();

        assert_eq!(parsed.devices.len(), 1);
        assert_eq!(parsed.devices[0].subsystems[0].operations.len(), 5);
        assert_eq!(
            parsed.devices[0].subsystems[0].operations[1].args,
            vec![ArgKind::U8, ArgKind::U8]
        );
    }

    #[test]
    fn omitted_args_and_result_default() {
        let json = r#"{
            "devices": [{
                "name": "dev", "id": 2,
                "subsystems": [{
                    "name": "sys", "id": 1,
                    "operations": [{ "name": "ping", "code": 9 }]
                }]
            }]
        }"#;

        let manifest = Manifest::from_json(json).unwrap();
        let op = &manifest.devices[0].subsystems[0].operations[0];
        assert!(op.args.is_empty());
        assert_eq!(op.result, ResultKind::Empty);
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(Manifest::from_json("{ not json").is_err());
    }
}
