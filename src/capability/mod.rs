//! Capability module - the addressable operation namespace.
//!
//! Provides:
//! - [`Manifest`] - static description of devices, subsystems, and
//!   operations, fixed at startup
//! - [`CapabilityRegistry`] - dotted-path lookup (`"ardu1.gpio.digitalWrite"`)
//!   to immutable [`CapabilityNode`]s with fixed argument/result encodings

mod manifest;
mod registry;

pub use manifest::{gpio, ArgKind, DeviceSpec, Manifest, OperationSpec, ResultKind, SubsystemSpec};
pub use registry::{Arg, CapabilityNode, CapabilityRegistry, ResultValue};
