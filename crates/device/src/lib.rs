//! Device chains: a fixed table of graphics operations, devices that
//! implement some of them, and stages that wrap a device to filter or
//! observe what reaches it.
//!
//! Callers always talk to the head of a chain. Stages are inserted with
//! [`subclass::install`] and removed with [`subclass::uninstall`]; the head's
//! identity survives both.

pub mod defaults;
pub mod device;
pub mod enumerator;
pub mod error;
pub mod forward;
pub mod memory;
pub mod op;
pub mod procs;
pub mod subclass;

pub use device::{Device, DeviceId, DeviceState, FinalizeHook, Prototype, TypeWitness};
pub use enumerator::{DefaultImageEnum, DefaultTextEnum, ImageEnum, NullImageEnum, NullTextEnum, TextEnum};
pub use error::{DeviceError, DeviceResult};
pub use forward::{ForwardingStage, StagePolicy};
pub use memory::{Allocation, Arena, BoundedMemory, DeviceMemory, HeapMemory};
pub use op::{Op, OpCategory, OpTable, ProcSlot, fill_in_procs};
pub use procs::{CompositorTarget, DevSpecRequest, DeviceProcs};
pub use subclass::{install, resync, uninstall};
