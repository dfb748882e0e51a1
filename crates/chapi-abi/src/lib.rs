//! chapi ABI crate: stable contracts shared by the marshaling bridge and registry engine plugins.

pub mod ffi;
pub mod field;
pub mod wire;

pub use field::*;
pub use wire::{HandlerSummary, WireError};
