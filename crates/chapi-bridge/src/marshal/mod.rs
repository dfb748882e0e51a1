//! Managed-to-native conversion of strings, string arrays and action-name maps.

pub mod action_map;
pub mod array;

pub use action_map::{marshal_action_map, ActionMap};
pub use array::{marshal_string, marshal_string_array};
