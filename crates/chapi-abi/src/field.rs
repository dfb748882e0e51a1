//! Registry-wide identifiers and enumerations shared across the ABI.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of the installed application suite that owns a handler.
/// A newtype keeps it from mixing with field ids and transaction ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Default, Serialize, Deserialize)]
pub struct SuiteId(pub i32);

impl From<i32> for SuiteId {
    #[inline]
    fn from(value: i32) -> Self {
        SuiteId(value)
    }
}

impl From<SuiteId> for i32 {
    #[inline]
    fn from(id: SuiteId) -> i32 {
        id.0
    }
}

impl fmt::Display for SuiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registration method discriminator stored with each handler.
pub const REGISTRATION_STATIC: i32 = 0;
pub const REGISTRATION_DYNAMIC: i32 = 1;

/// Handler record fields addressable by search and field queries.
/// Discriminants are the engine's wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum SearchField {
    Id = 0,
    Types = 1,
    Suffixes = 2,
    Actions = 3,
    Locales = 4,
    ActionMap = 5,
    Accesses = 6,
}

impl SearchField {
    pub const COUNT: usize = 7;

    pub const ALL: [SearchField; Self::COUNT] = [
        SearchField::Id,
        SearchField::Types,
        SearchField::Suffixes,
        SearchField::Actions,
        SearchField::Locales,
        SearchField::ActionMap,
        SearchField::Accesses,
    ];

    #[inline]
    pub fn as_raw(self) -> i32 {
        self as i32
    }

    pub fn from_raw(raw: i32) -> Option<Self> {
        usize::try_from(raw).ok().and_then(|i| Self::ALL.get(i).copied())
    }
}

/// ID matching mode for `get_handler`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(i32)]
pub enum SearchMode {
    #[default]
    Exact = 0,
    Prefix = 1,
}

impl SearchMode {
    #[inline]
    pub fn as_raw(self) -> i32 {
        self as i32
    }

    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(SearchMode::Exact),
            1 => Some(SearchMode::Prefix),
            _ => None,
        }
    }
}

/// Outcome of asking the platform to launch a native handler.
/// Unknown codes are preserved rather than collapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LaunchResult {
    Ok,
    OkShouldExit,
    Error,
    NotSupported,
    Other(i32),
}

impl LaunchResult {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => LaunchResult::Ok,
            1 => LaunchResult::OkShouldExit,
            2 => LaunchResult::Error,
            3 => LaunchResult::NotSupported,
            other => LaunchResult::Other(other),
        }
    }

    pub fn as_raw(self) -> i32 {
        match self {
            LaunchResult::Ok => 0,
            LaunchResult::OkShouldExit => 1,
            LaunchResult::Error => 2,
            LaunchResult::NotSupported => 3,
            LaunchResult::Other(code) => code,
        }
    }

    #[inline]
    pub fn is_success(self) -> bool {
        matches!(self, LaunchResult::Ok | LaunchResult::OkShouldExit)
    }
}
