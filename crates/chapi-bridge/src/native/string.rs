use std::fmt;

use chapi_abi::ffi::Utf16Str;

use super::ledger::{self, AllocKind};
use crate::error::MarshalError;

/// Owned native string: a heap buffer of UTF-16 code units.
/// Released exactly once, when dropped.
pub struct NativeString {
    units: Vec<u16>,
}

impl NativeString {
    /// Copies `units` into a fresh native buffer. Allocation failure is
    /// reported instead of aborting.
    pub fn from_units(units: &[u16], what: &'static str) -> Result<Self, MarshalError> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(units.len())
            .map_err(|_| MarshalError::oom(what))?;
        buf.extend_from_slice(units);
        ledger::acquire(AllocKind::String);
        Ok(Self { units: buf })
    }

    /// Encodes a Rust string as a native UTF-16 string.
    pub fn encode(s: &str, what: &'static str) -> Result<Self, MarshalError> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(s.len())
            .map_err(|_| MarshalError::oom(what))?;
        buf.extend(s.encode_utf16());
        buf.shrink_to_fit();
        ledger::acquire(AllocKind::String);
        Ok(Self { units: buf })
    }

    /// Encodes an optional argument; `None` stays absent instead of becoming "".
    pub fn encode_opt(s: Option<&str>, what: &'static str) -> Result<Option<Self>, MarshalError> {
        s.map(|s| Self::encode(s, what)).transpose()
    }

    #[inline]
    pub fn as_units(&self) -> &[u16] {
        &self.units
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Borrowed C view. Valid while `self` is alive and unmoved.
    #[inline]
    pub fn as_raw(&self) -> Utf16Str {
        Utf16Str {
            ptr: self.units.as_ptr(),
            len: self.units.len(),
        }
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(&self.units)
    }
}

/// C view of an optional argument; absent maps to a null pointer.
#[inline]
pub fn raw_or_null(s: Option<&NativeString>) -> Utf16Str {
    s.map_or(Utf16Str::NULL, NativeString::as_raw)
}

impl Drop for NativeString {
    fn drop(&mut self) {
        ledger::release(AllocKind::String);
    }
}

impl fmt::Debug for NativeString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.to_string_lossy(), f)
    }
}

impl PartialEq<str> for NativeString {
    fn eq(&self, other: &str) -> bool {
        self.units.iter().copied().eq(other.encode_utf16())
    }
}

impl PartialEq<&str> for NativeString {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}
