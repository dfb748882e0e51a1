use std::fmt;

use chapi_abi::ffi::Utf16Str;

use super::ledger::{self, AllocKind};
use super::string::NativeString;
use crate::error::MarshalError;

/// Owning native array of decoded strings.
///
/// Releasing it releases every element first and then the backing buffer.
/// An empty handle owns no buffer and releasing it does nothing.
#[derive(Default)]
pub struct StringArrayHandle {
    items: Vec<NativeString>,
    buffer: bool,
}

impl StringArrayHandle {
    #[inline]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Allocates the backing buffer for exactly `capacity` elements.
    pub fn with_capacity(capacity: usize, what: &'static str) -> Result<Self, MarshalError> {
        if capacity == 0 {
            return Ok(Self::empty());
        }
        let mut items = Vec::new();
        items
            .try_reserve_exact(capacity)
            .map_err(|_| MarshalError::oom(what))?;
        ledger::acquire(AllocKind::ArrayBuffer);
        Ok(Self {
            items,
            buffer: true,
        })
    }

    /// Appends within the reserved capacity.
    pub(crate) fn push(&mut self, s: NativeString) {
        debug_assert!(self.items.len() < self.items.capacity());
        self.items.push(s);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether a backing buffer is still held.
    #[inline]
    pub fn has_buffer(&self) -> bool {
        self.buffer
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&NativeString> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, NativeString> {
        self.items.iter()
    }

    pub fn to_strings(&self) -> Vec<String> {
        self.items.iter().map(NativeString::to_string_lossy).collect()
    }

    /// Borrowed C views of the elements. Valid while `self` is alive.
    pub fn raw_views(&self) -> Vec<Utf16Str> {
        self.items.iter().map(NativeString::as_raw).collect()
    }

    /// Releases every element, then the buffer. Returns how many elements
    /// were released. Safe to call on an already released handle.
    pub fn release(&mut self) -> usize {
        let n = self.items.len();
        self.items.clear();
        if self.buffer {
            self.items = Vec::new();
            self.buffer = false;
            ledger::release(AllocKind::ArrayBuffer);
        }
        n
    }
}

impl Drop for StringArrayHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for StringArrayHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}
