//! Native handler record: the flat form handed to the registry engine.

pub mod builder;

use chapi_abi::ffi::{RawHandlerRecord, Utf16Array, Utf16Str};
use chapi_abi::SuiteId;

use crate::native::{raw_or_null, NativeString, StringArrayHandle};

pub use builder::{build, fill};

/// One handler's registration data in native form.
///
/// A default record is all-zero: no strings, empty arrays. Fields are filled
/// in order by [`fill`], so a record abandoned part way holds only what was
/// decoded before the failure.
#[derive(Debug, Default)]
pub struct HandlerRecord {
    pub id: Option<NativeString>,
    pub suite_id: SuiteId,
    pub class_name: Option<NativeString>,
    pub registration_method: i32,
    pub types: StringArrayHandle,
    pub suffixes: StringArrayHandle,
    pub actions: StringArrayHandle,
    pub locales: StringArrayHandle,
    /// Row-major `locales.len() * actions.len()`.
    pub action_names: StringArrayHandle,
    pub accesses: StringArrayHandle,
}

/// What a single [`HandlerRecord::release`] call gave back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReleaseSummary {
    /// `id` and `class_name`.
    pub scalars: usize,
    /// Array elements across all six arrays.
    pub elements: usize,
    /// Array backing buffers.
    pub buffers: usize,
}

impl HandlerRecord {
    fn arrays_mut(&mut self) -> [&mut StringArrayHandle; 6] {
        [
            &mut self.types,
            &mut self.suffixes,
            &mut self.actions,
            &mut self.locales,
            &mut self.action_names,
            &mut self.accesses,
        ]
    }

    /// Releases every owned resource and resets the record to all-zero.
    ///
    /// Unpopulated fields are skipped, so this is safe on a record that failed
    /// construction at any step, and calling it again releases nothing.
    pub fn release(&mut self) -> ReleaseSummary {
        let mut summary = ReleaseSummary::default();
        if self.id.take().is_some() {
            summary.scalars += 1;
        }
        self.suite_id = SuiteId::default();
        if self.class_name.take().is_some() {
            summary.scalars += 1;
        }
        self.registration_method = 0;
        for array in self.arrays_mut() {
            if array.has_buffer() {
                summary.buffers += 1;
            }
            summary.elements += array.release();
        }
        summary
    }

    /// True when nothing is held.
    pub fn is_released(&self) -> bool {
        self.id.is_none()
            && self.class_name.is_none()
            && [
                &self.types,
                &self.suffixes,
                &self.actions,
                &self.locales,
                &self.action_names,
                &self.accesses,
            ]
            .iter()
            .all(|a| !a.has_buffer())
    }

    /// Runs `f` with a borrowed C view of the record.
    ///
    /// The view points into `self` and must not outlive the call.
    pub fn with_raw<R>(&self, f: impl FnOnce(&RawHandlerRecord) -> R) -> R {
        let types = self.types.raw_views();
        let suffixes = self.suffixes.raw_views();
        let actions = self.actions.raw_views();
        let locales = self.locales.raw_views();
        let action_names = self.action_names.raw_views();
        let accesses = self.accesses.raw_views();

        let raw = RawHandlerRecord {
            id: raw_or_null(self.id.as_ref()),
            suite_id: self.suite_id.0,
            class_name: raw_or_null(self.class_name.as_ref()),
            flag: self.registration_method,
            types: raw_array(&types),
            suffixes: raw_array(&suffixes),
            actions: raw_array(&actions),
            locales: raw_array(&locales),
            action_names: raw_array(&action_names),
            accesses: raw_array(&accesses),
        };
        f(&raw)
    }
}

fn raw_array(views: &[Utf16Str]) -> Utf16Array {
    if views.is_empty() {
        Utf16Array::EMPTY
    } else {
        Utf16Array {
            ptr: views.as_ptr(),
            len: views.len(),
        }
    }
}

impl Drop for HandlerRecord {
    fn drop(&mut self) {
        self.release();
    }
}
