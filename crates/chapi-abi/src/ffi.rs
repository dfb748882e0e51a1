use core::ffi::{c_char, c_void};
use core::{ptr, slice};

/// Bump this when you break the ABI. The bridge checks it at load time.
pub const CHAPI_ABI_VERSION: u32 = 1;

pub const REGISTRY_ENTRY_SYMBOL: &str = "chapi_registry_entry_v1";

pub const ERR_OK: i32 = 0;
pub const ERR_FAIL: i32 = 1;

/// Borrowed run of UTF-16 code units. A null `ptr` means "absent",
/// which is distinct from an empty string (non-null, `len == 0`).
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct Utf16Str {
    pub ptr: *const u16,
    pub len: usize,
}

impl Utf16Str {
    pub const NULL: Utf16Str = Utf16Str {
        ptr: ptr::null(),
        len: 0,
    };

    #[inline]
    pub fn is_null(&self) -> bool {
        self.ptr.is_null()
    }

    /// # Safety
    /// `ptr` must be null or valid for `len` reads for the chosen lifetime.
    pub unsafe fn as_units<'a>(&self) -> Option<&'a [u16]> {
        if self.ptr.is_null() {
            None
        } else if self.len == 0 {
            Some(&[])
        } else {
            Some(slice::from_raw_parts(self.ptr, self.len))
        }
    }
}

/// Borrowed array of [`Utf16Str`]. `len == 0` arrays may carry a null `ptr`.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct Utf16Array {
    pub ptr: *const Utf16Str,
    pub len: usize,
}

impl Utf16Array {
    pub const EMPTY: Utf16Array = Utf16Array {
        ptr: ptr::null(),
        len: 0,
    };

    /// # Safety
    /// `ptr` must be valid for `len` reads when `len > 0`.
    pub unsafe fn as_slice<'a>(&self) -> &'a [Utf16Str] {
        if self.ptr.is_null() || self.len == 0 {
            &[]
        } else {
            slice::from_raw_parts(self.ptr, self.len)
        }
    }
}

/// Query payload allocated by the plugin. `len` counts **bytes**; the payload
/// is UTF-16 in native byte order. Must be handed back to `free_result` once.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct RawResult {
    pub data: *mut c_void,
    pub len: usize,
}

impl RawResult {
    pub const EMPTY: RawResult = RawResult {
        data: ptr::null_mut(),
        len: 0,
    };

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_null() || self.len == 0
    }
}

/// Flat handler record handed to `register_handler`.
/// `action_names` is row-major: `locales.len * actions.len` entries.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct RawHandlerRecord {
    pub id: Utf16Str,
    pub suite_id: i32,
    pub class_name: Utf16Str,
    pub flag: i32,
    pub types: Utf16Array,
    pub suffixes: Utf16Array,
    pub actions: Utf16Array,
    pub locales: Utf16Array,
    pub action_names: Utf16Array,
    pub accesses: Utf16Array,
}

/// One candidate for `select_handler`; `action_name` may be null.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct RawHandlerChoice {
    pub handler_id: Utf16Str,
    pub action_name: Utf16Str,
}

#[repr(C)]
pub struct PluginInfo {
    pub abi_version: u32,
    pub id: *const c_char,     // "jsr211-native"
    pub semver: *const c_char, // "0.1.0"
}

// ---------- Function pointer types (C ABI) ----------

pub type InitializeFn = unsafe extern "C" fn() -> i32;
pub type CheckInternalHandlersFn = unsafe extern "C" fn() -> i32;
pub type FinalizeFn = unsafe extern "C" fn();

pub type FindHandlerFn = unsafe extern "C" fn(
    caller_id: Utf16Str,
    field: i32,
    value: Utf16Str,
    out: *mut RawResult,
) -> i32;
pub type FindForSuiteFn = unsafe extern "C" fn(suite_id: i32, out: *mut RawResult) -> i32;
pub type GetAllFn = unsafe extern "C" fn(caller_id: Utf16Str, field: i32, out: *mut RawResult) -> i32;
pub type GetHandlerFn =
    unsafe extern "C" fn(caller_id: Utf16Str, id: Utf16Str, mode: i32, out: *mut RawResult) -> i32;
pub type GetHandlerFieldFn =
    unsafe extern "C" fn(id: Utf16Str, field_id: i32, out: *mut RawResult) -> i32;
pub type HandlerByUrlFn = unsafe extern "C" fn(
    caller_id: Utf16Str,
    url: Utf16Str,
    action: Utf16Str,
    out: *mut RawResult,
) -> i32;
pub type FreeResultFn = unsafe extern "C" fn(result: RawResult);

pub type RegisterHandlerFn = unsafe extern "C" fn(record: *const RawHandlerRecord) -> i32;
pub type UnregisterHandlerFn = unsafe extern "C" fn(id: Utf16Str) -> i32;

/// Writes the chosen index (or -1) to `selected`.
pub type SelectHandlerFn = unsafe extern "C" fn(
    action: Utf16Str,
    candidates: *const RawHandlerChoice,
    count: usize,
    selected: *mut i32,
) -> i32;
pub type ExecuteHandlerFn = unsafe extern "C" fn(id: Utf16Str) -> i32;
pub type PlatformFinishFn = unsafe extern "C" fn(transaction_id: i32, should_exit: *mut bool) -> i32;

/// UTF-8 diagnostic for the last failing call on this thread; release with `free_result`.
pub type LastErrorFn = unsafe extern "C" fn() -> RawResult;

// ---------- VTable ----------

#[repr(C)]
pub struct RegistryApi {
    pub info: PluginInfo,

    pub initialize: InitializeFn,
    pub check_internal_handlers: CheckInternalHandlersFn,
    pub finalize: FinalizeFn,

    pub find_handler: FindHandlerFn,
    pub find_for_suite: FindForSuiteFn,
    pub get_all: GetAllFn,
    pub get_handler: GetHandlerFn,
    pub get_handler_field: GetHandlerFieldFn,
    pub handler_by_url: HandlerByUrlFn,

    pub register_handler: RegisterHandlerFn,
    pub unregister_handler: UnregisterHandlerFn,

    pub select_handler: SelectHandlerFn,
    pub execute_handler: ExecuteHandlerFn,
    pub platform_finish: PlatformFinishFn,

    // Diagnostics & memory management
    pub last_error: LastErrorFn,
    pub free_result: FreeResultFn,
}

/// Plugin must export `chapi_registry_entry_v1` returning a pointer to a static `RegistryApi`.
pub type RegistryEntryFn = unsafe extern "C" fn() -> *const RegistryApi;

// SAFETY: a vtable is immutable once published; its pointers refer to static
// strings and `extern "C"` functions that are callable from any thread.
unsafe impl Send for RegistryApi {}
unsafe impl Sync for RegistryApi {}
