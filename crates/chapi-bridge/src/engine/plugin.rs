use std::ffi::CStr;
use std::path::Path;
use std::slice;

use chapi_abi::ffi::{
    RawHandlerChoice, RawResult, RegistryApi, RegistryEntryFn, CHAPI_ABI_VERSION, ERR_OK,
    REGISTRY_ENTRY_SYMBOL,
};
use chapi_abi::{LaunchResult, SearchField, SearchMode, SuiteId};
use libloading::Library;

use super::{EngineFailure, EngineResult, HandlerChoice, RegistryEngine};
use crate::error::{BridgeError, Result};
use crate::native::{raw_or_null, NativeString};
use crate::record::HandlerRecord;
use crate::result::ResultBuffer;

/// Registry engine reached through a C-ABI vtable.
pub struct PluginEngine {
    // Keeps the shared object mapped for as long as `api` is used.
    _lib: Option<Library>,
    api: &'static RegistryApi,
}

impl PluginEngine {
    /// Loads a registry plugin from a shared library.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let lib = unsafe { Library::new(path) }
            .map_err(|e| BridgeError::Plugin(format!("failed to load {}: {e}", path.display())))?;

        let api_ptr = {
            let entry: libloading::Symbol<RegistryEntryFn> =
                unsafe { lib.get(REGISTRY_ENTRY_SYMBOL.as_bytes()) }.map_err(|e| {
                    BridgeError::Plugin(format!("missing symbol {REGISTRY_ENTRY_SYMBOL}: {e}"))
                })?;
            unsafe { entry() }
        };
        if api_ptr.is_null() {
            return Err(BridgeError::Plugin("plugin entry returned null".into()));
        }

        // SAFETY: the entry point hands out a vtable that lives as long as the
        // library, and `lib` is stored alongside it.
        let api: &'static RegistryApi = unsafe { &*api_ptr };
        check_abi(api)?;

        let engine = Self {
            _lib: Some(lib),
            api,
        };
        tracing::debug!(plugin = %engine.plugin_id(), path = %path.display(), "registry plugin loaded");
        Ok(engine)
    }

    /// Wraps a vtable linked into the current binary.
    pub fn from_static(api: &'static RegistryApi) -> Result<Self> {
        check_abi(api)?;
        Ok(Self { _lib: None, api })
    }

    pub fn plugin_id(&self) -> String {
        c_str(self.api.info.id)
    }

    pub fn plugin_version(&self) -> String {
        c_str(self.api.info.semver)
    }

    /// Reads and frees the plugin's diagnostic for the last failing call.
    fn failure(&self) -> EngineFailure {
        let raw = unsafe { (self.api.last_error)() };
        if raw.is_empty() {
            if !raw.data.is_null() {
                unsafe { (self.api.free_result)(raw) };
            }
            return EngineFailure::unspecified();
        }
        let msg = {
            let bytes = unsafe { slice::from_raw_parts(raw.data as *const u8, raw.len) };
            String::from_utf8_lossy(bytes).into_owned()
        };
        unsafe { (self.api.free_result)(raw) };
        EngineFailure::new(msg)
    }

    fn status(&self, rc: i32) -> EngineResult {
        if rc == ERR_OK {
            Ok(())
        } else {
            Err(self.failure())
        }
    }

    /// Copies a plugin payload into `out` and hands it back to the plugin.
    /// The payload is freed whether or not the call succeeded.
    fn query(&self, rc: i32, raw: RawResult, out: &mut ResultBuffer) -> EngineResult {
        let copied = if raw.is_empty() {
            Ok(())
        } else {
            let bytes = unsafe { slice::from_raw_parts(raw.data as *const u8, raw.len) };
            out.fill_bytes(bytes)
        };
        if !raw.data.is_null() {
            unsafe { (self.api.free_result)(raw) };
        }
        self.status(rc)?;
        copied.map_err(|e| EngineFailure::new(e.to_string()))
    }
}

fn check_abi(api: &RegistryApi) -> Result<()> {
    if api.info.abi_version != CHAPI_ABI_VERSION {
        return Err(BridgeError::Plugin(format!(
            "ABI mismatch: host={} plugin={}",
            CHAPI_ABI_VERSION, api.info.abi_version
        )));
    }
    Ok(())
}

fn c_str(ptr: *const std::ffi::c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

impl RegistryEngine for PluginEngine {
    fn initialize(&self) -> EngineResult {
        let rc = unsafe { (self.api.initialize)() };
        self.status(rc)
    }

    fn check_internal_handlers(&self) -> EngineResult {
        let rc = unsafe { (self.api.check_internal_handlers)() };
        self.status(rc)
    }

    fn finalize(&self) {
        unsafe { (self.api.finalize)() }
    }

    fn find_handler(
        &self,
        caller_id: Option<&NativeString>,
        field: SearchField,
        value: &NativeString,
        out: &mut ResultBuffer,
    ) -> EngineResult {
        let mut raw = RawResult::EMPTY;
        let rc = unsafe {
            (self.api.find_handler)(raw_or_null(caller_id), field.as_raw(), value.as_raw(), &mut raw)
        };
        self.query(rc, raw, out)
    }

    fn find_for_suite(&self, suite: SuiteId, out: &mut ResultBuffer) -> EngineResult {
        let mut raw = RawResult::EMPTY;
        let rc = unsafe { (self.api.find_for_suite)(suite.0, &mut raw) };
        self.query(rc, raw, out)
    }

    fn get_all(
        &self,
        caller_id: Option<&NativeString>,
        field: SearchField,
        out: &mut ResultBuffer,
    ) -> EngineResult {
        let mut raw = RawResult::EMPTY;
        let rc = unsafe { (self.api.get_all)(raw_or_null(caller_id), field.as_raw(), &mut raw) };
        self.query(rc, raw, out)
    }

    fn get_handler(
        &self,
        caller_id: Option<&NativeString>,
        id: &NativeString,
        mode: SearchMode,
        out: &mut ResultBuffer,
    ) -> EngineResult {
        let mut raw = RawResult::EMPTY;
        let rc = unsafe {
            (self.api.get_handler)(raw_or_null(caller_id), id.as_raw(), mode.as_raw(), &mut raw)
        };
        self.query(rc, raw, out)
    }

    fn get_handler_field(
        &self,
        id: &NativeString,
        field: SearchField,
        out: &mut ResultBuffer,
    ) -> EngineResult {
        let mut raw = RawResult::EMPTY;
        let rc = unsafe { (self.api.get_handler_field)(id.as_raw(), field.as_raw(), &mut raw) };
        self.query(rc, raw, out)
    }

    fn handler_by_url(
        &self,
        caller_id: Option<&NativeString>,
        url: &NativeString,
        action: Option<&NativeString>,
        out: &mut ResultBuffer,
    ) -> EngineResult {
        let mut raw = RawResult::EMPTY;
        let rc = unsafe {
            (self.api.handler_by_url)(
                raw_or_null(caller_id),
                url.as_raw(),
                raw_or_null(action),
                &mut raw,
            )
        };
        self.query(rc, raw, out)
    }

    fn register_handler(&self, record: &HandlerRecord) -> EngineResult {
        let rc = record.with_raw(|raw| unsafe { (self.api.register_handler)(raw) });
        self.status(rc)
    }

    fn unregister_handler(&self, id: &NativeString) -> EngineResult {
        let rc = unsafe { (self.api.unregister_handler)(id.as_raw()) };
        self.status(rc)
    }

    fn select_handler(
        &self,
        action: Option<&NativeString>,
        candidates: &[HandlerChoice],
    ) -> EngineResult<Option<usize>> {
        let raw: Vec<RawHandlerChoice> = candidates
            .iter()
            .map(|c| RawHandlerChoice {
                handler_id: c.handler_id.as_raw(),
                action_name: raw_or_null(c.action_name.as_ref()),
            })
            .collect();
        let mut selected: i32 = -1;
        let rc = unsafe {
            (self.api.select_handler)(raw_or_null(action), raw.as_ptr(), raw.len(), &mut selected)
        };
        self.status(rc)?;

        match usize::try_from(selected) {
            Err(_) => Ok(None),
            Ok(i) if i < candidates.len() => Ok(Some(i)),
            Ok(i) => Err(EngineFailure::new(format!(
                "selected candidate {i} of {}",
                candidates.len()
            ))),
        }
    }

    fn execute_handler(&self, id: &NativeString) -> LaunchResult {
        LaunchResult::from_raw(unsafe { (self.api.execute_handler)(id.as_raw()) })
    }

    fn platform_finish(&self, transaction_id: i32) -> EngineResult<bool> {
        let mut should_exit = false;
        let rc = unsafe { (self.api.platform_finish)(transaction_id, &mut should_exit) };
        self.status(rc)?;
        Ok(should_exit)
    }
}
