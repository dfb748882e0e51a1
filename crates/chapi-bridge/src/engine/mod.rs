//! The registry engine the bridge drives.
//!
//! The engine owns storage, matching and launching. The bridge hands it native
//! strings and records and gets back status codes and result buffers.

pub mod plugin;

use chapi_abi::{LaunchResult, SearchField, SearchMode, SuiteId};
use thiserror::Error;

use crate::native::NativeString;
use crate::record::HandlerRecord;
use crate::result::ResultBuffer;

pub use plugin::PluginEngine;

/// Failure reported by the engine, with its diagnostic if it gave one.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct EngineFailure {
    pub message: String,
}

impl EngineFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn unspecified() -> Self {
        Self::new("registry engine reported failure")
    }
}

pub type EngineResult<T = ()> = std::result::Result<T, EngineFailure>;

/// One `select_handler` candidate in native form.
#[derive(Debug)]
pub struct HandlerChoice {
    pub handler_id: NativeString,
    pub action_name: Option<NativeString>,
}

/// Operations the bridge consumes from the registry engine.
///
/// `caller_id` is `None` when the caller is anonymous; engines must not treat
/// that as an empty id. Query operations leave `out` empty for "not found".
pub trait RegistryEngine: Send + Sync {
    fn initialize(&self) -> EngineResult;

    /// Verifies the built-in handlers after `initialize`.
    fn check_internal_handlers(&self) -> EngineResult;

    fn finalize(&self);

    fn find_handler(
        &self,
        caller_id: Option<&NativeString>,
        field: SearchField,
        value: &NativeString,
        out: &mut ResultBuffer,
    ) -> EngineResult;

    fn find_for_suite(&self, suite: SuiteId, out: &mut ResultBuffer) -> EngineResult;

    fn get_all(
        &self,
        caller_id: Option<&NativeString>,
        field: SearchField,
        out: &mut ResultBuffer,
    ) -> EngineResult;

    fn get_handler(
        &self,
        caller_id: Option<&NativeString>,
        id: &NativeString,
        mode: SearchMode,
        out: &mut ResultBuffer,
    ) -> EngineResult;

    fn get_handler_field(
        &self,
        id: &NativeString,
        field: SearchField,
        out: &mut ResultBuffer,
    ) -> EngineResult;

    fn handler_by_url(
        &self,
        caller_id: Option<&NativeString>,
        url: &NativeString,
        action: Option<&NativeString>,
        out: &mut ResultBuffer,
    ) -> EngineResult;

    fn register_handler(&self, record: &HandlerRecord) -> EngineResult;

    fn unregister_handler(&self, id: &NativeString) -> EngineResult;

    /// Index of the chosen candidate, or `None` if nothing was chosen.
    fn select_handler(
        &self,
        action: Option<&NativeString>,
        candidates: &[HandlerChoice],
    ) -> EngineResult<Option<usize>>;

    fn execute_handler(&self, id: &NativeString) -> LaunchResult;

    /// Returns whether the caller should exit.
    fn platform_finish(&self, transaction_id: i32) -> EngineResult<bool>;
}
