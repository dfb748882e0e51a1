//! Bridge entry points: marshal arguments, call the engine, convert results.
//!
//! Every native allocation made by an operation is released before it
//! returns, on success and on every failure path.

pub mod managed;
pub mod typed;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chapi_abi::{LaunchResult, SearchField, SearchMode, SuiteId};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::{BridgeConfig, EngineLocking};
use crate::engine::{EngineResult, HandlerChoice, PluginEngine, RegistryEngine};
use crate::error::{BridgeError, MarshalError, Operation, Result};
use crate::lifecycle::RegistryLifecycle;
use crate::managed::{ManagedEnv, ObjectRef};
use crate::native::NativeString;
use crate::record::{self, HandlerRecord};
use crate::result::{self, ResultBuffer};
use crate::schema::SchemaBinder;

pub use managed::ManagedFacade;

/// Turns a filled result buffer into the caller's representation.
pub(crate) type Convert<T> = fn(ResultBuffer) -> std::result::Result<T, MarshalError>;

// Held for its drop only.
#[allow(dead_code)]
enum Gate<'a> {
    Shared(RwLockReadGuard<'a, ()>),
    Exclusive(RwLockWriteGuard<'a, ()>),
}

/// An open handle on the registry engine.
///
/// Opening takes one reference on the lifecycle guard; closing or dropping
/// gives it back exactly once.
pub struct RegistryStore {
    engine: Arc<dyn RegistryEngine>,
    lifecycle: Arc<RegistryLifecycle>,
    schema: SchemaBinder,
    gate: RwLock<()>,
    config: BridgeConfig,
    open: AtomicBool,
}

impl RegistryStore {
    pub fn open(
        engine: Arc<dyn RegistryEngine>,
        lifecycle: Arc<RegistryLifecycle>,
        config: BridgeConfig,
    ) -> Result<Self> {
        lifecycle.init(engine.as_ref(), config.check_internal_handlers)?;
        Ok(Self {
            engine,
            lifecycle,
            schema: SchemaBinder::new(),
            gate: RwLock::new(()),
            config,
            open: AtomicBool::new(true),
        })
    }

    /// Opens against the process-wide lifecycle guard.
    pub fn open_global(engine: Arc<dyn RegistryEngine>, config: BridgeConfig) -> Result<Self> {
        Self::open(engine, RegistryLifecycle::global(), config)
    }

    /// Loads the plugin named by `config.plugin_path` and opens against the
    /// process-wide guard.
    pub fn from_config(config: BridgeConfig) -> Result<Self> {
        let path = config
            .plugin_path
            .clone()
            .ok_or_else(|| BridgeError::Plugin("no registry plugin configured".into()))?;
        let engine = PluginEngine::load(path)?;
        Self::open_global(Arc::new(engine), config)
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Releases this store's lifecycle reference. Later calls do nothing.
    pub fn close(&self) -> Result<()> {
        if self.open.swap(false, Ordering::AcqRel) {
            let _g = self.gate.write();
            self.lifecycle.finalize(self.engine.as_ref())?;
        }
        Ok(())
    }

    /// Managed-object entry points bound to `env`.
    pub fn managed<'a>(&'a self, env: &'a dyn ManagedEnv) -> ManagedFacade<'a> {
        ManagedFacade::new(self, env)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(BridgeError::Closed)
        }
    }

    fn query_gate(&self) -> Gate<'_> {
        match self.config.locking {
            EngineLocking::Serialized => Gate::Exclusive(self.gate.write()),
            EngineLocking::SharedReads => Gate::Shared(self.gate.read()),
        }
    }

    /// Runs one engine query and converts its buffer with `convert`.
    /// The buffer is released on every path.
    ///
    /// An engine failure is not an error here: whatever the engine left in
    /// the buffer is dropped and the query reads as "not found".
    pub(crate) fn run_query<T>(
        &self,
        op: Operation,
        call: impl FnOnce(&dyn RegistryEngine, &mut ResultBuffer) -> EngineResult,
        convert: impl FnOnce(ResultBuffer) -> std::result::Result<T, MarshalError>,
    ) -> Result<T> {
        self.ensure_open()?;
        let mut out = ResultBuffer::new();
        let status = {
            let _g = self.query_gate();
            call(self.engine.as_ref(), &mut out)
        };
        if let Err(e) = status {
            tracing::debug!(%op, error = %e, "registry query failed, no result");
            out.release();
        }
        Ok(convert(out)?)
    }

    /// Serialized handlers whose `field` matches `value`.
    pub fn find_handler(
        &self,
        caller_id: Option<&str>,
        field: SearchField,
        value: &str,
    ) -> Result<Option<String>> {
        self.find_handler_as(caller_id, field, value, result::to_string)
    }

    /// Serialized handlers registered by `suite`.
    pub fn find_for_suite(&self, suite: SuiteId) -> Result<Option<String>> {
        self.find_for_suite_as(suite, result::to_string)
    }

    /// Every value of `field` across handlers visible to the caller.
    pub fn get_all(&self, caller_id: Option<&str>, field: SearchField) -> Result<Option<String>> {
        self.get_all_as(caller_id, field, result::to_string)
    }

    /// One serialized handler matched by ID.
    pub fn get_handler(
        &self,
        caller_id: Option<&str>,
        id: &str,
        mode: SearchMode,
    ) -> Result<Option<String>> {
        self.get_handler_as(caller_id, id, mode, result::to_string)
    }

    /// Values of one array field of one handler.
    pub fn get_handler_field(&self, id: &str, field: SearchField) -> Result<Option<String>> {
        self.get_handler_field_as(id, field, result::to_string)
    }

    pub fn handler_by_url(
        &self,
        caller_id: Option<&str>,
        url: &str,
        action: Option<&str>,
    ) -> Result<Option<String>> {
        self.handler_by_url_as(caller_id, url, action, result::to_string)
    }

    pub(crate) fn find_handler_as<T>(
        &self,
        caller_id: Option<&str>,
        field: SearchField,
        value: &str,
        convert: Convert<T>,
    ) -> Result<T> {
        let caller = NativeString::encode_opt(caller_id, "caller ID")?;
        let value = NativeString::encode(value, "search value")?;
        self.run_query(
            Operation::FindHandler,
            |e, out| e.find_handler(caller.as_ref(), field, &value, out),
            convert,
        )
    }

    pub(crate) fn find_for_suite_as<T>(&self, suite: SuiteId, convert: Convert<T>) -> Result<T> {
        self.run_query(
            Operation::FindForSuite,
            |e, out| e.find_for_suite(suite, out),
            convert,
        )
    }

    pub(crate) fn get_all_as<T>(
        &self,
        caller_id: Option<&str>,
        field: SearchField,
        convert: Convert<T>,
    ) -> Result<T> {
        let caller = NativeString::encode_opt(caller_id, "caller ID")?;
        self.run_query(
            Operation::GetAll,
            |e, out| e.get_all(caller.as_ref(), field, out),
            convert,
        )
    }

    pub(crate) fn get_handler_as<T>(
        &self,
        caller_id: Option<&str>,
        id: &str,
        mode: SearchMode,
        convert: Convert<T>,
    ) -> Result<T> {
        let caller = NativeString::encode_opt(caller_id, "caller ID")?;
        let id = NativeString::encode(id, "handler ID")?;
        self.run_query(
            Operation::GetHandler,
            |e, out| e.get_handler(caller.as_ref(), &id, mode, out),
            convert,
        )
    }

    pub(crate) fn get_handler_field_as<T>(
        &self,
        id: &str,
        field: SearchField,
        convert: Convert<T>,
    ) -> Result<T> {
        let id = NativeString::encode(id, "handler ID")?;
        self.run_query(
            Operation::GetHandlerField,
            |e, out| e.get_handler_field(&id, field, out),
            convert,
        )
    }

    pub(crate) fn handler_by_url_as<T>(
        &self,
        caller_id: Option<&str>,
        url: &str,
        action: Option<&str>,
        convert: Convert<T>,
    ) -> Result<T> {
        let caller = NativeString::encode_opt(caller_id, "caller ID")?;
        let url = NativeString::encode(url, "URL")?;
        let action = NativeString::encode_opt(action, "action")?;
        self.run_query(
            Operation::HandlerByUrl,
            |e, out| e.handler_by_url(caller.as_ref(), &url, action.as_ref(), out),
            convert,
        )
    }

    /// Registers the managed handler object `handler` for `suite`.
    ///
    /// The native record is released whether the build, the engine call, or
    /// neither failed.
    pub fn register(
        &self,
        env: &dyn ManagedEnv,
        suite: SuiteId,
        class_name: Option<ObjectRef>,
        handler: ObjectRef,
    ) -> Result<()> {
        self.ensure_open()?;
        let mut record = HandlerRecord::default();
        let outcome = (|| -> Result<()> {
            record::fill(env, &self.schema, handler, suite, class_name, &mut record)?;
            let _g = self.gate.write();
            self.engine
                .register_handler(&record)
                .map_err(|source| BridgeError::Engine {
                    op: Operation::Register,
                    source,
                })
        })();
        let released = record.release();
        tracing::debug!(ok = outcome.is_ok(), ?released, "handler registration done");
        outcome
    }

    /// Like [`register`](Self::register), reporting only success.
    pub fn try_register(
        &self,
        env: &dyn ManagedEnv,
        suite: SuiteId,
        class_name: Option<ObjectRef>,
        handler: ObjectRef,
    ) -> bool {
        match self.register(env, suite, class_name, handler) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("handler registration failed: {e}");
                false
            }
        }
    }

    /// Removes a handler. `Ok(false)` when the engine refused, e.g. the ID is
    /// not registered.
    pub fn unregister(&self, id: &str) -> Result<bool> {
        let id = NativeString::encode(id, "handler ID")?;
        self.unregister_native(&id)
    }

    pub(crate) fn unregister_native(&self, id: &NativeString) -> Result<bool> {
        self.ensure_open()?;
        let _g = self.gate.write();
        match self.engine.unregister_handler(id) {
            Ok(()) => Ok(true),
            Err(e) => {
                tracing::debug!(error = %e, "unregister refused");
                Ok(false)
            }
        }
    }

    /// Asks the platform to pick one of `candidates` for `action`.
    /// Candidates are `(handler ID, action name)`. `None` when nothing was
    /// picked, including when the engine failed.
    pub fn select_single_handler(
        &self,
        action: Option<&str>,
        candidates: &[(&str, Option<&str>)],
    ) -> Result<Option<usize>> {
        self.ensure_open()?;
        let action = NativeString::encode_opt(action, "action")?;
        let mut choices = Vec::new();
        choices
            .try_reserve_exact(candidates.len())
            .map_err(|_| MarshalError::oom("candidates"))?;
        for (id, name) in candidates {
            choices.push(HandlerChoice {
                handler_id: NativeString::encode(id, "handler ID")?,
                action_name: NativeString::encode_opt(*name, "action name")?,
            });
        }
        self.select_native(action.as_ref(), &choices)
    }

    pub(crate) fn select_native(
        &self,
        action: Option<&NativeString>,
        choices: &[HandlerChoice],
    ) -> Result<Option<usize>> {
        self.ensure_open()?;
        let _g = self.query_gate();
        match self.engine.select_handler(action, choices) {
            Ok(picked) => Ok(picked),
            Err(e) => {
                tracing::debug!(
                    op = %Operation::SelectHandler,
                    error = %e,
                    "selection failed, nothing picked"
                );
                Ok(None)
            }
        }
    }

    pub fn execute_handler(&self, id: &str) -> Result<LaunchResult> {
        let id = NativeString::encode(id, "handler ID")?;
        self.execute_native(&id)
    }

    pub(crate) fn execute_native(&self, id: &NativeString) -> Result<LaunchResult> {
        self.ensure_open()?;
        let _g = self.gate.write();
        let res = self.engine.execute_handler(id);
        if !res.is_success() {
            tracing::debug!(?res, "handler launch did not succeed");
        }
        Ok(res)
    }

    /// Completes a platform transaction; returns whether the caller should exit.
    pub fn platform_finish(&self, transaction_id: i32) -> Result<bool> {
        self.ensure_open()?;
        let _g = self.gate.write();
        self.engine
            .platform_finish(transaction_id)
            .map_err(|source| BridgeError::Engine {
                op: Operation::PlatformFinish,
                source,
            })
    }
}

impl Drop for RegistryStore {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::error!("closing registry store: {e}");
        }
    }
}
