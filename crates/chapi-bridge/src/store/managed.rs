//! Entry points for callers holding managed objects.
//!
//! Arguments arrive as managed strings and query results leave as new
//! managed strings. Optional caller IDs that are null reach the engine as
//! absent, never as "".

use chapi_abi::{LaunchResult, SearchField, SearchMode, SuiteId};

use super::RegistryStore;
use crate::engine::{EngineResult, HandlerChoice, RegistryEngine};
use crate::error::{BridgeError, MarshalError, Operation, Result};
use crate::managed::{ManagedEnv, ObjectRef};
use crate::marshal::marshal_string;
use crate::native::NativeString;
use crate::result::{self, ResultBuffer};

pub struct ManagedFacade<'a> {
    store: &'a RegistryStore,
    env: &'a dyn ManagedEnv,
}

impl<'a> ManagedFacade<'a> {
    pub(super) fn new(store: &'a RegistryStore, env: &'a dyn ManagedEnv) -> Self {
        Self { store, env }
    }

    fn optional(&self, s: Option<ObjectRef>, what: &'static str) -> Result<Option<NativeString>> {
        s.map(|s| marshal_string(self.env, Some(s), what))
            .transpose()
            .map_err(Into::into)
    }

    fn required(&self, s: Option<ObjectRef>, what: &'static str) -> Result<NativeString> {
        let s = s.ok_or_else(|| BridgeError::InvalidArgument(format!("{what} is null")))?;
        Ok(marshal_string(self.env, Some(s), what)?)
    }

    fn query(
        &self,
        op: Operation,
        call: impl FnOnce(&dyn RegistryEngine, &mut ResultBuffer) -> EngineResult,
    ) -> Result<Option<ObjectRef>> {
        let env = self.env;
        self.store.run_query(op, call, |buf| result::to_managed(env, buf))
    }

    pub fn find_handler(
        &self,
        caller_id: Option<ObjectRef>,
        field: i32,
        value: Option<ObjectRef>,
    ) -> Result<Option<ObjectRef>> {
        let field = search_field(field)?;
        let caller = self.optional(caller_id, "caller ID")?;
        let value = self.required(value, "search value")?;
        self.query(Operation::FindHandler, |e, out| {
            e.find_handler(caller.as_ref(), field, &value, out)
        })
    }

    pub fn find_for_suite(&self, suite: SuiteId) -> Result<Option<ObjectRef>> {
        self.query(Operation::FindForSuite, |e, out| e.find_for_suite(suite, out))
    }

    pub fn get_all(&self, caller_id: Option<ObjectRef>, field: i32) -> Result<Option<ObjectRef>> {
        let field = search_field(field)?;
        let caller = self.optional(caller_id, "caller ID")?;
        self.query(Operation::GetAll, |e, out| e.get_all(caller.as_ref(), field, out))
    }

    pub fn get_handler(
        &self,
        caller_id: Option<ObjectRef>,
        id: Option<ObjectRef>,
        mode: i32,
    ) -> Result<Option<ObjectRef>> {
        let mode = SearchMode::from_raw(mode)
            .ok_or_else(|| BridgeError::InvalidArgument(format!("unknown search mode {mode}")))?;
        let caller = self.optional(caller_id, "caller ID")?;
        let id = self.required(id, "handler ID")?;
        self.query(Operation::GetHandler, |e, out| {
            e.get_handler(caller.as_ref(), &id, mode, out)
        })
    }

    pub fn get_handler_field(&self, id: Option<ObjectRef>, field: i32) -> Result<Option<ObjectRef>> {
        let field = search_field(field)?;
        let id = self.required(id, "handler ID")?;
        self.query(Operation::GetHandlerField, |e, out| {
            e.get_handler_field(&id, field, out)
        })
    }

    pub fn handler_by_url(
        &self,
        caller_id: Option<ObjectRef>,
        url: Option<ObjectRef>,
        action: Option<ObjectRef>,
    ) -> Result<Option<ObjectRef>> {
        let caller = self.optional(caller_id, "caller ID")?;
        let url = self.required(url, "URL")?;
        let action = self.optional(action, "action")?;
        self.query(Operation::HandlerByUrl, |e, out| {
            e.handler_by_url(caller.as_ref(), &url, action.as_ref(), out)
        })
    }

    pub fn register(
        &self,
        suite: SuiteId,
        class_name: Option<ObjectRef>,
        handler: ObjectRef,
    ) -> Result<()> {
        self.store.register(self.env, suite, class_name, handler)
    }

    pub fn unregister(&self, id: Option<ObjectRef>) -> Result<bool> {
        let id = self.required(id, "handler ID")?;
        self.store.unregister_native(&id)
    }

    pub fn execute_handler(&self, id: Option<ObjectRef>) -> Result<LaunchResult> {
        let id = self.required(id, "handler ID")?;
        self.store.execute_native(&id)
    }

    /// `pairs` is a managed `String[]` of `handler ID, action name` pairs; a
    /// name may be null. A trailing unpaired element is ignored.
    pub fn select_single_handler(
        &self,
        action: Option<ObjectRef>,
        pairs: Option<ObjectRef>,
    ) -> Result<Option<usize>> {
        let action = self.optional(action, "action")?;
        let pairs = pairs.ok_or_else(|| BridgeError::InvalidArgument("pairs is null".into()))?;
        let count = self.env.array_len(pairs) / 2;

        let mut choices = Vec::new();
        choices
            .try_reserve_exact(count)
            .map_err(|_| MarshalError::oom("candidates"))?;
        for i in 0..count {
            let id = self.env.array_element(pairs, i * 2);
            let name = self.env.array_element(pairs, i * 2 + 1);
            choices.push(HandlerChoice {
                handler_id: marshal_string(self.env, id, "handler ID")?,
                action_name: self.optional(name, "action name")?,
            });
        }
        self.store.select_native(action.as_ref(), &choices)
    }

    pub fn platform_finish(&self, transaction_id: i32) -> Result<bool> {
        self.store.platform_finish(transaction_id)
    }
}

fn search_field(raw: i32) -> Result<SearchField> {
    SearchField::from_raw(raw)
        .ok_or_else(|| BridgeError::InvalidArgument(format!("unknown search field {raw}")))
}
