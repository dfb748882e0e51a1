#![allow(dead_code)]

use std::sync::Arc;

use chapi_abi::wire;
use chapi_bridge::engine::{EngineFailure, EngineResult, HandlerChoice, RegistryEngine};
use chapi_bridge::native::NativeString;
use chapi_bridge::{
    BridgeConfig, HandlerRecord, HandlerSummary, LaunchResult, RegistryLifecycle, RegistryStore,
    ResultBuffer, SearchField, SearchMode, SuiteId,
};
use parking_lot::Mutex;

/// A handler as the in-memory registry keeps it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stored {
    pub id: String,
    pub suite: SuiteId,
    pub class_name: String,
    pub flag: i32,
    pub types: Vec<String>,
    pub suffixes: Vec<String>,
    pub actions: Vec<String>,
    pub locales: Vec<String>,
    pub action_names: Vec<String>,
    pub accesses: Vec<String>,
}

impl Stored {
    fn summary(&self) -> HandlerSummary {
        HandlerSummary {
            id: self.id.clone(),
            suite_id: self.suite,
            class_name: self.class_name.clone(),
            registration_method: self.flag,
        }
    }

    fn field(&self, field: SearchField) -> Vec<String> {
        match field {
            SearchField::Id => vec![self.id.clone()],
            SearchField::Types => self.types.clone(),
            SearchField::Suffixes => self.suffixes.clone(),
            SearchField::Actions => self.actions.clone(),
            SearchField::Locales => self.locales.clone(),
            SearchField::ActionMap => self.action_names.clone(),
            SearchField::Accesses => self.accesses.clone(),
        }
    }
}

#[derive(Debug, Default)]
pub struct State {
    pub handlers: Vec<Stored>,
    /// Engine operations in call order.
    pub calls: Vec<&'static str>,
    /// Caller ids as the engine saw them; `None` is an absent caller.
    pub callers: Vec<Option<String>>,
    pub inits: usize,
    pub finalizes: usize,
    pub fail_init: bool,
    pub fail_register: bool,
    pub fail_queries: bool,
    /// Reply payloads with an odd trailing byte.
    pub odd_payloads: bool,
}

/// Recording in-memory registry engine.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    pub state: Mutex<State>,
}

fn text(s: &NativeString) -> String {
    s.to_string_lossy()
}

impl MemoryEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with(handlers: Vec<Stored>) -> Arc<Self> {
        let engine = Self::default();
        engine.state.lock().handlers = handlers;
        Arc::new(engine)
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().calls.clone()
    }

    pub fn handlers(&self) -> Vec<Stored> {
        self.state.lock().handlers.clone()
    }

    fn enter(&self, op: &'static str, caller: Option<&NativeString>) -> EngineResult {
        let mut st = self.state.lock();
        st.calls.push(op);
        st.callers.push(caller.map(text));
        if st.fail_queries {
            return Err(EngineFailure::new(format!("{op} unavailable")));
        }
        Ok(())
    }

    fn reply(&self, out: &mut ResultBuffer, units: Vec<u16>) -> EngineResult {
        if !self.state.lock().odd_payloads {
            return out
                .fill_units(&units)
                .map_err(|e| EngineFailure::new(e.to_string()));
        }
        let mut bytes: Vec<u8> = units.iter().flat_map(|u| u.to_ne_bytes()).collect();
        if !bytes.is_empty() {
            bytes.push(0);
        }
        out.fill_bytes(&bytes)
            .map_err(|e| EngineFailure::new(e.to_string()))
    }

    fn reply_handlers<'a>(
        &self,
        out: &mut ResultBuffer,
        found: impl Iterator<Item = &'a Stored>,
    ) -> EngineResult {
        let mut payload = Vec::new();
        for h in found {
            let element = h
                .summary()
                .encode()
                .map_err(|e| EngineFailure::new(e.to_string()))?;
            wire::push_element(&mut payload, &element)
                .map_err(|e| EngineFailure::new(e.to_string()))?;
        }
        self.reply(out, payload)
    }

    fn reply_strings(&self, out: &mut ResultBuffer, values: &[String]) -> EngineResult {
        let payload = wire::encode_strings(values).map_err(|e| EngineFailure::new(e.to_string()))?;
        self.reply(out, payload)
    }
}

impl RegistryEngine for MemoryEngine {
    fn initialize(&self) -> EngineResult {
        let mut st = self.state.lock();
        st.calls.push("initialize");
        if st.fail_init {
            return Err(EngineFailure::new("registry storage unavailable"));
        }
        st.inits += 1;
        Ok(())
    }

    fn check_internal_handlers(&self) -> EngineResult {
        self.state.lock().calls.push("check_internal_handlers");
        Ok(())
    }

    fn finalize(&self) {
        let mut st = self.state.lock();
        st.calls.push("finalize");
        st.finalizes += 1;
    }

    fn find_handler(
        &self,
        caller_id: Option<&NativeString>,
        field: SearchField,
        value: &NativeString,
        out: &mut ResultBuffer,
    ) -> EngineResult {
        self.enter("find_handler", caller_id)?;
        let value = text(value);
        let handlers = self.handlers();
        self.reply_handlers(
            out,
            handlers.iter().filter(|h| h.field(field).contains(&value)),
        )
    }

    fn find_for_suite(&self, suite: SuiteId, out: &mut ResultBuffer) -> EngineResult {
        if let Err(e) = self.enter("find_for_suite", None) {
            // Failing engines may still have written part of a reply.
            let _ = out.fill_units(&[0x41, 0x42]);
            return Err(e);
        }
        let handlers = self.handlers();
        self.reply_handlers(out, handlers.iter().filter(|h| h.suite == suite))
    }

    fn get_all(
        &self,
        caller_id: Option<&NativeString>,
        field: SearchField,
        out: &mut ResultBuffer,
    ) -> EngineResult {
        self.enter("get_all", caller_id)?;
        let mut values: Vec<String> = Vec::new();
        for h in self.handlers() {
            for v in h.field(field) {
                if !values.contains(&v) {
                    values.push(v);
                }
            }
        }
        self.reply_strings(out, &values)
    }

    fn get_handler(
        &self,
        caller_id: Option<&NativeString>,
        id: &NativeString,
        mode: SearchMode,
        out: &mut ResultBuffer,
    ) -> EngineResult {
        self.enter("get_handler", caller_id)?;
        let id = text(id);
        let handlers = self.handlers();
        let found = handlers.iter().find(|h| match mode {
            SearchMode::Exact => h.id == id,
            SearchMode::Prefix => h.id.starts_with(&id),
        });
        match found {
            Some(h) => {
                let units = h
                    .summary()
                    .encode()
                    .map_err(|e| EngineFailure::new(e.to_string()))?;
                self.reply(out, units)
            }
            None => Ok(()),
        }
    }

    fn get_handler_field(
        &self,
        id: &NativeString,
        field: SearchField,
        out: &mut ResultBuffer,
    ) -> EngineResult {
        self.enter("get_handler_field", None)?;
        let id = text(id);
        match self.handlers().into_iter().find(|h| h.id == id) {
            Some(h) => self.reply_strings(out, &h.field(field)),
            None => Ok(()),
        }
    }

    fn handler_by_url(
        &self,
        caller_id: Option<&NativeString>,
        url: &NativeString,
        action: Option<&NativeString>,
        out: &mut ResultBuffer,
    ) -> EngineResult {
        self.enter("handler_by_url", caller_id)?;
        let url = text(url);
        let action = action.map(text);
        let handlers = self.handlers();
        let found = handlers.iter().find(|h| {
            h.suffixes.iter().any(|s| url.ends_with(s.as_str()))
                && action.as_ref().map_or(true, |a| h.actions.contains(a))
        });
        match found {
            Some(h) => {
                let units = h
                    .summary()
                    .encode()
                    .map_err(|e| EngineFailure::new(e.to_string()))?;
                self.reply(out, units)
            }
            None => Ok(()),
        }
    }

    fn register_handler(&self, record: &HandlerRecord) -> EngineResult {
        let mut st = self.state.lock();
        st.calls.push("register_handler");
        if st.fail_register {
            return Err(EngineFailure::new("registry is read-only"));
        }
        let stored = Stored {
            id: record.id.as_ref().map(text).unwrap_or_default(),
            suite: record.suite_id,
            class_name: record.class_name.as_ref().map(text).unwrap_or_default(),
            flag: record.registration_method,
            types: record.types.to_strings(),
            suffixes: record.suffixes.to_strings(),
            actions: record.actions.to_strings(),
            locales: record.locales.to_strings(),
            action_names: record.action_names.to_strings(),
            accesses: record.accesses.to_strings(),
        };
        st.handlers.retain(|h| h.id != stored.id);
        st.handlers.push(stored);
        Ok(())
    }

    fn unregister_handler(&self, id: &NativeString) -> EngineResult {
        let mut st = self.state.lock();
        st.calls.push("unregister_handler");
        let id = text(id);
        let before = st.handlers.len();
        st.handlers.retain(|h| h.id != id);
        if st.handlers.len() == before {
            return Err(EngineFailure::new(format!("{id} is not registered")));
        }
        Ok(())
    }

    fn select_handler(
        &self,
        _action: Option<&NativeString>,
        candidates: &[HandlerChoice],
    ) -> EngineResult<Option<usize>> {
        self.enter("select_handler", None)?;
        Ok(candidates.iter().position(|c| c.action_name.is_some()))
    }

    fn execute_handler(&self, id: &NativeString) -> LaunchResult {
        let mut st = self.state.lock();
        st.calls.push("execute_handler");
        let id = text(id);
        if st.handlers.iter().any(|h| h.id == id) {
            LaunchResult::Ok
        } else {
            LaunchResult::NotSupported
        }
    }

    fn platform_finish(&self, transaction_id: i32) -> EngineResult<bool> {
        self.enter("platform_finish", None)?;
        Ok(transaction_id % 2 == 1)
    }
}

/// Opens a store on its own lifecycle guard so tests do not share state.
pub fn open(engine: &Arc<MemoryEngine>) -> (RegistryStore, Arc<RegistryLifecycle>) {
    open_with(engine, BridgeConfig::default())
}

pub fn open_with(
    engine: &Arc<MemoryEngine>,
    config: BridgeConfig,
) -> (RegistryStore, Arc<RegistryLifecycle>) {
    let lifecycle = Arc::new(RegistryLifecycle::new());
    let store = RegistryStore::open(engine.clone(), Arc::clone(&lifecycle), config)
        .expect("store opens");
    (store, lifecycle)
}

pub fn stored(id: &str, suite: i32, class_name: &str) -> Stored {
    Stored {
        id: id.into(),
        suite: SuiteId(suite),
        class_name: class_name.into(),
        ..Default::default()
    }
}
