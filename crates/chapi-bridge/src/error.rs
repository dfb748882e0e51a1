use std::fmt;

use chapi_abi::WireError;
use thiserror::Error;

use crate::engine::EngineFailure;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BindError {
    #[error("managed class {0} not found")]
    ClassNotFound(&'static str),

    #[error("field {class}.{field} ({signature}) not found")]
    FieldNotFound {
        class: &'static str,
        field: &'static str,
        signature: &'static str,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MarshalError {
    #[error("out of memory while marshaling {what}")]
    OutOfMemory { what: &'static str },

    #[error("locale #{locale} carries {found} action names, expected {expected}")]
    ActionNameCount {
        locale: usize,
        expected: usize,
        found: usize,
    },
}

impl MarshalError {
    #[inline]
    pub(crate) fn oom(what: &'static str) -> Self {
        MarshalError::OutOfMemory { what }
    }

    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, MarshalError::OutOfMemory { .. })
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("handler schema unavailable: {0}")]
    SchemaUnavailable(#[from] BindError),

    #[error("handler ID is null or empty")]
    MissingId,

    #[error("handler class name is null")]
    MissingClassName,

    #[error(transparent)]
    Marshal(#[from] MarshalError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("registry engine initialization failed: {0}")]
    InitFailed(EngineFailure),

    #[error("registry engine rejected its built-in handlers: {0}")]
    InternalHandlers(EngineFailure),

    #[error("unexpected registry finalization: not initialized")]
    Unbalanced,

    #[error("registry initialized too many times without finalization")]
    TooManyInits,
}

/// Bridge entry points, named in engine failure reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    FindHandler,
    FindForSuite,
    GetAll,
    GetHandler,
    GetHandlerField,
    HandlerByUrl,
    Register,
    Unregister,
    SelectHandler,
    ExecuteHandler,
    PlatformFinish,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::FindHandler => "find handlers by field value",
            Operation::FindForSuite => "find handlers for suite",
            Operation::GetAll => "read handler field values",
            Operation::GetHandler => "find handler",
            Operation::GetHandlerField => "read handler field",
            Operation::HandlerByUrl => "find handler for URL",
            Operation::Register => "register handler",
            Operation::Unregister => "unregister handler",
            Operation::SelectHandler => "select handler",
            Operation::ExecuteHandler => "execute handler",
            Operation::PlatformFinish => "finish platform request",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("handler schema mismatch: {0}")]
    Schema(#[from] BindError),

    #[error(transparent)]
    Marshal(#[from] MarshalError),

    #[error("mandatory handler field {0} is missing")]
    MissingMandatoryField(&'static str),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("could not {op}: {source}")]
    Engine {
        op: Operation,
        #[source]
        source: EngineFailure,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("malformed registry result: {0}")]
    Wire(#[from] WireError),

    #[error("registry plugin: {0}")]
    Plugin(String),

    #[error("registry store is closed")]
    Closed,
}

impl BridgeError {
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, BridgeError::Marshal(m) if m.is_out_of_memory())
    }

    pub fn is_unbalanced_lifecycle(&self) -> bool {
        matches!(self, BridgeError::Lifecycle(LifecycleError::Unbalanced))
    }
}

impl From<BuildError> for BridgeError {
    fn from(e: BuildError) -> Self {
        match e {
            BuildError::SchemaUnavailable(b) => BridgeError::Schema(b),
            BuildError::MissingId => BridgeError::MissingMandatoryField("ID"),
            BuildError::MissingClassName => BridgeError::MissingMandatoryField("class name"),
            BuildError::Marshal(m) => BridgeError::Marshal(m),
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
