//! chapi bridge: moves content handler records from managed objects into flat
//! native records for a registry engine, and query results back out.

pub mod config;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod managed;
pub mod marshal;
pub mod native;
pub mod record;
pub mod result;
pub mod schema;
pub mod store;

pub use chapi_abi::{HandlerSummary, LaunchResult, SearchField, SearchMode, SuiteId};
pub use config::{BridgeConfig, EngineLocking};
pub use engine::{EngineFailure, EngineResult, HandlerChoice, PluginEngine, RegistryEngine};
pub use error::{BridgeError, Result};
pub use lifecycle::{LifecycleState, RegistryLifecycle};
pub use record::{HandlerRecord, ReleaseSummary};
pub use result::ResultBuffer;
pub use store::{ManagedFacade, RegistryStore};
