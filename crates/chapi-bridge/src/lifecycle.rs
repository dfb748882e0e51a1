//! Reference-counted init/finalize of the registry engine.
//!
//! The first `init` brings the engine up; every further `init` only bumps the
//! count. The matching last `finalize` tears it down. All transitions happen
//! under one mutex, so the engine is initialized and torn down at most once
//! per transition even when stores open and close concurrently.

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::engine::RegistryEngine;
use crate::error::LifecycleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Uninitialized,
    /// Number of outstanding `init` calls, always at least 1.
    Active(u32),
}

#[derive(Debug, Default)]
pub struct RegistryLifecycle {
    state: Mutex<LifecycleState>,
}

static GLOBAL: Lazy<Arc<RegistryLifecycle>> = Lazy::new(|| Arc::new(RegistryLifecycle::new()));

impl RegistryLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide guard shared by every store that does not bring its own.
    pub fn global() -> Arc<RegistryLifecycle> {
        Arc::clone(&GLOBAL)
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state(), LifecycleState::Active(_))
    }

    pub fn init(
        &self,
        engine: &dyn RegistryEngine,
        check_internal_handlers: bool,
    ) -> Result<(), LifecycleError> {
        let mut state = self.state.lock();
        match *state {
            LifecycleState::Active(n) => {
                let Some(count) = n.checked_add(1) else {
                    tracing::error!(count = n, "registry init count exhausted");
                    return Err(LifecycleError::TooManyInits);
                };
                *state = LifecycleState::Active(count);
                tracing::debug!(count, "registry already initialized");
                Ok(())
            }
            LifecycleState::Uninitialized => {
                engine.initialize().map_err(LifecycleError::InitFailed)?;
                if check_internal_handlers {
                    if let Err(e) = engine.check_internal_handlers() {
                        // Undo the half-done bring-up.
                        engine.finalize();
                        return Err(LifecycleError::InternalHandlers(e));
                    }
                }
                *state = LifecycleState::Active(1);
                tracing::debug!("registry initialized");
                Ok(())
            }
        }
    }

    pub fn finalize(&self, engine: &dyn RegistryEngine) -> Result<(), LifecycleError> {
        let mut state = self.state.lock();
        match *state {
            LifecycleState::Uninitialized => {
                tracing::error!("registry finalize without matching init");
                Err(LifecycleError::Unbalanced)
            }
            LifecycleState::Active(1) => {
                engine.finalize();
                *state = LifecycleState::Uninitialized;
                tracing::debug!("registry finalized");
                Ok(())
            }
            LifecycleState::Active(n) => {
                *state = LifecycleState::Active(n - 1);
                tracing::debug!(count = n - 1, "registry still in use");
                Ok(())
            }
        }
    }
}
