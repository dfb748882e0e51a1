use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json as json;

const ENV_ENGINE_LOCKING: &str = "CHAPI_ENGINE_LOCKING";
const ENV_CHECK_INTERNAL: &str = "CHAPI_CHECK_INTERNAL_HANDLERS";
const ENV_PLUGIN: &str = "CHAPI_REGISTRY_PLUGIN";

/// How the store serializes calls into the registry engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineLocking {
    /// Every engine call is exclusive.
    #[default]
    Serialized,
    /// Queries may run together; anything that mutates or launches is exclusive.
    SharedReads,
}

impl EngineLocking {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "serialized" => Some(EngineLocking::Serialized),
            "shared-reads" | "shared_reads" => Some(EngineLocking::SharedReads),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub locking: EngineLocking,
    /// Run the engine's built-in handler check on first init.
    pub check_internal_handlers: bool,
    /// Registry plugin to load when no engine is supplied.
    pub plugin_path: Option<PathBuf>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            locking: EngineLocking::Serialized,
            check_internal_handlers: true,
            plugin_path: None,
        }
    }
}

impl BridgeConfig {
    /// Defaults overridden by `CHAPI_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a caller-supplied variable source.
    /// Values that do not parse are ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(v) = lookup(ENV_ENGINE_LOCKING) {
            match EngineLocking::parse(&v) {
                Some(l) => cfg.locking = l,
                None => tracing::warn!("{ENV_ENGINE_LOCKING}={v:?} not recognized, keeping default"),
            }
        }
        if let Some(v) = lookup(ENV_CHECK_INTERNAL) {
            match parse_bool(&v) {
                Some(b) => cfg.check_internal_handlers = b,
                None => tracing::warn!("{ENV_CHECK_INTERNAL}={v:?} not a boolean, keeping default"),
            }
        }
        if let Some(v) = lookup(ENV_PLUGIN) {
            if !v.is_empty() {
                cfg.plugin_path = Some(PathBuf::from(v));
            }
        }
        cfg
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let buf = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
        json::from_slice(&buf).with_context(|| format!("parse {}", path.display()))
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
