use anyhow::{Context, Result};
use refactor_graph::ExtractionStrategy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file read when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "config/default_config.toml";

/// Overrides `[api] key`
pub const API_KEY_ENV: &str = "PROC_REFACTOR_API_KEY";

/// Tool configuration, one table per concern
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub catalog: CatalogConfig,
    pub resolver: ResolverConfig,
    pub api: ApiConfig,
    pub lint: LintConfig,
    pub audit: AuditConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Catalog snapshot JSON file
    pub snapshot: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub strategy: ExtractionStrategy,
    /// Routine hops followed below the root
    pub depth: i32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            strategy: ExtractionStrategy::Catalog,
            depth: 1,
        }
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub endpoint: String,
    pub key: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            key: String::new(),
            timeout_secs: 60,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// keep the key out of debug logs
impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("endpoint", &self.endpoint)
            .field("key", &if self.key.is_empty() { "" } else { "***" })
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LintConfig {
    /// Linter executable; linting is off when unset
    pub command: Option<String>,
    pub args: Vec<String>,
    /// Rewrite attempts before giving up on a clean lint
    pub max_attempts: u32,
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            max_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// JSONL audit log
    pub path: Option<PathBuf>,
}

impl Config {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("Invalid configuration")
    }

    /// Read `path`, or the default location when `path` is `None`.
    ///
    /// A missing default file yields the built-in defaults; a missing
    /// explicitly requested file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::read(path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Self::read(default)?
                } else {
                    log::debug!("No {DEFAULT_CONFIG_PATH}, using built-in defaults");
                    Self::default()
                }
            }
        };
        config.apply_env();
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("In {}", path.display()))
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.api.key = key;
            }
        }
    }

    /// Reject settings no run can use. `needs_api` is set when a rewrite
    /// will actually be requested.
    pub fn validate(&self, needs_api: bool) -> Result<(), String> {
        if self.resolver.depth < 0 {
            return Err(format!(
                "resolver.depth must be >= 0 (got {})",
                self.resolver.depth
            ));
        }

        if self.lint.max_attempts == 0 {
            return Err("lint.max_attempts must be > 0".to_string());
        }

        if needs_api && self.api.endpoint.trim().is_empty() {
            return Err("api.endpoint is required to call the rewrite service".to_string());
        }

        Ok(())
    }
}
