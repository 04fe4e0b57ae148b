//! Runtime configuration.
//!
//! Loaded from a JSON file, then overlaid with environment variables:
//!
//! - `STATBRIDGE_PYTHON` - interpreter executable
//! - `STATBRIDGE_WORKERS_DIR` - directory holding `worker{N}.py` modules

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const PYTHON_ENV: &str = "STATBRIDGE_PYTHON";
pub const WORKERS_DIR_ENV: &str = "STATBRIDGE_WORKERS_DIR";

/// Settings for the interpreter-process backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Interpreter executable. Looked up on PATH when unset.
    pub interpreter: Option<PathBuf>,
    /// Extra arguments placed before the bootstrap script.
    pub interpreter_args: Vec<String>,
    /// Directory holding one `worker{N}.py` module per worker.
    pub workers_dir: PathBuf,
    /// Packages imported at initialization, before any worker loads.
    pub base_packages: Vec<String>,
    pub startup_timeout_secs: u64,
    pub call_timeout_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            interpreter: None,
            interpreter_args: Vec::new(),
            workers_dir: PathBuf::from("workers"),
            base_packages: vec!["numpy".to_string()],
            startup_timeout_secs: 60,
            call_timeout_secs: 300,
        }
    }
}

impl RuntimeConfig {
    /// Read a config file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Read a config file if it exists, otherwise use defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_path(path)
        } else {
            tracing::debug!("no config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Overlay values from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary key lookup.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(python) = lookup(PYTHON_ENV).filter(|v| !v.is_empty()) {
            self.interpreter = Some(PathBuf::from(python));
        }
        if let Some(dir) = lookup(WORKERS_DIR_ENV).filter(|v| !v.is_empty()) {
            self.workers_dir = PathBuf::from(dir);
        }
        self
    }

    /// Find the interpreter executable.
    ///
    /// Uses the configured path when set, otherwise `python3` then `python`
    /// on PATH.
    pub fn resolve_interpreter(&self) -> Result<PathBuf> {
        if let Some(path) = &self.interpreter {
            if path.components().count() > 1 {
                if path.exists() {
                    return Ok(path.clone());
                }
                return Err(Error::Config(format!(
                    "interpreter not found at {}",
                    path.display()
                )));
            }
            return which::which(path).map_err(|e| {
                Error::Config(format!("interpreter '{}' not on PATH: {}", path.display(), e))
            });
        }

        for candidate in ["python3", "python"] {
            if let Ok(path) = which::which(candidate) {
                return Ok(path);
            }
        }

        Err(Error::Config(format!(
            "no Python interpreter found. Install python3 or set {}",
            PYTHON_ENV
        )))
    }

    /// Path of the module text for a worker.
    pub fn worker_module_path(&self, worker_id: u8) -> PathBuf {
        self.workers_dir.join(format!("worker{}.py", worker_id))
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}
