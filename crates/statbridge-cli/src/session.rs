//! Runtime wiring shared by the commands that talk to the interpreter.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use statbridge::{Dispatcher, ManagerSlot, PythonBackend, Registry, RuntimeConfig};

/// Default config location: `<config dir>/statbridge/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("statbridge").join("config.json"))
}

/// Load the runtime config, falling back to defaults when no file exists.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<RuntimeConfig> {
    let config = match path {
        Some(path) => RuntimeConfig::from_path(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => match default_config_path() {
            Some(path) => RuntimeConfig::load_or_default(&path)?,
            None => RuntimeConfig::default(),
        },
    };
    Ok(config.with_env_overrides())
}

/// The process-wide runtime manager plus the bundled registry.
pub struct Session {
    slot: ManagerSlot<PythonBackend>,
    registry: Arc<Registry>,
}

impl Session {
    pub fn open(config_path: Option<&Path>) -> anyhow::Result<Self> {
        let config = load_config(config_path)?;
        tracing::debug!(workers_dir = %config.workers_dir.display(), "loaded runtime config");

        let registry = Arc::new(statbridge::registry()?);
        let factory_registry = Arc::clone(&registry);
        let slot = ManagerSlot::new(move || {
            statbridge::runtime_manager(PythonBackend::new(config.clone()), &factory_registry)
        });

        Ok(Self { slot, registry })
    }

    pub fn dispatcher(&self) -> Dispatcher<PythonBackend> {
        Dispatcher::new(self.slot.instance(), Arc::clone(&self.registry))
    }

    /// Shut the interpreter down.
    pub async fn close(self) {
        self.slot.instance().dispose().await;
    }
}
