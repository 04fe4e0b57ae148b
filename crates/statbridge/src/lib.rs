//! statbridge: typed statistical methods over an embedded interpreter.
//!
//! The method surface is generated at build time from
//! `registry/methods.json`:
//!
//! - [`methods::MethodId`], a closed enum of every registered method
//! - one `{Method}Result` struct and one `async fn` wrapper per method
//!
//! On top of the wrappers, [`Executor`] runs catalogue analyses over raw
//! tabular rows.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use statbridge::{methods, PythonBackend, RuntimeConfig};
//!
//! let registry = Arc::new(statbridge::registry()?);
//! let manager = Arc::new(statbridge::runtime_manager(
//!     PythonBackend::new(RuntimeConfig::default()),
//!     &registry,
//! ));
//! let dispatcher = statbridge::Dispatcher::new(manager.clone(), registry);
//!
//! let result = methods::one_sample_t_test(&dispatcher, &[4.9, 5.1, 5.3], 5.0, None).await?;
//! println!("t = {}, p = {}", result.statistic, result.p_value);
//!
//! manager.dispose().await;
//! ```

pub mod executor;

/// Generated method wrappers.
#[allow(clippy::too_many_arguments)]
pub mod methods {
    include!(concat!(env!("OUT_DIR"), "/methods.rs"));
}

pub use executor::{
    AnalysisError, AnalysisMetadata, AnalysisResult, Executor, Failure, Row, VariableMapping,
    parse_numeric_cell,
};
pub use methods::MethodId;
pub use statbridge_core::{
    Backend, Dispatcher, Error, Interval, Level, ManagerSlot, PythonBackend, Registry, Result,
    RuntimeConfig, RuntimeManager, RuntimeState, Samples,
};

/// Registry source the wrappers were generated from.
pub const REGISTRY_JSON: &str = include_str!("../registry/methods.json");

/// Parse the bundled method registry.
pub fn registry() -> Result<Registry> {
    Registry::from_json_str(REGISTRY_JSON)
}

/// A runtime manager for every worker in `registry`.
pub fn runtime_manager<B: Backend>(backend: B, registry: &Registry) -> RuntimeManager<B> {
    RuntimeManager::from_registry(backend, registry)
}
