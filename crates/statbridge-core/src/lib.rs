//! Core engine for statbridge.
//!
//! This crate provides:
//! - Method registry with name-based kind inference
//! - Parameter validation for the untyped runtime boundary
//! - Structural success/error discrimination of returned values
//! - Runtime lifecycle management with lazily loaded workers
//! - Registry-driven dispatch
//! - An interpreter-process backend speaking a framed JSON protocol

pub mod config;
pub mod error;
pub mod ipc;
pub mod marshal;
pub mod outcome;
pub mod registry;
pub mod runtime;
pub mod values;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::RuntimeConfig;
pub use error::{Error, Result};
pub use ipc::PythonBackend;
pub use marshal::Args;
pub use outcome::{ErrorPayload, SuccessPayload, discriminate, is_error_payload};
pub use registry::{
    MethodDescriptor, ParamKind, ParamSpec, Registry, ReturnKind, ReturnSpec, WorkerSpec,
};
pub use runtime::{
    Backend, CallEnvelope, Dispatcher, ManagerSlot, RuntimeManager, RuntimeState,
    WorkerDescriptor, decode,
};
pub use values::{Interval, Level, Samples};
