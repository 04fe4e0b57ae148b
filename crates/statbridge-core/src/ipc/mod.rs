//! Inter-process communication with the interpreter host process.
//!
//! This module provides the frame protocol and the `PythonBackend` that runs
//! worker modules in an isolated interpreter process.

pub mod protocol;
mod python;

pub use protocol::{HostCommand, HostResponse, read_message, write_message};
pub use python::{BOOTSTRAP, PythonBackend, PythonSession};
