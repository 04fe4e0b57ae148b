//! The execution target behind the runtime manager.

use std::future::Future;

use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::marshal::Args;
use crate::registry::WorkerSpec;

/// Marshalled request sent across the runtime boundary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallEnvelope {
    pub method_id: String,
    pub worker_id: u8,
    pub args: Args,
}

/// Something that can host worker modules and run their functions.
///
/// The manager serializes `start` and per-worker `install_worker` calls, so
/// implementations never see two concurrent starts or two concurrent
/// installs of the same worker. `call` may run concurrently for different
/// workers.
pub trait Backend: Send + Sync + 'static {
    /// Live interpreter handle.
    type Session: Send + Sync + 'static;

    /// Allocate the interpreter and install the base packages.
    fn start(&self) -> impl Future<Output = Result<Self::Session>> + Send;

    /// Install a worker's extra packages and its module text.
    fn install_worker(
        &self,
        session: &Self::Session,
        worker: &WorkerSpec,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Invoke a worker function. `None` means the function produced no value.
    fn call(
        &self,
        session: &Self::Session,
        envelope: &CallEnvelope,
    ) -> impl Future<Output = Result<Option<Value>>> + Send;

    /// Whether the session can still take requests.
    ///
    /// A dead session is dropped by the manager, which goes back to
    /// `Uninitialized` so the next call starts a fresh one.
    fn is_alive(&self, session: &Self::Session) -> bool {
        let _ = session;
        true
    }

    /// Release the interpreter. Must tolerate sessions that already died and
    /// must not wait for calls still in flight.
    fn shutdown(&self, session: &Self::Session) -> impl Future<Output = ()> + Send;
}
