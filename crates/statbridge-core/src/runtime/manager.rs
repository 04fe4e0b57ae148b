//! Runtime lifecycle manager.
//!
//! Owns the interpreter session and the worker table. All mutation of the
//! lifecycle state and of the per-worker `loaded` flags happens here or in
//! the worker loader, which is implemented on the same type.
//!
//! ```text
//! Uninitialized ──initialize()──► Initializing ──ok──► Ready
//!       ▲                              │                 │
//!       └────────────err───────────────┘             dispose()
//!                                                        ▼
//!                         initialize() ◄──────────── Disposed
//! ```
//!
//! Every `dispose()` bumps a generation counter. Work that started under an
//! older generation (an initialization, a worker install, a call) notices
//! the bump when it resumes and fails instead of touching a torn-down
//! session.
//!
//! A session the backend reports dead is retired the same way, except the
//! state drops back to `Uninitialized`: the next call starts a new session
//! and reloads its worker.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::registry::{Registry, WorkerSpec};

use super::backend::{Backend, CallEnvelope};

/// Lifecycle state of the embedded runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    Uninitialized,
    Initializing,
    Ready,
    Disposed,
}

/// Snapshot of one worker partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerDescriptor {
    pub id: u8,
    pub extra_packages: Vec<String>,
    pub loaded: bool,
}

pub(super) struct Lifecycle<S> {
    pub(super) state: RuntimeState,
    pub(super) generation: u64,
    pub(super) session: Option<Arc<S>>,
    pub(super) loaded: FxHashSet<u8>,
}

/// Manages one embedded runtime and its lazily loaded workers.
pub struct RuntimeManager<B: Backend> {
    pub(super) backend: B,
    pub(super) workers: Vec<WorkerSpec>,
    pub(super) lifecycle: Mutex<Lifecycle<B::Session>>,
    init_lock: tokio::sync::Mutex<()>,
    pub(super) worker_locks: FxHashMap<u8, tokio::sync::Mutex<()>>,
}

/// Puts an abandoned initialization back to `Uninitialized`.
///
/// If the future driving `initialize()` is dropped mid-start, the state must
/// not stay `Initializing` forever.
struct InitGuard<'a, S> {
    lifecycle: &'a Mutex<Lifecycle<S>>,
    generation: u64,
    armed: bool,
}

impl<S> Drop for InitGuard<'_, S> {
    fn drop(&mut self) {
        if self.armed {
            let mut lc = lock(self.lifecycle);
            if lc.generation == self.generation && lc.state == RuntimeState::Initializing {
                lc.state = RuntimeState::Uninitialized;
            }
        }
    }
}

pub(super) fn lock<S>(lifecycle: &Mutex<Lifecycle<S>>) -> MutexGuard<'_, Lifecycle<S>> {
    lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<B: Backend> RuntimeManager<B> {
    /// Create a manager for the given worker partitions.
    pub fn new(backend: B, workers: Vec<WorkerSpec>) -> Self {
        let worker_locks = workers
            .iter()
            .map(|w| (w.id, tokio::sync::Mutex::new(())))
            .collect();
        Self {
            backend,
            workers,
            lifecycle: Mutex::new(Lifecycle {
                state: RuntimeState::Uninitialized,
                generation: 0,
                session: None,
                loaded: FxHashSet::default(),
            }),
            init_lock: tokio::sync::Mutex::new(()),
            worker_locks,
        }
    }

    /// Create a manager for every worker declared in a registry.
    pub fn from_registry(backend: B, registry: &Registry) -> Self {
        Self::new(backend, registry.workers().to_vec())
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub(super) fn lifecycle(&self) -> MutexGuard<'_, Lifecycle<B::Session>> {
        lock(&self.lifecycle)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RuntimeState {
        self.lifecycle().state
    }

    /// Whether the runtime is ready to load workers and take calls.
    ///
    /// False once the backend reports the session dead, even before the
    /// manager has retired it.
    pub fn is_initialized(&self) -> bool {
        let lc = self.lifecycle();
        lc.state == RuntimeState::Ready
            && lc
                .session
                .as_ref()
                .is_some_and(|session| self.backend.is_alive(session))
    }

    /// Snapshot of the worker table.
    pub fn worker_descriptors(&self) -> Vec<WorkerDescriptor> {
        let lc = self.lifecycle();
        self.workers
            .iter()
            .map(|w| WorkerDescriptor {
                id: w.id,
                extra_packages: w.packages.clone(),
                loaded: lc.loaded.contains(&w.id),
            })
            .collect()
    }

    /// Start the runtime if it is not running yet.
    ///
    /// Concurrent callers share one start: the first caller allocates the
    /// session, the others wait on it and return once it settles. A failed
    /// start leaves the state `Uninitialized` so a later call can retry.
    pub async fn initialize(&self) -> Result<()> {
        if self.is_initialized() {
            return Ok(());
        }

        let _init = self.init_lock.lock().await;
        if self.is_initialized() {
            return Ok(());
        }
        self.retire_if_dead().await;

        let generation = {
            let mut lc = self.lifecycle();
            lc.state = RuntimeState::Initializing;
            lc.generation
        };
        let mut guard = InitGuard {
            lifecycle: &self.lifecycle,
            generation,
            armed: true,
        };

        tracing::info!("starting embedded runtime");
        let started = self.backend.start().await;
        guard.armed = false;

        let session = match started {
            Ok(session) => session,
            Err(e) => {
                let mut lc = self.lifecycle();
                if lc.generation == generation {
                    lc.state = RuntimeState::Uninitialized;
                }
                tracing::warn!("runtime start failed: {}", e);
                return Err(match e {
                    Error::Initialization(msg) => Error::Initialization(msg),
                    other => Error::Initialization(other.to_string()),
                });
            }
        };

        let rejected = {
            let mut lc = self.lifecycle();
            if lc.generation == generation {
                lc.session = Some(Arc::new(session));
                lc.state = RuntimeState::Ready;
                None
            } else {
                Some(session)
            }
        };

        match rejected {
            None => {
                tracing::info!("embedded runtime ready");
                Ok(())
            }
            Some(session) => {
                self.backend.shutdown(&session).await;
                Err(Error::Initialization(
                    "runtime was disposed while it was starting".to_string(),
                ))
            }
        }
    }

    /// Release the interpreter and forget every loaded worker.
    ///
    /// A no-op when already disposed. Calls still in flight fail with an
    /// initialization or worker-load error when they resume. A later
    /// `initialize()` builds a fresh session.
    pub async fn dispose(&self) {
        let session = {
            let mut lc = self.lifecycle();
            if lc.state == RuntimeState::Disposed {
                return;
            }
            lc.state = RuntimeState::Disposed;
            lc.generation += 1;
            lc.loaded.clear();
            lc.session.take()
        };

        if let Some(session) = session {
            tracing::info!("disposing embedded runtime");
            self.backend.shutdown(&session).await;
        }
    }

    /// Drop the current session if the backend reports it dead.
    ///
    /// Loaded flags are cleared and the state returns to `Uninitialized`.
    /// Returns whether a session was retired.
    pub(super) async fn retire_if_dead(&self) -> bool {
        let dead = {
            let mut lc = self.lifecycle();
            let alive = lc.session.as_ref().map(|s| self.backend.is_alive(s));
            if lc.state == RuntimeState::Ready && alive == Some(false) {
                lc.state = RuntimeState::Uninitialized;
                lc.generation += 1;
                lc.loaded.clear();
                lc.session.take()
            } else {
                None
            }
        };

        match dead {
            Some(session) => {
                tracing::warn!("embedded runtime session died, it will be restarted on next use");
                self.backend.shutdown(&session).await;
                true
            }
            None => false,
        }
    }

    /// Session and generation of the ready runtime.
    pub(super) fn ready_session(&self) -> Result<(Arc<B::Session>, u64)> {
        let lc = self.lifecycle();
        match (&lc.session, lc.state) {
            (Some(session), RuntimeState::Ready) => Ok((Arc::clone(session), lc.generation)),
            (_, state) => Err(Error::Initialization(format!(
                "runtime is not ready (state: {:?})",
                state
            ))),
        }
    }

    /// Send a call to a worker that is already loaded.
    ///
    /// Refuses to reach the interpreter if the owning worker is not marked
    /// loaded in the current generation.
    pub async fn call(&self, envelope: &CallEnvelope) -> Result<Option<Value>> {
        let (session, generation) = self.ready_session()?;
        if !self.is_worker_loaded(envelope.worker_id) {
            return Err(Error::WorkerLoad {
                worker_id: envelope.worker_id,
                cause: format!("worker not loaded before calling '{}'", envelope.method_id),
            });
        }

        tracing::debug!(
            method = %envelope.method_id,
            worker = envelope.worker_id,
            "dispatching call"
        );
        let result = self.backend.call(&session, envelope).await;

        if self.lifecycle().generation != generation {
            return Err(Error::Initialization(format!(
                "runtime was disposed while '{}' was in flight",
                envelope.method_id
            )));
        }
        if self.retire_if_dead().await {
            return result.map_err(|e| {
                Error::Initialization(format!(
                    "runtime session was lost while '{}' was running: {}",
                    envelope.method_id, e
                ))
            });
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedBackend;
    use futures::future::join_all;
    use std::time::Duration;

    fn workers() -> Vec<WorkerSpec> {
        vec![
            WorkerSpec {
                id: 1,
                packages: vec![],
            },
            WorkerSpec {
                id: 2,
                packages: vec!["scipy".into()],
            },
        ]
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let backend = ScriptedBackend::new();
        let manager = RuntimeManager::new(backend.clone(), workers());

        assert_eq!(manager.state(), RuntimeState::Uninitialized);
        manager.initialize().await.unwrap();
        manager.initialize().await.unwrap();

        assert!(manager.is_initialized());
        assert_eq!(backend.start_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_initialize_allocates_once() {
        let backend = ScriptedBackend::new().with_start_delay(Duration::from_millis(20));
        let manager = RuntimeManager::new(backend.clone(), workers());

        let results = join_all((0..16).map(|_| manager.initialize())).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(backend.start_count(), 1);
        assert_eq!(manager.state(), RuntimeState::Ready);
    }

    #[tokio::test]
    async fn test_failed_start_is_retryable() {
        let backend = ScriptedBackend::new();
        backend.fail_next_starts(1);
        let manager = RuntimeManager::new(backend.clone(), workers());

        let err = manager.initialize().await.unwrap_err();
        assert!(matches!(err, Error::Initialization(_)));
        assert!(err.is_retryable());
        assert_eq!(manager.state(), RuntimeState::Uninitialized);

        manager.initialize().await.unwrap();
        assert!(manager.is_initialized());
        assert_eq!(backend.start_count(), 2);
    }

    #[tokio::test]
    async fn test_dispose_then_reinitialize() {
        let backend = ScriptedBackend::new();
        let manager = RuntimeManager::new(backend.clone(), workers());

        manager.initialize().await.unwrap();
        manager.ensure_worker_loaded(2).await.unwrap();
        manager.dispose().await;

        assert_eq!(manager.state(), RuntimeState::Disposed);
        assert!(manager.worker_descriptors().iter().all(|w| !w.loaded));
        assert_eq!(backend.shutdown_count(), 1);

        // second dispose is a no-op
        manager.dispose().await;
        assert_eq!(backend.shutdown_count(), 1);

        manager.initialize().await.unwrap();
        assert!(manager.is_initialized());
        assert_eq!(backend.start_count(), 2);
    }

    #[tokio::test]
    async fn test_dispose_during_start_rejects_session() {
        let backend = ScriptedBackend::new().with_start_delay(Duration::from_millis(50));
        let manager = RuntimeManager::new(backend.clone(), workers());

        let (init, ()) = tokio::join!(manager.initialize(), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            manager.dispose().await;
        });

        assert!(matches!(init, Err(Error::Initialization(_))));
        assert_eq!(manager.state(), RuntimeState::Disposed);
        assert_eq!(backend.shutdown_count(), 1);
    }

    #[tokio::test]
    async fn test_dropped_initialize_does_not_wedge_state() {
        let backend = ScriptedBackend::new().with_start_delay(Duration::from_millis(200));
        let manager = RuntimeManager::new(backend.clone(), workers());

        let abandoned =
            tokio::time::timeout(Duration::from_millis(10), manager.initialize()).await;
        assert!(abandoned.is_err());
        assert_eq!(manager.state(), RuntimeState::Uninitialized);
    }

    #[tokio::test]
    async fn test_call_requires_loaded_worker() {
        let backend = ScriptedBackend::new();
        let manager = RuntimeManager::new(backend.clone(), workers());
        manager.initialize().await.unwrap();

        let envelope = CallEnvelope {
            method_id: "one_way_anova".into(),
            worker_id: 2,
            args: Default::default(),
        };
        let err = manager.call(&envelope).await.unwrap_err();
        assert!(matches!(err, Error::WorkerLoad { worker_id: 2, .. }));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_dead_session_is_retired_and_rebuilt() {
        let backend = ScriptedBackend::new();
        let manager = RuntimeManager::new(backend.clone(), workers());
        manager.ensure_worker_loaded(1).await.unwrap();
        backend.crash_next_calls(1);

        let envelope = CallEnvelope {
            method_id: "descriptive_stats".into(),
            worker_id: 1,
            args: Default::default(),
        };
        let err = manager.call(&envelope).await.unwrap_err();
        assert!(matches!(err, Error::Initialization(_)), "{err:?}");
        assert!(err.is_retryable());
        assert!(err.to_string().contains("descriptive_stats"));

        assert_eq!(manager.state(), RuntimeState::Uninitialized);
        assert!(!manager.is_initialized());
        assert!(manager.worker_descriptors().iter().all(|w| !w.loaded));
        assert_eq!(backend.shutdown_count(), 1);

        manager.ensure_worker_loaded(1).await.unwrap();
        manager.call(&envelope).await.unwrap();
        assert_eq!(backend.start_count(), 2);
        assert_eq!(backend.install_count(1), 2);
    }

    #[tokio::test]
    async fn test_session_dying_while_idle_is_not_initialized() {
        let backend = ScriptedBackend::new();
        let manager = RuntimeManager::new(backend.clone(), workers());
        manager.ensure_worker_loaded(2).await.unwrap();

        backend.kill_sessions();
        assert!(!manager.is_initialized());

        // the loader notices before trusting its loaded flag
        manager.ensure_worker_loaded(2).await.unwrap();
        assert!(manager.is_initialized());
        assert_eq!(backend.start_count(), 2);
        assert_eq!(backend.install_count(2), 2);
    }

    #[tokio::test]
    async fn test_dispose_during_call_fails_cleanly() {
        let backend = ScriptedBackend::new().with_call_delay(Duration::from_millis(50));
        let manager = RuntimeManager::new(backend.clone(), workers());
        manager.ensure_worker_loaded(1).await.unwrap();

        let envelope = CallEnvelope {
            method_id: "descriptive_stats".into(),
            worker_id: 1,
            args: Default::default(),
        };
        let (result, ()) = tokio::join!(manager.call(&envelope), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            manager.dispose().await;
        });

        let err = result.unwrap_err();
        assert!(matches!(err, Error::Initialization(_)), "{err:?}");
    }
}
