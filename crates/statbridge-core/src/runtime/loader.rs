//! Lazy, exactly-once loading of worker partitions.

use crate::error::{Error, Result};

use super::backend::Backend;
use super::manager::RuntimeManager;

impl<B: Backend> RuntimeManager<B> {
    /// Whether a worker is installed in the current session.
    pub fn is_worker_loaded(&self, worker_id: u8) -> bool {
        self.lifecycle().loaded.contains(&worker_id)
    }

    /// Make sure a worker's packages and module are installed.
    ///
    /// Starts the runtime first if needed. Concurrent calls for the same
    /// worker wait on a single install; different workers load
    /// independently. On failure the worker stays unloaded so the caller
    /// can retry.
    pub async fn ensure_worker_loaded(&self, worker_id: u8) -> Result<()> {
        self.retire_if_dead().await;
        if self.is_worker_loaded(worker_id) {
            tracing::debug!(worker = worker_id, "worker already loaded");
            return Ok(());
        }

        let (spec, worker_lock) = match (
            self.workers.iter().find(|w| w.id == worker_id),
            self.worker_locks.get(&worker_id),
        ) {
            (Some(spec), Some(worker_lock)) => (spec, worker_lock),
            _ => {
                return Err(Error::WorkerLoad {
                    worker_id,
                    cause: "no such worker".to_string(),
                });
            }
        };

        self.initialize().await?;

        let _loading = worker_lock.lock().await;
        if self.is_worker_loaded(worker_id) {
            return Ok(());
        }

        let (session, generation) = self.ready_session().map_err(|e| Error::WorkerLoad {
            worker_id,
            cause: e.to_string(),
        })?;

        tracing::info!(
            worker = worker_id,
            packages = ?spec.packages,
            "loading worker"
        );
        if let Err(e) = self.backend.install_worker(&session, spec).await {
            tracing::warn!(worker = worker_id, "worker load failed: {}", e);
            self.retire_if_dead().await;
            return Err(Error::WorkerLoad {
                worker_id,
                cause: e.to_string(),
            });
        }

        let mut lc = self.lifecycle();
        if lc.generation != generation {
            return Err(Error::WorkerLoad {
                worker_id,
                cause: "runtime was disposed while the worker was loading".to_string(),
            });
        }
        lc.loaded.insert(worker_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::future::join_all;

    use crate::error::Error;
    use crate::registry::WorkerSpec;
    use crate::runtime::{RuntimeManager, RuntimeState};
    use crate::testing::ScriptedBackend;

    fn manager(backend: &ScriptedBackend) -> RuntimeManager<ScriptedBackend> {
        RuntimeManager::new(
            backend.clone(),
            (1..=3)
                .map(|id| WorkerSpec {
                    id,
                    packages: vec![format!("pkg{id}")],
                })
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_auto_initializes() {
        let backend = ScriptedBackend::new();
        let manager = manager(&backend);

        manager.ensure_worker_loaded(1).await.unwrap();

        assert_eq!(manager.state(), RuntimeState::Ready);
        assert!(manager.is_worker_loaded(1));
        assert!(!manager.is_worker_loaded(2));
    }

    #[tokio::test]
    async fn test_concurrent_loads_install_once() {
        let backend = ScriptedBackend::new().with_install_delay(Duration::from_millis(20));
        let manager = manager(&backend);

        let results = join_all((0..10).map(|_| manager.ensure_worker_loaded(2))).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(backend.install_count(2), 1);
        assert_eq!(backend.start_count(), 1);
        assert!(manager.is_worker_loaded(2));
    }

    #[tokio::test]
    async fn test_cache_hit_skips_install() {
        let backend = ScriptedBackend::new();
        let manager = manager(&backend);

        for _ in 0..3 {
            manager.ensure_worker_loaded(3).await.unwrap();
        }
        assert_eq!(backend.install_count(3), 1);
    }

    #[tokio::test]
    async fn test_different_workers_load_concurrently() {
        let backend = ScriptedBackend::new().with_install_delay(Duration::from_millis(100));
        let manager = manager(&backend);
        manager.initialize().await.unwrap();

        let started = std::time::Instant::now();
        let (a, b, c) = tokio::join!(
            manager.ensure_worker_loaded(1),
            manager.ensure_worker_loaded(2),
            manager.ensure_worker_loaded(3),
        );
        a.unwrap();
        b.unwrap();
        c.unwrap();

        // serialized installs would take at least 300ms
        assert!(started.elapsed() < Duration::from_millis(250));
        let descriptors = manager.worker_descriptors();
        assert!(descriptors.iter().all(|w| w.loaded));
    }

    #[tokio::test]
    async fn test_failed_load_is_retryable() {
        let backend = ScriptedBackend::new();
        backend.fail_next_installs(2, 1);
        let manager = manager(&backend);

        let err = manager.ensure_worker_loaded(2).await.unwrap_err();
        assert!(matches!(err, Error::WorkerLoad { worker_id: 2, .. }));
        assert!(!manager.is_worker_loaded(2));

        manager.ensure_worker_loaded(2).await.unwrap();
        assert!(manager.is_worker_loaded(2));
        assert_eq!(backend.install_count(2), 2);
    }

    #[tokio::test]
    async fn test_unknown_worker() {
        let backend = ScriptedBackend::new();
        let manager = manager(&backend);

        let err = manager.ensure_worker_loaded(9).await.unwrap_err();
        assert!(matches!(err, Error::WorkerLoad { worker_id: 9, .. }));
        assert_eq!(backend.start_count(), 0);
    }

    #[tokio::test]
    async fn test_dispose_during_load() {
        let backend = ScriptedBackend::new().with_install_delay(Duration::from_millis(50));
        let manager = manager(&backend);
        manager.initialize().await.unwrap();

        let (load, ()) = tokio::join!(manager.ensure_worker_loaded(1), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            manager.dispose().await;
        });

        assert!(matches!(load, Err(Error::WorkerLoad { worker_id: 1, .. })));
        assert!(!manager.is_worker_loaded(1));
    }
}
