//! Process-wide home for the runtime manager.
//!
//! The composition root owns a `ManagerSlot` and hands out the manager it
//! holds. Every accessor returns the same instance until a test harness
//! calls `reset_instance`, which is compiled only for tests.

use std::sync::{Arc, Mutex, PoisonError};

use super::backend::Backend;
use super::manager::RuntimeManager;

type Factory<B> = Box<dyn Fn() -> RuntimeManager<B> + Send + Sync>;

/// Lazily constructed, shared runtime manager.
pub struct ManagerSlot<B: Backend> {
    factory: Factory<B>,
    current: Mutex<Option<Arc<RuntimeManager<B>>>>,
}

impl<B: Backend> ManagerSlot<B> {
    /// Create an empty slot. The manager is built on first access.
    pub fn new(factory: impl Fn() -> RuntimeManager<B> + Send + Sync + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            current: Mutex::new(None),
        }
    }

    /// The shared manager, constructing it on first use.
    pub fn instance(&self) -> Arc<RuntimeManager<B>> {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(current.get_or_insert_with(|| Arc::new((self.factory)())))
    }

    /// Drop the shared manager so the next accessor builds a new one.
    ///
    /// The new manager starts `Uninitialized` and shares no state with the
    /// old one. Holders of the old `Arc` keep a working but orphaned manager.
    #[cfg(any(test, feature = "testing"))]
    pub fn reset_instance(&self) {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::WorkerSpec;
    use crate::runtime::RuntimeState;
    use crate::testing::ScriptedBackend;

    fn slot(backend: &ScriptedBackend) -> ManagerSlot<ScriptedBackend> {
        let backend = backend.clone();
        ManagerSlot::new(move || {
            RuntimeManager::new(
                backend.clone(),
                vec![WorkerSpec {
                    id: 1,
                    packages: vec![],
                }],
            )
        })
    }

    #[test]
    fn test_singleton_identity() {
        let slot = slot(&ScriptedBackend::new());
        let a = slot.instance();
        let b = slot.instance();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_reset_builds_fresh_instance() {
        let slot = slot(&ScriptedBackend::new());
        let before = slot.instance();
        before.ensure_worker_loaded(1).await.unwrap();

        slot.reset_instance();
        let after = slot.instance();

        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.state(), RuntimeState::Uninitialized);
        assert!(!after.is_worker_loaded(1));
        assert!(before.is_initialized());
    }
}
