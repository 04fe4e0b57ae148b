//! Registry-driven method dispatch.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::marshal::{self, Args};
use crate::outcome::{self, SuccessPayload};
use crate::registry::{MethodDescriptor, Registry};

use super::backend::{Backend, CallEnvelope};
use super::manager::RuntimeManager;

/// Validates, routes and classifies method calls.
pub struct Dispatcher<B: Backend> {
    manager: Arc<RuntimeManager<B>>,
    registry: Arc<Registry>,
}

impl<B: Backend> Clone for Dispatcher<B> {
    fn clone(&self) -> Self {
        Self {
            manager: Arc::clone(&self.manager),
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<B: Backend> Dispatcher<B> {
    pub fn new(manager: Arc<RuntimeManager<B>>, registry: Arc<Registry>) -> Self {
        Self { manager, registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn manager(&self) -> &Arc<RuntimeManager<B>> {
        &self.manager
    }

    /// Call `method_id` on `worker_id` with named arguments.
    ///
    /// Arguments are validated before the runtime is touched, so a bad
    /// argument never starts the interpreter or loads a worker.
    pub async fn call(&self, worker_id: u8, method_id: &str, args: Args) -> Result<SuccessPayload> {
        let descriptor = self.descriptor(method_id)?;
        if descriptor.worker_id != worker_id {
            return Err(Error::WorkerMismatch {
                method: method_id.to_string(),
                expected: descriptor.worker_id,
                requested: worker_id,
            });
        }
        marshal::validate_args(descriptor, &args)?;

        self.manager.ensure_worker_loaded(worker_id).await?;

        let envelope = CallEnvelope {
            method_id: method_id.to_string(),
            worker_id,
            args,
        };
        let returned = self.manager.call(&envelope).await?;

        outcome::discriminate(returned).map_err(|payload| Error::RuntimeExecution {
            method: method_id.to_string(),
            message: payload.error,
        })
    }

    /// Call a method on whichever worker the registry assigns it to.
    pub async fn call_method(&self, method_id: &str, args: Args) -> Result<SuccessPayload> {
        let worker_id = self.descriptor(method_id)?.worker_id;
        self.call(worker_id, method_id, args).await
    }

    fn descriptor(&self, method_id: &str) -> Result<&MethodDescriptor> {
        self.registry
            .get(method_id)
            .ok_or_else(|| Error::UnknownMethod(method_id.to_string()))
    }
}

/// Decode a success payload into a typed result.
pub fn decode<T: DeserializeOwned>(method_id: &str, payload: SuccessPayload) -> Result<T> {
    match payload.into_value() {
        value @ Value::Object(_) => serde_json::from_value(value).map_err(|e| Error::Decode {
            method: method_id.to_string(),
            message: e.to_string(),
        }),
        other => Err(Error::Decode {
            method: method_id.to_string(),
            message: format!("expected an object, got {}", marshal::describe(&other)),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedBackend;
    use serde::Deserialize;
    use serde_json::json;

    const REGISTRY: &str = r#"{
        "workers": [{ "id": 1 }, { "id": 2, "packages": ["scipy"] }],
        "methods": [
            { "methodId": "descriptive_stats", "workerId": 1,
              "params": ["data"], "returns": ["mean", "n"] },
            { "methodId": "two_sample_t_test", "workerId": 2,
              "params": ["group1", "group2", "equalVar?"],
              "returns": ["statistic", "pValue", "equalVar"] }
        ]
    }"#;

    fn dispatcher(backend: &ScriptedBackend) -> Dispatcher<ScriptedBackend> {
        let registry = Arc::new(Registry::from_json_str(REGISTRY).unwrap());
        let manager = Arc::new(RuntimeManager::from_registry(backend.clone(), &registry));
        Dispatcher::new(manager, registry)
    }

    fn args(value: Value) -> Args {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_call_loads_owning_worker_only() {
        let backend = ScriptedBackend::new();
        backend.respond("descriptive_stats", json!({"mean": 2.0, "n": 3}));
        let dispatcher = dispatcher(&backend);

        let payload = dispatcher
            .call(1, "descriptive_stats", args(json!({"data": [1, 2, 3]})))
            .await
            .unwrap();

        assert_eq!(payload.fields().unwrap()["mean"], json!(2.0));
        assert_eq!(backend.install_count(1), 1);
        assert_eq!(backend.install_count(2), 0);

        let calls = backend.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method_id, "descriptive_stats");
        assert_eq!(calls[0].worker_id, 1);
    }

    #[tokio::test]
    async fn test_validation_never_reaches_runtime() {
        let backend = ScriptedBackend::new();
        let dispatcher = dispatcher(&backend);

        let err = dispatcher
            .call(1, "descriptive_stats", args(json!({"data": ["1", 2]})))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Validation { .. }));
        assert_eq!(backend.start_count(), 0);
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_error_payload_becomes_runtime_error() {
        let backend = ScriptedBackend::new();
        backend.respond("descriptive_stats", json!({"error": "empty input"}));
        let dispatcher = dispatcher(&backend);

        let err = dispatcher
            .call_method("descriptive_stats", args(json!({"data": []})))
            .await
            .unwrap_err();

        match err {
            Error::RuntimeExecution { method, message } => {
                assert_eq!(method, "descriptive_stats");
                assert_eq!(message, "empty input");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_method_and_worker_mismatch() {
        let backend = ScriptedBackend::new();
        let dispatcher = dispatcher(&backend);

        let err = dispatcher.call_method("nope", Args::new()).await.unwrap_err();
        assert!(matches!(err, Error::UnknownMethod(_)));

        let err = dispatcher
            .call(1, "two_sample_t_test", Args::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::WorkerMismatch {
                expected: 2,
                requested: 1,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_decode_typed_result() {
        #[derive(Deserialize)]
        struct Stats {
            mean: f64,
            n: f64,
        }

        let backend = ScriptedBackend::new();
        backend.respond("descriptive_stats", json!({"mean": 1.5, "n": 2}));
        let dispatcher = dispatcher(&backend);

        let payload = dispatcher
            .call_method("descriptive_stats", args(json!({"data": [1, 2]})))
            .await
            .unwrap();
        let stats: Stats = decode("descriptive_stats", payload).unwrap();
        assert_eq!(stats.mean, 1.5);
        assert_eq!(stats.n, 2.0);
    }

    #[test]
    fn test_decode_rejects_non_object() {
        let payload = outcome::discriminate(Some(json!(42))).unwrap();
        let err = decode::<Value>("descriptive_stats", payload).unwrap_err();
        assert!(err.to_string().contains("expected an object, got number"));
    }
}
