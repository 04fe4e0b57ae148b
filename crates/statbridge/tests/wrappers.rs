//! Generated wrapper surface against the scripted backend.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::{Value, json};
use statbridge::methods::{self, MethodId};
use statbridge::{Dispatcher, Error, Interval, RuntimeManager, Samples};
use statbridge_core::testing::ScriptedBackend;
use statbridge_core::{Args, ParamKind};

fn setup() -> (ScriptedBackend, Arc<RuntimeManager<ScriptedBackend>>, Dispatcher<ScriptedBackend>) {
    let registry = Arc::new(statbridge::registry().unwrap());
    let backend = ScriptedBackend::new().with_registry(Arc::clone(&registry));
    let manager = Arc::new(statbridge::runtime_manager(backend.clone(), &registry));
    let dispatcher = Dispatcher::new(Arc::clone(&manager), registry);
    (backend, manager, dispatcher)
}

fn minimal_value(kind: ParamKind) -> Value {
    match kind {
        ParamKind::Number => json!(2.0),
        ParamKind::NumberVector => json!([1.0, 2.0, 3.0]),
        ParamKind::NumberMatrix | ParamKind::NumberVectorOrMatrix => json!([[1.0, 2.0], [3.0, 4.0]]),
        ParamKind::StringVector => json!(["a", "b"]),
        ParamKind::StringOrNumberVector => json!(["a", 1]),
        ParamKind::String => json!("two-sided"),
        ParamKind::Boolean => json!(true),
        ParamKind::NullableNumberVector => json!([1.0, null]),
    }
}

#[tokio::test]
async fn test_every_method_round_trips() {
    let (backend, manager, dispatcher) = setup();
    let registry = statbridge::registry().unwrap();
    assert_eq!(MethodId::ALL.len(), registry.len());

    for method in MethodId::ALL {
        let descriptor = registry.get(method.as_str()).unwrap();
        assert_eq!(descriptor.worker_id, method.worker_id());

        let args: Args = descriptor
            .params
            .iter()
            .filter(|p| !p.optional)
            .map(|p| (p.name.clone(), minimal_value(p.kind)))
            .collect();

        let payload = dispatcher
            .call(method.worker_id(), method.as_str(), args)
            .await
            .unwrap_or_else(|e| panic!("{}: {}", method, e));

        let keys: BTreeSet<&str> = payload.fields().unwrap().keys().map(String::as_str).collect();
        let declared: BTreeSet<&str> = descriptor.return_names().collect();
        assert_eq!(keys, declared, "{}", method);
    }

    // one start, one install per worker
    assert_eq!(backend.start_count(), 1);
    for worker in registry.workers() {
        assert_eq!(backend.install_count(worker.id), 1, "worker {}", worker.id);
    }
    manager.dispose().await;
}

#[tokio::test]
async fn test_typed_two_sample_call() {
    let (backend, _manager, dispatcher) = setup();

    let result = methods::two_sample_t_test(
        &dispatcher,
        &[5.1, 4.9, 5.6],
        &[6.0, 6.2, 5.8],
        Some(false),
        None,
    )
    .await
    .unwrap();

    assert!(!result.equal_var);
    assert_eq!(result.ci, Interval { lower: 0.0, upper: 1.0 });

    let calls = backend.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method_id, "two_sample_t_test");
    assert_eq!(calls[0].worker_id, 2);
    // absent optionals are not sent
    assert!(!calls[0].args.contains_key("alternative"));
    assert_eq!(calls[0].args["equalVar"], json!(false));
}

#[tokio::test]
async fn test_typed_groups_call() {
    let (backend, _manager, dispatcher) = setup();
    let groups = Samples::from(vec![vec![1.0, 2.0], vec![3.0, 4.0, 5.0]]);

    let result = methods::one_way_anova(&dispatcher, &groups).await.unwrap();
    assert_eq!(result.means, Vec::<f64>::new());
    assert_eq!(backend.calls()[0].args["groups"], json!([[1.0, 2.0], [3.0, 4.0, 5.0]]));
}

#[tokio::test]
async fn test_non_finite_argument_never_reaches_runtime() {
    let (backend, _manager, dispatcher) = setup();

    let err = methods::shapiro_wilk(&dispatcher, &[1.0, f64::NAN, 3.0])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Validation { ref param, .. } if param == "data"));
    assert_eq!(backend.start_count(), 0);
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_runtime_error_payload_surfaces_with_method() {
    let (backend, _manager, dispatcher) = setup();
    backend.respond("pearson_correlation", json!({"error": "x and y must have the same length"}));

    let err = methods::pearson_correlation(&dispatcher, &[1.0, 2.0], &[1.0], None)
        .await
        .unwrap_err();

    assert!(!err.is_retryable());
    let message = err.to_string();
    assert!(message.contains("pearson_correlation"));
    assert!(message.contains("same length"));
}

#[tokio::test]
async fn test_wrong_shape_payload_is_decode_error() {
    let (backend, _manager, dispatcher) = setup();
    backend.respond("descriptive_stats", json!({"mean": "high"}));

    let err = methods::descriptive_stats(&dispatcher, &[1.0, 2.0])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Decode { .. }));
}

#[test]
fn test_method_id_surface() {
    assert_eq!("kruskal_wallis".parse::<MethodId>().unwrap(), MethodId::KruskalWallis);
    assert_eq!(MethodId::KruskalWallis.to_string(), "kruskal_wallis");
    assert_eq!(MethodId::KmeansClustering.worker_id(), 4);
    assert!(matches!(
        "no_such_method".parse::<MethodId>(),
        Err(Error::UnknownMethod(_))
    ));
}
