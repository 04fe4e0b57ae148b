//! Statistical executor.
//!
//! Takes raw rows and a role-to-column mapping, extracts the inputs an
//! analysis needs, checks there is enough data, then dispatches to the
//! runtime method behind the analysis and wraps the answer in an
//! [`AnalysisResult`].
//!
//! Insufficient data and mapping problems are reported before the runtime
//! is touched.

pub mod extract;
pub mod mapping;
pub mod routes;

use std::collections::BTreeMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use statbridge_core::{Backend, Dispatcher, Error, marshal};

pub use extract::{Row, parse_numeric_cell};
pub use mapping::VariableMapping;
pub use routes::{ExtractedDataset, Route, Strategy};

/// Why an analysis could not run.
#[derive(Debug, thiserror::Error)]
pub enum Failure {
    #[error("unknown analysis '{0}'")]
    UnknownAnalysis(String),

    #[error("no column mapped to role '{0}'")]
    MissingRole(&'static str),

    #[error("{0}")]
    Mapping(String),

    #[error(transparent)]
    Core(#[from] Error),
}

/// A failed analysis. Displays as "`<analysis>` failed: <reason>".
#[derive(Debug, thiserror::Error)]
#[error("`{analysis}` failed: {source}")]
pub struct AnalysisError {
    pub analysis: String,
    pub source: Failure,
}

impl AnalysisError {
    /// Whether running the same analysis again may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(&self.source, Failure::Core(e) if e.is_retryable())
    }
}

/// Normalized analysis outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Fields returned by the runtime method.
    pub main_results: Map<String, Value>,
    /// Extraction context and fixed arguments.
    pub additional_info: Map<String, Value>,
    pub metadata: AnalysisMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisMetadata {
    pub analysis: String,
    pub method_id: Option<String>,
    pub worker_id: Option<u8>,
    pub sample_sizes: BTreeMap<String, usize>,
    pub dropped_count: usize,
    pub elapsed_ms: u64,
    pub succeeded: bool,
}

/// Runs catalogue analyses through a [`Dispatcher`]. Holds no state between
/// calls.
pub struct Executor<B: Backend> {
    dispatcher: Dispatcher<B>,
}

impl<B: Backend> Clone for Executor<B> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: self.dispatcher.clone(),
        }
    }
}

impl<B: Backend> Executor<B> {
    pub fn new(dispatcher: Dispatcher<B>) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &Dispatcher<B> {
        &self.dispatcher
    }

    /// Run `analysis` over `rows`.
    ///
    /// `options` is a caller settings object; only keys the runtime method
    /// declares as parameters are forwarded, and arguments the analysis
    /// fixes always win.
    pub async fn execute_method(
        &self,
        analysis: &str,
        rows: &[Row],
        mapping: &VariableMapping,
        options: &Map<String, Value>,
    ) -> Result<AnalysisResult, AnalysisError> {
        let started = Instant::now();
        let fail = |source: Failure| AnalysisError {
            analysis: analysis.to_string(),
            source,
        };

        let route = routes::find(analysis)
            .ok_or_else(|| fail(Failure::UnknownAnalysis(analysis.to_string())))?;
        let dataset = route.strategy.extract(rows, mapping).map_err(fail)?;
        tracing::debug!(
            analysis,
            method = %route.method,
            dropped = dataset.dropped_count,
            "extracted analysis inputs"
        );

        let args = self.build_args(route, &dataset, options).map_err(fail)?;
        let payload = self
            .dispatcher
            .call(route.method.worker_id(), route.method.as_str(), args)
            .await
            .map_err(|e| fail(e.into()))?;

        let main_results = match payload.into_value() {
            Value::Object(fields) => fields,
            other => {
                return Err(fail(Failure::Core(Error::Decode {
                    method: route.method.as_str().to_string(),
                    message: format!("expected an object, got {}", marshal::describe(&other)),
                })));
            }
        };

        let mut additional_info = dataset.info;
        for (name, forced) in route.forced {
            additional_info.insert(name.to_string(), forced.to_value());
        }

        Ok(AnalysisResult {
            main_results,
            additional_info,
            metadata: AnalysisMetadata {
                analysis: analysis.to_string(),
                method_id: Some(route.method.as_str().to_string()),
                worker_id: Some(route.method.worker_id()),
                sample_sizes: dataset.sample_sizes,
                dropped_count: dataset.dropped_count,
                elapsed_ms: elapsed_ms(started),
                succeeded: true,
            },
        })
    }

    /// Like [`execute_method`](Self::execute_method), but a failure becomes
    /// an envelope whose `mainResults.interpretation` carries the message.
    pub async fn execute_method_reported(
        &self,
        analysis: &str,
        rows: &[Row],
        mapping: &VariableMapping,
        options: &Map<String, Value>,
    ) -> AnalysisResult {
        let started = Instant::now();
        match self.execute_method(analysis, rows, mapping, options).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("{}", e);
                let route = routes::find(analysis);
                let mut main_results = Map::new();
                main_results.insert("interpretation".to_string(), json!(e.to_string()));
                let mut additional_info = Map::new();
                additional_info.insert("retryable".to_string(), json!(e.is_retryable()));

                AnalysisResult {
                    main_results,
                    additional_info,
                    metadata: AnalysisMetadata {
                        analysis: analysis.to_string(),
                        method_id: route.map(|r| r.method.as_str().to_string()),
                        worker_id: route.map(|r| r.method.worker_id()),
                        sample_sizes: BTreeMap::new(),
                        dropped_count: 0,
                        elapsed_ms: elapsed_ms(started),
                        succeeded: false,
                    },
                }
            }
        }
    }

    fn build_args(
        &self,
        route: &Route,
        dataset: &ExtractedDataset,
        options: &Map<String, Value>,
    ) -> Result<Map<String, Value>, Failure> {
        let descriptor = self
            .dispatcher
            .registry()
            .get(route.method.as_str())
            .ok_or_else(|| Error::UnknownMethod(route.method.as_str().to_string()))?;

        let mut args = dataset.args();
        for (key, value) in options {
            if value.is_null() || args.contains_key(key) {
                continue;
            }
            if descriptor.param(key).is_some() {
                args.insert(key.clone(), value.clone());
            } else {
                tracing::debug!(analysis = route.analysis, option = %key, "option not accepted by method, ignoring");
            }
        }
        for (name, forced) in route.forced {
            args.insert(name.to_string(), forced.to_value());
        }
        Ok(args)
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
