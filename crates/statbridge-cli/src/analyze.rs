//! Analyze command: run a catalogue analysis over a rows file.

use std::path::Path;

use anyhow::Context;
use serde_json::Value;
use statbridge::{Executor, Row, VariableMapping};

use crate::session::Session;

pub async fn execute(
    config: Option<&Path>,
    analysis: &str,
    rows_path: &Path,
    mappings: &[String],
    options: &str,
    report: bool,
) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(rows_path)
        .with_context(|| format!("Failed to read {}", rows_path.display()))?;
    let rows: Vec<Row> = serde_json::from_str(&text)
        .with_context(|| format!("{} must hold an array of objects", rows_path.display()))?;

    let mut mapping = VariableMapping::new();
    for assignment in mappings {
        mapping
            .parse_assignment(assignment)
            .map_err(|e| anyhow::anyhow!("--map {}: {}", assignment, e))?;
    }

    let options = match serde_json::from_str::<Value>(options).context("--options must be JSON")? {
        Value::Object(options) => options,
        _ => anyhow::bail!("--options must be a JSON object"),
    };

    tracing::debug!(analysis, rows = rows.len(), "running analysis");
    let session = Session::open(config)?;
    let executor = Executor::new(session.dispatcher());

    let outcome = if report {
        Ok(executor
            .execute_method_reported(analysis, &rows, &mapping, &options)
            .await)
    } else {
        executor
            .execute_method(analysis, &rows, &mapping, &options)
            .await
    };
    session.close().await;

    let result = outcome?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
