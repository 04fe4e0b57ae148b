//! Call command: invoke one method with JSON arguments.

use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use statbridge::MethodId;

use crate::colors;
use crate::session::Session;

pub async fn execute(config: Option<&Path>, method: &str, args: &str) -> anyhow::Result<()> {
    let method: MethodId = method.parse()?;
    let args: serde_json::Value =
        serde_json::from_str(args).context("--args must be a JSON object")?;
    let serde_json::Value::Object(args) = args else {
        anyhow::bail!("--args must be a JSON object");
    };

    let session = Session::open(config)?;
    let start = Instant::now();
    let outcome = session
        .dispatcher()
        .call(method.worker_id(), method.as_str(), args)
        .await;
    session.close().await;

    let payload = outcome?;
    println!("{}", serde_json::to_string_pretty(payload.value())?);
    eprintln!(
        "{}{}{} completed in {:.2}s",
        colors::CYAN,
        method,
        colors::RESET,
        start.elapsed().as_secs_f64()
    );
    Ok(())
}
