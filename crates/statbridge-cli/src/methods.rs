//! Methods command: list the bundled registry.

use crate::colors;

pub fn execute(worker: Option<u8>, json: bool) -> anyhow::Result<()> {
    let registry = statbridge::registry()?;
    if let Some(id) = worker.filter(|id| registry.worker(*id).is_none()) {
        anyhow::bail!("No worker {} (registry declares 1..={})", id, registry.workers().len());
    }

    let methods: Vec<_> = registry
        .methods()
        .iter()
        .filter(|m| worker.is_none_or(|id| m.worker_id == id))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&methods)?);
        return Ok(());
    }

    for method in &methods {
        let params: Vec<String> = method
            .params
            .iter()
            .map(|p| format!("{}{}: {}", p.name, if p.optional { "?" } else { "" }, p.kind))
            .collect();
        let returns: Vec<&str> = method.return_names().collect();

        println!(
            "{}{}{} {}(worker {}){}",
            colors::BOLD,
            method.method_id,
            colors::RESET,
            colors::DIM,
            method.worker_id,
            colors::RESET
        );
        println!("    params:  {}", params.join(", "));
        println!("    returns: {}", returns.join(", "));
    }

    println!(
        "\n{}{} methods{}",
        colors::GREEN,
        methods.len(),
        colors::RESET
    );
    Ok(())
}
