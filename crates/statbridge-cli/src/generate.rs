//! Generate command: registry file to wrapper source.

use std::path::Path;

use anyhow::Context;
use statbridge::Registry;

pub fn execute(registry_path: Option<&Path>, out: Option<&Path>) -> anyhow::Result<()> {
    let registry = match registry_path {
        Some(path) => Registry::from_path(path)
            .with_context(|| format!("Failed to load registry {}", path.display()))?,
        None => statbridge::registry()?,
    };

    let source = statbridge_codegen::generate(&registry)?;

    match out {
        Some(path) => {
            std::fs::write(path, &source)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!(
                "Generated {} wrappers across {} workers into {}",
                registry.len(),
                registry.workers().len(),
                path.display()
            );
        }
        None => print!("{}", source),
    }
    Ok(())
}
