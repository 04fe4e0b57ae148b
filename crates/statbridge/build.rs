//! Generates the typed method wrappers from `registry/methods.json`.

use std::path::PathBuf;

use statbridge_core::Registry;

const REGISTRY: &str = "registry/methods.json";

fn main() {
    println!("cargo:rerun-if-changed={}", REGISTRY);

    let manifest_dir =
        PathBuf::from(std::env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string()));
    let out_dir = match std::env::var("OUT_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => panic!("OUT_DIR not set: {}", e),
    };

    let registry = match Registry::from_path(manifest_dir.join(REGISTRY)) {
        Ok(registry) => registry,
        Err(e) => panic!("invalid method registry {}: {}", REGISTRY, e),
    };
    let source = match statbridge_codegen::generate(&registry) {
        Ok(source) => source,
        Err(e) => panic!("wrapper generation failed: {}", e),
    };

    if let Err(e) = std::fs::write(out_dir.join("methods.rs"), source) {
        panic!("failed to write generated wrappers: {}", e);
    }
}
