//! Method registry: the declarative table of callable methods.
//!
//! The registry is plain data loaded from a hand-editable JSON file:
//!
//! ```json
//! {
//!   "workers": [{ "id": 1, "packages": ["numpy"] }],
//!   "methods": [{
//!     "methodId": "one_sample_t_test",
//!     "workerId": 1,
//!     "params": ["data", "popmean", "alternative?"],
//!     "returns": ["statistic", "pValue", "df"]
//!   }]
//! }
//! ```
//!
//! A param string is `name`, `name?` (optional), or either form followed by
//! `: kind` to pin the kind instead of inferring it from the name. Return
//! strings accept the same `: kind` annotation. Entries are immutable once
//! the registry is built.

mod kinds;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use kinds::{ParamKind, ReturnKind, infer_param_kind, infer_return_kind};

/// A declared method parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamSpec {
    pub name: String,
    pub optional: bool,
    pub kind: ParamKind,
}

/// A declared result field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReturnSpec {
    pub name: String,
    pub kind: ReturnKind,
}

/// Registry entry for one method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodDescriptor {
    pub method_id: String,
    pub worker_id: u8,
    pub params: Vec<ParamSpec>,
    pub returns: Vec<ReturnSpec>,
}

impl MethodDescriptor {
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn return_names(&self) -> impl Iterator<Item = &str> {
        self.returns.iter().map(|r| r.name.as_str())
    }
}

/// A worker partition and the extra packages it installs when loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerSpec {
    pub id: u8,
    #[serde(default)]
    pub packages: Vec<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRegistry {
    workers: Vec<WorkerSpec>,
    methods: Vec<RawMethod>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawMethod {
    method_id: String,
    worker_id: u8,
    #[serde(default)]
    params: Vec<String>,
    #[serde(default)]
    returns: Vec<String>,
}

/// Validated, indexed method registry.
#[derive(Debug, Clone)]
pub struct Registry {
    workers: Vec<WorkerSpec>,
    methods: Vec<MethodDescriptor>,
    index: FxHashMap<String, usize>,
}

impl Registry {
    /// Parse and validate a registry from its JSON text.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let raw: RawRegistry = serde_json::from_str(text)
            .map_err(|e| Error::Registry(format!("malformed registry: {}", e)))?;
        Self::build(raw)
    }

    /// Read and parse a registry file.
    pub fn from_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Registry(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&text)
    }

    fn build(raw: RawRegistry) -> Result<Self> {
        let worker_count = raw.workers.len();
        let mut seen_workers = FxHashSet::default();
        for worker in &raw.workers {
            if worker.id == 0 || usize::from(worker.id) > worker_count {
                return Err(Error::Registry(format!(
                    "worker id {} outside 1..={}",
                    worker.id, worker_count
                )));
            }
            if !seen_workers.insert(worker.id) {
                return Err(Error::Registry(format!("duplicate worker id {}", worker.id)));
            }
        }

        let mut methods = Vec::with_capacity(raw.methods.len());
        let mut index = FxHashMap::default();

        for raw_method in raw.methods {
            let method_id = raw_method.method_id;
            if method_id.is_empty() {
                return Err(Error::Registry("empty methodId".to_string()));
            }
            if !seen_workers.contains(&raw_method.worker_id) {
                return Err(Error::Registry(format!(
                    "method '{}' names undeclared worker {}",
                    method_id, raw_method.worker_id
                )));
            }
            if index.contains_key(&method_id) {
                return Err(Error::Registry(format!("duplicate methodId '{}'", method_id)));
            }

            let mut names = FxHashSet::default();
            let mut params = Vec::with_capacity(raw_method.params.len());
            for entry in &raw_method.params {
                let param = parse_param(&method_id, entry)?;
                if !names.insert(param.name.clone()) {
                    return Err(Error::Registry(format!(
                        "method '{}' declares parameter '{}' twice",
                        method_id, param.name
                    )));
                }
                params.push(param);
            }

            names.clear();
            let mut returns = Vec::with_capacity(raw_method.returns.len());
            for entry in &raw_method.returns {
                let ret = parse_return(&method_id, entry)?;
                if !names.insert(ret.name.clone()) {
                    return Err(Error::Registry(format!(
                        "method '{}' declares return '{}' twice",
                        method_id, ret.name
                    )));
                }
                returns.push(ret);
            }

            index.insert(method_id.clone(), methods.len());
            methods.push(MethodDescriptor {
                method_id,
                worker_id: raw_method.worker_id,
                params,
                returns,
            });
        }

        let mut workers = raw.workers;
        workers.sort_by_key(|w| w.id);

        Ok(Self {
            workers,
            methods,
            index,
        })
    }

    /// Look up a method by id.
    pub fn get(&self, method_id: &str) -> Option<&MethodDescriptor> {
        self.index.get(method_id).map(|&i| &self.methods[i])
    }

    /// Methods in declaration order.
    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    /// Worker partitions, ordered by id.
    pub fn workers(&self) -> &[WorkerSpec] {
        &self.workers
    }

    pub fn worker(&self, id: u8) -> Option<&WorkerSpec> {
        self.workers.iter().find(|w| w.id == id)
    }

    pub fn methods_for_worker(&self, worker_id: u8) -> impl Iterator<Item = &MethodDescriptor> {
        self.methods.iter().filter(move |m| m.worker_id == worker_id)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// Split `name[?][: kind]` into its parts.
fn split_entry(entry: &str) -> (&str, bool, Option<&str>) {
    let (head, kind) = match entry.split_once(':') {
        Some((head, kind)) => (head.trim(), Some(kind.trim())),
        None => (entry.trim(), None),
    };
    match head.strip_suffix('?') {
        Some(name) => (name.trim_end(), true, kind),
        None => (head, false, kind),
    }
}

fn parse_param(method_id: &str, entry: &str) -> Result<ParamSpec> {
    let (name, optional, kind) = split_entry(entry);
    if name.is_empty() {
        return Err(Error::Registry(format!(
            "method '{}' has an empty parameter name",
            method_id
        )));
    }
    let kind = match kind {
        Some(kind) => kind.parse()?,
        None => infer_param_kind(name).ok_or_else(|| {
            Error::Registry(format!(
                "cannot infer kind of parameter '{}' of '{}'; annotate it as '{}: <kind>'",
                name, method_id, name
            ))
        })?,
    };
    Ok(ParamSpec {
        name: name.to_string(),
        optional,
        kind,
    })
}

fn parse_return(method_id: &str, entry: &str) -> Result<ReturnSpec> {
    let (name, optional, kind) = split_entry(entry);
    if name.is_empty() || optional {
        return Err(Error::Registry(format!(
            "method '{}' has an invalid return entry '{}'",
            method_id, entry
        )));
    }
    let kind = match kind {
        Some(kind) => kind.parse()?,
        None => infer_return_kind(name).ok_or_else(|| {
            Error::Registry(format!(
                "cannot infer kind of return '{}' of '{}'; annotate it as '{}: <kind>'",
                name, method_id, name
            ))
        })?,
    };
    Ok(ReturnSpec {
        name: name.to_string(),
        kind,
    })
}
