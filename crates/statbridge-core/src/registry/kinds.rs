//! Parameter and return kinds, and the name-based inference tables.
//!
//! Kinds are resolved in a fixed priority order:
//!
//! 1. An explicit `name: kind` annotation in the registry entry.
//! 2. The exact-name table.
//! 3. The suffix table, first match in table order.
//!
//! Exact names must win over suffixes: `groups` is a vector-or-matrix even
//! though a generic suffix rule could claim a differently shaped name, and a
//! name like `dataMatrix` must not fall through to a `Data` rule.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Shape accepted for a method parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParamKind {
    Number,
    NumberVector,
    NumberMatrix,
    /// Either a flat vector or a list of vectors (`number[][] | number[]`).
    NumberVectorOrMatrix,
    StringVector,
    StringOrNumberVector,
    String,
    Boolean,
    NullableNumberVector,
}

impl ParamKind {
    pub const ALL: [ParamKind; 9] = [
        ParamKind::Number,
        ParamKind::NumberVector,
        ParamKind::NumberMatrix,
        ParamKind::NumberVectorOrMatrix,
        ParamKind::StringVector,
        ParamKind::StringOrNumberVector,
        ParamKind::String,
        ParamKind::Boolean,
        ParamKind::NullableNumberVector,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ParamKind::Number => "number",
            ParamKind::NumberVector => "numberVector",
            ParamKind::NumberMatrix => "numberMatrix",
            ParamKind::NumberVectorOrMatrix => "numberVectorOrMatrix",
            ParamKind::StringVector => "stringVector",
            ParamKind::StringOrNumberVector => "stringOrNumberVector",
            ParamKind::String => "string",
            ParamKind::Boolean => "boolean",
            ParamKind::NullableNumberVector => "nullableNumberVector",
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParamKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ParamKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::Registry(format!("unknown parameter kind '{}'", s)))
    }
}

/// Shape of a value returned by a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReturnKind {
    Number,
    Boolean,
    String,
    NumberVector,
    NumberMatrix,
    /// Fixed-width `{lower, upper}` object.
    Interval,
    /// Arbitrary JSON. Only reachable through an explicit annotation.
    Json,
}

impl ReturnKind {
    pub const ALL: [ReturnKind; 7] = [
        ReturnKind::Number,
        ReturnKind::Boolean,
        ReturnKind::String,
        ReturnKind::NumberVector,
        ReturnKind::NumberMatrix,
        ReturnKind::Interval,
        ReturnKind::Json,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnKind::Number => "number",
            ReturnKind::Boolean => "boolean",
            ReturnKind::String => "string",
            ReturnKind::NumberVector => "numberVector",
            ReturnKind::NumberMatrix => "numberMatrix",
            ReturnKind::Interval => "interval",
            ReturnKind::Json => "json",
        }
    }
}

impl fmt::Display for ReturnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReturnKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ReturnKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::Registry(format!("unknown return kind '{}'", s)))
    }
}

const PARAM_EXACT: &[(&str, ParamKind)] = &[
    ("groups", ParamKind::NumberVectorOrMatrix),
    ("data", ParamKind::NumberVector),
    ("values", ParamKind::NumberVector),
    ("x", ParamKind::NumberVector),
    ("y", ParamKind::NumberVector),
    ("group1", ParamKind::NumberVector),
    ("group2", ParamKind::NumberVector),
    ("before", ParamKind::NumberVector),
    ("after", ParamKind::NumberVector),
    ("observed", ParamKind::NumberVector),
    ("expected", ParamKind::NumberVector),
    ("factorA", ParamKind::StringOrNumberVector),
    ("factorB", ParamKind::StringOrNumberVector),
    ("weights", ParamKind::NullableNumberVector),
    ("alternative", ParamKind::String),
    ("method", ParamKind::String),
    ("distribution", ParamKind::String),
    ("linkage", ParamKind::String),
    ("equalVar", ParamKind::Boolean),
    ("continuity", ParamKind::Boolean),
    ("standardize", ParamKind::Boolean),
    ("popmean", ParamKind::Number),
    ("alpha", ParamKind::Number),
    ("ddof", ParamKind::Number),
    ("nClusters", ParamKind::Number),
    ("nComponents", ParamKind::Number),
    ("nFactors", ParamKind::Number),
    ("maxIter", ParamKind::Number),
    ("lag", ParamKind::Number),
];

const PARAM_SUFFIX: &[(&str, ParamKind)] = &[
    ("Matrix", ParamKind::NumberMatrix),
    ("Values", ParamKind::NumberVectorOrMatrix),
    ("Labels", ParamKind::StringVector),
    ("Names", ParamKind::StringVector),
    ("Weights", ParamKind::NullableNumberVector),
    ("Data", ParamKind::NumberVector),
    ("Level", ParamKind::Number),
    ("Count", ParamKind::Number),
    ("Method", ParamKind::String),
];

const RETURN_EXACT: &[(&str, ReturnKind)] = &[
    ("statistic", ReturnKind::Number),
    ("pValue", ReturnKind::Number),
    ("df", ReturnKind::Number),
    ("n", ReturnKind::Number),
    ("mean", ReturnKind::Number),
    ("median", ReturnKind::Number),
    ("std", ReturnKind::Number),
    ("variance", ReturnKind::Number),
    ("min", ReturnKind::Number),
    ("max", ReturnKind::Number),
    ("q1", ReturnKind::Number),
    ("q3", ReturnKind::Number),
    ("iqr", ReturnKind::Number),
    ("sem", ReturnKind::Number),
    ("skewness", ReturnKind::Number),
    ("kurtosis", ReturnKind::Number),
    ("correlation", ReturnKind::Number),
    ("intercept", ReturnKind::Number),
    ("slope", ReturnKind::Number),
    ("inertia", ReturnKind::Number),
    ("alpha", ReturnKind::Number),
    ("significant", ReturnKind::Boolean),
    ("isNormal", ReturnKind::Boolean),
    ("converged", ReturnKind::Boolean),
    ("equalVar", ReturnKind::Boolean),
    ("interpretation", ReturnKind::String),
    ("method", ReturnKind::String),
    ("alternative", ReturnKind::String),
    ("ci", ReturnKind::Interval),
    ("confidenceInterval", ReturnKind::Interval),
    ("coefficients", ReturnKind::NumberVector),
    ("residuals", ReturnKind::NumberVector),
    ("predictions", ReturnKind::NumberVector),
    ("means", ReturnKind::NumberVector),
    ("loadings", ReturnKind::NumberMatrix),
    ("centers", ReturnKind::NumberMatrix),
];

const RETURN_SUFFIX: &[(&str, ReturnKind)] = &[
    ("PValues", ReturnKind::NumberVector),
    ("PValue", ReturnKind::Number),
    ("Statistic", ReturnKind::Number),
    ("Squared", ReturnKind::Number),
    ("Ratio", ReturnKind::Number),
    ("Size", ReturnKind::Number),
    ("Count", ReturnKind::Number),
    ("Df", ReturnKind::Number),
    ("Variance", ReturnKind::Number),
    ("Interval", ReturnKind::Interval),
    ("CI", ReturnKind::Interval),
    ("Matrix", ReturnKind::NumberMatrix),
    ("Loadings", ReturnKind::NumberMatrix),
    ("Values", ReturnKind::NumberVector),
    ("Coefficients", ReturnKind::NumberVector),
    ("Errors", ReturnKind::NumberVector),
    ("Means", ReturnKind::NumberVector),
    ("Labels", ReturnKind::NumberVector),
    ("Significant", ReturnKind::Boolean),
    ("Converged", ReturnKind::Boolean),
    ("Text", ReturnKind::String),
];

fn lookup<K: Copy>(name: &str, exact: &[(&str, K)], suffix: &[(&str, K)]) -> Option<K> {
    if let Some((_, kind)) = exact.iter().find(|(n, _)| *n == name) {
        return Some(*kind);
    }
    suffix
        .iter()
        .find(|(s, _)| name.len() > s.len() && name.ends_with(s))
        .map(|(_, kind)| *kind)
}

/// Infer a parameter kind from its name.
pub fn infer_param_kind(name: &str) -> Option<ParamKind> {
    lookup(name, PARAM_EXACT, PARAM_SUFFIX)
}

/// Infer a return kind from its name.
pub fn infer_return_kind(name: &str) -> Option<ReturnKind> {
    lookup(name, RETURN_EXACT, RETURN_SUFFIX)
}
