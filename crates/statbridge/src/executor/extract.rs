//! Column extraction from tabular rows.
//!
//! Rows are string-keyed JSON records. A missing key and an explicit `null`
//! are treated the same. Every number that leaves this module is finite.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One tabular record.
pub type Row = Map<String, Value>;

/// Interpret one cell as a number.
///
/// Numbers pass through and strings are parsed; `null`, booleans, arrays and
/// objects are not numbers. Non-finite results are rejected.
pub fn parse_numeric_cell(cell: Option<&Value>) -> Option<f64> {
    let value = match cell? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => return None,
    };
    value.is_finite().then_some(value)
}

/// Interpret one cell as a category label.
fn category_key(cell: Option<&Value>) -> Option<String> {
    match cell? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// A single extracted column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Column {
    pub values: Vec<f64>,
    pub dropped: usize,
}

pub fn extract_column(rows: &[Row], column: &str) -> Column {
    let mut out = Column::default();
    for row in rows {
        match parse_numeric_cell(row.get(column)) {
            Some(v) => out.values.push(v),
            None => out.dropped += 1,
        }
    }
    out
}

/// Rows where every listed column parses, as a row-major matrix.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompleteRows {
    pub rows: Vec<Vec<f64>>,
    pub dropped: usize,
}

impl CompleteRows {
    /// Values of column `index` across the kept rows.
    pub fn column(&self, index: usize) -> Vec<f64> {
        self.rows.iter().map(|row| row[index]).collect()
    }
}

/// Listwise extraction: a row is kept only if all `columns` are numeric.
pub fn extract_complete_rows(rows: &[Row], columns: &[String]) -> CompleteRows {
    let mut out = CompleteRows::default();
    for row in rows {
        let parsed: Option<Vec<f64>> = columns
            .iter()
            .map(|column| parse_numeric_cell(row.get(column)))
            .collect();
        match parsed {
            Some(values) => out.rows.push(values),
            None => out.dropped += 1,
        }
    }
    out
}

/// Category labels of one column, with unlabelled rows dropped.
pub fn extract_labels(rows: &[Row], column: &str) -> (Vec<String>, usize) {
    let mut labels = Vec::with_capacity(rows.len());
    let mut dropped = 0;
    for row in rows {
        match category_key(row.get(column)) {
            Some(label) => labels.push(label),
            None => dropped += 1,
        }
    }
    (labels, dropped)
}

/// A numeric response crossed with two categorical factors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Factorial {
    pub values: Vec<f64>,
    pub factor_a: Vec<String>,
    pub factor_b: Vec<String>,
    pub dropped: usize,
}

/// Listwise extraction of a value column and two factor columns.
pub fn extract_factorial(rows: &[Row], value: &str, factor_a: &str, factor_b: &str) -> Factorial {
    let mut out = Factorial::default();
    for row in rows {
        let parsed = (
            parse_numeric_cell(row.get(value)),
            category_key(row.get(factor_a)),
            category_key(row.get(factor_b)),
        );
        match parsed {
            (Some(v), Some(a), Some(b)) => {
                out.values.push(v);
                out.factor_a.push(a);
                out.factor_b.push(b);
            }
            _ => out.dropped += 1,
        }
    }
    out
}

/// Values split by a categorical key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Grouped {
    /// Group labels in order of first appearance.
    pub labels: Vec<String>,
    /// One vector per label. A group whose values all failed to parse is
    /// kept as an empty vector.
    pub groups: Vec<Vec<f64>>,
    pub dropped: usize,
}

impl Grouped {
    pub fn non_empty(&self) -> usize {
        self.groups.iter().filter(|g| !g.is_empty()).count()
    }

    pub fn empty_labels(&self) -> Vec<&str> {
        self.labels
            .iter()
            .zip(&self.groups)
            .filter(|(_, g)| g.is_empty())
            .map(|(label, _)| label.as_str())
            .collect()
    }

    pub fn sizes(&self) -> Vec<usize> {
        self.groups.iter().map(Vec::len).collect()
    }
}

/// Group `value_column` by `group_column`.
///
/// A row whose key is missing is dropped entirely. A row with a key but a
/// non-numeric value still registers its group.
pub fn extract_groups(rows: &[Row], value_column: &str, group_column: &str) -> Grouped {
    let mut out = Grouped::default();
    let mut index: BTreeMap<String, usize> = BTreeMap::new();

    for row in rows {
        let Some(key) = category_key(row.get(group_column)) else {
            out.dropped += 1;
            continue;
        };
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            out.labels.push(key);
            out.groups.push(Vec::new());
            out.groups.len() - 1
        });
        match parse_numeric_cell(row.get(value_column)) {
            Some(v) => out.groups[slot].push(v),
            None => out.dropped += 1,
        }
    }
    out
}

/// Cross-tabulated counts of two categorical columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contingency {
    pub row_labels: Vec<String>,
    pub column_labels: Vec<String>,
    pub counts: Vec<Vec<f64>>,
    #[serde(skip)]
    pub dropped: usize,
}

impl Contingency {
    pub fn total(&self) -> f64 {
        self.counts.iter().flatten().sum()
    }
}

pub fn extract_contingency(rows: &[Row], row_column: &str, column_column: &str) -> Contingency {
    let mut out = Contingency::default();
    let mut pairs = Vec::new();

    for row in rows {
        match (
            category_key(row.get(row_column)),
            category_key(row.get(column_column)),
        ) {
            (Some(r), Some(c)) => pairs.push((r, c)),
            _ => out.dropped += 1,
        }
    }

    for (r, c) in &pairs {
        if !out.row_labels.contains(r) {
            out.row_labels.push(r.clone());
        }
        if !out.column_labels.contains(c) {
            out.column_labels.push(c.clone());
        }
    }

    out.counts = vec![vec![0.0; out.column_labels.len()]; out.row_labels.len()];
    for (r, c) in &pairs {
        let i = out.row_labels.iter().position(|l| l == r);
        let j = out.column_labels.iter().position(|l| l == c);
        if let (Some(i), Some(j)) = (i, j) {
            out.counts[i][j] += 1.0;
        }
    }
    out
}
