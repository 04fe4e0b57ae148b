//! Typed values used by generated wrappers for the compound kinds.

use serde::{Deserialize, Serialize};

/// A `{lower, upper}` interval, e.g. a confidence interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub lower: f64,
    pub upper: f64,
}

impl Interval {
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn contains(&self, x: f64) -> bool {
        self.lower <= x && x <= self.upper
    }
}

/// Either one sample or a list of samples (`number[] | number[][]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Samples {
    Vector(Vec<f64>),
    Matrix(Vec<Vec<f64>>),
}

impl From<Vec<f64>> for Samples {
    fn from(v: Vec<f64>) -> Self {
        Samples::Vector(v)
    }
}

impl From<Vec<Vec<f64>>> for Samples {
    fn from(m: Vec<Vec<f64>>) -> Self {
        Samples::Matrix(m)
    }
}

/// A categorical level that may be a label or a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Level {
    Number(f64),
    Text(String),
}

impl From<&str> for Level {
    fn from(s: &str) -> Self {
        Level::Text(s.to_string())
    }
}

impl From<String> for Level {
    fn from(s: String) -> Self {
        Level::Text(s)
    }
}

impl From<f64> for Level {
    fn from(x: f64) -> Self {
        Level::Number(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_samples_serialize_as_plain_arrays() {
        let groups = Samples::from(vec![vec![1.0, 2.0], vec![]]);
        assert_eq!(serde_json::to_value(&groups).unwrap(), json!([[1.0, 2.0], []]));

        let flat: Samples = serde_json::from_value(json!([1.0, 2.5])).unwrap();
        assert_eq!(flat, Samples::Vector(vec![1.0, 2.5]));
    }

    #[test]
    fn test_levels_mix() {
        let levels = vec![Level::from("a"), Level::from(2.0)];
        assert_eq!(serde_json::to_value(&levels).unwrap(), json!(["a", 2.0]));
    }

    #[test]
    fn test_interval() {
        let ci: Interval = serde_json::from_value(json!({"lower": -1.0, "upper": 3.0})).unwrap();
        assert_eq!(ci.width(), 4.0);
        assert!(ci.contains(0.0));
        assert!(!ci.contains(3.5));
    }
}
