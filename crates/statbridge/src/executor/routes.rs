//! Analysis catalogue.
//!
//! Each analysis id names a runtime method, the way its inputs are pulled
//! out of the rows, the minimum amount of data it needs and any arguments
//! the analysis fixes regardless of caller options.

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};
use statbridge_core::{Error, Samples};

use crate::methods::MethodId;

use super::extract::{
    Row, extract_column, extract_complete_rows, extract_contingency, extract_factorial,
    extract_groups, extract_labels,
};
use super::mapping::VariableMapping;
use super::Failure;

/// A fixed argument value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Forced {
    Bool(bool),
    Text(&'static str),
}

impl Forced {
    pub fn to_value(self) -> Value {
        match self {
            Forced::Bool(b) => Value::Bool(b),
            Forced::Text(s) => Value::String(s.to_string()),
        }
    }
}

/// How predictors reach a regression method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predictors {
    /// A single predictor column sent as a vector.
    Vector(&'static str),
    /// One or more predictor columns sent as a row-major matrix.
    Matrix(&'static str),
}

/// Extraction strategy. The `&'static str` fields are the runtime parameter
/// names the extracted data is sent under.
///
/// Mapping roles read by each strategy:
///
/// | Strategy | Roles |
/// |---|---|
/// | `Single`, `Categories` | `variable` |
/// | `TwoSample` | `group1` + `group2`, or `value` + `group` with two levels |
/// | `Paired` | `before` + `after` |
/// | `Groups` | `value` + `group` |
/// | `Factorial` | `value` + `factorA` + `factorB` |
/// | `Bivariate` | `x` + `y` |
/// | `Matrix` | `variables` |
/// | `Contingency` | `row` + `column` |
/// | `Regression` | `dependent` + `independent` |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Single { param: &'static str, min: usize },
    Categories { param: &'static str, min: usize },
    TwoSample { first: &'static str, second: &'static str, min: usize },
    Paired { first: &'static str, second: &'static str, min: usize },
    Groups { param: &'static str, min_groups: usize, min_per_group: usize },
    Factorial { values: &'static str, factor_a: &'static str, factor_b: &'static str, min: usize },
    Bivariate { x: &'static str, y: &'static str, min: usize },
    Matrix { param: &'static str, min_rows: usize, min_columns: usize },
    Contingency { param: &'static str },
    Regression { predictors: Predictors, response: &'static str, min: usize },
}

/// One catalogue entry.
#[derive(Debug, Clone, Copy)]
pub struct Route {
    pub analysis: &'static str,
    pub method: MethodId,
    pub strategy: Strategy,
    pub forced: &'static [(&'static str, Forced)],
}

const fn route(analysis: &'static str, method: MethodId, strategy: Strategy) -> Route {
    Route {
        analysis,
        method,
        strategy,
        forced: &[],
    }
}

const SINGLE: Strategy = Strategy::Single { param: "data", min: 2 };
const TWO_SAMPLE: Strategy = Strategy::TwoSample {
    first: "group1",
    second: "group2",
    min: 2,
};
const PAIRED: Strategy = Strategy::Paired {
    first: "before",
    second: "after",
    min: 2,
};
const GROUPS: Strategy = Strategy::Groups {
    param: "groups",
    min_groups: 2,
    min_per_group: 2,
};
const BIVARIATE: Strategy = Strategy::Bivariate { x: "x", y: "y", min: 3 };
const DATA_MATRIX: Strategy = Strategy::Matrix {
    param: "dataMatrix",
    min_rows: 3,
    min_columns: 2,
};
const OBSERVED_TABLE: Strategy = Strategy::Contingency {
    param: "observedMatrix",
};

pub static ROUTES: &[Route] = &[
    route("descriptive_statistics", MethodId::DescriptiveStats, Strategy::Single { param: "data", min: 1 }),
    route("frequency_table", MethodId::FrequencyTable, Strategy::Categories { param: "categoryLabels", min: 1 }),
    route("outlier_detection", MethodId::OutlierDetection, Strategy::Single { param: "data", min: 3 }),
    route("bootstrap_mean_ci", MethodId::BootstrapMeanCi, SINGLE),
    route("shapiro_wilk", MethodId::ShapiroWilk, Strategy::Single { param: "data", min: 3 }),
    route("kolmogorov_smirnov", MethodId::KolmogorovSmirnov, SINGLE),
    route("anderson_darling", MethodId::AndersonDarling, Strategy::Single { param: "data", min: 3 }),
    route("one_sample_t_test", MethodId::OneSampleTTest, SINGLE),
    route("independent_t_test", MethodId::TwoSampleTTest, TWO_SAMPLE),
    Route {
        analysis: "welch_t_test",
        method: MethodId::TwoSampleTTest,
        strategy: TWO_SAMPLE,
        forced: &[("equalVar", Forced::Bool(false))],
    },
    Route {
        analysis: "student_t_test",
        method: MethodId::TwoSampleTTest,
        strategy: TWO_SAMPLE,
        forced: &[("equalVar", Forced::Bool(true))],
    },
    route("mann_whitney_u", MethodId::MannWhitneyU, TWO_SAMPLE),
    route("paired_t_test", MethodId::PairedTTest, PAIRED),
    route("wilcoxon_signed_rank", MethodId::WilcoxonSignedRank, PAIRED),
    route("sign_test", MethodId::SignTest, PAIRED),
    route("one_way_anova", MethodId::OneWayAnova, GROUPS),
    route("welch_anova", MethodId::WelchAnova, GROUPS),
    route("kruskal_wallis", MethodId::KruskalWallis, GROUPS),
    route("friedman_test", MethodId::FriedmanTest, Strategy::Groups { param: "groups", min_groups: 3, min_per_group: 2 }),
    route("tukey_hsd", MethodId::TukeyHsd, GROUPS),
    route("levene_test", MethodId::LeveneTest, GROUPS),
    route("bartlett_test", MethodId::BartlettTest, GROUPS),
    route(
        "two_way_anova",
        MethodId::TwoWayAnova,
        Strategy::Factorial { values: "values", factor_a: "factorA", factor_b: "factorB", min: 4 },
    ),
    route("chi_square_independence", MethodId::ChiSquareIndependence, OBSERVED_TABLE),
    route("fisher_exact", MethodId::FisherExact, OBSERVED_TABLE),
    route("mcnemar_test", MethodId::McnemarTest, OBSERVED_TABLE),
    route("pearson_correlation", MethodId::PearsonCorrelation, BIVARIATE),
    route("spearman_correlation", MethodId::SpearmanCorrelation, BIVARIATE),
    route("kendall_tau", MethodId::KendallTau, BIVARIATE),
    route("correlation_matrix", MethodId::CorrelationMatrix, DATA_MATRIX),
    route(
        "linear_regression",
        MethodId::LinearRegression,
        Strategy::Regression { predictors: Predictors::Vector("x"), response: "y", min: 3 },
    ),
    route(
        "polynomial_regression",
        MethodId::PolynomialRegression,
        Strategy::Regression { predictors: Predictors::Vector("x"), response: "y", min: 3 },
    ),
    route(
        "multiple_regression",
        MethodId::MultipleRegression,
        Strategy::Regression { predictors: Predictors::Matrix("predictorMatrix"), response: "y", min: 3 },
    ),
    route(
        "logistic_regression",
        MethodId::LogisticRegression,
        Strategy::Regression { predictors: Predictors::Matrix("predictorMatrix"), response: "y", min: 3 },
    ),
    route("autocorrelation", MethodId::Autocorrelation, Strategy::Single { param: "data", min: 4 }),
    route("pca", MethodId::PcaAnalysis, DATA_MATRIX),
    route("factor_analysis", MethodId::FactorAnalysis, DATA_MATRIX),
    route("kmeans_clustering", MethodId::KmeansClustering, DATA_MATRIX),
    route("hierarchical_clustering", MethodId::HierarchicalClustering, DATA_MATRIX),
    route("dbscan_clustering", MethodId::DbscanClustering, DATA_MATRIX),
    route(
        "cronbach_alpha",
        MethodId::CronbachAlpha,
        Strategy::Matrix { param: "itemMatrix", min_rows: 2, min_columns: 2 },
    ),
];

/// Look up an analysis by id.
pub fn find(analysis: &str) -> Option<&'static Route> {
    ROUTES.iter().find(|r| r.analysis == analysis)
}

/// Data pulled out of the rows for one call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedDataset {
    /// Numeric arguments, keyed by runtime parameter name.
    pub vectors: BTreeMap<String, Samples>,
    /// Label arguments, keyed by runtime parameter name.
    pub labels: BTreeMap<String, Vec<String>>,
    /// Context for the caller that is not sent to the runtime.
    pub info: Map<String, Value>,
    pub sample_sizes: BTreeMap<String, usize>,
    pub dropped_count: usize,
}

impl ExtractedDataset {
    fn vector(&mut self, param: &str, values: Vec<f64>) {
        self.sample_sizes.insert(param.to_string(), values.len());
        self.vectors.insert(param.to_string(), Samples::Vector(values));
    }

    fn matrix(&mut self, param: &str, rows: Vec<Vec<f64>>) {
        self.sample_sizes.insert(param.to_string(), rows.len());
        self.vectors.insert(param.to_string(), Samples::Matrix(rows));
    }

    /// Runtime arguments carried by this dataset.
    pub fn args(&self) -> Map<String, Value> {
        let numeric = self.vectors.iter().map(|(k, v)| (k.clone(), samples_value(v)));
        let labels = self
            .labels
            .iter()
            .map(|(k, v)| (k.clone(), json!(v)));
        numeric.chain(labels).collect()
    }
}

fn samples_value(samples: &Samples) -> Value {
    match samples {
        Samples::Vector(v) => json!(v),
        Samples::Matrix(m) => json!(m),
    }
}

fn require<'m>(mapping: &'m VariableMapping, role: &'static str) -> Result<&'m str, Failure> {
    mapping.column(role).ok_or(Failure::MissingRole(role))
}

fn insufficient(message: String) -> Failure {
    Failure::Core(Error::InsufficientData(message))
}

fn at_least(what: &str, have: usize, min: usize) -> Result<(), Failure> {
    if have < min {
        return Err(insufficient(format!(
            "{} has {} usable value{}, at least {} required",
            what,
            have,
            if have == 1 { "" } else { "s" },
            min
        )));
    }
    Ok(())
}

impl Strategy {
    /// Extract this strategy's inputs and check the minimum sample rule.
    pub fn extract(&self, rows: &[Row], mapping: &VariableMapping) -> Result<ExtractedDataset, Failure> {
        let mut out = ExtractedDataset::default();

        match *self {
            Strategy::Single { param, min } => {
                let column = require(mapping, "variable")?;
                let extracted = extract_column(rows, column);
                at_least(&format!("column '{}'", column), extracted.values.len(), min)?;
                out.dropped_count = extracted.dropped;
                out.vector(param, extracted.values);
            }

            Strategy::Categories { param, min } => {
                let column = require(mapping, "variable")?;
                let (labels, dropped) = extract_labels(rows, column);
                at_least(&format!("column '{}'", column), labels.len(), min)?;
                out.dropped_count = dropped;
                out.sample_sizes.insert(param.to_string(), labels.len());
                out.labels.insert(param.to_string(), labels);
            }

            Strategy::TwoSample { first, second, min } => {
                if mapping.has("group1") || mapping.has("group2") {
                    let a = extract_column(rows, require(mapping, "group1")?);
                    let b = extract_column(rows, require(mapping, "group2")?);
                    at_least("group1", a.values.len(), min)?;
                    at_least("group2", b.values.len(), min)?;
                    out.dropped_count = a.dropped + b.dropped;
                    out.vector(first, a.values);
                    out.vector(second, b.values);
                } else {
                    let value = require(mapping, "value")?;
                    let group = require(mapping, "group")?;
                    let grouped = extract_groups(rows, value, group);
                    if grouped.labels.len() != 2 {
                        return Err(Failure::Mapping(format!(
                            "grouping column '{}' must have exactly 2 levels, found {}",
                            group,
                            grouped.labels.len()
                        )));
                    }
                    for (label, values) in grouped.labels.iter().zip(&grouped.groups) {
                        at_least(&format!("group '{}'", label), values.len(), min)?;
                    }
                    out.dropped_count = grouped.dropped;
                    out.info.insert("groupLabels".to_string(), json!(grouped.labels));
                    let mut groups = grouped.groups.into_iter();
                    out.vector(first, groups.next().unwrap_or_default());
                    out.vector(second, groups.next().unwrap_or_default());
                }
            }

            Strategy::Paired { first, second, min } => {
                let columns = [
                    require(mapping, "before")?.to_string(),
                    require(mapping, "after")?.to_string(),
                ];
                let complete = extract_complete_rows(rows, &columns);
                at_least("paired observations", complete.rows.len(), min)?;
                out.dropped_count = complete.dropped;
                out.vector(first, complete.column(0));
                out.vector(second, complete.column(1));
            }

            Strategy::Groups {
                param,
                min_groups,
                min_per_group,
            } => {
                let value = require(mapping, "value")?;
                let group = require(mapping, "group")?;
                let grouped = extract_groups(rows, value, group);

                if grouped.non_empty() < min_groups {
                    return Err(insufficient(format!(
                        "at least {} groups with data required, found {} of {}",
                        min_groups,
                        grouped.non_empty(),
                        grouped.labels.len()
                    )));
                }
                let empty = grouped.empty_labels();
                if !empty.is_empty() {
                    return Err(insufficient(format!(
                        "group{} {} contain{} no numeric values",
                        if empty.len() == 1 { "" } else { "s" },
                        empty
                            .iter()
                            .map(|l| format!("'{}'", l))
                            .collect::<Vec<_>>()
                            .join(", "),
                        if empty.len() == 1 { "s" } else { "" },
                    )));
                }
                for (label, values) in grouped.labels.iter().zip(&grouped.groups) {
                    at_least(&format!("group '{}'", label), values.len(), min_per_group)?;
                }

                out.dropped_count = grouped.dropped;
                out.info.insert("groupLabels".to_string(), json!(grouped.labels));
                out.info.insert("groupSizes".to_string(), json!(grouped.sizes()));
                out.sample_sizes
                    .insert(param.to_string(), grouped.sizes().iter().sum());
                out.vectors
                    .insert(param.to_string(), Samples::Matrix(grouped.groups));
            }

            Strategy::Factorial {
                values,
                factor_a,
                factor_b,
                min,
            } => {
                let design = extract_factorial(
                    rows,
                    require(mapping, "value")?,
                    require(mapping, "factorA")?,
                    require(mapping, "factorB")?,
                );
                at_least("complete observations", design.values.len(), min)?;
                out.dropped_count = design.dropped;
                out.vector(values, design.values);
                out.labels.insert(factor_a.to_string(), design.factor_a);
                out.labels.insert(factor_b.to_string(), design.factor_b);
            }

            Strategy::Bivariate { x, y, min } => {
                let columns = [
                    require(mapping, "x")?.to_string(),
                    require(mapping, "y")?.to_string(),
                ];
                let complete = extract_complete_rows(rows, &columns);
                at_least("complete pairs", complete.rows.len(), min)?;
                out.dropped_count = complete.dropped;
                out.vector(x, complete.column(0));
                out.vector(y, complete.column(1));
            }

            Strategy::Matrix {
                param,
                min_rows,
                min_columns,
            } => {
                let columns = mapping.columns("variables");
                if columns.len() < min_columns {
                    return Err(Failure::Mapping(format!(
                        "role 'variables' needs at least {} columns, got {}",
                        min_columns,
                        columns.len()
                    )));
                }
                let complete = extract_complete_rows(rows, columns);
                at_least("complete rows", complete.rows.len(), min_rows)?;
                out.dropped_count = complete.dropped;
                out.info.insert("variables".to_string(), json!(columns));
                out.matrix(param, complete.rows);
            }

            Strategy::Contingency { param } => {
                let row = require(mapping, "row")?;
                let column = require(mapping, "column")?;
                let table = extract_contingency(rows, row, column);
                if table.row_labels.len() < 2 || table.column_labels.len() < 2 {
                    return Err(insufficient(format!(
                        "contingency table needs at least 2 levels per variable, got {}x{}",
                        table.row_labels.len(),
                        table.column_labels.len()
                    )));
                }
                out.dropped_count = table.dropped;
                out.info.insert("rowLabels".to_string(), json!(table.row_labels));
                out.info.insert("columnLabels".to_string(), json!(table.column_labels));
                out.sample_sizes.insert(param.to_string(), table.total() as usize);
                out.vectors.insert(param.to_string(), Samples::Matrix(table.counts));
            }

            Strategy::Regression {
                predictors,
                response,
                min,
            } => {
                let dependent = require(mapping, "dependent")?;
                let independent = mapping.columns("independent");
                if independent.is_empty() {
                    return Err(Failure::MissingRole("independent"));
                }
                if matches!(predictors, Predictors::Vector(_)) && independent.len() != 1 {
                    return Err(Failure::Mapping(format!(
                        "role 'independent' takes exactly one column, got {}",
                        independent.len()
                    )));
                }

                let mut columns = independent.to_vec();
                columns.push(dependent.to_string());
                let complete = extract_complete_rows(rows, &columns);
                at_least("complete rows", complete.rows.len(), min)?;

                let n = independent.len();
                let y = complete.column(n);
                out.dropped_count = complete.dropped;
                out.info.insert("predictors".to_string(), json!(independent));
                match predictors {
                    Predictors::Vector(param) => out.vector(param, complete.column(0)),
                    Predictors::Matrix(param) => {
                        let x = complete.rows.iter().map(|row| row[..n].to_vec()).collect();
                        out.matrix(param, x);
                    }
                }
                out.vector(response, y);
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry;

    fn rows(values: Vec<Value>) -> Vec<Row> {
        values
            .into_iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect()
    }

    #[test]
    fn test_catalogue_matches_registry() {
        let registry = registry().unwrap();
        let mut seen = std::collections::HashSet::new();

        for route in ROUTES {
            assert!(seen.insert(route.analysis), "duplicate analysis {}", route.analysis);
            let descriptor = registry.get(route.method.as_str()).unwrap();

            let mut params: Vec<&str> = match route.strategy {
                Strategy::Single { param, .. }
                | Strategy::Categories { param, .. }
                | Strategy::Groups { param, .. }
                | Strategy::Matrix { param, .. }
                | Strategy::Contingency { param } => vec![param],
                Strategy::TwoSample { first, second, .. } | Strategy::Paired { first, second, .. } => {
                    vec![first, second]
                }
                Strategy::Factorial {
                    values,
                    factor_a,
                    factor_b,
                    ..
                } => vec![values, factor_a, factor_b],
                Strategy::Bivariate { x, y, .. } => vec![x, y],
                Strategy::Regression {
                    predictors: Predictors::Vector(p) | Predictors::Matrix(p),
                    response,
                    ..
                } => vec![p, response],
            };
            params.extend(route.forced.iter().map(|(name, _)| *name));

            for param in params {
                assert!(
                    descriptor.param(param).is_some(),
                    "{} sends '{}' which {} does not declare",
                    route.analysis,
                    param,
                    route.method
                );
            }
        }
    }

    #[test]
    fn test_two_sample_from_grouping_column() {
        let data = rows(vec![
            json!({"score": 1, "arm": "a"}),
            json!({"score": 2, "arm": "b"}),
            json!({"score": 3, "arm": "a"}),
            json!({"score": "4", "arm": "b"}),
            json!({"score": null, "arm": "b"}),
        ]);
        let mapping = VariableMapping::new().with("value", "score").with("group", "arm");

        let dataset = TWO_SAMPLE.extract(&data, &mapping).unwrap();
        assert_eq!(dataset.vectors["group1"], Samples::Vector(vec![1.0, 3.0]));
        assert_eq!(dataset.vectors["group2"], Samples::Vector(vec![2.0, 4.0]));
        assert_eq!(dataset.info["groupLabels"], json!(["a", "b"]));
        assert_eq!(dataset.dropped_count, 1);
    }

    #[test]
    fn test_two_sample_needs_two_levels() {
        let data = rows(vec![
            json!({"score": 1, "arm": "a"}),
            json!({"score": 2, "arm": "b"}),
            json!({"score": 3, "arm": "c"}),
        ]);
        let mapping = VariableMapping::new().with("value", "score").with("group", "arm");
        let err = TWO_SAMPLE.extract(&data, &mapping).unwrap_err();
        assert!(err.to_string().contains("exactly 2 levels"));
    }

    #[test]
    fn test_groups_report_empty_group_by_name() {
        let data = rows(vec![
            json!({"v": 1, "g": "a"}),
            json!({"v": 2, "g": "a"}),
            json!({"v": 3, "g": "b"}),
            json!({"v": 4, "g": "b"}),
            json!({"v": "n/a", "g": "c"}),
            json!({"v": 5, "g": "d"}),
            json!({"v": 6, "g": "d"}),
        ]);
        let mapping = VariableMapping::new().with("value", "v").with("group", "g");

        let err = GROUPS.extract(&data, &mapping).unwrap_err();
        assert!(matches!(err, Failure::Core(Error::InsufficientData(_))));
        assert!(err.to_string().contains("'c'"), "{}", err);
    }

    #[test]
    fn test_groups_count_only_non_empty() {
        let data = rows(vec![
            json!({"v": 1, "g": "a"}),
            json!({"v": 2, "g": "a"}),
            json!({"v": null, "g": "b"}),
        ]);
        let mapping = VariableMapping::new().with("value", "v").with("group", "g");

        let err = GROUPS.extract(&data, &mapping).unwrap_err();
        assert!(err.to_string().contains("found 1 of 2"), "{}", err);
    }

    #[test]
    fn test_regression_matrix_is_row_major() {
        let data = rows(vec![
            json!({"y": 1, "a": 1, "b": 10}),
            json!({"y": 2, "a": 2, "b": 20}),
            json!({"y": 3, "a": 3, "b": null}),
            json!({"y": 4, "a": 4, "b": 40}),
        ]);
        let mapping = VariableMapping::new()
            .with("dependent", "y")
            .with("independent", "a")
            .with("independent", "b");
        let strategy = find("multiple_regression").unwrap().strategy;

        let dataset = strategy.extract(&data, &mapping).unwrap();
        assert_eq!(
            dataset.vectors["predictorMatrix"],
            Samples::Matrix(vec![vec![1.0, 10.0], vec![2.0, 20.0], vec![4.0, 40.0]])
        );
        assert_eq!(dataset.vectors["y"], Samples::Vector(vec![1.0, 2.0, 4.0]));
        assert_eq!(dataset.dropped_count, 1);
    }

    #[test]
    fn test_missing_role() {
        let err = BIVARIATE
            .extract(&[], &VariableMapping::new().with("x", "a"))
            .unwrap_err();
        assert!(matches!(err, Failure::MissingRole("y")));
    }

    #[test]
    fn test_contingency_args() {
        let data = rows(vec![
            json!({"r": "a", "c": "x"}),
            json!({"r": "b", "c": "y"}),
            json!({"r": "a", "c": "y"}),
        ]);
        let mapping = VariableMapping::new().with("row", "r").with("column", "c");
        let dataset = OBSERVED_TABLE.extract(&data, &mapping).unwrap();

        assert_eq!(dataset.args()["observedMatrix"], json!([[1.0, 1.0], [0.0, 1.0]]));
        assert_eq!(dataset.sample_sizes["observedMatrix"], 3);
    }
}
