//! Variable-role mapping: which columns play which role in an analysis.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Role name to one or more column names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableMapping {
    roles: BTreeMap<String, Vec<String>>,
}

impl VariableMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `column` to `role`.
    pub fn with(mut self, role: &str, column: &str) -> Self {
        self.assign(role, column);
        self
    }

    pub fn assign(&mut self, role: &str, column: &str) {
        self.roles
            .entry(role.to_string())
            .or_default()
            .push(column.to_string());
    }

    pub fn columns(&self, role: &str) -> &[String] {
        self.roles.get(role).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First column mapped to `role`.
    pub fn column(&self, role: &str) -> Option<&str> {
        self.columns(role).first().map(String::as_str)
    }

    pub fn has(&self, role: &str) -> bool {
        !self.columns(role).is_empty()
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.roles.keys().map(String::as_str)
    }
}

impl FromStr for VariableMapping {
    type Err = String;

    /// Parse `role=col[,col...]` assignments separated by `;`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut mapping = VariableMapping::new();
        for assignment in s.split(';').map(str::trim).filter(|a| !a.is_empty()) {
            mapping.parse_assignment(assignment)?;
        }
        Ok(mapping)
    }
}

impl VariableMapping {
    /// Add one `role=col[,col...]` assignment.
    pub fn parse_assignment(&mut self, assignment: &str) -> Result<(), String> {
        let (role, columns) = assignment
            .split_once('=')
            .ok_or_else(|| format!("expected role=column, got '{}'", assignment))?;
        let role = role.trim();
        if role.is_empty() {
            return Err(format!("missing role in '{}'", assignment));
        }
        let mut any = false;
        for column in columns.split(',').map(str::trim).filter(|c| !c.is_empty()) {
            self.assign(role, column);
            any = true;
        }
        if !any {
            return Err(format!("no column given for role '{}'", role));
        }
        Ok(())
    }
}
