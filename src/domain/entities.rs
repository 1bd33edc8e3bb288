/*
Copyright 2024 San Francisco Compute Company

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

use std::collections::BTreeMap;

/// Metrics namespace, prepended to every exposed metric name
pub const NAMESPACE: &str = "dell_hw";

/// Label set of a metric, keys unique
pub type Labels = BTreeMap<String, String>;

/// How the report parser should interpret delimited lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// Infer structure per block
    #[default]
    Dynamic,
    /// Every delimited line is a key/value pair
    KeyValue,
    /// First delimited line of a block is the header, the rest are rows
    Table,
}

/// One row of a report, keyed by normalized field name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Line {
    fields: BTreeMap<String, String>,
}

impl Line {
    /// Create an empty line
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field; the key is stored as given
    pub fn insert(&mut self, key: String, value: String) {
        self.fields.insert(key, value);
    }

    /// Value of a field, if present
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Value of a field, if present and not empty
    pub fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over (key, value) pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Line {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// One block of omreport output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    /// First non-delimited line of the block
    pub title: Option<String>,
    /// Second non-delimited line of the block
    pub description: Option<String>,
    /// Data rows in output order
    pub lines: Vec<Line>,
}

/// Parsed result of one omreport invocation
pub type Output = Vec<Report>;

/// A single observation produced by a mapper, value kept as text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricRecord {
    /// Unprefixed metric name (e.g. `chassis_fan_status`)
    pub name: String,
    /// Numeric value rendered as text
    pub value: String,
    pub labels: Labels,
}

impl MetricRecord {
    pub fn new(name: &str, value: impl Into<String>, labels: Labels) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
            labels,
        }
    }
}

/// A metric ready for exposition
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    /// Fully qualified name (`dell_hw_...`)
    pub name: String,
    pub help: String,
    pub value: f64,
    pub labels: Labels,
}

impl Metric {
    /// Build a namespaced gauge from an unprefixed name
    pub fn gauge(name: &str, help: &str, value: f64, labels: Labels) -> Self {
        Self {
            name: format!("{NAMESPACE}_{name}"),
            help: help.to_string(),
            value,
            labels,
        }
    }
}

/// Build a label set from string pairs
pub fn labels<const N: usize>(pairs: [(&str, &str); N]) -> Labels {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
