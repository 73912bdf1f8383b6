//! Row-to-metric mapping.
//!
//! For every binding of a query, the engine decides which rows contribute an
//! observation and which labels each observation carries:
//!
//! - **Static labels** (no `$N` template): only the first row is used and at
//!   most one observation is emitted. Extra rows are ignored.
//! - **Dynamic labels** (any `$N` template): every row is mapped on its own,
//!   fanning one query out into one labeled series per row.
//!
//! In both cases a row too short to hold the value column emits nothing, and
//! the gauge's own labels take precedence over connection labels on key
//! collision. Mapping never fails: unresolvable placeholders become
//! [`INVALID_LABEL_VALUE`](crate::label::INVALID_LABEL_VALUE).

use std::collections::BTreeMap;

use crate::binding::MetricBinding;
use crate::label::LabelResolver;
use crate::row::{ResultRow, Value};

/// Label name to value, ordered by name.
pub type LabelSet = BTreeMap<String, String>;

/// One gauge sample produced by a mapping pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Metric name.
    pub metric: String,
    /// Raw cell value; the sink converts it to a sample.
    pub value: Value,
    /// Complete label set.
    pub labels: LabelSet,
}

/// Maps result rows to observations for one connection.
#[derive(Debug, Clone)]
pub struct RowMappingEngine {
    connection_labels: LabelSet,
}

impl RowMappingEngine {
    /// Create an engine that fills remaining label keys from `connection_labels`.
    pub fn new(connection_labels: LabelSet) -> Self {
        Self { connection_labels }
    }

    /// Map a result set through all bindings of a query, in declared order.
    pub fn map(&self, rows: &[ResultRow], bindings: &[MetricBinding]) -> Vec<Observation> {
        let mut observations = Vec::new();
        for binding in bindings {
            self.map_binding(rows, binding, &mut observations);
        }
        observations
    }

    /// Map a result set through a single binding, appending to `out`.
    pub fn map_binding(&self, rows: &[ResultRow], binding: &MetricBinding, out: &mut Vec<Observation>) {
        if binding.has_dynamic_labels {
            for row in rows {
                let labels = self.resolve_labels(binding, row);
                if let Some(value) = row.get(binding.column) {
                    out.push(Observation {
                        metric: binding.name.clone(),
                        value: value.clone(),
                        labels,
                    });
                }
            }
        } else if let Some(row) = rows.first() {
            if let Some(value) = row.get(binding.column) {
                out.push(Observation {
                    metric: binding.name.clone(),
                    value: value.clone(),
                    labels: self.merge(binding.labels.clone()),
                });
            }
        }
    }

    fn resolve_labels(&self, binding: &MetricBinding, row: &ResultRow) -> LabelSet {
        let resolved = binding
            .labels
            .iter()
            .map(|(name, template)| (name.clone(), LabelResolver::resolve(template, row)))
            .collect();
        self.merge(resolved)
    }

    /// Gauge labels are the base; connection labels only fill missing keys.
    fn merge(&self, mut gauge_labels: LabelSet) -> LabelSet {
        for (name, value) in &self.connection_labels {
            gauge_labels
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
        gauge_labels
    }
}
