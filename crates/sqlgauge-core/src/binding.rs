//! Metric bindings.
//!
//! A binding is the load-time form of a [`GaugeSpec`]: the value column is
//! resolved to a 0-based index and the label templates are classified once,
//! so the per-tick mapping does no configuration work.

use std::collections::BTreeMap;

use crate::config::GaugeSpec;
use crate::label::LabelResolver;

/// One configured gauge, ready for mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricBinding {
    /// Target metric name.
    pub name: String,
    /// Help text used at registration.
    pub description: String,
    /// 0-based value column.
    pub column: usize,
    /// Label name to raw template.
    pub labels: BTreeMap<String, String>,
    /// True iff at least one label template is a column placeholder.
    pub has_dynamic_labels: bool,
}

impl MetricBinding {
    /// Build a binding for the gauge at `position` in its query's gauge list.
    ///
    /// An explicit `col` wins; otherwise the position itself is the column.
    pub fn new(spec: &GaugeSpec, position: usize) -> Self {
        let column = match spec.col {
            Some(col) => col.saturating_sub(1),
            None => position,
        };
        let has_dynamic_labels = spec
            .extra_labels
            .values()
            .any(|template| LabelResolver::is_placeholder(template));

        Self {
            name: spec.name.clone(),
            description: spec.desc.clone(),
            column,
            labels: spec.extra_labels.clone(),
            has_dynamic_labels,
        }
    }

    /// Build the bindings of one query.
    ///
    /// The position counter advances once per gauge, including gauges with
    /// an explicit `col`, so a later gauge without `col` still lands on its
    /// own position.
    pub fn from_specs(specs: &[GaugeSpec]) -> Vec<Self> {
        specs
            .iter()
            .enumerate()
            .map(|(position, spec)| Self::new(spec, position))
            .collect()
    }

    /// Label keys this binding emits on its own (before connection labels).
    pub fn label_keys(&self) -> impl Iterator<Item = &str> {
        self.labels.keys().map(String::as_str)
    }
}
