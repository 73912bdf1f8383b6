//! Label schemas.
//!
//! Gauges are registered once at startup with a fixed label key set, and
//! every later sample must supply exactly those keys. The schema of a metric
//! is the union of the global connection key set and the gauge's own label
//! keys. Connection labels are padded with the invalid-value sentinel so that
//! connections lacking some `extra_labels` key still produce a full set.

use std::collections::{BTreeMap, BTreeSet};

use crate::binding::MetricBinding;
use crate::config::{ConnectionConfig, ExporterConfig};
use crate::error::{ConfigError, Result};
use crate::label::INVALID_LABEL_VALUE;
use crate::mapping::LabelSet;

/// Built-in connection label keys.
pub const DBHOST_LABEL: &str = "dbhost";
pub const DBPORT_LABEL: &str = "dbport";
pub const DBNAME_LABEL: &str = "dbname";

/// Registration schema of one metric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSchema {
    /// Metric name.
    pub name: String,
    /// Help text.
    pub description: String,
    /// Sorted label keys.
    pub label_keys: Vec<String>,
}

/// Global connection key set: built-ins plus every connection's extra keys.
pub fn connection_label_keys(connections: &[ConnectionConfig]) -> BTreeSet<String> {
    let mut keys: BTreeSet<String> = [DBHOST_LABEL, DBPORT_LABEL, DBNAME_LABEL]
        .iter()
        .map(|k| k.to_string())
        .collect();
    for conn in connections {
        keys.extend(conn.extra_labels.keys().cloned());
    }
    keys
}

/// Static labels of one connection, covering every key in `keys`.
///
/// Order of precedence, lowest first: sentinel padding, built-in
/// `dbhost`/`dbport`/`dbname`, the connection's `extra_labels`.
pub fn connection_labels(connection: &ConnectionConfig, keys: &BTreeSet<String>) -> LabelSet {
    let mut labels: LabelSet = keys
        .iter()
        .map(|k| (k.clone(), INVALID_LABEL_VALUE.to_string()))
        .collect();
    labels.insert(DBHOST_LABEL.to_string(), connection.host.clone());
    labels.insert(DBPORT_LABEL.to_string(), connection.port.to_string());
    labels.insert(DBNAME_LABEL.to_string(), connection.database.clone());
    for (k, v) in &connection.extra_labels {
        labels.insert(k.clone(), v.clone());
    }
    labels
}

/// One schema per distinct metric name, in first-declaration order.
///
/// A name declared by several gauges must use the same label keys each time.
pub fn build_metric_schemas(config: &ExporterConfig) -> Result<Vec<MetricSchema>> {
    let conn_keys = connection_label_keys(&config.connections);
    let mut schemas: Vec<MetricSchema> = Vec::new();
    let mut index: BTreeMap<String, usize> = BTreeMap::new();

    for query in &config.queries {
        for gauge in &query.gauges {
            let mut keys = conn_keys.clone();
            keys.extend(gauge.extra_labels.keys().cloned());
            let label_keys: Vec<String> = keys.into_iter().collect();

            match index.get(&gauge.name) {
                Some(&i) => {
                    if schemas[i].label_keys != label_keys {
                        return Err(ConfigError::ConflictingLabels {
                            metric: gauge.name.clone(),
                            first: schemas[i].label_keys.clone(),
                            second: label_keys,
                        });
                    }
                }
                None => {
                    index.insert(gauge.name.clone(), schemas.len());
                    schemas.push(MetricSchema {
                        name: gauge.name.clone(),
                        description: gauge.desc.clone(),
                        label_keys,
                    });
                }
            }
        }
    }

    Ok(schemas)
}

/// Check that every label a binding can emit is part of its metric's schema.
///
/// `connection_keys` is the global connection key set every observation is
/// padded to.
pub fn ensure_bindings_covered(
    schemas: &[MetricSchema],
    bindings: &[MetricBinding],
    connection_keys: &BTreeSet<String>,
) -> Result<()> {
    for binding in bindings {
        let schema = schemas
            .iter()
            .find(|s| s.name == binding.name)
            .ok_or_else(|| ConfigError::UnregisteredLabel {
                metric: binding.name.clone(),
                label: "<metric not registered>".to_string(),
            })?;

        let emitted = binding
            .label_keys()
            .map(str::to_string)
            .chain(connection_keys.iter().cloned());
        for label in emitted {
            if !schema.label_keys.contains(&label) {
                return Err(ConfigError::UnregisteredLabel {
                    metric: binding.name.clone(),
                    label,
                });
            }
        }
    }
    Ok(())
}
