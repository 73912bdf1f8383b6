//! Gauge registry and Prometheus exposition.
//!
//! Every metric is registered once at startup as a `GaugeVec` with a fixed
//! label key set. Samples overwrite the previous value of their label
//! combination and stay in place until overwritten again, so a failed poll
//! leaves the last known values visible.

use std::collections::HashMap;

use parking_lot::RwLock;
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};

use sqlgauge_core::{LabelSet, Value};

use crate::error::SinkError;

/// Destination for mapped observations.
pub trait MetricSink: Send + Sync {
    /// Register a gauge and fix its label schema.
    fn create_gauge(&self, name: &str, description: &str, label_keys: &[String]) -> Result<(), SinkError>;

    /// Set one sample. `labels` must carry exactly the registered keys.
    fn set_gauge(&self, name: &str, value: &Value, labels: &LabelSet) -> Result<(), SinkError>;

    /// Render all registered metrics in the text exposition format.
    fn render(&self) -> Result<String, SinkError>;
}

struct RegisteredGauge {
    gauges: GaugeVec,
    label_keys: Vec<String>,
}

/// Prometheus-backed [`MetricSink`].
pub struct GaugeRegistry {
    registry: Registry,
    gauges: RwLock<HashMap<String, RegisteredGauge>>,
}

impl GaugeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            gauges: RwLock::new(HashMap::new()),
        }
    }

    /// Number of registered metrics.
    pub fn metric_count(&self) -> usize {
        self.gauges.read().len()
    }

    /// Registered label keys of a metric.
    pub fn label_keys(&self, name: &str) -> Option<Vec<String>> {
        self.gauges.read().get(name).map(|g| g.label_keys.clone())
    }

    /// Current sample of a metric for a label set, if it was ever set.
    pub fn sample(&self, name: &str, labels: &LabelSet) -> Option<f64> {
        let family = self
            .registry
            .gather()
            .into_iter()
            .find(|mf| mf.get_name() == name)?;
        family
            .get_metric()
            .iter()
            .find(|m| {
                m.get_label().len() == labels.len()
                    && m.get_label()
                        .iter()
                        .all(|pair| labels.get(pair.get_name()).map(String::as_str) == Some(pair.get_value()))
            })
            .map(|m| m.get_gauge().get_value())
    }
}

impl Default for GaugeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricSink for GaugeRegistry {
    fn create_gauge(&self, name: &str, description: &str, label_keys: &[String]) -> Result<(), SinkError> {
        let mut gauges = self.gauges.write();
        if let Some(existing) = gauges.get(name) {
            if existing.label_keys == label_keys {
                return Ok(());
            }
            return Err(SinkError::SchemaConflict {
                metric: name.to_string(),
                existing: existing.label_keys.clone(),
            });
        }

        // Prometheus rejects empty help text.
        let help = if description.trim().is_empty() { name } else { description };
        let keys: Vec<&str> = label_keys.iter().map(String::as_str).collect();
        let vec = GaugeVec::new(Opts::new(name, help), &keys)?;
        self.registry.register(Box::new(vec.clone()))?;

        tracing::debug!(metric = name, labels = ?label_keys, "gauge registered");
        gauges.insert(
            name.to_string(),
            RegisteredGauge {
                gauges: vec,
                label_keys: label_keys.to_vec(),
            },
        );
        Ok(())
    }

    fn set_gauge(&self, name: &str, value: &Value, labels: &LabelSet) -> Result<(), SinkError> {
        let gauges = self.gauges.read();
        let registered = gauges
            .get(name)
            .ok_or_else(|| SinkError::UnknownMetric(name.to_string()))?;

        let sample = value.as_f64().ok_or_else(|| SinkError::NonNumeric {
            metric: name.to_string(),
            value: value.to_string(),
        })?;

        let values = ordered_values(name, &registered.label_keys, labels)?;
        registered
            .gauges
            .get_metric_with_label_values(&values)?
            .set(sample);
        Ok(())
    }

    fn render(&self) -> Result<String, SinkError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| SinkError::Encoding(e.to_string()))
    }
}

/// Label values in schema order; the key sets must match exactly.
fn ordered_values<'a>(
    name: &str,
    label_keys: &[String],
    labels: &'a LabelSet,
) -> Result<Vec<&'a str>, SinkError> {
    let mismatch = || SinkError::LabelMismatch {
        metric: name.to_string(),
        expected: label_keys.to_vec(),
        got: labels.keys().cloned().collect(),
    };

    if labels.len() != label_keys.len() {
        return Err(mismatch());
    }
    label_keys
        .iter()
        .map(|key| labels.get(key).map(String::as_str).ok_or_else(mismatch))
        .collect()
}
