//! sqlgauge Core - Row-to-metric mapping, label schema, and configuration.
//!
//! This crate holds the I/O-free part of sqlgauge: it turns the rows returned
//! by a polled query into gauge observations. Database access, scheduling and
//! HTTP exposition live in `sqlgauge-exporter`.
//!
//! # Usage
//!
//! ```ignore
//! use sqlgauge_core::{MetricBinding, RowMappingEngine, ResultRow, Value};
//!
//! let bindings = MetricBinding::from_specs(&query.gauges);
//! let engine = RowMappingEngine::new(connection_labels);
//! for obs in engine.map(&rows, &bindings) {
//!     sink.set_gauge(&obs.metric, &obs.value, &obs.labels)?;
//! }
//! ```

pub mod binding;
pub mod config;
pub mod error;
pub mod label;
pub mod mapping;
pub mod row;
pub mod schema;
pub mod statement;

pub use binding::MetricBinding;
pub use config::{ConnectionConfig, ExporterConfig, GaugeSpec, GlobalConfig, QueryConfig};
pub use error::ConfigError;
pub use label::{LabelResolver, INVALID_LABEL_VALUE};
pub use mapping::{LabelSet, Observation, RowMappingEngine};
pub use row::{ResultRow, Value};
pub use schema::{
    build_metric_schemas, connection_label_keys, connection_labels, ensure_bindings_covered,
    MetricSchema,
};
pub use statement::is_select;
