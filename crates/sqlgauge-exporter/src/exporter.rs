//! Startup wiring: schemas, gauges, connections and tasks.

use std::sync::Arc;

use sqlgauge_core::{
    build_metric_schemas, connection_label_keys, connection_labels, ensure_bindings_covered,
    ConnectionConfig, ExporterConfig, LabelSet, MetricBinding, MetricSchema, RowMappingEngine,
};

use crate::connection::{PgConnectionKeeper, QueryConnection};
use crate::error::StartupError;
use crate::scheduler::{QueryTask, Supervisor};
use crate::sink::{GaugeRegistry, MetricSink};
use crate::AppState;

struct ConnectionEntry {
    config: ConnectionConfig,
    labels: LabelSet,
    connection: Arc<dyn QueryConnection>,
}

/// A fully validated exporter, ready to spawn its tasks.
///
/// Every gauge is registered before any task starts, so a label schema
/// problem fails startup instead of surfacing on the first poll.
pub struct Exporter {
    config: ExporterConfig,
    schemas: Vec<MetricSchema>,
    sink: Arc<GaugeRegistry>,
    connections: Vec<ConnectionEntry>,
    bindings: Vec<Vec<MetricBinding>>,
}

impl Exporter {
    /// Build an exporter, creating one connection per configured target
    /// with `connect`.
    pub fn new<F>(config: ExporterConfig, connect: F) -> Result<Self, StartupError>
    where
        F: Fn(&ConnectionConfig) -> Arc<dyn QueryConnection>,
    {
        config.validate()?;

        let schemas = build_metric_schemas(&config)?;
        let sink = Arc::new(GaugeRegistry::new());
        for schema in &schemas {
            sink.create_gauge(&schema.name, &schema.description, &schema.label_keys)?;
        }

        let keys = connection_label_keys(&config.connections);
        let bindings = config
            .queries
            .iter()
            .map(|query| {
                let bindings = MetricBinding::from_specs(&query.gauges);
                ensure_bindings_covered(&schemas, &bindings, &keys)?;
                Ok(bindings)
            })
            .collect::<Result<Vec<_>, StartupError>>()?;

        let connections = config
            .connections
            .iter()
            .map(|conn| ConnectionEntry {
                config: conn.clone(),
                labels: connection_labels(conn, &keys),
                connection: connect(conn),
            })
            .collect();

        tracing::info!(
            connections = config.connections.len(),
            queries = config.queries.len(),
            metrics = schemas.len(),
            "exporter initialized"
        );

        Ok(Self {
            config,
            schemas,
            sink,
            connections,
            bindings,
        })
    }

    /// Build an exporter backed by PostgreSQL connections.
    pub fn postgres(config: ExporterConfig) -> Result<Self, StartupError> {
        Self::new(config, |conn| Arc::new(PgConnectionKeeper::new(conn)))
    }

    /// The validated configuration.
    pub fn config(&self) -> &ExporterConfig {
        &self.config
    }

    /// Registered metric schemas.
    pub fn schemas(&self) -> &[MetricSchema] {
        &self.schemas
    }

    /// The gauge registry every task writes into.
    pub fn sink(&self) -> Arc<GaugeRegistry> {
        Arc::clone(&self.sink)
    }

    /// One task per (connection, query) pair, connections outermost.
    pub fn query_tasks(&self) -> Vec<QueryTask> {
        let mut tasks = Vec::with_capacity(self.connections.len() * self.config.queries.len());
        for entry in &self.connections {
            for (query, bindings) in self.config.queries.iter().zip(&self.bindings) {
                tasks.push(QueryTask::new(
                    Arc::clone(&entry.connection),
                    Arc::clone(&self.sink) as Arc<dyn MetricSink>,
                    RowMappingEngine::new(entry.labels.clone()),
                    bindings.clone(),
                    query.name.clone(),
                    query.query.clone(),
                    query.interval(&self.config.global),
                ));
            }
        }
        tasks
    }

    /// Spawn one keeper per connection, then every query task.
    pub fn spawn(&self, supervisor: &mut Supervisor) {
        for entry in &self.connections {
            let retry = entry.config.retry_interval(&self.config.global);
            supervisor.spawn_keeper(Arc::clone(&entry.connection), retry);
        }
        for task in self.query_tasks() {
            supervisor.spawn_query(task);
        }
    }

    /// Shared state for the HTTP router.
    pub fn app_state(&self) -> AppState {
        AppState {
            sink: Arc::clone(&self.sink) as Arc<dyn MetricSink>,
            connections: self
                .connections
                .iter()
                .map(|entry| Arc::clone(&entry.connection))
                .collect(),
        }
    }
}
