//! Polling tasks and their supervisor.
//!
//! Each connection gets a keeper task that retries `connect` on its own
//! interval, and each (connection, query) pair gets a [`QueryTask`] that
//! repeatedly reconnects, executes, maps and emits. Cycles of one query
//! task never overlap; tasks of different queries are unordered.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use sqlgauge_core::{MetricBinding, RowMappingEngine};

use crate::connection::QueryConnection;
use crate::sink::MetricSink;

/// Outcome of one query cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Rows returned by the query (a failed execution yields one empty row).
    pub rows: usize,
    /// Observations produced by mapping.
    pub observations: usize,
    /// Observations accepted by the sink.
    pub emitted: usize,
    /// Observations the sink rejected.
    pub failed: usize,
}

/// One periodic (connection, query) task.
pub struct QueryTask {
    connection: Arc<dyn QueryConnection>,
    sink: Arc<dyn MetricSink>,
    engine: RowMappingEngine,
    bindings: Vec<MetricBinding>,
    query_name: String,
    sql: String,
    interval: Duration,
}

impl QueryTask {
    /// Create a task from its configuration snapshot.
    pub fn new(
        connection: Arc<dyn QueryConnection>,
        sink: Arc<dyn MetricSink>,
        engine: RowMappingEngine,
        bindings: Vec<MetricBinding>,
        query_name: impl Into<String>,
        sql: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            connection,
            sink,
            engine,
            bindings,
            query_name: query_name.into(),
            sql: sql.into(),
            interval,
        }
    }

    /// `connection/query`, unique per task.
    pub fn name(&self) -> String {
        format!("{}/{}", self.connection.name(), self.query_name)
    }

    /// Polling interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one cycle: reopen the connection, execute, map, emit.
    ///
    /// The connection is closed and reopened every time, even if it looks
    /// healthy. Sink rejections are logged per observation; previously set
    /// values are left untouched when nothing is emitted.
    pub async fn run_cycle(&self) -> CycleReport {
        self.connection.close().await;
        self.connection.connect().await;

        let rows = self.connection.execute(&self.sql, &self.query_name).await;
        let observations = self.engine.map(&rows, &self.bindings);

        let mut report = CycleReport {
            rows: rows.len(),
            observations: observations.len(),
            ..CycleReport::default()
        };

        for obs in &observations {
            match self.sink.set_gauge(&obs.metric, &obs.value, &obs.labels) {
                Ok(()) => report.emitted += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        query = %self.query_name,
                        connection = self.connection.name(),
                        metric = %obs.metric,
                        error = %e,
                        "failed to set gauge"
                    );
                }
            }
        }

        tracing::debug!(
            query = %self.query_name,
            connection = self.connection.name(),
            rows = report.rows,
            emitted = report.emitted,
            failed = report.failed,
            "query cycle completed"
        );
        report
    }

    /// Run cycles until shutdown is signalled.
    ///
    /// The sleep between cycles happens whatever the cycle's outcome, a
    /// panic included.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            query = %self.query_name,
            connection = self.connection.name(),
            interval_secs = self.interval.as_secs(),
            "starting query task"
        );

        loop {
            if AssertUnwindSafe(self.run_cycle()).catch_unwind().await.is_err() {
                tracing::error!(
                    query = %self.query_name,
                    connection = self.connection.name(),
                    "query cycle panicked"
                );
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.recv() => {
                    tracing::debug!(query = %self.query_name, "query task stopping");
                    break;
                }
            }
        }
    }
}

/// Keep a connection open, retrying every `interval` until shutdown.
pub async fn keep_connection(
    connection: Arc<dyn QueryConnection>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    tracing::info!(
        connection = connection.name(),
        retry_secs = interval.as_secs(),
        "starting connection keeper"
    );

    loop {
        connection.connect().await;

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.recv() => {
                tracing::debug!(connection = connection.name(), "connection keeper stopping");
                break;
            }
        }
    }
}

/// Kind of supervised task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Connection keeper.
    Keeper,
    /// Query poller.
    Query,
}

struct SupervisedTask {
    name: String,
    kind: TaskKind,
    handle: JoinHandle<()>,
}

/// Registry of running tasks with a shared shutdown signal.
pub struct Supervisor {
    shutdown_tx: broadcast::Sender<()>,
    tasks: Vec<SupervisedTask>,
}

impl Supervisor {
    /// Create an empty supervisor.
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            shutdown_tx,
            tasks: Vec::new(),
        }
    }

    /// A receiver that fires when [`Supervisor::shutdown`] is called.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Spawn a keeper task for a connection.
    pub fn spawn_keeper(&mut self, connection: Arc<dyn QueryConnection>, interval: Duration) {
        let name = connection.name().to_string();
        let handle = tokio::spawn(keep_connection(connection, interval, self.subscribe()));
        self.tasks.push(SupervisedTask {
            name,
            kind: TaskKind::Keeper,
            handle,
        });
    }

    /// Spawn a query task.
    pub fn spawn_query(&mut self, task: QueryTask) {
        let name = task.name();
        let handle = tokio::spawn(task.run(self.subscribe()));
        self.tasks.push(SupervisedTask {
            name,
            kind: TaskKind::Query,
            handle,
        });
    }

    /// Names and kinds of all supervised tasks, in spawn order.
    pub fn tasks(&self) -> Vec<(String, TaskKind)> {
        self.tasks.iter().map(|t| (t.name.clone(), t.kind)).collect()
    }

    /// Number of supervised tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether no task was spawned.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Signal every task to stop, wait up to `grace`, then abort stragglers.
    ///
    /// Tasks stop at their next sleep; a query in flight is not awaited
    /// beyond the grace period.
    pub async fn shutdown(self, grace: Duration) {
        let _ = self.shutdown_tx.send(());
        let deadline = tokio::time::Instant::now() + grace;

        for mut task in self.tasks {
            match tokio::time::timeout_at(deadline, &mut task.handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(task = %task.name, error = %e, "task failed"),
                Err(_) => {
                    tracing::warn!(task = %task.name, "task did not stop in time, aborting");
                    task.handle.abort();
                }
            }
        }
        tracing::info!("all tasks stopped");
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}
