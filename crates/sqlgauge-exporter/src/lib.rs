//! sqlgauge exporter.
//!
//! Polls SQL databases on a schedule and exposes the mapped query results as
//! Prometheus gauges over HTTP. The row-to-metric mapping itself lives in
//! `sqlgauge-core`; this crate adds database sessions, the polling tasks,
//! the gauge registry and the HTTP surface.

pub mod config;
pub mod connection;
pub mod error;
pub mod exporter;
pub mod logging;
pub mod routes;
pub mod scheduler;
pub mod sink;

pub use config::Args;
pub use connection::{ConnectionState, PgConnectionKeeper, QueryConnection};
pub use error::{SinkError, StartupError};
pub use exporter::Exporter;
pub use scheduler::{CycleReport, QueryTask, Supervisor, TaskKind};
pub use sink::{GaugeRegistry, MetricSink};

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Application state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Registry rendered by `/metrics`.
    pub sink: Arc<dyn MetricSink>,
    /// Connections reported by `/health`.
    pub connections: Vec<Arc<dyn QueryConnection>>,
}

/// Create the router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::metrics::routes())
        .merge(routes::health::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `router` on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> Result<(), StartupError>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(StartupError::Server)
}
