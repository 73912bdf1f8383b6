//! PostgreSQL connection keeper.

use async_trait::async_trait;
use parking_lot::RwLock;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection as _;
use tokio::sync::Mutex;

use sqlgauge_core::{is_select, ConnectionConfig, ResultRow};

use super::decode::decode_row;
use super::{ConnectionState, QueryConnection};

/// Application name reported to the server.
const APPLICATION_NAME: &str = "sqlgauge";

/// A single PostgreSQL session, opened and closed on demand.
pub struct PgConnectionKeeper {
    name: String,
    target: String,
    options: PgConnectOptions,
    conn: Mutex<Option<PgConnection>>,
    state: RwLock<ConnectionState>,
}

impl PgConnectionKeeper {
    /// Create a keeper for a configured target. Nothing is opened yet.
    pub fn new(config: &ConnectionConfig) -> Self {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.database)
            .username(&config.user)
            .password(&config.password)
            .application_name(APPLICATION_NAME);

        Self {
            name: config.display_name(),
            target: config.target(),
            options,
            conn: Mutex::new(None),
            state: RwLock::new(ConnectionState::Disconnected),
        }
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
    }
}

#[async_trait]
impl QueryConnection for PgConnectionKeeper {
    fn name(&self) -> &str {
        &self.name
    }

    fn target(&self) -> &str {
        &self.target
    }

    fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    async fn connect(&self) {
        let mut guard = self.conn.lock().await;
        if guard.is_some() {
            return;
        }

        match PgConnection::connect_with(&self.options).await {
            Ok(conn) => {
                *guard = Some(conn);
                self.set_state(ConnectionState::Connected);
                tracing::info!(target_db = %self.target, "connected");
            }
            Err(e) => {
                self.set_state(ConnectionState::Disconnected);
                tracing::error!(target_db = %self.target, error = %e, "connection error");
            }
        }
    }

    async fn close(&self) {
        let mut guard = self.conn.lock().await;
        if let Some(conn) = guard.take() {
            self.set_state(ConnectionState::Closed);
            match conn.close().await {
                Ok(()) => tracing::info!(target_db = %self.target, "closed"),
                Err(e) => {
                    tracing::error!(target_db = %self.target, error = %e, "failed to close connection")
                }
            }
        }
    }

    async fn execute(&self, sql: &str, name: &str) -> Vec<ResultRow> {
        if !is_select(sql) {
            tracing::error!(
                target_db = %self.target,
                query = name,
                sql,
                "only SELECT queries are allowed"
            );
            return Vec::new();
        }

        let mut guard = self.conn.lock().await;
        let Some(conn) = guard.as_mut() else {
            tracing::warn!(target_db = %self.target, query = name, "no active connection to execute query");
            return Vec::new();
        };

        match sqlx::query(sql).fetch_all(conn).await {
            Ok(rows) => {
                tracing::debug!(target_db = %self.target, query = name, rows = rows.len(), "executed");
                rows.iter().map(decode_row).collect()
            }
            Err(e) => {
                tracing::warn!(target_db = %self.target, query = name, error = %e, "failed to execute");
                vec![ResultRow::empty()]
            }
        }
    }
}
