//! Database connection management.
//!
//! A [`QueryConnection`] holds at most one live session to a database
//! target. It is shared by the connection's keeper task and all of its query
//! tasks. None of its operations fail outward: connection problems are
//! logged and reflected in [`ConnectionState`], and query problems come back
//! as empty result sets.

mod decode;
mod postgres;

pub use decode::decode_row;
pub use postgres::PgConnectionKeeper;

use async_trait::async_trait;
use serde::Serialize;

use sqlgauge_core::ResultRow;

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Never connected, or the last connect attempt failed.
    Disconnected,
    /// A live session is open.
    Connected,
    /// Closed on purpose; the next connect reopens it.
    Closed,
}

/// A database session that can run read-only queries.
#[async_trait]
pub trait QueryConnection: Send + Sync {
    /// Connection name used in logs and health output.
    fn name(&self) -> &str;

    /// `host:port/database` of the target.
    fn target(&self) -> &str;

    /// Current state.
    fn state(&self) -> ConnectionState;

    /// Open a session. No-op when already connected; failures are logged
    /// and leave the connection disconnected.
    async fn connect(&self);

    /// Close the session, if any.
    async fn close(&self);

    /// Run a SELECT statement.
    ///
    /// Returns no rows when the statement is not a SELECT or there is no
    /// session, and a single empty row when the database reports an error.
    async fn execute(&self, sql: &str, name: &str) -> Vec<ResultRow>;
}
