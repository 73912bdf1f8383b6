//! In-memory connection shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use sqlgauge_core::{is_select, ConnectionConfig, ResultRow, Value};
use sqlgauge_exporter::{ConnectionState, QueryConnection};

/// Scripted connection: every `execute` pops the next result set.
pub struct FakeConnection {
    name: String,
    target: String,
    reachable: bool,
    state: Mutex<ConnectionState>,
    results: Mutex<VecDeque<Vec<ResultRow>>>,
    calls: Mutex<Vec<String>>,
}

impl FakeConnection {
    pub fn new(config: &ConnectionConfig) -> Self {
        Self {
            name: config.display_name(),
            target: config.target(),
            reachable: true,
            state: Mutex::new(ConnectionState::Disconnected),
            results: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn unreachable(config: &ConnectionConfig) -> Self {
        Self {
            reachable: false,
            ..Self::new(config)
        }
    }

    pub fn push_result(&self, rows: Vec<ResultRow>) {
        self.results.lock().push_back(rows);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl QueryConnection for FakeConnection {
    fn name(&self) -> &str {
        &self.name
    }

    fn target(&self) -> &str {
        &self.target
    }

    fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    async fn connect(&self) {
        self.calls.lock().push("connect".to_string());
        let mut state = self.state.lock();
        *state = if self.reachable {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        };
    }

    async fn close(&self) {
        self.calls.lock().push("close".to_string());
        let mut state = self.state.lock();
        if *state == ConnectionState::Connected {
            *state = ConnectionState::Closed;
        }
    }

    async fn execute(&self, sql: &str, name: &str) -> Vec<ResultRow> {
        self.calls.lock().push(format!("execute {name}"));
        if !is_select(sql) || self.state() != ConnectionState::Connected {
            return Vec::new();
        }
        self.results.lock().pop_front().unwrap_or_default()
    }
}

/// Build a row from cells.
pub fn row<const N: usize>(cells: [Value; N]) -> ResultRow {
    ResultRow::new(cells.into())
}

/// Registry of fakes keyed by connection target, filled by the factory
/// passed to `Exporter::new`.
#[derive(Default, Clone)]
pub struct FakeFleet {
    connections: Arc<Mutex<Vec<Arc<FakeConnection>>>>,
}

impl FakeFleet {
    pub fn factory(&self, unreachable: &'static [&'static str]) -> impl Fn(&ConnectionConfig) -> Arc<dyn QueryConnection> {
        let connections = Arc::clone(&self.connections);
        move |config| {
            let fake = if unreachable.contains(&config.host.as_str()) {
                FakeConnection::unreachable(config)
            } else {
                FakeConnection::new(config)
            };
            let fake = Arc::new(fake);
            connections.lock().push(Arc::clone(&fake));
            fake as Arc<dyn QueryConnection>
        }
    }

    pub fn get(&self, host: &str) -> Arc<FakeConnection> {
        self.connections
            .lock()
            .iter()
            .find(|c| c.target().starts_with(host))
            .cloned()
            .expect("no fake connection for host")
    }
}
