//! Exporter configuration model.
//!
//! The configuration is a YAML document with three sections: `global`
//! defaults, the database `connections` to poll, and the `queries` run
//! against every connection. `${VAR}` and `${VAR:-default}` references in
//! string values of the `global` and `connections` sections are expanded
//! from the environment so credentials can stay out of the file. Query text
//! and gauge definitions are never expanded.
//!
//! Ports and intervals accept integers, floats and numeric strings. Interval
//! fractions truncate toward zero, so `0.5` is rejected like `0`.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_yaml::Value as YamlValue;

use crate::error::{ConfigError, Result};

/// Default HTTP exposition port.
pub const DEFAULT_PORT: u16 = 9844;

/// Default HTTP listen address.
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0";

/// Default query interval in seconds.
pub const DEFAULT_TIME_INTERVAL_SECS: i64 = 15;

/// Default connection retry interval in seconds.
pub const DEFAULT_RETRY_CONN_INTERVAL_SECS: i64 = 60;

/// Sections whose string values go through environment expansion.
const EXPANDED_SECTIONS: [&str; 2] = ["global", "connections"];

/// Pre-compiled regex for environment variable expansion.
/// Pattern: ${VAR} or ${VAR:-default}
static ENV_VAR_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_]*)(?::-([^}]*))?\}")
        .expect("env var regex pattern is invalid - this is a bug")
});

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExporterConfig {
    /// Process-wide defaults.
    #[serde(default)]
    pub global: GlobalConfig,

    /// Database targets.
    pub connections: Vec<ConnectionConfig>,

    /// Queries polled on every connection.
    pub queries: Vec<QueryConfig>,
}

/// Process-wide defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GlobalConfig {
    /// HTTP exposition port.
    #[serde(default = "default_port", deserialize_with = "de_port")]
    pub port: u16,

    /// HTTP listen address.
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Query interval (seconds) for queries without `time_interval`.
    #[serde(default = "default_time_interval", deserialize_with = "de_seconds")]
    pub default_time_interval: i64,

    /// Connection retry interval (seconds) for connections without an override.
    #[serde(default = "default_retry_conn_interval", deserialize_with = "de_seconds")]
    pub retry_conn_interval: i64,

    /// Log level (`trace` .. `error`) used when neither `RUST_LOG` nor
    /// `--log-level` is given.
    #[serde(default)]
    pub log_level: Option<String>,

    /// Directory for log files. When unset, logs only go to stdout.
    #[serde(default)]
    pub log_path: Option<PathBuf>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            listen_address: DEFAULT_LISTEN_ADDRESS.to_string(),
            default_time_interval: DEFAULT_TIME_INTERVAL_SECS,
            retry_conn_interval: DEFAULT_RETRY_CONN_INTERVAL_SECS,
            log_level: None,
            log_path: None,
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_listen_address() -> String {
    DEFAULT_LISTEN_ADDRESS.to_string()
}

fn default_time_interval() -> i64 {
    DEFAULT_TIME_INTERVAL_SECS
}

fn default_retry_conn_interval() -> i64 {
    DEFAULT_RETRY_CONN_INTERVAL_SECS
}

/// A number as written in YAML, or as left behind by env expansion.
#[derive(Deserialize)]
#[serde(untagged)]
enum Numeric {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Numeric {
    fn to_f64<E: de::Error>(&self) -> std::result::Result<f64, E> {
        match self {
            Numeric::Int(v) => Ok(*v as f64),
            Numeric::Float(v) => Ok(*v),
            Numeric::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| E::custom(format!("expected a number, found '{}'", s))),
        }
    }

    /// Whole seconds, fractions truncated.
    fn to_seconds<E: de::Error>(&self) -> std::result::Result<i64, E> {
        match self {
            Numeric::Int(v) => Ok(*v),
            _ => {
                let v = self.to_f64::<E>()?;
                if !v.is_finite() {
                    return Err(E::custom(format!("expected a number of seconds, found {}", v)));
                }
                Ok(v.trunc() as i64)
            }
        }
    }
}

fn de_seconds<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<i64, D::Error> {
    Numeric::deserialize(deserializer)?.to_seconds()
}

fn de_opt_seconds<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<i64>, D::Error> {
    Option::<Numeric>::deserialize(deserializer)?
        .map(|n| n.to_seconds())
        .transpose()
}

fn de_port<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u16, D::Error> {
    let invalid = |found: String| <D::Error as de::Error>::custom(format!("expected a port number, found {}", found));
    let port = match Numeric::deserialize(deserializer)? {
        Numeric::Int(v) => v,
        Numeric::Text(s) => s.trim().parse::<i64>().map_err(|_| invalid(format!("'{}'", s)))?,
        Numeric::Float(v) => return Err(invalid(v.to_string())),
    };
    u16::try_from(port).map_err(|_| invalid(port.to_string()))
}

/// Seconds as a duration; callers pass validated (>= 1) values.
fn seconds(secs: i64) -> Duration {
    Duration::from_secs(secs.max(1).unsigned_abs())
}

/// One database target.
#[derive(Clone, Deserialize, Serialize)]
pub struct ConnectionConfig {
    /// Display name; defaults to `host:port/database`.
    #[serde(default)]
    pub name: Option<String>,

    /// Database host.
    pub host: String,

    /// Database port.
    #[serde(deserialize_with = "de_port")]
    pub port: u16,

    /// Database (service) name.
    pub database: String,

    /// Login user.
    pub user: String,

    /// Login password, passed through to the driver untouched.
    pub password: String,

    /// Static labels attached to every metric polled from this connection.
    #[serde(default)]
    pub extra_labels: BTreeMap<String, String>,

    /// Connection retry interval override (seconds).
    #[serde(default, deserialize_with = "de_opt_seconds")]
    pub retry_conn_interval: Option<i64>,
}

impl ConnectionConfig {
    /// `host:port/database`, used in logs and as the default name.
    pub fn target(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }

    /// Configured name or the target string.
    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.target())
    }

    /// Effective connection retry interval.
    pub fn retry_interval(&self, global: &GlobalConfig) -> Duration {
        seconds(self.retry_conn_interval.unwrap_or(global.retry_conn_interval))
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("extra_labels", &self.extra_labels)
            .field("retry_conn_interval", &self.retry_conn_interval)
            .finish()
    }
}

/// A polled query.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueryConfig {
    /// Query name, used in logs.
    pub name: String,

    /// SQL text. Only SELECT statements are executed.
    pub query: String,

    /// Interval override (seconds).
    #[serde(default, deserialize_with = "de_opt_seconds")]
    pub time_interval: Option<i64>,

    /// Gauges fed from this query's rows, in column order.
    pub gauges: Vec<GaugeSpec>,
}

impl QueryConfig {
    /// Effective polling interval.
    pub fn interval(&self, global: &GlobalConfig) -> Duration {
        seconds(self.time_interval.unwrap_or(global.default_time_interval))
    }
}

/// A gauge fed from one column of a query.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GaugeSpec {
    /// Metric name.
    pub name: String,

    /// Help text.
    #[serde(default)]
    pub desc: String,

    /// Explicit 1-based value column. When absent the gauge's position in
    /// the query's gauge list is used.
    #[serde(default)]
    pub col: Option<usize>,

    /// Label name to template (`literal` or `$N`).
    #[serde(default)]
    pub extra_labels: BTreeMap<String, String>,
}

impl ExporterConfig {
    /// Load, expand and validate a YAML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), "loading configuration file");
        Self::from_yaml(&content)
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let mut document: YamlValue = serde_yaml::from_str(content)?;
        if let YamlValue::Mapping(root) = &mut document {
            for section in EXPANDED_SECTIONS {
                if let Some(value) = root.get_mut(section) {
                    Self::expand_value(value);
                }
            }
        }
        let config: Self = serde_yaml::from_value(document)?;
        config.validate()?;
        Ok(config)
    }

    /// Expand environment variables in every string below `value`.
    fn expand_value(value: &mut YamlValue) {
        match value {
            YamlValue::String(s) if ENV_VAR_REGEX.is_match(s) => {
                *s = Self::expand_env_vars(s);
            }
            YamlValue::Sequence(items) => items.iter_mut().for_each(Self::expand_value),
            YamlValue::Mapping(map) => map.values_mut().for_each(Self::expand_value),
            _ => {}
        }
    }

    /// Expand environment variables in the format ${VAR} or ${VAR:-default}
    fn expand_env_vars(content: &str) -> String {
        ENV_VAR_REGEX
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                let default = caps.get(2).map(|m| m.as_str());

                std::env::var(var_name).unwrap_or_else(|_| default.unwrap_or("").to_string())
            })
            .to_string()
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        check_interval("global.default_time_interval", self.global.default_time_interval)?;
        check_interval("global.retry_conn_interval", self.global.retry_conn_interval)?;

        let mut names = HashSet::new();
        for conn in &self.connections {
            let entity = format!("connection '{}'", conn.display_name());
            for (field, value) in [
                ("host", conn.host.as_str()),
                ("database", conn.database.as_str()),
                ("user", conn.user.as_str()),
                ("password", conn.password.as_str()),
            ] {
                if value.trim().is_empty() {
                    return Err(ConfigError::MissingField { entity, field });
                }
            }
            if conn.port == 0 {
                return Err(ConfigError::MissingField { entity, field: "port" });
            }
            if let Some(secs) = conn.retry_conn_interval {
                check_interval(&format!("{}.retry_conn_interval", entity), secs)?;
            }
            if !names.insert(conn.display_name()) {
                return Err(ConfigError::DuplicateConnection(conn.display_name()));
            }
        }

        for query in &self.queries {
            if query.name.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    entity: "query".to_string(),
                    field: "name",
                });
            }
            let entity = format!("query '{}'", query.name);
            if query.query.trim().is_empty() {
                return Err(ConfigError::MissingField { entity, field: "query" });
            }
            if let Some(secs) = query.time_interval {
                check_interval(&format!("{}.time_interval", entity), secs)?;
            }
            for gauge in &query.gauges {
                if gauge.name.trim().is_empty() {
                    return Err(ConfigError::MissingField {
                        entity: format!("gauge in {}", entity),
                        field: "name",
                    });
                }
                if let Some(col) = gauge.col {
                    if col < 1 {
                        return Err(ConfigError::InvalidColumn {
                            gauge: gauge.name.clone(),
                            col,
                        });
                    }
                }
            }
        }

        Ok(())
    }

    /// Total number of gauges across all queries.
    pub fn gauge_count(&self) -> usize {
        self.queries.iter().map(|q| q.gauges.len()).sum()
    }
}

fn check_interval(field: &str, value: i64) -> Result<()> {
    if value < 1 {
        return Err(ConfigError::InvalidInterval {
            field: field.to_string(),
            value,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
global:
  port: 9900
  default_time_interval: 30
connections:
  - host: db1
    port: 5432
    database: app
    user: exporter
    password: secret
    extra_labels:
      dbenv: prod
queries:
  - name: tablespaces
    query: SELECT name, used FROM tablespace_usage
    time_interval: 60
    gauges:
      - name: tablespace_used_bytes
        desc: Used bytes per tablespace
        col: 2
        extra_labels:
          tablespace: "$1"
"#;

    #[test]
    fn test_parse_config() {
        let config = ExporterConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.global.port, 9900);
        assert_eq!(config.global.default_time_interval, 30);
        assert_eq!(config.global.retry_conn_interval, DEFAULT_RETRY_CONN_INTERVAL_SECS);
        assert_eq!(config.global.listen_address, DEFAULT_LISTEN_ADDRESS);

        let conn = &config.connections[0];
        assert_eq!(conn.display_name(), "db1:5432/app");
        assert_eq!(conn.extra_labels.get("dbenv").map(String::as_str), Some("prod"));
        assert_eq!(conn.retry_interval(&config.global), Duration::from_secs(60));

        let query = &config.queries[0];
        assert_eq!(query.interval(&config.global), Duration::from_secs(60));
        assert_eq!(query.gauges[0].col, Some(2));
        assert_eq!(config.gauge_count(), 1);
    }

    #[test]
    fn test_global_defaults() {
        let yaml = r#"
connections: []
queries: []
"#;
        let config = ExporterConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.global.port, DEFAULT_PORT);
        assert_eq!(config.global.default_time_interval, DEFAULT_TIME_INTERVAL_SECS);
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = ExporterConfig::from_yaml(SAMPLE).unwrap();
        let debug = format!("{:?}", config.connections[0]);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_env_var_expansion() {
        std::env::set_var("SQLGAUGE_TEST_PASSWORD", "hunter2");
        let expanded = ExporterConfig::expand_env_vars("password: ${SQLGAUGE_TEST_PASSWORD}");
        assert_eq!(expanded, "password: hunter2");
    }

    #[test]
    fn test_env_var_with_default() {
        std::env::remove_var("SQLGAUGE_MISSING_VAR");
        let expanded = ExporterConfig::expand_env_vars("port: ${SQLGAUGE_MISSING_VAR:-5432}");
        assert_eq!(expanded, "port: 5432");
    }

    #[test]
    fn test_placeholder_is_not_env_var() {
        let expanded = ExporterConfig::expand_env_vars(r#"tablespace: "$1""#);
        assert_eq!(expanded, r#"tablespace: "$1""#);
    }

    #[test]
    fn test_missing_host_rejected() {
        let yaml = SAMPLE.replace("host: db1", "host: \"\"");
        let err = ExporterConfig::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "host", .. }));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_missing_gauges_key_rejected() {
        let yaml = r#"
connections: []
queries:
  - name: q
    query: SELECT 1
"#;
        let err = ExporterConfig::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_empty_gauge_name_rejected() {
        let yaml = SAMPLE.replace("name: tablespace_used_bytes", "name: \"\"");
        let err = ExporterConfig::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "name", .. }));
    }

    #[test]
    fn test_empty_query_text_rejected() {
        let yaml = SAMPLE.replace("query: SELECT name, used FROM tablespace_usage", "query: \"  \"");
        let err = ExporterConfig::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "query", .. }));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let yaml = SAMPLE.replace("default_time_interval: 30", "default_time_interval: 0");
        let err = ExporterConfig::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidInterval { .. }));
        assert_eq!(err.exit_code(), 2);

        let yaml = SAMPLE.replace("time_interval: 60", "time_interval: 0");
        let err = ExporterConfig::from_yaml(&yaml).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_negative_and_fractional_intervals_rejected() {
        let cases = [
            ("default_time_interval: 30", "default_time_interval: -5"),
            ("default_time_interval: 30", "default_time_interval: 0.5"),
            ("time_interval: 60", "time_interval: -1"),
            ("time_interval: 60", "time_interval: \"0.9\""),
            ("password: secret", "password: secret\n    retry_conn_interval: 0.5"),
        ];
        for (from, to) in cases {
            let yaml = SAMPLE.replace(from, to);
            let err = ExporterConfig::from_yaml(&yaml).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidInterval { .. }), "{to}: {err}");
            assert_eq!(err.exit_code(), 2, "{to}");
        }
    }

    #[test]
    fn test_fractional_interval_truncates() {
        let yaml = SAMPLE.replace("time_interval: 60", "time_interval: 2.7");
        let config = ExporterConfig::from_yaml(&yaml).unwrap();
        assert_eq!(config.queries[0].interval(&config.global), Duration::from_secs(2));
    }

    #[test]
    fn test_non_numeric_interval_is_parse_error() {
        let yaml = SAMPLE.replace("time_interval: 60", "time_interval: soon");
        let err = ExporterConfig::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_missing_password_rejected() {
        let yaml = SAMPLE.replace("password: secret", "password: \"\"");
        let err = ExporterConfig::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "password", .. }));
        assert_eq!(err.exit_code(), 1);

        let yaml = SAMPLE.replace("    password: secret\n", "");
        let err = ExporterConfig::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_env_expansion_covers_connections_only() {
        std::env::set_var("SQLGAUGE_TEST_DB_PORT", "6543");
        std::env::set_var("SQLGAUGE_TEST_TABLESPACE", "expanded");
        let yaml = SAMPLE
            .replace("port: 5432", "port: ${SQLGAUGE_TEST_DB_PORT}")
            .replace("password: secret", "password: ${SQLGAUGE_TEST_PASSWORD_UNSET:-fallback}")
            .replace(
                "query: SELECT name, used FROM tablespace_usage",
                "query: SELECT '${SQLGAUGE_TEST_TABLESPACE}', used FROM tablespace_usage",
            );

        let config = ExporterConfig::from_yaml(&yaml).unwrap();
        assert_eq!(config.connections[0].port, 6543);
        assert_eq!(config.connections[0].password, "fallback");
        assert_eq!(
            config.queries[0].query,
            "SELECT '${SQLGAUGE_TEST_TABLESPACE}', used FROM tablespace_usage"
        );
        assert_eq!(config.queries[0].gauges[0].extra_labels["tablespace"], "$1");
    }

    #[test]
    fn test_logging_settings() {
        let yaml = SAMPLE.replace(
            "  default_time_interval: 30",
            "  default_time_interval: 30\n  log_level: debug\n  log_path: /var/log/sqlgauge",
        );
        let config = ExporterConfig::from_yaml(&yaml).unwrap();
        assert_eq!(config.global.log_level.as_deref(), Some("debug"));
        assert_eq!(config.global.log_path, Some(PathBuf::from("/var/log/sqlgauge")));
    }

    #[test]
    fn test_zero_column_rejected() {
        let yaml = SAMPLE.replace("col: 2", "col: 0");
        let err = ExporterConfig::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidColumn { col: 0, .. }));
    }

    #[test]
    fn test_duplicate_connection_rejected() {
        let yaml = r#"
connections:
  - { host: db1, port: 5432, database: app, user: u, password: p }
  - { host: db1, port: 5432, database: app, user: v, password: p }
queries: []
"#;
        let err = ExporterConfig::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateConnection(name) if name == "db1:5432/app"));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sqlgauge.yaml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = ExporterConfig::from_file(&path).unwrap();
        assert_eq!(config.connections.len(), 1);

        let err = ExporterConfig::from_file(dir.path().join("missing.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
