//! End-to-end mapping scenarios: configuration in, observations out.

use std::collections::BTreeSet;

use sqlgauge_core::{
    build_metric_schemas, connection_label_keys, connection_labels, ensure_bindings_covered,
    ExporterConfig, LabelSet, MetricBinding, Observation, ResultRow, RowMappingEngine, Value,
    INVALID_LABEL_VALUE,
};

const CONFIG: &str = r#"
connections:
  - host: h1
    port: 1521
    database: orcl
    user: monitor
    password: ${SQLGAUGE_MONITOR_PASSWORD:-monitor}
    extra_labels:
      dbenv: prod
  - host: h2
    port: 1521
    database: orcl
    user: monitor
    password: ${SQLGAUGE_MONITOR_PASSWORD:-monitor}
    extra_labels:
      dbinstance: orcl2
queries:
  - name: tablespaces
    query: SELECT tablespace_name, used_pct, free_bytes FROM dba_tablespace_usage
    gauges:
      - name: tablespace_used_pct
        desc: Percentage used per tablespace
        col: 2
        extra_labels:
          tablespace: "$1"
      - name: tablespace_first_free_bytes
        desc: Free bytes of the first tablespace
        extra_labels:
          source: dba_tablespace_usage
  - name: sessions
    query: select count(*) from v$session
    gauges:
      - name: sessions_total
"#;

struct Fixture {
    config: ExporterConfig,
    connection_keys: BTreeSet<String>,
}

impl Fixture {
    fn new() -> Self {
        let config = ExporterConfig::from_yaml(CONFIG).unwrap();
        let connection_keys = connection_label_keys(&config.connections);
        Self {
            config,
            connection_keys,
        }
    }

    fn engine(&self, connection: usize) -> RowMappingEngine {
        RowMappingEngine::new(connection_labels(
            &self.config.connections[connection],
            &self.connection_keys,
        ))
    }

    fn bindings(&self, query: usize) -> Vec<MetricBinding> {
        MetricBinding::from_specs(&self.config.queries[query].gauges)
    }
}

fn tablespace_rows() -> Vec<ResultRow> {
    vec![
        ResultRow::new(vec![Value::from("SYSTEM"), Value::Float(71.5), Value::Int(1024)]),
        ResultRow::new(vec![Value::from("USERS"), Value::Float(12.0), Value::Int(4096)]),
        ResultRow::new(vec![Value::from("TEMP")]),
    ]
}

fn find<'a>(obs: &'a [Observation], metric: &str) -> Vec<&'a Observation> {
    obs.iter().filter(|o| o.metric == metric).collect()
}

#[test]
fn every_observation_matches_its_registered_schema() {
    let fx = Fixture::new();
    let schemas = build_metric_schemas(&fx.config).unwrap();

    for (q, _) in fx.config.queries.iter().enumerate() {
        ensure_bindings_covered(&schemas, &fx.bindings(q), &fx.connection_keys).unwrap();
    }

    for conn in 0..fx.config.connections.len() {
        let obs = fx.engine(conn).map(&tablespace_rows(), &fx.bindings(0));
        assert!(!obs.is_empty());
        for o in &obs {
            let schema = schemas.iter().find(|s| s.name == o.metric).unwrap();
            let keys: Vec<_> = o.labels.keys().cloned().collect();
            assert_eq!(keys, schema.label_keys, "metric {}", o.metric);
        }
    }
}

#[test]
fn dynamic_gauge_fans_out_and_skips_short_rows() {
    let fx = Fixture::new();
    let obs = fx.engine(0).map(&tablespace_rows(), &fx.bindings(0));
    let used = find(&obs, "tablespace_used_pct");

    assert_eq!(used.len(), 2);
    assert_eq!(used[0].value, Value::Float(71.5));
    assert_eq!(used[0].labels["tablespace"], "SYSTEM");
    assert_eq!(used[1].value, Value::Float(12.0));
    assert_eq!(used[1].labels["tablespace"], "USERS");
}

#[test]
fn static_gauge_uses_its_position_column_of_first_row() {
    let fx = Fixture::new();
    let obs = fx.engine(0).map(&tablespace_rows(), &fx.bindings(0));
    let free = find(&obs, "tablespace_first_free_bytes");

    // Second gauge without `col` reads column 2 (0-based index 1).
    assert_eq!(free.len(), 1);
    assert_eq!(free[0].value, Value::Float(71.5));
    assert_eq!(free[0].labels["source"], "dba_tablespace_usage");
}

#[test]
fn connection_labels_are_padded_per_connection() {
    let fx = Fixture::new();
    let rows = vec![ResultRow::new(vec![Value::Int(42)])];

    let first = fx.engine(0).map(&rows, &fx.bindings(1));
    let second = fx.engine(1).map(&rows, &fx.bindings(1));

    let expected_first: LabelSet = [
        ("dbenv", "prod"),
        ("dbhost", "h1"),
        ("dbinstance", INVALID_LABEL_VALUE),
        ("dbname", "orcl"),
        ("dbport", "1521"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    assert_eq!(first.len(), 1);
    assert_eq!(first[0].labels, expected_first);
    assert_eq!(second[0].labels["dbenv"], INVALID_LABEL_VALUE);
    assert_eq!(second[0].labels["dbinstance"], "orcl2");
}

#[test]
fn failed_execution_shape_emits_nothing() {
    let fx = Fixture::new();
    let engine = fx.engine(0);

    assert!(engine.map(&[], &fx.bindings(0)).is_empty());
    assert!(engine.map(&[ResultRow::empty()], &fx.bindings(0)).is_empty());
    assert!(engine.map(&[ResultRow::empty()], &fx.bindings(1)).is_empty());
}

#[test]
fn repeated_passes_are_identical() {
    let fx = Fixture::new();
    let engine = fx.engine(1);
    let bindings = fx.bindings(0);
    let rows = tablespace_rows();

    assert_eq!(engine.map(&rows, &bindings), engine.map(&rows, &bindings));
}
