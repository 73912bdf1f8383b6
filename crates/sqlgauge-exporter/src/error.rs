//! Exporter error types.

use thiserror::Error;

use sqlgauge_core::ConfigError;

/// Metric sink errors.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The metric was never registered.
    #[error("metric '{0}' is not registered")]
    UnknownMetric(String),

    /// A metric was registered twice with different label keys.
    #[error("metric '{metric}' already registered with labels {existing:?}")]
    SchemaConflict {
        metric: String,
        existing: Vec<String>,
    },

    /// A sample's label keys differ from the registered schema.
    #[error("metric '{metric}': labels {got:?} do not match schema {expected:?}")]
    LabelMismatch {
        metric: String,
        expected: Vec<String>,
        got: Vec<String>,
    },

    /// The cell value cannot be converted to a gauge sample.
    #[error("metric '{metric}': value '{value}' is not numeric")]
    NonNumeric { metric: String, value: String },

    /// Prometheus client error (invalid names, registration failures).
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    /// Exposition text was not valid UTF-8.
    #[error("encoding error: {0}")]
    Encoding(String),
}

/// Errors that stop the exporter before or while starting up.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Metric registration error.
    #[error("metric registration error: {0}")]
    Sink(#[from] SinkError),

    /// HTTP listener error.
    #[error("http server error: {0}")]
    Server(#[source] std::io::Error),

    /// Log directory or subscriber setup failed.
    #[error("logging setup error: {0}")]
    Logging(String),
}

impl StartupError {
    /// Process exit status for the failed startup stage.
    ///
    /// 1 = configuration, 2 = interval values, 3 = metric registration,
    /// 4 = HTTP listener.
    pub fn exit_code(&self) -> u8 {
        match self {
            StartupError::Config(e) => e.exit_code(),
            StartupError::Logging(_) => 1,
            StartupError::Sink(_) => 3,
            StartupError::Server(_) => 4,
        }
    }
}
