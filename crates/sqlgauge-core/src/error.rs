//! Core error types.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration errors.
///
/// All of these are detected before any polling task starts. Each maps to a
/// process exit status via [`ConfigError::exit_code`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid YAML or does not match the model.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A required field is missing or empty.
    #[error("{entity}: missing '{field}' field")]
    MissingField { entity: String, field: &'static str },

    /// An interval is below one second.
    #[error("invalid value for {field}: {value} (must be >= 1)")]
    InvalidInterval { field: String, value: i64 },

    /// An explicit gauge column is below 1.
    #[error("gauge '{gauge}': invalid column {col} (columns are 1-based)")]
    InvalidColumn { gauge: String, col: usize },

    /// Two connections share a name.
    #[error("duplicate connection name '{0}'")]
    DuplicateConnection(String),

    /// A metric is declared more than once with different label keys.
    #[error("metric '{metric}' declared with conflicting label keys: {first:?} vs {second:?}")]
    ConflictingLabels {
        metric: String,
        first: Vec<String>,
        second: Vec<String>,
    },

    /// A binding can produce a label key the registered schema lacks.
    #[error("metric '{metric}': label '{label}' is not part of the registered schema")]
    UnregisteredLabel { metric: String, label: String },
}

impl ConfigError {
    /// Process exit status for this error's startup stage.
    ///
    /// 1 = load/parse/validation, 2 = interval values, 3 = label schema.
    pub fn exit_code(&self) -> u8 {
        match self {
            ConfigError::InvalidInterval { .. } => 2,
            ConfigError::ConflictingLabels { .. } | ConfigError::UnregisteredLabel { .. } => 3,
            _ => 1,
        }
    }
}

/// Result alias for configuration handling.
pub type Result<T> = std::result::Result<T, ConfigError>;
