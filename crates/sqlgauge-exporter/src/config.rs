//! Command line arguments.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use sqlgauge_core::{ExporterConfig, GlobalConfig};

/// sqlgauge command line arguments.
#[derive(Debug, Parser)]
#[command(name = "sqlgauge")]
#[command(about = "Expose SQL query results as Prometheus gauges")]
#[command(version)]
pub struct Args {
    /// Path to the YAML configuration file.
    pub config: PathBuf,

    /// HTTP port, overriding `global.port`.
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Log level used when RUST_LOG is not set; overrides `global.log_level`.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Validate the configuration, print a summary and exit.
    #[arg(long)]
    pub check: bool,

    /// Seconds to wait for tasks to stop on shutdown.
    #[arg(long, default_value_t = 5)]
    pub shutdown_grace_secs: u64,
}

impl Args {
    /// Apply command line overrides to a loaded configuration.
    pub fn apply(&self, config: &mut ExporterConfig) {
        if let Some(port) = self.port {
            config.global.port = port;
        }
    }

    /// Grace period for task shutdown.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Effective log level: command line, then configuration, then `info`.
    pub fn log_level(&self, global: &GlobalConfig) -> String {
        self.log_level
            .clone()
            .or_else(|| global.log_level.clone())
            .unwrap_or_else(|| "info".to_string())
            .to_lowercase()
    }
}
