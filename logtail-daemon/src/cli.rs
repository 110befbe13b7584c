//! CLI argument definitions for logtail.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use logtail_core::config::LogtailConfig;

/// Tails an Nginx access log and ships request metrics to InfluxDB.
#[derive(Parser, Debug)]
#[command(name = "logtail")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to logtail.toml configuration file.
    ///
    /// Without it, built-in defaults and environment variables are used.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Access log file to tail.
    #[arg(long)]
    pub path: Option<String>,

    /// InfluxDB connection string: `addr@user@password@database@precision`.
    #[arg(long)]
    pub influx_dsn: Option<String>,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration and exit without starting the pipeline.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Apply command-line overrides on top of file and environment values.
    pub fn apply_overrides(&self, config: &mut LogtailConfig) {
        if let Some(path) = &self.path {
            config.source.path = path.clone();
        }
        if let Some(dsn) = &self.influx_dsn {
            config.sink.dsn = dsn.clone();
        }
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
    }
}
