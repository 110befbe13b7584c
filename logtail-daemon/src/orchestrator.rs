//! Pipeline orchestration -- configuration loading, lifecycle and shutdown.
//!
//! The [`Orchestrator`] is the central coordinator of the `logtail` binary.
//! It validates configuration, installs the metrics recorder, builds the
//! [`LogPipeline`], and runs it until a shutdown signal or a fatal worker
//! error.
//!
//! # Exit Conditions
//!
//! - `SIGTERM` / `SIGINT`: the pipeline is stopped gracefully and queued
//!   records are drained, `run()` returns `Ok(())`
//! - A fatal worker error (tail read failure, sink write failure): the
//!   pipeline is stopped and `run()` returns the error

use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::broadcast;

use logtail_core::config::LogtailConfig;
use logtail_core::pipeline::{HealthStatus, Pipeline};
use logtail_pipeline::{LogPipeline, LogPipelineBuilder, PipelineConfig};

use crate::cli::DaemonCli;
use crate::metrics_server;

/// Interval between pipeline health checks in the main loop.
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Interval between uptime gauge updates.
const UPTIME_UPDATE_INTERVAL: Duration = Duration::from_secs(10);

/// Load configuration with precedence: CLI flags > environment > file > defaults.
///
/// The file is optional. Without `--config` built-in defaults are used.
pub async fn load_config(cli: &DaemonCli) -> Result<LogtailConfig> {
    let mut config = match &cli.config {
        Some(path) => LogtailConfig::from_file(path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?,
        None => LogtailConfig::default(),
    };
    config.apply_env_overrides();
    cli.apply_overrides(&mut config);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;
    Ok(config)
}

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: LogtailConfig,
    /// The log pipeline.
    pipeline: LogPipeline,
    /// Shutdown broadcast sender (signals background tasks).
    shutdown_tx: broadcast::Sender<()>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Orchestrator {
    /// Load configuration from a file and build the orchestrator.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = LogtailConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config)
    }

    /// Build from an already-loaded configuration.
    ///
    /// Installs the Prometheus recorder when `[metrics] enabled = true`.
    pub fn build_from_config(config: LogtailConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            record_build_info();
        }

        let pipeline_config = PipelineConfig::from_core(&config);
        let pipeline = LogPipelineBuilder::new()
            .config(pipeline_config)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build log pipeline: {}", e))?;

        tracing::info!(
            path = %config.source.path,
            parser_workers = config.parser.workers,
            sink_workers = config.sink.workers,
            "orchestrator initialized"
        );

        let (shutdown_tx, _) = broadcast::channel(4);

        Ok(Self {
            config,
            pipeline,
            shutdown_tx,
            start_time: Instant::now(),
        })
    }

    /// Start the pipeline and block until SIGTERM/SIGINT or a fatal error.
    pub async fn run(&mut self) -> Result<()> {
        self.run_until(wait_for_shutdown_signal()).await
    }

    /// Start the pipeline and block until `shutdown` resolves or a worker fails.
    ///
    /// The pipeline is always stopped before returning once it has started.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = Result<&'static str>>,
    {
        self.pipeline
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("failed to start log pipeline: {}", e))?;

        let uptime_task = self.config.metrics.enabled.then(|| {
            spawn_uptime_updater(self.start_time, self.shutdown_tx.subscribe())
        });

        tracing::info!(monitor = ?self.pipeline.monitor_addr(), "entering main event loop");

        tokio::pin!(shutdown);
        let mut health_tick = tokio::time::interval(HEALTH_CHECK_INTERVAL);
        health_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let outcome = loop {
            tokio::select! {
                signal = &mut shutdown => {
                    break signal.map(|name| {
                        tracing::info!(signal = name, "shutdown signal received");
                    });
                }
                fatal = self.pipeline.fatal_error() => {
                    break match fatal {
                        Some(e) => {
                            tracing::error!(error = %e, "pipeline failed, shutting down");
                            Err(anyhow::anyhow!("pipeline failed: {}", e))
                        }
                        None => {
                            tracing::warn!("all pipeline workers exited");
                            Ok(())
                        }
                    };
                }
                _ = health_tick.tick() => self.log_health().await,
            }
        };

        let _ = self.shutdown_tx.send(());
        if let Some(task) = uptime_task {
            let _ = task.await;
        }

        if let Err(e) = self.pipeline.stop().await {
            tracing::error!(error = %e, "failed to stop log pipeline");
        }

        outcome
    }

    async fn log_health(&self) {
        match self.pipeline.health_check().await {
            HealthStatus::Healthy => tracing::debug!("pipeline healthy"),
            HealthStatus::Degraded(reason) => tracing::warn!(reason = %reason, "pipeline degraded"),
            HealthStatus::Unhealthy(reason) => {
                tracing::error!(reason = %reason, "pipeline unhealthy");
            }
        }
    }

    /// Current pipeline health.
    pub async fn health(&self) -> HealthStatus {
        self.pipeline.health_check().await
    }

    /// Seconds since the orchestrator was built.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &LogtailConfig {
        &self.config
    }

    /// Get a reference to the pipeline.
    pub fn pipeline(&self) -> &LogPipeline {
        &self.pipeline
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Record the build info gauge (always 1, with version label).
fn record_build_info() {
    use logtail_core::metrics as m;

    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}

/// Spawn a background task that periodically updates the uptime metric.
fn spawn_uptime_updater(
    start_time: Instant,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    use logtail_core::metrics as m;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(UPTIME_UPDATE_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS)
                        .set(start_time.elapsed().as_secs() as f64);
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    })
}
