//! Logging initialization for logtail.
//!
//! Configures `tracing-subscriber` based on the `[general]` section
//! of `LogtailConfig`. Supports JSON structured logging and
//! human-readable pretty format.

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use logtail_core::config::GeneralConfig;

/// Initialize the global tracing subscriber.
///
/// Must be called exactly once, before any tracing macros are used.
/// `RUST_LOG` takes precedence over `log_level`.
///
/// # Formats
///
/// * `"json"` - Machine-parseable JSON lines (default)
/// * `"pretty"` - Human-readable colored output (for development)
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => default_filter(&config.log_level)?,
    };

    match config.log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .map_err(|e| {
                    anyhow::anyhow!("failed to initialize JSON tracing subscriber: {}", e)
                })?;
        }
        "pretty" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .map_err(|e| {
                    anyhow::anyhow!("failed to initialize pretty tracing subscriber: {}", e)
                })?;
        }
        _ => {
            return Err(anyhow::anyhow!(
                "unknown log format '{}', expected 'json' or 'pretty'",
                config.log_format
            ));
        }
    }

    Ok(())
}

/// HTTP client crates that log every connection and frame at debug level.
const NOISY_TARGETS: &[&str] = &["hyper", "hyper_util", "h2", "reqwest", "rustls"];

/// Build the filter from `log_level` when `RUST_LOG` is unset.
///
/// At `debug`/`trace` the sink's HTTP stack is capped at `warn` so the
/// per-batch InfluxDB writes do not drown out pipeline events.
fn default_filter(log_level: &str) -> Result<EnvFilter> {
    let mut directives = log_level.to_owned();
    if matches!(log_level, "debug" | "trace") {
        for target in NOISY_TARGETS {
            directives.push_str(&format!(",{target}=warn"));
        }
    }
    EnvFilter::try_new(&directives)
        .map_err(|e| anyhow::anyhow!("invalid log level '{}': {}", log_level, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_level_quiets_http_client() {
        let filter = default_filter("debug").unwrap().to_string();
        assert!(filter.contains("hyper=warn"));
        assert!(filter.contains("reqwest=warn"));
    }

    #[test]
    fn info_level_is_used_as_is() {
        let filter = default_filter("info").unwrap().to_string();
        assert!(!filter.contains("hyper"));
    }

    #[test]
    fn malformed_level_is_rejected() {
        assert!(default_filter("logtail=loud").is_err());
    }

    #[test]
    fn unknown_format_is_rejected() {
        let config = GeneralConfig {
            log_level: "info".to_owned(),
            log_format: "xml".to_owned(),
        };
        let err = init_tracing(&config).unwrap_err();
        assert!(err.to_string().contains("unknown log format"));
    }
}
