//! Structured logging for the Android build-for-test step
//!
//! The step log itself is printed by `testpair-cli`; this crate wires up
//! `tracing` diagnostics (written to stderr) and phase timing.

use std::time::{Duration, Instant};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize with custom configuration.
///
/// `RUST_LOG` takes precedence over `config.log_level`.
pub fn init_with_config(config: TelemetryConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(config.show_target)
            .with_file(config.show_file)
            .with_line_number(config.show_line_number)
            .compact(),
    );

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))?;

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "Logging initialized");

    Ok(())
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub show_target: bool,
    pub show_file: bool,
    pub show_line_number: bool,
}

impl TelemetryConfig {
    /// Configuration for a `-v` count: 0 = warn, 1 = debug, 2+ = trace
    pub fn for_verbosity(verbose: u8) -> Self {
        let log_level = match verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        };
        Self {
            log_level: log_level.to_string(),
            show_target: verbose > 1,
            show_file: verbose > 1,
            show_line_number: verbose > 1,
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self::for_verbosity(0)
    }
}

/// Measures one phase of the step and logs its duration when stopped
pub struct Timer {
    name: &'static str,
    start: Instant,
}

impl Timer {
    /// Start a new timer
    pub fn start(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }

    /// Stop the timer and log the duration
    pub fn stop(self) -> Duration {
        let duration = self.start.elapsed();
        tracing::debug!(
            phase = self.name,
            duration_ms = duration.as_millis() as u64,
            "Phase completed"
        );
        duration
    }
}
