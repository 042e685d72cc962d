//! Structured logging setup.
//!
//! Installs a `tracing-subscriber` registry with an [`EnvFilter`], an optional
//! sampling layer and a JSON or pretty `fmt` layer writing to stderr (stdout
//! belongs to command output). Configuration comes from the environment:
//!
//! - `TRAMLINE_LOG_LEVEL`: trace/debug/info/warn/error (default: info)
//! - `TRAMLINE_LOG_FORMAT`: json/pretty (default: json)
//! - `TRAMLINE_LOG_SAMPLING_MODE`: all/error-only/sampled (default: all)
//! - `TRAMLINE_LOG_SAMPLING_RATE`: 0.0-1.0 for sampled mode (default: 0.1)
//! - `TRAMLINE_LOG_ASYNC`: buffer output through a background writer (default: false)
//! - `TRAMLINE_LOG_FILTER`: extra comma-separated filter directives
//! - `TRAMLINE_LOG_LOCATION`: include file:line (default: false)
//!
//! `RUST_LOG`, when set, takes precedence over `TRAMLINE_LOG_LEVEL`.

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use std::env;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::subscriber::Interest;
use tracing::{Level, Metadata, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::{Context as LayerContext, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Keeps the background writer alive for the rest of the process.
static APPENDER_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Log format: JSON for production, pretty-print for development
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

/// Which events reach the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingMode {
    All,
    /// WARN and ERROR only
    ErrorOnly,
    /// Every WARN/ERROR, a fraction of everything else
    Sampled,
}

impl SamplingMode {
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "error-only" | "error_only" => SamplingMode::ErrorOnly,
            "sampled" => SamplingMode::Sampled,
            _ => SamplingMode::All,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    pub log_level: String,
    pub format: LogFormat,
    pub sampling_mode: SamplingMode,
    pub sampling_rate: f64,
    pub async_logging: bool,
    /// Extra filter directives, comma-separated (`tramline::router=debug,...`)
    pub target_filter: Option<String>,
    pub include_location: bool,
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl LogConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            log_level: env::var("TRAMLINE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: LogFormat::parse(
                &env::var("TRAMLINE_LOG_FORMAT").unwrap_or_else(|_| "json".to_string()),
            ),
            sampling_mode: SamplingMode::parse(
                &env::var("TRAMLINE_LOG_SAMPLING_MODE").unwrap_or_else(|_| "all".to_string()),
            ),
            sampling_rate: env::var("TRAMLINE_LOG_SAMPLING_RATE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.1),
            async_logging: env_flag("TRAMLINE_LOG_ASYNC", false),
            target_filter: env::var("TRAMLINE_LOG_FILTER").ok(),
            include_location: env_flag("TRAMLINE_LOG_LOCATION", false),
        }
    }

    /// Verbose, human-readable settings for local work.
    #[must_use]
    pub fn default_dev() -> Self {
        Self {
            log_level: "debug".to_string(),
            format: LogFormat::Pretty,
            sampling_mode: SamplingMode::All,
            sampling_rate: 1.0,
            async_logging: false,
            target_filter: None,
            include_location: true,
        }
    }

    fn level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

/// Decides per event whether it is emitted.
pub struct SamplingLayer {
    mode: SamplingMode,
    sampling_rate: f64,
    counter: AtomicU64,
}

impl SamplingLayer {
    #[must_use]
    pub fn new(mode: SamplingMode, sampling_rate: f64) -> Self {
        Self {
            mode,
            sampling_rate: sampling_rate.clamp(0.0, 1.0),
            counter: AtomicU64::new(0),
        }
    }

    fn should_sample(&self, metadata: &Metadata<'_>) -> bool {
        let important = matches!(*metadata.level(), Level::WARN | Level::ERROR);
        match self.mode {
            SamplingMode::All => true,
            SamplingMode::ErrorOnly => important,
            SamplingMode::Sampled => {
                if important {
                    return true;
                }
                if self.sampling_rate <= 0.0 {
                    return false;
                }
                let interval = (1.0 / self.sampling_rate) as u64;
                let count = self.counter.fetch_add(1, Ordering::Relaxed);
                interval > 0 && count % interval == 0
            }
        }
    }
}

impl<S> Layer<S> for SamplingLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn register_callsite(&self, _metadata: &'static Metadata<'static>) -> Interest {
        // decided per event, never cached
        Interest::sometimes()
    }

    fn enabled(&self, metadata: &Metadata<'_>, _ctx: LayerContext<'_, S>) -> bool {
        // spans always pass; sampling applies to events
        metadata.is_span() || self.should_sample(metadata)
    }
}

fn env_filter(config: &LogConfig) -> EnvFilter {
    let mut filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level().as_str()));

    if let Some(target_filter) = &config.target_filter {
        for directive in target_filter.split(',').map(str::trim).filter(|d| !d.is_empty()) {
            match directive.parse() {
                Ok(directive) => filter = filter.add_directive(directive),
                Err(_) => eprintln!("Warning: Invalid log filter directive: {directive}"),
            }
        }
    }
    filter
}

/// Install the global subscriber described by `config`.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging_with_config(config: &LogConfig) -> Result<()> {
    let registry = tracing_subscriber::registry()
        .with(env_filter(config))
        .with(SamplingLayer::new(config.sampling_mode, config.sampling_rate));

    let (writer, guard) = if config.async_logging {
        let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stderr());
        (tracing_subscriber::fmt::writer::BoxMakeWriter::new(non_blocking), Some(guard))
    } else {
        (tracing_subscriber::fmt::writer::BoxMakeWriter::new(std::io::stderr), None)
    };

    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
    };

    registry
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    if let Some(guard) = guard {
        if APPENDER_GUARD.set(guard).is_err() {
            eprintln!("Warning: log writer guard already installed");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use tracing::{info, warn, Event};
    use tracing_subscriber::registry;

    struct Counter(Arc<AtomicUsize>);

    impl<S: Subscriber> Layer<S> for Counter {
        fn on_event(&self, _event: &Event<'_>, _ctx: LayerContext<'_, S>) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn emitted(layer: SamplingLayer, infos: usize, warns: usize) -> usize {
        let seen = Arc::new(AtomicUsize::new(0));
        let subscriber = registry()
            .with(layer)
            .with(Counter(Arc::clone(&seen)));
        tracing::subscriber::with_default(subscriber, || {
            for i in 0..infos {
                info!(i, "routine");
            }
            for i in 0..warns {
                warn!(i, "unusual");
            }
        });
        seen.load(Ordering::Relaxed)
    }

    #[test]
    fn test_sampled_mode_keeps_one_in_n_and_all_warnings() {
        assert_eq!(emitted(SamplingLayer::new(SamplingMode::Sampled, 0.25), 8, 2), 4);
        assert_eq!(emitted(SamplingLayer::new(SamplingMode::Sampled, 0.0), 8, 2), 2);
    }

    #[test]
    fn test_error_only_and_all_modes() {
        assert_eq!(emitted(SamplingLayer::new(SamplingMode::ErrorOnly, 1.0), 5, 3), 3);
        assert_eq!(emitted(SamplingLayer::new(SamplingMode::All, 0.0), 5, 3), 8);
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("PRETTY"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("invalid"), LogFormat::Json);
    }

    #[test]
    fn test_sampling_mode_parse() {
        assert_eq!(SamplingMode::parse("error-only"), SamplingMode::ErrorOnly);
        assert_eq!(SamplingMode::parse("error_only"), SamplingMode::ErrorOnly);
        assert_eq!(SamplingMode::parse("sampled"), SamplingMode::Sampled);
        assert_eq!(SamplingMode::parse("whatever"), SamplingMode::All);
    }

    #[test]
    fn test_level_falls_back_to_info() {
        let mut config = LogConfig::default_dev();
        assert_eq!(config.level(), Level::DEBUG);
        config.log_level = "loud".to_string();
        assert_eq!(config.level(), Level::INFO);
    }
}
