//! Tracing subscriber setup.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Logger configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub enable: bool,
    pub level: LogLevel,
    pub format: Format,
    /// Extra `EnvFilter` directives, e.g. `semantic_aggregator::aggregator=trace`.
    pub override_filter: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enable: true,
            level: LogLevel::Info,
            format: Format::Compact,
            override_filter: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_directive(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Compact,
    Pretty,
    Json,
}

/// Builds the filter: `RUST_LOG` when set, otherwise the configured level and overrides.
#[must_use]
pub fn env_filter(config: &Config) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut directives = config.level.as_directive().to_string();
        if let Some(extra) = &config.override_filter {
            directives.push(',');
            directives.push_str(extra);
        }
        EnvFilter::new(directives)
    })
}

/// Installs the global subscriber.
///
/// Returns `false` when logging is disabled or a subscriber was already installed.
pub fn init(config: &Config) -> bool {
    if !config.enable {
        return false;
    }

    let layer = match config.format {
        Format::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_ansi(true)
            .boxed(),
        Format::Pretty => tracing_subscriber::fmt::layer().pretty().boxed(),
        Format::Json => tracing_subscriber::fmt::layer().json().boxed(),
    };

    tracing_subscriber::registry()
        .with(layer.with_filter(env_filter(config)))
        .try_init()
        .is_ok()
}
