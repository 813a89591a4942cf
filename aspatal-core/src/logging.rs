//! Structured logging with tracing

use crate::config::{LogFormat, LoggingSettings};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("invalid log filter '{directive}': {reason}")]
    Filter { directive: String, reason: String },

    #[error("logging already initialised: {0}")]
    AlreadyInitialised(String),
}

/// Build the filter: `RUST_LOG` wins, then the configured level, raised to
/// `debug` when `debug` is set.
pub fn env_filter(settings: &LoggingSettings, debug: bool) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let directive = if debug { "debug" } else { settings.level.as_str() };
    EnvFilter::try_new(directive).map_err(|e| LoggingError::Filter {
        directive: directive.to_string(),
        reason: e.to_string(),
    })
}

/// Install the global subscriber. Text output is compact; JSON output
/// includes the current span so request ids are carried on every line.
pub fn init_logging(settings: &LoggingSettings, debug: bool) -> Result<(), LoggingError> {
    let filter = env_filter(settings, debug)?;
    let subscriber = Registry::default().with(filter);

    let result = match settings.format {
        LogFormat::Json => subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true),
            )
            .try_init(),
        LogFormat::Text => subscriber
            .with(fmt::layer().with_target(true).compact())
            .try_init(),
    };

    result.map_err(|e| LoggingError::AlreadyInitialised(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_directive_rejected() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let settings = LoggingSettings {
            level: "aspatal=loudest".to_string(),
            format: LogFormat::Text,
        };
        assert!(matches!(
            env_filter(&settings, false),
            Err(LoggingError::Filter { .. })
        ));
        assert!(env_filter(&settings, true).is_ok());
    }
}
