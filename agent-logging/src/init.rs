use agent_config::{LogFormat, LoggingConfig};
use anyhow::Result;
use tracing_subscriber::EnvFilter;

fn env_filter(directives: &str) -> EnvFilter {
    EnvFilter::try_new(directives)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize logging from configuration
pub fn init_logging_from_config(config: &LoggingConfig) -> Result<()> {
    let filter = env_filter(&config.filter_directives());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    // try_init so a second initialisation in the same process is harmless
    let result = match config.format {
        LogFormat::Json => builder.json().with_current_span(false).try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Text => builder.try_init(),
    };

    if result.is_err() {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

/// Initialize simple tracing for basic console output
pub fn init_simple_tracing(log_level: &str) -> Result<()> {
    if tracing_subscriber::fmt()
        .with_env_filter(env_filter(log_level))
        .try_init()
        .is_err()
    {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

/// Initialize tracing for the plugin host.
///
/// The host's stdout carries plugin output and its stderr is read by the
/// parent as a failure signal, so diagnostics are only written (to stderr)
/// when a level is requested explicitly.
pub fn init_stderr_tracing(log_level: Option<&str>) -> Result<()> {
    let Some(level) = log_level else {
        return Ok(());
    };

    if tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_config::LogLevel;

    #[test]
    fn test_repeated_initialisation_is_harmless() {
        let config = LoggingConfig {
            level: LogLevel::Debug,
            format: LogFormat::Compact,
            filter: None,
        };
        assert!(init_logging_from_config(&config).is_ok());
        assert!(init_simple_tracing("info").is_ok());
        assert!(init_stderr_tracing(Some("debug")).is_ok());
    }

    #[test]
    fn test_stderr_tracing_disabled_without_level() {
        assert!(init_stderr_tracing(None).is_ok());
    }

    #[test]
    fn test_invalid_directive_falls_back() {
        let filter = env_filter("not a [valid directive");
        assert!(!filter.to_string().is_empty());
    }
}
