use thiserror::Error;
use tracing::Level;

use crate::config::{LogFormat, LoggingConfig};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("a global tracing subscriber is already installed")]
    AlreadyInstalled,
}

/// Install the process-wide `tracing` subscriber described by `config`.
///
/// Unknown levels fall back to `info`. Installing twice is reported as
/// [`LoggingError::AlreadyInstalled`].
pub fn init(config: &LoggingConfig) -> Result<(), LoggingError> {
    let log_level = config.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt().with_target(false).with_max_level(log_level);

    let installed = match config.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    installed.map_err(|_| LoggingError::AlreadyInstalled)
}
