//! Tracing initialization
//!
//! The embedding process calls [`init`] once at startup; the format and
//! default level come from the `logging` section of the configuration.

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Calling this more
/// than once is harmless; later calls are ignored.
pub fn init(config: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .try_init();
        }
        LogFormat::Json => {
            let _ = tracing_subscriber::fmt()
                .json()
                .with_env_filter(env_filter)
                .try_init();
        }
    }
}
