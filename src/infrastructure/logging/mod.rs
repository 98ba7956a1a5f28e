// Logging module - Logging infrastructure
use crate::domain::error::{UartLinkError, UartLinkResult};
use std::io;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging system
pub fn init_logging() -> UartLinkResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("uartlink=info,warn,error"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .try_init()
        .map_err(|e| UartLinkError::Config {
            message: format!("Failed to initialize logging: {}", e),
        })?;

    tracing::info!("UartLink logging system initialized");
    Ok(())
}
