//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Configure log level from config and environment
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - `RUST_LOG` overrides the configured level

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};

/// Filter directive used when `RUST_LOG` is not set.
pub fn default_directive(level: &str) -> String {
    format!("grpc_web_bridge={level},tower_http={level}")
}

/// Install the global tracing subscriber.
pub fn init_logging(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_directive(&config.log_level).into());

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.log_format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    };

    if let Err(e) = result {
        eprintln!("Logging already initialized: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_covers_crate_and_http_layers() {
        assert_eq!(
            default_directive("debug"),
            "grpc_web_bridge=debug,tower_http=debug"
        );
        assert!(default_directive("info").parse::<EnvFilter>().is_ok());
    }
}
