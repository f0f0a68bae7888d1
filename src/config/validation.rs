//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, sizes > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BridgeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::BridgeConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: '{value}' is not a socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("observability.log_level: unknown level '{0}'")]
    UnknownLogLevel(String),
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a parsed configuration.
pub fn validate_config(config: &BridgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.request_secs" });
    }
    if config.grpc.max_receive_message_size == Some(0) {
        errors.push(ValidationError::Zero { field: "grpc.max_receive_message_size" });
    }
    if config.grpc.max_send_message_size == Some(0) {
        errors.push(ValidationError::Zero { field: "grpc.max_send_message_size" });
    }
    if config.grpc.max_deadline_ms == Some(0) {
        errors.push(ValidationError::Zero { field: "grpc.max_deadline_ms" });
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::UnknownLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(validate_config(&BridgeConfig::default()), Ok(()));
    }

    #[test]
    fn zero_limits_rejected() {
        let mut config = BridgeConfig::default();
        config.grpc.max_send_message_size = Some(0);
        config.grpc.max_deadline_ms = Some(0);
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::Zero { field: "grpc.max_send_message_size" },
                ValidationError::Zero { field: "grpc.max_deadline_ms" },
            ]
        );
    }

    #[test]
    fn metrics_address_only_checked_when_enabled() {
        let mut config = BridgeConfig::default();
        config.observability.metrics_address = "nowhere".to_string();
        assert!(validate_config(&config).is_err());

        config.observability.metrics_enabled = false;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn unknown_log_level_rejected() {
        let mut config = BridgeConfig::default();
        config.observability.log_level = "loud".to_string();
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::UnknownLogLevel("loud".to_string())])
        );
    }
}
