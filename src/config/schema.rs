//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the bridge.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::web::CallOptions;

/// Root configuration for the bridge.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BridgeConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// RPC call limits and protocol switches.
    pub grpc: GrpcConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl BridgeConfig {
    /// Options for one call.
    ///
    /// The deadline is the client's `grpc-timeout`, capped by
    /// `grpc.max_deadline_ms` and `timeouts.request_secs`. The request
    /// timeout also applies when the client sent none.
    pub fn call_options(&self, requested_deadline: Option<Duration>) -> CallOptions {
        let mut options = self.grpc.call_options(requested_deadline);
        let ceiling = self.timeouts.request_timeout();
        options.deadline = Some(options.deadline.map_or(ceiling, |d| d.min(ceiling)));
        options
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Per-call protocol settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GrpcConfig {
    /// Largest accepted request message in bytes (unlimited if unset).
    pub max_receive_message_size: Option<usize>,

    /// Largest response message the bridge will send (unlimited if unset).
    pub max_send_message_size: Option<usize>,

    /// Accept native `application/grpc` calls over HTTP/2.
    pub accept_native: bool,

    /// Upper bound applied to client `grpc-timeout` values, in milliseconds.
    pub max_deadline_ms: Option<u64>,
}

impl Default for GrpcConfig {
    fn default() -> Self {
        Self {
            max_receive_message_size: Some(4 * 1024 * 1024), // 4MB
            max_send_message_size: None,
            accept_native: true,
            max_deadline_ms: None,
        }
    }
}

impl GrpcConfig {
    /// Build the options for one call given the client's requested deadline.
    pub fn call_options(&self, requested_deadline: Option<Duration>) -> CallOptions {
        let cap = self.max_deadline_ms.map(Duration::from_millis);
        let deadline = match (requested_deadline, cap) {
            (Some(requested), Some(cap)) => Some(requested.min(cap)),
            (requested, cap) => requested.or(cap),
        };

        CallOptions {
            max_receive_message_size: self.max_receive_message_size,
            max_send_message_size: self.max_send_message_size,
            deadline,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Longest a call may spend in dispatch, in seconds.
    pub request_secs: u64,
}

impl TimeoutConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
