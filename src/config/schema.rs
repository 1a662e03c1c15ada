//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::connection::ConnectionKind;

/// Root configuration for a relay client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Remote relay endpoint.
    pub endpoint: EndpointConfig,

    /// Connection pool sizing.
    pub pool: PoolConfig,

    /// Reconnect backoff schedule.
    pub backoff: BackoffConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,

    /// Simulated connections used by `relay-sim`.
    pub simulation: SimulationConfig,
}

/// Endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Name used in logs and metrics labels.
    pub name: String,

    /// Service URL.
    pub url: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            name: "primary".to_string(),
            url: "http://localhost:8080".to_string(),
        }
    }
}

/// Pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of persistent connections kept open.
    pub connection_count: usize,

    /// Role of every connection in the pool.
    pub connection_kind: ConnectionKind,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            connection_count: 5,
            connection_kind: ConnectionKind::Default,
        }
    }
}

/// Reconnect backoff configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Retry count up to which the delay doubles (2^n seconds).
    pub max_exponent: u32,

    /// Delay once the retry count passes `max_exponent`, in seconds.
    pub cap_secs: u64,

    /// Exclusive upper bound of the random jitter, in milliseconds.
    pub max_jitter_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_exponent: 5,
            cap_secs: 60,
            max_jitter_ms: 1000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Simulated connection behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Handshake latency in milliseconds.
    pub handshake_ms: u64,

    /// Probability in [0, 1] that a handshake is refused.
    pub failure_rate: f64,

    /// Fixed lifetime in seconds after which a connection drops (0 = until stopped).
    pub lifetime_secs: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            handshake_ms: 50,
            failure_rate: 0.1,
            lifetime_secs: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.pool.connection_count, 5);
        assert_eq!(config.pool.connection_kind, ConnectionKind::Default);
        assert_eq!(config.backoff.max_exponent, 5);
        assert_eq!(config.backoff.cap_secs, 60);
        assert_eq!(config.backoff.max_jitter_ms, 1000);
    }

    #[test]
    fn test_partial_toml() {
        let config: RelayConfig = toml::from_str(
            r#"
            [endpoint]
            name = "eu-west"

            [pool]
            connection_count = 3
            connection_kind = "on_demand"

            [simulation]
            lifetime_secs = 12
            "#,
        )
        .unwrap();
        assert_eq!(config.endpoint.name, "eu-west");
        assert_eq!(config.endpoint.url, "http://localhost:8080");
        assert_eq!(config.pool.connection_count, 3);
        assert_eq!(config.pool.connection_kind, ConnectionKind::OnDemand);
        assert_eq!(config.backoff.cap_secs, 60);
        assert_eq!(config.simulation.lifetime_secs, 12);
        assert_eq!(config.simulation.handshake_ms, 50);
    }
}
