//! # Node Configuration
//!
//! Everything a process needs to join the mesh. Defaults suit a client node
//! on a developer machine; `from_env` overrides them per deployment.

use shared_types::Runtime;
use sm_04_source_factory::FactoryOptions;
use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use thiserror::Error;

/// Default watchdog timeout of live sources.
pub const DEFAULT_WATCHDOG_TIMEOUT_MS: u64 = 500;

/// Default lookahead of the playback scheduler.
pub const DEFAULT_LOOKAHEAD_MS: u64 = 10;

/// Configuration of one node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeConfig {
    /// Deployment role label.
    pub role: String,
    /// Run as the single authoritative node.
    pub is_server: bool,
    /// Override of the hostname-derived id. Ignored for the server.
    pub node_id: Option<String>,
    /// Where the process runs.
    pub runtime: Runtime,
    /// Watchdog timeout of sources that do not configure their own.
    pub watchdog_timeout: Duration,
    /// Scheduler lookahead of stream players.
    pub lookahead: Duration,
    /// Address UDP and WebSocket listeners bind to.
    pub bind_address: IpAddr,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            role: "default".to_string(),
            is_server: false,
            node_id: None,
            runtime: Runtime::Node,
            watchdog_timeout: Duration::from_millis(DEFAULT_WATCHDOG_TIMEOUT_MS),
            lookahead: Duration::from_millis(DEFAULT_LOOKAHEAD_MS),
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// An environment variable holds an unusable value.
    #[error("Invalid value {value:?} for {var}: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("Watchdog timeout must be greater than zero")]
    ZeroWatchdogTimeout,

    #[error("Node role must not be empty")]
    EmptyRole,
}

impl NodeConfig {
    /// Configuration of the authoritative node.
    pub fn server() -> Self {
        Self {
            is_server: true,
            ..Self::default()
        }
    }

    /// Configuration of a client node with topological id `id`.
    pub fn client(id: impl Into<String>) -> Self {
        Self {
            node_id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SM_NODE_ROLE`: Deployment role (default: default)
    /// - `SM_NODE_SERVER`: Run as the authoritative node (default: false)
    /// - `SM_NODE_ID`: Topological id override
    /// - `SM_RUNTIME`: `node` or `browser` (default: node)
    /// - `SM_WATCHDOG_TIMEOUT_MS`: Source watchdog timeout (default: 500)
    /// - `SM_SCHEDULER_LOOKAHEAD_MS`: Playback lookahead (default: 10)
    /// - `SM_BIND_ADDRESS`: Listener bind address (default: 0.0.0.0)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(role) = lookup("SM_NODE_ROLE") {
            config.role = role;
        }
        if let Some(value) = lookup("SM_NODE_SERVER") {
            config.is_server = parse_bool("SM_NODE_SERVER", &value)?;
        }
        config.node_id = lookup("SM_NODE_ID").filter(|id| !id.is_empty());
        if let Some(value) = lookup("SM_RUNTIME") {
            config.runtime = value.parse().map_err(|e| ConfigError::InvalidValue {
                var: "SM_RUNTIME",
                value: value.clone(),
                reason: format!("{e}"),
            })?;
        }
        if let Some(value) = lookup("SM_WATCHDOG_TIMEOUT_MS") {
            config.watchdog_timeout = parse_millis("SM_WATCHDOG_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = lookup("SM_SCHEDULER_LOOKAHEAD_MS") {
            config.lookahead = parse_millis("SM_SCHEDULER_LOOKAHEAD_MS", &value)?;
        }
        if let Some(value) = lookup("SM_BIND_ADDRESS") {
            config.bind_address = value.parse().map_err(|e| ConfigError::InvalidValue {
                var: "SM_BIND_ADDRESS",
                value: value.clone(),
                reason: format!("{e}"),
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations no node can run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.watchdog_timeout.is_zero() {
            return Err(ConfigError::ZeroWatchdogTimeout);
        }
        if self.role.trim().is_empty() {
            return Err(ConfigError::EmptyRole);
        }
        Ok(())
    }

    /// Timing knobs handed to the source factory.
    pub fn factory_options(&self) -> FactoryOptions {
        FactoryOptions {
            watchdog_timeout: self.watchdog_timeout,
            lookahead: self.lookahead,
        }
    }
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var,
            value: value.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}

fn parse_millis(var: &'static str, value: &str) -> Result<Duration, ConfigError> {
    value
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| ConfigError::InvalidValue {
            var,
            value: value.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = NodeConfig::default();
        assert!(!config.is_server);
        assert_eq!(config.role, "default");
        assert_eq!(config.runtime, Runtime::Node);
        assert_eq!(config.watchdog_timeout, Duration::from_millis(500));
        assert_eq!(config.lookahead, Duration::from_millis(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = NodeConfig::from_lookup(lookup(&[
            ("SM_NODE_ROLE", "player"),
            ("SM_NODE_SERVER", "TRUE"),
            ("SM_NODE_ID", "stage-left"),
            ("SM_RUNTIME", "browser"),
            ("SM_WATCHDOG_TIMEOUT_MS", "250"),
            ("SM_SCHEDULER_LOOKAHEAD_MS", "20"),
            ("SM_BIND_ADDRESS", "127.0.0.1"),
        ]))
        .unwrap();
        assert_eq!(config.role, "player");
        assert!(config.is_server);
        assert_eq!(config.node_id.as_deref(), Some("stage-left"));
        assert_eq!(config.runtime, Runtime::Browser);
        assert_eq!(config.factory_options().watchdog_timeout, Duration::from_millis(250));
        assert_eq!(config.factory_options().lookahead, Duration::from_millis(20));
        assert_eq!(config.bind_address, IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn test_invalid_values_name_the_variable() {
        let err = NodeConfig::from_lookup(lookup(&[("SM_WATCHDOG_TIMEOUT_MS", "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var: "SM_WATCHDOG_TIMEOUT_MS", .. }));

        let err = NodeConfig::from_lookup(lookup(&[("SM_RUNTIME", "phone")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var: "SM_RUNTIME", .. }));

        let err = NodeConfig::from_lookup(lookup(&[("SM_NODE_SERVER", "maybe")])).unwrap_err();
        assert!(err.to_string().contains("SM_NODE_SERVER"));
    }

    #[test]
    fn test_validate_rejects_unusable_values() {
        let config = NodeConfig {
            watchdog_timeout: Duration::ZERO,
            ..NodeConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroWatchdogTimeout));

        let err = NodeConfig::from_lookup(lookup(&[("SM_NODE_ROLE", " ")])).unwrap_err();
        assert_eq!(err, ConfigError::EmptyRole);
    }
}
