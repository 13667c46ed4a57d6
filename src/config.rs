//! Operator configuration loaded from environment variables

use std::time::Duration;

use thiserror::Error;

/// Default DNS suffix for in-cluster service endpoints
pub const DEFAULT_CLUSTER_DOMAIN: &str = "svc.cluster.local";

/// Default port for the health and metrics server
pub const DEFAULT_HEALTH_PORT: u16 = 8080;

/// Default upper bound for a single reconciliation pass
pub const DEFAULT_RECONCILE_TIMEOUT_SECS: u64 = 120;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Runtime settings for the operator
#[derive(Clone, Debug)]
pub struct OperatorConfig {
    /// Only watch this namespace; `None` watches the whole cluster
    pub watch_namespace: Option<String>,
    /// DNS suffix used when building status endpoints
    pub cluster_domain: String,
    pub health_port: u16,
    /// Deadline for a single reconciliation pass
    pub reconcile_timeout: Duration,
    /// Instance name reported on emitted events
    pub reporter_instance: Option<String>,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            watch_namespace: None,
            cluster_domain: DEFAULT_CLUSTER_DOMAIN.to_string(),
            health_port: DEFAULT_HEALTH_PORT,
            reconcile_timeout: Duration::from_secs(DEFAULT_RECONCILE_TIMEOUT_SECS),
            reporter_instance: None,
        }
    }
}

impl OperatorConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let health_port = match non_empty("HEALTH_PORT") {
            Some(value) => value
                .trim()
                .parse::<u16>()
                .map_err(|e| ConfigError::InvalidValue {
                    key: "HEALTH_PORT",
                    value: value.clone(),
                    reason: e.to_string(),
                })?,
            None => defaults.health_port,
        };

        let reconcile_timeout = match non_empty("RECONCILE_TIMEOUT_SECS") {
            Some(value) => {
                let secs = value
                    .trim()
                    .parse::<u64>()
                    .map_err(|e| ConfigError::InvalidValue {
                        key: "RECONCILE_TIMEOUT_SECS",
                        value: value.clone(),
                        reason: e.to_string(),
                    })?;
                if secs == 0 {
                    return Err(ConfigError::InvalidValue {
                        key: "RECONCILE_TIMEOUT_SECS",
                        value,
                        reason: "must be greater than zero".to_string(),
                    });
                }
                Duration::from_secs(secs)
            }
            None => defaults.reconcile_timeout,
        };

        Ok(Self {
            watch_namespace: non_empty("WATCH_NAMESPACE"),
            cluster_domain: non_empty("CLUSTER_DOMAIN")
                .map(|d| d.trim().trim_matches('.').to_string())
                .unwrap_or(defaults.cluster_domain),
            health_port,
            reconcile_timeout,
            reporter_instance: non_empty("POD_NAME"),
        })
    }
}
