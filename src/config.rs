use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use thiserror::Error;

use crate::commission::CommissionConfig;
use crate::gateway::rate_limit::RateLimitConfig;
use crate::investment::YieldAccrualConfig;
use crate::settlement::SettlementConfig;
use crate::sweeper::SweeperConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    /// "hourly", "daily" or "never"
    pub rotation: String,
    /// Per-module level overrides, e.g. `settlement: debug`
    pub log_targets: BTreeMap<String, String>,
    pub gateway: GatewayConfig,
    /// PostgreSQL ledger store. Without it the in-memory store is used.
    pub postgres_url: Option<String>,
    /// Shared secret expected in `X-Internal-Secret` on internal routes.
    /// Internal routes reject every call while unset.
    pub internal_secret: Option<String>,
    pub settlement: SettlementConfig,
    pub sweeper: SweeperConfig,
    pub yield_accrual: YieldAccrualConfig,
    pub commission: CommissionConfig,
    pub rate_limit: RateLimitConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: "./logs".to_string(),
            log_file: "paygate.log".to_string(),
            use_json: false,
            rotation: "daily".to_string(),
            log_targets: BTreeMap::new(),
            gateway: GatewayConfig::default(),
            postgres_url: None,
            internal_secret: None,
            settlement: SettlementConfig::default(),
            sweeper: SweeperConfig::default(),
            yield_accrual: YieldAccrualConfig::default(),
            commission: CommissionConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl AppConfig {
    /// Load `config/{env}.yaml`
    pub fn load(env: &str) -> Result<Self, ConfigError> {
        let path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Self::from_yaml(&content).map_err(|source| ConfigError::Parse { path, source })
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commission::CommissionRule;
    use rust_decimal::Decimal;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = AppConfig::from_yaml(
            r#"
log_level: debug
gateway:
  port: 9090
sweeper:
  ttl_minutes: 30
"#,
        )
        .unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.gateway.port, 9090);
        assert_eq!(config.gateway.host, "0.0.0.0");
        assert_eq!(config.sweeper.ttl_minutes, 30);
        assert_eq!(config.sweeper.batch_size, 500);
        assert_eq!(config.settlement.lookup_window_hours, 72);
        assert!(config.internal_secret.is_none());
        assert!(config.log_targets.is_empty());
    }

    #[test]
    fn test_log_targets_from_yaml() {
        let config = AppConfig::from_yaml(
            r#"
log_targets:
  settlement: debug
  webhook: warn
"#,
        )
        .unwrap();
        assert_eq!(config.log_targets.len(), 2);
        assert_eq!(config.log_targets["settlement"], "debug");
        assert_eq!(config.log_targets["webhook"], "warn");
    }

    #[test]
    fn test_commission_rule_from_yaml() {
        let config = AppConfig::from_yaml(
            r#"
commission:
  default_rule:
    kind: fixed
    value: "5.00"
yield_accrual:
  daily_rate: "0.0005"
"#,
        )
        .unwrap();
        assert_eq!(
            config.commission.default_rule,
            CommissionRule::Fixed(Decimal::new(500, 2))
        );
        assert_eq!(config.yield_accrual.daily_rate, Decimal::new(5, 4));
    }

    #[test]
    fn test_missing_file() {
        let err = AppConfig::load("does-not-exist").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
