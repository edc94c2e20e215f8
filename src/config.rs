//! Runtime configuration, read from the environment (and `.env`).

use crate::error::ConfigError;
use crate::loader::LoadPolicy;
use std::path::PathBuf;

pub const ENV_DATA_PATH: &str = "SALES_DATA_PATH";
pub const ENV_LOAD_POLICY: &str = "SALES_LOAD_POLICY";
pub const ENV_TOP_N: &str = "SALES_TOP_N";

pub const DEFAULT_DATA_PATH: &str = "dummy_sales_data.csv";
pub const DEFAULT_TOP_N: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub data_path: PathBuf,
    pub load_policy: LoadPolicy,
    pub top_n: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            load_policy: LoadPolicy::Skip,
            top_n: DEFAULT_TOP_N,
        }
    }
}

impl EngineConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = EngineConfig::default();

        if let Some(path) = lookup(ENV_DATA_PATH).filter(|p| !p.trim().is_empty()) {
            config.data_path = PathBuf::from(path.trim());
        }

        if let Some(policy) = lookup(ENV_LOAD_POLICY) {
            config.load_policy = policy.parse().map_err(|reason| ConfigError::Invalid {
                var: ENV_LOAD_POLICY,
                value: policy.clone(),
                reason,
            })?;
        }

        if let Some(top_n) = lookup(ENV_TOP_N) {
            config.top_n = match top_n.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                Ok(_) => {
                    return Err(ConfigError::Invalid {
                        var: ENV_TOP_N,
                        value: top_n,
                        reason: "must be at least 1".to_string(),
                    })
                }
                Err(e) => {
                    return Err(ConfigError::Invalid {
                        var: ENV_TOP_N,
                        value: top_n,
                        reason: e.to_string(),
                    })
                }
            };
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            (ENV_DATA_PATH, "data/sales.csv"),
            (ENV_LOAD_POLICY, "abort"),
            (ENV_TOP_N, "10"),
        ]))
        .unwrap();
        assert_eq!(config.data_path, PathBuf::from("data/sales.csv"));
        assert_eq!(config.load_policy, LoadPolicy::Abort);
        assert_eq!(config.top_n, 10);
    }

    #[test]
    fn test_invalid_values() {
        assert!(EngineConfig::from_lookup(lookup(&[(ENV_TOP_N, "0")])).is_err());
        assert!(EngineConfig::from_lookup(lookup(&[(ENV_TOP_N, "many")])).is_err());
        assert!(EngineConfig::from_lookup(lookup(&[(ENV_LOAD_POLICY, "maybe")])).is_err());
    }
}
