//! Runtime settings, read once from the environment in `main`.

use crate::application::retry::RetryConfig;
use crate::domain::error::DomainError;
use crate::domain::values::symbols::{default_universe, parse_symbol_list};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_DB_PATH: &str = "./capindex.db";
pub const DEFAULT_TOP_N: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub db_path: String,
    pub alpha_vantage_api_key: Option<String>,
    pub symbols: Vec<String>,
    pub top_n: usize,
    pub retry: RetryConfig,
    pub workers: usize,
    pub yahoo_rpm: u32,
    pub alphavantage_rpm: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: DEFAULT_DB_PATH.to_string(),
            alpha_vantage_api_key: None,
            symbols: default_universe(),
            top_n: DEFAULT_TOP_N,
            retry: RetryConfig::default(),
            workers: 4,
            yahoo_rpm: 60,
            alphavantage_rpm: 5,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, DomainError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or blank keys keep their default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DomainError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Config::default();

        if let Some(path) = get("CAPINDEX_DB") {
            config.db_path = path;
        }
        config.alpha_vantage_api_key = get("ALPHA_VANTAGE_API_KEY");
        if let Some(raw) = get("CAPINDEX_SYMBOLS") {
            let symbols = parse_symbol_list(&raw);
            if !symbols.is_empty() {
                config.symbols = symbols;
            }
        }

        if let Some(v) = get("CAPINDEX_TOP_N") {
            config.top_n = parse_var("CAPINDEX_TOP_N", &v)?;
        }
        if let Some(v) = get("CAPINDEX_RETRY_MAX_ATTEMPTS") {
            config.retry.max_attempts = parse_var("CAPINDEX_RETRY_MAX_ATTEMPTS", &v)?;
        }
        if let Some(v) = get("CAPINDEX_RETRY_BASE_DELAY_MS") {
            config.retry.base_delay =
                Duration::from_millis(parse_var("CAPINDEX_RETRY_BASE_DELAY_MS", &v)?);
        }
        if let Some(v) = get("CAPINDEX_RETRY_MAX_DELAY_MS") {
            config.retry.max_delay =
                Duration::from_millis(parse_var("CAPINDEX_RETRY_MAX_DELAY_MS", &v)?);
        }
        if let Some(v) = get("CAPINDEX_RETRY_JITTER") {
            let jitter: f64 = parse_var("CAPINDEX_RETRY_JITTER", &v)?;
            if !(0.0..=1.0).contains(&jitter) {
                return Err(DomainError::Config(format!(
                    "CAPINDEX_RETRY_JITTER must be between 0 and 1, got {jitter}"
                )));
            }
            config.retry.jitter_fraction = jitter;
        }
        if let Some(v) = get("CAPINDEX_WORKERS") {
            config.workers = parse_var("CAPINDEX_WORKERS", &v)?;
        }
        if let Some(v) = get("CAPINDEX_YAHOO_RPM") {
            config.yahoo_rpm = parse_var("CAPINDEX_YAHOO_RPM", &v)?;
        }
        if let Some(v) = get("CAPINDEX_ALPHAVANTAGE_RPM") {
            config.alphavantage_rpm = parse_var("CAPINDEX_ALPHAVANTAGE_RPM", &v)?;
        }

        if config.top_n == 0 {
            return Err(DomainError::Config("CAPINDEX_TOP_N must be at least 1".into()));
        }
        if config.workers == 0 {
            return Err(DomainError::Config("CAPINDEX_WORKERS must be at least 1".into()));
        }
        Ok(config)
    }
}

fn parse_var<T: FromStr>(key: &str, raw: &str) -> Result<T, DomainError> {
    raw.trim()
        .parse()
        .map_err(|_| DomainError::Config(format!("Invalid value for {key}: '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config, DomainError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn test_empty_environment_is_default() {
        assert_eq!(from_pairs(&[]).unwrap(), Config::default());
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("CAPINDEX_DB", "/tmp/idx.db"),
            ("ALPHA_VANTAGE_API_KEY", "demo"),
            ("CAPINDEX_SYMBOLS", " aapl, msft,,AAPL "),
            ("CAPINDEX_TOP_N", "10"),
            ("CAPINDEX_RETRY_BASE_DELAY_MS", "250"),
            ("CAPINDEX_RETRY_JITTER", "0"),
            ("CAPINDEX_WORKERS", "8"),
        ])
        .unwrap();

        assert_eq!(config.db_path, "/tmp/idx.db");
        assert_eq!(config.alpha_vantage_api_key.as_deref(), Some("demo"));
        assert_eq!(config.symbols, vec!["AAPL", "MSFT"]);
        assert_eq!(config.top_n, 10);
        assert_eq!(config.retry.base_delay, Duration::from_millis(250));
        assert_eq!(config.retry.jitter_fraction, 0.0);
        assert_eq!(config.workers, 8);
        assert_eq!(config.yahoo_rpm, 60);
    }

    #[test]
    fn test_blank_key_is_unset() {
        let config = from_pairs(&[("ALPHA_VANTAGE_API_KEY", "  ")]).unwrap();
        assert!(config.alpha_vantage_api_key.is_none());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            from_pairs(&[("CAPINDEX_TOP_N", "lots")]),
            Err(DomainError::Config(_))
        ));
        assert!(matches!(
            from_pairs(&[("CAPINDEX_TOP_N", "0")]),
            Err(DomainError::Config(_))
        ));
        assert!(matches!(
            from_pairs(&[("CAPINDEX_RETRY_JITTER", "1.5")]),
            Err(DomainError::Config(_))
        ));
    }
}
