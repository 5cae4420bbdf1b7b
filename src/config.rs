//! # Run configuration
//!
//! Settings come from the environment, optionally seeded from a `.env` file. The CLI
//! and the input file can override the finder settings afterwards.

use std::env;

use clap::ValueEnum;
use log::LevelFilter;

use crate::arb::finder::{FinderConfig, FinderKind};
use crate::arb::token::TokenId;
use crate::errors::ConfigError;
use crate::utils::constants::{BANCOR_V3_HUB, DEFAULT_HOPS, DEFAULT_MAX_ITERATIONS};

/// Settings of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Finder used when the input does not name one
    pub mode: FinderKind,
    /// Circuit lengths searched by the graph finder
    pub hops: Vec<usize>,
    /// Minimum `price_transport - 1` for a path to be sized
    pub threshold: f64,
    /// Hub token of the Bancor V3 venue
    pub bancor_v3_hub: TokenId,
    /// Iteration cap of the optimizers
    pub max_iterations: usize,
    /// Log level
    pub log_level: LevelFilter,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: FinderKind::default(),
            hops: DEFAULT_HOPS.to_vec(),
            threshold: 0.0,
            bancor_v3_hub: TokenId::from(BANCOR_V3_HUB),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            log_level: LevelFilter::Info,
        }
    }
}

impl Config {
    /// Loads the configuration from the environment.
    ///
    /// Reads `.env` first if present. Recognized variables are `FLASHROUTE_MODE`,
    /// `FLASHROUTE_HOPS`, `FLASHROUTE_THRESHOLD`, `FLASHROUTE_BANCOR_V3_HUB`,
    /// `FLASHROUTE_MAX_ITERATIONS` and `RUST_LOG`.
    ///
    /// # Returns
    /// * `Result<Config>` - The configuration, defaults filled in
    ///
    /// # Errors
    /// * If a variable is set to a value that cannot be parsed
    pub fn from_env() -> eyre::Result<Self> {
        dotenv::dotenv().ok();
        Ok(Self::from_vars(|key| env::var(key).ok())?)
    }

    /// Builds the configuration from a variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for the first variable that does not parse
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(value) = var("FLASHROUTE_MODE") {
            config.mode = FinderKind::from_str(value.trim(), true)
                .map_err(|_| invalid("FLASHROUTE_MODE", &value))?;
        }
        if let Some(value) = var("FLASHROUTE_HOPS") {
            config.hops = parse_hops(&value).ok_or_else(|| invalid("FLASHROUTE_HOPS", &value))?;
        }
        if let Some(value) = var("FLASHROUTE_THRESHOLD") {
            config.threshold = value
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|t| t.is_finite() && *t >= 0.0)
                .ok_or_else(|| invalid("FLASHROUTE_THRESHOLD", &value))?;
        }
        if let Some(value) = var("FLASHROUTE_BANCOR_V3_HUB") {
            if value.trim().is_empty() {
                return Err(invalid("FLASHROUTE_BANCOR_V3_HUB", &value));
            }
            config.bancor_v3_hub = TokenId::from(value.trim());
        }
        if let Some(value) = var("FLASHROUTE_MAX_ITERATIONS") {
            config.max_iterations = value
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| invalid("FLASHROUTE_MAX_ITERATIONS", &value))?;
        }
        // unknown levels fall back to info
        config.log_level = var("RUST_LOG")
            .map_or(LevelFilter::Info, |level| {
                level.parse().unwrap_or(LevelFilter::Info)
            });
        Ok(config)
    }

    /// Finder settings for a run funded by `flashloan_tokens`.
    #[must_use]
    pub fn finder_config(&self, flashloan_tokens: Vec<TokenId>) -> FinderConfig {
        FinderConfig {
            flashloan_tokens,
            hops: self.hops.clone(),
            threshold: self.threshold,
            max_iterations: self.max_iterations,
        }
    }
}

/// Parses a comma separated list of circuit lengths, each at least 2
fn parse_hops(value: &str) -> Option<Vec<usize>> {
    let hops = value
        .split(',')
        .map(|hop| hop.trim().parse::<usize>().ok().filter(|n| *n >= 2))
        .collect::<Option<Vec<_>>>()?;
    (!hops.is_empty()).then_some(hops)
}

/// `ConfigError::InvalidValue` for `key`
fn invalid(key: &'static str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.mode, FinderKind::Graph);
        assert_eq!(config.hops, vec![2, 3]);
        assert_eq!(config.bancor_v3_hub, TokenId::from(BANCOR_V3_HUB));
    }

    #[test]
    fn test_reads_variables() {
        let config = load(&[
            ("FLASHROUTE_MODE", "Pairwise"),
            ("FLASHROUTE_HOPS", "2, 4"),
            ("FLASHROUTE_THRESHOLD", "0.001"),
            ("FLASHROUTE_BANCOR_V3_HUB", "BNT"),
            ("FLASHROUTE_MAX_ITERATIONS", "50"),
            ("RUST_LOG", "debug"),
        ])
        .unwrap();
        assert_eq!(config.mode, FinderKind::Pairwise);
        assert_eq!(config.hops, vec![2, 4]);
        assert!((config.threshold - 0.001).abs() < f64::EPSILON);
        assert_eq!(config.bancor_v3_hub, TokenId::from("BNT"));
        assert_eq!(config.max_iterations, 50);
        assert_eq!(config.log_level, LevelFilter::Debug);

        let finder = config.finder_config(vec![TokenId::from("WETH")]);
        assert_eq!(finder.hops, vec![2, 4]);
        assert_eq!(finder.max_iterations, 50);
        assert_eq!(finder.flashloan_tokens, vec![TokenId::from("WETH")]);
    }

    #[test]
    fn test_rejects_invalid_values() {
        for (key, value) in [
            ("FLASHROUTE_MODE", "cyclic"),
            ("FLASHROUTE_HOPS", "1,2"),
            ("FLASHROUTE_HOPS", ""),
            ("FLASHROUTE_THRESHOLD", "-0.5"),
            ("FLASHROUTE_THRESHOLD", "abc"),
            ("FLASHROUTE_BANCOR_V3_HUB", " "),
            ("FLASHROUTE_MAX_ITERATIONS", "0"),
        ] {
            assert_eq!(
                load(&[(key, value)]).unwrap_err(),
                ConfigError::InvalidValue {
                    key,
                    value: value.to_string()
                },
                "{key}={value:?}"
            );
        }
    }

    #[test]
    fn test_unknown_log_level_falls_back_to_info() {
        assert_eq!(load(&[("RUST_LOG", "chatty")]).unwrap().log_level, LevelFilter::Info);
    }
}
