//! Process configuration.
//!
//! Everything is read from the environment at startup:
//!
//! | Variable | Default |
//! |---|---|
//! | `STEWARD_LISTEN_ADDR` | `0.0.0.0:3000` |
//! | `GITHUB_TOKEN` | required |
//! | `GITHUB_WEBHOOK_SECRET` | required |
//! | `GITHUB_API_URL` | `https://api.github.com` |
//! | `STEWARD_APP_NAME` | `steward-bot` |
//! | `STEWARD_MERGE_LABEL` | `ready-to-merge` |
//! | `STEWARD_MUTATE` | `false` |
//! | `STEWARD_ENFORCE_CODE_FREEZE` | `false` |
//! | `STEWARD_CODE_FREEZE_BRANCH` | empty |
//! | `STEWARD_CACHE_CAPACITY` | `1000` |
//!
//! `STEWARD_MUTATE` sets both `enabled` and `mutation_enabled` for every
//! repository the bot sees.

use std::fmt;
use std::net::SocketAddr;
use std::num::NonZeroUsize;

use thiserror::Error;

use crate::github::DEFAULT_API_URL;
use crate::train::{CodeFreeze, TrainConfig};

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_CACHE_CAPACITY: usize = 1000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value:?} ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: &'static str,
    },
}

#[derive(Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub github_token: String,
    pub webhook_secret: String,
    pub api_url: String,
    pub cache_capacity: NonZeroUsize,
    pub train: TrainConfig,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("listen_addr", &self.listen_addr)
            .field("api_url", &self.api_url)
            .field("cache_capacity", &self.cache_capacity)
            .field("train", &self.train)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());
        let require = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let listen_raw =
            get("STEWARD_LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr = listen_raw.parse().map_err(|_| ConfigError::Invalid {
            name: "STEWARD_LISTEN_ADDR",
            value: listen_raw.clone(),
            reason: "expected host:port",
        })?;

        let cache_capacity = match get("STEWARD_CACHE_CAPACITY") {
            None => NonZeroUsize::new(DEFAULT_CACHE_CAPACITY),
            Some(raw) => raw.parse::<usize>().ok().and_then(NonZeroUsize::new),
        }
        .ok_or_else(|| ConfigError::Invalid {
            name: "STEWARD_CACHE_CAPACITY",
            value: get("STEWARD_CACHE_CAPACITY").unwrap_or_default(),
            reason: "expected a positive integer",
        })?;

        let defaults = TrainConfig::default();
        let train = TrainConfig {
            merge_label: get("STEWARD_MERGE_LABEL").unwrap_or(defaults.merge_label),
            app_name: get("STEWARD_APP_NAME").unwrap_or(defaults.app_name),
            mutate: parse_bool("STEWARD_MUTATE", get("STEWARD_MUTATE"))?,
            code_freeze: CodeFreeze {
                enforce: parse_bool(
                    "STEWARD_ENFORCE_CODE_FREEZE",
                    get("STEWARD_ENFORCE_CODE_FREEZE"),
                )?,
                branch: get("STEWARD_CODE_FREEZE_BRANCH").unwrap_or_default(),
            },
        };

        Ok(Self {
            listen_addr,
            github_token: require("GITHUB_TOKEN")?,
            webhook_secret: require("GITHUB_WEBHOOK_SECRET")?,
            api_url: get("GITHUB_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            cache_capacity,
            train,
        })
    }
}

/// Unset means false.
fn parse_bool(name: &'static str, raw: Option<String>) -> Result<bool, ConfigError> {
    let Some(raw) = raw else {
        return Ok(false);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: raw,
            reason: "expected a boolean",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<&str, &str> = vars.iter().copied().collect();
        move |name| map.get(name).map(|v| v.to_string())
    }

    const REQUIRED: [(&str, &str); 2] = [("GITHUB_TOKEN", "t0ken"), ("GITHUB_WEBHOOK_SECRET", "s3cret")];

    #[test]
    fn defaults() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();

        assert_eq!(config.listen_addr, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(config.api_url, "https://api.github.com");
        assert_eq!(config.cache_capacity.get(), 1000);
        assert_eq!(config.train, TrainConfig::default());
        assert!(!config.train.mutate);
        assert_eq!(config.train.code_freeze, CodeFreeze::default());
    }

    #[test]
    fn overrides() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("STEWARD_LISTEN_ADDR", "127.0.0.1:8080"),
            ("GITHUB_API_URL", "http://localhost:9000"),
            ("STEWARD_APP_NAME", "mergebot"),
            ("STEWARD_MERGE_LABEL", "ready to merge"),
            ("STEWARD_MUTATE", "yes"),
            ("STEWARD_ENFORCE_CODE_FREEZE", "1"),
            ("STEWARD_CODE_FREEZE_BRANCH", "release"),
            ("STEWARD_CACHE_CAPACITY", "5"),
        ]);

        let config = Config::from_lookup(lookup(&vars)).unwrap();

        assert_eq!(config.listen_addr.port(), 8080);
        assert_eq!(config.api_url, "http://localhost:9000");
        assert_eq!(config.cache_capacity.get(), 5);
        assert_eq!(config.train.app_name, "mergebot");
        assert_eq!(config.train.merge_label, "ready to merge");
        assert!(config.train.mutate);
        assert_eq!(
            config.train.code_freeze,
            CodeFreeze {
                enforce: true,
                branch: "release".to_string()
            }
        );
    }

    #[test]
    fn missing_secrets_are_errors() {
        assert_eq!(
            Config::from_lookup(lookup(&[("GITHUB_WEBHOOK_SECRET", "s")])).unwrap_err(),
            ConfigError::Missing("GITHUB_TOKEN")
        );
        assert_eq!(
            Config::from_lookup(lookup(&[("GITHUB_TOKEN", "t")])).unwrap_err(),
            ConfigError::Missing("GITHUB_WEBHOOK_SECRET")
        );
    }

    #[test]
    fn malformed_values_are_errors() {
        for (name, value) in [
            ("STEWARD_MUTATE", "maybe"),
            ("STEWARD_CACHE_CAPACITY", "0"),
            ("STEWARD_CACHE_CAPACITY", "lots"),
            ("STEWARD_LISTEN_ADDR", "localhost"),
        ] {
            let mut vars = REQUIRED.to_vec();
            vars.push((name, value));
            let err = Config::from_lookup(lookup(&vars)).unwrap_err();
            assert!(
                matches!(err, ConfigError::Invalid { name: n, .. } if n == name),
                "{} = {} gave {:?}",
                name,
                value,
                err
            );
        }
    }

    #[test]
    fn boolean_spellings() {
        for (raw, expected) in [("TRUE", true), ("on", true), ("Off", false), ("no", false)] {
            assert_eq!(parse_bool("X", Some(raw.to_string())), Ok(expected));
        }
        assert_eq!(parse_bool("X", None), Ok(false));
    }

    #[test]
    fn debug_hides_credentials() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("t0ken"));
        assert!(!debug.contains("s3cret"));
    }
}
