use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;

const DEFAULT_DATA_DIR: &str = "smartshop_data";
const DEFAULT_SESSION_SECRET: &str = "smartshop-dev-session-secret";
const DEFAULT_SESSION_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Language used for user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    Es,
    En,
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "es" => Ok(Self::Es),
            "en" => Ok(Self::En),
            other => Err(format!("unsupported locale {other:?}, expected es or en")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the sled database.
    pub data_dir: PathBuf,
    /// HMAC secret used to sign persisted session tokens.
    pub session_secret: String,
    pub session_ttl_secs: u64,
    pub bcrypt_cost: u32,
    pub locale: Locale,
    /// Where the binary writes its log files; `None` disables file logging.
    pub log_dir: Option<PathBuf>,
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            session_secret: DEFAULT_SESSION_SECRET.to_string(),
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            locale: Locale::default(),
            log_dir: None,
            log_json: false,
        }
    }
}

impl Config {
    /// Read configuration from the process environment, loading `.env` first.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build a config from an arbitrary variable lookup. Unset variables keep
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(dir) = lookup("SMARTSHOP_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        match lookup("SMARTSHOP_SESSION_SECRET") {
            Some(secret) if !secret.is_empty() => config.session_secret = secret,
            _ => tracing::warn!("SMARTSHOP_SESSION_SECRET not set, using development secret"),
        }
        if let Some(ttl) = lookup("SMARTSHOP_SESSION_TTL_SECS") {
            config.session_ttl_secs = parse_var("SMARTSHOP_SESSION_TTL_SECS", &ttl)?;
        }
        if let Some(cost) = lookup("SMARTSHOP_BCRYPT_COST") {
            let cost: u32 = parse_var("SMARTSHOP_BCRYPT_COST", &cost)?;
            if !(4..=31).contains(&cost) {
                return Err(ConfigError::InvalidVar {
                    var: "SMARTSHOP_BCRYPT_COST",
                    value: cost.to_string(),
                    reason: "must be between 4 and 31".to_string(),
                });
            }
            config.bcrypt_cost = cost;
        }
        if let Some(locale) = lookup("SMARTSHOP_LOCALE") {
            config.locale = parse_var("SMARTSHOP_LOCALE", &locale)?;
        }
        config.log_dir = lookup("SMARTSHOP_LOG_DIR").map(PathBuf::from);
        config.log_json = lookup("SMARTSHOP_LOG_JSON").is_some();

        Ok(config)
    }
}

fn parse_var<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidVar {
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
        move |k| vars.get(k).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
        assert_eq!(config.locale, Locale::Es);
        assert_eq!(config.bcrypt_cost, bcrypt::DEFAULT_COST);
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("SMARTSHOP_DATA_DIR", "/tmp/shop"),
            ("SMARTSHOP_SESSION_SECRET", "s3cret"),
            ("SMARTSHOP_SESSION_TTL_SECS", "60"),
            ("SMARTSHOP_BCRYPT_COST", "4"),
            ("SMARTSHOP_LOCALE", "EN"),
        ]))
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/shop"));
        assert_eq!(config.session_secret, "s3cret");
        assert_eq!(config.session_ttl_secs, 60);
        assert_eq!(config.bcrypt_cost, 4);
        assert_eq!(config.locale, Locale::En);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Config::from_lookup(lookup(&[("SMARTSHOP_BCRYPT_COST", "2")])).is_err());
        assert!(Config::from_lookup(lookup(&[("SMARTSHOP_SESSION_TTL_SECS", "soon")])).is_err());
        assert!(Config::from_lookup(lookup(&[("SMARTSHOP_LOCALE", "fr")])).is_err());
    }
}
