use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::Level;

const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_DATA_DIR: &str = "./data/sessions";

/// Runtime settings, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Settings {
    pub discord_token: String,
    pub guild_id: Option<u64>,
    /// Base URL of the DocKeeper backend.
    pub api_url: String,
    /// Where the session token store lives.
    pub data_dir: PathBuf,
    /// Per-request timeout. `None` waits forever.
    pub http_timeout: Option<Duration>,
    /// Search threshold sent when a command doesn't give one.
    pub default_min_score: Option<u8>,
    pub log_level: Level,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let _ = dotenv::dotenv();
        Self::from_vars(|key| dotenv::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        let discord_token = get("DISCORD_TOKEN").context("DISCORD_TOKEN required")?;
        let guild_id = get("DISCORD_GUILD_ID").and_then(|s| s.trim().parse::<u64>().ok());
        let api_url = get("DOCKEEPER_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let data_dir = PathBuf::from(
            get("DOCKEEPER_DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()),
        );

        let http_timeout = match get("DOCKEEPER_HTTP_TIMEOUT_SECS") {
            Some(s) => {
                let secs: u64 = s
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid DOCKEEPER_HTTP_TIMEOUT_SECS: {}", s))?;
                (secs > 0).then(|| Duration::from_secs(secs))
            }
            None => None,
        };

        let default_min_score = match get("DOCKEEPER_MIN_SCORE") {
            Some(s) => {
                let score: u8 = s
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid DOCKEEPER_MIN_SCORE: {}", s))?;
                anyhow::ensure!(score <= 100, "DOCKEEPER_MIN_SCORE must be 0..=100, got {}", score);
                Some(score)
            }
            None => None,
        };

        let log_level = match get("DOCKEEPER_LOG_LEVEL") {
            Some(s) => s
                .trim()
                .parse::<Level>()
                .map_err(|_| anyhow::anyhow!("Invalid DOCKEEPER_LOG_LEVEL: {}", s))?,
            None => Level::DEBUG,
        };

        Ok(Self {
            discord_token,
            guild_id,
            api_url,
            data_dir,
            http_timeout,
            default_min_score,
            log_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_vars(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let s = settings(&[("DISCORD_TOKEN", "abc")]).unwrap();
        assert_eq!(s.api_url, DEFAULT_API_URL);
        assert_eq!(s.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
        assert_eq!(s.http_timeout, None);
        assert_eq!(s.default_min_score, None);
        assert_eq!(s.guild_id, None);
        assert_eq!(s.log_level, Level::DEBUG);
    }

    #[test]
    fn test_overrides() {
        let s = settings(&[
            ("DISCORD_TOKEN", "abc"),
            ("DISCORD_GUILD_ID", "1234"),
            ("DOCKEEPER_API_URL", "https://api.dockeeper.test"),
            ("DOCKEEPER_HTTP_TIMEOUT_SECS", "30"),
            ("DOCKEEPER_MIN_SCORE", "70"),
            ("DOCKEEPER_LOG_LEVEL", "info"),
        ])
        .unwrap();
        assert_eq!(s.guild_id, Some(1234));
        assert_eq!(s.api_url, "https://api.dockeeper.test");
        assert_eq!(s.http_timeout, Some(Duration::from_secs(30)));
        assert_eq!(s.default_min_score, Some(70));
        assert_eq!(s.log_level, Level::INFO);
    }

    #[test]
    fn test_zero_timeout_means_none() {
        let s = settings(&[("DISCORD_TOKEN", "abc"), ("DOCKEEPER_HTTP_TIMEOUT_SECS", "0")]).unwrap();
        assert_eq!(s.http_timeout, None);
    }

    #[test]
    fn test_invalid_values() {
        assert!(settings(&[]).is_err());
        assert!(settings(&[("DISCORD_TOKEN", "  ")]).is_err());
        assert!(settings(&[("DISCORD_TOKEN", "abc"), ("DOCKEEPER_MIN_SCORE", "101")]).is_err());
        assert!(settings(&[("DISCORD_TOKEN", "abc"), ("DOCKEEPER_HTTP_TIMEOUT_SECS", "soon")]).is_err());
        assert!(settings(&[("DISCORD_TOKEN", "abc"), ("DOCKEEPER_LOG_LEVEL", "loud")]).is_err());
    }
}
