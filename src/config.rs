use std::{path::PathBuf, time::Duration};

use anyhow::Context;
use serde::{Deserialize, de::DeserializeOwned};

use crate::{collector::CollectorSettings, error::ConfigError, requests::ProxySettings};

fn default_proxy_endpoint() -> String {
    "http://api.scraperapi.com/".to_string()
}
fn default_session_path() -> PathBuf {
    PathBuf::from("session.json")
}
fn default_output_path() -> PathBuf {
    PathBuf::from("researchers.csv")
}
fn default_max_pages() -> u32 {
    500
}
fn default_concurrency() -> usize {
    1
}
fn default_request_timeout_secs() -> u64 {
    60
}
fn default_requests_per_second() -> u32 {
    5
}
fn default_min_request_interval_ms() -> u64 {
    100
}

/// The env vars read for scraping. Only `SCRAPER_API_KEY` is required.
#[derive(Debug, Deserialize)]
pub struct ScrapingEnv {
    pub scraper_api_key: String,
    #[serde(default)]
    pub member_sources: Vec<String>,
    #[serde(default = "default_proxy_endpoint")]
    pub proxy_endpoint: String,
    #[serde(default = "default_session_path")]
    pub session_path: PathBuf,
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub recheck_empty_pages: bool,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
    #[serde(default = "default_min_request_interval_ms")]
    pub min_request_interval_ms: u64,
}

/// The env vars read by commands that only touch the session store.
#[derive(Debug, Deserialize)]
pub struct SessionEnv {
    #[serde(default = "default_session_path")]
    pub session_path: PathBuf,
}

/// Command-line values that win over the environment.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub sources: Vec<String>,
    pub output_path: Option<PathBuf>,
    pub session_path: Option<PathBuf>,
    pub max_pages: Option<u32>,
    pub concurrency: Option<usize>,
}

/// Resolved configuration for one scraping run.
#[derive(Debug, Clone)]
pub struct ScrapingConfig {
    pub sources: Vec<String>,
    pub proxy: ProxySettings,
    pub session_path: PathBuf,
    pub output_path: PathBuf,
    pub collector: CollectorSettings,
    pub concurrency: usize,
}

impl ScrapingConfig {
    pub fn new(overrides: Overrides) -> anyhow::Result<Self> {
        let scraping_env = ScrapingEnv::load_from_env()?;
        Ok(Self::from_parts(scraping_env, overrides)?)
    }

    pub fn from_parts(env: ScrapingEnv, overrides: Overrides) -> Result<Self, ConfigError> {
        let sources = if overrides.sources.is_empty() {
            env.member_sources
        } else {
            overrides.sources
        };
        let sources: Vec<String> = sources
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if sources.is_empty() {
            return Err(ConfigError::NoSources);
        }
        if let Some(bad) = sources
            .iter()
            .find(|s| !(s.starts_with("http://") || s.starts_with("https://")))
        {
            return Err(ConfigError::InvalidSource(bad.clone()));
        }

        let max_pages = overrides.max_pages.unwrap_or(env.max_pages);
        if max_pages == 0 {
            return Err(ConfigError::ZeroPageCap);
        }

        Ok(Self {
            sources,
            proxy: ProxySettings {
                endpoint: env.proxy_endpoint,
                api_key: env.scraper_api_key,
                request_timeout: Duration::from_secs(env.request_timeout_secs),
                requests_per_second: env.requests_per_second,
                min_request_interval_ms: env.min_request_interval_ms,
            },
            session_path: overrides.session_path.unwrap_or(env.session_path),
            output_path: overrides.output_path.unwrap_or(env.output_path),
            collector: CollectorSettings {
                max_pages,
                recheck_empty_pages: env.recheck_empty_pages,
            },
            concurrency: overrides.concurrency.unwrap_or(env.concurrency).max(1),
        })
    }
}

// Extension trait.
pub trait LoadFromEnv: DeserializeOwned {
    fn load_from_env() -> anyhow::Result<Self> {
        // Don't throw an error if .env file doesn't exist.
        let _ = dotenv::dotenv();
        let config =
            envy::from_env::<Self>().context("failed to load env variables into config struct")?;
        Ok(config)
    }
}

impl<T: DeserializeOwned> LoadFromEnv for T {}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(vars: &[(&str, &str)]) -> ScrapingEnv {
        envy::from_iter(
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        )
        .unwrap()
    }

    #[test]
    fn defaults_apply_when_only_required_vars_are_set() {
        let config = ScrapingConfig::from_parts(
            env(&[
                ("SCRAPER_API_KEY", "key"),
                ("MEMBER_SOURCES", "https://a.org/members,https://b.org/members"),
            ]),
            Overrides::default(),
        )
        .unwrap();

        assert_eq!(config.sources, ["https://a.org/members", "https://b.org/members"]);
        assert_eq!(config.proxy.endpoint, "http://api.scraperapi.com/");
        assert_eq!(config.proxy.api_key, "key");
        assert_eq!(config.output_path, PathBuf::from("researchers.csv"));
        assert_eq!(config.collector.max_pages, 500);
        assert!(!config.collector.recheck_empty_pages);
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn overrides_win_over_env() {
        let config = ScrapingConfig::from_parts(
            env(&[
                ("SCRAPER_API_KEY", "key"),
                ("MEMBER_SOURCES", "https://a.org/members"),
                ("MAX_PAGES", "10"),
                ("RECHECK_EMPTY_PAGES", "true"),
            ]),
            Overrides {
                sources: vec!["https://c.org/members".to_string()],
                output_path: Some(PathBuf::from("out.csv")),
                max_pages: Some(3),
                concurrency: Some(0),
                ..Overrides::default()
            },
        )
        .unwrap();

        assert_eq!(config.sources, ["https://c.org/members"]);
        assert_eq!(config.output_path, PathBuf::from("out.csv"));
        assert_eq!(config.collector.max_pages, 3);
        assert!(config.collector.recheck_empty_pages);
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn sources_are_required_and_checked() {
        let no_sources =
            ScrapingConfig::from_parts(env(&[("SCRAPER_API_KEY", "key")]), Overrides::default());
        assert!(matches!(no_sources, Err(ConfigError::NoSources)));

        let bad = ScrapingConfig::from_parts(
            env(&[("SCRAPER_API_KEY", "key"), ("MEMBER_SOURCES", "ftp://x")]),
            Overrides::default(),
        );
        assert!(matches!(bad, Err(ConfigError::InvalidSource(s)) if s == "ftp://x"));
    }

    #[test]
    fn zero_page_cap_is_rejected() {
        let from_env = ScrapingConfig::from_parts(
            env(&[
                ("SCRAPER_API_KEY", "key"),
                ("MEMBER_SOURCES", "https://a.org/members"),
                ("MAX_PAGES", "0"),
            ]),
            Overrides::default(),
        );
        assert!(matches!(from_env, Err(ConfigError::ZeroPageCap)));

        let from_flag = ScrapingConfig::from_parts(
            env(&[
                ("SCRAPER_API_KEY", "key"),
                ("MEMBER_SOURCES", "https://a.org/members"),
            ]),
            Overrides {
                max_pages: Some(0),
                ..Overrides::default()
            },
        );
        assert!(matches!(from_flag, Err(ConfigError::ZeroPageCap)));
    }
}
