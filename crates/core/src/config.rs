use crate::models::{default_sources, DictionarySource};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_ETYMOLOGY_ENDPOINT: &str = "https://ru.wiktionary.org/w/api.php";
pub const DEFAULT_USER_AGENT: &str = "AnglicismChecker/1.0";

/// What to do when one of the configured dictionaries cannot be downloaded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FetchPolicy {
    #[default]
    ContinueWithAvailable,
    Abort,
}

impl FromStr for FetchPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "continue" | "continue_with_available" => Ok(FetchPolicy::ContinueWithAvailable),
            "abort" => Ok(FetchPolicy::Abort),
            other => Err(format!("unknown fetch policy: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub data_dir: PathBuf,
    pub user_agent: String,
    pub fetch_timeout: Duration,
    pub etymology_endpoint: String,
    pub etymology_timeout: Duration,
    pub build_workers: usize,
    pub classify_concurrency: usize,
    pub fetch_policy: FetchPolicy,
    pub min_pdf_bytes: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            fetch_timeout: Duration::from_secs(120),
            etymology_endpoint: DEFAULT_ETYMOLOGY_ENDPOINT.to_string(),
            etymology_timeout: Duration::from_secs(10),
            build_workers: 2,
            classify_concurrency: 8,
            fetch_policy: FetchPolicy::default(),
            min_pdf_bytes: 1_024,
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with any `ANGLICISM_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with the `ANGLICISM_*` values `lookup` returns.
    /// Blank or unparsable values keep the default.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let value = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };
        let mut config = Self::default();

        if let Some(dir) = value("ANGLICISM_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(endpoint) = value("ANGLICISM_ETYMOLOGY_ENDPOINT") {
            config.etymology_endpoint = endpoint;
        }
        if let Some(secs) = value("ANGLICISM_ETYMOLOGY_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            config.etymology_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = value("ANGLICISM_FETCH_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            config.fetch_timeout = Duration::from_secs(secs);
        }
        if let Some(workers) = value("ANGLICISM_WORKERS").and_then(|v| v.parse::<usize>().ok()) {
            config.build_workers = workers.max(1);
        }
        if let Some(policy) = value("ANGLICISM_FETCH_POLICY").and_then(|v| v.parse().ok()) {
            config.fetch_policy = policy;
        }

        config
    }

    pub fn pdf_dir(&self) -> PathBuf {
        self.data_dir.join("pdf")
    }

    pub fn index_path(&self) -> PathBuf {
        self.data_dir.join("index.json")
    }

    pub fn sources(&self) -> Vec<DictionarySource> {
        default_sources(&self.pdf_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_paths_live_under_data_dir() {
        let config = EngineConfig {
            data_dir: PathBuf::from("/var/lib/anglicism"),
            ..EngineConfig::default()
        };

        assert_eq!(config.pdf_dir(), PathBuf::from("/var/lib/anglicism/pdf"));
        assert_eq!(config.index_path(), PathBuf::from("/var/lib/anglicism/index.json"));
        assert!(config
            .sources()
            .iter()
            .all(|source| source.local_path.starts_with("/var/lib/anglicism/pdf")));
    }

    #[test]
    fn fetch_policy_parses_cli_spellings() {
        assert_eq!("abort".parse::<FetchPolicy>(), Ok(FetchPolicy::Abort));
        assert_eq!(
            " Continue ".parse::<FetchPolicy>(),
            Ok(FetchPolicy::ContinueWithAvailable)
        );
        assert!("retry".parse::<FetchPolicy>().is_err());
    }

    #[test]
    fn variables_overlay_defaults() {
        let vars = std::collections::HashMap::from([
            ("ANGLICISM_DATA_DIR", "/srv/anglicism"),
            ("ANGLICISM_ETYMOLOGY_TIMEOUT_SECS", " 3 "),
            ("ANGLICISM_WORKERS", "0"),
            ("ANGLICISM_FETCH_POLICY", "abort"),
            ("ANGLICISM_FETCH_TIMEOUT_SECS", "soon"),
            ("ANGLICISM_ETYMOLOGY_ENDPOINT", "   "),
        ]);
        let config =
            EngineConfig::from_vars(|key| vars.get(key).map(|value| value.to_string()));

        assert_eq!(config.data_dir, PathBuf::from("/srv/anglicism"));
        assert_eq!(config.etymology_timeout, Duration::from_secs(3));
        assert_eq!(config.build_workers, 1);
        assert_eq!(config.fetch_policy, FetchPolicy::Abort);
        assert_eq!(config.fetch_timeout, EngineConfig::default().fetch_timeout);
        assert_eq!(config.etymology_endpoint, DEFAULT_ETYMOLOGY_ENDPOINT);
    }
}
