//! Runtime configuration read from the environment

use std::path::PathBuf;
use std::time::Duration;

use crate::poll::DEFAULT_POLL_INTERVAL;
use crate::session::{SessionConfig, DEFAULT_POINTS_PER_PUZZLE, DEFAULT_SESSION_BUDGET};
use crate::store::WriteEncoding;

pub const DEFAULT_PUZZLE_COUNT: usize = 15;
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_DEV_STORE_ADDR: &str = "0.0.0.0:6574";

/// What to do when a joining name is already on the party's roster
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicateNames {
    /// Register anyway; rows with the same name merge into one entry
    #[default]
    Tolerate,
    /// Read the roster first and refuse a name that is taken
    Reject,
}

impl DuplicateNames {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tolerate" | "allow" => Some(Self::Tolerate),
            "reject" | "deny" => Some(Self::Reject),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL of the shared score store; `None` runs against memory
    pub store_url: Option<String>,
    pub write_encoding: WriteEncoding,
    pub store_timeout: Duration,
    pub poll_interval: Duration,
    pub session_budget: Duration,
    pub puzzle_count: usize,
    pub points_per_puzzle: i64,
    pub duplicate_names: DuplicateNames,
    /// Directory for the local solo leaderboard
    pub data_dir: PathBuf,
    pub dev_store_addr: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_url: None,
            write_encoding: WriteEncoding::default(),
            store_timeout: DEFAULT_STORE_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            session_budget: DEFAULT_SESSION_BUDGET,
            puzzle_count: DEFAULT_PUZZLE_COUNT,
            points_per_puzzle: DEFAULT_POINTS_PER_PUZZLE,
            duplicate_names: DuplicateNames::default(),
            data_dir: PathBuf::from("data"),
            dev_store_addr: DEFAULT_DEV_STORE_ADDR.to_string(),
        }
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env_value(name)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid {}={}", name, raw);
            None
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let write_encoding = env_value("STORE_WRITE_ENCODING")
            .and_then(|v| {
                let parsed = WriteEncoding::parse(&v);
                if parsed.is_none() {
                    tracing::warn!("Unknown STORE_WRITE_ENCODING={}, using json", v);
                }
                parsed
            })
            .unwrap_or(defaults.write_encoding);

        let duplicate_names = env_value("DUPLICATE_NAMES")
            .and_then(|v| DuplicateNames::parse(&v))
            .unwrap_or(defaults.duplicate_names);

        let config = Self {
            store_url: env_value("SCORE_STORE_URL"),
            write_encoding,
            store_timeout: env_parsed("STORE_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.store_timeout),
            poll_interval: env_parsed("POLL_INTERVAL_MS")
                .filter(|ms: &u64| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            session_budget: env_parsed("SESSION_SECONDS")
                .filter(|secs: &u64| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.session_budget),
            puzzle_count: env_parsed("PUZZLE_COUNT")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.puzzle_count),
            points_per_puzzle: env_parsed("POINTS_PER_PUZZLE")
                .unwrap_or(defaults.points_per_puzzle),
            duplicate_names,
            data_dir: env_value("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            dev_store_addr: env_value("DEV_STORE_ADDR").unwrap_or(defaults.dev_store_addr),
        };

        tracing::info!(
            store_url = config.store_url.as_deref().unwrap_or("<memory>"),
            poll_interval_ms = config.poll_interval.as_millis() as u64,
            session_secs = config.session_budget.as_secs(),
            puzzle_count = config.puzzle_count,
            "Config loaded"
        );

        config
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            budget: self.session_budget,
            points_per_puzzle: self.points_per_puzzle,
            ..SessionConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "SCORE_STORE_URL",
        "STORE_WRITE_ENCODING",
        "STORE_TIMEOUT_SECS",
        "POLL_INTERVAL_MS",
        "SESSION_SECONDS",
        "PUZZLE_COUNT",
        "POINTS_PER_PUZZLE",
        "DUPLICATE_NAMES",
        "DATA_DIR",
        "DEV_STORE_ADDR",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_without_env() {
        clear_env();
        let config = AppConfig::from_env();
        assert_eq!(config.store_url, None);
        assert_eq!(config.write_encoding, WriteEncoding::Json);
        assert_eq!(config.poll_interval, Duration::from_secs(3));
        assert_eq!(config.session_budget, Duration::from_secs(120));
        assert_eq!(config.puzzle_count, 15);
        assert_eq!(config.duplicate_names, DuplicateNames::Tolerate);
        assert_eq!(config.dev_store_addr, "0.0.0.0:6574");
    }

    #[test]
    #[serial]
    fn test_reads_env_overrides() {
        clear_env();
        std::env::set_var("SCORE_STORE_URL", "  https://scores.example/exec  ");
        std::env::set_var("STORE_WRITE_ENCODING", "form");
        std::env::set_var("POLL_INTERVAL_MS", "500");
        std::env::set_var("SESSION_SECONDS", "60");
        std::env::set_var("DUPLICATE_NAMES", "reject");

        let config = AppConfig::from_env();
        clear_env();

        assert_eq!(
            config.store_url.as_deref(),
            Some("https://scores.example/exec")
        );
        assert_eq!(config.write_encoding, WriteEncoding::Form);
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.session_config().budget, Duration::from_secs(60));
        assert_eq!(config.duplicate_names, DuplicateNames::Reject);
    }

    #[test]
    #[serial]
    fn test_invalid_and_empty_values_fall_back() {
        clear_env();
        std::env::set_var("SCORE_STORE_URL", "   ");
        std::env::set_var("POLL_INTERVAL_MS", "soon");
        std::env::set_var("PUZZLE_COUNT", "0");
        std::env::set_var("STORE_WRITE_ENCODING", "xml");

        let config = AppConfig::from_env();
        clear_env();

        assert_eq!(config.store_url, None);
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(config.puzzle_count, DEFAULT_PUZZLE_COUNT);
        assert_eq!(config.write_encoding, WriteEncoding::Json);
    }
}
