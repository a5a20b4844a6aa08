//! Application-level configuration loading for the session engine timing knobs.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "QUIZWIRE_CONFIG_PATH";

/// Immutable runtime configuration shared across the application.
///
/// Every value has a built-in default, so the server runs without a config
/// file; the file only overrides the timing policy.
#[derive(Debug, Clone)]
pub struct AppConfig {
    start_delay: Duration,
    leaderboard_delay: Duration,
    completed_retention: Duration,
    default_time_limit_secs: u32,
    leaderboard_size: usize,
    timer_tick: Duration,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(path = %path.display(), "loaded engine configuration");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Delay between the `quizStarted` signal and the first question.
    pub fn start_delay(&self) -> Duration {
        self.start_delay
    }

    /// How long the leaderboard interstitial stays up between questions.
    pub fn leaderboard_delay(&self) -> Duration {
        self.leaderboard_delay
    }

    /// How long a finished session stays in the registry for late reads.
    pub fn completed_retention(&self) -> Duration {
        self.completed_retention
    }

    /// Answer window applied when a question carries no explicit limit.
    pub fn default_time_limit_secs(&self) -> u32 {
        self.default_time_limit_secs
    }

    /// Number of rows in leaderboard broadcasts.
    pub fn leaderboard_size(&self) -> usize {
        self.leaderboard_size
    }

    /// Countdown polling interval; ticks are coalesced to whole seconds on the wire.
    pub fn timer_tick(&self) -> Duration {
        self.timer_tick
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    start_delay_ms: u64,
    leaderboard_delay_ms: u64,
    completed_retention_secs: u64,
    default_time_limit_secs: u32,
    leaderboard_size: usize,
    timer_tick_ms: u64,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            start_delay_ms: 1_000,
            leaderboard_delay_ms: 2_000,
            completed_retention_secs: 30,
            default_time_limit_secs: 30,
            leaderboard_size: 5,
            timer_tick_ms: 100,
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            start_delay: Duration::from_millis(value.start_delay_ms),
            leaderboard_delay: Duration::from_millis(value.leaderboard_delay_ms),
            completed_retention: Duration::from_secs(value.completed_retention_secs),
            default_time_limit_secs: value.default_time_limit_secs,
            leaderboard_size: value.leaderboard_size,
            timer_tick: Duration::from_millis(value.timer_tick_ms),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_engine_policy() {
        let config = AppConfig::default();
        assert_eq!(config.start_delay(), Duration::from_secs(1));
        assert_eq!(config.leaderboard_delay(), Duration::from_secs(2));
        assert_eq!(config.completed_retention(), Duration::from_secs(30));
        assert_eq!(config.default_time_limit_secs(), 30);
        assert_eq!(config.leaderboard_size(), 5);
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let raw: RawConfig = serde_json::from_str(r#"{"leaderboard_delay_ms": 500}"#).unwrap();
        let config: AppConfig = raw.into();
        assert_eq!(config.leaderboard_delay(), Duration::from_millis(500));
        assert_eq!(config.start_delay(), Duration::from_secs(1));
    }
}
