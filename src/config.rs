//! Runtime configuration.
//!
//! Resolved once per run: built-in defaults, then `TERMPILOT_*` environment
//! variables, then whatever the CLI overrides on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::warn;

use crate::orchestrator::MAX_WORKERS;
use crate::plan::WaveMode;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
const MAX_WORKERS_LIMIT: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// State directory holding trust lists, audit logs and run logs.
    pub home: PathBuf,
    pub model: String,
    /// Per-command timeout; `None` waits forever.
    pub timeout: Option<Duration>,
    pub max_workers: usize,
    pub wave_mode: WaveMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            home: default_home(dirs::home_dir()),
            model: DEFAULT_MODEL.to_string(),
            timeout: None,
            max_workers: MAX_WORKERS,
            wave_mode: WaveMode::default(),
        }
    }
}

fn default_home(user_home: Option<PathBuf>) -> PathBuf {
    user_home
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".termpilot")
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with whatever `lookup` returns for each variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(home) = get("TERMPILOT_HOME") {
            config.home = PathBuf::from(home);
        }
        if let Some(model) = get("TERMPILOT_MODEL") {
            config.model = model.trim().to_string();
        }
        if let Some(raw) = get("TERMPILOT_TIMEOUT") {
            match parse_timeout(&raw) {
                Ok(timeout) => config.timeout = timeout,
                Err(e) => warn!("Ignoring TERMPILOT_TIMEOUT: {}", e),
            }
        }
        if let Some(raw) = get("TERMPILOT_MAX_WORKERS") {
            match raw.trim().parse::<usize>() {
                Ok(n) => config.max_workers = n.clamp(1, MAX_WORKERS_LIMIT),
                Err(e) => warn!("Ignoring TERMPILOT_MAX_WORKERS={:?}: {}", raw, e),
            }
        }
        if let Some(raw) = get("TERMPILOT_WAVE_MODE") {
            match raw.parse::<WaveMode>() {
                Ok(mode) => config.wave_mode = mode,
                Err(e) => warn!("Ignoring TERMPILOT_WAVE_MODE: {}", e),
            }
        }
        config
    }

    pub fn allowed_path(&self) -> PathBuf {
        self.home.join("allowed.json")
    }

    pub fn disabled_builtins_path(&self) -> PathBuf {
        self.home.join("disabled_builtins.json")
    }

    pub fn history_path(&self) -> PathBuf {
        self.home.join("history.jsonl")
    }

    pub fn processes_path(&self) -> PathBuf {
        self.home.join("processes.jsonl")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.home.join("logs")
    }

    pub fn home(&self) -> &Path {
        &self.home
    }
}

/// Seconds as a positive number; `0` disables the timeout.
pub fn parse_timeout(raw: &str) -> Result<Option<Duration>, String> {
    let secs: f64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number of seconds", raw.trim()))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(format!("'{}' is not a valid timeout", raw.trim()));
    }
    if secs == 0.0 {
        return Ok(None);
    }
    Duration::try_from_secs_f64(secs)
        .map(Some)
        .map_err(|e| format!("'{}' is not a valid timeout: {}", raw.trim(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[("TERMPILOT_HOME", "/state")]));
        assert_eq!(config.home, PathBuf::from("/state"));
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.timeout, None);
        assert_eq!(config.max_workers, MAX_WORKERS);
        assert_eq!(config.wave_mode, WaveMode::Strict);
        assert_eq!(config.allowed_path(), PathBuf::from("/state/allowed.json"));
        assert_eq!(config.processes_path(), PathBuf::from("/state/processes.jsonl"));
        assert_eq!(config.log_dir(), PathBuf::from("/state/logs"));
    }

    #[test]
    fn test_default_home_falls_back_to_cwd() {
        assert_eq!(
            default_home(Some(PathBuf::from("/home/ada"))),
            PathBuf::from("/home/ada/.termpilot")
        );
        assert_eq!(default_home(None), PathBuf::from("./.termpilot"));
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("TERMPILOT_MODEL", "gpt-4.1"),
            ("TERMPILOT_TIMEOUT", "2.5"),
            ("TERMPILOT_MAX_WORKERS", "64"),
            ("TERMPILOT_WAVE_MODE", "compat"),
        ]));
        assert_eq!(config.model, "gpt-4.1");
        assert_eq!(config.timeout, Some(Duration::from_millis(2500)));
        assert_eq!(config.max_workers, MAX_WORKERS_LIMIT);
        assert_eq!(config.wave_mode, WaveMode::Compat);

        let config = Config::from_lookup(lookup(&[("TERMPILOT_MAX_WORKERS", "0")]));
        assert_eq!(config.max_workers, 1);
    }

    #[test]
    fn test_bad_env_values_are_ignored() {
        let config = Config::from_lookup(lookup(&[
            ("TERMPILOT_TIMEOUT", "soon"),
            ("TERMPILOT_MAX_WORKERS", "many"),
            ("TERMPILOT_WAVE_MODE", "chaotic"),
            ("TERMPILOT_MODEL", "   "),
        ]));
        assert_eq!(config.timeout, None);
        assert_eq!(config.max_workers, MAX_WORKERS);
        assert_eq!(config.wave_mode, WaveMode::Strict);
        assert_eq!(config.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_parse_timeout() {
        assert_eq!(parse_timeout("30"), Ok(Some(Duration::from_secs(30))));
        assert_eq!(parse_timeout("0"), Ok(None));
        assert!(parse_timeout("-1").is_err());
        assert!(parse_timeout("abc").is_err());
        assert!(parse_timeout("1e30").is_err());
        assert!(parse_timeout("inf").is_err());
    }

    #[test]
    fn test_oversized_env_timeout_is_ignored() {
        let config = Config::from_lookup(lookup(&[("TERMPILOT_TIMEOUT", "1e30")]));
        assert_eq!(config.timeout, None);
    }
}
