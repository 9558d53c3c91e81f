//! Curated view of the process environment.
//!
//! Only a handful of identifying values are kept; the full environment can
//! hold secrets and is never forwarded to the command generator.

use std::env;
use std::path::PathBuf;

/// Variables worth mentioning to the generator when set.
const CURATED_VARS: &[&str] = &["LANG", "TERM", "EDITOR", "VIRTUAL_ENV", "CONDA_DEFAULT_ENV"];

#[derive(Clone, Debug, Default)]
pub struct Environment {
    pub os: String,
    pub arch: String,
    pub shell: String,
    pub user: String,
    pub home: Option<PathBuf>,
    pub vars: Vec<(String, String)>,
}

impl Environment {
    pub fn capture() -> Self {
        let vars = CURATED_VARS
            .iter()
            .filter_map(|k| env::var(k).ok().map(|v| (k.to_string(), v)))
            .collect();
        Self {
            os: env::consts::OS.to_string(),
            arch: env::consts::ARCH.to_string(),
            shell: env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string()),
            user: env::var("USER")
                .or_else(|_| env::var("USERNAME"))
                .unwrap_or_else(|_| "unknown".to_string()),
            home: env::var_os("HOME").map(PathBuf::from),
            vars,
        }
    }
}
