//! Session context for command generation and execution.
//!
//! This module tracks the state of one run: the working directory commands
//! are launched in, a curated view of the environment, and the commands that
//! have already been executed. The context is handed to the command generator
//! and to plugin hooks.

mod cwd;
mod env;
mod history;


use std::path::Path;

use serde::Serialize;

pub use cwd::CurrentDir;
pub use env::Environment;
pub use history::History;

/// Number of recent commands included in a context summary.
const SUMMARY_HISTORY: usize = 10;

/// Per-run session state.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub cwd: CurrentDir,
    pub env: Environment,
    pub history: History,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::capture()
    }
}

impl SessionContext {
    /// Capture the context of the current process.
    pub fn capture() -> Self {
        Self {
            cwd: CurrentDir::capture().unwrap_or_default(),
            env: Environment::capture(),
            history: History::new(),
        }
    }

    /// A context rooted at `dir`, with an environment captured from the process.
    pub fn at(dir: impl AsRef<Path>) -> Self {
        Self {
            cwd: CurrentDir::new(dir.as_ref()),
            env: Environment::capture(),
            history: History::new(),
        }
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd.path
    }

    /// Record an executed command.
    ///
    /// The command joins the history, and a plain `cd <dir>` moves the
    /// working-directory snapshot. Returns true if the directory changed.
    pub fn observe(&mut self, command: &str) -> bool {
        self.history.push(command.to_string());
        self.cwd.apply_cd(command, self.env.home.as_deref())
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            cwd: self.cwd.path.display().to_string(),
            os: self.env.os.clone(),
            arch: self.env.arch.clone(),
            shell: self.env.shell.clone(),
            user: self.env.user.clone(),
            recent_history: self.history.recent(SUMMARY_HISTORY),
        }
    }

    /// Plain-text summary for the command generator prompt.
    pub fn summary(&self) -> String {
        let snap = self.snapshot();
        let mut out = format!(
            "OS: {} ({})\nShell: {}\nUser: {}\nWorking directory: {}\n",
            snap.os, snap.arch, snap.shell, snap.user, snap.cwd
        );
        if !snap.recent_history.is_empty() {
            out.push_str("Recent commands:\n");
            for cmd in &snap.recent_history {
                out.push_str("  ");
                out.push_str(cmd);
                out.push('\n');
            }
        }
        out
    }
}

/// A serializable snapshot of the session context.
#[derive(Clone, Debug, Serialize)]
pub struct ContextSnapshot {
    pub cwd: String,
    pub os: String,
    pub arch: String,
    pub shell: String,
    pub user: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub recent_history: Vec<String>,
}
