//! Append-only audit logs of executed commands and completed plans.
//!
//! Both logs are JSON lines. Every append opens the file in append mode and
//! writes one complete record with a single `write_all`, so parallel steps
//! finishing together never interleave partial lines. Write failures are
//! logged and swallowed; the audit trail never aborts execution.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::plan::Plan;

/// One executed command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEntry {
    pub timestamp: String,
    pub instruction: String,
    pub command: String,
    pub cwd: String,
    pub success: Option<bool>,
}

/// One completed plan, flattened next to its timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessEntry {
    pub timestamp: String,
    #[serde(flatten)]
    pub plan: Plan,
}

#[derive(Debug, Clone)]
pub struct AuditLog {
    commands_path: PathBuf,
    processes_path: PathBuf,
}

impl AuditLog {
    pub fn new(commands_path: impl Into<PathBuf>, processes_path: impl Into<PathBuf>) -> Self {
        Self {
            commands_path: commands_path.into(),
            processes_path: processes_path.into(),
        }
    }

    /// Logs at the default file names inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join("history.jsonl"), dir.join("processes.jsonl"))
    }

    pub fn commands_path(&self) -> &Path {
        &self.commands_path
    }

    pub fn processes_path(&self) -> &Path {
        &self.processes_path
    }

    pub fn log_command(&self, instruction: &str, command: &str, cwd: &Path, success: Option<bool>) {
        let entry = CommandEntry {
            timestamp: now(),
            instruction: instruction.to_string(),
            command: command.to_string(),
            cwd: cwd.display().to_string(),
            success,
        };
        if let Err(e) = append_line(&self.commands_path, &entry) {
            warn!("Failed to append command log: {:#}", e);
        }
    }

    pub fn log_process(&self, plan: &Plan) {
        let entry = ProcessEntry {
            timestamp: now(),
            plan: plan.clone(),
        };
        if let Err(e) = append_line(&self.processes_path, &entry) {
            warn!("Failed to append process log: {:#}", e);
        }
    }

    /// The last `limit` command entries (all if `None`), oldest first.
    pub fn read_commands(&self, limit: Option<usize>) -> Vec<CommandEntry> {
        read_lines(&self.commands_path, limit)
    }

    pub fn read_processes(&self, limit: Option<usize>) -> Vec<ProcessEntry> {
        read_lines(&self.processes_path, limit)
    }

    pub fn clear_commands(&self) -> io::Result<()> {
        truncate(&self.commands_path)
    }

    pub fn clear_processes(&self) -> io::Result<()> {
        truncate(&self.processes_path)
    }
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

fn append_line<T: Serialize>(path: &Path, entry: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let mut line = serde_json::to_string(entry).context("serializing audit entry")?;
    line.push('\n');

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    file.write_all(line.as_bytes())
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn read_lines<T: DeserializeOwned>(path: &Path, limit: Option<usize>) -> Vec<T> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!("Failed to read {}: {}", path.display(), e);
            return Vec::new();
        }
    };

    let mut entries: Vec<T> = Vec::new();
    for (n, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => debug!("Skipping malformed line {} in {}: {}", n + 1, path.display(), e),
        }
    }

    if let Some(limit) = limit {
        let start = entries.len().saturating_sub(limit);
        entries.drain(..start);
    }
    entries
}

fn truncate(path: &Path) -> io::Result<()> {
    match OpenOptions::new().write(true).truncate(true).open(path) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
