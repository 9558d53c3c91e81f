//! Command allowlist management.
//!
//! Three tiers of trust decide whether a command may run without a prompt:
//!
//! 1. builtin-safe prefixes compiled into the binary, each of which the user
//!    can disable (the disabled set is persisted);
//! 2. session entries, approved for this run only;
//! 3. permanent entries, persisted to the user's allow list.
//!
//! A command matches an entry when it equals it or starts with `entry + " "`,
//! compared case-insensitively. The store is owned by the coordinating thread;
//! worker tasks never see it.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use tracing::{debug, warn};

/// Commands that are read-only or harmless.
pub const BUILTIN_SAFE: &[&str] = &[
    // filesystem inspection
    "ls", "ll", "la", "exa", "eza", "tree", "find", "locate", "stat", "file", "wc", "du", "df",
    // reading
    "cat", "head", "tail", "less", "more", "bat", "batcat",
    // text processing
    "grep", "rg", "ripgrep", "ag", "ack", "sed", "awk", "sort", "uniq", "cut", "tr", "diff",
    "comm", "jq", "yq",
    // system info
    "pwd", "whoami", "id", "hostname", "uname", "uptime", "date", "cal", "env", "printenv",
    "echo", "printf", "which", "where", "type", "command", "top", "htop", "btop", "ps", "pgrep",
    "lsof", "free", "vmstat", "iostat", "nproc", "arch", "sw_vers",
    // network inspection
    "ping", "dig", "nslookup", "host", "traceroute", "mtr", "ifconfig", "ip", "ss", "netstat",
    "curl", "wget", "httpie",
    // git, read-only
    "git status", "git log", "git diff", "git show", "git branch", "git tag", "git remote",
    "git stash list", "git shortlog", "git blame", "git ls-files", "git ls-tree",
    // package info
    "brew list", "brew info", "brew search", "pip list", "pip show", "pip freeze", "npm list",
    "npm ls", "npm info", "npm outdated", "cargo --version", "rustc --version", "go version",
    "node --version", "python --version", "java -version",
    // docker, read-only
    "docker ps", "docker images", "docker stats", "docker logs", "docker inspect",
    "docker version",
    // misc
    "man", "tldr", "history",
];

/// Which tier let a command through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustTier {
    BuiltinSafe,
    SessionAllowed,
    PermanentAllowed,
}

pub struct TrustStore {
    disabled: BTreeSet<String>,
    session: BTreeSet<String>,
    permanent: BTreeSet<String>,
    allowed_path: Option<PathBuf>,
    disabled_path: Option<PathBuf>,
}

impl Default for TrustStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl TrustStore {
    /// Load the persisted permanent list and disabled-builtin set.
    ///
    /// Missing or malformed files load as empty sets.
    pub fn load(allowed_path: impl Into<PathBuf>, disabled_path: impl Into<PathBuf>) -> Self {
        let allowed_path = allowed_path.into();
        let disabled_path = disabled_path.into();
        Self {
            disabled: load_set(&disabled_path)
                .into_iter()
                .map(|k| k.to_lowercase())
                .collect(),
            session: BTreeSet::new(),
            permanent: load_set(&allowed_path),
            allowed_path: Some(allowed_path),
            disabled_path: Some(disabled_path),
        }
    }

    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            disabled: BTreeSet::new(),
            session: BTreeSet::new(),
            permanent: BTreeSet::new(),
            allowed_path: None,
            disabled_path: None,
        }
    }

    /// First tier matching the command, checked builtin → session → permanent.
    pub fn tier_for(&self, command: &str) -> Option<TrustTier> {
        let cmd = command.trim().to_lowercase();

        let builtin = BUILTIN_SAFE
            .iter()
            .filter(|p| !self.disabled.contains(**p))
            .any(|p| matches_entry(&cmd, p));
        if builtin {
            return Some(TrustTier::BuiltinSafe);
        }
        if self.session.iter().any(|e| matches_entry(&cmd, e)) {
            return Some(TrustTier::SessionAllowed);
        }
        if self.permanent.iter().any(|e| matches_entry(&cmd, e)) {
            return Some(TrustTier::PermanentAllowed);
        }
        None
    }

    pub fn should_auto_execute(&self, command: &str) -> bool {
        self.tier_for(command).is_some()
    }

    /// Allow the command's key for the rest of this run. Returns the key.
    pub fn add_session(&mut self, command: &str) -> String {
        let key = normalize_key(command);
        debug!("Session-allowing '{}'", key);
        self.session.insert(key.clone());
        key
    }

    /// Persist the command's key to the permanent list. Returns the key.
    pub fn add_permanent(&mut self, command: &str) -> String {
        let key = normalize_key(command);
        if self.permanent.insert(key.clone()) {
            debug!("Permanently allowing '{}'", key);
            self.save_permanent();
        }
        key
    }

    /// Remove the command's key from the permanent list, if present.
    pub fn remove_permanent(&mut self, command: &str) -> bool {
        let key = normalize_key(command);
        let removed = self.permanent.remove(&key);
        if removed {
            self.save_permanent();
        }
        removed
    }

    /// Disable a builtin-safe entry. Returns false if `command` names no builtin entry.
    pub fn disable_builtin(&mut self, command: &str) -> bool {
        let Some(entry) = builtin_entry(command) else {
            return false;
        };
        if self.disabled.insert(entry.to_string()) {
            self.save_disabled();
        }
        true
    }

    /// Re-enable a builtin-safe entry. Returns false if `command` names no builtin entry.
    pub fn enable_builtin(&mut self, command: &str) -> bool {
        let Some(entry) = builtin_entry(command) else {
            return false;
        };
        if self.disabled.remove(entry) {
            self.save_disabled();
        }
        true
    }

    pub fn permanent_list(&self) -> Vec<String> {
        self.permanent.iter().cloned().collect()
    }

    pub fn session_list(&self) -> Vec<String> {
        self.session.iter().cloned().collect()
    }

    /// Every builtin entry with whether it is currently active.
    pub fn builtin_list(&self) -> Vec<(&'static str, bool)> {
        BUILTIN_SAFE
            .iter()
            .map(|p| (*p, !self.disabled.contains(*p)))
            .collect()
    }

    fn save_permanent(&self) {
        if let Some(path) = &self.allowed_path {
            save_set(path, &self.permanent);
        }
    }

    fn save_disabled(&self) {
        if let Some(path) = &self.disabled_path {
            save_set(path, &self.disabled);
        }
    }
}

/// Reduce a command to its matching key: the binary plus, if present, its
/// first argument (`git commit -m "msg"` → `git commit`).
pub fn normalize_key(command: &str) -> String {
    let trimmed = command.trim();
    // unterminated quotes fall back to plain whitespace splitting
    let tokens = shlex::split(trimmed)
        .unwrap_or_else(|| trimmed.split_whitespace().map(String::from).collect());
    if tokens.is_empty() {
        return trimmed.to_string();
    }
    tokens.into_iter().take(2).collect::<Vec<_>>().join(" ")
}

fn matches_entry(cmd_lower: &str, entry: &str) -> bool {
    let entry = entry.to_lowercase();
    cmd_lower == entry
        || cmd_lower
            .strip_prefix(entry.as_str())
            .is_some_and(|rest| rest.starts_with(' '))
}

fn builtin_entry(command: &str) -> Option<&'static str> {
    let wanted = command.trim().to_lowercase();
    BUILTIN_SAFE.iter().copied().find(|p| *p == wanted)
}

fn load_set(path: &Path) -> BTreeSet<String> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return BTreeSet::new(),
        Err(e) => {
            warn!("Failed to read {}: {}", path.display(), e);
            return BTreeSet::new();
        }
    };
    match serde_json::from_str::<Vec<String>>(&raw) {
        Ok(entries) => entries.into_iter().collect(),
        Err(e) => {
            warn!("Ignoring malformed list at {}: {}", path.display(), e);
            BTreeSet::new()
        }
    }
}

fn save_set(path: &Path, set: &BTreeSet<String>) {
    if let Err(e) = write_list(path, set) {
        warn!("Failed to save {}: {:#}", path.display(), e);
    }
}

fn write_list(path: &Path, set: &BTreeSet<String>) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let mut data = serde_json::to_vec_pretty(set).context("Failed to serialize list")?;
    data.push(b'\n');
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, &data).with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace {} with {}", path.display(), tmp.display()))?;
    Ok(())
}
