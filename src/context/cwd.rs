//! Working-directory tracking.
//!
//! Commands run in child processes, so a `cd` never moves this process. The
//! session keeps its own snapshot instead and launches children inside it.

use std::env;
use std::path::{Path, PathBuf};

use tracing::debug;

#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct CurrentDir {
    pub path: PathBuf,
}

impl CurrentDir {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Capture the current working directory from the process.
    pub fn capture() -> Option<Self> {
        let path = env::current_dir().ok()?;
        Some(Self { path })
    }

    /// Apply a plain `cd` command to the snapshot.
    ///
    /// Only a lone `cd [dir]` counts; anything chained with `;`, `&&`, `||`
    /// or a pipe ran in its own subshell and leaves the session where it was.
    /// The target must be an existing directory.
    pub fn apply_cd(&mut self, command: &str, home: Option<&Path>) -> bool {
        let Some(target) = cd_target(command) else {
            return false;
        };

        let resolved = match target.as_str() {
            "" | "~" => match home {
                Some(h) => h.to_path_buf(),
                None => return false,
            },
            "-" => return false,
            t => match (t.strip_prefix("~/"), home) {
                (Some(rest), Some(h)) => h.join(rest),
                (Some(_), None) => return false,
                (None, _) => self.path.join(t),
            },
        };

        if !resolved.is_dir() {
            debug!("Ignoring cd to missing directory {}", resolved.display());
            return false;
        }
        self.path = resolved.canonicalize().unwrap_or(resolved);
        debug!("Session cwd is now {}", self.path.display());
        true
    }
}

/// The argument of a lone `cd` command, unquoted. `None` if not a pure cd.
fn cd_target(command: &str) -> Option<String> {
    let trimmed = command.trim();
    let rest = trimmed.strip_prefix("cd")?;
    if !(rest.is_empty() || rest.starts_with(char::is_whitespace)) {
        return None;
    }
    if rest.contains([';', '&', '|', '`', '\n']) || rest.contains("$(") {
        return None;
    }
    let arg = rest.trim();
    let unquoted = arg
        .strip_prefix('"')
        .and_then(|a| a.strip_suffix('"'))
        .or_else(|| arg.strip_prefix('\'').and_then(|a| a.strip_suffix('\'')))
        .unwrap_or(arg);
    Some(unquoted.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cd_target() {
        assert_eq!(cd_target("cd out"), Some("out".to_string()));
        assert_eq!(cd_target("  cd   "), Some(String::new()));
        assert_eq!(cd_target("cd \"my dir\""), Some("my dir".to_string()));
        assert_eq!(cd_target("cd out && touch a.txt"), None);
        assert_eq!(cd_target("cdrecord -v"), None);
        assert_eq!(cd_target("echo cd out"), None);
        assert_eq!(cd_target("cd $(mktemp -d)"), None);
    }

    #[test]
    fn test_apply_cd_relative_and_home() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::fs::create_dir(root.join("out")).unwrap();

        let mut cwd = CurrentDir::new(&root);
        assert!(cwd.apply_cd("cd out", None));
        assert_eq!(cwd.path, root.join("out"));

        assert!(cwd.apply_cd("cd ..", None));
        assert_eq!(cwd.path, root);

        assert!(cwd.apply_cd("cd ~/out", Some(&root)));
        assert_eq!(cwd.path, root.join("out"));

        assert!(cwd.apply_cd("cd", Some(&root)));
        assert_eq!(cwd.path, root);
    }

    #[test]
    fn test_apply_cd_ignores_missing_and_chained() {
        let dir = tempfile::tempdir().unwrap();
        let mut cwd = CurrentDir::new(dir.path());
        assert!(!cwd.apply_cd("cd nowhere", None));
        assert!(!cwd.apply_cd("cd / && ls", None));
        assert!(!cwd.apply_cd("cd -", None));
        assert_eq!(cwd.path, dir.path());
    }
}
