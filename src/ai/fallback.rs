//! Keyword-matching generator used when no model is reachable.

use anyhow::Result;
use futures::future::BoxFuture;

use super::CommandGenerator;
use crate::context::SessionContext;
use crate::plan::Step;

const MEMORY_USAGE: &str = if cfg!(target_os = "linux") {
    "free -h"
} else {
    "vm_stat"
};

const NETWORK_INTERFACES: &str = if cfg!(target_os = "macos") {
    "ifconfig"
} else {
    "ip addr"
};

/// `(keywords, command)`; the entry sharing the most words with the
/// instruction wins, earlier entries win ties.
const KEYWORD_MAP: &[(&[&str], &str)] = &[
    (&["list", "files"], "ls -la"),
    (&["list", "directory"], "ls -la"),
    (&["disk", "usage"], "df -h"),
    (&["disk", "space"], "du -sh *"),
    (&["memory", "usage"], MEMORY_USAGE),
    (&["current", "directory"], "pwd"),
    (&["network", "interfaces"], NETWORK_INTERFACES),
    (&["running", "processes"], "ps aux"),
    (&["system", "info"], "uname -a"),
    (&["find", "python", "files"], "find . -name \"*.py\" -type f"),
    (&["find", "log", "files"], "find . -name \"*.log\" -type f"),
    (&["count", "lines"], "wc -l"),
    (&["git", "status"], "git status"),
    (&["git", "log"], "git log --oneline -10"),
    (&["docker", "containers"], "docker ps -a"),
    (&["docker", "images"], "docker images"),
];

#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordGenerator;

impl KeywordGenerator {
    pub fn lookup(instruction: &str) -> Option<&'static str> {
        let lower = instruction.to_lowercase();
        let words: Vec<&str> = lower.split_whitespace().collect();

        let mut best: Option<&'static str> = None;
        let mut best_score = 0;
        for (keywords, command) in KEYWORD_MAP {
            let score = keywords.iter().filter(|k| words.contains(*k)).count();
            if score > best_score {
                best_score = score;
                best = Some(*command);
            }
        }
        best
    }
}

impl CommandGenerator for KeywordGenerator {
    fn name(&self) -> String {
        "fallback/keywords".to_string()
    }

    fn generate_command<'a>(
        &'a self,
        instruction: &'a str,
        _ctx: &'a SessionContext,
    ) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(async move { Ok(Self::lookup(instruction).map(str::to_string)) })
    }

    /// Keywords cannot decompose a task.
    fn generate_plan<'a>(
        &'a self,
        _instruction: &'a str,
        _ctx: &'a SessionContext,
    ) -> BoxFuture<'a, Result<Option<Vec<Step>>>> {
        Box::pin(async { Ok(None) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(KeywordGenerator::lookup("List the files here"), Some("ls -la"));
        assert_eq!(KeywordGenerator::lookup("show git status"), Some("git status"));
        assert_eq!(
            KeywordGenerator::lookup("find all python files"),
            Some("find . -name \"*.py\" -type f")
        );
        assert_eq!(KeywordGenerator::lookup("how much disk space"), Some("du -sh *"));
        assert_eq!(KeywordGenerator::lookup("disk usage"), Some("df -h"));
        assert_eq!(KeywordGenerator::lookup("write me a poem"), None);
    }
}
