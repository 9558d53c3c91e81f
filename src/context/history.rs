//! Commands executed during this session.

use std::collections::VecDeque;

/// Maximum number of commands kept in memory.
const MAX_HISTORY_SIZE: usize = 200;

#[derive(Clone, Debug, Default)]
pub struct History {
    commands: VecDeque<String>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a command. Empty commands and repeats of the last one are skipped.
    pub fn push(&mut self, cmd: String) {
        let trimmed = cmd.trim();
        if trimmed.is_empty() || self.commands.back().map(String::as_str) == Some(trimmed) {
            return;
        }
        self.commands.push_back(trimmed.to_string());
        while self.commands.len() > MAX_HISTORY_SIZE {
            self.commands.pop_front();
        }
    }

    /// The most recent `n` commands, oldest first.
    pub fn recent(&self, n: usize) -> Vec<String> {
        let start = self.commands.len().saturating_sub(n);
        self.commands.iter().skip(start).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
