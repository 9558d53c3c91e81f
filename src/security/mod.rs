//! Security module for command analysis and safety checks.
//!
//! This module classifies commands for destructive patterns, keeps the
//! three-tier trust lists, and decides whether a command may run without
//! asking the user.

mod allowlist;
mod analyzer;
mod approval;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use allowlist::{BUILTIN_SAFE, TrustStore, TrustTier, normalize_key};
pub use analyzer::{check_command, is_destructive, max_severity};
pub use approval::{Approval, Decision, Grant, approve, decide};

/// How dangerous a matched pattern is. Ordered: `Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classifier finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SafetyWarning {
    pub severity: Severity,
    pub reason: &'static str,
}

impl SafetyWarning {
    pub fn new(severity: Severity, reason: &'static str) -> Self {
        Self { severity, reason }
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}
