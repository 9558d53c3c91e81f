//! Multi-step plans and their execution state.
//!
//! A [`Plan`] owns its [`Step`]s exclusively; the orchestrator mutates steps
//! in place as waves run. Both types serialize to the process-log schema.

mod waves;

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use waves::{WaveMode, WaveResolution, resolve_waves, resolve_waves_with};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
    /// Never became ready because a dependency cannot be satisfied.
    Blocked,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Success => "success",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
            StepStatus::Blocked => "blocked",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: u32,
    pub command: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub depends_on: BTreeSet<u32>,
    #[serde(default = "pending")]
    pub status: StepStatus,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

fn pending() -> StepStatus {
    StepStatus::Pending
}

impl Step {
    pub fn new(
        id: u32,
        command: impl Into<String>,
        description: impl Into<String>,
        depends_on: impl IntoIterator<Item = u32>,
    ) -> Self {
        Self {
            id,
            command: command.into(),
            description: description.into(),
            depends_on: depends_on.into_iter().collect(),
            status: StepStatus::Pending,
            exit_code: None,
            duration_ms: None,
        }
    }

    /// Record the result of running this step.
    pub fn finish(&mut self, success: bool, exit_code: Option<i32>, duration_ms: u64) {
        self.status = if success {
            StepStatus::Success
        } else {
            StepStatus::Failed
        };
        self.exit_code = exit_code;
        self.duration_ms = Some(duration_ms);
    }

    pub fn depends_on_any(&self, ids: &BTreeSet<u32>) -> bool {
        self.depends_on.iter().any(|d| ids.contains(d))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Pending,
    Completed,
    Partial,
    Failed,
    Cancelled,
    DryRun,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Pending => "pending",
            PlanStatus::Completed => "completed",
            PlanStatus::Partial => "partial",
            PlanStatus::Failed => "failed",
            PlanStatus::Cancelled => "cancelled",
            PlanStatus::DryRun => "dry_run",
        }
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-status step counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepCounts {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub blocked: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(rename = "id")]
    pub process_id: String,
    pub instruction: String,
    #[serde(default)]
    pub ai_provider: String,
    pub status: PlanStatus,
    #[serde(default)]
    pub total_duration_ms: Option<u64>,
    pub steps: Vec<Step>,
}

impl Plan {
    pub fn new(instruction: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            process_id: new_process_id(),
            instruction: instruction.into(),
            ai_provider: String::new(),
            status: PlanStatus::Pending,
            total_duration_ms: None,
            steps,
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.ai_provider = provider.into();
        self
    }

    pub fn counts(&self) -> StepCounts {
        let mut counts = StepCounts {
            total: self.steps.len(),
            ..StepCounts::default()
        };
        for step in &self.steps {
            match step.status {
                StepStatus::Success => counts.succeeded += 1,
                StepStatus::Failed => counts.failed += 1,
                StepStatus::Skipped => counts.skipped += 1,
                StepStatus::Blocked => counts.blocked += 1,
                StepStatus::Pending | StepStatus::Running => {}
            }
        }
        counts
    }

    /// Final status once every wave has run.
    ///
    /// `completed` when nothing failed, was skipped or blocked; `failed` when
    /// nothing succeeded; `partial` otherwise.
    pub fn derive_status(&self) -> PlanStatus {
        let counts = self.counts();
        if counts.failed == 0 && counts.skipped == 0 && counts.blocked == 0 {
            PlanStatus::Completed
        } else if counts.succeeded == 0 {
            PlanStatus::Failed
        } else {
            PlanStatus::Partial
        }
    }

    pub fn step(&self, id: u32) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }
}

/// Short random hex identifier for a plan run.
pub fn new_process_id() -> String {
    Uuid::new_v4().simple().to_string().chars().take(12).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan_with(statuses: &[StepStatus]) -> Plan {
        let steps = statuses
            .iter()
            .enumerate()
            .map(|(i, status)| {
                let mut step = Step::new(i as u32 + 1, "true", "", []);
                step.status = *status;
                step
            })
            .collect();
        Plan::new("test", steps)
    }

    #[test]
    fn test_derive_status() {
        use StepStatus::*;
        assert_eq!(plan_with(&[Success, Success]).derive_status(), PlanStatus::Completed);
        assert_eq!(plan_with(&[Success, Failed]).derive_status(), PlanStatus::Partial);
        assert_eq!(plan_with(&[Success, Skipped]).derive_status(), PlanStatus::Partial);
        assert_eq!(plan_with(&[Failed, Skipped]).derive_status(), PlanStatus::Failed);
        assert_eq!(plan_with(&[Success, Blocked]).derive_status(), PlanStatus::Partial);
    }

    #[test]
    fn test_process_id_is_short_hex() {
        let id = new_process_id();
        assert_eq!(id.len(), 12);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, new_process_id());
    }

    #[test]
    fn test_plan_serializes_to_process_log_schema() {
        let mut plan = Plan::new("build it", vec![Step::new(1, "make", "compile", [])])
            .with_provider("remote/gpt-4o-mini");
        plan.status = PlanStatus::DryRun;
        let value = serde_json::to_value(&plan).unwrap();

        assert_eq!(value["id"], plan.process_id.as_str());
        assert_eq!(value["status"], "dry_run");
        assert_eq!(value["total_duration_ms"], serde_json::Value::Null);
        assert_eq!(value["steps"][0]["depends_on"], serde_json::json!([]));
        assert_eq!(value["steps"][0]["status"], "pending");
        assert_eq!(value["steps"][0]["exit_code"], serde_json::Value::Null);
    }

    #[test]
    fn test_step_finish() {
        let mut step = Step::new(3, "false", "", [1, 2]);
        step.finish(false, Some(1), 12);
        assert_eq!(step.status, StepStatus::Failed);
        assert_eq!(step.exit_code, Some(1));
        assert_eq!(step.duration_ms, Some(12));
        assert!(step.depends_on_any(&BTreeSet::from([2])));
    }
}
