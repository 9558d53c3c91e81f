//! Drives approved work through the executor.
//!
//! The orchestrator is the single coordinator of a run. It owns the trust
//! store and the session context, so both are only ever mutated here, on the
//! coordinating task. Commands that need a prompt are approved one at a time
//! in declaration order; commands that pass the gate without asking go to a
//! bounded pool of concurrent executions.


use std::collections::BTreeSet;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use tracing::{debug, info};

use crate::context::SessionContext;
use crate::plan::{Plan, PlanStatus, StepStatus, WaveMode, resolve_waves_with};
use crate::security::{Approval, Decision, TrustStore, approve, check_command, decide};
use crate::shell::{ExecOutcome, ExecRequest, Executor, OutputMode, group_independent};
use crate::ui::{Prompter, render};

/// Upper bound on concurrently running commands.
pub const MAX_WORKERS: usize = 4;

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorOptions {
    /// Show what would run, spawn nothing, log nothing.
    pub dry_run: bool,
    /// Skip non-critical confirmations.
    pub auto_yes: bool,
    pub wave_mode: WaveMode,
    pub max_workers: usize,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            auto_yes: false,
            wave_mode: WaveMode::default(),
            max_workers: MAX_WORKERS,
        }
    }
}

/// Result of one single-command run.
#[derive(Debug, Clone)]
pub enum CommandResult {
    Executed(ExecOutcome),
    Cancelled,
    DryRun,
    Denied(String),
}

impl CommandResult {
    pub fn succeeded(&self) -> bool {
        matches!(self, CommandResult::Executed(o) if o.success)
    }
}

/// Tally of a flat batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Declined, denied, or skipped by dry-run.
    pub not_run: usize,
}

impl BatchReport {
    fn record(&mut self, outcome: &ExecOutcome) {
        if outcome.success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }
}

pub struct Orchestrator<P: Prompter> {
    executor: Executor,
    trust: TrustStore,
    ctx: SessionContext,
    prompter: P,
    options: OrchestratorOptions,
}

impl<P: Prompter> Orchestrator<P> {
    pub fn new(
        executor: Executor,
        trust: TrustStore,
        ctx: SessionContext,
        prompter: P,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            executor,
            trust,
            ctx,
            prompter,
            options,
        }
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub fn trust(&self) -> &TrustStore {
        &self.trust
    }

    pub fn trust_mut(&mut self) -> &mut TrustStore {
        &mut self.trust
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn prompter(&self) -> &P {
        &self.prompter
    }

    pub fn prompter_mut(&mut self) -> &mut P {
        &mut self.prompter
    }

    /// Preview, approve and run one command live.
    pub async fn execute_command(&mut self, command: &str, instruction: &str) -> CommandResult {
        let warnings = check_command(command);
        render::command_preview(command, &warnings);

        if self.options.dry_run {
            render::dry_run_notice("command");
            return CommandResult::DryRun;
        }

        match approve(command, &mut self.trust, &mut self.prompter, self.options.auto_yes) {
            Approval::Execute(grant) => {
                debug!("Running '{}' ({:?})", command, grant);
                render::running();
                let outcome = self.run_live(command, instruction, None).await;
                CommandResult::Executed(outcome)
            }
            Approval::Cancel => CommandResult::Cancelled,
            Approval::Deny { reason } => CommandResult::Denied(reason),
        }
    }

    /// Run a flat list of commands, parallelizing the independent ones.
    pub async fn execute_batch(&mut self, commands: &[String], instruction: &str) -> BatchReport {
        let commands: Vec<String> = commands
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        let batches = group_independent(&commands);
        render::batch_overview(&batches);

        let mut report = BatchReport {
            total: commands.len(),
            ..BatchReport::default()
        };
        if self.options.dry_run {
            render::dry_run_notice("batch");
            report.not_run = report.total;
            return report;
        }

        for batch in &batches {
            let (gated, pooled): (Vec<&String>, Vec<&String>) =
                batch.iter().partition(|c| self.needs_prompt(c));

            for command in gated {
                render::batch_command(command);
                match self.run_gated(command, instruction, None).await {
                    Some(outcome) => report.record(&outcome),
                    None => report.not_run += 1,
                }
            }

            match pooled.as_slice() {
                [] => {}
                [command] => {
                    let outcome = self.run_live(command, instruction, None).await;
                    report.record(&outcome);
                }
                many => {
                    let jobs: Vec<(String, String)> = many
                        .iter()
                        .map(|c| ((*c).clone(), "⟶".to_string()))
                        .collect();
                    for outcome in self.run_parallel(&jobs, instruction).await {
                        report.record(&outcome);
                    }
                }
            }
        }

        render::batch_summary(&report);
        report
    }

    /// Run a plan wave by wave and record it in the process log.
    ///
    /// Steps whose dependencies failed, were skipped or were never approved
    /// are skipped themselves. Returns the final plan status.
    pub async fn execute_plan(&mut self, plan: &mut Plan) -> PlanStatus {
        let resolution = resolve_waves_with(&plan.steps, self.options.wave_mode);
        render::plan_overview(plan, &resolution);

        if self.options.dry_run {
            render::dry_run_notice("plan");
            plan.status = PlanStatus::DryRun;
            return plan.status;
        }
        if !self.options.auto_yes && !self.confirm_plan() {
            render::cancelled();
            plan.status = PlanStatus::Cancelled;
            return plan.status;
        }

        info!(
            "Executing plan {} ({} steps, {} waves)",
            plan.process_id,
            plan.steps.len(),
            resolution.waves.len()
        );
        let started = Instant::now();
        let instruction = plan.instruction.clone();
        let mut failed: BTreeSet<u32> = BTreeSet::new();

        for &i in &resolution.blocked {
            let step = &mut plan.steps[i];
            step.status = StepStatus::Blocked;
            failed.insert(step.id);
            render::step_blocked(step);
        }

        let total = resolution.waves.len();
        for (n, wave) in resolution.waves.iter().enumerate() {
            render::wave_header(n + 1, total, wave.len());

            let mut runnable = Vec::with_capacity(wave.len());
            for &i in wave {
                let step = &mut plan.steps[i];
                if step.depends_on_any(&failed) {
                    step.status = StepStatus::Skipped;
                    failed.insert(step.id);
                    render::step_skipped(step);
                } else {
                    runnable.push(i);
                }
            }

            let (gated, pooled): (Vec<usize>, Vec<usize>) = runnable
                .iter()
                .partition(|&&i| self.needs_prompt(&plan.steps[i].command));

            for &i in &gated {
                let step = &mut plan.steps[i];
                render::step_header(step);
                let command = step.command.clone();
                let label = format!("{}.", step.id);
                step.status = StepStatus::Running;
                match self.run_gated(&command, &instruction, Some(&label)).await {
                    Some(outcome) => step.finish(outcome.success, outcome.exit_code, outcome.duration_ms()),
                    None => {
                        step.status = StepStatus::Skipped;
                        render::step_declined(step);
                    }
                }
            }

            match pooled.as_slice() {
                [] => {}
                [i] => {
                    let step = &mut plan.steps[*i];
                    let command = step.command.clone();
                    let label = format!("{}.", step.id);
                    step.status = StepStatus::Running;
                    let outcome = self.run_live(&command, &instruction, Some(&label)).await;
                    step.finish(outcome.success, outcome.exit_code, outcome.duration_ms());
                }
                many => {
                    let jobs: Vec<(String, String)> = many
                        .iter()
                        .map(|&i| {
                            let step = &mut plan.steps[i];
                            step.status = StepStatus::Running;
                            (step.command.clone(), format!("{}.", step.id))
                        })
                        .collect();
                    let outcomes = self.run_parallel(&jobs, &instruction).await;
                    for (&i, outcome) in many.iter().zip(&outcomes) {
                        plan.steps[i].finish(outcome.success, outcome.exit_code, outcome.duration_ms());
                    }
                }
            }

            for &i in &runnable {
                let step = &plan.steps[i];
                if step.status != StepStatus::Success {
                    failed.insert(step.id);
                }
            }
        }

        plan.total_duration_ms = Some(u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX));
        plan.status = plan.derive_status();
        render::plan_summary(plan);
        if let Some(audit) = self.executor.audit() {
            audit.log_process(plan);
        }
        info!("Plan {} finished: {}", plan.process_id, plan.status);
        plan.status
    }

    /// Whether the gate would stop to ask about this command.
    fn needs_prompt(&self, command: &str) -> bool {
        let warnings = check_command(command);
        let trusted = self.trust.should_auto_execute(command);
        decide(command, &warnings, trusted, self.options.auto_yes) != Decision::AutoExecute
    }

    fn confirm_plan(&mut self) -> bool {
        let answer = self
            .prompter
            .ask(&render::plan_confirm_prompt())
            .map(|a| a.trim().to_lowercase());
        matches!(answer.as_deref(), Some("y") | Some("yes"))
    }

    /// Approve, then run live. `None` if the command was not approved.
    async fn run_gated(
        &mut self,
        command: &str,
        instruction: &str,
        label: Option<&str>,
    ) -> Option<ExecOutcome> {
        let approval = approve(command, &mut self.trust, &mut self.prompter, self.options.auto_yes);
        if !approval.is_execute() {
            return None;
        }
        Some(self.run_live(command, instruction, label).await)
    }

    async fn run_live(&mut self, command: &str, instruction: &str, label: Option<&str>) -> ExecOutcome {
        let req = ExecRequest {
            command,
            instruction,
            mode: OutputMode::Stream,
            label,
        };
        let outcome = self.executor.run(req, &self.ctx).await;
        self.ctx.observe(&outcome.command);
        outcome
    }

    /// Run `(command, label)` jobs concurrently with captured output.
    ///
    /// Outcomes come back in job order.
    async fn run_parallel(&mut self, jobs: &[(String, String)], instruction: &str) -> Vec<ExecOutcome> {
        let workers = jobs.len().min(self.options.max_workers).max(1);
        render::parallel_notice(jobs.len(), workers);

        let executor = &self.executor;
        let ctx = &self.ctx;
        let mut results: Vec<(usize, ExecOutcome)> = stream::iter(jobs.iter().enumerate())
            .map(|(n, (command, label))| async move {
                let req = ExecRequest {
                    command: command.as_str(),
                    instruction,
                    mode: OutputMode::Capture,
                    label: Some(label.as_str()),
                };
                (n, executor.run(req, ctx).await)
            })
            .buffer_unordered(workers)
            .collect()
            .await;
        results.sort_by_key(|(n, _)| *n);

        let outcomes: Vec<ExecOutcome> = results.into_iter().map(|(_, o)| o).collect();
        for outcome in &outcomes {
            self.ctx.observe(&outcome.command);
        }
        outcomes
    }
}
