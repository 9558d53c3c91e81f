//! Terminal rendering.
//!
//! Everything printed to the user goes through here. Messages keep their
//! meaning without colour: every status carries a glyph or a word, colour
//! only emphasizes it.

use std::time::Duration;

use crossterm::style::{self, Stylize};

use crate::audit::{CommandEntry, ProcessEntry};
use crate::orchestrator::BatchReport;
use crate::plan::{Plan, PlanStatus, Step, StepStatus, WaveResolution};
use crate::security::{SafetyWarning, Severity, TrustStore, check_command};
use crate::shell::{ExecError, ExecOutcome};

const RULE_WIDTH: usize = 52;

/// Enable or disable ANSI colours for the whole process.
pub fn set_color(enabled: bool) {
    style::force_color_output(enabled);
}

pub fn format_duration(d: Duration) -> String {
    if d < Duration::from_secs(1) {
        format!("{}ms", d.as_millis())
    } else {
        format!("{:.1}s", d.as_secs_f64())
    }
}

fn format_ms(ms: Option<u64>) -> String {
    ms.map(|ms| format_duration(Duration::from_millis(ms)))
        .unwrap_or_else(|| "-".to_string())
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

fn severity_tag(severity: Severity) -> String {
    let tag = format!("[{}]", severity.as_str().to_uppercase());
    match severity {
        Severity::Critical => tag.red().bold().to_string(),
        Severity::High => tag.red().to_string(),
        Severity::Medium => tag.yellow().to_string(),
    }
}

/// One `[SEVERITY] reason` line per warning.
pub fn format_warnings(warnings: &[SafetyWarning]) -> String {
    warnings
        .iter()
        .map(|w| format!("  ⚠ {} {}", severity_tag(w.severity), w.reason))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn info(message: &str) {
    println!("  {}", message.dim());
}

pub fn error(message: &str) {
    eprintln!("  {} {}", "✗".red(), message);
}

// -- single commands ------------------------------------------------------

pub fn command_preview(command: &str, warnings: &[SafetyWarning]) {
    let border = |s: &str| {
        if warnings.is_empty() {
            s.cyan().to_string()
        } else {
            s.yellow().to_string()
        }
    };
    println!();
    println!("  {}", border("┌─ Command Preview ─────────────────────"));
    for line in command.lines() {
        println!("  {}  {}", border("│"), line.bold());
    }
    println!("  {}", border("└───────────────────────────────────────"));
    if !warnings.is_empty() {
        println!();
        println!("{}", format_warnings(warnings));
    }
}

pub fn dry_run_notice(what: &str) {
    println!();
    println!("  {}", format!("(dry-run mode: {what} will NOT be executed)").cyan());
}

pub fn auto_approved() {
    println!("  {}", "(auto-approved)".dim());
}

pub fn denied(reason: &str) {
    println!("  {} {}", "✗ Refused:".red(), reason);
}

pub fn critical_notice() {
    println!();
    println!("  {}", "This command is critically dangerous.".red().bold());
}

pub fn confirm_word_prompt(word: &str) -> String {
    format!("  Type '{}' to run it anyway: ", word.bold())
}

pub fn cancelled() {
    println!("  {}", "Cancelled.".dim());
}

pub fn prompt_options(has_warnings: bool) {
    println!();
    if has_warnings {
        println!("  {}", "Review the warnings above before running.".yellow());
    }
    println!(
        "  {} execute   {} always allow   {} allow this session   {} cancel",
        "y".bold(),
        "a".bold(),
        "s".bold(),
        "N".bold()
    );
}

pub fn run_prompt() -> String {
    format!("  {} [y/a/s/N] ", "Run?".bold())
}

pub fn trust_added(key: &str, permanent: bool) {
    if permanent {
        println!("  {} Added '{}' to the permanent allow list", "✓".green(), key);
    } else {
        println!("  {} Allowed '{}' for this session", "✓".green(), key);
    }
}

pub fn running() {
    println!();
    println!("  {}", "Running…".dim());
    println!();
}

pub fn captured_output(stdout: &str, stderr: &str) {
    if !stdout.is_empty() {
        print!("{}", stdout);
        if !stdout.ends_with('\n') {
            println!();
        }
    }
    if !stderr.is_empty() {
        eprint!("{}", stderr);
        if !stderr.ends_with('\n') {
            eprintln!();
        }
    }
}

/// Result line for one execution. `label` marks plan steps and batch members.
pub fn exec_result(outcome: &ExecOutcome, label: Option<&str>) {
    let glyph = if outcome.success {
        "✓".green()
    } else {
        "✗".red()
    };
    match label {
        Some(label) => {
            let detail = match &outcome.error {
                Some(e) => format!(" ({}, {})", e, format_duration(outcome.duration)),
                None if outcome.success => format!(" ({})", format_duration(outcome.duration)),
                None => format!(
                    " (exit {}, {})",
                    exit_text(outcome.exit_code),
                    format_duration(outcome.duration)
                ),
            };
            println!("    {} {}", glyph, format!("{} {}{}", label, outcome.command, detail).dim());
        }
        None => {
            println!();
            let text = match &outcome.error {
                Some(ExecError::Timeout(d)) => {
                    format!("Command timed out after {}", format_duration(*d))
                }
                Some(e) => format!("Execution error: {}", e),
                None if outcome.success => format!(
                    "Command completed (exit code 0, {})",
                    format_duration(outcome.duration)
                ),
                None => format!("Command failed (exit code {})", exit_text(outcome.exit_code)),
            };
            if outcome.success {
                println!("  {} {}", glyph, text.green());
            } else {
                println!("  {} {}", glyph, text.red());
            }
        }
    }
}

fn exit_text(code: Option<i32>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| "signal".to_string())
}

// -- plans ------------------------------------------------------------------

pub fn plan_overview(plan: &Plan, resolution: &WaveResolution) {
    let bar = |s: &str| s.magenta().to_string();
    let provider = if plan.ai_provider.is_empty() {
        "unknown"
    } else {
        plan.ai_provider.as_str()
    };
    let waves = resolution.waves.len();

    println!();
    println!("  {}", bar(&format!("╭─ Execution Plan {}", "─".repeat(RULE_WIDTH - 19))));
    println!("  {}  {}", bar("│"), format!("\"{}\"", plan.instruction).bold());
    println!(
        "  {}  {}",
        bar("│"),
        format!(
            "{} • {} • {}",
            plural(plan.steps.len(), "step"),
            plural(waves, "wave"),
            provider
        )
        .dim()
    );
    println!("  {}", bar(&format!("├{}", "─".repeat(RULE_WIDTH))));

    for (n, wave) in resolution.waves.iter().enumerate() {
        let label = if wave.len() > 1 {
            format!("Wave {} (parallel)", n + 1)
        } else {
            format!("Wave {}", n + 1)
        };
        println!("  {}  {}", bar("│"), label.bold());
        for &i in wave {
            step_overview(&plan.steps[i], &bar);
        }
    }
    if !resolution.blocked.is_empty() {
        println!(
            "  {}  {}",
            bar("│"),
            "Blocked (unsatisfiable dependencies)".red().bold()
        );
        for &i in &resolution.blocked {
            step_overview(&plan.steps[i], &bar);
        }
    }
    println!("  {}", bar(&format!("╰{}", "─".repeat(RULE_WIDTH))));
}

fn step_overview(step: &Step, bar: &dyn Fn(&str) -> String) {
    println!("  {}    {} {}", bar("│"), format!("{}.", step.id).dim(), step.command);
    let deps = if step.depends_on.is_empty() {
        String::new()
    } else {
        let ids: Vec<String> = step.depends_on.iter().map(u32::to_string).collect();
        format!(" (after: {})", ids.join(", "))
    };
    if !step.description.is_empty() || !deps.is_empty() {
        println!("  {}       {}", bar("│"), format!("{}{}", step.description, deps).dim());
    }
    for w in check_command(&step.command) {
        println!("  {}       ⚠ {} {}", bar("│"), severity_tag(w.severity), w.reason);
    }
}

pub fn plan_confirm_prompt() -> String {
    format!("\n  {} [y/N] ", "Execute plan?".bold())
}

pub fn wave_header(n: usize, total: usize, size: usize) {
    let label = if size > 1 {
        format!("Wave {n}/{total} (parallel)")
    } else {
        format!("Wave {n}/{total}")
    };
    println!();
    println!("  {}", format!("▸ {label}").bold());
}

pub fn step_header(step: &Step) {
    println!("    {} {}", format!("{}.", step.id).bold(), step.command);
}

pub fn batch_command(command: &str) {
    println!();
    println!("  {} {}", "⟶".dim(), command.bold());
}

pub fn step_skipped(step: &Step) {
    println!(
        "    {} {}",
        "⊘".yellow(),
        format!("{}. {} (skipped: dependency failed)", step.id, step.command).dim()
    );
}

pub fn step_declined(step: &Step) {
    println!(
        "    {} {}",
        "⊘".yellow(),
        format!("{}. {} (not approved)", step.id, step.command).dim()
    );
}

pub fn step_blocked(step: &Step) {
    println!(
        "    {} {}",
        "⊘".red(),
        format!("{}. {} (blocked: dependency can never complete)", step.id, step.command).dim()
    );
}

pub fn parallel_notice(count: usize, workers: usize) {
    println!(
        "  {}",
        format!("Running {count} independent commands in parallel ({workers} workers)…").dim()
    );
}

pub fn plan_summary(plan: &Plan) {
    let counts = plan.counts();
    let elapsed = format_ms(plan.total_duration_ms);
    let line = format!(
        "Plan {}: {}/{} steps succeeded ({})",
        plan.status, counts.succeeded, counts.total, elapsed
    );
    println!();
    println!("  {}", "═".repeat(RULE_WIDTH));
    match plan.status {
        PlanStatus::Completed => println!("  {}", line.green()),
        PlanStatus::Partial => println!("  {}", line.yellow()),
        _ => println!("  {}", line.red()),
    }
    if counts.skipped > 0 {
        println!("  {}", format!("{} skipped (dependency failed)", plural(counts.skipped, "step")).dim());
    }
    if counts.blocked > 0 {
        println!("  {}", format!("{} blocked (unsatisfiable dependency)", plural(counts.blocked, "step")).dim());
    }
    println!("  {}", "═".repeat(RULE_WIDTH));
}

// -- flat batches -------------------------------------------------------------

pub fn batch_overview(batches: &[Vec<String>]) {
    println!();
    for (n, batch) in batches.iter().enumerate() {
        let label = if batch.len() > 1 {
            format!("Batch {} (parallel)", n + 1)
        } else {
            format!("Batch {}", n + 1)
        };
        println!("  {}", label.bold());
        for command in batch {
            println!("    {} {}", "⟶".dim(), command);
            let warnings = check_command(command);
            if !warnings.is_empty() {
                println!("{}", format_warnings(&warnings));
            }
        }
    }
}

pub fn batch_summary(report: &BatchReport) {
    let line = format!(
        "{}/{} commands succeeded",
        report.succeeded,
        report.total
    );
    println!();
    if report.succeeded == report.total {
        println!("  {}", line.green());
    } else {
        println!("  {}", line.yellow());
    }
    if report.not_run > 0 {
        println!("  {}", format!("{} not run", plural(report.not_run, "command")).dim());
    }
}

// -- history ------------------------------------------------------------------

pub fn command_history(entries: &[CommandEntry]) {
    if entries.is_empty() {
        info("No command history yet.");
        return;
    }
    for entry in entries {
        let mark = match entry.success {
            Some(true) => "✓".green(),
            Some(false) => "✗".red(),
            None => "·".dim(),
        };
        println!("  {} {} {}", mark, entry.timestamp.as_str().dim(), entry.command);
        if !entry.instruction.is_empty() {
            println!("      {}", format!("{} (in {})", entry.instruction, entry.cwd).dim());
        }
    }
}

pub fn process_history(entries: &[ProcessEntry]) {
    if entries.is_empty() {
        info("No plans recorded yet.");
        return;
    }
    for entry in entries {
        let plan = &entry.plan;
        let counts = plan.counts();
        println!(
            "  {} {} {} {}",
            plan.process_id.as_str().bold(),
            entry.timestamp.as_str().dim(),
            plan.status,
            format!("{}/{} ok, {}", counts.succeeded, counts.total, format_ms(plan.total_duration_ms)).dim()
        );
        println!("      \"{}\"", plan.instruction);
        for step in &plan.steps {
            let glyph = match step.status {
                StepStatus::Success => "✓".green(),
                StepStatus::Failed => "✗".red(),
                StepStatus::Skipped | StepStatus::Blocked => "⊘".yellow(),
                StepStatus::Pending | StepStatus::Running => "·".dim(),
            };
            println!("      {} {}. {}", glyph, step.id, step.command);
        }
    }
}

pub fn trust_lists(trust: &TrustStore) {
    println!("  {}", "Permanently allowed:".bold());
    let permanent = trust.permanent_list();
    if permanent.is_empty() {
        println!("    {}", "(none)".dim());
    }
    for key in permanent {
        println!("    {}", key);
    }

    let session = trust.session_list();
    if !session.is_empty() {
        println!("  {}", "Allowed this session:".bold());
        for key in session {
            println!("    {}", key);
        }
    }

    println!("  {}", "Built-in safe commands:".bold());
    for (key, enabled) in trust.builtin_list() {
        if enabled {
            println!("    {} {}", "✓".green(), key);
        } else {
            println!("    {} {}", "✗".red(), format!("{key} (disabled)").dim());
        }
    }
}
