//! Bundled plugins.

use anyhow::{Context, Result};
use tracing::{debug, info};

use super::{PostHook, PreHook, SlashCommand, SlashEnv};
use crate::context::SessionContext;
use crate::shell::ExecOutcome;

/// Default number of entries shown by `/history`.
const HISTORY_DEFAULT: usize = 10;

/// Traces every execution to the log file.
pub struct TraceHook;

impl PreHook for TraceHook {
    fn name(&self) -> &str {
        "trace"
    }

    fn pre_execute(&self, command: &str, ctx: &SessionContext) -> Result<Option<String>> {
        debug!("exec start: {} (cwd {})", command, ctx.cwd().display());
        Ok(None)
    }
}

impl PostHook for TraceHook {
    fn name(&self) -> &str {
        "trace"
    }

    fn post_execute(&self, outcome: &ExecOutcome, _ctx: &SessionContext) -> Result<()> {
        info!(
            "exec done: {} exit={:?} success={} {}ms",
            outcome.command,
            outcome.exit_code,
            outcome.success,
            outcome.duration.as_millis()
        );
        Ok(())
    }
}

pub struct SysinfoCommand;

impl SlashCommand for SysinfoCommand {
    fn name(&self) -> &str {
        "sysinfo"
    }

    fn description(&self) -> &str {
        "Show system and session information"
    }

    fn run(&self, _args: &str, env: &SlashEnv<'_>) -> Result<String> {
        let snap = env.session.snapshot();
        let mut out = format!(
            "OS:    {} ({})\nShell: {}\nUser:  {}\nCWD:   {}\n",
            snap.os, snap.arch, snap.shell, snap.user, snap.cwd
        );
        for (key, value) in &env.session.env.vars {
            out.push_str(&format!("{key}={value}\n"));
        }
        Ok(out)
    }
}

pub struct HistoryCommand;

impl SlashCommand for HistoryCommand {
    fn name(&self) -> &str {
        "history"
    }

    fn description(&self) -> &str {
        "Show recently executed commands: /history [N]"
    }

    fn run(&self, args: &str, env: &SlashEnv<'_>) -> Result<String> {
        let limit = if args.is_empty() {
            HISTORY_DEFAULT
        } else {
            args.parse::<usize>()
                .with_context(|| format!("invalid count '{}'", args))?
        };
        let entries = env.audit.read_commands(Some(limit));
        if entries.is_empty() {
            return Ok("No command history yet.".to_string());
        }
        let mut out = String::new();
        for entry in entries {
            let mark = match entry.success {
                Some(true) => "ok",
                Some(false) => "FAIL",
                None => "-",
            };
            out.push_str(&format!("[{}] {:4} {}\n", entry.timestamp, mark, entry.command));
        }
        Ok(out)
    }
}

pub struct HelpCommand;

impl SlashCommand for HelpCommand {
    fn name(&self) -> &str {
        "help"
    }

    fn description(&self) -> &str {
        "List slash commands"
    }

    fn run(&self, _args: &str, env: &SlashEnv<'_>) -> Result<String> {
        let mut out = String::from("Slash commands:\n");
        for (name, description) in &env.commands {
            out.push_str(&format!("  /{:<10} {}\n", name, description));
        }
        out.push_str("Type an instruction to run it, or 'exit' to leave.\n");
        Ok(out)
    }
}
