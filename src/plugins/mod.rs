//! Plugin capabilities: execution hooks and chat slash commands.
//!
//! Plugins are registered explicitly on a [`PluginRegistry`]. Pre-hooks run
//! just before a command is spawned and may rewrite it; post-hooks observe
//! the outcome. A failing hook is logged and skipped, it never blocks the
//! command.

mod builtin;

use anyhow::Result;
use tracing::warn;

use crate::audit::AuditLog;
use crate::context::SessionContext;
use crate::shell::ExecOutcome;

pub use builtin::{HelpCommand, HistoryCommand, SysinfoCommand, TraceHook};

pub trait PreHook: Send + Sync {
    fn name(&self) -> &str;

    /// Return `Some(new_command)` to replace the command text.
    fn pre_execute(&self, command: &str, ctx: &SessionContext) -> Result<Option<String>>;
}

pub trait PostHook: Send + Sync {
    fn name(&self) -> &str;

    fn post_execute(&self, outcome: &ExecOutcome, ctx: &SessionContext) -> Result<()>;
}

/// What a slash command can see when it runs.
pub struct SlashEnv<'a> {
    pub session: &'a SessionContext,
    pub audit: &'a AuditLog,
    /// `(name, description)` of every registered slash command.
    pub commands: Vec<(String, String)>,
}

pub trait SlashCommand: Send + Sync {
    /// Name without the leading slash.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn run(&self, args: &str, env: &SlashEnv<'_>) -> Result<String>;
}

#[derive(Default)]
pub struct PluginRegistry {
    pre_hooks: Vec<Box<dyn PreHook>>,
    post_hooks: Vec<Box<dyn PostHook>>,
    slash_commands: Vec<Box<dyn SlashCommand>>,
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("pre_hooks", &self.pre_hooks.iter().map(|h| h.name()).collect::<Vec<_>>())
            .field("post_hooks", &self.post_hooks.iter().map(|h| h.name()).collect::<Vec<_>>())
            .field("slash_commands", &self.slash_names())
            .finish()
    }
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the bundled hooks and slash commands.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_pre_hook(TraceHook);
        registry.register_post_hook(TraceHook);
        registry.register_slash(SysinfoCommand);
        registry.register_slash(HistoryCommand);
        registry.register_slash(HelpCommand);
        registry
    }

    pub fn register_pre_hook(&mut self, hook: impl PreHook + 'static) {
        self.pre_hooks.push(Box::new(hook));
    }

    pub fn register_post_hook(&mut self, hook: impl PostHook + 'static) {
        self.post_hooks.push(Box::new(hook));
    }

    /// Register a slash command. A later registration with the same name wins.
    pub fn register_slash(&mut self, command: impl SlashCommand + 'static) {
        self.slash_commands.retain(|c| c.name() != command.name());
        self.slash_commands.push(Box::new(command));
    }

    /// Pass the command through every pre-hook in registration order.
    pub fn run_pre_hooks(&self, command: &str, ctx: &SessionContext) -> String {
        let mut current = command.to_string();
        for hook in &self.pre_hooks {
            match hook.pre_execute(&current, ctx) {
                Ok(Some(rewritten)) => current = rewritten,
                Ok(None) => {}
                Err(e) => warn!("Pre-hook '{}' failed: {:#}", hook.name(), e),
            }
        }
        current
    }

    pub fn run_post_hooks(&self, outcome: &ExecOutcome, ctx: &SessionContext) {
        for hook in &self.post_hooks {
            if let Err(e) = hook.post_execute(outcome, ctx) {
                warn!("Post-hook '{}' failed: {:#}", hook.name(), e);
            }
        }
    }

    pub fn slash_names(&self) -> Vec<&str> {
        self.slash_commands.iter().map(|c| c.name()).collect()
    }

    /// Run a `/name args` line. `None` if no such command is registered.
    pub fn dispatch_slash(
        &self,
        line: &str,
        session: &SessionContext,
        audit: &AuditLog,
    ) -> Option<Result<String>> {
        let line = line.trim().strip_prefix('/')?;
        let (name, args) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let command = self.slash_commands.iter().find(|c| c.name() == name)?;
        let env = SlashEnv {
            session,
            audit,
            commands: self
                .slash_commands
                .iter()
                .map(|c| (c.name().to_string(), c.description().to_string()))
                .collect(),
        };
        Some(command.run(args.trim(), &env))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;

    struct Prefix(&'static str);

    impl PreHook for Prefix {
        fn name(&self) -> &str {
            "prefix"
        }

        fn pre_execute(&self, command: &str, _ctx: &SessionContext) -> Result<Option<String>> {
            Ok(Some(format!("{} {}", self.0, command)))
        }
    }

    struct Broken;

    impl PreHook for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn pre_execute(&self, _command: &str, _ctx: &SessionContext) -> Result<Option<String>> {
            bail!("boom")
        }
    }

    #[test]
    fn test_pre_hooks_chain_and_survive_failures() {
        let mut registry = PluginRegistry::new();
        registry.register_pre_hook(Prefix("time"));
        registry.register_pre_hook(Broken);
        registry.register_pre_hook(Prefix("nice"));

        let ctx = SessionContext::at("/");
        assert_eq!(registry.run_pre_hooks("make", &ctx), "nice time make");
    }

    #[test]
    fn test_dispatch_slash() {
        let dir = tempfile::tempdir().unwrap();
        let audit = AuditLog::in_dir(dir.path());
        let ctx = SessionContext::at(dir.path());
        let registry = PluginRegistry::with_builtins();

        let help = registry.dispatch_slash("/help", &ctx, &audit).unwrap().unwrap();
        assert!(help.contains("/sysinfo"));
        assert!(help.contains("/history"));

        let sysinfo = registry.dispatch_slash("/sysinfo", &ctx, &audit).unwrap().unwrap();
        assert!(sysinfo.contains(std::env::consts::OS));

        assert!(registry.dispatch_slash("/nope", &ctx, &audit).is_none());
        assert!(registry.dispatch_slash("not a slash", &ctx, &audit).is_none());
    }

    #[test]
    fn test_history_slash_reads_audit_log() {
        let dir = tempfile::tempdir().unwrap();
        let audit = AuditLog::in_dir(dir.path());
        let ctx = SessionContext::at(dir.path());
        audit.log_command("list", "ls -la", dir.path(), Some(true));
        audit.log_command("fail", "false", dir.path(), Some(false));

        let registry = PluginRegistry::with_builtins();
        let out = registry.dispatch_slash("/history 1", &ctx, &audit).unwrap().unwrap();
        assert!(out.contains("false"));
        assert!(!out.contains("ls -la"));
    }
}
