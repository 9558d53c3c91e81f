//! Command-line surface and top-level dispatch.
//!
//! `Args` is the clap definition; `App` wires configuration, storage, the
//! generator chain and the orchestrator together and runs whichever mode the
//! flags select: a management action, one instruction, or the chat loop.

use std::io::IsTerminal;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser};
use tracing::{debug, info};

use crate::ai::{self, GeneratorChain};
use crate::audit::AuditLog;
use crate::config::{self, Config};
use crate::context::SessionContext;
use crate::orchestrator::{CommandResult, Orchestrator, OrchestratorOptions};
use crate::plan::{PlanStatus, WaveMode};
use crate::plugins::PluginRegistry;
use crate::security::TrustStore;
use crate::shell::{self, Executor};
use crate::ui::{Prompter, TerminalPrompter, render};

#[derive(Debug, Parser)]
#[command(
    name = "termpilot",
    version,
    about = "Turn plain-language instructions into shell commands, with a safety gate"
)]
pub struct Args {
    /// What you want done, in plain language
    #[arg(trailing_var_arg = true)]
    pub instruction: Vec<String>,

    /// Show what would run without running anything
    #[arg(long)]
    pub dry_run: bool,

    /// Skip confirmations (critical commands still ask)
    #[arg(short = 'y', long = "yes")]
    pub yes: bool,

    /// Always break the instruction into a multi-step plan
    #[arg(long, conflicts_with = "single")]
    pub plan: bool,

    /// Always generate a single command
    #[arg(long)]
    pub single: bool,

    /// Interactive mode; `/help` lists slash commands, `exit` leaves
    #[arg(long)]
    pub chat: bool,

    /// Show the last N executed commands
    #[arg(long, value_name = "N", num_args = 0..=1, default_missing_value = "20")]
    pub history: Option<usize>,

    /// Show the last N executed plans
    #[arg(long, value_name = "N", num_args = 0..=1, default_missing_value = "10")]
    pub processes: Option<usize>,

    /// Erase the command history
    #[arg(long)]
    pub clear_history: bool,

    /// Erase the plan history
    #[arg(long)]
    pub clear_processes: bool,

    /// Permanently trust a command (keyed by its first two words)
    #[arg(long, value_name = "CMD")]
    pub allow: Option<String>,

    /// Remove a command from the permanent trust list
    #[arg(long, value_name = "CMD")]
    pub disallow: Option<String>,

    /// Show trusted commands
    #[arg(long)]
    pub list_allowed: bool,

    /// Stop auto-running a built-in safe command
    #[arg(long, value_name = "CMD")]
    pub disable_builtin: Option<String>,

    /// Re-enable a built-in safe command
    #[arg(long, value_name = "CMD")]
    pub enable_builtin: Option<String>,

    /// Model used for remote generation
    #[arg(long, value_name = "NAME")]
    pub model: Option<String>,

    /// Per-command timeout in seconds (0 disables)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<String>,

    /// Run unresolvable plan steps one by one instead of blocking them
    #[arg(long)]
    pub compat_waves: bool,

    /// Disable coloured output
    #[arg(long)]
    pub no_color: bool,
}

/// How to turn an instruction into work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    Auto,
    Plan,
    Single,
}

impl Args {
    /// Environment configuration with the CLI overrides applied.
    pub fn config(&self) -> Result<Config> {
        let mut config = Config::from_env();
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(raw) = &self.timeout {
            config.timeout = config::parse_timeout(raw)
                .map_err(anyhow::Error::msg)
                .context("Invalid --timeout")?;
        }
        if self.compat_waves {
            config.wave_mode = WaveMode::Compat;
        }
        Ok(config)
    }

    pub fn generation_mode(&self) -> GenerationMode {
        if self.plan {
            GenerationMode::Plan
        } else if self.single {
            GenerationMode::Single
        } else {
            GenerationMode::Auto
        }
    }

    pub fn instruction_text(&self) -> Option<String> {
        let text = self.instruction.join(" ");
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }

    fn has_management_action(&self) -> bool {
        self.history.is_some()
            || self.processes.is_some()
            || self.clear_history
            || self.clear_processes
            || self.allow.is_some()
            || self.disallow.is_some()
            || self.list_allowed
            || self.disable_builtin.is_some()
            || self.enable_builtin.is_some()
    }
}

pub struct App<P: Prompter = TerminalPrompter> {
    audit: AuditLog,
    plugins: Arc<PluginRegistry>,
    generators: GeneratorChain,
    orchestrator: Orchestrator<P>,
}

impl App<TerminalPrompter> {
    pub fn new(config: &Config, args: &Args) -> Self {
        let generators = GeneratorChain::from_env(&config.model);
        Self::with_parts(config, args, generators, TerminalPrompter::new())
    }
}

impl<P: Prompter> App<P> {
    pub fn with_parts(config: &Config, args: &Args, generators: GeneratorChain, prompter: P) -> Self {
        let audit = AuditLog::new(config.history_path(), config.processes_path());
        let trust = TrustStore::load(config.allowed_path(), config.disabled_builtins_path());
        let plugins = Arc::new(PluginRegistry::with_builtins());
        let executor = Executor::new(config.timeout, Arc::clone(&plugins), Some(audit.clone()));
        let options = OrchestratorOptions {
            dry_run: args.dry_run,
            auto_yes: args.yes,
            wave_mode: config.wave_mode,
            max_workers: config.max_workers,
        };
        let orchestrator =
            Orchestrator::new(executor, trust, SessionContext::capture(), prompter, options);

        info!(
            "termpilot ready: generators={:?} timeout={:?} workers={} waves={:?}",
            generators.names(),
            config.timeout,
            config.max_workers,
            config.wave_mode
        );
        Self {
            audit,
            plugins,
            generators,
            orchestrator,
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator<P> {
        &self.orchestrator
    }

    /// Dispatch on the parsed flags.
    pub async fn run(&mut self, args: &Args) -> Result<()> {
        let managed = args.has_management_action();
        if managed {
            self.manage(args)?;
        }

        if args.chat {
            return self.chat(args.generation_mode()).await;
        }

        match args.instruction_text() {
            Some(instruction) => {
                self.handle_instruction(&instruction, args.generation_mode())
                    .await;
                Ok(())
            }
            None if managed => Ok(()),
            None => {
                Args::command()
                    .print_help()
                    .context("Failed to print help")?;
                bail!("no instruction given");
            }
        }
    }

    /// History, trust-list and builtin management flags.
    fn manage(&mut self, args: &Args) -> Result<()> {
        if args.clear_history {
            self.audit
                .clear_commands()
                .context("Failed to clear command history")?;
            render::info("Command history cleared.");
        }
        if args.clear_processes {
            self.audit
                .clear_processes()
                .context("Failed to clear plan history")?;
            render::info("Plan history cleared.");
        }
        if let Some(n) = args.history {
            render::command_history(&self.audit.read_commands(Some(n)));
        }
        if let Some(n) = args.processes {
            render::process_history(&self.audit.read_processes(Some(n)));
        }

        let trust = self.orchestrator.trust_mut();
        if let Some(command) = &args.allow {
            if command.trim().is_empty() {
                bail!("nothing to allow");
            }
            let key = trust.add_permanent(command);
            render::trust_added(&key, true);
        }
        if let Some(command) = &args.disallow {
            if trust.remove_permanent(command) {
                render::info(&format!("Removed '{}' from the allow list.", command.trim()));
            } else {
                render::info(&format!("'{}' was not in the allow list.", command.trim()));
            }
        }
        if let Some(command) = &args.disable_builtin {
            if !trust.disable_builtin(command) {
                bail!("'{}' is not a built-in safe command", command.trim());
            }
            render::info(&format!("Built-in '{}' disabled.", command.trim()));
        }
        if let Some(command) = &args.enable_builtin {
            if !trust.enable_builtin(command) {
                bail!("'{}' is not a built-in safe command", command.trim());
            }
            render::info(&format!("Built-in '{}' enabled.", command.trim()));
        }
        if args.list_allowed {
            render::trust_lists(self.orchestrator.trust());
        }
        Ok(())
    }

    /// Generate and run one instruction. Returns whether anything ran to success.
    pub async fn handle_instruction(&mut self, instruction: &str, mode: GenerationMode) -> bool {
        let want_plan = match mode {
            GenerationMode::Plan => true,
            GenerationMode::Single => false,
            GenerationMode::Auto => ai::is_multistep(instruction),
        };

        if want_plan {
            let ctx = self.orchestrator.context();
            match self.generators.generate_plan(instruction, ctx).await {
                Some(mut plan) => {
                    debug!("Plan {} from {}", plan.process_id, plan.ai_provider);
                    let status = self.orchestrator.execute_plan(&mut plan).await;
                    return matches!(status, PlanStatus::Completed | PlanStatus::DryRun);
                }
                None => render::info("Could not build a plan, trying a single command."),
            }
        }

        let ctx = self.orchestrator.context();
        let Some(generated) = self.generators.generate_command(instruction, ctx).await else {
            render::error("Could not generate a command for that instruction.");
            return false;
        };
        debug!("Command from {}: {}", generated.provider, generated.value);

        if let Some(commands) = shell::split_command_lines(&generated.value) {
            let report = self.orchestrator.execute_batch(&commands, instruction).await;
            return report.failed == 0 && (report.succeeded > 0 || report.not_run == report.total);
        }

        match self
            .orchestrator
            .execute_command(&generated.value, instruction)
            .await
        {
            CommandResult::DryRun => true,
            result => result.succeeded(),
        }
    }

    /// Read instructions until `exit`, `quit` or end of input.
    async fn chat(&mut self, mode: GenerationMode) -> Result<()> {
        render::info("termpilot chat. Type /help for commands, exit to leave.");
        loop {
            let prompt = format!("\n{}> ", self.orchestrator.context().cwd().display());
            let Some(line) = self.orchestrator.prompter_mut().ask(&prompt) else {
                break;
            };
            let line = line.trim();
            match line {
                "" => continue,
                "exit" | "quit" => break,
                _ if line.starts_with('/') => self.slash(line),
                _ => {
                    self.handle_instruction(line, mode).await;
                }
            }
        }
        render::info("Bye.");
        Ok(())
    }

    fn slash(&self, line: &str) {
        match self
            .plugins
            .dispatch_slash(line, self.orchestrator.context(), &self.audit)
        {
            Some(Ok(text)) => println!("{}", text),
            Some(Err(e)) => render::error(&format!("{:#}", e)),
            None => render::error("Unknown command. Type /help for the list."),
        }
    }
}

/// Colour only when asked for and writing to a terminal.
pub fn configure_color(args: &Args) {
    render::set_color(!args.no_color && std::io::stdout().is_terminal());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::ScriptedPrompter;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("termpilot").chain(argv.iter().copied())).unwrap()
    }

    fn test_config(dir: &std::path::Path) -> Config {
        Config {
            home: dir.to_path_buf(),
            ..Config::default()
        }
    }

    fn keyword_chain() -> GeneratorChain {
        let mut chain = GeneratorChain::new();
        chain.push(ai::KeywordGenerator);
        chain
    }

    #[test]
    fn test_parse_instruction_and_flags() {
        let args = parse(&["--dry-run", "-y", "list", "all", "files"]);
        assert!(args.dry_run);
        assert!(args.yes);
        assert_eq!(args.instruction_text().as_deref(), Some("list all files"));
        assert_eq!(args.generation_mode(), GenerationMode::Auto);

        let args = parse(&["--history"]);
        assert_eq!(args.history, Some(20));
        assert!(args.instruction_text().is_none());
        let args = parse(&["--processes", "3"]);
        assert_eq!(args.processes, Some(3));

        assert_eq!(parse(&["--plan", "x"]).generation_mode(), GenerationMode::Plan);
        assert_eq!(parse(&["--single", "x"]).generation_mode(), GenerationMode::Single);
        assert!(Args::try_parse_from(["termpilot", "--plan", "--single"]).is_err());
    }

    #[test]
    fn test_cli_overrides_config() {
        let args = parse(&["--model", "gpt-4.1", "--timeout", "5", "--compat-waves"]);
        let config = args.config().unwrap();
        assert_eq!(config.model, "gpt-4.1");
        assert_eq!(config.timeout, Some(std::time::Duration::from_secs(5)));
        assert_eq!(config.wave_mode, WaveMode::Compat);

        assert!(parse(&["--timeout", "later"]).config().is_err());
        assert!(parse(&["--timeout", "1e30"]).config().is_err());
    }

    #[tokio::test]
    async fn test_manage_allow_persists() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let args = parse(&["--allow", "cargo build --release"]);
        let mut app = App::with_parts(&config, &args, keyword_chain(), ScriptedPrompter::new(Vec::<String>::new()));

        app.run(&args).await.unwrap();
        let reloaded = TrustStore::load(config.allowed_path(), config.disabled_builtins_path());
        assert_eq!(reloaded.permanent_list(), vec!["cargo build".to_string()]);

        let args = parse(&["--disable-builtin", "not-a-builtin"]);
        assert!(app.run(&args).await.is_err());
    }

    #[tokio::test]
    async fn test_dry_run_instruction_runs_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let args = parse(&["--dry-run", "list", "files"]);
        let mut app = App::with_parts(&config, &args, keyword_chain(), ScriptedPrompter::new(Vec::<String>::new()));

        assert!(app.handle_instruction("list files", GenerationMode::Auto).await);
        assert_eq!(app.orchestrator().executor().spawn_count(), 0);
        assert!(!config.history_path().exists());
    }

    /// Answers every instruction with the same text.
    struct Canned(&'static str);

    impl ai::CommandGenerator for Canned {
        fn name(&self) -> String {
            "canned".to_string()
        }

        fn generate_command<'a>(
            &'a self,
            _instruction: &'a str,
            _ctx: &'a SessionContext,
        ) -> futures::future::BoxFuture<'a, Result<Option<String>>> {
            Box::pin(async move { Ok(Some(self.0.to_string())) })
        }

        fn generate_plan<'a>(
            &'a self,
            _instruction: &'a str,
            _ctx: &'a SessionContext,
        ) -> futures::future::BoxFuture<'a, Result<Option<Vec<crate::plan::Step>>>> {
            Box::pin(async { Ok(None) })
        }
    }

    #[tokio::test]
    async fn test_multi_line_output_runs_as_batch() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let args = parse(&["--single", "-y", "where", "am", "i"]);
        let mut chain = GeneratorChain::new();
        chain.push(Canned("pwd\nuname -a\n"));
        let mut app = App::with_parts(&config, &args, chain, ScriptedPrompter::new(Vec::<String>::new()));

        assert!(app.handle_instruction("where am i", GenerationMode::Single).await);
        assert_eq!(app.orchestrator().executor().spawn_count(), 2);
        let history = app.audit.read_commands(None);
        assert_eq!(history.len(), 2);
        assert!(app.orchestrator().prompter().asked().is_empty());
    }

    #[tokio::test]
    async fn test_chat_loop_handles_slash_and_exit() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let args = parse(&["--chat", "--dry-run"]);
        let prompter = ScriptedPrompter::new(["/help", "", "/nope", "show git status", "exit", "never read"]);
        let mut app = App::with_parts(&config, &args, keyword_chain(), prompter);

        app.run(&args).await.unwrap();
        let asked = app.orchestrator().prompter().asked();
        assert_eq!(asked.len(), 5);
        assert_eq!(app.orchestrator().executor().spawn_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_instruction_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let args = parse(&[]);
        let mut app = App::with_parts(&config, &args, keyword_chain(), ScriptedPrompter::new(Vec::<String>::new()));
        assert!(app.run(&args).await.is_err());
    }
}
