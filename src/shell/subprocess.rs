//! Child-process execution of approved commands.
//!
//! The executor is the boundary between the approval layer and the OS: it
//! always returns an [`ExecOutcome`], never an error, whatever happened to
//! the child. Live commands inherit the terminal; commands running beside
//! others capture their output and print it in one piece under the shared
//! [`OutputLock`].

use std::fmt;
use std::future::Future;
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::audit::AuditLog;
use crate::context::SessionContext;
use crate::plugins::PluginRegistry;
use crate::ui::render;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Inherit the terminal; output appears as it is produced.
    Stream,
    /// Collect stdout and stderr, print them once the child exits.
    Capture,
}

/// One command to run.
#[derive(Debug, Clone, Copy)]
pub struct ExecRequest<'a> {
    pub command: &'a str,
    /// The instruction the command was generated from, for the audit log.
    pub instruction: &'a str,
    pub mode: OutputMode,
    /// Prefix for the printed result line, e.g. `[2]` for a plan step.
    pub label: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecError {
    Spawn(String),
    Timeout(Duration),
    Wait(String),
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecError::Spawn(e) => write!(f, "failed to start: {}", e),
            ExecError::Timeout(d) => write!(f, "timed out after {}s", d.as_secs_f64()),
            ExecError::Wait(e) => write!(f, "failed while waiting: {}", e),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecOutcome {
    /// The command actually run, after pre-hooks.
    pub command: String,
    pub exit_code: Option<i32>,
    pub success: bool,
    pub duration: Duration,
    pub error: Option<ExecError>,
    /// Captured output; empty in stream mode.
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutcome {
    pub fn duration_ms(&self) -> u64 {
        u64::try_from(self.duration.as_millis()).unwrap_or(u64::MAX)
    }

    fn failed(command: String, duration: Duration, error: ExecError) -> Self {
        Self {
            command,
            exit_code: None,
            success: false,
            duration,
            error: Some(error),
            stdout: String::new(),
            stderr: String::new(),
        }
    }
}

/// Serializes terminal writes from concurrently finishing commands.
#[derive(Debug, Clone, Default)]
pub struct OutputLock(Arc<Mutex<()>>);

impl OutputLock {
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Debug)]
pub struct Executor {
    timeout: Option<Duration>,
    plugins: Arc<PluginRegistry>,
    audit: Option<AuditLog>,
    output: OutputLock,
    spawned: AtomicUsize,
}

impl Executor {
    pub fn new(timeout: Option<Duration>, plugins: Arc<PluginRegistry>, audit: Option<AuditLog>) -> Self {
        Self {
            timeout,
            plugins,
            audit,
            output: OutputLock::default(),
            spawned: AtomicUsize::new(0),
        }
    }

    pub fn output_lock(&self) -> &OutputLock {
        &self.output
    }

    pub fn audit(&self) -> Option<&AuditLog> {
        self.audit.as_ref()
    }

    /// Number of child processes this executor has tried to start.
    pub fn spawn_count(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }

    /// Run one approved command in the session's working directory.
    ///
    /// Pre-hooks run first and may rewrite the command; post-hooks and the
    /// audit entry see the command that actually ran.
    pub async fn run(&self, req: ExecRequest<'_>, ctx: &SessionContext) -> ExecOutcome {
        let command = self.plugins.run_pre_hooks(req.command, ctx);
        debug!("Executing {:?} in {}: {}", req.mode, ctx.cwd().display(), command);

        let outcome = match req.mode {
            OutputMode::Stream => self.run_streaming(command, ctx).await,
            OutputMode::Capture => self.run_captured(command, ctx).await,
        };

        {
            let _guard = self.output.lock();
            if req.mode == OutputMode::Capture {
                render::captured_output(&outcome.stdout, &outcome.stderr);
            }
            render::exec_result(&outcome, req.label);
        }

        self.plugins.run_post_hooks(&outcome, ctx);
        if let Some(audit) = &self.audit {
            audit.log_command(req.instruction, &outcome.command, ctx.cwd(), Some(outcome.success));
        }
        outcome
    }

    fn shell_command(&self, command: &str, ctx: &SessionContext) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd.current_dir(ctx.cwd());
        cmd.kill_on_drop(true);
        self.spawned.fetch_add(1, Ordering::SeqCst);
        cmd
    }

    /// Await `fut` under the per-command timeout. `None` if it expired.
    async fn bounded<F: Future>(&self, fut: F) -> Option<F::Output> {
        match self.timeout {
            Some(limit) => timeout(limit, fut).await.ok(),
            None => Some(fut.await),
        }
    }

    async fn run_streaming(&self, command: String, ctx: &SessionContext) -> ExecOutcome {
        let mut cmd = self.shell_command(&command, ctx);
        cmd.stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let started = Instant::now();
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to spawn '{}': {}", command, e);
                return ExecOutcome::failed(command, started.elapsed(), ExecError::Spawn(e.to_string()));
            }
        };

        match self.bounded(child.wait()).await {
            Some(Ok(status)) => ExecOutcome {
                exit_code: status.code(),
                success: status.success(),
                duration: started.elapsed(),
                error: None,
                stdout: String::new(),
                stderr: String::new(),
                command,
            },
            Some(Err(e)) => {
                ExecOutcome::failed(command, started.elapsed(), ExecError::Wait(e.to_string()))
            }
            None => {
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill timed-out child: {}", e);
                }
                let limit = self.timeout.unwrap_or_default();
                warn!("Command timed out after {:?}: {}", limit, command);
                ExecOutcome::failed(command, started.elapsed(), ExecError::Timeout(limit))
            }
        }
    }

    async fn run_captured(&self, command: String, ctx: &SessionContext) -> ExecOutcome {
        let mut cmd = self.shell_command(&command, ctx);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let started = Instant::now();
        // dropping the output future on timeout kills the child
        match self.bounded(cmd.output()).await {
            Some(Ok(output)) => ExecOutcome {
                exit_code: output.status.code(),
                success: output.status.success(),
                duration: started.elapsed(),
                error: None,
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                command,
            },
            Some(Err(e)) => {
                warn!("Failed to run '{}': {}", command, e);
                ExecOutcome::failed(command, started.elapsed(), ExecError::Spawn(e.to_string()))
            }
            None => {
                let limit = self.timeout.unwrap_or_default();
                warn!("Command timed out after {:?}: {}", limit, command);
                ExecOutcome::failed(command, started.elapsed(), ExecError::Timeout(limit))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::PreHook;

    fn executor(timeout: Option<Duration>, audit: Option<AuditLog>) -> Executor {
        Executor::new(timeout, Arc::new(PluginRegistry::new()), audit)
    }

    fn capture(command: &str) -> ExecRequest<'_> {
        ExecRequest {
            command,
            instruction: "test",
            mode: OutputMode::Capture,
            label: None,
        }
    }

    #[tokio::test]
    async fn test_success_and_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = SessionContext::at(dir.path());
        let exec = executor(None, None);

        let ok = exec.run(capture("echo hello"), &ctx).await;
        assert!(ok.success);
        assert_eq!(ok.exit_code, Some(0));
        assert_eq!(ok.stdout.trim(), "hello");
        assert!(ok.error.is_none());

        let bad = exec.run(capture("echo oops >&2; exit 3"), &ctx).await;
        assert!(!bad.success);
        assert_eq!(bad.exit_code, Some(3));
        assert_eq!(bad.stderr.trim(), "oops");
        assert_eq!(exec.spawn_count(), 2);
    }

    #[tokio::test]
    async fn test_runs_in_session_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let ctx = SessionContext::at(&root);
        let out = executor(None, None).run(capture("pwd -P"), &ctx).await;
        assert_eq!(out.stdout.trim(), root.display().to_string());
    }

    #[tokio::test]
    async fn test_stream_mode_reports_status() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = SessionContext::at(dir.path());
        let req = ExecRequest {
            command: "exit 7",
            instruction: "",
            mode: OutputMode::Stream,
            label: Some("[1]"),
        };
        let out = executor(None, None).run(req, &ctx).await;
        assert_eq!(out.exit_code, Some(7));
        assert!(!out.success);
        assert!(out.stdout.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = SessionContext::at(dir.path());
        let exec = executor(Some(Duration::from_millis(200)), None);

        for mode in [OutputMode::Capture, OutputMode::Stream] {
            let req = ExecRequest {
                command: "sleep 5",
                instruction: "",
                mode,
                label: None,
            };
            let out = exec.run(req, &ctx).await;
            assert!(!out.success);
            assert_eq!(out.exit_code, None);
            assert_eq!(out.error, Some(ExecError::Timeout(Duration::from_millis(200))));
            assert!(out.duration < Duration::from_secs(4));
        }
    }

    #[tokio::test]
    async fn test_unlaunchable_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = SessionContext::at(dir.path().join("missing"));
        let out = executor(None, None).run(capture("true"), &ctx).await;
        assert!(!out.success);
        assert!(matches!(out.error, Some(ExecError::Spawn(_))));
    }

    struct Rewrite;

    impl PreHook for Rewrite {
        fn name(&self) -> &str {
            "rewrite"
        }

        fn pre_execute(&self, command: &str, _ctx: &SessionContext) -> anyhow::Result<Option<String>> {
            Ok(Some(command.replace("first", "second")))
        }
    }

    #[tokio::test]
    async fn test_audit_records_effective_command() {
        let dir = tempfile::tempdir().unwrap();
        let audit = AuditLog::in_dir(&dir.path().join("state"));
        let mut plugins = PluginRegistry::new();
        plugins.register_pre_hook(Rewrite);
        let exec = Executor::new(None, Arc::new(plugins), Some(audit.clone()));
        let ctx = SessionContext::at(dir.path());

        let out = exec.run(capture("echo first"), &ctx).await;
        assert_eq!(out.stdout.trim(), "second");

        let entries = audit.read_commands(None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].command, "echo second");
        assert_eq!(entries[0].instruction, "test");
        assert_eq!(entries[0].success, Some(true));
    }
}
