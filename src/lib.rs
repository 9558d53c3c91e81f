//! termpilot - plain-language instructions to shell commands, behind a safety gate.
//!
//! The library is organised around one run of the assistant:
//! - [`ai`] turns an instruction into a command or a multi-step [`plan::Plan`]
//! - [`security`] classifies commands, keeps the trust lists and runs the
//!   approval protocol
//! - [`orchestrator`] drives approved commands, batches and dependency waves
//!   through the [`shell`] executor
//! - [`audit`] appends every execution and plan to JSON-lines logs
//! - [`context`], [`plugins`], [`config`], [`ui`] and [`utils`] support the above
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use termpilot::context::SessionContext;
//! use termpilot::orchestrator::{Orchestrator, OrchestratorOptions};
//! use termpilot::plan::{Plan, Step};
//! use termpilot::plugins::PluginRegistry;
//! use termpilot::security::TrustStore;
//! use termpilot::shell::Executor;
//! use termpilot::ui::TerminalPrompter;
//!
//! #[tokio::main]
//! async fn main() {
//!     let executor = Executor::new(None, Arc::new(PluginRegistry::with_builtins()), None);
//!     let mut orchestrator = Orchestrator::new(
//!         executor,
//!         TrustStore::in_memory(),
//!         SessionContext::capture(),
//!         TerminalPrompter::new(),
//!         OrchestratorOptions::default(),
//!     );
//!
//!     let mut plan = Plan::new(
//!         "make a build dir and list it",
//!         vec![
//!             Step::new(1, "mkdir -p build", "create build dir", []),
//!             Step::new(2, "ls build", "list it", [1]),
//!         ],
//!     );
//!     orchestrator.execute_plan(&mut plan).await;
//! }
//! ```

pub mod ai;
pub mod app;
pub mod audit;
pub mod config;
pub mod context;
pub mod orchestrator;
pub mod plan;
pub mod plugins;
pub mod security;
pub mod shell;
pub mod ui;
pub mod utils;

pub use app::{App, Args};
pub use context::SessionContext;
pub use orchestrator::{Orchestrator, OrchestratorOptions};
pub use plan::{Plan, PlanStatus, Step, StepStatus};
