//! Natural-language command generation.
//!
//! Generation is a black box to the rest of the crate: a [`CommandGenerator`]
//! turns an instruction plus session context into either one command or a
//! list of plan steps, and may come back empty. [`GeneratorChain`] asks each
//! configured generator in turn and tags the first answer with its provider.

mod client;
mod fallback;
pub mod parser;
pub mod prompt;

use std::sync::LazyLock;

use anyhow::Result;
use futures::future::BoxFuture;
use regex::Regex;
use tracing::{debug, error, warn};

use crate::context::SessionContext;
use crate::plan::{Plan, Step};

pub use client::OpenAiGenerator;
pub use fallback::KeywordGenerator;

pub trait CommandGenerator: Send + Sync {
    /// Provider tag recorded with generated plans, e.g. `remote/gpt-4o-mini`.
    fn name(&self) -> String;

    fn generate_command<'a>(
        &'a self,
        instruction: &'a str,
        ctx: &'a SessionContext,
    ) -> BoxFuture<'a, Result<Option<String>>>;

    fn generate_plan<'a>(
        &'a self,
        instruction: &'a str,
        ctx: &'a SessionContext,
    ) -> BoxFuture<'a, Result<Option<Vec<Step>>>>;
}

/// A generated value and the provider that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated<T> {
    pub value: T,
    pub provider: String,
}

/// Generators tried in order until one answers.
#[derive(Default)]
pub struct GeneratorChain {
    generators: Vec<Box<dyn CommandGenerator>>,
}

impl GeneratorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remote model when an API key is configured, then the keyword fallback.
    pub fn from_env(model: &str) -> Self {
        let mut chain = Self::new();
        match OpenAiGenerator::from_env(model) {
            Some(remote) => chain.push(remote),
            None => debug!("OPENAI_API_KEY not set, remote generation disabled"),
        }
        chain.push(KeywordGenerator);
        chain
    }

    pub fn push(&mut self, generator: impl CommandGenerator + 'static) {
        self.generators.push(Box::new(generator));
    }

    pub fn names(&self) -> Vec<String> {
        self.generators.iter().map(|g| g.name()).collect()
    }

    pub async fn generate_command(
        &self,
        instruction: &str,
        ctx: &SessionContext,
    ) -> Option<Generated<String>> {
        for generator in &self.generators {
            match generator.generate_command(instruction, ctx).await {
                Ok(Some(command)) if !command.trim().is_empty() => {
                    return Some(Generated {
                        value: command.trim().to_string(),
                        provider: generator.name(),
                    });
                }
                Ok(_) => debug!("{} produced no command", generator.name()),
                Err(e) => warn!("{} failed to generate a command: {:#}", generator.name(), e),
            }
        }
        None
    }

    pub async fn generate_plan(&self, instruction: &str, ctx: &SessionContext) -> Option<Plan> {
        for generator in &self.generators {
            match generator.generate_plan(instruction, ctx).await {
                Ok(Some(steps)) if !steps.is_empty() => {
                    return Some(Plan::new(instruction, steps).with_provider(generator.name()));
                }
                Ok(_) => debug!("{} produced no plan", generator.name()),
                Err(e) => warn!("{} failed to generate a plan: {:#}", generator.name(), e),
            }
        }
        None
    }
}

static MULTISTEP_MARKERS: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:and\s+then|then\s+\w|first\s+\w|after\s+that|next\s+\w|finally\s+\w|also\s+\w|plus\s+\w|additionally|set\s*up\b|deploy\b|migrate\b|scaffold\b|bootstrap\b|create.*and.*install|install.*and.*configure)\b",
    )
    .map_err(|e| error!("Invalid multi-step pattern: {}", e))
    .ok()
});

const ACTION_VERBS: &[&str] = &[
    "create", "make", "set", "setup", "install", "configure", "build", "deploy", "push", "commit",
    "add", "remove", "delete", "update", "copy", "move", "rename", "download", "upload", "start",
    "stop", "init", "initialize", "run", "execute", "open", "close",
];

/// Heuristic: does this instruction probably need several commands?
pub fn is_multistep(instruction: &str) -> bool {
    if MULTISTEP_MARKERS
        .as_ref()
        .is_some_and(|re| re.is_match(instruction))
    {
        return true;
    }

    let lower = instruction.to_lowercase();
    let words: Vec<&str> = lower.split_whitespace().collect();
    let verbs = words.iter().filter(|w| ACTION_VERBS.contains(*w)).count();
    if verbs >= 2 {
        return true;
    }

    instruction.matches(',').count() >= 2 && words.len() > 8
}
