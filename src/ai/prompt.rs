//! Prompt building for model requests.
//!
//! Both prompts embed the session summary so the model can pick commands
//! that exist on the user's OS and shell.

use crate::context::SessionContext;

/// System prompt for single-command generation.
pub const COMMAND_SYSTEM_PROMPT: &str = r#"You are termpilot, a terminal assistant. Turn the user's instruction into a single shell command (a short pipeline is fine) for the system described below.

Rules:
1. Output ONLY the command. No explanation, no markdown fences.
2. Use commands available on the user's OS and shell.
3. Prefer non-destructive approaches.
4. If the instruction is ambiguous, pick the most common interpretation.
5. Never invent flags or options."#;

/// System prompt for plan generation. The JSON shape is what the plan parser reads.
pub const PLAN_SYSTEM_PROMPT: &str = r#"You are termpilot, a terminal assistant that writes execution plans. Break the user's instruction into shell commands and return them as JSON.

Rules:
1. Use the smallest reasonable atomic steps.
2. Each step is ONE shell command; pipelines and && chains inside a step are fine.
3. List in "needs" the ids of steps that must finish first.
4. Steps that can run independently must not depend on each other.
5. Each command must be self-contained: include cd if it must run in a specific directory.
6. Use commands available on the user's OS and shell.
7. Output ONLY JSON, no explanation and no markdown fences.

Format:
{"steps":[{"id":1,"cmd":"...","desc":"...","needs":[]},{"id":2,"cmd":"...","desc":"...","needs":[1]}]}"#;

fn with_context(system: &str, ctx: &SessionContext) -> String {
    format!(
        "{}\n\n--- System Context ---\n{}--- End Context ---",
        system,
        ctx.summary()
    )
}

pub fn command_system_prompt(ctx: &SessionContext) -> String {
    with_context(COMMAND_SYSTEM_PROMPT, ctx)
}

pub fn plan_system_prompt(ctx: &SessionContext) -> String {
    with_context(PLAN_SYSTEM_PROMPT, ctx)
}

pub fn user_prompt(instruction: &str) -> String {
    format!("Instruction: {}", instruction.trim())
}
