//! Terminal user interface.
//!
//! Rendering lives in [`render`]; reading answers from the user goes through
//! the [`Prompter`] trait so the approval protocol can be driven by scripts
//! as well as by a person at a terminal.

mod prompt;
pub mod render;

pub use prompt::{Interrupt, Prompter, ScriptedPrompter, TerminalPrompter};
