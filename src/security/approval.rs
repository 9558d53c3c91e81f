//! Approval gate that every command passes before it may be executed.
//!
//! The decision combines classifier warnings, the trust tier and the `-y`
//! flag. Interactive answers are read through a [`Prompter`], so the protocol
//! itself never touches stdin.

use tracing::{debug, info};

use super::{SafetyWarning, TrustStore, check_command};
use crate::ui::{Prompter, render};

/// The literal word required to run a command with a critical warning.
pub const CONFIRM_WORD: &str = "execute";

/// What the gate requires before a command may run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Run without asking.
    AutoExecute,
    /// Offer execute-once / always / session / cancel.
    Prompt,
    /// The user must type [`CONFIRM_WORD`]; `-y` does not bypass this.
    ForceConfirm,
    /// Never run.
    Deny { reason: String },
}

/// How an executed command was approved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    Auto,
    Once,
    Always,
    Session,
    Confirmed,
}

/// Terminal outcome of the approval protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Approval {
    Execute(Grant),
    Cancel,
    Deny { reason: String },
}

impl Approval {
    pub fn is_execute(&self) -> bool {
        matches!(self, Approval::Execute(_))
    }
}

/// Decide what the gate requires for a command.
///
/// # Examples
/// ```
/// use termpilot::security::{check_command, decide, Decision};
///
/// assert_eq!(decide("ls -la", &check_command("ls -la"), true, false), Decision::AutoExecute);
/// assert_eq!(decide("rm -rf /", &check_command("rm -rf /"), false, true), Decision::ForceConfirm);
/// ```
pub fn decide(command: &str, warnings: &[SafetyWarning], trusted: bool, auto_yes: bool) -> Decision {
    if command.trim().is_empty() {
        return Decision::Deny {
            reason: "Empty command".to_string(),
        };
    }
    if warnings.is_empty() && (auto_yes || trusted) {
        return Decision::AutoExecute;
    }
    if warnings.iter().any(SafetyWarning::is_critical) {
        return Decision::ForceConfirm;
    }
    if auto_yes {
        return Decision::AutoExecute;
    }
    Decision::Prompt
}

/// Run the full approval protocol for one command.
///
/// On "always allow" or "session allow" the trust store is updated before
/// this returns. End of input counts as cancel.
pub fn approve(
    command: &str,
    trust: &mut TrustStore,
    prompter: &mut dyn Prompter,
    auto_yes: bool,
) -> Approval {
    let warnings = check_command(command);
    let decision = decide(command, &warnings, trust.should_auto_execute(command), auto_yes);
    debug!("Approval decision for '{}': {:?}", command, decision);

    match decision {
        Decision::AutoExecute => {
            render::auto_approved();
            Approval::Execute(Grant::Auto)
        }
        Decision::Deny { reason } => {
            render::denied(&reason);
            Approval::Deny { reason }
        }
        Decision::ForceConfirm => {
            render::critical_notice();
            let answer = prompter.ask(&render::confirm_word_prompt(CONFIRM_WORD));
            match answer {
                Some(a) if a.trim().eq_ignore_ascii_case(CONFIRM_WORD) => {
                    info!("Critical command confirmed: {}", command);
                    Approval::Execute(Grant::Confirmed)
                }
                _ => {
                    render::cancelled();
                    Approval::Cancel
                }
            }
        }
        Decision::Prompt => {
            render::prompt_options(!warnings.is_empty());
            let answer = prompter
                .ask(&render::run_prompt())
                .map(|a| a.trim().to_lowercase());
            match answer.as_deref() {
                Some("y") | Some("yes") => Approval::Execute(Grant::Once),
                Some("a") => {
                    let key = trust.add_permanent(command);
                    render::trust_added(&key, true);
                    Approval::Execute(Grant::Always)
                }
                Some("s") => {
                    let key = trust.add_session(command);
                    render::trust_added(&key, false);
                    Approval::Execute(Grant::Session)
                }
                _ => {
                    render::cancelled();
                    Approval::Cancel
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::Severity;
    use crate::ui::ScriptedPrompter;

    fn warn(severity: Severity) -> Vec<SafetyWarning> {
        vec![SafetyWarning::new(severity, "test")]
    }

    #[test]
    fn test_decide_matrix() {
        assert_eq!(decide("ls", &[], true, false), Decision::AutoExecute);
        assert_eq!(decide("make", &[], false, true), Decision::AutoExecute);
        assert_eq!(decide("make", &[], false, false), Decision::Prompt);
        assert_eq!(decide("rm x", &warn(Severity::Medium), true, false), Decision::Prompt);
        assert_eq!(decide("rm x", &warn(Severity::Medium), false, true), Decision::AutoExecute);
        assert_eq!(decide("dd x", &warn(Severity::Critical), true, true), Decision::ForceConfirm);
        assert!(matches!(decide("   ", &[], true, true), Decision::Deny { .. }));
    }

    #[test]
    fn test_warnings_force_prompt_even_when_trusted() {
        let mut trust = TrustStore::in_memory();
        trust.add_session("rm -rf /tmp/cache");
        assert!(trust.should_auto_execute("rm -rf /tmp/cache"));

        let mut prompter = ScriptedPrompter::new(["n"]);
        let approval = approve("rm -rf /tmp/cache", &mut trust, &mut prompter, false);
        assert_eq!(approval, Approval::Cancel);
        assert_eq!(prompter.asked().len(), 1);
    }

    #[test]
    fn test_auto_yes_skips_medium_prompt() {
        let mut trust = TrustStore::in_memory();
        let mut prompter = ScriptedPrompter::new(Vec::<String>::new());
        let approval = approve("rm notes.txt", &mut trust, &mut prompter, true);
        assert_eq!(approval, Approval::Execute(Grant::Auto));
        assert!(prompter.asked().is_empty());
    }

    #[test]
    fn test_critical_requires_literal_word() {
        let mut trust = TrustStore::in_memory();

        let mut prompter = ScriptedPrompter::new(["y"]);
        assert_eq!(approve("mkfs.ext4 /dev/sdb1", &mut trust, &mut prompter, true), Approval::Cancel);

        let mut prompter = ScriptedPrompter::new(["execute"]);
        assert_eq!(
            approve("mkfs.ext4 /dev/sdb1", &mut trust, &mut prompter, true),
            Approval::Execute(Grant::Confirmed)
        );

        let mut prompter = ScriptedPrompter::new(Vec::<String>::new());
        assert_eq!(approve("mkfs.ext4 /dev/sdb1", &mut trust, &mut prompter, false), Approval::Cancel);
    }

    #[test]
    fn test_prompt_answers_update_trust() {
        let mut trust = TrustStore::in_memory();

        let mut prompter = ScriptedPrompter::new(["s"]);
        assert_eq!(
            approve("make build", &mut trust, &mut prompter, false),
            Approval::Execute(Grant::Session)
        );
        assert_eq!(trust.session_list(), vec!["make build".to_string()]);

        let mut prompter = ScriptedPrompter::new(["A"]);
        assert_eq!(
            approve("cargo test --all", &mut trust, &mut prompter, false),
            Approval::Execute(Grant::Always)
        );
        assert_eq!(trust.permanent_list(), vec!["cargo test".to_string()]);

        // now trusted, no prompt
        let mut prompter = ScriptedPrompter::new(Vec::<String>::new());
        assert!(approve("cargo test", &mut trust, &mut prompter, false).is_execute());
        assert!(prompter.asked().is_empty());
    }

    #[test]
    fn test_default_and_eof_cancel() {
        let mut trust = TrustStore::in_memory();
        let mut prompter = ScriptedPrompter::new([""]);
        assert_eq!(approve("make", &mut trust, &mut prompter, false), Approval::Cancel);
        let mut prompter = ScriptedPrompter::new(Vec::<String>::new());
        assert_eq!(approve("make", &mut trust, &mut prompter, false), Approval::Cancel);
        assert!(trust.session_list().is_empty());
    }
}
