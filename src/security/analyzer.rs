//! Static safety classification of shell commands.
//!
//! A fixed, ordered rule table is matched case-insensitively against the whole
//! command string. Rules that describe increasingly specific forms of the same
//! operation share a family; only the first matching rule of a family fires, so
//! `rm -rf /` reports the root wipe and not also the generic file deletion.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::error;

use super::{SafetyWarning, Severity};

struct RuleSpec {
    pattern: &'static str,
    severity: Severity,
    reason: &'static str,
    family: Option<&'static str>,
}

const fn rule(
    pattern: &'static str,
    severity: Severity,
    reason: &'static str,
    family: Option<&'static str>,
) -> RuleSpec {
    RuleSpec {
        pattern,
        severity,
        reason,
        family,
    }
}

use Severity::{Critical, High, Medium};

const RM: Option<&str> = Some("rm");
const CHMOD: Option<&str> = Some("chmod");
const REMOTE: Option<&str> = Some("remote-exec");

// Declaration order is report order.
const RULE_SPECS: &[RuleSpec] = &[
    // file / directory deletion
    rule(
        r"\brm\s+(-\w*f\w*\s+)*-\w*r\w*\s+/\s*$|\brm\s+(-\w*r\w*\s+)*-\w*f\w*\s+/\s*$",
        Critical,
        "Recursive delete from root: will destroy your system",
        RM,
    ),
    rule(
        r"\brm\s+.*-r.*-f|\brm\s+.*-f.*-r|\brm\s+-rf\b",
        High,
        "Recursive forced delete",
        RM,
    ),
    rule(r"\brm\s+.*-r\b", High, "Recursive delete", RM),
    rule(r"\brm\s", Medium, "File deletion", RM),
    rule(r"\brmdir\b", Medium, "Directory removal", None),
    rule(r"\bfind\b.*-delete\b", High, "Bulk file deletion via find", None),
    rule(r"\bfind\b.*-exec\s+rm\b", High, "Bulk file deletion via find -exec", None),
    rule(r"\bxargs\s+rm\b", High, "Piped mass file deletion", None),
    // disk / filesystem
    rule(r"\bmkfs\b", Critical, "Filesystem format: will erase a disk", None),
    rule(r"\bdd\s", Critical, "Low-level disk write", None),
    rule(r">\s*/dev/sd|>\s*/dev/nvm|>\s*/dev/disk", Critical, "Direct write to block device", None),
    rule(r"\bfdisk\b", Critical, "Disk partitioning", None),
    rule(r"\bparted\b", Critical, "Disk partitioning", None),
    rule(r"\bwipefs\b", Critical, "Wiping filesystem signatures", None),
    rule(
        r"\bdiskutil\s+(erase|partitionDisk|eraseDisk)\b",
        Critical,
        "macOS disk operation: data loss",
        None,
    ),
    rule(r"cat\s+/dev/(urandom|zero)\s*>", Critical, "Overwriting with random/zero data", None),
    // permissions / ownership
    rule(r"\bchmod\s+-R\s+0?777\b", High, "Recursive world-writable permissions", CHMOD),
    rule(r"\bchmod\s+0?777\b", Medium, "World-writable permissions", CHMOD),
    rule(r"\bchmod\s+(-R\s+)?0?000\b", High, "Removing all file permissions", None),
    rule(r"\bchown\s+-R\b", Medium, "Recursive ownership change", None),
    // system control
    rule(r"\bshutdown\b", High, "System shutdown", None),
    rule(r"\breboot\b", High, "System reboot", None),
    rule(r"\bpoweroff\b", High, "System poweroff", None),
    rule(r"\binit\s+0\b", High, "System halt", None),
    rule(r"\bhalt\b", High, "System halt", None),
    rule(
        r"\bsystemctl\s+(stop|disable|mask)\b",
        Medium,
        "Stopping/disabling a system service",
        None,
    ),
    rule(r"\blaunchctl\s+(unload|remove)\b", Medium, "Removing a macOS service", None),
    // process management
    rule(r"\bkill\s+-9\b", Medium, "Force-killing a process", None),
    rule(r"\bkillall\b", Medium, "Killing processes by name", None),
    rule(r"\bpkill\b", Medium, "Killing processes by pattern", None),
    // privilege escalation
    rule(r"\bsudo\b", Medium, "Running with elevated privileges (sudo)", None),
    // moves / overwrites
    rule(r"\bmv\s+/\s", High, "Moving from root filesystem", None),
    rule(r">\s*/etc/", High, "Overwriting system config", None),
    rule(r"\btruncate\b", Medium, "Truncating a file", None),
    rule(r"\bshred\b", High, "Securely erasing a file (unrecoverable)", None),
    // remote script execution
    rule(r"\bcurl\b.*\|\s*sudo\b", Critical, "Piping remote script to sudo", REMOTE),
    rule(r"\bwget\b.*\|\s*sudo\b", Critical, "Piping remote script to sudo", REMOTE),
    rule(r"\bcurl\b.*\|\s*(ba)?sh\b", High, "Piping remote script to shell", REMOTE),
    rule(r"\bwget\b.*\|\s*(ba)?sh\b", High, "Piping remote script to shell", REMOTE),
    // git
    rule(
        r"\bgit\s+push\s+.*--force\b|\bgit\s+push\s+-f\b",
        High,
        "Force-pushing: can destroy remote history",
        None,
    ),
    rule(
        r"\bgit\s+reset\s+--hard\b",
        High,
        "Hard reset: discards uncommitted changes",
        None,
    ),
    rule(r"\bgit\s+clean\s+.*-f", Medium, "Removing untracked files", None),
    // scheduled tasks
    rule(r"\bcrontab\s+-r\b", High, "Deleting all cron jobs", None),
    // firewall
    rule(r"\biptables\s+-F\b", High, "Flushing all firewall rules", None),
    rule(r"\bufw\s+disable\b", High, "Disabling firewall", None),
    // docker cleanup
    rule(r"\bdocker\s+system\s+prune\b", Medium, "Removing unused Docker data", None),
    rule(r"\bdocker\s+rm\b", Medium, "Removing Docker containers", None),
    rule(r"\bdocker\s+rmi\b", Medium, "Removing Docker images", None),
    // sync with deletion
    rule(r"\brsync\b.*--delete\b", Medium, "Syncing with file deletion at destination", None),
    // environment sabotage
    rule(
        r#"\bexport\s+PATH\s*=\s*$|\bexport\s+PATH\s*=\s*['"]?\s*['"]?\s*$"#,
        High,
        "Clearing PATH: will break the shell",
        None,
    ),
    rule(r"\bunset\s+PATH\b", High, "Unsetting PATH: will break the shell", None),
    // fork bomb
    rule(r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:", Critical, "Fork bomb", None),
    // windows
    rule(r"\bformat\s+[a-z]:", Critical, "Disk format (Windows)", None),
    rule(r"\bdel\s+/s\b", High, "Recursive file deletion (Windows)", None),
    rule(r"\brd\s+/s\b", High, "Recursive directory removal (Windows)", None),
];

struct Rule {
    regex: Regex,
    severity: Severity,
    reason: &'static str,
    family: Option<&'static str>,
}

static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    RULE_SPECS
        .iter()
        .filter_map(|spec| match Regex::new(&format!("(?i){}", spec.pattern)) {
            Ok(regex) => Some(Rule {
                regex,
                severity: spec.severity,
                reason: spec.reason,
                family: spec.family,
            }),
            Err(e) => {
                error!("Safety rule '{}' failed to compile: {}", spec.reason, e);
                None
            }
        })
        .collect()
});

/// Classify a command, returning every warning that applies.
///
/// An empty list means no known dangerous pattern was found. Pure: the same
/// input always yields the same list.
pub fn check_command(command: &str) -> Vec<SafetyWarning> {
    let cmd = command.trim();
    let mut warnings = Vec::new();
    let mut seen_reasons: HashSet<&str> = HashSet::new();
    let mut fired_families: HashSet<&str> = HashSet::new();

    for rule in RULES.iter() {
        if let Some(family) = rule.family {
            if fired_families.contains(family) {
                continue;
            }
        }
        if !rule.regex.is_match(cmd) {
            continue;
        }
        if let Some(family) = rule.family {
            fired_families.insert(family);
        }
        if seen_reasons.insert(rule.reason) {
            warnings.push(SafetyWarning::new(rule.severity, rule.reason));
        }
    }

    warnings
}

/// True if any rule fires for the command.
pub fn is_destructive(command: &str) -> bool {
    !check_command(command).is_empty()
}

/// Highest severity among the warnings, if any.
pub fn max_severity(warnings: &[SafetyWarning]) -> Option<Severity> {
    warnings.iter().map(|w| w.severity).max()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reasons(cmd: &str) -> Vec<&'static str> {
        check_command(cmd).into_iter().map(|w| w.reason).collect()
    }

    #[test]
    fn test_all_rules_compile() {
        assert_eq!(RULES.len(), RULE_SPECS.len());
    }

    #[test]
    fn test_safe_commands_have_no_warnings() {
        for cmd in ["ls -la", "git status", "echo hello", "cat README.md", "mkdir out"] {
            assert!(check_command(cmd).is_empty(), "unexpected warning for {cmd}");
        }
    }

    #[test]
    fn test_recursive_forced_delete_is_single_high_warning() {
        let warnings = check_command("rm -rf /tmp/cache");
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].severity, Severity::High);
        assert_eq!(warnings[0].reason, "Recursive forced delete");
    }

    #[test]
    fn test_root_delete_is_critical_only() {
        let warnings = check_command("rm -rf /");
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].severity, Severity::Critical);

        let warnings = check_command("sudo rm -fr /");
        assert_eq!(max_severity(&warnings), Some(Severity::Critical));
        assert!(warnings.iter().any(|w| w.reason.contains("sudo")));
    }

    #[test]
    fn test_plain_rm_is_medium() {
        assert_eq!(reasons("rm notes.txt"), vec!["File deletion"]);
        assert_eq!(reasons("rm -r build"), vec!["Recursive delete"]);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(reasons("SHUTDOWN -h now"), vec!["System shutdown"]);
        assert_eq!(reasons("Git Reset --HARD"), vec!["Hard reset: discards uncommitted changes"]);
    }

    #[test]
    fn test_word_boundaries_avoid_false_positives() {
        assert!(check_command("ls ./firmware").is_empty());
        assert!(check_command("echo shutdowns are rare").is_empty());
        assert!(check_command("cat halting.txt").is_empty());
    }

    #[test]
    fn test_duplicate_reasons_suppressed() {
        // fdisk and parted share a reason
        let warnings = check_command("fdisk -l && parted /dev/sda print");
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].reason, "Disk partitioning");
    }

    #[test]
    fn test_remote_script_family() {
        assert_eq!(
            reasons("curl -fsSL https://x.sh | sudo bash"),
            vec!["Running with elevated privileges (sudo)", "Piping remote script to sudo"]
        );
        assert_eq!(reasons("wget -qO- https://x.sh | sh"), vec!["Piping remote script to shell"]);
    }

    #[test]
    fn test_multiple_rules_in_declaration_order() {
        let warnings = check_command("sudo reboot");
        let got: Vec<&str> = warnings.iter().map(|w| w.reason).collect();
        assert_eq!(got, vec!["System reboot", "Running with elevated privileges (sudo)"]);
    }

    #[test]
    fn test_fork_bomb_and_path_sabotage() {
        assert_eq!(max_severity(&check_command(":(){ :|:& };:")), Some(Severity::Critical));
        assert!(is_destructive("export PATH="));
        assert!(is_destructive("unset PATH"));
        assert!(!is_destructive("export PATH=$PATH:/opt/bin"));
    }

    #[test]
    fn test_check_is_deterministic() {
        for cmd in ["rm -rf /", "dd if=/dev/zero of=/dev/sda", "ls", "chmod -R 777 /srv"] {
            assert_eq!(check_command(cmd), check_command(cmd));
        }
    }
}
