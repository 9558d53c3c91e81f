//! Partition a flat command list into batches.
//!
//! Commands with no shell plumbing and no writing verb go together into one
//! leading batch that may run concurrently. Everything else follows as
//! singleton batches, in the original order.

use std::sync::LazyLock;

use regex::Regex;
use tracing::error;

/// Substitution, pipes, chaining, redirection and variable expansion.
static SHELL_PLUMBING: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"\$\(|`[^`]*`|\|\s*\w|&&|;\s*\w|>\s|>>|\$\w")
        .map_err(|e| error!("Invalid grouping pattern: {}", e))
        .ok()
});

/// Verbs that write to a destination, checked among the first three words.
const WRITE_VERBS: &[&str] = &["mv", "cp", "rm", "touch", "mkdir", "rmdir", ">", ">>", "tee"];

/// Whether a command may run beside other parallel-safe commands.
pub fn is_parallel_safe(command: &str) -> bool {
    let plumbing = match SHELL_PLUMBING.as_ref() {
        Some(re) => re.is_match(command),
        None => true,
    };
    if plumbing {
        return false;
    }
    !command
        .split_whitespace()
        .take(3)
        .any(|word| WRITE_VERBS.contains(&word))
}

/// Words that open or close a multi-line shell construct.
const BLOCK_WORDS: &[&str] = &[
    "do", "done", "then", "else", "elif", "fi", "esac", "{", "}", "in",
];

/// Split generated output into one command per line.
///
/// `None` when the text is a single command or a script whose lines only make
/// sense together: continuations, heredocs, open quotes or block keywords.
pub fn split_command_lines(text: &str) -> Option<Vec<String>> {
    let lines: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect();
    if lines.len() < 2 {
        return None;
    }
    let standalone = |line: &String| {
        !line.ends_with('\\')
            && !line.contains("<<")
            && shlex::split(line).is_some_and(|words| {
                words
                    .iter()
                    .all(|word| !BLOCK_WORDS.contains(&word.as_str()))
            })
    };
    lines.iter().all(standalone).then_some(lines)
}

/// Group commands: one parallel batch (if any), then sequential singletons.
pub fn group_independent(commands: &[String]) -> Vec<Vec<String>> {
    let (parallel, sequential): (Vec<&String>, Vec<&String>) =
        commands.iter().partition(|c| is_parallel_safe(c));

    let mut batches = Vec::with_capacity(sequential.len() + 1);
    if !parallel.is_empty() {
        batches.push(parallel.into_iter().cloned().collect());
    }
    batches.extend(sequential.into_iter().map(|c| vec![c.clone()]));
    batches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parallel_safe_detection() {
        assert!(is_parallel_safe("ls -la"));
        assert!(is_parallel_safe("git status"));
        assert!(is_parallel_safe("df -h"));
        assert!(!is_parallel_safe("cat a | grep b"));
        assert!(!is_parallel_safe("echo $(date)"));
        assert!(!is_parallel_safe("echo $HOME"));
        assert!(!is_parallel_safe("make && make install"));
        assert!(!is_parallel_safe("echo hi > out.txt"));
        assert!(!is_parallel_safe("echo hi >> out.txt"));
        assert!(!is_parallel_safe("mkdir out"));
        assert!(!is_parallel_safe("sudo cp a b"));
        assert!(!is_parallel_safe("ls; pwd"));
    }

    #[test]
    fn test_grouping_keeps_sequential_order() {
        let commands = strings(&["ls", "mkdir a", "pwd", "touch a/x", "uname -a"]);
        let batches = group_independent(&commands);
        assert_eq!(
            batches,
            vec![
                strings(&["ls", "pwd", "uname -a"]),
                strings(&["mkdir a"]),
                strings(&["touch a/x"]),
            ]
        );
    }

    #[test]
    fn test_split_command_lines() {
        assert_eq!(
            split_command_lines("pwd\n\n  uname -a \n"),
            Some(strings(&["pwd", "uname -a"]))
        );
        assert_eq!(split_command_lines("ls -la"), None);
        assert_eq!(split_command_lines("ls -la\n"), None);
        assert_eq!(split_command_lines("tar czf out.tgz \\\n  src"), None);
        assert_eq!(split_command_lines("cat <<EOF > a\nhi\nEOF"), None);
        assert_eq!(split_command_lines("for f in *.txt\ndo wc -l $f\ndone"), None);
        assert_eq!(split_command_lines("echo 'one\ntwo'"), None);
    }

    #[test]
    fn test_grouping_without_parallel_batch() {
        let commands = strings(&["rm a", "rm b"]);
        assert_eq!(group_independent(&commands), vec![strings(&["rm a"]), strings(&["rm b"])]);
        assert!(group_independent(&[]).is_empty());
    }
}
