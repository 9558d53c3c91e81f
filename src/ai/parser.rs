//! Parsing of raw model output into commands and plan steps.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, error};

use crate::plan::Step;

fn compile(pattern: &str) -> Option<Regex> {
    Regex::new(pattern)
        .map_err(|e| error!("Invalid parser pattern {:?}: {}", pattern, e))
        .ok()
}

/// A whole response wrapped in one shell fence.
static WHOLE_FENCE: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r"(?s)^```(?:bash|sh|zsh)?\s*\n?(.*?)\n?```$"));
/// A JSON fence anywhere in the response.
static JSON_FENCE: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r"(?s)```(?:json)?\s*\n?(.*?)\n?```"));
/// Every shell fence in the response.
static SHELL_FENCES: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r"(?s)```(?:bash|sh|zsh)?\s*\n(.*?)\n```"));
/// `1. cmd` or `1) cmd` list items.
static NUMBERED_LINE: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r"(?m)^\d+[.)]\s*(.+)$"));

/// Reduce a model reply to the bare command.
///
/// Strips a surrounding code fence, a leading `$ ` prompt and comment lines.
pub fn clean_command_output(raw: &str) -> String {
    let mut text = raw.trim();
    if let Some(inner) = WHOLE_FENCE
        .as_ref()
        .and_then(|re| re.captures(text))
        .and_then(|c| c.get(1))
    {
        text = inner.as_str().trim();
    }
    let text = text.strip_prefix("$ ").unwrap_or(text);

    text.lines()
        .filter(|line| !line.starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[derive(Debug, Deserialize)]
struct RawPlan {
    #[serde(default)]
    steps: Vec<RawStep>,
}

#[derive(Debug, Deserialize)]
struct RawStep {
    id: Option<u32>,
    cmd: Option<String>,
    command: Option<String>,
    desc: Option<String>,
    description: Option<String>,
    needs: Option<Vec<u32>>,
    depends_on: Option<Vec<u32>>,
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.trim().is_empty())
}

/// Parse a JSON plan, optionally fenced and surrounded by prose.
///
/// Steps without a command are dropped; a missing id becomes the step's
/// position among the kept steps.
pub fn parse_plan_json(raw: &str) -> Option<Vec<Step>> {
    let mut text = raw.trim();
    if let Some(inner) = JSON_FENCE
        .as_ref()
        .and_then(|re| re.captures(text))
        .and_then(|c| c.get(1))
    {
        text = inner.as_str().trim();
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    let parsed: RawPlan = match serde_json::from_str(&text[start..=end]) {
        Ok(p) => p,
        Err(e) => {
            debug!("Plan JSON did not parse: {}", e);
            return None;
        }
    };

    let mut steps: Vec<Step> = Vec::with_capacity(parsed.steps.len());
    for raw_step in parsed.steps {
        let Some(command) = non_empty(raw_step.cmd).or(non_empty(raw_step.command)) else {
            continue;
        };
        let id = raw_step
            .id
            .unwrap_or_else(|| u32::try_from(steps.len() + 1).unwrap_or(u32::MAX));
        let description = non_empty(raw_step.desc)
            .or(raw_step.description)
            .unwrap_or_default();
        let deps = raw_step
            .needs
            .filter(|n| !n.is_empty())
            .or(raw_step.depends_on)
            .unwrap_or_default();
        steps.push(Step::new(id, command.trim(), description, deps));
    }

    (!steps.is_empty()).then_some(steps)
}

/// Pull commands out of free text: shell fences first, then a numbered list.
pub fn extract_commands_from_text(raw: &str) -> Vec<String> {
    if let Some(re) = SHELL_FENCES.as_ref() {
        let commands: Vec<String> = re
            .captures_iter(raw)
            .filter_map(|c| c.get(1))
            .flat_map(|block| block.as_str().lines())
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect();
        if !commands.is_empty() {
            return commands;
        }
    }

    NUMBERED_LINE
        .as_ref()
        .map(|re| {
            re.captures_iter(raw)
                .filter_map(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Parse a plan reply, falling back to a strictly sequential plan built
/// from whatever commands the text contains.
pub fn parse_plan(raw: &str) -> Option<Vec<Step>> {
    if let Some(steps) = parse_plan_json(raw) {
        return Some(steps);
    }
    let commands = extract_commands_from_text(raw);
    if commands.is_empty() {
        return None;
    }
    debug!("Plan reply was not JSON, using {} extracted commands", commands.len());
    Some(
        commands
            .into_iter()
            .zip(1u32..)
            .map(|(command, id)| Step::new(id, command, "", 1..id))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_clean_command_output() {
        assert_eq!(clean_command_output("ls -la"), "ls -la");
        assert_eq!(clean_command_output("```bash\nls -la\n```"), "ls -la");
        assert_eq!(clean_command_output("$ df -h"), "df -h");
        assert_eq!(clean_command_output("# list files\nls\n"), "ls");
        assert_eq!(clean_command_output("  \n"), "");
    }

    #[test]
    fn test_parse_plan_json_short_keys() {
        let raw = r#"{"steps":[{"id":1,"cmd":"mkdir out","desc":"make dir","needs":[]},
                     {"id":2,"cmd":"cd out && touch a.txt","desc":"add file","needs":[1]}]}"#;
        let steps = parse_plan_json(raw).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].command, "mkdir out");
        assert_eq!(steps[0].description, "make dir");
        assert!(steps[0].depends_on.is_empty());
        assert_eq!(steps[1].depends_on, BTreeSet::from([1]));
    }

    #[test]
    fn test_parse_plan_json_long_keys_in_fence_with_prose() {
        let raw = "Here is the plan:\n```json\n{\"steps\":[{\"command\":\"git init\",\"description\":\"init\"},{\"command\":\"git add .\",\"depends_on\":[1]},{\"command\":\"\"}]}\n```\nGood luck!";
        let steps = parse_plan_json(raw).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].id, 1);
        assert_eq!(steps[1].id, 2);
        assert_eq!(steps[1].command, "git add .");
        assert_eq!(steps[1].depends_on, BTreeSet::from([1]));
    }

    #[test]
    fn test_parse_plan_json_rejects_garbage() {
        assert!(parse_plan_json("no json here").is_none());
        assert!(parse_plan_json("{not json}").is_none());
        assert!(parse_plan_json(r#"{"steps":[]}"#).is_none());
    }

    #[test]
    fn test_text_fallback_builds_sequential_plan() {
        let raw = "1. mkdir site\n2) cd site && npm init -y\n3. npm install express";
        let steps = parse_plan(raw).unwrap();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[1].command, "cd site && npm init -y");
        assert!(steps[0].depends_on.is_empty());
        assert_eq!(steps[2].depends_on, BTreeSet::from([1, 2]));
    }

    #[test]
    fn test_text_fallback_prefers_fences() {
        let raw = "Run:\n```sh\n# setup\nmkdir a\ntouch a/b\n```\n1. ignored";
        assert_eq!(extract_commands_from_text(raw), vec!["mkdir a", "touch a/b"]);
        assert!(parse_plan("nothing useful").is_none());
    }
}
