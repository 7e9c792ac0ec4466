//! Activity descriptors for agent tool items.
//!
//! Maps a completed item (command execution, web search, tool call, context
//! compaction) to a short title plus optional detail text. Items that are
//! not activity-shaped yield `None`.

use serde_json::Value;
use threadline_protocol::ActivityDescriptor;

use crate::search::{extract_search_queries, has_query_fields};

pub const TITLE_RAN_COMMAND: &str = "Ran command";
pub const TITLE_READ_FILE: &str = "Read file";
pub const TITLE_LISTED_DIRECTORY: &str = "Listed directory";
pub const TITLE_SEARCHED_FILES: &str = "Searched files";
pub const TITLE_CONTEXT_COMPACTED: &str = "Context compacted";
pub const TITLE_WEB_SEARCH: &str = "Web search";
pub const TITLE_USED_TOOL: &str = "Used tool";

const SEARCH_ENGINE_HINTS: &[&str] = &[
    "web_search",
    "websearch",
    "google",
    "bing",
    "brave",
    "duckduckgo",
    "tavily",
    "exa_search",
    "serp",
];

/// The item's `type`, normalized to lower camel case with separators dropped.
pub(crate) fn item_type(item: &Value) -> Option<String> {
    let raw = item.get("type").and_then(Value::as_str)?;
    Some(raw.replace(['_', '-'], "").to_ascii_lowercase())
}

/// Descriptor for an activity-shaped item.
pub fn activity_for_item(item: &Value) -> Option<ActivityDescriptor> {
    match item_type(item)?.as_str() {
        "commandexecution" | "execcommand" | "localshellcall" => Some(command_activity(item)),
        "websearch" | "websearchcall" => Some(web_search_activity(&extract_search_queries(item))),
        "mcptoolcall" | "dynamictoolcall" | "toolcall" | "functioncall" | "customtoolcall" => {
            Some(tool_activity(item))
        }
        "contextcompaction" | "compacted" => Some(compaction_activity()),
        _ => None,
    }
}

pub fn compaction_activity() -> ActivityDescriptor {
    ActivityDescriptor::new(TITLE_CONTEXT_COMPACTED, None)
}

/// "Web search" or "Web search (N)" with the queries as newline-separated detail.
pub fn web_search_activity(queries: &[String]) -> ActivityDescriptor {
    match queries.len() {
        0 => ActivityDescriptor::new(TITLE_WEB_SEARCH, None),
        1 => ActivityDescriptor::new(TITLE_WEB_SEARCH, Some(queries[0].clone())),
        n => ActivityDescriptor::new(format!("{TITLE_WEB_SEARCH} ({n})"), Some(queries.join("\n"))),
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn command_text(item: &Value) -> Option<String> {
    match item.get("command")? {
        Value::String(s) => Some(s.clone()),
        Value::Array(parts) => Some(
            parts
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(" "),
        ),
        _ => None,
    }
}

/// Drop a `bash -lc '...'` style wrapper and surrounding quotes.
pub(crate) fn unwrap_shell(command: &str) -> &str {
    let trimmed = command.trim();
    for shell in ["bash", "zsh", "sh", "/bin/bash", "/bin/zsh", "/bin/sh"] {
        for flag in ["-lc", "-c"] {
            let prefix = format!("{shell} {flag} ");
            if let Some(rest) = trimmed.strip_prefix(&prefix) {
                let rest = rest.trim();
                return rest
                    .strip_prefix('\'')
                    .and_then(|r| r.strip_suffix('\''))
                    .or_else(|| rest.strip_prefix('"').and_then(|r| r.strip_suffix('"')))
                    .unwrap_or(rest);
            }
        }
    }
    trimmed
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommandShape {
    Read,
    List,
    Search,
    Other,
}

fn shape_from_actions(item: &Value) -> Option<(CommandShape, Vec<String>)> {
    let actions = ["commandActions", "command_actions", "parsedCmd", "parsed_cmd"]
        .iter()
        .find_map(|k| item.get(*k).and_then(Value::as_array))?;
    if actions.is_empty() {
        return None;
    }

    let mut shape = None;
    let mut targets = Vec::new();
    for action in actions {
        let kind = match action
            .get("type")
            .and_then(Value::as_str)
            .map(|t| t.replace('_', "").to_ascii_lowercase())
            .as_deref()
        {
            Some("read") => CommandShape::Read,
            Some("listfiles") => CommandShape::List,
            Some("search") => CommandShape::Search,
            _ => CommandShape::Other,
        };
        if shape.is_some_and(|s| s != kind) {
            return Some((CommandShape::Other, Vec::new()));
        }
        shape = Some(kind);

        let target = ["path", "name", "query"]
            .iter()
            .find_map(|k| action.get(*k).and_then(Value::as_str));
        if let Some(target) = target {
            targets.push(target.to_string());
        }
    }
    shape.map(|s| (s, targets))
}

fn shape_from_command(command: &str) -> (CommandShape, Vec<String>) {
    let inner = unwrap_shell(command);
    if inner.contains('|') || inner.contains("&&") || inner.contains(';') {
        return (CommandShape::Other, Vec::new());
    }
    let words: Vec<&str> = inner.split_whitespace().collect();
    let Some(program) = words.first() else {
        return (CommandShape::Other, Vec::new());
    };
    let operands: Vec<String> = words[1..]
        .iter()
        .filter(|w| !w.starts_with('-'))
        .map(|w| w.trim_matches(|c| c == '\'' || c == '"').to_string())
        .collect();

    match *program {
        "cat" | "head" | "tail" | "less" | "nl" | "bat" => (CommandShape::Read, operands),
        "sed" if words.contains(&"-n") => (
            CommandShape::Read,
            operands.last().cloned().into_iter().collect(),
        ),
        "ls" | "tree" => (CommandShape::List, operands),
        "rg" | "grep" => (CommandShape::Search, operands.into_iter().take(1).collect()),
        _ => (CommandShape::Other, Vec::new()),
    }
}

fn command_activity(item: &Value) -> ActivityDescriptor {
    let command = command_text(item).unwrap_or_default();
    let (shape, targets) =
        shape_from_actions(item).unwrap_or_else(|| shape_from_command(&command));
    let detail = |targets: Vec<String>| {
        if targets.is_empty() {
            Some(unwrap_shell(&command).to_string()).filter(|s| !s.is_empty())
        } else {
            Some(targets.join("\n"))
        }
    };

    match shape {
        CommandShape::Read => ActivityDescriptor::new(TITLE_READ_FILE, detail(targets)),
        CommandShape::List => ActivityDescriptor::new(TITLE_LISTED_DIRECTORY, detail(targets)),
        CommandShape::Search => ActivityDescriptor::new(TITLE_SEARCHED_FILES, detail(targets)),
        CommandShape::Other => ActivityDescriptor::new(
            TITLE_RAN_COMMAND,
            Some(unwrap_shell(&command).to_string()).filter(|s| !s.is_empty()),
        ),
    }
}

// ---------------------------------------------------------------------------
// Tool calls
// ---------------------------------------------------------------------------

fn is_search_tool_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    SEARCH_ENGINE_HINTS.iter().any(|hint| lower.contains(hint))
        || (lower.contains("search") && lower.contains("web"))
}

fn tool_activity(item: &Value) -> ActivityDescriptor {
    let tool = ["tool", "name", "toolName"]
        .iter()
        .find_map(|k| item.get(*k).and_then(Value::as_str))
        .unwrap_or("tool");
    let server = item.get("server").and_then(Value::as_str);
    let arguments = ["arguments", "input", "args"]
        .iter()
        .find_map(|k| item.get(*k))
        .cloned()
        .unwrap_or(Value::Null);

    let wrapped = serde_json::json!({ "arguments": arguments });
    if is_search_tool_name(tool) || has_query_fields(&wrapped) {
        return web_search_activity(&extract_search_queries(&arguments));
    }

    let label = match server {
        Some(server) if !server.is_empty() => format!("{server}/{tool}"),
        _ => tool.to_string(),
    };
    ActivityDescriptor::new(TITLE_USED_TOOL, Some(label))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_command_is_ran_command() {
        let item = json!({"type": "commandExecution", "command": "bash -lc 'cargo test -p core'"});
        let activity = activity_for_item(&item).unwrap();
        assert_eq!(activity.title, TITLE_RAN_COMMAND);
        assert_eq!(activity.detail.as_deref(), Some("cargo test -p core"));
    }

    #[test]
    fn command_actions_specialize_reads() {
        let item = json!({
            "type": "commandExecution",
            "command": "sed -n 1,80p src/main.rs",
            "commandActions": [{"type": "read", "command": "sed", "name": "main.rs", "path": "src/main.rs"}]
        });
        let activity = activity_for_item(&item).unwrap();
        assert_eq!(activity.title, TITLE_READ_FILE);
        assert_eq!(activity.detail.as_deref(), Some("src/main.rs"));
    }

    #[test]
    fn command_text_fallback_detects_listing() {
        let item = json!({"type": "command_execution", "command": ["bash", "-lc", "ls -la crates"]});
        let activity = activity_for_item(&item).unwrap();
        assert_eq!(activity.title, TITLE_LISTED_DIRECTORY);
        assert_eq!(activity.detail.as_deref(), Some("crates"));
    }

    #[test]
    fn pipelines_stay_generic() {
        let item = json!({"type": "commandExecution", "command": "cat a.txt | wc -l"});
        assert_eq!(activity_for_item(&item).unwrap().title, TITLE_RAN_COMMAND);
    }

    #[test]
    fn web_search_counts_queries() {
        let item = json!({"type": "webSearch", "queries": ["tokio mpsc", "tokio broadcast"]});
        let activity = activity_for_item(&item).unwrap();
        assert_eq!(activity.title, "Web search (2)");
        assert_eq!(activity.detail.as_deref(), Some("tokio mpsc\ntokio broadcast"));
    }

    #[test]
    fn search_shaped_tool_becomes_web_search() {
        let item = json!({
            "type": "mcpToolCall",
            "server": "search",
            "tool": "lookup",
            "arguments": "{\"query\": \"sqlite wal mode\"}"
        });
        let activity = activity_for_item(&item).unwrap();
        assert_eq!(activity.title, TITLE_WEB_SEARCH);
        assert_eq!(activity.detail.as_deref(), Some("sqlite wal mode"));
    }

    #[test]
    fn other_tools_name_server_and_tool() {
        let item = json!({
            "type": "mcpToolCall",
            "server": "github",
            "tool": "create_issue",
            "arguments": {"title": "bug"}
        });
        let activity = activity_for_item(&item).unwrap();
        assert_eq!(activity.title, TITLE_USED_TOOL);
        assert_eq!(activity.detail.as_deref(), Some("github/create_issue"));
    }

    #[test]
    fn compaction_has_fixed_title() {
        let item = json!({"type": "contextCompaction", "id": "c1"});
        assert_eq!(activity_for_item(&item).unwrap().title, TITLE_CONTEXT_COMPACTED);
    }

    #[test]
    fn messages_are_not_activities() {
        assert!(activity_for_item(&json!({"type": "agentMessage", "text": "hi"})).is_none());
    }
}
