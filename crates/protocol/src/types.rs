//! Core types shared across the protocol

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Method names the server and clients interpret.
///
/// Anything else the agent sends is still persisted and forwarded verbatim.
pub mod methods {
    pub const TURN_STARTED: &str = "turn/started";
    pub const TURN_COMPLETED: &str = "turn/completed";
    pub const TURN_ABORTED: &str = "turn/aborted";
    pub const TURN_INTERRUPTED: &str = "turn/interrupted";
    pub const TURN_FAILED: &str = "turn/failed";
    pub const TURN_DIFF_UPDATED: &str = "turn/diff/updated";
    pub const ITEM_STARTED: &str = "item/started";
    pub const ITEM_COMPLETED: &str = "item/completed";
    pub const AGENT_MESSAGE_DELTA: &str = "item/agentMessage/delta";
    pub const REASONING_TEXT_DELTA: &str = "item/reasoning/textDelta";
    pub const REASONING_SUMMARY_DELTA: &str = "item/reasoning/summaryTextDelta";
    pub const COMMAND_OUTPUT_DELTA: &str = "item/commandExecution/outputDelta";
    pub const FILE_CHANGE_OUTPUT_DELTA: &str = "item/fileChange/outputDelta";
    pub const PLAN_DELTA: &str = "item/plan/delta";
    pub const MCP_TOOL_PROGRESS: &str = "item/mcpToolCall/progress";
    pub const THREAD_COMPACTED: &str = "thread/compacted";
    pub const THREAD_READ: &str = "thread/read";

    /// Server-synthesized working tree diff for a thread.
    pub const DIFF_SNAPSHOT: &str = "thread/diffSnapshot";

    /// True for every method that ends a turn.
    pub fn is_turn_terminal(method: &str) -> bool {
        matches!(
            method,
            TURN_COMPLETED | TURN_ABORTED | TURN_INTERRUPTED | TURN_FAILED
        )
    }
}

/// An unsolicited message from the agent process (or synthesized by the server).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl Notification {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }
}

/// A persisted notification.
///
/// `id` is the store-wide sequence id; `created_at` is unix epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadEvent {
    pub id: i64,
    pub thread_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_id: Option<String>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    pub created_at: i64,
}

impl ThreadEvent {
    pub fn notification(&self) -> Notification {
        Notification::new(self.method.clone(), self.params.clone())
    }
}

/// Who a transcript entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// What a transcript entry renders as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntryKind {
    Message,
    ChangeSummary,
    Activity,
}

/// Per-file line counts for a change summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChangeSummary {
    pub path: String,
    pub additions: usize,
    pub deletions: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub snippets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSummary {
    pub files_changed: usize,
    pub files: Vec<FileChangeSummary>,
}

impl ChangeSummary {
    pub fn new(files: Vec<FileChangeSummary>) -> Self {
        Self {
            files_changed: files.len(),
            files,
        }
    }

    pub fn total_additions(&self) -> usize {
        self.files.iter().map(|f| f.additions).sum()
    }

    pub fn total_deletions(&self) -> usize {
        self.files.iter().map(|f| f.deletions).sum()
    }
}

/// Semantic label for a piece of agent activity ("Ran command", "Web search (2)")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityDescriptor {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ActivityDescriptor {
    pub fn new(title: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            title: title.into(),
            detail,
        }
    }
}

/// One display-ready line of the reconciled transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEntry {
    pub id: String,
    pub role: Role,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_id: Option<String>,
    pub kind: EntryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<ChangeSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<ActivityDescriptor>,
    #[serde(default)]
    pub streaming: bool,
}

impl TranscriptEntry {
    pub fn message(id: impl Into<String>, role: Role, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            text: text.into(),
            images: Vec::new(),
            created_at_ms: None,
            turn_id: None,
            kind: EntryKind::Message,
            summary: None,
            activity: None,
            streaming: false,
        }
    }

    pub fn activity(id: impl Into<String>, activity: ActivityDescriptor) -> Self {
        Self {
            text: activity.detail.clone().unwrap_or_default(),
            kind: EntryKind::Activity,
            activity: Some(activity),
            ..Self::message(id, Role::System, String::new())
        }
    }

    pub fn change_summary(id: impl Into<String>, summary: ChangeSummary) -> Self {
        Self {
            kind: EntryKind::ChangeSummary,
            summary: Some(summary),
            ..Self::message(id, Role::System, String::new())
        }
    }

    pub fn with_turn(mut self, turn_id: Option<String>) -> Self {
        self.turn_id = turn_id;
        self
    }

    pub fn with_created_at(mut self, created_at_ms: Option<i64>) -> Self {
        self.created_at_ms = created_at_ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn thread_event_uses_camel_case_wire_names() {
        let event = ThreadEvent {
            id: 7,
            thread_id: "thr_1".into(),
            turn_id: Some("turn_1".into()),
            method: methods::TURN_STARTED.into(),
            params: json!({"threadId": "thr_1"}),
            created_at: 1_700_000_000_000,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["threadId"], "thr_1");
        assert_eq!(value["turnId"], "turn_1");
        assert_eq!(value["createdAt"], 1_700_000_000_000_i64);
    }

    #[test]
    fn thread_event_without_turn_omits_field() {
        let event = ThreadEvent {
            id: 1,
            thread_id: "thr_1".into(),
            turn_id: None,
            method: "item/started".into(),
            params: Value::Null,
            created_at: 0,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert!(value.get("turnId").is_none());
    }

    #[test]
    fn terminal_methods_are_recognized() {
        assert!(methods::is_turn_terminal("turn/completed"));
        assert!(methods::is_turn_terminal("turn/interrupted"));
        assert!(!methods::is_turn_terminal("turn/started"));
    }

    #[test]
    fn change_summary_counts_files() {
        let summary = ChangeSummary::new(vec![
            FileChangeSummary {
                path: "a.rs".into(),
                additions: 3,
                deletions: 1,
                diff: None,
                snippets: Vec::new(),
            },
            FileChangeSummary {
                path: "b.rs".into(),
                additions: 0,
                deletions: 2,
                diff: None,
                snippets: Vec::new(),
            },
        ]);
        assert_eq!(summary.files_changed, 2);
        assert_eq!(summary.total_additions(), 3);
        assert_eq!(summary.total_deletions(), 3);
    }
}
