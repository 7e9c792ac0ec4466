//! Live notification classification.
//!
//! Every notification maps to exactly one [`LiveNotification`]: a turn
//! control marker, a completed message, an extracted summary or activity, a
//! streaming delta for one of the per-kind buffers, or unrecognized.

use serde_json::Value;
use threadline_protocol::{methods, walk, ActivityDescriptor, Notification, Role, TranscriptEntry};

use crate::activity::item_type;
use crate::extract::{extract_from_notification, Extraction};
use crate::items::{entry_for_item, TITLE_THINKING};

/// Streaming buffer a delta accumulates into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Assistant,
    Reasoning,
    CommandOutput,
    Plan,
    FileChangeOutput,
    ToolProgress,
}

impl BufferKind {
    pub fn from_method(method: &str) -> Option<Self> {
        match method {
            methods::AGENT_MESSAGE_DELTA => Some(Self::Assistant),
            methods::REASONING_TEXT_DELTA | methods::REASONING_SUMMARY_DELTA => {
                Some(Self::Reasoning)
            }
            methods::COMMAND_OUTPUT_DELTA => Some(Self::CommandOutput),
            methods::PLAN_DELTA => Some(Self::Plan),
            methods::FILE_CHANGE_OUTPUT_DELTA => Some(Self::FileChangeOutput),
            methods::MCP_TOOL_PROGRESS => Some(Self::ToolProgress),
            _ => None,
        }
    }

    /// Activity title used when a non-assistant buffer is flushed.
    pub fn title(self) -> &'static str {
        match self {
            Self::Assistant => "Assistant",
            Self::Reasoning => TITLE_THINKING,
            Self::CommandOutput => "Command output",
            Self::Plan => "Plan",
            Self::FileChangeOutput => "File change output",
            Self::ToolProgress => "Tool progress",
        }
    }

    /// The committed entry a flushed buffer becomes.
    pub fn flush_entry(self, id: String, text: String) -> TranscriptEntry {
        match self {
            Self::Assistant => TranscriptEntry::message(id, Role::Assistant, text),
            other => TranscriptEntry::activity(id, ActivityDescriptor::new(other.title(), Some(text))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControlMarker {
    TurnStarted { turn_id: Option<String> },
    TurnEnded { turn_id: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiveNotification {
    Control(ControlMarker),
    /// A completed user or assistant message
    Message(TranscriptEntry),
    Extracted {
        extraction: Extraction,
        turn_id: Option<String>,
    },
    Delta {
        kind: BufferKind,
        text: String,
        turn_id: Option<String>,
    },
    Unrecognized,
}

/// Turn start/end marker, if `n` is one.
pub fn control_marker(n: &Notification) -> Option<ControlMarker> {
    let turn_id = walk::turn_id(&n.params).map(str::to_string);
    if n.method == methods::TURN_STARTED {
        Some(ControlMarker::TurnStarted { turn_id })
    } else if methods::is_turn_terminal(&n.method) {
        Some(ControlMarker::TurnEnded { turn_id })
    } else {
        None
    }
}

fn delta_text(params: &Value) -> Option<String> {
    ["delta", "text", "chunk", "message", "output"]
        .iter()
        .find_map(|k| params.get(*k).and_then(Value::as_str))
        .map(str::to_string)
}

pub fn classify(n: &Notification) -> LiveNotification {
    if let Some(marker) = control_marker(n) {
        return LiveNotification::Control(marker);
    }

    let turn_id = walk::turn_id(&n.params).map(str::to_string);

    if let Some(kind) = BufferKind::from_method(&n.method) {
        return match delta_text(&n.params) {
            Some(text) => LiveNotification::Delta {
                kind,
                text,
                turn_id,
            },
            None => LiveNotification::Unrecognized,
        };
    }

    if n.method == methods::ITEM_COMPLETED {
        if let Some(item) = n.params.get("item") {
            let is_message = matches!(
                item_type(item).as_deref(),
                Some("usermessage" | "agentmessage")
            );
            if is_message {
                return entry_for_item(item, turn_id.as_deref(), "live")
                    .map(LiveNotification::Message)
                    .unwrap_or(LiveNotification::Unrecognized);
            }
        }
    }

    match extract_from_notification(n) {
        Extraction::NoMatch => LiveNotification::Unrecognized,
        extraction => LiveNotification::Extracted {
            extraction,
            turn_id,
        },
    }
}
