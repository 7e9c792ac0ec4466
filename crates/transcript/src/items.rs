//! Thread items to transcript entries.
//!
//! Snapshot turns and `item/completed` notifications carry the same item
//! shapes; both go through [`entry_for_item`].

use serde_json::Value;
use threadline_protocol::{ActivityDescriptor, Role, TranscriptEntry};

use crate::activity::{activity_for_item, item_type};
use crate::changes::summary_from_file_change;
use crate::timestamps::own_timestamp;

pub const TITLE_THINKING: &str = "Thinking";

/// Text and image references from a message's `content` list (or its
/// plain `text` field).
fn message_parts(item: &Value) -> (String, Vec<String>) {
    let mut texts = Vec::new();
    let mut images = Vec::new();

    if let Some(text) = item.get("text").and_then(Value::as_str) {
        texts.push(text.to_string());
    }
    if let Some(content) = item.get("content").and_then(Value::as_array) {
        for part in content {
            let kind = part.get("type").and_then(Value::as_str).unwrap_or_default();
            match kind {
                "text" | "input_text" | "output_text" | "inputText" | "outputText" => {
                    if let Some(text) = part.get("text").and_then(Value::as_str) {
                        texts.push(text.to_string());
                    }
                }
                "image" | "input_image" | "inputImage" => {
                    if let Some(url) = ["url", "image_url", "imageUrl"]
                        .iter()
                        .find_map(|k| part.get(*k).and_then(Value::as_str))
                    {
                        images.push(url.to_string());
                    }
                }
                "localImage" | "local_image" => {
                    if let Some(path) = part.get("path").and_then(Value::as_str) {
                        images.push(path.to_string());
                    }
                }
                _ => {}
            }
        }
    }
    (texts.join("\n"), images)
}

fn reasoning_text(item: &Value) -> String {
    let collect = |key: &str| -> Vec<String> {
        match item.get(key) {
            Some(Value::Array(parts)) => parts
                .iter()
                .filter_map(|p| p.as_str().or_else(|| p.get("text").and_then(Value::as_str)))
                .map(str::to_string)
                .collect(),
            Some(Value::String(s)) => vec![s.clone()],
            _ => Vec::new(),
        }
    };
    let summary = collect("summary");
    if summary.is_empty() {
        collect("content").join("\n")
    } else {
        summary.join("\n")
    }
}

/// Convert one item to an entry. `fallback_id` is used when the item has no
/// `id` of its own.
pub fn entry_for_item(
    item: &Value,
    turn_id: Option<&str>,
    fallback_id: &str,
) -> Option<TranscriptEntry> {
    let id = item
        .get("id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(fallback_id)
        .to_string();
    let kind = item_type(item)?;

    let entry = match kind.as_str() {
        "usermessage" | "agentmessage" | "message" => {
            let role = match kind.as_str() {
                "usermessage" => Role::User,
                "agentmessage" => Role::Assistant,
                _ => match item.get("role").and_then(Value::as_str) {
                    Some("user") => Role::User,
                    _ => Role::Assistant,
                },
            };
            let (text, images) = message_parts(item);
            if text.trim().is_empty() && images.is_empty() {
                return None;
            }
            TranscriptEntry {
                images,
                ..TranscriptEntry::message(id, role, text)
            }
        }
        "reasoning" => {
            let text = reasoning_text(item);
            if text.trim().is_empty() {
                return None;
            }
            TranscriptEntry::activity(id, ActivityDescriptor::new(TITLE_THINKING, Some(text)))
        }
        "filechange" => TranscriptEntry::change_summary(id, summary_from_file_change(item)?),
        _ => TranscriptEntry::activity(id, activity_for_item(item)?),
    };

    Some(
        entry
            .with_turn(turn_id.map(str::to_string))
            .with_created_at(own_timestamp(item)),
    )
}
