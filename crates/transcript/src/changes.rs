//! Change summaries from diff text and file-change items.

use serde_json::Value;
use threadline_protocol::{ChangeSummary, FileChangeSummary};

use crate::diff::{count_changes, looks_like_diff, parse_unified_diff};

const MAX_SNIPPETS: usize = 3;
const MAX_SNIPPET_CHARS: usize = 120;

/// Summarize unified diff text. `None` when no file section is recoverable.
pub fn summary_from_diff(text: &str) -> Option<ChangeSummary> {
    let files: Vec<FileChangeSummary> = parse_unified_diff(text)
        .into_iter()
        .map(|file| FileChangeSummary {
            snippets: snippets(&file.raw),
            path: file.path,
            additions: file.additions,
            deletions: file.deletions,
            diff: Some(file.raw),
        })
        .collect();
    (!files.is_empty()).then(|| ChangeSummary::new(files))
}

/// Summarize a `fileChange` item's `changes` list.
///
/// Added or deleted files that carry raw content instead of a diff get a
/// synthesized `+`/`-` body, so the counts always match the diff text shown.
pub fn summary_from_file_change(item: &Value) -> Option<ChangeSummary> {
    let changes = item.get("changes")?;
    let entries: Vec<(String, &Value)> = match changes {
        Value::Array(list) => list
            .iter()
            .filter_map(|c| Some((c.get("path")?.as_str()?.to_string(), c)))
            .collect(),
        // Older shape: `{ "<path>": { "add": {...} } }`
        Value::Object(map) => map.iter().map(|(path, c)| (path.clone(), c)).collect(),
        _ => return None,
    };

    let files: Vec<FileChangeSummary> = entries
        .into_iter()
        .map(|(path, change)| file_summary(path, change))
        .collect();
    (!files.is_empty()).then(|| ChangeSummary::new(files))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChangeKind {
    Add,
    Delete,
    Update,
}

fn change_kind(change: &Value) -> (ChangeKind, Option<&Value>) {
    let kind = change.get("kind");
    let name = kind
        .and_then(|k| k.as_str().or_else(|| k.get("type").and_then(Value::as_str)))
        .map(str::to_ascii_lowercase);
    match name.as_deref() {
        Some("add") => return (ChangeKind::Add, None),
        Some("delete") => return (ChangeKind::Delete, None),
        Some("update") => return (ChangeKind::Update, None),
        _ => {}
    }
    for (key, kind) in [
        ("add", ChangeKind::Add),
        ("delete", ChangeKind::Delete),
        ("update", ChangeKind::Update),
    ] {
        if let Some(body) = change.get(key) {
            return (kind, Some(body));
        }
    }
    (ChangeKind::Update, None)
}

fn prefix_lines(content: &str, prefix: char) -> String {
    content
        .lines()
        .map(|line| format!("{prefix}{line}\n"))
        .collect()
}

fn file_summary(path: String, change: &Value) -> FileChangeSummary {
    let (kind, body) = change_kind(change);
    let source = body.unwrap_or(change);
    let text = ["diff", "unified_diff", "unifiedDiff", "content"]
        .iter()
        .find_map(|k| source.get(*k).and_then(Value::as_str))
        .unwrap_or_default();

    let diff = match kind {
        ChangeKind::Add if !looks_like_diff(text) => prefix_lines(text, '+'),
        ChangeKind::Delete if !looks_like_diff(text) => prefix_lines(text, '-'),
        _ => text.to_string(),
    };
    let (additions, deletions) = count_changes(&diff);

    FileChangeSummary {
        snippets: snippets(&diff),
        path,
        additions,
        deletions,
        diff: (!diff.is_empty()).then_some(diff),
    }
}

/// First few added lines, trimmed and clipped.
fn snippets(diff: &str) -> Vec<String> {
    diff.lines()
        .filter(|l| l.starts_with('+') && !l.starts_with("+++ "))
        .map(|l| l[1..].trim())
        .filter(|l| !l.is_empty())
        .take(MAX_SNIPPETS)
        .map(|l| {
            if l.chars().count() > MAX_SNIPPET_CHARS {
                let clipped: String = l.chars().take(MAX_SNIPPET_CHARS).collect();
                format!("{clipped}…")
            } else {
                l.to_string()
            }
        })
        .collect()
}
