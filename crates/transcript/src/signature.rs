//! Content signatures for de-duplication.
//!
//! Two entries with equal signatures are the same transcript line, whatever
//! their ids or timestamps. The signature is turn, kind, role and normalized
//! content.

use threadline_protocol::{EntryKind, TranscriptEntry};

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn signature(entry: &TranscriptEntry) -> String {
    let content = match entry.kind {
        EntryKind::Message => {
            let mut content = normalize(&entry.text);
            for image in &entry.images {
                content.push_str("\u{1f}img:");
                content.push_str(image);
            }
            content
        }
        EntryKind::Activity => match &entry.activity {
            Some(activity) => format!(
                "{}\u{1f}{}",
                activity.title,
                normalize(activity.detail.as_deref().unwrap_or_default())
            ),
            None => normalize(&entry.text),
        },
        EntryKind::ChangeSummary => entry
            .summary
            .iter()
            .flat_map(|s| s.files.iter())
            .map(|f| format!("{}:+{}/-{}", f.path, f.additions, f.deletions))
            .collect::<Vec<_>>()
            .join(","),
    };

    format!(
        "{}\u{1e}{:?}\u{1e}{:?}\u{1e}{}",
        entry.turn_id.as_deref().unwrap_or_default(),
        entry.kind,
        entry.role,
        content
    )
}

/// Signatures of the committed (non-streaming) entries, in order.
pub fn signature_sequence(entries: &[TranscriptEntry]) -> Vec<String> {
    entries
        .iter()
        .filter(|e| !e.streaming)
        .map(signature)
        .collect()
}
