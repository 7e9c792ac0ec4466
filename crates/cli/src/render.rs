//! Terminal rendering of transcript entries and raw events

use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Cell, CellAlignment, Table};
use console::style;

use threadline_protocol::{ChangeSummary, EntryKind, Role, ThreadEvent, TranscriptEntry};
use threadline_transcript::diff::{number_lines, DiffLineKind};

#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// Show numbered diff lines under change summaries
    pub diffs: bool,
}

fn indent(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|line| format!("{prefix}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn role_label(role: Role) -> String {
    match role {
        Role::User => style("you").cyan().bold().to_string(),
        Role::Assistant => style("agent").green().bold().to_string(),
        Role::System => style("system").dim().to_string(),
    }
}

fn render_message(entry: &TranscriptEntry) -> String {
    let mut header = role_label(entry.role);
    if entry.streaming {
        header.push_str(&style(" …").dim().to_string());
    }
    let mut out = vec![header];
    if !entry.text.trim().is_empty() {
        out.push(indent(&entry.text, "  "));
    }
    for image in &entry.images {
        out.push(format!("  {} {image}", style("[image]").dim()));
    }
    out.join("\n")
}

fn render_activity(entry: &TranscriptEntry) -> String {
    let title = entry
        .activity
        .as_ref()
        .map(|a| a.title.as_str())
        .unwrap_or("Activity");
    let mut out = format!("{} {}", style("•").yellow(), style(title).yellow());
    if entry.streaming {
        out.push_str(&style(" …").dim().to_string());
    }
    let detail = entry
        .activity
        .as_ref()
        .and_then(|a| a.detail.as_deref())
        .unwrap_or(&entry.text);
    if !detail.trim().is_empty() {
        out.push('\n');
        out.push_str(&style(indent(detail, "    ")).dim().to_string());
    }
    out
}

fn summary_table(summary: &ChangeSummary) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec!["File", "+", "-"]);
    for file in &summary.files {
        table.add_row(vec![
            Cell::new(&file.path),
            Cell::new(format!("+{}", file.additions)).set_alignment(CellAlignment::Right),
            Cell::new(format!("-{}", file.deletions)).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

fn render_diff(text: &str) -> String {
    let number = |n: Option<u32>| n.map(|n| n.to_string()).unwrap_or_default();
    number_lines(text)
        .into_iter()
        .map(|line| {
            let gutter = format!("{:>5} {:>5} ", number(line.old_line), number(line.new_line));
            let body = match line.kind {
                DiffLineKind::Addition => style(line.text).green().to_string(),
                DiffLineKind::Deletion => style(line.text).red().to_string(),
                DiffLineKind::Hunk => style(line.text).cyan().to_string(),
                DiffLineKind::Header => style(line.text).bold().to_string(),
                DiffLineKind::Context | DiffLineKind::Meta => line.text,
            };
            format!("{}{body}", style(gutter).dim())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_change_summary(entry: &TranscriptEntry, opts: RenderOptions) -> String {
    let Some(summary) = &entry.summary else {
        return String::new();
    };
    let mut out = vec![format!(
        "{} {} file(s) changed, {} {}",
        style("Δ").magenta(),
        summary.files_changed,
        style(format!("+{}", summary.total_additions())).green(),
        style(format!("-{}", summary.total_deletions())).red(),
    )];
    out.push(summary_table(summary).to_string());
    if opts.diffs {
        for file in &summary.files {
            if let Some(diff) = file.diff.as_deref().filter(|d| !d.trim().is_empty()) {
                out.push(render_diff(diff));
            }
        }
    }
    out.join("\n")
}

pub fn render_entry(entry: &TranscriptEntry, opts: RenderOptions) -> String {
    match entry.kind {
        EntryKind::Message => render_message(entry),
        EntryKind::Activity => render_activity(entry),
        EntryKind::ChangeSummary => render_change_summary(entry, opts),
    }
}

pub fn render_transcript(entries: &[TranscriptEntry], thinking: bool, opts: RenderOptions) -> String {
    let mut blocks: Vec<String> = entries
        .iter()
        .map(|entry| render_entry(entry, opts))
        .filter(|block| !block.is_empty())
        .collect();
    if thinking {
        blocks.push(style("thinking…").dim().italic().to_string());
    }
    blocks.join("\n\n")
}

/// Raw event listing for `threadline log`.
pub fn events_table(events: &[ThreadEvent]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec!["Seq", "Time", "Turn", "Method"]);
    for event in events {
        let time = chrono::DateTime::from_timestamp_millis(event.created_at)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        table.add_row(vec![
            Cell::new(event.id).set_alignment(CellAlignment::Right),
            Cell::new(time),
            Cell::new(event.turn_id.as_deref().unwrap_or("")),
            Cell::new(&event.method),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use threadline_protocol::{ActivityDescriptor, FileChangeSummary};

    fn plain(text: String) -> String {
        console::strip_ansi_codes(&text).into_owned()
    }

    #[test]
    fn messages_show_role_and_text() {
        let entry = TranscriptEntry::message("a", Role::Assistant, "done\nall good");
        let out = plain(render_entry(&entry, RenderOptions::default()));
        assert_eq!(out, "agent\n  done\n  all good");
    }

    #[test]
    fn activity_shows_title_and_detail() {
        let entry = TranscriptEntry::activity(
            "x",
            ActivityDescriptor::new("Web search (2)", Some("rust\ntokio".into())),
        );
        let out = plain(render_entry(&entry, RenderOptions::default()));
        assert!(out.starts_with("• Web search (2)"));
        assert!(out.contains("    rust\n    tokio"));
    }

    #[test]
    fn change_summary_lists_files_and_optional_diff() {
        let diff = "@@ -1,2 +1,2 @@\n keep\n-old\n+new\n";
        let summary = ChangeSummary::new(vec![FileChangeSummary {
            path: "src/lib.rs".into(),
            additions: 1,
            deletions: 1,
            diff: Some(diff.into()),
            snippets: vec![],
        }]);
        let entry = TranscriptEntry::change_summary("d", summary);

        let compact = plain(render_entry(&entry, RenderOptions::default()));
        assert!(compact.contains("1 file(s) changed, +1 -1"));
        assert!(compact.contains("src/lib.rs"));
        assert!(!compact.contains("keep"));

        let full = plain(render_entry(&entry, RenderOptions { diffs: true }));
        assert!(full.contains("    1     1  keep"));
        assert!(full.contains("    2       -old"));
        assert!(full.contains("          2 +new"));
    }

    #[test]
    fn thinking_indicator_trails_transcript() {
        let entries = vec![TranscriptEntry::message("u", Role::User, "fix bug")];
        let out = plain(render_transcript(&entries, true, RenderOptions::default()));
        assert!(out.ends_with("thinking…"));
        assert!(out.starts_with("you"));
    }

    #[test]
    fn events_table_lists_methods() {
        let events = vec![ThreadEvent {
            id: 3,
            thread_id: "t".into(),
            turn_id: Some("u1".into()),
            method: "turn/completed".into(),
            params: json!({}),
            created_at: 0,
        }];
        let out = events_table(&events).to_string();
        assert!(out.contains("turn/completed"));
        assert!(out.contains("u1"));
    }
}
