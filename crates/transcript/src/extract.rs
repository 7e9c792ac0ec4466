//! Log and live notification extractors.
//!
//! One classification per concern, each with an explicit no-match: a
//! notification yields a change summary, an activity, or nothing.

use serde_json::Value;
use threadline_protocol::{methods, ActivityDescriptor, ChangeSummary, Notification};

use crate::activity::{activity_for_item, compaction_activity, item_type};
use crate::changes::{summary_from_diff, summary_from_file_change};

/// Where a change summary came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummarySource {
    /// A completed `fileChange` item
    FileChange,
    /// `turn/diff/updated` from the agent
    TurnDiff,
    /// `thread/diffSnapshot` synthesized by the server
    DiffSnapshot,
}

impl SummarySource {
    /// Whole-turn diffs; a newer one supersedes the previous for the same turn.
    pub fn is_turn_snapshot(self) -> bool {
        matches!(self, SummarySource::TurnDiff | SummarySource::DiffSnapshot)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Change {
        summary: ChangeSummary,
        source: SummarySource,
    },
    Activity(ActivityDescriptor),
    /// Whole-turn diff came back empty: the working tree is clean again.
    TurnDiffCleared { source: SummarySource },
    NoMatch,
}

fn diff_param(params: &Value) -> Option<&str> {
    ["diff", "unifiedDiff", "unified_diff"]
        .iter()
        .find_map(|k| params.get(*k).and_then(Value::as_str))
}

/// Change summary carried by a notification, if any.
pub fn extract_change_summary(n: &Notification) -> Option<(ChangeSummary, SummarySource)> {
    match n.method.as_str() {
        methods::TURN_DIFF_UPDATED => {
            summary_from_diff(diff_param(&n.params)?).map(|s| (s, SummarySource::TurnDiff))
        }
        methods::DIFF_SNAPSHOT => {
            summary_from_diff(diff_param(&n.params)?).map(|s| (s, SummarySource::DiffSnapshot))
        }
        methods::ITEM_COMPLETED => {
            let item = n.params.get("item")?;
            if item_type(item)? != "filechange" {
                return None;
            }
            summary_from_file_change(item).map(|s| (s, SummarySource::FileChange))
        }
        _ => None,
    }
}

/// Activity descriptor carried by a notification, if any.
pub fn extract_activity(n: &Notification) -> Option<ActivityDescriptor> {
    match n.method.as_str() {
        methods::THREAD_COMPACTED => Some(compaction_activity()),
        methods::ITEM_COMPLETED => activity_for_item(n.params.get("item")?),
        _ => None,
    }
}

/// Source of a whole-turn diff notification whose diff text is blank.
fn cleared_turn_diff(n: &Notification) -> Option<SummarySource> {
    let source = match n.method.as_str() {
        methods::TURN_DIFF_UPDATED => SummarySource::TurnDiff,
        methods::DIFF_SNAPSHOT => SummarySource::DiffSnapshot,
        _ => return None,
    };
    diff_param(&n.params)?.trim().is_empty().then_some(source)
}

pub fn extract_from_notification(n: &Notification) -> Extraction {
    if let Some(source) = cleared_turn_diff(n) {
        return Extraction::TurnDiffCleared { source };
    }
    if let Some((summary, source)) = extract_change_summary(n) {
        return Extraction::Change { summary, source };
    }
    match extract_activity(n) {
        Some(activity) => Extraction::Activity(activity),
        None => Extraction::NoMatch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const DIFF: &str = "diff --git a/x b/x\n--- a/x\n+++ b/x\n@@ -1 +1 @@\n-a\n+b\n";

    #[test]
    fn diff_snapshot_yields_change() {
        let n = Notification::new(methods::DIFF_SNAPSHOT, json!({"threadId": "t", "diff": DIFF}));
        match extract_from_notification(&n) {
            Extraction::Change { summary, source } => {
                assert_eq!(source, SummarySource::DiffSnapshot);
                assert_eq!(summary.files[0].path, "x");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn blank_turn_diff_clears() {
        let snapshot = Notification::new(methods::DIFF_SNAPSHOT, json!({"threadId": "t", "diff": ""}));
        let updated = Notification::new(methods::TURN_DIFF_UPDATED, json!({"threadId": "t", "diff": "\n"}));
        assert_eq!(
            extract_from_notification(&snapshot),
            Extraction::TurnDiffCleared {
                source: SummarySource::DiffSnapshot
            }
        );
        assert_eq!(
            extract_from_notification(&updated),
            Extraction::TurnDiffCleared {
                source: SummarySource::TurnDiff
            }
        );
    }

    #[test]
    fn missing_diff_param_does_not_match() {
        let n = Notification::new(methods::DIFF_SNAPSHOT, json!({"threadId": "t"}));
        assert_eq!(extract_from_notification(&n), Extraction::NoMatch);
    }

    #[test]
    fn compaction_yields_activity() {
        let n = Notification::new(methods::THREAD_COMPACTED, json!({"threadId": "t"}));
        assert!(matches!(extract_from_notification(&n), Extraction::Activity(a) if a.title == "Context compacted"));
    }

    #[test]
    fn completed_command_yields_activity() {
        let n = Notification::new(
            methods::ITEM_COMPLETED,
            json!({"threadId": "t", "turnId": "u", "item": {"type": "commandExecution", "command": "make"}}),
        );
        assert!(matches!(extract_from_notification(&n), Extraction::Activity(a) if a.title == "Ran command"));
    }

    #[test]
    fn messages_and_deltas_do_not_match() {
        let message = Notification::new(
            methods::ITEM_COMPLETED,
            json!({"item": {"type": "agentMessage", "text": "hi"}}),
        );
        let delta = Notification::new(methods::AGENT_MESSAGE_DELTA, json!({"delta": "h"}));
        assert_eq!(extract_from_notification(&message), Extraction::NoMatch);
        assert_eq!(extract_from_notification(&delta), Extraction::NoMatch);
    }
}
