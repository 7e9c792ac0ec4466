//! Transcript reconciler
//!
//! Builds the displayed transcript from three sources of different
//! authority:
//!
//! 1. the agent's thread snapshot (authoritative messages),
//! 2. the server's persisted event log (change summaries and activities the
//!    snapshot may lack),
//! 3. live notifications (streaming deltas, turn markers, completed items).
//!
//! Entries are de-duplicated by content signature. Inserted entries keep
//! each turn's entries contiguous.

use std::collections::HashSet;

use serde_json::Value;
use threadline_protocol::{walk, EntryKind, Notification, Role, ThreadEvent, TranscriptEntry};
use tracing::debug;

use crate::extract::{extract_from_notification, Extraction};
use crate::items::entry_for_item;
use crate::live::{classify, BufferKind, ControlMarker, LiveNotification};
use crate::signature::{signature, signature_sequence};
use crate::timestamps::own_timestamp;

/// Entry id prefix marking whole-turn diff summaries.
const DIFF_SNAPSHOT_ID_PREFIX: &str = "diff:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Changed,
    Unchanged,
}

impl From<bool> for Applied {
    fn from(changed: bool) -> Self {
        if changed {
            Applied::Changed
        } else {
            Applied::Unchanged
        }
    }
}

// ---------------------------------------------------------------------------
// Ordered, signature-indexed entry list
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct Transcript {
    entries: Vec<TranscriptEntry>,
    signatures: HashSet<String>,
}

impl Transcript {
    fn in_turn(entry: &TranscriptEntry, turn: &str) -> bool {
        entry.turn_id.as_deref() == Some(turn)
    }

    fn insert_at(&mut self, index: usize, entry: TranscriptEntry) -> bool {
        if !self.signatures.insert(signature(&entry)) {
            return false;
        }
        let index = index.min(self.entries.len());
        self.entries.insert(index, entry);
        true
    }

    fn push(&mut self, entry: TranscriptEntry) -> bool {
        let len = self.entries.len();
        self.insert_at(len, entry)
    }

    /// Timestamp rule: before the first later-timestamped entry, else after
    /// the last timestamped one, else at the end. Never lands inside another
    /// turn's contiguous run.
    fn time_position(&self, entry: &TranscriptEntry) -> usize {
        let len = self.entries.len();
        let Some(ts) = entry.created_at_ms else {
            return len;
        };
        let index = match self
            .entries
            .iter()
            .position(|e| e.created_at_ms.is_some_and(|t| t > ts))
        {
            Some(i) => i,
            None => match self.entries.iter().rposition(|e| e.created_at_ms.is_some()) {
                Some(i) => i + 1,
                None => return len,
            },
        };
        self.snap_past_run(index, entry.turn_id.as_deref())
    }

    fn snap_past_run(&self, index: usize, own_turn: Option<&str>) -> usize {
        if index == 0 || index >= self.entries.len() {
            return index;
        }
        let Some(run_turn) = self.entries[index - 1].turn_id.as_deref() else {
            return index;
        };
        if Some(run_turn) == own_turn || !Self::in_turn(&self.entries[index], run_turn) {
            return index;
        }
        let mut i = index;
        while i < self.entries.len() && Self::in_turn(&self.entries[i], run_turn) {
            i += 1;
        }
        i
    }

    /// Change summaries and activities: before the turn's first assistant
    /// message, else after the turn's last entry, else by timestamp.
    fn insert_candidate(&mut self, entry: TranscriptEntry) -> bool {
        let index = entry
            .turn_id
            .as_deref()
            .and_then(|turn| {
                self.entries
                    .iter()
                    .position(|e| {
                        Self::in_turn(e, turn)
                            && e.role == Role::Assistant
                            && e.kind == EntryKind::Message
                    })
                    .or_else(|| {
                        self.entries
                            .iter()
                            .rposition(|e| Self::in_turn(e, turn))
                            .map(|i| i + 1)
                    })
            })
            .unwrap_or_else(|| self.time_position(&entry));
        self.insert_at(index, entry)
    }

    /// Assistant text: after the turn's last entry, else appended.
    fn insert_after_turn(&mut self, entry: TranscriptEntry) -> bool {
        let index = entry
            .turn_id
            .as_deref()
            .and_then(|turn| self.entries.iter().rposition(|e| Self::in_turn(e, turn)))
            .map_or(self.entries.len(), |i| i + 1);
        self.insert_at(index, entry)
    }

    /// User prompts open their turn.
    fn insert_user(&mut self, entry: TranscriptEntry) -> bool {
        let index = entry
            .turn_id
            .as_deref()
            .and_then(|turn| self.entries.iter().position(|e| Self::in_turn(e, turn)))
            .unwrap_or_else(|| self.time_position(&entry));
        self.insert_at(index, entry)
    }

    fn turn_diff_position(&self, turn: &str) -> Option<usize> {
        self.entries.iter().position(|e| {
            Self::in_turn(e, turn)
                && e.kind == EntryKind::ChangeSummary
                && e.id.starts_with(DIFF_SNAPSHOT_ID_PREFIX)
        })
    }

    /// A newer whole-turn diff replaces the previous one for the same turn in
    /// place; otherwise it is inserted like any candidate.
    fn upsert_turn_diff(&mut self, entry: TranscriptEntry) -> bool {
        let sig = signature(&entry);
        if self.signatures.contains(&sig) {
            return false;
        }
        match entry.turn_id.as_deref().and_then(|turn| self.turn_diff_position(turn)) {
            Some(index) => {
                let old = std::mem::replace(&mut self.entries[index], entry);
                self.signatures.remove(&signature(&old));
                self.signatures.insert(sig);
                true
            }
            None => self.insert_candidate(entry),
        }
    }

    /// An empty whole-turn diff removes the turn's diff summary.
    fn clear_turn_diff(&mut self, turn: Option<&str>) -> bool {
        let Some(index) = turn.and_then(|turn| self.turn_diff_position(turn)) else {
            return false;
        };
        let old = self.entries.remove(index);
        self.signatures.remove(&signature(&old));
        true
    }

    fn place_extraction(
        &mut self,
        extraction: Extraction,
        turn_id: Option<String>,
        created_at_ms: Option<i64>,
        fallback_id: String,
    ) -> bool {
        match extraction {
            Extraction::Change { summary, source } if source.is_turn_snapshot() => {
                let id = format!(
                    "{DIFF_SNAPSHOT_ID_PREFIX}{}",
                    turn_id.as_deref().unwrap_or(&fallback_id)
                );
                self.upsert_turn_diff(
                    TranscriptEntry::change_summary(id, summary)
                        .with_turn(turn_id)
                        .with_created_at(created_at_ms),
                )
            }
            Extraction::Change { summary, .. } => self.insert_candidate(
                TranscriptEntry::change_summary(fallback_id, summary)
                    .with_turn(turn_id)
                    .with_created_at(created_at_ms),
            ),
            Extraction::Activity(activity) => self.insert_candidate(
                TranscriptEntry::activity(fallback_id, activity)
                    .with_turn(turn_id)
                    .with_created_at(created_at_ms),
            ),
            Extraction::TurnDiffCleared { .. } => self.clear_turn_diff(turn_id.as_deref()),
            Extraction::NoMatch => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot + log merge
// ---------------------------------------------------------------------------

fn snapshot_turns(snapshot: &Value) -> Vec<&Value> {
    let thread = snapshot.get("thread").unwrap_or(snapshot);
    if let Some(turns) = thread.get("turns").and_then(Value::as_array) {
        return turns.iter().collect();
    }
    if thread.get("items").is_some() {
        return vec![thread];
    }
    Vec::new()
}

/// Within equal timestamps: user prompt, then tool activity, then assistant.
fn role_priority(entry: &TranscriptEntry) -> u8 {
    match entry.role {
        Role::User => 0,
        Role::System => 1,
        Role::Assistant => 2,
    }
}

fn merge_snapshot(transcript: &mut Transcript, snapshot: &Value) {
    struct Staged {
        key: (i64, usize, u8, usize),
        entry: TranscriptEntry,
    }

    let mut staged = Vec::new();
    let mut previous_ts: Option<i64> = None;
    let mut position = 0usize;

    for (ordinal, turn) in snapshot_turns(snapshot).into_iter().enumerate() {
        let turn_id = turn.get("id").and_then(Value::as_str);
        let turn_ts = own_timestamp(turn);
        let items = turn.get("items").and_then(Value::as_array);

        for (index, item) in items.into_iter().flatten().enumerate() {
            position += 1;
            let own = own_timestamp(item);
            let effective = own.or(turn_ts).or(previous_ts).unwrap_or(0);
            previous_ts = Some(effective);

            let fallback_id = format!("{}:{index}", turn_id.unwrap_or("turn"));
            let Some(entry) = entry_for_item(item, turn_id, &fallback_id) else {
                continue;
            };
            let entry = entry.with_created_at(own.or(turn_ts));
            staged.push(Staged {
                key: (effective, ordinal, role_priority(&entry), position),
                entry,
            });
        }
    }

    staged.sort_by_key(|s| s.key);
    for s in staged {
        transcript.push(s.entry);
    }
}

fn replay_log(transcript: &mut Transcript, log: &[ThreadEvent]) {
    let mut events: Vec<&ThreadEvent> = log.iter().collect();
    events.sort_by_key(|e| e.id);

    for event in events {
        let extraction = extract_from_notification(&event.notification());
        if extraction == Extraction::NoMatch {
            continue;
        }
        let turn_id = event
            .turn_id
            .clone()
            .or_else(|| walk::turn_id(&event.params).map(str::to_string));
        transcript.place_extraction(
            extraction,
            turn_id,
            Some(event.created_at),
            format!("log:{}", event.id),
        );
    }
}

fn merge(snapshot: &Value, log: &[ThreadEvent]) -> Transcript {
    let mut transcript = Transcript::default();
    merge_snapshot(&mut transcript, snapshot);
    replay_log(&mut transcript, log);
    transcript
}

/// Merge a snapshot and an event log into an ordered transcript.
///
/// Pure: the same inputs always give the same output.
pub fn merge_transcript(snapshot: &Value, log: &[ThreadEvent]) -> Vec<TranscriptEntry> {
    merge(snapshot, log).entries
}

// ---------------------------------------------------------------------------
// Live reconciler
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct LiveBuffer {
    kind: BufferKind,
    turn_id: Option<String>,
    text: String,
}

/// Stateful transcript for one thread view.
#[derive(Debug, Default)]
pub struct Reconciler {
    committed: Transcript,
    buffers: Vec<LiveBuffer>,
    thinking: bool,
    active_turn: Option<String>,
    live_seq: u64,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace committed entries with a fresh merge. Streaming buffers and
    /// turn state are kept.
    pub fn load(&mut self, snapshot: &Value, log: &[ThreadEvent]) {
        self.committed = merge(snapshot, log);
    }

    /// Re-merge and swap in the result only if the committed signature
    /// sequence changed. Returns whether it did.
    pub fn resync(&mut self, snapshot: &Value, log: &[ThreadEvent]) -> bool {
        let merged = merge(snapshot, log);
        if signature_sequence(&merged.entries) == signature_sequence(&self.committed.entries) {
            return false;
        }
        debug!(
            component = "reconciler",
            event = "reconciler.resync.replaced",
            before = self.committed.entries.len(),
            after = merged.entries.len(),
            "Transcript replaced after resync"
        );
        self.committed = merged;
        true
    }

    fn next_live_id(&mut self) -> String {
        self.live_seq += 1;
        format!("live:{}", self.live_seq)
    }

    /// Apply one live notification. `now_ms` stamps extracted entries.
    pub fn apply(&mut self, n: &Notification, now_ms: i64) -> Applied {
        match classify(n) {
            LiveNotification::Control(ControlMarker::TurnStarted { turn_id }) => {
                self.thinking = true;
                if turn_id.is_some() {
                    self.active_turn = turn_id;
                }
                Applied::Changed
            }
            LiveNotification::Control(ControlMarker::TurnEnded { turn_id }) => {
                self.flush(turn_id.clone());
                self.thinking = false;
                if turn_id.is_none() || turn_id == self.active_turn {
                    self.active_turn = None;
                }
                Applied::Changed
            }
            LiveNotification::Message(mut entry) => {
                if entry.turn_id.is_none() {
                    entry.turn_id = self.active_turn.clone();
                }
                entry.id = self.next_live_id();
                entry.created_at_ms = entry.created_at_ms.or(Some(now_ms));
                let role = entry.role;
                match role {
                    Role::User => self.committed.insert_user(entry).into(),
                    _ => {
                        let before = self.buffers.len();
                        let turn = entry.turn_id.clone();
                        self.buffers
                            .retain(|b| !(b.kind == BufferKind::Assistant && b.turn_id == turn));
                        let dropped = self.buffers.len() != before;
                        let inserted = self.committed.insert_after_turn(entry);
                        (dropped || inserted).into()
                    }
                }
            }
            LiveNotification::Extracted {
                extraction,
                turn_id,
            } => {
                let turn_id = turn_id.or_else(|| self.active_turn.clone());
                let id = self.next_live_id();
                self.committed
                    .place_extraction(extraction, turn_id, Some(now_ms), id)
                    .into()
            }
            LiveNotification::Delta {
                kind,
                text,
                turn_id,
            } => {
                if text.is_empty() {
                    return Applied::Unchanged;
                }
                let turn_id = turn_id.or_else(|| self.active_turn.clone());
                match self
                    .buffers
                    .iter_mut()
                    .find(|b| b.kind == kind && b.turn_id == turn_id)
                {
                    Some(buffer) => buffer.text.push_str(&text),
                    None => self.buffers.push(LiveBuffer {
                        kind,
                        turn_id,
                        text,
                    }),
                }
                Applied::Changed
            }
            LiveNotification::Unrecognized => Applied::Unchanged,
        }
    }

    /// Commit every non-empty streaming buffer and clear them all.
    ///
    /// A buffer's turn is the one its deltas named, else `turn_hint` (the
    /// terminal marker's), else the active turn.
    pub fn flush(&mut self, turn_hint: Option<String>) -> bool {
        let buffers = std::mem::take(&mut self.buffers);
        let mut changed = !buffers.is_empty();

        for buffer in buffers {
            if buffer.text.trim().is_empty() {
                continue;
            }
            let turn_id = buffer
                .turn_id
                .or_else(|| turn_hint.clone())
                .or_else(|| self.active_turn.clone());
            let id = self.next_live_id();
            let entry = buffer.kind.flush_entry(id, buffer.text).with_turn(turn_id);
            changed |= match buffer.kind {
                BufferKind::Assistant => self.committed.insert_after_turn(entry),
                _ => self.committed.insert_candidate(entry),
            };
        }
        changed
    }

    /// Committed entries followed by provisional streaming entries.
    pub fn entries(&self) -> Vec<TranscriptEntry> {
        let mut out = self.committed.entries.clone();
        for (index, buffer) in self.buffers.iter().enumerate() {
            if buffer.text.is_empty() {
                continue;
            }
            let mut entry = buffer
                .kind
                .flush_entry(format!("streaming:{index}"), buffer.text.clone())
                .with_turn(buffer.turn_id.clone());
            entry.streaming = true;
            out.push(entry);
        }
        out
    }

    pub fn committed(&self) -> &[TranscriptEntry] {
        &self.committed.entries
    }

    pub fn is_thinking(&self) -> bool {
        self.thinking
    }

    pub fn active_turn_id(&self) -> Option<&str> {
        self.active_turn.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use threadline_protocol::methods;

    fn snapshot_fix_bug() -> Value {
        json!({
            "thread": {
                "id": "thr_1",
                "turns": [{
                    "id": "T1",
                    "items": [
                        {"type": "userMessage", "id": "u1", "content": [{"type": "text", "text": "fix bug"}]},
                        {"type": "agentMessage", "id": "a1", "text": "done"}
                    ]
                }]
            }
        })
    }

    fn event(id: i64, turn: Option<&str>, method: &str, params: Value, created_at: i64) -> ThreadEvent {
        ThreadEvent {
            id,
            thread_id: "thr_1".into(),
            turn_id: turn.map(str::to_string),
            method: method.into(),
            params,
            created_at,
        }
    }

    fn texts(entries: &[TranscriptEntry]) -> Vec<String> {
        entries
            .iter()
            .map(|e| match &e.activity {
                Some(a) => a.title.clone(),
                None if e.kind == EntryKind::ChangeSummary => "changes".into(),
                None => e.text.clone(),
            })
            .collect()
    }

    const DIFF: &str = "diff --git a/x b/x\n--- a/x\n+++ b/x\n@@ -1 +1 @@\n-a\n+b\n";
    const DIFF_TWO: &str = "diff --git a/x b/x\n--- a/x\n+++ b/x\n@@ -1 +1,2 @@\n-a\n+b\n+c\n";

    #[test]
    fn merge_is_idempotent() {
        let log = vec![event(
            1,
            Some("T1"),
            methods::TURN_DIFF_UPDATED,
            json!({"threadId": "thr_1", "turnId": "T1", "diff": DIFF}),
            10,
        )];
        let first = merge_transcript(&snapshot_fix_bug(), &log);
        let second = merge_transcript(&snapshot_fix_bug(), &log);
        assert_eq!(first, second);
        assert_eq!(texts(&first), vec!["fix bug", "changes", "done"]);
    }

    #[test]
    fn snapshot_orders_tools_before_assistant_at_equal_time() {
        let snapshot = json!({"thread": {"turns": [{
            "id": "T1",
            "items": [
                {"type": "userMessage", "content": [{"type": "text", "text": "go"}]},
                {"type": "agentMessage", "text": "looking"},
                {"type": "commandExecution", "command": "make"}
            ]
        }]}});
        let merged = merge_transcript(&snapshot, &[]);
        assert_eq!(texts(&merged), vec!["go", "Ran command", "looking"]);
    }

    #[test]
    fn log_entries_matching_snapshot_are_deduplicated() {
        let snapshot = json!({"thread": {"turns": [{
            "id": "T1",
            "items": [
                {"type": "userMessage", "content": [{"type": "text", "text": "go"}]},
                {"type": "commandExecution", "id": "c1", "command": "make"},
                {"type": "agentMessage", "text": "ok"}
            ]
        }]}});
        let log = vec![event(
            4,
            Some("T1"),
            methods::ITEM_COMPLETED,
            json!({"turnId": "T1", "item": {"type": "commandExecution", "id": "c1", "command": "make"}}),
            99,
        )];
        let merged = merge_transcript(&snapshot, &log);
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn timestamped_insert_does_not_split_another_turn() {
        let snapshot = json!({"thread": {"turns": [
            {"id": "T1", "items": [
                {"type": "userMessage", "createdAt": 1_000_000_000_000_i64, "content": [{"type": "text", "text": "one"}]},
                {"type": "agentMessage", "createdAt": 1_000_000_000_300_i64, "text": "reply one"}
            ]},
            {"id": "T2", "items": [
                {"type": "userMessage", "createdAt": 1_000_000_000_500_i64, "content": [{"type": "text", "text": "two"}]}
            ]}
        ]}});
        // Belongs to an unknown turn, timestamped between T1's entries
        let log = vec![event(
            1,
            Some("T9"),
            methods::THREAD_COMPACTED,
            json!({"threadId": "thr_1"}),
            1_000_000_000_100,
        )];
        let merged = merge_transcript(&snapshot, &log);
        assert_eq!(
            texts(&merged),
            vec!["one", "reply one", "Context compacted", "two"]
        );
    }

    #[test]
    fn newer_turn_diff_replaces_previous_in_place() {
        let log = vec![
            event(1, Some("T1"), methods::TURN_DIFF_UPDATED, json!({"diff": DIFF}), 10),
            event(2, Some("T1"), methods::DIFF_SNAPSHOT, json!({"diff": DIFF_TWO}), 20),
        ];
        let merged = merge_transcript(&snapshot_fix_bug(), &log);
        let summaries: Vec<_> = merged
            .iter()
            .filter(|e| e.kind == EntryKind::ChangeSummary)
            .collect();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].summary.as_ref().unwrap().total_additions(), 2);
        assert_eq!(texts(&merged), vec!["fix bug", "changes", "done"]);
    }

    #[test]
    fn empty_turn_diff_removes_summary() {
        let log = vec![
            event(1, Some("T1"), methods::DIFF_SNAPSHOT, json!({"diff": DIFF}), 10),
            event(2, Some("T1"), methods::DIFF_SNAPSHOT, json!({"diff": ""}), 20),
        ];
        let merged = merge_transcript(&snapshot_fix_bug(), &log);
        assert_eq!(texts(&merged), vec!["fix bug", "done"]);

        // The same diff coming back later shows again.
        let mut log = log;
        log.push(event(3, Some("T1"), methods::TURN_DIFF_UPDATED, json!({"diff": DIFF}), 30));
        let merged = merge_transcript(&snapshot_fix_bug(), &log);
        assert_eq!(texts(&merged), vec!["fix bug", "changes", "done"]);
    }

    #[test]
    fn live_empty_diff_clears_turn_summary() {
        let mut reconciler = Reconciler::new();
        reconciler.load(&snapshot_fix_bug(), &[]);
        let diff = |text: &str| {
            Notification::new(
                methods::TURN_DIFF_UPDATED,
                json!({"threadId": "thr_1", "turnId": "T1", "diff": text}),
            )
        };
        assert_eq!(reconciler.apply(&diff(DIFF), 10), Applied::Changed);
        assert_eq!(texts(reconciler.committed()), vec!["fix bug", "changes", "done"]);

        assert_eq!(reconciler.apply(&diff(""), 20), Applied::Changed);
        assert_eq!(texts(reconciler.committed()), vec!["fix bug", "done"]);
        assert_eq!(reconciler.apply(&diff(""), 30), Applied::Unchanged);
    }

    #[test]
    fn streamed_reply_matching_snapshot_commits_once() {
        let mut reconciler = Reconciler::new();
        reconciler.load(&snapshot_fix_bug(), &[]);

        reconciler.apply(
            &Notification::new(methods::TURN_STARTED, json!({"threadId": "thr_1", "turn": {"id": "T1"}})),
            1,
        );
        assert!(reconciler.is_thinking());
        for delta in ["do", "ne"] {
            reconciler.apply(
                &Notification::new(
                    methods::AGENT_MESSAGE_DELTA,
                    json!({"threadId": "thr_1", "turnId": "T1", "delta": delta}),
                ),
                2,
            );
        }
        let streaming: Vec<_> = reconciler.entries().into_iter().filter(|e| e.streaming).collect();
        assert_eq!(streaming.len(), 1);
        assert_eq!(streaming[0].text, "done");

        reconciler.apply(
            &Notification::new(methods::TURN_COMPLETED, json!({"threadId": "thr_1", "turn": {"id": "T1"}})),
            3,
        );

        let entries = reconciler.entries();
        assert!(!reconciler.is_thinking());
        assert!(entries.iter().all(|e| !e.streaming));
        let done: Vec<_> = entries
            .iter()
            .filter(|e| e.role == Role::Assistant && e.text == "done")
            .collect();
        assert_eq!(done.len(), 1);
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn aborted_turn_flushes_every_buffer_into_its_turn() {
        let mut reconciler = Reconciler::new();
        reconciler.load(&snapshot_fix_bug(), &[]);
        reconciler.apply(&Notification::new(methods::TURN_STARTED, json!({"turnId": "T2"})), 1);
        reconciler.apply(
            &Notification::new(methods::COMMAND_OUTPUT_DELTA, json!({"delta": "compiling\n"})),
            2,
        );
        reconciler.apply(
            &Notification::new(methods::AGENT_MESSAGE_DELTA, json!({"delta": "partial"})),
            3,
        );
        reconciler.apply(&Notification::new(methods::TURN_ABORTED, json!({"turnId": "T2"})), 4);

        let committed = reconciler.committed();
        assert_eq!(texts(committed), vec!["fix bug", "done", "Command output", "partial"]);
        assert!(committed[2..].iter().all(|e| e.turn_id.as_deref() == Some("T2")));
        assert_eq!(reconciler.active_turn_id(), None);
    }

    #[test]
    fn completed_message_replaces_its_stream() {
        let mut reconciler = Reconciler::new();
        reconciler.apply(&Notification::new(methods::TURN_STARTED, json!({"turnId": "T1"})), 1);
        reconciler.apply(
            &Notification::new(methods::AGENT_MESSAGE_DELTA, json!({"turnId": "T1", "delta": "Hel"})),
            2,
        );
        reconciler.apply(
            &Notification::new(
                methods::ITEM_COMPLETED,
                json!({"turnId": "T1", "item": {"type": "agentMessage", "text": "Hello"}}),
            ),
            3,
        );
        let entries = reconciler.entries();
        assert_eq!(texts(&entries), vec!["Hello"]);
        assert!(!entries[0].streaming);
    }

    #[test]
    fn live_activity_lands_before_turn_reply() {
        let mut reconciler = Reconciler::new();
        reconciler.load(&snapshot_fix_bug(), &[]);
        let applied = reconciler.apply(
            &Notification::new(
                methods::ITEM_COMPLETED,
                json!({"turnId": "T1", "item": {"type": "webSearch", "query": "rust lifetimes"}}),
            ),
            5,
        );
        assert_eq!(applied, Applied::Changed);
        assert_eq!(texts(reconciler.committed()), vec!["fix bug", "Web search", "done"]);
    }

    #[test]
    fn resync_reports_only_real_changes() {
        let mut reconciler = Reconciler::new();
        reconciler.load(&snapshot_fix_bug(), &[]);
        assert!(!reconciler.resync(&snapshot_fix_bug(), &[]));

        let log = vec![event(
            1,
            Some("T1"),
            methods::THREAD_COMPACTED,
            json!({}),
            10,
        )];
        assert!(reconciler.resync(&snapshot_fix_bug(), &log));
        assert_eq!(reconciler.committed().len(), 3);
    }

    #[test]
    fn unrecognized_notifications_change_nothing() {
        let mut reconciler = Reconciler::new();
        let applied = reconciler.apply(&Notification::new("thread/tokenUsage/updated", json!({})), 1);
        assert_eq!(applied, Applied::Unchanged);
        assert!(reconciler.entries().is_empty());
    }
}
