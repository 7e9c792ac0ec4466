//! Notification recorder.
//!
//! A single task fed by the process-wide bridge handler. For each
//! notification, in bridge order, it attributes the thread and turn,
//! appends to the event log, tracks the thread's working directory, and on
//! turn end or `turn/diff/updated` synthesizes a `thread/diffSnapshot` event
//! when the working tree diff changed since the last one.
//!
//! Failures are logged and swallowed; nothing here interrupts the stream.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use ring::digest;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use threadline_connectors::Bridge;
use threadline_protocol::{methods, walk, Notification};
use threadline_transcript::diff::parse_unified_diff;

use crate::event_log::EventLog;
use crate::git::WorktreeDiff;

pub const RECORDER_QUEUE_CAPACITY: usize = 4096;

#[derive(Debug, Default)]
struct ThreadState {
    current_turn: Option<String>,
    cwd: Option<PathBuf>,
    last_diff_hash: Option<String>,
}

pub struct Recorder {
    log: Arc<EventLog>,
    bridge: Bridge,
    differ: Arc<dyn WorktreeDiff>,
    default_cwd: Option<PathBuf>,
    threads: HashMap<String, ThreadState>,
}

pub fn sha256_hex(text: &str) -> String {
    digest::digest(&digest::SHA256, text.as_bytes())
        .as_ref()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl Recorder {
    pub fn new(
        log: Arc<EventLog>,
        bridge: Bridge,
        differ: Arc<dyn WorktreeDiff>,
        default_cwd: Option<PathBuf>,
    ) -> Self {
        Self {
            log,
            bridge,
            differ,
            default_cwd,
            threads: HashMap::new(),
        }
    }

    /// Register the bridge handler and start the recorder task.
    ///
    /// The handler never blocks dispatch: when the queue is full the
    /// notification is logged and dropped from the record.
    pub fn spawn(self) -> JoinHandle<()> {
        let (tx, rx) = mpsc::channel::<Notification>(RECORDER_QUEUE_CAPACITY);
        self.bridge.on_notification(Arc::new(move |notification: &Notification| {
            match tx.try_send(notification.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(dropped)) => warn!(
                    component = "recorder",
                    event = "recorder.queue.full",
                    method = %dropped.method,
                    "Recorder queue full, notification not persisted"
                ),
                Err(TrySendError::Closed(_)) => {}
            }
        }));
        tokio::spawn(self.run(rx))
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Notification>) {
        info!(
            component = "recorder",
            event = "recorder.started",
            "Recorder started"
        );
        while let Some(notification) = rx.recv().await {
            self.record(notification).await;
        }
        debug!(
            component = "recorder",
            event = "recorder.stopped",
            "Recorder channel closed"
        );
    }

    /// Record one notification. Returns the appended sequence id, if any.
    pub async fn record(&mut self, notification: Notification) -> Option<i64> {
        let Some(thread_id) = walk::thread_id(&notification.params).map(str::to_string) else {
            debug!(
                component = "recorder",
                event = "recorder.unattributed",
                method = %notification.method,
                "Notification names no thread, not persisted"
            );
            return None;
        };

        let explicit_turn = walk::turn_id(&notification.params).map(str::to_string);
        let terminal = methods::is_turn_terminal(&notification.method);
        let state = self.threads.entry(thread_id.clone()).or_default();

        if notification.method == methods::TURN_STARTED && explicit_turn.is_some() {
            state.current_turn = explicit_turn.clone();
        }
        let turn_id = explicit_turn.or_else(|| state.current_turn.clone());
        if let Some(cwd) = walk::find_string(&notification.params, &["cwd"], walk::DEFAULT_MAX_DEPTH) {
            state.cwd = Some(PathBuf::from(cwd));
        }
        if terminal {
            state.current_turn = None;
        }

        let sequence_id = self
            .append(&thread_id, turn_id.as_deref(), &notification)
            .await;

        if terminal || notification.method == methods::TURN_DIFF_UPDATED {
            self.synthesize_diff(&thread_id, turn_id).await;
        }
        sequence_id
    }

    async fn append(
        &self,
        thread_id: &str,
        turn_id: Option<&str>,
        notification: &Notification,
    ) -> Option<i64> {
        let log = self.log.clone();
        let thread = thread_id.to_string();
        let turn = turn_id.map(str::to_string);
        let method = notification.method.clone();
        let params = notification.params.clone();

        let result = tokio::task::spawn_blocking(move || {
            log.append(&thread, turn.as_deref(), &method, &params, now_ms())
        })
        .await;

        match result {
            Ok(Ok(id)) => Some(id),
            Ok(Err(e)) => {
                warn!(
                    component = "recorder",
                    event = "recorder.append.failed",
                    thread_id = %thread_id,
                    method = %notification.method,
                    error = %e,
                    "Event append failed"
                );
                None
            }
            Err(e) => {
                warn!(
                    component = "recorder",
                    event = "recorder.append.panicked",
                    error = %e,
                    "Event append task panicked"
                );
                None
            }
        }
    }

    /// Compute the thread's working tree diff and emit it unless it matches
    /// the last one emitted for this thread.
    async fn synthesize_diff(&mut self, thread_id: &str, turn_id: Option<String>) {
        let Some(cwd) = self
            .threads
            .get(thread_id)
            .and_then(|s| s.cwd.clone())
            .or_else(|| self.default_cwd.clone())
        else {
            return;
        };

        let differ = self.differ.clone();
        let diff_cwd = cwd.clone();
        let diff = match tokio::task::spawn_blocking(move || differ.diff(&diff_cwd)).await {
            Ok(Ok(diff)) => diff,
            Ok(Err(e)) => {
                warn!(
                    component = "recorder",
                    event = "recorder.diff.failed",
                    thread_id = %thread_id,
                    cwd = %cwd.display(),
                    error = %e,
                    "Working tree diff failed"
                );
                return;
            }
            Err(e) => {
                warn!(
                    component = "recorder",
                    event = "recorder.diff.panicked",
                    error = %e,
                    "Working tree diff task panicked"
                );
                return;
            }
        };

        let hash = sha256_hex(&diff);
        let state = self.threads.entry(thread_id.to_string()).or_default();
        let first_and_clean = state.last_diff_hash.is_none() && diff.is_empty();
        if state.last_diff_hash.as_deref() == Some(hash.as_str()) || first_and_clean {
            state.last_diff_hash = Some(hash);
            debug!(
                component = "recorder",
                event = "recorder.diff.unchanged",
                thread_id = %thread_id,
                "Diff unchanged, snapshot suppressed"
            );
            return;
        }
        state.last_diff_hash = Some(hash.clone());

        let mut params = Map::new();
        params.insert("threadId".into(), Value::String(thread_id.to_string()));
        if let Some(turn) = &turn_id {
            params.insert("turnId".into(), Value::String(turn.clone()));
        }
        params.insert("diff".into(), Value::String(diff));
        params.insert("hash".into(), Value::String(hash));
        let notification = Notification::new(methods::DIFF_SNAPSHOT, Value::Object(params));

        let files = notification
            .params
            .get("diff")
            .and_then(Value::as_str)
            .map(|d| parse_unified_diff(d).len())
            .unwrap_or(0);
        info!(
            component = "recorder",
            event = "recorder.diff.snapshot",
            thread_id = %thread_id,
            turn_id = ?turn_id,
            files,
            "Diff snapshot synthesized"
        );

        self.append(thread_id, turn_id.as_deref(), &notification).await;
        self.bridge.publish_to_thread(thread_id, &notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Mutex;

    use serde_json::json;

    use crate::git::DiffError;

    struct FixedDiff(Mutex<String>);

    impl FixedDiff {
        fn new(text: &str) -> Arc<Self> {
            Arc::new(Self(Mutex::new(text.to_string())))
        }

        fn set(&self, text: &str) {
            *self.0.lock().unwrap() = text.to_string();
        }
    }

    impl WorktreeDiff for FixedDiff {
        fn diff(&self, _cwd: &Path) -> Result<String, DiffError> {
            Ok(self.0.lock().unwrap().clone())
        }
    }

    const DIFF: &str = "diff --git a/x b/x\n--- a/x\n+++ b/x\n@@ -1 +1 @@\n-a\n+b\n";

    fn recorder(differ: Arc<FixedDiff>) -> (Recorder, Arc<EventLog>, Bridge) {
        let log = Arc::new(EventLog::open_in_memory().unwrap());
        let bridge = Bridge::new();
        let recorder = Recorder::new(
            log.clone(),
            bridge.clone(),
            differ,
            Some(PathBuf::from("/workspace")),
        );
        (recorder, log, bridge)
    }

    fn n(method: &str, params: Value) -> Notification {
        Notification::new(method, params)
    }

    #[tokio::test]
    async fn events_inherit_current_turn_until_terminal() {
        let (mut recorder, log, _bridge) = recorder(FixedDiff::new(""));
        recorder
            .record(n(methods::TURN_STARTED, json!({"threadId": "t1", "turn": {"id": "u1"}})))
            .await;
        recorder
            .record(n(methods::ITEM_STARTED, json!({"threadId": "t1", "item": {"type": "reasoning"}})))
            .await;
        recorder
            .record(n(methods::TURN_COMPLETED, json!({"threadId": "t1"})))
            .await;
        recorder
            .record(n("thread/tokenUsage/updated", json!({"threadId": "t1"})))
            .await;

        let events = log.read("t1", 10).unwrap();
        let turns: Vec<_> = events.iter().map(|e| e.turn_id.as_deref()).collect();
        assert_eq!(turns, vec![Some("u1"), Some("u1"), Some("u1"), None]);
    }

    #[tokio::test]
    async fn unattributed_notifications_are_not_persisted() {
        let (mut recorder, log, _bridge) = recorder(FixedDiff::new(""));
        assert!(recorder.record(n("account/updated", json!({}))).await.is_none());
        assert!(log.read("t1", 10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn identical_diff_twice_yields_one_snapshot() {
        let differ = FixedDiff::new(DIFF);
        let (mut recorder, log, bridge) = recorder(differ.clone());
        let mut sub = bridge.subscribe_thread("t1");

        for turn in ["u1", "u2"] {
            recorder
                .record(n(methods::TURN_STARTED, json!({"threadId": "t1", "turnId": turn})))
                .await;
            recorder
                .record(n(methods::TURN_COMPLETED, json!({"threadId": "t1", "turnId": turn})))
                .await;
        }

        let snapshots: Vec<_> = log
            .read("t1", 100)
            .unwrap()
            .into_iter()
            .filter(|e| e.method == methods::DIFF_SNAPSHOT)
            .collect();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].turn_id.as_deref(), Some("u1"));
        assert_eq!(snapshots[0].params["hash"], sha256_hex(DIFF));

        let published = sub.recv().await.unwrap();
        assert_eq!(published.method, methods::DIFF_SNAPSHOT);
        assert_eq!(published.params["diff"], DIFF);

        // A changed tree emits again
        differ.set("diff --git a/y b/y\n--- a/y\n+++ b/y\n@@ -1 +1 @@\n-c\n+d\n");
        recorder
            .record(n(methods::TURN_DIFF_UPDATED, json!({"threadId": "t1", "turnId": "u3", "diff": ""})))
            .await;
        let count = log
            .read("t1", 100)
            .unwrap()
            .iter()
            .filter(|e| e.method == methods::DIFF_SNAPSHOT)
            .count();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn cwd_from_notifications_is_tracked() {
        let (mut recorder, _log, _bridge) = recorder(FixedDiff::new(""));
        recorder
            .record(n("thread/started", json!({"thread": {"id": "t1", "cwd": "/repo"}})))
            .await;
        assert_eq!(
            recorder.threads["t1"].cwd.as_deref(),
            Some(Path::new("/repo"))
        );
    }

    #[test]
    fn hash_is_hex_sha256() {
        assert_eq!(
            sha256_hex(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
