//! Agent RPC bridge
//!
//! Owns the single connection to the agent process. Calls are correlated by a
//! numeric id over that one connection; unsolicited messages are dispatched
//! synchronously to process-wide handlers and to every thread subscriber the
//! payload can be attributed to.
//!
//! The listener registry outlives any one connection: when the agent
//! connection drops, pending calls fail with a connectivity error, and a
//! fresh connection can be attached without subscribers noticing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use threadline_protocol::{walk, Notification};

use crate::BridgeError;

/// Default bound for a single `call`.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Per-subscriber buffer; a full buffer drops notifications for that
/// subscriber only.
pub const DEFAULT_SINK_CAPACITY: usize = 512;

/// Process-wide notification handler. Runs on the dispatch path and must not
/// block.
pub type NotificationHandler = Arc<dyn Fn(&Notification) + Send + Sync>;

type PendingReply = oneshot::Sender<Result<Value, BridgeError>>;

struct ThreadSink {
    id: u64,
    tx: mpsc::Sender<Notification>,
    dropped: Arc<AtomicU64>,
}

struct Connection {
    generation: u64,
    outbound: mpsc::Sender<String>,
}

struct Inner {
    next_call_id: AtomicU64,
    next_subscription_id: AtomicU64,
    generation: AtomicU64,
    connection: ArcSwapOption<Connection>,
    pending: Mutex<HashMap<u64, PendingReply>>,
    handlers: RwLock<Vec<NotificationHandler>>,
    subscriptions: DashMap<String, Vec<ThreadSink>>,
    connected: watch::Sender<bool>,
    call_timeout: Duration,
    sink_capacity: usize,
}

/// Cheap-to-clone handle to the bridge.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<Inner>,
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new()
    }
}

impl Bridge {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_CALL_TIMEOUT, DEFAULT_SINK_CAPACITY)
    }

    pub fn with_limits(call_timeout: Duration, sink_capacity: usize) -> Self {
        let (connected, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                next_call_id: AtomicU64::new(1),
                next_subscription_id: AtomicU64::new(1),
                generation: AtomicU64::new(0),
                connection: ArcSwapOption::empty(),
                pending: Mutex::new(HashMap::new()),
                handlers: RwLock::new(Vec::new()),
                subscriptions: DashMap::new(),
                connected,
                call_timeout,
                sink_capacity: sink_capacity.max(1),
            }),
        }
    }

    /// Attach a connection. `outbound` carries serialized JSON-RPC messages to
    /// the agent; `inbound` yields raw text frames from it.
    ///
    /// Any previous connection is detached first (its pending calls fail).
    /// Returns the reader task; it ends when `inbound` closes.
    pub fn attach(
        &self,
        outbound: mpsc::Sender<String>,
        mut inbound: mpsc::Receiver<String>,
    ) -> JoinHandle<()> {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(previous) = self.inner.connection.swap(Some(Arc::new(Connection {
            generation,
            outbound,
        }))) {
            debug!(
                component = "bridge",
                event = "bridge.connection.replaced",
                previous_generation = previous.generation,
                generation,
                "Replacing agent connection"
            );
            self.inner.reject_pending("agent connection replaced");
        }
        self.inner.connected.send_replace(true);
        info!(
            component = "bridge",
            event = "bridge.connection.attached",
            generation,
            "Agent connection attached"
        );

        let inner = self.inner.clone();
        tokio::spawn(async move {
            while let Some(text) = inbound.recv().await {
                inner.handle_incoming(&text);
            }
            inner.connection_lost(generation, "agent connection dropped");
        })
    }

    /// Detach the current connection, if any. Pending calls fail, `closed()`
    /// resolves and the transport sees its outbound channel close.
    pub fn detach(&self, reason: &str) {
        if let Some(connection) = self.inner.connection.load_full() {
            self.inner.connection_lost(connection.generation, reason);
        }
    }

    /// True while a connection is attached.
    pub fn is_connected(&self) -> bool {
        *self.inner.connected.borrow()
    }

    /// Resolves once the current connection (if any) has dropped.
    pub async fn closed(&self) {
        let mut rx = self.inner.connected.subscribe();
        let _ = rx.wait_for(|connected| !*connected).await;
    }

    /// Request/response call to the agent.
    ///
    /// Fails with `Connectivity` when no connection is attached or the
    /// connection drops before the response arrives. Never retried here.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, BridgeError> {
        let connection = self
            .inner
            .connection
            .load_full()
            .ok_or_else(|| BridgeError::Connectivity("agent not connected".into()))?;

        let id = self.inner.next_call_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.inner.pending_map().insert(id, tx);

        // A detach between the load and the insert has already drained the
        // pending map without this call in it.
        if !self.inner.is_current(connection.generation) {
            self.inner.pending_map().remove(&id);
            return Err(BridgeError::Connectivity("agent connection dropped".into()));
        }

        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let text = serde_json::to_string(&payload)?;

        debug!(
            component = "bridge",
            event = "bridge.call.sent",
            call_id = id,
            method = %method,
            "Sending agent call"
        );

        if connection.outbound.send(text).await.is_err() {
            self.inner.pending_map().remove(&id);
            return Err(BridgeError::Connectivity("agent connection closed".into()));
        }

        match tokio::time::timeout(self.inner.call_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(BridgeError::Connectivity(
                "agent connection dropped before reply".into(),
            )),
            Err(_) => {
                self.inner.pending_map().remove(&id);
                warn!(
                    component = "bridge",
                    event = "bridge.call.timeout",
                    call_id = id,
                    method = %method,
                    "Agent call timed out"
                );
                Err(BridgeError::Timeout(self.inner.call_timeout))
            }
        }
    }

    /// Fire-and-forget JSON-RPC notification to the agent.
    pub async fn notify(&self, method: &str, params: Value) -> Result<(), BridgeError> {
        let connection = self
            .inner
            .connection
            .load_full()
            .ok_or_else(|| BridgeError::Connectivity("agent not connected".into()))?;
        let text = serde_json::to_string(&json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        }))?;
        connection
            .outbound
            .send(text)
            .await
            .map_err(|_| BridgeError::Connectivity("agent connection closed".into()))
    }

    /// Register a handler invoked for every unsolicited message.
    pub fn on_notification(&self, handler: NotificationHandler) {
        self.inner
            .handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(handler);
    }

    /// Subscribe to every notification attributable to `thread_id`.
    ///
    /// Dropping the returned subscription unsubscribes.
    pub fn subscribe_thread(&self, thread_id: &str) -> ThreadSubscription {
        let id = self
            .inner
            .next_subscription_id
            .fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.inner.sink_capacity);
        let dropped = Arc::new(AtomicU64::new(0));
        self.inner
            .subscriptions
            .entry(thread_id.to_string())
            .or_default()
            .push(ThreadSink {
                id,
                tx,
                dropped: dropped.clone(),
            });

        debug!(
            component = "bridge",
            event = "bridge.subscription.added",
            thread_id = %thread_id,
            subscription_id = id,
            "Thread subscription added"
        );

        ThreadSubscription {
            id,
            thread_id: thread_id.to_string(),
            rx,
            dropped,
            bridge: Arc::downgrade(&self.inner),
        }
    }

    /// Number of live subscriptions for a thread.
    pub fn subscriber_count(&self, thread_id: &str) -> usize {
        self.inner
            .subscriptions
            .get(thread_id)
            .map(|sinks| sinks.len())
            .unwrap_or(0)
    }

    /// Deliver a server-originated notification to a thread's subscribers
    /// only. Process-wide handlers are not invoked.
    pub fn publish_to_thread(&self, thread_id: &str, notification: &Notification) {
        self.inner.deliver_to_thread(thread_id, notification);
    }

    /// Feed one raw inbound frame through the dispatcher. Transports call this
    /// indirectly via `attach`; exposed for tests and replay tooling.
    pub fn dispatch_raw(&self, text: &str) {
        self.inner.handle_incoming(text);
    }
}

impl Inner {
    fn pending_map(&self) -> std::sync::MutexGuard<'_, HashMap<u64, PendingReply>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn handle_incoming(&self, text: &str) {
        let raw: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                warn!(
                    component = "bridge",
                    event = "bridge.inbound.parse_error",
                    error = %e,
                    payload_preview = %text.chars().take(200).collect::<String>(),
                    "Failed to parse agent message"
                );
                return;
            }
        };

        let method = raw.get("method").and_then(Value::as_str);
        let is_response = method.is_none()
            && raw.get("id").is_some()
            && (raw.get("result").is_some() || raw.get("error").is_some());

        if is_response {
            self.resolve_call(&raw);
            return;
        }

        match method {
            Some(method) => {
                let params = raw.get("params").cloned().unwrap_or(Value::Null);
                self.dispatch(&Notification::new(method, params));
            }
            None => {
                debug!(
                    component = "bridge",
                    event = "bridge.inbound.unrecognized",
                    "Ignoring agent message without method or result"
                );
            }
        }
    }

    fn resolve_call(&self, raw: &Value) {
        let Some(id) = raw.get("id").and_then(response_id) else {
            warn!(
                component = "bridge",
                event = "bridge.response.bad_id",
                "Agent response carried an unusable id"
            );
            return;
        };

        let Some(reply) = self.pending_map().remove(&id) else {
            debug!(
                component = "bridge",
                event = "bridge.response.orphaned",
                call_id = id,
                "Response for unknown or expired call"
            );
            return;
        };

        let result = match raw.get("error") {
            Some(error) => Err(BridgeError::Rpc {
                code: error.get("code").and_then(Value::as_i64).unwrap_or(-1),
                message: error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string(),
            }),
            None => Ok(raw.get("result").cloned().unwrap_or(Value::Null)),
        };
        let _ = reply.send(result);
    }

    fn dispatch(&self, notification: &Notification) {
        let handlers = self
            .handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        for handler in &handlers {
            handler(notification);
        }

        if let Some(thread_id) = walk::thread_id(&notification.params) {
            self.deliver_to_thread(thread_id, notification);
        }
    }

    fn deliver_to_thread(&self, thread_id: &str, notification: &Notification) {
        let Some(mut sinks) = self.subscriptions.get_mut(thread_id) else {
            return;
        };
        sinks.retain(|sink| match sink.tx.try_send(notification.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                sink.dropped.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    fn unsubscribe(&self, thread_id: &str, id: u64) {
        let mut now_empty = false;
        if let Some(mut sinks) = self.subscriptions.get_mut(thread_id) {
            sinks.retain(|sink| sink.id != id);
            now_empty = sinks.is_empty();
        }
        if now_empty {
            self.subscriptions
                .remove_if(thread_id, |_, sinks| sinks.is_empty());
        }
        debug!(
            component = "bridge",
            event = "bridge.subscription.removed",
            thread_id = %thread_id,
            subscription_id = id,
            "Thread subscription removed"
        );
    }

    fn reject_pending(&self, reason: &str) {
        let drained: Vec<PendingReply> = self.pending_map().drain().map(|(_, tx)| tx).collect();
        if drained.is_empty() {
            return;
        }
        warn!(
            component = "bridge",
            event = "bridge.calls.rejected",
            count = drained.len(),
            reason = %reason,
            "Rejecting in-flight agent calls"
        );
        for reply in drained {
            let _ = reply.send(Err(BridgeError::Connectivity(reason.to_string())));
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.connection
            .load()
            .as_ref()
            .is_some_and(|connection| connection.generation == generation)
    }

    fn connection_lost(&self, generation: u64, reason: &str) {
        let current = self.connection.load();
        if !current
            .as_ref()
            .is_some_and(|connection| connection.generation == generation)
        {
            return;
        }
        // Only clear the connection we looked at; a newer attach wins.
        let previous = self
            .connection
            .compare_and_swap(&current, None::<Arc<Connection>>);
        let swapped = match (previous.as_ref(), current.as_ref()) {
            (Some(previous), Some(current)) => Arc::ptr_eq(previous, current),
            _ => false,
        };
        if !swapped {
            return;
        }
        self.reject_pending(reason);
        self.connected.send_replace(false);
        warn!(
            component = "bridge",
            event = "bridge.connection.lost",
            generation,
            reason = %reason,
            "Agent connection lost"
        );
    }
}

fn response_id(id: &Value) -> Option<u64> {
    match id {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Receiving end of a thread subscription.
pub struct ThreadSubscription {
    id: u64,
    thread_id: String,
    rx: mpsc::Receiver<Notification>,
    dropped: Arc<AtomicU64>,
    bridge: Weak<Inner>,
}

impl ThreadSubscription {
    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub async fn recv(&mut self) -> Option<Notification> {
        self.rx.recv().await
    }

    /// Notifications dropped because this subscriber's buffer was full since
    /// the last call.
    pub fn take_dropped(&self) -> u64 {
        self.dropped.swap(0, Ordering::Relaxed)
    }
}

impl Drop for ThreadSubscription {
    fn drop(&mut self) {
        if let Some(inner) = self.bridge.upgrade() {
            inner.unsubscribe(&self.thread_id, self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn attached(bridge: &Bridge) -> (mpsc::Receiver<String>, mpsc::Sender<String>) {
        let (out_tx, out_rx) = mpsc::channel(64);
        let (in_tx, in_rx) = mpsc::channel(64);
        bridge.attach(out_tx, in_rx);
        (out_rx, in_tx)
    }

    async fn next_request(out_rx: &mut mpsc::Receiver<String>) -> Value {
        let text = out_rx.recv().await.expect("outbound message");
        serde_json::from_str(&text).unwrap()
    }

    #[tokio::test]
    async fn call_resolves_with_matching_response() {
        let bridge = Bridge::new();
        let (mut out_rx, in_tx) = attached(&bridge);

        let caller = bridge.clone();
        let call = tokio::spawn(async move { caller.call("thread/read", json!({"threadId": "t"})).await });

        let request = next_request(&mut out_rx).await;
        assert_eq!(request["method"], "thread/read");
        let id = request["id"].as_u64().unwrap();
        in_tx
            .send(json!({"id": id, "result": {"ok": true}}).to_string())
            .await
            .unwrap();

        let result = call.await.unwrap().unwrap();
        assert_eq!(result, json!({"ok": true}));
    }

    #[tokio::test]
    async fn concurrent_calls_are_correlated_by_id() {
        let bridge = Bridge::new();
        let (mut out_rx, in_tx) = attached(&bridge);

        let a = {
            let b = bridge.clone();
            tokio::spawn(async move { b.call("a", Value::Null).await })
        };
        let first = next_request(&mut out_rx).await;
        let b_call = {
            let b = bridge.clone();
            tokio::spawn(async move { b.call("b", Value::Null).await })
        };
        let second = next_request(&mut out_rx).await;
        assert_ne!(first["id"], second["id"]);

        // Answer out of order
        in_tx
            .send(json!({"id": second["id"], "result": second["method"]}).to_string())
            .await
            .unwrap();
        in_tx
            .send(json!({"id": first["id"], "result": first["method"]}).to_string())
            .await
            .unwrap();

        assert_eq!(a.await.unwrap().unwrap(), json!("a"));
        assert_eq!(b_call.await.unwrap().unwrap(), json!("b"));
    }

    #[tokio::test]
    async fn rpc_error_is_surfaced() {
        let bridge = Bridge::new();
        let (mut out_rx, in_tx) = attached(&bridge);
        let caller = bridge.clone();
        let call = tokio::spawn(async move { caller.call("bad", Value::Null).await });
        let request = next_request(&mut out_rx).await;
        in_tx
            .send(json!({"id": request["id"], "error": {"code": -32601, "message": "nope"}}).to_string())
            .await
            .unwrap();
        match call.await.unwrap() {
            Err(BridgeError::Rpc { code, message }) => {
                assert_eq!(code, -32601);
                assert_eq!(message, "nope");
            }
            other => panic!("expected rpc error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn dropped_connection_rejects_outstanding_calls() {
        let bridge = Bridge::new();
        let (mut out_rx, in_tx) = attached(&bridge);
        let caller = bridge.clone();
        let call = tokio::spawn(async move { caller.call("slow", Value::Null).await });
        let _ = next_request(&mut out_rx).await;

        drop(in_tx);

        let err = call.await.unwrap().unwrap_err();
        assert!(err.is_connectivity(), "got {err:?}");
        bridge.closed().await;
        assert!(!bridge.is_connected());
    }

    #[tokio::test]
    async fn detach_fails_pending_and_closes_transport() {
        let bridge = Bridge::new();
        let (mut out_rx, _in_tx) = attached(&bridge);
        let caller = bridge.clone();
        let call = tokio::spawn(async move { caller.call("slow", Value::Null).await });
        let _ = next_request(&mut out_rx).await;

        bridge.detach("handshake failed");

        let err = call.await.unwrap().unwrap_err();
        assert!(err.is_connectivity(), "got {err:?}");
        assert!(!bridge.is_connected());
        assert!(bridge.inner.pending_map().is_empty());
        // Last sender dropped with the connection.
        assert!(out_rx.recv().await.is_none());
        assert!(bridge.call("x", Value::Null).await.unwrap_err().is_connectivity());
    }

    #[tokio::test]
    async fn stale_generation_does_not_clear_newer_connection() {
        let bridge = Bridge::new();
        let (_out1, _in1) = attached(&bridge);
        let first = bridge.inner.generation.load(Ordering::SeqCst);
        let (mut out2, _in2) = attached(&bridge);

        bridge.inner.connection_lost(first, "late drop");

        assert!(bridge.is_connected());
        let caller = bridge.clone();
        tokio::spawn(async move { caller.call("ping", Value::Null).await });
        assert_eq!(next_request(&mut out2).await["method"], "ping");
    }

    #[tokio::test]
    async fn detach_retires_generation() {
        let bridge = Bridge::new();
        let (_out, _in_tx) = attached(&bridge);
        let generation = bridge.inner.generation.load(Ordering::SeqCst);
        assert!(bridge.inner.is_current(generation));
        bridge.detach("gone");
        assert!(!bridge.inner.is_current(generation));
    }

    #[tokio::test]
    async fn call_without_connection_fails_fast() {
        let bridge = Bridge::new();
        let err = bridge.call("x", Value::Null).await.unwrap_err();
        assert!(err.is_connectivity());
    }

    #[tokio::test]
    async fn call_times_out_and_frees_slot() {
        let bridge = Bridge::with_limits(Duration::from_millis(50), 8);
        let (_out_rx, _in_tx) = attached(&bridge);
        let err = bridge.call("never", Value::Null).await.unwrap_err();
        assert!(matches!(err, BridgeError::Timeout(_)));
        assert!(bridge.inner.pending_map().is_empty());
    }

    #[tokio::test]
    async fn notifications_reach_handlers_and_matching_thread_only() {
        let bridge = Bridge::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        bridge.on_notification(Arc::new(move |_n: &Notification| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let mut sub_a = bridge.subscribe_thread("thr_a");
        let mut sub_b = bridge.subscribe_thread("thr_b");

        bridge.dispatch_raw(
            &json!({"method": "item/agentMessage/delta", "params": {"threadId": "thr_a", "delta": "hi"}})
                .to_string(),
        );
        bridge.dispatch_raw(
            &json!({"method": "turn/started", "params": {"thread": {"id": "thr_b"}, "turn": {"id": "u1"}}})
                .to_string(),
        );

        assert_eq!(seen.load(Ordering::SeqCst), 2);
        let a = sub_a.recv().await.unwrap();
        assert_eq!(a.params["delta"], "hi");
        let b = sub_b.recv().await.unwrap();
        assert_eq!(b.method, "turn/started");
        assert!(sub_a.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn concurrent_subscribers_receive_identical_sequences() {
        let bridge = Bridge::new();
        let mut subs: Vec<_> = (0..3).map(|_| bridge.subscribe_thread("t")).collect();
        for i in 0..5 {
            bridge.dispatch_raw(&json!({"method": "m", "params": {"threadId": "t", "n": i}}).to_string());
        }
        for sub in &mut subs {
            for i in 0..5 {
                let n = sub.recv().await.unwrap();
                assert_eq!(n.params["n"], i);
            }
        }
    }

    #[tokio::test]
    async fn full_sink_drops_without_blocking_others() {
        let bridge = Bridge::with_limits(DEFAULT_CALL_TIMEOUT, 2);
        let slow = bridge.subscribe_thread("t");
        let mut fast = bridge.subscribe_thread("t");

        for i in 0..4 {
            bridge.dispatch_raw(&json!({"method": "m", "params": {"threadId": "t", "n": i}}).to_string());
            let n = fast.recv().await.unwrap();
            assert_eq!(n.params["n"], i);
        }
        assert_eq!(slow.take_dropped(), 2);
        assert_eq!(slow.take_dropped(), 0);
    }

    #[tokio::test]
    async fn dropping_subscription_unsubscribes() {
        let bridge = Bridge::new();
        let sub = bridge.subscribe_thread("t");
        assert_eq!(bridge.subscriber_count("t"), 1);
        drop(sub);
        assert_eq!(bridge.subscriber_count("t"), 0);
    }

    #[tokio::test]
    async fn publish_to_thread_skips_global_handlers() {
        let bridge = Bridge::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        bridge.on_notification(Arc::new(move |_n: &Notification| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        let mut sub = bridge.subscribe_thread("t");
        bridge.publish_to_thread("t", &Notification::new("thread/diffSnapshot", json!({"diff": ""})));
        assert_eq!(sub.recv().await.unwrap().method, "thread/diffSnapshot");
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn subscriptions_survive_reattach() {
        let bridge = Bridge::new();
        let mut sub = bridge.subscribe_thread("t");
        let (_out1, in1) = attached(&bridge);
        drop(in1);
        bridge.closed().await;

        let (_out2, in2) = attached(&bridge);
        assert!(bridge.is_connected());
        in2.send(json!({"method": "turn/started", "params": {"threadId": "t"}}).to_string())
            .await
            .unwrap();
        assert_eq!(sub.recv().await.unwrap().method, "turn/started");
    }
}
