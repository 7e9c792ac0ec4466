//! Agent connection management
//!
//! Keeps the bridge attached to a live agent. Each (re)connect runs
//! supervision first, so a crashed agent is respawned before we dial it.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use threadline_connectors::{connect_websocket, AgentSupervisor, Bridge, BridgeError, SupervisorError};

const RECONNECT_INITIAL: Duration = Duration::from_millis(500);
const RECONNECT_MAX: Duration = Duration::from_secs(8);

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

/// Ensure the agent runs, dial it, attach the bridge and complete the
/// `initialize` handshake. A failed handshake leaves the bridge detached.
pub async fn connect_once(
    bridge: &Bridge,
    supervisor: &AgentSupervisor,
    agent_url: &str,
) -> Result<(), ConnectError> {
    supervisor.ensure_running().await?;
    let (outbound, inbound) = connect_websocket(agent_url).await?;
    bridge.attach(outbound, inbound);

    let user_agent = match handshake(bridge).await {
        Ok(user_agent) => user_agent,
        Err(e) => {
            warn!(
                component = "agent",
                event = "agent.handshake.failed",
                agent_url = %agent_url,
                error = %e,
                "Agent handshake failed, detaching"
            );
            bridge.detach("initialize handshake failed");
            return Err(e.into());
        }
    };

    info!(
        component = "agent",
        event = "agent.connected",
        agent_url = %agent_url,
        user_agent = %user_agent,
        "Agent connected"
    );
    Ok(())
}

async fn handshake(bridge: &Bridge) -> Result<String, BridgeError> {
    let result = bridge
        .call(
            "initialize",
            json!({
                "clientInfo": {
                    "name": "threadline",
                    "title": "Threadline",
                    "version": env!("CARGO_PKG_VERSION"),
                }
            }),
        )
        .await?;
    bridge.notify("initialized", json!({})).await?;
    Ok(result
        .get("userAgent")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string())
}

fn next_delay(current: Duration) -> Duration {
    (current * 2).min(RECONNECT_MAX)
}

/// Reattach the bridge whenever its connection drops, until `shutdown`
/// flips to true. Existing thread subscriptions live on the bridge and
/// survive reconnects.
pub async fn maintain(
    bridge: Bridge,
    supervisor: Arc<AgentSupervisor>,
    agent_url: String,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut delay = RECONNECT_INITIAL;

    loop {
        if *shutdown.borrow() {
            return;
        }

        if bridge.is_connected() {
            delay = RECONNECT_INITIAL;
            tokio::select! {
                _ = bridge.closed() => {
                    warn!(
                        component = "agent",
                        event = "agent.disconnected",
                        agent_url = %agent_url,
                        "Agent connection dropped, reconnecting"
                    );
                }
                _ = shutdown.changed() => return,
            }
            continue;
        }

        let attempt = tokio::select! {
            result = connect_once(&bridge, &supervisor, &agent_url) => result,
            _ = shutdown.changed() => return,
        };
        if let Err(e) = attempt {
            warn!(
                component = "agent",
                event = "agent.reconnect.failed",
                agent_url = %agent_url,
                retry_in_ms = delay.as_millis() as u64,
                error = %e,
                "Agent reconnect failed"
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => return,
            }
            delay = next_delay(delay);
        }
    }
}
