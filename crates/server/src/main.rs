//! Threadline Server
//!
//! Keeps a coding agent running, records every notification it emits per
//! thread, and fans live thread streams out to remote clients over SSE and
//! WebSocket.

mod agent;
mod api;
mod auth;
mod credentials;
mod event_log;
mod git;
mod logging;
mod migration_runner;
mod paths;
mod recorder;
mod session;
mod sse;
mod state;
mod websocket;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, routing::get, Router};
use clap::{Args, Parser, Subcommand};
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use threadline_connectors::{AgentSupervisor, Bridge, SupervisorConfig};

use crate::agent::ConnectError;
use crate::credentials::{load_or_create_secret, Claims, Credentials};
use crate::event_log::EventLog;
use crate::git::GitWorktreeDiff;
use crate::paths::DataPaths;
use crate::recorder::Recorder;
use crate::state::AppState;

const PRUNE_INTERVAL: Duration = Duration::from_secs(60 * 60);
const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

#[derive(Parser)]
#[command(name = "threadline-server")]
#[command(about = "Live, replayable transcripts for coding agent threads", long_about = None)]
struct Cli {
    /// Data directory (default ~/.threadline)
    #[arg(long, env = "THREADLINE_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Base64 server secret for signing credentials
    #[arg(long, env = "THREADLINE_AUTH_SECRET", global = true, hide_env_values = true)]
    auth_secret: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the server
    Start(StartArgs),
    /// Print a signed bearer credential
    Token(TokenArgs),
}

#[derive(Args)]
struct StartArgs {
    #[arg(long, env = "THREADLINE_BIND", default_value = "127.0.0.1:4610")]
    bind: SocketAddr,

    #[arg(long, env = "THREADLINE_AGENT_URL", default_value = "ws://127.0.0.1:4611")]
    agent_url: String,

    /// Command that starts the agent when it is not reachable
    #[arg(
        long,
        env = "THREADLINE_AGENT_COMMAND",
        default_value = "codex app-server --listen ws://127.0.0.1:4611"
    )]
    agent_command: String,

    /// Working tree used for diff snapshots when a thread reports no cwd
    #[arg(long, env = "THREADLINE_WORKSPACE")]
    workspace: Option<PathBuf>,

    #[arg(long, default_value_t = 14)]
    retention_days: u32,

    #[arg(long, default_value_t = 15)]
    startup_timeout_secs: u64,

    #[arg(long, default_value_t = 15)]
    keepalive_secs: u64,
}

#[derive(Args)]
struct TokenArgs {
    #[arg(long, default_value = "cli")]
    subject: String,

    #[arg(long, default_value_t = 30)]
    ttl_days: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let paths = DataPaths::resolve(cli.data_dir.as_deref())?;
    paths.ensure_dirs()?;

    match cli.command {
        Command::Start(args) => start(paths, cli.auth_secret.as_deref(), args).await,
        Command::Token(args) => {
            let secret = load_or_create_secret(cli.auth_secret.as_deref(), &paths.auth_secret())?;
            let claims = Claims {
                sub: args.subject,
                exp: chrono::Utc::now().timestamp() + i64::from(args.ttl_days) * 24 * 60 * 60,
            };
            println!("{}", Credentials::from_secret(&secret).issue(&claims));
            Ok(())
        }
    }
}

async fn start(paths: DataPaths, auth_secret: Option<&str>, args: StartArgs) -> anyhow::Result<()> {
    let logging = logging::init_logging(&paths.log_dir())?;
    info!(
        component = "server",
        event = "server.starting",
        run_id = %logging.run_id,
        data_dir = %paths.root().display(),
        bind = %args.bind,
        "Starting Threadline server"
    );

    let secret = load_or_create_secret(auth_secret, &paths.auth_secret())?;
    let event_log = Arc::new(EventLog::open(&paths.events_db())?);
    let bridge = Bridge::new();

    let workspace = args
        .workspace
        .clone()
        .or_else(|| std::env::current_dir().ok());
    Recorder::new(
        event_log.clone(),
        bridge.clone(),
        Arc::new(GitWorktreeDiff),
        workspace.clone(),
    )
    .spawn();

    let mut supervisor_config = SupervisorConfig::from_command_line(&args.agent_command, &args.agent_url)
        .ok_or_else(|| anyhow::anyhow!("cannot derive a probe address from {}", args.agent_url))?;
    supervisor_config.cwd = workspace;
    supervisor_config.startup_timeout = Duration::from_secs(args.startup_timeout_secs);
    let supervisor = Arc::new(AgentSupervisor::new(supervisor_config));

    match agent::connect_once(&bridge, &supervisor, &args.agent_url).await {
        Ok(()) => {}
        Err(ConnectError::Supervisor(e)) => {
            error!(
                component = "server",
                event = "server.agent_start_failed",
                error = %e,
                "Agent did not become reachable"
            );
            return Err(e.into());
        }
        Err(ConnectError::Bridge(e)) => warn!(
            component = "server",
            event = "server.agent_connect_failed",
            error = %e,
            "Initial agent connection failed, retrying in background"
        ),
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(agent::maintain(
        bridge.clone(),
        supervisor.clone(),
        args.agent_url.clone(),
        shutdown_rx,
    ));
    spawn_retention(event_log.clone(), args.retention_days);

    let state = Arc::new(AppState::new(
        bridge,
        event_log,
        Credentials::from_secret(&secret),
        Duration::from_secs(args.keepalive_secs),
    ));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    info!(
        component = "server",
        event = "server.listening",
        bind = %args.bind,
        "Listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!(
                component = "server",
                event = "server.shutdown_requested",
                "Shutdown requested"
            );
        })
        .await?;

    shutdown_tx.send_replace(true);
    supervisor.stop().await;
    info!(component = "server", event = "server.stopped", "Server stopped");
    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(api::health_handler))
        .route("/threads/{id}/events", get(api::list_events))
        .route("/threads/{id}/snapshot", get(api::thread_snapshot))
        .route("/threads/{id}/stream", get(sse::sse_handler))
        .route("/threads/{id}/ws", get(websocket::ws_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_credential,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Prune once now, then hourly.
fn spawn_retention(event_log: Arc<EventLog>, retention_days: u32) {
    let window_ms = i64::from(retention_days) * MS_PER_DAY;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
        loop {
            ticker.tick().await;
            let cutoff = chrono::Utc::now().timestamp_millis() - window_ms;
            let log = event_log.clone();
            match tokio::task::spawn_blocking(move || log.prune_older_than(cutoff)).await {
                Ok(Ok(removed)) => info!(
                    component = "server",
                    event = "server.retention.pruned",
                    removed,
                    retention_days,
                    "Pruned expired events"
                ),
                Ok(Err(e)) => warn!(
                    component = "server",
                    event = "server.retention.failed",
                    error = %e,
                    "Event pruning failed"
                ),
                Err(e) => warn!(
                    component = "server",
                    event = "server.retention.join_failed",
                    error = %e,
                    "Event pruning task failed"
                ),
            }
        }
    });
}
