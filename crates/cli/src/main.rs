//! Threadline CLI
//!
//! Follow a coding agent thread from the terminal: a live, reconciled
//! transcript (`watch`) or the raw persisted event log (`log`).

mod api;
mod config;
mod connection;
mod render;
mod stream;
mod view;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;

use crate::api::{ApiClient, ClientError};
use crate::config::{default_config_path, load_file, resolve};
use crate::render::{events_table, RenderOptions};
use crate::view::ThreadView;

#[derive(Parser)]
#[command(name = "threadline")]
#[command(about = "Follow coding agent threads from the terminal", long_about = None)]
struct Cli {
    /// Server base URL
    #[arg(long, env = "THREADLINE_SERVER", global = true)]
    server: Option<String>,

    /// Bearer credential
    #[arg(long, env = "THREADLINE_TOKEN", global = true, hide_env_values = true)]
    token: Option<String>,

    /// Config file (default ~/.config/threadline/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Live view of a thread's transcript
    Watch {
        thread_id: String,
        /// Show numbered diff lines under change summaries
        #[arg(long)]
        diffs: bool,
    },
    /// Print a thread's persisted events
    Log {
        thread_id: String,
        #[arg(long, default_value_t = 500)]
        limit: usize,
        /// One JSON object per line instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions { shell: Shell },
}

fn init_tracing() {
    let filter = std::env::var("THREADLINE_LOG")
        .ok()
        .and_then(|value| EnvFilter::try_new(value).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "threadline", &mut std::io::stdout());
        return Ok(());
    }

    let file = match cli.config.clone().or_else(default_config_path) {
        Some(path) => load_file(&path)?,
        None => Default::default(),
    };
    let config = resolve(cli.server, cli.token, file);
    let client = ApiClient::new(&config.server, config.token);

    match cli.command {
        Commands::Watch { thread_id, diffs } => {
            ThreadView::new(thread_id, client, RenderOptions { diffs })
                .run()
                .await?;
        }
        Commands::Log {
            thread_id,
            limit,
            json,
        } => {
            let events = client.events(&thread_id, limit).await?;
            if json {
                for event in &events {
                    println!("{}", serde_json::to_string(event)?);
                }
            } else {
                println!("{}", events_table(&events));
            }
        }
        Commands::Completions { .. } => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if matches!(e.downcast_ref::<ClientError>(), Some(ClientError::Unauthorized)) {
                eprintln!(
                    "{} credential rejected; set --token or THREADLINE_TOKEN",
                    console::style("error:").red().bold()
                );
            } else {
                eprintln!("{} {e:#}", console::style("error:").red().bold());
            }
            ExitCode::FAILURE
        }
    }
}
