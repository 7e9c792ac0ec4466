//! Client configuration.
//!
//! `~/.config/threadline/config.toml` supplies defaults; flags and their
//! environment variables (`THREADLINE_SERVER`, `THREADLINE_TOKEN`) win.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_SERVER: &str = "http://127.0.0.1:4610";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub server: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub server: String,
    pub token: Option<String>,
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("threadline").join("config.toml"))
}

/// Read the config file. A missing file is an empty config.
pub fn load_file(path: &Path) -> anyhow::Result<FileConfig> {
    match std::fs::read_to_string(path) {
        Ok(text) => toml::from_str(&text).with_context(|| format!("parsing {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FileConfig::default()),
        Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
    }
}

/// Merge flag values (already env-resolved by clap) over the file.
pub fn resolve(server: Option<String>, token: Option<String>, file: FileConfig) -> ClientConfig {
    let non_empty = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    ClientConfig {
        server: non_empty(server)
            .or_else(|| non_empty(file.server))
            .unwrap_or_else(|| DEFAULT_SERVER.to_string())
            .trim_end_matches('/')
            .to_string(),
        token: non_empty(token).or_else(|| non_empty(file.token)),
    }
}
