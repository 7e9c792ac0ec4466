//! Data directory layout.
//!
//! Resolved once at startup from `--data-dir` / `THREADLINE_DATA_DIR` /
//! `~/.threadline` and passed by reference to whatever needs a path.

use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    /// Use `explicit` when given, else `~/.threadline`.
    pub fn resolve(explicit: Option<&Path>) -> io::Result<Self> {
        let root = match explicit {
            Some(path) => path.to_path_buf(),
            None => dirs::home_dir()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "HOME directory not found"))?
                .join(".threadline"),
        };
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn events_db(&self) -> PathBuf {
        self.root.join("events.db")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn auth_secret(&self) -> PathBuf {
        self.root.join("auth-secret")
    }

    /// Create the data dir and its subdirectories.
    pub fn ensure_dirs(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(self.log_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_root_wins() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::resolve(Some(dir.path())).unwrap();
        paths.ensure_dirs().unwrap();
        assert_eq!(paths.events_db(), dir.path().join("events.db"));
        assert!(paths.log_dir().is_dir());
    }
}
