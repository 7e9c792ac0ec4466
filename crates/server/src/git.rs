//! Working tree diffs for diff-snapshot synthesis.
//!
//! Tracked changes come from one `git diff HEAD`; untracked files are
//! rendered one by one with `git diff --no-index /dev/null <file>` and
//! appended, so new files show up as full additions.

use std::path::Path;
use std::process::{Command, Output, Stdio};

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum DiffError {
    #[error("Failed to run git: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("git {args} failed ({status}): {stderr}")]
    Git {
        args: String,
        status: String,
        stderr: String,
    },
}

/// Source of a working tree's diff against its last commit.
///
/// Blocking; callers run it on a blocking thread.
pub trait WorktreeDiff: Send + Sync {
    fn diff(&self, cwd: &Path) -> Result<String, DiffError>;
}

#[derive(Debug, Clone, Default)]
pub struct GitWorktreeDiff;

fn run_git(args: &[&str], cwd: &Path) -> Result<Output, DiffError> {
    Ok(Command::new("git")
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()?)
}

fn checked(args: &[&str], output: Output, ok_codes: &[i32]) -> Result<String, DiffError> {
    let code = output.status.code().unwrap_or(-1);
    if !ok_codes.contains(&code) {
        return Err(DiffError::Git {
            args: args.join(" "),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

impl WorktreeDiff for GitWorktreeDiff {
    fn diff(&self, cwd: &Path) -> Result<String, DiffError> {
        let tracked_args = ["diff", "HEAD", "--no-color", "--no-ext-diff"];
        let mut diff = match checked(&tracked_args, run_git(&tracked_args, cwd)?, &[0]) {
            Ok(text) => text,
            // No commits yet: diff against the index instead
            Err(DiffError::Git { .. }) => {
                let args = ["diff", "--no-color", "--no-ext-diff"];
                checked(&args, run_git(&args, cwd)?, &[0])?
            }
            Err(e) => return Err(e),
        };

        let list_args = ["ls-files", "--others", "--exclude-standard", "-z"];
        let untracked = checked(&list_args, run_git(&list_args, cwd)?, &[0])?;
        for file in untracked.split('\0').filter(|f| !f.is_empty()) {
            let args = ["diff", "--no-color", "--no-index", "--", "/dev/null", file];
            // --no-index exits 1 when the files differ
            match checked(&args, run_git(&args, cwd)?, &[0, 1]) {
                Ok(text) => diff.push_str(&text),
                Err(e) => debug!(
                    component = "git",
                    event = "git.untracked_diff.failed",
                    file = %file,
                    error = %e,
                    "Skipping untracked file"
                ),
            }
        }
        Ok(diff)
    }
}
