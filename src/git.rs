use log::{debug, warn};
use std::path::Path;
use tokio::process::Command;

use crate::snapshot::GitInfo;

async fn git_output(root: &Path, args: &[&str]) -> Option<String> {
    let output = match Command::new("git").args(args).current_dir(root).output().await {
        Ok(output) => output,
        Err(e) => {
            debug!("git {} failed to start: {e}", args.join(" "));
            return None;
        }
    };

    if !output.status.success() {
        debug!(
            "git {} exited with {}: {}",
            args.join(" "),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
        return None;
    }

    let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!value.is_empty()).then_some(value)
}

/// Commit, branch and author of HEAD; `None` outside a repository or without git.
pub async fn collect_git_info(root: &Path) -> Option<GitInfo> {
    let Some(commit) = git_output(root, &["rev-parse", "HEAD"]).await else {
        warn!("Git metadata unavailable for {}", root.display());
        return None;
    };

    let branch = git_output(root, &["rev-parse", "--abbrev-ref", "HEAD"])
        .await
        .unwrap_or_else(|| "unknown".to_string());
    let author = git_output(root, &["log", "-1", "--format=%an"])
        .await
        .unwrap_or_else(|| "unknown".to_string());

    Some(GitInfo {
        commit,
        branch,
        author,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_directory_yields_none() {
        let dir = TempDir::new().unwrap();
        let info = collect_git_info(&dir.path().join("does-not-exist")).await;
        assert!(info.is_none());
    }
}
