//! Sample project checkout

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tempfile::TempDir;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to create working directory: {0}")]
    WorkDir(#[from] std::io::Error),

    #[error("Failed to run git: {0}")]
    Spawn(String),

    #[error("git clone of {url} failed: {stderr}")]
    CloneFailed { url: String, stderr: String },
}

/// Checked-out sample project. Dropping it removes the directory.
#[derive(Debug)]
pub struct WorkingCopy {
    path: PathBuf,
    dir: TempDir,
}

impl WorkingCopy {
    /// Adopt a temporary directory as the working copy
    pub fn temporary(dir: TempDir) -> Self {
        Self {
            path: dir.path().to_path_buf(),
            dir,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve a project-relative path, tolerating a leading `/`
    pub fn join(&self, relative: &str) -> PathBuf {
        self.path.join(relative.trim_start_matches('/'))
    }

    /// Delete the checkout now instead of on drop
    pub fn remove(self) {
        let path = self.path;
        if let Err(e) = self.dir.close() {
            warn!("Failed to remove working copy {}: {}", path.display(), e);
        } else {
            debug!("Removed working copy {}", path.display());
        }
    }
}

#[async_trait]
pub trait SourceControl: Send + Sync {
    async fn checkout(&self, url: &str) -> Result<WorkingCopy, SourceError>;
}

/// Shallow `git clone` into a fresh temporary directory
#[derive(Debug, Clone)]
pub struct GitSource {
    executable: String,
}

impl GitSource {
    pub fn new() -> Self {
        Self {
            executable: "git".to_string(),
        }
    }

    pub fn with_executable(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
        }
    }
}

impl Default for GitSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceControl for GitSource {
    async fn checkout(&self, url: &str) -> Result<WorkingCopy, SourceError> {
        let dir = tempfile::Builder::new()
            .prefix("deployprobe-")
            .tempdir()?;

        info!("Cloning {} into {}", url, dir.path().display());

        let output = Command::new(&self.executable)
            .args(["clone", "--depth", "1", "--quiet", url])
            .arg(dir.path())
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| SourceError::Spawn(e.to_string()))?;

        if !output.status.success() {
            return Err(SourceError::CloneFailed {
                url: url.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(WorkingCopy::temporary(dir))
    }
}
