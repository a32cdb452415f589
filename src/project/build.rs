//! Build-and-deploy trigger for the sample project

use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Lines of build output kept for the failure message
const OUTPUT_TAIL_LINES: usize = 20;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Failed to start build: {0}")]
    Spawn(String),

    #[error("Build failed with status {status:?}:\n{output_tail}")]
    Failed {
        status: Option<i32>,
        output_tail: String,
    },
}

// ============================================================================
// SBIO: Trait for abstraction (allows mocking in tests)
// ============================================================================

#[async_trait]
pub trait BuildTrigger: Send + Sync {
    /// Run the build goals against `descriptor` with `profile` active.
    /// Returns once the build has finished; a failed build is an error.
    async fn run_build(
        &self,
        project_dir: &Path,
        descriptor: &Path,
        goals: &str,
        profile: &str,
    ) -> Result<(), BuildError>;
}

// ============================================================================
// SBIO: Pure business logic (no I/O)
// ============================================================================

/// Arguments for a batch-mode Maven invocation
pub fn maven_args(descriptor: &Path, goals: &str, profile: &str) -> Vec<String> {
    let mut args = vec!["-f".to_string(), descriptor.display().to_string()];
    args.extend(goals.split_whitespace().map(str::to_string));
    if !profile.is_empty() {
        args.push(format!("-P{}", profile));
    }
    args.push("-B".to_string());
    args
}

// ============================================================================
// SBIO: I/O implementation (spawns the build tool)
// ============================================================================

#[derive(Debug, Clone)]
pub struct MavenBuild {
    executable: String,
}

impl MavenBuild {
    pub fn new() -> Self {
        Self {
            executable: "mvn".to_string(),
        }
    }

    pub fn with_executable(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    async fn run(&self, project_dir: &Path, args: &[String]) -> Result<(), BuildError> {
        info!("Running {} {}", self.executable, args.join(" "));

        let mut child = Command::new(&self.executable)
            .args(args)
            .current_dir(project_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BuildError::Spawn(format!("{}: {}", self.executable, e)))?;

        let mut tail = VecDeque::with_capacity(OUTPUT_TAIL_LINES);
        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                info!("[build] {}", line);
                if tail.len() == OUTPUT_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| BuildError::Spawn(e.to_string()))?;

        if !status.success() {
            warn!("Build exited with {}", status);
            return Err(BuildError::Failed {
                status: status.code(),
                output_tail: Vec::from(tail).join("\n"),
            });
        }

        debug!("Build finished");
        Ok(())
    }
}

impl Default for MavenBuild {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BuildTrigger for MavenBuild {
    async fn run_build(
        &self,
        project_dir: &Path,
        descriptor: &Path,
        goals: &str,
        profile: &str,
    ) -> Result<(), BuildError> {
        let args = maven_args(descriptor, goals, profile);
        self.run(project_dir, &args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maven_args() {
        let args = maven_args(
            Path::new("greeting-service/pom.xml"),
            "clean fabric8:deploy -DskipTests",
            "openshift",
        );
        assert_eq!(
            args,
            vec![
                "-f",
                "greeting-service/pom.xml",
                "clean",
                "fabric8:deploy",
                "-DskipTests",
                "-Popenshift",
                "-B"
            ]
        );
    }

    #[test]
    fn test_maven_args_without_profile() {
        let args = maven_args(Path::new("pom.xml"), "fabric8:deploy", "");
        assert_eq!(args, vec!["-f", "pom.xml", "fabric8:deploy", "-B"]);
    }

    #[tokio::test]
    async fn test_missing_executable() {
        let build = MavenBuild::with_executable("/nonexistent/mvn");
        let dir = tempfile::tempdir().unwrap();
        let result = build
            .run_build(dir.path(), Path::new("pom.xml"), "package", "openshift")
            .await;
        assert!(matches!(result, Err(BuildError::Spawn(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_build_keeps_output_tail() {
        let build = MavenBuild::with_executable("sh");
        let dir = tempfile::tempdir().unwrap();
        let args = vec![
            "-c".to_string(),
            "echo compiling; echo BUILD FAILURE; exit 3".to_string(),
        ];
        match build.run(dir.path(), &args).await {
            Err(BuildError::Failed {
                status,
                output_tail,
            }) => {
                assert_eq!(status, Some(3));
                assert!(output_tail.ends_with("BUILD FAILURE"));
            }
            other => panic!("expected build failure, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_build() {
        let build = MavenBuild::with_executable("sh");
        let dir = tempfile::tempdir().unwrap();
        let args = vec!["-c".to_string(), "echo BUILD SUCCESS".to_string()];
        assert!(build.run(dir.path(), &args).await.is_ok());
    }
}
