//! Image build execution with line-streamed log capture.

use crate::error::{BakeError, Result};
use crate::tag::BuildTag;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};

/// Result of a single image build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildOutcome {
    /// Tag that was built.
    pub tag: BuildTag,

    /// Exit code (0 = success, -1 = the build never ran).
    pub exit_code: i32,

    /// Duration in milliseconds.
    pub duration_ms: u64,

    /// Whether the build exited successfully.
    pub success: bool,

    /// Log file the build output was streamed to.
    pub log_path: PathBuf,

    /// Execution error when the build could not run at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BuildOutcome {
    /// Whether this build passed (exit code 0).
    pub fn passed(&self) -> bool {
        self.success && self.exit_code == 0
    }
}

/// Executes the build program for one rendered definition at a time.
#[derive(Debug, Clone)]
pub struct BuildRunner {
    /// Program invoked for builds (normally `docker`).
    pub program: String,

    /// Build context directory passed as the final argument.
    pub context: PathBuf,

    /// Per-build timeout in seconds (0 = no timeout).
    pub timeout_secs: u64,
}

impl Default for BuildRunner {
    fn default() -> Self {
        Self {
            program: "docker".to_string(),
            context: PathBuf::from("."),
            timeout_secs: 0,
        }
    }
}

impl BuildRunner {
    /// Build one image from `dockerfile`, streaming its stdout into
    /// `log_path`.
    ///
    /// Any previous log for the tag is removed before the child starts,
    /// so a rerun never leaves stale output behind. The child's stderr
    /// is discarded.
    ///
    /// A non-zero exit is an `Ok` outcome with `success == false`; `Err`
    /// means the build could not run (spawn failure, log I/O, timeout).
    pub async fn execute(
        &self,
        tag: &BuildTag,
        dockerfile: &Path,
        log_path: &Path,
    ) -> Result<BuildOutcome> {
        let start = Instant::now();

        match tokio::fs::remove_file(log_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(BakeError::Io(e)),
        }

        let mut log = File::create(log_path)
            .await
            .map_err(|source| BakeError::LogCreate {
                path: log_path.to_path_buf(),
                source,
            })?;

        let mut child = Command::new(&self.program)
            .arg("build")
            .arg("-f")
            .arg(dockerfile)
            .arg("-t")
            .arg(tag.image_ref())
            .arg(&self.context)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| BakeError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdout = child.stdout.take().expect("stdout is piped");

        let drained = if self.timeout_secs > 0 {
            match tokio::time::timeout(
                Duration::from_secs(self.timeout_secs),
                drain_and_wait(&mut child, stdout, &mut log),
            )
            .await
            {
                Ok(drained) => drained,
                Err(_) => {
                    child.kill().await.ok();
                    return Err(BakeError::BuildTimeout {
                        tag: tag.to_string(),
                        timeout_secs: self.timeout_secs,
                    });
                }
            }
        } else {
            drain_and_wait(&mut child, stdout, &mut log).await
        };

        let status = match drained {
            Ok(status) => status,
            Err(source) => {
                // Reap the child before returning the copy error.
                child.kill().await.ok();
                return Err(BakeError::Io(source));
            }
        };

        Ok(BuildOutcome {
            tag: tag.clone(),
            exit_code: status.code().unwrap_or(-1),
            duration_ms: start.elapsed().as_millis() as u64,
            success: status.success(),
            log_path: log_path.to_path_buf(),
            error: None,
        })
    }
}

/// Copy child stdout to the log one line per write, then reap the exit
/// status. Lines are copied as raw bytes; build tools emit output that
/// is not always valid UTF-8. The pipe must be drained before `wait()`
/// or the child can block forever on a full pipe.
async fn drain_and_wait(
    child: &mut Child,
    stdout: ChildStdout,
    log: &mut File,
) -> std::io::Result<std::process::ExitStatus> {
    let mut reader = BufReader::new(stdout);
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            break;
        }
        if !line.ends_with(b"\n") {
            line.push(b'\n');
        }
        log.write_all(&line).await?;
    }
    log.flush().await?;
    child.wait().await
}
