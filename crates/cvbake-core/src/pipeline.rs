//! Batch orchestration: render, write, and build every version in turn.

use crate::dockerfile;
use crate::error::{BakeError, Result};
use crate::manifest::Manifest;
use crate::runner::{BuildOutcome, BuildRunner};
use crate::tag::BuildTag;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tempfile::NamedTempFile;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

/// Result of a complete batch run.
#[derive(Debug, Clone)]
pub struct BatchResult {
    /// Identifier of this batch run.
    pub run_id: String,

    /// Digest of the manifest the batch was built from.
    pub manifest_digest: String,

    /// Whether every build passed.
    pub success: bool,

    /// Outcomes in manifest order.
    pub outcomes: Vec<BuildOutcome>,

    /// Total duration in milliseconds.
    pub duration_ms: u64,
}

impl BatchResult {
    /// Number of builds that passed.
    pub fn passed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed()).count()
    }

    /// Number of builds that failed.
    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.passed()).count()
    }
}

/// Orchestrates a full batch over the manifest's version matrix.
///
/// For each version the pipeline renders the Dockerfile, writes it under
/// [`dockerfiles_dir`], and hands it to the runner. A failed build does
/// not stop the batch; only manifest and filesystem errors do.
///
/// [`dockerfiles_dir`]: BakePipeline::dockerfiles_dir
#[derive(Debug, Clone)]
pub struct BakePipeline {
    /// Directory the rendered Dockerfiles are written to.
    pub dockerfiles_dir: PathBuf,

    /// Directory the per-tag build logs are written to.
    pub logs_dir: PathBuf,

    /// Maximum number of builds in flight (0 or 1 = strictly sequential).
    pub jobs: usize,

    /// Runner used for the individual builds.
    pub runner: BuildRunner,
}

impl Default for BakePipeline {
    fn default() -> Self {
        Self {
            dockerfiles_dir: PathBuf::from("dockerfiles"),
            logs_dir: PathBuf::from("logs"),
            jobs: 1,
            runner: BuildRunner::default(),
        }
    }
}

impl BakePipeline {
    /// Run the full batch for `manifest`.
    pub async fn run(&self, manifest: &Manifest) -> Result<BatchResult> {
        let start = Instant::now();
        manifest.validate()?;

        let run_id = Uuid::new_v4().to_string();
        info!(
            run_id = %run_id,
            image = %manifest.image,
            versions = manifest.versions.len(),
            jobs = self.jobs,
            "starting batch"
        );

        self.ensure_dirs()?;

        let outcomes = if self.jobs > 1 {
            self.run_parallel(manifest).await?
        } else {
            self.run_sequential(manifest).await?
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let success = outcomes.iter().all(|o| o.passed());

        if success {
            info!(run_id = %run_id, duration_ms, "batch completed");
        } else {
            warn!(
                run_id = %run_id,
                failed = outcomes.iter().filter(|o| !o.passed()).count(),
                duration_ms,
                "batch finished with failures"
            );
        }

        Ok(BatchResult {
            run_id,
            manifest_digest: manifest.digest(),
            success,
            outcomes,
            duration_ms,
        })
    }

    /// Create the output directories when missing.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.dockerfiles_dir, &self.logs_dir] {
            if !dir.exists() {
                std::fs::create_dir_all(dir).map_err(|source| BakeError::OutputDir {
                    path: dir.clone(),
                    source,
                })?;
                info!(dir = %dir.display(), "created output directory");
            }
        }
        Ok(())
    }

    /// Render and write the definition for `tag`, atomically.
    pub fn write_definition(&self, manifest: &Manifest, tag: &BuildTag) -> Result<PathBuf> {
        let contents = dockerfile::render(manifest, &tag.version);
        let path = tag.dockerfile_path(&self.dockerfiles_dir);
        atomic_write(&self.dockerfiles_dir, &path, &contents).map_err(|source| {
            BakeError::DefinitionWrite {
                path: path.clone(),
                source,
            }
        })?;
        Ok(path)
    }

    async fn run_sequential(&self, manifest: &Manifest) -> Result<Vec<BuildOutcome>> {
        let mut outcomes = Vec::with_capacity(manifest.versions.len());
        for tag in manifest.tags() {
            let dockerfile_path = self.write_definition(manifest, &tag)?;
            outcomes.push(self.execute_logged(tag, dockerfile_path).await);
        }
        Ok(outcomes)
    }

    async fn run_parallel(&self, manifest: &Manifest) -> Result<Vec<BuildOutcome>> {
        // All definitions are written before any build spawns, so a write
        // error aborts the batch while nothing is running yet.
        let mut jobs = Vec::with_capacity(manifest.versions.len());
        for tag in manifest.tags() {
            let dockerfile_path = self.write_definition(manifest, &tag)?;
            jobs.push((tag, dockerfile_path));
        }

        let semaphore = Arc::new(Semaphore::new(self.jobs));
        let mut handles: Vec<JoinHandle<BuildOutcome>> = Vec::new();

        for (tag, dockerfile_path) in jobs {
            let semaphore = Arc::clone(&semaphore);
            let pipeline = self.clone();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore is never closed");
                pipeline.execute_logged(tag, dockerfile_path).await
            }));
        }

        // Join in submission order so outcomes line up with the manifest.
        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            outcomes.push(handle.await?);
        }
        Ok(outcomes)
    }

    /// Run one build, converting execution errors into failed outcomes.
    async fn execute_logged(&self, tag: BuildTag, dockerfile_path: PathBuf) -> BuildOutcome {
        let start = Instant::now();
        info!(tag = %tag, "building image");

        let log_path = tag.log_path(&self.logs_dir);
        let outcome = match self.runner.execute(&tag, &dockerfile_path, &log_path).await {
            Ok(outcome) => outcome,
            Err(e) => {
                // The build never ran; report a failed outcome so the batch
                // keeps going.
                warn!(tag = %tag, error = %e, "build did not run");
                BuildOutcome {
                    tag,
                    exit_code: -1,
                    duration_ms: start.elapsed().as_millis() as u64,
                    success: false,
                    log_path,
                    error: Some(e.to_string()),
                }
            }
        };

        if outcome.passed() {
            info!(tag = %outcome.tag, duration_ms = outcome.duration_ms, "build succeeded");
        } else if outcome.error.is_none() {
            warn!(tag = %outcome.tag, exit_code = outcome.exit_code, "build failed");
        }

        outcome
    }
}

/// Write to a temp file in the target directory, then rename into place.
fn atomic_write(dir: &Path, path: &Path, contents: &str) -> std::io::Result<()> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
