//! Integration tests driving full batches with cheap stand-in programs.

use cvbake_core::{BakePipeline, BatchReport, BuildRunner, Manifest};
use std::path::Path;

fn small_manifest(versions: &[&str]) -> Manifest {
    let mut manifest = Manifest::default();
    manifest.versions = versions.iter().map(|v| v.to_string()).collect();
    manifest.dependencies = vec!["build-essential".to_string(), "cmake".to_string()];
    manifest.cmake_options = vec!["WITH_CUDA=ON".to_string()];
    manifest
}

fn pipeline_for(root: &Path, program: &str, jobs: usize) -> BakePipeline {
    BakePipeline {
        dockerfiles_dir: root.join("dockerfiles"),
        logs_dir: root.join("logs"),
        jobs,
        runner: BuildRunner {
            program: program.to_string(),
            ..BuildRunner::default()
        },
    }
}

/// Test: successful batch writes a definition and a log per version.
#[tokio::test]
async fn test_successful_batch() {
    let root = tempfile::tempdir().unwrap();
    let manifest = small_manifest(&["3.4.9", "4.2.0"]);
    let pipeline = pipeline_for(root.path(), "echo", 1);

    let result = pipeline.run(&manifest).await.expect("batch failed");

    assert!(result.success, "batch should succeed");
    assert_eq!(result.passed_count(), 2, "both builds should pass");
    assert_eq!(result.failed_count(), 0, "no builds should fail");
    assert!(!result.run_id.is_empty(), "run ID should be set");

    for tag in manifest.tags() {
        let definition = tag.dockerfile_path(&pipeline.dockerfiles_dir);
        assert!(definition.exists(), "definition for {tag} should exist");

        // The stand-in echoes its arguments, so the log records the exact
        // build invocation.
        let log = std::fs::read_to_string(tag.log_path(&pipeline.logs_dir))
            .expect("log should exist");
        assert!(log.contains("build -f"));
        assert!(log.contains(&format!("-t {}", tag.image_ref())));
    }
}

/// Test: a failed build is captured and the batch moves on.
#[tokio::test]
async fn test_failed_build_captured() {
    let root = tempfile::tempdir().unwrap();
    let manifest = small_manifest(&["3.0.0", "3.1.0"]);
    let pipeline = pipeline_for(root.path(), "false", 1);

    let result = pipeline.run(&manifest).await.expect("batch failed");

    assert!(!result.success, "batch should report failure");
    assert_eq!(result.outcomes.len(), 2, "both versions should be attempted");
    assert_eq!(result.failed_count(), 2);
    for outcome in &result.outcomes {
        assert_ne!(outcome.exit_code, 0);
        assert!(outcome.error.is_none(), "a non-zero exit is not an execution error");
    }
}

/// Test: rerunning a batch replaces the previous logs.
#[tokio::test]
async fn test_rerun_replaces_stale_logs() {
    let root = tempfile::tempdir().unwrap();
    let manifest = small_manifest(&["4.2.0"]);
    let pipeline = pipeline_for(root.path(), "echo", 1);

    pipeline.ensure_dirs().unwrap();
    let log_path = manifest.tags()[0].log_path(&pipeline.logs_dir);
    std::fs::write(&log_path, "stale output from an earlier run\n").unwrap();

    pipeline.run(&manifest).await.expect("batch failed");

    let log = std::fs::read_to_string(&log_path).unwrap();
    assert!(!log.contains("stale"), "old log content should be gone");
}

/// Test: spawn failure is recorded with exit code -1 and the batch continues.
#[tokio::test]
async fn test_spawn_error_recorded_as_failed_outcome() {
    let root = tempfile::tempdir().unwrap();
    let manifest = small_manifest(&["3.0.0", "3.1.0"]);
    let pipeline = pipeline_for(root.path(), "/nonexistent-binary-that-does-not-exist", 1);

    let result = pipeline.run(&manifest).await.expect("batch run should not fail");

    assert!(!result.success, "batch should report failure");
    assert_eq!(result.outcomes.len(), 2, "both versions should be recorded");
    for outcome in &result.outcomes {
        assert_eq!(outcome.exit_code, -1, "execution error should use exit code -1");
        assert!(outcome.error.is_some(), "execution error should be captured");
    }
}

/// Test: a bounded parallel batch produces the same outcomes as sequential.
#[tokio::test]
async fn test_parallel_batch_matches_sequential() {
    let versions = ["3.0.0", "3.1.0", "3.2.0", "4.2.0"];
    let manifest = small_manifest(&versions);

    let seq_root = tempfile::tempdir().unwrap();
    let sequential = pipeline_for(seq_root.path(), "echo", 1)
        .run(&manifest)
        .await
        .expect("sequential batch failed");

    let par_root = tempfile::tempdir().unwrap();
    let parallel = pipeline_for(par_root.path(), "echo", 3)
        .run(&manifest)
        .await
        .expect("parallel batch failed");

    assert_eq!(sequential.outcomes.len(), parallel.outcomes.len());
    for (seq, par) in sequential.outcomes.iter().zip(&parallel.outcomes) {
        assert_eq!(seq.tag, par.tag, "outcome order should match the manifest");
        assert_eq!(seq.passed(), par.passed());
    }
}

/// Test: report artifact survives a write/read cycle with the batch numbers.
#[tokio::test]
async fn test_report_written_from_batch() {
    let root = tempfile::tempdir().unwrap();
    let manifest = small_manifest(&["3.4.9"]);
    let pipeline = pipeline_for(root.path(), "echo", 1);

    let result = pipeline.run(&manifest).await.expect("batch failed");

    let report_path = root.path().join("batch_report.json");
    let report = BatchReport::from_result(&result);
    cvbake_core::write_batch_report_json(&report_path, &report).expect("write report");

    let parsed: BatchReport =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap())
            .expect("parse report");
    assert_eq!(parsed.summary.total_builds, 1);
    assert_eq!(parsed.summary.passed_builds, 1);
    assert!(parsed.summary.success);
    assert_eq!(parsed.run_id, result.run_id);
}

/// Test: every line a builder prints lands in the log, newline-terminated.
#[cfg(unix)]
#[tokio::test]
async fn test_logs_capture_multiline_builder_output() {
    use std::os::unix::fs::PermissionsExt;

    let root = tempfile::tempdir().unwrap();
    let script = root.path().join("fake-builder");
    std::fs::write(
        &script,
        "#!/bin/sh\necho 'Step 1/9 : FROM nvidia/cuda'\necho 'Successfully built'\n",
    )
    .unwrap();
    let mut perms = std::fs::metadata(&script).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&script, perms).unwrap();

    let manifest = small_manifest(&["4.2.0"]);
    let pipeline = pipeline_for(root.path(), &script.display().to_string(), 1);

    let result = pipeline.run(&manifest).await.expect("batch failed");
    assert!(result.success);

    let log = std::fs::read_to_string(manifest.tags()[0].log_path(&pipeline.logs_dir)).unwrap();
    assert_eq!(log, "Step 1/9 : FROM nvidia/cuda\nSuccessfully built\n");
}
