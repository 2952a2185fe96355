//! Batch report artifact for CI and automation to consume.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::pipeline::BatchResult;

/// Single build entry in the persisted batch report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuildReportEntry {
    pub tag: String,
    pub version: String,
    pub image_ref: String,
    pub exit_code: i32,
    pub duration_ms: u64,
    pub passed: bool,
    pub log_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary section persisted in the batch report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchSummaryArtifact {
    pub total_builds: usize,
    pub passed_builds: usize,
    pub failed_builds: usize,
    pub success: bool,
}

/// Canonical batch report artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchReport {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub run_id: String,
    pub manifest_digest: String,
    pub summary: BatchSummaryArtifact,
    pub builds: Vec<BuildReportEntry>,
}

impl BatchReport {
    /// Assemble the report artifact from a finished batch.
    pub fn from_result(result: &BatchResult) -> Self {
        let builds: Vec<BuildReportEntry> = result
            .outcomes
            .iter()
            .map(|o| BuildReportEntry {
                tag: o.tag.to_string(),
                version: o.tag.version.clone(),
                image_ref: o.tag.image_ref(),
                exit_code: o.exit_code,
                duration_ms: o.duration_ms,
                passed: o.passed(),
                log_path: o.log_path.display().to_string(),
                error: o.error.clone(),
            })
            .collect();

        Self {
            schema_version: "1.0".to_string(),
            generated_at: Utc::now(),
            run_id: result.run_id.clone(),
            manifest_digest: result.manifest_digest.clone(),
            summary: BatchSummaryArtifact {
                total_builds: builds.len(),
                passed_builds: result.passed_count(),
                failed_builds: result.failed_count(),
                success: result.success,
            },
            builds,
        }
    }
}

/// Write the batch report in pretty JSON format.
pub fn write_batch_report_json(path: &Path, report: &BatchReport) -> Result<()> {
    let content = serde_json::to_string_pretty(report).context("serialize batch report")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}
