//! Error taxonomy for manifest handling and batch builds.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by cvbake operations.
///
/// Manifest and filesystem errors abort a batch; a build that spawns but
/// exits non-zero is not an error here, it is a failed [`BuildOutcome`].
///
/// [`BuildOutcome`]: crate::runner::BuildOutcome
#[derive(Error, Debug)]
pub enum BakeError {
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("manifest {path:?} could not be read: {source}")]
    ManifestRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("manifest {path:?} could not be parsed: {source}")]
    ManifestParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("manifest encode error: {0}")]
    ManifestEncode(#[from] toml::ser::Error),

    #[error("output directory {path:?} could not be created: {source}")]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("definition {path:?} could not be written: {source}")]
    DefinitionWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("log file {path:?} could not be created: {source}")]
    LogCreate {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("build for {tag} timed out after {timeout_secs}s")]
    BuildTimeout { tag: String, timeout_secs: u64 },

    #[error("build task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for cvbake operations.
pub type Result<T> = std::result::Result<T, BakeError>;
