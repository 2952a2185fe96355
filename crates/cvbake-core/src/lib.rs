//! cvbake core library
//!
//! Everything needed to bake a matrix of OpenCV/CUDA Docker images:
//! - A TOML manifest describing the version matrix ([`manifest::Manifest`])
//! - A deterministic Dockerfile renderer ([`dockerfile::render`])
//! - A build runner that streams `docker build` output to per-tag logs
//!   ([`runner::BuildRunner`])
//! - A batch pipeline that keeps going when individual builds fail
//!   ([`pipeline::BakePipeline`])

pub mod dockerfile;
pub mod error;
pub mod manifest;
pub mod pipeline;
pub mod report;
pub mod runner;
pub mod tag;
pub mod telemetry;

// Re-export key types
pub use error::{BakeError, Result};
pub use manifest::Manifest;
pub use pipeline::{BakePipeline, BatchResult};
pub use report::{write_batch_report_json, BatchReport};
pub use runner::{BuildOutcome, BuildRunner};
pub use tag::BuildTag;
pub use telemetry::init_tracing;
