//! Image tag naming and the artifact paths derived from it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Identity of one image build within a batch.
///
/// The rendered form is `{version}-cuda{cuda}-{os}` and every artifact
/// of the build hangs off it: the Dockerfile name, the log file name,
/// and the image reference passed to `-t`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildTag {
    /// Image name (the part before `:` in the image reference).
    pub image: String,

    /// Library version being built.
    pub version: String,

    /// CUDA toolkit version of the base image.
    pub cuda: String,

    /// Base OS flavour of the base image.
    pub os: String,
}

impl BuildTag {
    /// Create a tag for one version of the matrix.
    pub fn new(image: &str, version: &str, cuda: &str, os: &str) -> Self {
        Self {
            image: image.to_string(),
            version: version.to_string(),
            cuda: cuda.to_string(),
            os: os.to_string(),
        }
    }

    /// Full image reference, e.g. `opencv:4.2.0-cuda10.0-ubuntu16.04`.
    pub fn image_ref(&self) -> String {
        format!("{}:{}", self.image, self)
    }

    /// Dockerfile path under the definitions directory (no extension).
    pub fn dockerfile_path(&self, dir: &Path) -> PathBuf {
        dir.join(self.to_string())
    }

    /// Log file path under the logs directory.
    pub fn log_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.txt", self))
    }
}

impl fmt::Display for BuildTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-cuda{}-{}", self.version, self.cuda, self.os)
    }
}
