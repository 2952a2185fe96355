//! Build manifest: the version matrix and the Dockerfile inputs.
//!
//! A manifest is normally loaded from `cvbake.toml`. Every field falls
//! back to the built-in OpenCV/CUDA matrix when omitted, so a partial
//! manifest (say only `versions`) is valid.

use crate::error::{BakeError, Result};
use crate::tag::BuildTag;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// OpenCV versions built when no manifest overrides them.
pub const DEFAULT_VERSIONS: &[&str] = &[
    "3.0.0", "3.1.0", "3.2.0", "3.3.0", "3.3.1", "3.4.0", "3.4.2", "3.4.3", "3.4.4", "3.4.5",
    "3.4.8", "3.4.9", "4.0.0", "4.0.1", "4.1.0", "4.1.1", "4.2.0",
];

const DEFAULT_IMAGE: &str = "opencv";
const DEFAULT_CUDA: &str = "10.0";
const DEFAULT_OS: &str = "ubuntu16.04";

// Install order matters to apt resolution on the old Ubuntu base images.
const DEFAULT_DEPENDENCIES: &[&str] = &[
    "build-essential",
    "cmake",
    "wget",
    "unzip",
    "libgtk2.0-dev",
    "pkg-config",
    "libavcodec-dev",
    "libavformat-dev",
    "libswscale-dev",
    "libpq-dev",
    "python-dev",
    "python-numpy",
    "python3-dev",
    "python3-numpy",
    "libtbb2",
    "libtbb-dev",
    "libjpeg-dev",
    "libpng-dev",
    "libtiff-dev",
    "libjasper-dev",
    "libdc1394-22-dev",
    "libavformat-dev",
    "libtheora-dev",
    "libvorbis-dev",
    "libxvidcore-dev",
    "libx264-dev",
    "yasm",
    "libopencore-amrnb-dev",
    "libopencore-amrwb-dev",
    "libv4l-dev",
    "libxine2-dev",
    "libgstreamer1.0-dev",
    "libgstreamer-plugins-base1.0-dev",
    "libeigen3-dev",
    "libglew-dev",
    "libtiff5-dev",
    "zlib1g-dev",
    "libpng12-dev",
    "libavformat-dev",
    "libavutil-dev",
    "libpostproc-dev",
    "libvtk6-dev",
];

const DEFAULT_CMAKE_OPTIONS: &[&str] = &[
    "CMAKE_BUILD_TYPE=Release",
    "CMAKE_INSTALL_PREFIX=/usr/local",
    "BUILD_EXAMPLES=OFF",
    "WITH_TBB=ON",
    "WITH_IPP=ON",
    "FORCE_VTK=ON",
    "WITH_V4L=ON",
    "WITH_XINE=ON",
    "WITH_GDAL=ON",
    "WITH_OPENCL=ON",
    "WITH_OPENGL=ON",
    "BUILD_opencv_cudacodec=OFF",
    "ENABLE_FAST_MATH=ON",
    "CUDA_FAST_MATH=ON",
    "WITH_CUDA=ON",
    "CUDA_ARCH_BIN='3.0 3.5 3.7 5.0 5.2 6.0 6.1 6.2 7.0 7.5'",
    "CUDA_ARCH_PTX='3.0 3.5 3.7 5.0 5.2 6.0 6.1 6.2 7.0 7.5'",
    "OPENCV_DNN_CUDA=OFF",
    "WITH_CUBLAS=ON",
    "WITH_CUFFT=ON",
    "WITH_EIGEN=ON",
    "EIGEN_INCLUDE_PATH=/usr/include/eigen3",
];

/// Build matrix for one batch of image builds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Manifest {
    /// Image name the builds are tagged with.
    #[serde(default = "default_image")]
    pub image: String,

    /// CUDA toolkit version baked into the base image reference.
    #[serde(default = "default_cuda")]
    pub cuda: String,

    /// Base OS flavour of the `nvidia/cuda` image.
    #[serde(default = "default_os")]
    pub os: String,

    /// Versions to build, in batch order.
    #[serde(default = "default_versions")]
    pub versions: Vec<String>,

    /// Apt packages installed into every image, in install order.
    #[serde(default = "default_dependencies")]
    pub dependencies: Vec<String>,

    /// CMake `-D` options passed to the library build.
    #[serde(default = "default_cmake_options")]
    pub cmake_options: Vec<String>,
}

fn default_image() -> String {
    DEFAULT_IMAGE.to_string()
}

fn default_cuda() -> String {
    DEFAULT_CUDA.to_string()
}

fn default_os() -> String {
    DEFAULT_OS.to_string()
}

fn default_versions() -> Vec<String> {
    owned(DEFAULT_VERSIONS)
}

fn default_dependencies() -> Vec<String> {
    owned(DEFAULT_DEPENDENCIES)
}

fn default_cmake_options() -> Vec<String> {
    owned(DEFAULT_CMAKE_OPTIONS)
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            image: default_image(),
            cuda: default_cuda(),
            os: default_os(),
            versions: default_versions(),
            dependencies: default_dependencies(),
            cmake_options: default_cmake_options(),
        }
    }
}

impl Manifest {
    /// Load a manifest from a TOML file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| BakeError::ManifestRead {
            path: path.to_path_buf(),
            source,
        })?;
        let manifest: Manifest =
            toml::from_str(&raw).map_err(|source| BakeError::ManifestParse {
                path: path.to_path_buf(),
                source,
            })?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Render the manifest as pretty TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check structural requirements.
    ///
    /// An empty version list is allowed and produces a zero-build batch.
    /// An empty dependency list is not: the rendered apt `RUN` line
    /// continues onto the first package.
    pub fn validate(&self) -> Result<()> {
        if self.image.is_empty() {
            return Err(BakeError::InvalidManifest(
                "image must not be empty".to_string(),
            ));
        }
        if self.cuda.is_empty() {
            return Err(BakeError::InvalidManifest(
                "cuda must not be empty".to_string(),
            ));
        }
        if self.os.is_empty() {
            return Err(BakeError::InvalidManifest(
                "os must not be empty".to_string(),
            ));
        }
        if let Some(pos) = self.versions.iter().position(|v| v.is_empty()) {
            return Err(BakeError::InvalidManifest(format!(
                "version entry {} is empty",
                pos
            )));
        }
        if self.dependencies.is_empty() {
            return Err(BakeError::InvalidManifest(
                "dependencies must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Tags for every version, in batch order.
    pub fn tags(&self) -> Vec<BuildTag> {
        self.versions
            .iter()
            .map(|v| BuildTag::new(&self.image, v, &self.cuda, &self.os))
            .collect()
    }

    /// Deterministic digest of the full matrix, order sensitive.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for field in [&self.image, &self.cuda, &self.os] {
            hasher.update(field.as_bytes());
            hasher.update(b"\0");
        }
        // Terminate each list so entries cannot shift between lists.
        for list in [&self.versions, &self.dependencies, &self.cmake_options] {
            for entry in list {
                hasher.update(entry.as_bytes());
                hasher.update(b"\0");
            }
            hasher.update(b"\0");
        }
        hex::encode(hasher.finalize())
    }
}
