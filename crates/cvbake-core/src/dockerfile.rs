//! Dockerfile rendering for one version of the build matrix.
//!
//! The renderer is pure text assembly. It never touches the filesystem
//! and performs no Dockerfile validation; writing and building are the
//! pipeline's job.

use crate::manifest::Manifest;

/// Render the Dockerfile for `version`.
///
/// The version literal appears once, in the `ARG OPENCV_VERSION` line;
/// every later reference goes through the build arg. Output is
/// deterministic and carries no trailing newline.
pub fn render(manifest: &Manifest, version: &str) -> String {
    let mut lines: Vec<String> = Vec::new();

    lines.push(format!(
        "FROM nvidia/cuda:{}-cudnn7-devel-{}",
        manifest.cuda, manifest.os
    ));
    lines.push("ENV DEBIAN_FRONTEND noninteractive".to_string());
    lines.push(format!("ARG OPENCV_VERSION='{}'", version));

    // apt packages, all but the last line continued
    lines.push(
        r"RUN apt-get update -y && apt-get install -y --no-install-recommends \".to_string(),
    );
    for (i, dep) in manifest.dependencies.iter().enumerate() {
        if i + 1 == manifest.dependencies.len() {
            lines.push(format!("\t{}", dep));
        } else {
            lines.push(format!("\t{} \\", dep));
        }
    }

    // fetch and unpack the sources
    lines.push("WORKDIR /opt".to_string());
    let fetch = [
        r"RUN wget https://github.com/opencv/opencv/archive/${OPENCV_VERSION}.zip && \",
        r"unzip ${OPENCV_VERSION}.zip && rm ${OPENCV_VERSION}.zip && \",
        r"mv opencv-${OPENCV_VERSION} opencv && \",
        r"wget https://github.com/opencv/opencv_contrib/archive/${OPENCV_VERSION}.zip && \",
        r"unzip ${OPENCV_VERSION}.zip && rm ${OPENCV_VERSION}.zip && \",
        r"mv opencv_contrib-${OPENCV_VERSION} opencv/opencv_contrib && \",
        r"mkdir /opt/opencv/build && cd /opt/opencv/build && \",
    ];
    lines.extend(fetch.iter().map(|l| l.to_string()));

    // configure and build
    lines.push(r"cmake \".to_string());
    for opt in &manifest.cmake_options {
        lines.push(format!("\t-D {} \\", opt));
    }
    lines.push(r".. && \".to_string());
    lines.push(r"make install && \".to_string());
    lines.push("make clean".to_string());

    lines.join("\n")
}
