//! Artifact naming and output directory policy.
//!
//! Every run writes its files under a single `<outdir>/<basename>` prefix.
//! The prefix doubles as the idempotence key: a `.geojson` at the prefix
//! means the run already happened.

use std::path::{Path, PathBuf};

use tracing::info;

/// The artifact paths a run can produce, sharing one name prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSet {
    outdir: PathBuf,
    basename: String,
}

impl ArtifactSet {
    /// Bind a prefix. `basename` is used verbatim; strip path-like
    /// characters with [`sanitize_basename`] first.
    #[must_use]
    pub fn new(outdir: &Path, basename: &str) -> Self {
        Self {
            outdir: outdir.to_path_buf(),
            basename: basename.to_string(),
        }
    }

    /// The name prefix shared by all artifacts.
    #[must_use]
    pub fn basename(&self) -> &str {
        &self.basename
    }

    /// Water index raster (`_ndwi.tif`).
    #[must_use]
    pub fn ndwi(&self) -> PathBuf {
        self.named("_ndwi.tif")
    }

    /// Region-masked water index raster (`_coastmask.tif`).
    #[must_use]
    pub fn coastmask(&self) -> PathBuf {
        self.named("_coastmask.tif")
    }

    /// Binary water mask (`_thresh.tif`).
    #[must_use]
    pub fn thresh(&self) -> PathBuf {
        self.named("_thresh.tif")
    }

    /// Cloud exclusion grid (`_cloudmask.tif`).
    #[must_use]
    pub fn cloudmask(&self) -> PathBuf {
        self.named("_cloudmask.tif")
    }

    /// Final coastline GeoJSON (`.geojson`).
    #[must_use]
    pub fn geojson(&self) -> PathBuf {
        self.named(".geojson")
    }

    fn named(&self, suffix: &str) -> PathBuf {
        self.outdir.join(format!("{}{suffix}", self.basename))
    }
}

/// Strip `.`, `/`, and `\` from an artifact basename so it cannot name a
/// different directory or smuggle in an extension.
#[must_use]
pub fn sanitize_basename(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '.' | '/' | '\\'))
        .collect()
}

/// Resolve a requested output directory against the working directory.
///
/// An empty request means the working directory. A request that does not
/// exist, cannot be resolved, or resolves outside the working directory is
/// replaced by the working directory with an info log. When the working
/// directory itself cannot be determined, `.` stands in for it.
#[must_use]
pub fn validate_outdir(requested: &Path) -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    if requested.as_os_str().is_empty() {
        return cwd;
    }
    match requested.canonicalize() {
        Ok(resolved) if resolved.is_dir() && resolved.starts_with(&cwd) => resolved,
        _ => {
            info!(
                "output directory {} is unusable, writing to {}",
                requested.display(),
                cwd.display()
            );
            cwd
        }
    }
}
