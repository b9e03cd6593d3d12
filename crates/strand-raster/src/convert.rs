//! Cached normalization of compressed inputs.
//!
//! Scenes sometimes arrive as LZW- or Deflate-compressed GeoTIFFs. Decoding
//! one costs a full decompression pass, so a compressed input is rewritten
//! once as an uncompressed sibling named `<stem>.uncompressed.tif` and that
//! file is reused on every later run. Already-uncompressed inputs pass
//! through untouched.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::geotiff::{self, TiffCompression};
use crate::RasterError;

/// Extension given to normalized copies, replacing the source extension.
const NORMALIZED_EXTENSION: &str = "uncompressed.tif";

/// Resolve the on-disk file a scene should be read from, converting a
/// compressed GeoTIFF to an uncompressed sibling the first time it is seen.
///
/// The conversion is cached by existence: when the sibling is already
/// present it is reused without inspecting its content. Concurrent callers
/// may both perform the conversion; the last write wins.
///
/// # Errors
///
/// Propagates open/decode failures from the input and write failures for
/// the normalized copy.
pub fn normalize(path: &Path) -> Result<PathBuf, RasterError> {
    if !geotiff::is_compressed(path)? {
        return Ok(path.to_path_buf());
    }

    let target = path.with_extension(NORMALIZED_EXTENSION);
    if target.exists() {
        debug!(path = %target.display(), "reusing cached uncompressed conversion");
        return Ok(target);
    }

    info!(
        from = %path.display(),
        to = %target.display(),
        "converting compressed geotiff"
    );
    let raster = geotiff::read(path)?;
    geotiff::write(&target, &raster, TiffCompression::Uncompressed)?;
    debug!(exists = target.exists(), path = %target.display(), "verified converted file");
    Ok(target)
}
