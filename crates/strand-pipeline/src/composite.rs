//! Band composition: open one or two GeoTIFFs as a green/NIR scene.
//!
//! Compressed inputs are normalized to uncompressed siblings first (see
//! [`convert`]), but the scene keeps the original file's stem as its source
//! so artifact names never inherit the `.uncompressed` infix.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use strand_raster::{convert, geotiff, Raster, RasterError};
use tracing::info;

use crate::types::PipelineError;

/// Band name the water index reads green reflectance from.
pub const GREEN: &str = "green";
/// Band name the water index reads near-infrared reflectance from.
pub const NIR: &str = "nir";

/// Open the input files as one two-band scene labeled [`GREEN`] and [`NIR`].
///
/// One path selects both bands from a single file; two paths contribute one
/// band each, green first. `bands` holds 1-based band numbers, and `nodata`
/// overrides whatever sentinel the files themselves declare.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] when `inputs` is empty or longer
/// than two, and propagates open, decode, band selection, and dimension
/// mismatch failures as [`PipelineError::Raster`].
pub fn open_scene(
    inputs: &[PathBuf],
    bands: [usize; 2],
    nodata: f64,
) -> Result<Raster, PipelineError> {
    let composed = match inputs {
        [single] => open_one(single, &bands)?,
        [green_path, nir_path] => {
            let green = open_one(green_path, &bands[..1])?;
            let nir = open_one(nir_path, &bands[1..])?;
            if green.width() != nir.width() || green.height() != nir.height() {
                return Err(RasterError::DimensionMismatch {
                    width: green.width(),
                    height: green.height(),
                    other_width: nir.width(),
                    other_height: nir.height(),
                }
                .into());
            }
            green.with_band(nir.band(0)?.clone())?
        }
        _ => {
            return Err(PipelineError::InvalidConfig(format!(
                "expected 1 or 2 input scenes, got {}",
                inputs.len()
            )));
        }
    };
    Ok(composed
        .with_band_names(&[GREEN, NIR])
        .with_nodata(nodata))
}

/// Open one file and keep the given 1-based bands, in order.
fn open_one(path: &Path, take: &[usize]) -> Result<Raster, PipelineError> {
    let readable = convert::normalize(path)?;
    let numbers = take
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    info!("opening {} (bands {numbers})", path.display());

    let file = File::open(&readable)?;
    let raster = geotiff::read_from(BufReader::new(file), &source_stem(path))?;
    Ok(raster.select(take)?)
}

/// Stem of the file the user named, not of any normalized sibling.
fn source_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
