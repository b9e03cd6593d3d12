//! Normalized difference water index.

use strand_raster::{Band, Raster};
use tracing::debug;

use crate::composite::{GREEN, NIR};
use crate::types::PipelineError;

/// Output sentinel for pixels without a usable index value.
pub const NDWI_NODATA: f32 = -32_768.0;

/// Compute NDWI, `(green - nir) / (green + nir)`, across the scene.
///
/// Valid outputs lie in `[-1, 1]`. A pixel becomes [`NDWI_NODATA`] when
/// either input sample is the scene's nodata sentinel or not finite, when
/// an exclusion overlay covers the pixel, or when the denominator is zero.
/// `chunksize_mb` bounds how many rows are processed per pass; the result
/// does not depend on it.
///
/// # Errors
///
/// Returns [`PipelineError::MissingBand`] when the scene lacks a green or
/// NIR band.
#[allow(clippy::cast_possible_truncation)]
pub fn compute(scene: &Raster, chunksize_mb: f64) -> Result<Raster, PipelineError> {
    let green = scene
        .band_named(GREEN)
        .ok_or(PipelineError::MissingBand(GREEN))?
        .samples();
    let nir = scene
        .band_named(NIR)
        .ok_or(PipelineError::MissingBand(NIR))?
        .samples();

    let width = scene.width() as usize;
    let height = scene.height() as usize;
    let rows = chunk_rows(width, chunksize_mb);
    debug!("computing ndwi in chunks of {rows} rows");

    let mut samples = vec![NDWI_NODATA; scene.pixel_count()];
    for chunk_start in (0..height).step_by(rows) {
        let chunk_end = (chunk_start + rows).min(height);
        for index in chunk_start * width..chunk_end * width {
            let g = green[index];
            let n = nir[index];
            if scene.excluded(index)
                || !scene.is_measurement(g)
                || !scene.is_measurement(n)
                || !g.is_finite()
                || !n.is_finite()
            {
                continue;
            }
            let sum = f64::from(g) + f64::from(n);
            if sum == 0.0 {
                continue;
            }
            samples[index] = ((f64::from(g) - f64::from(n)) / sum) as f32;
        }
    }

    let index = Raster::new(
        scene.width(),
        scene.height(),
        vec![Band::new("ndwi", samples)],
        scene.georef(),
        scene.source(),
    )?;
    Ok(index.with_nodata(f64::from(NDWI_NODATA)))
}

/// Rows per pass under a working-set budget of green + NIR + output rows.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn chunk_rows(width: usize, chunksize_mb: f64) -> usize {
    let budget = (chunksize_mb * 1024.0 * 1024.0).max(0.0) as usize;
    let row_bytes = width.max(1) * 3 * 4;
    (budget / row_bytes).max(1)
}
