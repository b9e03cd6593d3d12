//! Water mask vectorization.
//!
//! Turns the binary mask into lon/lat coastlines: optional morphological
//! closing to seal pixel-scale gaps, Suzuki-Abe contour tracing, a traced
//! length filter against map units, and one pass of corner cutting so the
//! 90-degree pixel staircase does not dominate the output.

use image::GrayImage;
use imageproc::contours::{find_contours, Contour};
use imageproc::distance_transform::Norm;
use imageproc::morphology;
use strand_export::GeoLine;
use strand_raster::{projection, BinaryRaster, Georef};
use tracing::debug;

use crate::types::{PipelineError, RunConfig};

/// Knobs for [`trace`], split from [`RunConfig`] so the vectorizer does not
/// see pathing or I/O settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceOptions {
    /// Minimum traced length in map units for a ring to be kept.
    pub minsize: f64,
    /// Morphological closing radius in pixels; zero disables closing.
    pub close: u32,
    /// Corner rounding strength, `0.0` through [`RunConfig::MAX_SMOOTH`].
    pub smooth: f64,
}

impl Default for TraceOptions {
    fn default() -> Self {
        Self {
            minsize: RunConfig::DEFAULT_MINSIZE,
            close: RunConfig::DEFAULT_CLOSE,
            smooth: RunConfig::DEFAULT_SMOOTH,
        }
    }
}

impl From<&RunConfig> for TraceOptions {
    fn from(config: &RunConfig) -> Self {
        Self {
            minsize: config.minsize,
            close: config.close,
            smooth: config.smooth,
        }
    }
}

/// Trace the water mask into lon/lat coastlines.
///
/// Rings come back closed (first point repeated last) and ordered as the
/// contour tracer found them. Invalid mask pixels count as background.
///
/// # Errors
///
/// Returns [`PipelineError::Raster`] when the mask's CRS cannot be
/// reprojected to lon/lat.
pub fn trace(binary: &BinaryRaster, options: &TraceOptions) -> Result<Vec<GeoLine>, PipelineError> {
    let georef = binary.georef();
    let foreground = foreground_image(binary);
    let mask = if options.close > 0 {
        let radius = u8::try_from(options.close).unwrap_or(u8::MAX);
        morphology::close(&foreground, Norm::LInf, radius)
    } else {
        foreground
    };

    let contours: Vec<Contour<u32>> = find_contours(&mask);
    debug!("traced {} raw contour(s)", contours.len());

    let fraction = (options.smooth / RunConfig::MAX_SMOOTH).clamp(0.0, 1.0) * 0.25;
    let mut lines = Vec::new();
    for contour in &contours {
        if contour.points.len() < 2 {
            continue;
        }
        let ring = close_ring(&contour.points, georef);
        if traced_length(&ring) < options.minsize {
            continue;
        }
        let rounded = round_corners(&ring, fraction);
        lines.push(GeoLine::new(to_lon_lat(&rounded, georef.epsg)?));
    }
    debug!("kept {} coastline(s)", lines.len());
    Ok(lines)
}

/// Foreground-only view of the mask; invalid pixels read as background.
fn foreground_image(binary: &BinaryRaster) -> GrayImage {
    let width = binary.width();
    GrayImage::from_fn(width, binary.height(), |x, y| {
        let i = (y * width + x) as usize;
        if binary.data()[i] == BinaryRaster::FOREGROUND {
            image::Luma([255])
        } else {
            image::Luma([0])
        }
    })
}

/// Contour pixels as closed map-coordinate ring, sampled at pixel centers.
fn close_ring(points: &[imageproc::point::Point<u32>], georef: Georef) -> Vec<(f64, f64)> {
    let mut ring: Vec<(f64, f64)> = points
        .iter()
        .map(|p| georef.pixel_to_map(f64::from(p.x) + 0.5, f64::from(p.y) + 0.5))
        .collect();
    if let Some(&first) = ring.first() {
        ring.push(first);
    }
    ring
}

fn traced_length(ring: &[(f64, f64)]) -> f64 {
    ring.windows(2)
        .map(|pair| (pair[1].0 - pair[0].0).hypot(pair[1].1 - pair[0].1))
        .sum()
}

/// One pass of corner cutting: each vertex is replaced by two points pulled
/// toward its neighbors by `fraction`. Ring closure is preserved; fractions
/// of zero and rings too short to cut come back unchanged.
fn round_corners(ring: &[(f64, f64)], fraction: f64) -> Vec<(f64, f64)> {
    if fraction <= 0.0 || ring.len() < 4 {
        return ring.to_vec();
    }
    // Work on the open ring so the seam vertex is not cut twice.
    let open = &ring[..ring.len() - 1];
    let n = open.len();
    let mut rounded = Vec::with_capacity(2 * n + 1);
    for i in 0..n {
        let here = open[i];
        let prev = open[(i + n - 1) % n];
        let next = open[(i + 1) % n];
        rounded.push(lerp(here, prev, fraction));
        rounded.push(lerp(here, next, fraction));
    }
    if let Some(&first) = rounded.first() {
        rounded.push(first);
    }
    rounded
}

fn lerp(a: (f64, f64), b: (f64, f64), t: f64) -> (f64, f64) {
    ((b.0 - a.0).mul_add(t, a.0), (b.1 - a.1).mul_add(t, a.1))
}

fn to_lon_lat(ring: &[(f64, f64)], epsg: u32) -> Result<Vec<(f64, f64)>, PipelineError> {
    if epsg == 4326 {
        return Ok(ring.to_vec());
    }
    let mut points = Vec::with_capacity(ring.len());
    for &(x, y) in ring {
        points.push(projection::project_point(epsg, 4326, x, y)?);
    }
    Ok(points)
}
