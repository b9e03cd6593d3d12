//! Otsu threshold selection and water mask binarization.
//!
//! The histogram always spans the full index domain `[-1, 1]` rather than
//! the observed sample range, so the chosen threshold is comparable between
//! scenes.

use strand_raster::{BinaryRaster, Raster};
use tracing::debug;

use crate::types::PipelineError;

/// Histogram resolution over the index domain.
const BINS: usize = 256;
/// Lower edge of the histogram domain.
const DOMAIN_MIN: f64 = -1.0;
/// Upper edge of the histogram domain.
const DOMAIN_MAX: f64 = 1.0;

/// Pick the threshold separating water from background by maximizing the
/// between-class variance of the index histogram.
///
/// Ties go to the first maximum encountered, scanning from the low end of
/// the domain. The returned value is the upper edge of the winning bin, so
/// a strictly-greater comparison keeps that whole bin in the background.
/// A histogram with only one occupied class yields that bin's upper edge,
/// classifying every pixel as background. Returns `None` when the raster
/// has no valid pixels at all.
#[must_use]
pub fn otsu_threshold(index: &Raster) -> Option<f64> {
    let (histogram, total) = build_histogram(index);
    if total == 0.0 {
        return None;
    }

    #[allow(clippy::cast_precision_loss)]
    let sum_total: f64 = histogram
        .iter()
        .enumerate()
        .map(|(bin, &count)| bin as f64 * count)
        .sum();

    let mut best: Option<usize> = None;
    let mut best_variance = 0.0_f64;
    let mut weight_bg = 0.0_f64;
    let mut sum_bg = 0.0_f64;
    for (bin, &count) in histogram.iter().enumerate() {
        weight_bg += count;
        if weight_bg == 0.0 {
            continue;
        }
        let weight_fg = total - weight_bg;
        if weight_fg == 0.0 {
            break;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            sum_bg += bin as f64 * count;
        }
        let mean_bg = sum_bg / weight_bg;
        let mean_fg = (sum_total - sum_bg) / weight_fg;
        let spread = mean_bg - mean_fg;
        let variance = weight_bg * weight_fg * spread * spread;
        if variance > best_variance {
            best_variance = variance;
            best = Some(bin);
        }
    }

    let bin = best.unwrap_or_else(|| last_occupied(&histogram));
    let threshold = bin_upper_edge(bin);
    debug!("otsu threshold = {threshold}");
    Some(threshold)
}

/// Split the index into a binary water mask against `threshold`.
///
/// Values strictly greater than the threshold become
/// [`BinaryRaster::FOREGROUND`]; other measurements become
/// [`BinaryRaster::BACKGROUND`]; nodata, non-finite, and excluded pixels
/// become [`BinaryRaster::INVALID`].
///
/// # Errors
///
/// Returns [`PipelineError::Raster`] when the raster has no first band.
pub fn binarize(index: &Raster, threshold: f64) -> Result<BinaryRaster, PipelineError> {
    let samples = index.band(0)?.samples();
    let data: Vec<u8> = samples
        .iter()
        .enumerate()
        .map(|(i, &value)| {
            if index.excluded(i) || !index.is_measurement(value) || !value.is_finite() {
                BinaryRaster::INVALID
            } else if f64::from(value) > threshold {
                BinaryRaster::FOREGROUND
            } else {
                BinaryRaster::BACKGROUND
            }
        })
        .collect();

    Ok(BinaryRaster::new(
        index.width(),
        index.height(),
        data,
        index.georef(),
        index.source(),
    )?)
}

/// Count valid samples into fixed-domain bins.
fn build_histogram(index: &Raster) -> ([f64; BINS], f64) {
    let mut histogram = [0.0_f64; BINS];
    let mut total = 0.0_f64;
    let Ok(band) = index.band(0) else {
        return (histogram, total);
    };
    for (i, &value) in band.samples().iter().enumerate() {
        if index.excluded(i) || !index.is_measurement(value) || !value.is_finite() {
            continue;
        }
        histogram[bin_index(f64::from(value))] += 1.0;
        total += 1.0;
    }
    (histogram, total)
}

/// Bin holding `value`; out-of-domain values land in the edge bins.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn bin_index(value: f64) -> usize {
    let span = DOMAIN_MAX - DOMAIN_MIN;
    #[allow(clippy::cast_precision_loss)]
    let position = (value - DOMAIN_MIN) / span * BINS as f64;
    (position.max(0.0) as usize).min(BINS - 1)
}

#[allow(clippy::cast_precision_loss)]
fn bin_upper_edge(bin: usize) -> f64 {
    let span = DOMAIN_MAX - DOMAIN_MIN;
    ((bin + 1) as f64 / BINS as f64).mul_add(span, DOMAIN_MIN)
}

fn last_occupied(histogram: &[f64; BINS]) -> usize {
    histogram
        .iter()
        .rposition(|&count| count > 0.0)
        .unwrap_or(BINS - 1)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use strand_raster::{Band, Georef};

    fn utm_georef() -> Georef {
        Georef {
            epsg: 32_631,
            transform: [399_960.0, 10.0, 0.0, 4_600_020.0, 0.0, -10.0],
        }
    }

    fn index_raster(samples: Vec<f32>, width: u32, height: u32) -> Raster {
        Raster::new(
            width,
            height,
            vec![Band::new("ndwi", samples)],
            utm_georef(),
            "scene",
        )
        .unwrap()
        .with_nodata(-32_768.0)
    }

    // --- otsu tests ---

    #[test]
    fn bimodal_threshold_lands_between_the_modes() {
        let mut samples = vec![-0.5_f32; 100];
        samples.extend(vec![0.6_f32; 100]);
        let raster = index_raster(samples, 20, 10);

        let threshold = otsu_threshold(&raster).unwrap();
        assert!(threshold > -0.5 && threshold < 0.6, "threshold {threshold}");
        // First-maximum tie-breaking puts the cut just above the low mode.
        assert!(threshold < 0.0, "threshold {threshold}");
    }

    #[test]
    fn threshold_selection_is_deterministic() {
        let samples: Vec<f32> = (0..400)
            .map(|i| if i % 3 == 0 { 0.55 } else { -0.4 })
            .collect();
        let raster = index_raster(samples, 20, 20);
        assert_eq!(otsu_threshold(&raster), otsu_threshold(&raster));
    }

    #[test]
    fn all_nodata_yields_no_threshold() {
        let raster = index_raster(vec![-32_768.0; 16], 4, 4);
        assert_eq!(otsu_threshold(&raster), None);
    }

    #[test]
    fn excluded_pixels_do_not_count() {
        let raster = Raster::new(
            2,
            1,
            vec![Band::new("ndwi", vec![0.5, 0.5])],
            utm_georef(),
            "scene",
        )
        .unwrap()
        .with_exclusion(vec![1, 1])
        .unwrap();
        assert_eq!(otsu_threshold(&raster), None);
    }

    #[test]
    fn constant_raster_classifies_everything_as_background() {
        let raster = index_raster(vec![0.3_f32; 16], 4, 4);
        let threshold = otsu_threshold(&raster).unwrap();
        assert!(threshold >= 0.3, "threshold {threshold}");

        let mask = binarize(&raster, threshold).unwrap();
        assert_eq!(mask.foreground_count(), 0);
        assert!(mask.data().iter().all(|&v| v == BinaryRaster::BACKGROUND));
    }

    #[test]
    fn domain_edges_fall_into_the_outer_bins() {
        assert_eq!(bin_index(-1.0), 0);
        assert_eq!(bin_index(1.0), BINS - 1);
        assert_eq!(bin_index(-2.0), 0);
        assert_eq!(bin_index(2.0), BINS - 1);
    }

    // --- binarize tests ---

    #[test]
    fn boundary_values_stay_background() {
        let raster = index_raster(vec![0.25, 0.5, 0.75], 3, 1);
        let mask = binarize(&raster, 0.5).unwrap();
        assert_eq!(
            mask.data(),
            &[
                BinaryRaster::BACKGROUND,
                BinaryRaster::BACKGROUND,
                BinaryRaster::FOREGROUND,
            ]
        );
    }

    #[test]
    fn invalid_pixels_get_the_sentinel() {
        let raster = index_raster(vec![-32_768.0, f32::NAN, 0.9, -0.9], 4, 1);
        let mask = binarize(&raster, 0.0).unwrap();
        assert_eq!(
            mask.data(),
            &[
                BinaryRaster::INVALID,
                BinaryRaster::INVALID,
                BinaryRaster::FOREGROUND,
                BinaryRaster::BACKGROUND,
            ]
        );
    }

    #[test]
    fn excluded_pixels_binarize_as_invalid() {
        let raster = Raster::new(
            2,
            1,
            vec![Band::new("ndwi", vec![0.9, 0.9])],
            utm_georef(),
            "scene",
        )
        .unwrap()
        .with_exclusion(vec![0, 1])
        .unwrap();
        let mask = binarize(&raster, 0.0).unwrap();
        assert_eq!(
            mask.data(),
            &[BinaryRaster::FOREGROUND, BinaryRaster::INVALID]
        );
    }
}
