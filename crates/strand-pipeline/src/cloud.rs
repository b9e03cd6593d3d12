//! Landsat 8 quality band (BQA) decoding into an exclusion overlay.
//!
//! The overlay marks pixels the rest of the pipeline must ignore; band
//! samples are never altered. Decoding follows the pre-collection BQA bit
//! layout: designated fill, high cloud confidence, and high cirrus
//! confidence.

use std::path::Path;

use strand_raster::{geotiff, BinaryRaster, Raster, RasterError};
use tracing::{debug, info};

use crate::types::PipelineError;

/// BQA bit 0: designated fill.
const FILL: u16 = 0x0001;
/// BQA bit 15: high cloud confidence.
const HIGH_CLOUD: u16 = 0x8000;
/// BQA bits 12 and 13: cirrus confidence, high when both are set.
const CIRRUS: u16 = 0x3000;

/// Whether a BQA value marks its pixel as unusable.
const fn is_excluded(value: u16) -> bool {
    value & FILL != 0 || value & HIGH_CLOUD != 0 || value & CIRRUS == CIRRUS
}

/// BQA samples arrive as f32 from the decoder; snap back to the flag word.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn flag_word(sample: f32) -> u16 {
    sample.round().clamp(0.0, f32::from(u16::MAX)) as u16
}

/// Exclude filled, cloudy, and cirrus-contaminated pixels from the scene.
///
/// Reads the BQA GeoTIFF at `bqa_path`, decodes it into a 0/1 exclusion
/// grid, writes the grid to `artifact`, and attaches it to the scene as an
/// overlay.
///
/// # Errors
///
/// Open and decode failures are fatal, as is a BQA grid whose dimensions
/// differ from the scene's.
pub fn apply_cloud_mask(
    scene: Raster,
    bqa_path: &Path,
    artifact: &Path,
) -> Result<Raster, PipelineError> {
    let bqa = geotiff::read(bqa_path)?;
    if bqa.width() != scene.width() || bqa.height() != scene.height() {
        return Err(RasterError::DimensionMismatch {
            width: scene.width(),
            height: scene.height(),
            other_width: bqa.width(),
            other_height: bqa.height(),
        }
        .into());
    }

    let grid: Vec<u8> = bqa
        .band(0)?
        .samples()
        .iter()
        .map(|&s| u8::from(is_excluded(flag_word(s))))
        .collect();
    let excluded = grid.iter().filter(|&&v| v == 1).count();
    debug!("cloud mask excludes {excluded} of {} pixels", grid.len());

    let mask = BinaryRaster::new(
        scene.width(),
        scene.height(),
        grid.clone(),
        scene.georef(),
        scene.source(),
    )?;
    info!("saving {}", artifact.display());
    geotiff::write_mask(artifact, &mask)?;

    Ok(scene.with_exclusion(grid)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use strand_raster::geotiff::TiffCompression;
    use strand_raster::{Band, Georef};

    fn utm_georef() -> Georef {
        Georef {
            epsg: 32_631,
            transform: [399_960.0, 10.0, 0.0, 4_600_020.0, 0.0, -10.0],
        }
    }

    // --- bit decoding tests ---

    #[test]
    fn fill_bit_excludes() {
        assert!(is_excluded(0x0001));
    }

    #[test]
    fn high_cloud_confidence_excludes() {
        assert!(is_excluded(0x8000));
    }

    #[test]
    fn both_cirrus_bits_exclude() {
        assert!(is_excluded(0x3000));
    }

    #[test]
    fn single_cirrus_bit_passes() {
        assert!(!is_excluded(0x1000));
        assert!(!is_excluded(0x2000));
    }

    #[test]
    fn clear_values_pass() {
        assert!(!is_excluded(0x0000));
        // A typical clear-terrain BQA word: low confidences everywhere.
        assert!(!is_excluded(0x2720));
    }

    #[test]
    fn combined_flags_exclude() {
        assert!(is_excluded(0x8001));
        assert!(is_excluded(0x3001));
    }

    // --- apply_cloud_mask tests ---

    fn scene(width: u32, height: u32) -> Raster {
        let n = (width * height) as usize;
        Raster::new(
            width,
            height,
            vec![
                Band::new("green", vec![0.4_f32; n]),
                Band::new("nir", vec![0.1_f32; n]),
            ],
            utm_georef(),
            "scene",
        )
        .unwrap()
    }

    fn write_bqa(path: &Path, values: &[u16], width: u32, height: u32) {
        let samples: Vec<f32> = values.iter().map(|&v| f32::from(v)).collect();
        let raster = Raster::new(
            width,
            height,
            vec![Band::new("bqa", samples)],
            utm_georef(),
            "bqa",
        )
        .unwrap();
        geotiff::write(path, &raster, TiffCompression::Uncompressed).unwrap();
    }

    #[test]
    fn overlay_and_artifact_reflect_the_flags() {
        let dir = tempfile::tempdir().unwrap();
        let bqa_path = dir.path().join("bqa.tif");
        let artifact = dir.path().join("scene_cloudmask.tif");
        write_bqa(&bqa_path, &[0x0000, 0x0001, 0x8000, 0x3000], 2, 2);

        let masked = apply_cloud_mask(scene(2, 2), &bqa_path, &artifact).unwrap();
        assert!(!masked.excluded(0));
        assert!(masked.excluded(1));
        assert!(masked.excluded(2));
        assert!(masked.excluded(3));

        let saved = geotiff::read(&artifact).unwrap();
        assert_eq!(saved.bands()[0].samples(), &[0.0, 1.0, 1.0, 1.0]);
        assert_eq!(saved.nodata(), None);
    }

    #[test]
    fn samples_survive_masking_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let bqa_path = dir.path().join("bqa.tif");
        let artifact = dir.path().join("scene_cloudmask.tif");
        write_bqa(&bqa_path, &[0x8000, 0x0000, 0x0000, 0x0000], 2, 2);

        let masked = apply_cloud_mask(scene(2, 2), &bqa_path, &artifact).unwrap();
        assert_eq!(
            masked.band_named("green").unwrap().samples(),
            &[0.4_f32; 4]
        );
    }

    #[test]
    fn mismatched_bqa_dimensions_fail() {
        let dir = tempfile::tempdir().unwrap();
        let bqa_path = dir.path().join("bqa.tif");
        let artifact = dir.path().join("scene_cloudmask.tif");
        write_bqa(&bqa_path, &[0x0000; 6], 3, 2);

        let result = apply_cloud_mask(scene(2, 2), &bqa_path, &artifact);
        assert!(matches!(
            result,
            Err(PipelineError::Raster(RasterError::DimensionMismatch { .. }))
        ));
        assert!(!artifact.exists());
    }

    #[test]
    fn missing_bqa_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("scene_cloudmask.tif");
        let result = apply_cloud_mask(scene(2, 2), &dir.path().join("absent.tif"), &artifact);
        assert!(result.is_err());
    }
}
