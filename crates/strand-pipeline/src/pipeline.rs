//! The extraction run, start to finish.
//!
//! One invocation handles one scene, synchronously, handing ownership from
//! stage to stage. The only cross-run coordination is file existence: a
//! `.geojson` at the artifact prefix means the scene was already processed,
//! and the run returns its content without recomputing anything. Two
//! concurrent identical invocations may race on that check; the artifacts
//! they write are identical, so the race is accepted.

use std::fs;
use std::path::{Path, PathBuf};

use strand_export::FeatureCollection;
use strand_raster::geotiff::{self, TiffCompression};
use tracing::{error, info, warn};

use crate::types::{PipelineError, RegionMaskError, RunConfig};
use crate::vectorize::TraceOptions;
use crate::{cloud, composite, extent, ndwi, paths, region, threshold, vectorize};

/// Run the coastline extraction pipeline for one scene.
///
/// Stages: open and compose the input bands, estimate the scene area,
/// optionally exclude cloudy pixels via the BQA band, short-circuit on a
/// cached result, compute the water index, optionally clip it to the
/// bundled coastal regions, pick a threshold, binarize, trace, and emit
/// GeoJSON. Diagnostic rasters are written next to the final `.geojson`
/// under the same name prefix.
///
/// Region masking that finds no coastal region near the scene, or no valid
/// pixel inside one, is not an error: the run emits an empty collection and
/// returns it.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] for unusable configurations and
/// propagates open, decode, projection, serialization, and I/O failures.
/// [`PipelineError::NoValidPixels`] means thresholding had nothing to work
/// with, and [`PipelineError::RegionMask`] wraps fatal region masking
/// failures.
pub fn run(config: &RunConfig) -> Result<FeatureCollection, PipelineError> {
    config.validate()?;
    log_input_sizes(&config.inputs);

    let mut scene = composite::open_scene(&config.inputs, config.bands, config.nodata)?;
    extent::log_scene_area(&scene);

    let basename = paths::sanitize_basename(
        config.basename.as_deref().unwrap_or_else(|| scene.source()),
    );
    let artifacts = paths::ArtifactSet::new(&config.outdir, &basename);
    info!("start: {basename}");

    if let Some(bqa) = &config.l8bqa {
        scene = cloud::apply_cloud_mask(scene, bqa, &artifacts.cloudmask())?;
    }

    let geojson_path = artifacts.geojson();
    if geojson_path.exists() {
        info!("{basename} already run");
        let text = fs::read_to_string(&geojson_path)?;
        let collection = strand_export::parse_collection(&text)?;
        info!("returning {} ({} bytes)", geojson_path.display(), text.len());
        return Ok(collection);
    }

    let index = ndwi::compute(&scene, config.chunksize)?;
    info!("saving {}", artifacts.ndwi().display());
    geotiff::write(&artifacts.ndwi(), &index, TiffCompression::default())?;

    let index = if config.coastmask {
        match region::apply_coast_mask(&index) {
            Ok(masked) => {
                info!("saving {}", artifacts.coastmask().display());
                geotiff::write(&artifacts.coastmask(), &masked, TiffCompression::default())?;
                masked
            }
            Err(outcome @ (RegionMaskError::Excluded | RegionMaskError::EmptyResult)) => {
                warn!("{outcome}");
                return emit_empty(&geojson_path, &basename);
            }
            Err(RegionMaskError::Other(message)) => {
                return Err(PipelineError::RegionMask(message));
            }
        }
    } else {
        index
    };

    let threshold = threshold::otsu_threshold(&index).ok_or(PipelineError::NoValidPixels)?;
    let mask = threshold::binarize(&index, threshold)?;
    info!("saving {}", artifacts.thresh().display());
    geotiff::write_binary(&artifacts.thresh(), &mask)?;

    let lines = vectorize::trace(&mask, &TraceOptions::from(config))?;
    let collection = strand_export::to_feature_collection(&lines, scene.source());
    let json = strand_export::to_json(&collection)?;
    info!("saving {} ({} bytes)", geojson_path.display(), json.len());
    fs::write(&geojson_path, &json)?;

    let collection = if let Some(tolerance) = config.simple {
        simplify_in_place(&geojson_path, tolerance)?
    } else {
        collection
    };

    info!("complete: {basename}");
    Ok(collection)
}

/// Log each input's size plus the running total; stat failures are logged
/// and skipped so a missing file surfaces later with a proper open error.
fn log_input_sizes(inputs: &[PathBuf]) {
    let mut total = 0_u64;
    for path in inputs {
        match fs::metadata(path) {
            Ok(meta) => {
                total += meta.len();
                info!(
                    "input {} ({} bytes, {total} total)",
                    path.display(),
                    meta.len()
                );
            }
            Err(err) => error!("could not stat {}: {err}", path.display()),
        }
    }
}

/// Replace the written GeoJSON with a simplified rendition of itself.
fn simplify_in_place(path: &Path, tolerance: f64) -> Result<FeatureCollection, PipelineError> {
    let written = fs::read_to_string(path)?;
    let parsed = strand_export::parse_collection(&written)?;
    let simplified = strand_export::simplify_collection(parsed, tolerance);
    let json = strand_export::to_json(&simplified)?;
    info!("saving {} ({} bytes)", path.display(), json.len());
    fs::write(path, &json)?;
    Ok(simplified)
}

/// Terminal state for the non-fatal region masking outcomes.
fn emit_empty(path: &Path, basename: &str) -> Result<FeatureCollection, PipelineError> {
    let collection = strand_export::empty_collection();
    let json = strand_export::to_json(&collection)?;
    info!("saving {} ({} bytes)", path.display(), json.len());
    fs::write(path, &json)?;
    info!("complete: {basename}");
    Ok(collection)
}
