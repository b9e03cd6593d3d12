//! Shared types for the strand coastline extraction pipeline.

use std::path::PathBuf;

use strand_export::ExportError;
use strand_raster::RasterError;

/// Configuration for one extraction run.
///
/// All parameters except `inputs` have defaults matching the command-line
/// interface. Construct with struct-update syntax and call [`Self::validate`]
/// before handing the configuration to [`crate::run`].
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Input scene paths: either one GeoTIFF carrying both bands, or the
    /// green and near-infrared files in that order.
    pub inputs: Vec<PathBuf>,

    /// 1-based band numbers for `[green, nir]`. With two input files each
    /// number addresses its own file.
    pub bands: [usize; 2],

    /// Directory artifacts are written under. An empty path means the
    /// process working directory.
    pub outdir: PathBuf,

    /// Artifact name prefix. `None` derives the prefix from the scene
    /// source stem; either way it is stripped of path-like characters.
    pub basename: Option<String>,

    /// Sample value treated as missing in the input bands.
    pub nodata: f64,

    /// Optional Landsat 8 quality band (BQA) used to exclude filled,
    /// cloudy, and cirrus-contaminated pixels.
    pub l8bqa: Option<PathBuf>,

    /// Whether to clip the water index to the bundled coastal regions.
    pub coastmask: bool,

    /// Minimum traced length, in map units, for a coastline to be kept.
    pub minsize: f64,

    /// Radius in pixels of the morphological closing applied to the water
    /// mask before tracing. Zero disables closing.
    pub close: u32,

    /// Douglas-Peucker tolerance in output (lon/lat) coordinate units.
    /// `Some` rewrites the emitted GeoJSON with simplified geometry.
    pub simple: Option<f64>,

    /// Corner rounding strength, `0.0` (off) through [`Self::MAX_SMOOTH`].
    pub smooth: f64,

    /// Working memory budget in megabytes for the water index computation.
    pub chunksize: f64,

    /// Log level selector: 0 disables logging, 1 shows debug and up,
    /// 2 info, 3 warn, 4 and above errors only.
    pub verbosity: u8,
}

impl RunConfig {
    /// Default nodata value for input bands.
    pub const DEFAULT_NODATA: f64 = 0.0;
    /// Default minimum traced length in map units.
    pub const DEFAULT_MINSIZE: f64 = 100.0;
    /// Default morphological closing radius in pixels.
    pub const DEFAULT_CLOSE: u32 = 5;
    /// Default corner rounding strength.
    pub const DEFAULT_SMOOTH: f64 = 0.0;
    /// Upper bound of the corner rounding range.
    pub const MAX_SMOOTH: f64 = 1.33;
    /// Default water index memory budget in megabytes.
    pub const DEFAULT_CHUNKSIZE: f64 = 128.0;
    /// Default log level selector (info).
    pub const DEFAULT_VERBOSITY: u8 = 2;

    /// Check the configuration for values no run can make sense of.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] when the number of inputs is
    /// not 1 or 2, a band number is 0, `smooth` falls outside
    /// `0.0..=`[`Self::MAX_SMOOTH`], or `chunksize` is not a positive finite
    /// number.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.inputs.is_empty() || self.inputs.len() > 2 {
            return Err(PipelineError::InvalidConfig(format!(
                "expected 1 or 2 input scenes, got {}",
                self.inputs.len()
            )));
        }
        if self.bands.contains(&0) {
            return Err(PipelineError::InvalidConfig(
                "band numbers are 1-based; 0 names no band".into(),
            ));
        }
        if !(0.0..=Self::MAX_SMOOTH).contains(&self.smooth) {
            return Err(PipelineError::InvalidConfig(format!(
                "smooth must be between 0.0 and {}",
                Self::MAX_SMOOTH
            )));
        }
        if !self.chunksize.is_finite() || self.chunksize <= 0.0 {
            return Err(PipelineError::InvalidConfig(
                "chunksize must be a positive number of megabytes".into(),
            ));
        }
        Ok(())
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            bands: [1, 1],
            outdir: PathBuf::new(),
            basename: None,
            nodata: Self::DEFAULT_NODATA,
            l8bqa: None,
            coastmask: false,
            minsize: Self::DEFAULT_MINSIZE,
            close: Self::DEFAULT_CLOSE,
            simple: None,
            smooth: Self::DEFAULT_SMOOTH,
            chunksize: Self::DEFAULT_CHUNKSIZE,
            verbosity: Self::DEFAULT_VERBOSITY,
        }
    }
}

/// Errors that abort an extraction run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Run configuration is invalid.
    #[error("invalid run configuration: {0}")]
    InvalidConfig(String),

    /// A raster could not be read, written, or reprojected.
    #[error(transparent)]
    Raster(#[from] RasterError),

    /// The output GeoJSON could not be serialized or parsed back.
    #[error(transparent)]
    Export(#[from] ExportError),

    /// Filesystem-level failure outside the raster codecs.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The opened scene lacks a band the water index needs.
    #[error("scene has no {0} band")]
    MissingBand(&'static str),

    /// Every pixel was nodata or excluded; no threshold can be chosen.
    #[error("no valid pixels available for threshold selection")]
    NoValidPixels,

    /// Coastal region masking failed for a reason other than emptiness.
    #[error("region masking failed: {0}")]
    RegionMask(String),
}

/// Outcomes of coastal region masking that are not plain success.
///
/// The empty variants are recoverable: the run emits an empty feature
/// collection and finishes normally. Only [`RegionMaskError::Other`] is
/// promoted to a fatal [`PipelineError::RegionMask`].
#[derive(Debug, thiserror::Error)]
pub enum RegionMaskError {
    /// No coastal region polygon overlaps the scene footprint.
    #[error("no coastal region intersects the scene")]
    Excluded,

    /// Regions overlap the footprint but masking left no valid pixels.
    #[error("coastal region masking left no valid pixels")]
    EmptyResult,

    /// Masking itself failed (bad layer, projection failure).
    #[error("{0}")]
    Other(String),
}

impl From<RasterError> for RegionMaskError {
    fn from(err: RasterError) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> RunConfig {
        RunConfig {
            inputs: vec![PathBuf::from("scene.tif")],
            ..RunConfig::default()
        }
    }

    // --- RunConfig tests ---

    #[test]
    fn run_config_defaults() {
        let config = RunConfig::default();
        assert!(config.inputs.is_empty());
        assert_eq!(config.bands, [1, 1]);
        assert_eq!(config.outdir, PathBuf::new());
        assert_eq!(config.basename, None);
        assert!((config.nodata - 0.0).abs() < f64::EPSILON);
        assert_eq!(config.l8bqa, None);
        assert!(!config.coastmask);
        assert!((config.minsize - 100.0).abs() < f64::EPSILON);
        assert_eq!(config.close, 5);
        assert_eq!(config.simple, None);
        assert!((config.smooth - 0.0).abs() < f64::EPSILON);
        assert!((config.chunksize - 128.0).abs() < f64::EPSILON);
        assert_eq!(config.verbosity, 2);
    }

    #[test]
    fn validate_accepts_single_input() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn validate_accepts_two_inputs() {
        let config = RunConfig {
            inputs: vec![PathBuf::from("green.tif"), PathBuf::from("nir.tif")],
            ..RunConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_no_inputs() {
        let config = RunConfig::default();
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn validate_rejects_three_inputs() {
        let config = RunConfig {
            inputs: vec![
                PathBuf::from("a.tif"),
                PathBuf::from("b.tif"),
                PathBuf::from("c.tif"),
            ],
            ..RunConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn validate_rejects_zero_band() {
        let config = RunConfig {
            bands: [0, 1],
            ..valid_config()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn validate_rejects_negative_smooth() {
        let config = RunConfig {
            smooth: -0.1,
            ..valid_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_smooth_above_maximum() {
        let config = RunConfig {
            smooth: 1.34,
            ..valid_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_accepts_maximum_smooth() {
        let config = RunConfig {
            smooth: RunConfig::MAX_SMOOTH,
            ..valid_config()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_chunksize() {
        let config = RunConfig {
            chunksize: 0.0,
            ..valid_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_nan_chunksize() {
        let config = RunConfig {
            chunksize: f64::NAN,
            ..valid_config()
        };
        assert!(config.validate().is_err());
    }

    // --- PipelineError tests ---

    #[test]
    fn error_invalid_config_display() {
        let err = PipelineError::InvalidConfig("expected 1 or 2 input scenes, got 0".to_string());
        assert_eq!(
            err.to_string(),
            "invalid run configuration: expected 1 or 2 input scenes, got 0",
        );
    }

    #[test]
    fn error_missing_band_display() {
        let err = PipelineError::MissingBand("nir");
        assert_eq!(err.to_string(), "scene has no nir band");
    }

    #[test]
    fn error_no_valid_pixels_display() {
        let err = PipelineError::NoValidPixels;
        assert_eq!(
            err.to_string(),
            "no valid pixels available for threshold selection",
        );
    }

    #[test]
    fn error_raster_is_transparent() {
        let err = PipelineError::from(RasterError::UnknownEpsg(99_999));
        assert_eq!(err.to_string(), "EPSG:99999 is not in the CRS database");
    }

    // --- RegionMaskError tests ---

    #[test]
    fn region_excluded_display() {
        let err = RegionMaskError::Excluded;
        assert_eq!(err.to_string(), "no coastal region intersects the scene");
    }

    #[test]
    fn region_empty_result_display() {
        let err = RegionMaskError::EmptyResult;
        assert_eq!(
            err.to_string(),
            "coastal region masking left no valid pixels",
        );
    }

    #[test]
    fn region_error_from_raster_error() {
        let err = RegionMaskError::from(RasterError::UnknownEpsg(4_000_000));
        assert!(matches!(err, RegionMaskError::Other(_)));
        assert_eq!(err.to_string(), "EPSG:4000000 is not in the CRS database");
    }
}
