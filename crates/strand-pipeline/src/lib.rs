//! strand-pipeline: Coastline extraction from multispectral imagery.
//!
//! Converts green + near-infrared reflectance into GeoJSON coastlines:
//! band composition -> optional cloud exclusion -> NDWI -> optional coastal
//! region clip -> Otsu threshold -> binarize -> contour tracing -> emit.
//!
//! Raster access and reprojection live in `strand-raster`; GeoJSON
//! serialization lives in `strand-export`. This crate owns the math, the
//! artifact layout, and the run orchestration, including the
//! file-existence idempotence contract.

pub mod cloud;
pub mod composite;
pub mod extent;
pub mod ndwi;
pub mod paths;
pub mod pipeline;
pub mod region;
pub mod threshold;
pub mod types;
pub mod vectorize;

pub use paths::ArtifactSet;
pub use pipeline::run;
pub use types::{PipelineError, RegionMaskError, RunConfig};
pub use vectorize::TraceOptions;
