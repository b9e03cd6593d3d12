//! EPSG-to-EPSG point reprojection.
//!
//! Projections are resolved through the `crs-definitions` registry and
//! applied with `proj4rs`. proj4rs works in radians for geographic systems,
//! so conversions happen at this boundary and callers deal only in the
//! native units of each CRS (degrees or meters).

use proj4rs::proj::Proj;
use proj4rs::transform::transform;

use crate::RasterError;

/// PROJ string for an EPSG code, when the registry knows it.
#[must_use]
pub fn proj_string(epsg: u32) -> Option<&'static str> {
    u16::try_from(epsg)
        .ok()
        .and_then(crs_definitions::from_code)
        .map(|def| def.proj4)
}

/// Whether an EPSG code describes a geographic (longitude/latitude) CRS.
#[must_use]
pub fn is_geographic(epsg: u32) -> bool {
    proj_string(epsg).map_or_else(
        // Registry miss: 4326 and its geodetic neighbors are geographic.
        || epsg == 4326 || (4000..5000).contains(&epsg),
        |proj| proj.contains("+proj=longlat"),
    )
}

/// Project a point between two EPSG-coded reference systems.
///
/// Same-code calls return the input unchanged.
///
/// # Errors
///
/// Returns [`RasterError::UnknownEpsg`] when either code is missing from the
/// registry and [`RasterError::Projection`] when proj4rs rejects the
/// definition or the transformation itself fails.
pub fn project_point(
    source_epsg: u32,
    target_epsg: u32,
    x: f64,
    y: f64,
) -> Result<(f64, f64), RasterError> {
    if source_epsg == target_epsg {
        return Ok((x, y));
    }

    let source_str = proj_string(source_epsg).ok_or(RasterError::UnknownEpsg(source_epsg))?;
    let target_str = proj_string(target_epsg).ok_or(RasterError::UnknownEpsg(target_epsg))?;

    let source_proj = Proj::from_proj_string(source_str)
        .map_err(|e| RasterError::Projection(format!("invalid source EPSG:{source_epsg}: {e}")))?;
    let target_proj = Proj::from_proj_string(target_str)
        .map_err(|e| RasterError::Projection(format!("invalid target EPSG:{target_epsg}: {e}")))?;

    // proj4rs expects radians for geographic coordinates.
    let (x_in, y_in) = if is_geographic(source_epsg) {
        (x.to_radians(), y.to_radians())
    } else {
        (x, y)
    };

    let mut point = (x_in, y_in, 0.0);
    transform(&source_proj, &target_proj, &mut point).map_err(|e| {
        RasterError::Projection(format!(
            "transform EPSG:{source_epsg} -> EPSG:{target_epsg} failed: {e}"
        ))
    })?;

    if is_geographic(target_epsg) {
        Ok((point.0.to_degrees(), point.1.to_degrees()))
    } else {
        Ok((point.0, point.1))
    }
}
