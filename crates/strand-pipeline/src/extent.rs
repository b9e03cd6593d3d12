//! Scene extent and area estimation.
//!
//! The area figure is diagnostic only, so every failure here is logged and
//! swallowed rather than aborting the run.

use strand_raster::{projection, Raster, RasterError};
use tracing::{error, info};

/// EPSG code of the WGS 84 / UTM zone containing a lon/lat position:
/// `326zz` on and north of the equator, `327zz` south of it.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn utm_epsg(lon: f64, lat: f64) -> u32 {
    let zone = ((lon + 180.0) / 6.0).floor().rem_euclid(60.0) as u32 + 1;
    let base = if lat >= 0.0 { 32_600 } else { 32_700 };
    base + zone
}

/// Approximate scene area in square kilometers.
///
/// Projects the extent corners into the UTM zone of the lower-left corner
/// and measures the projected bounding box. Returns `None` when projection
/// fails, after logging the failure at error level.
#[must_use]
pub fn scene_area_km2(raster: &Raster) -> Option<f64> {
    match try_area(raster) {
        Ok(area) => Some(area),
        Err(err) => {
            error!("scene area estimation failed: {err}");
            None
        }
    }
}

/// Log the scene area at info level. Estimation failures stay swallowed.
pub fn log_scene_area(raster: &Raster) {
    if let Some(area) = scene_area_km2(raster) {
        info!("scene area: {area:.1} sq km");
    }
}

fn try_area(raster: &Raster) -> Result<f64, RasterError> {
    let georef = raster.georef();
    let extent = raster.extent();

    // Zone selection needs lon/lat regardless of the raster's own CRS.
    let (min_x, min_y) = extent.lower_left();
    let (lon, lat) = if georef.is_geographic() {
        (min_x, min_y)
    } else {
        projection::project_point(georef.epsg, 4326, min_x, min_y)?
    };
    let utm = utm_epsg(lon, lat);

    let mut min_e = f64::INFINITY;
    let mut max_e = f64::NEG_INFINITY;
    let mut min_n = f64::INFINITY;
    let mut max_n = f64::NEG_INFINITY;
    for (x, y) in extent.corners() {
        let (easting, northing) = projection::project_point(georef.epsg, utm, x, y)?;
        min_e = min_e.min(easting);
        max_e = max_e.max(easting);
        min_n = min_n.min(northing);
        max_n = max_n.max(northing);
    }

    Ok(((max_e - min_e) * (max_n - min_n)).abs() / 1e6)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use strand_raster::{Band, Georef};

    // --- utm_epsg tests ---

    #[test]
    fn zone_31_north_at_greenwich() {
        assert_eq!(utm_epsg(0.0, 10.0), 32_631);
    }

    #[test]
    fn zone_1_south_near_the_antimeridian() {
        assert_eq!(utm_epsg(-179.9, -10.0), 32_701);
    }

    #[test]
    fn zone_60_north_near_the_antimeridian() {
        assert_eq!(utm_epsg(179.9, 50.0), 32_660);
    }

    #[test]
    fn equator_counts_as_north() {
        assert_eq!(utm_epsg(-75.5, 0.0), 32_618);
    }

    #[test]
    fn longitude_180_wraps_to_zone_1() {
        assert_eq!(utm_epsg(180.0, 45.0), 32_601);
    }

    // --- scene area tests ---

    fn utm_scene(width: u32, height: u32) -> Raster {
        let georef = Georef {
            epsg: 32_631,
            transform: [399_960.0, 10.0, 0.0, 4_600_020.0, 0.0, -10.0],
        };
        let samples = vec![0.0_f32; (width * height) as usize];
        Raster::new(width, height, vec![Band::new("b", samples)], georef, "scene").unwrap()
    }

    #[test]
    fn projected_scene_area_matches_pixel_grid() {
        // 100 x 50 pixels at 10 m: 1 km x 0.5 km.
        let raster = utm_scene(100, 50);
        let area = scene_area_km2(&raster).unwrap();
        assert!((area - 0.5).abs() < 0.05, "area was {area}");
    }

    #[test]
    fn geographic_scene_has_positive_area() {
        let georef = Georef {
            epsg: 4326,
            transform: [10.0, 0.0002, 0.0, 45.0, 0.0, -0.0002],
        };
        let raster = Raster::new(
            100,
            100,
            vec![Band::new("b", vec![0.0_f32; 10_000])],
            georef,
            "geo",
        )
        .unwrap();

        let area = scene_area_km2(&raster).unwrap();
        assert!(area > 0.0, "area was {area}");
    }
}
