//! Coastal region masking against a bundled reference layer.
//!
//! The layer is a coarse set of lon/lat polygons around coastlines of
//! interest. Masking clips the water index to those polygons so inland
//! water bodies never reach vectorization. Two non-error outcomes short a
//! run to an empty result: no polygon near the scene at all, and polygons
//! nearby but zero valid pixels inside them.

use geo::{BoundingRect, Contains, Intersects, LineString, Point, Polygon, Rect};
use geojson::{FeatureCollection, Value};
use strand_raster::{projection, Band, Raster};
use tracing::debug;

use crate::ndwi::NDWI_NODATA;
use crate::types::RegionMaskError;

/// Coarse coastal region polygons in lon/lat, bundled with the crate.
const COAST_LAYER: &str = include_str!("../data/coastmask.geojson");

/// Clip the water index to the bundled coastal regions.
///
/// Pixels whose centers fall outside every region become nodata; pixels
/// inside keep their values.
///
/// # Errors
///
/// [`RegionMaskError::Excluded`] when no region's bounding box touches the
/// scene footprint, [`RegionMaskError::EmptyResult`] when regions touch it
/// but no valid pixel survives, and [`RegionMaskError::Other`] for layer or
/// projection failures.
pub fn apply_coast_mask(index: &Raster) -> Result<Raster, RegionMaskError> {
    let regions = parse_layer(COAST_LAYER)?;
    apply_regions(index, &regions)
}

fn apply_regions(index: &Raster, regions: &[Polygon<f64>]) -> Result<Raster, RegionMaskError> {
    let georef = index.georef();

    // The overlap test runs in lon/lat. Regions far from the scene never
    // get reprojected, which keeps transverse Mercator math inside the
    // zone it is defined for.
    let footprint = lon_lat_footprint(index)?;
    let intersecting: Vec<&Polygon<f64>> = regions
        .iter()
        .filter(|region| {
            region
                .bounding_rect()
                .is_some_and(|rect| rect.intersects(&footprint))
        })
        .collect();
    if intersecting.is_empty() {
        return Err(RegionMaskError::Excluded);
    }
    debug!(
        "{} coastal region(s) overlap the scene footprint",
        intersecting.len()
    );

    let local: Vec<Polygon<f64>> = intersecting
        .iter()
        .map(|region| to_raster_crs(region, georef.epsg))
        .collect::<Result<_, _>>()?;

    let band = index.band(0).map_err(RegionMaskError::from)?;
    let nodata = index.nodata().unwrap_or(f64::from(NDWI_NODATA));
    #[allow(clippy::cast_possible_truncation)]
    let fill = nodata as f32;

    let width = index.width() as usize;
    let mut samples = band.samples().to_vec();
    let mut survivors = 0_usize;
    for row in 0..index.height() as usize {
        for col in 0..width {
            let i = row * width + col;
            #[allow(clippy::cast_precision_loss)]
            let (x, y) = georef.pixel_to_map(col as f64 + 0.5, row as f64 + 0.5);
            let center = Point::new(x, y);
            if local.iter().any(|region| region.contains(&center)) {
                let value = samples[i];
                if !index.excluded(i) && index.is_measurement(value) && value.is_finite() {
                    survivors += 1;
                }
            } else {
                samples[i] = fill;
            }
        }
    }
    if survivors == 0 {
        return Err(RegionMaskError::EmptyResult);
    }
    debug!("coastal region masking kept {survivors} pixels");

    let masked = Raster::new(
        index.width(),
        index.height(),
        vec![Band::new(band.name(), samples)],
        georef,
        index.source(),
    )
    .map_err(RegionMaskError::from)?;
    Ok(masked.with_nodata(nodata))
}

/// Parse the region layer into polygons, flattening multipolygons.
fn parse_layer(text: &str) -> Result<Vec<Polygon<f64>>, RegionMaskError> {
    let collection: FeatureCollection = text
        .parse()
        .map_err(|e: geojson::Error| RegionMaskError::Other(format!("coastal region layer: {e}")))?;

    let mut regions = Vec::new();
    for feature in &collection.features {
        let Some(geometry) = &feature.geometry else {
            continue;
        };
        match &geometry.value {
            Value::Polygon(rings) => regions.push(polygon_from_rings(rings)),
            Value::MultiPolygon(polygons) => {
                regions.extend(polygons.iter().map(|rings| polygon_from_rings(rings)));
            }
            _ => {}
        }
    }
    if regions.is_empty() {
        return Err(RegionMaskError::Other(
            "coastal region layer holds no polygons".into(),
        ));
    }
    Ok(regions)
}

fn polygon_from_rings(rings: &[Vec<Vec<f64>>]) -> Polygon<f64> {
    let mut converted = rings.iter().map(|ring| {
        LineString::from(ring.iter().map(|p| position_xy(p)).collect::<Vec<_>>())
    });
    let exterior = converted.next().unwrap_or_else(|| LineString::new(Vec::new()));
    Polygon::new(exterior, converted.collect())
}

/// First two items of a GeoJSON position; short positions read as 0.
fn position_xy(position: &[f64]) -> (f64, f64) {
    (
        position.first().copied().unwrap_or_default(),
        position.get(1).copied().unwrap_or_default(),
    )
}

/// Scene bounding box in lon/lat, from the four extent corners.
fn lon_lat_footprint(index: &Raster) -> Result<Rect<f64>, RegionMaskError> {
    let georef = index.georef();
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for (x, y) in index.extent().corners() {
        let (lon, lat) = if georef.is_geographic() {
            (x, y)
        } else {
            projection::project_point(georef.epsg, 4326, x, y)?
        };
        min_x = min_x.min(lon);
        max_x = max_x.max(lon);
        min_y = min_y.min(lat);
        max_y = max_y.max(lat);
    }
    Ok(Rect::new((min_x, min_y), (max_x, max_y)))
}

/// Reproject a lon/lat region into the raster's CRS vertex by vertex.
fn to_raster_crs(region: &Polygon<f64>, epsg: u32) -> Result<Polygon<f64>, RegionMaskError> {
    if epsg == 4326 {
        return Ok(region.clone());
    }
    let exterior = project_ring(region.exterior(), epsg)?;
    let interiors = region
        .interiors()
        .iter()
        .map(|ring| project_ring(ring, epsg))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn project_ring(ring: &LineString<f64>, epsg: u32) -> Result<LineString<f64>, RegionMaskError> {
    let mut coords = Vec::with_capacity(ring.0.len());
    for coord in ring.coords() {
        let projected = projection::project_point(4326, epsg, coord.x, coord.y)?;
        coords.push(projected);
    }
    Ok(LineString::from(coords))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use strand_raster::Georef;

    fn square(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                (min_lon, min_lat),
                (max_lon, min_lat),
                (max_lon, max_lat),
                (min_lon, max_lat),
                (min_lon, min_lat),
            ]),
            vec![],
        )
    }

    /// 4x4 geographic index with 1-degree pixels, centers at 0.5..3.5.
    fn geographic_index(samples: Vec<f32>) -> Raster {
        let georef = Georef {
            epsg: 4326,
            transform: [0.0, 1.0, 0.0, 4.0, 0.0, -1.0],
        };
        Raster::new(4, 4, vec![Band::new("ndwi", samples)], georef, "geo")
            .unwrap()
            .with_nodata(f64::from(NDWI_NODATA))
    }

    /// 4x4 index in UTM 31N near the English Channel, 30 m pixels.
    fn channel_index(samples: Vec<f32>) -> Raster {
        let georef = Georef {
            epsg: 32_631,
            transform: [372_000.0, 30.0, 0.0, 5_573_000.0, 0.0, -30.0],
        };
        Raster::new(4, 4, vec![Band::new("ndwi", samples)], georef, "channel")
            .unwrap()
            .with_nodata(f64::from(NDWI_NODATA))
    }

    // --- apply_regions tests ---

    #[test]
    fn covering_region_keeps_every_pixel() {
        let index = geographic_index(vec![0.5_f32; 16]);
        let masked = apply_regions(&index, &[square(-1.0, -1.0, 5.0, 5.0)]).unwrap();
        assert_eq!(masked.bands()[0].samples(), &[0.5_f32; 16]);
        assert_eq!(masked.source(), "geo");
        assert_eq!(masked.nodata(), Some(f64::from(NDWI_NODATA)));
    }

    #[test]
    fn pixels_outside_the_region_become_nodata() {
        let index = geographic_index(vec![0.5_f32; 16]);
        // Covers longitudes up to 2.0: columns 0 and 1 survive.
        let masked = apply_regions(&index, &[square(0.0, 0.0, 2.0, 4.0)]).unwrap();
        let out = masked.bands()[0].samples();
        for row in 0..4 {
            assert_eq!(out[row * 4], 0.5);
            assert_eq!(out[row * 4 + 1], 0.5);
            assert_eq!(out[row * 4 + 2], NDWI_NODATA);
            assert_eq!(out[row * 4 + 3], NDWI_NODATA);
        }
    }

    #[test]
    fn union_of_regions_is_kept() {
        let index = geographic_index(vec![0.5_f32; 16]);
        let west = square(0.0, 0.0, 1.0, 4.0);
        let east = square(3.0, 0.0, 4.0, 4.0);
        let masked = apply_regions(&index, &[west, east]).unwrap();
        let out = masked.bands()[0].samples();
        for row in 0..4 {
            assert_eq!(out[row * 4], 0.5);
            assert_eq!(out[row * 4 + 1], NDWI_NODATA);
            assert_eq!(out[row * 4 + 2], NDWI_NODATA);
            assert_eq!(out[row * 4 + 3], 0.5);
        }
    }

    #[test]
    fn distant_regions_mean_excluded() {
        let index = geographic_index(vec![0.5_f32; 16]);
        let result = apply_regions(&index, &[square(100.0, 40.0, 110.0, 50.0)]);
        assert!(matches!(result, Err(RegionMaskError::Excluded)));
    }

    #[test]
    fn overlapping_region_with_no_valid_pixels_is_empty_result() {
        let index = geographic_index(vec![NDWI_NODATA; 16]);
        let result = apply_regions(&index, &[square(-1.0, -1.0, 5.0, 5.0)]);
        assert!(matches!(result, Err(RegionMaskError::EmptyResult)));
    }

    #[test]
    fn touching_bbox_without_center_containment_is_empty_result() {
        let index = geographic_index(vec![0.5_f32; 16]);
        // Bounding boxes overlap, but the sliver misses every pixel center.
        let sliver = square(3.6, 0.0, 4.4, 4.0);
        let result = apply_regions(&index, &[sliver]);
        assert!(matches!(result, Err(RegionMaskError::EmptyResult)));
    }

    #[test]
    fn projected_scene_is_masked_through_lon_lat_regions() {
        let index = channel_index(vec![0.4_f32; 16]);
        let channel = square(-5.5, 48.3, 2.5, 51.5);
        let masked = apply_regions(&index, &[channel]).unwrap();
        assert_eq!(masked.bands()[0].samples(), &[0.4_f32; 16]);
    }

    #[test]
    fn projected_scene_far_from_all_regions_is_excluded() {
        let index = channel_index(vec![0.4_f32; 16]);
        let result = apply_regions(&index, &[square(100.0, 40.0, 110.0, 50.0)]);
        assert!(matches!(result, Err(RegionMaskError::Excluded)));
    }

    // --- bundled layer tests ---

    #[test]
    fn bundled_layer_parses_into_polygons() {
        let regions = parse_layer(COAST_LAYER).unwrap();
        assert!(regions.len() >= 5, "only {} regions", regions.len());
        for region in &regions {
            assert!(region.exterior().0.len() >= 4);
        }
    }

    #[test]
    fn bundled_layer_covers_the_english_channel() {
        let index = channel_index(vec![0.4_f32; 16]);
        let masked = apply_coast_mask(&index).unwrap();
        assert_eq!(masked.bands()[0].samples(), &[0.4_f32; 16]);
    }

    #[test]
    fn bundled_layer_excludes_central_asia() {
        let georef = Georef {
            epsg: 32_645,
            transform: [348_000.0, 30.0, 0.0, 5_207_000.0, 0.0, -30.0],
        };
        let index = Raster::new(
            4,
            4,
            vec![Band::new("ndwi", vec![0.4_f32; 16])],
            georef,
            "steppe",
        )
        .unwrap()
        .with_nodata(f64::from(NDWI_NODATA));

        let result = apply_coast_mask(&index);
        assert!(matches!(result, Err(RegionMaskError::Excluded)));
    }

    // --- layer parsing tests ---

    #[test]
    fn empty_layer_is_an_error() {
        let result = parse_layer(r#"{"type":"FeatureCollection","features":[]}"#);
        assert!(matches!(result, Err(RegionMaskError::Other(_))));
    }

    #[test]
    fn invalid_layer_is_an_error() {
        let result = parse_layer("not geojson at all");
        assert!(matches!(result, Err(RegionMaskError::Other(_))));
    }

    #[test]
    fn multipolygons_flatten() {
        let text = r#"{"type":"FeatureCollection","features":[{"type":"Feature","properties":{},"geometry":{"type":"MultiPolygon","coordinates":[[[[0.0,0.0],[1.0,0.0],[1.0,1.0],[0.0,0.0]]],[[[2.0,2.0],[3.0,2.0],[3.0,3.0],[2.0,2.0]]]]}}]}"#;
        let regions = parse_layer(text).unwrap();
        assert_eq!(regions.len(), 2);
    }
}
