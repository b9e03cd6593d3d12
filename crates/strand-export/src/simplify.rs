//! Line-string simplification using the Ramer-Douglas-Peucker algorithm.
//!
//! Operates directly on GeoJSON positions so a collection read back from
//! disk can be reduced without converting through intermediate geometry
//! types. Endpoints are always retained and the vertex count never
//! grows.

use geojson::{FeatureCollection, Value};

/// Simplify every `LineString` feature in the collection.
///
/// Each line string is reduced with Ramer-Douglas-Peucker at the given
/// tolerance, expressed in coordinate units. Features holding other
/// geometry types pass through untouched, as do line strings with fewer
/// than 3 positions.
#[must_use = "returns the simplified collection"]
pub fn simplify_collection(mut collection: FeatureCollection, tolerance: f64) -> FeatureCollection {
    for feature in &mut collection.features {
        if let Some(geometry) = feature.geometry.as_mut() {
            if let Value::LineString(positions) = &geometry.value {
                geometry.value = Value::LineString(simplify_positions(positions, tolerance));
            }
        }
    }
    collection
}

/// Simplify one position list with Ramer-Douglas-Peucker.
fn simplify_positions(positions: &[Vec<f64>], tolerance: f64) -> Vec<Vec<f64>> {
    if positions.len() < 3 {
        return positions.to_vec();
    }

    let mut kept = vec![false; positions.len()];
    kept[0] = true;
    kept[positions.len() - 1] = true;

    rdp_recurse(positions, 0, positions.len() - 1, tolerance, &mut kept);

    positions
        .iter()
        .zip(&kept)
        .filter(|&(_, k)| *k)
        .map(|(p, _)| p.clone())
        .collect()
}

/// Recursive step: find the position between `start` and `end` farthest
/// from the chord between them. If that distance exceeds `tolerance`,
/// keep it and process both sub-segments.
fn rdp_recurse(positions: &[Vec<f64>], start: usize, end: usize, tolerance: f64, kept: &mut [bool]) {
    if end <= start + 1 {
        return;
    }

    let mut max_dist = 0.0;
    let mut max_idx = start;

    for i in (start + 1)..end {
        let d = perpendicular_distance(xy(&positions[i]), xy(&positions[start]), xy(&positions[end]));
        if d > max_dist {
            max_dist = d;
            max_idx = i;
        }
    }

    if max_dist > tolerance {
        kept[max_idx] = true;
        rdp_recurse(positions, start, max_idx, tolerance, kept);
        rdp_recurse(positions, max_idx, end, tolerance, kept);
    }
}

/// First two ordinates of a position. GeoJSON allows extra ordinates
/// (altitude) and, in malformed input, fewer; missing values read as 0.
fn xy(position: &[f64]) -> (f64, f64) {
    (
        position.first().copied().unwrap_or_default(),
        position.get(1).copied().unwrap_or_default(),
    )
}

/// Perpendicular distance from point `p` to the line defined by `a` and `b`.
///
/// Uses the formula: |cross(b-a, p-a)| / |b-a|.
/// When `a` and `b` coincide, returns the distance from `p` to `a`.
fn perpendicular_distance(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let dx = b.0 - a.0;
    let dy = b.1 - a.1;
    let length_sq = dx.mul_add(dx, dy * dy);

    if length_sq == 0.0 {
        // a and b are the same point.
        return (p.0 - a.0).hypot(p.1 - a.1);
    }

    // |cross product| / |line length|
    let cross = dx.mul_add(a.1 - p.1, -(dy * (a.0 - p.0)));
    cross.abs() / length_sq.sqrt()
}
