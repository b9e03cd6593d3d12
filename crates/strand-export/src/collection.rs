//! `FeatureCollection` construction and parsing.
//!
//! Traced coastlines become one `LineString` feature each, numbered in
//! input order and tagged with the scene they came from. The empty
//! collection is its own constructor because it doubles as the payload
//! for scenes the coastal mask removes entirely.

use geojson::{Feature, FeatureCollection, Geometry, Value};
use serde_json::Map;

use crate::ExportError;

/// An ordered sequence of lon/lat vertices tracing one boundary.
///
/// Positions are geographic (EPSG:4326), longitude first to match
/// GeoJSON coordinate order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeoLine {
    points: Vec<(f64, f64)>,
}

impl GeoLine {
    #[must_use]
    pub const fn new(points: Vec<(f64, f64)>) -> Self {
        Self { points }
    }

    #[must_use]
    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Build a `FeatureCollection` with one `LineString` feature per line.
///
/// Each feature carries two properties: `id`, the feature's index in
/// input order, and `source`, the scene name the geometry was traced
/// from.
#[must_use]
pub fn to_feature_collection(lines: &[GeoLine], source: &str) -> FeatureCollection {
    let features = lines
        .iter()
        .enumerate()
        .map(|(id, line)| {
            let coordinates: Vec<Vec<f64>> = line
                .points()
                .iter()
                .map(|&(lon, lat)| vec![lon, lat])
                .collect();
            let mut properties = Map::new();
            properties.insert("id".to_owned(), serde_json::Value::from(id));
            properties.insert("source".to_owned(), serde_json::Value::from(source));
            Feature {
                bbox: None,
                geometry: Some(Geometry::new(Value::LineString(coordinates))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// A `FeatureCollection` with no features.
///
/// Serializes to exactly `{"type":"FeatureCollection","features":[]}`.
#[must_use]
pub fn empty_collection() -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: Vec::new(),
        foreign_members: None,
    }
}

/// Serialize a collection to compact single-line JSON.
///
/// # Errors
///
/// Returns [`ExportError::Serialize`] if JSON serialization fails.
pub fn to_json(collection: &FeatureCollection) -> Result<String, ExportError> {
    Ok(serde_json::to_string(collection)?)
}

/// Parse GeoJSON text into a `FeatureCollection`.
///
/// # Errors
///
/// Returns [`ExportError::Parse`] when the text is not valid GeoJSON or
/// is some other GeoJSON object type.
pub fn parse_collection(text: &str) -> Result<FeatureCollection, ExportError> {
    Ok(text.parse::<FeatureCollection>()?)
}
