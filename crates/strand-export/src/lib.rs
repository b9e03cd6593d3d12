//! strand-export: GeoJSON serializers for coastline vectors (sans-IO)
//!
//! Converts traced coastlines into GeoJSON `FeatureCollection`s, parses
//! them back, and simplifies emitted line strings. Everything here is
//! pure -- callers own the file I/O.

use thiserror::Error;

pub mod collection;
pub mod simplify;

pub use collection::{GeoLine, empty_collection, parse_collection, to_feature_collection, to_json};
pub use geojson::{Feature, FeatureCollection};
pub use simplify::simplify_collection;

/// Errors from GeoJSON serialization and parsing.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The input text is not a valid GeoJSON `FeatureCollection`.
    #[error("invalid geojson: {0}")]
    Parse(#[from] geojson::Error),

    /// JSON serialization failed.
    #[error("geojson serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}
