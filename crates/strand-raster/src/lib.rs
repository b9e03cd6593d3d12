//! Georeferenced raster access for the strand pipeline.
//!
//! This crate owns everything that touches raster files or coordinate
//! reference systems:
//!
//! - [`Raster`], [`Band`], [`Georef`], and [`BinaryRaster`] -- the in-memory
//!   data model passed between pipeline stages. Stages take a raster by value
//!   and produce a new one; nothing here mutates a shared grid in place.
//! - [`geotiff`] -- a pure-Rust GeoTIFF reader/writer built on the [`tiff`]
//!   crate, covering the small dialect the pipeline needs: striped grayscale
//!   or multiband images, `ModelPixelScale`/`ModelTiepoint` georeferencing,
//!   a GeoKey directory carrying an EPSG code, and the GDAL nodata tag.
//! - [`projection`] -- EPSG-to-EPSG point reprojection via `proj4rs` and the
//!   `crs-definitions` registry.
//! - [`convert`] -- cached normalization of compressed GeoTIFF inputs into
//!   uncompressed siblings on disk.

pub mod convert;
pub mod geotiff;
pub mod projection;
mod raster;

pub use raster::{Band, BinaryRaster, Extent, Georef, Raster};

use thiserror::Error;

/// Errors produced by raster access, codec, and reprojection operations.
#[derive(Debug, Error)]
pub enum RasterError {
    /// Filesystem-level failure while opening or creating a raster file.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The `tiff` codec rejected the file during decoding or encoding.
    #[error("tiff codec error: {0}")]
    Tiff(#[from] tiff::TiffError),

    /// The file decoded but its structure cannot be represented here.
    #[error("malformed raster: {0}")]
    Malformed(String),

    /// The file carries no `ModelPixelScale`/`ModelTiepoint` tags.
    #[error("{0} has no georeferencing tags")]
    NoGeoreference(String),

    /// The file's GeoKey directory names no usable EPSG code.
    #[error("{0} declares no coordinate reference system")]
    NoCrs(String),

    /// A 1-based band index fell outside the raster's band list.
    #[error("band {index} out of range: raster has {count} band(s)")]
    BandIndex { index: usize, count: usize },

    /// Two rasters that must align pixel-for-pixel do not.
    #[error("raster is {width}x{height} but companion is {other_width}x{other_height}")]
    DimensionMismatch {
        width: u32,
        height: u32,
        other_width: u32,
        other_height: u32,
    },

    /// The EPSG code is absent from the bundled CRS registry.
    #[error("EPSG:{0} is not in the CRS database")]
    UnknownEpsg(u32),

    /// proj4rs failed to construct or apply a transformation.
    #[error("projection failed: {0}")]
    Projection(String),
}
