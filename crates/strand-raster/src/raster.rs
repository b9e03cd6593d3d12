//! In-memory raster data model.
//!
//! A [`Raster`] is a stack of same-sized f32 sample grids ([`Band`]s) plus a
//! [`Georef`] (EPSG code and affine transform), an optional nodata sentinel,
//! and an optional exclusion overlay. A [`BinaryRaster`] is the thresholded
//! form: one u8 grid restricted to foreground/background/invalid codes.
//!
//! Pipeline stages consume a raster by value and return a new one, so two
//! stages never alias the same grid.

use crate::RasterError;
use crate::projection;

/// Affine georeferencing: an EPSG code plus a six-element transform in the
/// conventional `[origin_x, pixel_w, rot_x, origin_y, rot_y, pixel_h]`
/// layout, where `pixel_h` is negative for north-up rasters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Georef {
    pub epsg: u32,
    pub transform: [f64; 6],
}

impl Georef {
    /// Map coordinates of a fractional pixel position.
    ///
    /// Pass `column + 0.5, row + 0.5` for a pixel's center.
    #[must_use]
    pub fn pixel_to_map(&self, px: f64, py: f64) -> (f64, f64) {
        let t = &self.transform;
        let x = py.mul_add(t[2], px.mul_add(t[1], t[0]));
        let y = py.mul_add(t[5], px.mul_add(t[4], t[3]));
        (x, y)
    }

    /// Absolute pixel dimensions in map units.
    #[must_use]
    pub fn pixel_size(&self) -> (f64, f64) {
        (self.transform[1].abs(), self.transform[5].abs())
    }

    /// Bounding box of a `width` x `height` grid in map coordinates.
    #[must_use]
    pub fn extent(&self, width: u32, height: u32) -> Extent {
        let (w, h) = (f64::from(width), f64::from(height));
        let corners = [
            self.pixel_to_map(0.0, 0.0),
            self.pixel_to_map(w, 0.0),
            self.pixel_to_map(0.0, h),
            self.pixel_to_map(w, h),
        ];
        let mut extent = Extent {
            min_x: corners[0].0,
            min_y: corners[0].1,
            max_x: corners[0].0,
            max_y: corners[0].1,
        };
        for (x, y) in corners {
            extent.min_x = extent.min_x.min(x);
            extent.min_y = extent.min_y.min(y);
            extent.max_x = extent.max_x.max(x);
            extent.max_y = extent.max_y.max(y);
        }
        extent
    }

    /// Whether the CRS measures in degrees (longitude/latitude).
    #[must_use]
    pub fn is_geographic(&self) -> bool {
        projection::is_geographic(self.epsg)
    }
}

/// Axis-aligned bounding box in map coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    /// The four corners, lower-left first, counterclockwise.
    #[must_use]
    pub fn corners(&self) -> [(f64, f64); 4] {
        [
            (self.min_x, self.min_y),
            (self.max_x, self.min_y),
            (self.max_x, self.max_y),
            (self.min_x, self.max_y),
        ]
    }

    /// Lower-left corner.
    #[must_use]
    pub fn lower_left(&self) -> (f64, f64) {
        (self.min_x, self.min_y)
    }
}

/// One named grid of f32 samples in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    name: String,
    samples: Vec<f32>,
}

impl Band {
    #[must_use]
    pub fn new(name: impl Into<String>, samples: Vec<f32>) -> Self {
        Self {
            name: name.into(),
            samples,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    #[must_use]
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}

/// A georeferenced multi-band raster.
///
/// The exclusion overlay, when present, marks pixels that every downstream
/// computation must skip (value 1 = excluded) without altering the samples
/// underneath.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    width: u32,
    height: u32,
    bands: Vec<Band>,
    georef: Georef,
    nodata: Option<f64>,
    exclusion: Option<Vec<u8>>,
    source: String,
}

impl Raster {
    /// Assemble a raster from parts.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::Malformed`] when the dimensions are zero, the
    /// band list is empty, or any band's sample count is not
    /// `width * height`.
    pub fn new(
        width: u32,
        height: u32,
        bands: Vec<Band>,
        georef: Georef,
        source: impl Into<String>,
    ) -> Result<Self, RasterError> {
        if width == 0 || height == 0 {
            return Err(RasterError::Malformed(format!(
                "zero dimensions ({width}x{height})"
            )));
        }
        if bands.is_empty() {
            return Err(RasterError::Malformed("no bands".into()));
        }
        let expected = width as usize * height as usize;
        for band in &bands {
            if band.samples.len() != expected {
                return Err(RasterError::Malformed(format!(
                    "band {} has {} samples, expected {expected}",
                    band.name,
                    band.samples.len()
                )));
            }
        }
        Ok(Self {
            width,
            height,
            bands,
            georef,
            nodata: None,
            exclusion: None,
            source: source.into(),
        })
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of pixels per band.
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    #[must_use]
    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    #[must_use]
    pub fn georef(&self) -> Georef {
        self.georef
    }

    #[must_use]
    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    /// Scene identifier captured from the source file's stem.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn extent(&self) -> Extent {
        self.georef.extent(self.width, self.height)
    }

    /// Band by 0-based index.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::BandIndex`] when out of range; the reported
    /// index is 1-based to match user-facing band numbering.
    pub fn band(&self, index: usize) -> Result<&Band, RasterError> {
        self.bands.get(index).ok_or(RasterError::BandIndex {
            index: index + 1,
            count: self.bands.len(),
        })
    }

    /// Band by its assigned role name.
    #[must_use]
    pub fn band_named(&self, name: &str) -> Option<&Band> {
        self.bands.iter().find(|b| b.name == name)
    }

    /// New raster keeping only the given 1-based bands, in order.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::BandIndex`] for any out-of-range selection.
    pub fn select(&self, one_based: &[usize]) -> Result<Self, RasterError> {
        let mut bands = Vec::with_capacity(one_based.len());
        for &index in one_based {
            if index == 0 || index > self.bands.len() {
                return Err(RasterError::BandIndex {
                    index,
                    count: self.bands.len(),
                });
            }
            bands.push(self.bands[index - 1].clone());
        }
        Ok(Self {
            bands,
            ..self.clone()
        })
    }

    /// Set the nodata sentinel applied to every band.
    #[must_use]
    pub fn with_nodata(mut self, nodata: f64) -> Self {
        self.nodata = Some(nodata);
        self
    }

    /// Append a band from a companion raster.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::DimensionMismatch`] when the band length does
    /// not match this raster's grid.
    pub fn with_band(mut self, band: Band) -> Result<Self, RasterError> {
        if band.samples.len() != self.pixel_count() {
            return Err(RasterError::Malformed(format!(
                "appended band {} has {} samples, expected {}",
                band.name,
                band.samples.len(),
                self.pixel_count()
            )));
        }
        self.bands.push(band);
        Ok(self)
    }

    /// Rename bands positionally; extra existing bands keep their names.
    #[must_use]
    pub fn with_band_names(mut self, names: &[&str]) -> Self {
        for (band, name) in self.bands.iter_mut().zip(names) {
            band.name = (*name).to_string();
        }
        self
    }

    /// Attach an exclusion overlay (1 = excluded).
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::Malformed`] when the overlay length does not
    /// match the grid.
    pub fn with_exclusion(mut self, overlay: Vec<u8>) -> Result<Self, RasterError> {
        if overlay.len() != self.pixel_count() {
            return Err(RasterError::Malformed(format!(
                "exclusion overlay has {} entries, expected {}",
                overlay.len(),
                self.pixel_count()
            )));
        }
        self.exclusion = Some(overlay);
        Ok(self)
    }

    #[must_use]
    pub fn exclusion(&self) -> Option<&[u8]> {
        self.exclusion.as_deref()
    }

    /// Whether the overlay excludes the pixel at `index`.
    #[must_use]
    pub fn excluded(&self, index: usize) -> bool {
        self.exclusion
            .as_ref()
            .is_some_and(|overlay| overlay.get(index).copied() == Some(1))
    }

    /// Whether `value` is a measurement rather than the nodata sentinel.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_measurement(&self, value: f32) -> bool {
        match self.nodata {
            Some(nodata) => f64::from(value) != nodata,
            None => true,
        }
    }
}

/// Single-band u8 raster holding a thresholded grid.
///
/// Meaningful values are [`BinaryRaster::BACKGROUND`],
/// [`BinaryRaster::FOREGROUND`], and [`BinaryRaster::INVALID`]; the invalid
/// sentinel doubles as the file-level nodata value when written out.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryRaster {
    width: u32,
    height: u32,
    data: Vec<u8>,
    georef: Georef,
    source: String,
}

impl BinaryRaster {
    pub const BACKGROUND: u8 = 0;
    pub const FOREGROUND: u8 = 1;
    pub const INVALID: u8 = 255;

    /// # Errors
    ///
    /// Returns [`RasterError::Malformed`] when the grid length is not
    /// `width * height`.
    pub fn new(
        width: u32,
        height: u32,
        data: Vec<u8>,
        georef: Georef,
        source: impl Into<String>,
    ) -> Result<Self, RasterError> {
        if data.len() != width as usize * height as usize {
            return Err(RasterError::Malformed(format!(
                "binary grid has {} entries, expected {}",
                data.len(),
                width as usize * height as usize
            )));
        }
        Ok(Self {
            width,
            height,
            data,
            georef,
            source: source.into(),
        })
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn georef(&self) -> Georef {
        self.georef
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Number of foreground pixels.
    #[must_use]
    pub fn foreground_count(&self) -> usize {
        self.data
            .iter()
            .filter(|&&v| v == Self::FOREGROUND)
            .count()
    }
}
