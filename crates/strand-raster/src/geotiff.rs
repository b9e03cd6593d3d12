//! GeoTIFF reading and writing on top of the [`tiff`] crate.
//!
//! Covers the dialect the pipeline produces and consumes: striped, chunky
//! (pixel-interleaved) images with georeferencing expressed through
//! `ModelPixelScale` + `ModelTiepoint`, an EPSG code in the GeoKey
//! directory, and the GDAL nodata convention. Single-band images go through
//! the typed encoder paths ([`Gray8`]/[`Gray32Float`]); arbitrary band
//! counts use the low-level directory encoder.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult};
use tiff::decoder::ifd::Value;
use tiff::encoder::colortype::{Gray8, Gray32Float};
use tiff::encoder::{Compression, DeflateLevel, DirectoryEncoder, TiffEncoder, TiffKind};
use tiff::tags::Tag;

use crate::projection;
use crate::raster::{Band, BinaryRaster, Georef, Raster};
use crate::RasterError;

/// GeoTIFF tag: ModelPixelScale [ScaleX, ScaleY, ScaleZ].
const MODEL_PIXEL_SCALE: u16 = 33550;
/// GeoTIFF tag: ModelTiepoint [I, J, K, X, Y, Z].
const MODEL_TIEPOINT: u16 = 33922;
/// GeoTIFF tag: GeoKeyDirectory.
const GEO_KEY_DIRECTORY: u16 = 34735;
/// GeoTIFF tag: GeoAsciiParams.
const GEO_ASCII_PARAMS: u16 = 34737;
/// GDAL extension tag: nodata value as ASCII text.
const GDAL_NODATA: u16 = 42113;

/// GeoKey: model type (projected/geographic).
const GT_MODEL_TYPE: u16 = 1024;
/// GeoKey: raster type (area/point).
const GT_RASTER_TYPE: u16 = 1025;
/// GeoKey: geographic CRS code.
const GEOGRAPHIC_TYPE: u16 = 2048;
/// GeoKey: projected CRS code.
const PROJECTED_CS_TYPE: u16 = 3072;

const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

/// Compression applied when encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TiffCompression {
    #[default]
    Uncompressed,
    Lzw,
    Deflate,
}

impl TiffCompression {
    fn to_encoder(self) -> Compression {
        match self {
            Self::Uncompressed => Compression::Uncompressed,
            Self::Lzw => Compression::Lzw,
            Self::Deflate => Compression::Deflate(DeflateLevel::Fast),
        }
    }
}

/// Read a GeoTIFF from disk; the raster's source stem is the file stem.
///
/// # Errors
///
/// Propagates I/O and codec failures, [`RasterError::NoGeoreference`] when
/// the georeferencing tags are missing, and [`RasterError::NoCrs`] when the
/// GeoKey directory carries no EPSG code.
pub fn read(path: &Path) -> Result<Raster, RasterError> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file = File::open(path)?;
    read_from(BufReader::new(file), &stem)
}

/// Read a GeoTIFF from any seekable reader.
///
/// # Errors
///
/// See [`read`]; `source` stands in for the file stem in error messages and
/// the raster's source field.
pub fn read_from<R: Read + Seek>(reader: R, source: &str) -> Result<Raster, RasterError> {
    let mut decoder = Decoder::new(reader)?;
    let (width, height) = decoder.dimensions()?;

    let samples_per_pixel = match decoder.find_tag(Tag::SamplesPerPixel)? {
        Some(value) => value.into_u32()? as usize,
        None => 1,
    };
    let planar = match decoder.find_tag(Tag::PlanarConfiguration)? {
        Some(value) => value.into_u32()?,
        None => 1,
    };
    if planar != 1 {
        return Err(RasterError::Malformed(format!(
            "planar configuration {planar} is not supported (expected chunky)"
        )));
    }

    let georef = read_georef(&mut decoder, source)?;
    let nodata = read_nodata(&mut decoder);

    let flat = samples_to_f32(decoder.read_image()?)?;
    let expected = width as usize * height as usize * samples_per_pixel;
    if flat.len() != expected {
        return Err(RasterError::Malformed(format!(
            "decoded {} samples, expected {expected}",
            flat.len()
        )));
    }

    let bands = deinterleave(&flat, samples_per_pixel);
    let mut raster = Raster::new(width, height, bands, georef, source)?;
    if let Some(nodata) = nodata {
        raster = raster.with_nodata(nodata);
    }
    Ok(raster)
}

/// Write a raster's f32 bands as a GeoTIFF.
///
/// # Errors
///
/// Propagates I/O and codec failures; rejects rotated affine transforms,
/// which `ModelPixelScale`/`ModelTiepoint` cannot express.
pub fn write(path: &Path, raster: &Raster, compression: TiffCompression) -> Result<(), RasterError> {
    let file = File::create(path)?;
    write_to(BufWriter::new(file), raster, compression)
}

/// Write a raster to any seekable writer. See [`write`].
///
/// # Errors
///
/// See [`write`].
pub fn write_to<W: Write + Seek>(
    writer: W,
    raster: &Raster,
    compression: TiffCompression,
) -> Result<(), RasterError> {
    let georef = raster.georef();
    check_writable(georef)?;

    let encoder = TiffEncoder::new(writer)?.with_compression(compression.to_encoder());
    if raster.bands().len() == 1 {
        write_single_f32(encoder, raster)
    } else {
        write_multiband(encoder, raster, compression)
    }
}

/// Write a binary raster as an uncompressed byte GeoTIFF with nodata 255.
///
/// # Errors
///
/// See [`write`].
pub fn write_binary(path: &Path, binary: &BinaryRaster) -> Result<(), RasterError> {
    let file = File::create(path)?;
    write_binary_to(BufWriter::new(file), binary)
}

/// Write a binary raster to any seekable writer. See [`write_binary`].
///
/// # Errors
///
/// See [`write`].
pub fn write_binary_to<W: Write + Seek>(
    writer: W,
    binary: &BinaryRaster,
) -> Result<(), RasterError> {
    check_writable(binary.georef())?;

    let mut encoder = TiffEncoder::new(writer)?;
    let mut image = encoder.new_image::<Gray8>(binary.width(), binary.height())?;
    write_geo_tags(image.encoder(), binary.georef())?;
    write_nodata_tag(image.encoder(), Some(f64::from(BinaryRaster::INVALID)))?;
    image.write_data(binary.data())?;
    Ok(())
}

/// Write a binary raster as an uncompressed byte GeoTIFF without a nodata
/// tag. Suits masks whose every cell is meaningful (0/1 grids).
///
/// # Errors
///
/// See [`write`].
pub fn write_mask(path: &Path, mask: &BinaryRaster) -> Result<(), RasterError> {
    let file = File::create(path)?;
    write_mask_to(BufWriter::new(file), mask)
}

/// Write a binary raster to any seekable writer. See [`write_mask`].
///
/// # Errors
///
/// See [`write`].
pub fn write_mask_to<W: Write + Seek>(writer: W, mask: &BinaryRaster) -> Result<(), RasterError> {
    check_writable(mask.georef())?;

    let mut encoder = TiffEncoder::new(writer)?;
    let mut image = encoder.new_image::<Gray8>(mask.width(), mask.height())?;
    write_geo_tags(image.encoder(), mask.georef())?;
    image.write_data(mask.data())?;
    Ok(())
}

/// Whether the file's TIFF Compression tag names anything but "none".
///
/// # Errors
///
/// Propagates I/O and codec failures from opening the file.
pub fn is_compressed(path: &Path) -> Result<bool, RasterError> {
    let file = File::open(path)?;
    let mut decoder = Decoder::new(BufReader::new(file))?;
    let method = match decoder.find_tag(Tag::Compression)? {
        Some(value) => value.into_u32()?,
        None => 1,
    };
    Ok(method != 1)
}

fn check_writable(georef: Georef) -> Result<(), RasterError> {
    if georef.transform[2] != 0.0 || georef.transform[4] != 0.0 {
        return Err(RasterError::Malformed(
            "rotated transforms cannot be written as pixel-scale GeoTIFF".into(),
        ));
    }
    Ok(())
}

fn write_single_f32<W: Write + Seek>(
    mut encoder: TiffEncoder<W>,
    raster: &Raster,
) -> Result<(), RasterError> {
    let mut image = encoder.new_image::<Gray32Float>(raster.width(), raster.height())?;
    write_geo_tags(image.encoder(), raster.georef())?;
    write_nodata_tag(image.encoder(), raster.nodata())?;
    image.write_data(raster.bands()[0].samples())?;
    Ok(())
}

/// Low-level path for arbitrary band counts: one chunky strip of f32 data.
fn write_multiband<W: Write + Seek>(
    mut encoder: TiffEncoder<W>,
    raster: &Raster,
    compression: TiffCompression,
) -> Result<(), RasterError> {
    let bands = raster.bands().len();
    let mut dir = encoder.image_directory()?;

    dir.write_tag(Tag::ImageWidth, raster.width())?;
    dir.write_tag(Tag::ImageLength, raster.height())?;

    let bits_per_sample: Vec<u16> = vec![32; bands];
    dir.write_tag(Tag::BitsPerSample, bits_per_sample.as_slice())?;

    let compression_tag: u16 = match compression {
        TiffCompression::Uncompressed => 1,
        TiffCompression::Lzw => 5,
        TiffCompression::Deflate => 8,
    };
    if compression_tag != 1 {
        // The directory encoder writes raw strips; only the typed encoder
        // paths compress. Normalization always writes uncompressed, so
        // multiband compressed output is out of scope here.
        return Err(RasterError::Malformed(
            "multiband output supports only uncompressed encoding".into(),
        ));
    }
    dir.write_tag(Tag::Compression, compression_tag)?;

    // BlackIsZero: multiband imagery is grayscale-like, not palette/RGB.
    dir.write_tag(Tag::PhotometricInterpretation, 1_u16)?;
    dir.write_tag(Tag::SamplesPerPixel, u16::try_from(bands).map_err(|_| {
        RasterError::Malformed(format!("too many bands for a TIFF directory: {bands}"))
    })?)?;

    let sample_format: Vec<u16> = vec![3; bands]; // IEEE float
    dir.write_tag(Tag::SampleFormat, sample_format.as_slice())?;
    dir.write_tag(Tag::PlanarConfiguration, 1_u16)?;
    dir.write_tag(Tag::RowsPerStrip, raster.height())?;

    let extra_samples: Vec<u16> = vec![0; bands - 1];
    dir.write_tag(Tag::ExtraSamples, extra_samples.as_slice())?;

    write_geo_tags(&mut dir, raster.georef())?;
    write_nodata_tag(&mut dir, raster.nodata())?;

    let pixel_bytes = interleave_bytes(raster);
    let strip_offset = dir.write_data(pixel_bytes.as_slice())?;
    dir.write_tag(Tag::StripOffsets, strip_offset)?;
    #[allow(clippy::cast_possible_truncation)]
    dir.write_tag(Tag::StripByteCounts, pixel_bytes.len() as u32)?;

    dir.finish()?;
    Ok(())
}

fn write_geo_tags<W: Write + Seek, K: TiffKind>(
    dir: &mut DirectoryEncoder<W, K>,
    georef: Georef,
) -> Result<(), RasterError> {
    let (sx, sy) = georef.pixel_size();
    let pixel_scale = [sx, sy, 0.0];
    dir.write_tag(Tag::Unknown(MODEL_PIXEL_SCALE), pixel_scale.as_slice())?;

    // Tie pixel (0, 0) to the grid origin (min x, max y for north-up).
    let tiepoint = [0.0, 0.0, 0.0, georef.transform[0], georef.transform[3], 0.0];
    dir.write_tag(Tag::Unknown(MODEL_TIEPOINT), tiepoint.as_slice())?;

    let geokeys = geokey_directory(georef.epsg)?;
    dir.write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), geokeys.as_slice())?;

    if let Some(proj) = projection::proj_string(georef.epsg) {
        // Pipe-terminated per the GeoTIFF ASCII params convention.
        let ascii_params = format!("{proj}|");
        dir.write_tag(Tag::Unknown(GEO_ASCII_PARAMS), ascii_params.as_bytes())?;
    }
    Ok(())
}

fn write_nodata_tag<W: Write + Seek, K: TiffKind>(
    dir: &mut DirectoryEncoder<W, K>,
    nodata: Option<f64>,
) -> Result<(), RasterError> {
    if let Some(nodata) = nodata {
        dir.write_tag(Tag::Unknown(GDAL_NODATA), nodata.to_string().as_str())?;
    }
    Ok(())
}

/// GeoKey directory: header `[version, revision, minor, count]` followed by
/// `[key, location, count, value]` entries.
fn geokey_directory(epsg: u32) -> Result<Vec<u16>, RasterError> {
    let code = u16::try_from(epsg).map_err(|_| RasterError::UnknownEpsg(epsg))?;
    let geographic = projection::is_geographic(epsg);

    let mut keys = vec![1, 1, 0, 3];
    keys.extend_from_slice(&[
        GT_MODEL_TYPE,
        0,
        1,
        if geographic {
            MODEL_TYPE_GEOGRAPHIC
        } else {
            MODEL_TYPE_PROJECTED
        },
    ]);
    keys.extend_from_slice(&[GT_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA]);
    if geographic {
        keys.extend_from_slice(&[GEOGRAPHIC_TYPE, 0, 1, code]);
    } else {
        keys.extend_from_slice(&[PROJECTED_CS_TYPE, 0, 1, code]);
    }
    Ok(keys)
}

fn read_georef<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    source: &str,
) -> Result<Georef, RasterError> {
    let scale = tag_f64_vec(decoder, MODEL_PIXEL_SCALE)?
        .ok_or_else(|| RasterError::NoGeoreference(source.to_string()))?;
    let tiepoint = tag_f64_vec(decoder, MODEL_TIEPOINT)?
        .ok_or_else(|| RasterError::NoGeoreference(source.to_string()))?;
    if scale.len() < 2 || tiepoint.len() < 6 {
        return Err(RasterError::NoGeoreference(source.to_string()));
    }

    let (sx, sy) = (scale[0], scale[1]);
    // Tiepoint maps pixel (i, j) to map (x, y); shift back to pixel (0, 0).
    let origin_x = tiepoint[0].mul_add(-sx, tiepoint[3]);
    let origin_y = tiepoint[1].mul_add(sy, tiepoint[4]);
    let transform = [origin_x, sx, 0.0, origin_y, 0.0, -sy];

    let geokeys = match decoder.find_tag(Tag::Unknown(GEO_KEY_DIRECTORY))? {
        Some(value) => value.into_u32_vec()?,
        None => return Err(RasterError::NoCrs(source.to_string())),
    };
    let epsg =
        epsg_from_geokeys(&geokeys).ok_or_else(|| RasterError::NoCrs(source.to_string()))?;

    Ok(Georef { epsg, transform })
}

fn tag_f64_vec<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    tag: u16,
) -> Result<Option<Vec<f64>>, RasterError> {
    match decoder.find_tag(Tag::Unknown(tag))? {
        Some(value) => Ok(Some(value.into_f64_vec()?)),
        None => Ok(None),
    }
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    // GDAL_NODATA is defined as an ASCII tag; anything else is ignored.
    let value = decoder.find_tag(Tag::Unknown(GDAL_NODATA)).ok()??;
    let Value::Ascii(text) = value else {
        return None;
    };
    text.trim_matches(['\0', ' ']).parse().ok()
}

fn epsg_from_geokeys(keys: &[u32]) -> Option<u32> {
    if keys.len() < 4 {
        return None;
    }
    let count = keys[3] as usize;
    let mut projected = None;
    let mut geographic = None;
    for entry in keys[4..].chunks_exact(4).take(count) {
        // Location 0 means the value lives in the entry itself.
        if entry[1] != 0 {
            continue;
        }
        if entry[0] == u32::from(PROJECTED_CS_TYPE) {
            projected = Some(entry[3]);
        } else if entry[0] == u32::from(GEOGRAPHIC_TYPE) {
            geographic = Some(entry[3]);
        }
    }
    projected.or(geographic)
}

#[allow(clippy::cast_precision_loss)]
fn samples_to_f32(result: DecodingResult) -> Result<Vec<f32>, RasterError> {
    match result {
        DecodingResult::U8(v) => Ok(v.into_iter().map(f32::from).collect()),
        DecodingResult::U16(v) => Ok(v.into_iter().map(f32::from).collect()),
        DecodingResult::U32(v) => Ok(v.into_iter().map(|s| s as f32).collect()),
        DecodingResult::I8(v) => Ok(v.into_iter().map(f32::from).collect()),
        DecodingResult::I16(v) => Ok(v.into_iter().map(f32::from).collect()),
        DecodingResult::I32(v) => Ok(v.into_iter().map(|s| s as f32).collect()),
        DecodingResult::F32(v) => Ok(v),
        DecodingResult::F64(v) => Ok(v.into_iter().map(|s| s as f32).collect()),
        _ => Err(RasterError::Malformed(
            "unsupported sample format (expected 8/16/32-bit integer or float)".into(),
        )),
    }
}

fn deinterleave(flat: &[f32], samples_per_pixel: usize) -> Vec<Band> {
    if samples_per_pixel == 1 {
        return vec![Band::new("band1", flat.to_vec())];
    }
    let pixels = flat.len() / samples_per_pixel;
    let mut grids = vec![Vec::with_capacity(pixels); samples_per_pixel];
    for chunk in flat.chunks_exact(samples_per_pixel) {
        for (grid, &sample) in grids.iter_mut().zip(chunk) {
            grid.push(sample);
        }
    }
    grids
        .into_iter()
        .enumerate()
        .map(|(i, samples)| Band::new(format!("band{}", i + 1), samples))
        .collect()
}

fn interleave_bytes(raster: &Raster) -> Vec<u8> {
    let bands = raster.bands();
    let pixels = raster.pixel_count();
    let mut bytes = Vec::with_capacity(pixels * bands.len() * 4);
    for p in 0..pixels {
        for band in bands {
            bytes.extend_from_slice(&band.samples()[p].to_le_bytes());
        }
    }
    bytes
}
