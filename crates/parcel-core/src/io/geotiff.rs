//! Windowed reader for multi-band GeoTIFF stacks.
//!
//! The decoder stays open for the whole run and every window read touches
//! only the strips or tiles that intersect the window, so memory follows the
//! polygon footprint rather than the raster size.
//!
//! Accepted layouts: one image with N samples per pixel (what GDAL writes),
//! either pixel-interleaved (PlanarConfiguration 1) or band-sequential
//! (PlanarConfiguration 2), and one single-sample page per band. Pages of a
//! multi-page file contribute their samples as bands in page order.
//! Reduced-resolution pages (internal overviews) are skipped.
//!
//! Georeferencing comes from ModelPixelScale + ModelTiepoint or from a
//! rotation-free ModelTransformation. GDAL_NODATA pixels are read as NaN.
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};

use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tracing::{debug, info};

use crate::error::{Result, ZonalError};
use crate::raster::{BandSource, GeoTransform, RasterGrid, Window};

/// GeoKey holding the raster space interpretation.
const GT_RASTER_TYPE_GEO_KEY: u32 = 1025;
const RASTER_PIXEL_IS_POINT: u32 = 2;
const PLANAR_SEPARATE: u32 = 2;

/// One full-resolution image of the file and the bands it holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BandPage {
    ifd: usize,
    samples: usize,
    planar: bool,
    chunk_width: usize,
    chunk_height: usize,
}

impl BandPage {
    fn chunks_across(&self, width: usize) -> usize {
        width.div_ceil(self.chunk_width)
    }

    fn chunks_per_plane(&self, width: usize, height: usize) -> usize {
        self.chunks_across(width) * height.div_ceil(self.chunk_height)
    }
}

/// A GeoTIFF stack opened for window reads.
pub struct GeoTiffStack<R: Read + Seek> {
    path: PathBuf,
    decoder: Decoder<R>,
    grid: RasterGrid,
    nodata: Option<f32>,
    pages: Vec<BandPage>,
    current_ifd: usize,
    chunks_read: usize,
}

/// Open the stack at `path` and read its layout. No pixel data is read.
pub fn open_stack(path: &Path) -> Result<GeoTiffStack<BufReader<File>>> {
    let file = File::open(path).map_err(|e| ZonalError::io(path, e))?;
    let stack = GeoTiffStack::new(BufReader::new(file), path)?;
    info!(
        path = %path.display(),
        bands = stack.band_count(),
        width = stack.grid.width,
        height = stack.grid.height,
        "raster stack opened"
    );
    Ok(stack)
}

impl<R: Read + Seek> GeoTiffStack<R> {
    /// Read the layout of a stack from any seekable TIFF stream.
    /// `path` only labels errors.
    pub fn new(reader: R, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let raster_err = |reason: String| ZonalError::Raster {
            path: path.clone(),
            reason,
        };

        let mut decoder = Decoder::new(reader)
            .map_err(|e| raster_err(format!("not a valid TIFF: {e}")))?
            .with_limits(Limits::unlimited());
        let transform = read_transform(&mut decoder).map_err(raster_err)?;
        let nodata = read_nodata(&mut decoder).map_err(raster_err)?;
        let (width, height) = decoder
            .dimensions()
            .map_err(|e| raster_err(format!("dimensions error: {e}")))?;
        let (width, height) = (width as usize, height as usize);
        if width == 0 || height == 0 {
            return Err(raster_err("raster has zero width or height".into()));
        }

        let mut pages = Vec::new();
        let mut ifd = 0usize;
        loop {
            if is_overview(&mut decoder).map_err(raster_err)? {
                debug!(page = ifd, "skipping reduced-resolution page");
            } else {
                let (w, h) = decoder
                    .dimensions()
                    .map_err(|e| raster_err(format!("dimensions error: {e}")))?;
                if (w as usize, h as usize) != (width, height) {
                    return Err(raster_err(format!(
                        "page {ifd} is {w}×{h}, expected {width}×{height} like the first page"
                    )));
                }
                pages.push(page_layout(&mut decoder, ifd).map_err(raster_err)?);
            }

            if !decoder.more_images() {
                break;
            }
            decoder
                .next_image()
                .map_err(|e| raster_err(format!("cannot advance to page {}: {e}", ifd + 1)))?;
            ifd += 1;
        }
        if pages.is_empty() {
            return Err(raster_err("no full-resolution image".into()));
        }

        Ok(Self {
            path,
            decoder,
            grid: RasterGrid {
                width,
                height,
                transform,
            },
            nodata,
            pages,
            current_ifd: ifd,
            chunks_read: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Strips or tiles decoded so far.
    pub fn chunks_read(&self) -> usize {
        self.chunks_read
    }

    fn raster_err(&self, reason: String) -> ZonalError {
        ZonalError::Raster {
            path: self.path.clone(),
            reason,
        }
    }

    fn seek(&mut self, ifd: usize) -> Result<()> {
        if self.current_ifd != ifd {
            self.decoder
                .seek_to_image(ifd)
                .map_err(|e| self.raster_err(format!("cannot seek to page {ifd}: {e}")))?;
            self.current_ifd = ifd;
        }
        Ok(())
    }

    /// Decode one chunk and check it holds `expected` samples.
    fn read_chunk(&mut self, index: usize, expected: usize) -> Result<Vec<f32>> {
        let chunk = u32::try_from(index).map_err(|_| self.raster_err(format!("chunk index {index} out of range")))?;
        let values = self
            .decoder
            .read_chunk(chunk)
            .map_err(|e| e.to_string())
            .and_then(to_f32)
            .map_err(|e| self.raster_err(format!("chunk {index}: {e}")))?;
        self.chunks_read += 1;
        if values.len() != expected {
            return Err(self.raster_err(format!(
                "chunk {index} holds {} samples, expected {expected}",
                values.len()
            )));
        }
        Ok(values)
    }
}

impl<R: Read + Seek> BandSource for GeoTiffStack<R> {
    fn grid(&self) -> RasterGrid {
        self.grid
    }

    fn band_count(&self) -> usize {
        self.pages.iter().map(|p| p.samples).sum()
    }

    fn read_window(&mut self, window: &Window) -> Result<Vec<Vec<f32>>> {
        let RasterGrid { width, height, .. } = self.grid;
        if !window.fits(width, height) || window.width == 0 || window.height == 0 {
            return Err(ZonalError::WindowOutOfBounds {
                window: *window,
                width,
                height,
            });
        }

        let pixels = window.width * window.height;
        let mut bands = vec![vec![f32::NAN; pixels]; self.band_count()];
        let mut first_band = 0;

        for page in self.pages.clone() {
            self.seek(page.ifd)?;
            let (cw, ch) = (page.chunk_width, page.chunk_height);
            let across = page.chunks_across(width);
            let per_plane = page.chunks_per_plane(width, height);

            for cy in window.row_off / ch..=(window.row_off + window.height - 1) / ch {
                for cx in window.col_off / cw..=(window.col_off + window.width - 1) / cw {
                    let chunk = ChunkRect {
                        col_off: cx * cw,
                        row_off: cy * ch,
                        width: cw.min(width - cx * cw),
                        height: ch.min(height - cy * ch),
                    };
                    let index = cy * across + cx;
                    let chunk_pixels = chunk.width * chunk.height;

                    if page.planar {
                        for s in 0..page.samples {
                            let values = self.read_chunk(s * per_plane + index, chunk_pixels)?;
                            copy_chunk(&mut bands[first_band + s], window, &chunk, &values, 1, 0);
                        }
                    } else {
                        let values = self.read_chunk(index, chunk_pixels * page.samples)?;
                        for s in 0..page.samples {
                            copy_chunk(&mut bands[first_band + s], window, &chunk, &values, page.samples, s);
                        }
                    }
                }
            }
            first_band += page.samples;
        }

        if let Some(nd) = self.nodata {
            for v in bands.iter_mut().flatten() {
                if *v == nd {
                    *v = f32::NAN;
                }
            }
        }
        Ok(bands)
    }
}

/// Pixel extent of one decoded strip or tile, edge padding excluded.
#[derive(Debug, Clone, Copy)]
struct ChunkRect {
    col_off: usize,
    row_off: usize,
    width: usize,
    height: usize,
}

/// Copy sample `offset` of every `stride` values of `src` (laid out over
/// `chunk`) into the part of `band` (laid out over `window`) they overlap.
fn copy_chunk(band: &mut [f32], window: &Window, chunk: &ChunkRect, src: &[f32], stride: usize, offset: usize) {
    let col_start = window.col_off.max(chunk.col_off);
    let col_end = (window.col_off + window.width).min(chunk.col_off + chunk.width);
    let row_start = window.row_off.max(chunk.row_off);
    let row_end = (window.row_off + window.height).min(chunk.row_off + chunk.height);

    for row in row_start..row_end {
        for col in col_start..col_end {
            let src_px = (row - chunk.row_off) * chunk.width + (col - chunk.col_off);
            band[(row - window.row_off) * window.width + (col - window.col_off)] = src[src_px * stride + offset];
        }
    }
}

fn page_layout<R: Read + Seek>(decoder: &mut Decoder<R>, ifd: usize) -> std::result::Result<BandPage, String> {
    let samples = match decoder
        .find_tag(Tag::SamplesPerPixel)
        .map_err(|e| format!("SamplesPerPixel: {e}"))?
    {
        Some(v) => v.into_u32().map_err(|e| format!("SamplesPerPixel: {e}"))? as usize,
        None => 1,
    };
    let planar = match decoder
        .find_tag(Tag::PlanarConfiguration)
        .map_err(|e| format!("PlanarConfiguration: {e}"))?
    {
        Some(v) => v.into_u32().map_err(|e| format!("PlanarConfiguration: {e}"))? == PLANAR_SEPARATE,
        None => false,
    };
    let (cw, ch) = decoder.chunk_dimensions();
    if samples == 0 || cw == 0 || ch == 0 {
        return Err(format!("page {ifd} has an empty sample or chunk layout"));
    }
    Ok(BandPage {
        ifd,
        samples,
        // A single sample is the same either way; read it as chunky.
        planar: planar && samples > 1,
        chunk_width: cw as usize,
        chunk_height: ch as usize,
    })
}

fn f64_tag<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    tag: Tag,
    name: &str,
) -> std::result::Result<Option<Vec<f64>>, String> {
    match decoder.find_tag(tag).map_err(|e| format!("{name}: {e}"))? {
        Some(v) => v.into_f64_vec().map(Some).map_err(|e| format!("{name}: {e}")),
        None => Ok(None),
    }
}

fn to_f32(img: DecodingResult) -> std::result::Result<Vec<f32>, String> {
    #[allow(unreachable_patterns)]
    let out = match img {
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f32).collect(),
        _ => return Err("unsupported sample format".into()),
    };
    Ok(out)
}

fn is_overview<R: Read + Seek>(decoder: &mut Decoder<R>) -> std::result::Result<bool, String> {
    let subfile = decoder
        .find_tag(Tag::NewSubfileType)
        .map_err(|e| format!("NewSubfileType: {e}"))?;
    match subfile {
        Some(v) => Ok(v.into_u32().map_err(|e| format!("NewSubfileType: {e}"))? & 1 == 1),
        None => Ok(false),
    }
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> std::result::Result<Option<f32>, String> {
    let Some(value) = decoder
        .find_tag(Tag::GdalNodata)
        .map_err(|e| format!("GDAL_NODATA: {e}"))?
    else {
        return Ok(None);
    };
    let text = value.into_string().map_err(|e| format!("GDAL_NODATA: {e}"))?;
    let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    let nd: f64 = text
        .parse()
        .map_err(|_| format!("GDAL_NODATA '{text}' is not a number"))?;
    // NaN nodata needs no substitution: NaN already means missing.
    Ok(if nd.is_nan() { None } else { Some(nd as f32) })
}

fn read_transform<R: Read + Seek>(decoder: &mut Decoder<R>) -> std::result::Result<GeoTransform, String> {
    let mut transform = if let Some(m) = f64_tag(decoder, Tag::ModelTransformationTag, "ModelTransformation")? {
        if m.len() < 8 {
            return Err("ModelTransformation has fewer than 8 values".into());
        }
        if m[1] != 0.0 || m[4] != 0.0 {
            return Err("rotated rasters are not supported".into());
        }
        GeoTransform::new(m[3], m[7], m[0], m[5])
    } else {
        let scale = f64_tag(decoder, Tag::ModelPixelScaleTag, "ModelPixelScale")?
            .ok_or("raster is not georeferenced (no ModelPixelScale or ModelTransformation)")?;
        let tie = f64_tag(decoder, Tag::ModelTiepointTag, "ModelTiepoint")?
            .ok_or("raster is not georeferenced (no ModelTiepoint)")?;
        if scale.len() < 2 || tie.len() < 6 {
            return Err("malformed ModelPixelScale/ModelTiepoint".into());
        }
        let (sx, sy) = (scale[0], scale[1]);
        let (i, j, x, y) = (tie[0], tie[1], tie[3], tie[4]);
        GeoTransform::new(x - i * sx, y + j * sy, sx, -sy)
    };

    if transform.pixel_width == 0.0 || transform.pixel_height == 0.0 {
        return Err("pixel size is zero".into());
    }

    if raster_type(decoder)? == Some(RASTER_PIXEL_IS_POINT) {
        // Tie points address pixel centres; shift to the outer corner.
        transform.origin_x -= transform.pixel_width / 2.0;
        transform.origin_y -= transform.pixel_height / 2.0;
    }
    Ok(transform)
}

/// GTRasterTypeGeoKey from the GeoKey directory, if present.
fn raster_type<R: Read + Seek>(decoder: &mut Decoder<R>) -> std::result::Result<Option<u32>, String> {
    let Some(dir) = decoder
        .find_tag(Tag::GeoKeyDirectoryTag)
        .map_err(|e| format!("GeoKeyDirectory: {e}"))?
    else {
        return Ok(None);
    };
    let keys = dir.into_u32_vec().map_err(|e| format!("GeoKeyDirectory: {e}"))?;
    // Header (version, revision, minor, count) then (id, location, count, value) entries.
    Ok(keys
        .get(4..)
        .unwrap_or(&[])
        .chunks_exact(4)
        .find(|entry| entry[0] == GT_RASTER_TYPE_GEO_KEY && entry[1] == 0)
        .map(|entry| entry[3]))
}
