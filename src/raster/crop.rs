//! Region extraction for table, formula and figure blocks.
//!
//! Boxes arrive on the analyzer's 0–1000 scale in `[ymin, xmin, ymax, xmax]`
//! order. The region is padded by a fixed number of pixels and clamped to the
//! image. A box that is out of order, or that collapses to nothing after
//! clamping, crops the whole image instead of failing.

use std::sync::Arc;

use crate::core::errors::{AppError, AppResult};
use crate::core::types::BoundingBox;
use crate::raster::codec;

pub const DEFAULT_PADDING_PX: u32 = 5;
const SCALE: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

/// Maps a normalized box to a padded pixel rectangle inside `width`×`height`.
pub fn pixel_rect(bbox: &BoundingBox, width: u32, height: u32, padding: u32) -> PixelRect {
    if !bbox.is_well_ordered() {
        return PixelRect::full(width, height);
    }

    let w = f64::from(width);
    let h = f64::from(height);
    let pad = f64::from(padding);

    let x = f64::from(bbox.xmin) / SCALE * w;
    let y = f64::from(bbox.ymin) / SCALE * h;
    let box_w = (f64::from(bbox.xmax) - f64::from(bbox.xmin)) / SCALE * w;
    let box_h = (f64::from(bbox.ymax) - f64::from(bbox.ymin)) / SCALE * h;

    let left = (x - pad).floor().clamp(0.0, w);
    let top = (y - pad).floor().clamp(0.0, h);
    let right = (x + box_w + pad).ceil().clamp(0.0, w);
    let bottom = (y + box_h + pad).ceil().clamp(0.0, h);

    if right - left <= 0.0 || bottom - top <= 0.0 {
        return PixelRect::full(width, height);
    }

    PixelRect {
        x: left as u32,
        y: top as u32,
        width: (right - left) as u32,
        height: (bottom - top) as u32,
    }
}

/// A cropped region encoded as PNG.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CroppedRegion {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Crops `bbox` out of an encoded raster.
pub fn crop_region(source: &[u8], bbox: &BoundingBox, padding: u32) -> AppResult<CroppedRegion> {
    let image = codec::decode(source)
        .map_err(|err| AppError::Crop(format!("cannot decode source raster: {err}")))?;
    if image.width() == 0 || image.height() == 0 {
        return Err(AppError::Crop("source raster is empty".to_string()));
    }

    let rect = pixel_rect(bbox, image.width(), image.height(), padding);
    let region = image.crop_imm(rect.x, rect.y, rect.width, rect.height);
    let png = codec::encode_png(&region)
        .map_err(|err| AppError::Crop(format!("png encode failed: {err}")))?;
    Ok(CroppedRegion {
        png,
        width: rect.width,
        height: rect.height,
    })
}

/// [`crop_region`] on the blocking pool.
pub async fn crop_region_async(
    source: Arc<[u8]>,
    bbox: BoundingBox,
    padding: u32,
) -> AppResult<CroppedRegion> {
    tokio::task::spawn_blocking(move || crop_region(&source, &bbox, padding))
        .await
        .map_err(|err| AppError::Crop(format!("crop task failed: {err}")))?
}
