use image::{ImageFormat, ImageReader};
use std::io::Cursor;
use std::path::Path;

use crate::models::detection::BoundingBox;

/// A bounding box clipped to image bounds, with unsigned dimensions safe to
/// hand to a crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClippedBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Clip a reported bounding box to the image, or `None` when nothing of the
/// box remains inside the image.
///
/// The origin is clamped into `[0, dimension]` and the size truncated to what
/// fits from the clamped origin. A box entirely outside the image ends up with
/// non-positive width or height and is rejected here rather than at crop time.
pub fn clip_to_bounds(bbox: &BoundingBox, img_width: u32, img_height: u32) -> Option<ClippedBox> {
    let x = bbox.x.clamp(0, i64::from(img_width));
    let y = bbox.y.clamp(0, i64::from(img_height));
    let width = bbox.width.min(i64::from(img_width) - x);
    let height = bbox.height.min(i64::from(img_height) - y);

    if width <= 0 || height <= 0 {
        return None;
    }

    Some(ClippedBox {
        x: x as u32,
        y: y as u32,
        width: width as u32,
        height: height as u32,
    })
}

/// Crop the detected region out of a local image, returning PNG bytes.
///
/// The staged file's extension says nothing about its contents (uploads keep
/// whatever format the client sent), so the decoder is chosen by sniffing the
/// file, not by extension.
pub fn extract_region(image_path: &Path, bbox: &BoundingBox) -> Result<Vec<u8>, ExtractionError> {
    let img = ImageReader::open(image_path)?
        .with_guessed_format()?
        .decode()?;

    let clipped = clip_to_bounds(bbox, img.width(), img.height()).ok_or_else(|| {
        ExtractionError::EmptyRegion {
            bbox: *bbox,
            img_width: img.width(),
            img_height: img.height(),
        }
    })?;

    let cropped = img.crop_imm(clipped.x, clipped.y, clipped.width, clipped.height);

    let mut bytes = Vec::new();
    cropped.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("Image decode/encode failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("Failed to read image: {0}")]
    Io(#[from] std::io::Error),

    #[error("Bounding box {bbox:?} has no overlap with {img_width}x{img_height} image")]
    EmptyRegion {
        bbox: BoundingBox,
        img_width: u32,
        img_height: u32,
    },
}
