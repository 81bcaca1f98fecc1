//! Pure region cropping logic — pixels in, pixels out.
//!
//! Exclude regions are subtracted from a capture region's crop before the
//! crop reaches the backend (exclude wins on overlap). A capture region
//! fully covered by excludes, or fully off-screen, produces no crop at all.

use crate::region::Rect;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

#[derive(Debug, thiserror::Error)]
pub enum CropError {
    #[error("crop rectangle has zero width or height")]
    ZeroDimension,

    #[error("PNG encoding failed: {0}")]
    EncodingFailed(String),
}

/// Crop `frame` to `region`, painting out every overlapping exclude rect.
///
/// `frame_bounds` are the screen coordinates the frame was captured at;
/// `region` and `excludes` are in the same screen space. Returns `None`
/// when the region lies outside the frame or is entirely excluded.
pub fn crop_region(
    frame: &DynamicImage,
    frame_bounds: Rect,
    region: Rect,
    excludes: &[Rect],
) -> Result<Option<DynamicImage>, CropError> {
    if !region.is_valid() {
        return Err(CropError::ZeroDimension);
    }

    let frame_rect = Rect::new(frame_bounds.x, frame_bounds.y, frame.width(), frame.height());
    let visible = match region.intersect(&frame_rect) {
        Some(v) => v,
        None => return Ok(None),
    };

    let mut crop = frame
        .crop_imm(
            (visible.x - frame_rect.x) as u32,
            (visible.y - frame_rect.y) as u32,
            visible.w,
            visible.h,
        )
        .to_rgba8();

    let remaining = mask_excludes(&mut crop, visible, excludes);
    if remaining == 0 {
        return Ok(None);
    }

    Ok(Some(DynamicImage::ImageRgba8(crop)))
}

/// Paint excluded areas black and return the count of surviving pixels.
///
/// A per-pixel mask is tracked so overlapping excludes are not counted
/// twice when deciding whether anything survives.
fn mask_excludes(crop: &mut RgbaImage, crop_screen_rect: Rect, excludes: &[Rect]) -> u64 {
    let (w, h) = (crop.width() as usize, crop.height() as usize);
    let mut masked = vec![false; w * h];

    for exclude in excludes {
        let overlap = match exclude.intersect(&crop_screen_rect) {
            Some(o) => o,
            None => continue,
        };
        let x0 = (overlap.x - crop_screen_rect.x) as usize;
        let y0 = (overlap.y - crop_screen_rect.y) as usize;
        for y in y0..y0 + overlap.h as usize {
            for x in x0..x0 + overlap.w as usize {
                crop.put_pixel(x as u32, y as u32, Rgba([0, 0, 0, 255]));
                masked[y * w + x] = true;
            }
        }
    }

    masked.iter().filter(|m| !**m).count() as u64
}

/// Encode an image as PNG bytes for the wire.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, CropError> {
    let mut bytes: Vec<u8> = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| CropError::EncodingFailed(e.to_string()))?;
    Ok(bytes)
}
