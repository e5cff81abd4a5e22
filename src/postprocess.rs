//! Display-size rendering and PNG encoding of the matched image.

use std::io::Cursor;

use image::{imageops::FilterType, DynamicImage, ImageFormat, RgbImage};

use crate::error::{PatternError, Result};
use crate::preprocess::{scaled_size, WorkingImage};

/// Reshape the matched pixels into an image and scale it to the display
/// width with nearest-neighbour sampling, so no blended colors appear.
/// Previews that would exceed `max_pixels` are narrowed until they fit.
pub fn to_display(
    working: &WorkingImage,
    display_width: u32,
    max_pixels: u64,
) -> Result<RgbImage> {
    if display_width == 0 {
        return Err(PatternError::invalid("display_width", display_width));
    }

    let raw: Vec<u8> = working.pixels().iter().flatten().copied().collect();
    let img = RgbImage::from_raw(working.width(), working.height(), raw)
        .ok_or_else(|| PatternError::pipeline("postprocess", "failed to rebuild image buffer"))?;

    let (out_w, out_h) = display_size(img.width(), img.height(), display_width, max_pixels)
        .ok_or_else(|| {
            PatternError::pipeline(
                "postprocess",
                format!(
                    "{}x{} image cannot fit {max_pixels} display pixels",
                    img.width(),
                    img.height()
                ),
            )
        })?;
    if (out_w, out_h) == img.dimensions() {
        return Ok(img);
    }
    Ok(image::imageops::resize(&img, out_w, out_h, FilterType::Nearest))
}

/// Aspect-preserving size at `display_width`, narrowed when its area would
/// exceed `max_pixels`. `None` when even a one-pixel-wide preview is too big.
fn display_size(w: u32, h: u32, display_width: u32, max_pixels: u64) -> Option<(u32, u32)> {
    let area = |(w, h): (u32, u32)| w as u64 * h as u64;
    let mut size = scaled_size(w, h, display_width);
    if area(size) <= max_pixels {
        return Some(size);
    }

    let aspect = h as f64 / w.max(1) as f64;
    let mut width = ((max_pixels as f64 / aspect).sqrt().floor() as u32).clamp(1, display_width);
    size = scaled_size(w, h, width);
    while area(size) > max_pixels && width > 1 {
        width -= 1;
        size = scaled_size(w, h, width);
    }
    (area(size) <= max_pixels).then_some(size)
}

pub fn encode_png(img: RgbImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img).write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}
