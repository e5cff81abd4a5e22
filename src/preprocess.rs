//! Smoothing, optional grid filtering and the shrink to working size.

use image::{imageops::FilterType, DynamicImage, GenericImageView, Rgb, RgbImage};

use crate::config::{PipelineConfig, SmoothingConfig};
use crate::error::{PatternError, Result};

/// Flat RGB pixel grid that the reduction and matching stages work on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingImage {
    width: u32,
    height: u32,
    pixels: Vec<[u8; 3]>,
}

impl WorkingImage {
    pub fn from_rgb(img: &RgbImage) -> Self {
        Self {
            width: img.width(),
            height: img.height(),
            pixels: img.pixels().map(|p| p.0).collect(),
        }
    }

    pub fn from_pixels(width: u32, height: u32, pixels: Vec<[u8; 3]>) -> Result<Self> {
        if pixels.len() != width as usize * height as usize {
            return Err(PatternError::pipeline(
                "reshape",
                format!(
                    "{} pixels cannot fill a {width}x{height} grid",
                    pixels.len()
                ),
            ));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_count(&self) -> usize {
        self.pixels.len()
    }

    pub fn pixels(&self) -> &[[u8; 3]] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [[u8; 3]] {
        &mut self.pixels
    }
}

/// Smooth, optionally grid-filter, and shrink `img` to the working width.
pub fn preprocess(
    img: &DynamicImage,
    width: u32,
    grid_filter: bool,
    config: &PipelineConfig,
) -> Result<WorkingImage> {
    if width == 0 {
        return Err(PatternError::invalid("width", width));
    }
    let (orig_w, orig_h) = img.dimensions();
    let (work_w, work_h) = scaled_size(orig_w, orig_h, width);
    let work_pixels = work_w as u64 * work_h as u64;
    if work_pixels > config.max_working_pixels {
        return Err(PatternError::invalid(
            "width",
            format!(
                "{width} ({work_w}x{work_h} exceeds {} working pixels)",
                config.max_working_pixels
            ),
        ));
    }

    let rgb = img.to_rgb8();
    let mut filtered = bilateral_filter(&rgb, &config.smoothing);
    if grid_filter {
        filtered = median_blur(&filtered, config.grid_filter_radius);
    }

    let resized = image::imageops::resize(&filtered, work_w, work_h, FilterType::Nearest);
    tracing::debug!(
        from_w = rgb.width(),
        from_h = rgb.height(),
        work_w,
        work_h,
        grid_filter,
        "Preprocessed image"
    );
    Ok(WorkingImage::from_rgb(&resized))
}

/// Size with the given width and the aspect ratio of `orig_w`×`orig_h`.
pub fn scaled_size(orig_w: u32, orig_h: u32, width: u32) -> (u32, u32) {
    let ratio = width as f32 / orig_w.max(1) as f32;
    let height = ((orig_h as f32) * ratio).round().max(1.0) as u32;
    (width, height)
}

/// Edge-preserving smoothing.
///
/// Each output pixel is a weighted mean over its neighbourhood, where the
/// weight falls off with both spatial distance and color difference, so
/// flat regions are denoised while hard boundaries stay put.
pub fn bilateral_filter(img: &RgbImage, params: &SmoothingConfig) -> RgbImage {
    let (w, h) = img.dimensions();
    let radius = params.radius;
    if radius == 0 || w == 0 || h == 0 {
        return img.clone();
    }

    let color_denom = 2.0 * params.sigma_color * params.sigma_color;
    let space_denom = 2.0 * params.sigma_space * params.sigma_space;
    let r = radius as i32;
    let side = (2 * r + 1) as usize;
    let mut spatial = Vec::with_capacity(side * side);
    for dy in -r..=r {
        for dx in -r..=r {
            let d2 = (dx * dx + dy * dy) as f32;
            spatial.push((-d2 / space_denom).exp());
        }
    }

    let mut output = RgbImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let center = img.get_pixel(x, y).0;
            let mut sum = [0.0f32; 3];
            let mut weight_sum = 0.0f32;

            for dy in -r..=r {
                let ny = y as i32 + dy;
                if ny < 0 || ny >= h as i32 {
                    continue;
                }
                for dx in -r..=r {
                    let nx = x as i32 + dx;
                    if nx < 0 || nx >= w as i32 {
                        continue;
                    }
                    let neighbor = img.get_pixel(nx as u32, ny as u32).0;
                    let color_d2: f32 = (0..3)
                        .map(|c| {
                            let d = neighbor[c] as f32 - center[c] as f32;
                            d * d
                        })
                        .sum();
                    let k = ((dy + r) as usize) * side + (dx + r) as usize;
                    let weight = spatial[k] * (-color_d2 / color_denom).exp();

                    for c in 0..3 {
                        sum[c] += neighbor[c] as f32 * weight;
                    }
                    weight_sum += weight;
                }
            }

            // the center always contributes weight 1, so weight_sum > 0
            let px = [
                (sum[0] / weight_sum).round().clamp(0.0, 255.0) as u8,
                (sum[1] / weight_sum).round().clamp(0.0, 255.0) as u8,
                (sum[2] / weight_sum).round().clamp(0.0, 255.0) as u8,
            ];
            output.put_pixel(x, y, Rgb(px));
        }
    }
    output
}

/// Per-channel median over a (2r+1)² window with clamped borders.
pub fn median_blur(img: &RgbImage, radius: u32) -> RgbImage {
    if radius == 0 {
        return img.clone();
    }

    let (width, height) = img.dimensions();
    let half = radius as i32;
    let side = (2 * radius + 1) as usize;
    let mut result = RgbImage::new(width, height);
    let mut channels: [Vec<u8>; 3] = std::array::from_fn(|_| Vec::with_capacity(side * side));

    for y in 0..height {
        for x in 0..width {
            for values in channels.iter_mut() {
                values.clear();
            }

            for dy in -half..=half {
                for dx in -half..=half {
                    let nx = (x as i32 + dx).clamp(0, width as i32 - 1) as u32;
                    let ny = (y as i32 + dy).clamp(0, height as i32 - 1) as u32;
                    let p = img.get_pixel(nx, ny).0;
                    for c in 0..3 {
                        channels[c].push(p[c]);
                    }
                }
            }

            let mut px = [0u8; 3];
            for c in 0..3 {
                channels[c].sort_unstable();
                px[c] = channels[c][channels[c].len() / 2];
            }
            result.put_pixel(x, y, Rgb(px));
        }
    }
    result
}
