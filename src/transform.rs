//! Simple image operations that bypass the palette pipeline.

use std::fmt;
use std::str::FromStr;

use image::{imageops::FilterType, DynamicImage, GenericImageView};

use crate::config::PipelineConfig;
use crate::error::{PatternError, Result};

/// Longest side after a `resize`
pub const RESIZE_BOUND: u32 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Resize,
    Grayscale,
}

impl Operation {
    pub const SUPPORTED: &'static [&'static str] = &["resize", "grayscale"];

    pub fn name(self) -> &'static str {
        match self {
            Operation::Resize => "resize",
            Operation::Grayscale => "grayscale",
        }
    }

    pub fn apply(self, img: &DynamicImage) -> DynamicImage {
        match self {
            Operation::Resize => {
                let (w, h) = img.dimensions();
                let (out_w, out_h) = bounded_size(w, h, RESIZE_BOUND);
                img.resize_exact(out_w, out_h, FilterType::Triangle)
            }
            Operation::Grayscale => img.grayscale(),
        }
    }
}

impl FromStr for Operation {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "resize" => Ok(Operation::Resize),
            "grayscale" => Ok(Operation::Grayscale),
            other => Err(PatternError::UnsupportedOperation {
                operation: other.to_string(),
                supported: Self::SUPPORTED,
            }),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Scale so the larger side equals `bound`, keeping the aspect ratio.
fn bounded_size(w: u32, h: u32, bound: u32) -> (u32, u32) {
    let ratio = w as f32 / h.max(1) as f32;
    if ratio > 1.0 {
        (bound, ((bound as f32 / ratio) as u32).max(1))
    } else {
        (((bound as f32 * ratio) as u32).max(1), bound)
    }
}

/// Decode `input`, apply the named operation and return PNG bytes.
pub fn process_bytes(input: &[u8], operation: &str, config: &PipelineConfig) -> Result<Vec<u8>> {
    config.check_input_size(input.len())?;
    let operation: Operation = operation.parse()?;

    let img = image::load_from_memory(input)?;
    let out = operation.apply(&img);
    tracing::debug!(
        %operation,
        width = out.width(),
        height = out.height(),
        "Applied pass-through operation"
    );

    let mut buf = Vec::new();
    out.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn png(w: u32, h: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([200, 30, 30])));
        let mut buf = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_parse_operations() {
        assert_eq!("resize".parse::<Operation>().unwrap(), Operation::Resize);
        assert_eq!("grayscale".parse::<Operation>().unwrap(), Operation::Grayscale);
    }

    #[test]
    fn test_unknown_operation_lists_supported() {
        match "blur".parse::<Operation>() {
            Err(PatternError::UnsupportedOperation {
                operation,
                supported,
            }) => {
                assert_eq!(operation, "blur");
                assert_eq!(supported, &["resize", "grayscale"]);
            }
            other => panic!("Expected UnsupportedOperation, got {other:?}"),
        }
    }

    #[test]
    fn test_bounded_size() {
        assert_eq!(bounded_size(600, 300, 300), (300, 150));
        assert_eq!(bounded_size(300, 600, 300), (150, 300));
        assert_eq!(bounded_size(50, 50, 300), (300, 300));
    }

    #[test]
    fn test_resize_bytes() {
        let out = process_bytes(&png(600, 200), "resize", &PipelineConfig::default()).unwrap();
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!(decoded.dimensions(), (300, 100));
    }

    #[test]
    fn test_grayscale_bytes() {
        let out = process_bytes(&png(8, 8), "grayscale", &PipelineConfig::default()).unwrap();
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!(decoded.color(), image::ColorType::L8);
    }

    #[test]
    fn test_oversized_input_rejected_before_decoding() {
        let config = PipelineConfig {
            max_input_bytes: 4,
            ..Default::default()
        };
        assert!(matches!(
            process_bytes(b"not an image at all", "resize", &config),
            Err(PatternError::OversizedInput { .. })
        ));
    }
}
