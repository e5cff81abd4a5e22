//! Thread-catalog pattern previews.
//!
//! Converts an arbitrary image into a preview drawn only from a fixed
//! catalog of thread colors, and reports which catalog colors were used and
//! how often.

use std::collections::BTreeMap;

use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};

pub mod catalog;
pub mod config;
pub mod error;
pub mod matcher;
pub mod postprocess;
pub mod preprocess;
pub mod reduce;
pub mod staging;
pub mod transform;

pub use catalog::{PaletteEntry, PaletteSet, PaletteStore, SubstitutionMap};
pub use config::{PipelineConfig, SmoothingConfig};
pub use error::{PatternError, Result};
pub use matcher::{PaletteMatcher, PaletteUsage, UsageRecord};
pub use staging::StagedUpload;
pub use transform::{process_bytes, Operation};

/// Caller parameters for one pattern run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternRequest {
    /// Restrict matching to these catalog codes; `None` uses the full catalog
    #[serde(default)]
    pub codes: Option<Vec<String>>,
    /// Source code -> target code overrides applied after matching
    #[serde(default)]
    pub substitutions: BTreeMap<String, String>,
    /// Maximum number of colors kept by the reduction step
    pub n_colors: usize,
    /// Working width; height follows the image aspect ratio
    pub width: u32,
    /// Median-blur the image before reduction
    #[serde(default)]
    pub grid_filter: bool,
}

impl PatternRequest {
    pub fn new(n_colors: usize, width: u32) -> Self {
        Self {
            codes: None,
            substitutions: BTreeMap::new(),
            n_colors,
            width,
            grid_filter: false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_colors == 0 || self.n_colors > reduce::MAX_COLORS {
            return Err(PatternError::invalid("n_colors", self.n_colors));
        }
        if self.width == 0 {
            return Err(PatternError::invalid("width", self.width));
        }
        if matches!(&self.codes, Some(codes) if codes.is_empty()) {
            return Err(PatternError::invalid("codes", "empty list"));
        }
        Ok(())
    }
}

/// Result of a pattern run: the encoded preview plus the used catalog colors
/// as parallel lists ordered by hue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternOutput {
    /// PNG-encoded preview at display resolution
    #[serde(skip)]
    pub image: Vec<u8>,
    pub codes: Vec<String>,
    pub hex: Vec<String>,
    pub counts: Vec<usize>,
    pub working_width: u32,
    pub working_height: u32,
}

/// Run the pattern pipeline over encoded image bytes.
pub fn pattern_bytes(
    input: &[u8],
    request: &PatternRequest,
    store: &PaletteStore,
    config: &PipelineConfig,
) -> Result<PatternOutput> {
    config.check_input_size(input.len())?;
    let img = image::load_from_memory(input)?;
    pattern_image(&img, request, store, config)
}

/// Stage uploaded bytes in a temporary file and run the pipeline over them.
/// The temporary file is removed however the run ends.
pub fn pattern_from_upload(
    upload: &[u8],
    request: &PatternRequest,
    store: &PaletteStore,
    config: &PipelineConfig,
) -> Result<PatternOutput> {
    let staged = StagedUpload::stage(upload, config)?;
    let img = staged.decode()?;
    pattern_image(&img, request, store, config)
}

/// Run the pattern pipeline over a decoded image.
pub fn pattern_image(
    img: &DynamicImage,
    request: &PatternRequest,
    store: &PaletteStore,
    config: &PipelineConfig,
) -> Result<PatternOutput> {
    request.validate()?;

    // ----------------------
    // 1. Palette + substitutions
    // ----------------------
    let palette = match &request.codes {
        Some(codes) => store.load_subset(codes)?,
        None => store.load_all()?,
    };
    let substitutions = SubstitutionMap::resolve(store, &request.substitutions)?;

    let (orig_w, orig_h) = img.dimensions();
    tracing::info!(
        width = orig_w,
        height = orig_h,
        palette = palette.len(),
        substitutions = substitutions.len(),
        n_colors = request.n_colors,
        "Generating pattern"
    );

    // ----------------------
    // 2. Smooth and shrink to working size
    // ----------------------
    let mut working = preprocess::preprocess(img, request.width, request.grid_filter, config)?;

    // ----------------------
    // 3. Reduce, then snap to catalog colors
    // ----------------------
    reduce::bucket_colors(working.pixels_mut());
    reduce::reduce_colors(working.pixels_mut(), request.n_colors)?;

    let mut matcher = PaletteMatcher::new(&palette, &substitutions)?;
    matcher.apply(working.pixels_mut());
    let usage = matcher.finish();

    // ----------------------
    // 4. Display size + PNG encode
    // ----------------------
    let display =
        postprocess::to_display(&working, config.display_width, config.max_display_pixels)?;
    let image = postprocess::encode_png(display)?;

    tracing::info!(
        colors = usage.len(),
        pixels = usage.total(),
        bytes = image.len(),
        "Pattern generated"
    );

    Ok(PatternOutput {
        image,
        codes: usage.codes,
        hex: usage.hex,
        counts: usage.counts,
        working_width: working.width(),
        working_height: working.height(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_validation() {
        assert!(PatternRequest::new(10, 100).validate().is_ok());
        assert!(PatternRequest::new(0, 100).validate().is_err());
        assert!(PatternRequest::new(10, 0).validate().is_err());
        assert!(PatternRequest::new(257, 100).validate().is_err());

        let mut request = PatternRequest::new(10, 100);
        request.codes = Some(vec![]);
        assert!(matches!(
            request.validate(),
            Err(PatternError::InvalidParameter { parameter: "codes", .. })
        ));
    }

    #[test]
    fn test_request_from_json_defaults() {
        let request: PatternRequest =
            serde_json::from_str(r#"{"n_colors": 12, "width": 80}"#).unwrap();
        assert_eq!(request, PatternRequest::new(12, 80));
    }

    #[test]
    fn test_output_serializes_usage_lists() {
        let output = PatternOutput {
            image: vec![1, 2, 3],
            codes: vec!["321".to_string()],
            hex: vec!["C72B3B".to_string()],
            counts: vec![4],
            working_width: 2,
            working_height: 2,
        };
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["codes"][0], "321");
        assert_eq!(json["counts"][0], 4);
        assert!(json.get("image").is_none());
    }
}
