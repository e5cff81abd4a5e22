//! Shared fixtures for the pipeline integration tests.
//!
//! Each test file compiles its own copy of this module, so items may appear
//! unused from the perspective of a single test file.

#![allow(dead_code)]

pub mod fixtures;

use std::collections::HashSet;
use std::io::Cursor;

use image::{DynamicImage, ImageFormat, RgbImage};
use pattern_preview::{PaletteStore, PipelineConfig};

/// In-memory catalog seeded with [`fixtures::CATALOG`].
pub fn catalog() -> PaletteStore {
    let store = PaletteStore::in_memory().expect("in-memory catalog");
    for entry in fixtures::entries() {
        store.insert_entry(&entry).expect("seed catalog");
    }
    store
}

/// Config whose display width equals `width`, so the preview has the same
/// pixels as the working image.
pub fn config_with_display(width: u32) -> PipelineConfig {
    PipelineConfig {
        display_width: width,
        ..Default::default()
    }
}

pub fn encode_png(img: RgbImage) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("encode test image");
    buf
}

pub fn decode_rgb(png: &[u8]) -> RgbImage {
    image::load_from_memory(png)
        .expect("decode preview")
        .to_rgb8()
}

pub fn distinct_colors(img: &RgbImage) -> HashSet<[u8; 3]> {
    img.pixels().map(|p| p.0).collect()
}
