//! Catalog rows and test images.

use image::{Rgb, RgbImage};
use pattern_preview::PaletteEntry;

/// (code, rgb, hex) rows in table order
pub const CATALOG: &[(&str, [u8; 3], &str)] = &[
    ("321", [199, 43, 59], "C72B3B"),
    ("666", [255, 0, 0], "FF0000"),
    ("310", [0, 0, 0], "000000"),
    ("B5200", [255, 255, 255], "FFFFFF"),
    ("797", [19, 71, 125], "13477D"),
    ("700", [7, 115, 27], "07731B"),
    ("444", [255, 214, 0], "FFD600"),
    ("208", [131, 91, 139], "835B8B"),
    ("3865", [250, 246, 240], "FAF6F0"),
];

pub fn entries() -> Vec<PaletteEntry> {
    CATALOG
        .iter()
        .map(|(code, rgb, hex)| PaletteEntry::new(*code, *rgb, *hex))
        .collect()
}

pub fn rgb_for(code: &str) -> [u8; 3] {
    CATALOG
        .iter()
        .find(|(c, _, _)| *c == code)
        .map(|(_, rgb, _)| *rgb)
        .expect("fixture code")
}

pub fn solid(w: u32, h: u32, rgb: [u8; 3]) -> RgbImage {
    RgbImage::from_pixel(w, h, Rgb(rgb))
}

/// Smooth gradient with many distinct colors.
pub fn gradient(w: u32, h: u32) -> RgbImage {
    RgbImage::from_fn(w, h, |x, y| {
        Rgb([
            (x * 255 / w) as u8,
            (y * 255 / h) as u8,
            ((x + y) * 255 / (w + h)) as u8,
        ])
    })
}

/// Left half close to `left`, right half close to `right`.
pub fn halves(w: u32, h: u32, left: [u8; 3], right: [u8; 3]) -> RgbImage {
    RgbImage::from_fn(w, h, |x, _| if x < w / 2 { Rgb(left) } else { Rgb(right) })
}
