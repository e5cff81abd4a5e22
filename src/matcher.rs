//! Nearest catalog color search.
//!
//! A [`PaletteMatcher`] is built for one pipeline run. It owns the lookup
//! cache and the usage tally, and borrows the palette and substitutions it
//! was built from, so neither can outlive or leak into another run with a
//! different palette.

use std::collections::HashMap;

use palette::{FromColor, Hsv, Srgb};
use serde::{Deserialize, Serialize};

use crate::catalog::{PaletteEntry, PaletteSet, SubstitutionMap};
use crate::error::{PatternError, Result};

/// Aggregated pixel count for one final (post-substitution) catalog color.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageRecord {
    pub code: String,
    pub hex: String,
    pub rgb: [u8; 3],
    /// Hue in degrees, `0.0..360.0`
    pub hue: f32,
    pub count: usize,
}

/// Used catalog colors as parallel lists ordered by ascending hue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaletteUsage {
    pub codes: Vec<String>,
    pub hex: Vec<String>,
    pub counts: Vec<usize>,
}

impl PaletteUsage {
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Total number of matched pixels.
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    pub fn count_for(&self, code: &str) -> Option<usize> {
        self.codes
            .iter()
            .position(|c| c == code)
            .map(|i| self.counts[i])
    }
}

/// Hue of an sRGB color in degrees.
pub fn hue_degrees(rgb: [u8; 3]) -> f32 {
    let color = Srgb::<u8>::new(rgb[0], rgb[1], rgb[2]).into_format::<f32>();
    let hsv: Hsv = Hsv::from_color(color);
    hsv.hue.into_positive_degrees()
}

fn squared_distance(a: [u8; 3], b: [u8; 3]) -> i32 {
    let dr = a[0] as i32 - b[0] as i32;
    let dg = a[1] as i32 - b[1] as i32;
    let db = a[2] as i32 - b[2] as i32;
    dr * dr + dg * dg + db * db
}

pub struct PaletteMatcher<'a> {
    palette: &'a PaletteSet,
    substitutions: &'a SubstitutionMap,
    cache: HashMap<[u8; 3], usize>,
    usage: Vec<UsageRecord>,
    usage_index: HashMap<String, usize>,
    cache_hits: usize,
}

impl<'a> PaletteMatcher<'a> {
    pub fn new(palette: &'a PaletteSet, substitutions: &'a SubstitutionMap) -> Result<Self> {
        if palette.is_empty() {
            return Err(PatternError::invalid("codes", "empty palette"));
        }
        Ok(Self {
            palette,
            substitutions,
            cache: HashMap::new(),
            usage: Vec::new(),
            usage_index: HashMap::new(),
            cache_hits: 0,
        })
    }

    /// Palette index closest to `color` by Euclidean RGB distance. The
    /// lowest index wins ties.
    pub fn nearest_index(&mut self, color: [u8; 3]) -> usize {
        if let Some(&idx) = self.cache.get(&color) {
            self.cache_hits += 1;
            return idx;
        }

        let mut best = 0;
        let mut best_dist = i32::MAX;
        for (idx, entry) in self.palette.iter().enumerate() {
            let dist = squared_distance(color, entry.rgb);
            if dist < best_dist {
                best_dist = dist;
                best = idx;
            }
        }
        self.cache.insert(color, best);
        best
    }

    /// Map `color` to its final catalog color and count it.
    pub fn resolve(&mut self, color: [u8; 3]) -> [u8; 3] {
        let palette = self.palette;
        let substitutions = self.substitutions;

        let idx = self.nearest_index(color);
        let matched = &palette.entries()[idx];
        let entry = substitutions.target_for(&matched.code).unwrap_or(matched);
        self.record(entry);
        entry.rgb
    }

    /// Resolve every pixel in place.
    pub fn apply(&mut self, pixels: &mut [[u8; 3]]) {
        for px in pixels.iter_mut() {
            *px = self.resolve(*px);
        }
    }

    fn record(&mut self, entry: &PaletteEntry) {
        match self.usage_index.get(&entry.code) {
            Some(&i) => self.usage[i].count += 1,
            None => {
                self.usage_index
                    .insert(entry.code.clone(), self.usage.len());
                self.usage.push(UsageRecord {
                    code: entry.code.clone(),
                    hex: entry.hex.clone(),
                    rgb: entry.rgb,
                    hue: hue_degrees(entry.rgb),
                    count: 1,
                });
            }
        }
    }

    /// Consume the matcher, returning usage ordered by hue. Entries with
    /// equal hue keep the order in which they were first seen.
    pub fn finish(self) -> PaletteUsage {
        let mut records = self.usage;
        records.sort_by(|a, b| a.hue.total_cmp(&b.hue));

        tracing::debug!(
            cached_colors = self.cache.len(),
            cache_hits = self.cache_hits,
            used = records.len(),
            "Matched colors to palette"
        );

        let mut usage = PaletteUsage::default();
        for record in records {
            usage.codes.push(record.code);
            usage.hex.push(record.hex);
            usage.counts.push(record.count);
        }
        usage
    }
}
