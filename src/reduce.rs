//! Sampled k-means color reduction.
//!
//! Pixels are first floored into coarse buckets, then a k-means model is fit
//! over a seeded random sample of them and every pixel is replaced by its
//! nearest cluster center. The seed is fixed so identical inputs always
//! produce identical output.

use std::collections::{HashMap, HashSet};

use kmeans_colors::get_kmeans;
use palette::Srgb;
use rand::{rngs::StdRng, seq::index, SeedableRng};

use crate::error::{PatternError, Result};

/// Channel bucket width applied before clustering
pub const BUCKET_SIZE: u8 = 32;
/// Images with more pixels than this are sampled before fitting
pub const SAMPLE_THRESHOLD: usize = 10_000;
pub const SAMPLE_SIZE: usize = 1_000;
/// Seed for both sample selection and cluster initialization
pub const SEED: u64 = 42;
/// Upper bound on `n_colors` (cluster labels are stored as `u8`)
pub const MAX_COLORS: usize = 256;

const MAX_ITERATIONS: usize = 20;
const CONVERGENCE: f32 = 1e-4;

/// Floor each channel to a multiple of [`BUCKET_SIZE`].
pub fn bucket_colors(pixels: &mut [[u8; 3]]) {
    for px in pixels.iter_mut() {
        for c in px.iter_mut() {
            *c = *c / BUCKET_SIZE * BUCKET_SIZE;
        }
    }
}

/// Replace every pixel with its cluster center, using at most `n_colors`
/// clusters. Returns the number of clusters fitted.
pub fn reduce_colors(pixels: &mut [[u8; 3]], n_colors: usize) -> Result<usize> {
    if n_colors == 0 || n_colors > MAX_COLORS {
        return Err(PatternError::invalid("n_colors", n_colors));
    }
    if pixels.is_empty() {
        return Err(PatternError::pipeline("reduce", "no pixels to cluster"));
    }

    let distinct: HashSet<[u8; 3]> = pixels.iter().copied().collect();
    if distinct.len() <= n_colors {
        tracing::debug!(
            distinct = distinct.len(),
            n_colors,
            "Color count already within limit, skipping clustering"
        );
        return Ok(distinct.len());
    }

    let sample = sample_pixels(pixels);
    // k-means++ seeding needs at least k distinct points to draw from
    let sample_distinct = sample.iter().copied().collect::<HashSet<_>>().len();
    let k = n_colors.min(sample_distinct);

    let buffer: Vec<Srgb> = sample
        .iter()
        .map(|&[r, g, b]| Srgb::<u8>::new(r, g, b).into_format::<f32>())
        .collect();
    let kmeans = get_kmeans(k, MAX_ITERATIONS, CONVERGENCE, false, &buffer, SEED);

    let centers: Vec<[f32; 3]> = kmeans
        .centroids
        .iter()
        .map(|c| [c.red * 255.0, c.green * 255.0, c.blue * 255.0])
        .collect();
    let rounded: Vec<[u8; 3]> = kmeans
        .centroids
        .iter()
        .map(|&c| {
            let c: Srgb<u8> = c.into_format();
            [c.red, c.green, c.blue]
        })
        .collect();

    let mut assigned: HashMap<[u8; 3], [u8; 3]> = HashMap::with_capacity(distinct.len());
    for px in pixels.iter_mut() {
        let center = *assigned
            .entry(*px)
            .or_insert_with(|| rounded[nearest_center(*px, &centers)]);
        *px = center;
    }

    tracing::debug!(
        pixels = pixels.len(),
        sampled = sample.len(),
        distinct = distinct.len(),
        clusters = centers.len(),
        score = kmeans.score,
        "Reduced colors"
    );
    Ok(centers.len())
}

fn sample_pixels(pixels: &[[u8; 3]]) -> Vec<[u8; 3]> {
    if pixels.len() <= SAMPLE_THRESHOLD {
        return pixels.to_vec();
    }
    let mut rng = StdRng::seed_from_u64(SEED);
    index::sample(&mut rng, pixels.len(), SAMPLE_SIZE)
        .iter()
        .map(|i| pixels[i])
        .collect()
}

/// Index of the closest center; the first minimum wins ties.
fn nearest_center(px: [u8; 3], centers: &[[f32; 3]]) -> usize {
    let mut best = 0;
    let mut best_dist = f32::MAX;
    for (idx, c) in centers.iter().enumerate() {
        let dr = px[0] as f32 - c[0];
        let dg = px[1] as f32 - c[1];
        let db = px[2] as f32 - c[2];
        let dist = dr * dr + dg * dg + db * db;
        if dist < best_dist {
            best_dist = dist;
            best = idx;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(w: u32, h: u32) -> Vec<[u8; 3]> {
        let mut pixels = Vec::with_capacity((w * h) as usize);
        for y in 0..h {
            for x in 0..w {
                pixels.push([(x * 255 / w) as u8, (y * 255 / h) as u8, ((x + y) % 256) as u8]);
            }
        }
        pixels
    }

    fn distinct(pixels: &[[u8; 3]]) -> usize {
        pixels.iter().copied().collect::<HashSet<_>>().len()
    }

    #[test]
    fn test_bucket_floors_channels() {
        let mut pixels = vec![[31, 32, 255], [0, 63, 64]];
        bucket_colors(&mut pixels);
        assert_eq!(pixels, vec![[0, 32, 224], [0, 32, 64]]);
    }

    #[test]
    fn test_few_colors_pass_through_unchanged() {
        let mut pixels = vec![[0, 0, 0], [224, 0, 0], [0, 0, 0]];
        let original = pixels.clone();
        assert_eq!(reduce_colors(&mut pixels, 4).unwrap(), 2);
        assert_eq!(pixels, original);
    }

    #[test]
    fn test_large_image_respects_color_limit() {
        let mut pixels = gradient(160, 120);
        bucket_colors(&mut pixels);
        assert!(distinct(&pixels) > 8);
        reduce_colors(&mut pixels, 8).unwrap();
        assert!(distinct(&pixels) <= 8);
        assert_eq!(pixels.len(), 160 * 120);
    }

    #[test]
    fn test_small_image_respects_color_limit() {
        let mut pixels = gradient(40, 40);
        bucket_colors(&mut pixels);
        reduce_colors(&mut pixels, 3).unwrap();
        assert!(distinct(&pixels) <= 3);
    }

    #[test]
    fn test_reduction_is_deterministic() {
        let mut first = gradient(150, 100);
        let mut second = first.clone();
        bucket_colors(&mut first);
        bucket_colors(&mut second);
        reduce_colors(&mut first, 6).unwrap();
        reduce_colors(&mut second, 6).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_separated_groups_land_in_separate_clusters() {
        let dark = [[0, 0, 0], [32, 0, 0], [0, 32, 0]];
        let light = [[224, 224, 224], [192, 224, 224]];
        let mut pixels: Vec<[u8; 3]> = (0..200)
            .map(|i| if i % 2 == 0 { dark[i % 3] } else { light[(i / 2) % 2] })
            .collect();
        let groups: Vec<bool> = pixels.iter().map(|p| p[0] < 128).collect();
        reduce_colors(&mut pixels, 2).unwrap();

        let dark_out: HashSet<[u8; 3]> = pixels
            .iter()
            .zip(&groups)
            .filter(|(_, d)| **d)
            .map(|(p, _)| *p)
            .collect();
        let light_out: HashSet<[u8; 3]> = pixels
            .iter()
            .zip(&groups)
            .filter(|(_, d)| !**d)
            .map(|(p, _)| *p)
            .collect();
        assert_eq!(dark_out.len(), 1);
        assert_eq!(light_out.len(), 1);
        assert_ne!(dark_out, light_out);
    }

    #[test]
    fn test_invalid_color_counts_rejected() {
        let mut pixels = vec![[0, 0, 0]];
        assert!(matches!(
            reduce_colors(&mut pixels, 0),
            Err(PatternError::InvalidParameter { parameter: "n_colors", .. })
        ));
        assert!(reduce_colors(&mut pixels, MAX_COLORS + 1).is_err());
    }

    #[test]
    fn test_nearest_center_first_minimum_wins() {
        let centers = [[10.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 0.0, 0.0]];
        assert_eq!(nearest_center([0, 0, 0], &centers), 1);
        assert_eq!(nearest_center([5, 0, 0], &centers), 0);
    }
}
