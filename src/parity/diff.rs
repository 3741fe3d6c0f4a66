//! Perceptual screenshot comparison.
//!
//! Pixels are compared in CIE LAB: a pixel differs when the Euclidean
//! distance (ΔE76) between source and clone exceeds the threshold. Images of
//! different sizes are compared on the union canvas, where everything outside
//! the overlap counts as differing.

use image::{ImageFormat, RgbImage};
use lab::Lab;
use rayon::prelude::*;

/// Per-channel difference multiplier for the diff image.
const AMPLIFY: u8 = 10;

/// Diff image color for area covered by only one screenshot.
const MISMATCH: [u8; 3] = [255, 0, 0];

/// Result of comparing two screenshots.
#[derive(Debug)]
pub struct Comparison {
    /// Similarity in percent, two decimals.
    pub score: f64,
    pub dimension_mismatch: bool,
    pub differing: u64,
    pub total: u64,
    pub diff: RgbImage,
}

/// Decode PNG bytes into an RGB canvas (alpha dropped).
pub fn decode_png(bytes: &[u8]) -> Result<RgbImage, image::ImageError> {
    Ok(image::load_from_memory_with_format(bytes, ImageFormat::Png)?.to_rgb8())
}

/// Compare `source` and `local`, counting pixels whose ΔE exceeds `threshold`.
pub fn compare(source: &RgbImage, local: &RgbImage, threshold: f32) -> Comparison {
    let (width, height) = (
        source.width().max(local.width()),
        source.height().max(local.height()),
    );
    let overlap_w = source.width().min(local.width()) as usize;
    let overlap_h = source.height().min(local.height()) as usize;
    let dimension_mismatch = source.dimensions() != local.dimensions();

    let total = u64::from(width) * u64::from(height);
    if total == 0 {
        return Comparison {
            score: if dimension_mismatch { 0.0 } else { 100.0 },
            dimension_mismatch,
            differing: 0,
            total,
            diff: RgbImage::new(width.max(1), height.max(1)),
        };
    }

    let stride = width as usize * 3;
    let threshold_sq = threshold * threshold;
    let mut buf = vec![0u8; stride * height as usize];

    let differing: u64 = buf
        .par_chunks_mut(stride)
        .enumerate()
        .map(|(y, row)| {
            if y >= overlap_h {
                paint_mismatch(row);
                return u64::from(width);
            }

            let src = row_bytes(source, y, overlap_w);
            let loc = row_bytes(local, y, overlap_w);
            let src_lab = lab::rgb_bytes_to_labs(src);
            let loc_lab = lab::rgb_bytes_to_labs(loc);

            let mut count = 0u64;
            for (x, (a, b)) in src_lab.iter().zip(&loc_lab).enumerate() {
                if delta_e_sq(a, b) > threshold_sq {
                    count += 1;
                }
                for c in x * 3..x * 3 + 3 {
                    row[c] = src[c].abs_diff(loc[c]).saturating_mul(AMPLIFY);
                }
            }

            let outside = &mut row[overlap_w * 3..];
            paint_mismatch(outside);
            count + (outside.len() / 3) as u64
        })
        .sum();

    #[allow(clippy::cast_precision_loss)] // pixel counts fit comfortably in f64
    let score = 100.0 * (1.0 - differing as f64 / total as f64);

    Comparison {
        score: (score * 100.0).round() / 100.0,
        dimension_mismatch,
        differing,
        total,
        // Buffer length is stride * height by construction
        diff: RgbImage::from_raw(width, height, buf)
            .unwrap_or_else(|| RgbImage::new(width, height)),
    }
}

/// First `len` pixels of row `y`.
fn row_bytes(img: &RgbImage, y: usize, len: usize) -> &[u8] {
    let stride = img.width() as usize * 3;
    let start = y * stride;
    &img.as_raw()[start..start + len * 3]
}

fn paint_mismatch(row: &mut [u8]) {
    for px in row.chunks_exact_mut(3) {
        px.copy_from_slice(&MISMATCH);
    }
}

fn delta_e_sq(a: &Lab, b: &Lab) -> f32 {
    let (dl, da, db) = (a.l - b.l, a.a - b.a, a.b - b.b);
    dl * dl + da * da + db * db
}
