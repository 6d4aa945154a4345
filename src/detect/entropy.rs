//! Shannon entropy of a raster's value distribution.

use image::{ImageBuffer, Pixel};

/// Entropy in bits of all channel values of `image`, pooled into one 256-bin
/// histogram. Depends only on the value distribution, never on pixel order.
/// A raster holding a single distinct value scores exactly 0.
pub fn image_entropy<P>(image: &ImageBuffer<P, Vec<u8>>) -> f64
where
    P: Pixel<Subpixel = u8>,
{
    let mut histogram = [0u64; 256];
    for &value in image.as_raw().iter() {
        histogram[value as usize] += 1;
    }
    histogram_entropy(&histogram)
}

/// Entropy in bits of a frequency histogram. Empty bins contribute nothing.
pub fn histogram_entropy(histogram: &[u64]) -> f64 {
    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    let mut h = 0.0;
    for &count in histogram {
        if count > 0 {
            let p = count as f64 / total;
            h -= p * p.log2();
        }
    }
    h.max(0.0)
}
