//! Per-pixel absolute difference of two same-sized rasters.

use image::{ImageBuffer, Pixel};
use thiserror::Error;

/// The two inputs of a difference did not have the same dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("dimension mismatch: {}x{} vs {}x{}", .left.0, .left.1, .right.0, .right.1)]
pub struct DimensionMismatch {
    pub left: (u32, u32),
    pub right: (u32, u32),
}

/// Channel-wise `|a - b|`, same dimensions as the inputs.
pub fn difference<P>(
    a: &ImageBuffer<P, Vec<u8>>,
    b: &ImageBuffer<P, Vec<u8>>,
) -> Result<ImageBuffer<P, Vec<u8>>, DimensionMismatch>
where
    P: Pixel<Subpixel = u8>,
{
    let mismatch = DimensionMismatch {
        left: a.dimensions(),
        right: b.dimensions(),
    };
    if a.dimensions() != b.dimensions() {
        return Err(mismatch);
    }
    let (width, height) = a.dimensions();
    let delta: Vec<u8> = a
        .as_raw()
        .iter()
        .zip(b.as_raw().iter())
        .map(|(x, y)| x.abs_diff(*y))
        .collect();
    ImageBuffer::from_raw(width, height, delta).ok_or(mismatch)
}
