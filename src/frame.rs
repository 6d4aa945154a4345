//! Image samples and the region of interest.
//!
//! - `ImageSample`: a decoded RGB raster plus its acquisition time. Immutable.
//! - `Region`: the configured area of the frame that is compared between samples.
//!
//! The detection loop keeps at most one sample alive between cycles (the newest
//! half of the rotating pair). Nothing here is written to disk.

use anyhow::{anyhow, Result};
use image::RgbImage;
use std::time::SystemTime;

/// One still image from the camera.
pub struct ImageSample {
    image: RgbImage,
    captured_at: SystemTime,
}

impl ImageSample {
    pub fn new(image: RgbImage, captured_at: SystemTime) -> Self {
        Self { image, captured_at }
    }

    /// Sample stamped with the current wall-clock time.
    pub fn now(image: RgbImage) -> Self {
        Self::new(image, SystemTime::now())
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn captured_at(&self) -> SystemTime {
        self.captured_at
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Restrict the sample to `region`, keeping its acquisition time.
    pub fn cropped(self, region: &Region) -> Self {
        if region.is_full_frame(self.image.width(), self.image.height()) {
            return self;
        }
        Self {
            image: crop(&self.image, region),
            captured_at: self.captured_at,
        }
    }
}

/// Rectangular area of interest, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    /// Build a region from corner coordinates (`end` exclusive).
    pub fn from_corners(start_x: u32, start_y: u32, end_x: u32, end_y: u32) -> Result<Self> {
        if end_x < start_x {
            return Err(anyhow!("end_x cannot be smaller than start_x"));
        }
        if end_y < start_y {
            return Err(anyhow!("end_y cannot be smaller than start_y"));
        }
        if end_x == start_x || end_y == start_y {
            return Err(anyhow!(
                "region ({},{})-({},{}) is empty",
                start_x,
                start_y,
                end_x,
                end_y
            ));
        }
        Ok(Self {
            x: start_x,
            y: start_y,
            width: end_x - start_x,
            height: end_y - start_y,
        })
    }

    pub fn is_full_frame(&self, width: u32, height: u32) -> bool {
        self.x == 0 && self.y == 0 && self.width >= width && self.height >= height
    }
}

/// Region extraction. Identity when `region` covers the whole image; clipped to
/// the image bounds otherwise.
pub fn crop(image: &RgbImage, region: &Region) -> RgbImage {
    if region.is_full_frame(image.width(), image.height()) {
        return image.clone();
    }
    image::imageops::crop_imm(image, region.x, region.y, region.width, region.height).to_image()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn full_region_crop_is_identity() {
        let mut image = RgbImage::new(4, 3);
        image.put_pixel(3, 2, Rgb([9, 8, 7]));
        let cropped = crop(&image, &Region::full(4, 3));
        assert_eq!(cropped, image);
    }

    #[test]
    fn crop_extracts_requested_area() -> Result<()> {
        let mut image = RgbImage::new(8, 8);
        image.put_pixel(2, 3, Rgb([200, 0, 0]));
        let region = Region::from_corners(2, 3, 6, 5)?;
        let cropped = crop(&image, &region);
        assert_eq!(cropped.dimensions(), (4, 2));
        assert_eq!(cropped.get_pixel(0, 0), &Rgb([200, 0, 0]));
        Ok(())
    }

    #[test]
    fn inverted_or_empty_corners_are_rejected() {
        assert!(Region::from_corners(10, 0, 5, 10).is_err());
        assert!(Region::from_corners(0, 10, 10, 5).is_err());
        assert!(Region::from_corners(5, 5, 5, 10).is_err());
    }

    #[test]
    fn cropped_sample_keeps_timestamp() -> Result<()> {
        let at = SystemTime::UNIX_EPOCH;
        let sample = ImageSample::new(RgbImage::new(10, 10), at);
        let cropped = sample.cropped(&Region::from_corners(1, 1, 4, 5)?);
        assert_eq!((cropped.width(), cropped.height()), (3, 4));
        assert_eq!(cropped.captured_at(), at);
        Ok(())
    }
}
