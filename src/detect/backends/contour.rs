use anyhow::Result;
use image::GrayImage;

use crate::detect::extractor::SpotExtractor;
use crate::detect::raster;
use crate::frame::DiffImage;
use crate::settings::Settings;

/// Threshold/contour extractor.
///
/// Pipeline: change magnitude `|value - bias|` -> Gaussian blur -> binary
/// threshold -> 3x3 dilation -> 8-connected regions. Dilation merges the
/// fragments one moving object leaves in the difference image.
#[derive(Clone, Copy, Debug)]
pub struct ContourExtractor {
    blur_radius: u32,
    threshold: u8,
    dilation_iterations: u32,
}

impl ContourExtractor {
    pub fn new(blur_radius: u32, threshold: u8, dilation_iterations: u32) -> Self {
        Self {
            blur_radius,
            threshold,
            dilation_iterations,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.blur_radius(),
            settings.intensity_threshold(),
            settings.dilation_iterations(),
        )
    }
}

impl SpotExtractor for ContourExtractor {
    fn name(&self) -> &'static str {
        "contour"
    }

    fn motion_mask(&self, diff: &DiffImage) -> Result<GrayImage> {
        let magnitude = diff.magnitude();
        let blurred = raster::gaussian_blur(&magnitude, self.blur_radius);
        let mask = raster::threshold(&blurred, self.threshold);
        let dilated = raster::dilate(&mask, self.dilation_iterations);
        log::trace!(
            "contour mask: {} on pixels after {} dilations",
            dilated.iter().filter(|&&p| p != 0).count(),
            self.dilation_iterations
        );
        Ok(dilated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Spot;
    use crate::frame::DEFAULT_BIAS;

    fn diff_with_square(size: u32, x0: u32, y0: u32, side: u32, value: u8, bias: u8) -> DiffImage {
        let mut image = GrayImage::from_pixel(size, size, image::Luma([bias]));
        for y in y0..y0 + side {
            for x in x0..x0 + side {
                image.put_pixel(x, y, image::Luma([value]));
            }
        }
        DiffImage::new(image, bias)
    }

    fn assert_near(spot: Spot, x: f64, y: f64) {
        assert!(
            (spot.x - x).abs() <= 1.0 && (spot.y - y).abs() <= 1.0,
            "spot {:?} not within 1px of ({}, {})",
            spot,
            x,
            y
        );
    }

    #[test]
    fn single_square_yields_one_spot_at_its_centroid() -> Result<()> {
        let extractor = ContourExtractor::from_settings(&Settings::default());
        let diff = diff_with_square(100, 30, 40, 10, 200, 0);

        let spots = extractor.extract(&diff)?;
        assert_eq!(spots.len(), 1);
        assert_near(spots[0], 34.5, 44.5);
        Ok(())
    }

    #[test]
    fn signed_decrease_counts_as_motion() -> Result<()> {
        let extractor = ContourExtractor::new(5, 20, 2);
        let diff = diff_with_square(60, 10, 10, 8, DEFAULT_BIAS - 90, DEFAULT_BIAS);

        let spots = extractor.extract(&diff)?;
        assert_eq!(spots.len(), 1);
        assert_near(spots[0], 13.5, 13.5);
        Ok(())
    }

    #[test]
    fn unchanged_image_yields_no_spots() -> Result<()> {
        let extractor = ContourExtractor::from_settings(&Settings::default());
        let diff = DiffImage::new(GrayImage::from_pixel(50, 50, image::Luma([DEFAULT_BIAS])), DEFAULT_BIAS);
        assert!(extractor.extract(&diff)?.is_empty());
        Ok(())
    }

    #[test]
    fn distant_squares_stay_separate_without_dilation() -> Result<()> {
        let extractor = ContourExtractor::new(1, 20, 0);
        let mut diff = diff_with_square(80, 5, 5, 6, 150, 0).into_image();
        for y in 60..66 {
            for x in 60..66 {
                diff.put_pixel(x, y, image::Luma([150]));
            }
        }
        let spots = extractor.extract(&DiffImage::new(diff, 0))?;
        assert_eq!(spots, vec![Spot::new(7.5, 7.5), Spot::new(62.5, 62.5)]);
        Ok(())
    }

    #[test]
    fn sub_threshold_noise_is_ignored() -> Result<()> {
        let extractor = ContourExtractor::new(3, 20, 3);
        let diff = diff_with_square(40, 10, 10, 4, 15, 0);
        assert!(extractor.extract(&diff)?.is_empty());
        Ok(())
    }
}
