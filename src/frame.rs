//! Captured frames and difference images.
//!
//! - `Frame`: immutable 8-bit grayscale capture plus its monotonic timestamp.
//! - `DiffImage`: per-pixel intensity change between two frames, encoded
//!   around a `bias` so that decreases stay representable in `u8`.
//!
//! Pixel storage is an `image::GrayImage`; frames are shared by reference and
//! never mutated after capture.

use anyhow::{anyhow, Result};
use image::GrayImage;
use std::time::Duration;

/// Bias used by signed difference images (mid-gray).
pub const DEFAULT_BIAS: u8 = 127;

/// Grayscale frame. Immutable once captured.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    image: GrayImage,
    captured_at: Duration,
}

impl Frame {
    pub fn new(image: GrayImage, captured_at: Duration) -> Self {
        Self { image, captured_at }
    }

    /// Build a frame from a row-major luma buffer.
    pub fn from_luma(width: u32, height: u32, pixels: Vec<u8>, captured_at: Duration) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "luma frame length mismatch: expected {}, got {}",
                expected,
                pixels.len()
            ));
        }
        let image = GrayImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow!("luma buffer rejected for {}x{}", width, height))?;
        Ok(Self::new(image, captured_at))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Capture time since the session origin.
    pub fn captured_at(&self) -> Duration {
        self.captured_at
    }

    pub fn image(&self) -> &GrayImage {
        &self.image
    }

    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }
}

/// Difference between two frames.
///
/// A pixel equal to `bias` means "no change". Values above the bias are
/// intensity increases, values below are decreases. Clipped and absolute
/// differences use a bias of 0.
#[derive(Clone, Debug, PartialEq)]
pub struct DiffImage {
    image: GrayImage,
    bias: u8,
}

impl DiffImage {
    pub fn new(image: GrayImage, bias: u8) -> Self {
        Self { image, bias }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn bias(&self) -> u8 {
        self.bias
    }

    pub fn image(&self) -> &GrayImage {
        &self.image
    }

    pub fn into_image(self) -> GrayImage {
        self.image
    }

    /// Unsigned change magnitude per pixel: `|value - bias|`.
    pub fn magnitude(&self) -> GrayImage {
        let bias = self.bias;
        let mut out = self.image.clone();
        for p in out.iter_mut() {
            *p = p.abs_diff(bias);
        }
        out
    }

    /// True when every pixel sits at the bias.
    pub fn is_unchanged(&self) -> bool {
        self.image.iter().all(|&p| p == self.bias)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_luma_validates_length() {
        let err = Frame::from_luma(4, 4, vec![0u8; 15], Duration::ZERO).unwrap_err();
        assert!(err.to_string().contains("length mismatch"));

        let frame = Frame::from_luma(4, 4, vec![9u8; 16], Duration::from_millis(5)).unwrap();
        assert_eq!(frame.dimensions(), (4, 4));
        assert_eq!(frame.captured_at(), Duration::from_millis(5));
    }

    #[test]
    fn magnitude_folds_around_bias() {
        let image = GrayImage::from_raw(3, 1, vec![127, 200, 27]).unwrap();
        let diff = DiffImage::new(image, DEFAULT_BIAS);
        assert_eq!(diff.magnitude().as_raw(), &vec![0, 73, 100]);
        assert!(!diff.is_unchanged());
    }
}
