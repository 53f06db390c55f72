//! Frame differencing.
//!
//! `DiffEngine` turns two equally sized frames into a `DiffImage`. Inputs are
//! borrowed and never modified.

use anyhow::{bail, Result};
use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::frame::{DiffImage, Frame, DEFAULT_BIAS};

/// How intensity changes are encoded into the difference image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DiffMode {
    /// `current - previous + bias`, saturated to 0..=255.
    Signed {
        #[serde(default = "default_bias")]
        bias: u8,
    },
    /// `max(current - previous, 0)`: newly brightened pixels only.
    Clipped,
    /// `|current - previous|`.
    Absolute,
}

fn default_bias() -> u8 {
    DEFAULT_BIAS
}

impl Default for DiffMode {
    fn default() -> Self {
        DiffMode::Signed { bias: DEFAULT_BIAS }
    }
}

impl DiffMode {
    pub fn bias(&self) -> u8 {
        match self {
            DiffMode::Signed { bias } => *bias,
            DiffMode::Clipped | DiffMode::Absolute => 0,
        }
    }

    /// Parse the short names used on the command line and in env overrides.
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "signed" => Ok(DiffMode::default()),
            "clipped" => Ok(DiffMode::Clipped),
            "absolute" | "abs" => Ok(DiffMode::Absolute),
            other => bail!("unknown diff mode '{}' (signed|clipped|absolute)", other),
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DiffEngine {
    mode: DiffMode,
}

impl DiffEngine {
    pub fn new(mode: DiffMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> DiffMode {
        self.mode
    }

    /// Difference `current` against `previous`. Dimensions must match.
    pub fn diff(&self, current: &Frame, previous: &Frame) -> Result<DiffImage> {
        if current.dimensions() != previous.dimensions() {
            bail!(
                "frame dimension mismatch: current {}x{}, previous {}x{}",
                current.width(),
                current.height(),
                previous.width(),
                previous.height()
            );
        }

        let (width, height) = current.dimensions();
        let op: fn(u8, u8, u8) -> u8 = match self.mode {
            DiffMode::Signed { .. } => |cur, prev, bias| {
                (cur as i16 - prev as i16 + bias as i16).clamp(0, 255) as u8
            },
            DiffMode::Clipped => |cur, prev, _| cur.saturating_sub(prev),
            DiffMode::Absolute => |cur, prev, _| cur.abs_diff(prev),
        };
        let bias = self.mode.bias();

        let pixels = current
            .pixels()
            .iter()
            .zip(previous.pixels())
            .map(|(&cur, &prev)| op(cur, prev, bias))
            .collect::<Vec<u8>>();

        let Some(image) = GrayImage::from_raw(width, height, pixels) else {
            bail!("difference buffer does not match {}x{}", width, height);
        };
        Ok(DiffImage::new(image, bias))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn frame(pixels: Vec<u8>) -> Frame {
        Frame::from_luma(pixels.len() as u32, 1, pixels, Duration::ZERO).unwrap()
    }

    #[test]
    fn signed_mode_keeps_both_directions() -> Result<()> {
        let engine = DiffEngine::new(DiffMode::default());
        let diff = engine.diff(&frame(vec![100, 200, 0, 255]), &frame(vec![100, 100, 200, 0]))?;
        assert_eq!(diff.bias(), 127);
        assert_eq!(diff.image().as_raw(), &vec![127, 227, 0, 255]);
        Ok(())
    }

    #[test]
    fn clipped_mode_keeps_only_increases() -> Result<()> {
        let engine = DiffEngine::new(DiffMode::Clipped);
        let diff = engine.diff(&frame(vec![100, 200, 0]), &frame(vec![100, 100, 200]))?;
        assert_eq!(diff.image().as_raw(), &vec![0, 100, 0]);
        Ok(())
    }

    #[test]
    fn absolute_mode_is_symmetric() -> Result<()> {
        let engine = DiffEngine::new(DiffMode::Absolute);
        let a = frame(vec![10, 200]);
        let b = frame(vec![50, 20]);
        assert_eq!(engine.diff(&a, &b)?, engine.diff(&b, &a)?);
        Ok(())
    }

    #[test]
    fn self_difference_is_unchanged() -> Result<()> {
        let f = frame(vec![3, 99, 180, 255]);
        for mode in [DiffMode::default(), DiffMode::Clipped, DiffMode::Absolute] {
            assert!(DiffEngine::new(mode).diff(&f, &f)?.is_unchanged());
        }
        Ok(())
    }

    #[test]
    fn mismatched_dimensions_are_rejected() {
        let engine = DiffEngine::default();
        let err = engine
            .diff(&frame(vec![0; 4]), &frame(vec![0; 5]))
            .unwrap_err();
        assert!(err.to_string().contains("dimension mismatch"));
    }

    #[test]
    fn parse_names() -> Result<()> {
        assert_eq!(DiffMode::parse("Clipped")?, DiffMode::Clipped);
        assert_eq!(DiffMode::parse("abs")?, DiffMode::Absolute);
        assert_eq!(DiffMode::parse("signed")?.bias(), 127);
        assert!(DiffMode::parse("xor").is_err());
        Ok(())
    }
}
