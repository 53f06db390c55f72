//! Synthetic frame source.
//!
//! Renders a uniform gray scene with one bright square sliding left to right
//! across the middle rows, wrapping at the right edge. Optional uniform noise
//! comes from a seeded generator, so runs are reproducible.

use anyhow::{bail, Result};
use image::{GrayImage, Luma};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{FrameSource, SourceStats};
use crate::clock::{Clock, SharedClock};
use crate::frame::Frame;

pub const BACKGROUND: u8 = 100;
pub const FOREGROUND: u8 = 200;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyntheticConfig {
    /// Side of the moving square in pixels.
    pub square_size: u32,
    /// Horizontal displacement per frame in pixels.
    pub speed: u32,
    /// Max absolute per-pixel noise. 0 disables noise.
    pub noise: u8,
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            square_size: 24,
            speed: 4,
            noise: 0,
            seed: 7,
        }
    }
}

impl SyntheticConfig {
    pub fn validate(&self) -> Result<()> {
        if self.square_size == 0 {
            bail!("synthetic square_size must be positive");
        }
        Ok(())
    }
}

pub struct SyntheticSource {
    width: u32,
    height: u32,
    config: SyntheticConfig,
    clock: SharedClock,
    rng: StdRng,
    frame_count: u64,
    name: String,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32, config: SyntheticConfig, clock: SharedClock) -> Result<Self> {
        config.validate()?;
        if config.square_size > width || config.square_size > height {
            bail!(
                "synthetic square ({} px) does not fit a {}x{} frame",
                config.square_size,
                width,
                height
            );
        }
        Ok(Self {
            width,
            height,
            rng: StdRng::seed_from_u64(config.seed),
            name: format!("synthetic://{}x{}", width, height),
            config,
            clock,
            frame_count: 0,
        })
    }

    /// Left edge of the square in frame `index`.
    pub fn square_left(&self, index: u64) -> u32 {
        let span = (self.width - self.config.square_size + 1) as u64;
        ((index * self.config.speed as u64) % span) as u32
    }

    /// Top edge of the square; constant for the whole run.
    pub fn square_top(&self) -> u32 {
        (self.height - self.config.square_size) / 2
    }

    fn render(&mut self, index: u64) -> GrayImage {
        let mut image = GrayImage::from_pixel(self.width, self.height, Luma([BACKGROUND]));
        let left = self.square_left(index);
        let top = self.square_top();
        let side = self.config.square_size;
        for y in top..top + side {
            for x in left..left + side {
                image.put_pixel(x, y, Luma([FOREGROUND]));
            }
        }

        if self.config.noise > 0 {
            let amplitude = self.config.noise as i16;
            for pixel in image.pixels_mut() {
                let offset = self.rng.gen_range(-amplitude..=amplitude);
                pixel[0] = (pixel[0] as i16 + offset).clamp(0, 255) as u8;
            }
        }
        image
    }
}

impl FrameSource for SyntheticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn capture(&mut self) -> Result<Frame> {
        let image = self.render(self.frame_count);
        self.frame_count += 1;
        Ok(Frame::new(image, self.clock.now()))
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.name.clone(),
        }
    }
}
