//! Still-image sequence source.
//!
//! Replays a local directory of PNG/JPEG/BMP images as a frame stream, in
//! lexical file-name order. Each image is decoded on capture and converted to
//! 8-bit luma. The source is finite: once every image has been returned,
//! `capture` fails with [`SourceExhausted`].

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use super::{FrameSource, SourceExhausted, SourceStats};
use crate::clock::{Clock, SharedClock};
use crate::frame::Frame;

const EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    next: usize,
    clock: SharedClock,
    name: String,
}

impl ImageSequenceSource {
    /// List the images in `dir`. Fails if there are none.
    pub fn open(dir: impl AsRef<Path>, clock: SharedClock) -> Result<Self> {
        let dir = dir.as_ref();
        let mut paths = Vec::new();
        for entry in
            std::fs::read_dir(dir).with_context(|| format!("read image directory {}", dir.display()))?
        {
            let path = entry?.path();
            if path.is_file() && has_image_extension(&path) {
                paths.push(path);
            }
        }
        paths.sort();
        if paths.is_empty() {
            return Err(anyhow!("no images found in {}", dir.display()));
        }
        Ok(Self::from_paths(paths, clock, format!("images://{}", dir.display())))
    }

    /// Replay exactly these files, in this order.
    pub fn from_paths(paths: Vec<PathBuf>, clock: SharedClock, name: String) -> Self {
        Self {
            paths,
            next: 0,
            clock,
            name,
        }
    }

    pub fn remaining(&self) -> usize {
        self.paths.len() - self.next
    }
}

impl FrameSource for ImageSequenceSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn capture(&mut self) -> Result<Frame> {
        let Some(path) = self.paths.get(self.next) else {
            return Err(SourceExhausted.into());
        };
        let image = load_luma(path)?;
        self.next += 1;
        Ok(Frame::new(image, self.clock.now()))
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.next as u64,
            source: self.name.clone(),
        }
    }
}

/// Decode an image file to 8-bit luma.
pub fn load_luma(path: &Path) -> Result<image::GrayImage> {
    Ok(image::open(path)
        .with_context(|| format!("decode image {}", path.display()))?
        .into_luma8())
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
