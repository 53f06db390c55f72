//! Frame capture sources.
//!
//! This module provides the sources a session can pull frames from:
//! - Synthetic moving-square scene (demos, tests)
//! - Directory of still images replayed in lexical order
//! - USB/V4L2 devices (feature: ingest-v4l2)
//!
//! The concrete source is picked once, when the session is built, from
//! `SourceSettings::kind`. Every source:
//! - Produces 8-bit luma `Frame`s of a fixed size
//! - Stamps each frame from the session clock at capture time
//! - Owns its device handle and releases it on drop
//!
//! A finite source signals its end with [`SourceExhausted`]; any other
//! capture error is a failure of that iteration.

pub mod file;
#[cfg(feature = "ingest-v4l2")]
mod normalize;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use std::fmt;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::clock::SharedClock;
use crate::frame::Frame;

pub use file::ImageSequenceSource;
pub use synthetic::{SyntheticConfig, SyntheticSource};
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::{V4l2Config, V4l2Source};

/// Anything that yields grayscale frames.
pub trait FrameSource {
    /// Short description for logs.
    fn name(&self) -> &str;

    /// Block until the next frame is available.
    fn capture(&mut self) -> Result<Frame>;

    fn stats(&self) -> SourceStats;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub source: String,
}

/// Returned (inside `anyhow::Error`) by a finite source with no frames left.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceExhausted;

impl fmt::Display for SourceExhausted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("frame source exhausted")
    }
}

impl std::error::Error for SourceExhausted {}

/// True when `err` is the end of a finite source rather than a failure.
pub fn is_exhausted(err: &anyhow::Error) -> bool {
    err.downcast_ref::<SourceExhausted>().is_some()
}

// ---- Source selection ----

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    #[default]
    Synthetic,
    Images,
    V4l2,
}

impl SourceKind {
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "synthetic" => Ok(SourceKind::Synthetic),
            "images" | "stills" => Ok(SourceKind::Images),
            "v4l2" | "camera" => Ok(SourceKind::V4l2),
            other => bail!("unknown source '{}' (synthetic|images|v4l2)", other),
        }
    }
}

/// Where frames come from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceSettings {
    pub kind: SourceKind,
    /// Image directory (`images`) or device node (`v4l2`).
    pub location: Option<String>,
    /// Frame size for `synthetic`; requested size for `v4l2`.
    pub width: u32,
    pub height: u32,
    /// Rate requested from the device. 0 leaves the driver default.
    pub device_fps: u32,
    /// Keep only the rows between these fractions of the frame height.
    pub crop_top: f64,
    pub crop_bottom: f64,
    pub synthetic: SyntheticConfig,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            kind: SourceKind::default(),
            location: None,
            width: 320,
            height: 240,
            device_fps: 0,
            crop_top: 0.0,
            crop_bottom: 1.0,
            synthetic: SyntheticConfig::default(),
        }
    }
}

impl SourceSettings {
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            bail!("source width and height must be positive");
        }
        if !(0.0..1.0).contains(&self.crop_top)
            || !(self.crop_bottom > self.crop_top && self.crop_bottom <= 1.0)
        {
            bail!(
                "crop band must satisfy 0 <= crop_top < crop_bottom <= 1 (got {}..{})",
                self.crop_top,
                self.crop_bottom
            );
        }
        if self.kind != SourceKind::Synthetic && self.location.is_none() {
            bail!("{:?} source requires a location", self.kind);
        }
        self.synthetic.validate()
    }

    fn crops(&self) -> bool {
        self.crop_top > 0.0 || self.crop_bottom < 1.0
    }
}

/// Open the configured source. The returned box owns the device handle.
pub fn open_source(settings: &SourceSettings, clock: SharedClock) -> Result<Box<dyn FrameSource>> {
    settings.validate()?;
    let source: Box<dyn FrameSource> = match settings.kind {
        SourceKind::Synthetic => Box::new(SyntheticSource::new(
            settings.width,
            settings.height,
            settings.synthetic.clone(),
            clock,
        )?),
        SourceKind::Images => {
            let dir = settings.location.as_deref().unwrap_or_default();
            Box::new(ImageSequenceSource::open(dir, clock)?)
        }
        #[cfg(feature = "ingest-v4l2")]
        SourceKind::V4l2 => Box::new(V4l2Source::new(
            V4l2Config {
                device: settings.location.clone().unwrap_or_default(),
                target_fps: settings.device_fps,
                width: settings.width,
                height: settings.height,
            },
            clock,
        )?),
        #[cfg(not(feature = "ingest-v4l2"))]
        SourceKind::V4l2 => bail!("v4l2 capture requires the ingest-v4l2 feature"),
    };
    log::info!("opened frame source {}", source.name());

    if settings.crops() {
        Ok(Box::new(CroppedSource {
            inner: source,
            top: settings.crop_top,
            bottom: settings.crop_bottom,
        }))
    } else {
        Ok(source)
    }
}

/// Keeps a horizontal band of every frame from the wrapped source.
struct CroppedSource {
    inner: Box<dyn FrameSource>,
    top: f64,
    bottom: f64,
}

impl FrameSource for CroppedSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn capture(&mut self) -> Result<Frame> {
        let frame = self.inner.capture()?;
        let (width, height) = frame.dimensions();
        let (y0, rows) = crop_band(height, self.top, self.bottom);
        let band = image::imageops::crop_imm(frame.image(), 0, y0, width, rows).to_image();
        Ok(Frame::new(band, frame.captured_at()))
    }

    fn stats(&self) -> SourceStats {
        self.inner.stats()
    }
}

/// First row and row count of the band `[top, bottom)` of `height` rows.
/// Never empty.
fn crop_band(height: u32, top: f64, bottom: f64) -> (u32, u32) {
    let y0 = ((top * height as f64).round() as u32).min(height.saturating_sub(1));
    let y1 = ((bottom * height as f64).round() as u32).clamp(y0 + 1, height.max(1));
    (y0, y1 - y0)
}
