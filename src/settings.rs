//! Detector tuning.
//!
//! `SettingsDraft` is the editable, serde-friendly form (config files, CLI).
//! `Settings` is the validated, immutable record a session runs with. A new
//! session is required to change any value.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BLUR_RADIUS: u32 = 15;
const DEFAULT_INTENSITY_THRESHOLD: u8 = 20;
const DEFAULT_DILATION_ITERATIONS: u32 = 15;
const DEFAULT_MAX_CLUSTER_EDGE_LENGTH: f64 = 50.0;
const DEFAULT_MERGE_RADIUS: f64 = 20.0;
const DEFAULT_TARGET_FPS: f64 = 4.0;

/// Unvalidated tuning values. Missing fields take the defaults.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SettingsDraft {
    /// Side of the square Gaussian blur kernel in pixels (odd, 1 disables).
    pub blur_radius: u32,
    /// Minimum change magnitude for a pixel to count as motion.
    pub intensity_threshold: u8,
    /// 3x3 dilation passes applied to the thresholded mask.
    pub dilation_iterations: u32,
    /// Delaunay triangles with a longer edge are cut (pixels).
    pub max_cluster_edge_length: f64,
    /// Spots closer than this are merged (pixels).
    pub merge_radius: f64,
    /// Capture loop rate.
    pub target_fps: f64,
}

impl Default for SettingsDraft {
    fn default() -> Self {
        Self {
            blur_radius: DEFAULT_BLUR_RADIUS,
            intensity_threshold: DEFAULT_INTENSITY_THRESHOLD,
            dilation_iterations: DEFAULT_DILATION_ITERATIONS,
            max_cluster_edge_length: DEFAULT_MAX_CLUSTER_EDGE_LENGTH,
            merge_radius: DEFAULT_MERGE_RADIUS,
            target_fps: DEFAULT_TARGET_FPS,
        }
    }
}

impl SettingsDraft {
    pub fn validate(self) -> Result<Settings> {
        if self.blur_radius == 0 || self.blur_radius % 2 == 0 {
            return Err(anyhow!(
                "blur_radius must be an odd positive integer (got {})",
                self.blur_radius
            ));
        }
        if self.intensity_threshold == 0 {
            return Err(anyhow!("intensity_threshold must be in 1..=255"));
        }
        positive("max_cluster_edge_length", self.max_cluster_edge_length)?;
        positive("merge_radius", self.merge_radius)?;
        positive("target_fps", self.target_fps)?;
        let frame_interval = Duration::try_from_secs_f64(1.0 / self.target_fps)
            .ok()
            .filter(|interval| !interval.is_zero())
            .ok_or_else(|| {
                anyhow!(
                    "target_fps {} gives no usable frame interval",
                    self.target_fps
                )
            })?;
        Ok(Settings {
            draft: self,
            frame_interval,
        })
    }
}

fn positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(anyhow!("{} must be a finite value > 0 (got {})", name, value))
    }
}

/// Validated session settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Settings {
    draft: SettingsDraft,
    frame_interval: Duration,
}

impl Settings {
    pub fn blur_radius(&self) -> u32 {
        self.draft.blur_radius
    }

    pub fn intensity_threshold(&self) -> u8 {
        self.draft.intensity_threshold
    }

    pub fn dilation_iterations(&self) -> u32 {
        self.draft.dilation_iterations
    }

    pub fn max_cluster_edge_length(&self) -> f64 {
        self.draft.max_cluster_edge_length
    }

    pub fn merge_radius(&self) -> f64 {
        self.draft.merge_radius
    }

    pub fn target_fps(&self) -> f64 {
        self.draft.target_fps
    }

    /// Scheduler period, `1 / target_fps`. Checked at validation.
    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    /// Copy of the values, for deriving a new session's settings.
    pub fn to_draft(&self) -> SettingsDraft {
        self.draft
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            draft: SettingsDraft::default(),
            frame_interval: Duration::from_secs_f64(1.0 / DEFAULT_TARGET_FPS),
        }
    }
}
