use anyhow::{bail, Result};
use image::GrayImage;
use serde::{Deserialize, Serialize};

use super::backends::{ContourExtractor, DelaunayExtractor};
use super::raster;
use super::spot::Spot;
use crate::frame::DiffImage;
use crate::settings::Settings;

/// Spot extraction algorithm.
///
/// Implementations turn a difference image into a binary motion mask and
/// report one spot per connected region of that mask. They hold only their
/// tuning values; no state carries over between frames.
pub trait SpotExtractor: Send {
    /// Extractor identifier.
    fn name(&self) -> &'static str;

    /// Binary mask (0 / 255) whose connected regions are the detected objects.
    fn motion_mask(&self, diff: &DiffImage) -> Result<GrayImage>;

    /// Area-moment centroid of every region in the motion mask.
    ///
    /// No motion is a valid outcome and yields an empty list.
    fn extract(&self, diff: &DiffImage) -> Result<Vec<Spot>> {
        let mask = self.motion_mask(diff)?;
        Ok(raster::region_centroids(&mask))
    }
}

/// Which extractor a session uses. Chosen once, at session construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractorKind {
    /// Blur, threshold, dilate, connected regions.
    #[default]
    Contour,
    /// Dual threshold, Delaunay triangulation, long-edge cut, filled triangles.
    Delaunay,
}

impl ExtractorKind {
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "contour" | "threshold" => Ok(ExtractorKind::Contour),
            "delaunay" => Ok(ExtractorKind::Delaunay),
            other => bail!("unknown extractor '{}' (contour|delaunay)", other),
        }
    }

    pub fn build(self, settings: &Settings) -> Box<dyn SpotExtractor> {
        match self {
            ExtractorKind::Contour => Box::new(ContourExtractor::from_settings(settings)),
            ExtractorKind::Delaunay => Box::new(DelaunayExtractor::from_settings(settings)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_selects_by_kind() -> Result<()> {
        let settings = Settings::default();
        assert_eq!(ExtractorKind::parse("contour")?.build(&settings).name(), "contour");
        assert_eq!(ExtractorKind::parse("Delaunay")?.build(&settings).name(), "delaunay");
        assert!(ExtractorKind::parse("hough").is_err());
        Ok(())
    }
}
