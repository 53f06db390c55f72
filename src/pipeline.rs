//! Per-frame motion extraction: diff, extract, merge.

use anyhow::Result;

use crate::detect::{ExtractorKind, Spot, SpotExtractor};
use crate::diff::{DiffEngine, DiffMode};
use crate::frame::{DiffImage, Frame};
use crate::merge::ClusterMerger;
use crate::record::PositionSample;
use crate::settings::Settings;

/// Intermediate products of one pipeline pass, for inspection and dumps.
#[derive(Debug)]
pub struct Inspection {
    pub diff: DiffImage,
    pub mask: image::GrayImage,
    pub raw_spots: Vec<Spot>,
    pub spots: Vec<Spot>,
}

pub struct MotionPipeline {
    engine: DiffEngine,
    extractor: Box<dyn SpotExtractor>,
    merger: ClusterMerger,
}

impl MotionPipeline {
    pub fn new(settings: &Settings, mode: DiffMode, extractor: ExtractorKind) -> Self {
        Self::with_extractor(settings, mode, extractor.build(settings))
    }

    pub fn with_extractor(settings: &Settings, mode: DiffMode, extractor: Box<dyn SpotExtractor>) -> Self {
        Self {
            engine: DiffEngine::new(mode),
            extractor,
            merger: ClusterMerger::new(settings.merge_radius()),
        }
    }

    pub fn extractor_name(&self) -> &'static str {
        self.extractor.name()
    }

    pub fn diff_mode(&self) -> DiffMode {
        self.engine.mode()
    }

    /// Spots that moved between `previous` and `current`.
    ///
    /// The sample is stamped halfway between the two capture times.
    pub fn process(&self, previous: &Frame, current: &Frame) -> Result<PositionSample> {
        let diff = self.engine.diff(current, previous)?;
        let spots = self.merger.merge(self.extractor.extract(&diff)?);
        Ok(PositionSample::new(sample_time(previous, current), spots))
    }

    /// Same as [`process`](Self::process), keeping every intermediate image.
    pub fn inspect(&self, previous: &Frame, current: &Frame) -> Result<Inspection> {
        let diff = self.engine.diff(current, previous)?;
        let mask = self.extractor.motion_mask(&diff)?;
        let raw_spots = crate::detect::raster::region_centroids(&mask);
        let spots = self.merger.merge(raw_spots.clone());
        Ok(Inspection {
            diff,
            mask,
            raw_spots,
            spots,
        })
    }
}

fn sample_time(previous: &Frame, current: &Frame) -> std::time::Duration {
    let (a, b) = (previous.captured_at(), current.captured_at());
    if b >= a {
        a + (b - a) / 2
    } else {
        b + (a - b) / 2
    }
}
