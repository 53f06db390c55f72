//! cvrace
//!
//! Extracts the positions of moving objects from a camera frame stream and
//! records them as a timestamped series, paced to a fixed frame rate. Built
//! for instrumented motion timing (a subject crossing a calibrated track),
//! not general video analytics: it only reports *where pixel intensity
//! changed* between consecutive frames.
//!
//! # Per-frame flow
//!
//! 1. `FrameScheduler` waits for the next drift-corrected deadline.
//! 2. A `FrameSource` captures a grayscale `Frame`.
//! 3. `DiffEngine` diffs it against the previous frame.
//! 4. A `SpotExtractor` (contour or Delaunay) finds object centres.
//! 5. `ClusterMerger` collapses nearby spots.
//! 6. `PositionRecorder` appends the sample; history exports as CSV.
//!
//! # Module Structure
//!
//! - `frame`, `diff`: frames and difference images
//! - `detect`: spot extractors and raster helpers
//! - `merge`, `pipeline`: per-frame processing
//! - `schedule`, `clock`: pacing and time sources
//! - `record`: position history and the CSV wire format
//! - `ingest`: frame sources (synthetic, still images, V4L2)
//! - `session`, `config`, `settings`: session assembly and configuration
//! - `ui`: CLI stage reporting

pub mod clock;
pub mod config;
pub mod detect;
pub mod diff;
pub mod frame;
pub mod ingest;
pub mod merge;
pub mod pipeline;
pub mod record;
pub mod schedule;
pub mod session;
pub mod settings;
pub mod ui;

pub use clock::{Clock, ManualClock, MonotonicClock, SharedClock};
pub use config::{SessionConfig, SessionOverrides};
pub use detect::{ContourExtractor, DelaunayExtractor, ExtractorKind, Spot, SpotExtractor};
pub use diff::{DiffEngine, DiffMode};
pub use frame::{DiffImage, Frame, DEFAULT_BIAS};
pub use ingest::{
    open_source, FrameSource, ImageSequenceSource, SourceExhausted, SourceKind, SourceSettings,
    SourceStats, SyntheticConfig, SyntheticSource,
};
#[cfg(feature = "ingest-v4l2")]
pub use ingest::{V4l2Config, V4l2Source};
pub use merge::ClusterMerger;
pub use pipeline::{Inspection, MotionPipeline};
pub use record::{
    group_rows, load_position_rows, read_position_rows, CsvRow, PositionHistory,
    PositionRecorder, PositionSample, RowGroup, TimeFormat,
};
pub use schedule::{FrameScheduler, SchedulerStats, Tick};
pub use session::{CaptureWorker, Session, SessionEnd, SessionSummary, Step, WorkerReport};
pub use settings::{Settings, SettingsDraft};
