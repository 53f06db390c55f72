//! Spot extraction: difference image in, object centres out.
//!
//! Two interchangeable extractors sit behind [`SpotExtractor`]:
//! - [`ContourExtractor`]: blur, threshold, dilate, connected regions.
//! - [`DelaunayExtractor`]: dual threshold, triangulation, long-edge cut.

pub mod backends;
mod extractor;
pub mod raster;
mod spot;

pub use backends::{ContourExtractor, DelaunayExtractor};
pub use extractor::{ExtractorKind, SpotExtractor};
pub use spot::Spot;
