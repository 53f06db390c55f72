pub mod contour;
pub mod delaunay;

pub use contour::ContourExtractor;
pub use delaunay::DelaunayExtractor;
