//! Pixel-level stages shared by the extractors, on top of `imageproc`.
//!
//! Masks are `GrayImage`s holding 0 (off) or 255 (on). The blur replicates
//! edge pixels; dilation ignores out-of-image neighbours.

use image::{GrayImage, Luma};
use imageproc::contrast::ThresholdType;
use imageproc::distance_transform::Norm;
use imageproc::point::Point;
use imageproc::region_labelling::{connected_components, Connectivity};

use super::spot::Spot;

pub const ON: u8 = 255;

/// Gaussian blur with a square `ksize` x `ksize` kernel.
///
/// Sigma is derived from the kernel size (`0.3 * ((ksize - 1) / 2 - 1) + 0.8`),
/// so a single odd integer fully describes the filter. `ksize <= 1` is a no-op.
pub fn gaussian_blur(image: &GrayImage, ksize: u32) -> GrayImage {
    if ksize <= 1 || image.width() == 0 || image.height() == 0 {
        return image.clone();
    }
    imageproc::filter::separable_filter_equal(image, &gaussian_kernel(ksize))
}

fn gaussian_kernel(ksize: u32) -> Vec<f32> {
    let sigma = 0.3 * ((ksize as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let radius = (ksize / 2) as i32;
    let denom = 2.0 * sigma * sigma;
    let raw: Vec<f32> = (-radius..=radius)
        .map(|i| (-((i * i) as f32) / denom).exp())
        .collect();
    let sum: f32 = raw.iter().sum();
    raw.into_iter().map(|w| w / sum).collect()
}

/// Binary threshold: pixels strictly above `threshold` turn on.
pub fn threshold(image: &GrayImage, threshold: u8) -> GrayImage {
    imageproc::contrast::threshold(image, threshold, ThresholdType::Binary)
}

/// Dilation equivalent to `iterations` passes of a 3x3 square element.
pub fn dilate(mask: &GrayImage, iterations: u32) -> GrayImage {
    let k = u8::try_from(iterations).unwrap_or(u8::MAX);
    imageproc::morphology::dilate(mask, Norm::LInf, k)
}

/// First-order area moments of one connected region.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Region {
    pub area: u64,
    pub sum_x: u64,
    pub sum_y: u64,
}

impl Region {
    /// `(Σx / N, Σy / N)`, or `None` for an empty region.
    pub fn centroid(&self) -> Option<Spot> {
        if self.area == 0 {
            return None;
        }
        let n = self.area as f64;
        Some(Spot::new(self.sum_x as f64 / n, self.sum_y as f64 / n))
    }
}

/// Maximal 8-connected regions of on pixels, in raster order of their first pixel.
pub fn connected_regions(mask: &GrayImage) -> Vec<Region> {
    if mask.width() == 0 || mask.height() == 0 {
        return Vec::new();
    }
    // Labels run 1..=N in raster order of each component's first pixel.
    let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));
    let mut regions: Vec<Region> = Vec::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label[0] as usize;
        if label == 0 {
            continue;
        }
        if regions.len() < label {
            regions.resize(label, Region::default());
        }
        let region = &mut regions[label - 1];
        region.area += 1;
        region.sum_x += x as u64;
        region.sum_y += y as u64;
    }
    regions
}

/// Centroid of every non-empty region in `mask`.
pub fn region_centroids(mask: &GrayImage) -> Vec<Spot> {
    connected_regions(mask)
        .iter()
        .filter_map(Region::centroid)
        .collect()
}

/// Draw a filled triangle with integer corners onto `mask`, edges included.
/// Corners outside the image are clipped.
pub fn fill_triangle(mask: &mut GrayImage, corners: [(i64, i64); 3]) {
    let [a, b, c] = corners.map(|(x, y)| Point::new(clamp_i32(x), clamp_i32(y)));
    // A polygon may not repeat its first point as the last one.
    if a == c {
        return;
    }
    imageproc::drawing::draw_polygon_mut(mask, &[a, b, c], Luma([ON]));
}

fn clamp_i32(value: i64) -> i32 {
    value.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}
