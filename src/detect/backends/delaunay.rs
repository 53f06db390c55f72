use anyhow::Result;
use delaunator::{triangulate, Point};
use image::GrayImage;

use crate::detect::extractor::SpotExtractor;
use crate::detect::raster;
use crate::frame::DiffImage;
use crate::settings::Settings;

/// Delaunay-clustering extractor for sparse change points.
///
/// 1. Pixels brighter than `bias + threshold` or darker than
///    `bias - threshold` become points.
/// 2. The points are triangulated (Delaunay).
/// 3. Triangles whose longest edge is not shorter than `max_edge_length` are
///    cut: dense clusters only produce short edges, long edges bridge
///    unrelated clusters.
/// 4. Surviving triangles are filled onto a blank mask; each connected
///    region of that mask is one object.
#[derive(Clone, Copy, Debug)]
pub struct DelaunayExtractor {
    threshold: u8,
    max_edge_length: f64,
}

impl DelaunayExtractor {
    pub fn new(threshold: u8, max_edge_length: f64) -> Self {
        Self {
            threshold,
            max_edge_length,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.intensity_threshold(),
            settings.max_cluster_edge_length(),
        )
    }

    /// Coordinates of pixels outside the `bias ± threshold` band.
    fn change_points(&self, diff: &DiffImage) -> Vec<Point> {
        let bias = diff.bias() as i16;
        let upper = bias + self.threshold as i16;
        let lower = bias - self.threshold as i16;
        diff.image()
            .enumerate_pixels()
            .filter(|(_, _, p)| {
                let v = p[0] as i16;
                v > upper || v < lower
            })
            .map(|(x, y, _)| Point {
                x: x as f64,
                y: y as f64,
            })
            .collect()
    }
}

impl SpotExtractor for DelaunayExtractor {
    fn name(&self) -> &'static str {
        "delaunay"
    }

    fn motion_mask(&self, diff: &DiffImage) -> Result<GrayImage> {
        let mut mask = GrayImage::new(diff.width(), diff.height());
        let points = self.change_points(diff);
        if points.len() < 3 {
            return Ok(mask);
        }

        let triangulation = triangulate(&points);
        let mut kept = 0usize;
        let mut cut = 0usize;
        for triangle in triangulation.triangles.chunks_exact(3) {
            let corners = [
                corner(&points[triangle[0]]),
                corner(&points[triangle[1]]),
                corner(&points[triangle[2]]),
            ];
            if longest_edge(&corners) < self.max_edge_length {
                raster::fill_triangle(&mut mask, corners);
                kept += 1;
            } else {
                cut += 1;
            }
        }

        log::trace!(
            "delaunay: {} points, {} triangles kept, {} cut",
            points.len(),
            kept,
            cut
        );
        Ok(mask)
    }
}

fn corner(point: &Point) -> (i64, i64) {
    (point.x as i64, point.y as i64)
}

fn longest_edge(corners: &[(i64, i64); 3]) -> f64 {
    let length = |a: (i64, i64), b: (i64, i64)| ((a.0 - b.0) as f64).hypot((a.1 - b.1) as f64);
    length(corners[0], corners[1])
        .max(length(corners[1], corners[2]))
        .max(length(corners[2], corners[0]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Spot;
    use crate::frame::DEFAULT_BIAS;

    fn signed_diff(size: u32, marks: &[(u32, u32, u8)]) -> DiffImage {
        let mut image = GrayImage::from_pixel(size, size, image::Luma([DEFAULT_BIAS]));
        for &(x, y, v) in marks {
            image.put_pixel(x, y, image::Luma([v]));
        }
        DiffImage::new(image, DEFAULT_BIAS)
    }

    fn square(x0: u32, y0: u32, side: u32, value: u8) -> Vec<(u32, u32, u8)> {
        let mut marks = Vec::new();
        for y in y0..y0 + side {
            for x in x0..x0 + side {
                marks.push((x, y, value));
            }
        }
        marks
    }

    fn on_pixels(mask: &GrayImage) -> Vec<(u32, u32)> {
        mask.enumerate_pixels()
            .filter(|(_, _, p)| p[0] != 0)
            .map(|(x, y, _)| (x, y))
            .collect()
    }

    #[test]
    fn single_square_yields_one_spot_at_its_centroid() -> Result<()> {
        let extractor = DelaunayExtractor::new(30, 50.0);
        let diff = signed_diff(100, &square(20, 60, 10, 250));

        let spots = extractor.extract(&diff)?;
        assert_eq!(spots.len(), 1);
        assert!((spots[0].x - 24.5).abs() <= 1.0);
        assert!((spots[0].y - 64.5).abs() <= 1.0);
        Ok(())
    }

    #[test]
    fn increases_and_decreases_both_contribute() -> Result<()> {
        let extractor = DelaunayExtractor::new(30, 50.0);
        let mut marks = square(10, 10, 4, 250);
        marks.extend(square(14, 10, 4, 5));
        let spots = extractor.extract(&signed_diff(40, &marks))?;
        assert_eq!(spots.len(), 1);
        assert!((spots[0].x - 13.5).abs() <= 1.0);
        assert!((spots[0].y - 11.5).abs() <= 1.0);
        Ok(())
    }

    #[test]
    fn long_edges_split_distant_clusters() -> Result<()> {
        let mut marks = square(5, 5, 5, 250);
        marks.extend(square(80, 80, 5, 250));
        let diff = signed_diff(100, &marks);

        let spots = DelaunayExtractor::new(30, 20.0).extract(&diff)?;
        assert_eq!(spots, vec![Spot::new(7.0, 7.0), Spot::new(82.0, 82.0)]);
        Ok(())
    }

    #[test]
    fn unchanged_image_yields_no_spots() -> Result<()> {
        let diff = signed_diff(30, &[]);
        assert!(DelaunayExtractor::new(30, 50.0).extract(&diff)?.is_empty());
        Ok(())
    }

    #[test]
    fn no_surviving_triangle_is_no_motion() -> Result<()> {
        // Three isolated points, every edge longer than the limit.
        let diff = signed_diff(100, &[(5, 5, 250), (90, 5, 250), (5, 90, 250)]);
        assert!(DelaunayExtractor::new(30, 10.0).extract(&diff)?.is_empty());
        Ok(())
    }

    #[test]
    fn collinear_points_form_no_triangles() -> Result<()> {
        let marks: Vec<_> = (10..30).map(|x| (x, 20, 250)).collect();
        let diff = signed_diff(50, &marks);
        assert!(DelaunayExtractor::new(30, 50.0).extract(&diff)?.is_empty());
        Ok(())
    }

    #[test]
    fn relaxing_edge_limit_only_grows_the_mask() -> Result<()> {
        let mut marks = square(10, 10, 6, 250);
        marks.extend(square(30, 12, 6, 250));
        marks.extend(square(70, 70, 4, 5));
        marks.push((50, 40, 250));
        let diff = signed_diff(100, &marks);

        let mut previous: Option<Vec<(u32, u32)>> = None;
        for limit in [5.0, 10.0, 20.0, 40.0, 80.0] {
            let covered = on_pixels(&DelaunayExtractor::new(30, limit).motion_mask(&diff)?);
            if let Some(prev_covered) = &previous {
                for pixel in prev_covered {
                    assert!(covered.contains(pixel), "limit {} dropped {:?}", limit, pixel);
                }
            }
            previous = Some(covered);
        }

        // Nothing is cut once the limit exceeds the image diagonal.
        let spots = DelaunayExtractor::new(30, 200.0).extract(&diff)?;
        assert_eq!(spots.len(), 1);
        Ok(())
    }
}
