use serde::{Deserialize, Serialize};

/// Estimated centre of a moving object, in image coordinates (pixels).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Spot {
    pub x: f64,
    pub y: f64,
}

impl Spot {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Spot) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn midpoint(&self, other: &Spot) -> Spot {
        Spot::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}
