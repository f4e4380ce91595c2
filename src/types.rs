use geo::{coord, Point, Rect};
use serde::Deserialize;

/// Axis-aligned rectangle on the lon/lat plane. `x` runs along longitude, `y` along latitude.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Patch {
    pub left: f64,
    pub right: f64,
    pub bottom: f64,
    pub top: f64,
}

impl Patch {
    pub fn new(left: f64, right: f64, bottom: f64, top: f64) -> Self {
        debug_assert!(left < right && bottom < top, "degenerate patch");
        Self { left, right, bottom, top }
    }

    /// Side length. Partitioning only produces squares, so this is the width.
    pub fn size(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.top - self.bottom
    }

    /// Inclusive on all four edges: a point on a shared edge is contained by both neighbours.
    pub fn contains(&self, point: &Point<f64>) -> bool {
        let (lon, lat) = (point.x(), point.y());
        lon >= self.left && lon <= self.right && lat >= self.bottom && lat <= self.top
    }

    /// True when the open interiors intersect. Touching edges do not count.
    pub fn overlaps_interior(&self, other: &Patch) -> bool {
        self.left < other.right
            && other.left < self.right
            && self.bottom < other.top
            && other.bottom < self.top
    }

    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            coord! { x: self.left, y: self.bottom },
            coord! { x: self.right, y: self.top },
        )
    }
}

impl From<Patch> for Rect<f64> {
    fn from(patch: Patch) -> Self {
        patch.to_rect()
    }
}

/// Builds a plane point from a (lat, lon) pair as read from input.
pub fn lat_lon(lat: f64, lon: f64) -> Point<f64> {
    Point::new(lon, lat)
}
