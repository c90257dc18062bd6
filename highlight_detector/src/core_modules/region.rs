// THEORY:
// A `Region` is one contiguous patch of highlighted pixels in a single screenshot:
// the spatial summary the isolator hands to the orchestrator. Like the other data
// containers it is "dumb": it records where the patch is and how big it is, and
// knows nothing about which palette color produced it.
//
// Only the bounding box is consumed downstream (the crop uses `y` and `height`);
// the area is what ranks regions against each other.

use serde::{Deserialize, Serialize};

/// A 2D pixel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

/// Axis-aligned box in pixel units; `x + width` and `y + height` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// A connected, externally bounded set of mask pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Index in discovery (raster) order, unique within one mask only.
    pub id: u64,
    pub bounding_box: BoundingBox,
    /// Enclosed area: mask pixels plus any holes they surround.
    pub area: usize,
    /// Mask pixels only.
    pub pixel_count: usize,
}

impl BoundingBox {
    /// Smallest box containing both corner points (inclusive).
    pub fn from_corners(min: Point, max: Point) -> Self {
        Self {
            x: min.x,
            y: min.y,
            width: max.x - min.x + 1,
            height: max.y - min.y + 1,
        }
    }

    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x as u64 + self.width as u64 <= width as u64
            && self.y as u64 + self.height as u64 <= height as u64
    }
}
