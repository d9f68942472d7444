//! Pixel-space bounding boxes.

use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An axis-aligned box in integer pixel coordinates of the source frame.
///
/// Always satisfies `x1 < x2` and `y1 < y2`. On the wire it is the
/// four-element array `[x1, y1, x2, y2]` that detectors emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[i32; 4]", into = "[i32; 4]")]
pub struct BoundingBox {
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Degenerate bounding box [{x1}, {y1}, {x2}, {y2}]")]
pub struct BoundingBoxError {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    /// Create a bounding box, rejecting empty or inverted extents.
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Result<Self, BoundingBoxError> {
        if x1 < x2 && y1 < y2 {
            Ok(Self { x1, y1, x2, y2 })
        } else {
            Err(BoundingBoxError { x1, y1, x2, y2 })
        }
    }

    pub fn x1(&self) -> i32 {
        self.x1
    }

    pub fn y1(&self) -> i32 {
        self.y1
    }

    pub fn x2(&self) -> i32 {
        self.x2
    }

    pub fn y2(&self) -> i32 {
        self.y2
    }

    pub fn width(&self) -> u32 {
        self.x1.abs_diff(self.x2)
    }

    pub fn height(&self) -> u32 {
        self.y1.abs_diff(self.y2)
    }

    /// Coordinates as `[x1, y1, x2, y2]`.
    pub fn to_array(&self) -> [i32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

impl TryFrom<[i32; 4]> for BoundingBox {
    type Error = BoundingBoxError;

    fn try_from([x1, y1, x2, y2]: [i32; 4]) -> Result<Self, Self::Error> {
        Self::new(x1, y1, x2, y2)
    }
}

impl From<BoundingBox> for [i32; 4] {
    fn from(bbox: BoundingBox) -> Self {
        bbox.to_array()
    }
}

impl JsonSchema for BoundingBox {
    fn schema_name() -> String {
        "BoundingBox".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        <[i32; 4]>::json_schema(gen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_rejects_degenerate() {
        assert!(BoundingBox::new(10, 10, 10, 20).is_err());
        assert!(BoundingBox::new(10, 30, 20, 20).is_err());
        assert!(BoundingBox::new(0, 0, 1, 1).is_ok());
    }

    #[test]
    fn test_bbox_dimensions() {
        let bbox = BoundingBox::new(5, 10, 25, 50).unwrap();
        assert_eq!(bbox.width(), 20);
        assert_eq!(bbox.height(), 40);
    }

    #[test]
    fn test_bbox_dimensions_span_full_range() {
        let bbox = BoundingBox::try_from([i32::MIN, 0, i32::MAX, 10]).unwrap();
        assert_eq!(bbox.width(), u32::MAX);
        assert_eq!(bbox.height(), 10);
    }

    #[test]
    fn test_bbox_wire_format() {
        let bbox = BoundingBox::new(1, 2, 3, 4).unwrap();
        assert_eq!(serde_json::to_string(&bbox).unwrap(), "[1,2,3,4]");

        let parsed: BoundingBox = serde_json::from_str("[1,2,3,4]").unwrap();
        assert_eq!(parsed, bbox);

        assert!(serde_json::from_str::<BoundingBox>("[4,2,3,4]").is_err());
    }
}
