use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in pixel coordinates.
///
/// Coordinates are signed on the wire: the inference engine may report boxes
/// that start outside the image. They are clipped to image bounds before any
/// crop is taken.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

/// One candidate region reported by the detection engine.
///
/// Only detections at or above the configured confidence threshold are ever
/// surfaced by the detection gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "bbox")]
    pub bounding_box: BoundingBox,
    pub confidence: f64,
    pub class_name: String,
    pub class_id: i64,
}
