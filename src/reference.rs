//! A generic 68-point face, useful for demos and tests.

use crate::error::Result;
use crate::normalize::LandmarkSet;
use crate::types::{BoundingBox, Point, Shape};

/// Approximate positions of the 68 iBUG landmarks in normalized [0,1]
/// coordinates.
const REFERENCE_68: [(f32, f32); 68] = [
    // Jaw line (0-16)
    (0.10, 0.35),
    (0.11, 0.45),
    (0.12, 0.55),
    (0.14, 0.65),
    (0.18, 0.73),
    (0.24, 0.80),
    (0.32, 0.85),
    (0.41, 0.88),
    (0.50, 0.89), // Chin center
    (0.59, 0.88),
    (0.68, 0.85),
    (0.76, 0.80),
    (0.82, 0.73),
    (0.86, 0.65),
    (0.88, 0.55),
    (0.89, 0.45),
    (0.90, 0.35),
    // Right eyebrow (17-21)
    (0.20, 0.26),
    (0.25, 0.22),
    (0.32, 0.21),
    (0.38, 0.23),
    (0.43, 0.27),
    // Left eyebrow (22-26)
    (0.57, 0.27),
    (0.62, 0.23),
    (0.68, 0.21),
    (0.75, 0.22),
    (0.80, 0.26),
    // Nose bridge (27-30)
    (0.50, 0.32),
    (0.50, 0.40),
    (0.50, 0.48),
    (0.50, 0.55),
    // Nose bottom (31-35)
    (0.40, 0.58),
    (0.45, 0.60),
    (0.50, 0.62),
    (0.55, 0.60),
    (0.60, 0.58),
    // Right eye (36-41)
    (0.24, 0.32),
    (0.28, 0.29),
    (0.34, 0.29),
    (0.38, 0.33),
    (0.34, 0.35),
    (0.28, 0.35),
    // Left eye (42-47)
    (0.62, 0.33),
    (0.66, 0.29),
    (0.72, 0.29),
    (0.76, 0.32),
    (0.72, 0.35),
    (0.66, 0.35),
    // Outer lip (48-59)
    (0.32, 0.72),
    (0.38, 0.68),
    (0.44, 0.66),
    (0.50, 0.67),
    (0.56, 0.66),
    (0.62, 0.68),
    (0.68, 0.72),
    (0.62, 0.78),
    (0.56, 0.80),
    (0.50, 0.81),
    (0.44, 0.80),
    (0.38, 0.78),
    // Inner lip (60-67)
    (0.36, 0.72),
    (0.44, 0.70),
    (0.50, 0.70),
    (0.56, 0.70),
    (0.64, 0.72),
    (0.56, 0.74),
    (0.50, 0.75),
    (0.44, 0.74),
];

/// The reference face laid out inside `face_rect`.
///
/// Fails only when the rectangle has non-finite coordinates.
pub fn reference_face(face_rect: &BoundingBox) -> Result<LandmarkSet> {
    let points: Vec<Point> = REFERENCE_68
        .iter()
        .map(|&(x, y)| face_rect.denormalize_point(Point::new(x, y)))
        .collect();
    LandmarkSet::try_from(Shape::new(points))
}
