//! The extended shape: detector landmarks plus composite region slots.

use serde::Serialize;

use crate::catalog::{CompositeKind, RegionCatalog, RegionDefinition, BASE_LANDMARKS};
use crate::error::{Error, Result};
use crate::types::{BoundingBox, Point, Shape};

/// Fixed-length point array laid out by a [`RegionCatalog`].
///
/// Slots `[0, 68)` hold the detector output, the remaining slots hold
/// composite regions. A new extended shape is built for every sample; the
/// composite slots are never carried over from a previous one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtendedShape {
    shape: Shape,
}

impl ExtendedShape {
    /// Build from raw landmarks without any placement offset.
    pub fn build(landmarks: &Shape, catalog: &RegionCatalog) -> Result<Self> {
        Self::build_with_offset(landmarks, catalog, Point::zero())
    }

    /// Build from raw landmarks, then shift every landmark-derived slot by
    /// `offset`.
    ///
    /// The face box is built and clamped in image coordinates. The offset
    /// then places the stimulus image on the tracker screen, so the base
    /// landmarks and the face box end up in the same space as the fixations.
    pub fn build_with_offset(
        landmarks: &Shape,
        catalog: &RegionCatalog,
        offset: Point,
    ) -> Result<Self> {
        if landmarks.num_landmarks() < BASE_LANDMARKS {
            return Err(Error::InsufficientLandmarks {
                expected: BASE_LANDMARKS,
                found: landmarks.num_landmarks(),
            });
        }

        let len = catalog.extended_len().max(BASE_LANDMARKS);
        let mut shape = Shape::with_capacity(len);
        shape.points.extend_from_slice(&landmarks.points[..BASE_LANDMARKS]);
        shape.points.resize(len, Point::zero());

        let mut extended = Self { shape };
        for region in catalog.regions() {
            if let Some(CompositeKind::Face { jaw }) = region.composite_kind() {
                let jaw = catalog
                    .get(jaw)
                    .ok_or_else(|| Error::InvalidCatalog(format!("undefined jaw region '{}'", jaw)))?;
                let corners = {
                    let base = &extended.shape.points[..BASE_LANDMARKS];
                    let jaw_points = extended.region(jaw).unwrap_or(&[]);
                    face_box(base, jaw_points)
                };
                if let Some(face) = corners {
                    extended.set_region(region, &face.corners())?;
                }
            }
        }

        if offset != Point::zero() {
            extended.translate_landmark_regions(catalog, offset);
        }
        Ok(extended)
    }

    /// Shift the base landmarks and the face box. Screen regions are
    /// already in screen coordinates and stay put.
    fn translate_landmark_regions(&mut self, catalog: &RegionCatalog, offset: Point) {
        for p in &mut self.shape.points[..BASE_LANDMARKS] {
            *p += offset;
        }
        for region in catalog.regions() {
            if let Some(CompositeKind::Face { .. }) = region.composite_kind() {
                if let Some(slots) = self.shape.points.get_mut(region.range()) {
                    for p in slots {
                        *p += offset;
                    }
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.shape.num_landmarks()
    }

    pub fn is_empty(&self) -> bool {
        self.shape.points.is_empty()
    }

    pub fn points(&self) -> &[Point] {
        &self.shape.points
    }

    pub fn as_shape(&self) -> &Shape {
        &self.shape
    }

    /// Points of one region, or `None` if the region lies outside this shape.
    pub fn region(&self, region: &RegionDefinition) -> Option<&[Point]> {
        self.shape.points.get(region.range())
    }

    /// Overwrite one region's slots. The replacement must keep the region's
    /// point count.
    pub fn set_region(&mut self, region: &RegionDefinition, points: &[Point]) -> Result<()> {
        if points.len() != region.num_points() {
            return Err(Error::row(format!(
                "region '{}' needs {} points, got {}",
                region.name,
                region.num_points(),
                points.len()
            )));
        }
        let len = self.len();
        let slots = self.shape.points.get_mut(region.range()).ok_or_else(|| {
            Error::row(format!(
                "region '{}' ({}..{}) is outside a shape of {} points",
                region.name, region.start, region.end, len
            ))
        })?;
        slots.copy_from_slice(points);
        Ok(())
    }
}

/// Face rectangle: the horizontal extent and bottom of all landmarks, with
/// the top raised by one jaw height above the jaw's highest point to cover
/// the forehead. The top never goes above `y = 0`.
pub fn face_box(base: &[Point], jaw: &[Point]) -> Option<BoundingBox> {
    let all = BoundingBox::enclosing(base)?;
    let jaw_box = BoundingBox::enclosing(jaw)?;
    let top = (jaw_box.y - jaw_box.height).max(0.0);
    Some(BoundingBox::from_corners(
        Point::new(all.x, top),
        Point::new(all.right(), all.bottom()),
    ))
}
