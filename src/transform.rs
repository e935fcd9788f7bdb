//! Region scaling and visual-angle enlargement.
//!
//! Both transforms keep a region's centroid fixed: every point moves away
//! from (or toward) the mean of the region's points.
//!
//! Visual-angle enlargement converts a desired angular growth into pixels
//! using the physical viewing setup:
//!
//! ```text
//! delta_px = 2 * tan(deg / 2) * distance_mm * (screen_px / screen_mm)
//! factor   = (extent + delta_px) / extent
//! ```
//!
//! An axis whose extent is (nearly) zero keeps a factor of 1.0.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::{CompositeKind, RegionCatalog, RegionDefinition, RegionKind};
use crate::error::{Error, Result};
use crate::extended::ExtendedShape;
use crate::types::{centroid, BoundingBox, Point};

/// Extents at or below this are treated as collapsed.
pub const DEGENERATE_EXTENT: f32 = 1e-6;

/// Physical description of the stimulus screen and viewing distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenGeometry {
    /// Eye-to-screen distance.
    pub distance_mm: f32,
    pub screen_w_px: f32,
    pub screen_h_px: f32,
    pub screen_w_mm: f32,
    pub screen_h_mm: f32,
}

impl Default for ScreenGeometry {
    /// A 24" 16:9 1080p monitor viewed from 60 cm.
    fn default() -> Self {
        Self {
            distance_mm: 600.0,
            screen_w_px: 1920.0,
            screen_h_px: 1080.0,
            screen_w_mm: 531.0,
            screen_h_mm: 299.0,
        }
    }
}

impl ScreenGeometry {
    /// Pixel length on the horizontal axis subtending `deg` degrees.
    pub fn degrees_to_pixels_x(&self, deg: f32) -> f32 {
        visual_angle_to_mm(deg, self.distance_mm) * (self.screen_w_px / self.screen_w_mm)
    }

    /// Pixel length on the vertical axis subtending `deg` degrees.
    pub fn degrees_to_pixels_y(&self, deg: f32) -> f32 {
        visual_angle_to_mm(deg, self.distance_mm) * (self.screen_h_px / self.screen_h_mm)
    }

    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("distance_mm", self.distance_mm),
            ("screen_w_px", self.screen_w_px),
            ("screen_h_px", self.screen_h_px),
            ("screen_w_mm", self.screen_w_mm),
            ("screen_h_mm", self.screen_h_mm),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::Config(format!(
                    "screen {} must be positive, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

fn visual_angle_to_mm(deg: f32, distance_mm: f32) -> f32 {
    2.0 * (deg.to_radians() / 2.0).tan() * distance_mm
}

/// How one region is grown before classification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RegionTransform {
    /// Multiply each axis' distance from the centroid.
    Scale { x: f32, y: f32 },
    /// Grow each axis by a visual angle in degrees.
    VisualAngle { deg_x: f32, deg_y: f32 },
}

impl RegionTransform {
    pub const IDENTITY: Self = Self::Scale { x: 1.0, y: 1.0 };

    /// The linear factors this transform amounts to for `points`.
    pub fn factors(&self, points: &[Point], screen: &ScreenGeometry) -> (f32, f32) {
        match *self {
            Self::Scale { x, y } => (x, y),
            Self::VisualAngle { deg_x, deg_y } => visual_angle_factors(points, deg_x, deg_y, screen),
        }
    }

    pub fn apply(&self, points: &[Point], screen: &ScreenGeometry) -> Vec<Point> {
        match *self {
            Self::Scale { x, y } => scale(points, x, y),
            Self::VisualAngle { deg_x, deg_y } => {
                enlarge_by_visual_angle(points, deg_x, deg_y, screen)
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::Scale { x, y } => {
                if !(x.is_finite() && y.is_finite() && x > 0.0 && y > 0.0) {
                    return Err(Error::Config(format!(
                        "scale factors must be positive, got ({}, {})",
                        x, y
                    )));
                }
            }
            Self::VisualAngle { deg_x, deg_y } => {
                let ok = |d: f32| d.is_finite() && (0.0..180.0).contains(&d);
                if !(ok(deg_x) && ok(deg_y)) {
                    return Err(Error::Config(format!(
                        "visual angles must be in [0, 180) degrees, got ({}, {})",
                        deg_x, deg_y
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Default for RegionTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Scale `points` about their centroid. Empty input comes back empty.
pub fn scale(points: &[Point], xscale: f32, yscale: f32) -> Vec<Point> {
    let Some(c) = centroid(points) else {
        return Vec::new();
    };
    points
        .iter()
        .map(|&p| c + (p - c).scale(xscale, yscale))
        .collect()
}

/// Per-axis factors equivalent to growing `points` by a visual angle.
pub fn visual_angle_factors(
    points: &[Point],
    deg_x: f32,
    deg_y: f32,
    screen: &ScreenGeometry,
) -> (f32, f32) {
    let Some(bbox) = BoundingBox::enclosing(points) else {
        return (1.0, 1.0);
    };
    (
        grow_factor(bbox.width, screen.degrees_to_pixels_x(deg_x)),
        grow_factor(bbox.height, screen.degrees_to_pixels_y(deg_y)),
    )
}

fn grow_factor(extent: f32, delta_px: f32) -> f32 {
    if extent <= DEGENERATE_EXTENT {
        1.0
    } else {
        (extent + delta_px) / extent
    }
}

/// Grow `points` by `deg_x`/`deg_y` degrees of visual angle about their centroid.
pub fn enlarge_by_visual_angle(
    points: &[Point],
    deg_x: f32,
    deg_y: f32,
    screen: &ScreenGeometry,
) -> Vec<Point> {
    let (sx, sy) = visual_angle_factors(points, deg_x, deg_y, screen);
    scale(points, sx, sy)
}

/// Applies the configured per-region transforms to an extended shape.
///
/// Base regions and the face box are transformed. Regions that the
/// composite resolver fills in afterwards are left alone.
#[derive(Debug, Clone)]
pub struct RegionTransformer {
    transforms: BTreeMap<String, RegionTransform>,
    screen: ScreenGeometry,
}

impl RegionTransformer {
    pub fn new(transforms: BTreeMap<String, RegionTransform>, screen: ScreenGeometry) -> Self {
        Self { transforms, screen }
    }

    /// Transform for `name`, identity when not configured.
    pub fn transform_for(&self, name: &str) -> RegionTransform {
        self.transforms.get(name).copied().unwrap_or_default()
    }

    pub fn screen(&self) -> &ScreenGeometry {
        &self.screen
    }

    /// Whether the transformer touches `region` at all.
    pub fn is_transformable(region: &RegionDefinition) -> bool {
        matches!(
            region.kind,
            RegionKind::Base | RegionKind::Composite(CompositeKind::Face { .. })
        )
    }

    pub fn apply(&self, shape: &mut ExtendedShape, catalog: &RegionCatalog) -> Result<()> {
        for region in catalog.regions() {
            if !Self::is_transformable(region) {
                continue;
            }
            let transform = self.transform_for(&region.name);
            if transform == RegionTransform::IDENTITY {
                continue;
            }
            let Some(original) = shape.region(region) else {
                continue;
            };

            let mut transformed = transform.apply(original, &self.screen);
            if transformed.len() != original.len() {
                log::warn!(
                    "transform of region '{}' changed point count {} -> {}, scaling points individually",
                    region.name,
                    original.len(),
                    transformed.len()
                );
                transformed = scale_each(original, transform.factors(original, &self.screen));
            }
            shape.set_region(region, &transformed)?;
        }
        Ok(())
    }
}

/// Scale every point about the region centroid, one point at a time.
fn scale_each(points: &[Point], (sx, sy): (f32, f32)) -> Vec<Point> {
    let c = centroid(points).unwrap_or_else(Point::zero);
    let mut out = Vec::with_capacity(points.len());
    for &p in points {
        out.push(Point::new(c.x + (p.x - c.x) * sx, c.y + (p.y - c.y) * sy));
    }
    out
}
