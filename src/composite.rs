//! Second pass over an extended shape: regions derived from other regions'
//! current coordinates or from the screen.

use crate::catalog::{CompositeKind, RegionCatalog, ScreenPart};
use crate::error::Result;
use crate::extended::ExtendedShape;
use crate::transform::ScreenGeometry;
use crate::types::{BoundingBox, Point};

/// Fills in bounds and screen regions. Run after the transformer so that
/// bounds regions see the transformed source points.
#[derive(Debug, Clone, Copy)]
pub struct CompositeRegionResolver {
    screen: ScreenGeometry,
}

impl CompositeRegionResolver {
    pub fn new(screen: ScreenGeometry) -> Self {
        Self { screen }
    }

    pub fn resolve(&self, shape: &mut ExtendedShape, catalog: &RegionCatalog) -> Result<()> {
        for region in catalog.regions() {
            let rect = match region.composite_kind() {
                Some(CompositeKind::Bounds { sources }) => {
                    let mut union: Vec<Point> = Vec::new();
                    for source in sources.iter().filter_map(|name| catalog.get(name)) {
                        if let Some(points) = shape.region(source) {
                            union.extend_from_slice(points);
                        }
                    }
                    match BoundingBox::enclosing(&union) {
                        Some(bbox) => bbox,
                        None => continue,
                    }
                }
                Some(CompositeKind::Screen(part)) => screen_rect(&self.screen, *part),
                Some(CompositeKind::Face { .. }) | None => continue,
            };
            shape.set_region(region, &rect.corners())?;
        }
        Ok(())
    }
}

/// Rectangle covered by a screen part, in screen pixels.
pub fn screen_rect(screen: &ScreenGeometry, part: ScreenPart) -> BoundingBox {
    let w = screen.screen_w_px;
    let h = screen.screen_h_px;
    match part {
        ScreenPart::Left => BoundingBox::new(0.0, 0.0, w / 2.0, h),
        ScreenPart::Right => BoundingBox::new(w / 2.0, 0.0, w - w / 2.0, h),
        ScreenPart::Whole => BoundingBox::new(0.0, 0.0, w, h),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::reference_face;

    fn resolved(rect: BoundingBox) -> (RegionCatalog, ExtendedShape) {
        let catalog = RegionCatalog::canonical();
        let landmarks = reference_face(&rect).unwrap();
        let mut shape = ExtendedShape::build(landmarks.as_shape(), &catalog).unwrap();
        CompositeRegionResolver::new(ScreenGeometry::default())
            .resolve(&mut shape, &catalog)
            .unwrap();
        (catalog, shape)
    }

    #[test]
    fn screen_halves() {
        let screen = ScreenGeometry::default();
        let left = screen_rect(&screen, ScreenPart::Left);
        let right = screen_rect(&screen, ScreenPart::Right);
        let whole = screen_rect(&screen, ScreenPart::Whole);
        assert_eq!(left, BoundingBox::new(0.0, 0.0, 960.0, 1080.0));
        assert_eq!(right, BoundingBox::new(960.0, 0.0, 960.0, 1080.0));
        assert_eq!(whole, BoundingBox::new(0.0, 0.0, 1920.0, 1080.0));
    }

    #[test]
    fn periocular_covers_eyes_and_brows() {
        let (catalog, shape) = resolved(BoundingBox::new(0.0, 0.0, 100.0, 100.0));
        let peri = shape.region(catalog.get("Periocular").unwrap()).unwrap();
        let bbox = BoundingBox::enclosing(peri).unwrap();

        // Brows and eyes span x 20..80, y 21..35 on the reference face.
        assert!((bbox.x - 20.0).abs() < 1e-3);
        assert!((bbox.right() - 80.0).abs() < 1e-3);
        assert!((bbox.y - 21.0).abs() < 1e-3);
        assert!((bbox.bottom() - 35.0).abs() < 1e-3);
    }

    #[test]
    fn screen_regions_ignore_landmarks() {
        let (catalog, a) = resolved(BoundingBox::new(0.0, 0.0, 100.0, 100.0));
        let (_, b) = resolved(BoundingBox::new(700.0, 300.0, 400.0, 500.0));
        for name in ["LeftScreen", "RightScreen", "WholeScreen"] {
            let region = catalog.get(name).unwrap();
            assert_eq!(a.region(region), b.region(region), "{name} differs");
        }
    }
}
