//! Point-in-region tests and region areas.
//!
//! Every region is measured and tested through its convex hull. Concave
//! outlines such as the jaw line are therefore approximated by their hull;
//! this keeps the test uniform across region shapes.

use serde::Serialize;

use crate::types::Point;

/// Tolerance on cross products when deciding "on the edge".
const EDGE_EPSILON: f64 = 1e-9;

/// Outcome of testing one point against one region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Classification {
    pub inside: bool,
    /// Hull area in square pixels.
    pub area: f32,
}

impl Classification {
    pub const OUTSIDE: Self = Self {
        inside: false,
        area: 0.0,
    };
}

/// Test `point` against the convex hull of `region`.
///
/// Regions with fewer than three points can be neither tested nor measured
/// and always come back as outside with zero area. Points on the hull
/// boundary count as inside.
pub fn classify(point: Point, region: &[Point]) -> Classification {
    if region.len() < 3 {
        return Classification::OUTSIDE;
    }
    let hull = convex_hull(region);
    Classification {
        inside: hull_contains(&hull, point),
        area: polygon_area(&hull),
    }
}

/// Area of the convex hull of `points`, zero for fewer than three points.
pub fn hull_area(points: &[Point]) -> f32 {
    if points.len() < 3 {
        return 0.0;
    }
    polygon_area(&convex_hull(points))
}

/// Calculate the area of a polygon using the shoelace formula.
pub fn polygon_area(points: &[Point]) -> f32 {
    if points.len() < 3 {
        return 0.0;
    }

    let mut area = 0.0f64;
    let n = points.len();

    for i in 0..n {
        let j = (i + 1) % n;
        area += f64::from(points[i].x) * f64::from(points[j].y);
        area -= f64::from(points[j].x) * f64::from(points[i].y);
    }

    (area / 2.0).abs() as f32
}

/// Convex hull by Andrew's monotone chain, counter-clockwise in a y-up frame.
///
/// Collinear points are dropped, so an all-collinear input yields its two
/// extreme points and a single distinct point yields itself.
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut pts: Vec<Point> = points.to_vec();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    let mut lower: Vec<Point> = Vec::with_capacity(pts.len());
    for &p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<Point> = Vec::with_capacity(pts.len());
    for &p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Non-strict containment in a hull produced by [`convex_hull`].
fn hull_contains(hull: &[Point], p: Point) -> bool {
    match hull.len() {
        0 => false,
        1 => hull[0] == p,
        2 => on_segment(hull[0], hull[1], p),
        n => (0..n).all(|i| cross(hull[i], hull[(i + 1) % n], p) >= -EDGE_EPSILON),
    }
}

fn on_segment(a: Point, b: Point, p: Point) -> bool {
    if cross(a, b, p).abs() > EDGE_EPSILON {
        return false;
    }
    let within = |lo: f32, hi: f32, v: f32| lo.min(hi) <= v && v <= lo.max(hi);
    within(a.x, b.x, p.x) && within(a.y, b.y, p.y)
}

/// Cross product (b - a) x (c - a), in f64.
fn cross(a: Point, b: Point, c: Point) -> f64 {
    let (ax, ay) = (f64::from(a.x), f64::from(a.y));
    let (bx, by) = (f64::from(b.x), f64::from(b.y));
    let (cx, cy) = (f64::from(c.x), f64::from(c.y));
    (bx - ax) * (cy - ay) - (by - ay) * (cx - ax)
}
