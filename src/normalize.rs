//! Conversion of landmark data in its various shapes into a [`LandmarkSet`].

use std::ops::Index;

use serde::{Deserialize, Serialize};

use crate::catalog::BASE_LANDMARKS;
use crate::error::{Error, Result};
use crate::types::{Point, Shape};

/// Anything that can hand out detector landmarks by index, the way a
/// detector's native result object does.
pub trait LandmarkProvider {
    /// Number of points available.
    fn num_parts(&self) -> usize;

    /// Point at index `i`, or `None` if out of range.
    fn part(&self, i: usize) -> Option<Point>;
}

impl LandmarkProvider for Shape {
    fn num_parts(&self) -> usize {
        self.num_landmarks()
    }

    fn part(&self, i: usize) -> Option<Point> {
        self.points.get(i).copied()
    }
}

impl LandmarkProvider for Vec<Point> {
    fn num_parts(&self) -> usize {
        self.len()
    }

    fn part(&self, i: usize) -> Option<Point> {
        self.get(i).copied()
    }
}

/// The accepted landmark representations.
pub enum LandmarkInput<'a> {
    /// One `[x, y]` pair per landmark.
    Pairs(&'a [[f32; 2]]),
    /// `[x0, y0, x1, y1, ...]`.
    Flat(&'a [f32]),
    /// An opaque indexed provider.
    Provider(&'a dyn LandmarkProvider),
}

/// Exactly 68 detector landmarks for one face. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Shape", into = "Shape")]
pub struct LandmarkSet {
    shape: Shape,
}

impl LandmarkSet {
    pub fn points(&self) -> &[Point] {
        &self.shape.points
    }

    pub fn as_shape(&self) -> &Shape {
        &self.shape
    }
}

impl Index<usize> for LandmarkSet {
    type Output = Point;

    fn index(&self, idx: usize) -> &Self::Output {
        &self.shape[idx]
    }
}

impl TryFrom<Shape> for LandmarkSet {
    type Error = Error;

    fn try_from(shape: Shape) -> Result<Self> {
        normalize(LandmarkInput::Provider(&shape))
    }
}

impl From<LandmarkSet> for Shape {
    fn from(set: LandmarkSet) -> Self {
        set.shape
    }
}

/// Convert any accepted representation into a canonical 68-point set.
pub fn normalize(input: LandmarkInput<'_>) -> Result<LandmarkSet> {
    let points: Vec<Point> = match input {
        LandmarkInput::Pairs(pairs) => {
            if pairs.len() != BASE_LANDMARKS {
                return Err(Error::UnsupportedShapeFormat(format!(
                    "expected {}x2 array, got {}x2",
                    BASE_LANDMARKS,
                    pairs.len()
                )));
            }
            pairs.iter().map(|&[x, y]| Point::new(x, y)).collect()
        }
        LandmarkInput::Flat(values) => {
            if values.len() != BASE_LANDMARKS * 2 {
                return Err(Error::UnsupportedShapeFormat(format!(
                    "expected {} flat coordinates, got {}",
                    BASE_LANDMARKS * 2,
                    values.len()
                )));
            }
            Shape::from_flat_vec(values).points
        }
        LandmarkInput::Provider(provider) => {
            if provider.num_parts() < BASE_LANDMARKS {
                return Err(Error::UnsupportedShapeFormat(format!(
                    "provider exposes {} points, need {}",
                    provider.num_parts(),
                    BASE_LANDMARKS
                )));
            }
            (0..BASE_LANDMARKS)
                .map(|i| {
                    provider.part(i).ok_or_else(|| {
                        Error::UnsupportedShapeFormat(format!("provider has no point {}", i))
                    })
                })
                .collect::<Result<_>>()?
        }
    };

    if let Some(i) = points.iter().position(|p| !p.is_finite()) {
        return Err(Error::UnsupportedShapeFormat(format!(
            "landmark {} is not finite",
            i
        )));
    }

    Ok(LandmarkSet {
        shape: Shape::new(points),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_points() -> Vec<Point> {
        (0..BASE_LANDMARKS)
            .map(|i| Point::new(i as f32, (i * 2) as f32))
            .collect()
    }

    #[test]
    fn accepts_pairs() {
        let pairs: Vec<[f32; 2]> = grid_points().iter().map(|p| [p.x, p.y]).collect();
        let set = normalize(LandmarkInput::Pairs(&pairs)).unwrap();
        assert_eq!(set.points().len(), 68);
        assert_eq!(set[10], Point::new(10.0, 20.0));
    }

    #[test]
    fn accepts_flat() {
        let flat = Shape::new(grid_points()).to_flat_vec();
        let set = normalize(LandmarkInput::Flat(&flat)).unwrap();
        assert_eq!(set[67], Point::new(67.0, 134.0));
    }

    #[test]
    fn accepts_provider_and_truncates_extra_points() {
        let mut points = grid_points();
        points.push(Point::new(999.0, 999.0));
        let shape = Shape::new(points);
        let set = normalize(LandmarkInput::Provider(&shape)).unwrap();
        assert_eq!(set.points().len(), 68);

        let from_vec = normalize(LandmarkInput::Provider(&shape.points)).unwrap();
        assert_eq!(from_vec, set);
    }

    #[test]
    fn rejects_wrong_sizes() {
        let short = vec![[0.0f32, 0.0]; 5];
        assert!(matches!(
            normalize(LandmarkInput::Pairs(&short)),
            Err(Error::UnsupportedShapeFormat(_))
        ));

        let flat = vec![0.0f32; 135];
        assert!(matches!(
            normalize(LandmarkInput::Flat(&flat)),
            Err(Error::UnsupportedShapeFormat(_))
        ));

        let shape = Shape::new(vec![Point::zero(); 67]);
        assert!(matches!(
            normalize(LandmarkInput::Provider(&shape)),
            Err(Error::UnsupportedShapeFormat(_))
        ));
    }

    #[test]
    fn rejects_non_finite_points() {
        let mut points = grid_points();
        points[3] = Point::new(f32::NAN, 1.0);
        let shape = Shape::new(points);
        assert!(LandmarkSet::try_from(shape).is_err());
    }

    #[test]
    fn serde_enforces_point_count() {
        let set = normalize(LandmarkInput::Provider(&Shape::new(grid_points()))).unwrap();
        let json = serde_json::to_string(&set).unwrap();
        let back: LandmarkSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);

        let bad = serde_json::to_string(&Shape::new(vec![Point::zero(); 3])).unwrap();
        assert!(serde_json::from_str::<LandmarkSet>(&bad).is_err());
    }
}
