//! Per-row fixation classification against the AOI regions of a face.
//!
//! A [`FixationEvaluator`] is built once per run from a catalog and a
//! [`Config`]. Every fixation row is then evaluated independently: look up
//! the landmarks, build and transform the extended shape, classify the
//! rounded fixation point against every region.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::catalog::{RegionCatalog, ScreenPart};
use crate::composite::CompositeRegionResolver;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::extended::ExtendedShape;
use crate::normalize::LandmarkSet;
use crate::polygon::{classify, hull_area, Classification};
use crate::store::{LandmarkKey, LandmarkStore};
use crate::transform::RegionTransformer;
use crate::types::Point;

/// Name of the derived NonFace flag in output columns.
pub const NON_FACE: &str = "NonFace";

/// One fixation, as read from a tracker row.
///
/// A `None` or NaN coordinate means the tracker recorded no position.
#[derive(Debug, Clone, PartialEq)]
pub struct FixationSample {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub key: Option<LandmarkKey>,
}

impl FixationSample {
    pub fn image(x: f64, y: f64, image: impl Into<String>) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            key: Some(LandmarkKey::Image(image.into())),
        }
    }

    pub fn video_frame(x: f64, y: f64, video: impl Into<String>, frame: i64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            key: Some(LandmarkKey::VideoFrame {
                video: video.into(),
                frame,
            }),
        }
    }

    fn coordinates(&self) -> Option<(f64, f64)> {
        let x = self.x.filter(|v| !v.is_nan())?;
        let y = self.y.filter(|v| !v.is_nan())?;
        Some((x, y))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionHit {
    pub name: String,
    pub inside: bool,
    pub area_px2: f32,
}

/// Flags and areas for every catalog region, in catalog order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AoiResult {
    pub regions: Vec<RegionHit>,
    pub non_face: bool,
}

impl AoiResult {
    /// Every region outside with zero area, NonFace unset.
    pub fn empty(catalog: &RegionCatalog) -> Self {
        Self {
            regions: catalog
                .regions()
                .iter()
                .map(|r| RegionHit {
                    name: r.name.clone(),
                    inside: false,
                    area_px2: 0.0,
                })
                .collect(),
            non_face: false,
        }
    }

    pub fn get(&self, name: &str) -> Option<&RegionHit> {
        self.regions.iter().find(|r| r.name == name)
    }

    /// Whether the point fell inside `name`; false for unknown regions.
    pub fn inside(&self, name: &str) -> bool {
        self.get(name).is_some_and(|r| r.inside)
    }

    /// Output cells in column order: every `CURRENT_IA_*` flag, then the
    /// NonFace flag, then every `CURRENT_Area_*`.
    pub fn column_values(&self) -> Vec<(String, Value)> {
        let mut cells = Vec::with_capacity(self.regions.len() * 2 + 1);
        for hit in &self.regions {
            cells.push((ia_column(&hit.name), flag_value(hit.inside)));
        }
        cells.push((ia_column(NON_FACE), flag_value(self.non_face)));
        for hit in &self.regions {
            cells.push((area_column(&hit.name), Value::from(f64::from(hit.area_px2))));
        }
        cells
    }
}

/// Column names written for `catalog`, in the order [`AoiResult::column_values`]
/// produces them.
pub fn output_columns(catalog: &RegionCatalog) -> Vec<String> {
    let names = catalog.regions().iter().map(|r| r.name.as_str());
    names
        .clone()
        .map(ia_column)
        .chain(std::iter::once(ia_column(NON_FACE)))
        .chain(names.map(area_column))
        .collect()
}

fn ia_column(region: &str) -> String {
    format!("CURRENT_IA_{region}")
}

fn area_column(region: &str) -> String {
    format!("CURRENT_Area_{region}")
}

fn flag_value(flag: bool) -> Value {
    Value::from(u8::from(flag))
}

/// What happened to one fixation row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    /// No usable coordinate; nothing is written for the row.
    Skipped,
    Evaluated(AoiResult),
    /// Processing failed; the row is written as if nothing matched.
    Failed { message: String },
}

impl RowOutcome {
    pub fn result(&self) -> Option<&AoiResult> {
        match self {
            Self::Evaluated(result) => Some(result),
            Self::Skipped | Self::Failed { .. } => None,
        }
    }
}

/// How the NonFace flag is derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NonFaceRule {
    /// On screen but outside the face box.
    #[default]
    WholeScreenMinusFace,
    /// Outside the face box and every landmark region. Off-screen points
    /// count as NonFace under this rule, and so does a fixation on a stimulus
    /// without landmarks.
    OutsideFacialRegions,
}

pub struct FixationEvaluator {
    catalog: RegionCatalog,
    transformer: RegionTransformer,
    resolver: CompositeRegionResolver,
    offset: Point,
    non_face_rule: NonFaceRule,
    face: String,
    whole_screen: String,
}

impl FixationEvaluator {
    pub fn new(catalog: RegionCatalog, config: &Config) -> Result<Self> {
        catalog.validate()?;
        config.validate()?;
        config.validate_regions(&catalog)?;

        let face = catalog
            .face_region()
            .map(|r| r.name.clone())
            .ok_or_else(|| Error::InvalidCatalog("no face region".into()))?;
        let whole_screen = catalog
            .screen_region(ScreenPart::Whole)
            .map(|r| r.name.clone())
            .ok_or_else(|| Error::InvalidCatalog("no whole-screen region".into()))?;

        log::debug!(
            "evaluator ready: catalog v{}, {} regions, NonFace rule {:?}",
            catalog.version(),
            catalog.regions().len(),
            config.non_face_rule
        );

        Ok(Self {
            transformer: RegionTransformer::new(config.regions.clone(), config.screen),
            resolver: CompositeRegionResolver::new(config.screen),
            offset: config.schema.offset,
            non_face_rule: config.non_face_rule,
            catalog,
            face,
            whole_screen,
        })
    }

    /// Replace the stimulus offset taken from the configured tracker schema.
    pub fn with_offset(mut self, offset: Point) -> Self {
        self.offset = offset;
        self
    }

    pub fn catalog(&self) -> &RegionCatalog {
        &self.catalog
    }

    /// The extended shape for `landmarks`, placed at the stimulus offset,
    /// with transforms applied and composite regions resolved.
    pub fn region_polygons(&self, landmarks: &LandmarkSet) -> Result<ExtendedShape> {
        let mut shape =
            ExtendedShape::build_with_offset(landmarks.as_shape(), &self.catalog, self.offset)?;
        self.transformer.apply(&mut shape, &self.catalog)?;
        self.resolver.resolve(&mut shape, &self.catalog)?;
        Ok(shape)
    }

    /// Classify `point` against every region of a resolved shape.
    pub fn classify_point(&self, point: Point, shape: &ExtendedShape) -> AoiResult {
        let regions: Vec<RegionHit> = self
            .catalog
            .regions()
            .iter()
            .map(|region| {
                let c = shape
                    .region(region)
                    .map_or(Classification::OUTSIDE, |points| classify(point, points));
                RegionHit {
                    name: region.name.clone(),
                    inside: c.inside,
                    area_px2: c.area,
                }
            })
            .collect();

        let non_face = match self.non_face_rule {
            NonFaceRule::WholeScreenMinusFace => {
                inside(&regions, &self.whole_screen) && !inside(&regions, &self.face)
            }
            NonFaceRule::OutsideFacialRegions => !self
                .catalog
                .regions()
                .iter()
                .filter(|r| r.is_base() || r.name == self.face)
                .any(|r| inside(&regions, &r.name)),
        };

        AoiResult { regions, non_face }
    }

    /// Hull area of every catalog region of a resolved shape.
    pub fn region_areas(&self, shape: &ExtendedShape) -> Vec<(String, f32)> {
        self.catalog
            .regions()
            .iter()
            .map(|region| {
                let area = shape.region(region).map_or(0.0, hull_area);
                (region.name.clone(), area)
            })
            .collect()
    }

    pub fn evaluate<S>(&self, sample: &FixationSample, store: &S) -> RowOutcome
    where
        S: LandmarkStore + ?Sized,
    {
        self.evaluate_row(None, sample, store)
    }

    /// Evaluate every sample. Outcomes come back in input order; a failed
    /// row never stops the batch.
    pub fn evaluate_batch<S>(&self, samples: &[FixationSample], store: &S) -> Vec<RowOutcome>
    where
        S: LandmarkStore + ?Sized,
    {
        #[cfg(feature = "parallel")]
        let rows = samples.par_iter().enumerate();
        #[cfg(not(feature = "parallel"))]
        let rows = samples.iter().enumerate();

        let outcomes: Vec<RowOutcome> = rows
            .map(|(row, sample)| self.evaluate_row(Some(row), sample, store))
            .collect();

        log::info!(
            "evaluated {} rows: {} skipped, {} failed",
            outcomes.len(),
            outcomes.iter().filter(|o| **o == RowOutcome::Skipped).count(),
            outcomes
                .iter()
                .filter(|o| matches!(o, RowOutcome::Failed { .. }))
                .count()
        );
        outcomes
    }

    fn evaluate_row<S>(&self, row: Option<usize>, sample: &FixationSample, store: &S) -> RowOutcome
    where
        S: LandmarkStore + ?Sized,
    {
        self.run(sample, store).unwrap_or_else(|e| {
            match row {
                Some(row) => log::error!("row {} {:?}: {}", row, sample.key, e),
                None => log::error!("fixation {:?}: {}", sample.key, e),
            }
            RowOutcome::Failed {
                message: e.to_string(),
            }
        })
    }

    fn run<S>(&self, sample: &FixationSample, store: &S) -> Result<RowOutcome>
    where
        S: LandmarkStore + ?Sized,
    {
        let Some((x, y)) = sample.coordinates() else {
            log::debug!("fixation {:?}: no coordinate, skipped", sample.key);
            return Ok(RowOutcome::Skipped);
        };
        let point = Point::new(round_pixel(x)? as f32, round_pixel(y)? as f32);

        let Some(landmarks) = sample.key.as_ref().and_then(|key| store.get(key)) else {
            let what = sample
                .key
                .as_ref()
                .map_or_else(|| "a row without a stimulus key".to_string(), |k| k.to_string());
            log::info!("{}", Error::RegionLookupMiss(what));
            let mut result = AoiResult::empty(&self.catalog);
            result.non_face = self.non_face_rule == NonFaceRule::OutsideFacialRegions;
            return Ok(RowOutcome::Evaluated(result));
        };

        let shape = self.region_polygons(landmarks)?;
        Ok(RowOutcome::Evaluated(self.classify_point(point, &shape)))
    }
}

fn inside(regions: &[RegionHit], name: &str) -> bool {
    regions.iter().any(|r| r.name == name && r.inside)
}

/// Nearest integer pixel, halves to even.
fn round_pixel(v: f64) -> Result<i32> {
    let r = v.round_ties_even();
    if !r.is_finite() || r < f64::from(i32::MIN) || r > f64::from(i32::MAX) {
        return Err(Error::row(format!("coordinate {} is outside the pixel range", v)));
    }
    Ok(r as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::reference_face;
    use crate::store::InMemoryLandmarkStore;
    use crate::types::BoundingBox;

    fn evaluator(rule: NonFaceRule) -> FixationEvaluator {
        let config = Config {
            non_face_rule: rule,
            ..Config::default()
        };
        FixationEvaluator::new(RegionCatalog::canonical(), &config).unwrap()
    }

    fn store() -> InMemoryLandmarkStore {
        let mut store = InMemoryLandmarkStore::new();
        let face = reference_face(&BoundingBox::new(800.0, 300.0, 300.0, 300.0)).unwrap();
        store.insert(LandmarkKey::Image("face.jpg".into()), face);
        store
    }

    #[test]
    fn rounding_is_half_to_even() {
        assert_eq!(round_pixel(2.5).unwrap(), 2);
        assert_eq!(round_pixel(3.5).unwrap(), 4);
        assert_eq!(round_pixel(-0.4).unwrap(), 0);
        assert_eq!(round_pixel(511.6).unwrap(), 512);
        assert!(round_pixel(1e12).is_err());
        assert!(round_pixel(f64::INFINITY).is_err());
    }

    #[test]
    fn lookup_miss_is_zeroed() {
        let eval = evaluator(NonFaceRule::default());
        let sample = FixationSample::image(950.0, 450.0, "other.jpg");
        let outcome = eval.evaluate(&sample, &store());
        let result = outcome.result().unwrap();
        assert_eq!(*result, AoiResult::empty(eval.catalog()));
        assert!(result.regions.iter().all(|r| !r.inside && r.area_px2 == 0.0));
        assert!(!result.non_face);
    }

    #[test]
    fn lookup_miss_is_non_face_under_legacy_rule() {
        let eval = evaluator(NonFaceRule::OutsideFacialRegions);
        let sample = FixationSample::image(950.0, 450.0, "other.jpg");
        let result = eval.evaluate(&sample, &store()).result().cloned().unwrap();
        assert!(result.regions.iter().all(|r| !r.inside && r.area_px2 == 0.0));
        assert!(result.non_face);
    }

    #[test]
    fn missing_key_is_a_lookup_miss() {
        let eval = evaluator(NonFaceRule::default());
        let sample = FixationSample {
            x: Some(10.0),
            y: Some(10.0),
            key: None,
        };
        let outcome = eval.evaluate(&sample, &store());
        assert_eq!(outcome, RowOutcome::Evaluated(AoiResult::empty(eval.catalog())));
    }

    #[test]
    fn nan_coordinate_is_skipped() {
        let eval = evaluator(NonFaceRule::default());
        let mut sample = FixationSample::image(f64::NAN, 450.0, "face.jpg");
        assert_eq!(eval.evaluate(&sample, &store()), RowOutcome::Skipped);
        sample.x = Some(950.0);
        sample.y = None;
        assert_eq!(eval.evaluate(&sample, &store()), RowOutcome::Skipped);
    }

    #[test]
    fn out_of_range_coordinate_fails_the_row_only() {
        let eval = evaluator(NonFaceRule::default());
        let samples = vec![
            FixationSample::image(1e15, 450.0, "face.jpg"),
            FixationSample::image(950.0, 450.0, "face.jpg"),
        ];
        let outcomes = eval.evaluate_batch(&samples, &store());
        assert!(matches!(&outcomes[0], RowOutcome::Failed { message } if message.contains("pixel range")));
        assert!(outcomes[1].result().is_some());
    }

    #[test]
    fn single_and_batch_failures_agree() {
        let eval = evaluator(NonFaceRule::default());
        let sample = FixationSample::image(450.0, -1e15, "face.jpg");
        let single = eval.evaluate(&sample, &store());
        let batch = eval.evaluate_batch(std::slice::from_ref(&sample), &store());
        assert!(matches!(single, RowOutcome::Failed { .. }));
        assert_eq!(batch, vec![single]);
    }

    #[test]
    fn face_box_is_clamped_in_image_space() {
        // A face filling a 300x300 stimulus: its forehead extension is cut
        // at the image top before the stimulus is placed 60 px down.
        let face = reference_face(&BoundingBox::new(0.0, 0.0, 300.0, 300.0)).unwrap();
        let eval = evaluator(NonFaceRule::default());
        let placed = eval.region_polygons(&face).unwrap();
        let unplaced = evaluator(NonFaceRule::default())
            .with_offset(Point::zero())
            .region_polygons(&face)
            .unwrap();

        let area = |shape: &ExtendedShape| {
            eval.region_areas(shape)
                .into_iter()
                .find(|(name, _)| name == "Face")
                .unwrap()
                .1
        };
        let (a, b) = (area(&placed), area(&unplaced));
        assert!((a - b).abs() <= 1e-4 * b, "{} vs {}", a, b);

        let face_region = eval.catalog().get("Face").unwrap();
        let top = placed.region(face_region).unwrap()[0].y;
        let unplaced_top = unplaced.region(face_region).unwrap()[0].y;
        assert!((top - (unplaced_top + 60.0)).abs() < 1e-3);

        let mut store = InMemoryLandmarkStore::new();
        store.insert(LandmarkKey::Image("crop.jpg".into()), face);
        let result = eval
            .evaluate(&FixationSample::image(150.0, 20.0, "crop.jpg"), &store)
            .result()
            .cloned()
            .unwrap();
        assert!(top > 20.0);
        assert!(!result.inside("Face"));
        assert!(result.non_face);
    }

    #[test]
    fn screen_edges_are_on_screen() {
        let eval = evaluator(NonFaceRule::WholeScreenMinusFace);
        let at = |x: f64, y: f64| {
            eval.evaluate(&FixationSample::image(x, y, "face.jpg"), &store())
                .result()
                .cloned()
                .unwrap()
        };

        let origin = at(0.0, 0.0);
        assert!(origin.inside("WholeScreen"));
        assert!(origin.inside("LeftScreen"));
        assert!(!origin.inside("RightScreen"));
        assert!(origin.non_face);

        let corner = at(1920.0, 1080.0);
        assert!(corner.inside("WholeScreen"));
        assert!(corner.inside("RightScreen"));
        assert!(!corner.inside("LeftScreen"));
        assert!(corner.non_face);

        let right_edge = at(1920.0, 540.0);
        assert!(right_edge.inside("WholeScreen"));
        assert!(right_edge.inside("RightScreen"));
        assert!(right_edge.non_face);

        // The shared edge of the halves belongs to both.
        let middle = at(960.0, 1000.0);
        assert!(middle.inside("LeftScreen"));
        assert!(middle.inside("RightScreen"));

        let beyond = at(1921.0, 540.0);
        assert!(!beyond.inside("WholeScreen"));
        assert!(!beyond.non_face);
    }

    #[test]
    fn face_box_edge_is_face() {
        let eval = evaluator(NonFaceRule::WholeScreenMinusFace);
        let face = reference_face(&BoundingBox::new(800.0, 300.0, 300.0, 300.0)).unwrap();
        let shape = eval.region_polygons(&face).unwrap();
        let corners = shape.region(eval.catalog().get("Face").unwrap()).unwrap();
        let left = corners[0].x;
        let mid_y = (corners[0].y + corners[3].y) / 2.0;

        let on_edge = eval.classify_point(Point::new(left, mid_y), &shape);
        assert!(on_edge.inside("Face"));
        assert!(on_edge.inside("WholeScreen"));
        assert!(!on_edge.non_face);

        let just_outside = eval.classify_point(Point::new(left - 1.0, mid_y), &shape);
        assert!(!just_outside.inside("Face"));
        assert!(just_outside.non_face);
    }

    #[test]
    fn point_on_the_nose_is_inside_face_and_nose() {
        let eval = evaluator(NonFaceRule::default());
        // Nose tip of the reference face in an 800,300 300x300 box, shifted
        // down by the default 60 px stimulus offset.
        let nose = reference_face(&BoundingBox::new(800.0, 300.0, 300.0, 300.0)).unwrap()[30];
        let sample = FixationSample::image(f64::from(nose.x), f64::from(nose.y) + 60.0, "face.jpg");
        let result = eval.evaluate(&sample, &store()).result().cloned().unwrap();
        assert!(result.inside("Face"));
        assert!(result.inside("Nose"));
        assert!(result.inside("WholeScreen"));
        assert!(!result.non_face);
        assert!(result.regions.iter().all(|r| r.area_px2 > 0.0));
    }

    #[test]
    fn screen_corner_is_non_face() {
        let eval = evaluator(NonFaceRule::WholeScreenMinusFace);
        let result = eval
            .evaluate(&FixationSample::image(5.0, 5.0, "face.jpg"), &store())
            .result()
            .cloned()
            .unwrap();
        assert!(result.inside("WholeScreen"));
        assert!(result.inside("LeftScreen"));
        assert!(!result.inside("Face"));
        assert!(result.non_face);
    }

    #[test]
    fn off_screen_depends_on_rule() {
        let sample = FixationSample::image(-50.0, -50.0, "face.jpg");
        let canonical = evaluator(NonFaceRule::WholeScreenMinusFace);
        let legacy = evaluator(NonFaceRule::OutsideFacialRegions);
        assert!(!canonical.evaluate(&sample, &store()).result().unwrap().non_face);
        assert!(legacy.evaluate(&sample, &store()).result().unwrap().non_face);
    }

    #[test]
    fn column_order() {
        let catalog = RegionCatalog::canonical();
        let columns = output_columns(&catalog);
        let n = catalog.regions().len();
        assert_eq!(columns.len(), 2 * n + 1);
        assert_eq!(columns[0], "CURRENT_IA_Jaw");
        assert_eq!(columns[n], "CURRENT_IA_NonFace");
        assert_eq!(columns[n + 1], "CURRENT_Area_Jaw");

        let values: Vec<String> = AoiResult::empty(&catalog)
            .column_values()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(values, columns);
    }

    #[test]
    fn region_areas_follow_catalog() {
        let eval = evaluator(NonFaceRule::default()).with_offset(Point::zero());
        let face = reference_face(&BoundingBox::new(0.0, 0.0, 100.0, 100.0)).unwrap();
        let shape = eval.region_polygons(&face).unwrap();
        let areas = eval.region_areas(&shape);
        assert_eq!(areas.len(), eval.catalog().regions().len());
        let whole = areas.iter().find(|(n, _)| n == "WholeScreen").unwrap().1;
        assert!((whole - 1920.0 * 1080.0).abs() < 1.0);
    }
}
