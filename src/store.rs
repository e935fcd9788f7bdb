//! Keyed access to detected landmark sets.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::{slot_columns, RegionCatalog, BASE_LANDMARKS};
use crate::error::{Error, Result};
use crate::normalize::LandmarkSet;
use crate::record::{number_cell, text_cell, Record};
use crate::types::{Point, Shape};

/// Identifies the landmark set a fixation refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LandmarkKey {
    Image(String),
    VideoFrame { video: String, frame: i64 },
}

impl fmt::Display for LandmarkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image(name) => write!(f, "image '{}'", name),
            Self::VideoFrame { video, frame } => write!(f, "video '{}', frame {}", video, frame),
        }
    }
}

/// Read-only lookup of landmark sets, shared across worker threads.
pub trait LandmarkStore: Sync {
    fn get(&self, key: &LandmarkKey) -> Option<&LandmarkSet>;
}

impl LandmarkStore for HashMap<LandmarkKey, LandmarkSet> {
    fn get(&self, key: &LandmarkKey) -> Option<&LandmarkSet> {
        HashMap::get(self, key)
    }
}

/// A [`LandmarkStore`] held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLandmarkStore {
    entries: HashMap<LandmarkKey, LandmarkSet>,
}

impl InMemoryLandmarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: LandmarkKey, landmarks: LandmarkSet) -> Option<LandmarkSet> {
        self.entries.insert(key, landmarks)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load an image landmark table. The first row for an image wins.
    pub fn from_image_records(
        records: &[Record],
        image_column: &str,
        catalog: &RegionCatalog,
    ) -> Self {
        let mut store = Self::new();
        for (row, record) in records.iter().enumerate() {
            let Some(image) = text_cell(record, image_column) else {
                log::warn!("landmark row {}: no '{}' value, skipped", row, image_column);
                continue;
            };
            store.load_row(LandmarkKey::Image(image), record, catalog, row);
        }
        store
    }

    /// Load one video's per-frame landmark table. Returns the number of
    /// frames that carried a face.
    pub fn add_video_records(
        &mut self,
        video: &str,
        records: &[Record],
        frame_column: &str,
        catalog: &RegionCatalog,
    ) -> usize {
        let before = self.len();
        for (row, record) in records.iter().enumerate() {
            let Some(frame) = number_cell(record, frame_column, None) else {
                log::warn!(
                    "{} landmark row {}: no '{}' value, skipped",
                    video,
                    row,
                    frame_column
                );
                continue;
            };
            let key = LandmarkKey::VideoFrame {
                video: video.to_string(),
                frame: frame.round() as i64,
            };
            self.load_row(key, record, catalog, row);
        }
        self.len() - before
    }

    fn load_row(&mut self, key: LandmarkKey, record: &Record, catalog: &RegionCatalog, row: usize) {
        if self.entries.contains_key(&key) {
            log::debug!("landmark row {}: duplicate {}, keeping the first", row, key);
            return;
        }
        match landmarks_from_record(record, catalog) {
            Ok(Some(landmarks)) => {
                self.entries.insert(key, landmarks);
            }
            Ok(None) => log::debug!("landmark row {}: no face for {}", row, key),
            Err(e) => log::warn!("landmark row {}: {} ({}), skipped", row, e, key),
        }
    }
}

impl LandmarkStore for InMemoryLandmarkStore {
    fn get(&self, key: &LandmarkKey) -> Option<&LandmarkSet> {
        self.entries.get(key)
    }
}

/// Read the 68 base landmarks of a table row laid out by `catalog`.
///
/// A row with every coordinate cell empty (a frame where no face was
/// detected) yields `Ok(None)`. A partially filled row is an error.
pub fn landmarks_from_record(
    record: &Record,
    catalog: &RegionCatalog,
) -> Result<Option<LandmarkSet>> {
    let mut slots: Vec<Option<Point>> = vec![None; BASE_LANDMARKS];
    let mut missing = Vec::new();

    for region in catalog.base_regions() {
        for i in 0..region.num_points() {
            let (x_col, y_col) = slot_columns(&region.name, i);
            let x = number_cell(record, &x_col, None);
            let y = number_cell(record, &y_col, None);
            match (x, y) {
                (Some(x), Some(y)) => slots[region.start + i] = Some(Point::new(x as f32, y as f32)),
                _ => missing.push(x_col),
            }
        }
    }

    if missing.len() == BASE_LANDMARKS {
        return Ok(None);
    }
    if let Some(first) = missing.first() {
        return Err(Error::UnsupportedShapeFormat(format!(
            "{} landmark cells missing, first at '{}'",
            missing.len(),
            first
        )));
    }

    let points: Vec<Point> = slots.into_iter().flatten().collect();
    LandmarkSet::try_from(Shape::new(points)).map(Some)
}
