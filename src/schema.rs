//! Mapping from an eye-tracker export's columns to fixation samples.
//!
//! Trackers differ in what they call the fixation coordinates, how they
//! identify the stimulus, and where the stimulus sits on screen. All of that
//! is data in a [`TrackerSchema`]; the evaluation pipeline is the same.

use serde::{Deserialize, Serialize};

use crate::catalog::RegionCatalog;
use crate::evaluator::{AoiResult, FixationSample, RowOutcome};
use crate::record::{number_cell, text_cell, Record};
use crate::store::LandmarkKey;
use crate::types::Point;

/// Columns identifying the landmark set for a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KeyColumns {
    Image { column: String },
    Video { name_column: String, frame_column: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerSchema {
    pub fix_x_column: String,
    pub fix_y_column: String,
    pub key: KeyColumns,
    /// Where the stimulus' top-left corner sits on the tracker screen.
    pub offset: Point,
    /// Cell text the tracker writes for "no value".
    pub missing_marker: Option<String>,
}

impl TrackerSchema {
    /// EyeLink Data Viewer fixation report over still images.
    pub fn eyelink_image() -> Self {
        Self {
            fix_x_column: "CURRENT_FIX_X".into(),
            fix_y_column: "CURRENT_FIX_Y".into(),
            key: KeyColumns::Image {
                column: "image".into(),
            },
            offset: Point::new(0.0, 60.0),
            missing_marker: Some(".".into()),
        }
    }

    /// EyeLink Data Viewer fixation report over video stimuli.
    pub fn eyelink_video() -> Self {
        Self {
            key: KeyColumns::Video {
                name_column: "VIDEO_NAME_END".into(),
                frame_column: "VIDEO_FRAME_INDEX_END".into(),
            },
            ..Self::eyelink_image()
        }
    }

    /// Tobii Pro Lab data export over still images.
    pub fn tobii_image() -> Self {
        Self {
            fix_x_column: "Fixation point X".into(),
            fix_y_column: "Fixation point Y".into(),
            key: KeyColumns::Image {
                column: "Presented Media name".into(),
            },
            offset: Point::zero(),
            missing_marker: None,
        }
    }

    /// Parse one fixation row.
    pub fn sample_from_record(&self, record: &Record) -> FixationSample {
        let marker = self.missing_marker.as_deref();
        let key = match &self.key {
            KeyColumns::Image { column } => self.key_cell(record, column).map(LandmarkKey::Image),
            KeyColumns::Video {
                name_column,
                frame_column,
            } => match (
                self.key_cell(record, name_column),
                number_cell(record, frame_column, marker),
            ) {
                (Some(video), Some(frame)) => Some(LandmarkKey::VideoFrame {
                    video,
                    frame: frame.round() as i64,
                }),
                _ => None,
            },
        };

        FixationSample {
            x: number_cell(record, &self.fix_x_column, marker),
            y: number_cell(record, &self.fix_y_column, marker),
            key,
        }
    }

    /// Distinct video names referenced by `records`, in order of appearance.
    /// Empty for image schemas.
    pub fn video_names(&self, records: &[Record]) -> Vec<String> {
        let KeyColumns::Video { name_column, .. } = &self.key else {
            return Vec::new();
        };
        let mut names: Vec<String> = Vec::new();
        for record in records {
            if let Some(name) = self.key_cell(record, name_column) {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    fn key_cell(&self, record: &Record, column: &str) -> Option<String> {
        text_cell(record, column).filter(|s| Some(s.as_str()) != self.missing_marker.as_deref())
    }
}

impl Default for TrackerSchema {
    fn default() -> Self {
        Self::eyelink_image()
    }
}

/// Append the AOI columns for `outcome` to a fixation row.
///
/// Skipped rows are left untouched. Failed rows get the same zeroed
/// columns as a lookup miss.
pub fn write_outcome(record: &mut Record, outcome: &RowOutcome, catalog: &RegionCatalog) {
    let empty;
    let result = match outcome {
        RowOutcome::Skipped => return,
        RowOutcome::Evaluated(result) => result,
        RowOutcome::Failed { .. } => {
            empty = AoiResult::empty(catalog);
            &empty
        }
    };
    for (column, value) in result.column_values() {
        record.insert(column, value);
    }
}
