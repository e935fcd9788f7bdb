//! # gaze-aoi
//!
//! Facial Areas-of-Interest from 68-point landmarks, and classification of
//! eye-tracker fixations against them.
//!
//! This crate provides:
//! - **Region catalog**: the iBUG 68-point regions plus composite face,
//!   periocular and screen regions laid out in one 88-point extended shape
//! - **Transforms**: centroid-preserving scaling and visual-angle enlargement
//! - **Classification**: convex-hull containment and area for every region,
//!   with a derived NonFace flag
//! - **Batch evaluation**: tracker rows in, AOI columns out
//!
//! ## Pipeline
//!
//! 1. Normalize detector output into a 68-point [`LandmarkSet`]
//! 2. Build the [`ExtendedShape`] (landmarks plus face box)
//! 3. Grow regions with the configured [`RegionTransform`]s
//! 4. Resolve periocular and screen regions
//! 5. Classify the rounded fixation point against every region
//!
//! ## Quick Start
//!
//! ```rust
//! use gaze_aoi::{
//!     reference_face, BoundingBox, Config, FixationEvaluator, FixationSample,
//!     InMemoryLandmarkStore, LandmarkKey, RegionCatalog, RowOutcome,
//! };
//!
//! let evaluator = FixationEvaluator::new(RegionCatalog::canonical(), &Config::default()).unwrap();
//!
//! // Landmarks would normally come from a detector's output table.
//! let mut store = InMemoryLandmarkStore::new();
//! let face = reference_face(&BoundingBox::new(800.0, 300.0, 300.0, 300.0)).unwrap();
//! store.insert(LandmarkKey::Image("face01.jpg".into()), face);
//!
//! let sample = FixationSample::image(5.0, 5.0, "face01.jpg");
//! match evaluator.evaluate(&sample, &store) {
//!     RowOutcome::Evaluated(result) => assert!(result.non_face),
//!     other => panic!("unexpected outcome {:?}", other),
//! }
//! ```

mod catalog;
mod composite;
mod config;
mod error;
mod evaluator;
mod extended;
mod normalize;
mod polygon;
mod record;
mod reference;
mod schema;
mod store;
mod transform;
mod types;

pub use catalog::{
    slot_columns, CompositeKind, RegionCatalog, RegionCatalogBuilder, RegionDefinition,
    RegionKind, ScreenPart, BASE_LANDMARKS, CANONICAL_VERSION, COMPOSITE_POINTS,
};
pub use composite::{screen_rect, CompositeRegionResolver};
pub use config::{Config, EXAMPLE_CONFIG};
pub use error::{Error, Result};
pub use evaluator::{
    output_columns, AoiResult, FixationEvaluator, FixationSample, NonFaceRule, RegionHit,
    RowOutcome, NON_FACE,
};
pub use extended::{face_box, ExtendedShape};
pub use normalize::{normalize, LandmarkInput, LandmarkProvider, LandmarkSet};
pub use polygon::{classify, convex_hull, hull_area, polygon_area, Classification};
pub use record::{number_cell, read_records, text_cell, write_records, Record};
pub use reference::reference_face;
pub use schema::{write_outcome, KeyColumns, TrackerSchema};
pub use store::{landmarks_from_record, InMemoryLandmarkStore, LandmarkKey, LandmarkStore};
pub use transform::{
    enlarge_by_visual_angle, scale, visual_angle_factors, RegionTransform, RegionTransformer,
    ScreenGeometry, DEGENERATE_EXTENT,
};
pub use types::{centroid, BoundingBox, Point, Shape};
