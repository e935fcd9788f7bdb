//! Region catalog: the schema of every named area of interest.
//!
//! A catalog maps region names to index ranges inside an [`ExtendedShape`].
//! Base regions are sliced straight out of the 68 detector landmarks;
//! composite regions occupy the slots after them and are computed from other
//! regions or from the screen geometry.
//!
//! The same catalog drives both the detection side (column headers for
//! landmark and area tables) and the classification side (region lookups),
//! so the two can never disagree about layout.
//!
//! [`ExtendedShape`]: crate::ExtendedShape

use std::collections::HashSet;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Number of points produced by the landmark detector.
pub const BASE_LANDMARKS: usize = 68;

/// Every composite region is stored as a four-corner rectangle.
pub const COMPOSITE_POINTS: usize = 4;

/// Version of the layout returned by [`RegionCatalog::canonical`].
pub const CANONICAL_VERSION: u32 = 1;

/// Which part of the screen a screen region covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScreenPart {
    Left,
    Right,
    Whole,
}

/// How a composite region gets its geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CompositeKind {
    /// Bounding box of all base landmarks, extended upward by the height of
    /// the named jaw region to cover the forehead.
    Face { jaw: String },
    /// Bounding box of the union of the (already transformed) source regions.
    Bounds { sources: Vec<String> },
    /// Fixed rectangle derived from the screen pixel size.
    Screen(ScreenPart),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RegionKind {
    Base,
    Composite(CompositeKind),
}

/// A named, fixed-size slice of an extended shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionDefinition {
    pub name: String,
    pub start: usize,
    pub end: usize,
    pub kind: RegionKind,
}

impl RegionDefinition {
    pub fn base(name: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            name: name.into(),
            start,
            end,
            kind: RegionKind::Base,
        }
    }

    pub fn composite(name: impl Into<String>, start: usize, kind: CompositeKind) -> Self {
        Self {
            name: name.into(),
            start,
            end: start + COMPOSITE_POINTS,
            kind: RegionKind::Composite(kind),
        }
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn num_points(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_base(&self) -> bool {
        matches!(self.kind, RegionKind::Base)
    }

    pub fn composite_kind(&self) -> Option<&CompositeKind> {
        match &self.kind {
            RegionKind::Composite(kind) => Some(kind),
            RegionKind::Base => None,
        }
    }
}

/// A validated, versioned set of region definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionCatalog {
    version: u32,
    regions: Vec<RegionDefinition>,
}

impl RegionCatalog {
    /// The iBUG 68-point layout plus face, periocular and screen composites.
    ///
    /// | slots  | region       |
    /// |--------|--------------|
    /// | 0..17  | Jaw          |
    /// | 17..22 | RightEyebrow |
    /// | 22..27 | LeftEyebrow  |
    /// | 27..36 | Nose         |
    /// | 36..42 | RightEye     |
    /// | 42..48 | LeftEye      |
    /// | 48..68 | Mouth        |
    /// | 68..72 | Face         |
    /// | 72..76 | Periocular   |
    /// | 76..80 | LeftScreen   |
    /// | 80..84 | RightScreen  |
    /// | 84..88 | WholeScreen  |
    pub fn canonical() -> Self {
        let periocular_sources = ["LeftEyebrow", "RightEyebrow", "LeftEye", "RightEye"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        Self {
            version: CANONICAL_VERSION,
            regions: vec![
                RegionDefinition::base("Jaw", 0, 17),
                RegionDefinition::base("RightEyebrow", 17, 22),
                RegionDefinition::base("LeftEyebrow", 22, 27),
                RegionDefinition::base("Nose", 27, 36),
                RegionDefinition::base("RightEye", 36, 42),
                RegionDefinition::base("LeftEye", 42, 48),
                RegionDefinition::base("Mouth", 48, 68),
                RegionDefinition::composite(
                    "Face",
                    68,
                    CompositeKind::Face { jaw: "Jaw".into() },
                ),
                RegionDefinition::composite(
                    "Periocular",
                    72,
                    CompositeKind::Bounds {
                        sources: periocular_sources,
                    },
                ),
                RegionDefinition::composite("LeftScreen", 76, CompositeKind::Screen(ScreenPart::Left)),
                RegionDefinition::composite("RightScreen", 80, CompositeKind::Screen(ScreenPart::Right)),
                RegionDefinition::composite("WholeScreen", 84, CompositeKind::Screen(ScreenPart::Whole)),
            ],
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn regions(&self) -> &[RegionDefinition] {
        &self.regions
    }

    pub fn get(&self, name: &str) -> Option<&RegionDefinition> {
        self.regions.iter().find(|r| r.name == name)
    }

    /// Length of the extended shape this catalog describes.
    pub fn extended_len(&self) -> usize {
        self.regions.iter().map(|r| r.end).max().unwrap_or(0)
    }

    pub fn base_regions(&self) -> impl Iterator<Item = &RegionDefinition> {
        self.regions.iter().filter(|r| r.is_base())
    }

    /// The region holding the face box.
    pub fn face_region(&self) -> Option<&RegionDefinition> {
        self.regions
            .iter()
            .find(|r| matches!(r.composite_kind(), Some(CompositeKind::Face { .. })))
    }

    pub fn screen_region(&self, part: ScreenPart) -> Option<&RegionDefinition> {
        self.regions
            .iter()
            .find(|r| r.composite_kind() == Some(&CompositeKind::Screen(part)))
    }

    /// Check the layout once before any rows are processed.
    pub fn validate(&self) -> Result<()> {
        if self.regions.is_empty() {
            return Err(Error::InvalidCatalog("catalog has no regions".into()));
        }

        let mut names = HashSet::new();
        for region in &self.regions {
            if region.name.is_empty() {
                return Err(Error::InvalidCatalog("region with empty name".into()));
            }
            if !names.insert(region.name.as_str()) {
                return Err(Error::InvalidCatalog(format!(
                    "duplicate region name '{}'",
                    region.name
                )));
            }
            if region.start >= region.end {
                return Err(Error::InvalidCatalog(format!(
                    "region '{}' has empty range {}..{}",
                    region.name, region.start, region.end
                )));
            }
            match &region.kind {
                RegionKind::Base if region.end > BASE_LANDMARKS => {
                    return Err(Error::InvalidCatalog(format!(
                        "base region '{}' extends past landmark {}",
                        region.name, BASE_LANDMARKS
                    )));
                }
                RegionKind::Composite(_) if region.start < BASE_LANDMARKS => {
                    return Err(Error::InvalidCatalog(format!(
                        "composite region '{}' overlaps the detector landmarks",
                        region.name
                    )));
                }
                RegionKind::Composite(_) if region.num_points() != COMPOSITE_POINTS => {
                    return Err(Error::InvalidCatalog(format!(
                        "composite region '{}' must have {} points, has {}",
                        region.name,
                        COMPOSITE_POINTS,
                        region.num_points()
                    )));
                }
                _ => {}
            }
        }

        // Ranges must tile 0..len with no gaps and no overlap.
        let mut ranges: Vec<&RegionDefinition> = self.regions.iter().collect();
        ranges.sort_by_key(|r| r.start);
        let mut cursor = 0;
        for region in ranges {
            if region.start < cursor {
                return Err(Error::InvalidCatalog(format!(
                    "region '{}' overlaps index {}",
                    region.name, region.start
                )));
            }
            if region.start > cursor {
                return Err(Error::InvalidCatalog(format!(
                    "indices {}..{} are not covered by any region",
                    cursor, region.start
                )));
            }
            cursor = region.end;
        }
        if cursor < BASE_LANDMARKS {
            return Err(Error::InvalidCatalog(format!(
                "base regions cover only {} of {} landmarks",
                cursor, BASE_LANDMARKS
            )));
        }

        for region in &self.regions {
            match region.composite_kind() {
                Some(CompositeKind::Face { jaw }) => self.require_base(&region.name, jaw)?,
                Some(CompositeKind::Bounds { sources }) => {
                    if sources.is_empty() {
                        return Err(Error::InvalidCatalog(format!(
                            "bounds region '{}' has no sources",
                            region.name
                        )));
                    }
                    for source in sources {
                        self.require_base(&region.name, source)?;
                    }
                }
                _ => {}
            }
        }

        self.require_unique("face", |k| matches!(k, CompositeKind::Face { .. }))?;
        self.require_unique("whole screen", |k| {
            *k == CompositeKind::Screen(ScreenPart::Whole)
        })?;

        Ok(())
    }

    fn require_base(&self, owner: &str, name: &str) -> Result<()> {
        match self.get(name) {
            Some(r) if r.is_base() => Ok(()),
            Some(_) => Err(Error::InvalidCatalog(format!(
                "region '{}' refers to '{}', which is not a base region",
                owner, name
            ))),
            None => Err(Error::InvalidCatalog(format!(
                "region '{}' refers to undefined region '{}'",
                owner, name
            ))),
        }
    }

    fn require_unique<F>(&self, what: &str, pred: F) -> Result<()>
    where
        F: Fn(&CompositeKind) -> bool,
    {
        let count = self
            .regions
            .iter()
            .filter_map(|r| r.composite_kind())
            .filter(|k| pred(k))
            .count();
        if count == 1 {
            Ok(())
        } else {
            Err(Error::InvalidCatalog(format!(
                "expected exactly one {} region, found {}",
                what, count
            )))
        }
    }

    /// Column headers for a landmark table: the key column followed by
    /// `{Region}_{i}_X`, `{Region}_{i}_Y` for every slot of the extended shape.
    pub fn landmark_headers(&self, key_column: &str) -> Vec<String> {
        let mut headers = Vec::with_capacity(1 + self.extended_len() * 2);
        headers.push(key_column.to_string());
        let mut ordered: Vec<&RegionDefinition> = self.regions.iter().collect();
        ordered.sort_by_key(|r| r.start);
        for region in ordered {
            for i in 0..region.num_points() {
                let (x, y) = slot_columns(&region.name, i);
                headers.push(x);
                headers.push(y);
            }
        }
        headers
    }

    /// Column headers for a region area table.
    pub fn area_headers(&self, key_column: &str) -> Vec<String> {
        std::iter::once(key_column.to_string())
            .chain(self.regions.iter().map(|r| format!("{}_Area", r.name)))
            .collect()
    }
}

impl Default for RegionCatalog {
    fn default() -> Self {
        Self::canonical()
    }
}

/// Column names holding the x and y coordinate of slot `i` of a region.
pub fn slot_columns(region: &str, i: usize) -> (String, String) {
    (format!("{region}_{i}_X"), format!("{region}_{i}_Y"))
}

/// Builder for custom catalogs.
pub struct RegionCatalogBuilder {
    version: u32,
    regions: Vec<RegionDefinition>,
}

impl RegionCatalogBuilder {
    pub fn new() -> Self {
        Self {
            version: CANONICAL_VERSION,
            regions: Vec::new(),
        }
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn region(mut self, region: RegionDefinition) -> Self {
        self.regions.push(region);
        self
    }

    /// Build and validate the catalog.
    pub fn build(self) -> Result<RegionCatalog> {
        let catalog = RegionCatalog {
            version: self.version,
            regions: self.regions,
        };
        catalog.validate()?;
        Ok(catalog)
    }
}

impl Default for RegionCatalogBuilder {
    fn default() -> Self {
        Self::new()
    }
}
