//! Run configuration: viewing setup, region growth, NonFace rule and the
//! tracker's column layout.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::catalog::RegionCatalog;
use crate::error::{Error, Result};
use crate::evaluator::NonFaceRule;
use crate::schema::TrackerSchema;
use crate::transform::{RegionTransform, RegionTransformer, ScreenGeometry};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub screen: ScreenGeometry,

    /// Growth applied to each named region. Regions not listed are left
    /// at their detected size.
    pub regions: BTreeMap<String, RegionTransform>,

    pub non_face_rule: NonFaceRule,

    pub schema: TrackerSchema,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            screen: ScreenGeometry::default(),
            regions: default_regions(),
            non_face_rule: NonFaceRule::default(),
            schema: TrackerSchema::default(),
        }
    }
}

/// Scale factors tuned for EyeLink and Tobii recordings of frontal faces.
fn default_regions() -> BTreeMap<String, RegionTransform> {
    [
        ("Face", 1.2, 1.2),
        ("LeftEyebrow", 1.2, 1.2),
        ("RightEyebrow", 1.2, 1.2),
        ("LeftEye", 1.5, 2.0),
        ("RightEye", 1.5, 2.0),
        ("Nose", 2.0, 1.2),
        ("Mouth", 1.3, 1.2),
    ]
    .into_iter()
    .map(|(name, x, y)| (name.to_string(), RegionTransform::Scale { x, y }))
    .collect()
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to a YAML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.screen.validate()?;
        for (name, transform) in &self.regions {
            transform.validate().map_err(|e| match e {
                Error::Config(msg) => Error::Config(format!("region '{}': {}", name, msg)),
                other => other,
            })?;
        }
        if self.schema.fix_x_column.is_empty() || self.schema.fix_y_column.is_empty() {
            return Err(Error::Config("fixation columns must be named".into()));
        }
        if !self.schema.offset.is_finite() {
            return Err(Error::Config("stimulus offset must be finite".into()));
        }
        Ok(())
    }

    /// Check that every configured transform names a region of `catalog`
    /// that the transformer acts on.
    pub fn validate_regions(&self, catalog: &RegionCatalog) -> Result<()> {
        for name in self.regions.keys() {
            let Some(region) = catalog.get(name) else {
                return Err(Error::Config(format!(
                    "transform for unknown region '{}'",
                    name
                )));
            };
            if !RegionTransformer::is_transformable(region) {
                return Err(Error::Config(format!(
                    "region '{}' is derived after transforms and cannot be scaled",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Gaze AOI configuration

# Viewing setup, used by visual-angle transforms and screen regions
screen:
  distance_mm: 600.0
  screen_w_px: 1920.0
  screen_h_px: 1080.0
  screen_w_mm: 531.0
  screen_h_mm: 299.0

# Region growth about each region's centroid.
# A visual-angle entry looks like:
#   Mouth: { mode: visual_angle, deg_x: 1.0, deg_y: 0.5 }
regions:
  Face: { mode: scale, x: 1.2, y: 1.2 }
  LeftEyebrow: { mode: scale, x: 1.2, y: 1.2 }
  RightEyebrow: { mode: scale, x: 1.2, y: 1.2 }
  LeftEye: { mode: scale, x: 1.5, y: 2.0 }
  RightEye: { mode: scale, x: 1.5, y: 2.0 }
  Nose: { mode: scale, x: 2.0, y: 1.2 }
  Mouth: { mode: scale, x: 1.3, y: 1.2 }

# whole_screen_minus_face or outside_facial_regions
non_face_rule: whole_screen_minus_face

# Tracker export layout (EyeLink image report)
schema:
  fix_x_column: CURRENT_FIX_X
  fix_y_column: CURRENT_FIX_Y
  key:
    kind: image
    column: image
  offset: { x: 0.0, y: 60.0 }
  missing_marker: "."
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::KeyColumns;

    #[test]
    fn example_config_is_the_default() {
        let config: Config = serde_yaml::from_str(EXAMPLE_CONFIG).unwrap();
        assert_eq!(config, Config::default());
        config.validate().unwrap();
        config.validate_regions(&RegionCatalog::canonical()).unwrap();
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let yaml = r#"
regions:
  Mouth: { mode: visual_angle, deg_x: 1.0, deg_y: 0.5 }
non_face_rule: outside_facial_regions
schema:
  fix_x_column: Fixation point X
  fix_y_column: Fixation point Y
  key: { kind: video, name_column: clip, frame_column: frame }
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.screen, ScreenGeometry::default());
        assert_eq!(config.regions.len(), 1);
        assert_eq!(
            config.regions["Mouth"],
            RegionTransform::VisualAngle {
                deg_x: 1.0,
                deg_y: 0.5
            }
        );
        assert_eq!(config.non_face_rule, NonFaceRule::OutsideFacialRegions);
        assert!(matches!(config.schema.key, KeyColumns::Video { .. }));
        // Fields left out of the schema come from the EyeLink preset.
        assert_eq!(config.schema.missing_marker.as_deref(), Some("."));
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = Config::default();
        config.screen.screen_w_mm = 0.0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = Config::default();
        config
            .regions
            .insert("Nose".into(), RegionTransform::Scale { x: -1.0, y: 1.0 });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Nose"));
    }

    #[test]
    fn rejects_unknown_and_derived_regions() {
        let catalog = RegionCatalog::canonical();

        let mut config = Config::default();
        config.regions.insert("Ear".into(), RegionTransform::IDENTITY);
        assert!(matches!(config.validate_regions(&catalog), Err(Error::Config(_))));

        let mut config = Config::default();
        config
            .regions
            .insert("Periocular".into(), RegionTransform::Scale { x: 1.1, y: 1.1 });
        assert!(matches!(config.validate_regions(&catalog), Err(Error::Config(_))));
    }

    #[test]
    fn file_round_trip() {
        let path = std::env::temp_dir().join(format!("gaze-aoi-config-{}.yaml", std::process::id()));
        let mut config = Config::default();
        config.non_face_rule = NonFaceRule::OutsideFacialRegions;
        config.to_file(&path).unwrap();
        let loaded = Config::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
