//! CLI for adding facial AOI columns to eye-tracker fixation reports.
//!
//! Usage:
//!   gaze-aoi classify --fixations rows.json --landmarks table.json
//!   gaze-aoi classify --fixations rows.json --landmarks-dir videos/ --preset eyelink-video
//!   gaze-aoi regions --landmarks table.json -o regions.json
//!   gaze-aoi example-config > gaze-aoi.yaml

use clap::{Parser, Subcommand, ValueEnum};
use gaze_aoi::{
    landmarks_from_record, text_cell, write_outcome, Config, FixationEvaluator, FixationSample,
    InMemoryLandmarkStore, Point, Record, RegionCatalog, TrackerSchema, EXAMPLE_CONFIG,
};
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "gaze-aoi")]
#[command(author, version, about = "Facial AOI classification of gaze fixations", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add CURRENT_IA_* and CURRENT_Area_* columns to fixation rows
    Classify {
        /// Fixation rows (JSON array of objects)
        #[arg(long)]
        fixations: PathBuf,

        /// Image landmark table (JSON array of objects)
        #[arg(long, required_unless_present = "landmarks_dir", conflicts_with = "landmarks_dir")]
        landmarks: Option<PathBuf>,

        /// Directory of per-video landmark tables named `<video stem>.json`
        #[arg(long)]
        landmarks_dir: Option<PathBuf>,

        /// YAML configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Tracker layout, overriding the configured schema
        #[arg(long, value_enum)]
        preset: Option<Preset>,

        /// Landmark table column holding the image name
        #[arg(long, default_value = "Image_Name")]
        image_column: String,

        /// Landmark table column holding the video frame index
        #[arg(long, default_value = "Video_Frame_Index")]
        frame_column: String,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write transformed region polygons and areas for each landmark row
    Regions {
        /// Landmark table (JSON array of objects)
        #[arg(long)]
        landmarks: PathBuf,

        /// YAML configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Column identifying each landmark row
        #[arg(long, default_value = "Image_Name")]
        key_column: String,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print an example configuration file
    ExampleConfig,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Preset {
    EyelinkImage,
    TobiiImage,
    EyelinkVideo,
}

impl Preset {
    fn schema(self) -> TrackerSchema {
        match self {
            Self::EyelinkImage => TrackerSchema::eyelink_image(),
            Self::TobiiImage => TrackerSchema::tobii_image(),
            Self::EyelinkVideo => TrackerSchema::eyelink_video(),
        }
    }
}

fn main() {
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "info" };
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(filter));

    if let Err(e) = run(args.command) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Classify {
            fixations,
            landmarks,
            landmarks_dir,
            config,
            preset,
            image_column,
            frame_column,
            output,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(preset) = preset {
                config.schema = preset.schema();
            }
            let catalog = RegionCatalog::canonical();
            let evaluator = FixationEvaluator::new(catalog.clone(), &config)?;

            let mut rows = read_table(&fixations)?;
            log::info!("{} fixation rows from {}", rows.len(), fixations.display());

            let store = match (landmarks, landmarks_dir) {
                (Some(path), _) => {
                    let store = InMemoryLandmarkStore::from_image_records(
                        &read_table(&path)?,
                        &image_column,
                        &catalog,
                    );
                    log::info!("{} images with landmarks in {}", store.len(), path.display());
                    store
                }
                (None, Some(dir)) => {
                    let mut store = InMemoryLandmarkStore::new();
                    for video in config.schema.video_names(&rows) {
                        let path = dir.join(video_table_name(&video));
                        if !path.is_file() {
                            log::warn!("no landmark table for '{}' at {}", video, path.display());
                            continue;
                        }
                        let added = store.add_video_records(
                            &video,
                            &read_table(&path)?,
                            &frame_column,
                            &catalog,
                        );
                        log::info!("{}: {} frames with a face", video, added);
                    }
                    store
                }
                (None, None) => return Err("either --landmarks or --landmarks-dir is required".into()),
            };

            let samples: Vec<FixationSample> = rows
                .iter()
                .map(|row| config.schema.sample_from_record(row))
                .collect();
            let outcomes = evaluator.evaluate_batch(&samples, &store);
            for (row, outcome) in rows.iter_mut().zip(&outcomes) {
                write_outcome(row, outcome, &catalog);
            }

            write_table(output.as_deref(), &rows)
        }

        Command::Regions {
            landmarks,
            config,
            key_column,
            output,
        } => {
            let config = load_config(config.as_deref())?;
            let catalog = RegionCatalog::canonical();
            // Region tables stay in image coordinates.
            let evaluator =
                FixationEvaluator::new(catalog.clone(), &config)?.with_offset(Point::zero());

            let slot_headers = catalog.landmark_headers(&key_column);
            let area_headers = catalog.area_headers(&key_column);

            let mut out = Vec::new();
            for (row, record) in read_table(&landmarks)?.iter().enumerate() {
                let landmarks = match landmarks_from_record(record, &catalog) {
                    Ok(Some(landmarks)) => landmarks,
                    Ok(None) => {
                        log::debug!("row {}: no face", row);
                        continue;
                    }
                    Err(e) => {
                        log::warn!("row {}: {}, skipped", row, e);
                        continue;
                    }
                };
                let shape = match evaluator.region_polygons(&landmarks) {
                    Ok(shape) => shape,
                    Err(e) => {
                        log::warn!("row {}: {}, skipped", row, e);
                        continue;
                    }
                };

                let mut region_row = Record::new();
                let key = text_cell(record, &key_column).map_or(Value::Null, Value::from);
                region_row.insert(key_column.clone(), key);
                for (columns, p) in slot_headers[1..].chunks_exact(2).zip(shape.points()) {
                    region_row.insert(columns[0].clone(), Value::from(f64::from(p.x)));
                    region_row.insert(columns[1].clone(), Value::from(f64::from(p.y)));
                }
                for (column, (_, area)) in area_headers[1..].iter().zip(evaluator.region_areas(&shape)) {
                    region_row.insert(column.clone(), Value::from(f64::from(area)));
                }
                out.push(region_row);
            }
            log::info!("wrote regions for {} landmark rows", out.len());

            write_table(output.as_deref(), &out)
        }

        Command::ExampleConfig => {
            print!("{}", EXAMPLE_CONFIG);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> gaze_aoi::Result<Config> {
    match path {
        Some(path) => {
            log::debug!("loading config from {}", path.display());
            Config::from_file(path)
        }
        None => Ok(Config::default()),
    }
}

fn read_table(path: &Path) -> Result<Vec<Record>, Box<dyn std::error::Error>> {
    gaze_aoi::read_records(path).map_err(|e| format!("{}: {}", path.display(), e).into())
}

/// `clip01.mp4` is looked up as `clip01.json`.
fn video_table_name(video: &str) -> String {
    let stem = Path::new(video)
        .file_stem()
        .map_or_else(|| video.to_string(), |s| s.to_string_lossy().into_owned());
    format!("{}.json", stem)
}

fn write_table(path: Option<&Path>, rows: &[Record]) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(path) = path {
        gaze_aoi::write_records(path, rows)?;
        log::info!("output written to {}", path.display());
    } else {
        println!("{}", serde_json::to_string_pretty(rows)?);
    }
    Ok(())
}
