use crate::FEATURE_EXTENSIONS;
use crate::analyzer::energy::BeatFeatures;
use crate::analyzer::frames::FrameFeatures;
use crate::models::BeatRecord;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum InputError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed {shape} feature file {path}: {source}")]
    Json {
        path: String,
        shape: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("Path not found: {0}")]
    NotFound(String),
}

/// Features for one track in any of the supported shapes.
///
/// A JSON document is read as `Records` when it has a `beats` key, as
/// `Frames` when it has a `frames` key, and as `Beats` otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TrackFeatures {
    /// Explicit per-beat records with their own start/end times.
    Records { beats: Vec<BeatRecord> },
    /// Frame-level features plus detected beat times.
    Frames {
        beat_times: Vec<f64>,
        frames: FrameFeatures,
    },
    /// Per-beat parallel arrays.
    Beats(BeatFeatures),
}

#[derive(Deserialize)]
struct RecordsFile {
    beats: Vec<BeatRecord>,
}

#[derive(Deserialize)]
struct FramesFile {
    beat_times: Vec<f64>,
    frames: FrameFeatures,
}

impl TrackFeatures {
    /// Parse a feature document, picking the shape from its top-level keys so
    /// that errors name the missing or mistyped field.
    pub fn from_json(json: &str, origin: &str) -> Result<Self, InputError> {
        let error = |shape| json_error(origin, shape);

        let value: serde_json::Value = serde_json::from_str(json).map_err(error("JSON"))?;
        if value.get("beats").is_some() {
            let file: RecordsFile = serde_json::from_value(value).map_err(error("beat-record"))?;
            Ok(Self::Records { beats: file.beats })
        } else if value.get("frames").is_some() {
            let file: FramesFile = serde_json::from_value(value).map_err(error("frame-level"))?;
            Ok(Self::Frames {
                beat_times: file.beat_times,
                frames: file.frames,
            })
        } else {
            let beats: BeatFeatures = serde_json::from_value(value).map_err(error("per-beat"))?;
            Ok(Self::Beats(beats))
        }
    }
}

fn json_error(origin: &str, shape: &'static str) -> impl FnOnce(serde_json::Error) -> InputError {
    move |source| InputError::Json {
        path: origin.to_string(),
        shape,
        source,
    }
}

/// Read and parse a feature file.
pub fn load_track_features(path: &Path) -> Result<TrackFeatures, InputError> {
    let contents = std::fs::read_to_string(path).map_err(|source| InputError::Io {
        path: path.display().to_string(),
        source,
    })?;
    TrackFeatures::from_json(&contents, &path.display().to_string())
}

/// Expand files and directories into a sorted list of feature files.
/// Directories are walked recursively (following links) for known extensions.
pub fn discover_feature_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>, InputError> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            files.push(path.clone());
            continue;
        }
        if !path.is_dir() {
            return Err(InputError::NotFound(path.display().to_string()));
        }

        for entry in WalkDir::new(path).follow_links(true).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let ext = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("")
                .to_lowercase();
            if FEATURE_EXTENSIONS.contains(&ext.as_str()) {
                files.push(entry.into_path());
            }
        }
    }

    files.sort();
    files.dedup();
    log::debug!("Discovered {} feature files", files.len());
    Ok(files)
}
