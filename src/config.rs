use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value} ({reason})")]
    OutOfRange {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Application configuration loaded from TOML config file.
/// All fields have defaults; the config file is optional.
#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Number of parallel workers for batch analysis. 0 = auto-detect (cores / 2, min 1).
    pub workers: usize,
    /// Pipeline parameters.
    pub segmentation: SegmentationConfig,
}

/// Weights of the normalized features in the composite energy score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergyWeights {
    pub rms: f64,
    pub spectral_centroid: f64,
    /// Inert by default; kept so the term can be switched on without code changes.
    pub zero_crossing_rate: f64,
}

impl Default for EnergyWeights {
    fn default() -> Self {
        Self {
            rms: 0.5,
            spectral_centroid: 0.5,
            zero_crossing_rate: 0.0,
        }
    }
}

/// Parameters of the segmentation and transition pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Classifier split point as a fraction (0.5 = median).
    pub threshold_percentile: f64,
    /// Width of the hysteresis bands around the median, as a fraction of it.
    pub hysteresis_factor: f64,
    /// Minimum neighborhood length in seconds enforced by merging.
    pub min_section_duration: f64,
    /// Minimum |relative change| against the baseline to flag a transition.
    pub spike_threshold: f64,
    /// Number of preceding beats averaged into the transition baseline.
    pub lookback_window: usize,
    /// Minimum spacing in seconds between kept transitions.
    pub min_time_gap: f64,
    pub weights: EnergyWeights,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            threshold_percentile: 0.5,
            hysteresis_factor: 0.15,
            min_section_duration: 8.0,
            spike_threshold: 0.3,
            lookback_window: 3,
            min_time_gap: 5.0,
            weights: EnergyWeights::default(),
        }
    }
}

impl SegmentationConfig {
    /// Reject parameter values the pipeline has no defined behavior for.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.threshold_percentile) {
            return Err(ConfigError::OutOfRange {
                name: "threshold_percentile",
                value: self.threshold_percentile,
                reason: "must be within [0, 1]",
            });
        }
        if self.lookback_window == 0 {
            return Err(ConfigError::OutOfRange {
                name: "lookback_window",
                value: 0.0,
                reason: "must be at least 1 beat",
            });
        }

        let non_negative = [
            ("hysteresis_factor", self.hysteresis_factor),
            ("min_section_duration", self.min_section_duration),
            ("spike_threshold", self.spike_threshold),
            ("min_time_gap", self.min_time_gap),
            ("weights.rms", self.weights.rms),
            ("weights.spectral_centroid", self.weights.spectral_centroid),
            ("weights.zero_crossing_rate", self.weights.zero_crossing_rate),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::OutOfRange {
                    name,
                    value,
                    reason: "must be finite and non-negative",
                });
            }
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load config from `~/.config/songform/config.toml`.
    /// Returns default config if file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => match Self::load_from(&path) {
                Ok(config) => config,
                Err(e) => {
                    log::warn!("{}. Using defaults.", e);
                    Self::default()
                }
            },
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Load config from an explicit path. Unlike `load`, a missing or
    /// malformed file is an error.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = toml::from_str::<AppConfig>(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Resolve worker count: 0 → auto-detect (cores / 2, min 1).
    pub fn resolve_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            let cores = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2);
            (cores / 2).max(1)
        }
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
