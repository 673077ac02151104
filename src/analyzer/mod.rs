pub mod energy;
pub mod frames;
pub mod hysteresis;
pub mod neighborhoods;
pub mod summary;
pub mod transitions;

use crate::config::{ConfigError, SegmentationConfig};
use crate::input::{self, InputError, TrackFeatures};
use crate::models::{BeatSegment, Neighborhood, ScoredBeat, Transition};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use summary::{FeatureSummary, NeighborhoodStats};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error("Feature length mismatch: {feature} has {actual} values, expected {expected}")]
    LengthMismatch {
        feature: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("Invalid frame features: {0}")]
    InvalidFrames(String),
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Input error: {0}")]
    Input(#[from] InputError),
}

/// Full segmentation result for one track.
#[derive(Debug, Clone, Serialize)]
pub struct TrackAnalysis {
    /// Beats with smoothed labels; the classifier's label is kept as `raw_classification`.
    pub beats: Vec<BeatSegment>,
    pub neighborhoods: Vec<Neighborhood>,
    /// Refined transitions, time-ascending.
    pub transitions: Vec<Transition>,
    pub stats: NeighborhoodStats,
    pub features: FeatureSummary,
}

impl TrackAnalysis {
    /// `(id, start, end)` for each neighborhood, for timing downstream effects.
    pub fn section_times(&self) -> Vec<(usize, f64, f64)> {
        self.neighborhoods
            .iter()
            .map(|n| (n.id, n.start_time, n.end_time))
            .collect()
    }
}

/// Run the full pipeline on one track's features.
pub fn analyze_track(
    features: &TrackFeatures,
    config: &SegmentationConfig,
) -> Result<TrackAnalysis, AnalyzeError> {
    config.validate()?;

    let scored = match features {
        TrackFeatures::Beats(beats) => energy::score_beats(beats, &config.weights)?,
        TrackFeatures::Records { beats } => energy::score_records(beats, &config.weights),
        TrackFeatures::Frames { beat_times, frames } => {
            let aggregated = frames::aggregate_beats(frames, beat_times)?;
            energy::score_records_with_maxima(
                &aggregated.records,
                &aggregated.maxima,
                &config.weights,
            )
        }
    };

    Ok(segment_scored_beats(&scored, config))
}

/// Classify, smooth, group, merge and detect transitions on scored beats.
///
/// Both branches read the classifier output: neighborhoods after hysteresis,
/// transitions before it.
pub fn segment_scored_beats(scored: &[ScoredBeat], config: &SegmentationConfig) -> TrackAnalysis {
    let classified = energy::classify(scored, config.threshold_percentile);
    let smoothed = hysteresis::apply_hysteresis(&classified, config.hysteresis_factor);
    log::debug!(
        "Hysteresis: {} raw flips → {} smoothed flips",
        hysteresis::count_flips(classified.iter().map(|s| s.classification)),
        hysteresis::count_flips(smoothed.iter().map(|s| s.classification))
    );

    let initial = neighborhoods::build_neighborhoods(&smoothed);
    let merged = neighborhoods::merge_short_neighborhoods(&initial, config.min_section_duration);

    let candidates = transitions::detect_transitions(
        &classified,
        config.spike_threshold,
        config.lookback_window,
    );
    let refined = transitions::refine_transitions(&candidates, config.min_time_gap);

    log::debug!(
        "{} beats → {} runs → {} neighborhoods; {} → {} transitions",
        smoothed.len(),
        initial.len(),
        merged.len(),
        candidates.len(),
        refined.len()
    );

    TrackAnalysis {
        stats: NeighborhoodStats::from_neighborhoods(&merged),
        features: FeatureSummary::from_segments(&smoothed),
        beats: smoothed,
        neighborhoods: merged,
        transitions: refined,
    }
}

/// Load and analyze one feature file.
pub fn analyze_file(
    path: &Path,
    config: &SegmentationConfig,
) -> Result<TrackAnalysis, AnalyzeError> {
    log::debug!(
        "Analyzing: {}",
        path.file_name().and_then(|f| f.to_str()).unwrap_or("?")
    );
    let features = input::load_track_features(path)?;
    analyze_track(&features, config)
}

/// Result of a batch run: successful analyses in input order plus a failure count.
pub struct BatchResult {
    pub analyses: Vec<(PathBuf, TrackAnalysis)>,
    pub failed: u64,
}

/// Analyze many feature files in parallel on a rayon pool of `jobs` threads.
///
/// Each track is still processed sequentially; only whole tracks run side by
/// side. A failing file is logged and counted, the rest of the batch continues.
pub fn analyze_files(
    paths: &[PathBuf],
    config: &SegmentationConfig,
    jobs: usize,
    show_progress: bool,
) -> Result<BatchResult, AnalyzeError> {
    config.validate()?;

    if paths.is_empty() {
        log::info!("No feature files to analyze");
        return Ok(BatchResult {
            analyses: Vec::new(),
            failed: 0,
        });
    }

    log::info!("Analyzing {} feature files with {} workers", paths.len(), jobs);

    let pb = if show_progress {
        let pb = ProgressBar::new(paths.len() as u64);
        if let Ok(style) =
            ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    } else {
        ProgressBar::hidden()
    };

    let results: Vec<Result<TrackAnalysis, AnalyzeError>> =
        match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
            Ok(pool) => pool.install(|| {
                use rayon::prelude::*;
                paths
                    .par_iter()
                    .map(|path| {
                        let result = analyze_file(path, config);
                        pb.inc(1);
                        result
                    })
                    .collect()
            }),
            Err(e) => {
                log::warn!("Thread pool unavailable ({}), analyzing sequentially", e);
                paths
                    .iter()
                    .map(|path| {
                        let result = analyze_file(path, config);
                        pb.inc(1);
                        result
                    })
                    .collect()
            }
        };

    let mut analyses = Vec::with_capacity(paths.len());
    let mut failed: u64 = 0;
    for (path, result) in paths.iter().zip(results) {
        match result {
            Ok(analysis) => {
                log::info!(
                    "{}: {} neighborhoods, {} transitions",
                    path.display(),
                    analysis.neighborhoods.len(),
                    analysis.transitions.len()
                );
                analyses.push((path.clone(), analysis));
            }
            Err(e) => {
                log::warn!("Analysis failed for {}: {}", path.display(), e);
                failed += 1;
            }
        }
    }

    pb.finish_with_message(format!("Done: {} analyzed, {} failed", analyses.len(), failed));

    Ok(BatchResult { analyses, failed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::energy::BeatFeatures;
    use crate::models::{EnergyClass, MusicalTransition, TransitionType};

    /// Beats at 1s spacing with rms = centroid = `levels`, so energy ∝ level.
    fn track(levels: &[f64]) -> TrackFeatures {
        TrackFeatures::Beats(BeatFeatures {
            beat_times: (0..levels.len()).map(|i| i as f64).collect(),
            rms: levels.to_vec(),
            spectral_centroid: levels.to_vec(),
            zero_crossing_rate: vec![0.0; levels.len()],
        })
    }

    fn config(hysteresis: f64, min_section: f64) -> SegmentationConfig {
        SegmentationConfig {
            hysteresis_factor: hysteresis,
            min_section_duration: min_section,
            ..Default::default()
        }
    }

    #[test]
    fn test_pipeline_alternating_sections() {
        let analysis = analyze_track(
            &track(&[0.2, 0.2, 0.9, 0.9, 0.1, 0.1, 0.8, 0.8]),
            &config(0.0, 0.0),
        )
        .unwrap();
        use EnergyClass::{HighEnergy as H, LowEnergy as L};
        let labels: Vec<EnergyClass> = analysis.neighborhoods.iter().map(|n| n.classification).collect();
        assert_eq!(labels, vec![L, H, L, H]);
        assert!(analysis.neighborhoods.iter().all(|n| n.segments.len() == 2));
        assert_eq!(analysis.stats.total, 4);
        assert_eq!(
            analysis.section_times(),
            vec![(1, 0.0, 2.0), (2, 2.0, 4.0), (3, 4.0, 6.0), (4, 6.0, 8.0)]
        );
    }

    #[test]
    fn test_pipeline_floor_median_makes_everything_high() {
        // The median equals the quiet level and HIGH is inclusive, so the
        // quiet-loud-quiet shape collapses into one HIGH section
        let analysis = analyze_track(
            &track(&[0.1, 0.1, 0.9, 0.9, 0.1, 0.1]),
            &SegmentationConfig::default(),
        )
        .unwrap();
        assert!(analysis.beats.iter().all(|b| b.raw_classification == EnergyClass::HighEnergy));
        assert!(analysis.beats.iter().all(|b| b.classification == EnergyClass::HighEnergy));
        assert_eq!(analysis.neighborhoods.len(), 1);
        assert_eq!(analysis.section_times(), vec![(1, 0.0, 6.0)]);
        assert_eq!(analysis.stats.high_energy_count, 1);
        assert_eq!(analysis.stats.low_energy_count, 0);

        // The jump itself is still reported; the falls after it are too close
        assert_eq!(analysis.transitions.len(), 1);
        assert_eq!(analysis.transitions[0].transition_type, TransitionType::Spike);
        assert_eq!(analysis.transitions[0].time, 3.0);
    }

    #[test]
    fn test_frame_input_normalizes_against_frame_maxima() {
        // 100 frames/s; one loud frame in beat 1 sets the rms max
        let mut rms = vec![0.1; 400];
        rms[150] = 1.0;
        let features = TrackFeatures::Frames {
            beat_times: vec![0.0, 1.0, 2.0, 3.0],
            frames: frames::FrameFeatures {
                sample_rate: 51_200,
                hop_length: 512,
                rms,
                spectral_centroid: vec![1500.0; 400],
                zero_crossing_rate: vec![0.0; 400],
            },
        };
        let analysis = analyze_track(&features, &SegmentationConfig::default()).unwrap();
        assert_eq!(analysis.beats.len(), 3);

        let center_weight = 1.0 / (-4..=4).map(|x: i32| (-0.5 * (x * x) as f64).exp()).sum::<f64>();
        let peak = 0.1 + 0.9 * center_weight;
        let expected = [0.5 * 0.1 / peak + 0.5, 0.5 * 0.109 / peak + 0.5, 0.5 * 0.1 / peak + 0.5];
        for (beat, want) in analysis.beats.iter().zip(expected) {
            assert!((beat.energy - want).abs() < 1e-9, "{} vs {}", beat.energy, want);
        }
        // Normalizing by the beat means would have put beat 1 at exactly 1.0
        assert!(analysis.beats[1].energy < 0.7);
    }

    #[test]
    fn test_pipeline_partition_with_merging() {
        let levels: Vec<f64> = (0..64)
            .map(|i| 0.3 + 0.5 * ((i as f64) * 0.7).sin().abs())
            .collect();
        let analysis = analyze_track(&track(&levels), &SegmentationConfig::default()).unwrap();

        let flattened: Vec<&BeatSegment> = analysis
            .neighborhoods
            .iter()
            .flat_map(|n| n.segments.iter())
            .collect();
        assert_eq!(flattened.len(), analysis.beats.len());
        for (a, b) in flattened.iter().zip(&analysis.beats) {
            assert_eq!(*a, b);
        }
        for pair in analysis.neighborhoods.windows(2) {
            assert_eq!(pair[0].end_time, pair[1].start_time);
        }
        let last = analysis.neighborhoods.len() - 1;
        for (i, n) in analysis.neighborhoods.iter().enumerate() {
            if i != 0 && i != last {
                assert!(n.duration >= 8.0, "neighborhood {} only {}s", n.id, n.duration);
            }
        }
        for pair in analysis.transitions.windows(2) {
            assert!(pair[1].time - pair[0].time >= 5.0);
        }
    }

    #[test]
    fn test_transitions_use_unsmoothed_energies() {
        // Strong hysteresis keeps one section, but the jump is still reported
        let cfg = SegmentationConfig {
            hysteresis_factor: 10.0,
            min_section_duration: 0.0,
            lookback_window: 2,
            ..Default::default()
        };
        let analysis = analyze_track(&track(&[0.2, 0.2, 0.2, 0.2, 0.9, 0.9]), &cfg).unwrap();
        assert_eq!(analysis.neighborhoods.len(), 1);
        assert_eq!(analysis.transitions.len(), 1);
        let t = &analysis.transitions[0];
        assert_eq!(t.transition_type, TransitionType::Spike);
        assert_eq!(t.musical_transition, MusicalTransition::VerseToChorus);
        assert_eq!(t.beat_number, 5);
        assert_eq!(t.time, 4.0);
    }

    #[test]
    fn test_empty_input_gives_empty_output() {
        let analysis = analyze_track(&track(&[]), &SegmentationConfig::default()).unwrap();
        assert!(analysis.beats.is_empty());
        assert!(analysis.neighborhoods.is_empty());
        assert!(analysis.transitions.is_empty());
        assert_eq!(analysis.stats.total, 0);
    }

    #[test]
    fn test_mismatched_arrays_fail() {
        let features = TrackFeatures::Beats(BeatFeatures {
            beat_times: vec![0.0, 1.0, 2.0],
            rms: vec![0.1, 0.2, 0.3],
            spectral_centroid: vec![1.0, 2.0, 3.0],
            zero_crossing_rate: vec![0.0],
        });
        let err = analyze_track(&features, &SegmentationConfig::default()).unwrap_err();
        assert!(err.to_string().contains("zero_crossing_rate"), "{err}");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let cfg = SegmentationConfig {
            lookback_window: 0,
            ..Default::default()
        };
        assert!(matches!(
            analyze_track(&track(&[0.1, 0.2]), &cfg),
            Err(AnalyzeError::Config(_))
        ));
    }

    #[test]
    fn test_deterministic() {
        let levels: Vec<f64> = (0..40).map(|i| ((i * 7) % 11) as f64 / 10.0).collect();
        let cfg = config(0.1, 4.0);
        let a = analyze_track(&track(&levels), &cfg).unwrap();
        let b = analyze_track(&track(&levels), &cfg).unwrap();
        assert_eq!(a.neighborhoods, b.neighborhoods);
        assert_eq!(a.transitions, b.transitions);
    }

    #[test]
    fn test_analyze_files_counts_failures() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.json");
        let bad = dir.path().join("bad.json");
        std::fs::write(&good, serde_json::to_string(&track(&[0.1, 0.5, 0.9, 0.2])).unwrap()).unwrap();
        std::fs::write(&bad, "not json").unwrap();

        let result = analyze_files(
            &[good.clone(), bad, dir.path().join("missing.json")],
            &SegmentationConfig::default(),
            2,
            false,
        )
        .unwrap();
        assert_eq!(result.failed, 2);
        assert_eq!(result.analyses.len(), 1);
        assert_eq!(result.analyses[0].0, good);
    }
}
