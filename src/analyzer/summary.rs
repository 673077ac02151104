use crate::models::{BeatSegment, EnergyClass, Neighborhood};
use crate::stats::{max_of, mean, mean_std, min_of};
use serde::Serialize;

/// Counts and durations of HIGH vs LOW sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NeighborhoodStats {
    pub total: usize,
    pub high_energy_count: usize,
    pub low_energy_count: usize,
    pub avg_high_energy_duration: f64,
    pub avg_low_energy_duration: f64,
    pub longest_high_energy: f64,
    pub longest_low_energy: f64,
}

impl NeighborhoodStats {
    pub fn from_neighborhoods(neighborhoods: &[Neighborhood]) -> Self {
        let durations = |class: EnergyClass| -> Vec<f64> {
            neighborhoods
                .iter()
                .filter(|n| n.classification == class)
                .map(|n| n.duration)
                .collect()
        };
        let high = durations(EnergyClass::HighEnergy);
        let low = durations(EnergyClass::LowEnergy);

        Self {
            total: neighborhoods.len(),
            high_energy_count: high.len(),
            low_energy_count: low.len(),
            avg_high_energy_duration: mean(&high),
            avg_low_energy_duration: mean(&low),
            longest_high_energy: max_of(&high).unwrap_or(0.0),
            longest_low_energy: max_of(&low).unwrap_or(0.0),
        }
    }
}

/// Mean, population std, min and max of one feature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FeatureStats {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl FeatureStats {
    pub fn of(values: &[f64]) -> Self {
        let (mean, std) = mean_std(values);
        Self {
            mean,
            std,
            min: min_of(values).unwrap_or(0.0),
            max: max_of(values).unwrap_or(0.0),
        }
    }
}

/// Beat-level feature statistics for a track.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FeatureSummary {
    pub rms: FeatureStats,
    pub spectral_centroid: FeatureStats,
    pub zero_crossing_rate: FeatureStats,
}

impl FeatureSummary {
    pub fn from_segments(segments: &[BeatSegment]) -> Self {
        let column = |f: fn(&BeatSegment) -> f64| -> Vec<f64> { segments.iter().map(f).collect() };
        Self {
            rms: FeatureStats::of(&column(|s| s.rms)),
            spectral_centroid: FeatureStats::of(&column(|s| s.spectral_centroid)),
            zero_crossing_rate: FeatureStats::of(&column(|s| s.zero_crossing_rate)),
        }
    }
}
