use super::AnalyzeError;
use crate::config::EnergyWeights;
use crate::models::{BeatRecord, BeatSegment, EnergyClass, ScoredBeat};
use crate::stats::{max_of, percentile};
use serde::{Deserialize, Serialize};

/// Per-beat feature means as parallel arrays, one entry per detected beat.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BeatFeatures {
    /// Detected beat times in seconds, ascending.
    pub beat_times: Vec<f64>,
    pub rms: Vec<f64>,
    pub spectral_centroid: Vec<f64>,
    pub zero_crossing_rate: Vec<f64>,
}

impl BeatFeatures {
    pub fn len(&self) -> usize {
        self.rms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rms.is_empty()
    }

    /// All arrays must have the same length; nothing is truncated or padded.
    pub fn validate(&self) -> Result<(), AnalyzeError> {
        let expected = self.rms.len();
        for (feature, actual) in [
            ("beat_times", self.beat_times.len()),
            ("spectral_centroid", self.spectral_centroid.len()),
            ("zero_crossing_rate", self.zero_crossing_rate.len()),
        ] {
            if actual != expected {
                return Err(AnalyzeError::LengthMismatch {
                    feature,
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }

    /// Segment bounds: each beat paired with the next one; the last segment's end is
    /// extrapolated from the final inter-beat gap (a lone beat gets a zero-length span).
    pub fn boundaries(&self) -> Vec<(f64, f64)> {
        let t = &self.beat_times;
        (0..t.len())
            .map(|i| {
                let end = if i + 1 < t.len() {
                    t[i + 1]
                } else if i > 0 {
                    t[i] + (t[i] - t[i - 1])
                } else {
                    t[i]
                };
                (t[i], end)
            })
            .collect()
    }
}

/// Track-wide feature maxima used for normalization.
///
/// Per-beat inputs take them from the beat values themselves; frame-level
/// input takes them from the (smoothed) frame tracks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureMaxima {
    pub rms: f64,
    pub spectral_centroid: f64,
    pub zero_crossing_rate: f64,
}

impl FeatureMaxima {
    pub fn of(rms: &[f64], centroid: &[f64], zcr: &[f64]) -> Self {
        Self {
            rms: max_of(rms).unwrap_or(0.0),
            spectral_centroid: max_of(centroid).unwrap_or(0.0),
            zero_crossing_rate: max_of(zcr).unwrap_or(0.0),
        }
    }
}

/// `value / max`, or 0 when the track-wide max is not positive.
fn normalized(value: f64, max: f64) -> f64 {
    if max > 0.0 { value / max } else { 0.0 }
}

fn composite_energy(
    rms: f64,
    centroid: f64,
    zcr: f64,
    maxima: &FeatureMaxima,
    weights: &EnergyWeights,
) -> f64 {
    weights.rms * normalized(rms, maxima.rms)
        + weights.spectral_centroid * normalized(centroid, maxima.spectral_centroid)
        + weights.zero_crossing_rate * normalized(zcr, maxima.zero_crossing_rate)
}

/// Score parallel per-beat feature arrays.
///
/// Segments whose span is not positive are dropped; that is expected at
/// sequence edges and not an error. Mismatched array lengths are.
pub fn score_beats(
    features: &BeatFeatures,
    weights: &EnergyWeights,
) -> Result<Vec<ScoredBeat>, AnalyzeError> {
    features.validate()?;

    let maxima = FeatureMaxima::of(
        &features.rms,
        &features.spectral_centroid,
        &features.zero_crossing_rate,
    );

    let mut beats = Vec::with_capacity(features.len());
    for (i, (start_time, end_time)) in features.boundaries().into_iter().enumerate() {
        if start_time >= end_time {
            log::debug!("Dropping beat {} with empty span at {:.3}s", i, start_time);
            continue;
        }
        let rms = features.rms[i];
        let spectral_centroid = features.spectral_centroid[i];
        let zero_crossing_rate = features.zero_crossing_rate[i];
        beats.push(ScoredBeat {
            index: i,
            start_time,
            end_time,
            rms,
            spectral_centroid,
            zero_crossing_rate,
            energy: composite_energy(rms, spectral_centroid, zero_crossing_rate, &maxima, weights),
        });
    }

    Ok(beats)
}

/// Score explicit beat records (each carrying its own start/end), normalized
/// against the maxima of the records themselves.
pub fn score_records(records: &[BeatRecord], weights: &EnergyWeights) -> Vec<ScoredBeat> {
    let rms: Vec<f64> = records.iter().map(|r| r.rms).collect();
    let centroid: Vec<f64> = records.iter().map(|r| r.spectral_centroid).collect();
    let zcr: Vec<f64> = records.iter().map(|r| r.zero_crossing_rate).collect();
    let maxima = FeatureMaxima::of(&rms, &centroid, &zcr);

    score_records_with_maxima(records, &maxima, weights)
}

/// Score beat records against externally supplied maxima.
pub fn score_records_with_maxima(
    records: &[BeatRecord],
    maxima: &FeatureMaxima,
    weights: &EnergyWeights,
) -> Vec<ScoredBeat> {
    records
        .iter()
        .enumerate()
        .filter(|(i, r)| {
            let keep = r.start_time < r.end_time;
            if !keep {
                log::debug!("Dropping beat record {} with empty span", i);
            }
            keep
        })
        .map(|(i, r)| ScoredBeat {
            index: r.index.unwrap_or(i),
            start_time: r.start_time,
            end_time: r.end_time,
            rms: r.rms,
            spectral_centroid: r.spectral_centroid,
            zero_crossing_rate: r.zero_crossing_rate,
            energy: composite_energy(
                r.rms,
                r.spectral_centroid,
                r.zero_crossing_rate,
                maxima,
                weights,
            ),
        })
        .collect()
}

/// Label each beat HIGH if its energy reaches the `threshold_percentile` point
/// of the track's energy distribution, LOW otherwise.
pub fn classify(beats: &[ScoredBeat], threshold_percentile: f64) -> Vec<BeatSegment> {
    let energies: Vec<f64> = beats.iter().map(|b| b.energy).collect();
    let Some(threshold) = percentile(&energies, threshold_percentile * 100.0) else {
        return Vec::new();
    };
    log::debug!(
        "Classifier threshold {:.4} (p{:.0}) over {} beats",
        threshold,
        threshold_percentile * 100.0,
        beats.len()
    );

    beats
        .iter()
        .map(|b| {
            let class = if b.energy >= threshold {
                EnergyClass::HighEnergy
            } else {
                EnergyClass::LowEnergy
            };
            BeatSegment::classified(b, class)
        })
        .collect()
}
