//! Frame-level features → per-beat feature means.
//!
//! Feature extractors report one value per analysis frame (hop). Before scoring,
//! RMS and spectral centroid are lightly smoothed (Gaussian, sigma = 1 frame) and
//! each beat interval is reduced to the mean of the frames it covers. Energy is
//! later normalized against the maxima of the whole frame tracks, not of the
//! beat means.

use super::AnalyzeError;
use super::energy::FeatureMaxima;
use crate::models::BeatRecord;
use serde::{Deserialize, Serialize};

const DEFAULT_HOP_LENGTH: usize = 512;

/// Gaussian smoothing width in frames.
const SMOOTHING_SIGMA: f64 = 1.0;

/// Kernel reaches this many sigmas each side.
const SMOOTHING_TRUNCATE: f64 = 4.0;

fn default_hop_length() -> usize {
    DEFAULT_HOP_LENGTH
}

/// Frame-level feature tracks sharing one hop grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameFeatures {
    pub sample_rate: u32,
    #[serde(default = "default_hop_length")]
    pub hop_length: usize,
    pub rms: Vec<f64>,
    pub spectral_centroid: Vec<f64>,
    pub zero_crossing_rate: Vec<f64>,
}

impl FrameFeatures {
    fn validate(&self) -> Result<(), AnalyzeError> {
        if self.sample_rate == 0 {
            return Err(AnalyzeError::InvalidFrames("sample_rate must be positive".into()));
        }
        if self.hop_length == 0 {
            return Err(AnalyzeError::InvalidFrames("hop_length must be positive".into()));
        }
        let expected = self.rms.len();
        for (feature, actual) in [
            ("frames.spectral_centroid", self.spectral_centroid.len()),
            ("frames.zero_crossing_rate", self.zero_crossing_rate.len()),
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

    /// Seconds per frame.
    fn frame_period(&self) -> f64 {
        self.hop_length as f64 / self.sample_rate as f64
    }

    /// Index of the frame closest to `time` (the earlier one on an exact tie).
    fn nearest_frame(&self, time: f64) -> usize {
        let last = self.rms.len().saturating_sub(1);
        let period = self.frame_period();
        let pos = time / period;
        let lower = (pos.floor().max(0.0) as usize).min(last);
        let upper = (lower + 1).min(last);
        let d_lower = (lower as f64 * period - time).abs();
        let d_upper = (upper as f64 * period - time).abs();
        if d_upper < d_lower { upper } else { lower }
    }
}

/// Map an out-of-range index back into `0..n` by half-sample mirroring
/// (`d c b a | a b c d | d c b a`).
fn reflect_index(k: isize, n: usize) -> usize {
    let period = 2 * n as isize;
    let m = k.rem_euclid(period);
    if m < n as isize {
        m as usize
    } else {
        (period - m - 1) as usize
    }
}

/// 1-D Gaussian filter with mirrored edges.
fn gaussian_smooth(values: &[f64], sigma: f64) -> Vec<f64> {
    if values.is_empty() || sigma <= 0.0 {
        return values.to_vec();
    }

    let radius = (SMOOTHING_TRUNCATE * sigma + 0.5) as isize;
    let mut kernel: Vec<f64> = (-radius..=radius)
        .map(|x| (-0.5 * (x as f64 / sigma).powi(2)).exp())
        .collect();
    let total: f64 = kernel.iter().sum();
    for w in &mut kernel {
        *w /= total;
    }

    let n = values.len();
    (0..n as isize)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .map(|(k, w)| w * values[reflect_index(i + k as isize - radius, n)])
                .sum()
        })
        .collect()
}

/// Per-beat records plus the track-wide maxima of the frames they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct BeatAggregation {
    pub records: Vec<BeatRecord>,
    /// Over the smoothed rms/centroid tracks and the raw zcr track.
    pub maxima: FeatureMaxima,
}

fn frame_mean(values: &[f64], start: usize, end: usize) -> f64 {
    let slice = &values[start..end];
    slice.iter().sum::<f64>() / slice.len() as f64
}

/// Reduce frame-level features to one record per beat interval.
///
/// Beat `i` spans `beat_times[i]..beat_times[i + 1]`. Intervals whose nearest
/// frames coincide (or invert) cover no frames and are skipped; kept records
/// retain their beat ordinal.
pub fn aggregate_beats(
    frames: &FrameFeatures,
    beat_times: &[f64],
) -> Result<BeatAggregation, AnalyzeError> {
    frames.validate()?;

    let rms = gaussian_smooth(&frames.rms, SMOOTHING_SIGMA);
    let centroid = gaussian_smooth(&frames.spectral_centroid, SMOOTHING_SIGMA);
    let maxima = FeatureMaxima::of(&rms, &centroid, &frames.zero_crossing_rate);

    if frames.rms.is_empty() || beat_times.len() < 2 {
        return Ok(BeatAggregation {
            records: Vec::new(),
            maxima,
        });
    }

    let mut records = Vec::with_capacity(beat_times.len() - 1);
    for (i, pair) in beat_times.windows(2).enumerate() {
        let (start_time, end_time) = (pair[0], pair[1]);
        let start_frame = frames.nearest_frame(start_time);
        let end_frame = frames.nearest_frame(end_time);
        if start_frame >= end_frame {
            log::trace!("Beat {} covers no frames ({} >= {})", i, start_frame, end_frame);
            continue;
        }

        records.push(BeatRecord {
            index: Some(i),
            start_time,
            end_time,
            rms: frame_mean(&rms, start_frame, end_frame),
            spectral_centroid: frame_mean(&centroid, start_frame, end_frame),
            zero_crossing_rate: frame_mean(&frames.zero_crossing_rate, start_frame, end_frame),
        });
    }

    log::debug!(
        "Aggregated {} frames into {} beat records ({} beats)",
        frames.rms.len(),
        records.len(),
        beat_times.len()
    );
    Ok(BeatAggregation { records, maxima })
}
