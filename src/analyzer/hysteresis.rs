use crate::models::{BeatSegment, EnergyClass};
use crate::stats::percentile;

/// Dead-zone bands around the median energy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HysteresisBands {
    /// Median of the track's beat energies.
    pub base: f64,
    /// LOW → HIGH requires energy strictly above this.
    pub high: f64,
    /// HIGH → LOW requires energy strictly below this.
    pub low: f64,
}

impl HysteresisBands {
    /// Bands for `segments`, or None when there is nothing to smooth.
    pub fn for_segments(segments: &[BeatSegment], factor: f64) -> Option<Self> {
        let energies: Vec<f64> = segments.iter().map(|s| s.energy).collect();
        let base = percentile(&energies, 50.0)?;
        Some(Self {
            base,
            high: base * (1.0 + factor),
            low: base * (1.0 - factor),
        })
    }

    /// Next state given the current one and a beat's energy.
    pub fn step(&self, state: EnergyClass, energy: f64) -> EnergyClass {
        match state {
            EnergyClass::LowEnergy if energy > self.high => EnergyClass::HighEnergy,
            EnergyClass::HighEnergy if energy < self.low => EnergyClass::LowEnergy,
            unchanged => unchanged,
        }
    }
}

/// Re-label classified segments with a two-band state machine.
///
/// The machine starts in the first segment's classifier label and each segment
/// records the state after its own energy has been applied. The classifier's
/// label stays available as `raw_classification`.
pub fn apply_hysteresis(segments: &[BeatSegment], factor: f64) -> Vec<BeatSegment> {
    let Some(bands) = HysteresisBands::for_segments(segments, factor) else {
        return Vec::new();
    };
    log::debug!(
        "Hysteresis bands: base {:.4}, low {:.4}, high {:.4}",
        bands.base,
        bands.low,
        bands.high
    );

    let mut state = segments[0].raw_classification;
    segments
        .iter()
        .map(|seg| {
            state = bands.step(state, seg.energy);
            seg.relabeled(state)
        })
        .collect()
}

/// Number of label changes between consecutive entries.
pub fn count_flips<I>(labels: I) -> usize
where
    I: IntoIterator<Item = EnergyClass>,
{
    let mut flips = 0;
    let mut prev: Option<EnergyClass> = None;
    for label in labels {
        if prev.is_some_and(|p| p != label) {
            flips += 1;
        }
        prev = Some(label);
    }
    flips
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::energy::classify;
    use crate::models::ScoredBeat;

    fn classified(energies: &[f64]) -> Vec<BeatSegment> {
        let beats: Vec<ScoredBeat> = energies
            .iter()
            .enumerate()
            .map(|(i, &e)| ScoredBeat {
                index: i,
                start_time: i as f64,
                end_time: i as f64 + 1.0,
                rms: 0.0,
                spectral_centroid: 0.0,
                zero_crossing_rate: 0.0,
                energy: e,
            })
            .collect();
        classify(&beats, 0.5)
    }

    #[test]
    fn test_bands() {
        let segs = classified(&[0.2, 0.4, 0.6, 0.8]);
        let bands = HysteresisBands::for_segments(&segs, 0.2).unwrap();
        assert!((bands.base - 0.5).abs() < 1e-12);
        assert!((bands.high - 0.6).abs() < 1e-12);
        assert!((bands.low - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_single_noisy_beat_does_not_flip() {
        // Median 0.5, bands 0.425..0.575: the 0.55 blip sits in the dead zone
        // and the 0.45 dip likewise
        let energies = [0.3, 0.3, 0.55, 0.3, 0.8, 0.8, 0.45, 0.8, 0.8, 0.3];
        let segs = classified(&energies);
        let raw_flips = count_flips(segs.iter().map(|s| s.raw_classification));
        let smoothed = apply_hysteresis(&segs, 0.15);
        let labels: Vec<EnergyClass> = smoothed.iter().map(|s| s.classification).collect();

        use EnergyClass::{HighEnergy as H, LowEnergy as L};
        assert_eq!(labels, vec![L, L, L, L, H, H, H, H, H, L]);
        assert_eq!(raw_flips, 6);
        assert_eq!(count_flips(labels), 2);
    }

    #[test]
    fn test_state_recorded_without_lag() {
        let segs = classified(&[0.1, 0.1, 0.9, 0.9]);
        let smoothed = apply_hysteresis(&segs, 0.0);
        // The first beat above the band is itself HIGH
        assert_eq!(smoothed[2].classification, EnergyClass::HighEnergy);
    }

    #[test]
    fn test_raw_label_retained() {
        let segs = classified(&[0.3, 0.3, 0.55, 0.3, 0.8, 0.8]);
        let smoothed = apply_hysteresis(&segs, 0.15);
        for (before, after) in segs.iter().zip(&smoothed) {
            assert_eq!(before.classification, after.raw_classification);
            assert_eq!(before.energy, after.energy);
        }
    }

    #[test]
    fn test_single_segment_keeps_raw_label() {
        let segs = classified(&[0.7]);
        let smoothed = apply_hysteresis(&segs, 0.15);
        assert_eq!(smoothed.len(), 1);
        assert_eq!(smoothed[0].classification, segs[0].raw_classification);
    }

    #[test]
    fn test_empty() {
        assert!(apply_hysteresis(&[], 0.15).is_empty());
    }

    #[test]
    fn test_flips_never_increase_on_alternating_signal() {
        let energies: Vec<f64> = (0..40)
            .map(|i| if i % 2 == 0 { 0.45 } else { 0.56 })
            .collect();
        let segs = classified(&energies);
        let raw_flips = count_flips(segs.iter().map(|s| s.raw_classification));
        let smoothed = apply_hysteresis(&segs, 0.15);
        let flips = count_flips(smoothed.iter().map(|s| s.classification));
        assert!(flips <= raw_flips, "{flips} > {raw_flips}");
        assert_eq!(flips, 0);
    }

    #[test]
    fn test_count_flips() {
        use EnergyClass::{HighEnergy as H, LowEnergy as L};
        assert_eq!(count_flips([L, L, H, L, L]), 2);
        assert_eq!(count_flips(Vec::<EnergyClass>::new()), 0);
    }
}
