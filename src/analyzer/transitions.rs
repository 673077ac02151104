use crate::models::{BeatSegment, Transition, TransitionType};
use crate::stats::mean;

/// Flag beats whose energy departs from the mean of the preceding
/// `lookback_window` beats by at least `spike_threshold` (relative).
///
/// Runs on the classifier output, before hysteresis. Fewer than
/// `lookback_window + 1` beats yields nothing. A zero baseline counts as no change.
pub fn detect_transitions(
    segments: &[BeatSegment],
    spike_threshold: f64,
    lookback_window: usize,
) -> Vec<Transition> {
    if lookback_window == 0 || segments.len() < lookback_window + 1 {
        return Vec::new();
    }

    let energies: Vec<f64> = segments.iter().map(|s| s.energy).collect();
    let mut transitions = Vec::new();

    for i in lookback_window..segments.len() {
        let current_energy = energies[i];
        let baseline_energy = mean(&energies[i - lookback_window..i]);
        let energy_change = current_energy - baseline_energy;
        let relative_change = if baseline_energy > 0.0 {
            energy_change / baseline_energy
        } else {
            0.0
        };

        if relative_change.abs() < spike_threshold {
            continue;
        }

        let transition_type = if energy_change > 0.0 {
            TransitionType::Spike
        } else {
            TransitionType::Fall
        };
        transitions.push(Transition {
            beat_number: i + 1,
            time: segments[i].start_time,
            transition_type,
            musical_transition: transition_type.into(),
            energy_change,
            relative_change,
            current_energy,
            baseline_energy,
        });
    }

    log::debug!(
        "{} candidate transitions (threshold {:.2}, lookback {})",
        transitions.len(),
        spike_threshold,
        lookback_window
    );
    transitions
}

/// Collapse clustered transitions so kept events are at least `min_time_gap` apart.
///
/// Candidates are taken in time order. One that is too close to the last kept
/// event replaces it if strictly stronger (larger |relative change|), and then
/// becomes the reference for later gap checks; otherwise it is dropped.
pub fn refine_transitions(transitions: &[Transition], min_time_gap: f64) -> Vec<Transition> {
    let mut sorted = transitions.to_vec();
    sorted.sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap_or(std::cmp::Ordering::Equal));

    let mut refined: Vec<Transition> = Vec::new();
    let mut last_kept_time = f64::NEG_INFINITY;

    for transition in sorted {
        if transition.time - last_kept_time >= min_time_gap {
            last_kept_time = transition.time;
            refined.push(transition);
        } else if let Some(last) = refined.last_mut() {
            if transition.strength() > last.strength() {
                last_kept_time = transition.time;
                *last = transition;
            }
        }
    }

    refined
}
