use crate::models::{BeatSegment, EnergyClass, Neighborhood, assign_ids};

/// Group consecutive segments sharing a smoothed label into runs.
pub fn build_neighborhoods(segments: &[BeatSegment]) -> Vec<Neighborhood> {
    let mut neighborhoods = Vec::new();
    let mut current: Vec<BeatSegment> = Vec::new();

    for seg in segments {
        if let Some(last) = current.last() {
            if last.classification != seg.classification {
                let class = last.classification;
                neighborhoods.push(Neighborhood::from_segments(class, std::mem::take(&mut current)));
            }
        }
        current.push(seg.clone());
    }

    // Close the terminal run
    if let Some(first) = current.first() {
        let class = first.classification;
        neighborhoods.push(Neighborhood::from_segments(class, current));
    }

    assign_ids(&mut neighborhoods);
    neighborhoods
}

/// Merge neighborhoods shorter than `min_duration` into their neighbors.
///
/// Neighborhoods are visited left to right and each is consumed exactly once.
/// A long-enough neighborhood is kept as is; a short one grows into a region by
/// absorbing unconsumed neighbors, one at a time, from the side whose average
/// energy is closer to the region's (left on ties), until the region is long
/// enough or both sides are exhausted. The region's label is the majority label
/// of its constituents, HIGH on ties. Output ids are renumbered 1..=n.
pub fn merge_short_neighborhoods(
    neighborhoods: &[Neighborhood],
    min_duration: f64,
) -> Vec<Neighborhood> {
    let mut consumed = vec![false; neighborhoods.len()];
    let mut merged = Vec::new();

    for center in 0..neighborhoods.len() {
        if consumed[center] {
            continue;
        }

        let current = &neighborhoods[center];
        if current.duration >= min_duration {
            consumed[center] = true;
            merged.push(current.clone());
        } else {
            merged.push(expand_to_min_duration(
                neighborhoods,
                center,
                min_duration,
                &mut consumed,
            ));
        }
    }

    assign_ids(&mut merged);
    merged
}

/// Grow a region around `center` and consume everything it absorbed.
fn expand_to_min_duration(
    neighborhoods: &[Neighborhood],
    center: usize,
    min_duration: f64,
    consumed: &mut [bool],
) -> Neighborhood {
    // The region is always the contiguous range lo..=hi
    let mut lo = center;
    let mut hi = center;
    let mut energy_sum = neighborhoods[center].energy_sum();
    let mut segment_count = neighborhoods[center].segments.len();

    while neighborhoods[hi].end_time - neighborhoods[lo].start_time < min_duration {
        let left = lo.checked_sub(1).filter(|&i| !consumed[i]);
        let right = Some(hi + 1).filter(|&i| i < neighborhoods.len() && !consumed[i]);

        let extend_left = match (left, right) {
            (None, None) => break,
            (Some(l), Some(r)) => {
                let region_avg = energy_sum / segment_count as f64;
                let left_diff = (neighborhoods[l].avg_energy - region_avg).abs();
                let right_diff = (neighborhoods[r].avg_energy - region_avg).abs();
                left_diff <= right_diff
            }
            (Some(_), None) => true,
            (None, Some(_)) => false,
        };

        let absorbed = if extend_left {
            lo -= 1;
            lo
        } else {
            hi += 1;
            hi
        };
        energy_sum += neighborhoods[absorbed].energy_sum();
        segment_count += neighborhoods[absorbed].segments.len();
    }

    let constituents = &neighborhoods[lo..=hi];
    consumed[lo..=hi].fill(true);

    let high = constituents
        .iter()
        .filter(|n| n.classification == EnergyClass::HighEnergy)
        .count();
    let low = constituents.len() - high;
    let classification = if high >= low {
        EnergyClass::HighEnergy
    } else {
        EnergyClass::LowEnergy
    };

    if hi > lo {
        log::trace!(
            "Merged neighborhoods {}..={} into {} ({} HIGH / {} LOW)",
            lo + 1,
            hi + 1,
            classification,
            high,
            low
        );
    }

    let segments: Vec<BeatSegment> = constituents
        .iter()
        .flat_map(|n| n.segments.iter().cloned())
        .collect();
    Neighborhood::from_segments(classification, segments)
}
