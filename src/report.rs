use crate::analyzer::TrackAnalysis;
use crate::analyzer::summary::FeatureStats;
use std::fmt::Write;

/// Render a human-readable report of one track's analysis.
pub fn render(title: &str, analysis: &TrackAnalysis) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail
    let _ = write_report(&mut out, title, analysis);
    out
}

fn write_report(out: &mut String, title: &str, a: &TrackAnalysis) -> std::fmt::Result {
    writeln!(out, "=== {} ===", title)?;
    writeln!(out)?;

    let s = &a.stats;
    writeln!(out, "Sections: {} ({} high, {} low)", s.total, s.high_energy_count, s.low_energy_count)?;
    writeln!(
        out,
        "Avg duration: {:.2}s high, {:.2}s low | Longest: {:.2}s high, {:.2}s low",
        s.avg_high_energy_duration,
        s.avg_low_energy_duration,
        s.longest_high_energy,
        s.longest_low_energy
    )?;
    writeln!(out)?;

    if !a.neighborhoods.is_empty() {
        writeln!(
            out,
            "{:>4} {:<12} {:>9} {:>9} {:>8} {:>7} {:>6}",
            "#", "Class", "Start", "End", "Dur", "Energy", "Beats"
        )?;
        writeln!(out, "{}", "-".repeat(61))?;
        for n in &a.neighborhoods {
            writeln!(
                out,
                "{:>4} {:<12} {:>8.2}s {:>8.2}s {:>7.2}s {:>7.3} {:>6}",
                n.id,
                n.classification.label(),
                n.start_time,
                n.end_time,
                n.duration,
                n.avg_energy,
                n.segments.len()
            )?;
        }
        writeln!(out)?;
    }

    writeln!(out, "Transitions: {}", a.transitions.len())?;
    if a.transitions.is_empty() {
        writeln!(out, "  none detected (try a lower spike threshold)")?;
    }
    for (i, t) in a.transitions.iter().enumerate() {
        writeln!(out, "  {}. {:>7.2}s (beat {}) {}", i + 1, t.time, t.beat_number, t.musical_transition)?;
        writeln!(out, "     {}", t.description())?;
        writeln!(
            out,
            "     energy {:.3} vs baseline {:.3} (change {:+.3})",
            t.current_energy, t.baseline_energy, t.energy_change
        )?;
    }
    writeln!(out)?;

    writeln!(out, "Beat features ({} beats):", a.beats.len())?;
    write_feature(out, "RMS", &a.features.rms, 6)?;
    write_feature(out, "Centroid", &a.features.spectral_centroid, 2)?;
    write_feature(out, "ZCR", &a.features.zero_crossing_rate, 6)?;
    Ok(())
}

fn write_feature(out: &mut String, name: &str, f: &FeatureStats, precision: usize) -> std::fmt::Result {
    writeln!(
        out,
        "  {:<9} mean {:.p$}  std {:.p$}  min {:.p$}  max {:.p$}",
        name,
        f.mean,
        f.std,
        f.min,
        f.max,
        p = precision
    )
}
