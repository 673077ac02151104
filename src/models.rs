use serde::{Deserialize, Serialize};

/// Binary energy label for a beat or a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnergyClass {
    HighEnergy,
    LowEnergy,
}

impl EnergyClass {
    pub fn label(&self) -> &'static str {
        match self {
            Self::HighEnergy => "HIGH_ENERGY",
            Self::LowEnergy => "LOW_ENERGY",
        }
    }
}

impl std::fmt::Display for EnergyClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One inter-beat interval with its raw feature means, as handed over by
/// the feature-extraction stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeatRecord {
    /// Beat ordinal (0-based). Defaults to the record's position when absent.
    #[serde(default)]
    pub index: Option<usize>,
    pub start_time: f64,
    pub end_time: f64,
    pub rms: f64,
    pub spectral_centroid: f64,
    pub zero_crossing_rate: f64,
}

/// A beat interval with its composite energy score (before classification).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredBeat {
    pub index: usize,
    pub start_time: f64,
    pub end_time: f64,
    pub rms: f64,
    pub spectral_centroid: f64,
    pub zero_crossing_rate: f64,
    pub energy: f64,
}

/// A classified beat interval.
///
/// `raw_classification` is the percentile classifier's label and never changes;
/// `classification` starts equal to it and is replaced by the smoothed label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BeatSegment {
    pub index: usize,
    pub start_time: f64,
    pub end_time: f64,
    pub rms: f64,
    pub spectral_centroid: f64,
    pub zero_crossing_rate: f64,
    pub energy: f64,
    pub raw_classification: EnergyClass,
    pub classification: EnergyClass,
}

impl BeatSegment {
    /// A freshly classified segment: both labels are the classifier's label.
    pub fn classified(beat: &ScoredBeat, class: EnergyClass) -> Self {
        Self {
            index: beat.index,
            start_time: beat.start_time,
            end_time: beat.end_time,
            rms: beat.rms,
            spectral_centroid: beat.spectral_centroid,
            zero_crossing_rate: beat.zero_crossing_rate,
            energy: beat.energy,
            raw_classification: class,
            classification: class,
        }
    }

    /// Copy of this segment carrying a new smoothed label.
    pub fn relabeled(&self, class: EnergyClass) -> Self {
        Self {
            classification: class,
            ..self.clone()
        }
    }
}

/// A contiguous run of beat segments sharing one (smoothed) classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Neighborhood {
    /// 1-based position in the list this neighborhood was emitted in.
    pub id: usize,
    pub classification: EnergyClass,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    pub avg_energy: f64,
    pub segments: Vec<BeatSegment>,
}

impl Neighborhood {
    /// Build a neighborhood spanning `segments`, which must be non-empty and time-ordered.
    /// The id is left at 0 until the owning list is numbered.
    pub fn from_segments(classification: EnergyClass, segments: Vec<BeatSegment>) -> Self {
        let start_time = segments.first().map(|s| s.start_time).unwrap_or(0.0);
        let end_time = segments.last().map(|s| s.end_time).unwrap_or(0.0);
        let energies: Vec<f64> = segments.iter().map(|s| s.energy).collect();
        Self {
            id: 0,
            classification,
            start_time,
            end_time,
            duration: end_time - start_time,
            avg_energy: crate::stats::mean(&energies),
            segments,
        }
    }

    pub fn energy_sum(&self) -> f64 {
        self.segments.iter().map(|s| s.energy).sum()
    }
}

/// Number a neighborhood list 1..=n in its current order.
pub fn assign_ids(neighborhoods: &mut [Neighborhood]) {
    for (i, n) in neighborhoods.iter_mut().enumerate() {
        n.id = i + 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransitionType {
    Spike,
    Fall,
}

/// Heuristic section-change label derived from the transition direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MusicalTransition {
    VerseToChorus,
    ChorusToVerse,
}

impl From<TransitionType> for MusicalTransition {
    fn from(t: TransitionType) -> Self {
        match t {
            TransitionType::Spike => Self::VerseToChorus,
            TransitionType::Fall => Self::ChorusToVerse,
        }
    }
}

impl std::fmt::Display for MusicalTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::VerseToChorus => "VERSE_TO_CHORUS",
            Self::ChorusToVerse => "CHORUS_TO_VERSE",
        })
    }
}

/// A sharp relative energy change against the lookback baseline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transition {
    /// 1-based position of the beat in the analysed sequence.
    pub beat_number: usize,
    pub time: f64,
    pub transition_type: TransitionType,
    pub musical_transition: MusicalTransition,
    pub energy_change: f64,
    pub relative_change: f64,
    pub current_energy: f64,
    pub baseline_energy: f64,
}

impl Transition {
    pub fn strength(&self) -> f64 {
        self.relative_change.abs()
    }

    /// One-line summary, e.g. "Energy spike (+50.0%) - likely verse to chorus".
    pub fn description(&self) -> String {
        let pct = self.relative_change * 100.0;
        match self.transition_type {
            TransitionType::Spike => {
                format!("Energy spike (+{:.1}%) - likely verse to chorus", pct)
            }
            TransitionType::Fall => {
                format!("Energy fall ({:.1}%) - likely chorus to verse", pct)
            }
        }
    }
}
