//! # Tuning
//!
//! Matching and behavioral-analysis knobs with sensible defaults and named
//! profiles. Everything that looks like policy (thresholds, modality
//! weights, heuristic trip points) lives here rather than in code.

/// Knobs for the similarity matcher and reconciliation decider.
#[derive(Debug, Clone)]
pub struct MatchTuning {
    /// Minimum confidence for reusing an existing visitor identity.
    pub confidence_threshold: f64,
    /// Maximum candidates returned by the matcher.
    pub max_results: usize,
    /// Candidates below this confidence are dropped as noise before
    /// ranking.
    pub match_floor: f64,
    /// Hard cap on candidates pulled from the store per submission.
    pub candidate_cap: usize,
    /// Number of compared sub-fields at which the evidence factor
    /// saturates to 1.0.
    pub evidence_saturation: usize,
    /// Confidence penalty per stability rank of the best matched fuzzy
    /// tier: a match seen only on the least-stable tier is capped below
    /// one seen on the most-stable tier.
    pub tier_confidence_step: f64,
}

impl Default for MatchTuning {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            max_results: 5,
            match_floor: 0.2,
            candidate_cap: 256,
            evidence_saturation: 12,
            tier_confidence_step: 0.04,
        }
    }
}

impl MatchTuning {
    pub fn balanced() -> Self {
        Self::default()
    }

    /// Fewer false merges at the cost of more split identities.
    pub fn strict() -> Self {
        Self {
            confidence_threshold: 0.85,
            match_floor: 0.35,
            evidence_saturation: 16,
            tier_confidence_step: 0.06,
            ..Self::default()
        }
    }

    /// Fewer split identities at the cost of more false merges.
    pub fn lenient() -> Self {
        Self {
            confidence_threshold: 0.55,
            match_floor: 0.15,
            evidence_saturation: 8,
            tier_confidence_step: 0.03,
            ..Self::default()
        }
    }
}

/// Knobs for the behavioral statistics engine.
#[derive(Debug, Clone)]
pub struct BehaviorTuning {
    /// Events beyond this count are dropped, not an error.
    pub max_events: usize,
    /// Events past this wall-clock window (relative to the first event)
    /// are dropped.
    pub max_window_ms: u64,
    /// Below this many events the engine returns a neutral result.
    pub min_samples: usize,

    /// Deltas with velocity below this (px/s) count as pauses.
    pub pause_velocity: f64,
    /// Pointer velocity above this (px/s) is implausible for a human.
    pub max_human_velocity: f64,
    /// Typing speed above this (chars/minute) is implausible for a human.
    pub max_human_cpm: f64,
    /// Timing variance (ms²) below this trips the perfect-timing flag.
    pub perfect_timing_variance: f64,
    /// Path straightness above this trips the linear-movement flag.
    pub straightness_ceiling: f64,
    /// Velocity stddev (px/s) below this trips the no-tremor flag.
    pub tremor_floor: f64,

    /// Additive bot-probability weights per tripped heuristic; the sum is
    /// capped at 1.0.
    pub perfect_timing_weight: f64,
    pub implausible_speed_weight: f64,
    pub linear_movement_weight: f64,
    pub no_tremor_weight: f64,

    /// Per-modality blend weights for the overall humanness score.
    pub mouse_weight: f64,
    pub keyboard_weight: f64,
    pub touch_weight: f64,

    /// Population-typical centers used by the anomaly score.
    pub typical_velocity: f64,
    pub typical_velocity_spread: f64,
    pub typical_dwell_ms: f64,
    pub typical_dwell_spread: f64,

    /// Upper bound on histogram bins for entropy estimation.
    pub entropy_bins_max: usize,
}

impl Default for BehaviorTuning {
    fn default() -> Self {
        Self {
            max_events: 5000,
            max_window_ms: 120_000,
            min_samples: 2,
            pause_velocity: 25.0,
            max_human_velocity: 20_000.0,
            max_human_cpm: 1200.0,
            perfect_timing_variance: 1.0,
            straightness_ceiling: 0.98,
            tremor_floor: 1.0,
            perfect_timing_weight: 0.35,
            implausible_speed_weight: 0.30,
            linear_movement_weight: 0.25,
            no_tremor_weight: 0.20,
            mouse_weight: 0.4,
            keyboard_weight: 0.4,
            touch_weight: 0.2,
            typical_velocity: 450.0,
            typical_velocity_spread: 300.0,
            typical_dwell_ms: 95.0,
            typical_dwell_spread: 45.0,
            entropy_bins_max: 20,
        }
    }
}

impl BehaviorTuning {
    pub fn balanced() -> Self {
        Self::default()
    }

    /// Shorter window, tighter heuristics; suits interactive challenges
    /// where telemetry is collected for a few seconds only.
    pub fn short_window() -> Self {
        Self {
            max_events: 1000,
            max_window_ms: 15_000,
            ..Self::default()
        }
    }
}
