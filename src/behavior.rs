//! # Behavioral Statistics Engine
//!
//! Converts a bounded window of interaction events into movement, click,
//! scroll, and typing patterns, distribution statistics, and a
//! human-vs-automation verdict. The engine is total: sparse or degenerate
//! input degrades to a neutral result, never an error.

use crate::config::BehaviorTuning;
use crate::model::{EventKind, InteractionEvent};
use crate::stats;
use serde::Serialize;

/// Pointer movement metrics over consecutive-event deltas.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MouseMovementPattern {
    /// Number of velocity samples the metrics were computed from.
    pub sample_count: usize,
    /// Mean pointer speed, px/s.
    pub avg_velocity: f64,
    pub max_velocity: f64,
    /// Mean magnitude of velocity change, px/s².
    pub avg_acceleration: f64,
    /// Mean magnitude of acceleration change, px/s³.
    pub avg_jerk: f64,
    /// Direct distance divided by path length; 1.0 is a perfect line.
    pub path_straightness: f64,
    /// Mean resultant length of step directions; 1.0 means every step
    /// pointed the same way.
    pub direction_consistency: f64,
    /// Standard deviation of velocity, px/s.
    pub tremor: f64,
    /// Fraction of deltas below the pause velocity threshold.
    pub pause_ratio: f64,
    /// Inverse of acceleration variance, in (0, 1].
    pub smoothness: f64,
}

/// Click timing metrics from pointer down/up events.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClickPattern {
    pub click_count: usize,
    /// Mean time between consecutive presses, ms.
    pub mean_interval_ms: f64,
    pub interval_variance: f64,
    /// Mean press-to-release duration, ms.
    pub mean_press_ms: f64,
}

/// Scroll behavior metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScrollPattern {
    pub sample_count: usize,
    /// Mean scroll speed, px/s.
    pub avg_speed: f64,
    pub direction_changes: usize,
    /// Direction changes per scroll delta.
    pub reversal_ratio: f64,
}

/// Keystroke dynamics from keydown/keyup events.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TypingPattern {
    pub keystroke_count: usize,
    pub chars_per_minute: f64,
    pub words_per_minute: f64,
    /// Mean keydown-to-keyup duration per key, ms.
    pub dwell_mean_ms: f64,
    pub dwell_variance: f64,
    /// Mean keyup-to-next-keydown duration, ms.
    pub flight_mean_ms: f64,
    /// Inverse of dwell variance in (0, 1]; 1.0 is metronome typing.
    pub rhythm_consistency: f64,
    pub backspace_ratio: f64,
}

/// Distribution-level statistics pooled across modalities.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BehavioralStatistics {
    /// Shannon entropy (bits) of the binned velocity distribution.
    pub velocity_entropy: f64,
    /// Shannon entropy (bits) of the binned inter-event timing
    /// distribution.
    pub timing_entropy: f64,
    /// Variance of pooled timing samples (dwell, flight, pointer deltas,
    /// click intervals).
    pub pooled_variance: f64,
    pub pooled_stddev: f64,
    /// Pearson correlation between the pointer velocity series and the
    /// keystroke dwell series.
    pub mouse_keyboard_correlation: f64,
    /// Distance of observed metrics from population-typical centers,
    /// in [0, 1).
    pub anomaly_score: f64,
    /// Inverse coefficient of variation of pooled timing, in (0, 1].
    pub consistency_score: f64,
    /// Entropy-weighted distinctiveness of the sample, in [0, 1].
    pub uniqueness_score: f64,
}

/// Automation heuristics. Each tripped flag contributes its configured
/// weight to the bot probability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AutomationFlags {
    /// Timing variance indistinguishable from zero.
    pub perfect_timing: bool,
    /// Pointer velocity or typing speed beyond human limits.
    pub implausible_speed: bool,
    /// Near-perfect path straightness.
    pub linear_movement: bool,
    /// Velocity spread indistinguishable from zero.
    pub no_tremor: bool,
}

impl AutomationFlags {
    pub fn any(&self) -> bool {
        self.perfect_timing || self.implausible_speed || self.linear_movement || self.no_tremor
    }
}

/// Per-modality humanness sub-scores and the blended verdict.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HumanVerification {
    pub mouse_humanness: f64,
    pub keyboard_humanness: f64,
    pub touch_humanness: f64,
    /// Weighted blend of the sub-scores, in [0, 1].
    pub overall_humanness: f64,
    /// Additive heuristic score, capped at 1.0.
    pub bot_probability: f64,
}

impl Default for HumanVerification {
    fn default() -> Self {
        Self {
            mouse_humanness: 0.5,
            keyboard_humanness: 0.5,
            touch_humanness: 0.5,
            overall_humanness: 0.5,
            bot_probability: 0.0,
        }
    }
}

/// Full output of the behavioral engine for one collection window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BehavioralAnalysis {
    /// Events actually analyzed after window bounding.
    pub sample_count: usize,
    pub movement: MouseMovementPattern,
    pub clicks: ClickPattern,
    pub scroll: ScrollPattern,
    pub typing: TypingPattern,
    pub statistics: BehavioralStatistics,
    pub flags: AutomationFlags,
    pub verification: HumanVerification,
}

impl BehavioralAnalysis {
    /// Neutral result for windows too sparse to analyze: zero patterns,
    /// 0.5 humanness, zero bot probability.
    fn neutral(sample_count: usize) -> Self {
        Self {
            sample_count,
            ..Self::default()
        }
    }
}

/// Analyze one collection window of interaction events.
///
/// Events are expected in timestamp order; events beyond `max_events` or
/// past `max_window_ms` from the first event are dropped. Fewer than
/// `min_samples` usable events yields a neutral result.
pub fn analyze(events: &[InteractionEvent], tuning: &BehaviorTuning) -> BehavioralAnalysis {
    let window = bounded_window(events, tuning);
    if window.len() < tuning.min_samples.max(2) {
        tracing::debug!(
            events = events.len(),
            window = window.len(),
            "behavioral window too sparse, returning neutral analysis"
        );
        return BehavioralAnalysis::neutral(window.len());
    }

    let movement = movement_pattern(window, tuning);
    let clicks = click_pattern(window);
    let scroll = scroll_pattern(window);
    let typing = typing_pattern(window);
    let statistics = statistics_layer(window, &movement, &typing, tuning);
    let flags = automation_flags(&movement, &typing, window, tuning);
    let verification = verify(&movement, &typing, window, &statistics, &flags, tuning);

    BehavioralAnalysis {
        sample_count: window.len(),
        movement,
        clicks,
        scroll,
        typing,
        statistics,
        flags,
        verification,
    }
}

/// Apply the count and wall-clock bounds. Submission beyond either bound
/// is dropped, not an error.
fn bounded_window<'a>(
    events: &'a [InteractionEvent],
    tuning: &BehaviorTuning,
) -> &'a [InteractionEvent] {
    let Some(first) = events.first() else {
        return events;
    };
    let cutoff = first.timestamp_ms.saturating_add(tuning.max_window_ms);
    let in_window = events
        .iter()
        .take_while(|e| e.timestamp_ms <= cutoff)
        .count();
    &events[..in_window.min(tuning.max_events)]
}

fn is_move(kind: EventKind) -> bool {
    matches!(kind, EventKind::PointerMove | EventKind::TouchMove)
}

/// Velocity series (px/s) over consecutive pointer positions, with the
/// per-step time deltas (ms).
fn velocity_series(events: &[InteractionEvent]) -> (Vec<f64>, Vec<f64>) {
    let points: Vec<(f64, f64, u64)> = events
        .iter()
        .filter(|e| is_move(e.kind))
        .filter_map(|e| Some((e.x?, e.y?, e.timestamp_ms)))
        .collect();

    let mut velocities = Vec::new();
    let mut dts = Vec::new();
    for pair in points.windows(2) {
        let (x0, y0, t0) = pair[0];
        let (x1, y1, t1) = pair[1];
        let dt = t1.saturating_sub(t0) as f64;
        if dt <= 0.0 {
            continue;
        }
        let dist = ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt();
        velocities.push(dist / dt * 1000.0);
        dts.push(dt);
    }
    (velocities, dts)
}

fn movement_pattern(events: &[InteractionEvent], tuning: &BehaviorTuning) -> MouseMovementPattern {
    let points: Vec<(f64, f64, u64)> = events
        .iter()
        .filter(|e| is_move(e.kind))
        .filter_map(|e| Some((e.x?, e.y?, e.timestamp_ms)))
        .collect();
    if points.len() < 2 {
        return MouseMovementPattern::default();
    }

    let (velocities, dts) = velocity_series(events);
    if velocities.is_empty() {
        return MouseMovementPattern::default();
    }

    // Finite differences: velocity -> acceleration -> jerk, each scaled by
    // the step duration.
    let mut accelerations = Vec::new();
    for i in 1..velocities.len() {
        let dt_s = dts[i] / 1000.0;
        if dt_s > 0.0 {
            accelerations.push((velocities[i] - velocities[i - 1]) / dt_s);
        }
    }
    let mut jerks = Vec::new();
    for i in 1..accelerations.len() {
        let dt_s = dts[i + 1] / 1000.0;
        if dt_s > 0.0 {
            jerks.push((accelerations[i] - accelerations[i - 1]) / dt_s);
        }
    }

    // Path straightness: direct endpoint distance over traveled length.
    let mut path_len = 0.0;
    for pair in points.windows(2) {
        let (x0, y0, _) = pair[0];
        let (x1, y1, _) = pair[1];
        path_len += ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt();
    }
    let (sx, sy, _) = points[0];
    let (ex, ey, _) = points[points.len() - 1];
    let direct = ((ex - sx).powi(2) + (ey - sy).powi(2)).sqrt();
    let path_straightness = if path_len > 0.0 { direct / path_len } else { 0.0 };

    // Directional consistency: mean resultant length of step directions.
    let mut sum_cos = 0.0;
    let mut sum_sin = 0.0;
    let mut steps = 0usize;
    for pair in points.windows(2) {
        let (x0, y0, _) = pair[0];
        let (x1, y1, _) = pair[1];
        let (dx, dy) = (x1 - x0, y1 - y0);
        let len = (dx * dx + dy * dy).sqrt();
        if len > 0.0 {
            sum_cos += dx / len;
            sum_sin += dy / len;
            steps += 1;
        }
    }
    let direction_consistency = if steps > 0 {
        (sum_cos.powi(2) + sum_sin.powi(2)).sqrt() / steps as f64
    } else {
        0.0
    };

    let pauses = velocities
        .iter()
        .filter(|&&v| v < tuning.pause_velocity)
        .count();

    MouseMovementPattern {
        sample_count: velocities.len(),
        avg_velocity: stats::mean(&velocities),
        max_velocity: velocities.iter().cloned().fold(0.0, f64::max),
        avg_acceleration: stats::mean(
            &accelerations.iter().map(|a| a.abs()).collect::<Vec<_>>(),
        ),
        avg_jerk: stats::mean(&jerks.iter().map(|j| j.abs()).collect::<Vec<_>>()),
        path_straightness,
        direction_consistency,
        tremor: stats::stddev(&velocities),
        pause_ratio: pauses as f64 / velocities.len() as f64,
        smoothness: 1.0 / (1.0 + stats::variance(&accelerations)),
    }
}

fn click_pattern(events: &[InteractionEvent]) -> ClickPattern {
    let downs: Vec<u64> = events
        .iter()
        .filter(|e| matches!(e.kind, EventKind::PointerDown | EventKind::TouchStart))
        .map(|e| e.timestamp_ms)
        .collect();

    let intervals: Vec<f64> = downs
        .windows(2)
        .map(|w| w[1].saturating_sub(w[0]) as f64)
        .collect();

    // Press durations: pair each down with the next up.
    let mut presses = Vec::new();
    let mut pending_down: Option<u64> = None;
    for event in events {
        match event.kind {
            EventKind::PointerDown | EventKind::TouchStart => {
                pending_down = Some(event.timestamp_ms);
            }
            EventKind::PointerUp | EventKind::TouchEnd => {
                if let Some(down) = pending_down.take() {
                    presses.push(event.timestamp_ms.saturating_sub(down) as f64);
                }
            }
            _ => {}
        }
    }

    ClickPattern {
        click_count: downs.len(),
        mean_interval_ms: stats::mean(&intervals),
        interval_variance: stats::variance(&intervals),
        mean_press_ms: stats::mean(&presses),
    }
}

fn scroll_pattern(events: &[InteractionEvent]) -> ScrollPattern {
    let scrolls: Vec<&InteractionEvent> = events
        .iter()
        .filter(|e| e.kind == EventKind::Scroll)
        .collect();
    if scrolls.is_empty() {
        return ScrollPattern::default();
    }

    let mut speeds = Vec::new();
    let mut direction_changes = 0usize;
    let mut prev_dy: Option<f64> = None;
    for pair in scrolls.windows(2) {
        let dt = pair[1].timestamp_ms.saturating_sub(pair[0].timestamp_ms) as f64;
        let dx = pair[1].x.unwrap_or(0.0);
        let dy = pair[1].y.unwrap_or(0.0);
        if dt > 0.0 {
            speeds.push((dx * dx + dy * dy).sqrt() / dt * 1000.0);
        }
        if let Some(prev) = prev_dy {
            if prev.signum() != dy.signum() && dy.abs() > 0.0 {
                direction_changes += 1;
            }
        }
        prev_dy = Some(dy);
    }

    let deltas = scrolls.len().saturating_sub(1).max(1);
    ScrollPattern {
        sample_count: scrolls.len(),
        avg_speed: stats::mean(&speeds),
        direction_changes,
        reversal_ratio: direction_changes as f64 / deltas as f64,
    }
}

fn is_letter_key(key: &str) -> bool {
    key.chars().count() == 1 && key.chars().all(|c| c.is_alphanumeric())
}

fn typing_pattern(events: &[InteractionEvent]) -> TypingPattern {
    let key_events: Vec<&InteractionEvent> = events
        .iter()
        .filter(|e| matches!(e.kind, EventKind::KeyDown | EventKind::KeyUp))
        .collect();
    if key_events.len() < 2 {
        return TypingPattern::default();
    }

    let mut dwell_times = Vec::new();
    let mut flight_times = Vec::new();
    let mut down_at: hashbrown::HashMap<&str, u64> = hashbrown::HashMap::new();
    let mut last_up: Option<u64> = None;
    let mut keydowns = 0usize;
    let mut letters = 0usize;
    let mut backspaces = 0usize;

    for event in &key_events {
        let key = event.key.as_deref().unwrap_or("");
        match event.kind {
            EventKind::KeyDown => {
                keydowns += 1;
                if is_letter_key(key) {
                    letters += 1;
                }
                if key == "Backspace" {
                    backspaces += 1;
                }
                if let Some(up) = last_up {
                    flight_times.push(event.timestamp_ms.saturating_sub(up) as f64);
                }
                down_at.insert(key, event.timestamp_ms);
            }
            EventKind::KeyUp => {
                if let Some(down) = down_at.remove(key) {
                    dwell_times.push(event.timestamp_ms.saturating_sub(down) as f64);
                }
                last_up = Some(event.timestamp_ms);
            }
            _ => {}
        }
    }

    let first = key_events[0].timestamp_ms;
    let last = key_events[key_events.len() - 1].timestamp_ms;
    let elapsed_min = (last.saturating_sub(first) as f64 / 60_000.0).max(1.0 / 60_000.0);
    let chars_per_minute = letters as f64 / elapsed_min;
    let dwell_variance = stats::variance(&dwell_times);

    TypingPattern {
        keystroke_count: keydowns,
        chars_per_minute,
        words_per_minute: chars_per_minute / 5.0,
        dwell_mean_ms: stats::mean(&dwell_times),
        dwell_variance,
        flight_mean_ms: stats::mean(&flight_times),
        rhythm_consistency: 1.0 / (1.0 + dwell_variance),
        backspace_ratio: if keydowns > 0 {
            backspaces as f64 / keydowns as f64
        } else {
            0.0
        },
    }
}

fn statistics_layer(
    events: &[InteractionEvent],
    movement: &MouseMovementPattern,
    typing: &TypingPattern,
    tuning: &BehaviorTuning,
) -> BehavioralStatistics {
    let (velocities, pointer_dts) = velocity_series(events);

    let mut dwell_times = Vec::new();
    let mut down_at: hashbrown::HashMap<&str, u64> = hashbrown::HashMap::new();
    for event in events {
        let key = event.key.as_deref().unwrap_or("");
        match event.kind {
            EventKind::KeyDown => {
                down_at.insert(key, event.timestamp_ms);
            }
            EventKind::KeyUp => {
                if let Some(down) = down_at.remove(key) {
                    dwell_times.push(event.timestamp_ms.saturating_sub(down) as f64);
                }
            }
            _ => {}
        }
    }

    // Inter-event deltas across the whole window, for timing entropy.
    let event_dts: Vec<f64> = events
        .windows(2)
        .map(|w| w[1].timestamp_ms.saturating_sub(w[0].timestamp_ms) as f64)
        .collect();

    let mut pooled = Vec::new();
    pooled.extend_from_slice(&pointer_dts);
    pooled.extend_from_slice(&dwell_times);

    let velocity_entropy = stats::shannon_entropy(&velocities, tuning.entropy_bins_max);
    let timing_entropy = stats::shannon_entropy(&event_dts, tuning.entropy_bins_max);

    let pooled_variance = stats::variance(&pooled);
    let pooled_stddev = pooled_variance.sqrt();
    let pooled_mean = stats::mean(&pooled);

    // Anomaly: averaged distance from population-typical centers over the
    // modalities that actually produced samples.
    let mut distances = Vec::new();
    if movement.sample_count > 0 {
        distances.push(stats::center_distance(
            movement.avg_velocity,
            tuning.typical_velocity,
            tuning.typical_velocity_spread,
        ));
    }
    if typing.keystroke_count > 0 {
        distances.push(stats::center_distance(
            typing.dwell_mean_ms,
            tuning.typical_dwell_ms,
            tuning.typical_dwell_spread,
        ));
    }

    let entropy_ceiling = stats::max_entropy(velocities.len(), tuning.entropy_bins_max)
        + stats::max_entropy(event_dts.len(), tuning.entropy_bins_max);
    let uniqueness_score = if entropy_ceiling > 0.0 {
        ((velocity_entropy + timing_entropy) / entropy_ceiling).clamp(0.0, 1.0)
    } else {
        0.0
    };

    BehavioralStatistics {
        velocity_entropy,
        timing_entropy,
        pooled_variance,
        pooled_stddev,
        mouse_keyboard_correlation: stats::pearson(&velocities, &dwell_times),
        anomaly_score: stats::mean(&distances),
        consistency_score: if pooled_mean > 0.0 {
            1.0 / (1.0 + pooled_stddev / pooled_mean)
        } else {
            0.0
        },
        uniqueness_score,
    }
}

fn automation_flags(
    movement: &MouseMovementPattern,
    typing: &TypingPattern,
    events: &[InteractionEvent],
    tuning: &BehaviorTuning,
) -> AutomationFlags {
    let (_, pointer_dts) = velocity_series(events);

    let typing_perfect =
        typing.keystroke_count >= 8 && typing.dwell_variance < tuning.perfect_timing_variance;
    let pointer_perfect =
        pointer_dts.len() >= 8 && stats::variance(&pointer_dts) < tuning.perfect_timing_variance;

    AutomationFlags {
        perfect_timing: typing_perfect || pointer_perfect,
        implausible_speed: movement.max_velocity > tuning.max_human_velocity
            || typing.chars_per_minute > tuning.max_human_cpm,
        linear_movement: movement.sample_count >= 3
            && movement.path_straightness > tuning.straightness_ceiling,
        no_tremor: movement.sample_count >= 3 && movement.tremor < tuning.tremor_floor,
    }
}

fn verify(
    movement: &MouseMovementPattern,
    typing: &TypingPattern,
    events: &[InteractionEvent],
    statistics: &BehavioralStatistics,
    flags: &AutomationFlags,
    tuning: &BehaviorTuning,
) -> HumanVerification {
    let mouse_humanness = mouse_humanness(movement, statistics, flags, tuning);
    let keyboard_humanness = keyboard_humanness(typing, tuning);
    let touch_humanness = touch_humanness(events);

    let weight_sum = tuning.mouse_weight + tuning.keyboard_weight + tuning.touch_weight;
    let overall_humanness = if weight_sum > 0.0 {
        (tuning.mouse_weight * mouse_humanness
            + tuning.keyboard_weight * keyboard_humanness
            + tuning.touch_weight * touch_humanness)
            / weight_sum
    } else {
        0.5
    };

    let mut bot_probability = 0.0;
    if flags.perfect_timing {
        bot_probability += tuning.perfect_timing_weight;
    }
    if flags.implausible_speed {
        bot_probability += tuning.implausible_speed_weight;
    }
    if flags.linear_movement {
        bot_probability += tuning.linear_movement_weight;
    }
    if flags.no_tremor {
        bot_probability += tuning.no_tremor_weight;
    }

    HumanVerification {
        mouse_humanness,
        keyboard_humanness,
        touch_humanness,
        overall_humanness: overall_humanness.clamp(0.0, 1.0),
        bot_probability: bot_probability.min(1.0),
    }
}

fn mouse_humanness(
    movement: &MouseMovementPattern,
    statistics: &BehavioralStatistics,
    flags: &AutomationFlags,
    tuning: &BehaviorTuning,
) -> f64 {
    if movement.sample_count < 3 {
        return 0.5;
    }

    let entropy_ceiling =
        stats::max_entropy(movement.sample_count + 1, tuning.entropy_bins_max).max(1.0);
    let entropy_norm = (statistics.velocity_entropy / entropy_ceiling).clamp(0.0, 1.0);

    let mut score = 0.5;
    score += 0.3 * (entropy_norm - 0.3);
    if flags.linear_movement {
        score -= 0.25;
    } else if movement.path_straightness < 0.9 {
        score += 0.1;
    }
    if flags.no_tremor {
        score -= 0.2;
    } else {
        score += 0.1;
    }
    // Humans hesitate; an utterly pause-free or pause-only trace reads
    // scripted.
    if movement.pause_ratio > 0.02 && movement.pause_ratio < 0.8 {
        score += 0.1;
    }
    score.clamp(0.0, 1.0)
}

fn keyboard_humanness(typing: &TypingPattern, tuning: &BehaviorTuning) -> f64 {
    if typing.keystroke_count < 4 {
        return 0.5;
    }

    let mut score: f64 = 0.5;
    if typing.dwell_variance < tuning.perfect_timing_variance {
        score -= 0.35;
    } else if typing.dwell_variance > 25.0 {
        score += 0.2;
    }
    if typing.chars_per_minute > tuning.max_human_cpm {
        score -= 0.3;
    }
    if typing.backspace_ratio > 0.01 {
        score += 0.1;
    }
    score.clamp(0.0, 1.0)
}

fn touch_humanness(events: &[InteractionEvent]) -> f64 {
    let touch_times: Vec<f64> = events
        .iter()
        .filter(|e| {
            matches!(
                e.kind,
                EventKind::TouchStart | EventKind::TouchMove | EventKind::TouchEnd
            )
        })
        .map(|e| e.timestamp_ms as f64)
        .collect();
    if touch_times.len() < 3 {
        return 0.5;
    }

    let intervals: Vec<f64> = touch_times.windows(2).map(|w| w[1] - w[0]).collect();
    if stats::variance(&intervals) < 1.0 {
        0.2
    } else {
        0.7
    }
}
