//! # Canonicalizer
//!
//! Normalizes a raw multi-signal submission into an ordered, deterministic
//! structure suitable for hashing: volatile sub-fields are stripped per a
//! fixed per-group exclusion list, remaining fields are sorted by name, and
//! groups are emitted in a fixed order. Pure function of the input — no
//! I/O, no clock, no randomness.

use crate::error::IdentifyError;
use crate::model::{CanonicalFingerprint, CanonicalGroup, SignalKind, SignalMap};

/// Volatility class of a sub-feature. Stable fields survive OS and driver
/// updates; semi-stable fields drift occasionally; volatile fields are
/// non-reproducible between collections and are stripped before hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Volatility {
    Stable,
    SemiStable,
    Volatile,
}

/// Sub-fields that are never reproducible across collections of the same
/// device: per-run timings, raw sensor samples, ephemeral network state.
/// The list is fixed; changing it changes every exact hash.
fn excluded_fields(kind: SignalKind) -> &'static [&'static str] {
    match kind {
        SignalKind::Canvas => &["render_time_ms", "paint_count", "data_url"],
        SignalKind::Webgl => &["frame_rate", "timer_query"],
        SignalKind::Audio => &["output_latency", "processing_time_ms"],
        SignalKind::Fonts => &["load_time_ms"],
        SignalKind::Webrtc => &["local_candidates", "candidate_id", "gathering_time_ms"],
        SignalKind::Sensors => &[
            "accelerometer_sample",
            "gyroscope_sample",
            "magnetometer_sample",
        ],
        SignalKind::Wasm | SignalKind::Plugins | SignalKind::Behavioral => &[],
    }
}

/// Classify a sub-feature of a group.
pub fn volatility(kind: SignalKind, field: &str) -> Volatility {
    if excluded_fields(kind).contains(&field) {
        return Volatility::Volatile;
    }
    match kind {
        SignalKind::Canvas | SignalKind::Audio | SignalKind::Sensors => Volatility::SemiStable,
        _ => Volatility::Stable,
    }
}

/// Canonicalize a submission's signal groups.
///
/// Behavioral telemetry is excluded (it is scored, never hashed). Errors:
/// [`IdentifyError::NoUsableSignals`] when no hashable group is present,
/// [`IdentifyError::MissingRequiredGroup`] when neither canvas nor audio
/// is present.
pub fn canonicalize(signals: &SignalMap) -> Result<CanonicalFingerprint, IdentifyError> {
    let mut groups = Vec::new();

    for kind in SignalKind::ALL {
        if !kind.is_hashable() {
            continue;
        }
        let Some(raw) = signals.get(&kind) else {
            continue;
        };

        let mut fields: Vec<(String, String)> = raw
            .iter()
            .filter(|(name, _)| !excluded_fields(kind).contains(&name.as_str()))
            .map(|(name, value)| (name.clone(), value.canonical_text()))
            .collect();
        if fields.is_empty() {
            continue;
        }
        fields.sort_by(|a, b| a.0.cmp(&b.0));
        groups.push(CanonicalGroup { kind, fields });
    }

    if groups.is_empty() {
        return Err(IdentifyError::NoUsableSignals);
    }
    if !groups.iter().any(|g| g.kind.is_core()) {
        return Err(IdentifyError::MissingRequiredGroup);
    }

    Ok(CanonicalFingerprint { groups })
}
