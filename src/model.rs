//! # Data Model
//!
//! Core data structures for visitor identification: signal groups and their
//! values, the collector submission payload, persisted fingerprint records
//! and visitor associations, and the ephemeral match candidate.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// One fingerprinting modality. Ordering is the canonical serialization
/// order and is part of the hash contract, so variants must not be
/// reordered.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Canvas,
    Webgl,
    Audio,
    Fonts,
    Webrtc,
    Wasm,
    Sensors,
    Plugins,
    Behavioral,
}

impl SignalKind {
    /// All kinds, in canonical order.
    pub const ALL: [SignalKind; 9] = [
        SignalKind::Canvas,
        SignalKind::Webgl,
        SignalKind::Audio,
        SignalKind::Fonts,
        SignalKind::Webrtc,
        SignalKind::Wasm,
        SignalKind::Sensors,
        SignalKind::Plugins,
        SignalKind::Behavioral,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SignalKind::Canvas => "canvas",
            SignalKind::Webgl => "webgl",
            SignalKind::Audio => "audio",
            SignalKind::Fonts => "fonts",
            SignalKind::Webrtc => "webrtc",
            SignalKind::Wasm => "wasm",
            SignalKind::Sensors => "sensors",
            SignalKind::Plugins => "plugins",
            SignalKind::Behavioral => "behavioral",
        }
    }

    /// Core groups: at least one of these must be present for a submission
    /// to be identifiable at all.
    pub fn is_core(&self) -> bool {
        matches!(self, SignalKind::Canvas | SignalKind::Audio)
    }

    /// Whether this group participates in canonicalization and hashing.
    /// Behavioral telemetry is scored, never hashed.
    pub fn is_hashable(&self) -> bool {
        !matches!(self, SignalKind::Behavioral)
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single sub-feature value inside a signal group.
///
/// Untagged so collector payloads stay plain JSON; lists cover enumerable
/// features such as font and plugin inventories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignalValue {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl SignalValue {
    /// Render to the canonical string form used for hashing and matching.
    /// List elements are sorted so submission order never leaks into the
    /// digest; `\u{1f}` separates elements and never occurs in collector
    /// output.
    pub fn canonical_text(&self) -> String {
        match self {
            SignalValue::Bool(b) => b.to_string(),
            SignalValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 9.0e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{n}")
                }
            }
            SignalValue::Text(s) => s.clone(),
            SignalValue::List(items) => {
                let mut sorted = items.clone();
                sorted.sort();
                sorted.join("\u{1f}")
            }
        }
    }

    /// Whether the canonical form is a multi-element set (Jaccard-comparable).
    pub fn is_enumerable(&self) -> bool {
        matches!(self, SignalValue::List(_))
    }
}

/// Raw signal payload: group -> sub-feature name -> value.
pub type SignalMap = HashMap<SignalKind, HashMap<String, SignalValue>>;

/// A signal group after canonicalization: volatile sub-fields stripped,
/// remaining fields sorted by name, values rendered to canonical text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalGroup {
    pub kind: SignalKind,
    pub fields: Vec<(String, String)>,
}

impl CanonicalGroup {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Deterministic, volatility-stripped form of a submission's signals.
/// Groups appear in [`SignalKind::ALL`] order; identical inputs always
/// canonicalize identically regardless of map iteration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalFingerprint {
    pub groups: Vec<CanonicalGroup>,
}

impl CanonicalFingerprint {
    pub fn group(&self, kind: SignalKind) -> Option<&CanonicalGroup> {
        self.groups.iter().find(|g| g.kind == kind)
    }

    /// Total sub-fields across all groups.
    pub fn field_count(&self) -> usize {
        self.groups.iter().map(|g| g.fields.len()).sum()
    }
}

/// Identifier for a persisted fingerprint record. Assigned at first
/// creation of a given exact hash and never changes afterwards.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FingerprintId(pub Uuid);

impl FingerprintId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FingerprintId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FingerprintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "F{}", self.0)
    }
}

/// Identifier for a logical visitor: a device/user identity that may own
/// several fingerprints accumulated as signals drift.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct VisitorId(pub Uuid);

impl VisitorId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for VisitorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VisitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{}", self.0)
    }
}

/// Persisted fingerprint entity. `exact_hash` is unique in the store;
/// records are never deleted by this engine (retention is external).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerprintRecord {
    pub id: FingerprintId,
    pub exact_hash: String,
    pub fuzzy_hashes: Vec<String>,
    /// Canonical signal groups, kept for similarity scoring against later
    /// submissions.
    pub components: Vec<CanonicalGroup>,
    pub user_id: Option<String>,
    pub session_ids: Vec<String>,
    pub created_at_ms: u64,
    pub last_seen_at_ms: u64,
}

/// Link between a fingerprint and the visitor it was reconciled to.
/// At most one per fingerprint; the first successful write wins and the
/// link is permanent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitorAssociation {
    pub visitor_id: VisitorId,
    pub fingerprint_id: FingerprintId,
    pub confidence: f64,
    pub created_at_ms: u64,
}

/// Ranked output of the similarity matcher. Ephemeral: consumed by the
/// reconciliation decider, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchCandidate {
    pub fingerprint_id: FingerprintId,
    pub fingerprint_hash: String,
    pub similarity: f64,
    pub confidence: f64,
    /// Signal groups that contributed to the score.
    pub signals: Vec<SignalKind>,
    /// Qualified sub-field names (`group.field`) that agreed.
    pub matched_components: Vec<String>,
    pub last_seen_at_ms: u64,
}

/// Interaction event kinds accepted from the behavioral collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PointerMove,
    PointerDown,
    PointerUp,
    KeyDown,
    KeyUp,
    TouchStart,
    TouchMove,
    TouchEnd,
    Scroll,
}

/// Modifier key state carried alongside an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub meta: bool,
}

/// One privacy-filtered interaction event. Coordinates are pointer/touch
/// positions for pointer kinds and scroll deltas for `Scroll`; `key` is the
/// key name for key kinds and absent otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEvent {
    pub kind: EventKind,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub key: Option<String>,
    pub timestamp_ms: u64,
    #[serde(default)]
    pub modifiers: Modifiers,
}

/// One collector request: zero or more signal groups plus optional
/// behavioral telemetry and caller-supplied identifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub signals: SignalMap,
    #[serde(default)]
    pub events: Vec<InteractionEvent>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    /// Wall-clock observation time. Carried in the payload so the pipeline
    /// itself never reads a clock.
    #[serde(default)]
    pub observed_at_ms: u64,
}

impl Submission {
    /// Build a submission stamped with the current wall time.
    pub fn new(signals: SignalMap) -> Self {
        Self {
            signals,
            events: Vec::new(),
            user_id: None,
            session_id: None,
            observed_at_ms: now_ms(),
        }
    }

    /// Parse a collector payload. An absent `observed_at_ms` is stamped
    /// with the current wall time.
    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        let mut submission: Submission = serde_json::from_str(payload)?;
        if submission.observed_at_ms == 0 {
            submission.observed_at_ms = now_ms();
        }
        Ok(submission)
    }

    pub fn with_events(mut self, events: Vec<InteractionEvent>) -> Self {
        self.events = events;
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_text_sorts_lists() {
        let v = SignalValue::List(vec!["Verdana".into(), "Arial".into(), "Menlo".into()]);
        assert_eq!(v.canonical_text(), "Arial\u{1f}Menlo\u{1f}Verdana");
    }

    #[test]
    fn test_canonical_text_trims_integral_numbers() {
        assert_eq!(SignalValue::Number(44100.0).canonical_text(), "44100");
        assert_eq!(SignalValue::Number(1.25).canonical_text(), "1.25");
    }

    #[test]
    fn test_signal_kind_roles() {
        assert!(SignalKind::Canvas.is_core());
        assert!(SignalKind::Audio.is_core());
        assert!(!SignalKind::Fonts.is_core());
        assert!(!SignalKind::Behavioral.is_hashable());
        assert!(SignalKind::Canvas.is_hashable());
    }

    #[test]
    fn test_submission_from_json() {
        let payload = r#"{
            "signals": {
                "canvas": {"pixel_hash": "abc", "winding": true},
                "fonts": {"installed": ["Arial", "Menlo"]}
            },
            "events": [
                {"kind": "pointer_move", "x": 10.0, "y": 20.0, "timestamp_ms": 5}
            ],
            "session_id": "s-1"
        }"#;

        let submission = Submission::from_json(payload).expect("valid payload");
        assert_eq!(submission.session_id.as_deref(), Some("s-1"));
        assert_eq!(submission.events.len(), 1);
        assert!(submission.observed_at_ms > 0);
        let canvas = &submission.signals[&SignalKind::Canvas];
        assert_eq!(canvas["winding"], SignalValue::Bool(true));
    }
}
