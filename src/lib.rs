//! # Revisit
//!
//! A returning-visitor identification engine. Decides whether an incoming
//! multi-signal device fingerprint belongs to a previously seen visitor —
//! without cookies or stable identifiers, tolerant of signal drift from
//! OS/browser/driver updates — and scores interaction telemetry for
//! human-vs-automation likelihood.
//!
//! The pipeline per submission: canonicalize signals, synthesize exact and
//! stability-tiered fuzzy hashes, match against stored fingerprints by
//! fuzzy-hash intersection with weighted per-group similarity, then
//! reconcile to an existing visitor or mint a new one. Behavioral
//! telemetry is analyzed independently and never fails a request.

pub mod behavior;
pub mod canonical;
pub mod config;
pub mod error;
pub mod hashing;
pub mod matcher;
pub mod model;
pub mod reconcile;
pub mod stats;
pub mod store;
pub mod test_support;

// Re-export main types for convenience
pub use behavior::{BehavioralAnalysis, HumanVerification};
pub use config::{BehaviorTuning, MatchTuning};
pub use error::IdentifyError;
pub use hashing::FingerprintHashes;
pub use model::{
    CanonicalFingerprint, FingerprintId, FingerprintRecord, InteractionEvent, MatchCandidate,
    SignalKind, SignalValue, Submission, VisitorAssociation, VisitorId,
};
pub use store::{FingerprintStore, MemoryStore, PopulationStats};

use matcher::{SimilarityStrategy, WeightedFieldStrategy};
use reconcile::SubmissionContext;
use uuid::Uuid;

/// Response returned to the caller for one submission.
#[derive(Debug, Clone)]
pub struct Identification {
    pub visitor_id: VisitorId,
    pub session_id: String,
    pub is_new_visitor: bool,
    pub confidence: f64,
    /// Present when the submission carried behavioral telemetry.
    pub behavior: Option<BehavioralAnalysis>,
}

/// Main API for visitor identification.
pub struct Revisit {
    store: Box<dyn FingerprintStore>,
    tuning: MatchTuning,
    behavior: BehaviorTuning,
    strategy: Box<dyn SimilarityStrategy>,
}

impl Revisit {
    /// Create an engine over an in-memory store with balanced tuning.
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }

    /// Create an engine over a custom store implementation.
    pub fn with_store<S>(store: S) -> Self
    where
        S: FingerprintStore + 'static,
    {
        Self {
            store: Box::new(store),
            tuning: MatchTuning::default(),
            behavior: BehaviorTuning::default(),
            strategy: Box::new(WeightedFieldStrategy),
        }
    }

    pub fn with_store_and_tuning<S>(store: S, tuning: MatchTuning) -> Self
    where
        S: FingerprintStore + 'static,
    {
        Self {
            tuning,
            ..Self::with_store(store)
        }
    }

    pub fn set_behavior_tuning(&mut self, tuning: BehaviorTuning) {
        self.behavior = tuning;
    }

    /// Swap the similarity/weighting policy.
    pub fn set_strategy<S>(&mut self, strategy: S)
    where
        S: SimilarityStrategy + 'static,
    {
        self.strategy = Box::new(strategy);
    }

    pub fn store(&self) -> &dyn FingerprintStore {
        self.store.as_ref()
    }

    pub fn store_mut(&mut self) -> &mut dyn FingerprintStore {
        self.store.as_mut()
    }

    /// Identify the device behind one submission.
    ///
    /// Validation happens before any store interaction. Behavioral
    /// analysis is independent of matching and degrades to a neutral
    /// result rather than failing the request.
    pub fn identify(&mut self, submission: Submission) -> Result<Identification, IdentifyError> {
        let canonical = canonical::canonicalize(&submission.signals)?;
        let hashes = hashing::synthesize(&canonical);

        let behavior = if submission.events.is_empty() {
            None
        } else {
            Some(behavior::analyze(&submission.events, &self.behavior))
        };

        let session_id = submission
            .session_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let matches = matcher::find_matches(
            &hashes,
            &canonical,
            self.store.as_ref(),
            &self.tuning,
            self.strategy.as_ref(),
        )
        .map_err(IdentifyError::Store)?;

        let context = SubmissionContext {
            user_id: submission.user_id.clone(),
            session_id: Some(session_id.clone()),
            observed_at_ms: submission.observed_at_ms,
        };
        let outcome = reconcile::reconcile(
            self.store.as_mut(),
            &hashes,
            &canonical,
            &matches,
            &context,
            &self.tuning,
        )
        .map_err(IdentifyError::Store)?;

        tracing::debug!(
            visitor = %outcome.visitor_id,
            new = outcome.is_new_visitor,
            confidence = outcome.confidence,
            "submission identified"
        );

        Ok(Identification {
            visitor_id: outcome.visitor_id,
            session_id,
            is_new_visitor: outcome.is_new_visitor,
            confidence: outcome.confidence,
            behavior,
        })
    }
}

impl Default for Revisit {
    fn default() -> Self {
        Self::new()
    }
}
