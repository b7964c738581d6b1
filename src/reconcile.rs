//! # Reconciliation Decider
//!
//! Applies the confidence threshold to the best match and decides whether
//! to reuse an existing visitor identity or mint a new one, then persists
//! the fingerprint record and the visitor association. The fingerprint
//! upsert is always issued before the association write, so an
//! association can never reference a nonexistent fingerprint.

use crate::config::MatchTuning;
use crate::hashing::FingerprintHashes;
use crate::model::{
    CanonicalFingerprint, FingerprintId, FingerprintRecord, MatchCandidate, VisitorAssociation,
    VisitorId,
};
use crate::store::FingerprintStore;
use anyhow::Result;

/// Outcome of reconciling one submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub visitor_id: VisitorId,
    pub is_new_visitor: bool,
    pub confidence: f64,
    pub fingerprint_id: FingerprintId,
}

/// Per-submission context the decider needs beyond the match results.
#[derive(Debug, Clone, Default)]
pub struct SubmissionContext {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub observed_at_ms: u64,
}

/// Decide and persist.
///
/// Best match at or above the threshold reuses that fingerprint's
/// association; a matched fingerprint with no association is an
/// inconsistent prior write, recovered by minting a new visitor rather
/// than failing the request. The association write is conditional, so a
/// concurrent first writer wins and both submissions converge on the same
/// visitor.
pub fn reconcile(
    store: &mut dyn FingerprintStore,
    hashes: &FingerprintHashes,
    canonical: &CanonicalFingerprint,
    matches: &[MatchCandidate],
    context: &SubmissionContext,
    tuning: &MatchTuning,
) -> Result<Reconciliation> {
    let best = matches.first();

    let (proposed, minted, confidence) = match best {
        Some(candidate) if candidate.confidence >= tuning.confidence_threshold => {
            match store.get_association(candidate.fingerprint_id)? {
                Some(association) => {
                    tracing::debug!(
                        visitor = %association.visitor_id,
                        fingerprint = %candidate.fingerprint_id,
                        confidence = candidate.confidence,
                        "reusing visitor for matched fingerprint"
                    );
                    (association.visitor_id, false, candidate.confidence)
                }
                None => {
                    tracing::warn!(
                        fingerprint = %candidate.fingerprint_id,
                        "matched fingerprint has no visitor association, minting new visitor"
                    );
                    (VisitorId::new(), true, candidate.confidence)
                }
            }
        }
        _ => {
            let confidence = best.map(|c| c.confidence).unwrap_or(0.0);
            (VisitorId::new(), true, confidence)
        }
    };

    let record = FingerprintRecord {
        id: FingerprintId::new(),
        exact_hash: hashes.exact.clone(),
        fuzzy_hashes: hashes.fuzzy_digests(),
        components: canonical.groups.clone(),
        user_id: context.user_id.clone(),
        session_ids: context.session_id.iter().cloned().collect(),
        created_at_ms: context.observed_at_ms,
        last_seen_at_ms: context.observed_at_ms,
    };
    // Create-if-absent keyed by exact hash; a repeat observation keeps the
    // original id and merges session state.
    let stored = store.upsert_fingerprint(record, false)?;

    let winner = store.create_association_if_absent(VisitorAssociation {
        visitor_id: proposed,
        fingerprint_id: stored.id,
        confidence,
        created_at_ms: context.observed_at_ms,
    })?;

    // If an earlier association already owned this fingerprint, the mint
    // lost the race (or the fingerprint was a repeat observation) and the
    // established visitor stands.
    let is_new_visitor = minted && winner.visitor_id == proposed;

    Ok(Reconciliation {
        visitor_id: winner.visitor_id,
        is_new_visitor,
        confidence,
        fingerprint_id: stored.id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::canonicalize;
    use crate::hashing::synthesize;
    use crate::model::{SignalKind, SignalMap, SignalValue};
    use crate::store::MemoryStore;
    use std::collections::HashMap;

    fn signals() -> SignalMap {
        let mut signals = SignalMap::new();
        let mut canvas = HashMap::new();
        canvas.insert("pixel_hash".to_string(), SignalValue::Text("c1".into()));
        signals.insert(SignalKind::Canvas, canvas);
        signals
    }

    fn context(at: u64, session: &str) -> SubmissionContext {
        SubmissionContext {
            user_id: None,
            session_id: Some(session.to_string()),
            observed_at_ms: at,
        }
    }

    #[test]
    fn test_no_matches_mints_new_visitor() -> Result<()> {
        let mut store = MemoryStore::new();
        let canonical = canonicalize(&signals()).expect("valid");
        let hashes = synthesize(&canonical);

        let outcome = reconcile(
            &mut store,
            &hashes,
            &canonical,
            &[],
            &context(100, "s1"),
            &MatchTuning::default(),
        )?;

        assert!(outcome.is_new_visitor);
        assert_eq!(outcome.confidence, 0.0);
        assert_eq!(store.len(), 1);
        assert!(store.get_association(outcome.fingerprint_id)?.is_some());
        Ok(())
    }

    #[test]
    fn test_sub_threshold_match_never_reuses() -> Result<()> {
        let mut store = MemoryStore::new();
        let canonical = canonicalize(&signals()).expect("valid");
        let hashes = synthesize(&canonical);

        let first = reconcile(
            &mut store,
            &hashes,
            &canonical,
            &[],
            &context(100, "s1"),
            &MatchTuning::default(),
        )?;

        // A below-threshold candidate pointing at the stored fingerprint.
        let weak = MatchCandidate {
            fingerprint_id: first.fingerprint_id,
            fingerprint_hash: hashes.exact.clone(),
            similarity: 0.5,
            confidence: 0.5,
            signals: vec![SignalKind::Canvas],
            matched_components: vec![],
            last_seen_at_ms: 100,
        };

        let mut drifted = signals();
        drifted
            .get_mut(&SignalKind::Canvas)
            .expect("canvas")
            .insert("pixel_hash".to_string(), SignalValue::Text("c2".into()));
        let canonical2 = canonicalize(&drifted).expect("valid");
        let hashes2 = synthesize(&canonical2);

        let second = reconcile(
            &mut store,
            &hashes2,
            &canonical2,
            &[weak],
            &context(200, "s2"),
            &MatchTuning::default(),
        )?;

        assert!(second.is_new_visitor);
        assert_ne!(second.visitor_id, first.visitor_id);
        Ok(())
    }

    #[test]
    fn test_matched_fingerprint_without_association_recovers() -> Result<()> {
        let mut store = MemoryStore::new();
        let canonical = canonicalize(&signals()).expect("valid");
        let hashes = synthesize(&canonical);

        // Simulate a partial prior write: fingerprint stored, association
        // never created.
        let orphan = FingerprintRecord {
            id: FingerprintId::new(),
            exact_hash: "orphan".to_string(),
            fuzzy_hashes: vec!["fz".to_string()],
            components: canonical.groups.clone(),
            user_id: None,
            session_ids: vec![],
            created_at_ms: 50,
            last_seen_at_ms: 50,
        };
        let orphan = store.upsert_fingerprint(orphan, false)?;

        let strong = MatchCandidate {
            fingerprint_id: orphan.id,
            fingerprint_hash: orphan.exact_hash.clone(),
            similarity: 0.95,
            confidence: 0.95,
            signals: vec![SignalKind::Canvas],
            matched_components: vec![],
            last_seen_at_ms: 50,
        };

        let outcome = reconcile(
            &mut store,
            &hashes,
            &canonical,
            &[strong],
            &context(100, "s1"),
            &MatchTuning::default(),
        )?;

        assert!(outcome.is_new_visitor);
        assert_eq!(outcome.confidence, 0.95);
        Ok(())
    }

    #[test]
    fn test_exact_resubmission_converges_on_existing_visitor() -> Result<()> {
        let mut store = MemoryStore::new();
        let canonical = canonicalize(&signals()).expect("valid");
        let hashes = synthesize(&canonical);

        let first = reconcile(
            &mut store,
            &hashes,
            &canonical,
            &[],
            &context(100, "s1"),
            &MatchTuning::default(),
        )?;

        // Resubmission with an empty match list still converges: the
        // conditional association write finds the first visitor.
        let second = reconcile(
            &mut store,
            &hashes,
            &canonical,
            &[],
            &context(200, "s2"),
            &MatchTuning::default(),
        )?;

        assert_eq!(second.visitor_id, first.visitor_id);
        assert!(!second.is_new_visitor);
        assert_eq!(second.fingerprint_id, first.fingerprint_id);

        let record = store
            .get_by_exact_hash(&hashes.exact)?
            .expect("record stored");
        assert_eq!(record.session_ids, vec!["s1", "s2"]);
        assert_eq!(record.last_seen_at_ms, 200);
        Ok(())
    }
}
