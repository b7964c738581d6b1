//! # Similarity Matcher
//!
//! Scores an incoming fingerprint against stored candidates retrieved by
//! fuzzy-hash intersection. Per-group similarity and per-group
//! discriminative weight are behind a strategy trait so weighting policy
//! can evolve without touching the matcher's control flow.

use crate::config::MatchTuning;
use crate::hashing::{FingerprintHashes, FUZZY_TIERS};
use crate::model::{CanonicalFingerprint, CanonicalGroup, MatchCandidate, SignalKind};
use crate::store::{FingerprintStore, PopulationStats};
use anyhow::Result;
use std::collections::HashSet;

/// Similarity of one signal group between two fingerprints.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupScore {
    pub kind: SignalKind,
    /// Weighted agreement of overlapping sub-fields, in [0, 1].
    pub similarity: f64,
    /// Number of sub-fields actually compared.
    pub compared: usize,
    /// Qualified names of sub-fields that agreed.
    pub matched: Vec<String>,
}

/// Pluggable scoring policy: how similar two groups are, and how much a
/// group's agreement should count.
pub trait SimilarityStrategy {
    /// Similarity over the sub-fields present in both groups; `None` when
    /// nothing overlaps.
    fn group_similarity(&self, ours: &CanonicalGroup, theirs: &CanonicalGroup)
        -> Option<GroupScore>;

    /// Discriminative-power weight for a group, given observed population
    /// cardinality.
    fn group_weight(&self, kind: SignalKind, population: &PopulationStats) -> f64;
}

/// Cardinality at which the population boost saturates; matches the store
/// sampler cap.
const CARDINALITY_SATURATION: f64 = 4096.0;

/// Default policy: exact-match ratio for structured fields, Jaccard
/// overlap for enumerable (list-valued) fields, static per-group priors
/// scaled by observed population cardinality.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedFieldStrategy;

impl WeightedFieldStrategy {
    /// Static discriminative prior per group. Full font inventories
    /// separate devices far better than a boolean capability flag.
    fn prior(kind: SignalKind) -> f64 {
        match kind {
            SignalKind::Fonts => 1.0,
            SignalKind::Canvas => 0.9,
            SignalKind::Webgl => 0.85,
            SignalKind::Audio => 0.8,
            SignalKind::Plugins => 0.6,
            SignalKind::Webrtc => 0.5,
            SignalKind::Sensors => 0.35,
            SignalKind::Wasm => 0.25,
            SignalKind::Behavioral => 0.0,
        }
    }
}

impl SimilarityStrategy for WeightedFieldStrategy {
    fn group_similarity(
        &self,
        ours: &CanonicalGroup,
        theirs: &CanonicalGroup,
    ) -> Option<GroupScore> {
        let mut total = 0.0;
        let mut compared = 0usize;
        let mut matched = Vec::new();

        for (name, value) in &ours.fields {
            let Some(other) = theirs.field(name) else {
                continue;
            };
            let similarity = field_similarity(value, other);
            total += similarity;
            compared += 1;
            if similarity >= 0.9 {
                matched.push(format!("{}.{}", ours.kind, name));
            }
        }

        if compared == 0 {
            return None;
        }
        Some(GroupScore {
            kind: ours.kind,
            similarity: total / compared as f64,
            compared,
            matched,
        })
    }

    fn group_weight(&self, kind: SignalKind, population: &PopulationStats) -> f64 {
        let prior = Self::prior(kind);
        let distinct = population.distinct(kind) as f64;
        let boost = 1.0 + 0.5 * (distinct.ln_1p() / CARDINALITY_SATURATION.ln_1p()).min(1.0);
        prior * boost
    }
}

/// Agreement of one canonical field value pair. List-valued fields carry
/// the `\u{1f}` element separator and compare by Jaccard overlap; scalars
/// compare exactly.
fn field_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    if a.contains('\u{1f}') || b.contains('\u{1f}') {
        return jaccard(a, b);
    }
    0.0
}

fn jaccard(a: &str, b: &str) -> f64 {
    let set_a: HashSet<&str> = a.split('\u{1f}').filter(|s| !s.is_empty()).collect();
    let set_b: HashSet<&str> = b.split('\u{1f}').filter(|s| !s.is_empty()).collect();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        return 0.0;
    }
    set_a.intersection(&set_b).count() as f64 / union as f64
}

/// Find stored fingerprints matching the submission, ranked by descending
/// confidence, at most `max_results`. Zero candidates is an empty result,
/// not an error.
pub fn find_matches(
    hashes: &FingerprintHashes,
    canonical: &CanonicalFingerprint,
    store: &dyn FingerprintStore,
    tuning: &MatchTuning,
    strategy: &dyn SimilarityStrategy,
) -> Result<Vec<MatchCandidate>> {
    let digests = hashes.fuzzy_digests();
    let mut records = store.find_by_fuzzy_hashes(&digests)?;
    if records.len() > tuning.candidate_cap {
        tracing::debug!(
            total = records.len(),
            cap = tuning.candidate_cap,
            "candidate set exceeds cap, truncating"
        );
        records.truncate(tuning.candidate_cap);
    }

    let population = store.population();
    let mut candidates: Vec<MatchCandidate> = records
        .iter()
        .filter_map(|record| score_candidate(record, hashes, canonical, &population, tuning, strategy))
        .filter(|c| c.confidence >= tuning.match_floor)
        .collect();

    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.last_seen_at_ms.cmp(&a.last_seen_at_ms))
    });
    candidates.truncate(tuning.max_results);

    tracing::debug!(
        candidates = candidates.len(),
        best = candidates.first().map(|c| c.confidence),
        "similarity matching complete"
    );
    Ok(candidates)
}

fn score_candidate(
    record: &crate::model::FingerprintRecord,
    hashes: &FingerprintHashes,
    canonical: &CanonicalFingerprint,
    population: &PopulationStats,
    tuning: &MatchTuning,
    strategy: &dyn SimilarityStrategy,
) -> Option<MatchCandidate> {
    let mut weighted = 0.0;
    let mut weight_sum = 0.0;
    let mut compared_fields = 0usize;
    let mut signals = Vec::new();
    let mut matched_components = Vec::new();

    for group in &canonical.groups {
        let Some(theirs) = record.components.iter().find(|g| g.kind == group.kind) else {
            continue;
        };
        let Some(score) = strategy.group_similarity(group, theirs) else {
            continue;
        };
        let weight = strategy.group_weight(group.kind, population);
        if weight <= 0.0 {
            continue;
        }
        weighted += weight * score.similarity;
        weight_sum += weight;
        compared_fields += score.compared;
        signals.push(group.kind);
        matched_components.extend(score.matched);
    }

    if weight_sum <= 0.0 {
        return None;
    }
    let similarity = (weighted / weight_sum).clamp(0.0, 1.0);

    // Stability rank of the best shared fuzzy tier. Candidates arrive via
    // fuzzy intersection, so one normally exists; a candidate sharing no
    // tier is penalized as if it matched past the least-stable tier.
    let best_rank = hashes
        .fuzzy
        .iter()
        .filter(|tier| record.fuzzy_hashes.contains(&tier.digest))
        .map(|tier| tier.rank)
        .min();
    let tier_factor = match best_rank {
        Some(rank) => 1.0 - tuning.tier_confidence_step * rank as f64,
        None => 1.0 - tuning.tier_confidence_step * FUZZY_TIERS.len() as f64,
    };

    let evidence = (compared_fields as f64 / tuning.evidence_saturation.max(1) as f64).min(1.0);
    let evidence_factor = 0.5 + 0.5 * evidence;

    let confidence = (similarity * evidence_factor * tier_factor).clamp(0.0, 1.0);

    Some(MatchCandidate {
        fingerprint_id: record.id,
        fingerprint_hash: record.exact_hash.clone(),
        similarity,
        confidence,
        signals,
        matched_components,
        last_seen_at_ms: record.last_seen_at_ms,
    })
}
