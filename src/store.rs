//! # Store Module
//!
//! The keyed-store contract this engine depends on, plus an in-memory
//! reference implementation with a fuzzy-hash index. The concrete storage
//! technology behind the trait is irrelevant to the engine; only these
//! five operations and their conditional-write semantics matter.

use crate::model::{
    CanonicalGroup, FingerprintId, FingerprintRecord, SignalKind, VisitorAssociation,
};
use anyhow::Result;
use hashbrown::HashMap;
use rustc_hash::{FxHashMap, FxHashSet, FxHasher};
use std::hash::{Hash, Hasher};

/// Distinct-value counts per signal group, observed across all stored
/// fingerprints. Feeds discriminative-power weighting in the matcher:
/// groups with higher observed cardinality separate devices better.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulationStats {
    distinct: HashMap<SignalKind, usize>,
}

impl PopulationStats {
    pub fn distinct(&self, kind: SignalKind) -> usize {
        self.distinct.get(&kind).copied().unwrap_or(0)
    }

    pub fn set(&mut self, kind: SignalKind, count: usize) {
        self.distinct.insert(kind, count);
    }
}

/// Store operations required by the engine.
///
/// `upsert_fingerprint` with `if_absent_only` is the conditional create
/// that keeps exact-hash races idempotent: when the exact hash already
/// exists the stored record is returned unchanged. Without it, a repeat
/// observation merges: `last_seen_at_ms` advances, new session ids are
/// appended, and the original `id`/`created_at_ms` are preserved.
pub trait FingerprintStore {
    fn get_by_exact_hash(&self, hash: &str) -> Result<Option<FingerprintRecord>>;

    /// Records whose fuzzy hashes intersect the given set.
    fn find_by_fuzzy_hashes(&self, hashes: &[String]) -> Result<Vec<FingerprintRecord>>;

    fn upsert_fingerprint(
        &mut self,
        record: FingerprintRecord,
        if_absent_only: bool,
    ) -> Result<FingerprintRecord>;

    fn get_association(&self, fingerprint: FingerprintId) -> Result<Option<VisitorAssociation>>;

    /// Write an association only if none exists for the fingerprint; the
    /// winning association is returned either way (first writer wins).
    fn create_association_if_absent(
        &mut self,
        association: VisitorAssociation,
    ) -> Result<VisitorAssociation>;

    fn population(&self) -> PopulationStats;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cap on distinct-value samples tracked per group. Beyond this the
/// cardinality signal has long since saturated.
const POPULATION_SAMPLE_CAP: usize = 4096;

/// In-memory store: reference semantics for the trait and the default
/// backing for tests and single-process deployments.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: HashMap<FingerprintId, FingerprintRecord>,
    by_exact: HashMap<String, FingerprintId>,
    fuzzy_index: FxHashMap<String, Vec<FingerprintId>>,
    associations: HashMap<FingerprintId, VisitorAssociation>,
    population: HashMap<SignalKind, FxHashSet<u64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn observe_population(&mut self, components: &[CanonicalGroup]) {
        for group in components {
            let seen = self.population.entry(group.kind).or_default();
            if seen.len() >= POPULATION_SAMPLE_CAP {
                continue;
            }
            for (name, value) in &group.fields {
                let mut hasher = FxHasher::default();
                name.hash(&mut hasher);
                value.hash(&mut hasher);
                seen.insert(hasher.finish());
            }
        }
    }
}

impl FingerprintStore for MemoryStore {
    fn get_by_exact_hash(&self, hash: &str) -> Result<Option<FingerprintRecord>> {
        Ok(self
            .by_exact
            .get(hash)
            .and_then(|id| self.records.get(id))
            .cloned())
    }

    fn find_by_fuzzy_hashes(&self, hashes: &[String]) -> Result<Vec<FingerprintRecord>> {
        let mut seen = FxHashSet::default();
        let mut found = Vec::new();
        for hash in hashes {
            if let Some(ids) = self.fuzzy_index.get(hash) {
                for id in ids {
                    if seen.insert(*id) {
                        if let Some(record) = self.records.get(id) {
                            found.push(record.clone());
                        }
                    }
                }
            }
        }
        Ok(found)
    }

    fn upsert_fingerprint(
        &mut self,
        record: FingerprintRecord,
        if_absent_only: bool,
    ) -> Result<FingerprintRecord> {
        if let Some(existing_id) = self.by_exact.get(&record.exact_hash).copied() {
            let existing = self
                .records
                .get_mut(&existing_id)
                .ok_or_else(|| anyhow::anyhow!("exact index points at missing record"))?;
            if if_absent_only {
                return Ok(existing.clone());
            }
            existing.last_seen_at_ms = existing.last_seen_at_ms.max(record.last_seen_at_ms);
            for session in record.session_ids {
                if !existing.session_ids.contains(&session) {
                    existing.session_ids.push(session);
                }
            }
            if existing.user_id.is_none() {
                existing.user_id = record.user_id;
            }
            return Ok(existing.clone());
        }

        self.by_exact.insert(record.exact_hash.clone(), record.id);
        for hash in &record.fuzzy_hashes {
            self.fuzzy_index.entry(hash.clone()).or_default().push(record.id);
        }
        self.observe_population(&record.components);
        self.records.insert(record.id, record.clone());
        Ok(record)
    }

    fn get_association(&self, fingerprint: FingerprintId) -> Result<Option<VisitorAssociation>> {
        Ok(self.associations.get(&fingerprint).cloned())
    }

    fn create_association_if_absent(
        &mut self,
        association: VisitorAssociation,
    ) -> Result<VisitorAssociation> {
        Ok(self
            .associations
            .entry(association.fingerprint_id)
            .or_insert(association)
            .clone())
    }

    fn population(&self) -> PopulationStats {
        let mut stats = PopulationStats::default();
        for (kind, seen) in &self.population {
            stats.set(*kind, seen.len());
        }
        stats
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VisitorId;

    fn record(exact: &str, fuzzy: &[&str], at: u64) -> FingerprintRecord {
        FingerprintRecord {
            id: FingerprintId::new(),
            exact_hash: exact.to_string(),
            fuzzy_hashes: fuzzy.iter().map(|h| h.to_string()).collect(),
            components: vec![CanonicalGroup {
                kind: SignalKind::Canvas,
                fields: vec![("pixel_hash".to_string(), exact.to_string())],
            }],
            user_id: None,
            session_ids: vec![format!("s-{at}")],
            created_at_ms: at,
            last_seen_at_ms: at,
        }
    }

    #[test]
    fn test_upsert_creates_then_merges() -> Result<()> {
        let mut store = MemoryStore::new();
        let first = store.upsert_fingerprint(record("e1", &["f1"], 100), false)?;

        let mut repeat = record("e1", &["f1"], 200);
        repeat.session_ids = vec!["s-200".to_string()];
        let merged = store.upsert_fingerprint(repeat, false)?;

        assert_eq!(merged.id, first.id);
        assert_eq!(merged.created_at_ms, 100);
        assert_eq!(merged.last_seen_at_ms, 200);
        assert_eq!(merged.session_ids, vec!["s-100", "s-200"]);
        assert_eq!(store.len(), 1);
        Ok(())
    }

    #[test]
    fn test_upsert_if_absent_only_never_mutates() -> Result<()> {
        let mut store = MemoryStore::new();
        let first = store.upsert_fingerprint(record("e1", &["f1"], 100), true)?;
        let second = store.upsert_fingerprint(record("e1", &["f1"], 999), true)?;

        assert_eq!(second, first);
        assert_eq!(second.last_seen_at_ms, 100);
        Ok(())
    }

    #[test]
    fn test_fuzzy_lookup_intersects_and_dedups() -> Result<()> {
        let mut store = MemoryStore::new();
        store.upsert_fingerprint(record("e1", &["f1", "f2"], 1), false)?;
        store.upsert_fingerprint(record("e2", &["f2", "f3"], 2), false)?;
        store.upsert_fingerprint(record("e3", &["f9"], 3), false)?;

        let hits = store.find_by_fuzzy_hashes(&["f1".to_string(), "f2".to_string()])?;
        let mut hashes: Vec<&str> = hits.iter().map(|r| r.exact_hash.as_str()).collect();
        hashes.sort();
        assert_eq!(hashes, vec!["e1", "e2"]);

        let none = store.find_by_fuzzy_hashes(&["missing".to_string()])?;
        assert!(none.is_empty());
        Ok(())
    }

    #[test]
    fn test_association_first_writer_wins() -> Result<()> {
        let mut store = MemoryStore::new();
        let stored = store.upsert_fingerprint(record("e1", &["f1"], 1), false)?;

        let first = VisitorAssociation {
            visitor_id: VisitorId::new(),
            fingerprint_id: stored.id,
            confidence: 0.9,
            created_at_ms: 1,
        };
        let second = VisitorAssociation {
            visitor_id: VisitorId::new(),
            fingerprint_id: stored.id,
            confidence: 0.99,
            created_at_ms: 2,
        };

        let won_first = store.create_association_if_absent(first.clone())?;
        let won_second = store.create_association_if_absent(second)?;

        assert_eq!(won_first, first);
        assert_eq!(won_second, first);
        assert_eq!(store.get_association(stored.id)?, Some(first));
        Ok(())
    }

    #[test]
    fn test_population_counts_distinct_values() -> Result<()> {
        let mut store = MemoryStore::new();
        store.upsert_fingerprint(record("e1", &["f1"], 1), false)?;
        store.upsert_fingerprint(record("e2", &["f2"], 2), false)?;
        // Same canvas value as e1: no new distinct sample.
        let mut dup = record("e3", &["f3"], 3);
        dup.components = vec![CanonicalGroup {
            kind: SignalKind::Canvas,
            fields: vec![("pixel_hash".to_string(), "e1".to_string())],
        }];
        store.upsert_fingerprint(dup, false)?;

        assert_eq!(store.population().distinct(SignalKind::Canvas), 2);
        assert_eq!(store.population().distinct(SignalKind::Fonts), 0);
        Ok(())
    }
}
