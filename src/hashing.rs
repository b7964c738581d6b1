//! # Hash Synthesizer
//!
//! Derives one exact digest over the full canonical fingerprint and an
//! ordered set of progressively coarser fuzzy digests, each over a
//! stability-ranked subset of signal groups. A device whose canvas output
//! shifted after a driver update still matches on the more stable tiers.

use crate::model::{CanonicalFingerprint, CanonicalGroup, SignalKind};
use sha2::{Digest, Sha256};

/// Stability-ranked group subsets, most stable first. Tier 0 holds the
/// groups least prone to drift; each later tier widens toward the groups
/// most affected by OS/driver churn. Canvas and sensors only enter the
/// final tier.
pub const FUZZY_TIERS: [&[SignalKind]; 5] = [
    &[SignalKind::Fonts, SignalKind::Webgl, SignalKind::Wasm],
    &[
        SignalKind::Fonts,
        SignalKind::Webgl,
        SignalKind::Wasm,
        SignalKind::Plugins,
    ],
    &[
        SignalKind::Fonts,
        SignalKind::Webgl,
        SignalKind::Wasm,
        SignalKind::Plugins,
        SignalKind::Webrtc,
    ],
    &[
        SignalKind::Fonts,
        SignalKind::Webgl,
        SignalKind::Wasm,
        SignalKind::Plugins,
        SignalKind::Webrtc,
        SignalKind::Audio,
    ],
    &[
        SignalKind::Fonts,
        SignalKind::Webgl,
        SignalKind::Wasm,
        SignalKind::Plugins,
        SignalKind::Webrtc,
        SignalKind::Audio,
        SignalKind::Sensors,
        SignalKind::Canvas,
    ],
];

/// A fuzzy digest together with the stability rank of the tier it was
/// computed over (0 = most stable).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierHash {
    pub rank: u8,
    pub digest: String,
}

/// Output of hash synthesis: the exact digest plus one digest per fuzzy
/// tier that had at least one group present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintHashes {
    pub exact: String,
    pub fuzzy: Vec<TierHash>,
}

impl FingerprintHashes {
    /// Fuzzy digests in tier order, for the store contract.
    pub fn fuzzy_digests(&self) -> Vec<String> {
        self.fuzzy.iter().map(|t| t.digest.clone()).collect()
    }
}

/// Synthesize exact and fuzzy digests from a canonical fingerprint.
///
/// Exact-hash equality implies fuzzy-hash equality (both are pure
/// functions of the canonical form); the converse does not hold.
pub fn synthesize(canonical: &CanonicalFingerprint) -> FingerprintHashes {
    let exact = digest_groups(None, canonical.groups.iter());

    let mut fuzzy = Vec::with_capacity(FUZZY_TIERS.len());
    for (rank, tier) in FUZZY_TIERS.iter().enumerate() {
        let groups: Vec<&CanonicalGroup> = canonical
            .groups
            .iter()
            .filter(|g| tier.contains(&g.kind))
            .collect();
        // An all-absent tier would digest nothing and collide across
        // unrelated sparse devices; skip it instead.
        if groups.is_empty() {
            continue;
        }
        fuzzy.push(TierHash {
            rank: rank as u8,
            digest: digest_groups(Some(rank as u8), groups.into_iter()),
        });
    }

    FingerprintHashes { exact, fuzzy }
}

/// Digest a sequence of canonical groups into lowercase hex. The tier tag
/// is folded into the digest so equal group subsets in different tiers
/// still produce distinct hashes. Field names, values, and group names are
/// framed with separator bytes that cannot appear in canonical text.
fn digest_groups<'a>(
    tier: Option<u8>,
    groups: impl Iterator<Item = &'a CanonicalGroup>,
) -> String {
    let mut hasher = Sha256::new();
    if let Some(rank) = tier {
        hasher.update([0xf0, rank]);
    }
    for group in groups {
        hasher.update(group.kind.name().as_bytes());
        hasher.update([0x1d]);
        for (name, value) in &group.fields {
            hasher.update(name.as_bytes());
            hasher.update([0x1f]);
            hasher.update(value.as_bytes());
            hasher.update([0x1e]);
        }
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::canonicalize;
    use crate::model::{SignalMap, SignalValue};
    use std::collections::HashMap;

    fn full_signals() -> SignalMap {
        let mut signals = SignalMap::new();
        let mut canvas = HashMap::new();
        canvas.insert("pixel_hash".to_string(), SignalValue::Text("c1".into()));
        canvas.insert("render_time_ms".to_string(), SignalValue::Number(12.0));
        signals.insert(SignalKind::Canvas, canvas);

        let mut webgl = HashMap::new();
        webgl.insert("renderer".to_string(), SignalValue::Text("ANGLE".into()));
        webgl.insert("vendor".to_string(), SignalValue::Text("Google".into()));
        signals.insert(SignalKind::Webgl, webgl);

        let mut fonts = HashMap::new();
        fonts.insert(
            "installed".to_string(),
            SignalValue::List(vec!["Arial".into(), "Menlo".into()]),
        );
        signals.insert(SignalKind::Fonts, fonts);

        let mut audio = HashMap::new();
        audio.insert("dsp_hash".to_string(), SignalValue::Text("a1".into()));
        signals.insert(SignalKind::Audio, audio);
        signals
    }

    #[test]
    fn test_exact_hash_deterministic() {
        let canonical = canonicalize(&full_signals()).expect("valid");
        let first = synthesize(&canonical);
        let second = synthesize(&canonical);
        assert_eq!(first, second);
    }

    #[test]
    fn test_volatile_field_change_preserves_exact_hash() {
        let mut drifted = full_signals();
        drifted
            .get_mut(&SignalKind::Canvas)
            .expect("canvas present")
            .insert("render_time_ms".to_string(), SignalValue::Number(48.0));

        let base = synthesize(&canonicalize(&full_signals()).expect("valid"));
        let after = synthesize(&canonicalize(&drifted).expect("valid"));
        assert_eq!(base.exact, after.exact);
        assert_eq!(base.fuzzy, after.fuzzy);
    }

    #[test]
    fn test_canvas_drift_keeps_stable_tiers() {
        let mut drifted = full_signals();
        drifted
            .get_mut(&SignalKind::Canvas)
            .expect("canvas present")
            .insert("pixel_hash".to_string(), SignalValue::Text("c2".into()));

        let base = synthesize(&canonicalize(&full_signals()).expect("valid"));
        let after = synthesize(&canonicalize(&drifted).expect("valid"));

        assert_ne!(base.exact, after.exact);
        // Tiers without canvas are untouched; the canvas-bearing tier moves.
        assert_eq!(base.fuzzy[0], after.fuzzy[0]);
        let base_last = base.fuzzy.last().expect("tiers present");
        let after_last = after.fuzzy.last().expect("tiers present");
        assert_eq!(base_last.rank, 4);
        assert_ne!(base_last.digest, after_last.digest);
    }

    #[test]
    fn test_absent_tier_groups_skip_tier() {
        let mut signals = SignalMap::new();
        let mut audio = HashMap::new();
        audio.insert("dsp_hash".to_string(), SignalValue::Text("a1".into()));
        signals.insert(SignalKind::Audio, audio);

        let hashes = synthesize(&canonicalize(&signals).expect("valid"));
        // Audio first appears in tier 3; tiers 0-2 have nothing to digest.
        let ranks: Vec<u8> = hashes.fuzzy.iter().map(|t| t.rank).collect();
        assert_eq!(ranks, vec![3, 4]);
    }

    #[test]
    fn test_same_groups_different_tiers_distinct_digests() {
        let mut signals = SignalMap::new();
        let mut audio = HashMap::new();
        audio.insert("dsp_hash".to_string(), SignalValue::Text("a1".into()));
        signals.insert(SignalKind::Audio, audio);

        let hashes = synthesize(&canonicalize(&signals).expect("valid"));
        // Both emitted tiers cover exactly {audio}; the tier tag keeps the
        // digests apart.
        assert_ne!(hashes.fuzzy[0].digest, hashes.fuzzy[1].digest);
    }

    #[test]
    fn test_distinct_devices_distinct_hashes() {
        let base = synthesize(&canonicalize(&full_signals()).expect("valid"));

        let mut other = full_signals();
        other
            .get_mut(&SignalKind::Webgl)
            .expect("webgl present")
            .insert("renderer".to_string(), SignalValue::Text("Mesa".into()));
        let after = synthesize(&canonicalize(&other).expect("valid"));

        assert_ne!(base.exact, after.exact);
        assert_ne!(base.fuzzy[0].digest, after.fuzzy[0].digest);
    }
}
