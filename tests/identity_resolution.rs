use revisit::test_support::{
    baseline_signals, submission_at, unrelated_signals, with_drifted_field,
};
use revisit::{Revisit, SignalKind, SignalValue};

#[test]
fn identical_resubmission_reuses_visitor() -> anyhow::Result<()> {
    let mut engine = Revisit::new();

    let first = engine.identify(submission_at(baseline_signals(), 1_000, "s1"))?;
    assert!(first.is_new_visitor);

    let second = engine.identify(submission_at(baseline_signals(), 2_000, "s2"))?;
    assert!(!second.is_new_visitor);
    assert_eq!(second.visitor_id, first.visitor_id);
    assert!(second.confidence > 0.99);

    // Exactly one fingerprint record: the resubmission merged into it.
    assert_eq!(engine.store().len(), 1);
    Ok(())
}

#[test]
fn resubmission_is_idempotent_across_repeats() -> anyhow::Result<()> {
    let mut engine = Revisit::new();
    let first = engine.identify(submission_at(baseline_signals(), 1_000, "s1"))?;

    for round in 0..5u64 {
        let repeat = engine.identify(submission_at(
            baseline_signals(),
            2_000 + round * 500,
            &format!("s{}", round + 2),
        ))?;
        assert_eq!(repeat.visitor_id, first.visitor_id);
        assert!(!repeat.is_new_visitor);
    }
    assert_eq!(engine.store().len(), 1);
    Ok(())
}

#[test]
fn canvas_drift_reconciles_on_stable_tiers() -> anyhow::Result<()> {
    let mut engine = Revisit::new();
    let first = engine.identify(submission_at(baseline_signals(), 1_000, "s1"))?;

    // Same device after a browser update shifted its canvas output.
    let drifted = with_drifted_field(
        baseline_signals(),
        SignalKind::Canvas,
        "pixel_hash",
        SignalValue::Text("1c00aa93d2f7".into()),
    );
    let second = engine.identify(submission_at(drifted, 2_000, "s2"))?;

    assert_eq!(second.visitor_id, first.visitor_id);
    assert!(!second.is_new_visitor);
    assert!(second.confidence >= 0.7);

    // Drifted exact hash: a second fingerprint record now belongs to the
    // same visitor.
    assert_eq!(engine.store().len(), 2);
    Ok(())
}

#[test]
fn audio_drift_reconciles_on_stable_tiers() -> anyhow::Result<()> {
    let mut engine = Revisit::new();
    let first = engine.identify(submission_at(baseline_signals(), 1_000, "s1"))?;

    let drifted = with_drifted_field(
        baseline_signals(),
        SignalKind::Audio,
        "dsp_hash",
        SignalValue::Text("124.04347527516080".into()),
    );
    let second = engine.identify(submission_at(drifted, 2_000, "s2"))?;

    assert_eq!(second.visitor_id, first.visitor_id);
    assert!(second.confidence >= 0.7);
    Ok(())
}

#[test]
fn unrelated_device_gets_new_visitor() -> anyhow::Result<()> {
    let mut engine = Revisit::new();
    let first = engine.identify(submission_at(baseline_signals(), 1_000, "s1"))?;

    let third = engine.identify(submission_at(unrelated_signals(7), 2_000, "s2"))?;
    assert!(third.is_new_visitor);
    assert_ne!(third.visitor_id, first.visitor_id);
    assert_eq!(engine.store().len(), 2);
    Ok(())
}

#[test]
fn distinct_devices_stay_distinct() -> anyhow::Result<()> {
    let mut engine = Revisit::new();
    let mut visitors = Vec::new();
    for seed in 0..8u64 {
        let outcome = engine.identify(submission_at(
            unrelated_signals(seed * 31 + 1),
            1_000 + seed,
            &format!("s{seed}"),
        ))?;
        assert!(outcome.is_new_visitor);
        visitors.push(outcome.visitor_id);
    }
    visitors.sort();
    visitors.dedup();
    assert_eq!(visitors.len(), 8);
    Ok(())
}

#[test]
fn strict_profile_splits_what_lenient_merges() -> anyhow::Result<()> {
    use revisit::{MatchTuning, MemoryStore};

    // Drift three groups at once; similarity lands between the strict and
    // lenient thresholds.
    let drifted = with_drifted_field(
        with_drifted_field(
            with_drifted_field(
                baseline_signals(),
                SignalKind::Canvas,
                "pixel_hash",
                SignalValue::Text("changed-1".into()),
            ),
            SignalKind::Webrtc,
            "sdp_hash",
            SignalValue::Text("changed-2".into()),
        ),
        SignalKind::Plugins,
        "installed",
        SignalValue::List(vec!["WidevineCdm".into()]),
    );

    let mut lenient = Revisit::with_store_and_tuning(MemoryStore::new(), MatchTuning::lenient());
    let base = lenient.identify(submission_at(baseline_signals(), 1_000, "s1"))?;
    let merged = lenient.identify(submission_at(drifted.clone(), 2_000, "s2"))?;
    assert_eq!(merged.visitor_id, base.visitor_id);

    let mut strict = Revisit::with_store_and_tuning(MemoryStore::new(), MatchTuning::strict());
    let base = strict.identify(submission_at(baseline_signals(), 1_000, "s1"))?;
    let split = strict.identify(submission_at(drifted, 2_000, "s2"))?;
    assert_ne!(split.visitor_id, base.visitor_id);
    assert!(split.is_new_visitor);
    Ok(())
}

#[test]
fn caller_session_and_user_ids_are_recorded() -> anyhow::Result<()> {
    let mut engine = Revisit::new();
    let mut submission = submission_at(baseline_signals(), 1_000, "session-a");
    submission.user_id = Some("user-42".to_string());

    let outcome = engine.identify(submission)?;
    assert_eq!(outcome.session_id, "session-a");

    let stored = engine
        .store()
        .get_by_exact_hash(
            &revisit::hashing::synthesize(
                &revisit::canonical::canonicalize(&baseline_signals()).expect("valid"),
            )
            .exact,
        )?
        .expect("record persisted");
    assert_eq!(stored.user_id.as_deref(), Some("user-42"));
    assert_eq!(stored.session_ids, vec!["session-a"]);
    Ok(())
}
