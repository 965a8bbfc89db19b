//! End-to-end: generate the shipped suites, then replay what was generated.

use std::collections::BTreeSet;
use std::sync::Arc;

use tvx_gen::{
    suites, Driver, FsSink, GenError, GeneratorConfig, Generator, JobStatus, MemorySink,
    Verdict, VectorGenItem, VectorGroup,
};
use tvx_runtime_vm::VmConfig;
use tvx_schema::{Metadata, Selector, TestVector, HINT_NEGATE};

fn config(parallelism: usize, fail_fast: bool) -> GeneratorConfig {
    GeneratorConfig {
        parallelism,
        fail_fast,
        ..GeneratorConfig::default()
    }
}

fn generate_all() -> Vec<(String, TestVector)> {
    let sink = Arc::new(MemorySink::new());
    let generator = Generator::new(config(4, false), sink.clone());
    let expected: usize = suites::all().iter().map(|s| s.len()).sum();
    for suite in suites::all() {
        suite.submit(&generator).expect("submit");
    }
    let report = generator.finish();
    for failure in report.failures() {
        eprintln!("{failure:?}");
    }
    assert!(report.is_success(), "{} failures", report.failed);
    assert_eq!(report.total(), expected);
    assert_eq!(sink.len(), expected);
    sink.take()
}

fn find<'a>(vectors: &'a [(String, TestVector)], id: &str) -> &'a TestVector {
    vectors
        .iter()
        .map(|(_, v)| v)
        .find(|v| v.id() == id)
        .expect("vector present")
}

// ════════════════════════════════════════════════════════════════════════════════
// GENERATION
// ════════════════════════════════════════════════════════════════════════════════

#[test]
fn every_suite_generates_and_replays() {
    let vectors = generate_all();
    let driver = Driver::default();

    for (group, vector) in &vectors {
        assert!(vector.validate().is_ok(), "{group}/{}", vector.id());
        let report = driver.check(vector).expect("replay");
        if vector.has_hint(HINT_NEGATE) {
            assert!(
                matches!(report.verdict, Verdict::NegatedAsExpected(_)),
                "{group}/{}: {:?}",
                vector.id(),
                report.verdict
            );
        } else {
            assert_eq!(report.verdict, Verdict::Passed, "{group}/{}", vector.id());
        }
    }
}

#[test]
fn group_names_carry_the_suite() {
    let vectors = generate_all();
    let groups: Vec<&str> = vectors.iter().map(|(g, _)| g.as_str()).collect();
    assert!(groups.contains(&"actor_creation/addresses"));
    assert!(groups.contains(&"tipset_ordering/duplicates"));

    let v = find(&vectors, "ok-transfer");
    let meta = v.meta.as_ref().expect("meta");
    assert_eq!(meta.gen.len(), 1);
    assert_eq!(meta.gen[0].source.as_deref(), Some(tvx_gen::DEFAULT_SOURCE));
}

#[test]
fn generation_is_deterministic() {
    let a = generate_all();
    let b = generate_all();
    assert_eq!(a.len(), b.len());
    for ((ga, va), (gb, vb)) in a.iter().zip(&b) {
        assert_eq!(ga, gb);
        assert_eq!(va.to_json().expect("json"), vb.to_json().expect("json"));
    }
}

#[test]
fn fs_sink_lays_out_suite_group_id() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = GeneratorConfig {
        output_dir: dir.path().to_path_buf(),
        ..config(2, false)
    };
    let sink = Arc::new(FsSink::new(cfg.output_dir.clone(), cfg.pretty));
    let generator = Generator::new(cfg, sink);
    for suite in suites::select(&["transfer".to_string()]) {
        suite.submit(&generator).expect("submit");
    }
    assert!(generator.finish().is_success());

    let path = dir.path().join("transfer").join("basic").join("ok-transfer.json");
    let raw = std::fs::read_to_string(&path).expect("written");
    let vector = TestVector::from_json(&raw).expect("parse");
    assert_eq!(Driver::default().check(&vector).expect("replay").verdict, Verdict::Passed);
}

// ════════════════════════════════════════════════════════════════════════════════
// FAILURE HANDLING
// ════════════════════════════════════════════════════════════════════════════════

fn empty_preconditions(id: &str) -> VectorGenItem {
    VectorGenItem::new(Metadata::new(id), |v| v.commit_preconditions().map(|_| ()))
}

fn trivial(id: &str) -> VectorGenItem {
    VectorGenItem::new(Metadata::new(id), |v| {
        v.account(tvx_schema::Protocol::Secp256k1, 1_000u64.into())?;
        v.commit_preconditions()?;
        v.commit_applies()?;
        Ok(())
    })
}

#[test]
fn failing_definition_is_reported() {
    let sink = Arc::new(MemorySink::new());
    let generator = Generator::new(config(2, false), sink.clone());
    generator
        .submit(VectorGroup::message("g", vec![empty_preconditions("bad"), trivial("good")]))
        .expect("submit");
    let report = generator.finish();
    assert_eq!((report.succeeded, report.failed), (1, 1));
    assert!(sink.get("g", "good").is_some());
    assert!(sink.get("g", "bad").is_none());
}

#[test]
fn panicking_definition_is_reported() {
    let generator = Generator::new(config(1, false), Arc::new(MemorySink::new()));
    generator
        .message_vector_group(
            "g",
            vec![VectorGenItem::new(Metadata::new("panics"), |_| panic!("boom"))],
        )
        .expect("submit");
    let report = generator.finish();
    assert_eq!(report.failed, 1);
    assert!(matches!(&report.outcomes[0].status, JobStatus::Failed(r) if r.contains("panicked")));
}

#[test]
fn fail_fast_cancels_queued_jobs() {
    let generator = Generator::new(config(1, true), Arc::new(MemorySink::new()));
    let mut items = vec![empty_preconditions("a-bad")];
    items.extend((0..4).map(|i| trivial(&format!("b-{i}"))));
    generator.message_vector_group("g", items).expect("submit");
    let report = generator.finish();
    assert_eq!(report.failed, 1);
    assert_eq!(report.cancelled, 4);
    assert_eq!(report.succeeded, 0);
}

#[test]
fn wait_blocks_until_submitted_jobs_finish() {
    let sink = Arc::new(MemorySink::new());
    let generator = Generator::new(config(3, false), sink.clone());
    let items = (0..6).map(|i| trivial(&format!("v-{i}"))).collect();
    generator.message_vector_group("g", items).expect("submit");
    generator.wait();
    assert_eq!(sink.len(), 6);
    assert_eq!(generator.finish().succeeded, 6);
}

// ════════════════════════════════════════════════════════════════════════════════
// IDS
// ════════════════════════════════════════════════════════════════════════════════

#[test]
fn shipped_ids_are_unique_per_group() {
    for suite in suites::all() {
        for group in &suite.groups {
            let mut seen = BTreeSet::new();
            for item in &group.items {
                assert!(seen.insert(item.id()), "{}/{}/{}", suite.name, group.name, item.id());
            }
        }
    }
}

#[test]
fn repeated_id_in_a_group_is_rejected_across_submissions() {
    let sink = Arc::new(MemorySink::new());
    let generator = Generator::new(config(2, false), sink.clone());
    generator
        .message_vector_group("g", vec![trivial("same")])
        .expect("first");
    let err = generator
        .message_vector_group("g", vec![trivial("other"), trivial("same")])
        .expect_err("same id again");
    assert!(matches!(
        err,
        GenError::DuplicateId { ref group, ref id } if group == "g" && id == "same"
    ));
    // The same id is fine in another group.
    generator
        .message_vector_group("h", vec![trivial("same")])
        .expect("other group");

    let report = generator.finish();
    assert!(report.is_success());
    assert_eq!(report.succeeded, 2);
    assert_eq!(sink.len(), report.succeeded);
    assert!(sink.get("g", "other").is_none());
}

#[test]
fn ids_that_leave_the_output_root_are_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("out");
    let cfg = GeneratorConfig {
        output_dir: out.clone(),
        ..config(1, false)
    };
    let sink = Arc::new(FsSink::new(out.clone(), false));
    let generator = Generator::new(cfg, sink);
    let cases = [("g", "../../escaped"), ("g", "nested/id"), ("../g", "v"), ("/g", "v")];
    for (group, id) in cases {
        assert!(
            matches!(
                generator.message_vector_group(group, vec![trivial(id)]),
                Err(GenError::InvalidName { .. })
            ),
            "{group} {id}"
        );
    }
    let report = generator.finish();
    assert_eq!(report.total(), 0);
    assert!(!dir.path().join("escaped.json").exists());
    assert!(!out.exists());
}

// ════════════════════════════════════════════════════════════════════════════════
// DRIVER
// ════════════════════════════════════════════════════════════════════════════════

#[test]
fn tampered_receipt_fails_replay() {
    let vectors = generate_all();
    let mut vector = find(&vectors, "ok-transfer").clone();
    let receipt = vector.post.receipts[0].as_mut().expect("receipt");
    receipt.exit_code = 16;
    let report = Driver::default().check(&vector).expect("replay");
    match report.verdict {
        Verdict::Failed(failures) => assert!(failures.iter().any(|f| f.what == "receipt 0")),
        other => panic!("expected failure, got {other:?}"),
    }
}

#[test]
fn unsupported_selector_is_skipped() {
    let vectors = generate_all();
    let vector = find(&vectors, "fails-caller-validation-none");
    let driver = Driver::new(Selector::new(), VmConfig::default());
    assert!(matches!(
        driver.check(vector).expect("check").verdict,
        Verdict::Skipped(_)
    ));
}

#[test]
fn negated_vector_that_matches_fails() {
    let vectors = generate_all();
    let vector = find(&vectors, "fails-unparsable-init-actor-exec-msg");
    let mut supported = Selector::new();
    supported.insert(tvx_builders::SELECTOR_CHAOS_ACTOR.to_string(), "true".to_string());
    // Same decode class the vector was generated with.
    let driver = Driver::new(supported, VmConfig::default());
    assert!(driver.check(vector).expect("check").is_failure());
}
