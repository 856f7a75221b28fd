mod helpers;

use helpers::{at_similarity, test_search, unit, FixedProvider, StemBucketProvider};
use nexus_knowledge::knowledge::debug::RiskLevel;
use nexus_knowledge::knowledge::{
    ChunkType, DebugInvestigator, IngestRequest, Investigation, Metadata,
};
use serde_json::json;

fn investigator(provider: FixedProvider) -> DebugInvestigator {
    DebugInvestigator::new(test_search(provider))
}

#[test]
fn proven_fix_found_above_threshold() {
    let provider = FixedProvider::new([
        ("pool exhausted", unit(0)),
        ("close connections in finally", at_similarity(0.75)),
        ("raise pool size", at_similarity(0.60)),
    ]);
    let debugger = investigator(provider);
    let search = debugger.search();
    search.ingest_error("raise pool size", Some("weak"), "").unwrap();
    search
        .ingest_error("close connections in finally", Some("strong"), "")
        .unwrap();

    let report = debugger
        .investigate(&Investigation::new("pool exhausted"))
        .unwrap();
    assert_eq!(report.past_errors.len(), 2);
    assert!(report.has_proven_fix);
    assert_eq!(report.proven_fix.as_ref().unwrap().chunk.source_id, "strong");
    assert!(debugger.quick_check("pool exhausted").unwrap());
    assert!(report
        .summary()
        .contains("Proven fix: close connections in finally..."));
}

#[test]
fn no_proven_fix_below_threshold() {
    let provider = FixedProvider::new([
        ("pool exhausted", unit(0)),
        ("raise pool size", at_similarity(0.65)),
    ]);
    let debugger = investigator(provider);
    debugger
        .search()
        .ingest_error("raise pool size", Some("weak"), "")
        .unwrap();

    let report = debugger
        .investigate(&Investigation::new("pool exhausted"))
        .unwrap();
    assert_eq!(report.past_errors.len(), 1);
    assert!(!report.has_proven_fix);
    assert!(report.proven_fix.is_none());
    assert!(!debugger.quick_check("pool exhausted").unwrap());
    assert!(report.summary().ends_with("No proven fix found"));
}

#[test]
fn phases_use_their_own_types_and_thresholds() {
    let provider = FixedProvider::new([
        ("crash", unit(0)),
        ("err-hit", at_similarity(0.32)),
        ("task-miss", at_similarity(0.32)),
        ("task-hit", at_similarity(0.40)),
        ("code-hit", at_similarity(0.31)),
    ]);
    let debugger = investigator(provider);
    let search = debugger.search();
    search.ingest_error("err-hit", Some("err-hit"), "").unwrap();
    search.ingest_task("task-miss", Some("task-miss"), "").unwrap();
    search.ingest_task("task-hit", Some("task-hit"), "").unwrap();
    search.ingest_code_change("code-hit", Some("code-hit"), "").unwrap();

    let report = debugger.investigate(&Investigation::new("crash")).unwrap();
    let ids = |hits: &[nexus_knowledge::knowledge::ScoredChunk]| -> Vec<String> {
        hits.iter().map(|h| h.chunk.source_id.clone()).collect()
    };
    // errors and code take 0.30; tasks take 0.35
    assert_eq!(ids(&report.past_errors), vec!["err-hit"]);
    assert_eq!(ids(&report.related_tasks), vec!["task-hit"]);
    assert_eq!(ids(&report.recent_code_changes), vec!["code-hit"]);
    assert!(report.directive_analysis.is_none());

    let summary = report.summary();
    let lines: Vec<&str> = summary.lines().collect();
    assert_eq!(
        lines,
        vec!["Past errors: 1", "Related tasks: 1", "Code changes: 1", "No proven fix found"]
    );
}

#[test]
fn past_error_phase_returns_up_to_ten() {
    let debugger = DebugInvestigator::new(test_search(StemBucketProvider));
    for i in 0..14 {
        debugger
            .search()
            .ingest_error(&format!("segfault in parser stage {i}"), None, "")
            .unwrap();
    }
    let report = debugger
        .investigate(&Investigation::new("segfault in parser stage"))
        .unwrap();
    assert_eq!(report.past_errors.len(), 10);
}

#[test]
fn file_path_joins_the_code_change_query() {
    let provider = FixedProvider::new([
        ("panic", unit(0)),
        ("panic src/lib.rs", unit(5)),
        ("touched lib.rs", unit(5)),
    ]);
    let debugger = investigator(provider);
    debugger
        .search()
        .ingest_code_change("touched lib.rs", Some("change"), "")
        .unwrap();

    let without = debugger.investigate(&Investigation::new("panic")).unwrap();
    assert!(without.recent_code_changes.is_empty());

    let with = debugger
        .investigate(&Investigation::new("panic").file_path("src/lib.rs"))
        .unwrap();
    assert_eq!(with.recent_code_changes.len(), 1);
    assert_eq!(with.file_path.as_deref(), Some("src/lib.rs"));
}

#[test]
fn directive_analysis_reports_risk_and_cost() {
    let provider = FixedProvider::new([
        ("migrate billing", unit(0)),
        ("billing migration v1", at_similarity(0.9)),
        ("billing migration v2", at_similarity(0.8)),
    ]);
    let debugger = investigator(provider);
    let search = debugger.search();
    let meta = |v: serde_json::Value| -> Metadata { v.as_object().cloned().unwrap() };
    search
        .ingest(
            IngestRequest::new(ChunkType::DirectiveSummary, "billing migration v1")
                .source_id("d1")
                .metadata(meta(json!({"outcome": "failed", "cost": 4.0}))),
        )
        .unwrap();
    search
        .ingest(
            IngestRequest::new(ChunkType::DirectiveSummary, "billing migration v2")
                .source_id("d2")
                .metadata(meta(json!({"outcome": "success", "cost": 2.0}))),
        )
        .unwrap();

    let report = debugger
        .investigate(&Investigation::new("migrate billing").with_directive_analysis())
        .unwrap();
    let analysis = report.directive_analysis.as_ref().unwrap();
    assert_eq!(analysis.similar_directives.len(), 2);
    assert_eq!(analysis.risk, RiskLevel::High);
    let cost = analysis.cost_estimate.as_ref().unwrap();
    assert_eq!(cost.samples, 2);
    assert!((cost.predicted - 3.0).abs() < 1e-9);
    assert!(report.summary().ends_with("Risk: high"));
}

#[test]
fn empty_store_investigation_is_empty_not_an_error() {
    let debugger = DebugInvestigator::new(test_search(StemBucketProvider));
    let report = debugger
        .investigate(&Investigation::new("anything at all").with_directive_analysis())
        .unwrap();
    assert!(report.past_errors.is_empty());
    assert!(!report.has_proven_fix);
    assert_eq!(report.risk_level(), Some(RiskLevel::Unknown));
    assert!(!debugger.quick_check("anything at all").unwrap());
}

#[test]
fn closed_store_fails_the_investigation() {
    let debugger = DebugInvestigator::new(test_search(StemBucketProvider));
    debugger.close().unwrap();
    assert!(debugger.investigate(&Investigation::new("boom")).is_err());
}
