//! Candidate Scoring and Selection Tests
//! Test File: scoring_tests.rs
//! Covers: scorer ranking scenario, determinism, monotonicity, clamp, selector tie-break

mod helpers;

use helpers::{candidate, page};
use tunegrab_ai::models::SearchItem;
use tunegrab_ai::services::scorer::{score, ScoreWeights, MAX_SCORE};
use tunegrab_ai::services::Selector;

const QUERY: &str = "Shape of You Ed Sheeran";

/// TC-SC-001: Official video outranks cover and reaction
/// **Type:** Integration | **Priority:** P0
#[test]
fn tc_sc_001_official_video_ranks_first() {
    // Given: three candidates differing only in title and channel
    let official = candidate(
        "official",
        "Shape of You - Ed Sheeran (Official Music Video)",
        "Ed Sheeran",
        "4:24",
        "2,000,000 views",
    );
    let cover = candidate("cover", "Shape of You - Piano Cover", "KeyTunes", "4:24", "2,000,000 views");
    let reaction = candidate("reaction", "Reaction to Shape of You", "ReactZone", "4:24", "2,000,000 views");

    // When: the selector scores them
    let selection = Selector::default().select(QUERY, page(vec![reaction, cover, official]));

    // Then: the official video is selected and the reaction ranks last
    let best = selection.best.as_ref().expect("a match");
    assert_eq!(best.candidate.id, "official");

    let ranked: Vec<&str> = selection
        .ranked()
        .iter()
        .map(|e| e.candidate.id.as_str())
        .collect();
    assert_eq!(ranked, vec!["official", "cover", "reaction"]);

    let trace_of = |id: &str| {
        selection
            .evaluations
            .iter()
            .find(|e| e.candidate.id == id)
            .map(|e| e.outcome.trace.descriptions().map(String::from).collect::<Vec<_>>())
            .unwrap()
    };

    let official_trace = trace_of("official");
    assert!(official_trace.iter().any(|d| d == "Title contains 'official'"));
    assert!(official_trace.iter().any(|d| d == "Title contains 'music'"));
    assert!(official_trace.iter().any(|d| d == "Title word found in channel name"));
    assert!(!official_trace.iter().any(|d| d.contains("keyword")));

    let cover_trace = trace_of("cover");
    assert!(cover_trace.iter().any(|d| d == "cover keyword x1"));
    assert!(!cover_trace.iter().any(|d| d.contains("official")));

    assert!(trace_of("reaction").iter().any(|d| d == "reaction keyword x1"));
}

/// TC-SC-002: Scoring is deterministic
/// **Type:** Unit | **Priority:** P0
#[test]
fn tc_sc_002_scoring_is_deterministic() {
    let record = candidate(
        "a",
        "Shape of You (Live at the BRITs) [Lyrics]",
        "BRIT Awards",
        "3:59",
        "12,345 views",
    );
    let weights = ScoreWeights::default();

    let first = score(QUERY, &record, &weights);
    let second = score(QUERY, &record, &weights);

    assert_eq!(first, second);
    assert_eq!(first.trace.steps(), second.trace.steps());
}

/// TC-SC-003: Adding "official" raises the score by exactly the official bonus
/// **Type:** Unit | **Priority:** P0
#[test]
fn tc_sc_003_official_monotonicity() {
    let weights = ScoreWeights::default();
    let plain = candidate("a", "Ed Sheeran Shape of You video", "Uploads", "3:55", "500 views");
    let official = candidate("a", "Ed Sheeran Shape of You official video", "Uploads", "3:55", "500 views");

    let without = score("Shape of You", &plain, &weights);
    let with = score("Shape of You", &official, &weights);

    assert!(with.score < MAX_SCORE);
    assert!(with.score > without.score);
    assert!((with.score - without.score - weights.official_bonus).abs() < 1e-9);
}

/// TC-SC-004: No score exceeds the maximum
/// **Type:** Unit | **Priority:** P0
#[test]
fn tc_sc_004_score_is_clamped() {
    let mut record = candidate(
        "a",
        "Shape of You - Ed Sheeran (Official Music Video)",
        "Ed Sheeran",
        "4:24",
        "6,512,345,111 views",
    );
    record.published = Some("7 years ago".to_string());

    let outcome = score(QUERY, &record, &ScoreWeights::default());

    assert_eq!(outcome.score, MAX_SCORE);
    let last = outcome.trace.steps().last().unwrap();
    assert_eq!(last.description, "Clamped to 100");
    assert_eq!(last.total, MAX_SCORE);
}

/// TC-SC-005: Equal scores keep the first-seen candidate
/// **Type:** Unit | **Priority:** P0
#[test]
fn tc_sc_005_tie_keeps_first_seen() {
    let first = candidate("first", "Shape of You", "Uploads", "3:55", "5,000 views");
    let second = candidate("second", "Shape of You", "Uploads", "3:55", "5,000 views");

    let selection = Selector::default().select(QUERY, page(vec![first, second]));

    assert_eq!(selection.evaluations.len(), 2);
    assert_eq!(
        selection.evaluations[0].outcome.score,
        selection.evaluations[1].outcome.score
    );
    assert_eq!(selection.best.unwrap().candidate.id, "first");
}

/// TC-SC-006: Candidates across pages are all evaluated
/// **Type:** Unit | **Priority:** P1
#[test]
fn tc_sc_006_paginated_results() {
    let items = vec![
        SearchItem::Page { number: 1, total: 2 },
        SearchItem::Candidate(candidate("p1", "Shape of You Karaoke", "Sing King", "3:55", "9 views")),
        SearchItem::Page { number: 2, total: 2 },
        SearchItem::Candidate(candidate("p2", "Shape of You", "Ed Sheeran", "3:55", "9,000 views")),
    ];

    let selection = Selector::default().select(QUERY, items);

    assert_eq!(selection.pages_seen, 2);
    assert_eq!(selection.evaluations.len(), 2);
    assert_eq!(selection.evaluations[1].position, 1);
    assert_eq!(selection.best.unwrap().candidate.id, "p2");
}

/// TC-SC-007: Empty results are a normal no-match
/// **Type:** Unit | **Priority:** P0
#[test]
fn tc_sc_007_empty_results_no_match() {
    let selection = Selector::default().select(QUERY, page(Vec::new()));
    assert!(!selection.is_match());
    assert_eq!(selection.best_score, 0.0);
}
