//! Acquisition Orchestrator Tests
//! Test File: orchestrator_tests.rs
//! Covers: stage routing, failure semantics, relocation naming and collisions, progress events

mod helpers;

use helpers::{candidate, doubles, doubles_with, page, with_thumbnail, FakeExtractor, FakeIdentifier, FakeSearch, FakeTagger};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tunegrab_ai::models::{watch_url, JobStage, JobState, RecognizedMetadata, StageStatus};
use tunegrab_ai::workflow::{AcquireSettings, JobEvent, Orchestrator};

const QUERY: &str = "Shape of You Ed Sheeran";

fn official() -> tunegrab_ai::models::CandidateRecord {
    with_thumbnail(candidate(
        "JGwWNGJdvx8",
        "Shape of You - Ed Sheeran (Official Music Video)",
        "Ed Sheeran",
        "4:24",
        "2,000,000 views",
    ))
}

fn settings(tmp: &TempDir) -> AcquireSettings {
    AcquireSettings::new(tmp.path().join("progress"))
}

/// TC-OR-001: Empty search results fail at selection with a no-match detail
/// **Type:** Integration | **Priority:** P0
#[tokio::test]
async fn tc_or_001_no_candidates_is_failed_selecting() {
    // Given: a search provider returning nothing
    let tmp = TempDir::new().unwrap();
    let d = doubles(FakeSearch::returning(page(Vec::new())));
    let orchestrator = Orchestrator::new(d.collaborators, settings(&tmp));

    // When: a query job runs
    let job = orchestrator.acquire_query(QUERY, None).await;

    // Then: FAILED(selecting), nothing downloaded
    assert_eq!(job.state, JobState::Failed(JobStage::Selecting));
    let (stage, detail) = job.failure().unwrap();
    assert_eq!(stage, JobStage::Selecting);
    assert!(detail.to_lowercase().contains("no match"));
    assert!(d.extractor.calls().is_empty());
    assert!(job.ended_at.is_some());
}

/// TC-OR-002: Only unviable candidates is also a no-match
/// **Type:** Integration | **Priority:** P1
#[tokio::test]
async fn tc_or_002_unviable_candidates_no_match() {
    let tmp = TempDir::new().unwrap();
    let reaction = candidate("r", "Reaction to Shape of You reaction review", "ReactZone", "4:24", "10 views");
    let d = doubles(FakeSearch::returning(page(vec![reaction])));
    let orchestrator = Orchestrator::new(d.collaborators, settings(&tmp));

    let job = orchestrator.acquire_query(QUERY, None).await;

    assert_eq!(job.state, JobState::Failed(JobStage::Selecting));
    assert!(job.candidate.is_none());
}

/// TC-OR-003: Happy path without a destination keeps the artifact in its namespace
/// **Type:** Integration | **Priority:** P0
#[tokio::test]
async fn tc_or_003_done_without_destination() {
    let tmp = TempDir::new().unwrap();
    let d = doubles(FakeSearch::returning(page(vec![official()])));
    let settings = settings(&tmp);
    let namespace = settings.namespace_for("JGwWNGJdvx8");
    let orchestrator = Orchestrator::new(d.collaborators, settings);

    let job = orchestrator.acquire_query(QUERY, None).await;

    assert_eq!(job.state, JobState::Done);
    assert_eq!(job.candidate.as_ref().unwrap().id, "JGwWNGJdvx8");
    assert!(job.score.unwrap() > 0.0);
    assert!(job.final_path.is_none());

    let artifact = job.artifact_path().unwrap();
    assert!(artifact.starts_with(&namespace));
    assert_eq!(
        artifact.file_name().unwrap().to_string_lossy(),
        "JGwWNGJdvx8_embedded_source.mp3"
    );
    assert!(artifact.exists());
    assert_eq!(job.warnings().count(), 0);
    assert_eq!(d.extractor.calls(), vec![watch_url("JGwWNGJdvx8")]);
}

/// TC-OR-004: Cover-art failure is a warning; the job still relocates
/// **Type:** Integration | **Priority:** P0
#[tokio::test]
async fn tc_or_004_cover_failure_is_warning() {
    // Given: a tagger that rejects cover art and a destination directory
    let tmp = TempDir::new().unwrap();
    let d = doubles_with(
        FakeSearch::returning(page(vec![official()])),
        FakeExtractor::default(),
        FakeTagger { fail_cover: true },
        Vec::new(),
    );
    let mut settings = settings(&tmp);
    settings.dest_dir = Some(tmp.path().join("library"));
    let orchestrator = Orchestrator::new(d.collaborators, settings);

    // When
    let job = orchestrator.acquire_query(QUERY, Some("Shape of You".to_string())).await;

    // Then: DONE, one enrichment warning, file named after the caller's name
    assert_eq!(job.state, JobState::Done);
    let warnings: Vec<_> = job.warnings().collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].stage, JobStage::Enriching);
    assert!(warnings[0].detail.contains("cover art not embedded"));

    let final_path = job.final_path.clone().unwrap();
    assert_eq!(final_path, tmp.path().join("library").join("Shape of You.mp3"));
    assert!(final_path.exists());
    assert!(!job.temp_path.as_ref().unwrap().exists());
}

/// TC-OR-005: Download failure is fatal
/// **Type:** Integration | **Priority:** P0
#[tokio::test]
async fn tc_or_005_download_failure_is_fatal() {
    let tmp = TempDir::new().unwrap();
    let d = doubles_with(
        FakeSearch::returning(page(vec![official()])),
        FakeExtractor::failing_for(&["JGwWNGJdvx8"]),
        FakeTagger::default(),
        Vec::new(),
    );
    let orchestrator = Orchestrator::new(d.collaborators, settings(&tmp));

    let job = orchestrator.acquire_query(QUERY, None).await;

    assert_eq!(job.state, JobState::Failed(JobStage::Downloading));
    assert!(job.failure().unwrap().1.contains("video unavailable"));
    assert!(job.temp_path.is_none());
}

/// TC-OR-006: Search collaborator failure fails at searching
/// **Type:** Integration | **Priority:** P1
#[tokio::test]
async fn tc_or_006_search_failure() {
    let tmp = TempDir::new().unwrap();
    let d = doubles(FakeSearch::failing());
    let orchestrator = Orchestrator::new(d.collaborators, settings(&tmp));

    let job = orchestrator.acquire_query(QUERY, None).await;

    assert_eq!(job.state, JobState::Failed(JobStage::Searching));
}

/// TC-OR-007: Identifier jobs skip search and selection but still get cover art
/// **Type:** Integration | **Priority:** P0
#[tokio::test]
async fn tc_or_007_identifier_job() {
    let tmp = TempDir::new().unwrap();
    let d = doubles(FakeSearch::failing());
    let orchestrator = Orchestrator::new(d.collaborators, settings(&tmp));

    let job = orchestrator.acquire_identifier("abc123", None).await;

    assert_eq!(job.state, JobState::Done);
    assert!(job.score.is_none());
    assert_eq!(d.extractor.calls(), vec![watch_url("abc123")]);
    assert!(job
        .outcomes
        .iter()
        .all(|o| o.stage != JobStage::Searching && o.stage != JobStage::Selecting));

    // Cover comes from the identifier's standard thumbnail
    assert_eq!(d.images.urls(), vec!["https://i.ytimg.com/vi/abc123/hqdefault.jpg"]);
    assert_eq!(job.warnings().count(), 0);
    assert_eq!(
        job.artifact_path().unwrap().file_name().unwrap().to_string_lossy(),
        "abc123_embedded_source.mp3"
    );
}

/// TC-OR-008: Recognized metadata drives artist/album folders
/// **Type:** Integration | **Priority:** P0
#[tokio::test]
async fn tc_or_008_recognized_metadata_naming() {
    let tmp = TempDir::new().unwrap();
    let mut d = doubles(FakeSearch::returning(page(vec![official()])));
    d.collaborators.identifier = Some(Arc::new(FakeIdentifier {
        metadata: Some(RecognizedMetadata {
            title: Some("Shape of You".into()),
            artist: Some("Ed Sheeran".into()),
            album: Some("Divide".into()),
            recording_id: None,
        }),
    }));
    let mut settings = settings(&tmp);
    settings.identify = true;
    settings.dest_dir = Some(tmp.path().join("library"));
    let orchestrator = Orchestrator::new(d.collaborators, settings);

    let job = orchestrator.acquire_query(QUERY, None).await;

    assert_eq!(job.state, JobState::Done);
    assert_eq!(
        job.final_path.unwrap(),
        tmp.path().join("library/Ed Sheeran/Divide/Shape of You.mp3")
    );
}

/// TC-OR-009: Recognition requested without an identifier is a warning
/// **Type:** Integration | **Priority:** P2
#[tokio::test]
async fn tc_or_009_identify_without_identifier_warns() {
    let tmp = TempDir::new().unwrap();
    let d = doubles(FakeSearch::returning(page(vec![official()])));
    let mut settings = settings(&tmp);
    settings.identify = true;
    let orchestrator = Orchestrator::new(d.collaborators, settings);

    let job = orchestrator.acquire_query(QUERY, None).await;

    assert_eq!(job.state, JobState::Done);
    assert!(job.warnings().any(|w| w.detail.contains("no identifier")));
}

/// TC-OR-010: Progress events bracket the job
/// **Type:** Integration | **Priority:** P1
#[tokio::test]
async fn tc_or_010_events_emitted() {
    let tmp = TempDir::new().unwrap();
    let d = doubles(FakeSearch::returning(page(Vec::new())));
    let (tx, mut rx) = mpsc::channel(32);
    let orchestrator = Orchestrator::new(d.collaborators, settings(&tmp)).with_events(tx);

    let job = orchestrator.acquire_query(QUERY, None).await;
    drop(orchestrator);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    assert!(matches!(
        events.first(),
        Some(JobEvent::StageStarted { stage: JobStage::Searching, .. })
    ));
    assert!(events.iter().any(|e| matches!(
        e,
        JobEvent::StageFinished { stage: JobStage::Selecting, status: StageStatus::Fatal, .. }
    )));
    match events.last() {
        Some(JobEvent::JobFinished { job_id, state, .. }) => {
            assert_eq!(*job_id, job.job_id);
            assert_eq!(*state, JobState::Failed(JobStage::Selecting));
        }
        other => panic!("unexpected last event: {:?}", other),
    }
}

/// TC-OR-011: Debug report written for a selection round
/// **Type:** Integration | **Priority:** P2
#[tokio::test]
async fn tc_or_011_debug_report_written() {
    let tmp = TempDir::new().unwrap();
    let d = doubles(FakeSearch::returning(page(Vec::new())));
    let mut settings = settings(&tmp);
    settings.debug_report_dir = Some(tmp.path().join("reports"));
    let orchestrator = Orchestrator::new(d.collaborators, settings);

    orchestrator.acquire_query(QUERY, None).await;

    assert!(tmp.path().join("reports/no-match-found.html").exists());
}

/// TC-OR-012: Two recordings recognized as the same song never overwrite each other
/// **Type:** Integration | **Priority:** P0
#[tokio::test]
async fn tc_or_012_destination_collision_keeps_both_files() {
    // Given: an identifier that recognizes every download as the same recording
    let tmp = TempDir::new().unwrap();
    let mut d = doubles(FakeSearch::failing());
    d.collaborators.identifier = Some(Arc::new(FakeIdentifier {
        metadata: Some(RecognizedMetadata {
            title: Some("Halo".into()),
            artist: Some("Beyonce".into()),
            album: None,
            recording_id: None,
        }),
    }));
    let mut settings = settings(&tmp);
    settings.identify = true;
    settings.dest_dir = Some(tmp.path().join("library"));
    let orchestrator = Orchestrator::new(d.collaborators, settings);

    // When: two different uploads are acquired
    let first = orchestrator.acquire_identifier("upload-one", None).await;
    let second = orchestrator.acquire_identifier("upload-two", None).await;

    // Then: both DONE, the second under a numbered name, both contents intact
    assert_eq!(first.state, JobState::Done);
    assert_eq!(second.state, JobState::Done);
    let first_path = first.final_path.unwrap();
    let second_path = second.final_path.unwrap();
    assert_eq!(first_path, tmp.path().join("library/Beyonce/Halo.mp3"));
    assert_eq!(second_path, tmp.path().join("library/Beyonce/Halo (2).mp3"));

    let first_content = std::fs::read_to_string(&first_path).unwrap();
    let second_content = std::fs::read_to_string(&second_path).unwrap();
    assert!(first_content.contains("upload-one"));
    assert!(second_content.contains("upload-two"));
}

/// TC-OR-013: A destination that cannot be created fails at relocating and keeps the artifact
/// **Type:** Integration | **Priority:** P0
#[tokio::test]
async fn tc_or_013_relocation_failure_keeps_artifact() {
    // Given: the destination directory path is occupied by a regular file
    let tmp = TempDir::new().unwrap();
    let blocked = tmp.path().join("library");
    std::fs::write(&blocked, b"not a directory").unwrap();
    let d = doubles(FakeSearch::returning(page(vec![official()])));
    let mut settings = settings(&tmp);
    settings.dest_dir = Some(blocked.clone());
    let orchestrator = Orchestrator::new(d.collaborators, settings);

    // When
    let job = orchestrator.acquire_query(QUERY, None).await;

    // Then: FAILED(relocating), no final path, the enriched artifact is still on disk
    assert_eq!(job.state, JobState::Failed(JobStage::Relocating));
    let (stage, detail) = job.failure().unwrap();
    assert_eq!(stage, JobStage::Relocating);
    assert!(!detail.is_empty());
    assert!(job.final_path.is_none());
    assert!(job.temp_path.as_ref().unwrap().exists());
    assert_eq!(std::fs::read(&blocked).unwrap(), b"not a directory");
}
