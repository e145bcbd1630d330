//! Acquisition orchestrator
//!
//! Drives one `AcquisitionJob` through its state machine:
//!
//! SEARCHING → SELECTING → DOWNLOADING → ENRICHING → RELOCATING → DONE
//!
//! # Failure routing
//! - Search/selection: a missing match is `FAILED(selecting)`, not an error
//! - Download: any collaborator error is `FAILED(downloading)`
//! - Enrichment: each sub-step failure is a warning; the job continues
//! - Relocation: integrity mismatch or IO error is `FAILED(relocating)`
//!
//! Stage failures are recorded on the job; nothing propagates past `run`.

use super::JobEvent;
use crate::collaborators::Collaborators;
use crate::error::{AcquireError, AcquireResult};
use crate::models::{
    AcquisitionJob, CandidateRecord, JobStage, QualityTier, SearchItem, StageStatus,
};
use crate::services::naming::{destination_path, sanitize_component};
use crate::services::safe_move::verified_move;
use crate::services::scorer::ScoreWeights;
use crate::services::selector::{Selection, Selector};
use crate::services::trace_report::write_debug_report;
use futures::stream::BoxStream;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

type ResultStream = BoxStream<'static, AcquireResult<SearchItem>>;

/// Per-run settings shared by every job of one invocation
#[derive(Debug, Clone)]
pub struct AcquireSettings {
    /// Root of the per-job temporary namespaces
    pub tmp_dir: PathBuf,
    /// `None` leaves artifacts in their temporary location
    pub dest_dir: Option<PathBuf>,
    pub quality: QualityTier,
    /// Run the recognition collaborator during enrichment
    pub identify: bool,
    pub weights: ScoreWeights,
    pub max_results: usize,
    /// Explicit cover image: local path or http(s) URL
    pub cover_image: Option<String>,
    /// Write an HTML score report per selection round into this directory
    pub debug_report_dir: Option<PathBuf>,
}

impl AcquireSettings {
    pub fn new(tmp_dir: impl Into<PathBuf>) -> Self {
        Self {
            tmp_dir: tmp_dir.into(),
            dest_dir: None,
            quality: QualityTier::default(),
            identify: false,
            weights: ScoreWeights::default(),
            max_results: 10,
            cover_image: None,
            debug_report_dir: None,
        }
    }

    /// Temporary directory owned by one item identifier
    pub fn namespace_for(&self, item_id: &str) -> PathBuf {
        self.tmp_dir.join(sanitize_component(item_id))
    }
}

/// Runs acquisition jobs against a collaborator set
pub struct Orchestrator {
    collaborators: Collaborators,
    settings: AcquireSettings,
    selector: Selector,
    event_tx: Option<mpsc::Sender<JobEvent>>,
}

impl Orchestrator {
    pub fn new(collaborators: Collaborators, settings: AcquireSettings) -> Self {
        let selector = Selector::new(settings.weights.clone());
        Self {
            collaborators,
            settings,
            selector,
            event_tx: None,
        }
    }

    /// Report progress on `event_tx`
    pub fn with_events(mut self, event_tx: mpsc::Sender<JobEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    pub fn settings(&self) -> &AcquireSettings {
        &self.settings
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// Full pipeline for a textual query
    pub async fn acquire_query(&self, query: &str, name: Option<String>) -> AcquisitionJob {
        self.run(AcquisitionJob::for_query(query).with_target_name(name))
            .await
    }

    /// Pipeline for a known identifier (no search or selection)
    pub async fn acquire_identifier(&self, identifier: &str, name: Option<String>) -> AcquisitionJob {
        self.run(AcquisitionJob::for_identifier(identifier).with_target_name(name))
            .await
    }

    /// Search and score only
    pub async fn rank(&self, query: &str) -> AcquireResult<Selection> {
        let results = self
            .collaborators
            .search
            .search(query, self.settings.max_results)
            .await?;
        self.selector.select_stream(query, results).await
    }

    /// Run `job` from its current stage to a terminal state
    pub async fn run(&self, mut job: AcquisitionJob) -> AcquisitionJob {
        info!(job_id = %job.job_id, query = %job.query, state = %job.state, "Job started");
        let mut results: Option<ResultStream> = None;

        while let Some(stage) = job.stage() {
            self.emit_event(JobEvent::StageStarted {
                job_id: job.job_id,
                stage,
            })
            .await;

            let outcome = match stage {
                JobStage::Searching => self.search(&job).await.map(|stream| {
                    results = Some(stream);
                    "search results received".to_string()
                }),
                JobStage::Selecting => self.select(&mut job, results.take()).await,
                JobStage::Downloading => self.download(&mut job).await,
                JobStage::Enriching => Ok(self.enrich(&mut job).await),
                JobStage::Relocating => self.relocate(&mut job).await,
            };

            match outcome {
                Ok(detail) => {
                    debug!(job_id = %job.job_id, stage = %stage, detail = %detail, "Stage complete");
                    job.record(stage, StageStatus::Ok, detail.clone());
                    self.emit_event(JobEvent::StageFinished {
                        job_id: job.job_id,
                        stage,
                        status: StageStatus::Ok,
                        detail,
                    })
                    .await;
                    if let Err(e) = job.advance() {
                        warn!(job_id = %job.job_id, error = %e, "Job could not advance");
                        break;
                    }
                }
                Err(err) => {
                    let detail = err.to_string();
                    match &err {
                        AcquireError::NoMatch { .. } => {
                            info!(job_id = %job.job_id, stage = %stage, "{}", detail)
                        }
                        _ => warn!(job_id = %job.job_id, stage = %stage, error = %detail, "Stage failed"),
                    }
                    if let Err(e) = job.fail(detail.clone()) {
                        warn!(job_id = %job.job_id, error = %e, "Job could not be failed");
                        break;
                    }
                    self.emit_event(JobEvent::StageFinished {
                        job_id: job.job_id,
                        stage,
                        status: StageStatus::Fatal,
                        detail,
                    })
                    .await;
                }
            }
        }

        info!(job_id = %job.job_id, summary = %job.summary(), "Job finished");
        self.emit_event(JobEvent::JobFinished {
            job_id: job.job_id,
            state: job.state,
            summary: job.summary(),
        })
        .await;
        job
    }

    async fn search(&self, job: &AcquisitionJob) -> AcquireResult<ResultStream> {
        self.collaborators
            .search
            .search(&job.query, self.settings.max_results)
            .await
    }

    async fn select(
        &self,
        job: &mut AcquisitionJob,
        results: Option<ResultStream>,
    ) -> AcquireResult<String> {
        let selection = match results {
            Some(stream) => self.selector.select_stream(&job.query, stream).await?,
            None => Selection::default(),
        };

        if let Some(dir) = &self.settings.debug_report_dir {
            let best_title = selection.best.as_ref().map(|b| b.candidate.title.as_str());
            if let Err(e) =
                write_debug_report(dir, &job.query, &selection.evaluations, best_title).await
            {
                warn!(job_id = %job.job_id, error = %e, "Score report not written");
            }
        }

        let evaluated = selection.evaluations.len();
        let Some(best) = selection.best else {
            return Err(AcquireError::NoMatch {
                query: job.query.clone(),
            });
        };

        let detail = format!(
            "selected '{}' ({}) with score {:.2} of {} candidate(s)",
            best.candidate.title, best.candidate.id, best.score, evaluated
        );
        job.score = Some(best.score);
        job.candidate = Some(best.candidate);
        Ok(detail)
    }

    async fn download(&self, job: &mut AcquisitionJob) -> AcquireResult<String> {
        let candidate = job
            .candidate
            .as_ref()
            .ok_or_else(|| AcquireError::MalformedInput("no candidate to download".to_string()))?;

        let namespace = self.settings.namespace_for(&candidate.id);
        tokio::fs::create_dir_all(&namespace).await?;
        let prefix = namespace.join(sanitize_component(&candidate.id));

        let path = self
            .collaborators
            .extractor
            .extract_audio(&candidate.source_url(), &prefix, self.settings.quality)
            .await?;

        let detail = format!("downloaded {} to {}", self.settings.quality, path.display());
        job.temp_path = Some(path);
        Ok(detail)
    }

    /// Best-effort sub-steps; failures become warnings on the job
    async fn enrich(&self, job: &mut AcquisitionJob) -> String {
        let (Some(candidate), Some(mut audio)) = (job.candidate.clone(), job.temp_path.clone())
        else {
            return "nothing to enrich".to_string();
        };
        let namespace = self.settings.namespace_for(&candidate.id);
        let mut applied = Vec::new();

        let cover = match self.resolve_cover(&candidate, &namespace).await {
            Ok(cover) => cover,
            Err(e) => {
                self.warn_enrichment(job, format!("cover image unavailable: {}", e));
                None
            }
        };

        if let Some(image) = &cover {
            match self.collaborators.tagger.embed_cover_art(&audio, image).await {
                Ok(path) => {
                    audio = path;
                    applied.push("cover art");
                }
                Err(e) => self.warn_enrichment(job, format!("cover art not embedded: {}", e)),
            }
        }

        match self
            .collaborators
            .tagger
            .embed_provenance(&audio, &candidate.source_url())
            .await
        {
            Ok(path) => {
                audio = path;
                applied.push("provenance");
            }
            Err(e) => self.warn_enrichment(job, format!("provenance not embedded: {}", e)),
        }

        if self.settings.identify {
            match &self.collaborators.identifier {
                Some(identifier) => match identifier.identify_and_tag(&audio, cover.as_deref()).await {
                    Ok(Some(metadata)) => {
                        job.recognized = Some(metadata);
                        applied.push("recognized metadata");
                    }
                    Ok(None) => debug!(job_id = %job.job_id, "Recording not recognized"),
                    Err(e) => self.warn_enrichment(job, format!("recognition failed: {}", e)),
                },
                None => self.warn_enrichment(
                    job,
                    "recognition requested but no identifier is configured".to_string(),
                ),
            }
        }

        job.temp_path = Some(audio);
        if applied.is_empty() {
            "no enrichment applied".to_string()
        } else {
            format!("applied {}", applied.join(", "))
        }
    }

    /// Explicit cover source first, then the candidate's thumbnail
    async fn resolve_cover(
        &self,
        candidate: &CandidateRecord,
        namespace: &Path,
    ) -> AcquireResult<Option<PathBuf>> {
        if let Some(source) = &self.settings.cover_image {
            if is_remote(source) {
                let file_name = format!("{}_cover.jpg", candidate.id);
                let (path, _) = self
                    .collaborators
                    .images
                    .fetch_and_convert(source, namespace, Some(&file_name))
                    .await?;
                return Ok(Some(path));
            }
            let path = PathBuf::from(source);
            if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return Err(AcquireError::MalformedInput(format!(
                    "cover image {} does not exist",
                    path.display()
                )));
            }
            return Ok(Some(path));
        }

        let Some(thumbnail) = candidate.cover_thumbnail() else {
            return Ok(None);
        };
        let file_name = format!("{}_thumbnail.jpg", candidate.id);
        let (path, (width, height)) = self
            .collaborators
            .images
            .fetch_and_convert(&thumbnail.url, namespace, Some(&file_name))
            .await?;
        debug!(width, height, path = %path.display(), "Thumbnail converted");
        Ok(Some(path))
    }

    fn warn_enrichment(&self, job: &mut AcquisitionJob, detail: String) {
        warn!(job_id = %job.job_id, detail = %detail, "Enrichment step skipped");
        job.record(JobStage::Enriching, StageStatus::Warning, detail);
    }

    async fn relocate(&self, job: &mut AcquisitionJob) -> AcquireResult<String> {
        let Some(temp) = job.temp_path.clone() else {
            return Err(AcquireError::MalformedInput("no artifact to relocate".to_string()));
        };

        let Some(dest_dir) = &self.settings.dest_dir else {
            return Ok(format!(
                "no destination configured, artifact kept at {}",
                temp.display()
            ));
        };

        let extension = temp
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| "mp3".to_string());
        let destination = destination_path(
            dest_dir,
            job.recognized.as_ref(),
            job.fallback_name(),
            &extension,
        );

        let moved = verified_move(temp, destination).await?;
        let detail = format!("moved to {}", moved.display());
        job.final_path = Some(moved);
        Ok(detail)
    }

    /// Emit workflow event if channel configured
    async fn emit_event(&self, event: JobEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_is_keyed_by_identifier() {
        let settings = AcquireSettings::new("/tmp/progress");
        assert_eq!(settings.namespace_for("abc"), PathBuf::from("/tmp/progress/abc"));
        assert_ne!(settings.namespace_for("abc"), settings.namespace_for("abd"));
        assert_eq!(settings.namespace_for("a/b"), PathBuf::from("/tmp/progress/a_b"));
    }

    #[test]
    fn test_is_remote() {
        assert!(is_remote("https://i.ytimg.com/x.jpg"));
        assert!(!is_remote("/home/me/cover.png"));
    }
}
