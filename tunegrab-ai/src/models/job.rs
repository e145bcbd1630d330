//! Acquisition job state machine
//!
//! A job progresses through:
//! SEARCHING → SELECTING → DOWNLOADING → ENRICHING → RELOCATING → DONE
//!
//! `FAILED(stage)` is reachable from every active stage. Jobs never move
//! backwards and terminal states accept no further transitions. Jobs created
//! for a known identifier start directly in DOWNLOADING.

use super::{CandidateRecord, RecognizedMetadata};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStage {
    Searching,
    Selecting,
    Downloading,
    Enriching,
    Relocating,
}

impl JobStage {
    /// Stage that follows this one, `None` after relocation
    pub fn next(self) -> Option<JobStage> {
        match self {
            JobStage::Searching => Some(JobStage::Selecting),
            JobStage::Selecting => Some(JobStage::Downloading),
            JobStage::Downloading => Some(JobStage::Enriching),
            JobStage::Enriching => Some(JobStage::Relocating),
            JobStage::Relocating => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStage::Searching => "searching",
            JobStage::Selecting => "selecting",
            JobStage::Downloading => "downloading",
            JobStage::Enriching => "enriching",
            JobStage::Relocating => "relocating",
        }
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "stage", rename_all = "lowercase")]
pub enum JobState {
    Active(JobStage),
    Done,
    Failed(JobStage),
}

impl JobState {
    /// Transition table
    pub fn can_transition_to(self, next: JobState) -> bool {
        match (self, next) {
            (JobState::Active(current), JobState::Active(target)) => {
                current.next() == Some(target)
            }
            (JobState::Active(JobStage::Relocating), JobState::Done) => true,
            (JobState::Active(current), JobState::Failed(stage)) => current == stage,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Failed(_))
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Active(stage) => write!(f, "{}", stage.as_str().to_uppercase()),
            JobState::Done => f.write_str("DONE"),
            JobState::Failed(stage) => write!(f, "FAILED({})", stage),
        }
    }
}

/// Rejected state change
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Illegal job transition {from} -> {to}")]
pub struct TransitionError {
    pub from: JobState,
    pub to: JobState,
}

/// Per-stage outcome severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Ok,
    Warning,
    Fatal,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StageStatus::Ok => "ok",
            StageStatus::Warning => "warning",
            StageStatus::Fatal => "fatal",
        })
    }
}

/// Recorded outcome of one stage or enrichment sub-step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageOutcome {
    pub stage: JobStage,
    pub status: StageStatus,
    pub detail: String,
    pub recorded_at: DateTime<Utc>,
}

/// State transition event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub job_id: Uuid,
    pub old_state: JobState,
    pub new_state: JobState,
    pub transitioned_at: DateTime<Utc>,
}

/// One run of the acquisition pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionJob {
    pub job_id: Uuid,

    /// Query text, or the identifier for identifier jobs
    pub query: String,

    /// Caller-supplied file name used when no metadata was recognized
    pub target_name: Option<String>,

    /// Chosen candidate, set once selection succeeds
    pub candidate: Option<CandidateRecord>,

    /// Score of the chosen candidate (absent for identifier jobs)
    pub score: Option<f64>,

    /// Artifact location inside the temporary namespace
    pub temp_path: Option<PathBuf>,

    /// Artifact location after relocation
    pub final_path: Option<PathBuf>,

    /// Metadata recognized during enrichment
    pub recognized: Option<RecognizedMetadata>,

    pub outcomes: Vec<StageOutcome>,

    pub state: JobState,

    pub started_at: DateTime<Utc>,

    pub ended_at: Option<DateTime<Utc>>,
}

impl AcquisitionJob {
    /// Job for a textual query, starting at SEARCHING
    pub fn for_query(query: impl Into<String>) -> Self {
        Self::new(query.into(), None, JobStage::Searching)
    }

    /// Job whose identifier is already the selection, starting at DOWNLOADING
    pub fn for_identifier(identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        let candidate = CandidateRecord::minimal(identifier.clone());
        Self::new(identifier, Some(candidate), JobStage::Downloading)
    }

    fn new(query: String, candidate: Option<CandidateRecord>, entry: JobStage) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            query,
            target_name: None,
            candidate,
            score: None,
            temp_path: None,
            final_path: None,
            recognized: None,
            outcomes: Vec::new(),
            state: JobState::Active(entry),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn with_target_name(mut self, name: Option<String>) -> Self {
        self.target_name = name.filter(|n| !n.trim().is_empty());
        self
    }

    /// Name for the relocated file when no metadata was recognized
    pub fn fallback_name(&self) -> &str {
        self.target_name.as_deref().unwrap_or(&self.query)
    }

    /// Current stage, `None` once terminal
    pub fn stage(&self) -> Option<JobStage> {
        match self.state {
            JobState::Active(stage) => Some(stage),
            _ => None,
        }
    }

    /// Move to a new state if the transition table allows it
    pub fn transition_to(&mut self, new_state: JobState) -> Result<StateTransition, TransitionError> {
        if !self.state.can_transition_to(new_state) {
            return Err(TransitionError {
                from: self.state,
                to: new_state,
            });
        }

        let transition = StateTransition {
            job_id: self.job_id,
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;

        if new_state.is_terminal() {
            self.ended_at = Some(Utc::now());
        }

        Ok(transition)
    }

    /// Advance to the next stage in sequence
    pub fn advance(&mut self) -> Result<StateTransition, TransitionError> {
        let next = match self.state {
            JobState::Active(stage) => match stage.next() {
                Some(next) => JobState::Active(next),
                None => JobState::Done,
            },
            terminal => {
                return Err(TransitionError {
                    from: terminal,
                    to: terminal,
                })
            }
        };
        self.transition_to(next)
    }

    /// Append an outcome for `stage`
    pub fn record(&mut self, stage: JobStage, status: StageStatus, detail: impl Into<String>) {
        self.outcomes.push(StageOutcome {
            stage,
            status,
            detail: detail.into(),
            recorded_at: Utc::now(),
        });
    }

    /// Record a fatal outcome for the current stage and terminate the job
    pub fn fail(&mut self, detail: impl Into<String>) -> Result<StateTransition, TransitionError> {
        let stage = match self.state {
            JobState::Active(stage) => stage,
            terminal => {
                return Err(TransitionError {
                    from: terminal,
                    to: terminal,
                })
            }
        };
        self.record(stage, StageStatus::Fatal, detail);
        self.transition_to(JobState::Failed(stage))
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn succeeded(&self) -> bool {
        self.state == JobState::Done
    }

    /// Failed stage and its detail
    pub fn failure(&self) -> Option<(JobStage, &str)> {
        match self.state {
            JobState::Failed(stage) => self
                .outcomes
                .iter()
                .rev()
                .find(|o| o.stage == stage && o.status == StageStatus::Fatal)
                .map(|o| (stage, o.detail.as_str())),
            _ => None,
        }
    }

    pub fn warnings(&self) -> impl Iterator<Item = &StageOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.status == StageStatus::Warning)
    }

    /// Where the artifact ended up: final path, else the temporary path
    pub fn artifact_path(&self) -> Option<&PathBuf> {
        self.final_path.as_ref().or(self.temp_path.as_ref())
    }

    /// One-line human readable outcome
    pub fn summary(&self) -> String {
        match self.state {
            JobState::Done => match self.artifact_path() {
                Some(path) => format!("DONE '{}' -> {}", self.query, path.display()),
                None => format!("DONE '{}'", self.query),
            },
            JobState::Failed(stage) => {
                let detail = self.failure().map(|(_, d)| d).unwrap_or("unknown failure");
                format!("FAILED({}) '{}': {}", stage, self.query, detail)
            }
            JobState::Active(stage) => format!("{} '{}'", JobState::Active(stage), self.query),
        }
    }
}
