//! Acquisition workflow
//!
//! `Orchestrator` runs one job through search, selection, download,
//! enrichment and relocation. `playlist` drives the orchestrator once per
//! playlist item.

pub mod orchestrator;
pub mod playlist;

use crate::models::{JobStage, JobState, StageStatus};
use serde::Serialize;
use uuid::Uuid;

pub use orchestrator::{AcquireSettings, Orchestrator};
pub use playlist::{run_batch, BatchItem, BatchReport, PlaylistReport, PlaylistResolver};

/// Progress events emitted while a job runs
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum JobEvent {
    /// A stage began
    StageStarted {
        job_id: Uuid,
        stage: JobStage,
    },

    /// A stage ended; `Fatal` ends the job
    StageFinished {
        job_id: Uuid,
        stage: JobStage,
        status: StageStatus,
        detail: String,
    },

    /// The job reached a terminal state
    JobFinished {
        job_id: Uuid,
        state: JobState,
        summary: String,
    },
}
