//! Data models for the acquisition pipeline

pub mod candidate;
pub mod job;
pub mod metadata;
pub mod quality;

pub use candidate::{watch_url, CandidateRecord, SearchItem, Thumbnail};
pub use job::{
    AcquisitionJob, JobStage, JobState, StageOutcome, StageStatus, StateTransition,
    TransitionError,
};
pub use metadata::RecognizedMetadata;
pub use quality::QualityTier;
