//! Pure services: normalization, scoring, selection, naming, verified transfer

pub mod naming;
pub mod normalizer;
pub mod safe_move;
pub mod scorer;
pub mod selector;
pub mod trace_report;

pub use normalizer::{to_seconds, to_seconds_or_zero, to_view_count, MalformedDurationError};
pub use safe_move::{verified_move, StreamDigest, Transfer, Verification};
pub use scorer::{score, KeywordFamily, KeywordRule, ScoreOutcome, ScoreStep, ScoreTrace, ScoreWeights};
pub use selector::{CandidateEvaluation, ScoredCandidate, Selection, Selector};
