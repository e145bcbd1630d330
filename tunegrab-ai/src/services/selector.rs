//! Selector
//!
//! Scores every candidate of a (possibly paginated) search result and keeps
//! the strictly best one. The first-seen candidate wins ties. An empty or
//! all-unviable result is a normal outcome (`best == None`, score 0.0).

use crate::error::AcquireResult;
use crate::models::{CandidateRecord, SearchItem};
use crate::services::scorer::{self, ScoreOutcome, ScoreWeights};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

/// Candidate with its score and cleaned title
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub candidate: CandidateRecord,
    pub score: f64,
    pub cleaned_title: String,
}

/// One scored candidate, kept for ranking display and debug reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateEvaluation {
    /// Zero-based position in the result stream (page markers excluded)
    pub position: usize,
    pub candidate: CandidateRecord,
    pub outcome: ScoreOutcome,
}

/// Result of one selection round
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub best: Option<ScoredCandidate>,
    /// Score of `best`, 0.0 when there is none
    pub best_score: f64,
    /// Every evaluated candidate in stream order
    pub evaluations: Vec<CandidateEvaluation>,
    /// Highest page number announced by the provider
    pub pages_seen: u32,
}

impl Selection {
    pub fn is_match(&self) -> bool {
        self.best.is_some()
    }

    /// Evaluations sorted by descending score, stream order preserved among equals
    pub fn ranked(&self) -> Vec<&CandidateEvaluation> {
        let mut ranked: Vec<&CandidateEvaluation> = self.evaluations.iter().collect();
        ranked.sort_by(|a, b| b.outcome.score.total_cmp(&a.outcome.score));
        ranked
    }
}

/// Scores candidates for a query with a fixed set of weights
#[derive(Debug, Clone, Default)]
pub struct Selector {
    weights: ScoreWeights,
}

impl Selector {
    pub fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    /// Select from an in-memory sequence
    pub fn select<I>(&self, query: &str, items: I) -> Selection
    where
        I: IntoIterator<Item = SearchItem>,
    {
        let mut round = SelectionRound::new(query, &self.weights);
        for item in items {
            round.observe(item);
        }
        round.finish()
    }

    /// Select from a lazily produced stream; the first stream error aborts the round
    pub async fn select_stream<S>(&self, query: &str, items: S) -> AcquireResult<Selection>
    where
        S: Stream<Item = AcquireResult<SearchItem>>,
    {
        futures::pin_mut!(items);
        let mut round = SelectionRound::new(query, &self.weights);
        while let Some(item) = items.next().await {
            round.observe(item?);
        }
        Ok(round.finish())
    }
}

/// Running maximum over one stream of items
struct SelectionRound<'a> {
    query: &'a str,
    weights: &'a ScoreWeights,
    best: Option<ScoredCandidate>,
    evaluations: Vec<CandidateEvaluation>,
    pages_seen: u32,
}

impl<'a> SelectionRound<'a> {
    fn new(query: &'a str, weights: &'a ScoreWeights) -> Self {
        Self {
            query,
            weights,
            best: None,
            evaluations: Vec::new(),
            pages_seen: 0,
        }
    }

    fn observe(&mut self, item: SearchItem) {
        let candidate = match item {
            SearchItem::Page { number, total } => {
                tracing::debug!(page = number, total_pages = total, "Search page");
                self.pages_seen = self.pages_seen.max(number);
                return;
            }
            SearchItem::Candidate(candidate) => candidate,
        };

        let outcome = scorer::score(self.query, &candidate, self.weights);
        tracing::debug!(
            id = %candidate.id,
            title = %candidate.title,
            score = outcome.score,
            "Scored candidate"
        );

        let threshold = self
            .best
            .as_ref()
            .map_or(self.weights.min_viable_score, |b| b.score);
        if outcome.score > threshold {
            self.best = Some(ScoredCandidate {
                candidate: candidate.clone(),
                score: outcome.score,
                cleaned_title: outcome.cleaned_title.clone(),
            });
        }

        self.evaluations.push(CandidateEvaluation {
            position: self.evaluations.len(),
            candidate,
            outcome,
        });
    }

    fn finish(self) -> Selection {
        let best_score = self.best.as_ref().map_or(0.0, |b| b.score);
        Selection {
            best: self.best,
            best_score,
            evaluations: self.evaluations,
            pages_seen: self.pages_seen,
        }
    }
}
