//! Playlist resolver and batch runner
//!
//! Resolves a playlist into item identifiers and runs one job per item.
//! A failed item never stops the batch; the report tallies outcomes.

use super::Orchestrator;
use crate::error::AcquireResult;
use crate::models::AcquisitionJob;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashSet;
use tracing::info;

/// One unit of batch work
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchItem {
    /// Full pipeline starting with a search
    Query(String),
    /// Known identifier, starts at download
    Identifier(String),
}

/// Outcome of a batch, jobs in input order
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    /// Playlist reference or batch label
    pub source: String,
    pub jobs: Vec<AcquisitionJob>,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchReport {
    fn from_jobs(source: String, jobs: Vec<AcquisitionJob>) -> Self {
        let succeeded = jobs.iter().filter(|j| j.succeeded()).count();
        let failed = jobs.len() - succeeded;
        Self {
            source,
            jobs,
            succeeded,
            failed,
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

pub type PlaylistReport = BatchReport;

/// Identifiers in first-seen order, later duplicates dropped
pub fn dedupe_identifiers(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// Run `items` through `orchestrator` with at most `concurrency` jobs in flight
///
/// Every identifier has its own temporary namespace, so identifier items may
/// run concurrently. Query items can resolve to the same identifier; callers
/// running queries should use a concurrency of 1.
pub async fn run_batch(
    orchestrator: &Orchestrator,
    source: impl Into<String>,
    items: Vec<BatchItem>,
    concurrency: usize,
) -> BatchReport {
    let total = items.len();
    let jobs: Vec<AcquisitionJob> = stream::iter(items.into_iter().enumerate())
        .map(|(index, item)| async move {
            info!(item = index + 1, total, "Starting batch item");
            match item {
                BatchItem::Query(query) => orchestrator.acquire_query(&query, None).await,
                BatchItem::Identifier(id) => orchestrator.acquire_identifier(&id, None).await,
            }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let report = BatchReport::from_jobs(source.into(), jobs);
    info!(
        source = %report.source,
        succeeded = report.succeeded,
        failed = report.failed,
        "Batch finished"
    );
    report
}

/// Drives the orchestrator over every item of a playlist
pub struct PlaylistResolver<'a> {
    orchestrator: &'a Orchestrator,
    concurrency: usize,
}

impl<'a> PlaylistResolver<'a> {
    pub fn new(orchestrator: &'a Orchestrator) -> Self {
        Self {
            orchestrator,
            concurrency: 1,
        }
    }

    /// Bounded worker pool size (minimum 1)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Ordered, de-duplicated identifiers of `reference`
    pub async fn identifiers(&self, reference: &str) -> AcquireResult<Vec<String>> {
        let listed = self
            .orchestrator
            .collaborators()
            .playlists
            .list_identifiers(reference)
            .await?;
        let listed_count = listed.len();
        let ids = dedupe_identifiers(listed);
        info!(
            reference,
            items = ids.len(),
            duplicates = listed_count - ids.len(),
            "Playlist resolved"
        );
        Ok(ids)
    }

    /// Run every playlist item; only a listing failure is an error
    pub async fn resolve(&self, reference: &str) -> AcquireResult<PlaylistReport> {
        let ids = self.identifiers(reference).await?;
        let items = ids.into_iter().map(BatchItem::Identifier).collect();
        Ok(run_batch(self.orchestrator, reference, items, self.concurrency).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedupe_keeps_first_position() {
        let ids = vec!["b", "a", "b", " c ", "", "a"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(dedupe_identifiers(ids), vec!["b", "a", "c"]);
    }
}
