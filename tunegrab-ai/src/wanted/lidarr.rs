//! Lidarr wanted/missing client
//!
//! Pages through `GET /api/v1/wanted/missing`. Each page yields a
//! `(page, total_pages)` marker followed by that page's releases.

use crate::error::{AcquireError, AcquireResult};
use async_stream::try_stream;
use futures::{Stream, TryStreamExt};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tunegrab_common::config::LidarrConfig;

const COLLABORATOR: &str = "lidarr";

/// Default timeout for Lidarr API requests
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WantedPage {
    #[serde(default)]
    pub total_records: u64,
    #[serde(default)]
    pub records: Vec<WantedAlbum>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WantedAlbum {
    #[serde(default)]
    pub title: String,
    pub artist: Option<WantedArtist>,
    #[serde(default)]
    pub releases: Vec<WantedReleaseRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WantedArtist {
    #[serde(default)]
    pub artist_name: String,
}

#[derive(Debug, Deserialize)]
pub struct WantedReleaseRecord {
    #[serde(default)]
    pub title: String,
}

/// One missing release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WantedRelease {
    pub album_title: String,
    pub release_title: String,
    pub artist_name: String,
}

impl WantedRelease {
    /// Search query in `"<release title> - <artist name>"` form
    pub fn query(&self) -> String {
        if self.artist_name.trim().is_empty() {
            self.release_title.clone()
        } else {
            format!("{} - {}", self.release_title, self.artist_name)
        }
    }
}

/// Item of the paged wanted stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WantedItem {
    Page { number: u32, total: u32 },
    Release(WantedRelease),
}

/// `ceil(total_records / page_size)`
pub fn total_pages(total_records: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    let pages = total_records.div_ceil(u64::from(page_size));
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Releases of one page; with `unique_tracks` consecutive repeats within an album are dropped
pub fn page_releases(page: &WantedPage, unique_tracks: bool) -> Vec<WantedRelease> {
    let mut releases = Vec::new();
    for album in &page.records {
        let artist_name = album
            .artist
            .as_ref()
            .map(|a| a.artist_name.clone())
            .unwrap_or_default();
        let mut previous: Option<&str> = None;
        for release in &album.releases {
            if unique_tracks && previous == Some(release.title.as_str()) {
                continue;
            }
            previous = Some(release.title.as_str());
            releases.push(WantedRelease {
                album_title: album.title.clone(),
                release_title: release.title.clone(),
                artist_name: artist_name.clone(),
            });
        }
    }
    releases
}

pub struct LidarrClient {
    http_client: Client,
    base_url: String,
    api_key: String,
    page_size: u32,
    unique_tracks: bool,
}

impl LidarrClient {
    pub fn new(config: &LidarrConfig) -> AcquireResult<Self> {
        let schema = if config.ssl { "https" } else { "http" };
        let base_url = format!("{}://{}:{}", schema, config.host, config.port);
        Self::with_base_url(base_url, config.api_key.clone(), config.page_size)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: String,
        page_size: u32,
    ) -> AcquireResult<Self> {
        let http_client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| AcquireError::collaborator(COLLABORATOR, e))?;
        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            page_size: page_size.max(1),
            unique_tracks: true,
        })
    }

    pub fn with_unique_tracks(mut self, unique_tracks: bool) -> Self {
        self.unique_tracks = unique_tracks;
        self
    }

    /// Fetch one page of monitored missing albums
    pub async fn fetch_page(&self, page: u32) -> AcquireResult<WantedPage> {
        let url = format!("{}/api/v1/wanted/missing", self.base_url);
        tracing::debug!(url = %url, page, page_size = self.page_size, "Fetching wanted page");

        let response = self
            .http_client
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .query(&[
                ("page", page.to_string()),
                ("pageSize", self.page_size.to_string()),
                ("includeArtist", "true".to_string()),
                ("monitored", "true".to_string()),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AcquireError::collaborator(COLLABORATOR, e))?;

        response
            .json()
            .await
            .map_err(|e| AcquireError::collaborator(COLLABORATOR, format!("invalid response: {}", e)))
    }

    /// Every page, markers interleaved with releases
    pub fn releases(&self) -> impl Stream<Item = AcquireResult<WantedItem>> + '_ {
        try_stream! {
            let mut page = 1u32;
            loop {
                let body = self.fetch_page(page).await?;
                let total = total_pages(body.total_records, self.page_size);
                yield WantedItem::Page { number: page, total };

                for release in page_releases(&body, self.unique_tracks) {
                    yield WantedItem::Release(release);
                }

                if page >= total {
                    break;
                }
                page += 1;
            }
        }
    }

    /// All wanted releases flattened into search queries
    pub async fn wanted_queries(&self) -> AcquireResult<Vec<String>> {
        self.releases()
            .try_filter_map(|item| async move {
                Ok(match item {
                    WantedItem::Release(release) => Some(release.query()),
                    WantedItem::Page { .. } => None,
                })
            })
            .try_collect()
            .await
    }
}
