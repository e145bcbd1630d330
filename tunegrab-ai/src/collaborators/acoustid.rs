//! AcoustID recognition and tag correction
//!
//! Fingerprints the file with `fpcalc`, looks the fingerprint up on AcoustID
//! and writes title/artist/album (plus an optional front cover) with lofty.
//!
//! # API Reference
//! - Endpoint: https://api.acoustid.org/v2/lookup
//! - Documentation: https://acoustid.org/webservice

use super::process;
use super::Identifier;
use crate::config::is_valid_key;
use crate::error::{AcquireError, AcquireResult};
use crate::models::RecognizedMetadata;
use async_trait::async_trait;
use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use lofty::config::WriteOptions;
use lofty::file::TaggedFileExt;
use lofty::picture::{MimeType, Picture, PictureType};
use lofty::prelude::*;
use lofty::tag::Tag;
use reqwest::Client;
use serde::Deserialize;
use std::ffi::OsStr;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;

const COLLABORATOR: &str = "acoustid";

/// AcoustID API endpoint
const ACOUSTID_API_URL: &str = "https://api.acoustid.org/v2/lookup";

/// Default timeout for AcoustID API requests
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// AcoustID allows 3 requests per second per client
const REQUESTS_PER_SECOND: u32 = 3;

const FPCALC: &str = "fpcalc";

/// `fpcalc -json` output
#[derive(Debug, Deserialize)]
pub struct Fingerprint {
    pub duration: f64,
    pub fingerprint: String,
}

#[derive(Debug, Deserialize)]
pub struct LookupResponse {
    pub status: String,
    #[serde(default)]
    pub results: Vec<LookupResult>,
    pub error: Option<LookupError>,
}

#[derive(Debug, Deserialize)]
pub struct LookupError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct LookupResult {
    pub score: f64,
    #[serde(default)]
    pub recordings: Vec<Recording>,
}

#[derive(Debug, Deserialize)]
pub struct Recording {
    pub id: String,
    pub title: Option<String>,
    #[serde(default)]
    pub artists: Vec<NamedEntity>,
    #[serde(default)]
    pub releasegroups: Vec<NamedEntity>,
}

#[derive(Debug, Deserialize)]
pub struct NamedEntity {
    #[serde(alias = "title")]
    pub name: String,
}

/// Highest-scoring result above `min_score` that carries a titled recording
pub fn best_recording(response: &LookupResponse, min_score: f64) -> Option<RecognizedMetadata> {
    response
        .results
        .iter()
        .filter(|r| r.score >= min_score)
        .filter_map(|r| {
            r.recordings
                .iter()
                .find(|rec| rec.title.as_deref().is_some_and(|t| !t.trim().is_empty()))
                .map(|rec| (r.score, rec))
        })
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, rec)| RecognizedMetadata {
            title: rec.title.clone(),
            artist: (!rec.artists.is_empty()).then(|| {
                rec.artists
                    .iter()
                    .map(|a| a.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            }),
            album: rec.releasegroups.first().map(|g| g.name.clone()),
            recording_id: Some(rec.id.clone()),
        })
}

/// Write recognized metadata (and an optional JPEG cover) into `path`
pub fn write_tags(
    path: &Path,
    metadata: &RecognizedMetadata,
    cover_jpeg: Option<Vec<u8>>,
) -> AcquireResult<()> {
    let tag_error = |e: lofty::error::LoftyError| AcquireError::collaborator("tag writer", e);

    let mut tagged_file = lofty::read_from_path(path).map_err(tag_error)?;
    let tag_type = tagged_file.primary_tag_type();
    if tagged_file.tag(tag_type).is_none() {
        tagged_file.insert_tag(Tag::new(tag_type));
    }
    let tag = tagged_file.tag_mut(tag_type).ok_or_else(|| {
        AcquireError::collaborator("tag writer", format!("no writable tag for {:?}", tag_type))
    })?;

    if let Some(title) = &metadata.title {
        tag.set_title(title.clone());
    }
    if let Some(artist) = &metadata.artist {
        tag.set_artist(artist.clone());
    }
    if let Some(album) = &metadata.album {
        tag.set_album(album.clone());
    }
    if let Some(data) = cover_jpeg {
        tag.remove_picture_type(PictureType::CoverFront);
        tag.push_picture(Picture::new_unchecked(
            PictureType::CoverFront,
            Some(MimeType::Jpeg),
            Some("Cover".to_string()),
            data,
        ));
    }

    tagged_file
        .save_to_path(path, WriteOptions::default())
        .map_err(tag_error)?;
    Ok(())
}

pub struct AcoustIdIdentifier {
    http_client: Client,
    api_key: String,
    /// Minimum acceptable AcoustID score (default: 0.5)
    min_score: f64,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl AcoustIdIdentifier {
    /// Fails for keys that cannot be valid AcoustID client keys
    pub fn new(api_key: String) -> AcquireResult<Self> {
        if !is_valid_key(&api_key) {
            return Err(AcquireError::collaborator(
                COLLABORATOR,
                "invalid AcoustID API key",
            ));
        }

        let http_client = Client::builder()
            .user_agent(concat!("tunegrab/", env!("CARGO_PKG_VERSION")))
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| AcquireError::collaborator(COLLABORATOR, e))?;

        let per_second = NonZeroU32::new(REQUESTS_PER_SECOND).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            http_client,
            api_key,
            min_score: 0.5,
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
        })
    }

    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score.clamp(0.0, 1.0);
        self
    }

    async fn fingerprint(&self, audio: &Path) -> AcquireResult<Fingerprint> {
        let stdout = process::run(FPCALC, [OsStr::new("-json"), audio.as_os_str()]).await?;
        serde_json::from_str(&stdout)
            .map_err(|e| AcquireError::collaborator(FPCALC, format!("invalid output: {}", e)))
    }

    async fn lookup(&self, fingerprint: &Fingerprint) -> AcquireResult<LookupResponse> {
        self.rate_limiter.until_ready().await;

        let duration = (fingerprint.duration.round() as u64).to_string();
        tracing::debug!(
            fingerprint_length = fingerprint.fingerprint.len(),
            duration = %duration,
            "Querying AcoustID API"
        );

        let response = self
            .http_client
            .post(ACOUSTID_API_URL)
            .form(&[
                ("client", self.api_key.as_str()),
                ("duration", duration.as_str()),
                ("fingerprint", fingerprint.fingerprint.as_str()),
                ("meta", "recordings releasegroups"),
            ])
            .send()
            .await
            .map_err(|e| AcquireError::collaborator(COLLABORATOR, format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AcquireError::collaborator(
                COLLABORATOR,
                format!("API returned {}: {}", status, body),
            ));
        }

        let parsed: LookupResponse = response
            .json()
            .await
            .map_err(|e| AcquireError::collaborator(COLLABORATOR, format!("invalid response: {}", e)))?;

        if parsed.status != "ok" {
            return Err(AcquireError::collaborator(
                COLLABORATOR,
                parsed
                    .error
                    .map_or_else(|| "unknown API error".to_string(), |e| e.message),
            ));
        }
        Ok(parsed)
    }
}

#[async_trait]
impl Identifier for AcoustIdIdentifier {
    async fn identify_and_tag(
        &self,
        audio: &Path,
        thumbnail: Option<&Path>,
    ) -> AcquireResult<Option<RecognizedMetadata>> {
        let fingerprint = self.fingerprint(audio).await?;
        let response = self.lookup(&fingerprint).await?;

        let Some(metadata) = best_recording(&response, self.min_score) else {
            tracing::debug!(audio = %audio.display(), "No AcoustID match above threshold");
            return Ok(None);
        };

        tracing::info!(
            title = ?metadata.title,
            artist = ?metadata.artist,
            recording_id = ?metadata.recording_id,
            "Recording identified"
        );

        let cover = match thumbnail {
            Some(path) => Some(tokio::fs::read(path).await?),
            None => None,
        };
        let path: PathBuf = audio.to_path_buf();
        let to_write = metadata.clone();
        tokio::task::spawn_blocking(move || write_tags(&path, &to_write, cover))
            .await
            .map_err(|e| AcquireError::collaborator("tag writer", format!("task failed: {}", e)))??;

        Ok(Some(metadata))
    }
}
