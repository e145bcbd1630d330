//! yt-dlp backed search, extraction and playlist listing

use super::process;
use super::{AudioExtractor, PlaylistLister, SearchProvider};
use crate::error::{AcquireError, AcquireResult};
use crate::models::{watch_url, CandidateRecord, QualityTier, SearchItem, Thumbnail};
use crate::services::normalizer::{format_duration, format_view_count};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::Value;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

const YT_DLP: &str = "yt-dlp";

/// Search through `ytsearchN:` pseudo-URLs
#[derive(Debug, Default, Clone)]
pub struct YtDlpSearch;

impl YtDlpSearch {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SearchProvider for YtDlpSearch {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> AcquireResult<BoxStream<'static, AcquireResult<SearchItem>>> {
        let target = format!("ytsearch{}:{}", max_results.max(1), query);
        let stdout = process::run(
            YT_DLP,
            [target.as_str(), "--flat-playlist", "--dump-single-json", "--no-warnings"],
        )
        .await?;

        let root: Value = serde_json::from_str(&stdout)
            .map_err(|e| AcquireError::collaborator(YT_DLP, format!("invalid search JSON: {}", e)))?;
        let items = parse_search_result(&root)?;

        tracing::debug!(query, results = items.len() - 1, "Search returned");
        Ok(stream::iter(items.into_iter().map(Ok)).boxed())
    }
}

/// Single page marker followed by one candidate per entry
pub fn parse_search_result(root: &Value) -> AcquireResult<Vec<SearchItem>> {
    let entries = root
        .get("entries")
        .and_then(Value::as_array)
        .ok_or_else(|| AcquireError::collaborator(YT_DLP, "search result has no entries"))?;

    let mut items = Vec::with_capacity(entries.len() + 1);
    items.push(SearchItem::Page { number: 1, total: 1 });
    for entry in entries {
        match candidate_from_entry(entry) {
            Ok(candidate) => items.push(SearchItem::Candidate(candidate)),
            Err(e) => tracing::warn!(error = %e, "Skipping search entry"),
        }
    }
    Ok(items)
}

/// Map a yt-dlp entry onto the textual candidate shape the normalizer parses
pub fn candidate_from_entry(entry: &Value) -> AcquireResult<CandidateRecord> {
    let id = entry
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AcquireError::MalformedInput("search entry without an identifier".into()))?;

    let text = |key: &str| entry.get(key).and_then(Value::as_str).map(str::to_string);

    let duration = entry
        .get("duration")
        .and_then(Value::as_f64)
        .map(|secs| format_duration(secs.round() as u64))
        .unwrap_or_default();
    let view_count = entry
        .get("view_count")
        .and_then(Value::as_u64)
        .map(format_view_count)
        .unwrap_or_default();
    let published = text("upload_date").and_then(|d| years_ago(&d));

    let thumbnails = entry
        .get("thumbnails")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|t| {
                    Some(Thumbnail {
                        url: t.get("url")?.as_str()?.to_string(),
                        width: t.get("width").and_then(Value::as_u64).unwrap_or(0) as u32,
                        height: t.get("height").and_then(Value::as_u64).unwrap_or(0) as u32,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(CandidateRecord {
        id: id.to_string(),
        title: text("title").unwrap_or_default(),
        duration,
        view_count,
        published,
        channel: text("channel").or_else(|| text("uploader")).unwrap_or_default(),
        link: text("url").filter(|u| u.starts_with("http")).or_else(|| Some(watch_url(id))),
        thumbnails,
        rich_thumbnail: None,
    })
}

/// `YYYYMMDD` upload date as publication-age text (`"3 years ago"`)
fn years_ago(upload_date: &str) -> Option<String> {
    let date = NaiveDate::parse_from_str(upload_date, "%Y%m%d").ok()?;
    let today = Utc::now().date_naive();
    let mut years = today.year() - date.year();
    if (today.month(), today.day()) < (date.month(), date.day()) {
        years -= 1;
    }
    match years {
        y if y <= 0 => None,
        1 => Some("1 year ago".to_string()),
        y => Some(format!("{} years ago", y)),
    }
}

/// Audio extraction to MP3 at the requested bitrate
#[derive(Debug, Default, Clone)]
pub struct YtDlpExtractor;

impl YtDlpExtractor {
    pub fn new() -> Self {
        Self
    }
}

/// `<prefix>.<extension>` without treating dots in the prefix as an extension
pub fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = prefix.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

#[async_trait]
impl AudioExtractor for YtDlpExtractor {
    async fn extract_audio(
        &self,
        source: &str,
        output_prefix: &Path,
        quality: QualityTier,
    ) -> AcquireResult<PathBuf> {
        let template = with_suffix(output_prefix, ".%(ext)s");
        let expected = with_suffix(output_prefix, ".mp3");
        let bitrate = format!("{}K", quality.bitrate_kbps());

        let args: Vec<OsString> = vec![
            "-x".into(),
            "--audio-format".into(),
            "mp3".into(),
            "--audio-quality".into(),
            bitrate.into(),
            "--no-playlist".into(),
            "--no-warnings".into(),
            "-o".into(),
            template.into_os_string(),
            source.into(),
        ];
        process::run(YT_DLP, args).await?;

        if !tokio::fs::try_exists(&expected).await.unwrap_or(false) {
            return Err(AcquireError::collaborator(
                YT_DLP,
                format!("expected output {} was not produced", expected.display()),
            ));
        }
        Ok(expected)
    }
}

/// Playlist listing in flat mode
#[derive(Debug, Default, Clone)]
pub struct YtDlpPlaylistLister;

impl YtDlpPlaylistLister {
    pub fn new() -> Self {
        Self
    }
}

/// Canonical playlist URL for a bare id or any URL carrying `list=`
pub fn playlist_url(reference: &str) -> AcquireResult<String> {
    let reference = reference.trim();
    let id = match reference.find("list=") {
        Some(pos) => reference[pos + "list=".len()..]
            .split(['&', '#'])
            .next()
            .unwrap_or_default(),
        None => reference,
    };

    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(AcquireError::MalformedInput(format!(
            "not a playlist reference: '{}'",
            reference
        )));
    }
    Ok(format!("https://www.youtube.com/playlist?list={}", id))
}

#[async_trait]
impl PlaylistLister for YtDlpPlaylistLister {
    async fn list_identifiers(&self, reference: &str) -> AcquireResult<Vec<String>> {
        let url = playlist_url(reference)?;
        let stdout = process::run(
            YT_DLP,
            ["--flat-playlist", "--no-warnings", "-O", "%(id)s", url.as_str()],
        )
        .await?;

        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }
}
