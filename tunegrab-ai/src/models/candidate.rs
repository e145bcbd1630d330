//! Search candidates as returned by the search provider
//!
//! Numeric-looking fields stay textual here (`"3:53"`, `"1,234,567 views"`);
//! the normalizer converts them when a candidate is scored.

use crate::error::{AcquireError, AcquireResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Thumbnail reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thumbnail {
    pub url: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

/// One search result item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    /// Stable identifier, the join key across pipeline stages
    pub id: String,
    pub title: String,
    /// `mm:ss` or `h:mm:ss`
    pub duration: String,
    /// Comma-formatted count, optionally followed by a unit (`"1,234 views"`)
    pub view_count: String,
    /// Free text such as `"3 years ago"`
    pub published: Option<String>,
    /// Channel / publisher name
    pub channel: String,
    pub link: Option<String>,
    pub thumbnails: Vec<Thumbnail>,
    pub rich_thumbnail: Option<Thumbnail>,
}

impl CandidateRecord {
    /// Candidate that carries only an identifier
    ///
    /// Used when the identifier is already the selection (playlist items,
    /// direct downloads), so no search metadata is available. The cover
    /// falls back to the identifier's standard thumbnail.
    pub fn minimal(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            thumbnails: vec![default_thumbnail(&id)],
            id,
            title: String::new(),
            duration: String::new(),
            view_count: String::new(),
            published: None,
            channel: String::new(),
            link: None,
            rich_thumbnail: None,
        }
    }

    /// Parse one result item in the video-search JSON shape
    ///
    /// Expected keys: `id`, `title`, `duration`, `viewCount.text`,
    /// `publishedTime`, `channel.name`, `link`, `thumbnails[]`,
    /// `richThumbnail`. Only `id` is required.
    pub fn from_search_json(value: &Value) -> AcquireResult<Self> {
        let id = value
            .get("id")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                AcquireError::MalformedInput("search result without an identifier".to_string())
            })?;

        let text = |key: &str| -> String {
            value
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let view_count = match value.get("viewCount") {
            Some(Value::Object(map)) => map
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };

        let channel = value
            .get("channel")
            .and_then(|c| c.get("name"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let thumbnails = value
            .get("thumbnails")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(parse_thumbnail).collect())
            .unwrap_or_default();

        Ok(Self {
            id: id.to_string(),
            title: text("title"),
            duration: text("duration"),
            view_count,
            published: value
                .get("publishedTime")
                .and_then(Value::as_str)
                .map(str::to_string),
            channel,
            link: value.get("link").and_then(Value::as_str).map(str::to_string),
            thumbnails,
            rich_thumbnail: value.get("richThumbnail").and_then(parse_thumbnail),
        })
    }

    /// Canonical source URL passed to the extraction collaborator
    pub fn source_url(&self) -> String {
        match &self.link {
            Some(link) if !link.is_empty() => link.clone(),
            _ => watch_url(&self.id),
        }
    }

    /// Thumbnail to use as cover art: rich thumbnail first, then the first listed
    pub fn cover_thumbnail(&self) -> Option<&Thumbnail> {
        self.rich_thumbnail
            .as_ref()
            .filter(|t| !t.url.is_empty())
            .or_else(|| self.thumbnails.iter().find(|t| !t.url.is_empty()))
    }
}

/// Watch URL for a video identifier
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

/// Standard high-quality thumbnail published for every video identifier
pub fn default_thumbnail(video_id: &str) -> Thumbnail {
    Thumbnail {
        url: format!("https://i.ytimg.com/vi/{}/hqdefault.jpg", video_id),
        width: 480,
        height: 360,
    }
}

fn parse_thumbnail(value: &Value) -> Option<Thumbnail> {
    let url = value.get("url")?.as_str()?.to_string();
    let dimension = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(0)
    };
    Some(Thumbnail {
        url,
        width: dimension("width"),
        height: dimension("height"),
    })
}

/// Item of a (possibly paginated) search result stream
///
/// Page markers are interleaved with records; consumers that do not care
/// about pagination simply skip them.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchItem {
    /// Marks the start of page `number` of `total`
    Page { number: u32, total: u32 },
    Candidate(CandidateRecord),
}
