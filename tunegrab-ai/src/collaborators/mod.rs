//! External capabilities consumed by the pipeline
//!
//! Each capability is a trait so the orchestrator can run against test
//! doubles. `Collaborators` bundles one implementation of each.

pub mod acoustid;
pub mod ffmpeg;
pub mod image_fetcher;
pub mod process;
pub mod yt_dlp;

use crate::error::AcquireResult;
use crate::models::{QualityTier, RecognizedMetadata, SearchItem};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use acoustid::AcoustIdIdentifier;
pub use ffmpeg::FfmpegTagger;
pub use image_fetcher::HttpImageFetcher;
pub use yt_dlp::{YtDlpExtractor, YtDlpPlaylistLister, YtDlpSearch};

/// Textual search provider
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Lazily produced results; page markers may be interleaved with candidates
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> AcquireResult<BoxStream<'static, AcquireResult<SearchItem>>>;
}

/// Media extraction / transcoding
#[async_trait]
pub trait AudioExtractor: Send + Sync {
    /// Extract audio from `source` into a path derived from `output_prefix`
    async fn extract_audio(
        &self,
        source: &str,
        output_prefix: &Path,
        quality: QualityTier,
    ) -> AcquireResult<PathBuf>;
}

/// Image download + conversion
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Returns the written image path and its `(width, height)`
    async fn fetch_and_convert(
        &self,
        url: &str,
        dest_dir: &Path,
        filename: Option<&str>,
    ) -> AcquireResult<(PathBuf, (u32, u32))>;
}

/// Tag writing
#[async_trait]
pub trait Tagger: Send + Sync {
    /// Returns the path of the audio file carrying the cover
    async fn embed_cover_art(&self, audio: &Path, image: &Path) -> AcquireResult<PathBuf>;

    /// Returns the path of the audio file carrying the provenance text
    async fn embed_provenance(&self, audio: &Path, text: &str) -> AcquireResult<PathBuf>;
}

/// Acoustic recognition + tag correction
#[async_trait]
pub trait Identifier: Send + Sync {
    /// `Ok(None)` when the recording was not recognized
    async fn identify_and_tag(
        &self,
        audio: &Path,
        thumbnail: Option<&Path>,
    ) -> AcquireResult<Option<RecognizedMetadata>>;
}

/// Playlist listing
#[async_trait]
pub trait PlaylistLister: Send + Sync {
    /// Item identifiers in playlist order
    async fn list_identifiers(&self, reference: &str) -> AcquireResult<Vec<String>>;
}

/// Capability set injected into the orchestrator
#[derive(Clone)]
pub struct Collaborators {
    pub search: Arc<dyn SearchProvider>,
    pub extractor: Arc<dyn AudioExtractor>,
    pub images: Arc<dyn ImageFetcher>,
    pub tagger: Arc<dyn Tagger>,
    /// `None` disables recognition
    pub identifier: Option<Arc<dyn Identifier>>,
    pub playlists: Arc<dyn PlaylistLister>,
}

impl Collaborators {
    /// Production adapters backed by yt-dlp, ffmpeg, HTTP and AcoustID
    pub fn production(acoustid_api_key: Option<String>) -> AcquireResult<Self> {
        let identifier = match acoustid_api_key {
            Some(key) => Some(Arc::new(AcoustIdIdentifier::new(key)?) as Arc<dyn Identifier>),
            None => None,
        };

        Ok(Self {
            search: Arc::new(YtDlpSearch::new()),
            extractor: Arc::new(YtDlpExtractor::new()),
            images: Arc::new(HttpImageFetcher::new()?),
            tagger: Arc::new(FfmpegTagger::new()),
            identifier,
            playlists: Arc::new(YtDlpPlaylistLister::new()),
        })
    }
}
