//! Collaborator doubles for orchestrator and batch tests
#![allow(dead_code)]

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tunegrab_ai::collaborators::{
    AudioExtractor, Collaborators, Identifier, ImageFetcher, PlaylistLister, SearchProvider, Tagger,
};
use tunegrab_ai::models::{CandidateRecord, QualityTier, RecognizedMetadata, SearchItem, Thumbnail};
use tunegrab_ai::{AcquireError, AcquireResult};

/// Candidate with the fields the scorer reads
pub fn candidate(id: &str, title: &str, channel: &str, duration: &str, views: &str) -> CandidateRecord {
    let mut record = CandidateRecord::minimal(id);
    record.thumbnails.clear();
    record.title = title.to_string();
    record.channel = channel.to_string();
    record.duration = duration.to_string();
    record.view_count = views.to_string();
    record
}

pub fn with_thumbnail(mut record: CandidateRecord) -> CandidateRecord {
    record.thumbnails.push(Thumbnail {
        url: format!("https://img.example/{}.webp", record.id),
        width: 480,
        height: 360,
    });
    record
}

/// Single page of candidates
pub fn page(candidates: Vec<CandidateRecord>) -> Vec<SearchItem> {
    let mut items = vec![SearchItem::Page { number: 1, total: 1 }];
    items.extend(candidates.into_iter().map(SearchItem::Candidate));
    items
}

/// Returns the same results for every query
pub struct FakeSearch {
    pub items: Vec<SearchItem>,
    pub fail: bool,
}

impl FakeSearch {
    pub fn returning(items: Vec<SearchItem>) -> Self {
        Self { items, fail: false }
    }

    pub fn failing() -> Self {
        Self {
            items: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl SearchProvider for FakeSearch {
    async fn search(
        &self,
        _query: &str,
        _max_results: usize,
    ) -> AcquireResult<BoxStream<'static, AcquireResult<SearchItem>>> {
        if self.fail {
            return Err(AcquireError::collaborator("search", "service unavailable"));
        }
        Ok(stream::iter(self.items.clone().into_iter().map(Ok)).boxed())
    }
}

/// Writes `<prefix>.mp3` containing the source URL; fails for listed sources
#[derive(Default)]
pub struct FakeExtractor {
    pub failing_ids: Vec<String>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeExtractor {
    pub fn failing_for(ids: &[&str]) -> Self {
        Self {
            failing_ids: ids.iter().map(|s| s.to_string()).collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AudioExtractor for FakeExtractor {
    async fn extract_audio(
        &self,
        source: &str,
        output_prefix: &Path,
        quality: QualityTier,
    ) -> AcquireResult<PathBuf> {
        self.calls.lock().unwrap().push(source.to_string());
        if self.failing_ids.iter().any(|id| source.ends_with(id.as_str())) {
            return Err(AcquireError::collaborator("yt-dlp", "video unavailable"));
        }
        let mut file_name = output_prefix.file_name().unwrap_or_default().to_os_string();
        file_name.push(".mp3");
        let path = output_prefix.with_file_name(file_name);
        tokio::fs::write(&path, format!("{} @ {}k", source, quality.bitrate_kbps())).await?;
        Ok(path)
    }
}

/// Writes a small file under the requested name and records the source URL
#[derive(Default)]
pub struct FakeImages {
    urls: Mutex<Vec<String>>,
}

impl FakeImages {
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageFetcher for FakeImages {
    async fn fetch_and_convert(
        &self,
        url: &str,
        dest_dir: &Path,
        filename: Option<&str>,
    ) -> AcquireResult<(PathBuf, (u32, u32))> {
        self.urls.lock().unwrap().push(url.to_string());
        tokio::fs::create_dir_all(dest_dir).await?;
        let path = dest_dir.join(filename.unwrap_or("cover.jpg"));
        tokio::fs::write(&path, b"jpeg").await?;
        Ok((path, (480, 360)))
    }
}

/// Copies the audio to a sibling file per step, optionally failing cover art
#[derive(Default)]
pub struct FakeTagger {
    pub fail_cover: bool,
}

async fn sibling_copy(audio: &Path, marker: &str) -> AcquireResult<PathBuf> {
    let stem = audio.file_stem().unwrap_or_default().to_string_lossy();
    let ext = audio.extension().unwrap_or_default().to_string_lossy();
    let out = audio.with_file_name(format!("{}{}.{}", stem, marker, ext));
    tokio::fs::copy(audio, &out).await?;
    Ok(out)
}

#[async_trait]
impl Tagger for FakeTagger {
    async fn embed_cover_art(&self, audio: &Path, _image: &Path) -> AcquireResult<PathBuf> {
        if self.fail_cover {
            return Err(AcquireError::collaborator("ffmpeg", "cover stream rejected"));
        }
        sibling_copy(audio, "_embedded").await
    }

    async fn embed_provenance(&self, audio: &Path, _text: &str) -> AcquireResult<PathBuf> {
        sibling_copy(audio, "_source").await
    }
}

/// Always recognizes the same recording
pub struct FakeIdentifier {
    pub metadata: Option<RecognizedMetadata>,
}

#[async_trait]
impl Identifier for FakeIdentifier {
    async fn identify_and_tag(
        &self,
        _audio: &Path,
        _cover: Option<&Path>,
    ) -> AcquireResult<Option<RecognizedMetadata>> {
        Ok(self.metadata.clone())
    }
}

pub struct FakePlaylist {
    pub ids: Vec<String>,
}

#[async_trait]
impl PlaylistLister for FakePlaylist {
    async fn list_identifiers(&self, reference: &str) -> AcquireResult<Vec<String>> {
        if reference.is_empty() {
            return Err(AcquireError::collaborator("yt-dlp", "empty playlist reference"));
        }
        Ok(self.ids.clone())
    }
}

/// Doubles wired together; tests swap individual fields
pub struct Doubles {
    pub extractor: Arc<FakeExtractor>,
    pub images: Arc<FakeImages>,
    pub collaborators: Collaborators,
}

pub fn doubles(search: FakeSearch) -> Doubles {
    doubles_with(search, FakeExtractor::default(), FakeTagger::default(), Vec::new())
}

pub fn doubles_with(
    search: FakeSearch,
    extractor: FakeExtractor,
    tagger: FakeTagger,
    playlist: Vec<&str>,
) -> Doubles {
    let extractor = Arc::new(extractor);
    let images = Arc::new(FakeImages::default());
    let collaborators = Collaborators {
        search: Arc::new(search),
        extractor: extractor.clone(),
        images: images.clone(),
        tagger: Arc::new(tagger),
        identifier: None,
        playlists: Arc::new(FakePlaylist {
            ids: playlist.into_iter().map(String::from).collect(),
        }),
    };
    Doubles {
        extractor,
        images,
        collaborators,
    }
}
