//! ffmpeg backed tag writing
//!
//! Every operation writes a new sibling file and leaves its input untouched.

use super::process;
use super::Tagger;
use crate::error::AcquireResult;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

const FFMPEG: &str = "ffmpeg";

#[derive(Debug, Default, Clone)]
pub struct FfmpegTagger;

impl FfmpegTagger {
    pub fn new() -> Self {
        Self
    }
}

/// `<dir>/<stem><marker>.<ext>` next to `audio`
pub fn sibling_path(audio: &Path, marker: &str) -> PathBuf {
    let stem = audio
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio".to_string());
    let extension = audio
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mp3".to_string());
    audio.with_file_name(format!("{}{}.{}", stem, marker, extension))
}

/// Arguments attaching `image` as the front cover of `audio`
pub fn cover_art_args(audio: &Path, image: &Path, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-y".into(), "-i".into(), audio.into(), "-i".into(), image.into()];
    args.extend(
        [
            "-map", "0", "-map", "1", "-c:a", "copy", "-c:v", "mjpeg", "-q:v", "2",
            "-id3v2_version", "3", "-metadata:s:v", "title=Cover", "-metadata:s:v",
            "comment=Cover (front)",
        ]
        .into_iter()
        .map(OsString::from),
    );
    args.push(output.into());
    args
}

/// Arguments writing `text` into the comment tag of `audio`
pub fn provenance_args(audio: &Path, text: &str, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-y".into(), "-i".into(), audio.into()];
    args.extend(
        ["-map", "0", "-c", "copy", "-id3v2_version", "3", "-metadata"]
            .into_iter()
            .map(OsString::from),
    );
    args.push(format!("comment={}", text).into());
    args.push(output.into());
    args
}

#[async_trait]
impl Tagger for FfmpegTagger {
    async fn embed_cover_art(&self, audio: &Path, image: &Path) -> AcquireResult<PathBuf> {
        let output = sibling_path(audio, "_embedded");
        tracing::debug!(audio = %audio.display(), image = %image.display(), "Embedding cover art");
        process::run(FFMPEG, cover_art_args(audio, image, &output)).await?;
        Ok(output)
    }

    async fn embed_provenance(&self, audio: &Path, text: &str) -> AcquireResult<PathBuf> {
        let output = sibling_path(audio, "_source");
        tracing::debug!(audio = %audio.display(), "Embedding provenance");
        process::run(FFMPEG, provenance_args(audio, text, &output)).await?;
        Ok(output)
    }
}
