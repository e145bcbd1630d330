//! Cover image download and JPEG conversion

use super::ImageFetcher;
use crate::error::{AcquireError, AcquireResult};
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;

const COLLABORATOR: &str = "image fetch";

/// Default timeout for image downloads
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpImageFetcher {
    http_client: Client,
}

impl HttpImageFetcher {
    pub fn new() -> AcquireResult<Self> {
        let http_client = Client::builder()
            .user_agent(concat!("tunegrab/", env!("CARGO_PKG_VERSION")))
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| AcquireError::collaborator(COLLABORATOR, e))?;
        Ok(Self { http_client })
    }
}

/// Target file name: explicit name or URL basename, always with a `.jpg` extension
pub fn jpeg_file_name(url: &str, filename: Option<&str>) -> String {
    let raw = match filename.filter(|f| !f.trim().is_empty()) {
        Some(name) => name.to_string(),
        None => url
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').next())
            .filter(|base| !base.is_empty())
            .unwrap_or("cover")
            .to_string(),
    };
    let stem = Path::new(&raw)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "cover".to_string());
    format!("{}.jpg", stem)
}

/// Decode any supported format, drop alpha, write JPEG
pub fn convert_to_jpeg(bytes: &[u8], dest: &Path) -> AcquireResult<(u32, u32)> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| AcquireError::collaborator(COLLABORATOR, format!("decode failed: {}", e)))?;
    let rgb = DynamicImage::ImageRgb8(decoded.to_rgb8());
    let dimensions = (rgb.width(), rgb.height());
    rgb.save_with_format(dest, ImageFormat::Jpeg)
        .map_err(|e| AcquireError::collaborator(COLLABORATOR, format!("encode failed: {}", e)))?;
    Ok(dimensions)
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch_and_convert(
        &self,
        url: &str,
        dest_dir: &Path,
        filename: Option<&str>,
    ) -> AcquireResult<(PathBuf, (u32, u32))> {
        let dest = dest_dir.join(jpeg_file_name(url, filename));
        tracing::debug!(url, dest = %dest.display(), "Downloading image");

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AcquireError::collaborator(COLLABORATOR, e))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AcquireError::collaborator(COLLABORATOR, e))?;

        tokio::fs::create_dir_all(dest_dir).await?;
        let task_dest = dest.clone();
        let dimensions = tokio::task::spawn_blocking(move || convert_to_jpeg(&bytes, &task_dest))
            .await
            .map_err(|e| AcquireError::collaborator(COLLABORATOR, format!("conversion task failed: {}", e)))??;

        tracing::debug!(width = dimensions.0, height = dimensions.1, "Image converted");
        Ok((dest, dimensions))
    }
}
