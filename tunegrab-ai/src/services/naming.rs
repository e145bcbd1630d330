//! File and folder naming for relocated artifacts and reports

use crate::models::RecognizedMetadata;
use std::path::{Path, PathBuf};

/// Characters rejected by at least one common filesystem
const RESERVED: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Make one path component safe: reserved and control characters become `_`,
/// surrounding dots/spaces are trimmed. Never returns an empty string.
pub fn sanitize_component(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if RESERVED.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    let trimmed = replaced.trim().trim_matches('.').trim();
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Lower-case ASCII slug; runs of anything else collapse into one `-`
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Destination for a relocated artifact
///
/// With recognized artist and title: `<dest>/<artist>/[<album>/]<title>.<ext>`.
/// Otherwise: `<dest>/<fallback>.<ext>`.
pub fn destination_path(
    dest_dir: &Path,
    recognized: Option<&RecognizedMetadata>,
    fallback_name: &str,
    extension: &str,
) -> PathBuf {
    let file_name = |stem: &str| {
        if extension.is_empty() {
            sanitize_component(stem)
        } else {
            format!("{}.{}", sanitize_component(stem), extension)
        }
    };

    match recognized.filter(|m| m.has_artist_and_title()) {
        Some(meta) => {
            let mut path = dest_dir.join(sanitize_component(meta.artist.as_deref().unwrap_or_default()));
            if let Some(album) = meta.album.as_deref().filter(|a| !a.trim().is_empty()) {
                path.push(sanitize_component(album));
            }
            path.join(file_name(meta.title.as_deref().unwrap_or_default()))
        }
        None => dest_dir.join(file_name(fallback_name)),
    }
}

/// `dir/stem (n).ext` for `dir/stem.ext`
pub fn numbered_variant(path: &Path, n: u32) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{} ({}).{}", stem, n, ext.to_string_lossy()),
        None => format!("{} ({})", stem, n),
    };
    path.with_file_name(name)
}
