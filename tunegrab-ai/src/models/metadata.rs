//! Metadata recognized for a downloaded artifact

use serde::{Deserialize, Serialize};

/// Title/artist/album as corrected by the recognition collaborator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognizedMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// Recognition service identifier (e.g. MusicBrainz recording id)
    pub recording_id: Option<String>,
}

impl RecognizedMetadata {
    /// True when there is enough to organize the file into artist folders
    pub fn has_artist_and_title(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.artist) && present(&self.title)
    }
}
