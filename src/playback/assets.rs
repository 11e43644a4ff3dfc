//! Audio asset resolution.

use std::path::{Path, PathBuf};

use crate::core::types::TrackId;

use super::PlaybackError;

/// Resolves track ids to audio files under a fixed assets directory.
///
/// A track id without an extension maps to `<id>.mp3`; ids that already
/// carry an extension are used as-is.
#[derive(Debug, Clone)]
pub struct AssetLibrary {
    dir: PathBuf,
}

impl AssetLibrary {
    /// Create a library rooted at the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The library root.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Resolve a track to an existing file on disk.
    pub fn resolve(&self, track: &TrackId) -> Result<PathBuf, PlaybackError> {
        let file_name = if Path::new(track.as_str()).extension().is_some() {
            track.as_str().to_string()
        } else {
            format!("{}.mp3", track.as_str())
        };

        let path = self.dir.join(file_name);
        if path.is_file() {
            Ok(path)
        } else {
            Err(PlaybackError::AssetUnavailable(format!(
                "{} (looked in {})",
                track,
                self.dir.display()
            )))
        }
    }
}
