// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;
use std::path::Path;

use crate::episode::{AUDIO_EXTENSION, INTERMEDIATE_EXTENSION, PARTIAL_SUFFIX};
use crate::error::StateError;

/// State of the media directory after startup cleanup
#[derive(Debug, Clone)]
pub struct MediaDirState {
    /// Media ids with a finished audio artifact
    pub audio_ids: HashSet<String>,
    /// Number of partial files that were cleaned up during scan
    pub partial_files_cleaned: usize,
    /// Number of intermediates removed because their audio already exists
    pub stale_intermediates_cleaned: usize,
}

impl MediaDirState {
    pub fn has_audio(&self, media_id: &str) -> bool {
        self.audio_ids.contains(media_id)
    }
}

/// Scan the media directory, creating it if needed.
///
/// Removes `.partial` files left by interrupted runs and intermediates whose
/// audio artifact is already complete.
pub fn scan_media_dir(media_dir: &Path) -> Result<MediaDirState, StateError> {
    let mut state = MediaDirState {
        audio_ids: HashSet::new(),
        partial_files_cleaned: 0,
        stale_intermediates_cleaned: 0,
    };

    if !media_dir.exists() {
        std::fs::create_dir_all(media_dir).map_err(|e| StateError::CreateDirectoryFailed {
            path: media_dir.to_path_buf(),
            source: e,
        })?;
        return Ok(state);
    }

    let entries = std::fs::read_dir(media_dir).map_err(|e| StateError::ReadDirectoryFailed {
        path: media_dir.to_path_buf(),
        source: e,
    })?;

    let mut intermediates = Vec::new();

    for entry in entries {
        let entry = entry.map_err(|e| StateError::ReadDirectoryFailed {
            path: media_dir.to_path_buf(),
            source: e,
        })?;

        let path = entry.path();
        let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        if filename.ends_with(PARTIAL_SUFFIX) {
            match std::fs::remove_file(&path) {
                Ok(()) => state.partial_files_cleaned += 1,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Could not remove partial file")
                }
            }
            continue;
        }

        match path.extension().and_then(|e| e.to_str()) {
            Some(AUDIO_EXTENSION) => {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    state.audio_ids.insert(stem.to_string());
                }
            }
            Some(INTERMEDIATE_EXTENSION) => intermediates.push(path.clone()),
            _ => {}
        }
    }

    for intermediate in intermediates {
        let finished = intermediate
            .file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(|stem| state.has_audio(stem));

        if finished && std::fs::remove_file(&intermediate).is_ok() {
            tracing::debug!(path = %intermediate.display(), "Removed stale intermediate");
            state.stale_intermediates_cleaned += 1;
        }
    }

    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn scan_empty_dir_returns_empty_state() {
        let dir = tempdir().unwrap();
        let state = scan_media_dir(dir.path()).unwrap();

        assert!(state.audio_ids.is_empty());
        assert_eq!(state.partial_files_cleaned, 0);
        assert_eq!(state.stale_intermediates_cleaned, 0);
    }

    #[test]
    fn scan_creates_nonexistent_dir() {
        let dir = tempdir().unwrap();
        let media_dir = dir.path().join("media");

        assert!(!media_dir.exists());
        let state = scan_media_dir(&media_dir).unwrap();
        assert!(media_dir.exists());
        assert!(state.audio_ids.is_empty());
    }

    #[test]
    fn scan_cleans_up_partial_files() {
        let dir = tempdir().unwrap();

        std::fs::write(dir.path().join("a.mp4.partial"), b"partial download").unwrap();
        std::fs::write(dir.path().join("b.mp3.partial"), b"partial audio").unwrap();
        std::fs::write(dir.path().join("c.mp3"), b"complete audio").unwrap();

        let state = scan_media_dir(dir.path()).unwrap();

        assert_eq!(state.partial_files_cleaned, 2);
        assert!(!dir.path().join("a.mp4.partial").exists());
        assert!(!dir.path().join("b.mp3.partial").exists());
        assert!(dir.path().join("c.mp3").exists());
        assert!(state.has_audio("c"));
        assert!(!state.has_audio("b"));
    }

    #[test]
    fn scan_removes_intermediate_when_audio_exists() {
        let dir = tempdir().unwrap();

        std::fs::write(dir.path().join("done.mp3"), b"audio").unwrap();
        std::fs::write(dir.path().join("done.mp4"), b"video").unwrap();
        std::fs::write(dir.path().join("pending.mp4"), b"video").unwrap();

        let state = scan_media_dir(dir.path()).unwrap();

        assert_eq!(state.stale_intermediates_cleaned, 1);
        assert!(!dir.path().join("done.mp4").exists());
        // No audio yet, so this one is still waiting for conversion
        assert!(dir.path().join("pending.mp4").exists());
    }

    #[test]
    fn scan_ignores_unrelated_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("Channel.xml"), b"<rss/>").unwrap();

        let state = scan_media_dir(dir.path()).unwrap();

        assert!(state.audio_ids.is_empty());
        assert!(dir.path().join("Channel.xml").exists());
    }
}
