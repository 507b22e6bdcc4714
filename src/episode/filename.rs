// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

/// Extension of the final, converted audio artifact
pub const AUDIO_EXTENSION: &str = "mp3";

/// Extension of the raw downloaded stream
pub const INTERMEDIATE_EXTENSION: &str = "mp4";

/// Suffix for files that are still being written
pub const PARTIAL_SUFFIX: &str = ".partial";

/// Title marker of short-form clips that are never resolved
const SHORTS_MARKER: &str = "#shorts";

/// Make a remote media id safe to use as a filename and process argument.
///
/// A leading `-` would be read as a flag by the audio transform, so it
/// becomes `_`. Only the first character is touched.
pub fn safe_media_id(id: &str) -> String {
    match id.strip_prefix('-') {
        Some(rest) => format!("_{rest}"),
        None => id.to_string(),
    }
}

/// Whether a title marks the episode as a short-form clip
pub fn is_shorts_title(title: &str) -> bool {
    title.to_lowercase().contains(SHORTS_MARKER)
}

/// On-disk locations of every artifact that belongs to one media id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// `<id>.mp3`, the completion marker
    pub audio: PathBuf,
    /// `<id>.mp3.partial`, conversion output before validation
    pub audio_partial: PathBuf,
    /// `<id>.mp4`, a fully downloaded stream awaiting conversion
    pub intermediate: PathBuf,
    /// `<id>.mp4.partial`, a download in flight
    pub partial: PathBuf,
}

impl ArtifactPaths {
    pub fn new(media_dir: &Path, media_id: &str) -> Self {
        let id = safe_media_id(media_id);
        let intermediate = media_dir.join(format!("{id}.{INTERMEDIATE_EXTENSION}"));
        let partial = media_dir.join(format!("{id}.{INTERMEDIATE_EXTENSION}{PARTIAL_SUFFIX}"));

        Self {
            audio: media_dir.join(format!("{id}.{AUDIO_EXTENSION}")),
            audio_partial: media_dir.join(format!("{id}.{AUDIO_EXTENSION}{PARTIAL_SUFFIX}")),
            intermediate,
            partial,
        }
    }
}

/// Filename of the final audio artifact for a media id
pub fn audio_filename(media_id: &str) -> String {
    format!("{}.{AUDIO_EXTENSION}", safe_media_id(media_id))
}
