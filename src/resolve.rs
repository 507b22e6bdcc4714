// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::cmp::Ordering;
use std::path::Path;

use crate::episode::{
    ArtifactPaths, EpisodeRecord, SourceMeta, StreamFormat, is_shorts_title, safe_media_id,
};
use crate::error::SourceError;
use crate::source::{RemoteSource, StreamLookup};

/// What resolving one record amounted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Media fields were filled in from fresh stream metadata
    Resolved,
    /// The final audio artifact is already on disk; nothing was fetched
    AlreadyPresent,
    /// Scheduled broadcast that has not started; try again next run
    NotYetLive,
    /// Short-form clip, never resolved
    ShortsSkipped,
}

/// Pick the stream to download from the formats offered.
///
/// Only audio-only streams qualify. Among those, the lowest quality tier is
/// taken, and within that tier the smallest content length. Streams of
/// unknown length rank after every stream of known length.
pub fn select_audio_stream(formats: &[StreamFormat]) -> Option<&StreamFormat> {
    let audio: Vec<&StreamFormat> = formats.iter().filter(|f| f.is_audio_only()).collect();

    let lowest_tier = audio
        .iter()
        .map(|f| f.quality)
        .min_by(|a, b| a.total_cmp(b))?;

    audio
        .into_iter()
        .filter(|f| f.quality.total_cmp(&lowest_tier) == Ordering::Equal)
        .min_by_key(|f| f.content_length.unwrap_or(u64::MAX))
}

/// Fill in the media fields of a record that has no audio artifact yet.
///
/// When `<media_dir>/<media_id>.mp3` already exists, no remote call is made.
pub async fn resolve_media<S: RemoteSource + ?Sized>(
    source: &S,
    record: &mut EpisodeRecord,
    media_dir: &Path,
) -> Result<Resolution, SourceError> {
    if is_shorts_title(&record.title) {
        return Ok(Resolution::ShortsSkipped);
    }

    if !record.media_id.is_empty() {
        record.media_id = safe_media_id(&record.media_id);
        if ArtifactPaths::new(media_dir, &record.media_id).audio.exists() {
            return Ok(Resolution::AlreadyPresent);
        }
    }

    tracing::debug!(episode = %record.title, link = %record.source_link, "Resolving stream");

    let info = match source.fetch_stream_metadata(&record.source_link).await? {
        StreamLookup::Ready(info) => info,
        StreamLookup::NotYetLive => {
            tracing::info!(episode = %record.title, "Episode not yet live, deferring");
            return Ok(Resolution::NotYetLive);
        }
    };

    let format = select_audio_stream(&info.formats)
        .cloned()
        .ok_or_else(|| SourceError::NoAudioStream {
            link: record.source_link.clone(),
        })?;

    record.media_id = safe_media_id(&info.id);
    record.duration = info.duration;
    record.source_meta = Some(SourceMeta {
        title: info.title,
        duration: info.duration,
        description: info.description,
        format,
    });

    Ok(Resolution::Resolved)
}
