// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod convert;
mod download;

use std::fmt;
use std::path::Path;

use crate::episode::{ArtifactPaths, EpisodeRecord};
use crate::error::AcquireError;
use crate::progress::SharedProgressReporter;
use crate::source::RemoteSource;

pub use convert::{
    ConversionOutcome, DEFAULT_BITRATE, DEFAULT_TRANSCODE_TIMEOUT, FfmpegTranscoder, Transcoder,
    convert_validated,
};
pub use download::{DownloadContext, download_stream};

/// Smallest converted file accepted as a real episode
pub const DEFAULT_MIN_AUDIO_BYTES: u64 = 4_000_000;

/// Conversion runs allowed before the output is declared corrupt
pub const DEFAULT_MAX_CONVERSION_ATTEMPTS: u32 = 3;

/// Tunables of the acquisition pipeline
#[derive(Debug, Clone)]
pub struct AcquireOptions {
    pub min_audio_bytes: u64,
    pub max_conversion_attempts: u32,
    /// Keep `<id>.mp4` after a successful conversion
    pub keep_intermediate: bool,
}

impl Default for AcquireOptions {
    fn default() -> Self {
        Self {
            min_audio_bytes: DEFAULT_MIN_AUDIO_BYTES,
            max_conversion_attempts: DEFAULT_MAX_CONVERSION_ATTEMPTS,
            keep_intermediate: false,
        }
    }
}

/// Stage of one episode's download-and-convert cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionState {
    NeedsDownload,
    Downloading,
    NeedsConversion,
    Converting,
    Done,
    Failed,
}

impl fmt::Display for AcquisitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AcquisitionState::NeedsDownload => "needs-download",
            AcquisitionState::Downloading => "downloading",
            AcquisitionState::NeedsConversion => "needs-conversion",
            AcquisitionState::Converting => "converting",
            AcquisitionState::Done => "done",
            AcquisitionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// How an acquisition reached `Done`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquired {
    /// The final artifact existed before this run touched anything
    AlreadyPresent,
    Completed {
        bytes_downloaded: u64,
        audio_bytes: u64,
        conversion_attempts: u32,
    },
}

/// Decide where an episode starts, cleaning up a stale intermediate file
/// when the final artifact already exists.
pub async fn entry_state(paths: &ArtifactPaths) -> AcquisitionState {
    if paths.audio.exists() {
        remove_if_present(&paths.intermediate).await;
        AcquisitionState::Done
    } else if paths.intermediate.exists() {
        AcquisitionState::NeedsConversion
    } else {
        AcquisitionState::NeedsDownload
    }
}

async fn remove_if_present(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed intermediate file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Could not remove file"),
    }
}

/// Drive one resolved record from wherever it stands on disk to `Done`,
/// or to `Failed` with the error of the stage that failed.
///
/// An existing `<id>.mp3` short-circuits everything, including network
/// access. Errors leave no final artifact behind, so the next run retries.
pub async fn acquire_media<S, T>(
    source: &S,
    transcoder: &T,
    record: &EpisodeRecord,
    media_dir: &Path,
    options: &AcquireOptions,
    context: &DownloadContext,
    reporter: &SharedProgressReporter,
) -> Result<Acquired, AcquireError>
where
    S: RemoteSource + ?Sized,
    T: Transcoder + ?Sized,
{
    if record.media_id.is_empty() {
        return Err(AcquireError::Unresolved {
            title: record.title.clone(),
        });
    }

    let paths = ArtifactPaths::new(media_dir, &record.media_id);
    let title = record.title.as_str();

    let mut state = entry_state(&paths).await;
    let mut bytes_downloaded = 0;
    let mut conversion = None;
    let mut failure = None;

    while !matches!(state, AcquisitionState::Done | AcquisitionState::Failed) {
        let next = match state {
            AcquisitionState::NeedsDownload => match record.stream_format() {
                Some(_) => Ok(AcquisitionState::Downloading),
                None => Err(AcquireError::Unresolved {
                    title: title.to_string(),
                }),
            },
            AcquisitionState::Downloading => match record.stream_format() {
                Some(format) => download_stream(source, format, title, &paths, context, reporter)
                    .await
                    .map(|bytes| {
                        bytes_downloaded = bytes;
                        AcquisitionState::NeedsConversion
                    }),
                None => Err(AcquireError::Unresolved {
                    title: title.to_string(),
                }),
            },
            AcquisitionState::NeedsConversion => Ok(AcquisitionState::Converting),
            AcquisitionState::Converting => {
                match convert_validated(transcoder, &paths, options, title, context, reporter).await
                {
                    Ok(outcome) => {
                        conversion = Some(outcome);
                        Ok(AcquisitionState::Done)
                    }
                    Err(e) => {
                        discard_after_failed_conversion(&paths, &e).await;
                        Err(e)
                    }
                }
            }
            AcquisitionState::Done | AcquisitionState::Failed => Ok(state),
        };

        match next {
            Ok(next) => {
                tracing::debug!(episode = %title, from = %state, to = %next, "Acquisition stage");
                state = next;
            }
            Err(e) => {
                tracing::warn!(
                    episode = %title,
                    stage = %state,
                    to = %AcquisitionState::Failed,
                    error = %e,
                    "Acquisition failed"
                );
                state = AcquisitionState::Failed;
                failure = Some(e);
            }
        }
    }

    if let Some(error) = failure {
        return Err(error);
    }

    let Some(outcome) = conversion else {
        return Ok(Acquired::AlreadyPresent);
    };

    if !options.keep_intermediate {
        remove_if_present(&paths.intermediate).await;
    }

    Ok(Acquired::Completed {
        bytes_downloaded,
        audio_bytes: outcome.audio_bytes,
        conversion_attempts: outcome.attempts,
    })
}

/// Remove conversion leftovers. The intermediate file is kept only when
/// the transform tool itself is missing.
async fn discard_after_failed_conversion(paths: &ArtifactPaths, error: &AcquireError) {
    remove_if_present(&paths.audio_partial).await;
    if !error.is_fatal() {
        remove_if_present(&paths.intermediate).await;
    }
}
