// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use futures::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::episode::{ArtifactPaths, StreamFormat};
use crate::error::AcquireError;
use crate::http::HttpResponse;
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::source::RemoteSource;

/// Context for tracking a download in concurrent scenarios
#[derive(Debug, Clone)]
pub struct DownloadContext {
    /// Slot ID (0 to max_concurrent-1) for progress bar management
    pub download_id: usize,
    /// Index of this episode within the channel pass
    pub episode_index: usize,
    /// Number of episodes in the channel pass
    pub total_episodes: usize,
}

/// Download a resolved stream to the intermediate artifact.
///
/// The body is written to `<id>.mp4.partial` and renamed to `<id>.mp4` once
/// complete. On any failure the partial file is removed. Returns the number
/// of bytes downloaded.
pub async fn download_stream<S: RemoteSource + ?Sized>(
    source: &S,
    format: &StreamFormat,
    title: &str,
    paths: &ArtifactPaths,
    context: &DownloadContext,
    reporter: &SharedProgressReporter,
) -> Result<u64, AcquireError> {
    let result = stream_to_partial(source, format, title, paths, context, reporter).await;

    let finished = match result {
        Ok(bytes) => tokio::fs::rename(&paths.partial, &paths.intermediate)
            .await
            .map(|_| bytes)
            .map_err(|e| AcquireError::FileWriteFailed {
                path: paths.intermediate.clone(),
                source: e,
            }),
        Err(e) => Err(e),
    };

    if finished.is_err()
        && let Err(e) = tokio::fs::remove_file(&paths.partial).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        tracing::warn!(path = %paths.partial.display(), error = %e, "Could not remove partial download");
    }

    finished
}

async fn stream_to_partial<S: RemoteSource + ?Sized>(
    source: &S,
    format: &StreamFormat,
    title: &str,
    paths: &ArtifactPaths,
    context: &DownloadContext,
    reporter: &SharedProgressReporter,
) -> Result<u64, AcquireError> {
    let output_path = &paths.partial;

    let mut file = File::create(output_path)
        .await
        .map_err(|e| AcquireError::FileCreateFailed {
            path: output_path.to_path_buf(),
            source: e,
        })?;

    let response = open_with_retry(source, format, title, context, reporter).await?;

    // Report download starting
    reporter.report(ProgressEvent::DownloadStarting {
        download_id: context.download_id,
        episode_title: title.to_string(),
        episode_index: context.episode_index,
        total_episodes: context.total_episodes,
        content_length: response.content_length.or(format.content_length),
    });

    let mut bytes_downloaded: u64 = 0;
    let mut stream = response.body;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| AcquireError::StreamFailed {
            title: title.to_string(),
            source: e,
        })?;

        file.write_all(&chunk)
            .await
            .map_err(|e| AcquireError::FileWriteFailed {
                path: output_path.to_path_buf(),
                source: e,
            })?;

        bytes_downloaded += chunk.len() as u64;

        reporter.report(ProgressEvent::DownloadProgress {
            download_id: context.download_id,
            episode_title: title.to_string(),
            bytes_downloaded,
            total_bytes: response.content_length,
        });
    }

    // Ensure all data is flushed to disk
    file.flush()
        .await
        .map_err(|e| AcquireError::FileWriteFailed {
            path: output_path.to_path_buf(),
            source: e,
        })?;

    Ok(bytes_downloaded)
}

/// Request the stream, retrying exactly once on a transient rejection
async fn open_with_retry<S: RemoteSource + ?Sized>(
    source: &S,
    format: &StreamFormat,
    title: &str,
    context: &DownloadContext,
    reporter: &SharedProgressReporter,
) -> Result<HttpResponse, AcquireError> {
    match request_stream(source, format, title).await {
        Err(e) if e.is_transient() => {
            tracing::warn!(episode = %title, error = %e, "Stream request rejected, retrying once");
            reporter.report(ProgressEvent::DownloadRetrying {
                download_id: context.download_id,
                episode_title: title.to_string(),
            });
            request_stream(source, format, title).await
        }
        other => other,
    }
}

async fn request_stream<S: RemoteSource + ?Sized>(
    source: &S,
    format: &StreamFormat,
    title: &str,
) -> Result<HttpResponse, AcquireError> {
    let response = source
        .open_stream(format)
        .await
        .map_err(|e| AcquireError::HttpFailed {
            title: title.to_string(),
            source: e,
        })?;

    match response.status {
        403 => Err(AcquireError::Forbidden {
            title: title.to_string(),
        }),
        status if status >= 400 => Err(AcquireError::HttpStatus {
            title: title.to_string(),
            status,
        }),
        _ => Ok(response),
    }
}
