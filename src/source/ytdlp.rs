// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use crate::episode::StreamFormat;
use crate::error::{ConfigError, SourceError};
use crate::http::{HttpClient, HttpResponse};

use super::feed::{channel_feed_url, parse_channel_feed};
use super::{ChannelFeed, RemoteSource, StreamInfo, StreamLookup};

const TOOL_NAME: &str = "yt-dlp";

/// Default bound on a single metadata lookup
pub const DEFAULT_METADATA_TIMEOUT: Duration = Duration::from_secs(120);

/// Remote source backed by the public channel feed and the `yt-dlp` binary
#[derive(Clone)]
pub struct YtDlpSource<C> {
    client: C,
    binary: PathBuf,
    timeout: Duration,
}

impl<C: HttpClient> YtDlpSource<C> {
    /// Create a source with an explicit `yt-dlp` binary path
    pub fn new(client: C, binary: PathBuf, timeout: Duration) -> Self {
        Self {
            client,
            binary,
            timeout,
        }
    }

    /// Locate `yt-dlp` in PATH
    pub fn from_path(client: C, timeout: Duration) -> Result<Self, ConfigError> {
        let binary = which::which(TOOL_NAME).map_err(|_| ConfigError::ToolNotFound {
            tool: TOOL_NAME.to_string(),
        })?;
        Ok(Self::new(client, binary, timeout))
    }
}

#[async_trait]
impl<C: HttpClient> RemoteSource for YtDlpSource<C> {
    async fn fetch_recent(&self, channel_id: &str) -> Result<ChannelFeed, SourceError> {
        let url = channel_feed_url(channel_id);
        let bytes = self
            .client
            .get_bytes(&url)
            .await
            .map_err(|e| SourceError::FetchFailed { url, source: e })?;
        parse_channel_feed(&bytes)
    }

    async fn fetch_stream_metadata(&self, link: &str) -> Result<StreamLookup, SourceError> {
        let child = Command::new(&self.binary)
            .args([
                "-J",
                "--no-warnings",
                "--no-playlist",
                "--ignore-no-formats-error",
                "--",
                link,
            ])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| SourceError::ToolTimedOut {
                tool: TOOL_NAME.to_string(),
                link: link.to_string(),
                timeout: self.timeout,
            })?
            .map_err(|e| SourceError::ToolFailed {
                tool: TOOL_NAME.to_string(),
                link: link.to_string(),
                source: e,
            })?;

        if !output.status.success() {
            return Err(SourceError::ToolExited {
                tool: TOOL_NAME.to_string(),
                link: link.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_stream_metadata(link, &output.stdout)
    }

    async fn open_stream(&self, format: &StreamFormat) -> Result<HttpResponse, reqwest::Error> {
        self.client.get_stream(&format.url).await
    }
}

#[derive(Debug, Deserialize)]
struct VideoDto {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    live_status: Option<String>,
    #[serde(default)]
    formats: Vec<FormatDto>,
}

#[derive(Debug, Deserialize)]
struct FormatDto {
    format_id: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    ext: Option<String>,
    #[serde(default)]
    acodec: Option<String>,
    #[serde(default)]
    vcodec: Option<String>,
    #[serde(default)]
    quality: Option<f64>,
    #[serde(default)]
    filesize: Option<u64>,
    #[serde(default)]
    filesize_approx: Option<u64>,
}

fn has_codec(codec: Option<&str>) -> bool {
    codec.is_some_and(|c| !c.is_empty() && c != "none")
}

impl FormatDto {
    fn into_stream_format(self) -> Option<StreamFormat> {
        let url = self.url?;
        let has_audio = has_codec(self.acodec.as_deref());
        let has_video = has_codec(self.vcodec.as_deref());
        let kind = if has_video { "video" } else { "audio" };

        Some(StreamFormat {
            format_id: self.format_id,
            url,
            mime_type: self.ext.map(|ext| format!("{kind}/{ext}")),
            quality: self.quality.unwrap_or_default(),
            has_audio,
            has_video,
            content_length: self.filesize.or(self.filesize_approx),
        })
    }
}

/// Translate `yt-dlp -J` output into a stream lookup
pub fn parse_stream_metadata(link: &str, json: &[u8]) -> Result<StreamLookup, SourceError> {
    let video: VideoDto =
        serde_json::from_slice(json).map_err(|e| SourceError::MetadataParseFailed {
            link: link.to_string(),
            source: e,
        })?;

    if video.live_status.as_deref() == Some("is_upcoming") {
        return Ok(StreamLookup::NotYetLive);
    }

    let duration = video
        .duration
        .map(|secs| Duration::from_secs_f64(secs.abs()))
        .unwrap_or_default();

    Ok(StreamLookup::Ready(StreamInfo {
        id: video.id,
        title: video.title,
        duration,
        description: video.description.filter(|d| !d.is_empty()),
        formats: video
            .formats
            .into_iter()
            .filter_map(FormatDto::into_stream_format)
            .collect(),
    }))
}
