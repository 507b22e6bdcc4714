// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Hand-written doubles for the remote source and the audio transform

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::acquire::Transcoder;
use crate::episode::StreamFormat;
use crate::error::{ConvertError, SourceError};
use crate::http::{ByteStream, HttpResponse};
use crate::source::{ChannelFeed, RemoteEpisode, RemoteSource, StreamInfo, StreamLookup};

pub fn audio_format(format_id: &str, quality: f64, content_length: Option<u64>) -> StreamFormat {
    StreamFormat {
        format_id: format_id.to_string(),
        url: format!("https://media.example.com/{format_id}"),
        mime_type: Some("audio/m4a".to_string()),
        quality,
        has_audio: true,
        has_video: false,
        content_length,
    }
}

pub fn video_info(id: &str, secs: u64) -> StreamInfo {
    StreamInfo {
        id: id.to_string(),
        title: format!("Video {id}"),
        duration: Duration::from_secs(secs),
        description: Some(format!("About {id}")),
        formats: vec![
            audio_format("big", 2.0, Some(9_000)),
            audio_format("small", 2.0, Some(4_000)),
        ],
    }
}

pub fn remote_episode(title: &str, published: &str, link: &str) -> RemoteEpisode {
    RemoteEpisode {
        title: title.to_string(),
        published: published.to_string(),
        link: link.to_string(),
    }
}

fn tool_error(link: &str) -> SourceError {
    SourceError::ToolExited {
        tool: "mock".to_string(),
        link: link.to_string(),
        status: "exit status: 1".to_string(),
        stderr: "unavailable".to_string(),
    }
}

/// Remote source answering from in-memory tables
#[derive(Clone, Default)]
pub struct MockSource {
    feeds: HashMap<String, ChannelFeed>,
    videos: HashMap<String, StreamLookup>,
    /// Statuses handed out by successive `open_stream` calls; 200 once drained
    stream_statuses: Arc<Mutex<VecDeque<u16>>>,
    pub stream_body: Vec<u8>,
    pub metadata_calls: Arc<AtomicUsize>,
    pub stream_calls: Arc<AtomicUsize>,
}

impl MockSource {
    pub fn with_feed(mut self, channel_id: &str, feed: ChannelFeed) -> Self {
        self.feeds.insert(channel_id.to_string(), feed);
        self
    }

    pub fn with_video(mut self, link: &str, info: StreamInfo) -> Self {
        self.videos.insert(link.to_string(), StreamLookup::Ready(info));
        self
    }

    pub fn with_upcoming(mut self, link: &str) -> Self {
        self.videos.insert(link.to_string(), StreamLookup::NotYetLive);
        self
    }

    pub fn with_stream_statuses(self, statuses: &[u16]) -> Self {
        self.stream_statuses
            .lock()
            .unwrap()
            .extend(statuses.iter().copied());
        self
    }

    pub fn with_stream_body(mut self, body: &[u8]) -> Self {
        self.stream_body = body.to_vec();
        self
    }
}

#[async_trait]
impl RemoteSource for MockSource {
    async fn fetch_recent(&self, channel_id: &str) -> Result<ChannelFeed, SourceError> {
        self.feeds
            .get(channel_id)
            .cloned()
            .ok_or_else(|| tool_error(channel_id))
    }

    async fn fetch_stream_metadata(&self, link: &str) -> Result<StreamLookup, SourceError> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        self.videos.get(link).cloned().ok_or_else(|| tool_error(link))
    }

    async fn open_stream(&self, _format: &StreamFormat) -> Result<HttpResponse, reqwest::Error> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        let status = self
            .stream_statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(200);

        let data = self.stream_body.clone();
        let len = data.len() as u64;
        let body: ByteStream = Box::pin(futures::stream::once(async move { Ok(Bytes::from(data)) }));

        Ok(HttpResponse {
            status,
            content_length: Some(len),
            body,
        })
    }
}

/// Audio transform that writes placeholder output of scripted sizes
#[derive(Clone, Default)]
pub struct FakeTranscoder {
    /// Output sizes of successive calls; the last one repeats
    sizes: Arc<Mutex<VecDeque<usize>>>,
    missing_tool: bool,
    pub calls: Arc<AtomicUsize>,
    pub inputs: Arc<Mutex<Vec<PathBuf>>>,
}

impl FakeTranscoder {
    pub fn with_sizes(sizes: &[usize]) -> Self {
        let transcoder = Self::default();
        transcoder.sizes.lock().unwrap().extend(sizes.iter().copied());
        transcoder
    }

    pub fn missing() -> Self {
        Self {
            missing_tool: true,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn extract_audio(&self, input: &Path, output: &Path) -> Result<(), ConvertError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.missing_tool {
            return Err(ConvertError::ToolNotFound(PathBuf::from("ffmpeg")));
        }
        self.inputs.lock().unwrap().push(input.to_path_buf());

        let size = {
            let mut sizes = self.sizes.lock().unwrap();
            if sizes.len() > 1 {
                sizes.pop_front().unwrap_or_default()
            } else {
                sizes.front().copied().unwrap_or(64)
            }
        };

        tokio::fs::write(output, vec![0u8; size])
            .await
            .map_err(|e| ConvertError::SpawnFailed {
                input: input.to_path_buf(),
                source: e,
            })
    }
}
