// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod feed;
mod ytdlp;

use std::time::Duration;

use async_trait::async_trait;

use crate::episode::StreamFormat;
use crate::error::SourceError;
use crate::http::HttpResponse;

pub use feed::{CHANNEL_FEED_URL, channel_feed_url, parse_channel_feed};
pub use ytdlp::{DEFAULT_METADATA_TIMEOUT, YtDlpSource, parse_stream_metadata};

/// A channel's recent uploads as listed by its public feed
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelFeed {
    pub display_name: String,
    pub episodes: Vec<RemoteEpisode>,
}

/// One feed entry, before anything is known about its media
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteEpisode {
    pub title: String,
    pub published: String,
    pub link: String,
}

/// Stream metadata of a single video
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub id: String,
    pub title: String,
    /// Always the absolute value reported by the provider
    pub duration: Duration,
    pub description: Option<String>,
    pub formats: Vec<StreamFormat>,
}

/// Outcome of a stream metadata lookup that did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum StreamLookup {
    Ready(StreamInfo),
    /// A scheduled premiere or live event that has not started yet
    NotYetLive,
}

/// Supplier of channel listings, stream metadata and stream bodies
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Fetch the most recent uploads of a channel
    async fn fetch_recent(&self, channel_id: &str) -> Result<ChannelFeed, SourceError>;

    /// Fetch stream metadata for a watch-page link
    async fn fetch_stream_metadata(&self, link: &str) -> Result<StreamLookup, SourceError>;

    /// Open the body of a previously resolved stream
    async fn open_stream(&self, format: &StreamFormat) -> Result<HttpResponse, reqwest::Error>;
}
