// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while loading the channel list or locating tools
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read channel list {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse channel list {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Channel list {0} does not follow any channels")]
    NoChannels(PathBuf),

    #[error("Required external tool '{tool}' was not found in PATH")]
    ToolNotFound { tool: String },
}

/// Errors raised by the remote source (channel feed and stream metadata)
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to fetch channel feed from {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to parse channel feed: {0}")]
    FeedParseFailed(#[from] atom_syndication::Error),

    #[error("Failed to run {tool} for {link}: {source}")]
    ToolFailed {
        tool: String,
        link: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with {status} for {link}: {stderr}")]
    ToolExited {
        tool: String,
        link: String,
        status: String,
        stderr: String,
    },

    #[error("{tool} did not answer within {timeout:?} for {link}")]
    ToolTimedOut {
        tool: String,
        link: String,
        timeout: Duration,
    },

    #[error("Failed to parse stream metadata for {link}: {source}")]
    MetadataParseFailed {
        link: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("No audio-only stream offered for {link}")]
    NoAudioStream { link: String },
}

/// Errors raised by the external audio transform
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Audio transform tool {0} is not available")]
    ToolNotFound(PathBuf),

    #[error("Failed to start audio transform for {input}: {source}")]
    SpawnFailed {
        input: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Audio transform exited with {status} for {input}: {stderr}")]
    ExitFailed {
        input: PathBuf,
        status: String,
        stderr: String,
    },

    #[error("Audio transform timed out after {timeout:?} for {input}")]
    TimedOut { input: PathBuf, timeout: Duration },
}

/// Errors that can occur while downloading and converting one episode
#[derive(Error, Debug)]
pub enum AcquireError {
    #[error("Episode '{title}' has no resolved stream")]
    Unresolved { title: String },

    #[error("Stream request for '{title}' was rejected with HTTP 403")]
    Forbidden { title: String },

    #[error("HTTP request failed for '{title}': {source}")]
    HttpFailed {
        title: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for '{title}'")]
    HttpStatus { title: String, status: u16 },

    #[error("Stream error while downloading '{title}': {source}")]
    StreamFailed {
        title: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to create file {path}: {source}")]
    FileCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write to file {path}: {source}")]
    FileWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Conversion failed: {0}")]
    Convert(#[from] ConvertError),

    #[error("Converted file {path} is only {size} bytes after {attempts} attempts")]
    CorruptOutput {
        path: PathBuf,
        size: u64,
        attempts: u32,
    },
}

impl AcquireError {
    /// Provider rejections that are worth one more stream request
    pub fn is_transient(&self) -> bool {
        matches!(self, AcquireError::Forbidden { .. })
    }

    /// Errors that make every further acquisition pointless
    pub fn is_fatal(&self) -> bool {
        matches!(self, AcquireError::Convert(ConvertError::ToolNotFound(_)))
    }
}

/// Errors that can occur when reading or writing a channel's record file
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to create store directory {path}: {source}")]
    CreateDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read record file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write record file {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse record YAML in {path}: {source}")]
    YamlParseFailed {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to serialize records: {0}")]
    YamlSerializeFailed(#[from] serde_yaml::Error),
}

/// Errors that can occur when scanning the media directory
#[derive(Error, Debug)]
pub enum StateError {
    #[error("Failed to read directory {path}: {source}")]
    ReadDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory {path}: {source}")]
    CreateDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur while writing a channel feed
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Failed to render feed: {0}")]
    RenderFailed(#[from] rss::Error),

    #[error("Failed to write feed file {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors of a channel pass. All but `Remote` abort the run.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Could not list channel '{channel}': {source}")]
    Remote {
        channel: String,
        #[source]
        source: SourceError,
    },

    #[error("Channel '{channel}' aborted: {source}")]
    Fatal {
        channel: String,
        #[source]
        source: AcquireError,
    },
}
