// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;

/// Events emitted while processing channels, for progress reporting
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// A channel's recent uploads are being fetched
    FetchingChannel { channel: String },

    /// Local and remote records have been merged
    ChannelReconciled {
        channel: String,
        stored_episodes: usize,
        remote_episodes: usize,
        merged_episodes: usize,
    },

    /// Stale files were removed from the media directory
    PartialFilesCleanedUp { count: usize },

    /// An episode is a scheduled broadcast and will be retried later
    EpisodeDeferred { episode_title: String },

    /// A stream download is starting
    DownloadStarting {
        /// Identifies the worker slot (0 to max_concurrent-1)
        download_id: usize,
        episode_title: String,
        /// Index of this episode within the channel
        episode_index: usize,
        /// Number of episodes in the channel pass
        total_episodes: usize,
        /// Expected content length in bytes, if known
        content_length: Option<u64>,
    },

    /// Download progress update
    DownloadProgress {
        /// Identifies the worker slot
        download_id: usize,
        episode_title: String,
        bytes_downloaded: u64,
        total_bytes: Option<u64>,
    },

    /// The provider rejected the stream request; one retry follows
    DownloadRetrying {
        download_id: usize,
        episode_title: String,
    },

    /// Audio extraction is starting
    ConversionStarting {
        download_id: usize,
        episode_title: String,
        /// 1-based attempt number
        attempt: u32,
    },

    /// An episode's audio artifact is complete
    EpisodeCompleted {
        download_id: usize,
        episode_title: String,
        audio_bytes: u64,
    },

    /// Resolving or acquiring an episode failed for this run
    EpisodeFailed {
        download_id: usize,
        episode_title: String,
        error: String,
    },

    /// A channel feed file was written
    FeedPublished {
        channel: String,
        path: String,
        item_count: usize,
    },

    /// A channel pass finished
    ChannelCompleted {
        channel: String,
        acquired_count: usize,
        present_count: usize,
        deferred_count: usize,
        failed_count: usize,
    },
}

/// Trait for reporting progress events during a run.
///
/// Implementations can use this to display progress bars, log messages,
/// or collect statistics.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event
    fn report(&self, event: ProgressEvent);
}

/// A shared reference to a progress reporter
pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// A no-op progress reporter that silently ignores all events.
/// Useful for tests or quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {
        // Intentionally empty
    }
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CollectingReporter {
        events: Mutex<Vec<ProgressEvent>>,
    }

    impl ProgressReporter for CollectingReporter {
        fn report(&self, event: ProgressEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[test]
    fn noop_reporter_handles_events() {
        let reporter = NoopReporter;

        reporter.report(ProgressEvent::FetchingChannel {
            channel: "Test".to_string(),
        });
        reporter.report(ProgressEvent::ConversionStarting {
            download_id: 0,
            episode_title: "Episode 1".to_string(),
            attempt: 1,
        });
        reporter.report(ProgressEvent::ChannelCompleted {
            channel: "Test".to_string(),
            acquired_count: 1,
            present_count: 2,
            deferred_count: 0,
            failed_count: 1,
        });
    }

    #[test]
    fn shared_reporter_is_usable_through_trait_object() {
        let collector = Arc::new(CollectingReporter::default());
        let shared: SharedProgressReporter = collector.clone();

        shared.report(ProgressEvent::PartialFilesCleanedUp { count: 2 });
        shared.report(ProgressEvent::EpisodeDeferred {
            episode_title: "Premiere".to_string(),
        });

        assert_eq!(collector.events.lock().unwrap().len(), 2);
    }
}
