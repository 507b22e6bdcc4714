// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::Instrument;

use crate::acquire::{AcquireOptions, Acquired, DownloadContext, Transcoder, acquire_media};
use crate::config::ChannelConfig;
use crate::episode::EpisodeRecord;
use crate::error::{AcquireError, SyncError};
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::publish::publish_channel;
use crate::reconcile::{SHORTS_MAX_DURATION, merge, retain_full_length};
use crate::resolve::{Resolution, resolve_media};
use crate::source::RemoteSource;
use crate::state::scan_media_dir;
use crate::store::LocalStore;

/// Options for a run
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Maximum number of episodes processed at once within a channel
    pub max_concurrent: usize,
    /// Write the podcast feed after each channel
    pub publish: bool,
    pub acquire: AcquireOptions,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            publish: true,
            acquire: AcquireOptions::default(),
        }
    }
}

/// Result of one channel pass
#[derive(Debug, Clone, Default)]
pub struct ChannelResult {
    pub channel: String,
    /// Number of episodes downloaded and converted this run
    pub acquired: usize,
    /// Number of episodes whose audio was already on disk
    pub present: usize,
    /// Number of scheduled broadcasts left for a later run
    pub deferred: usize,
    /// Number of episodes that failed this run
    pub failed: usize,
    /// Details of failed episodes (title, error message)
    pub failed_episodes: Vec<(String, String)>,
    /// Number of records persisted for the channel
    pub stored: usize,
    /// Feed file written for the channel, if publishing is enabled
    pub feed_path: Option<PathBuf>,
}

/// Result of a run over every configured channel
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub channels: Vec<ChannelResult>,
    /// Channels skipped because their listing could not be fetched (name, error)
    pub failed_channels: Vec<(String, String)>,
}

impl RunSummary {
    pub fn acquired(&self) -> usize {
        self.channels.iter().map(|c| c.acquired).sum()
    }

    pub fn failed(&self) -> usize {
        self.channels.iter().map(|c| c.failed).sum::<usize>() + self.failed_channels.len()
    }
}

/// What happened to one record during a channel pass
#[derive(Debug)]
enum EpisodeOutcome {
    Acquired,
    Present,
    Deferred,
    /// Short-form clip, left to the duration filter
    Skipped,
    /// Resolved but not acquired because the run is aborting
    Halted,
    Failed(String),
    Fatal(AcquireError),
}

/// Process every configured channel in order.
///
/// A channel whose listing cannot be fetched is skipped. Store, state and
/// fatal acquisition errors abort the run.
pub async fn run<S, T>(
    source: &S,
    transcoder: &T,
    channels: &[ChannelConfig],
    store: &LocalStore,
    media_dir: &Path,
    options: &SyncOptions,
    reporter: SharedProgressReporter,
) -> Result<RunSummary, SyncError>
where
    S: RemoteSource + Clone + 'static,
    T: Transcoder + Clone + 'static,
{
    let mut summary = RunSummary::default();

    for channel in channels {
        match sync_channel(
            source,
            transcoder,
            store,
            channel,
            media_dir,
            options,
            reporter.clone(),
        )
        .await
        {
            Ok(result) => summary.channels.push(result),
            Err(SyncError::Remote { channel, source }) => {
                tracing::warn!(channel = %channel, error = %source, "Skipping channel");
                summary.failed_channels.push((channel, source.to_string()));
            }
            Err(e) => return Err(e),
        }
    }

    Ok(summary)
}

/// Bring one channel up to date.
///
/// This:
/// 1. Fetches the channel's recent uploads
/// 2. Merges them with the stored records
/// 3. Resolves and acquires every record in parallel
/// 4. Persists the records that pass the duration filter
/// 5. Publishes the channel feed
pub async fn sync_channel<S, T>(
    source: &S,
    transcoder: &T,
    store: &LocalStore,
    channel: &ChannelConfig,
    media_dir: &Path,
    options: &SyncOptions,
    reporter: SharedProgressReporter,
) -> Result<ChannelResult, SyncError>
where
    S: RemoteSource + Clone + 'static,
    T: Transcoder + Clone + 'static,
{
    reporter.report(ProgressEvent::FetchingChannel {
        channel: channel.name.clone(),
    });

    let feed = source
        .fetch_recent(&channel.channel_id)
        .await
        .map_err(|e| SyncError::Remote {
            channel: channel.name.clone(),
            source: e,
        })?;

    let store_key = channel.store_key();
    let local = store.read(&store_key)?;

    let state = scan_media_dir(media_dir)?;
    let cleaned = state.partial_files_cleaned + state.stale_intermediates_cleaned;
    if cleaned > 0 {
        reporter.report(ProgressEvent::PartialFilesCleanedUp { count: cleaned });
    }

    let stored_episodes = local.len();
    let remote_episodes = feed.episodes.len();
    let merged = merge(local, feed.episodes);

    tracing::info!(
        channel = %channel.name,
        remote_name = %feed.display_name,
        stored_episodes,
        remote_episodes,
        merged_episodes = merged.len(),
        "Reconciled channel"
    );
    reporter.report(ProgressEvent::ChannelReconciled {
        channel: channel.name.clone(),
        stored_episodes,
        remote_episodes,
        merged_episodes: merged.len(),
    });

    let (records, outcomes) =
        process_records(source, transcoder, &channel.name, merged, media_dir, options, &reporter)
            .await;

    let mut result = ChannelResult {
        channel: channel.name.clone(),
        ..Default::default()
    };
    let mut fatal = None;

    for (record, outcome) in records.iter().zip(outcomes) {
        match outcome {
            EpisodeOutcome::Acquired => result.acquired += 1,
            EpisodeOutcome::Present => result.present += 1,
            EpisodeOutcome::Deferred => result.deferred += 1,
            EpisodeOutcome::Skipped | EpisodeOutcome::Halted => {}
            EpisodeOutcome::Failed(error) => {
                result.failed += 1;
                result.failed_episodes.push((record.title.clone(), error));
            }
            EpisodeOutcome::Fatal(error) => {
                result.failed += 1;
                result
                    .failed_episodes
                    .push((record.title.clone(), error.to_string()));
                if fatal.is_none() {
                    fatal = Some(error);
                }
            }
        }
    }

    let records = retain_full_length(records);
    store.write(&store_key, &records)?;
    result.stored = records.len();

    if let Some(error) = fatal {
        return Err(SyncError::Fatal {
            channel: channel.name.clone(),
            source: error,
        });
    }

    if options.publish {
        match publish_channel(channel, &records, media_dir) {
            Ok(published) => {
                reporter.report(ProgressEvent::FeedPublished {
                    channel: channel.name.clone(),
                    path: published.path.display().to_string(),
                    item_count: published.item_count,
                });
                result.feed_path = Some(published.path);
            }
            Err(e) => {
                tracing::warn!(channel = %channel.name, stage = "publish", error = %e, "Could not publish feed");
            }
        }
    }

    reporter.report(ProgressEvent::ChannelCompleted {
        channel: channel.name.clone(),
        acquired_count: result.acquired,
        present_count: result.present,
        deferred_count: result.deferred,
        failed_count: result.failed,
    });

    Ok(result)
}

/// Resolve and acquire every record on a bounded pool of tasks.
///
/// Records come back in their original order, each paired with its outcome.
/// Every task runs inside a `channel` span.
async fn process_records<S, T>(
    source: &S,
    transcoder: &T,
    channel_name: &str,
    records: Vec<EpisodeRecord>,
    media_dir: &Path,
    options: &SyncOptions,
    reporter: &SharedProgressReporter,
) -> (Vec<EpisodeRecord>, Vec<EpisodeOutcome>)
where
    S: RemoteSource + Clone + 'static,
    T: Transcoder + Clone + 'static,
{
    let total_episodes = records.len();
    let max_concurrent = options.max_concurrent.max(1);

    // The slot pool limits concurrency and hands out stable slot IDs
    let (slot_tx, mut slot_rx) = tokio::sync::mpsc::channel(max_concurrent);
    for slot in 0..max_concurrent {
        let _ = slot_tx.try_send(slot);
    }

    let halted = Arc::new(AtomicBool::new(false));
    let media_dir = media_dir.to_path_buf();
    let span = tracing::info_span!("channel", channel = %channel_name);
    let mut handles = Vec::with_capacity(total_episodes);

    for (episode_index, record) in records.into_iter().enumerate() {
        // The pool holds a sender of its own, so a slot always comes back
        let download_id = slot_rx.recv().await.unwrap_or_default();

        let original = record.clone();
        let slot_tx = slot_tx.clone();
        let source = source.clone();
        let transcoder = transcoder.clone();
        let media_dir = media_dir.clone();
        let acquire_options = options.acquire.clone();
        let reporter = reporter.clone();
        let halted = halted.clone();

        let task = async move {
            let context = DownloadContext {
                download_id,
                episode_index,
                total_episodes,
            };

            let result = process_record(
                &source,
                &transcoder,
                record,
                &media_dir,
                &acquire_options,
                &context,
                &reporter,
                &halted,
            )
            .await;

            // Return slot to the pool when done
            let _ = slot_tx.send(download_id).await;

            result
        };

        let handle = tokio::spawn(task.instrument(span.clone()));

        handles.push((original, handle));
    }

    let mut records = Vec::with_capacity(total_episodes);
    let mut outcomes = Vec::with_capacity(total_episodes);

    for (original, handle) in handles {
        match handle.await {
            Ok((record, outcome)) => {
                records.push(record);
                outcomes.push(outcome);
            }
            Err(e) => {
                tracing::error!(
                    channel = %channel_name,
                    episode = %original.title,
                    error = %e,
                    "Episode task failed"
                );
                outcomes.push(EpisodeOutcome::Failed(e.to_string()));
                records.push(original);
            }
        }
    }

    (records, outcomes)
}

#[allow(clippy::too_many_arguments)]
async fn process_record<S, T>(
    source: &S,
    transcoder: &T,
    mut record: EpisodeRecord,
    media_dir: &Path,
    options: &AcquireOptions,
    context: &DownloadContext,
    reporter: &SharedProgressReporter,
    halted: &AtomicBool,
) -> (EpisodeRecord, EpisodeOutcome)
where
    S: RemoteSource + ?Sized,
    T: Transcoder + ?Sized,
{
    let fail = |record: EpisodeRecord, stage: &str, error: String| {
        tracing::warn!(episode = %record.title, stage, error = %error, "Episode failed");
        reporter.report(ProgressEvent::EpisodeFailed {
            download_id: context.download_id,
            episode_title: record.title.clone(),
            error: error.clone(),
        });
        (record, EpisodeOutcome::Failed(error))
    };

    match resolve_media(source, &mut record, media_dir).await {
        Ok(Resolution::ShortsSkipped) => return (record, EpisodeOutcome::Skipped),
        Ok(Resolution::NotYetLive) => {
            reporter.report(ProgressEvent::EpisodeDeferred {
                episode_title: record.title.clone(),
            });
            return (record, EpisodeOutcome::Deferred);
        }
        Ok(Resolution::Resolved | Resolution::AlreadyPresent) => {}
        Err(e) => return fail(record, "resolve", e.to_string()),
    }

    if record.duration <= SHORTS_MAX_DURATION {
        tracing::debug!(episode = %record.title, duration = ?record.duration, "Too short, not acquiring");
        return (record, EpisodeOutcome::Skipped);
    }

    // Checked after resolution so halted records keep their media fields
    if halted.load(Ordering::SeqCst) {
        return (record, EpisodeOutcome::Halted);
    }

    match acquire_media(source, transcoder, &record, media_dir, options, context, reporter).await {
        Ok(Acquired::AlreadyPresent) => (record, EpisodeOutcome::Present),
        Ok(Acquired::Completed { audio_bytes, .. }) => {
            reporter.report(ProgressEvent::EpisodeCompleted {
                download_id: context.download_id,
                episode_title: record.title.clone(),
                audio_bytes,
            });
            (record, EpisodeOutcome::Acquired)
        }
        Err(e) if e.is_fatal() => {
            halted.store(true, Ordering::SeqCst);
            tracing::error!(episode = %record.title, stage = "acquire", error = %e, "Aborting run");
            reporter.report(ProgressEvent::EpisodeFailed {
                download_id: context.download_id,
                episode_title: record.title.clone(),
                error: e.to_string(),
            });
            (record, EpisodeOutcome::Fatal(e))
        }
        Err(e) => fail(record, "acquire", e.to_string()),
    }
}
