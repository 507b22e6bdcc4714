// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;
use std::time::Duration;

use crate::episode::{EpisodeRecord, safe_media_id};
use crate::source::RemoteEpisode;

/// Episodes at or below this length are dropped as short-form clips
pub const SHORTS_MAX_DURATION: Duration = Duration::from_secs(61);

impl From<RemoteEpisode> for EpisodeRecord {
    fn from(remote: RemoteEpisode) -> Self {
        EpisodeRecord::new(&remote.title, &remote.published, &remote.link)
    }
}

/// Merge stored records with freshly fetched feed entries.
///
/// Records are deduplicated by `published`. Local records are considered
/// first, so a stored record always wins over a remote entry with the same
/// key. Every survivor without a valid guid gets a fresh one; a stored
/// record that never received a guid is treated exactly like a new episode.
/// Stored media ids are rewritten to their filesystem-safe form.
pub fn merge(local: Vec<EpisodeRecord>, remote: Vec<RemoteEpisode>) -> Vec<EpisodeRecord> {
    let mut seen = HashSet::new();

    local
        .into_iter()
        .chain(remote.into_iter().map(EpisodeRecord::from))
        .filter(|record| seen.insert(record.published.clone()))
        .map(|mut record| {
            record.media_id = safe_media_id(&record.media_id);
            if record.ensure_guid() {
                tracing::debug!(
                    episode = %record.title,
                    guid = %record.guid,
                    "Assigned guid to episode without a valid one"
                );
            }
            record
        })
        .collect()
}

/// Drop every record whose resolved duration is at most [`SHORTS_MAX_DURATION`].
///
/// Unresolved records carry a zero duration and are dropped as well; they
/// reappear from the channel feed on the next run.
pub fn retain_full_length(records: Vec<EpisodeRecord>) -> Vec<EpisodeRecord> {
    records
        .into_iter()
        .filter(|record| record.duration > SHORTS_MAX_DURATION)
        .collect()
}

/// Merge, deduplicate and filter in one step
pub fn reconcile(local: Vec<EpisodeRecord>, remote: Vec<RemoteEpisode>) -> Vec<EpisodeRecord> {
    retain_full_length(merge(local, remote))
}
