// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use atom_syndication::{Entry, Feed};

use crate::error::SourceError;

use super::{ChannelFeed, RemoteEpisode};

/// Public Atom feed of a channel's latest uploads (about fifteen entries)
pub const CHANNEL_FEED_URL: &str = "https://www.youtube.com/feeds/videos.xml?channel_id=";

/// Build the feed URL for a channel id
pub fn channel_feed_url(channel_id: &str) -> String {
    format!("{CHANNEL_FEED_URL}{channel_id}")
}

/// Parse a channel's Atom feed into its display name and entries
pub fn parse_channel_feed(xml_bytes: &[u8]) -> Result<ChannelFeed, SourceError> {
    let feed = Feed::read_from(xml_bytes)?;

    let display_name = feed
        .authors()
        .first()
        .map(|author| author.name().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| feed.title().value.clone());

    let episodes = feed.entries().iter().filter_map(parse_entry).collect();

    Ok(ChannelFeed {
        display_name,
        episodes,
    })
}

/// Turn one feed entry into a remote episode.
///
/// `published` is stored in canonical RFC 3339 form (`+00:00`, never `Z`),
/// falling back to `updated` when absent. Stored and fetched keys take the
/// same path, so deduplication compares like with like.
fn parse_entry(entry: &Entry) -> Option<RemoteEpisode> {
    let link = entry
        .links()
        .iter()
        .find(|link| link.rel() == "alternate")
        .or_else(|| entry.links().first())?
        .href()
        .to_string();

    let published = entry
        .published()
        .copied()
        .unwrap_or_else(|| *entry.updated())
        .to_rfc3339();

    Some(RemoteEpisode {
        title: entry.title().value.clone(),
        published,
        link,
    })
}
