// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::DateTime;
use rss::extension::itunes::{ITunesChannelExtension, ITunesItemExtension};
use rss::{Channel, Enclosure, Guid, Item};

use crate::config::ChannelConfig;
use crate::episode::{EpisodeRecord, PARTIAL_SUFFIX, audio_filename};
use crate::error::PublishError;

const FEED_EXTENSION: &str = "xml";
const AUDIO_MIME_TYPE: &str = "audio/mpeg";
const ITUNES_YES: &str = "yes";

/// A feed file written for one channel
#[derive(Debug, Clone)]
pub struct PublishedFeed {
    pub path: PathBuf,
    pub item_count: usize,
    /// Records left out because they have no audio file or no usable date
    pub skipped: usize,
}

/// Feed filename for a channel: its name without spaces
pub fn feed_filename(channel_name: &str) -> String {
    let compact: String = channel_name.chars().filter(|c| *c != ' ').collect();
    format!("{}.{FEED_EXTENSION}", sanitize_filename::sanitize(compact))
}

/// Format a duration as `HH:MM:SS` for `itunes:duration`
pub fn format_itunes_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

fn join_link(base: &url::Url, file: &str) -> String {
    format!("{}/{file}", base.as_str().trim_end_matches('/'))
}

/// Render a channel's records as an RSS 2.0 podcast feed and write it to
/// `output_dir`.
///
/// Only records whose audio file exists in `output_dir` and whose
/// `published` value is RFC 3339 become items. Enclosure lengths are the
/// audio file sizes.
pub fn publish_channel(
    channel: &ChannelConfig,
    records: &[EpisodeRecord],
    output_dir: &Path,
) -> Result<PublishedFeed, PublishError> {
    let filename = feed_filename(&channel.name);
    let feed_url = join_link(&channel.link, &filename);

    let mut skipped = 0;
    let items: Vec<Item> = records
        .iter()
        .filter_map(|record| {
            let item = build_item(channel, record, output_dir);
            if item.is_none() {
                skipped += 1;
            }
            item
        })
        .collect();

    let description = channel.description.clone().unwrap_or_default();

    let mut itunes = ITunesChannelExtension::default();
    itunes.set_author(channel.name.clone());
    itunes.set_block(ITUNES_YES.to_string());
    itunes.set_complete(ITUNES_YES.to_string());
    itunes.set_new_feed_url(feed_url.clone());
    itunes.set_subtitle(channel.description.clone());
    itunes.set_summary(channel.description.clone());
    itunes.set_image(channel.image.as_ref().map(|u| u.to_string()));

    let mut rss_channel = Channel::default();
    rss_channel.set_title(channel.name.clone());
    rss_channel.set_link(feed_url);
    rss_channel.set_description(description);
    rss_channel.set_language(channel.language.clone());
    rss_channel.set_itunes_ext(itunes);
    let item_count = items.len();
    rss_channel.set_items(items);

    let xml = rss_channel.write_to(Vec::new())?;

    let path = output_dir.join(&filename);
    let partial = output_dir.join(format!("{filename}{PARTIAL_SUFFIX}"));
    std::fs::write(&partial, xml).map_err(|e| PublishError::WriteFailed {
        path: partial.clone(),
        source: e,
    })?;
    std::fs::rename(&partial, &path).map_err(|e| PublishError::WriteFailed {
        path: path.clone(),
        source: e,
    })?;

    Ok(PublishedFeed {
        path,
        item_count,
        skipped,
    })
}

fn build_item(channel: &ChannelConfig, record: &EpisodeRecord, output_dir: &Path) -> Option<Item> {
    if record.media_id.is_empty() {
        tracing::debug!(episode = %record.title, "No media yet, leaving out of feed");
        return None;
    }

    let published = match DateTime::parse_from_rfc3339(&record.published) {
        Ok(published) => published,
        Err(e) => {
            tracing::warn!(
                episode = %record.title,
                published = %record.published,
                error = %e,
                "Unparseable publish date, leaving out of feed"
            );
            return None;
        }
    };

    let filename = audio_filename(&record.media_id);
    let length = match std::fs::metadata(output_dir.join(&filename)) {
        Ok(metadata) if metadata.is_file() => metadata.len(),
        _ => {
            tracing::debug!(
                episode = %record.title,
                file = %filename,
                "No audio on disk, leaving out of feed"
            );
            return None;
        }
    };

    let mut enclosure = Enclosure::default();
    enclosure.set_url(join_link(&channel.link, &filename));
    enclosure.set_length(length.to_string());
    enclosure.set_mime_type(AUDIO_MIME_TYPE);

    let mut guid = Guid::default();
    guid.set_value(record.guid.clone());
    guid.set_permalink(false);

    let mut itunes = ITunesItemExtension::default();
    itunes.set_author(channel.name.clone());
    itunes.set_duration(format_itunes_duration(record.duration));

    let mut item = Item::default();
    item.set_title(record.title.clone());
    item.set_description(
        record
            .source_meta
            .as_ref()
            .and_then(|meta| meta.description.clone()),
    );
    item.set_guid(guid);
    item.set_pub_date(published.to_rfc2822());
    item.set_enclosure(enclosure);
    item.set_itunes_ext(itunes);

    Some(item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use url::Url;

    use crate::episode::SourceMeta;
    use crate::test_support::audio_format;

    fn channel() -> ChannelConfig {
        ChannelConfig {
            name: "Some Channel".to_string(),
            channel_id: "UC1".to_string(),
            link: Url::parse("https://pods.example.com/some/").unwrap(),
            language: Some("en".to_string()),
            description: Some("Talks about things".to_string()),
            image: None,
        }
    }

    fn record(media_id: &str, published: &str) -> EpisodeRecord {
        EpisodeRecord {
            title: format!("Episode {media_id}"),
            published: published.to_string(),
            source_link: format!("https://www.youtube.com/watch?v={media_id}"),
            guid: "6f1c1c4e-9a5b-4b8e-8d0b-6a7c3f2e9d11".to_string(),
            media_id: media_id.to_string(),
            duration: Duration::from_secs(3725),
            source_meta: Some(SourceMeta {
                title: format!("Episode {media_id}"),
                duration: Duration::from_secs(3725),
                description: Some("Show notes & links".to_string()),
                format: audio_format("139", 2.0, Some(5_000_000)),
            }),
        }
    }

    #[test]
    fn feed_filename_strips_spaces() {
        assert_eq!(feed_filename("Some Channel Name"), "SomeChannelName.xml");
        assert_eq!(feed_filename("Plain"), "Plain.xml");
    }

    #[test]
    fn itunes_duration_is_zero_padded() {
        assert_eq!(format_itunes_duration(Duration::from_secs(0)), "00:00:00");
        assert_eq!(format_itunes_duration(Duration::from_secs(62)), "00:01:02");
        assert_eq!(format_itunes_duration(Duration::from_secs(3725)), "01:02:05");
    }

    #[test]
    fn publish_writes_parseable_feed() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("abc.mp3"), vec![0u8; 1234]).unwrap();

        let published =
            publish_channel(&channel(), &[record("abc", "2024-03-01T10:00:00+00:00")], dir.path())
                .unwrap();

        assert_eq!(published.path, dir.path().join("SomeChannel.xml"));
        assert_eq!(published.item_count, 1);
        assert!(!dir.path().join("SomeChannel.xml.partial").exists());

        let bytes = std::fs::read(&published.path).unwrap();
        let parsed = Channel::read_from(&bytes[..]).unwrap();

        assert_eq!(parsed.title(), "Some Channel");
        assert_eq!(parsed.link(), "https://pods.example.com/some/SomeChannel.xml");
        assert_eq!(parsed.language(), Some("en"));

        let itunes = parsed.itunes_ext().unwrap();
        assert_eq!(itunes.author(), Some("Some Channel"));
        assert_eq!(itunes.block(), Some("yes"));
        assert_eq!(itunes.complete(), Some("yes"));
        assert_eq!(
            itunes.new_feed_url(),
            Some("https://pods.example.com/some/SomeChannel.xml")
        );
        assert_eq!(itunes.summary(), Some("Talks about things"));

        let item = &parsed.items()[0];
        assert_eq!(item.title(), Some("Episode abc"));
        assert_eq!(item.description(), Some("Show notes & links"));
        let pub_date = DateTime::parse_from_rfc2822(item.pub_date().unwrap()).unwrap();
        assert_eq!(
            pub_date,
            DateTime::parse_from_rfc3339("2024-03-01T10:00:00+00:00").unwrap()
        );

        let guid = item.guid().unwrap();
        assert_eq!(guid.value(), "6f1c1c4e-9a5b-4b8e-8d0b-6a7c3f2e9d11");
        assert!(!guid.is_permalink());

        let enclosure = item.enclosure().unwrap();
        assert_eq!(enclosure.url(), "https://pods.example.com/some/abc.mp3");
        assert_eq!(enclosure.length(), "1234");
        assert_eq!(enclosure.mime_type(), "audio/mpeg");

        assert_eq!(item.itunes_ext().unwrap().duration(), Some("01:02:05"));
    }

    #[test]
    fn record_without_audio_file_is_skipped() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("here.mp3"), vec![0u8; 10]).unwrap();
        // Resolved but never converted
        std::fs::write(dir.path().join("gone.mp4"), b"video").unwrap();

        let records = vec![
            record("gone", "2024-03-02T10:00:00Z"),
            record("here", "2024-03-01T10:00:00Z"),
        ];
        let published = publish_channel(&channel(), &records, dir.path()).unwrap();

        assert_eq!(published.item_count, 1);
        assert_eq!(published.skipped, 1);
        let parsed = Channel::read_from(&std::fs::read(&published.path).unwrap()[..]).unwrap();
        assert_eq!(
            parsed.items()[0].enclosure().unwrap().url(),
            "https://pods.example.com/some/here.mp3"
        );
    }

    #[test]
    fn unresolved_and_undated_records_are_skipped() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("abc.mp3"), b"audio").unwrap();
        std::fs::write(dir.path().join("def.mp3"), b"audio").unwrap();
        let records = vec![
            record("", "2024-03-01T10:00:00Z"),
            record("abc", "last tuesday"),
            record("def", "2024-03-02T10:00:00Z"),
        ];

        let published = publish_channel(&channel(), &records, dir.path()).unwrap();

        assert_eq!(published.item_count, 1);
        assert_eq!(published.skipped, 2);
        let parsed = Channel::read_from(&std::fs::read(&published.path).unwrap()[..]).unwrap();
        assert_eq!(parsed.items()[0].title(), Some("Episode def"));
    }
}
