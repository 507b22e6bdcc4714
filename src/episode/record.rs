// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Canonical, persisted representation of one episode of a channel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    pub title: String,
    /// Publication timestamp exactly as the channel feed reported it.
    /// Acts as the deduplication key.
    pub published: String,
    /// Watch-page locator of the episode
    #[serde(rename = "link")]
    pub source_link: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub guid: String,
    /// Filename stem of the audio artifact, empty until resolved
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub media_id: String,
    #[serde(default, with = "duration_secs")]
    pub duration: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_meta: Option<SourceMeta>,
}

impl EpisodeRecord {
    /// Create an unresolved record from a feed entry
    pub fn new(title: &str, published: &str, source_link: &str) -> Self {
        Self {
            title: title.to_string(),
            published: published.to_string(),
            source_link: source_link.to_string(),
            ..Default::default()
        }
    }

    /// Whether the guid parses as a UUID
    pub fn has_valid_guid(&self) -> bool {
        Uuid::parse_str(&self.guid).is_ok()
    }

    /// Keep the current guid if valid, otherwise assign a fresh one.
    /// Returns true when a new guid was generated.
    pub fn ensure_guid(&mut self) -> bool {
        if self.has_valid_guid() {
            return false;
        }
        self.guid = Uuid::new_v4().to_string();
        true
    }

    /// The chosen stream, if the record has been resolved
    pub fn stream_format(&self) -> Option<&StreamFormat> {
        self.source_meta.as_ref().map(|meta| &meta.format)
    }
}

/// The slice of remote stream metadata worth persisting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMeta {
    pub title: String,
    #[serde(default, with = "duration_secs")]
    pub duration: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The single stream picked for download
    pub format: StreamFormat,
}

/// One downloadable stream offered for an episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamFormat {
    pub format_id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Provider quality rank; lower means a cheaper tier
    #[serde(default)]
    pub quality: f64,
    #[serde(default)]
    pub has_audio: bool,
    #[serde(default)]
    pub has_video: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_length: Option<u64>,
}

impl StreamFormat {
    pub fn is_audio_only(&self) -> bool {
        self.has_audio && !self.has_video
    }
}

/// Serialize a duration as whole seconds
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        // Older record files may carry signed values; only the magnitude matters.
        let secs = i64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs.unsigned_abs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_is_unresolved() {
        let record = EpisodeRecord::new("Title", "2024-01-01T00:00:00+00:00", "https://v/1");

        assert!(record.media_id.is_empty());
        assert!(record.guid.is_empty());
        assert_eq!(record.duration, Duration::ZERO);
        assert!(record.stream_format().is_none());
    }

    #[test]
    fn ensure_guid_keeps_valid_guid() {
        let mut record = EpisodeRecord::new("Title", "p", "l");
        record.guid = "6f1c1c4e-9a5b-4b8e-8d0b-6a7c3f2e9d11".to_string();

        assert!(!record.ensure_guid());
        assert_eq!(record.guid, "6f1c1c4e-9a5b-4b8e-8d0b-6a7c3f2e9d11");
    }

    #[test]
    fn ensure_guid_replaces_garbage() {
        let mut record = EpisodeRecord::new("Title", "p", "l");
        record.guid = "not-a-uuid".to_string();

        assert!(record.ensure_guid());
        assert!(record.has_valid_guid());
    }

    #[test]
    fn negative_durations_load_as_absolute() {
        let yaml = "title: T\npublished: p\nlink: l\nduration: -300\n";
        let record: EpisodeRecord = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(record.duration, Duration::from_secs(300));
    }

    #[test]
    fn yaml_omits_unresolved_fields() {
        let record = EpisodeRecord::new("Title", "p", "l");
        let yaml = serde_yaml::to_string(&record).unwrap();

        assert!(yaml.contains("link: l"));
        assert!(!yaml.contains("media_id"));
        assert!(!yaml.contains("source_meta"));
        assert!(yaml.contains("duration: 0"));
    }
}
