// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;

use serde::Deserialize;
use url::Url;

use crate::error::ConfigError;

/// Default name of the channel list file
pub const DEFAULT_CHANNELS_FILE: &str = "podcasts.yaml";

/// The followed channels, as listed in `podcasts.yaml`
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelList {
    #[serde(rename = "ytchannels", default)]
    pub channels: Vec<ChannelConfig>,
}

/// One followed channel and the podcast it is republished as
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    pub name: String,
    #[serde(rename = "channelid")]
    pub channel_id: String,
    /// Base URL the audio files are served from
    pub link: Url,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<Url>,
}

impl ChannelConfig {
    /// Key of this channel's record file in the local store
    pub fn store_key(&self) -> String {
        sanitize_filename::sanitize(&self.name)
    }
}

/// Load and validate the channel list
pub fn load_channels(path: &Path) -> Result<ChannelList, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    let list: ChannelList =
        serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    if list.channels.is_empty() {
        return Err(ConfigError::NoChannels(path.to_path_buf()));
    }

    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"
ytchannels:
  - name: Some Channel
    channelid: UCabcdefghijklmnopqrstuv
    link: https://pods.example.com/some
    language: en
    description: Talks about things
  - name: Other
    channelid: UC0000000000000000000000
    link: https://pods.example.com/other
"#;

    #[test]
    fn load_channels_parses_all_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("podcasts.yaml");
        std::fs::write(&path, SAMPLE).unwrap();

        let list = load_channels(&path).unwrap();

        assert_eq!(list.channels.len(), 2);
        let first = &list.channels[0];
        assert_eq!(first.name, "Some Channel");
        assert_eq!(first.channel_id, "UCabcdefghijklmnopqrstuv");
        assert_eq!(first.link.as_str(), "https://pods.example.com/some");
        assert_eq!(first.language.as_deref(), Some("en"));
        assert_eq!(first.description.as_deref(), Some("Talks about things"));
        assert!(first.image.is_none());

        let second = &list.channels[1];
        assert!(second.language.is_none());
        assert!(second.description.is_none());
    }

    #[test]
    fn missing_file_is_read_error() {
        let dir = tempdir().unwrap();
        let result = load_channels(&dir.path().join("absent.yaml"));
        assert!(matches!(result, Err(ConfigError::ReadFailed { .. })));
    }

    #[test]
    fn invalid_link_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("podcasts.yaml");
        std::fs::write(
            &path,
            "ytchannels:\n  - name: X\n    channelid: UC1\n    link: not a url\n",
        )
        .unwrap();

        assert!(matches!(
            load_channels(&path),
            Err(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn empty_list_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("podcasts.yaml");
        std::fs::write(&path, "ytchannels: []\n").unwrap();

        assert!(matches!(load_channels(&path), Err(ConfigError::NoChannels(_))));
    }

    #[test]
    fn store_key_strips_path_separators() {
        let channel = ChannelConfig {
            name: "News/Weekly".to_string(),
            channel_id: "UC1".to_string(),
            link: Url::parse("https://example.com").unwrap(),
            language: None,
            description: None,
            image: None,
        };

        assert_eq!(channel.store_key(), "NewsWeekly");
    }
}
