// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use crate::episode::{EpisodeRecord, PARTIAL_SUFFIX};
use crate::error::StoreError;

const STORE_EXTENSION: &str = "yaml";

/// Per-channel YAML files holding the reconciled episode records
#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    /// Path of the record file for a channel key
    pub fn path_for(&self, channel_key: &str) -> PathBuf {
        let name = sanitize_filename::sanitize(channel_key);
        self.dir.join(format!("{name}.{STORE_EXTENSION}"))
    }

    /// Read a channel's records. A missing or empty file is an empty set.
    pub fn read(&self, channel_key: &str) -> Result<Vec<EpisodeRecord>, StoreError> {
        let path = self.path_for(channel_key);

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::ReadFailed { path, source: e }),
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_yaml::from_str::<Option<Vec<EpisodeRecord>>>(&content)
            .map(Option::unwrap_or_default)
            .map_err(|e| StoreError::YamlParseFailed { path, source: e })
    }

    /// Replace a channel's records with `records`.
    ///
    /// The YAML is written next to the target and renamed over it, so a
    /// crash never leaves a truncated record file behind.
    pub fn write(&self, channel_key: &str, records: &[EpisodeRecord]) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| StoreError::CreateDirectoryFailed {
            path: self.dir.clone(),
            source: e,
        })?;

        let path = self.path_for(channel_key);
        let partial = PathBuf::from(format!("{}{PARTIAL_SUFFIX}", path.display()));

        let yaml = serde_yaml::to_string(records)?;
        std::fs::write(&partial, yaml).map_err(|e| StoreError::WriteFailed {
            path: partial.clone(),
            source: e,
        })?;
        std::fs::rename(&partial, &path).map_err(|e| StoreError::WriteFailed { path, source: e })
    }
}
