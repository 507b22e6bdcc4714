// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::episode::ArtifactPaths;
use crate::error::{AcquireError, ConfigError, ConvertError};
use crate::progress::{ProgressEvent, SharedProgressReporter};

use super::AcquireOptions;
use super::download::DownloadContext;

const TOOL_NAME: &str = "ffmpeg";

/// Default audio bitrate of converted episodes
pub const DEFAULT_BITRATE: &str = "48k";

/// Default bound on a single conversion
pub const DEFAULT_TRANSCODE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Extracts the audio track of a downloaded stream
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Write the first audio track of `input` to `output` as MP3
    async fn extract_audio(&self, input: &Path, output: &Path) -> Result<(), ConvertError>;
}

/// Transcoder running the external `ffmpeg` binary
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    binary: PathBuf,
    bitrate: String,
    timeout: Duration,
}

impl FfmpegTranscoder {
    pub fn new(binary: PathBuf, bitrate: &str, timeout: Duration) -> Self {
        Self {
            binary,
            bitrate: bitrate.to_string(),
            timeout,
        }
    }

    /// Locate `ffmpeg` in PATH
    pub fn from_path(bitrate: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let binary = which::which(TOOL_NAME).map_err(|_| ConfigError::ToolNotFound {
            tool: TOOL_NAME.to_string(),
        })?;
        Ok(Self::new(binary, bitrate, timeout))
    }

    fn command(&self, input: &Path, output: &Path) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .args(["-nostdin", "-y", "-loglevel", "error", "-i"])
            .arg(input)
            .args(["-map", "0:a:0", "-b:a", self.bitrate.as_str(), "-f", "mp3"])
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn extract_audio(&self, input: &Path, output: &Path) -> Result<(), ConvertError> {
        let run = self.command(input, output).output();

        let result = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| ConvertError::TimedOut {
                input: input.to_path_buf(),
                timeout: self.timeout,
            })?;

        let output = match result {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConvertError::ToolNotFound(self.binary.clone()));
            }
            Err(e) => {
                return Err(ConvertError::SpawnFailed {
                    input: input.to_path_buf(),
                    source: e,
                });
            }
        };

        if !output.status.success() {
            return Err(ConvertError::ExitFailed {
                input: input.to_path_buf(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}

/// Result of a validated conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionOutcome {
    pub audio_bytes: u64,
    pub attempts: u32,
}

/// Convert the intermediate artifact and check the result's size.
///
/// Output goes to `<id>.mp3.partial` and is only renamed to `<id>.mp3` once
/// it reaches `min_audio_bytes`. An undersized result re-runs the transform
/// on the same input, at most `max_conversion_attempts` times in total.
pub async fn convert_validated<T: Transcoder + ?Sized>(
    transcoder: &T,
    paths: &ArtifactPaths,
    options: &AcquireOptions,
    title: &str,
    context: &DownloadContext,
    reporter: &SharedProgressReporter,
) -> Result<ConversionOutcome, AcquireError> {
    let max_attempts = options.max_conversion_attempts.max(1);
    let mut size = 0;

    for attempt in 1..=max_attempts {
        reporter.report(ProgressEvent::ConversionStarting {
            download_id: context.download_id,
            episode_title: title.to_string(),
            attempt,
        });

        transcoder
            .extract_audio(&paths.intermediate, &paths.audio_partial)
            .await?;

        size = tokio::fs::metadata(&paths.audio_partial)
            .await
            .map(|m| m.len())
            .unwrap_or(0);

        if size >= options.min_audio_bytes {
            tokio::fs::rename(&paths.audio_partial, &paths.audio)
                .await
                .map_err(|e| AcquireError::FileWriteFailed {
                    path: paths.audio.clone(),
                    source: e,
                })?;

            return Ok(ConversionOutcome {
                audio_bytes: size,
                attempts: attempt,
            });
        }

        tracing::warn!(
            episode = %title,
            size,
            attempt,
            "Converted audio seems too small, re-running conversion"
        );
    }

    Err(AcquireError::CorruptOutput {
        path: paths.audio.clone(),
        size,
        attempts: max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::tempdir;

    use crate::progress::NoopReporter;
    use crate::test_support::FakeTranscoder;

    fn context() -> DownloadContext {
        DownloadContext {
            download_id: 0,
            episode_index: 0,
            total_episodes: 1,
        }
    }

    fn options(min_audio_bytes: u64, max_conversion_attempts: u32) -> AcquireOptions {
        AcquireOptions {
            min_audio_bytes,
            max_conversion_attempts,
            keep_intermediate: false,
        }
    }

    #[test]
    fn ffmpeg_command_uses_fixed_bitrate_and_first_audio_track() {
        let transcoder =
            FfmpegTranscoder::new(PathBuf::from("/usr/bin/ffmpeg"), "48k", Duration::from_secs(5));
        let command = transcoder.command(Path::new("/m/a.mp4"), Path::new("/m/a.mp3.partial"));
        let args: Vec<_> = command
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(
            args,
            [
                "-nostdin",
                "-y",
                "-loglevel",
                "error",
                "-i",
                "/m/a.mp4",
                "-map",
                "0:a:0",
                "-b:a",
                "48k",
                "-f",
                "mp3",
                "/m/a.mp3.partial"
            ]
        );
    }

    #[tokio::test]
    async fn missing_binary_is_tool_not_found() {
        let dir = tempdir().unwrap();
        let transcoder = FfmpegTranscoder::new(
            dir.path().join("no-such-ffmpeg"),
            DEFAULT_BITRATE,
            Duration::from_secs(5),
        );

        let result = transcoder
            .extract_audio(&dir.path().join("in.mp4"), &dir.path().join("out.mp3"))
            .await;

        assert!(matches!(result, Err(ConvertError::ToolNotFound(_))));
    }

    #[tokio::test]
    async fn valid_output_is_promoted_to_final_artifact() {
        let dir = tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path(), "abc");
        let transcoder = FakeTranscoder::with_sizes(&[128]);

        let outcome = convert_validated(
            &transcoder,
            &paths,
            &options(100, 3),
            "Episode",
            &context(),
            &NoopReporter::shared(),
        )
        .await
        .unwrap();

        assert_eq!(outcome, ConversionOutcome { audio_bytes: 128, attempts: 1 });
        assert!(paths.audio.exists());
        assert!(!paths.audio_partial.exists());
    }

    #[tokio::test]
    async fn undersized_output_reruns_conversion_on_same_input() {
        let dir = tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path(), "abc");
        let transcoder = FakeTranscoder::with_sizes(&[10, 128]);

        let outcome = convert_validated(
            &transcoder,
            &paths,
            &options(100, 3),
            "Episode",
            &context(),
            &NoopReporter::shared(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.attempts, 2);
        assert_eq!(transcoder.call_count(), 2);
        let inputs = transcoder.inputs.lock().unwrap();
        assert!(inputs.iter().all(|input| *input == paths.intermediate));
    }

    #[tokio::test]
    async fn persistent_undersized_output_is_corrupt() {
        let dir = tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path(), "abc");
        let transcoder = FakeTranscoder::with_sizes(&[10]);

        let result = convert_validated(
            &transcoder,
            &paths,
            &options(100, 3),
            "Episode",
            &context(),
            &NoopReporter::shared(),
        )
        .await;

        match result.unwrap_err() {
            AcquireError::CorruptOutput { size, attempts, .. } => {
                assert_eq!(size, 10);
                assert_eq!(attempts, 3);
            }
            other => panic!("Expected CorruptOutput, got {other:?}"),
        }
        assert_eq!(transcoder.call_count(), 3);
        assert!(!paths.audio.exists());
    }
}
