pub mod acquire;
pub mod config;
pub mod episode;
pub mod error;
pub mod http;
pub mod progress;
pub mod publish;
pub mod reconcile;
pub mod resolve;
pub mod source;
pub mod state;
pub mod store;
pub mod sync;

#[cfg(test)]
mod test_support;

// Re-export main types for convenience
pub use acquire::{AcquireOptions, FfmpegTranscoder, Transcoder, acquire_media};
pub use config::{ChannelConfig, ChannelList, DEFAULT_CHANNELS_FILE, load_channels};
pub use episode::{EpisodeRecord, SourceMeta, StreamFormat};
pub use error::{
    AcquireError, ConfigError, ConvertError, PublishError, SourceError, StateError, StoreError,
    SyncError,
};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use progress::{NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter};
pub use publish::publish_channel;
pub use reconcile::{merge, reconcile, retain_full_length};
pub use resolve::{Resolution, resolve_media, select_audio_stream};
pub use source::{RemoteSource, YtDlpSource};
pub use store::LocalStore;
pub use sync::{ChannelResult, RunSummary, SyncOptions, run, sync_channel};
