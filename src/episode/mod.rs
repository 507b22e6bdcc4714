mod filename;
mod record;

pub use filename::{
    ArtifactPaths, AUDIO_EXTENSION, INTERMEDIATE_EXTENSION, PARTIAL_SUFFIX, audio_filename,
    is_shorts_title, safe_media_id,
};
pub use record::{EpisodeRecord, SourceMeta, StreamFormat};
