//! Frame and audio source for the analyzer.

use adreel_media::{extract_audio, extract_frames, FrameSampling, MediaResult};
use adreel_models::Segment;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Pulls frames and audio out of a segment file into a work directory.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    async fn frames(&self, segment: &Segment, work_dir: &Path) -> MediaResult<Vec<PathBuf>>;

    async fn audio(&self, segment: &Segment, work_dir: &Path) -> MediaResult<PathBuf>;
}

/// FFmpeg-backed extractor.
#[derive(Debug, Clone)]
pub struct FfmpegExtractor {
    sampling: FrameSampling,
    audio_timeout_secs: u64,
}

impl FfmpegExtractor {
    pub fn new(sampling: FrameSampling, audio_timeout_secs: u64) -> Self {
        Self {
            sampling,
            audio_timeout_secs,
        }
    }
}

#[async_trait]
impl MediaExtractor for FfmpegExtractor {
    async fn frames(&self, segment: &Segment, work_dir: &Path) -> MediaResult<Vec<PathBuf>> {
        extract_frames(&segment.file_path, work_dir.join("frames"), &self.sampling).await
    }

    async fn audio(&self, segment: &Segment, work_dir: &Path) -> MediaResult<PathBuf> {
        extract_audio(
            &segment.file_path,
            work_dir.join("audio.wav"),
            self.audio_timeout_secs,
        )
        .await
    }
}
