//! Frame and audio extraction.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Frame sampling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameSampling {
    /// Frames extracted per second of video
    pub sample_fps: f64,
    /// Hard cap on extracted frames
    pub max_frames: usize,
    /// Width frames are scaled to (height keeps aspect)
    pub scale_width: u32,
    /// FFmpeg timeout in seconds
    pub timeout_secs: u64,
}

impl Default for FrameSampling {
    fn default() -> Self {
        Self {
            sample_fps: 2.0,
            max_frames: 20,
            scale_width: 768,
            timeout_secs: 30,
        }
    }
}

/// Extract frames from a video into `out_dir` as JPEG files.
///
/// Returns the extracted frame paths in timeline order.
pub async fn extract_frames(
    video_path: impl AsRef<Path>,
    out_dir: impl AsRef<Path>,
    sampling: &FrameSampling,
) -> MediaResult<Vec<PathBuf>> {
    let video_path = video_path.as_ref();
    let out_dir = out_dir.as_ref();

    if !video_path.exists() {
        return Err(MediaError::FileNotFound(video_path.to_path_buf()));
    }
    tokio::fs::create_dir_all(out_dir).await?;

    let filter = format!("fps={},scale={}:-2", sampling.sample_fps, sampling.scale_width);
    let cmd = FfmpegCommand::new(video_path, out_dir.join("frame_%03d.jpg"))
        .video_filter(filter)
        .output_args(["-frames:v".to_string(), sampling.max_frames.to_string()])
        .output_args(["-q:v", "3"]);

    FfmpegRunner::new()
        .with_timeout(sampling.timeout_secs)
        .run(&cmd)
        .await?;

    let mut frames = Vec::new();
    let mut entries = tokio::fs::read_dir(out_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_frame = path
            .file_name()
            .map(|n| n.to_string_lossy().starts_with("frame_"))
            .unwrap_or(false);
        if is_frame {
            frames.push(path);
        }
    }
    frames.sort();
    Ok(frames)
}

/// Pick up to `count` items spread evenly over `items`.
pub fn pick_evenly<T: Clone>(items: &[T], count: usize) -> Vec<T> {
    if count == 0 || items.is_empty() {
        return Vec::new();
    }
    if items.len() <= count {
        return items.to_vec();
    }
    let step = items.len() as f64 / count as f64;
    (0..count)
        .map(|i| items[((i as f64 * step) as usize).min(items.len() - 1)].clone())
        .collect()
}

/// Extract the audio track as 16 kHz mono PCM WAV.
pub async fn extract_audio(
    video_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    timeout_secs: u64,
) -> MediaResult<PathBuf> {
    let video_path = video_path.as_ref();
    let output_path = output_path.as_ref();

    if !video_path.exists() {
        return Err(MediaError::FileNotFound(video_path.to_path_buf()));
    }

    let cmd = FfmpegCommand::new(video_path, output_path)
        .output_args(["-vn", "-ac", "1", "-ar", "16000"])
        .audio_codec("pcm_s16le");

    FfmpegRunner::new().with_timeout(timeout_secs).run(&cmd).await?;

    let meta = tokio::fs::metadata(output_path).await?;
    if meta.len() == 0 {
        return Err(MediaError::EmptyFile(output_path.to_path_buf()));
    }
    Ok(output_path.to_path_buf())
}
