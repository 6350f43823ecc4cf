//! Replace the assembled video's audio with a reference track.

use adreel_models::{AudioSyncMode, BenchmarkAudioOutcome, EncodingConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{ensure_nonempty_file, move_file};
use crate::probe::{probe_duration, DEFAULT_PROBE_TIMEOUT_SECS};

/// Benchmark-audio settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkAudioConfig {
    /// Durations within this many seconds are substituted directly
    pub sync_tolerance_secs: f64,
    /// Frame rate used when the video has to be looped
    pub fps: u32,
    pub audio_bitrate: String,
    pub timeout_secs: u64,
    pub probe_timeout_secs: u64,
}

impl Default for BenchmarkAudioConfig {
    fn default() -> Self {
        Self {
            sync_tolerance_secs: 1.0,
            fps: adreel_models::encoding::DEFAULT_OUTPUT_FPS,
            audio_bitrate: "128k".to_string(),
            timeout_secs: 300,
            probe_timeout_secs: DEFAULT_PROBE_TIMEOUT_SECS,
        }
    }
}

impl BenchmarkAudioConfig {
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }
}

/// How to align a video of `video_secs` to audio of `audio_secs`.
pub fn choose_sync_mode(video_secs: f64, audio_secs: f64, tolerance: f64) -> AudioSyncMode {
    if (video_secs - audio_secs).abs() <= tolerance {
        AudioSyncMode::Direct
    } else if video_secs < audio_secs {
        AudioSyncMode::LoopVideo
    } else {
        AudioSyncMode::TruncateVideo
    }
}

/// Build the mux command for a sync mode.
pub fn build_benchmark_audio_command(
    video: &Path,
    audio: &Path,
    output: &Path,
    mode: AudioSyncMode,
    audio_secs: f64,
    config: &BenchmarkAudioConfig,
) -> FfmpegCommand {
    let mut cmd = FfmpegCommand::new(video, output);
    if mode == AudioSyncMode::LoopVideo {
        cmd = cmd.input_args(["-stream_loop", "-1"]);
    }
    cmd = cmd.add_input(audio).map("0:v:0").map("1:a:0");

    cmd = match mode {
        AudioSyncMode::LoopVideo => cmd
            .output_args(EncodingConfig::for_loop_fill().video_args())
            .output_args(["-fps_mode".to_string(), "cfr".to_string(), "-r".to_string(), config.fps.to_string()]),
        _ => cmd.video_codec("copy"),
    };

    cmd = cmd.audio_codec("aac").audio_bitrate(config.audio_bitrate.clone());

    cmd = match mode {
        AudioSyncMode::Direct => cmd.output_arg("-shortest"),
        _ => cmd.duration(audio_secs),
    };

    cmd.faststart()
}

/// Mux `audio` under `video` into `output`.
///
/// The output is probed afterwards; a drift beyond the tolerance is logged
/// and flagged in the outcome but is not an error.
pub async fn apply_benchmark_audio(
    video: &Path,
    audio: &Path,
    output: &Path,
    config: &BenchmarkAudioConfig,
) -> MediaResult<BenchmarkAudioOutcome> {
    ensure_nonempty_file(video).await?;
    ensure_nonempty_file(audio).await?;

    let video_duration = probe_duration(video, config.probe_timeout_secs).await?;
    let audio_duration = probe_duration(audio, config.probe_timeout_secs).await?;
    if audio_duration <= 0.0 {
        return Err(MediaError::InvalidVideo(format!(
            "reference audio {} has no duration",
            audio.display()
        )));
    }

    let mode = choose_sync_mode(video_duration, audio_duration, config.sync_tolerance_secs);
    info!(
        video_duration,
        audio_duration,
        mode = ?mode,
        "Applying benchmark audio"
    );

    let work_dir = tempfile::Builder::new().prefix("adreel-audio-").tempdir()?;
    let staged = work_dir.path().join("with_audio.mp4");
    let cmd = build_benchmark_audio_command(video, audio, &staged, mode, audio_duration, config);
    FfmpegRunner::new().with_timeout(config.timeout_secs).run(&cmd).await?;
    ensure_nonempty_file(&staged).await?;
    move_file(&staged, output).await?;

    let output_duration = match probe_duration(output, config.probe_timeout_secs).await {
        Ok(d) => Some(d),
        Err(e) => {
            warn!(error = %e, "Could not probe benchmark-audio output");
            None
        }
    };
    let drift_warning = output_duration
        .map(|d| (d - audio_duration).abs() > config.sync_tolerance_secs)
        .unwrap_or(false);
    if drift_warning {
        warn!(
            output_duration = output_duration.unwrap_or_default(),
            audio_duration,
            "Output duration drifted from reference audio"
        );
    }

    Ok(BenchmarkAudioOutcome {
        audio_path: audio.to_path_buf(),
        mode,
        video_duration,
        audio_duration,
        output_duration,
        drift_warning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choose_sync_mode() {
        assert_eq!(choose_sync_mode(30.0, 30.8, 1.0), AudioSyncMode::Direct);
        assert_eq!(choose_sync_mode(20.0, 30.0, 1.0), AudioSyncMode::LoopVideo);
        assert_eq!(choose_sync_mode(40.0, 30.0, 1.0), AudioSyncMode::TruncateVideo);
    }

    fn args_for(mode: AudioSyncMode) -> Vec<String> {
        build_benchmark_audio_command(
            Path::new("video.mp4"),
            Path::new("ref.m4a"),
            Path::new("out.mp4"),
            mode,
            30.0,
            &BenchmarkAudioConfig::default(),
        )
        .build_args()
    }

    #[test]
    fn test_direct_substitution_copies_video() {
        let args = args_for(AudioSyncMode::Direct);
        assert!(args.contains(&"-shortest".to_string()));
        assert!(args.contains(&"copy".to_string()));
        assert!(args.contains(&"1:a:0".to_string()));
        assert!(!args.contains(&"-stream_loop".to_string()));
    }

    #[test]
    fn test_loop_mode_reencodes_and_cuts() {
        let args = args_for(AudioSyncMode::LoopVideo);
        let loop_pos = args.iter().position(|a| a == "-stream_loop").unwrap();
        let video_pos = args.iter().position(|a| a == "video.mp4").unwrap();
        assert!(loop_pos < video_pos);
        assert!(args.contains(&"23".to_string()));
        assert!(args.contains(&"cfr".to_string()));
        assert!(args.contains(&"30.000".to_string()));
    }

    #[test]
    fn test_truncate_mode_copies_and_cuts() {
        let args = args_for(AudioSyncMode::TruncateVideo);
        assert!(args.contains(&"copy".to_string()));
        assert!(args.contains(&"-t".to_string()));
        assert!(args.contains(&"+faststart".to_string()));
    }

    #[tokio::test]
    async fn test_missing_audio_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("v.mp4");
        tokio::fs::write(&video, b"x").await.unwrap();
        let err = apply_benchmark_audio(
            &video,
            &dir.path().join("missing.m4a"),
            &dir.path().join("out.mp4"),
            &BenchmarkAudioConfig::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
