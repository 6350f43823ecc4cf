//! Per-segment re-encoding ahead of concatenation.
//!
//! Re-encoding never fails the composition: a segment that is skipped,
//! times out or errors keeps its original file.

use adreel_models::{EncodingConfig, PreparedAction, StandardizationOutcome, TechnicalParams};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::compat::ReencodeTarget;

/// Limits and timeouts for standardization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardizeConfig {
    /// Segments longer than this keep their original file (seconds).
    pub max_duration: f64,
    /// Segments shorter than this keep their original file (seconds).
    pub min_duration: f64,
    /// Non-H.264 segments longer than this keep their original file (seconds).
    pub non_h264_max_duration: f64,
    /// Wall-clock timeout per FFmpeg invocation (seconds).
    pub timeout_secs: u64,
    /// Input fps above `target * ratio` rounds frames down.
    pub round_down_ratio: f64,
    /// Input fps below `target * ratio` rounds frames up.
    pub round_up_ratio: f64,
}

impl Default for StandardizeConfig {
    fn default() -> Self {
        Self {
            max_duration: 20.0,
            min_duration: 0.5,
            non_h264_max_duration: 10.0,
            timeout_secs: 60,
            round_down_ratio: 1.5,
            round_up_ratio: 0.8,
        }
    }
}

impl StandardizeConfig {
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_max_duration(mut self, secs: f64) -> Self {
        self.max_duration = secs;
        self
    }
}

/// Encoder profile for a re-encode pass.
#[derive(Debug, Clone)]
pub struct ReencodeProfile {
    pub encoding: EncodingConfig,
    /// `flags=` value for the scale filter
    pub scale_flags: &'static str,
    /// Whether duration/codec skip rules apply
    pub apply_skip_rules: bool,
    /// Output audio sample rate and channel count
    pub audio_layout: Option<(u32, u32)>,
}

impl ReencodeProfile {
    /// Bulk standardization: fast preset, bounded by skip rules.
    pub fn standardize() -> Self {
        Self {
            encoding: EncodingConfig::for_standardize(),
            scale_flags: "bicubic",
            apply_skip_rules: true,
            audio_layout: Some((44100, 2)),
        }
    }

    /// Outlier re-encode with the output encoding, always attempted.
    pub fn outlier(encoding: EncodingConfig) -> Self {
        Self {
            encoding,
            scale_flags: "lanczos",
            apply_skip_rules: false,
            audio_layout: None,
        }
    }
}

/// Reason a segment must keep its original file, if any.
pub fn skip_reason(params: &TechnicalParams, config: &StandardizeConfig) -> Option<String> {
    if params.duration > config.max_duration {
        return Some(format!(
            "too long ({:.1}s > {:.1}s)",
            params.duration, config.max_duration
        ));
    }
    if params.duration < config.min_duration {
        return Some(format!(
            "too short ({:.2}s < {:.2}s)",
            params.duration, config.min_duration
        ));
    }
    if !params.is_h264() && params.duration > config.non_h264_max_duration {
        return Some(format!(
            "non-h264 codec {} over {:.1}s",
            params.codec, config.non_h264_max_duration
        ));
    }
    None
}

/// Build the scale + fps filter chain for a target.
pub fn build_filter(
    params: &TechnicalParams,
    target: &ReencodeTarget,
    scale_flags: &str,
    config: &StandardizeConfig,
) -> String {
    let fps = format_fps(target.fps);
    let fps_filter = if params.fps > target.fps * config.round_down_ratio {
        format!("fps={}:round=down", fps)
    } else if params.fps > 0.0 && params.fps < target.fps * config.round_up_ratio {
        format!("fps={}:round=up", fps)
    } else {
        format!("fps={}", fps)
    };
    format!(
        "scale={}:{}:flags={},{}",
        target.width, target.height, scale_flags, fps_filter
    )
}

fn format_fps(fps: f64) -> String {
    if (fps - fps.round()).abs() < 1e-6 {
        format!("{}", fps.round() as i64)
    } else {
        format!("{:.3}", fps)
    }
}

/// Build the re-encode command for one segment.
pub fn build_reencode_command(
    input: &Path,
    output: &Path,
    params: &TechnicalParams,
    target: &ReencodeTarget,
    profile: &ReencodeProfile,
    config: &StandardizeConfig,
) -> FfmpegCommand {
    let filter = build_filter(params, target, profile.scale_flags, config);
    let mut cmd = FfmpegCommand::new(input, output)
        .video_filter(filter)
        .output_args(profile.encoding.video_args())
        .output_args(["-pix_fmt", "yuv420p", "-fps_mode", "cfr"]);

    if params.has_audio {
        cmd = cmd.output_args(profile.encoding.audio_args());
        if let Some((rate, channels)) = profile.audio_layout {
            cmd = cmd.output_args(["-ar".to_string(), rate.to_string(), "-ac".to_string(), channels.to_string()]);
        }
    } else {
        cmd = cmd.no_audio();
    }

    cmd.faststart()
}

/// Re-encode one segment into `work_dir`, falling back to the original.
pub async fn prepare_segment(
    input: &Path,
    params: &TechnicalParams,
    target: &ReencodeTarget,
    profile: &ReencodeProfile,
    config: &StandardizeConfig,
    work_dir: &Path,
    index: usize,
) -> StandardizationOutcome {
    if profile.apply_skip_rules {
        if let Some(reason) = skip_reason(params, config) {
            info!(path = %input.display(), %reason, "Skipping standardization");
            return StandardizationOutcome {
                source: input.to_path_buf(),
                used: input.to_path_buf(),
                action: PreparedAction::Skipped { reason },
            };
        }
    }

    let output: PathBuf = work_dir.join(format!("prepared_{:03}.mp4", index));
    let cmd = build_reencode_command(input, &output, params, target, profile, config);
    debug!(path = %input.display(), "Re-encoding segment");

    let runner = FfmpegRunner::new().with_timeout(config.timeout_secs);
    let result = runner.run(&cmd).await;
    let produced = crate::fs_utils::ensure_nonempty_file(&output).await.is_ok();

    match result {
        Ok(()) if produced => {
            counter!("adreel_segments_reencoded_total").increment(1);
            StandardizationOutcome {
                source: input.to_path_buf(),
                used: output,
                action: PreparedAction::Reencoded,
            }
        }
        Ok(()) => {
            warn!(path = %input.display(), "Re-encode produced no output, keeping original");
            kept_original(input, "re-encode produced no output".to_string())
        }
        Err(e) => {
            warn!(path = %input.display(), error = %e, "Re-encode failed, keeping original");
            counter!("adreel_reencode_failures_total").increment(1);
            let reason = if e.is_timeout() {
                format!("timed out after {}s", config.timeout_secs)
            } else {
                e.to_string()
            };
            kept_original(input, reason)
        }
    }
}

fn kept_original(input: &Path, reason: String) -> StandardizationOutcome {
    StandardizationOutcome {
        source: input.to_path_buf(),
        used: input.to_path_buf(),
        action: PreparedAction::FailedKeptOriginal { reason },
    }
}

/// Outcome for a segment used as is.
pub fn copied(input: &Path) -> StandardizationOutcome {
    StandardizationOutcome {
        source: input.to_path_buf(),
        used: input.to_path_buf(),
        action: PreparedAction::Copied,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(fps: f64, duration: f64, codec: &str, has_audio: bool) -> TechnicalParams {
        TechnicalParams {
            fps,
            width: 720,
            height: 1280,
            codec: codec.to_string(),
            has_audio,
            has_video: true,
            duration,
        }
    }

    fn target() -> ReencodeTarget {
        ReencodeTarget {
            width: 1080,
            height: 1920,
            fps: 30.0,
        }
    }

    #[test]
    fn test_skip_rules() {
        let config = StandardizeConfig::default();
        assert!(skip_reason(&params(30.0, 25.0, "h264", true), &config)
            .unwrap()
            .contains("too long"));
        assert!(skip_reason(&params(30.0, 0.2, "h264", true), &config)
            .unwrap()
            .contains("too short"));
        assert!(skip_reason(&params(30.0, 12.0, "hevc", true), &config)
            .unwrap()
            .contains("non-h264"));
        assert!(skip_reason(&params(30.0, 8.0, "hevc", true), &config).is_none());
    }

    #[test]
    fn test_filter_rounding() {
        let config = StandardizeConfig::default();
        let f = build_filter(&params(60.0, 3.0, "h264", true), &target(), "bicubic", &config);
        assert_eq!(f, "scale=1080:1920:flags=bicubic,fps=30:round=down");
        let f = build_filter(&params(15.0, 3.0, "h264", true), &target(), "bicubic", &config);
        assert!(f.ends_with("fps=30:round=up"));
        let f = build_filter(&params(25.0, 3.0, "h264", true), &target(), "lanczos", &config);
        assert_eq!(f, "scale=1080:1920:flags=lanczos,fps=30");
    }

    #[test]
    fn test_command_audio_handling() {
        let config = StandardizeConfig::default();
        let profile = ReencodeProfile::standardize();
        let with_audio = build_reencode_command(
            Path::new("in.mp4"),
            Path::new("out.mp4"),
            &params(24.0, 3.0, "h264", true),
            &target(),
            &profile,
            &config,
        )
        .build_args();
        assert!(with_audio.contains(&"96k".to_string()));
        assert!(with_audio.contains(&"44100".to_string()));
        assert!(with_audio.contains(&"ultrafast".to_string()));
        assert!(with_audio.contains(&"cfr".to_string()));

        let silent = build_reencode_command(
            Path::new("in.mp4"),
            Path::new("out.mp4"),
            &params(24.0, 3.0, "h264", false),
            &target(),
            &profile,
            &config,
        )
        .build_args();
        assert!(silent.contains(&"-an".to_string()));
        assert!(!silent.contains(&"aac".to_string()));
    }

    #[tokio::test]
    async fn test_prepare_segment_skips_long_segment() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = prepare_segment(
            Path::new("long.mp4"),
            &params(24.0, 45.0, "h264", true),
            &target(),
            &ReencodeProfile::standardize(),
            &StandardizeConfig::default(),
            dir.path(),
            0,
        )
        .await;
        assert_eq!(outcome.used, PathBuf::from("long.mp4"));
        assert!(matches!(outcome.action, PreparedAction::Skipped { .. }));
    }
}
