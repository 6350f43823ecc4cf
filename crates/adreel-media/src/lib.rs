#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for segment assembly.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with timeouts
//! - FFprobe technical parameter probing
//! - Frame and audio extraction for analysis
//! - A skin-tone face-area estimate on extracted frames
//! - Compatibility analysis and concat strategy selection
//! - Per-segment standardization and stream-copy concatenation
//! - Reference audio replacement

pub mod benchmark_audio;
pub mod command;
pub mod compat;
pub mod concat;
pub mod error;
pub mod extract;
pub mod face;
pub mod fs_utils;
pub mod probe;
pub mod standardize;

pub use benchmark_audio::{apply_benchmark_audio, choose_sync_mode, BenchmarkAudioConfig};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use compat::{analyze_compatibility, choose_strategy, CompatibilityThresholds, ReencodeTarget};
pub use concat::{ConcatConfig, ConcatOutcome, Concatenator};
pub use error::{MediaError, MediaResult};
pub use extract::{extract_audio, extract_frames, pick_evenly, FrameSampling};
pub use face::estimate_face_area_ratio;
pub use fs_utils::{ensure_nonempty_file, move_file};
pub use probe::{probe_duration, probe_segment, DEFAULT_PROBE_TIMEOUT_SECS};
pub use standardize::{StandardizeConfig, ReencodeProfile};
