//! Concatenation of prepared segments.
//!
//! The [`Concatenator`] validates inputs, probes them, picks a strategy
//! from the compatibility report, re-encodes what the strategy asks for and
//! finally joins everything with the concat demuxer. Work files live in a
//! temp dir and the result is moved into place only once it exists.

use adreel_models::{
    CompatibilityReport, ConcatStrategy, InvalidFile, OutputSpec, SegmentParams,
    StandardizationOutcome,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::compat::{
    analyze_compatibility, choose_strategy, deviates, is_outlier, reference_target,
    CompatibilityThresholds, ReencodeTarget,
};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{ensure_nonempty_file, move_file};
use crate::probe::{probe_segment, DEFAULT_PROBE_TIMEOUT_SECS};
use crate::standardize::{copied, prepare_segment, ReencodeProfile, StandardizeConfig};

/// Timeouts for the concat stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcatConfig {
    pub probe_timeout_secs: u64,
    pub concat_timeout_secs: u64,
}

impl Default for ConcatConfig {
    fn default() -> Self {
        Self {
            probe_timeout_secs: DEFAULT_PROBE_TIMEOUT_SECS,
            concat_timeout_secs: 300,
        }
    }
}

/// Result of a concatenation.
#[derive(Debug, Clone)]
pub struct ConcatOutcome {
    pub strategy: ConcatStrategy,
    pub report: CompatibilityReport,
    pub prepared: Vec<StandardizationOutcome>,
    pub invalid_files: Vec<InvalidFile>,
    pub output_path: PathBuf,
}

impl ConcatOutcome {
    pub fn reencoded_count(&self) -> usize {
        self.prepared.iter().filter(|p| p.was_reencoded()).count()
    }
}

/// Split inputs into usable files and invalid ones (missing or empty).
pub async fn validate_inputs(paths: &[PathBuf]) -> (Vec<PathBuf>, Vec<InvalidFile>) {
    let mut valid = Vec::with_capacity(paths.len());
    let mut invalid = Vec::new();

    for path in paths {
        match ensure_nonempty_file(path).await {
            Ok(_) => valid.push(path.clone()),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping invalid concat input");
                invalid.push(InvalidFile::new(path, e.to_string()));
            }
        }
    }

    (valid, invalid)
}

/// Quote a path for a concat demuxer list entry.
pub fn escape_concat_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', "'\\''")
}

/// Render concat list contents, one `file '...'` line per input.
pub fn concat_list_contents(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!("file '{}'\n", escape_concat_path(p)))
        .collect()
}

/// Write a concat list with absolute paths.
pub async fn write_concat_list(paths: &[PathBuf], list_path: &Path) -> MediaResult<()> {
    let cwd = std::env::current_dir()?;
    let absolute: Vec<PathBuf> = paths
        .iter()
        .map(|p| if p.is_absolute() { p.clone() } else { cwd.join(p) })
        .collect();
    tokio::fs::write(list_path, concat_list_contents(&absolute)).await?;
    Ok(())
}

/// Lossless concat command over a list file.
pub fn build_stream_copy_command(list_path: &Path, output: &Path) -> FfmpegCommand {
    FfmpegCommand::new(list_path, output)
        .input_args(["-f", "concat", "-safe", "0"])
        .output_args(["-c", "copy", "-avoid_negative_ts", "make_zero", "-fflags", "+genpts"])
        .faststart()
}

/// Join `paths` losslessly into `output`.
pub async fn concat_stream_copy(
    paths: &[PathBuf],
    output: &Path,
    work_dir: &Path,
    timeout_secs: u64,
) -> MediaResult<()> {
    let list_path = work_dir.join("concat_list.txt");
    write_concat_list(paths, &list_path).await?;

    let cmd = build_stream_copy_command(&list_path, output);
    FfmpegRunner::new().with_timeout(timeout_secs).run(&cmd).await?;
    ensure_nonempty_file(output).await?;
    Ok(())
}

/// Compatibility-aware concatenator.
#[derive(Debug, Clone)]
pub struct Concatenator {
    output_spec: OutputSpec,
    thresholds: CompatibilityThresholds,
    standardize: StandardizeConfig,
    config: ConcatConfig,
}

impl Concatenator {
    pub fn new(output_spec: OutputSpec) -> Self {
        Self {
            output_spec,
            thresholds: CompatibilityThresholds::default(),
            standardize: StandardizeConfig::default(),
            config: ConcatConfig::default(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: CompatibilityThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_standardize_config(mut self, config: StandardizeConfig) -> Self {
        self.standardize = config;
        self
    }

    pub fn with_config(mut self, config: ConcatConfig) -> Self {
        self.config = config;
        self
    }

    pub fn output_spec(&self) -> &OutputSpec {
        &self.output_spec
    }

    /// Probe valid inputs, moving probe failures and audio-only files to `invalid`.
    async fn probe_inputs(
        &self,
        valid: Vec<PathBuf>,
        invalid: &mut Vec<InvalidFile>,
    ) -> Vec<SegmentParams> {
        let mut probed = Vec::with_capacity(valid.len());
        for path in valid {
            match probe_segment(&path, self.config.probe_timeout_secs).await {
                Ok(params) if !params.has_video => {
                    warn!(path = %path.display(), "No video stream, skipping");
                    invalid.push(InvalidFile::new(&path, MediaError::NoVideoStream(path.clone()).to_string()));
                }
                Ok(params) => probed.push(SegmentParams { path, params }),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Probe failed, skipping");
                    invalid.push(InvalidFile::new(&path, e.to_string()));
                }
            }
        }
        probed
    }

    /// Re-encode the segments the strategy selects.
    async fn prepare(
        &self,
        report: &CompatibilityReport,
        strategy: ConcatStrategy,
        work_dir: &Path,
    ) -> Vec<StandardizationOutcome> {
        let (target, mut profile) = match strategy {
            ConcatStrategy::StreamCopy => {
                return report.segments.iter().map(|s| copied(&s.path)).collect();
            }
            ConcatStrategy::MinimalReencode => (
                reference_target(report, &self.output_spec),
                ReencodeProfile::outlier(self.output_spec.encoding.clone()),
            ),
            ConcatStrategy::Standardize => (
                ReencodeTarget::from(&self.output_spec),
                ReencodeProfile::standardize(),
            ),
        };
        profile.encoding = profile
            .encoding
            .with_max_bitrate(self.output_spec.video_bitrate.clone());

        let mut prepared = Vec::with_capacity(report.segments.len());
        for (index, segment) in report.segments.iter().enumerate() {
            let needs_reencode = match strategy {
                ConcatStrategy::MinimalReencode => is_outlier(&segment.params, &target, &self.thresholds),
                _ => deviates(&segment.params, &target, &self.thresholds),
            };
            if needs_reencode {
                prepared.push(
                    prepare_segment(
                        &segment.path,
                        &segment.params,
                        &target,
                        &profile,
                        &self.standardize,
                        work_dir,
                        index,
                    )
                    .await,
                );
            } else {
                prepared.push(copied(&segment.path));
            }
        }
        prepared
    }

    /// Concatenate `inputs` in order into `output`.
    ///
    /// Missing, empty, unprobeable and audio-only inputs are skipped and
    /// reported. Fails with [`MediaError::NoValidInputs`] when none remain.
    pub async fn concatenate(&self, inputs: &[PathBuf], output: &Path) -> MediaResult<ConcatOutcome> {
        let (valid, mut invalid_files) = validate_inputs(inputs).await;
        let probed = self.probe_inputs(valid, &mut invalid_files).await;

        if probed.is_empty() {
            return Err(MediaError::NoValidInputs {
                valid: 0,
                invalid: invalid_files.len(),
            });
        }

        let report = analyze_compatibility(probed, &self.thresholds);
        let strategy = choose_strategy(&report, &self.thresholds);
        info!(
            segments = report.segments.len(),
            invalid = invalid_files.len(),
            fps_variance = report.fps_variance,
            strategy = strategy.as_str(),
            "Concatenating segments"
        );
        counter!("adreel_concat_total", "strategy" => strategy.as_str()).increment(1);

        let work_dir = tempfile::Builder::new().prefix("adreel-concat-").tempdir()?;
        let prepared = self.prepare(&report, strategy, work_dir.path()).await;
        let staged = work_dir.path().join("concat_output.mp4");

        if prepared.len() == 1 {
            tokio::fs::copy(&prepared[0].used, &staged).await?;
        } else {
            let parts: Vec<PathBuf> = prepared.iter().map(|p| p.used.clone()).collect();
            concat_stream_copy(&parts, &staged, work_dir.path(), self.config.concat_timeout_secs).await?;
        }

        move_file(&staged, output).await?;

        Ok(ConcatOutcome {
            strategy,
            report,
            prepared,
            invalid_files,
            output_path: output.to_path_buf(),
        })
    }
}
