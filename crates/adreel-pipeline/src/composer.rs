//! End-to-end composition.
//!
//! Load -> analyze -> classify -> targets -> select -> concatenate ->
//! benchmark audio -> report. Per-segment failures are absorbed by the
//! stages; only an empty selection or zero valid files fails the run.

use std::path::{Path, PathBuf};

use adreel_media::{
    apply_benchmark_audio, probe_duration, BenchmarkAudioConfig, CompatibilityThresholds,
    Concatenator, MediaError, StandardizeConfig, DEFAULT_PROBE_TIMEOUT_SECS,
};
use adreel_models::{
    ClassifiedSegment, CompositionReport, InvalidFile, OutputSpec, SelectionPlan, TechnicalDetails,
};
use tracing::{warn, Instrument};
use uuid::Uuid;

use crate::analyzer::SegmentAnalyzer;
use crate::classifier::SegmentClassifier;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::RunLogger;
use crate::manifest::ManifestLoader;
use crate::metrics::record_composition;
use crate::selector::{ExclusionSet, SegmentSelector};
use crate::targets::{targets_from_ratios, targets_from_srt_file, ModuleTargets};

/// Where module target durations come from.
#[derive(Debug, Clone)]
pub enum TargetSource {
    /// `ratio / sum(ratios) * total_duration` per module.
    Ratios {
        ratios: Vec<f64>,
        total_duration: f64,
    },
    /// Per-module durations of an annotated reference transcript.
    ReferenceSrt(PathBuf),
}

/// One composition job.
#[derive(Debug, Clone)]
pub struct CompositionRequest {
    pub manifest_dir: PathBuf,
    pub output_path: PathBuf,
    pub targets: TargetSource,
    pub output_spec: OutputSpec,
    pub reference_audio: Option<PathBuf>,
    /// When false, only manifest tags are used
    pub analysis_enabled: bool,
}

impl CompositionRequest {
    pub fn new(manifest_dir: impl Into<PathBuf>, output_path: impl Into<PathBuf>, targets: TargetSource) -> Self {
        Self {
            manifest_dir: manifest_dir.into(),
            output_path: output_path.into(),
            targets,
            output_spec: OutputSpec::default(),
            reference_audio: None,
            analysis_enabled: true,
        }
    }

    pub fn with_output_spec(mut self, spec: OutputSpec) -> Self {
        self.output_spec = spec;
        self
    }

    pub fn with_reference_audio(mut self, path: impl Into<PathBuf>) -> Self {
        self.reference_audio = Some(path.into());
        self
    }

    pub fn with_analysis(mut self, enabled: bool) -> Self {
        self.analysis_enabled = enabled;
        self
    }

    /// `<output stem>.report.json` next to the output.
    pub fn report_path(&self) -> PathBuf {
        self.output_path.with_extension("report.json")
    }
}

/// Everything decided before any media is written.
#[derive(Debug, Clone)]
pub struct CompositionPlan {
    pub run_id: Uuid,
    pub classified: Vec<ClassifiedSegment>,
    pub targets: ModuleTargets,
    pub selection: SelectionPlan,
    /// Files rejected while loading the manifests
    pub invalid_files: Vec<InvalidFile>,
}

impl CompositionPlan {
    /// Selected files in composition order.
    pub fn input_paths(&self) -> Vec<PathBuf> {
        self.selection
            .all_selected()
            .map(|s| s.segment.segment.file_path.clone())
            .collect()
    }
}

/// Runs the whole assembly pipeline.
pub struct Composer {
    loader: ManifestLoader,
    analyzer: SegmentAnalyzer,
    classifier: SegmentClassifier,
    selector: SegmentSelector,
    thresholds: CompatibilityThresholds,
    standardize: StandardizeConfig,
    benchmark_audio: BenchmarkAudioConfig,
}

impl Composer {
    pub fn new(
        loader: ManifestLoader,
        analyzer: SegmentAnalyzer,
        classifier: SegmentClassifier,
        selector: SegmentSelector,
    ) -> Self {
        Self {
            loader,
            analyzer,
            classifier,
            selector,
            thresholds: CompatibilityThresholds::default(),
            standardize: StandardizeConfig::default(),
            benchmark_audio: BenchmarkAudioConfig::default(),
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

    pub fn with_benchmark_audio_config(mut self, config: BenchmarkAudioConfig) -> Self {
        self.benchmark_audio = config;
        self
    }

    async fn targets(&self, source: &TargetSource) -> PipelineResult<ModuleTargets> {
        match source {
            TargetSource::Ratios {
                ratios,
                total_duration,
            } => targets_from_ratios(ratios, *total_duration),
            TargetSource::ReferenceSrt(path) => targets_from_srt_file(path, &self.classifier).await,
        }
    }

    /// Load, analyze, classify and select without touching media output.
    pub async fn plan(
        &self,
        request: &CompositionRequest,
        exclusion: &ExclusionSet,
    ) -> PipelineResult<CompositionPlan> {
        let logger = RunLogger::new(Uuid::new_v4(), "plan");
        self.plan_with_logger(request, exclusion, &logger).await
    }

    async fn plan_with_logger(
        &self,
        request: &CompositionRequest,
        exclusion: &ExclusionSet,
        logger: &RunLogger,
    ) -> PipelineResult<CompositionPlan> {
        // Targets first so a bad ratio list fails before any remote call.
        let targets = self.targets(&request.targets).await?;

        let load = logger.for_stage("load");
        load.log_start(&request.manifest_dir.display().to_string());
        let pool = self.loader.load_dir(&request.manifest_dir).await?;
        load.log_completion(&format!(
            "{} candidates, {} invalid files",
            pool.candidates.len(),
            pool.invalid_files.len()
        ));

        let analyze = logger.for_stage("analyze");
        analyze.log_start(&format!("{} segments", pool.candidates.len()));
        let analyses = if request.analysis_enabled {
            self.analyzer.analyze_batch(&pool.candidates).await
        } else {
            self.analyzer.analyze_manifest_only(&pool.candidates)
        };
        analyze.log_completion("batch analyzed");

        let classify = logger.for_stage("classify");
        let items = pool
            .candidates
            .iter()
            .map(|c| c.segment.clone())
            .zip(analyses)
            .collect();
        let classified = self.classifier.classify_all(items).await;
        classify.log_completion(&format!("{} segments classified", classified.len()));

        let select = logger.for_stage("select");
        let selection = self.selector.select(&classified, &targets, exclusion).await;
        select.log_completion(&format!(
            "{} segments, {:.1}s of {:.1}s",
            selection.segment_count(),
            selection.total_actual(),
            selection.total_target()
        ));

        Ok(CompositionPlan {
            run_id: logger.run_id(),
            classified,
            targets,
            selection,
            invalid_files: pool.invalid_files,
        })
    }

    /// Run the full pipeline and write the output video and its report.
    pub async fn compose(
        &self,
        request: &CompositionRequest,
        exclusion: &ExclusionSet,
    ) -> PipelineResult<CompositionReport> {
        let logger = RunLogger::new(Uuid::new_v4(), "compose");
        let span = logger.create_span();
        let result = self.compose_inner(request, exclusion, &logger).instrument(span).await;
        record_composition(result.is_ok());
        result
    }

    async fn compose_inner(
        &self,
        request: &CompositionRequest,
        exclusion: &ExclusionSet,
        logger: &RunLogger,
    ) -> PipelineResult<CompositionReport> {
        logger.log_start(&request.output_path.display().to_string());
        let plan = self.plan_with_logger(request, exclusion, logger).await?;

        let mut report = CompositionReport::from_plan(plan.run_id, &request.output_path, &plan.selection);
        report.invalid_files = plan.invalid_files.clone();

        if plan.selection.is_empty() {
            let err = PipelineError::composition(
                "no segment was selected for any module",
                plan.classified.len(),
                plan.invalid_files.len(),
            );
            return self.fail(request, report, err, logger).await;
        }

        let concat_logger = logger.for_stage("concat");
        let inputs = plan.input_paths();
        concat_logger.log_start(&format!("{} segments", inputs.len()));
        let concatenator = Concatenator::new(request.output_spec.clone())
            .with_thresholds(self.thresholds.clone())
            .with_standardize_config(self.standardize.clone());

        let outcome = match concatenator.concatenate(&inputs, &request.output_path).await {
            Ok(outcome) => outcome,
            Err(MediaError::NoValidInputs { valid, invalid }) => {
                let err = PipelineError::composition(
                    "no valid segment files to concatenate",
                    valid,
                    invalid + plan.invalid_files.len(),
                );
                return self.fail(request, report, err, logger).await;
            }
            Err(e) => return self.fail(request, report, e.into(), logger).await,
        };
        concat_logger.log_completion(&format!(
            "strategy {}, {} re-encoded",
            outcome.strategy.as_str(),
            outcome.reencoded_count()
        ));

        let reencoded_count = outcome.reencoded_count();
        report.invalid_files.extend(outcome.invalid_files.iter().cloned());
        report.technical_details = Some(TechnicalDetails {
            strategy: outcome.strategy,
            reencoded_count,
            compatibility: outcome.report,
            prepared: outcome.prepared,
        });

        if let Some(audio) = &request.reference_audio {
            let audio_logger = logger.for_stage("benchmark_audio");
            match apply_benchmark_audio(
                &request.output_path,
                audio,
                &request.output_path,
                &self.benchmark_audio,
            )
            .await
            {
                Ok(applied) => {
                    audio_logger.log_completion(&format!("{:?}", applied.mode));
                    report.benchmark_audio = Some(applied);
                }
                Err(e) => audio_logger.log_warning(&format!("keeping original audio: {}", e)),
            }
        }

        report.summary.output_duration =
            match probe_duration(&request.output_path, DEFAULT_PROBE_TIMEOUT_SECS).await {
                Ok(d) => Some(d),
                Err(e) => {
                    warn!(error = %e, "Could not probe composed output");
                    None
                }
            };
        report.success = true;
        write_report(&request.report_path(), &report).await?;
        logger.log_completion(&format!(
            "{} segments, {:.1}s",
            report.summary.segment_count, report.summary.total_actual_duration
        ));
        Ok(report)
    }

    /// Write a failure report, then return `err`.
    async fn fail(
        &self,
        request: &CompositionRequest,
        mut report: CompositionReport,
        err: PipelineError,
        logger: &RunLogger,
    ) -> PipelineResult<CompositionReport> {
        logger.log_error(&err.to_string());
        report.success = false;
        report.error = Some(err.to_string());
        if let Err(e) = write_report(&request.report_path(), &report).await {
            warn!(error = %e, "Could not write failure report");
        }
        Err(err)
    }
}

async fn write_report(path: &Path, report: &CompositionReport) -> PipelineResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_vec_pretty(report)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}
