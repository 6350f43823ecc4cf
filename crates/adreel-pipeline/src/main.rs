//! adreel command-line entry point.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use adreel_inference::{
    InferenceConfig, OpenAiChatClient, OpenAiTranscriptionClient, OpenAiVisionClient,
};
use adreel_models::{OutputSpec, RuleSet};
use adreel_pipeline::{
    parse_ratios, CompositionRequest, Composer, ExclusionSet, ManifestLoader, PipelineConfig,
    RetryConfig, SegmentAnalyzer, SegmentClassifier, SegmentSelector, TargetSource,
};

/// Assemble a marketing short video from a pool of pre-cut segments.
#[derive(Debug, Parser)]
#[command(name = "adreel", version)]
struct Cli {
    /// Directory of upstream manifest JSON files
    #[arg(long, env = "ADREEL_MANIFEST_DIR")]
    manifest_dir: PathBuf,

    /// Classification rule file (JSON)
    #[arg(long, env = "ADREEL_RULES")]
    rules: PathBuf,

    /// Output video path; the report is written next to it
    #[arg(long, env = "ADREEL_OUTPUT")]
    output: PathBuf,

    /// Total target duration in seconds, split by --ratios
    #[arg(long, env = "ADREEL_TOTAL_DURATION", default_value_t = 100.0)]
    total_duration: f64,

    /// Module ratios (pain point, solution, selling point, promotion); defaults to the rule file's
    #[arg(long, env = "ADREEL_RATIOS")]
    ratios: Option<String>,

    /// Reference SRT; when set, module targets come from it instead of ratios
    #[arg(long, env = "ADREEL_REFERENCE_SRT")]
    reference_srt: Option<PathBuf>,

    #[arg(long, env = "ADREEL_WIDTH", default_value_t = adreel_models::encoding::DEFAULT_OUTPUT_WIDTH)]
    width: u32,

    #[arg(long, env = "ADREEL_HEIGHT", default_value_t = adreel_models::encoding::DEFAULT_OUTPUT_HEIGHT)]
    height: u32,

    #[arg(long, env = "ADREEL_FPS", default_value_t = adreel_models::encoding::DEFAULT_OUTPUT_FPS)]
    fps: u32,

    #[arg(long, env = "ADREEL_BITRATE", default_value = adreel_models::encoding::DEFAULT_VIDEO_BITRATE)]
    bitrate: String,

    /// Replace the composed audio with this track
    #[arg(long, env = "ADREEL_REFERENCE_AUDIO")]
    reference_audio: Option<PathBuf>,

    /// Maximum segments per module; defaults to the rule file's
    #[arg(long, env = "ADREEL_MAX_SEGMENTS")]
    max_segments: Option<usize>,

    /// Reuse manifest tags only; no frame extraction or remote calls
    #[arg(long, env = "ADREEL_NO_ANALYSIS")]
    no_analysis: bool,
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("adreel=info,adreel_pipeline=info,adreel_media=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

fn build_analyzer(
    config: &PipelineConfig,
    rules: &RuleSet,
    inference: &InferenceConfig,
    chat: Option<Arc<OpenAiChatClient>>,
) -> Result<SegmentAnalyzer> {
    let mut analyzer = SegmentAnalyzer::new(config.analyzer.clone(), rules)
        .context("Invalid brand configuration in rule file")?;

    match OpenAiVisionClient::new(inference.vision.clone()) {
        Ok(client) => analyzer = analyzer.with_vision(Arc::new(client)),
        Err(e) => warn!(error = %e, "Vision adapter disabled"),
    }
    match OpenAiTranscriptionClient::new(inference.transcription.clone()) {
        Ok(client) => {
            let client = client.with_language(inference.transcription_language.clone());
            analyzer = analyzer.with_transcription(Arc::new(client));
        }
        Err(e) => warn!(error = %e, "Transcription adapter disabled"),
    }
    if let Some(chat) = chat {
        analyzer = analyzer.with_chat(chat);
    }
    Ok(analyzer)
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = PipelineConfig::from_env();

    let rules_text = tokio::fs::read_to_string(&cli.rules)
        .await
        .with_context(|| format!("Failed to read rule file {}", cli.rules.display()))?;
    let rules = RuleSet::from_json(&rules_text)
        .with_context(|| format!("Invalid rule file {}", cli.rules.display()))?;
    config.selector.max_segments_per_module =
        cli.max_segments.unwrap_or(rules.max_segments_per_module).max(1);
    let ratios = match &cli.ratios {
        Some(value) => parse_ratios(value).context("Invalid --ratios")?,
        None => rules.module_ratios.clone(),
    };

    let inference = InferenceConfig::from_env();
    let chat = match OpenAiChatClient::new(inference.chat.clone()) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            warn!(error = %e, "Chat adapter disabled");
            None
        }
    };

    let analyzer = build_analyzer(&config, &rules, &inference, chat.clone())?;
    let mut classifier = SegmentClassifier::new(rules)
        .context("Invalid classification rules")?
        .with_retry(
            RetryConfig::new("chat_classify").with_max_retries(config.analyzer.remote_max_retries),
            inference.chat.timeout,
        );
    if let Some(chat) = chat {
        classifier = classifier.with_chat(chat);
    }

    let composer = Composer::new(
        ManifestLoader::new(config.loader.clone()),
        analyzer,
        classifier,
        SegmentSelector::new(config.selector.clone()),
    )
    .with_thresholds(config.thresholds.clone())
    .with_standardize_config(config.standardize.clone())
    .with_benchmark_audio_config(config.benchmark_audio.clone().with_fps(cli.fps));

    let targets = match cli.reference_srt {
        Some(path) => TargetSource::ReferenceSrt(path),
        None => TargetSource::Ratios {
            ratios,
            total_duration: cli.total_duration,
        },
    };
    let output_spec = OutputSpec::default()
        .with_resolution(cli.width, cli.height)
        .with_fps(cli.fps)
        .with_video_bitrate(cli.bitrate);

    let mut request = CompositionRequest::new(cli.manifest_dir, cli.output, targets)
        .with_output_spec(output_spec)
        .with_analysis(!cli.no_analysis);
    if let Some(audio) = cli.reference_audio {
        request = request.with_reference_audio(audio);
    }

    let report = composer
        .compose(&request, &ExclusionSet::new())
        .await
        .context("Composition failed")?;

    info!(
        output = %report.output_path.display(),
        report = %request.report_path().display(),
        segments = report.summary.segment_count,
        duration = report.summary.total_actual_duration,
        invalid_files = report.invalid_files.len(),
        "Composition complete"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    info!("Starting adreel");
    run(cli).await
}
