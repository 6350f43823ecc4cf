//! Multi-modal segment analyzer.
//!
//! Each segment walks a fixed sequence of [`AnalysisStage`]s:
//!
//! ```text
//! VisualPass -> QualityGate -> {Accept | AudioFallback} -> BrandTrigger
//!     -> Fusion -> AntiHallucination -> FaceCloseupCheck -> Done
//! ```
//!
//! Remote failures never leave this module. A segment that cannot be
//! analyzed resolves to [`AnalysisResult::conservative`].

mod brand;
mod closeup;
mod config;
mod extractor;
mod hallucination;
mod parse;
mod prompts;
mod quality;
mod stage;
mod text_tagger;
mod vocabulary;

pub use brand::BrandPolicy;
pub use closeup::CloseupVotes;
pub use config::{AnalyzerConfig, Language};
pub use extractor::{FfmpegExtractor, MediaExtractor};
pub use hallucination::HallucinationAction;
pub use parse::parse_tag_reply;
pub use quality::{score_tags, QualityWeights};
pub use stage::{fallback_reason, AnalysisStage, FallbackReason};
pub use text_tagger::TextTagger;
pub use vocabulary::TagVocabulary;

use adreel_inference::{ChatAdapter, TranscriptionAdapter, VisionAdapter};
use adreel_media::pick_evenly;
use adreel_models::{AnalysisMethod, AnalysisResult, RuleSet, TagDimension, TagSet};
use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::sync::Semaphore;
use tracing::{debug, info_span, warn, Instrument};

use crate::error::PipelineResult;
use crate::manifest::CandidateSegment;
use crate::metrics::{record_analysis, record_fallback};
use crate::retry::{with_retry, RetryConfig};

/// Best visual reply after the quality gate.
#[derive(Debug, Default)]
struct VisualOutcome {
    /// Parsed reply, placeholders included
    raw: TagSet,
    /// Reply with placeholders stripped
    tags: TagSet,
    score: f64,
    attempts: u32,
}

/// Per-segment working state.
struct AnalysisRun<'a> {
    candidate: &'a CandidateSegment,
    work_dir: TempDir,
    frames: Vec<PathBuf>,
    /// `None` until the transcription pass has run
    transcript: Option<Option<String>>,
    stages: Vec<AnalysisStage>,
    notes: Vec<String>,
}

impl<'a> AnalysisRun<'a> {
    fn new(candidate: &'a CandidateSegment, work_dir: TempDir) -> Self {
        Self {
            candidate,
            work_dir,
            frames: Vec::new(),
            transcript: None,
            stages: Vec::new(),
            notes: Vec::new(),
        }
    }

    fn enter(&mut self, stage: AnalysisStage) {
        debug!(segment_id = %self.candidate.segment.id, stage = %stage, "Analyzer stage");
        self.stages.push(stage);
    }

    fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    /// Transcript known without a remote call.
    fn known_transcript(&self) -> Option<String> {
        self.candidate
            .segment
            .transcription
            .clone()
            .or_else(|| self.transcript.clone().flatten())
    }

    fn stage_path(&self) -> String {
        self.stages
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(" > ")
    }
}

/// Analyzes segments into tagged, scored [`AnalysisResult`]s.
pub struct SegmentAnalyzer {
    config: AnalyzerConfig,
    vocabulary: TagVocabulary,
    brand: BrandPolicy,
    extractor: Arc<dyn MediaExtractor>,
    vision: Option<Arc<dyn VisionAdapter>>,
    transcription: Option<Arc<dyn TranscriptionAdapter>>,
    text_tagger: TextTagger,
}

impl SegmentAnalyzer {
    /// Build an analyzer for the brand settings of `rules`.
    ///
    /// Fails when brand trigger keywords are set without an allow-list.
    pub fn new(config: AnalyzerConfig, rules: &RuleSet) -> PipelineResult<Self> {
        let brand = BrandPolicy::from_rules(rules)?;
        let vocabulary = TagVocabulary::for_language(config.language, brand.allow_list());
        let text_tagger = TextTagger::new(vocabulary.clone(), config.language).with_retry(
            RetryConfig::new("chat_tagging").with_max_retries(config.remote_max_retries),
            Duration::from_secs(config.chat_timeout_secs),
        );
        let extractor = Arc::new(FfmpegExtractor::new(
            config.sampling.clone(),
            config.audio_extract_timeout_secs,
        ));

        Ok(Self {
            config,
            vocabulary,
            brand,
            extractor,
            vision: None,
            transcription: None,
            text_tagger,
        })
    }

    pub fn with_vision(mut self, vision: Arc<dyn VisionAdapter>) -> Self {
        self.vision = Some(vision);
        self
    }

    pub fn with_transcription(mut self, transcription: Arc<dyn TranscriptionAdapter>) -> Self {
        self.transcription = Some(transcription);
        self
    }

    pub fn with_chat(mut self, chat: Arc<dyn ChatAdapter>) -> Self {
        self.text_tagger = self.text_tagger.with_chat(chat);
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn MediaExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    fn retry(&self, operation: &str) -> RetryConfig {
        RetryConfig::new(operation).with_max_retries(self.config.remote_max_retries)
    }

    /// Analyze every candidate, at most `max_parallel_analyses` at a time.
    ///
    /// Results are returned in input order once all analyses have finished.
    pub async fn analyze_batch(&self, candidates: &[CandidateSegment]) -> Vec<AnalysisResult> {
        let semaphore = Semaphore::new(self.config.max_parallel_analyses.max(1));
        let tasks = candidates.iter().map(|candidate| {
            let semaphore = &semaphore;
            async move {
                let _permit = semaphore.acquire().await.ok();
                self.analyze(candidate).await
            }
        });
        join_all(tasks).await
    }

    /// Results from manifest data alone, without media or remote calls.
    pub fn analyze_manifest_only(&self, candidates: &[CandidateSegment]) -> Vec<AnalysisResult> {
        candidates
            .iter()
            .map(|candidate| {
                if candidate.manifest_tags.is_empty() {
                    let mut result = AnalysisResult::conservative();
                    result.transcript = candidate.segment.transcription.clone();
                    result.note("analysis disabled, manifest has no tags");
                    result
                } else {
                    self.from_manifest(candidate)
                }
            })
            .collect()
    }

    /// Analyze one segment. Never fails.
    pub async fn analyze(&self, candidate: &CandidateSegment) -> AnalysisResult {
        let span = info_span!("analyze_segment", segment_id = %candidate.segment.id);
        let started = Instant::now();
        let result = self.run(candidate).instrument(span).await;
        record_analysis(result.method.as_str(), started.elapsed().as_secs_f64());
        result
    }

    async fn run(&self, candidate: &CandidateSegment) -> AnalysisResult {
        if self.config.reuse_manifest_tags && !candidate.manifest_tags.is_empty() {
            return self.from_manifest(candidate);
        }

        let work_dir = match tempfile::Builder::new().prefix("adreel-analyze-").tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                warn!(error = %e, "Cannot create analysis work dir");
                return AnalysisResult::conservative();
            }
        };
        let mut run = AnalysisRun::new(candidate, work_dir);

        run.enter(AnalysisStage::VisualPass);
        run.frames = self.sample_frames(&mut run).await;

        run.enter(AnalysisStage::QualityGate);
        let visual = self.visual_pass(&run.frames).await;
        if visual.attempts > 1 {
            run.note(format!("visual pass took {} attempts", visual.attempts));
        }

        let mut tags = visual.tags.clone();
        let mut quality = visual.score;
        let mut confidence = self.config.visual_confidence;
        let mut method = AnalysisMethod::Visual;

        let reason = fallback_reason(&visual.raw, visual.score, self.config.quality_threshold);
        match reason {
            Some(reason) => {
                run.enter(AnalysisStage::AudioFallback);
                record_fallback("audio", reason.as_str());
                run.note(format!("audio fallback: {}", reason.as_str()));

                let audio_tags = match self.transcript(&mut run).await {
                    Some(text) => self.text_tagger.tag(&text, &TagDimension::ALL).await,
                    None => TagSet::new(),
                };
                if audio_tags.is_empty() {
                    run.note("audio fallback found no tags, keeping visual result");
                } else {
                    quality = score_tags(
                        &audio_tags,
                        &self.config.quality_weights,
                        self.config.richness_saturation,
                    );
                    tags = audio_tags;
                    confidence = self.config.audio_confidence;
                    method = AnalysisMethod::AudioOnly;
                }
            }
            None => run.enter(AnalysisStage::Accept),
        }

        run.enter(AnalysisStage::BrandTrigger);
        self.resolve_brand(&mut run, &mut tags).await;

        if reason.is_none() {
            let missing = stage::fusion_dimensions(&tags);
            if !missing.is_empty() {
                run.enter(AnalysisStage::Fusion);
                let filled = self.fuse(&mut run, &mut tags, &missing).await;
                if filled > 0 {
                    record_fallback("fusion", "partial_dimensions");
                    confidence += self.config.fusion_confidence_step * filled as f64;
                    quality = quality.max(score_tags(
                        &tags,
                        &self.config.quality_weights,
                        self.config.richness_saturation,
                    ));
                    method = AnalysisMethod::Fusion;
                    run.note(format!("fusion filled {} dimension(s)", filled));
                }
            }
        }

        let mut result = AnalysisResult::new(tags, quality, confidence, method);
        result.transcript = run.known_transcript();

        run.enter(AnalysisStage::AntiHallucination);
        hallucination::apply(&mut result, self.config.confidence_penalty);

        run.enter(AnalysisStage::FaceCloseupCheck);
        let face_area = closeup::mean_face_area(&run.frames, self.config.face_sample_frames)
            .await
            .map(|ratio| ratio >= self.config.face_area_threshold);
        self.apply_closeup(&mut result, face_area, candidate.face_close_up);

        run.enter(AnalysisStage::Done);
        Self::finish(result, run)
    }

    /// Accept manifest tags as a pre-analyzed result.
    fn from_manifest(&self, candidate: &CandidateSegment) -> AnalysisResult {
        let mut tags = self.vocabulary.place(&candidate.manifest_tags);
        let brand_text = format!(
            "{} {}",
            tags.all_tags().join(" "),
            candidate.segment.transcription.as_deref().unwrap_or_default()
        );
        if self.brand.has_triggers() && !self.brand.is_triggered(&brand_text) {
            tags.clear(TagDimension::Brand);
        }

        let method = candidate.analysis_method.unwrap_or(AnalysisMethod::Visual);
        let mut result =
            AnalysisResult::new(tags, candidate.quality_score, candidate.confidence, method);
        result.transcript = candidate.segment.transcription.clone();
        result.note("tags reused from manifest");

        hallucination::apply(&mut result, self.config.confidence_penalty);
        self.apply_closeup(&mut result, None, candidate.face_close_up);
        result
    }

    async fn sample_frames(&self, run: &mut AnalysisRun<'_>) -> Vec<PathBuf> {
        match self
            .extractor
            .frames(&run.candidate.segment, run.work_dir.path())
            .await
        {
            Ok(frames) => frames,
            Err(e) => {
                warn!(error = %e, "Frame extraction failed");
                run.note(format!("frame extraction failed: {}", e));
                Vec::new()
            }
        }
    }

    /// Visual tagging with quality-gated retries.
    async fn visual_pass(&self, frames: &[PathBuf]) -> VisualOutcome {
        let Some(vision) = &self.vision else {
            return VisualOutcome::default();
        };
        if frames.is_empty() {
            return VisualOutcome::default();
        }

        let images = pick_evenly(frames, self.config.max_frames_per_call);
        let retry = self.retry("vision");
        let timeout = Duration::from_secs(self.config.vision_timeout_secs);
        let mut best: Option<(TagSet, f64)> = None;
        let mut attempts = 0;

        for attempt in 0..=self.config.max_quality_retries {
            attempts += 1;
            let prompt = prompts::visual_prompt(self.config.language, &self.vocabulary, attempt > 0);
            let reply = with_retry(&retry, timeout, || vision.describe(&images, &prompt)).await;

            let parsed = match reply {
                Ok(reply) => parse_tag_reply(&reply),
                Err(e) => {
                    warn!(error = %e, attempt, "Vision call failed");
                    break;
                }
            };
            let score = score_tags(
                &parsed,
                &self.config.quality_weights,
                self.config.richness_saturation,
            );
            debug!(attempt, score, "Visual reply scored");

            if best.as_ref().map_or(true, |(_, s)| score > *s) {
                best = Some((parsed, score));
            }
            if score >= self.config.quality_threshold {
                break;
            }
        }

        let (raw, mut score) = best.unwrap_or_default();
        let tags = quality::strip_placeholders(&raw);
        if score < self.config.quality_threshold && !tags.is_empty() {
            score = (score + self.config.post_process_bonus).min(1.0);
        }

        VisualOutcome {
            raw,
            tags,
            score,
            attempts,
        }
    }

    /// Transcript for this segment, transcribing at most once.
    async fn transcript(&self, run: &mut AnalysisRun<'_>) -> Option<String> {
        if let Some(text) = run.candidate.segment.transcription.clone() {
            return Some(text);
        }
        if let Some(cached) = &run.transcript {
            return cached.clone();
        }

        let fetched = self.fetch_transcript(run).await;
        run.transcript = Some(fetched.clone());
        fetched
    }

    async fn fetch_transcript(&self, run: &mut AnalysisRun<'_>) -> Option<String> {
        let adapter = self.transcription.as_ref()?;

        let audio = match self
            .extractor
            .audio(&run.candidate.segment, run.work_dir.path())
            .await
        {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "Audio extraction failed");
                run.note(format!("audio extraction failed: {}", e));
                return None;
            }
        };

        let retry = self.retry("transcription");
        let timeout = Duration::from_secs(self.config.transcription_timeout_secs);
        match with_retry(&retry, timeout, || adapter.transcribe(&audio)).await {
            Ok(transcript) if transcript.has_text() => Some(transcript.text),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "Transcription failed");
                run.note(format!("transcription failed: {}", e));
                None
            }
        }
    }

    /// Brand dimension: allow-listed only, and only when triggered.
    async fn resolve_brand(&self, run: &mut AnalysisRun<'_>, tags: &mut TagSet) {
        if !self.brand.has_triggers() {
            let filtered = self.brand.filter(&tags.brand);
            tags.set(TagDimension::Brand, filtered);
            return;
        }

        let mut text: Vec<String> = Vec::new();
        for dim in [TagDimension::Object, TagDimension::Scene, TagDimension::Emotion] {
            text.extend(tags.get(dim).iter().cloned());
        }
        if let Some(transcript) = run.known_transcript() {
            text.push(transcript);
        }
        if !self.brand.is_triggered(&text.join(" ")) {
            tags.clear(TagDimension::Brand);
            return;
        }

        let mut brands = self.brand_visual_pass(&run.frames).await;
        if brands.is_empty() {
            if let Some(transcript) = self.transcript(run).await {
                brands = self.brand.scan_text(&transcript);
            }
        }
        run.note(format!("brand pass found {:?}", brands));
        tags.set(TagDimension::Brand, brands);
    }

    async fn brand_visual_pass(&self, frames: &[PathBuf]) -> Vec<String> {
        let Some(vision) = &self.vision else {
            return Vec::new();
        };
        if frames.is_empty() {
            return Vec::new();
        }

        let images = pick_evenly(frames, self.config.max_frames_per_call);
        let prompt = prompts::brand_prompt(self.config.language, self.brand.allow_list());
        let retry = self.retry("vision_brand");
        let timeout = Duration::from_secs(self.config.vision_timeout_secs);
        match with_retry(&retry, timeout, || vision.describe(&images, &prompt)).await {
            Ok(reply) => {
                let parsed = parse_tag_reply(&reply);
                let mut found = self.brand.filter(&parsed.brand);
                if found.is_empty() {
                    found = self.brand.scan_text(&reply);
                }
                found
            }
            Err(e) => {
                warn!(error = %e, "Brand pass failed");
                Vec::new()
            }
        }
    }

    /// Fill `missing` dimensions from the transcript. Returns how many were filled.
    async fn fuse(
        &self,
        run: &mut AnalysisRun<'_>,
        tags: &mut TagSet,
        missing: &[TagDimension],
    ) -> usize {
        let Some(text) = self.transcript(run).await else {
            return 0;
        };
        let extra = self.text_tagger.tag(&text, missing).await;

        let mut filled = 0;
        for dim in missing {
            if tags.get(*dim).is_empty() && !extra.get(*dim).is_empty() {
                tags.set(*dim, extra.get(*dim));
                filled += 1;
            }
        }
        filled
    }

    fn apply_closeup(
        &self,
        result: &mut AnalysisResult,
        face_area: Option<bool>,
        manifest_flag: Option<bool>,
    ) {
        let votes = CloseupVotes {
            tag_vocabulary: closeup::tag_vote(&result.tags.joined_lowercase()),
            face_area,
            manifest_flag,
        };
        if votes.is_closeup() {
            result.unusable = true;
            result.set_quality_score(self.config.face_closeup_quality_floor);
            result.note(format!("face close-up: {:?}", votes));
        }
    }

    fn finish(result: AnalysisResult, run: AnalysisRun<'_>) -> AnalysisResult {
        let mut out = if result.tags.is_empty() {
            let mut conservative = AnalysisResult::conservative();
            conservative.unusable = result.unusable;
            conservative.transcript = result.transcript.clone();
            conservative.notes = result.notes.clone();
            conservative.note("no usable tags, conservative result");
            conservative
        } else {
            result
        };

        let mut notes = run.notes.clone();
        notes.push(format!("stages: {}", run.stage_path()));
        notes.append(&mut out.notes);
        out.notes = notes;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adreel_inference::{
        InferenceError, MockChatAdapter, MockTranscriptionAdapter, MockVisionAdapter,
    };
    use adreel_media::MediaError;
    use adreel_models::{Segment, Transcript};
    use super::extractor::MockMediaExtractor;
    use std::path::Path;

    fn segment(id: &str) -> Segment {
        Segment {
            id: id.to_string(),
            source_video_id: "v1".to_string(),
            file_path: PathBuf::from(format!("/pool/{}.mp4", id)),
            duration: 3.0,
            technical_params: None,
            transcription: None,
        }
    }

    fn rules(allow: &[&str], triggers: &[&str]) -> RuleSet {
        serde_json::from_value(serde_json::json!({
            "rules": [],
            "brand_allow_list": allow,
            "brand_trigger_keywords": triggers,
        }))
        .unwrap()
    }

    fn fast_config() -> AnalyzerConfig {
        let mut config = AnalyzerConfig::default();
        config.remote_max_retries = 0;
        config
    }

    /// Extractor that hands out fake frame paths and audio without ffmpeg.
    fn fake_extractor() -> MockMediaExtractor {
        let mut extractor = MockMediaExtractor::new();
        extractor.expect_frames().returning(|_, dir: &Path| {
            Ok((1..=4).map(|i| dir.join(format!("frame_{:03}.jpg", i))).collect())
        });
        extractor
            .expect_audio()
            .returning(|_, dir: &Path| Ok(dir.join("audio.wav")));
        extractor
    }

    fn analyzer(rules: &RuleSet) -> SegmentAnalyzer {
        SegmentAnalyzer::new(fast_config(), rules)
            .unwrap()
            .with_extractor(Arc::new(fake_extractor()))
    }

    fn transcript(text: &str) -> Transcript {
        Transcript {
            success: true,
            text: text.to_string(),
            segments: Vec::new(),
        }
    }

    const RICH_REPLY: &str = r#"{"object":["奶瓶","宝宝","妈妈"],"scene":["客厅","沙发"],"emotion":["开心","温馨"],"brand":[]}"#;

    #[tokio::test]
    async fn test_rich_visual_reply_is_accepted() {
        let mut vision = MockVisionAdapter::new();
        vision
            .expect_describe()
            .times(1)
            .returning(|_, _| Ok(RICH_REPLY.to_string()));
        let mut transcription = MockTranscriptionAdapter::new();
        transcription.expect_transcribe().never();

        let analyzer = analyzer(&rules(&[], &[]))
            .with_vision(Arc::new(vision))
            .with_transcription(Arc::new(transcription));
        let result = analyzer.analyze(&CandidateSegment::new(segment("s1"))).await;

        assert_eq!(result.method, AnalysisMethod::Visual);
        assert_eq!(result.tags.object, vec!["奶瓶", "宝宝", "妈妈"]);
        assert!(result.quality_score() >= 0.6);
        assert!((result.confidence() - 0.8).abs() < 1e-9);
        assert!(!result.unusable);
        assert!(result.notes.iter().any(|n| n.contains("accept")));
    }

    #[tokio::test]
    async fn test_empty_visual_falls_back_to_audio() {
        let mut vision = MockVisionAdapter::new();
        vision
            .expect_describe()
            .returning(|_, _| Ok(r#"{"object":[],"scene":[],"emotion":[],"brand":[]}"#.to_string()));
        let mut transcription = MockTranscriptionAdapter::new();
        transcription
            .expect_transcribe()
            .times(1)
            .returning(|_| Ok(transcript("宝宝晚上在卧室哭闹，妈妈很焦虑")));

        let analyzer = analyzer(&rules(&[], &[]))
            .with_vision(Arc::new(vision))
            .with_transcription(Arc::new(transcription));
        let result = analyzer.analyze(&CandidateSegment::new(segment("s2"))).await;

        assert_eq!(result.method, AnalysisMethod::AudioOnly);
        assert!(result.tags.scene.contains(&"卧室".to_string()));
        assert!(result.tags.emotion.contains(&"焦虑".to_string()));
        assert!((result.confidence() - 0.6).abs() < 1e-9);
        assert!(result.transcript.is_some());
        assert!(result.notes.iter().any(|n| n == "audio fallback: all_empty"));
    }

    #[tokio::test]
    async fn test_quality_retry_uses_strict_prompt() {
        let mut vision = MockVisionAdapter::new();
        let mut seq = mockall::Sequence::new();
        vision
            .expect_describe()
            .withf(|_, prompt| !prompt.contains("严格要求"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(r#"{"object":["奶瓶"],"scene":["无"]}"#.to_string()));
        vision
            .expect_describe()
            .withf(|_, prompt| prompt.contains("严格要求"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(RICH_REPLY.to_string()));

        let analyzer = analyzer(&rules(&[], &[])).with_vision(Arc::new(vision));
        let result = analyzer.analyze(&CandidateSegment::new(segment("s3"))).await;

        assert_eq!(result.method, AnalysisMethod::Visual);
        assert_eq!(result.tags.scene, vec!["客厅", "沙发"]);
        assert!(result.notes.iter().any(|n| n.contains("2 attempts")));
    }

    #[tokio::test]
    async fn test_targeted_fusion_fills_missing_emotion() {
        let mut vision = MockVisionAdapter::new();
        vision.expect_describe().returning(|_, _| {
            Ok(r#"{"object":["奶瓶","宝宝","奶粉罐","奶嘴"],"scene":["客厅","沙发"],"emotion":[],"brand":["贝因美"]}"#.to_string())
        });
        let mut transcription = MockTranscriptionAdapter::new();
        transcription
            .expect_transcribe()
            .times(1)
            .returning(|_| Ok(transcript("宝宝喝完很满足")));

        let analyzer = analyzer(&rules(&["贝因美"], &[]))
            .with_vision(Arc::new(vision))
            .with_transcription(Arc::new(transcription));
        let result = analyzer.analyze(&CandidateSegment::new(segment("s4"))).await;

        assert_eq!(result.method, AnalysisMethod::Fusion);
        assert_eq!(result.tags.emotion, vec!["满足"]);
        assert_eq!(result.tags.object.len(), 4);
        assert!((result.confidence() - 0.85).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_brand_outside_allow_list_never_kept() {
        let mut vision = MockVisionAdapter::new();
        vision.expect_describe().returning(|_, prompt| {
            if prompt.contains("只识别画面中出现的品牌") {
                Ok(r#"{"brand":["飞鹤","贝因美"]}"#.to_string())
            } else {
                Ok(r#"{"object":["奶粉罐","宝宝","妈妈"],"scene":["客厅"],"emotion":["开心"],"brand":["飞鹤"]}"#.to_string())
            }
        });

        let analyzer = analyzer(&rules(&["贝因美"], &["奶粉"])).with_vision(Arc::new(vision));
        let result = analyzer.analyze(&CandidateSegment::new(segment("s5"))).await;
        assert_eq!(result.tags.brand, vec!["贝因美"]);
    }

    #[tokio::test]
    async fn test_brand_forced_empty_without_trigger() {
        let mut vision = MockVisionAdapter::new();
        vision.expect_describe().times(1).returning(|_, _| {
            Ok(r#"{"object":["婴儿车","宝宝","妈妈"],"scene":["公园"],"emotion":["开心"],"brand":["贝因美"]}"#.to_string())
        });

        let analyzer = analyzer(&rules(&["贝因美"], &["奶粉"])).with_vision(Arc::new(vision));
        let result = analyzer.analyze(&CandidateSegment::new(segment("s6"))).await;
        assert!(result.tags.brand.is_empty());
    }

    #[tokio::test]
    async fn test_vision_errors_resolve_conservatively() {
        let mut vision = MockVisionAdapter::new();
        vision
            .expect_describe()
            .returning(|_, _| Err(InferenceError::Status { status: 503, body: String::new() }));
        let mut transcription = MockTranscriptionAdapter::new();
        transcription
            .expect_transcribe()
            .returning(|_| Err(InferenceError::Timeout(60)));

        let analyzer = analyzer(&rules(&[], &[]))
            .with_vision(Arc::new(vision))
            .with_transcription(Arc::new(transcription));
        let result = analyzer.analyze(&CandidateSegment::new(segment("s7"))).await;

        assert!(result.tags.is_empty());
        assert!(!result.unusable);
        assert_eq!(result.quality_score(), 0.1);
        assert_eq!(result.confidence(), 0.1);
    }

    #[tokio::test]
    async fn test_frame_failure_uses_upstream_transcript() {
        let mut extractor = MockMediaExtractor::new();
        extractor
            .expect_frames()
            .returning(|s, _| Err(MediaError::FileNotFound(s.file_path.clone())));
        extractor.expect_audio().never();
        let mut vision = MockVisionAdapter::new();
        vision.expect_describe().never();
        let mut chat = MockChatAdapter::new();
        chat.expect_complete().never();

        let analyzer = SegmentAnalyzer::new(fast_config(), &rules(&[], &[]))
            .unwrap()
            .with_extractor(Arc::new(extractor))
            .with_vision(Arc::new(vision))
            .with_chat(Arc::new(chat));

        let mut seg = segment("s8");
        seg.transcription = Some("在厨房冲奶粉".to_string());
        let result = analyzer.analyze(&CandidateSegment::new(seg)).await;

        assert_eq!(result.method, AnalysisMethod::AudioOnly);
        assert!(result.tags.scene.contains(&"厨房".to_string()));
    }

    #[tokio::test]
    async fn test_face_closeup_marks_unusable() {
        let mut extractor = MockMediaExtractor::new();
        extractor.expect_frames().returning(|_, dir: &Path| {
            let frame = dir.join("frame_001.png");
            image::RgbImage::from_pixel(48, 48, image::Rgb([224, 172, 150]))
                .save(&frame)
                .unwrap();
            Ok(vec![frame])
        });
        extractor
            .expect_audio()
            .returning(|s, _| Err(MediaError::FileNotFound(s.file_path.clone())));
        let mut vision = MockVisionAdapter::new();
        vision.expect_describe().returning(|_, _| {
            Ok(r#"{"object":["面部特写","妈妈","眼睛"],"scene":["卧室","室内"],"emotion":["微笑","平静"],"brand":[]}"#.to_string())
        });

        let analyzer = SegmentAnalyzer::new(fast_config(), &rules(&[], &[]))
            .unwrap()
            .with_extractor(Arc::new(extractor))
            .with_vision(Arc::new(vision));
        let result = analyzer.analyze(&CandidateSegment::new(segment("s9"))).await;

        assert!(result.unusable);
        assert_eq!(result.quality_score(), 0.1);
    }

    #[tokio::test]
    async fn test_face_tags_alone_do_not_mark_unusable() {
        let mut vision = MockVisionAdapter::new();
        vision.expect_describe().returning(|_, _| {
            Ok(r#"{"object":["面部特写","妈妈","眼睛"],"scene":["卧室","室内"],"emotion":["微笑","平静"],"brand":[]}"#.to_string())
        });

        // frames from the fake extractor cannot be read, so only the tag check runs
        let analyzer = analyzer(&rules(&[], &[])).with_vision(Arc::new(vision));
        let result = analyzer.analyze(&CandidateSegment::new(segment("s9b"))).await;

        assert!(!result.unusable);
    }

    #[tokio::test]
    async fn test_product_closeup_stays_usable() {
        let mut vision = MockVisionAdapter::new();
        vision.expect_describe().returning(|_, _| {
            Ok(r#"{"object":["奶粉罐特写","配方表","勺子"],"scene":["厨房","餐桌"],"emotion":["专注"],"brand":[]}"#.to_string())
        });

        let analyzer = analyzer(&rules(&[], &[])).with_vision(Arc::new(vision));
        let visual = analyzer.analyze(&CandidateSegment::new(segment("p1"))).await;
        assert!(!visual.unusable);
        assert!(visual.quality_score() > 0.1);

        let candidate = CandidateSegment::new(segment("p2"))
            .with_manifest_tags(vec!["奶粉罐特写".to_string(), "厨房".to_string()]);
        let reused = analyzer.analyze_manifest_only(&[candidate]);
        assert!(!reused[0].unusable);
        assert_eq!(reused[0].quality_score(), 0.9);
    }

    #[tokio::test]
    async fn test_manifest_tags_reused_without_remote_calls() {
        let mut vision = MockVisionAdapter::new();
        vision.expect_describe().never();
        let mut extractor = MockMediaExtractor::new();
        extractor.expect_frames().never();

        let analyzer = SegmentAnalyzer::new(fast_config(), &rules(&[], &[]))
            .unwrap()
            .with_extractor(Arc::new(extractor))
            .with_vision(Arc::new(vision));
        let candidate = CandidateSegment::new(segment("s10"))
            .with_manifest_tags(vec!["客厅".to_string(), "奶瓶".to_string(), "开心".to_string()]);
        let result = analyzer.analyze(&candidate).await;

        assert_eq!(result.tags.scene, vec!["客厅"]);
        assert_eq!(result.tags.object, vec!["奶瓶"]);
        assert_eq!(result.quality_score(), 0.9);
        assert_eq!(result.confidence(), 0.8);
    }

    #[test]
    fn test_manifest_only_never_extracts() {
        let mut extractor = MockMediaExtractor::new();
        extractor.expect_frames().never();
        extractor.expect_audio().never();
        let analyzer = SegmentAnalyzer::new(fast_config(), &rules(&[], &[]))
            .unwrap()
            .with_extractor(Arc::new(extractor));

        let tagged = CandidateSegment::new(segment("t"))
            .with_manifest_tags(vec!["奶瓶".to_string(), "客厅".to_string()]);
        let bare = CandidateSegment::new(segment("b"));
        let results = analyzer.analyze_manifest_only(&[tagged, bare]);

        assert_eq!(results.len(), 2);
        assert!(!results[0].tags.is_empty());
        assert!(results[1].tags.is_empty());
        assert!((results[1].quality_score() - 0.1).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_batch_keeps_order_and_bounds() {
        let mut vision = MockVisionAdapter::new();
        vision
            .expect_describe()
            .returning(|_, _| Ok(RICH_REPLY.to_string()));

        let analyzer = SegmentAnalyzer::new(fast_config().with_max_parallel_analyses(2), &rules(&[], &[]))
            .unwrap()
            .with_extractor(Arc::new(fake_extractor()))
            .with_vision(Arc::new(vision));

        let candidates: Vec<CandidateSegment> = (0..5)
            .map(|i| CandidateSegment::new(segment(&format!("b{}", i))))
            .collect();
        let results = analyzer.analyze_batch(&candidates).await;

        assert_eq!(results.len(), 5);
        for result in &results {
            assert!((0.0..=1.0).contains(&result.quality_score()));
            assert!((0.0..=1.0).contains(&result.confidence()));
        }
    }

    #[test]
    fn test_trigger_without_allow_list_fails_construction() {
        let err = SegmentAnalyzer::new(AnalyzerConfig::default(), &rules(&[], &["奶粉"]))
            .err()
            .unwrap();
        assert!(err.is_fatal());
    }
}
