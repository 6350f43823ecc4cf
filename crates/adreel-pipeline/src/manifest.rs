//! Manifest directory loader.
//!
//! Reads the upstream per-video JSON manifests, validates every referenced
//! segment file and builds the candidate pool. Segments that fail validation
//! are logged and reported as invalid files; they never abort the load.

use adreel_media::{
    ensure_nonempty_file, probe_segment, MediaError, MediaResult, DEFAULT_PROBE_TIMEOUT_SECS,
};
use adreel_models::{
    AnalysisMethod, InvalidFile, ManifestDocument, ManifestSegment, Segment, TechnicalParams,
};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{PipelineError, PipelineResult};

/// Quality assumed when the manifest carries none.
pub const DEFAULT_MANIFEST_QUALITY: f64 = 0.9;
/// Confidence assumed when the manifest carries none.
pub const DEFAULT_MANIFEST_CONFIDENCE: f64 = 0.8;

/// Probes a segment file for its technical parameters.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SegmentProber: Send + Sync {
    async fn probe(&self, path: &Path) -> MediaResult<TechnicalParams>;
}

/// ffprobe-backed prober.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    timeout_secs: u64,
}

impl FfprobeProber {
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }
}

impl Default for FfprobeProber {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TIMEOUT_SECS)
    }
}

#[async_trait]
impl SegmentProber for FfprobeProber {
    async fn probe(&self, path: &Path) -> MediaResult<TechnicalParams> {
        probe_segment(path, self.timeout_secs).await
    }
}

/// A validated segment with what the manifest said about it.
#[derive(Debug, Clone)]
pub struct CandidateSegment {
    pub segment: Segment,
    /// Normalized manifest tags; empty when the segment still needs analysis
    pub manifest_tags: Vec<String>,
    pub quality_score: f64,
    pub confidence: f64,
    pub face_close_up: Option<bool>,
    pub analysis_method: Option<AnalysisMethod>,
}

impl CandidateSegment {
    pub fn new(segment: Segment) -> Self {
        Self {
            segment,
            manifest_tags: Vec::new(),
            quality_score: DEFAULT_MANIFEST_QUALITY,
            confidence: DEFAULT_MANIFEST_CONFIDENCE,
            face_close_up: None,
            analysis_method: None,
        }
    }

    pub fn with_manifest_tags(mut self, tags: Vec<String>) -> Self {
        self.manifest_tags = tags;
        self
    }
}

/// Result of loading a manifest directory.
#[derive(Debug, Default)]
pub struct ManifestPool {
    pub candidates: Vec<CandidateSegment>,
    pub invalid_files: Vec<InvalidFile>,
    pub documents_read: usize,
    /// Segments dropped for `unusable` or `is_face_close_up` flags
    pub flagged: usize,
    pub duplicates: usize,
}

#[derive(Debug, Clone)]
pub struct ManifestLoaderConfig {
    pub max_document_bytes: u64,
    pub max_segments_per_document: usize,
    pub max_segment_duration: f64,
}

impl Default for ManifestLoaderConfig {
    fn default() -> Self {
        Self {
            max_document_bytes: 50 * 1024 * 1024,
            max_segments_per_document: 100,
            max_segment_duration: 10.0,
        }
    }
}

pub struct ManifestLoader {
    config: ManifestLoaderConfig,
    prober: Box<dyn SegmentProber>,
}

fn parse_method(value: Option<&str>) -> Option<AnalysisMethod> {
    let value = value?.trim().to_lowercase();
    serde_json::from_value(serde_json::Value::String(value)).ok()
}

impl ManifestLoader {
    pub fn new(config: ManifestLoaderConfig) -> Self {
        Self {
            config,
            prober: Box::new(FfprobeProber::default()),
        }
    }

    pub fn with_prober(mut self, prober: Box<dyn SegmentProber>) -> Self {
        self.prober = prober;
        self
    }

    /// Sorted `*.json` files under `dir`.
    async fn manifest_files(dir: &Path) -> PipelineResult<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| {
            PipelineError::configuration(format!(
                "cannot read manifest directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_json = path
                .extension()
                .map(|e| e.eq_ignore_ascii_case("json"))
                .unwrap_or(false);
            if is_json && entry.file_type().await?.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    async fn read_document(&self, path: &Path) -> Option<ManifestDocument> {
        let size = match tokio::fs::metadata(path).await {
            Ok(meta) => meta.len(),
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Skipping unreadable manifest");
                return None;
            }
        };
        if size > self.config.max_document_bytes {
            warn!(file = %path.display(), size, "Skipping oversized manifest");
            return None;
        }

        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Skipping unreadable manifest");
                return None;
            }
        };
        match serde_json::from_str(&text) {
            Ok(doc) => Some(doc),
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Skipping malformed manifest");
                None
            }
        }
    }

    /// Validate one manifest entry into a candidate.
    async fn validate(
        &self,
        entry: &ManifestSegment,
        path: &Path,
        id: String,
        video_id: &str,
    ) -> Result<CandidateSegment, InvalidFile> {
        if let Err(e) = ensure_nonempty_file(path).await {
            let reason = match e {
                MediaError::FileNotFound(_) => "file not found".to_string(),
                MediaError::EmptyFile(_) => "file is empty".to_string(),
                other => other.to_string(),
            };
            return Err(InvalidFile::new(path, reason));
        }

        let params = self
            .prober
            .probe(path)
            .await
            .map_err(|e| InvalidFile::new(path, format!("probe failed: {}", e)))?;

        let duration = entry
            .duration
            .filter(|d| d.is_finite() && *d > 0.0)
            .unwrap_or(params.duration);
        if duration.is_nan() || duration <= 0.0 {
            return Err(InvalidFile::new(path, "non-positive duration"));
        }
        if duration > self.config.max_segment_duration {
            return Err(InvalidFile::new(
                path,
                format!(
                    "duration {:.2}s exceeds {:.0}s limit",
                    duration, self.config.max_segment_duration
                ),
            ));
        }

        let segment = Segment {
            id,
            source_video_id: video_id.to_string(),
            file_path: path.to_path_buf(),
            duration,
            technical_params: Some(params),
            transcription: entry
                .transcription
                .clone()
                .filter(|t| !t.trim().is_empty()),
        };

        Ok(CandidateSegment {
            segment,
            manifest_tags: entry.normalized_tags(),
            quality_score: entry.quality_score.unwrap_or(DEFAULT_MANIFEST_QUALITY),
            confidence: entry.confidence.unwrap_or(DEFAULT_MANIFEST_CONFIDENCE),
            face_close_up: entry.is_face_close_up,
            analysis_method: parse_method(entry.analysis_method.as_deref()),
        })
    }

    /// Load and validate every manifest in `dir`.
    pub async fn load_dir(&self, dir: &Path) -> PipelineResult<ManifestPool> {
        let files = Self::manifest_files(dir).await?;
        let mut pool = ManifestPool::default();
        let mut seen: HashSet<String> = HashSet::new();

        for file in &files {
            let Some(doc) = self.read_document(file).await else {
                continue;
            };
            pool.documents_read += 1;

            if doc.segments.len() > self.config.max_segments_per_document {
                warn!(
                    file = %file.display(),
                    segments = doc.segments.len(),
                    limit = self.config.max_segments_per_document,
                    "Manifest truncated"
                );
            }

            for entry in doc.segments.iter().take(self.config.max_segments_per_document) {
                let raw = PathBuf::from(&entry.file_path);
                let path = if raw.is_absolute() { raw } else { dir.join(raw) };

                if entry.is_flagged_unusable() {
                    debug!(file = %path.display(), "Skipping flagged segment");
                    pool.flagged += 1;
                    continue;
                }

                let id = Segment::make_id(&doc.video_id, &entry.resolved_file_name());
                if !seen.insert(id.clone()) {
                    pool.duplicates += 1;
                    continue;
                }

                match self.validate(entry, &path, id, &doc.video_id).await {
                    Ok(candidate) => pool.candidates.push(candidate),
                    Err(invalid) => {
                        warn!(
                            file = %invalid.path.display(),
                            reason = %invalid.reason,
                            "Invalid segment excluded"
                        );
                        pool.invalid_files.push(invalid);
                    }
                }
            }
        }

        info!(
            documents = pool.documents_read,
            candidates = pool.candidates.len(),
            invalid = pool.invalid_files.len(),
            flagged = pool.flagged,
            "Manifest pool loaded"
        );
        Ok(pool)
    }
}
