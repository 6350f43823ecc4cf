//! Shared data models for the adreel assembly pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Segments and their probed technical parameters
//! - Per-segment analysis results and tag sets
//! - Classification rules and classified segments
//! - Selection plans, compatibility findings and composition reports
//! - Upstream manifests and transcripts
//! - Output and encoding settings

pub mod analysis;
pub mod classification;
pub mod compat;
pub mod encoding;
pub mod manifest;
pub mod module;
pub mod report;
pub mod rules;
pub mod segment;
pub mod selection;
pub mod transcript;

// Re-export common types
pub use analysis::{AnalysisMethod, AnalysisResult, TagDimension, TagSet};
pub use classification::{ClassificationDecision, ClassifiedSegment};
pub use compat::{
    CompatibilityReport, ConcatStrategy, PreparedAction, SegmentParams, StandardizationOutcome,
};
pub use encoding::{EncodingConfig, OutputSpec};
pub use manifest::{is_placeholder, ManifestDocument, ManifestSegment};
pub use module::Module;
pub use report::{
    AudioSyncMode, BenchmarkAudioOutcome, CompositionReport, CompositionSummary, InvalidFile,
    ModuleBreakdown, TechnicalDetails,
};
pub use rules::{ClassificationRule, PositiveKeywords, RuleError, RuleSet, WeightedKeyword};
pub use segment::{Segment, TechnicalParams};
pub use selection::{ModulePlan, SelectedSegment, SelectionPlan};
pub use transcript::{MissingTimestamps, Transcript, TranscriptSegment};
