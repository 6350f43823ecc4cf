//! Segment assembly pipeline.
//!
//! This crate provides:
//! - Manifest loading and segment validation
//! - Multi-modal segment analysis with audio fallback and fusion
//! - Rule-first classification into narrative modules
//! - Duration-constrained selection with a shared exclusion set
//! - End-to-end composition and reporting

pub mod analyzer;
pub mod classifier;
pub mod composer;
pub mod config;
pub mod error;
pub mod logging;
pub mod manifest;
pub mod metrics;
pub mod retry;
pub mod selector;
pub mod targets;

pub use analyzer::{AnalyzerConfig, Language, SegmentAnalyzer};
pub use classifier::SegmentClassifier;
pub use composer::{Composer, CompositionPlan, CompositionRequest, TargetSource};
pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use logging::RunLogger;
pub use manifest::{CandidateSegment, ManifestLoader, ManifestLoaderConfig, ManifestPool};
pub use retry::{with_retry, RetryConfig};
pub use selector::{ExclusionSet, SegmentSelector, SelectorConfig};
pub use targets::{parse_ratios, parse_srt, targets_from_ratios, ModuleTargets, SrtEntry};
