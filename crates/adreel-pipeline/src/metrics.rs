//! Pipeline metrics.
//!
//! Counters and histograms are recorded through the `metrics` facade; the
//! embedding process decides whether a recorder is installed.

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    pub const SEGMENTS_ANALYZED_TOTAL: &str = "adreel_segments_analyzed_total";
    pub const FALLBACKS_TRIGGERED_TOTAL: &str = "adreel_fallbacks_triggered_total";
    pub const ANALYSIS_DURATION_SECONDS: &str = "adreel_analysis_duration_seconds";
    pub const CLASSIFICATIONS_TOTAL: &str = "adreel_classifications_total";
    pub const REMOTE_RETRIES_TOTAL: &str = "adreel_remote_retries_total";
    pub const MODULE_COVERAGE_RATIO: &str = "adreel_module_coverage_ratio";
    pub const COMPOSITIONS_TOTAL: &str = "adreel_compositions_total";
}

/// Record one finished segment analysis.
pub fn record_analysis(method: &str, duration_secs: f64) {
    counter!(names::SEGMENTS_ANALYZED_TOTAL, "method" => method.to_string()).increment(1);
    histogram!(names::ANALYSIS_DURATION_SECONDS).record(duration_secs);
}

/// Record an analyzer fallback and the predicate that fired it.
pub fn record_fallback(kind: &str, reason: &str) {
    counter!(
        names::FALLBACKS_TRIGGERED_TOTAL,
        "kind" => kind.to_string(),
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Record a classification decision by source.
pub fn record_classification(source: &str) {
    counter!(names::CLASSIFICATIONS_TOTAL, "source" => source.to_string()).increment(1);
}

/// Record a retry attempt.
pub fn record_retry(operation: &str) {
    counter!(names::REMOTE_RETRIES_TOTAL, "operation" => operation.to_string()).increment(1);
}

pub fn record_coverage(module: &str, ratio: f64) {
    histogram!(names::MODULE_COVERAGE_RATIO, "module" => module.to_string()).record(ratio);
}

pub fn record_composition(success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(names::COMPOSITIONS_TOTAL, "status" => status).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_analysis("visual", 1.5);
        record_fallback("audio", "all_empty");
        record_classification("rule_match");
        record_retry("vision");
        record_coverage("痛点", 0.9);
        record_composition(true);
    }
}
