//! Duration-constrained segment selection.
//!
//! Each module gets at most `max_segments_per_module` segments whose summed
//! duration approaches the module target without exceeding it by more than
//! `overshoot_tolerance`. Selected ids go into a shared [`ExclusionSet`] so
//! no segment is reused across modules or across calls sharing the set.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use adreel_models::{ClassifiedSegment, Module, ModulePlan, SelectedSegment, SelectionPlan};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::metrics::record_coverage;
use crate::targets::ModuleTargets;

/// Selection tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Duration injected for zero-duration segments
    pub default_segment_duration: f64,
    /// Round 1 stops once this share of the target is reached
    pub early_stop_ratio: f64,
    /// Upper bound on a module's duration, as a multiple of its target
    pub overshoot_tolerance: f64,
    pub max_segments_per_module: usize,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            default_segment_duration: 3.0,
            early_stop_ratio: 0.95,
            overshoot_tolerance: 1.2,
            max_segments_per_module: 3,
        }
    }
}

impl SelectorConfig {
    pub fn with_default_segment_duration(mut self, secs: f64) -> Self {
        self.default_segment_duration = secs;
        self
    }

    pub fn with_early_stop_ratio(mut self, ratio: f64) -> Self {
        self.early_stop_ratio = ratio;
        self
    }

    pub fn with_overshoot_tolerance(mut self, tolerance: f64) -> Self {
        self.overshoot_tolerance = tolerance;
        self
    }

    pub fn with_max_segments_per_module(mut self, max: usize) -> Self {
        self.max_segments_per_module = max;
        self
    }
}

/// Segment ids already used, shared across selector calls.
///
/// Cloning shares the underlying set.
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    inner: Arc<Mutex<HashSet<String>>>,
}

impl ExclusionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set pre-seeded with ids that must never be selected.
    pub fn with_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner: Arc::new(Mutex::new(ids.into_iter().map(Into::into).collect())),
        }
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.inner.lock().await.contains(id)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    pub async fn snapshot(&self) -> HashSet<String> {
        self.inner.lock().await.clone()
    }
}

/// Candidate with the duration used for accounting.
#[derive(Debug, Clone)]
struct Candidate<'a> {
    segment: &'a ClassifiedSegment,
    duration: f64,
    is_default_duration: bool,
}

impl Candidate<'_> {
    fn efficiency(&self) -> f64 {
        self.segment.quality_score() / self.duration
    }

    fn into_selected(self) -> SelectedSegment {
        SelectedSegment {
            segment: self.segment.clone(),
            effective_duration: self.duration,
            is_default_duration: self.is_default_duration,
        }
    }
}

fn descending(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Greedy two-round selector.
#[derive(Debug, Clone, Default)]
pub struct SegmentSelector {
    config: SelectorConfig,
}

impl SegmentSelector {
    pub fn new(config: SelectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// Select segments for every module.
    ///
    /// The exclusion lock is held from filtering until the selected ids are
    /// inserted, so concurrent callers sharing the set never overlap.
    pub async fn select(
        &self,
        pool: &[ClassifiedSegment],
        targets: &ModuleTargets,
        exclusion: &ExclusionSet,
    ) -> SelectionPlan {
        let mut excluded = exclusion.inner.lock().await;
        let mut plans = Vec::with_capacity(Module::ORDERED.len());

        for module in Module::ORDERED {
            let target = targets.get(module);
            let plan = self.select_module(module, pool, target, &excluded);
            excluded.extend(plan.selected_ids());

            info!(
                module = %module,
                target_secs = target,
                actual_secs = plan.actual_duration,
                coverage = plan.coverage_ratio,
                selected = plan.segment_count(),
                available = plan.available_segments,
                "Module selection complete"
            );
            record_coverage(module.as_str(), plan.coverage_ratio);
            plans.push(plan);
        }

        SelectionPlan::new(plans)
    }

    /// Select segments for one module, ignoring ids in `excluded`.
    pub fn select_module(
        &self,
        module: Module,
        pool: &[ClassifiedSegment],
        target: f64,
        excluded: &HashSet<String>,
    ) -> ModulePlan {
        let eligible: Vec<&ClassifiedSegment> = pool
            .iter()
            .filter(|s| s.module == module && module != Module::Other)
            .filter(|s| !s.analysis.unusable)
            .filter(|s| !excluded.contains(s.id()))
            .collect();

        let mut candidates: Vec<Candidate> = eligible
            .iter()
            .copied()
            .filter(|s| s.duration().is_finite() && s.duration() > 0.0)
            .map(|s| Candidate {
                segment: s,
                duration: s.duration(),
                is_default_duration: false,
            })
            .collect();

        if candidates.is_empty() {
            candidates = eligible
                .iter()
                .copied()
                .filter(|s| !(s.duration().is_finite() && s.duration() > 0.0))
                .map(|s| Candidate {
                    segment: s,
                    duration: self.config.default_segment_duration,
                    is_default_duration: true,
                })
                .collect();
            if !candidates.is_empty() {
                warn!(
                    module = %module,
                    count = candidates.len(),
                    default_secs = self.config.default_segment_duration,
                    "No positive-duration candidates, using default duration"
                );
            }
        }

        if candidates.is_empty() {
            warn!(module = %module, target_secs = target, "No candidates for module");
            return ModulePlan::empty(module, target);
        }

        let available = candidates.len();
        let max = self.config.max_segments_per_module;
        candidates.sort_by(|a, b| {
            descending(a.segment.combined_quality(), b.segment.combined_quality())
                .then_with(|| a.segment.id().cmp(b.segment.id()))
        });

        let total_available: f64 = candidates.iter().map(|c| c.duration).sum();
        let mut selected = if total_available < target {
            debug!(
                module = %module,
                available_secs = total_available,
                target_secs = target,
                "Pool below target, taking best candidates"
            );
            candidates.into_iter().take(max).collect()
        } else {
            self.fill(candidates, target, max)
        };

        selected.sort_by(|a, b| {
            descending(a.segment.quality_score(), b.segment.quality_score())
                .then_with(|| a.segment.id().cmp(b.segment.id()))
        });
        let selected = selected.into_iter().map(Candidate::into_selected).collect();
        ModulePlan::from_selected(module, target, selected, available)
    }

    /// Efficiency-greedy round followed by a longest-first gap fill.
    fn fill<'a>(&self, mut candidates: Vec<Candidate<'a>>, target: f64, max: usize) -> Vec<Candidate<'a>> {
        let ceiling = target * self.config.overshoot_tolerance;
        let early_stop = target * self.config.early_stop_ratio;
        let mut selected: Vec<Candidate> = Vec::new();
        let mut remaining: Vec<Candidate> = Vec::new();
        let mut accumulated = 0.0;

        candidates.sort_by(|a, b| {
            descending(a.efficiency(), b.efficiency()).then_with(|| a.segment.id().cmp(b.segment.id()))
        });
        for candidate in candidates {
            let open = selected.len() < max && accumulated < target && accumulated < early_stop;
            if open && accumulated + candidate.duration <= ceiling {
                accumulated += candidate.duration;
                selected.push(candidate);
            } else {
                remaining.push(candidate);
            }
        }

        if accumulated < target {
            remaining.sort_by(|a, b| descending(a.duration, b.duration));
            for candidate in remaining {
                if selected.len() >= max || accumulated >= target {
                    break;
                }
                if accumulated + candidate.duration <= ceiling {
                    accumulated += candidate.duration;
                    selected.push(candidate);
                }
            }
        }

        selected
    }
}
