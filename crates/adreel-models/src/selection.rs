//! Selection plans produced by the duration-constrained selector.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::classification::ClassifiedSegment;
use crate::module::Module;

/// A segment chosen for a module.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SelectedSegment {
    pub segment: ClassifiedSegment,
    /// Duration used for accounting (injected default for zero-duration segments)
    pub effective_duration: f64,
    /// Whether `effective_duration` is an injected default
    #[serde(default)]
    pub is_default_duration: bool,
}

impl SelectedSegment {
    pub fn id(&self) -> &str {
        self.segment.id()
    }
}

/// Selection result for one module.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ModulePlan {
    pub module: Module,
    pub target_duration: f64,
    /// Ordered by descending quality
    pub selected: Vec<SelectedSegment>,
    pub actual_duration: f64,
    pub coverage_ratio: f64,
    /// Candidates available after filtering
    pub available_segments: usize,
    /// Mean quality score of the selected segments
    pub avg_quality: f64,
}

impl ModulePlan {
    /// Plan for a module with no candidates.
    pub fn empty(module: Module, target_duration: f64) -> Self {
        Self {
            module,
            target_duration,
            selected: Vec::new(),
            actual_duration: 0.0,
            coverage_ratio: 0.0,
            available_segments: 0,
            avg_quality: 0.0,
        }
    }

    /// Build a plan from selected segments, computing the aggregates.
    pub fn from_selected(
        module: Module,
        target_duration: f64,
        selected: Vec<SelectedSegment>,
        available_segments: usize,
    ) -> Self {
        let actual_duration: f64 = selected.iter().map(|s| s.effective_duration).sum();
        let coverage_ratio = if target_duration > 0.0 && !selected.is_empty() {
            actual_duration / target_duration
        } else {
            0.0
        };
        let avg_quality = if selected.is_empty() {
            0.0
        } else {
            selected.iter().map(|s| s.segment.quality_score()).sum::<f64>() / selected.len() as f64
        };

        Self {
            module,
            target_duration,
            selected,
            actual_duration,
            coverage_ratio,
            available_segments,
            avg_quality,
        }
    }

    pub fn segment_count(&self) -> usize {
        self.selected.len()
    }

    pub fn selected_ids(&self) -> Vec<String> {
        self.selected.iter().map(|s| s.id().to_string()).collect()
    }
}

/// Selection across all modules, in composition order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SelectionPlan {
    pub modules: Vec<ModulePlan>,
}

impl SelectionPlan {
    pub fn new(mut modules: Vec<ModulePlan>) -> Self {
        modules.sort_by_key(|p| p.module.order_index().unwrap_or(usize::MAX));
        Self { modules }
    }

    pub fn get(&self, module: Module) -> Option<&ModulePlan> {
        self.modules.iter().find(|p| p.module == module)
    }

    pub fn total_target(&self) -> f64 {
        self.modules.iter().map(|p| p.target_duration).sum()
    }

    pub fn total_actual(&self) -> f64 {
        self.modules.iter().map(|p| p.actual_duration).sum()
    }

    pub fn segment_count(&self) -> usize {
        self.modules.iter().map(|p| p.segment_count()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.segment_count() == 0
    }

    pub fn selected_ids(&self) -> Vec<String> {
        self.modules.iter().flat_map(|p| p.selected_ids()).collect()
    }

    /// All selected segments in composition order.
    pub fn all_selected(&self) -> impl Iterator<Item = &SelectedSegment> {
        self.modules.iter().flat_map(|p| p.selected.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_plan_coverage() {
        let plan = ModulePlan::empty(Module::Promotion, 15.0);
        assert_eq!(plan.coverage_ratio, 0.0);
        assert_eq!(plan.segment_count(), 0);
    }

    #[test]
    fn test_zero_target_has_zero_coverage() {
        let plan = ModulePlan::from_selected(Module::Promotion, 0.0, Vec::new(), 0);
        assert_eq!(plan.coverage_ratio, 0.0);
    }

    #[test]
    fn test_plan_sorted_in_module_order() {
        let plan = SelectionPlan::new(vec![
            ModulePlan::empty(Module::Promotion, 15.0),
            ModulePlan::empty(Module::PainPoint, 25.0),
        ]);
        assert_eq!(plan.modules[0].module, Module::PainPoint);
        assert_eq!(plan.total_target(), 40.0);
        assert!(plan.is_empty());
    }
}
