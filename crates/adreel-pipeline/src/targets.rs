//! Per-module duration targets.
//!
//! Targets come either from module ratios applied to a total duration or
//! from a time-annotated reference transcript (SRT).

use adreel_models::Module;
use regex::Regex;
use serde::Serialize;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::classifier::SegmentClassifier;
use crate::error::{PipelineError, PipelineResult};

/// Start and end used when an SRT timestamp line cannot be read.
const FALLBACK_SPAN: (f64, f64) = (0.0, 3.0);

/// Target duration per module, in [`Module::ORDERED`] order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModuleTargets {
    durations: [f64; 4],
}

impl ModuleTargets {
    pub fn get(&self, module: Module) -> f64 {
        module
            .order_index()
            .map(|i| self.durations[i])
            .unwrap_or(0.0)
    }

    fn add(&mut self, module: Module, seconds: f64) {
        if let Some(i) = module.order_index() {
            self.durations[i] += seconds;
        }
    }

    pub fn total(&self) -> f64 {
        self.durations.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Module, f64)> + '_ {
        Module::ORDERED.into_iter().zip(self.durations.iter().copied())
    }
}

/// `target_m = ratio_m / sum(ratios) * total`.
pub fn targets_from_ratios(ratios: &[f64], total_duration: f64) -> PipelineResult<ModuleTargets> {
    if ratios.len() != Module::ORDERED.len() {
        return Err(PipelineError::configuration(format!(
            "expected {} module ratios, got {}",
            Module::ORDERED.len(),
            ratios.len()
        )));
    }
    if ratios.iter().any(|r| !r.is_finite() || *r < 0.0) {
        return Err(PipelineError::configuration(
            "module ratios must be finite and non-negative",
        ));
    }
    let sum: f64 = ratios.iter().sum();
    if sum <= 0.0 {
        return Err(PipelineError::configuration("module ratios must have a positive sum"));
    }
    if !total_duration.is_finite() || total_duration <= 0.0 {
        return Err(PipelineError::configuration(format!(
            "total duration must be positive, got {}",
            total_duration
        )));
    }

    let mut targets = ModuleTargets::default();
    for (module, ratio) in Module::ORDERED.iter().zip(ratios) {
        targets.add(*module, ratio / sum * total_duration);
    }
    Ok(targets)
}

/// Parse a comma-separated ratio list such as `25,28,32,15`.
pub fn parse_ratios(value: &str) -> PipelineResult<Vec<f64>> {
    value
        .split([',', '，', ':'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .map_err(|_| PipelineError::configuration(format!("invalid ratio '{}'", s)))
        })
        .collect()
}

/// One subtitle block.
#[derive(Debug, Clone, PartialEq)]
pub struct SrtEntry {
    pub index: usize,
    pub start: f64,
    pub end: f64,
    pub text: String,
    pub duration: f64,
}

static TIMESTAMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(\d+):(\d{1,2}):(\d{1,2})[,.](\d{1,3})\s*-->\s*(\d+):(\d{1,2}):(\d{1,2})[,.](\d{1,3})",
    )
    .unwrap()
});

static ANNOTATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:\[([^\]]+)\]|【([^】]+)】)\s*").unwrap());

fn seconds(caps: &regex::Captures<'_>, first: usize) -> f64 {
    let part = |i: usize| -> f64 {
        caps.get(first + i)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .unwrap_or(0.0)
    };
    let millis = caps
        .get(first + 3)
        .map(|m| {
            let digits = m.as_str();
            let value = digits.parse::<f64>().unwrap_or(0.0);
            value / 10f64.powi(digits.len() as i32)
        })
        .unwrap_or(0.0);
    part(0) * 3600.0 + part(1) * 60.0 + part(2) + millis
}

/// Parse `start --> end`, falling back to `(0, 3)`.
pub fn parse_timestamp_line(line: &str) -> (f64, f64) {
    match TIMESTAMP_RE.captures(line) {
        Some(caps) => {
            let start = seconds(&caps, 1);
            let end = seconds(&caps, 5);
            if end > start {
                (start, end)
            } else {
                FALLBACK_SPAN
            }
        }
        None => FALLBACK_SPAN,
    }
}

/// Parse SRT text into entries. Blocks without text are dropped.
pub fn parse_srt(content: &str) -> Vec<SrtEntry> {
    let normalized = content.replace("\r\n", "\n").replace('\u{feff}', "");
    let mut entries = Vec::new();

    for (position, block) in normalized.split("\n\n").enumerate() {
        let lines: Vec<&str> = block
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        if lines.is_empty() {
            continue;
        }

        let (index, rest) = match lines[0].parse::<usize>() {
            Ok(i) => (i, &lines[1..]),
            Err(_) => (position + 1, &lines[..]),
        };
        let Some((time_line, text_lines)) = rest.split_first() else {
            continue;
        };
        let (start, end, text_lines) = if time_line.contains("-->") {
            let (start, end) = parse_timestamp_line(time_line);
            (start, end, text_lines)
        } else {
            warn!(index, "SRT block without timestamp line");
            (FALLBACK_SPAN.0, FALLBACK_SPAN.1, rest)
        };

        let text = text_lines.join(" ");
        if text.trim().is_empty() {
            continue;
        }
        entries.push(SrtEntry {
            index,
            start,
            end,
            text,
            duration: end - start,
        });
    }
    entries
}

/// Explicit `[模块]` / `【模块】` annotation at the start of an entry.
pub fn module_annotation(text: &str) -> Option<Module> {
    let caps = ANNOTATION_RE.captures(text)?;
    let name = caps.get(1).or_else(|| caps.get(2))?.as_str().trim();
    Module::from_name(name).or_else(|| Module::from_reply(name))
}

/// Sum entry durations per module.
pub fn targets_from_srt(entries: &[SrtEntry], classifier: &SegmentClassifier) -> ModuleTargets {
    let mut targets = ModuleTargets::default();
    for entry in entries {
        let module = module_annotation(&entry.text).or_else(|| classifier.module_for_text(&entry.text));
        match module {
            Some(m) if m != Module::Other => targets.add(m, entry.duration),
            _ => debug!(index = entry.index, "SRT entry mapped to no module"),
        }
    }
    targets
}

/// Read and map a reference SRT file.
pub async fn targets_from_srt_file(
    path: &Path,
    classifier: &SegmentClassifier,
) -> PipelineResult<ModuleTargets> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        PipelineError::configuration(format!("cannot read reference SRT {}: {}", path.display(), e))
    })?;
    let entries = parse_srt(&content);
    if entries.is_empty() {
        return Err(PipelineError::configuration(format!(
            "reference SRT {} has no entries",
            path.display()
        )));
    }

    let targets = targets_from_srt(&entries, classifier);
    if targets.total() <= 0.0 {
        return Err(PipelineError::configuration(
            "no reference SRT entry could be mapped to a module",
        ));
    }
    Ok(targets)
}
