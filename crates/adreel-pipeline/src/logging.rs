//! Structured run logging utilities.
//!
//! Every composition run gets a [`RunLogger`] carrying the run id and the
//! current stage, so log lines from one run can be filtered together.

use tracing::{error, info, warn, Span};
use uuid::Uuid;

/// Run logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: Uuid,
    stage: String,
}

impl RunLogger {
    pub fn new(run_id: Uuid, stage: &str) -> Self {
        Self {
            run_id,
            stage: stage.to_string(),
        }
    }

    /// Same run, different stage.
    pub fn for_stage(&self, stage: &str) -> Self {
        Self::new(self.run_id, stage)
    }

    pub fn log_start(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            stage = %self.stage,
            "Stage started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            stage = %self.stage,
            "Stage progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            run_id = %self.run_id,
            stage = %self.stage,
            "Stage warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            run_id = %self.run_id,
            stage = %self.stage,
            "Stage error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            stage = %self.stage,
            "Stage completed: {}", message
        );
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Span covering the whole run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("composition", run_id = %self.run_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_logger_stages_share_run_id() {
        let run_id = Uuid::new_v4();
        let logger = RunLogger::new(run_id, "analyze");
        let next = logger.for_stage("select");

        assert_eq!(next.run_id(), run_id);
        assert_eq!(logger.stage(), "analyze");
        assert_eq!(next.stage(), "select");
    }
}
