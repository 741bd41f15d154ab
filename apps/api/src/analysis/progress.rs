//! Progress notifications emitted by the LLM client and the pipeline.
//!
//! The pipeline never talks to a display directly. Whatever hosts a run
//! (HTTP handler, test) hands in a `ProgressSink` and decides what to show.

use std::sync::Mutex;

use serde::Serialize;
use tracing::{info, warn};

use crate::analysis::pipeline::PipelineStage;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    StageStarted {
        stage: PipelineStage,
    },
    StageCompleted {
        stage: PipelineStage,
    },
    CooldownStarted {
        secs: f64,
    },
    RetryScheduled {
        attempt: u32,
        max_retries: u32,
        wait_secs: f64,
    },
    RunCompleted,
    RunFailed {
        stage: PipelineStage,
        message: String,
    },
}

pub trait ProgressSink: Send + Sync {
    fn notify(&self, event: ProgressEvent);
}

/// Request-scoped collector. Writes every event to the tracing log and keeps
/// them so they can be returned to the caller once the run ends.
#[derive(Default)]
pub struct ProgressLog {
    events: Mutex<Vec<ProgressEvent>>,
}

impl ProgressLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl ProgressSink for ProgressLog {
    fn notify(&self, event: ProgressEvent) {
        log_event(&event);
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

fn log_event(event: &ProgressEvent) {
    match event {
        ProgressEvent::StageStarted { stage } => info!("{}...", stage.label()),
        ProgressEvent::StageCompleted { stage } => info!("{} done", stage.label()),
        ProgressEvent::CooldownStarted { secs } => {
            info!("Waiting {secs:.0}s before the next call to ease rate limits")
        }
        ProgressEvent::RetryScheduled {
            attempt,
            max_retries,
            wait_secs,
        } => warn!(
            "Rate limit hit. Retrying in {wait_secs:.2} seconds... (Attempt {attempt}/{max_retries})"
        ),
        ProgressEvent::RunCompleted => info!("Analysis complete"),
        ProgressEvent::RunFailed { stage, message } => {
            warn!("Analysis failed while {}: {message}", stage.label())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_log_keeps_events_in_order() {
        let log = ProgressLog::new();
        log.notify(ProgressEvent::StageStarted {
            stage: PipelineStage::ParsingResume,
        });
        log.notify(ProgressEvent::RunCompleted);

        assert_eq!(
            log.events(),
            vec![
                ProgressEvent::StageStarted {
                    stage: PipelineStage::ParsingResume
                },
                ProgressEvent::RunCompleted,
            ]
        );
    }

    #[test]
    fn test_progress_event_serializes_with_tag() {
        let json = serde_json::to_value(ProgressEvent::RetryScheduled {
            attempt: 2,
            max_retries: 5,
            wait_secs: 3.5,
        })
        .unwrap();

        assert_eq!(json["event"], "retry_scheduled");
        assert_eq!(json["attempt"], 2);
        assert_eq!(json["max_retries"], 5);
    }

    #[test]
    fn test_stage_serializes_snake_case() {
        let json = serde_json::to_value(ProgressEvent::StageCompleted {
            stage: PipelineStage::ComputingMatch,
        })
        .unwrap();
        assert_eq!(json["stage"], "computing_match");
    }
}
