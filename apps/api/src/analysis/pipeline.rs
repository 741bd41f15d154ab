//! Analysis pipeline. Drives the LLM client through the staged prompt chain.
//!
//! Flow (full mode): ParsingResume → ParsingJobDescription → ComputingMatch →
//!       GeneratingRecommendations → Done, with a fixed cooldown before every
//!       call after the first. Each stage's prompt embeds every earlier stage's output.
//!
//! Simplified mode skips the chain and asks for the whole report in one call.
//!
//! Success is all-or-nothing: any stage failure discards completed stages.
//! Rate-limit retries happen inside `LlmClient`, never here.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::analysis::progress::{ProgressEvent, ProgressSink};
use crate::analysis::prompts::{
    fill_template, COMBINED_PROMPT_TEMPLATE, COMBINED_SYSTEM, IMPROVEMENT_PROMPT_TEMPLATE,
    IMPROVEMENT_SYSTEM, JD_PARSE_PROMPT_TEMPLATE, JD_PARSE_SYSTEM, MATCH_PROMPT_TEMPLATE,
    MATCH_SYSTEM, RESUME_PARSE_PROMPT_TEMPLATE, RESUME_PARSE_SYSTEM,
};
use crate::analysis::report::assemble_report;
use crate::analysis::score::extract_match_percentage;
use crate::llm_client::prompts::with_output_rules;
use crate::llm_client::{ChatTransport, LlmClient, LlmError, DEFAULT_MAX_RETRIES};

/// Pause before every call after the first, to ease pressure on the rate limiter.
pub const STAGE_COOLDOWN: Duration = Duration::from_secs(2);

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    /// Four dependent calls, one per stage.
    #[default]
    Full,
    /// One combined call. Shallower, but only one exposure to rate limiting.
    Simplified,
}

impl FromStr for AnalysisMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(AnalysisMode::Full),
            "simplified" | "simple" => Ok(AnalysisMode::Simplified),
            other => Err(format!(
                "unknown analysis mode '{other}' (expected 'full' or 'simplified')"
            )),
        }
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisMode::Full => f.write_str("full"),
            AnalysisMode::Simplified => f.write_str("simplified"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Idle,
    ParsingResume,
    ParsingJobDescription,
    ComputingMatch,
    GeneratingRecommendations,
    /// Simplified mode's single call.
    CombinedAnalysis,
    Done,
    Errored,
}

impl PipelineStage {
    pub fn label(&self) -> &'static str {
        match self {
            PipelineStage::Idle => "Waiting to start",
            PipelineStage::ParsingResume => "Parsing resume",
            PipelineStage::ParsingJobDescription => "Parsing job description",
            PipelineStage::ComputingMatch => "Computing match",
            PipelineStage::GeneratingRecommendations => "Generating recommendations",
            PipelineStage::CombinedAnalysis => "Running combined analysis",
            PipelineStage::Done => "Finished",
            PipelineStage::Errored => "Failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineStage::Done | PipelineStage::Errored)
    }

    /// Full-mode transition table. A failed stage lands in `Errored`;
    /// `Done` and `Errored` absorb every further step.
    pub fn next(self, succeeded: bool) -> PipelineStage {
        match (self, succeeded) {
            (PipelineStage::Done, _) => PipelineStage::Done,
            (PipelineStage::Errored, _) | (_, false) => PipelineStage::Errored,
            (PipelineStage::Idle, true) => PipelineStage::ParsingResume,
            (PipelineStage::ParsingResume, true) => PipelineStage::ParsingJobDescription,
            (PipelineStage::ParsingJobDescription, true) => PipelineStage::ComputingMatch,
            (PipelineStage::ComputingMatch, true) => PipelineStage::GeneratingRecommendations,
            (PipelineStage::GeneratingRecommendations | PipelineStage::CombinedAnalysis, true) => {
                PipelineStage::Done
            }
        }
    }
}

/// Inputs for one user-initiated run. Dropped when the run ends.
#[derive(Clone)]
pub struct AnalysisRequest {
    pub resume_text: String,
    pub job_description_text: String,
    pub api_key: String,
}

impl fmt::Debug for AnalysisRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisRequest")
            .field("resume_text", &format_args!("<{} chars>", self.resume_text.len()))
            .field(
                "job_description_text",
                &format_args!("<{} chars>", self.job_description_text.len()),
            )
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Output of a run. Every field is empty when the run failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineResult {
    pub resume_analysis: String,
    pub jd_analysis: String,
    pub match_analysis: String,
    pub improvement_suggestions: String,
    pub final_report_markdown: String,
}

impl PipelineResult {
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.final_report_markdown.is_empty()
    }

    /// Match percentage read from `match_analysis`. See `score` for the heuristic.
    pub fn match_percentage(&self) -> u32 {
        extract_match_percentage(&self.match_analysis)
    }
}

#[derive(Debug, Error)]
#[error("{} failed: {source}", .stage.label())]
pub struct PipelineError {
    pub stage: PipelineStage,
    #[source]
    pub source: LlmError,
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline
// ────────────────────────────────────────────────────────────────────────────

pub struct AnalysisPipeline {
    transport: Arc<dyn ChatTransport>,
    progress: Arc<dyn ProgressSink>,
    mode: AnalysisMode,
    max_retries: u32,
}

impl AnalysisPipeline {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        progress: Arc<dyn ProgressSink>,
        mode: AnalysisMode,
    ) -> Self {
        Self {
            transport,
            progress,
            mode,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Rate-limit retry ceiling handed to each run's `LlmClient`.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Runs to completion and returns the all-empty result on any failure.
    #[cfg(test)]
    pub async fn run(&self, request: &AnalysisRequest) -> PipelineResult {
        self.try_run(request).await.unwrap_or_default()
    }

    /// Runs to completion, keeping the failed stage and cause for the caller.
    pub async fn try_run(&self, request: &AnalysisRequest) -> Result<PipelineResult, PipelineError> {
        info!("Starting {} analysis: {:?}", self.mode, request);

        let llm = LlmClient::new(
            self.transport.clone(),
            request.api_key.clone(),
            self.progress.clone(),
        )
        .with_max_retries(self.max_retries);

        let outcome = match self.mode {
            AnalysisMode::Full => self.run_full(&llm, request).await,
            AnalysisMode::Simplified => self.run_simplified(&llm, request).await,
        };

        match &outcome {
            Ok(_) => self.progress.notify(ProgressEvent::RunCompleted),
            Err(e) => {
                error!("Analysis aborted: {e}");
                self.progress.notify(ProgressEvent::RunFailed {
                    stage: e.stage,
                    message: e.source.to_string(),
                });
            }
        }

        outcome
    }

    /// The four-stage state machine. `result` is owned by this run, filled one
    /// stage at a time, and only handed back once the machine reaches `Done`.
    async fn run_full(
        &self,
        llm: &LlmClient,
        request: &AnalysisRequest,
    ) -> Result<PipelineResult, PipelineError> {
        let mut result = PipelineResult::default();
        let mut stage = PipelineStage::Idle;
        let mut failure = None;

        while !stage.is_terminal() {
            let outcome = self.execute(llm, stage, request, &mut result).await;
            let next = stage.next(outcome.is_ok());
            debug!("{stage:?} -> {next:?}");
            if let Err(e) = outcome {
                failure = Some(e);
            }
            stage = next;
        }

        if let Some(e) = failure {
            return Err(e);
        }

        result.final_report_markdown = assemble_report(
            &result.match_analysis,
            &result.resume_analysis,
            &result.jd_analysis,
            &result.improvement_suggestions,
        );
        info!(
            "Analysis finished: {}% match, report {} chars",
            result.match_percentage(),
            result.final_report_markdown.len()
        );
        Ok(result)
    }

    /// Does the work of `stage`, storing its output in `result`.
    async fn execute(
        &self,
        llm: &LlmClient,
        stage: PipelineStage,
        request: &AnalysisRequest,
        result: &mut PipelineResult,
    ) -> Result<(), PipelineError> {
        match stage {
            PipelineStage::ParsingResume => {
                let prompt = fill_template(
                    RESUME_PARSE_PROMPT_TEMPLATE,
                    &[("resume_text", request.resume_text.as_str())],
                );
                result.resume_analysis = self
                    .call_stage(llm, stage, RESUME_PARSE_SYSTEM, &prompt)
                    .await?;
            }

            PipelineStage::ParsingJobDescription => {
                self.cooldown().await;
                let prompt = fill_template(
                    JD_PARSE_PROMPT_TEMPLATE,
                    &[("jd_text", request.job_description_text.as_str())],
                );
                result.jd_analysis = self.call_stage(llm, stage, JD_PARSE_SYSTEM, &prompt).await?;
            }

            PipelineStage::ComputingMatch => {
                self.cooldown().await;
                let prompt = fill_template(
                    MATCH_PROMPT_TEMPLATE,
                    &[
                        ("resume_analysis", result.resume_analysis.as_str()),
                        ("jd_analysis", result.jd_analysis.as_str()),
                    ],
                );
                result.match_analysis = self.call_stage(llm, stage, MATCH_SYSTEM, &prompt).await?;
            }

            PipelineStage::GeneratingRecommendations => {
                self.cooldown().await;
                let prompt = fill_template(
                    IMPROVEMENT_PROMPT_TEMPLATE,
                    &[
                        ("resume_analysis", result.resume_analysis.as_str()),
                        ("jd_analysis", result.jd_analysis.as_str()),
                        ("match_analysis", result.match_analysis.as_str()),
                    ],
                );
                result.improvement_suggestions = self
                    .call_stage(llm, stage, IMPROVEMENT_SYSTEM, &prompt)
                    .await?;
            }

            // No work of their own.
            PipelineStage::Idle
            | PipelineStage::CombinedAnalysis
            | PipelineStage::Done
            | PipelineStage::Errored => {}
        }

        Ok(())
    }

    async fn run_simplified(
        &self,
        llm: &LlmClient,
        request: &AnalysisRequest,
    ) -> Result<PipelineResult, PipelineError> {
        let prompt = fill_template(
            COMBINED_PROMPT_TEMPLATE,
            &[
                ("resume_text", request.resume_text.as_str()),
                ("jd_text", request.job_description_text.as_str()),
            ],
        );

        let report = self
            .call_stage(llm, PipelineStage::CombinedAnalysis, COMBINED_SYSTEM, &prompt)
            .await?;
        let percentage = extract_match_percentage(&report);

        Ok(PipelineResult {
            match_analysis: format!("Overall match: {percentage}%"),
            final_report_markdown: report,
            ..PipelineResult::default()
        })
    }

    async fn call_stage(
        &self,
        llm: &LlmClient,
        stage: PipelineStage,
        system: &str,
        prompt: &str,
    ) -> Result<String, PipelineError> {
        self.progress.notify(ProgressEvent::StageStarted { stage });

        let output = llm
            .generate(&with_output_rules(system), prompt)
            .await
            .map_err(|source| PipelineError { stage, source })?;

        self.progress.notify(ProgressEvent::StageCompleted { stage });
        Ok(output)
    }

    async fn cooldown(&self) {
        self.progress.notify(ProgressEvent::CooldownStarted {
            secs: STAGE_COOLDOWN.as_secs_f64(),
        });
        tokio::time::sleep(STAGE_COOLDOWN).await;
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
