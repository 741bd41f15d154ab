use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{multipart::Field, Multipart, Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::pipeline::{AnalysisMode, AnalysisPipeline, AnalysisRequest};
use crate::analysis::progress::{ProgressEvent, ProgressLog};
use crate::analysis::score::score_fraction;
use crate::errors::AppError;
use crate::ingest::extract_resume_text_blocking;
use crate::reports::ReportFormat;
use crate::state::AppState;

#[derive(Serialize)]
pub struct AnalyzeResponse {
    pub report_id: Uuid,
    pub mode: AnalysisMode,
    pub match_percentage: u32,
    /// `match_percentage` as a 0.0–1.0 fraction, capped at 1.0.
    pub match_fraction: f32,
    pub resume_analysis: String,
    pub jd_analysis: String,
    pub match_analysis: String,
    pub improvement_suggestions: String,
    pub final_report: String,
    pub pdf_available: bool,
    pub progress: Vec<ProgressEvent>,
    pub generated_at: DateTime<Utc>,
}

struct ResumeUpload {
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: Bytes,
}

#[derive(Default)]
struct AnalyzeForm {
    resume: Option<ResumeUpload>,
    job_description: Option<String>,
    api_key: Option<String>,
    mode: Option<String>,
}

async fn read_form(mut multipart: Multipart) -> Result<AnalyzeForm, AppError> {
    let mut form = AnalyzeForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "resume" => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(e.body_text()))?;
                form.resume = Some(ResumeUpload {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            "job_description" => form.job_description = Some(text_field(field).await?),
            "api_key" => form.api_key = Some(text_field(field).await?),
            "mode" => form.mode = Some(text_field(field).await?),
            other => warn!("Ignoring unexpected form field '{other}'"),
        }
    }

    Ok(form)
}

async fn text_field(field: Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::Validation(e.body_text()))
}

fn non_blank(value: Option<String>, message: &str) -> Result<String, AppError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AppError::Validation(message.to_string())),
    }
}

/// POST /api/v1/analyze
/// Multipart: `resume` (file), `job_description`, `api_key`, optional `mode`.
pub async fn handle_analyze(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let form = read_form(multipart).await?;

    let api_key = non_blank(form.api_key, "Please enter your Groq API key")?;
    let job_description_text =
        non_blank(form.job_description, "Please provide a job description")?;
    let resume = match form.resume {
        Some(upload) if !upload.bytes.is_empty() => upload,
        _ => return Err(AppError::Validation("Please upload your resume".to_string())),
    };
    let mode = match form.mode.as_deref().map(str::trim) {
        None | Some("") => state.config.analysis_mode,
        Some(raw) => raw.parse::<AnalysisMode>().map_err(AppError::Validation)?,
    };

    let resume_text =
        extract_resume_text_blocking(resume.file_name, resume.content_type, resume.bytes).await?;

    let report_id = Uuid::new_v4();
    info!("Starting {mode} analysis {report_id}");

    let progress = Arc::new(ProgressLog::new());
    let pipeline = AnalysisPipeline::new(state.transport.clone(), progress.clone(), mode)
        .with_max_retries(state.config.llm_max_retries);
    let request = AnalysisRequest {
        resume_text,
        job_description_text: job_description_text.trim().to_string(),
        api_key,
    };

    let result = pipeline.try_run(&request).await?;

    state
        .reports
        .save(
            report_id,
            ReportFormat::Markdown,
            result.final_report_markdown.as_bytes(),
        )
        .await
        .context("Failed to store Markdown report")?;

    let pdf_available = match state.pdf.render(&result.final_report_markdown).await {
        Ok(pdf) => {
            state
                .reports
                .save(report_id, ReportFormat::Pdf, &pdf)
                .await
                .context("Failed to store PDF report")?;
            true
        }
        Err(e) => {
            warn!("PDF unavailable for {report_id}: {e}");
            false
        }
    };

    let match_percentage = result.match_percentage();
    info!("Analysis {report_id} finished: {match_percentage}% match");

    Ok(Json(AnalyzeResponse {
        report_id,
        mode,
        match_percentage,
        match_fraction: score_fraction(match_percentage),
        resume_analysis: result.resume_analysis,
        jd_analysis: result.jd_analysis,
        match_analysis: result.match_analysis,
        improvement_suggestions: result.improvement_suggestions,
        final_report: result.final_report_markdown,
        pdf_available,
        progress: progress.events(),
        generated_at: Utc::now(),
    }))
}

/// GET /api/v1/reports/:id/markdown
pub async fn handle_download_markdown(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    download(&state, id, ReportFormat::Markdown).await
}

/// GET /api/v1/reports/:id/pdf
pub async fn handle_download_pdf(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    download(&state, id, ReportFormat::Pdf).await
}

async fn download(state: &AppState, id: Uuid, format: ReportFormat) -> Result<Response, AppError> {
    let bytes = state
        .reports
        .load(id, format)
        .await
        .context("Failed to read stored report")?
        .ok_or_else(|| AppError::NotFound(format!("No {} report for {id}", format.download_name())))?;

    let headers = [
        (header::CONTENT_TYPE, format.content_type().to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", format.download_name()),
        ),
    ];

    Ok((headers, bytes).into_response())
}
