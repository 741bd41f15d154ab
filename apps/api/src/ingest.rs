//! Resume text extraction from uploaded documents.
//!
//! PDFs go through `pdf-extract`; plain text and Markdown are read as UTF-8.
//! A document that yields no text is fatal to the run: the pipeline is never started.

use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("No text could be extracted from the uploaded resume")]
    NoText,

    #[error("Unsupported resume format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to read PDF: {0}")]
    Pdf(String),

    #[error("Resume text is not valid UTF-8")]
    InvalidUtf8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    PlainText,
}

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Decides how to read an upload from its bytes, file name and declared content type.
/// The PDF magic number wins over whatever the client claimed.
pub fn detect_kind(
    file_name: Option<&str>,
    content_type: Option<&str>,
    bytes: &[u8],
) -> Result<DocumentKind, ExtractionError> {
    if bytes.starts_with(PDF_MAGIC) {
        return Ok(DocumentKind::Pdf);
    }

    let extension = file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());

    match (extension.as_deref(), content_type) {
        (Some("pdf"), _) | (_, Some("application/pdf")) => Ok(DocumentKind::Pdf),
        (Some("txt" | "md" | "markdown"), _) => Ok(DocumentKind::PlainText),
        (_, Some(ct)) if ct.starts_with("text/") => Ok(DocumentKind::PlainText),
        _ => Err(ExtractionError::UnsupportedFormat(
            file_name
                .or(content_type)
                .unwrap_or("unknown")
                .to_string(),
        )),
    }
}

/// Extracts raw resume text. Blocking: PDF parsing is CPU-bound, so async
/// callers should go through `extract_resume_text_blocking`.
pub fn extract_resume_text(
    file_name: Option<&str>,
    content_type: Option<&str>,
    bytes: &[u8],
) -> Result<String, ExtractionError> {
    let kind = detect_kind(file_name, content_type, bytes)?;
    debug!("Extracting {:?} resume ({} bytes)", kind, bytes.len());

    let text = match kind {
        DocumentKind::Pdf => pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| ExtractionError::Pdf(format!("{e:?}")))?,
        DocumentKind::PlainText => std::str::from_utf8(bytes)
            .map_err(|_| ExtractionError::InvalidUtf8)?
            .to_string(),
    };

    let text = text.trim();
    if text.is_empty() {
        return Err(ExtractionError::NoText);
    }

    Ok(text.to_string())
}

/// Runs `extract_resume_text` on the blocking pool. A panic inside the PDF
/// parser is reported as a PDF error instead of tearing down the request.
pub async fn extract_resume_text_blocking(
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: bytes::Bytes,
) -> Result<String, ExtractionError> {
    tokio::task::spawn_blocking(move || {
        extract_resume_text(file_name.as_deref(), content_type.as_deref(), &bytes)
    })
    .await
    .unwrap_or_else(|join_err| {
        warn!("Resume extraction task failed: {join_err}");
        Err(ExtractionError::Pdf("parser crashed on this document".to_string()))
    })
}
