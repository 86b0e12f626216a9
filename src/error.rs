//! Error types for the docgrade library.
//!
//! Every fatal failure of a grading request is a [`GradeError`]. Each variant
//! corresponds to one terminal outcome of the pipeline; nothing is retried.
//!
//! Failing to delete a scratch file is deliberately *not* a variant: it is
//! logged by [`crate::pipeline::upload::ScratchFile`] and never replaces the
//! primary result of a request.
//!
//! [`GradeError::status`] gives the HTTP status the server answers with:
//! `400` for problems with what the caller sent, `500` for everything that
//! went wrong after the upload was accepted.

use std::path::PathBuf;
use thiserror::Error;

/// HTTP status code, kept as a plain integer so the library core does not
/// depend on the web framework's types.
pub type StatusCode = u16;

/// All fatal errors returned by the docgrade library.
#[derive(Debug, Error)]
pub enum GradeError {
    // ── Request errors ────────────────────────────────────────────────────
    /// The multipart form had no `file` part.
    #[error("No file uploaded. Attach the document in the 'file' field.")]
    MissingFile,

    /// Strict mode is on and some mandatory text fields were blank.
    #[error("Missing required fields: {}", fields.join(", "))]
    MissingFields { fields: Vec<&'static str> },

    /// The multipart body could not be read.
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// The request body exceeded the configured upload limit.
    #[error("Upload exceeds the {limit} byte limit")]
    UploadTooLarge { limit: usize },

    /// The uploaded file's extension is neither `pdf` nor `docx`.
    #[error("Unsupported file type '{extension}'. Upload a PDF or DOCX document.")]
    UnsupportedFileType { extension: String },

    // ── Document errors ───────────────────────────────────────────────────
    /// The decoder rejected the document outright.
    #[error("Failed to read {kind} document: {detail}")]
    ExtractionFailed { kind: &'static str, detail: String },

    /// Text extraction produced fewer characters than the minimum.
    #[error(
        "The document is empty or unreadable: extracted {chars} characters, at least {min} required"
    )]
    EmptyOrUnreadableDocument { chars: usize, min: usize },

    // ── Model errors ──────────────────────────────────────────────────────
    /// No API key configured for the selected provider.
    #[error("No API key configured for provider '{provider}'.\nSet API_KEY or pass --api-key.")]
    MissingCredential { provider: String },

    /// The model endpoint answered with a non-success status.
    #[error("Model API returned HTTP {status}: {body}")]
    UpstreamError { status: u16, body: String },

    /// The model endpoint could not be reached at all.
    #[error("Model API unreachable at '{url}': {reason}")]
    UpstreamUnreachable { url: String, reason: String },

    /// The model answered successfully but without any reply text.
    #[error("Model response contained no content")]
    NoContent,

    /// The reply did not contain a usable evaluation object.
    #[error("Invalid model response: {0}")]
    InvalidModelResponse(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Creating the scratch directory or writing the scratch file failed.
    #[error("Scratch storage error at '{path}': {source}")]
    Scratch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GradeError {
    /// HTTP status the server returns for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            GradeError::MissingFile
            | GradeError::MissingFields { .. }
            | GradeError::MalformedRequest(_)
            | GradeError::UnsupportedFileType { .. } => 400,
            GradeError::UploadTooLarge { .. } => 413,
            _ => 500,
        }
    }

    /// Whether the error was caused by the caller's input.
    pub fn is_client_error(&self) -> bool {
        self.status() < 500
    }
}
