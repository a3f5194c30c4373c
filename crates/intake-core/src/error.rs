//! Error types for the intake-core library.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the intake library.
#[derive(Error, Debug)]
pub enum IntakeError {
    /// Inbound email could not be loaded.
    #[error("email error: {0}")]
    Email(#[from] EmailLoadError),

    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// Model invocation error.
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// Invoice extraction error.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Notification could not be written.
    #[error("notification error: {0}")]
    Notification(#[from] NotificationError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors related to loading the inbound email record.
#[derive(Error, Debug)]
pub enum EmailLoadError {
    /// The email file does not exist.
    #[error("email file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The email file exists but could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The email file is not a `{"Message": ...}` JSON document.
    #[error("malformed email {}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// No attachment has content type `application/pdf`.
    #[error("no PDF attachment found in email")]
    NoPdfAttachment,

    /// The PDF attachment is listed but not present next to the email.
    #[error("PDF attachment not found: {}", .0.display())]
    AttachmentMissing(PathBuf),
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to extract text from PDF.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// Failed to render pages to images.
    #[error("failed to render pages: {0}")]
    Render(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// I/O error while reading the PDF or writing page images.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while talking to a language model.
#[derive(Error, Debug)]
pub enum ModelError {
    /// The API key environment variable is unset or empty.
    #[error("{0} is not set")]
    MissingApiKey(String),

    /// Transport failure.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("model endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The streamed response could not be decoded.
    #[error("invalid response stream: {0}")]
    Stream(String),

    /// The model finished without producing any content.
    #[error("model returned an empty response")]
    EmptyResponse,

    /// The guardrail verdict could not be parsed.
    #[error("invalid guardrail verdict: {0}")]
    Guardrail(String),
}

/// Errors related to invoice extraction.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// The model output does not fit the closed invoice schema.
    #[error("model output does not match the invoice schema: {0}")]
    Schema(#[from] serde_json::Error),

    /// The invoice number is missing or blank.
    #[error(
        "invoice number is required but was not extracted; \
         verify that the PDF pages are rendered to images correctly"
    )]
    MissingInvoiceNumber,

    /// A rendered page image could not be read for embedding.
    #[error("failed to read page image {}: {source}", path.display())]
    ImageRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The model call did not finish in time.
    #[error("extraction timed out after {0}s")]
    Timeout(u64),
}

/// Errors related to writing the Customer Service notification.
#[derive(Error, Debug)]
pub enum NotificationError {
    /// The output directory could not be created.
    #[error("failed to create {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The notification file could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The payload could not be serialized.
    #[error("failed to serialize notification: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type for the intake library.
pub type Result<T> = std::result::Result<T, IntakeError>;
