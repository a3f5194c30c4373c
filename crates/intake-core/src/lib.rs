//! Core library for email invoice intake.
//!
//! This crate provides:
//! - Email record loading and PDF attachment resolution
//! - PDF text extraction and page rendering
//! - A closed invoice schema with a validated typestate
//! - Single-shot structured extraction through a pluggable language model
//! - Customer Service notification files
//! - The guardrail → extract → notify run state machine

pub mod error;
pub mod extract;
pub mod guardrail;
pub mod llm;
pub mod models;
pub mod notify;
pub mod patterns;
pub mod pdf;
pub mod pipeline;

pub use error::{IntakeError, Result};
pub use extract::{ExtractionInput, InvoiceExtractor};
pub use guardrail::{Guardrail, GuardrailVerdict, ModelGuardrail};
pub use llm::{ContentPart, LanguageModel, ModelRequest, OpenAiClient, ResponseSchema};
pub use models::config::{IntakeConfig, LogLevel, RuntimeConfig};
pub use models::email::Email;
pub use models::invoice::{Invoice, LineItem, ValidatedInvoice};
pub use notify::Notifier;
pub use pdf::{DocumentRenderer, PdfRenderer};
pub use pipeline::{Delivery, NoopObserver, Pipeline, RunObserver, RunOutcome, RunState};
