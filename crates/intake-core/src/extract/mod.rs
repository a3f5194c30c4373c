//! Invoice extraction: one model call over email text, PDF text and page images.

mod prompt;

pub use prompt::{EXTRACTION_INSTRUCTIONS, extraction_text};

use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, info};

use crate::error::{ExtractionError, Result};
use crate::llm::{ContentPart, LanguageModel, ModelRequest, ResponseSchema};
use crate::models::invoice::{Invoice, ValidatedInvoice};

/// Everything the extractor reads for one invoice.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionInput<'a> {
    pub subject: &'a str,
    pub body: &'a str,
    pub pdf_text: &'a str,
    pub image_paths: &'a [PathBuf],
}

/// Encode a PNG file as a `data:image/png;base64,...` URL.
pub fn image_data_url(path: &Path) -> std::result::Result<String, ExtractionError> {
    let data = fs::read(path).map_err(|e| ExtractionError::ImageRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(data)))
}

/// Extracts a validated [`Invoice`] with a single structured model call.
pub struct InvoiceExtractor<M> {
    model: M,
    model_name: String,
}

impl<M: LanguageModel> InvoiceExtractor<M> {
    pub fn new(model: M, model_name: impl Into<String>) -> Self {
        Self {
            model,
            model_name: model_name.into(),
        }
    }

    /// Build the request: instructions, one text part, then one image part
    /// per page in page order.
    pub fn build_request(
        &self,
        input: &ExtractionInput<'_>,
    ) -> std::result::Result<ModelRequest, ExtractionError> {
        let mut parts = vec![ContentPart::Text(extraction_text(
            input.subject,
            input.body,
            input.pdf_text,
        ))];

        for path in input.image_paths {
            parts.push(ContentPart::ImageUrl(image_data_url(path)?));
        }

        Ok(ModelRequest {
            model: self.model_name.clone(),
            instructions: EXTRACTION_INSTRUCTIONS.to_string(),
            parts,
            schema: ResponseSchema {
                name: "Invoice".to_string(),
                schema: Invoice::json_schema(),
            },
        })
    }

    /// Call the model exactly once, parse the response against the closed
    /// schema and enforce the invoice number invariant.
    pub async fn extract(
        &self,
        input: &ExtractionInput<'_>,
        on_delta: &mut (dyn FnMut(&str) + Send),
    ) -> Result<ValidatedInvoice> {
        let request = self.build_request(input)?;
        debug!(
            "Extraction request: {} chars of PDF text, {} image(s)",
            input.pdf_text.len(),
            request.image_count()
        );

        let raw = self.model.complete(&request, on_delta).await?;
        let invoice = Invoice::from_json(&raw)?.validate()?;

        info!("Extracted invoice {}", invoice.invoice_number);
        Ok(invoice)
    }
}
