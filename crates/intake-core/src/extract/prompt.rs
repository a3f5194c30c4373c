//! Instruction text for the invoice extraction model.

/// Field-by-field rules for the extraction model.
pub const EXTRACTION_INSTRUCTIONS: &str = "\
You extract invoice fields and return ONLY a JSON object matching the Invoice schema.
Rules:
- invoice_number is REQUIRED. It may only appear in the image(s); read the images carefully.
- If a field is not present, set it to null / empty list as appropriate.
- Prefer exact strings/numbers as printed on the invoice.
- Dates: prefer YYYY-MM-DD if clearly implied, otherwise preserve the original date string.
- Currency: prefer ISO 4217 codes like CAD, USD when visible.
- Line items: include at least sku/description/quantity/unit_price/line_total when present.
- Do not include extra keys.
- Generate a human-readable summary of the invoice, to be used in the outbound email. \
This should be a bulleted list of the most important information from the invoice.
";

/// Text part combining the email and the PDF text layer.
pub fn extraction_text(subject: &str, body: &str, pdf_text: &str) -> String {
    format!(
        "Extract the invoice data into the invoice schema.\n\n\
         Email Subject: {}\n\
         Email Body: {}\n\
         PDF Text: {}\n",
        subject, body, pdf_text
    )
}
