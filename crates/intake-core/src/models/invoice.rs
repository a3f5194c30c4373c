//! Invoice data model filled in by the extraction model.
//!
//! The schema is closed: any key outside the declared set is rejected when
//! parsing, and absent optional values serialize as `null` or `[]` rather
//! than disappearing from the payload.

use std::ops::Deref;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};

use crate::error::ExtractionError;
use crate::patterns::{ISO_CURRENCY, ISO_DATE};

/// A single line item on the invoice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LineItem {
    /// Product code as printed.
    #[serde(default)]
    pub sku: Option<String>,

    /// Product/service description.
    #[serde(default)]
    pub description: Option<String>,

    /// Quantity.
    #[serde(default)]
    pub quantity: Option<i64>,

    /// Unit price.
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub unit_price: Option<Decimal>,

    /// Total amount for this line.
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub line_total: Option<Decimal>,

    /// Free-form notes attached to the line.
    #[serde(default)]
    pub notes: Option<String>,
}

/// An invoice as extracted from an inbound email and its PDF.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Invoice {
    /// Vendor (issuer) name.
    #[serde(default)]
    pub vendor_name: Option<String>,

    /// Invoice number/identifier. Often printed only in the rasterized
    /// page, never in the text layer.
    #[serde(deserialize_with = "null_as_default")]
    pub invoice_number: String,

    /// Issue date, `YYYY-MM-DD` when unambiguous, otherwise as printed.
    #[serde(default)]
    pub invoice_date: Option<String>,

    /// Payment due date.
    #[serde(default)]
    pub invoice_due_date: Option<String>,

    /// Payment terms (e.g. "Net 30").
    #[serde(default)]
    pub payment_terms: Option<String>,

    /// Currency code, ISO 4217 preferred.
    #[serde(default)]
    pub currency: Option<String>,

    /// Customer purchase order number.
    #[serde(default)]
    pub customer_po_number: Option<String>,

    /// Amount due.
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub total_due: Option<Decimal>,

    /// Subtotal before taxes.
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub subtotal: Option<Decimal>,

    /// Total taxes.
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub taxes: Option<Decimal>,

    /// Tax lines as printed (e.g. "GST 5%: 12.50").
    #[serde(default, deserialize_with = "null_as_default")]
    pub taxes_breakdown: Vec<String>,

    /// Line items in document order.
    #[serde(default, deserialize_with = "null_as_default")]
    pub line_items: Vec<LineItem>,

    /// Ship-to addresses.
    #[serde(default, deserialize_with = "null_as_default")]
    pub ship_to_locations: Vec<String>,

    /// Invoice-level notes.
    #[serde(default, deserialize_with = "null_as_default")]
    pub notes: Vec<String>,

    /// Bulleted synopsis for the Customer Service team.
    #[serde(deserialize_with = "null_as_default")]
    pub summary: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// An invoice whose invoice number has been checked.
///
/// Only [`Invoice::validate`] produces one, and it hands out read-only
/// access, so the notifier never sees an unchecked or modified invoice.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidatedInvoice(Invoice);

impl ValidatedInvoice {
    /// Unwrap the inner invoice.
    pub fn into_inner(self) -> Invoice {
        self.0
    }
}

impl Deref for ValidatedInvoice {
    type Target = Invoice;

    fn deref(&self) -> &Invoice {
        &self.0
    }
}

impl Invoice {
    /// Parse a model response, rejecting anything outside the schema.
    pub fn from_json(raw: &str) -> Result<Self, ExtractionError> {
        Ok(serde_json::from_str(raw.trim())?)
    }

    /// Enforce the invoice number invariant.
    pub fn validate(self) -> Result<ValidatedInvoice, ExtractionError> {
        if self.invoice_number.trim().is_empty() {
            return Err(ExtractionError::MissingInvoiceNumber);
        }
        Ok(ValidatedInvoice(self))
    }

    /// Review the invoice and return non-fatal issues worth a second look.
    pub fn warnings(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if let Some(currency) = &self.currency {
            if !ISO_CURRENCY.is_match(currency) {
                issues.push(format!("Currency '{}' is not an ISO 4217 code", currency));
            }
        }

        for (field, value) in [
            ("invoice_date", &self.invoice_date),
            ("invoice_due_date", &self.invoice_due_date),
        ] {
            if let Some(date) = value {
                if !is_iso_date(date) {
                    issues.push(format!("{} '{}' kept as printed (not YYYY-MM-DD)", field, date));
                }
            }
        }

        if self.summary.trim().is_empty() {
            issues.push("Missing summary".to_string());
        }

        let tolerance = Decimal::new(1, 2);

        for (i, item) in self.line_items.iter().enumerate() {
            if let (Some(qty), Some(price), Some(total)) =
                (item.quantity, item.unit_price, item.line_total)
            {
                let expected = price * Decimal::from(qty);
                if (expected - total).abs() > tolerance {
                    issues.push(format!(
                        "Line item {} total ({}) differs from quantity x unit price ({})",
                        i + 1,
                        total,
                        expected
                    ));
                }
            }
        }

        if let Some(subtotal) = self.subtotal {
            let totals: Vec<Decimal> = self.line_items.iter().filter_map(|i| i.line_total).collect();
            if !totals.is_empty() && totals.len() == self.line_items.len() {
                let calculated: Decimal = totals.iter().sum();
                if (calculated - subtotal).abs() > tolerance {
                    issues.push(format!(
                        "Line item total ({}) differs from subtotal ({})",
                        calculated, subtotal
                    ));
                }
            }
        }

        issues
    }

    /// Strict JSON Schema describing this structure, as sent to the model.
    pub fn json_schema() -> Value {
        let nullable_string = json!({ "type": ["string", "null"] });
        let nullable_number = json!({ "type": ["number", "null"] });
        let string_list = json!({ "type": ["array", "null"], "items": { "type": "string" } });

        let line_item = json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["sku", "description", "quantity", "unit_price", "line_total", "notes"],
            "properties": {
                "sku": nullable_string,
                "description": nullable_string,
                "quantity": { "type": ["integer", "null"] },
                "unit_price": nullable_number,
                "line_total": nullable_number,
                "notes": nullable_string
            }
        });

        json!({
            "type": "object",
            "additionalProperties": false,
            "required": [
                "vendor_name", "invoice_number", "invoice_date", "invoice_due_date",
                "payment_terms", "currency", "customer_po_number", "total_due",
                "subtotal", "taxes", "taxes_breakdown", "line_items",
                "ship_to_locations", "notes", "summary"
            ],
            "properties": {
                "vendor_name": nullable_string,
                "invoice_number": {
                    "type": "string",
                    "description": "Invoice number (required; may only be present in rasterized PDF images)"
                },
                "invoice_date": nullable_string,
                "invoice_due_date": nullable_string,
                "payment_terms": nullable_string,
                "currency": nullable_string,
                "customer_po_number": nullable_string,
                "total_due": nullable_number,
                "subtotal": nullable_number,
                "taxes": nullable_number,
                "taxes_breakdown": string_list,
                "line_items": { "type": ["array", "null"], "items": line_item },
                "ship_to_locations": string_list,
                "notes": string_list,
                "summary": {
                    "type": "string",
                    "description": "A human-readable bulleted summary of the most important information on the invoice, used in the outbound email."
                }
            }
        })
    }
}

fn is_iso_date(value: &str) -> bool {
    ISO_DATE.is_match(value) && NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}
