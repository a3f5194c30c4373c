//! Customer Service notification: an email-shaped JSON file carrying the
//! extracted invoice.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::error::NotificationError;
use crate::models::config::NotificationConfig;
use crate::models::email::{Attachment, Body};
use crate::models::invoice::{Invoice, ValidatedInvoice};
use crate::patterns::UNSAFE_FILENAME_CHARS;

/// Outbound `{"Message": ...}` document.
#[derive(Debug, Serialize)]
pub struct OutboundEmail<'a> {
    #[serde(rename = "Message")]
    pub message: OutboundMessage<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct OutboundMessage<'a> {
    pub subject: String,
    pub body: Body,
    pub from: Recipient,
    pub to_recipients: Vec<Recipient>,
    pub cc_recipients: Vec<Recipient>,
    pub attachments: Vec<Attachment>,
    pub invoice_payload: &'a Invoice,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Recipient {
    pub email_address: EmailAddress,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EmailAddress {
    pub name: String,
    pub address: String,
}

impl Recipient {
    fn new(name: &str, address: &str) -> Self {
        Self {
            email_address: EmailAddress {
                name: name.to_string(),
                address: address.to_string(),
            },
        }
    }
}

/// Writes one notification file per invoice into the outputs directory.
pub struct Notifier {
    outputs_dir: PathBuf,
    config: NotificationConfig,
}

impl Notifier {
    pub fn new(outputs_dir: impl Into<PathBuf>, config: NotificationConfig) -> Self {
        Self {
            outputs_dir: outputs_dir.into(),
            config,
        }
    }

    /// Build the outbound document for an invoice.
    pub fn compose<'a>(&self, invoice: &'a ValidatedInvoice) -> OutboundEmail<'a> {
        let number = &invoice.invoice_number;
        let summary = match invoice.summary.trim() {
            "" => "(no summary provided)",
            _ => invoice.summary.as_str(),
        };

        let content = format!(
            "Hello Customer Service team,\n\n\
             The Invoice Intake Agent has completed extraction for invoice {number}.\n\n\
             Summary:\n\
             {summary}\n\n\
             Structured invoice payload is included below.\n\n\
             Thanks,\n\
             Invoice Intake Agent\n"
        );

        OutboundEmail {
            message: OutboundMessage {
                subject: format!("Invoice Intake Agent: {} - Please process invoice", number),
                body: Body {
                    content_type: "Text".to_string(),
                    content,
                },
                from: Recipient::new(&self.config.from_name, &self.config.from_address),
                to_recipients: vec![Recipient::new(&self.config.to_name, &self.config.to_address)],
                cc_recipients: Vec::new(),
                attachments: Vec::new(),
                invoice_payload: invoice,
            },
        }
    }

    /// `<outputs_dir>/outbound_email_<invoice_number>.json`.
    pub fn output_path(&self, invoice_number: &str) -> PathBuf {
        let safe = UNSAFE_FILENAME_CHARS.replace_all(invoice_number.trim(), "_");
        self.outputs_dir.join(format!("outbound_email_{}.json", safe))
    }

    /// Write the notification, replacing any previous file for the same
    /// invoice number, and return its path.
    pub fn notify(&self, invoice: &ValidatedInvoice) -> Result<PathBuf, NotificationError> {
        create_dir(&self.outputs_dir)?;

        let path = self.output_path(&invoice.invoice_number);
        let json = serde_json::to_string_pretty(&self.compose(invoice))?;

        fs::write(&path, json).map_err(|e| NotificationError::Write {
            path: path.clone(),
            source: e,
        })?;

        info!("Notification written to {}", path.display());
        Ok(path)
    }
}

fn create_dir(dir: &Path) -> Result<(), NotificationError> {
    fs::create_dir_all(dir).map_err(|e| NotificationError::CreateDir {
        path: dir.to_path_buf(),
        source: e,
    })
}
