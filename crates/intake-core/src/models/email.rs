//! Inbound email record loaded from disk.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EmailLoadError;

/// Content type identifying the invoice attachment.
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Top-level `{"Message": ...}` envelope.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "Message")]
    message: Message,
}

/// The message fields the intake pipeline reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Message {
    /// Subject line.
    #[serde(default)]
    pub subject: String,

    /// Message body.
    #[serde(default)]
    pub body: Body,

    /// Attachments in the order they appear.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// Email body with its content type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Body {
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub content: String,
}

/// Attachment metadata. The file itself lives next to the email record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Attachment {
    pub content_type: String,
    pub name: String,
}

/// A loaded, read-only email.
#[derive(Debug, Clone)]
pub struct Email {
    message: Message,
    source_dir: PathBuf,
}

impl Email {
    /// Load an email record from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EmailLoadError> {
        let path = path.as_ref();

        let content = fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => EmailLoadError::NotFound(path.to_path_buf()),
            _ => EmailLoadError::Read {
                path: path.to_path_buf(),
                source: e,
            },
        })?;

        let envelope: Envelope =
            serde_json::from_str(&content).map_err(|e| EmailLoadError::Malformed {
                path: path.to_path_buf(),
                source: e,
            })?;

        let absolute = path.canonicalize().map_err(|e| EmailLoadError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let source_dir = absolute
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/"));

        debug!(
            "Loaded email '{}' with {} attachment(s) from {}",
            envelope.message.subject,
            envelope.message.attachments.len(),
            source_dir.display()
        );

        Ok(Self {
            message: envelope.message,
            source_dir,
        })
    }

    /// Subject line.
    pub fn subject(&self) -> &str {
        &self.message.subject
    }

    /// Body text.
    pub fn body(&self) -> &str {
        &self.message.body.content
    }

    /// Attachment metadata.
    pub fn attachments(&self) -> &[Attachment] {
        &self.message.attachments
    }

    /// Absolute directory the email was loaded from.
    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// Path of the first PDF attachment, resolved against the email's own
    /// directory rather than the working directory.
    pub fn pdf_path(&self) -> Result<PathBuf, EmailLoadError> {
        self.message
            .attachments
            .iter()
            .find(|a| a.content_type == PDF_CONTENT_TYPE)
            .map(|a| self.source_dir.join(&a.name))
            .ok_or(EmailLoadError::NoPdfAttachment)
    }
}
