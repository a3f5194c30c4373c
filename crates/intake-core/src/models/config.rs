//! Configuration structures for the intake pipeline.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{IntakeError, Result};

/// Main configuration for the intake pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    /// Input and output locations.
    pub paths: PathConfig,

    /// Model endpoint configuration.
    pub model: ModelConfig,

    /// PDF rendering configuration.
    pub render: RenderConfig,

    /// Outbound notification addressing.
    pub notification: NotificationConfig,
}

/// Input and output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Inbound email record.
    pub email: PathBuf,

    /// Directory receiving notification files.
    pub outputs_dir: PathBuf,

    /// Directory receiving per-run page images.
    pub artifacts_dir: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            email: PathBuf::from("inputs/Email.json"),
            outputs_dir: PathBuf::from("outputs"),
            artifacts_dir: PathBuf::from("outputs/artifacts"),
        }
    }
}

/// Model endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Base URL of an OpenAI-compatible API.
    pub base_url: String,

    /// Model used for invoice extraction (must accept images).
    pub extraction_model: String,

    /// Model used for the input guardrail.
    pub guardrail_model: String,

    /// Environment variable holding the API key.
    pub api_key_env: String,

    /// Upper bound on the extraction call, in seconds.
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            extraction_model: "gpt-5-mini".to_string(),
            guardrail_model: "gpt-5-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 300,
        }
    }
}

/// How PDF pages are turned into images.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderBackend {
    /// Rasterize full pages with poppler's `pdftoppm`.
    #[default]
    Pdftoppm,
    /// Decode the images embedded in each page.
    Embedded,
}

/// PDF rendering configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Rendering backend.
    pub backend: RenderBackend,

    /// DPI for rasterizing pages.
    pub dpi: u32,

    /// Maximum pages to render (0 = unlimited).
    pub max_pages: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            backend: RenderBackend::Pdftoppm,
            dpi: 200,
            max_pages: 0,
        }
    }
}

/// Sender and recipient of the Customer Service notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub from_name: String,
    pub from_address: String,
    pub to_name: String,
    pub to_address: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            from_name: "Invoice Intake Agent".to_string(),
            from_address: "invoice.intake.agent@yourcompany.example".to_string(),
            to_name: "Customer Service".to_string(),
            to_address: "customer.service@yourcompany.example".to_string(),
        }
    }
}

impl IntakeConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| IntakeError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| IntakeError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Console verbosity, ordered from quietest to loudest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    #[default]
    Minimal,
    Verbose,
    Debug,
}

impl FromStr for LogLevel {
    type Err = IntakeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "minimal" | "min" | "0" => Ok(LogLevel::Minimal),
            "verbose" | "v" | "1" => Ok(LogLevel::Verbose),
            "debug" | "d" | "2" => Ok(LogLevel::Debug),
            _ => Err(IntakeError::Config(format!("invalid log level: {:?}", s))),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Minimal => "minimal",
            LogLevel::Verbose => "verbose",
            LogLevel::Debug => "debug",
        };
        f.write_str(name)
    }
}

/// Process-wide settings fixed at startup and passed to whoever needs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub log_level: LogLevel,
    pub color: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Minimal,
            color: true,
        }
    }
}

impl RuntimeConfig {
    /// Build from command line flags. An explicit level wins; `verbose`
    /// only lifts `minimal` to `verbose`.
    pub fn from_flags(log_level: Option<&str>, verbose: bool, color: bool) -> Result<Self> {
        let level = log_level.map(str::parse::<LogLevel>).transpose()?;
        Ok(Self::new(level, verbose, color))
    }

    /// Same as [`RuntimeConfig::from_flags`] with the level already parsed.
    pub fn new(log_level: Option<LogLevel>, verbose: bool, color: bool) -> Self {
        let mut level = log_level.unwrap_or_default();
        if verbose && level == LogLevel::Minimal {
            level = LogLevel::Verbose;
        }

        Self {
            log_level: level,
            color,
        }
    }

    pub fn is_verbose(&self) -> bool {
        self.log_level >= LogLevel::Verbose
    }

    pub fn is_debug(&self) -> bool {
        self.log_level >= LogLevel::Debug
    }
}
