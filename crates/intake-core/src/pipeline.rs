//! Run state machine: guardrail, extract once, notify once.
//!
//! ```text
//! start --guardrail ok--> extracting --invoice--> notifying --path--> done
//!   |                         |                       |
//!   +--tripwire--> blocked    +--error--> failed <----+
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;
use tracing::{debug, info, warn};

use crate::error::{EmailLoadError, ExtractionError, IntakeError, Result};
use crate::extract::{ExtractionInput, InvoiceExtractor};
use crate::guardrail::{Guardrail, guardrail_input};
use crate::llm::LanguageModel;
use crate::models::email::Email;
use crate::models::invoice::ValidatedInvoice;
use crate::notify::Notifier;
use crate::pdf::DocumentRenderer;

/// Externally visible run states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Start,
    Extracting,
    Notifying,
    Done,
    Blocked,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Blocked | RunState::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Start => "start",
            RunState::Extracting => "extracting",
            RunState::Notifying => "notifying",
            RunState::Done => "done",
            RunState::Blocked => "blocked",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub invoice_number: String,
    pub output_path: PathBuf,
    pub summary: String,
}

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// Notification written.
    Done(Delivery),
    /// The guardrail tripped; nothing was extracted or written.
    Blocked { reason: String },
    /// A step failed; `stage` is where it happened.
    Failed { stage: RunState, error: IntakeError },
}

impl RunOutcome {
    pub fn state(&self) -> RunState {
        match self {
            RunOutcome::Done(_) => RunState::Done,
            RunOutcome::Blocked { .. } => RunState::Blocked,
            RunOutcome::Failed { .. } => RunState::Failed,
        }
    }
}

/// Progress side channel. Nothing here can influence the run.
pub trait RunObserver: Send {
    /// Called on entry to every state, terminal ones included.
    fn on_state(&mut self, _state: RunState) {}

    /// Called with each streamed fragment of the extraction response.
    fn on_delta(&mut self, _text: &str) {}
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl RunObserver for NoopObserver {}

enum Stage {
    Start,
    Extracting(Email),
    Notifying(ValidatedInvoice),
    Finished(RunOutcome),
}

impl Stage {
    fn state(&self) -> RunState {
        match self {
            Stage::Start => RunState::Start,
            Stage::Extracting(_) => RunState::Extracting,
            Stage::Notifying(_) => RunState::Notifying,
            Stage::Finished(outcome) => outcome.state(),
        }
    }
}

/// One email in, at most one notification out.
pub struct Pipeline<M, G, R> {
    guardrail: G,
    extractor: InvoiceExtractor<M>,
    renderer: R,
    notifier: Notifier,
    artifacts_dir: PathBuf,
    timeout: Duration,
}

impl<M, G, R> Pipeline<M, G, R>
where
    M: LanguageModel,
    G: Guardrail,
    R: DocumentRenderer,
{
    pub fn new(
        guardrail: G,
        extractor: InvoiceExtractor<M>,
        renderer: R,
        notifier: Notifier,
        artifacts_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            guardrail,
            extractor,
            renderer,
            notifier,
            artifacts_dir: artifacts_dir.into(),
            timeout: Duration::from_secs(300),
        }
    }

    /// Bound the extraction step.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Drive one run to a terminal state. Each transition happens at most
    /// once, so the extractor and the notifier are each invoked at most once.
    pub async fn run(&self, email_path: &Path, observer: &mut dyn RunObserver) -> RunOutcome {
        let mut stage = Stage::Start;

        loop {
            let state = stage.state();
            debug!("Entering state {}", state);
            observer.on_state(state);

            stage = match stage {
                Stage::Start => self.start(email_path).await,
                Stage::Extracting(email) => self.extracting(&email, observer).await,
                Stage::Notifying(invoice) => self.notifying(&invoice),
                Stage::Finished(outcome) => return outcome,
            };
        }
    }

    async fn start(&self, email_path: &Path) -> Stage {
        let email = match Email::load(email_path) {
            Ok(email) => email,
            Err(e) => return failed(RunState::Start, e.into()),
        };

        let input = guardrail_input(email.subject(), email.body());
        match self.guardrail.check(&input).await {
            Ok(verdict) if verdict.is_safe => Stage::Extracting(email),
            Ok(verdict) => {
                info!("Guardrail tripped: {}", verdict.reasoning);
                Stage::Finished(RunOutcome::Blocked {
                    reason: verdict.reasoning,
                })
            }
            Err(e) => failed(RunState::Start, e.into()),
        }
    }

    async fn extracting(&self, email: &Email, observer: &mut dyn RunObserver) -> Stage {
        match self.extract(email, observer).await {
            Ok(invoice) => Stage::Notifying(invoice),
            Err(e) => failed(RunState::Extracting, e),
        }
    }

    async fn extract(&self, email: &Email, observer: &mut dyn RunObserver) -> Result<ValidatedInvoice> {
        let pdf_path = email.pdf_path()?;
        if !pdf_path.is_file() {
            return Err(EmailLoadError::AttachmentMissing(pdf_path).into());
        }

        let run_dir = self
            .artifacts_dir
            .join(Local::now().format("%Y%m%d%H%M%S").to_string());
        let image_paths = self.renderer.render_pages(&pdf_path, &run_dir)?;
        let pdf_text = self.renderer.extract_text(&pdf_path)?;
        info!(
            "Rendered {} page image(s) from {}",
            image_paths.len(),
            pdf_path.display()
        );

        let input = ExtractionInput {
            subject: email.subject(),
            body: email.body(),
            pdf_text: &pdf_text,
            image_paths: &image_paths,
        };

        let mut forward = |text: &str| observer.on_delta(text);
        let invoice = tokio::time::timeout(self.timeout, self.extractor.extract(&input, &mut forward))
            .await
            .map_err(|_| ExtractionError::Timeout(self.timeout.as_secs()))??;

        for warning in invoice.warnings() {
            warn!("Invoice {}: {}", invoice.invoice_number, warning);
        }

        Ok(invoice)
    }

    fn notifying(&self, invoice: &ValidatedInvoice) -> Stage {
        match self.notifier.notify(invoice) {
            Ok(output_path) => Stage::Finished(RunOutcome::Done(Delivery {
                invoice_number: invoice.invoice_number.clone(),
                output_path,
                summary: invoice.summary.clone(),
            })),
            Err(e) => failed(RunState::Notifying, e.into()),
        }
    }
}

fn failed(stage: RunState, error: IntakeError) -> Stage {
    info!("Run failed while {}: {}", stage, error);
    Stage::Finished(RunOutcome::Failed { stage, error })
}
