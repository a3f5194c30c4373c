//! End-to-end runs of the intake state machine with scripted collaborators.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use intake_core::error::{EmailLoadError, ExtractionError, ModelError, NotificationError, PdfError};
use intake_core::models::config::NotificationConfig;
use intake_core::pdf;
use intake_core::{
    DocumentRenderer, Guardrail, GuardrailVerdict, IntakeError, InvoiceExtractor, LanguageModel,
    ModelRequest, Notifier, Pipeline, RunObserver, RunOutcome, RunState,
};

const GOOD_INVOICE: &str = r#"{
    "vendor_name": "Acme Supplies Ltd.",
    "invoice_number": "INV-100",
    "invoice_date": "2024-03-15",
    "currency": "CAD",
    "total_due": 262.5,
    "line_items": [{"sku": "W-1", "description": "Widget", "quantity": 10, "unit_price": 26.25, "line_total": 262.5, "notes": null}],
    "summary": "- Vendor: Acme Supplies Ltd.\n- Total due: 262.50 CAD"
}"#;

struct ScriptedModel {
    reply: &'static str,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedModel {
    fn replying(reply: &'static str) -> Self {
        Self {
            reply,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn stalled() -> Self {
        Self {
            reply: GOOD_INVOICE,
            delay: Some(Duration::from_secs(3600)),
            calls: AtomicUsize::new(0),
        }
    }
}

impl LanguageModel for &ScriptedModel {
    async fn complete(
        &self,
        _request: &ModelRequest,
        on_delta: &mut (dyn FnMut(&str) + Send),
    ) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        // Stream in two fragments like a real endpoint would
        let (head, tail) = self.reply.split_at(self.reply.len() / 2);
        on_delta(head);
        on_delta(tail);
        Ok(self.reply.to_string())
    }
}

struct FixedGuardrail {
    verdict: GuardrailVerdict,
    calls: AtomicUsize,
}

impl Guardrail for &FixedGuardrail {
    async fn check(&self, input: &str) -> Result<GuardrailVerdict, ModelError> {
        assert!(input.contains("Email Subject:"));
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.verdict.clone())
    }
}

#[derive(Default)]
struct FakeRenderer {
    renders: AtomicUsize,
}

impl DocumentRenderer for &FakeRenderer {
    fn extract_text(&self, _pdf: &Path) -> pdf::Result<String> {
        Ok("Acme Supplies Ltd.\nTotal due 262.50".to_string())
    }

    fn render_pages(&self, _pdf: &Path, out_dir: &Path) -> pdf::Result<Vec<PathBuf>> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        fs::create_dir_all(out_dir).map_err(PdfError::Io)?;
        let path = out_dir.join("image_0.png");
        fs::write(&path, b"\x89PNG").map_err(PdfError::Io)?;
        Ok(vec![path])
    }
}

#[derive(Default)]
struct Recorder {
    states: Vec<RunState>,
    streamed: String,
}

impl RunObserver for Recorder {
    fn on_state(&mut self, state: RunState) {
        self.states.push(state);
    }

    fn on_delta(&mut self, text: &str) {
        self.streamed.push_str(text);
    }
}

struct Fixture {
    dir: TempDir,
    email: PathBuf,
}

impl Fixture {
    fn new(attachments: &str, with_pdf: bool) -> Self {
        let dir = TempDir::new().unwrap();
        let inputs = dir.path().join("inputs");
        fs::create_dir_all(&inputs).unwrap();

        let email = inputs.join("Email.json");
        fs::write(
            &email,
            format!(
                r#"{{"Message": {{
                    "Subject": "Invoice INV-100 from Acme",
                    "Body": {{"ContentType": "Text", "Content": "Please see the attached invoice."}},
                    "Attachments": {}
                }}}}"#,
                attachments
            ),
        )
        .unwrap();

        if with_pdf {
            fs::write(inputs.join("invoice.pdf"), b"%PDF-1.4").unwrap();
        }

        Self { dir, email }
    }

    fn standard() -> Self {
        Self::new(r#"[{"ContentType": "application/pdf", "Name": "invoice.pdf"}]"#, true)
    }

    fn outputs(&self) -> PathBuf {
        self.dir.path().join("outputs")
    }

    fn artifacts(&self) -> PathBuf {
        self.outputs().join("artifacts")
    }

    fn notification_files(&self) -> Vec<PathBuf> {
        match fs::read_dir(self.outputs()) {
            Ok(entries) => entries
                .map(|e| e.unwrap().path())
                .filter(|p| p.is_file())
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

fn safe() -> FixedGuardrail {
    FixedGuardrail {
        verdict: GuardrailVerdict::safe("routine invoice"),
        calls: AtomicUsize::new(0),
    }
}

fn pipeline<'a>(
    fx: &Fixture,
    model: &'a ScriptedModel,
    guardrail: &'a FixedGuardrail,
    renderer: &'a FakeRenderer,
) -> Pipeline<&'a ScriptedModel, &'a FixedGuardrail, &'a FakeRenderer> {
    Pipeline::new(
        guardrail,
        InvoiceExtractor::new(model, "test-model"),
        renderer,
        Notifier::new(fx.outputs(), NotificationConfig::default()),
        fx.artifacts(),
    )
}

#[tokio::test]
async fn test_run_reaches_done() {
    let fx = Fixture::standard();
    let model = ScriptedModel::replying(GOOD_INVOICE);
    let guardrail = safe();
    let renderer = FakeRenderer::default();
    let mut recorder = Recorder::default();

    let outcome = pipeline(&fx, &model, &guardrail, &renderer)
        .run(&fx.email, &mut recorder)
        .await;

    let RunOutcome::Done(delivery) = outcome else {
        panic!("expected done, got {:?}", outcome);
    };
    assert_eq!(delivery.invoice_number, "INV-100");
    assert_eq!(delivery.output_path, fx.outputs().join("outbound_email_INV-100.json"));
    assert!(delivery.summary.contains("Total due: 262.50 CAD"));

    assert_eq!(
        recorder.states,
        vec![RunState::Start, RunState::Extracting, RunState::Notifying, RunState::Done]
    );
    assert_eq!(recorder.streamed, GOOD_INVOICE);
    assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    assert_eq!(guardrail.calls.load(Ordering::SeqCst), 1);
    assert_eq!(renderer.renders.load(Ordering::SeqCst), 1);

    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&delivery.output_path).unwrap()).unwrap();
    assert_eq!(written["Message"]["InvoicePayload"]["vendor_name"], "Acme Supplies Ltd.");

    // One timestamped artifact directory holding the rendered page
    let runs: Vec<PathBuf> = fs::read_dir(fx.artifacts())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].file_name().unwrap().len(), 14);
    assert!(runs[0].join("image_0.png").is_file());
}

#[tokio::test]
async fn test_guardrail_blocks_run() {
    let fx = Fixture::standard();
    let model = ScriptedModel::replying(GOOD_INVOICE);
    let guardrail = FixedGuardrail {
        verdict: GuardrailVerdict::unsafe_because("request asks for inappropriate content"),
        calls: AtomicUsize::new(0),
    };
    let renderer = FakeRenderer::default();
    let mut recorder = Recorder::default();

    let outcome = pipeline(&fx, &model, &guardrail, &renderer)
        .run(&fx.email, &mut recorder)
        .await;

    match outcome {
        RunOutcome::Blocked { reason } => assert!(reason.contains("inappropriate")),
        other => panic!("expected blocked, got {:?}", other),
    }
    assert_eq!(recorder.states, vec![RunState::Start, RunState::Blocked]);
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    assert_eq!(renderer.renders.load(Ordering::SeqCst), 0);
    assert!(fx.notification_files().is_empty());
}

#[tokio::test]
async fn test_blank_invoice_number_fails_before_notify() {
    let fx = Fixture::standard();
    let model = ScriptedModel::replying(r#"{"invoice_number": " ", "summary": "- Total due: 10.00"}"#);
    let guardrail = safe();
    let renderer = FakeRenderer::default();
    let mut recorder = Recorder::default();

    let outcome = pipeline(&fx, &model, &guardrail, &renderer)
        .run(&fx.email, &mut recorder)
        .await;

    match outcome {
        RunOutcome::Failed {
            stage: RunState::Extracting,
            error: IntakeError::Extraction(ExtractionError::MissingInvoiceNumber),
        } => {}
        other => panic!("expected invoice number failure, got {:?}", other),
    }
    assert_eq!(
        recorder.states,
        vec![RunState::Start, RunState::Extracting, RunState::Failed]
    );
    assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    assert!(fx.notification_files().is_empty());
}

#[tokio::test]
async fn test_malformed_model_output_fails() {
    let fx = Fixture::standard();
    let model = ScriptedModel::replying("I could not read the invoice, sorry.");
    let guardrail = safe();
    let renderer = FakeRenderer::default();

    let outcome = pipeline(&fx, &model, &guardrail, &renderer)
        .run(&fx.email, &mut intake_core::NoopObserver)
        .await;

    assert!(matches!(
        outcome,
        RunOutcome::Failed {
            error: IntakeError::Extraction(ExtractionError::Schema(_)),
            ..
        }
    ));
    assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    assert!(fx.notification_files().is_empty());
}

#[tokio::test]
async fn test_missing_email_fails_at_start() {
    let fx = Fixture::standard();
    let model = ScriptedModel::replying(GOOD_INVOICE);
    let guardrail = safe();
    let renderer = FakeRenderer::default();

    let outcome = pipeline(&fx, &model, &guardrail, &renderer)
        .run(&fx.dir.path().join("nope.json"), &mut intake_core::NoopObserver)
        .await;

    assert!(matches!(
        outcome,
        RunOutcome::Failed {
            stage: RunState::Start,
            error: IntakeError::Email(EmailLoadError::NotFound(_)),
        }
    ));
    assert_eq!(guardrail.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_email_without_pdf_fails() {
    let fx = Fixture::new(r#"[{"ContentType": "text/plain", "Name": "notes.txt"}]"#, false);
    let model = ScriptedModel::replying(GOOD_INVOICE);
    let guardrail = safe();
    let renderer = FakeRenderer::default();

    let outcome = pipeline(&fx, &model, &guardrail, &renderer)
        .run(&fx.email, &mut intake_core::NoopObserver)
        .await;

    assert!(matches!(
        outcome,
        RunOutcome::Failed {
            stage: RunState::Extracting,
            error: IntakeError::Email(EmailLoadError::NoPdfAttachment),
        }
    ));
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_pdf_missing_on_disk_fails() {
    let fx = Fixture::new(r#"[{"ContentType": "application/pdf", "Name": "invoice.pdf"}]"#, false);
    let model = ScriptedModel::replying(GOOD_INVOICE);
    let guardrail = safe();
    let renderer = FakeRenderer::default();

    let outcome = pipeline(&fx, &model, &guardrail, &renderer)
        .run(&fx.email, &mut intake_core::NoopObserver)
        .await;

    assert!(matches!(
        outcome,
        RunOutcome::Failed {
            error: IntakeError::Email(EmailLoadError::AttachmentMissing(_)),
            ..
        }
    ));
    assert_eq!(renderer.renders.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_stalled_extraction_times_out() {
    let fx = Fixture::standard();
    let model = ScriptedModel::stalled();
    let guardrail = safe();
    let renderer = FakeRenderer::default();

    let outcome = pipeline(&fx, &model, &guardrail, &renderer)
        .with_timeout(Duration::from_millis(50))
        .run(&fx.email, &mut intake_core::NoopObserver)
        .await;

    assert!(matches!(
        outcome,
        RunOutcome::Failed {
            stage: RunState::Extracting,
            error: IntakeError::Extraction(ExtractionError::Timeout(_)),
        }
    ));
    assert!(fx.notification_files().is_empty());
}

#[tokio::test]
async fn test_unwritable_outputs_fails_at_notify() {
    let fx = Fixture::standard();
    let model = ScriptedModel::replying(GOOD_INVOICE);
    let guardrail = safe();
    let renderer = FakeRenderer::default();

    // Artifacts go elsewhere so only the notifier hits the blocked path
    let blocked = fx.dir.path().join("blocked");
    fs::write(&blocked, "not a directory").unwrap();
    let pipeline = Pipeline::new(
        &guardrail,
        InvoiceExtractor::new(&model, "test-model"),
        &renderer,
        Notifier::new(&blocked, NotificationConfig::default()),
        fx.dir.path().join("artifacts"),
    );

    let mut recorder = Recorder::default();
    let outcome = pipeline.run(&fx.email, &mut recorder).await;

    assert!(matches!(
        outcome,
        RunOutcome::Failed {
            stage: RunState::Notifying,
            error: IntakeError::Notification(NotificationError::CreateDir { .. }),
        }
    ));
    assert_eq!(recorder.states.last(), Some(&RunState::Failed));
    assert_eq!(model.calls.load(Ordering::SeqCst), 1);
}
