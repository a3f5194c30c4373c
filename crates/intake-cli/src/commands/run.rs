//! Default command - process the configured email once.

use std::process::ExitCode;
use std::time::Duration;

use tracing::debug;

use intake_core::{
    IntakeConfig, InvoiceExtractor, ModelGuardrail, Notifier, OpenAiClient, PdfRenderer, Pipeline,
    RunOutcome, RuntimeConfig,
};

use crate::output::Console;

pub async fn run(config: IntakeConfig, runtime: RuntimeConfig) -> anyhow::Result<ExitCode> {
    let mut console = Console::new(runtime);
    console.orchestrator(&format!("Processing {}", config.paths.email.display()));

    let client = OpenAiClient::from_config(&config.model)?;
    debug!(
        "Using {} (extraction) and {} (guardrail) at {}",
        config.model.extraction_model, config.model.guardrail_model, config.model.base_url
    );

    let pipeline = Pipeline::new(
        ModelGuardrail::new(client.clone(), config.model.guardrail_model.clone()),
        InvoiceExtractor::new(client, config.model.extraction_model.clone()),
        PdfRenderer::new(config.render.clone()),
        Notifier::new(config.paths.outputs_dir.clone(), config.notification.clone()),
        config.paths.artifacts_dir.clone(),
    )
    .with_timeout(Duration::from_secs(config.model.timeout_secs));

    let outcome = pipeline.run(&config.paths.email, &mut console).await;
    let code = exit_code(&outcome);

    match outcome {
        RunOutcome::Done(delivery) => {
            console.ok(&format!(
                "Notification for invoice {} written",
                delivery.invoice_number
            ));
            println!("{}", delivery.output_path.display());
            println!();
            println!("{}", delivery.summary);
        }
        RunOutcome::Blocked { reason } => {
            console.warn(&format!("Guardrail tripped, request not processed: {}", reason));
        }
        RunOutcome::Failed { stage, error } => {
            console.error(&format!("Run failed while {}: {}", stage, error));
        }
    }

    Ok(ExitCode::from(code))
}

/// Process status for a finished run. A blocked request is reported, not
/// treated as a failure.
fn exit_code(outcome: &RunOutcome) -> u8 {
    match outcome {
        RunOutcome::Done(_) | RunOutcome::Blocked { .. } => 0,
        RunOutcome::Failed { .. } => 1,
    }
}
