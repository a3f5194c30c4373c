//! Role-prefixed console output and live progress for a run.

use std::time::Duration;

use console::{StyledObject, style};
use indicatif::{ProgressBar, ProgressStyle};

use intake_core::{RunObserver, RunState, RuntimeConfig};

/// Writes progress to stderr. Only `ok`, `warn` and `error` lines are shown
/// in minimal mode.
pub struct Console {
    runtime: RuntimeConfig,
    spinner: Option<ProgressBar>,
    at_line_start: bool,
}

impl Console {
    pub fn new(runtime: RuntimeConfig) -> Self {
        Self {
            runtime,
            spinner: None,
            at_line_start: true,
        }
    }

    pub fn orchestrator(&mut self, msg: &str) {
        self.verbose_line(style("[ORCHESTRATOR]").cyan().bold(), msg);
    }

    pub fn tool(&mut self, msg: &str) {
        self.verbose_line(style("[TOOL]").yellow(), msg);
    }

    pub fn system(&mut self, msg: &str) {
        self.verbose_line(style("[SYSTEM]").blue(), msg);
    }

    pub fn ok(&mut self, msg: &str) {
        self.line(style("[OK]").green().bold(), msg);
    }

    pub fn warn(&mut self, msg: &str) {
        self.line(style("[SYSTEM]").yellow().bold(), msg);
    }

    pub fn error(&mut self, msg: &str) {
        self.line(style("[ERROR]").red().bold(), msg);
    }

    fn verbose_line(&mut self, tag: StyledObject<&str>, msg: &str) {
        if self.runtime.is_verbose() {
            self.line(tag, msg);
        }
    }

    fn line(&mut self, tag: StyledObject<&str>, msg: &str) {
        self.stop_spinner();
        self.end_stream();
        eprintln!("{} {}", tag, msg);
    }

    fn start_spinner(&mut self, msg: &str) {
        if !self.runtime.is_verbose() || self.spinner.is_some() {
            return;
        }

        let spinner = ProgressBar::new_spinner();
        if let Ok(template) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            spinner.set_style(template);
        }
        spinner.set_message(msg.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));
        self.spinner = Some(spinner);
    }

    fn stop_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }

    fn end_stream(&mut self) {
        if !self.at_line_start {
            eprintln!();
            self.at_line_start = true;
        }
    }

    /// Render a streamed fragment, prefixing every new output line.
    fn agent_fragment(&mut self, text: &str) -> String {
        let mut out = String::new();

        for (i, piece) in text.split('\n').enumerate() {
            if i > 0 {
                out.push('\n');
                self.at_line_start = true;
            }
            if piece.is_empty() {
                continue;
            }
            if self.at_line_start {
                out.push_str(&format!("{} ", style("[INVOICE_AGENT]").magenta()));
                self.at_line_start = false;
            }
            out.push_str(&style(piece).dim().to_string());
        }

        out
    }
}

impl RunObserver for Console {
    fn on_state(&mut self, state: RunState) {
        match state {
            RunState::Start => self.orchestrator("Checking the request against the input guardrail"),
            RunState::Extracting => {
                self.orchestrator("Guardrail passed, handing off to the invoice agent");
                self.tool("Rendering PDF pages and extracting text");
                self.start_spinner("Invoice agent is reading the invoice...");
            }
            RunState::Notifying => {
                self.stop_spinner();
                self.end_stream();
                self.tool("Writing the Customer Service notification");
            }
            RunState::Done | RunState::Blocked | RunState::Failed => {
                self.stop_spinner();
                self.end_stream();
                self.system(&format!("Run finished: {}", state));
            }
        }
    }

    fn on_delta(&mut self, text: &str) {
        if !self.runtime.is_verbose() {
            return;
        }
        self.stop_spinner();
        let fragment = self.agent_fragment(text);
        eprint!("{}", fragment);
    }
}
