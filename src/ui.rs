//! Interface de terminal do distfilter: barra de progresso e saída colorida.
//!
//! Usa `indicatif` para a barra de progresso e `console` para estilização.
//! [`TerminalProgress`] acompanha visualmente um job no terminal;
//! [`JsonLinesProgress`] emite um objeto JSON por evento para uso headless.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;

use crate::error::JobError;
use crate::gallery::GalleryEntry;
use crate::reporter::ProgressSink;
use crate::results::ResultsLog;
use crate::state_machine::JobSummary;
use crate::supervisor::JobReport;

/// Destino dos eventos de um job: progresso mais o desfecho final.
pub trait Presenter: ProgressSink {
    /// O job passou pela finalização.
    fn completed(&self, report: &JobReport);

    /// O job falhou antes ou no lugar da finalização. `summary` só existe
    /// quando o processo chegou a ser iniciado.
    fn failed(&self, err: &JobError, summary: Option<&JobSummary>);
}

/// Barra de progresso no terminal para a execução de um job.
///
/// Mostra `processadas/total` enquanto o job roda e mensagens coloridas
/// para sucesso (verde), falha (vermelho) e saída não-zero (amarelo).
pub struct TerminalProgress {
    // Barra de progresso do indicatif.
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
    // Imprime resumo JSON e galeria ao final.
    verbose: bool,
}

impl TerminalProgress {
    pub fn new(verbose: bool) -> Self {
        let pb = ProgressBar::new(0);
        let style = ProgressStyle::with_template("{spinner:.cyan} [{bar:40.cyan/blue}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        pb.set_style(style);

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            verbose,
        }
    }

    /// Imprime o log de resultados verbatim, ou o texto substituto.
    pub fn print_results_log(&self, log: &ResultsLog) {
        println!();
        match log {
            ResultsLog::Loaded(text) => print!("{text}"),
            ResultsLog::Missing { fallback } => println!("{}", self.yellow.apply_to(fallback)),
        }
    }

    /// Lista os artefatos na ordem de exibição da galeria.
    pub fn print_gallery(&self, entries: &[GalleryEntry]) {
        println!();
        println!("{}", self.green.apply_to(format!("─── Gallery ({}) ───", entries.len())));
        for entry in entries {
            println!("  {}", entry.name);
        }
    }

    /// Imprime o resumo do job formatado em JSON.
    pub fn print_summary(&self, summary: &JobSummary) {
        println!();
        println!("{}", self.green.apply_to("─── Job Summary ───"));
        println!(
            "{}",
            serde_json::to_string_pretty(summary).unwrap_or_default()
        );
    }
}

impl ProgressSink for TerminalProgress {
    fn on_start(&self, total: usize) {
        self.pb.set_length(total as u64);
        self.pb.set_position(0);
        self.pb.set_message(format!("Processed images: 0/{total}"));
        self.pb.enable_steady_tick(std::time::Duration::from_millis(100));
    }

    fn on_progress(&self, completed: usize, total: usize) {
        self.pb.set_position(completed as u64);
        self.pb.set_message(format!("Processed images: {completed}/{total}"));
    }
}

impl Presenter for TerminalProgress {
    fn completed(&self, report: &JobReport) {
        self.pb.finish();
        if report.exited_cleanly() {
            println!("  {} Job completed successfully", self.green.apply_to("✓"));
        } else {
            println!(
                "  {} Job finished, but the kernel exited with {:?}",
                self.yellow.apply_to("!"),
                report.exit_code()
            );
        }
        self.print_results_log(&report.results.log);
        if self.verbose {
            self.print_gallery(&report.results.gallery);
            self.print_summary(&report.summary);
        }
    }

    fn failed(&self, err: &JobError, summary: Option<&JobSummary>) {
        self.pb.abandon();
        println!("  {} Job failed: {err}", self.red.apply_to("✗"));
        if self.verbose
            && let Some(summary) = summary
        {
            self.print_summary(summary);
        }
    }
}

/// Emite cada evento como uma linha JSON em stdout.
#[derive(Debug, Default)]
pub struct JsonLinesProgress;

impl JsonLinesProgress {
    fn emit(value: serde_json::Value) {
        println!("{value}");
    }
}

impl ProgressSink for JsonLinesProgress {
    fn on_start(&self, total: usize) {
        Self::emit(json!({ "event": "started", "completed": 0, "total": total }));
    }

    fn on_progress(&self, completed: usize, total: usize) {
        Self::emit(json!({ "event": "progress", "completed": completed, "total": total }));
    }
}

impl Presenter for JsonLinesProgress {
    fn completed(&self, report: &JobReport) {
        Self::emit(json!({
            "event": "completed",
            "exit_code": report.exit_code(),
            "results_log": report.results.log.text(),
            "log_found": !report.results.log.is_missing(),
            "gallery": report.results.gallery,
            "summary": report.summary,
        }));
    }

    fn failed(&self, err: &JobError, summary: Option<&JobSummary>) {
        Self::emit(json!({ "event": "failed", "error": err.to_string(), "summary": summary }));
    }
}
