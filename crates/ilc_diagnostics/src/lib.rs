pub mod diagnostic_report;
pub mod message;

use diagnostic_report::{Diagnostic, Severity};
use colored::*;

pub fn render(diag: &Diagnostic) {
  print_header(diag);

  for note in &diag.notes {
    eprintln!("  {} {}", "note:".cyan().bold(), note);
  }

  eprintln!();
}

pub fn render_batch(diagnostics: &[Diagnostic]) {
  for diag in diagnostics {
    render(diag);
  }
}

/// Uncoloured one-line form, `error[IL0020]: message`, used by tests and dumps.
pub fn format_plain(diag: &Diagnostic) -> String {
  let level = match diag.severity {
    Severity::Info => "info",
    Severity::Warning => "warning",
    Severity::Error => "error",
    Severity::Hint => "hint",
  };

  let mut line = format!("{}[{}]: {}", level, diag.error_code, diag.message);
  for note in &diag.notes {
    line.push_str(&format!(" (note: {})", note));
  }
  line
}

fn print_header(diag: &Diagnostic) {
  let message = diag.message.bold();
  let code = diag.error_code.bold();

  match diag.severity {
    Severity::Info => {
      eprintln!("{}[{}]: {}", "Info".blue().bold(), code.blue(), message)
    },
    Severity::Warning => {
      eprintln!("{}[{}]: {}", "Warning".yellow().bold(), code.yellow(), message)
    },
    Severity::Error => {
      eprintln!("{}[{}]: {}", "Error".red().bold(), code.red().bold(), message)
    },
    Severity::Hint => {
      eprintln!("{}[{}]: {}", "Hint".cyan().bold(), code.cyan(), message)
    },
  }
}
