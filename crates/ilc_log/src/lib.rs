//! Logging for the translator pipeline.
//!
//! Phase lines (`phase_log!`, `phase_ok!`, `phase_warn!`) report load, resolution and
//! emission progress. Category traces (`trace_dbg!`) follow one subsystem, such as
//! vtable construction or unit packing. `log_dbg!` covers the remaining verbose output.
//!
//! Everything is written to stderr, so dumps on stdout stay parseable.

use ilc_config::{DebugTrace, IlcConfig};

/// `-v` count after `--quiet` and `--debug` are applied.
pub fn effective_verbose(config: &IlcConfig) -> u8 {
  if config.quiet {
    return 0;
  }

  if config.debug && config.verbose < 2 {
    return 2;
  }

  config.verbose
}

pub fn log_phase(config: &IlcConfig) -> bool {
  !config.quiet
}

pub fn log_debug(config: &IlcConfig) -> bool {
  effective_verbose(config) >= 2
}

/// `--debug` turns on every category; otherwise only those passed to `--debug-trace`.
pub fn debug_trace_enabled(
  config: &IlcConfig,
  trace: DebugTrace,
) -> bool {
  !config.quiet && (config.debug || config.debug_trace.contains(&trace))
}

pub fn trace_name(trace: DebugTrace) -> &'static str {
  match trace {
    DebugTrace::Loader => "loader",
    DebugTrace::Resolve => "resolve",
    DebugTrace::VTable => "vtable",
    DebugTrace::Variance => "variance",
    DebugTrace::Dispatch => "dispatch",
    DebugTrace::Codegen => "codegen",
    DebugTrace::Packer => "packer",
  }
}

/// Indented step of the current phase.
///
/// ```ignore
/// phase_log!(&config, "Resolving from {} entry points", entries.len());
/// ```
#[macro_export]
macro_rules! phase_log {
  ($config:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {{
    if $crate::log_phase($config) {
      use colored::Colorize;
      eprintln!("    {} {}", "-->".bright_green().bold(), format!($fmt $(, $arg)*));
    }
  }};
}

/// A phase finished.
///
/// ```ignore
/// phase_ok!(&config, "Wrote {} units to {}", units.len(), dir.display());
/// ```
#[macro_export]
macro_rules! phase_ok {
  ($config:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {{
    if $crate::log_phase($config) {
      use colored::Colorize;
      eprintln!("{} {}", "-->".bright_green().bold(), format!($fmt $(, $arg)*));
    }
  }};
}

/// A phase finished with recoverable problems, e.g. version-mismatched dispatch slots.
#[macro_export]
macro_rules! phase_warn {
  ($config:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {{
    if $crate::log_phase($config) {
      use colored::Colorize;
      eprintln!("{} {}", "-->".bright_yellow().bold(), format!($fmt $(, $arg)*));
    }
  }};
}

/// `debug[<category>]: message`, printed when the category is enabled.
///
/// ```ignore
/// trace_dbg!(&config, DebugTrace::Dispatch, "{} on {} -> {}", entry, receiver, target);
/// // debug[dispatch]: Demo.Shape::Area on Demo.Circle -> Demo.Circle::Area
/// ```
#[macro_export]
macro_rules! trace_dbg {
  ($config:expr, $trace:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {{
    if $crate::debug_trace_enabled($config, $trace) {
      eprintln!(
        "debug[{}]: {}",
        $crate::trace_name($trace),
        format!($fmt $(, $arg)*)
      );
    }
  }};
}

/// Uncategorized detail at `-vv` and above.
#[macro_export]
macro_rules! log_dbg {
  ($config:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {{
    if $crate::log_debug($config) {
      eprintln!("debug: {}", format!($fmt $(, $arg)*));
    }
  }};
}
