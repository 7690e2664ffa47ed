use std::path::Path;
use std::sync::Arc;

use colored::*;
use ilc_codegen_c::dump_units;
use ilc_config::{DumpKind, IlcConfig};
use ilc_diagnostics::message::DiagnosticMessage;
use ilc_log::{log_dbg, phase_log, phase_ok, phase_warn};
use ilc_mono::dump::{dump_methods, dump_types, dump_vtables};

use crate::api::Compiler;
use crate::output::write_units;

fn write_dump_output(
  config: &IlcConfig,
  file_name: &str,
  content: &str,
) -> Result<(), ()> {
  if let Some(build_config) = config.build_config.as_ref() {
    if let Some(dump_dir) = &build_config.dump_dir {
      let output_dir = Path::new(dump_dir);
      if let Err(e) = std::fs::create_dir_all(output_dir) {
        eprintln!(
          "{} Failed to create dump directory '{}': {}",
          "Error:".red().bold(),
          output_dir.display(),
          e
        );
        return Err(());
      }

      let output_path = output_dir.join(file_name);
      if let Err(e) = std::fs::write(&output_path, content) {
        eprintln!(
          "{} Failed to write dump file '{}': {}",
          "Error:".red().bold(),
          output_path.display(),
          e
        );
        return Err(());
      }

      return Ok(());
    }
  }

  println!("\n{}", content);
  Ok(())
}

fn fail(diag: DiagnosticMessage) -> Result<(), ()> {
  ilc_diagnostics::render(&diag.report());
  Err(())
}

/// Translate a metadata file and write the generated units to the configured output directory.
pub fn compile_file(
  config: Arc<IlcConfig>,
  file_path: &str,
) -> Result<(), ()> {
  let compiler = translate(config.clone(), file_path)?;
  let units = compiler.generate();

  if config.dump_requested(DumpKind::Units) {
    write_dump_output(&config, "dump-units.txt", &dump_units(&units))?;
  }

  let output_dir = config
    .build_config
    .as_ref()
    .map(|bc| bc.output_dir.clone())
    .or_else(|| config.project_config.as_ref().map(|pc| pc.build.output_dir.clone()))
    .unwrap_or_else(|| "build".to_string());

  phase_log!(&config, "Writing {} units to {}", units.len(), output_dir);
  let written = match write_units(&units, Path::new(&output_dir), &config.headers) {
    Ok(written) => written,
    Err(diag) => return fail(diag),
  };
  for path in &written {
    log_dbg!(&config, "wrote {}", path.display());
  }

  phase_ok!(&config, "Generated {} files in {}", written.len(), output_dir);
  Ok(())
}

/// Run resolution and generation without writing any output.
pub fn check_file(
  config: Arc<IlcConfig>,
  file_path: &str,
) -> Result<(), ()> {
  let compiler = translate(config.clone(), file_path)?;
  let units = compiler.generate();

  if config.dump_requested(DumpKind::Units) {
    write_dump_output(&config, "dump-units.txt", &dump_units(&units))?;
  }

  phase_ok!(&config, "Check passed ({} units)", units.len());
  Ok(())
}

/// Load, add entry points and resolve, rendering whatever goes wrong.
fn translate(
  config: Arc<IlcConfig>,
  file_path: &str,
) -> Result<Compiler, ()> {
  let mut compiler = Compiler::new(config.clone());

  phase_log!(&config, "Loading... {}", file_path);
  if let Err(diag) = compiler.load_file(Path::new(file_path)) {
    fail(diag)?;
  }

  let entries = entry_names(&config);
  if entries.is_empty() {
    fail(DiagnosticMessage::InvalidEntryPoint {
      name: file_path.to_string(),
      reason: "no entry points given".to_string(),
    })?;
  }
  for entry in &entries {
    log_dbg!(&config, "adding entry point {}", entry);
    if let Err(diag) = compiler.add_entry_by_name(entry) {
      fail(diag)?;
    }
  }

  if let Err(diag) = compiler.process() {
    fail(diag)?;
  }

  let warnings = compiler.diagnostics();
  if !warnings.is_empty() {
    phase_warn!(&config, "{} warnings during resolution", warnings.len());
    if !config.quiet {
      let reports: Vec<_> = warnings.iter().map(|w| w.report()).collect();
      ilc_diagnostics::render_batch(&reports);
    }
  }

  if let Some(resolver) = compiler.resolver() {
    if config.dump_requested(DumpKind::Types) {
      write_dump_output(&config, "dump-types.txt", &dump_types(resolver))?;
    }
    if config.dump_requested(DumpKind::Methods) {
      write_dump_output(&config, "dump-methods.txt", &dump_methods(resolver))?;
    }
    if config.dump_requested(DumpKind::VTables) {
      write_dump_output(&config, "dump-vtables.txt", &dump_vtables(resolver))?;
    }
  }

  Ok(compiler)
}

/// Entry points from the command line, falling back to the project file.
fn entry_names(config: &IlcConfig) -> Vec<String> {
  let from_build = config
    .build_config
    .as_ref()
    .map(|bc| bc.entries.clone())
    .unwrap_or_default();
  if !from_build.is_empty() {
    return from_build;
  }

  config
    .project_config
    .as_ref()
    .map(|pc| pc.build.entries.clone())
    .unwrap_or_default()
}
