use std::path::{Path, PathBuf};

use ilc_codegen_c::{CompileUnit, PRELUDE, PRELUDE_NAME};
use ilc_config::CHeader;
use ilc_diagnostics::message::DiagnosticMessage;

fn write_file(
  path: &Path,
  content: &str,
) -> Result<(), DiagnosticMessage> {
  std::fs::write(path, content).map_err(|e| DiagnosticMessage::WriteFailed {
    path: path.display().to_string(),
    reason: e.to_string(),
  })
}

/// Writes the runtime prelude and every unit's header and source into `dir`.
///
/// Returns the written paths, prelude first.
pub fn write_units(
  units: &[CompileUnit],
  dir: &Path,
  headers: &[CHeader],
) -> Result<Vec<PathBuf>, DiagnosticMessage> {
  std::fs::create_dir_all(dir).map_err(|e| DiagnosticMessage::WriteFailed {
    path: dir.display().to_string(),
    reason: e.to_string(),
  })?;

  let mut written = Vec::with_capacity(units.len() * 2 + 1);

  let prelude = dir.join(PRELUDE_NAME);
  write_file(&prelude, PRELUDE)?;
  written.push(prelude);

  for unit in units {
    let header = dir.join(unit.header_file_name());
    write_file(&header, &unit.render_header(headers))?;
    written.push(header);

    let source = dir.join(unit.source_file_name());
    write_file(&source, &unit.render_source())?;
    written.push(source);
  }

  Ok(written)
}
