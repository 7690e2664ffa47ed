mod common;

use std::process::Command;

use ilc_codegen_c::{CompileUnit, PRELUDE, PRELUDE_NAME};
use ilc_config::IlcConfig;
use tempfile::tempdir;

fn gcc_accepts(units: &[CompileUnit]) {
  let temp_dir = tempdir().expect("Failed to create temp dir");
  std::fs::write(temp_dir.path().join(PRELUDE_NAME), PRELUDE).expect("Failed to write prelude");
  for unit in units {
    std::fs::write(temp_dir.path().join(unit.header_file_name()), unit.render_header(&[]))
      .expect("Failed to write header");
    std::fs::write(temp_dir.path().join(unit.source_file_name()), unit.render_source())
      .expect("Failed to write source");
  }

  for unit in units {
    let c_path = temp_dir.path().join(unit.source_file_name());
    let output = match Command::new("gcc")
      .args(["-std=c11", "-fsyntax-only", "-I"])
      .arg(temp_dir.path())
      .arg(&c_path)
      .output()
    {
      Ok(output) => output,
      Err(err) => {
        eprintln!("skipping: gcc unavailable ({})", err);
        return;
      },
    };

    assert!(
      output.status.success(),
      "gcc rejected {}:\n{}\n\nstderr:\n{}",
      unit.source_file_name(),
      common::all_text(units),
      String::from_utf8_lossy(&output.stderr)
    );
  }
}

#[test]
fn gcc_single_unit() {
  gcc_accepts(&common::compile_units(IlcConfig::quiet()));
}

#[test]
fn gcc_one_unit_per_type() {
  let mut config = IlcConfig::quiet();
  config.units.decl_threshold = 1;
  config.units.impl_threshold = 1;
  gcc_accepts(&common::compile_units(config));
}
