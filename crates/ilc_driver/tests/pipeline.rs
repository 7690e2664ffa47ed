mod common;

use ilc_config::DumpKind;
use ilc_driver::{check_file, compile_file};
use insta::assert_snapshot;
use tempfile::tempdir;

#[test]
fn compile_writes_prelude_and_units() {
  let dir = tempdir().unwrap();
  let model = common::write_model(dir.path(), &common::shapes());
  let out = dir.path().join("out");
  let config = common::build_config(&["Demo.Program::Main"], &out, vec![], None);

  compile_file(config, model.to_str().unwrap()).unwrap();

  assert!(out.join("il2c.h").exists());
  let header = std::fs::read_to_string(out.join("il2cUnit_1.h")).unwrap();
  let source = std::fs::read_to_string(out.join("il2cUnit_1.c")).unwrap();
  assert!(header.starts_with("#pragma once\n#include \"il2c.h\"\n"));
  assert!(source.starts_with("#include \"il2c.h\"\n#include \"il2cUnit_1.h\"\n"));
  assert!(source.contains("met_Demo_Program__Main(void)"));
}

#[test]
fn check_writes_nothing() {
  let dir = tempdir().unwrap();
  let model = common::write_model(dir.path(), &common::shapes());
  let out = dir.path().join("out");
  let config = common::build_config(&["Demo.Program::Main"], &out, vec![], None);

  check_file(config, model.to_str().unwrap()).unwrap();

  assert!(!out.exists());
}

#[test]
fn dumps_go_to_the_dump_directory() {
  let dir = tempdir().unwrap();
  let model = common::write_model(dir.path(), &common::shapes());
  let out = dir.path().join("out");
  let dumps = dir.path().join("dumps");
  let config = common::build_config(
    &["Demo.Program::Main"],
    &out,
    vec![DumpKind::Types, DumpKind::Methods, DumpKind::VTables, DumpKind::Units],
    Some(&dumps),
  );

  check_file(config, model.to_str().unwrap()).unwrap();

  for name in ["dump-types.txt", "dump-methods.txt", "dump-vtables.txt", "dump-units.txt"] {
    assert!(dumps.join(name).exists(), "missing {}", name);
  }
  let units = std::fs::read_to_string(dumps.join("dump-units.txt")).unwrap();
  assert!(units.starts_with("=== Compile Units ===\n  il2cUnit_1 ("));
  assert!(units.contains("    type: Demo.Circle\n"));

  let methods = std::fs::read_to_string(dumps.join("dump-methods.txt")).unwrap();
  assert!(methods.contains("    dispatches to: Demo.Square::Area\n"));
  assert!(methods.contains("    dispatches to: Demo.Circle::Area\n"));
}

#[test]
fn missing_entry_points_fail() {
  let dir = tempdir().unwrap();
  let model = common::write_model(dir.path(), &common::shapes());
  let out = dir.path().join("out");

  let config = common::build_config(&[], &out, vec![], None);
  assert!(check_file(config, model.to_str().unwrap()).is_err());

  let config = common::build_config(&["Demo.Program::Start"], &out, vec![], None);
  assert!(compile_file(config, model.to_str().unwrap()).is_err());
  assert!(!out.exists());
}

#[test]
fn unreadable_input_fails() {
  let dir = tempdir().unwrap();
  let out = dir.path().join("out");
  let config = common::build_config(&["Demo.Program::Main"], &out, vec![], None);

  assert!(compile_file(config, dir.path().join("absent.json").to_str().unwrap()).is_err());
}

#[test]
fn prelude_declares_the_runtime_interface() {
  let dir = tempdir().unwrap();
  let model = common::write_model(dir.path(), &common::shapes());
  let out = dir.path().join("out");
  let config = common::build_config(&["Demo.Program::Main"], &out, vec![], None);
  compile_file(config, model.to_str().unwrap()).unwrap();

  let prelude = std::fs::read_to_string(out.join("il2c.h")).unwrap();
  let declarations: Vec<&str> = prelude.lines().filter(|l| l.contains("il2c_") && l.ends_with(");")).collect();
  assert_snapshot!(declarations.join("\n"), @r#"
void* il2c_new(size_t size, uint32_t type_id);
void* il2c_new_string(const char* utf8);
void* il2c_new_array(size_t elem_size, intptr_t count);
intptr_t il2c_array_length(void* array);
void* il2c_array_data(void* array);
void* il2c_box(const void* value, size_t size, uint32_t type_id);
void* il2c_unbox(void* object);
void* il2c_isinst(void* object, uint32_t type_id);
void* il2c_castclass(void* object, uint32_t type_id);
void* il2c_current_exception(void);
IL2C_NORETURN void il2c_throw(void* exception);
IL2C_NORETURN void il2c_rethrow(void);
IL2C_NORETURN void il2c_unreachable(void);
"#);
}
