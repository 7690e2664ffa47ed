mod common;

use std::sync::Arc;

use ilc_config::IlcConfig;
use ilc_driver::Compiler;
use ilc_metadata::{Id, OpCode};

fn loaded() -> Compiler {
  let mut compiler = Compiler::new(Arc::new(IlcConfig::quiet()));
  compiler.load(common::shapes()).unwrap();
  compiler
}

fn type_names(compiler: &Compiler) -> Vec<String> {
  let resolver = compiler.resolver().unwrap();
  compiler.types().into_iter().map(|t| resolver.type_name(t)).collect()
}

#[test]
fn process_reaches_constructed_overrides_only_through_dispatch() {
  let mut compiler = loaded();
  let entries = compiler.add_entry_by_name("Demo.Program::Main").unwrap();
  assert_eq!(entries.len(), 1);
  compiler.process().unwrap();

  let names = type_names(&compiler);
  for expected in ["System.Object", "Demo.Shape", "Demo.Square", "Demo.Circle", "Demo.Program"] {
    assert!(names.iter().any(|n| n == expected), "missing {}", expected);
  }

  let resolver = compiler.resolver().unwrap();
  let main = entries[0];
  let instructions = compiler.instructions_of(main);
  assert_eq!(instructions.len(), 5);
  assert_eq!(instructions[3].opcode, OpCode::Callvirt);

  let circle = compiler
    .types()
    .into_iter()
    .find(|t| resolver.type_name(*t) == "Demo.Circle")
    .unwrap();
  let circle_methods: Vec<String> = compiler
    .methods_of(circle)
    .iter()
    .map(|m| resolver.method_name(*m))
    .collect();
  assert!(circle_methods.contains(&"Demo.Circle::Area".to_string()));
  assert!(compiler.fields_of(circle).is_empty());
  assert!(compiler.diagnostics().is_empty());
}

#[test]
fn generated_units_contain_the_dispatcher() {
  let mut compiler = loaded();
  compiler.add_entry_by_name("Demo.Program::Main").unwrap();
  compiler.process().unwrap();

  let units = compiler.generate();
  let text: String = units.iter().map(|u| u.render_source()).collect();
  assert!(text.contains("int32_t met_Demo_Shape__Area__vcall(struct cls_Demo_Shape* arg0)"));
  assert!(text.contains("    case cls_Demo_Square_type_id:\n"));
  assert!(text.contains("    case cls_Demo_Circle_type_id:\n"));
}

#[test]
fn reset_keeps_the_model_and_repeats_identically() {
  let mut compiler = loaded();
  compiler.add_entry_by_name("Demo.Program::Main").unwrap();
  compiler.process().unwrap();
  let first = compiler.generate();

  compiler.reset();
  assert!(compiler.is_loaded());
  assert!(compiler.types().is_empty());

  compiler.add_entry_by_name("Demo.Program::Main").unwrap();
  compiler.process().unwrap();
  assert_eq!(compiler.generate(), first);
}

#[test]
fn json_round_trip_loads_the_same_program() {
  let json = common::shapes().to_json();
  let mut compiler = Compiler::new(Arc::new(IlcConfig::quiet()));
  compiler.load_json(&json).unwrap();
  compiler.add_entry_by_name("Demo.Program::Main").unwrap();
  compiler.process().unwrap();

  let mut direct = loaded();
  direct.add_entry_by_name("Demo.Program::Main").unwrap();
  direct.process().unwrap();

  assert_eq!(compiler.generate(), direct.generate());
}

#[test]
fn load_errors_carry_their_codes() {
  let mut compiler = Compiler::new(Arc::new(IlcConfig::quiet()));

  let err = compiler.load_json("{ not json").unwrap_err();
  assert_eq!(err.code(), "IL0002");
  assert!(!compiler.is_loaded());

  let err = compiler
    .load_file(std::path::Path::new("/nonexistent/ilc/model.json"))
    .unwrap_err();
  assert_eq!(err.code(), "IL0001");
}

#[test]
fn unknown_entry_points_are_rejected() {
  let mut compiler = loaded();

  assert_eq!(compiler.add_entry_by_name("Demo.Missing::Main").unwrap_err().code(), "IL0015");
  assert_eq!(compiler.add_entry_by_name("Demo.Program::Nope").unwrap_err().code(), "IL0015");
  assert_eq!(compiler.add_entry_by_name("Main").unwrap_err().code(), "IL0015");
  assert_eq!(compiler.add_entry_point(Id::new(42)).unwrap_err().code(), "IL0015");
}
