use std::fmt::Write;

use ascii_table::AsciiTable;

use crate::instance::ProcessState;
use crate::resolver::Resolver;

/// Dump every interned type instance in registration order
pub fn dump_types(resolver: &Resolver) -> String {
  let mut output = String::new();

  writeln!(&mut output, "=== Type Instances ===").unwrap();

  for (id, ty) in resolver.store().types() {
    let mut flags = Vec::new();
    if ty.is_instantiated {
      flags.push("instantiated");
    }
    if ty.cctor.is_some() {
      flags.push("cctor");
    }
    if ty.finalizer.is_some() {
      flags.push("finalizer");
    }

    writeln!(
      &mut output,
      "  {:?} {} v{} [{}]",
      id,
      resolver.type_name(id),
      ty.version,
      flags.join(", ")
    )
    .unwrap();
    if let Some(base) = ty.base {
      writeln!(&mut output, "    base: {}", resolver.type_name(base)).unwrap();
    }
    for interface in &ty.interfaces {
      writeln!(&mut output, "    implements: {}", resolver.type_name(*interface)).unwrap();
    }
    for base in &ty.variance_bases {
      writeln!(&mut output, "    assignable to: {}", resolver.type_name(*base)).unwrap();
    }
    if !ty.derived.is_empty() {
      let derived: Vec<String> = ty.derived.iter().map(|d| resolver.type_name(*d)).collect();
      writeln!(&mut output, "    derived: {}", derived.join(", ")).unwrap();
    }
  }

  output
}

/// Dump every method instance with its processing state and dispatch targets
pub fn dump_methods(resolver: &Resolver) -> String {
  let mut output = String::new();

  writeln!(&mut output, "=== Method Instances ===").unwrap();

  for (id, method) in resolver.store().methods() {
    let state = match method.state {
      ProcessState::Unqueued => "unqueued",
      ProcessState::Queued => "queued",
      ProcessState::Processed => "processed",
    };
    let params: Vec<String> = method.params.iter().map(|p| resolver.metadata().sig_name(p)).collect();

    writeln!(
      &mut output,
      "  {:?} {}({}) -> {} [{}{}]",
      id,
      resolver.method_name(id),
      params.join(", "),
      resolver.metadata().sig_name(&method.ret),
      state,
      if method.virtual_only { ", virtual only" } else { "" }
    )
    .unwrap();
    for implementation in &method.override_impls {
      writeln!(&mut output, "    dispatches to: {}", resolver.method_name(*implementation)).unwrap();
    }
  }

  output
}

/// Dump the dispatch map of every type whose virtual table was built, as tables
pub fn dump_vtables(resolver: &Resolver) -> String {
  let metadata = resolver.metadata();
  let mut output = String::new();

  writeln!(&mut output, "=== Virtual Tables ===").unwrap();

  for (id, ty) in resolver.store().types() {
    let Some(table) = &ty.vtable else {
      continue;
    };
    writeln!(&mut output, "{}", resolver.type_name(id)).unwrap();

    let rows: Vec<Vec<String>> = table
      .dispatch
      .iter()
      .map(|(entry, implementation)| {
        vec![
          entry.display(metadata),
          implementation
            .as_ref()
            .map(|i| i.display(metadata))
            .unwrap_or_else(|| "<abstract>".to_string()),
        ]
      })
      .collect();

    let mut ascii_table = AsciiTable::default();
    ascii_table.set_max_width(160);
    ascii_table.column(0).set_header("Entry");
    ascii_table.column(1).set_header("Implementation");
    writeln!(&mut output, "{}", ascii_table.format(rows)).unwrap();
  }

  output
}
