//! Groups per-type output into compilation units.

use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};
use std::fmt::Write;

use ilc_config::{CHeader, DebugTrace, IlcConfig};
use ilc_log::trace_dbg;
use ilc_mono::TypeInstanceId;

use crate::emit::{StaticInit, TypeUnit};

pub const PRELUDE_NAME: &str = "il2c.h";

/// Runtime interface every generated file includes.
pub const PRELUDE: &str = r#"#pragma once

#include <stddef.h>
#include <stdint.h>
#include <string.h>

#if defined(__GNUC__)
#define IL2C_NORETURN __attribute__((noreturn))
#else
#define IL2C_NORETURN
#endif

/* Every object starts with its 32-bit type id. */
#define IL2C_TYPE_ID(obj) (*(const uint32_t*)(obj))

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
"#;

/// One packaged header/source pair.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileUnit {
  pub name: String,
  /// Display names of the types packed here, in emission order.
  pub types: Vec<String>,
  pub decl_code: String,
  pub impl_code: String,
  /// Units whose headers the header includes, in unit order.
  pub decl_includes: Vec<String>,
  /// Units whose headers the source includes, in unit order.
  pub impl_includes: Vec<String>,
}

impl CompileUnit {
  fn new(index: usize) -> Self {
    Self {
      name: format!("il2cUnit_{}", index),
      types: Vec::new(),
      decl_code: String::new(),
      impl_code: String::new(),
      decl_includes: Vec::new(),
      impl_includes: Vec::new(),
    }
  }

  pub fn header_file_name(&self) -> String {
    format!("{}.h", self.name)
  }

  pub fn source_file_name(&self) -> String {
    format!("{}.c", self.name)
  }

  pub fn render_header(
    &self,
    headers: &[CHeader],
  ) -> String {
    let mut output = String::new();
    writeln!(output, "#pragma once").unwrap();
    writeln!(output, "#include \"{}\"", PRELUDE_NAME).unwrap();
    for header in headers {
      if header.quoted {
        writeln!(output, "#include \"{}\"", header.path).unwrap();
      } else {
        writeln!(output, "#include <{}>", header.path).unwrap();
      }
    }
    for include in &self.decl_includes {
      writeln!(output, "#include \"{}.h\"", include).unwrap();
    }
    writeln!(output).unwrap();
    output.push_str(&self.decl_code);
    output
  }

  pub fn render_source(&self) -> String {
    let mut output = String::new();
    writeln!(output, "#include \"{}\"", PRELUDE_NAME).unwrap();
    writeln!(output, "#include \"{}\"", self.header_file_name()).unwrap();
    for include in &self.impl_includes {
      writeln!(output, "#include \"{}.h\"", include).unwrap();
    }
    writeln!(output).unwrap();
    output.push_str(&self.impl_code);
    output
  }
}

/// Declaration-dependency depth: 1 plus the deepest dependency.
fn ranks(types: &[TypeUnit]) -> Vec<usize> {
  let index: HashMap<TypeInstanceId, usize> = types.iter().enumerate().map(|(i, t)| (t.ty, i)).collect();
  let mut memo: Vec<Option<usize>> = vec![None; types.len()];
  let mut visiting = vec![false; types.len()];

  fn visit(
    at: usize,
    types: &[TypeUnit],
    index: &HashMap<TypeInstanceId, usize>,
    memo: &mut Vec<Option<usize>>,
    visiting: &mut Vec<bool>,
  ) -> usize {
    if let Some(rank) = memo[at] {
      return rank;
    }
    if visiting[at] {
      return 0;
    }
    visiting[at] = true;
    let deepest = types[at]
      .decl_deps
      .iter()
      .filter_map(|dep| index.get(dep).copied())
      .map(|dep| visit(dep, types, index, memo, visiting))
      .max()
      .unwrap_or(0);
    visiting[at] = false;
    memo[at] = Some(deepest + 1);
    deepest + 1
  }

  (0..types.len())
    .map(|at| visit(at, types, &index, &mut memo, &mut visiting))
    .collect()
}

/// Packs per-type output into size-bounded units.
///
/// Types are ordered root first, then by declaration-dependency rank, then by how many
/// other types depend on them, so every declaration precedes its uses. A unit is
/// closed once its text passes either threshold of `config.units`. The static
/// initializer lands in the first unit.
pub fn pack(
  types: Vec<TypeUnit>,
  init: StaticInit,
  root: Option<TypeInstanceId>,
  config: &IlcConfig,
) -> Vec<CompileUnit> {
  let rank = ranks(&types);
  let mut dependents: HashMap<TypeInstanceId, usize> = HashMap::new();
  for ty in &types {
    for dep in &ty.decl_deps {
      *dependents.entry(*dep).or_default() += 1;
    }
  }

  let mut order: Vec<usize> = (0..types.len()).collect();
  order.sort_by_key(|at| {
    let ty = &types[*at];
    (
      Some(ty.ty) != root,
      rank[*at],
      Reverse(dependents.get(&ty.ty).copied().unwrap_or(0)),
    )
  });

  let mut units = vec![CompileUnit::new(1)];
  let mut placement: HashMap<TypeInstanceId, usize> = HashMap::new();
  for at in order {
    if is_full(&units[units.len() - 1], config) {
      units.push(CompileUnit::new(units.len() + 1));
    }
    let unit_index = units.len() - 1;
    let ty = &types[at];
    let unit = &mut units[unit_index];
    unit.types.push(ty.name.clone());
    unit.decl_code.push_str(&ty.decl_code);
    unit.impl_code.push_str(&ty.impl_code);
    placement.insert(ty.ty, unit_index);
    trace_dbg!(config, DebugTrace::Packer, "{} (rank {}) -> {}", ty.name, rank[at], unit.name);
  }

  let mut decl_includes: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); units.len()];
  let mut impl_includes: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); units.len()];
  for ty in &types {
    let Some(home) = placement.get(&ty.ty).copied() else {
      continue;
    };
    decl_includes[home].extend(ty.decl_deps.iter().filter_map(|dep| placement.get(dep).copied()));
    impl_includes[home].extend(ty.impl_deps.iter().filter_map(|dep| placement.get(dep).copied()));
  }
  impl_includes[0].extend(init.deps.iter().filter_map(|dep| placement.get(dep).copied()));

  units[0].decl_code.push_str(&init.decl_code);
  units[0].impl_code.push_str(&init.impl_code);

  let names: Vec<String> = units.iter().map(|u| u.name.clone()).collect();
  for (home, unit) in units.iter_mut().enumerate() {
    unit.decl_includes = decl_includes[home]
      .iter()
      .filter(|at| **at != home)
      .map(|at| names[*at].clone())
      .collect();
    unit.impl_includes = impl_includes[home]
      .iter()
      .filter(|at| **at != home && !decl_includes[home].contains(*at))
      .map(|at| names[*at].clone())
      .collect();
  }

  units
}

fn is_full(
  unit: &CompileUnit,
  config: &IlcConfig,
) -> bool {
  unit.decl_code.len() > config.units.decl_threshold || unit.impl_code.len() > config.units.impl_threshold
}

/// Dump the unit layout: packed types, sizes and includes.
pub fn dump_units(units: &[CompileUnit]) -> String {
  let mut output = String::new();

  writeln!(&mut output, "=== Compile Units ===").unwrap();

  for unit in units {
    writeln!(
      &mut output,
      "  {} ({} decl bytes, {} impl bytes)",
      unit.name,
      unit.decl_code.len(),
      unit.impl_code.len()
    )
    .unwrap();
    for ty in &unit.types {
      writeln!(&mut output, "    type: {}", ty).unwrap();
    }
    if !unit.decl_includes.is_empty() {
      writeln!(&mut output, "    header includes: {}", unit.decl_includes.join(", ")).unwrap();
    }
    if !unit.impl_includes.is_empty() {
      writeln!(&mut output, "    source includes: {}", unit.impl_includes.join(", ")).unwrap();
    }
  }

  output
}

#[cfg(test)]
mod tests {
  use indexmap::IndexSet;
  use ilc_metadata::Id;

  use super::*;

  fn unit(
    index: u32,
    decl_deps: &[u32],
    impl_deps: &[u32],
    size: usize,
  ) -> TypeUnit {
    TypeUnit {
      ty: Id::new(index),
      name: format!("T{}", index),
      decl_code: "d".repeat(size),
      impl_code: "i".repeat(size),
      decl_deps: decl_deps.iter().map(|d| Id::new(*d)).collect::<IndexSet<_>>(),
      impl_deps: impl_deps.iter().map(|d| Id::new(*d)).collect::<IndexSet<_>>(),
    }
  }

  fn config(threshold: usize) -> IlcConfig {
    let mut config = IlcConfig::quiet();
    config.units.decl_threshold = threshold;
    config.units.impl_threshold = threshold;
    config
  }

  #[test]
  fn ranks_follow_declaration_depth() {
    let types = vec![unit(0, &[], &[], 1), unit(1, &[0], &[], 1), unit(2, &[1, 0], &[], 1), unit(3, &[], &[], 1)];
    assert_eq!(ranks(&types), vec![1, 2, 3, 1]);
  }

  #[test]
  fn root_leads_and_popular_types_break_ties() {
    // T3 is the root, T2 has two dependents, T1 none.
    let types = vec![unit(0, &[2], &[], 1), unit(1, &[], &[], 1), unit(2, &[], &[], 1), unit(3, &[], &[], 1), unit(4, &[2], &[], 1)];
    let units = pack(types, StaticInit::default(), Some(Id::new(3)), &config(1000));

    assert_eq!(units.len(), 1);
    assert_eq!(units[0].types, vec!["T3", "T2", "T1", "T0", "T4"]);
  }

  #[test]
  fn full_units_are_closed_and_includes_point_backwards() {
    let types = vec![unit(0, &[], &[], 8), unit(1, &[0], &[2], 8), unit(2, &[0], &[], 8)];
    let units = pack(types, StaticInit::default(), Some(Id::new(0)), &config(5));

    let names: Vec<&str> = units.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(names, vec!["il2cUnit_1", "il2cUnit_2", "il2cUnit_3"]);
    assert_eq!(units[1].decl_includes, vec!["il2cUnit_1"]);
    assert_eq!(units[2].decl_includes, vec!["il2cUnit_1"]);
    assert!(units.iter().all(|u| !u.decl_includes.contains(&u.name)));
  }

  #[test]
  fn includes_are_deduplicated_and_never_self_referential() {
    let types = vec![unit(0, &[], &[], 1), unit(1, &[0], &[0, 1], 1), unit(2, &[0], &[0, 1], 1)];
    let units = pack(types, StaticInit::default(), Some(Id::new(0)), &config(1000));

    assert_eq!(units.len(), 1);
    assert!(units[0].decl_includes.is_empty());
    assert!(units[0].impl_includes.is_empty());
  }

  #[test]
  fn static_initializer_goes_to_the_first_unit() {
    let types = vec![unit(0, &[], &[], 8), unit(1, &[], &[], 8)];
    let init = StaticInit {
      decl_code: "void il2c_static_init(void);\n".to_string(),
      impl_code: "void il2c_static_init(void) {}\n".to_string(),
      deps: [Id::new(1)].into_iter().collect(),
    };
    let units = pack(types, init, Some(Id::new(0)), &config(5));

    assert_eq!(units.len(), 2);
    assert!(units[0].decl_code.ends_with("void il2c_static_init(void);\n"));
    assert!(!units[1].impl_code.contains("il2c_static_init"));
    assert_eq!(units[0].impl_includes, vec!["il2cUnit_2"]);
  }

  #[test]
  fn rendered_files_carry_the_prelude() {
    let mut unit = CompileUnit::new(2);
    unit.decl_includes = vec!["il2cUnit_1".to_string()];
    unit.decl_code = "struct cls_A;\n".to_string();

    let header = unit.render_header(&[CHeader::system("math.h")]);
    assert_eq!(
      header,
      "#pragma once\n#include \"il2c.h\"\n#include <math.h>\n#include \"il2cUnit_1.h\"\n\nstruct cls_A;\n"
    );
    assert!(unit.render_source().starts_with("#include \"il2c.h\"\n#include \"il2cUnit_2.h\"\n"));
  }
}
