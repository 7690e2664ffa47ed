#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ilc_config::{DumpKind, IlcBuildConfig, IlcConfig};
use ilc_metadata::{Instruction, Metadata, MetadataBuilder, MethodDefId, MethodFlags, MethodRef, MethodSig, OpCode, Operand, TypeSig};

fn void_sig() -> MethodSig {
  MethodSig::instance(TypeSig::Void, vec![])
}

fn ret() -> Instruction {
  Instruction::simple(OpCode::Ret)
}

fn call(
  opcode: OpCode,
  method: MethodDefId,
) -> Instruction {
  Instruction::new(opcode, Operand::Method(MethodRef::Def(method)))
}

/// `Demo.Shape` with two constructed subclasses overriding `Area`, called virtually from `Main`.
pub fn shapes() -> Metadata {
  let mut b = MetadataBuilder::new("shapes");

  let object = b.class("System", "Object", None);
  b.set_object(object);
  let object_ctor = b.method(object, ".ctor", MethodFlags::ctor(), void_sig());
  b.set_body(object_ctor, vec![ret()]);

  let shape = b.class("Demo", "Shape", Some(TypeSig::Class(object)));
  b.set_abstract(shape);
  let shape_ctor = b.method(shape, ".ctor", MethodFlags::ctor(), void_sig());
  b.set_body(
    shape_ctor,
    vec![Instruction::new(OpCode::Ldarg, Operand::Arg(0)), call(OpCode::Call, object_ctor), ret()],
  );
  let area = b.method(
    shape,
    "Area",
    MethodFlags::abstract_new_slot(),
    MethodSig::instance(TypeSig::I4, vec![]),
  );

  let mut ctors = Vec::new();
  for (name, value) in [("Square", 4), ("Circle", 3)] {
    let ty = b.class("Demo", name, Some(TypeSig::Class(shape)));
    let ctor = b.method(ty, ".ctor", MethodFlags::ctor(), void_sig());
    b.set_body(
      ctor,
      vec![Instruction::new(OpCode::Ldarg, Operand::Arg(0)), call(OpCode::Call, shape_ctor), ret()],
    );
    let method = b.method(
      ty,
      "Area",
      MethodFlags::virtual_reuse_slot(),
      MethodSig::instance(TypeSig::I4, vec![]),
    );
    b.set_body(method, vec![Instruction::new(OpCode::LdcI4, Operand::Int32(value)), ret()]);
    ctors.push(ctor);
  }

  let program = b.class("Demo", "Program", Some(TypeSig::Class(object)));
  let main = b.method(
    program,
    "Main",
    MethodFlags::static_method(),
    MethodSig::static_sig(TypeSig::I4, vec![]),
  );
  b.set_body(
    main,
    vec![
      call(OpCode::Newobj, ctors[0]),
      Instruction::simple(OpCode::Pop),
      call(OpCode::Newobj, ctors[1]),
      call(OpCode::Callvirt, area),
      ret(),
    ],
  );

  b.build()
}

/// Writes `metadata` as JSON into `dir` and returns the file path.
pub fn write_model(
  dir: &Path,
  metadata: &Metadata,
) -> PathBuf {
  let path = dir.join("model.json");
  std::fs::write(&path, metadata.to_json()).unwrap();
  path
}

pub fn build_config(
  entries: &[&str],
  output_dir: &Path,
  dump: Vec<DumpKind>,
  dump_dir: Option<&Path>,
) -> Arc<IlcConfig> {
  let mut config = IlcConfig::quiet();
  config.build_config = Some(IlcBuildConfig::new(
    None,
    entries.iter().map(|e| e.to_string()).collect(),
    output_dir.display().to_string(),
    dump,
    dump_dir.map(|d| d.display().to_string()),
    false,
  ));
  Arc::new(config)
}
