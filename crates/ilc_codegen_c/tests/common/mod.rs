#![allow(dead_code)]

use std::rc::Rc;
use std::sync::Arc;

use ilc_codegen_c::{generate, CompileUnit, DefaultTranslator};
use ilc_config::IlcConfig;
use ilc_metadata::{
  FieldRef, Instruction, MethodBody, MethodDefId, MethodFlags, MethodRef, MethodSig, MetadataBuilder, OpCode, Operand,
  TypeSig,
};
use ilc_mono::Resolver;

fn void_sig() -> MethodSig {
  MethodSig::instance(TypeSig::Void, vec![])
}

fn op(opcode: OpCode) -> Instruction {
  Instruction::simple(opcode)
}

fn method_op(
  opcode: OpCode,
  method: MethodDefId,
) -> Instruction {
  Instruction::new(opcode, Operand::Method(MethodRef::Def(method)))
}

fn field_op(
  opcode: OpCode,
  field: ilc_metadata::FieldDefId,
) -> Instruction {
  Instruction::new(opcode, Operand::Field(FieldRef::Def(field)))
}

/// `Counter` with an instance field, a static field and a static constructor, a
/// `Loud` subclass overriding `Speak`, a `Point` value type and a `Main` using all of them.
pub fn counters() -> (ilc_metadata::Metadata, MethodDefId) {
  let mut b = MetadataBuilder::new("counters");

  let object = b.class("System", "Object", None);
  b.set_object(object);
  let object_ctor = b.method(object, ".ctor", MethodFlags::ctor(), void_sig());
  b.set_body(object_ctor, vec![op(OpCode::Ret)]);
  let string = b.class("System", "String", Some(TypeSig::Class(object)));
  b.set_string(string);

  let counter = b.class("Demo", "Counter", Some(TypeSig::Class(object)));
  let count = b.field(counter, "count", false, TypeSig::I4);
  let total = b.field(counter, "total", true, TypeSig::I4);
  let cctor = b.method(
    counter,
    ".cctor",
    MethodFlags::cctor(),
    MethodSig::static_sig(TypeSig::Void, vec![]),
  );
  b.set_body(
    cctor,
    vec![
      Instruction::new(OpCode::LdcI4, Operand::Int32(5)),
      field_op(OpCode::Stsfld, total),
      op(OpCode::Ret),
    ],
  );
  let counter_ctor = b.method(counter, ".ctor", MethodFlags::ctor(), void_sig());
  b.set_body(
    counter_ctor,
    vec![
      Instruction::new(OpCode::Ldarg, Operand::Arg(0)),
      method_op(OpCode::Call, object_ctor),
      op(OpCode::Ret),
    ],
  );
  let speak = b.method(
    counter,
    "Speak",
    MethodFlags::virtual_new_slot(),
    MethodSig::instance(TypeSig::I4, vec![]),
  );
  b.set_body(
    speak,
    vec![
      Instruction::new(OpCode::Ldarg, Operand::Arg(0)),
      field_op(OpCode::Ldfld, count),
      field_op(OpCode::Ldsfld, total),
      op(OpCode::Add),
      op(OpCode::Ret),
    ],
  );

  let loud = b.class("Demo", "Loud", Some(TypeSig::Class(counter)));
  let loud_ctor = b.method(loud, ".ctor", MethodFlags::ctor(), void_sig());
  b.set_body(
    loud_ctor,
    vec![
      Instruction::new(OpCode::Ldarg, Operand::Arg(0)),
      method_op(OpCode::Call, counter_ctor),
      op(OpCode::Ret),
    ],
  );
  let loud_speak = b.method(
    loud,
    "Speak",
    MethodFlags::virtual_reuse_slot(),
    MethodSig::instance(TypeSig::I4, vec![]),
  );
  b.set_body(
    loud_speak,
    vec![Instruction::new(OpCode::LdcI4, Operand::Int32(7)), op(OpCode::Ret)],
  );

  let point = b.value_type("Demo", "Point", None);
  let x = b.field(point, "x", false, TypeSig::I4);

  let program = b.class("Demo", "Program", Some(TypeSig::Class(object)));
  let main = b.method(
    program,
    "Main",
    MethodFlags::static_method(),
    MethodSig::static_sig(TypeSig::Void, vec![]),
  );
  let mut body = MethodBody::new(vec![
    method_op(OpCode::Newobj, counter_ctor),
    Instruction::new(OpCode::Stloc, Operand::Local(0)),
    method_op(OpCode::Newobj, loud_ctor),
    op(OpCode::Pop),
    Instruction::new(OpCode::Ldloc, Operand::Local(0)),
    method_op(OpCode::Callvirt, speak),
    Instruction::new(OpCode::Brtrue, Operand::Branch(9)),
    Instruction::new(OpCode::Ldstr, Operand::String("none".to_string())),
    op(OpCode::Pop),
    Instruction::new(OpCode::Ldloca, Operand::Local(1)),
    Instruction::new(OpCode::LdcI4, Operand::Int32(3)),
    field_op(OpCode::Stfld, x),
    op(OpCode::Ret),
  ]);
  body.locals = vec![TypeSig::Class(counter), TypeSig::ValueType(point)];
  b.set_full_body(main, body);

  (b.build(), main)
}

pub fn resolve_with(
  metadata: ilc_metadata::Metadata,
  entry: MethodDefId,
  config: IlcConfig,
) -> Resolver {
  let mut resolver = Resolver::new(Rc::new(metadata), Arc::new(config));
  resolver.add_entry_point(entry).unwrap();
  resolver.process().unwrap();
  resolver
}

pub fn compile_units(config: IlcConfig) -> Vec<CompileUnit> {
  let (metadata, main) = counters();
  let resolver = resolve_with(metadata, main, config);
  generate(&resolver, &DefaultTranslator)
}

/// `Pair` declares `first` then `second`; the only body stores `second` first.
pub fn pair_units() -> Vec<CompileUnit> {
  let mut b = MetadataBuilder::new("pair");
  let object = b.class("System", "Object", None);
  b.set_object(object);

  let pair = b.value_type("Demo", "Pair", None);
  let first = b.field(pair, "first", false, TypeSig::I4);
  let second = b.field(pair, "second", false, TypeSig::I8);

  let program = b.class("Demo", "Program", Some(TypeSig::Class(object)));
  let main = b.method(
    program,
    "Main",
    MethodFlags::static_method(),
    MethodSig::static_sig(TypeSig::Void, vec![]),
  );
  let mut body = MethodBody::new(vec![
    Instruction::new(OpCode::Ldloca, Operand::Local(0)),
    Instruction::new(OpCode::LdcI8, Operand::Int64(2)),
    field_op(OpCode::Stfld, second),
    Instruction::new(OpCode::Ldloca, Operand::Local(0)),
    Instruction::new(OpCode::LdcI4, Operand::Int32(1)),
    field_op(OpCode::Stfld, first),
    op(OpCode::Ret),
  ]);
  body.locals = vec![TypeSig::ValueType(pair)];
  b.set_full_body(main, body);

  let resolver = resolve_with(b.build(), main, IlcConfig::quiet());
  generate(&resolver, &DefaultTranslator)
}

/// Every header followed by every source, as one string.
pub fn all_text(units: &[CompileUnit]) -> String {
  let mut text = String::new();
  for unit in units {
    text.push_str(&unit.render_header(&[]));
    text.push_str(&unit.render_source());
  }
  text
}

/// The definition of the C function `name`, from its signature line to the closing brace.
pub fn function<'a>(
  text: &'a str,
  name: &str,
) -> &'a str {
  let start = text
    .lines()
    .scan(0, |offset, line| {
      let at = *offset;
      *offset += line.len() + 1;
      Some((at, line))
    })
    .find(|(_, line)| !line.starts_with(' ') && line.contains(&format!(" {}(", name)) && !line.ends_with(';'))
    .map(|(at, _)| at)
    .unwrap_or_else(|| panic!("no definition of {}", name));
  let end = text[start..].find("\n}\n").map(|e| start + e + 3).unwrap();
  &text[start..end]
}
