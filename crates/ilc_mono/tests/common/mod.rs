#![allow(dead_code)]

use std::rc::Rc;
use std::sync::Arc;

use ilc_config::IlcConfig;
use ilc_diagnostics::message::DiagnosticMessage;
use ilc_metadata::{
  Instruction, Metadata, MetadataBuilder, MethodDefId, MethodFlags, MethodRef, MethodSig, OpCode, Operand, TypeDefId,
  TypeSig,
};
use ilc_mono::{MethodInstanceId, ProcessState, Resolver, TypeInstanceId};

/// Handles of the minimal core library every scenario starts from.
pub struct Corlib {
  pub object: TypeDefId,
  pub string: TypeDefId,
  pub object_ctor: MethodDefId,
  pub finalize: MethodDefId,
}

pub fn corlib(b: &mut MetadataBuilder) -> Corlib {
  let object = b.class("System", "Object", None);
  b.set_object(object);
  let object_ctor = b.method(object, ".ctor", MethodFlags::ctor(), void_sig());
  b.set_body(object_ctor, vec![ret()]);
  let finalize = b.method(object, "Finalize", MethodFlags::virtual_new_slot(), void_sig());
  b.set_body(finalize, vec![ret()]);

  let string = b.class("System", "String", Some(TypeSig::Class(object)));
  b.set_string(string);

  Corlib {
    object,
    string,
    object_ctor,
    finalize,
  }
}

pub fn void_sig() -> MethodSig {
  MethodSig::instance(TypeSig::Void, vec![])
}

pub fn ret() -> Instruction {
  Instruction::simple(OpCode::Ret)
}

pub fn pop() -> Instruction {
  Instruction::simple(OpCode::Pop)
}

pub fn ldarg(index: u16) -> Instruction {
  Instruction::new(OpCode::Ldarg, Operand::Arg(index))
}

pub fn call(method: MethodDefId) -> Instruction {
  Instruction::new(OpCode::Call, Operand::Method(MethodRef::Def(method)))
}

pub fn callvirt(method: MethodDefId) -> Instruction {
  Instruction::new(OpCode::Callvirt, Operand::Method(MethodRef::Def(method)))
}

pub fn newobj(ctor: MethodDefId) -> Instruction {
  Instruction::new(OpCode::Newobj, Operand::Method(MethodRef::Def(ctor)))
}

pub fn with_ref(
  opcode: OpCode,
  method: MethodRef,
) -> Instruction {
  Instruction::new(opcode, Operand::Method(method))
}

pub fn member(
  parent: TypeSig,
  name: &str,
  sig: MethodSig,
) -> MethodRef {
  MethodRef::Member {
    parent,
    name: name.to_string(),
    sig,
  }
}

/// Parameterless constructor chaining to `base_ctor`.
pub fn ctor(
  b: &mut MetadataBuilder,
  owner: TypeDefId,
  base_ctor: MethodDefId,
) -> MethodDefId {
  let ctor = b.method(owner, ".ctor", MethodFlags::ctor(), void_sig());
  b.set_body(ctor, vec![ldarg(0), call(base_ctor), ret()]);
  ctor
}

/// Virtual method with an empty body.
pub fn virtual_method(
  b: &mut MetadataBuilder,
  owner: TypeDefId,
  name: &str,
  flags: MethodFlags,
) -> MethodDefId {
  let method = b.method(owner, name, flags, void_sig());
  b.set_body(method, vec![ret()]);
  method
}

pub fn static_main(
  b: &mut MetadataBuilder,
  owner: TypeDefId,
  body: Vec<Instruction>,
) -> MethodDefId {
  let main = b.method(
    owner,
    "Main",
    MethodFlags::static_method(),
    MethodSig::static_sig(TypeSig::Void, vec![]),
  );
  b.set_body(main, body);
  main
}

pub fn resolve(
  metadata: Metadata,
  entries: &[MethodDefId],
) -> Result<Resolver, DiagnosticMessage> {
  let mut resolver = Resolver::new(Rc::new(metadata), Arc::new(IlcConfig::quiet()));
  for entry in entries {
    resolver.add_entry_point(*entry)?;
  }
  resolver.process()?;
  Ok(resolver)
}

pub fn find_method(
  resolver: &Resolver,
  name: &str,
) -> Option<MethodInstanceId> {
  resolver
    .store()
    .methods()
    .map(|(id, _)| id)
    .find(|id| resolver.method_name(*id) == name)
}

pub fn find_type(
  resolver: &Resolver,
  name: &str,
) -> Option<TypeInstanceId> {
  resolver
    .store()
    .types()
    .map(|(id, _)| id)
    .find(|id| resolver.type_name(*id) == name)
}

pub fn is_processed(
  resolver: &Resolver,
  name: &str,
) -> bool {
  find_method(resolver, name)
    .map(|id| resolver.store().method_instance(id).state == ProcessState::Processed)
    .unwrap_or(false)
}

/// Display names of the implementations dispatch found for `name`.
pub fn dispatch_targets(
  resolver: &Resolver,
  name: &str,
) -> Vec<String> {
  let Some(id) = find_method(resolver, name) else {
    return Vec::new();
  };
  resolver
    .store()
    .method_instance(id)
    .override_impls
    .iter()
    .map(|m| resolver.method_name(*m))
    .collect()
}
