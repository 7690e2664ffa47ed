mod common;

use std::rc::Rc;
use std::sync::Arc;

use common::*;
use ilc_config::IlcConfig;
use ilc_diagnostics::message::DiagnosticMessage;
use ilc_metadata::{GenericParam, MetadataBuilder, MethodFlags, MethodSig, OpCode, TypeSig};
use ilc_mono::Resolver;

fn error_code(result: Result<Resolver, DiagnosticMessage>) -> String {
  match result {
    Ok(_) => "ok".to_string(),
    Err(err) => err.code(),
  }
}

#[test]
fn constructing_an_incomplete_type_is_fatal() {
  let mut b = MetadataBuilder::new("incomplete");
  let core = corlib(&mut b);
  let shape = b.interface("Demo", "IShape");
  b.method(shape, "Area", MethodFlags::abstract_new_slot(), void_sig());
  let broken = b.class("Demo", "Broken", Some(TypeSig::Class(core.object)));
  b.implement(broken, TypeSig::Class(shape));
  let broken_ctor = ctor(&mut b, broken, core.object_ctor);
  let program = b.class("Demo", "Program", Some(TypeSig::Class(core.object)));
  let main = static_main(&mut b, program, vec![newobj(broken_ctor), ret()]);

  assert_eq!(error_code(resolve(b.build(), &[main])), "IL0020");
}

#[test]
fn missing_member_reports_the_referrer() {
  let mut b = MetadataBuilder::new("missing");
  let core = corlib(&mut b);
  let program = b.class("Demo", "Program", Some(TypeSig::Class(core.object)));
  let main = static_main(
    &mut b,
    program,
    vec![
      with_ref(OpCode::Call, member(TypeSig::Class(core.object), "Missing", void_sig())),
      ret(),
    ],
  );

  let err = resolve(b.build(), &[main]).err().unwrap();
  assert_eq!(err.code(), "IL0011");
  let report = ilc_diagnostics::format_plain(&err.report());
  assert_eq!(
    report,
    "error[IL0011]: Cannot resolve method 'System.Object::Missing' with signature void() (note: referenced from Demo.Program::Main)"
  );
}

#[test]
fn wrong_generic_arity_is_fatal() {
  let mut b = MetadataBuilder::new("arity");
  let core = corlib(&mut b);
  let pair = b.class("Demo", "Pair`2", Some(TypeSig::Class(core.object)));
  b.set_generic_params(pair, vec![GenericParam::new("T"), GenericParam::new("U")]);
  ctor(&mut b, pair, core.object_ctor);
  let program = b.class("Demo", "Program", Some(TypeSig::Class(core.object)));
  let main = static_main(
    &mut b,
    program,
    vec![
      with_ref(
        OpCode::Newobj,
        member(TypeSig::generic(pair, vec![TypeSig::I4]), ".ctor", void_sig()),
      ),
      ret(),
    ],
  );

  assert_eq!(error_code(resolve(b.build(), &[main])), "IL0013");
}

#[test]
fn generic_and_unknown_entry_points_are_rejected() {
  let mut b = MetadataBuilder::new("entries");
  let core = corlib(&mut b);
  let program = b.class("Demo", "Program", Some(TypeSig::Class(core.object)));
  let generic = b.method(
    program,
    "Run",
    MethodFlags::static_method(),
    MethodSig::static_sig(TypeSig::Void, vec![]),
  );
  b.set_method_generic_params(generic, vec![GenericParam::new("T")]);
  b.set_body(generic, vec![ret()]);

  let mut resolver = Resolver::new(Rc::new(b.build()), Arc::new(IlcConfig::quiet()));
  assert_eq!(resolver.add_entry_point(generic).unwrap_err().code(), "IL0015");
  assert_eq!(resolver.add_entry_by_name("Demo.Nowhere::Main").unwrap_err().code(), "IL0015");
  assert_eq!(resolver.add_entry_by_name("Demo.Program::Main").unwrap_err().code(), "IL0015");
  assert_eq!(resolver.add_entry_by_name("Main").unwrap_err().code(), "IL0015");

  let id = resolver
    .add_generic_entry_point(generic, vec![], vec![TypeSig::I4])
    .unwrap();
  resolver.process().unwrap();
  assert_eq!(resolver.method_name(id), "Demo.Program::Run<int32>");
}

#[test]
fn entry_handles_outside_the_model_are_rejected() {
  let mut b = MetadataBuilder::new("dangling");
  corlib(&mut b);
  let mut resolver = Resolver::new(Rc::new(b.build()), Arc::new(IlcConfig::quiet()));
  let dangling: ilc_metadata::MethodDefId = ilc_metadata::Id::new(42);

  let err = resolver.add_entry_point(dangling).unwrap_err();
  assert_eq!(err.code(), "IL0015");
  assert_eq!(err.to_string(), "Invalid entry point '#42': no such method in the loaded model");
  assert_eq!(
    resolver
      .add_generic_entry_point(dangling, vec![], vec![])
      .unwrap_err()
      .code(),
    "IL0015"
  );
  assert!(resolver.entry_points().is_empty());
}

#[test]
fn cyclic_inheritance_is_fatal() {
  let mut b = MetadataBuilder::new("cycle");
  let core = corlib(&mut b);
  let first = b.class("Demo", "A", None);
  let second = b.class("Demo", "B", Some(TypeSig::Class(first)));
  b.type_mut(first).base = Some(TypeSig::Class(second));
  let make = b.method(first, "Make", MethodFlags::static_method(), MethodSig::static_sig(TypeSig::Void, vec![]));
  b.set_body(make, vec![ret()]);
  let program = b.class("Demo", "Program", Some(TypeSig::Class(core.object)));
  let main = static_main(&mut b, program, vec![call(make), ret()]);

  assert_eq!(error_code(resolve(b.build(), &[main])), "IL0026");
}

struct StaticContract {
  builder: MetadataBuilder,
  main: ilc_metadata::MethodDefId,
  implementation: ilc_metadata::TypeDefId,
}

/// Virtual call through a static interface member, which never occupies a slot.
fn static_contract() -> StaticContract {
  let mut b = MetadataBuilder::new("static-contract");
  let core = corlib(&mut b);
  let contract = b.interface("Demo", "IFactory");
  let mut flags = MethodFlags::abstract_new_slot();
  flags.is_static = true;
  let make = b.method(contract, "Make", flags, MethodSig::static_sig(TypeSig::Void, vec![]));

  let implementation = b.class("Demo", "Factory", Some(TypeSig::Class(core.object)));
  b.implement(implementation, TypeSig::Class(contract));
  let implementation_ctor = ctor(&mut b, implementation, core.object_ctor);

  let program = b.class("Demo", "Program", Some(TypeSig::Class(core.object)));
  let main = static_main(&mut b, program, vec![newobj(implementation_ctor), callvirt(make), ret()]);

  StaticContract {
    builder: b,
    main,
    implementation,
  }
}

#[test]
fn unbound_dispatch_within_one_version_is_fatal() {
  let StaticContract { builder, main, .. } = static_contract();

  let err = resolve(builder.build(), &[main]).err().unwrap();
  assert_eq!(err.code(), "IL0030");
  assert!(err.is_fatal());
}

#[test]
fn unbound_dispatch_across_versions_is_a_warning() {
  let StaticContract {
    mut builder,
    main,
    implementation,
  } = static_contract();
  builder.set_version(implementation, 2);

  let resolver = resolve(builder.build(), &[main]).unwrap();

  assert_eq!(resolver.diagnostics().len(), 1);
  let warning = &resolver.diagnostics()[0];
  assert_eq!(warning.code(), "IL0031");
  assert!(!warning.is_fatal());
  assert!(dispatch_targets(&resolver, "Demo.IFactory::Make").is_empty());
}
