mod common;

use std::sync::Arc;

use common::*;
use ilc_config::IlcConfig;
use ilc_metadata::{GenericParam, Metadata, MetadataBuilder, MethodDefId, MethodFlags, MethodRef, MethodSig, TypeSig};
use ilc_mono::{SignatureKey, SlotEntry, TypeKey, VTableBuilder};

fn builder() -> VTableBuilder {
  VTableBuilder::new(Arc::new(IlcConfig::quiet()))
}

fn eq_sig(param: TypeSig) -> MethodSig {
  MethodSig::instance(TypeSig::Boolean, vec![param])
}

struct Equatable {
  metadata: Metadata,
  ieq: ilc_metadata::TypeDefId,
  ieq_eq: MethodDefId,
  pair: ilc_metadata::TypeDefId,
  pair_eq: MethodDefId,
  manual: ilc_metadata::TypeDefId,
  string: ilc_metadata::TypeDefId,
}

/// `Pair<T,U> : IEq<T>` next to a hand-written `IntPair : IEq<int32>`.
fn equatable() -> Equatable {
  let mut b = MetadataBuilder::new("equatable");
  let core = corlib(&mut b);

  let ieq = b.interface("Demo", "IEq`1");
  b.set_generic_params(ieq, vec![GenericParam::new("T")]);
  let ieq_eq = b.method(ieq, "Eq", MethodFlags::abstract_new_slot(), eq_sig(TypeSig::var(ieq, 0)));

  let pair = b.class("Demo", "Pair`2", Some(TypeSig::Class(core.object)));
  b.set_generic_params(pair, vec![GenericParam::new("T"), GenericParam::new("U")]);
  b.implement(pair, TypeSig::generic(ieq, vec![TypeSig::var(pair, 0)]));
  let pair_eq = b.method(pair, "Eq", MethodFlags::virtual_new_slot(), eq_sig(TypeSig::var(pair, 0)));

  let manual = b.class("Demo", "IntPair", Some(TypeSig::Class(core.object)));
  b.implement(manual, TypeSig::generic(ieq, vec![TypeSig::I4]));
  b.method(manual, "Eq", MethodFlags::virtual_new_slot(), eq_sig(TypeSig::I4));

  Equatable {
    metadata: b.build(),
    ieq,
    ieq_eq,
    pair,
    pair_eq,
    manual,
    string: core.string,
  }
}

#[test]
fn expanded_table_matches_the_open_table_with_arguments_written_in() {
  let e = equatable();
  let mut builder = builder();
  let key = TypeKey::new(e.pair, vec![TypeSig::I4, TypeSig::Class(e.string)]);

  let concrete = builder.resolve(&e.metadata, &key).unwrap();
  let open = builder.cached(&TypeKey::open(&e.metadata, e.pair)).unwrap();

  assert_eq!(*concrete, open.instantiate(&e.metadata, &key));
  assert_eq!(builder.built_count(), 5);

  let entry = SlotEntry::new(TypeKey::new(e.ieq, vec![TypeSig::I4]), e.ieq_eq);
  assert_eq!(
    concrete.implementation_of(&entry),
    Some(&SlotEntry::new(key.clone(), e.pair_eq))
  );
}

#[test]
fn expanded_table_has_the_shape_of_a_hand_written_specialization() {
  let e = equatable();
  let mut builder = builder();
  let expanded = builder
    .resolve(&e.metadata, &TypeKey::new(e.pair, vec![TypeSig::I4, TypeSig::Class(e.string)]))
    .unwrap();
  let manual = builder.resolve(&e.metadata, &TypeKey::new(e.manual, vec![])).unwrap();

  let shape = |table: &ilc_mono::VirtualTable| -> Vec<String> {
    table
      .slots
      .iter()
      .map(|(key, slot)| format!("{} x{}", key.display(&e.metadata), slot.entries.len()))
      .collect()
  };
  assert_eq!(shape(&expanded), shape(&manual));
  assert_eq!(shape(&expanded), vec!["Finalize() -> void x1", "Eq(int32) -> bool x2"]);
}

#[test]
fn colliding_instantiations_keep_the_first_binding() {
  let mut b = MetadataBuilder::new("collide");
  let core = corlib(&mut b);
  let ieq = b.interface("Demo", "IEq`1");
  b.set_generic_params(ieq, vec![GenericParam::new("T")]);
  let ieq_eq = b.method(ieq, "Eq", MethodFlags::abstract_new_slot(), eq_sig(TypeSig::var(ieq, 0)));

  let pair = b.class("Demo", "Pair`2", Some(TypeSig::Class(core.object)));
  b.set_generic_params(pair, vec![GenericParam::new("T"), GenericParam::new("U")]);
  b.implement(pair, TypeSig::generic(ieq, vec![TypeSig::var(pair, 0)]));
  b.implement(pair, TypeSig::generic(ieq, vec![TypeSig::var(pair, 1)]));
  let first = b.method(pair, "Eq", MethodFlags::virtual_new_slot(), eq_sig(TypeSig::var(pair, 0)));
  b.method(pair, "Eq", MethodFlags::virtual_new_slot(), eq_sig(TypeSig::var(pair, 1)));
  let metadata = b.build();

  let key = TypeKey::new(pair, vec![TypeSig::I4, TypeSig::I4]);
  let table = builder().resolve(&metadata, &key).unwrap();

  let entry = SlotEntry::new(TypeKey::new(ieq, vec![TypeSig::I4]), ieq_eq);
  assert_eq!(table.implementation_of(&entry), Some(&SlotEntry::new(key, first)));
  let eq_keys = table.slots.keys().filter(|k| k.name == "Eq").count();
  assert_eq!(eq_keys, 1);
}

#[test]
fn generic_virtual_methods_share_a_slot_across_the_hierarchy() {
  let mut b = MetadataBuilder::new("generic-methods");
  let core = corlib(&mut b);
  let base = b.class("Demo", "Mapper", Some(TypeSig::Class(core.object)));
  let map = b.method(base, "Map", MethodFlags::virtual_new_slot(), MethodSig::instance(TypeSig::Void, vec![]));
  b.set_method_generic_params(map, vec![GenericParam::new("T")]);
  b.method_mut(map).sig.params = vec![TypeSig::mvar(map, 0)];

  let derived = b.class("Demo", "UpperMapper", Some(TypeSig::Class(base)));
  let upper = b.method(
    derived,
    "Map",
    MethodFlags::virtual_reuse_slot(),
    MethodSig::instance(TypeSig::Void, vec![]),
  );
  b.set_method_generic_params(upper, vec![GenericParam::new("U")]);
  b.method_mut(upper).sig.params = vec![TypeSig::mvar(upper, 0)];
  let metadata = b.build();

  let table = builder().resolve(&metadata, &TypeKey::new(derived, vec![])).unwrap();
  let key = SignatureKey::of_method(&metadata, map, &ilc_mono::GenericContext::empty());

  let slot = table.slot(&key).unwrap();
  assert_eq!(slot.implementation, Some(SlotEntry::new(TypeKey::new(derived, vec![]), upper)));
  assert_eq!(
    slot.new_slot_entry,
    Some(SlotEntry::new(TypeKey::new(base, vec![]), map))
  );
}

#[test]
fn abstract_types_keep_pending_entries() {
  let mut b = MetadataBuilder::new("pending");
  let core = corlib(&mut b);
  let shape = b.interface("Demo", "IShape");
  b.method(shape, "Area", MethodFlags::abstract_new_slot(), void_sig());
  let partial = b.class("Demo", "ShapeBase", Some(TypeSig::Class(core.object)));
  b.set_abstract(partial);
  b.implement(partial, TypeSig::Class(shape));
  let broken = b.class("Demo", "Broken", Some(TypeSig::Class(core.object)));
  b.implement(broken, TypeSig::Class(shape));
  let metadata = b.build();

  let mut builder = builder();
  let table = builder.resolve(&metadata, &TypeKey::new(partial, vec![])).unwrap();
  assert!(!table.is_complete());
  assert_eq!(table.pending.len(), 1);

  let err = builder.resolve(&metadata, &TypeKey::new(broken, vec![])).unwrap_err();
  assert_eq!(err.code(), "IL0020");
  assert_eq!(err.to_string(), "Concrete type 'Demo.Broken' does not implement 'Area() -> void'");
}

#[test]
fn explicit_override_rules_are_enforced() {
  let mut b = MetadataBuilder::new("overrides");
  let core = corlib(&mut b);
  let base = b.class("Demo", "Base", Some(TypeSig::Class(core.object)));
  let plain = b.method(base, "Plain", MethodFlags::instance(), void_sig());
  let run = b.method(base, "Run", MethodFlags::virtual_new_slot(), void_sig());
  let stranger = b.class("Demo", "Stranger", Some(TypeSig::Class(core.object)));
  let foreign = b.method(stranger, "Run", MethodFlags::virtual_new_slot(), void_sig());

  let cases: [(&str, MethodFlags, Vec<MethodRef>, &str); 4] = [
    ("NonVirtual", MethodFlags::instance(), vec![MethodRef::Def(run)], "IL0025"),
    ("Unrelated", MethodFlags::virtual_new_slot(), vec![MethodRef::Def(foreign)], "IL0022"),
    ("NotVirtual", MethodFlags::virtual_new_slot(), vec![MethodRef::Def(plain)], "IL0023"),
    (
      "Twice",
      MethodFlags::virtual_new_slot(),
      vec![MethodRef::Def(run), MethodRef::Def(run)],
      "IL0024",
    ),
  ];

  let mut types = Vec::new();
  for (name, flags, targets, code) in cases {
    let ty = b.class("Demo", name, Some(TypeSig::Class(base)));
    let method = b.method(ty, "Impl", flags, void_sig());
    for target in targets {
      b.add_override(method, target);
    }
    types.push((ty, code));
  }
  let metadata = b.build();

  for (ty, code) in types {
    let err = builder().resolve(&metadata, &TypeKey::new(ty, vec![])).unwrap_err();
    assert_eq!(err.code(), code, "{}", metadata.full_name(ty));
  }
}
