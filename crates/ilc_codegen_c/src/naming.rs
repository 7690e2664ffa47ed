//! C identifiers for type, method and field instances.

use std::collections::{HashMap, HashSet};

use ilc_metadata::TypeSig;
use ilc_mono::instance::TypeIdentity;
use ilc_mono::{FieldInstanceId, MethodInstanceId, Resolver, TypeInstanceId, TypeKey};

/// Maps a display name onto a C identifier fragment.
///
/// ASCII letters and digits are kept, everything else becomes `_`. Collisions are
/// resolved by [`NameTable`], never here.
pub fn escape_identifier(name: &str) -> String {
  name
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
    .collect()
}

/// Instance behind a concrete signature, if one was interned.
pub fn instance_of(
  resolver: &Resolver,
  sig: &TypeSig,
) -> Option<TypeInstanceId> {
  let key = TypeKey::from_sig(resolver.metadata(), sig)?;
  let version = resolver.metadata().type_def(key.def).version;
  resolver.store().lookup_type(&TypeIdentity { key, version })
}

/// Every interned type mentioned by `sig`, looking through pointers and references.
pub fn sig_instances(
  resolver: &Resolver,
  sig: &TypeSig,
) -> Vec<TypeInstanceId> {
  match sig.strip_modifiers() {
    TypeSig::Ptr(inner) | TypeSig::ByRef(inner) => sig_instances(resolver, inner),
    sig => instance_of(resolver, sig).into_iter().collect(),
  }
}

/// Interned fields of `id` in declaration order, independent of which body touched them first.
pub fn declared_fields(
  resolver: &Resolver,
  id: TypeInstanceId,
) -> Vec<FieldInstanceId> {
  let ty = resolver.store().type_instance(id);
  resolver
    .metadata()
    .type_def(ty.def())
    .fields
    .iter()
    .filter_map(|field| ty.fields.get(field).copied())
    .collect()
}

/// Kind of C aggregate a type instance maps to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TypeShape {
  /// Heap object reached through a pointer, starts with the `type_id` header.
  Class,
  /// Laid out inline wherever it is used.
  Struct,
  /// No aggregate of its own; references use the root object layout.
  Interface,
}

/// Deterministic, collision-free names for everything the generator emits.
///
/// Names are assigned in a fixed walk over the instance store (root type first), so
/// the same resolution always yields the same identifiers.
#[derive(Debug, Default)]
pub struct NameTable {
  types: HashMap<TypeInstanceId, String>,
  shapes: HashMap<TypeInstanceId, TypeShape>,
  type_ids: HashMap<TypeInstanceId, u32>,
  methods: HashMap<MethodInstanceId, String>,
  dispatchers: HashMap<MethodInstanceId, String>,
  fields: HashMap<FieldInstanceId, String>,
  root: Option<TypeInstanceId>,
  order: Vec<TypeInstanceId>,
  used: HashSet<String>,
}

impl NameTable {
  pub fn build(resolver: &Resolver) -> Self {
    let mut table = Self::default();
    table.root = resolver.root_type();

    let root = table.root;
    table.order = root
      .into_iter()
      .chain(resolver.store().types().map(|(id, _)| id).filter(|id| Some(*id) != root))
      .collect();

    let mut next_type_id = 1;
    for id in table.order.clone() {
      let ty = resolver.store().type_instance(id);
      let def = resolver.metadata().type_def(ty.def());
      let shape = if def.is_interface() {
        TypeShape::Interface
      } else if def.is_value_type() {
        TypeShape::Struct
      } else {
        TypeShape::Class
      };
      let prefix = if shape == TypeShape::Struct { "stru" } else { "cls" };
      let name = table.unique(format!("{}_{}", prefix, escape_identifier(&resolver.type_name(id))));
      table.types.insert(id, name);
      table.shapes.insert(id, shape);
      if shape == TypeShape::Class {
        table.type_ids.insert(id, next_type_id);
        next_type_id += 1;
      }
    }

    for id in table.order.clone() {
      let owner = escape_identifier(&resolver.type_name(id));
      let ty = resolver.store().type_instance(id);

      for method in &ty.methods {
        let instance = resolver.store().method_instance(*method);
        let mut member = escape_identifier(&resolver.metadata().method(instance.def).name);
        if !instance.args.is_empty() {
          let args: Vec<String> = instance.args.iter().map(|a| resolver.metadata().sig_name(a)).collect();
          member = format!("{}_{}", member, escape_identifier(&args.join(",")));
        }
        let name = table.unique(format!("met_{}__{}", owner, member));
        table.methods.insert(*method, name);
      }

      let mut members = HashSet::new();
      for field in declared_fields(resolver, id) {
        let instance = resolver.store().field_instance(field);
        let member = escape_identifier(&resolver.metadata().field(instance.def).name);
        let name = if instance.is_static {
          table.unique(format!("fld_{}__{}", owner, member))
        } else {
          dedupe(format!("fld_{}", member), &mut members)
        };
        table.fields.insert(field, name);
      }
    }

    for entry in resolver.dispatch_entries() {
      let base = format!("{}__vcall", table.methods[&entry]);
      let name = table.unique(base);
      table.dispatchers.insert(entry, name);
    }

    table
  }

  fn unique(
    &mut self,
    name: String,
  ) -> String {
    dedupe(name, &mut self.used)
  }

  /// Types in emission order: the root object type first, then store order.
  pub fn order(&self) -> &[TypeInstanceId] {
    &self.order
  }

  pub fn root(&self) -> Option<TypeInstanceId> {
    self.root
  }

  pub fn type_name(
    &self,
    id: TypeInstanceId,
  ) -> &str {
    &self.types[&id]
  }

  pub fn shape(
    &self,
    id: TypeInstanceId,
  ) -> TypeShape {
    self.shapes[&id]
  }

  /// `struct <name>` for classes and value types.
  pub fn struct_tag(
    &self,
    id: TypeInstanceId,
  ) -> String {
    format!("struct {}", self.types[&id])
  }

  /// Numeric id stored in the object header; only classes have one.
  pub fn type_id(
    &self,
    id: TypeInstanceId,
  ) -> Option<u32> {
    self.type_ids.get(&id).copied()
  }

  /// Macro carrying the numeric id.
  pub fn type_id_macro(
    &self,
    id: TypeInstanceId,
  ) -> String {
    format!("{}_type_id", self.types[&id])
  }

  /// Global flag recording that the static constructor of `id` has run.
  pub fn cctor_flag(
    &self,
    id: TypeInstanceId,
  ) -> String {
    format!("{}_cctor_done", self.types[&id])
  }

  pub fn method_name(
    &self,
    id: MethodInstanceId,
  ) -> &str {
    &self.methods[&id]
  }

  /// Name of the `type_id` switch generated for a dispatch entry.
  pub fn dispatcher_name(
    &self,
    id: MethodInstanceId,
  ) -> Option<&str> {
    self.dispatchers.get(&id).map(String::as_str)
  }

  /// Member name for instance fields, global name for static fields.
  pub fn field_name(
    &self,
    id: FieldInstanceId,
  ) -> &str {
    &self.fields[&id]
  }

  /// C spelling of a concrete signature.
  ///
  /// Classes are pointers to their struct, value types are inline structs and
  /// interfaces are pointers to the root object layout.
  pub fn c_type(
    &self,
    resolver: &Resolver,
    sig: &TypeSig,
  ) -> String {
    match sig.strip_modifiers() {
      TypeSig::Void => "void".to_string(),
      TypeSig::Boolean | TypeSig::U1 => "uint8_t".to_string(),
      TypeSig::Char | TypeSig::U2 => "uint16_t".to_string(),
      TypeSig::I1 => "int8_t".to_string(),
      TypeSig::I2 => "int16_t".to_string(),
      TypeSig::I4 => "int32_t".to_string(),
      TypeSig::U4 => "uint32_t".to_string(),
      TypeSig::I8 => "int64_t".to_string(),
      TypeSig::U8 => "uint64_t".to_string(),
      TypeSig::R4 => "float".to_string(),
      TypeSig::R8 => "double".to_string(),
      TypeSig::I => "intptr_t".to_string(),
      TypeSig::U => "uintptr_t".to_string(),
      TypeSig::Ptr(inner) | TypeSig::ByRef(inner) => format!("{}*", self.c_type(resolver, inner)),
      sig @ (TypeSig::Class(_) | TypeSig::ValueType(_) | TypeSig::GenericInst { .. } | TypeSig::SZArray(_)) => {
        match instance_of(resolver, sig) {
          Some(id) => self.instance_type(id),
          None => "void*".to_string(),
        }
      },
      _ => "void*".to_string(),
    }
  }

  /// C spelling of a value of type instance `id`.
  pub fn instance_type(
    &self,
    id: TypeInstanceId,
  ) -> String {
    match self.shape(id) {
      TypeShape::Class => format!("{}*", self.struct_tag(id)),
      TypeShape::Struct => self.struct_tag(id),
      TypeShape::Interface => self.object_type(),
    }
  }

  /// Pointer to the root object layout, `void*` when the model has no root type.
  pub fn object_type(&self) -> String {
    match self.root {
      Some(root) => format!("{}*", self.struct_tag(root)),
      None => "void*".to_string(),
    }
  }
}

fn dedupe(
  name: String,
  used: &mut HashSet<String>,
) -> String {
  if used.insert(name.clone()) {
    return name;
  }
  let mut counter = 2;
  loop {
    let candidate = format!("{}_{}", name, counter);
    if used.insert(candidate.clone()) {
      return candidate;
    }
    counter += 1;
  }
}
