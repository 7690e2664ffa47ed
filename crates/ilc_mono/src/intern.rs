//! Canonical storage for every instance the resolver creates.

use std::collections::HashMap;

use ilc_metadata::{FieldDefId, Store};

use crate::instance::{
  FieldInstance, FieldInstanceId, MethodIdentity, MethodInstance, MethodInstanceId, TypeIdentity, TypeInstance,
  TypeInstanceId,
};

/// Arena of instances plus the identity maps that make interning idempotent.
///
/// Ids are handed out in registration order, which is also the iteration order every
/// later stage relies on for deterministic output.
#[derive(Debug, Default)]
pub struct InstanceStore {
  types: Store<TypeInstance>,
  type_map: HashMap<TypeIdentity, TypeInstanceId>,
  methods: Store<MethodInstance>,
  method_map: HashMap<MethodIdentity, MethodInstanceId>,
  fields: Store<FieldInstance>,
  field_map: HashMap<(TypeInstanceId, FieldDefId), FieldInstanceId>,
}

impl InstanceStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn lookup_type(
    &self,
    identity: &TypeIdentity,
  ) -> Option<TypeInstanceId> {
    self.type_map.get(identity).copied()
  }

  pub fn lookup_method(
    &self,
    identity: &MethodIdentity,
  ) -> Option<MethodInstanceId> {
    self.method_map.get(identity).copied()
  }

  pub fn lookup_field(
    &self,
    owner: TypeInstanceId,
    def: FieldDefId,
  ) -> Option<FieldInstanceId> {
    self.field_map.get(&(owner, def)).copied()
  }

  /// Registers a fresh type instance. The caller has already checked that `identity` is new.
  pub(crate) fn insert_type(
    &mut self,
    identity: TypeIdentity,
    instance: TypeInstance,
  ) -> TypeInstanceId {
    let id = self.types.alloc(instance);
    self.type_map.insert(identity, id);
    id
  }

  pub(crate) fn insert_method(
    &mut self,
    identity: MethodIdentity,
    instance: MethodInstance,
  ) -> MethodInstanceId {
    let id = self.methods.alloc(instance);
    self.method_map.insert(identity, id);
    id
  }

  pub(crate) fn insert_field(
    &mut self,
    instance: FieldInstance,
  ) -> FieldInstanceId {
    let key = (instance.owner, instance.def);
    let id = self.fields.alloc(instance);
    self.field_map.insert(key, id);
    id
  }

  pub fn type_instance(
    &self,
    id: TypeInstanceId,
  ) -> &TypeInstance {
    self.types.get(&id)
  }

  pub(crate) fn type_mut(
    &mut self,
    id: TypeInstanceId,
  ) -> &mut TypeInstance {
    self.types.get_mut(id)
  }

  pub fn method_instance(
    &self,
    id: MethodInstanceId,
  ) -> &MethodInstance {
    self.methods.get(&id)
  }

  pub(crate) fn method_mut(
    &mut self,
    id: MethodInstanceId,
  ) -> &mut MethodInstance {
    self.methods.get_mut(id)
  }

  pub fn field_instance(
    &self,
    id: FieldInstanceId,
  ) -> &FieldInstance {
    self.fields.get(&id)
  }

  pub fn types(&self) -> impl Iterator<Item = (TypeInstanceId, &TypeInstance)> {
    self.types.iter()
  }

  pub fn methods(&self) -> impl Iterator<Item = (MethodInstanceId, &MethodInstance)> {
    self.methods.iter()
  }

  pub fn fields(&self) -> impl Iterator<Item = (FieldInstanceId, &FieldInstance)> {
    self.fields.iter()
  }

  pub fn type_count(&self) -> usize {
    self.types.len()
  }

  pub fn method_count(&self) -> usize {
    self.methods.len()
  }

  pub fn field_count(&self) -> usize {
    self.fields.len()
  }
}
