use ilc_diagnostics::message::DiagnosticMessage;

use crate::body::{Instruction, MethodBody, MethodRef};
use crate::def::{FieldDef, GenericParam, MethodDef, MethodFlags, MethodSig, TypeDef};
use crate::model::Metadata;
use crate::sig::TypeSig;
use crate::{FieldDefId, MethodDefId, TypeDefId};

/// Assembles a [`Metadata`] model in code.
///
/// Definitions are appended in call order, which is also the declaration order the
/// translator iterates in.
pub struct MetadataBuilder {
  metadata: Metadata,
}

impl MetadataBuilder {
  pub fn new(name: &str) -> Self {
    Self {
      metadata: Metadata {
        name: name.to_string(),
        ..Metadata::default()
      },
    }
  }

  pub fn class(
    &mut self,
    namespace: &str,
    name: &str,
    base: Option<TypeSig>,
  ) -> TypeDefId {
    let mut def = TypeDef::new(namespace, name);
    def.base = base;
    self.metadata.types.alloc(def)
  }

  pub fn interface(
    &mut self,
    namespace: &str,
    name: &str,
  ) -> TypeDefId {
    let mut def = TypeDef::new(namespace, name);
    def.flags.is_interface = true;
    def.flags.is_abstract = true;
    self.metadata.types.alloc(def)
  }

  pub fn value_type(
    &mut self,
    namespace: &str,
    name: &str,
    base: Option<TypeSig>,
  ) -> TypeDefId {
    let mut def = TypeDef::new(namespace, name);
    def.base = base;
    def.flags.is_value_type = true;
    def.flags.is_sealed = true;
    self.metadata.types.alloc(def)
  }

  pub fn type_mut(
    &mut self,
    id: TypeDefId,
  ) -> &mut TypeDef {
    self.metadata.types.get_mut(id)
  }

  pub fn set_abstract(
    &mut self,
    id: TypeDefId,
  ) {
    self.type_mut(id).flags.is_abstract = true;
  }

  pub fn set_version(
    &mut self,
    id: TypeDefId,
    version: u32,
  ) {
    self.type_mut(id).version = version;
  }

  pub fn set_generic_params(
    &mut self,
    id: TypeDefId,
    params: Vec<GenericParam>,
  ) {
    self.type_mut(id).generic_params = params;
  }

  pub fn implement(
    &mut self,
    id: TypeDefId,
    interface: TypeSig,
  ) {
    self.type_mut(id).interfaces.push(interface);
  }

  pub fn method(
    &mut self,
    owner: TypeDefId,
    name: &str,
    flags: MethodFlags,
    sig: MethodSig,
  ) -> MethodDefId {
    let id = self.metadata.methods.alloc(MethodDef {
      name: name.to_string(),
      owner,
      flags,
      generic_params: Vec::new(),
      sig,
      overrides: Vec::new(),
      body: None,
    });
    self.type_mut(owner).methods.push(id);
    id
  }

  pub fn method_mut(
    &mut self,
    id: MethodDefId,
  ) -> &mut MethodDef {
    self.metadata.methods.get_mut(id)
  }

  pub fn set_method_generic_params(
    &mut self,
    id: MethodDefId,
    params: Vec<GenericParam>,
  ) {
    self.method_mut(id).generic_params = params;
  }

  pub fn set_body(
    &mut self,
    id: MethodDefId,
    instructions: Vec<Instruction>,
  ) {
    self.method_mut(id).body = Some(MethodBody::new(instructions));
  }

  pub fn set_full_body(
    &mut self,
    id: MethodDefId,
    body: MethodBody,
  ) {
    self.method_mut(id).body = Some(body);
  }

  pub fn add_override(
    &mut self,
    id: MethodDefId,
    target: MethodRef,
  ) {
    self.method_mut(id).overrides.push(target);
  }

  pub fn field(
    &mut self,
    owner: TypeDefId,
    name: &str,
    is_static: bool,
    field_type: TypeSig,
  ) -> FieldDefId {
    let id = self.metadata.fields.alloc(FieldDef {
      name: name.to_string(),
      owner,
      is_static,
      field_type,
    });
    self.type_mut(owner).fields.push(id);
    id
  }

  pub fn set_object(
    &mut self,
    id: TypeDefId,
  ) {
    self.metadata.corlib.object = Some(id);
  }

  pub fn set_string(
    &mut self,
    id: TypeDefId,
  ) {
    self.metadata.corlib.string = Some(id);
  }

  pub fn set_array(
    &mut self,
    id: TypeDefId,
  ) {
    self.metadata.corlib.array = Some(id);
  }

  pub fn metadata(&self) -> &Metadata {
    &self.metadata
  }

  /// Returns the model without validating it.
  pub fn build(self) -> Metadata {
    self.metadata
  }

  pub fn finish(self) -> Result<Metadata, DiagnosticMessage> {
    self.metadata.validate()?;
    Ok(self.metadata)
  }
}
