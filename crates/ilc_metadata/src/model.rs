use std::path::Path;

use ilc_diagnostics::message::DiagnosticMessage;
use serde::{Deserialize, Serialize};

use crate::def::{FieldDef, MethodDef, MethodSig, TypeDef};
use crate::sig::TypeSig;
use crate::{FieldDefId, MethodDefId, Store, TypeDefId};

/// Handles of the core library types the translator treats specially.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoreTypes {
  /// Root of the class hierarchy.
  #[serde(default)]
  pub object: Option<TypeDefId>,
  #[serde(default)]
  pub string: Option<TypeDefId>,
  /// One-parameter generic prototype standing in for `T[]`.
  #[serde(default)]
  pub array: Option<TypeDefId>,
}

/// The whole input: every definition of every loaded assembly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub types: Store<TypeDef>,
  #[serde(default)]
  pub methods: Store<MethodDef>,
  #[serde(default)]
  pub fields: Store<FieldDef>,
  #[serde(default)]
  pub corlib: CoreTypes,
}

impl Metadata {
  /// Parses and validates a JSON model.
  pub fn from_json(text: &str) -> Result<Self, DiagnosticMessage> {
    let metadata: Metadata =
      serde_json::from_str(text).map_err(|e| DiagnosticMessage::MalformedMetadata { reason: e.to_string() })?;
    metadata.validate()?;
    Ok(metadata)
  }

  pub fn load(path: &Path) -> Result<Self, DiagnosticMessage> {
    let text = std::fs::read_to_string(path).map_err(|e| DiagnosticMessage::LoadFailed {
      path: path.display().to_string(),
      reason: e.to_string(),
    })?;
    Self::from_json(&text)
  }

  pub fn to_json(&self) -> String {
    serde_json::to_string_pretty(self).unwrap_or_default()
  }

  pub fn type_def(
    &self,
    id: TypeDefId,
  ) -> &TypeDef {
    self.types.get(&id)
  }

  pub fn method(
    &self,
    id: MethodDefId,
  ) -> &MethodDef {
    self.methods.get(&id)
  }

  pub fn field(
    &self,
    id: FieldDefId,
  ) -> &FieldDef {
    self.fields.get(&id)
  }

  pub fn full_name(
    &self,
    id: TypeDefId,
  ) -> String {
    match self.types.try_get(&id) {
      Some(def) => def.full_name(),
      None => format!("<type {:?}>", id),
    }
  }

  /// `Namespace.Type::Name`
  pub fn method_name(
    &self,
    id: MethodDefId,
  ) -> String {
    match self.methods.try_get(&id) {
      Some(method) => format!("{}::{}", self.full_name(method.owner), method.name),
      None => format!("<method {:?}>", id),
    }
  }

  pub fn field_name(
    &self,
    id: FieldDefId,
  ) -> String {
    match self.fields.try_get(&id) {
      Some(field) => format!("{}::{}", self.full_name(field.owner), field.name),
      None => format!("<field {:?}>", id),
    }
  }

  pub fn find_type(
    &self,
    full_name: &str,
  ) -> Option<TypeDefId> {
    self.types.iter().find(|(_, def)| def.full_name() == full_name).map(|(id, _)| id)
  }

  pub fn find_methods(
    &self,
    owner: TypeDefId,
    name: &str,
  ) -> Vec<MethodDefId> {
    self
      .type_def(owner)
      .methods
      .iter()
      .copied()
      .filter(|m| self.method(*m).name == name)
      .collect()
  }

  /// Method of `owner` named `name` whose signature equals `sig`.
  pub fn find_method_by_sig(
    &self,
    owner: TypeDefId,
    name: &str,
    sig: &MethodSig,
  ) -> Option<MethodDefId> {
    self
      .type_def(owner)
      .methods
      .iter()
      .copied()
      .find(|m| {
        let method = self.method(*m);
        method.name == name && method.sig == *sig
      })
  }

  pub fn find_field(
    &self,
    owner: TypeDefId,
    name: &str,
  ) -> Option<FieldDefId> {
    self
      .type_def(owner)
      .fields
      .iter()
      .copied()
      .find(|f| self.field(*f).name == name)
  }

  /// The type's own placeholders, in order. Empty for non-generic types.
  pub fn identity_args(
    &self,
    def: TypeDefId,
  ) -> Vec<TypeSig> {
    (0..self.type_def(def).generic_params.len() as u32)
      .map(|index| TypeSig::var(def, index))
      .collect()
  }

  /// Signature naming `def` instantiated over its own placeholders.
  pub fn self_sig(
    &self,
    def: TypeDefId,
  ) -> TypeSig {
    let type_def = self.type_def(def);
    if type_def.is_generic() {
      TypeSig::GenericInst {
        generic: def,
        value_type: type_def.is_value_type(),
        args: self.identity_args(def),
      }
    } else if type_def.is_value_type() {
      TypeSig::ValueType(def)
    } else {
      TypeSig::Class(def)
    }
  }

  pub fn is_variant(
    &self,
    def: TypeDefId,
  ) -> bool {
    self.type_def(def).has_variance()
  }

  /// Explicit root, or the first class that has no base type.
  pub fn root_type(&self) -> Option<TypeDefId> {
    self.corlib.object.or_else(|| {
      self
        .types
        .iter()
        .find(|(_, def)| def.base.is_none() && !def.is_interface() && !def.is_value_type())
        .map(|(id, _)| id)
    })
  }

  pub fn is_root(
    &self,
    def: TypeDefId,
  ) -> bool {
    self.root_type() == Some(def)
  }

  /// Walks the base chain of `def` (excluding `def`) and reports whether `ancestor` is on it.
  pub fn is_base_def(
    &self,
    ancestor: TypeDefId,
    def: TypeDefId,
  ) -> bool {
    let mut current = self.type_def(def).base.as_ref().and_then(TypeSig::type_def);
    let mut steps = 0;
    while let Some(id) = current {
      if id == ancestor {
        return true;
      }

      steps += 1;
      if steps > self.types.len() {
        return false;
      }
      current = self.type_def(id).base.as_ref().and_then(TypeSig::type_def);
    }
    false
  }

  /// Human readable form of a signature, e.g. `Demo.Pair<int32,string>`.
  pub fn sig_name(
    &self,
    sig: &TypeSig,
  ) -> String {
    match sig {
      TypeSig::Class(def) | TypeSig::ValueType(def) => self.full_name(*def),
      TypeSig::GenericInst { generic, args, .. } => {
        let args: Vec<String> = args.iter().map(|a| self.sig_name(a)).collect();
        format!("{}<{}>", self.full_name(*generic), args.join(","))
      },
      TypeSig::Var { owner, index } => self
        .types
        .try_get(owner)
        .and_then(|def| def.generic_params.get(*index as usize))
        .map(|p| p.name.clone())
        .unwrap_or_else(|| format!("!{}", index)),
      TypeSig::MVar { owner, index } => owner
        .and_then(|m| self.methods.try_get(&m))
        .and_then(|method| method.generic_params.get(*index as usize))
        .map(|p| p.name.clone())
        .unwrap_or_else(|| format!("!!{}", index)),
      TypeSig::Ptr(inner) => format!("{}*", self.sig_name(inner)),
      TypeSig::ByRef(inner) => format!("{}&", self.sig_name(inner)),
      TypeSig::Pinned(inner) => format!("{} pinned", self.sig_name(inner)),
      TypeSig::SZArray(inner) => format!("{}[]", self.sig_name(inner)),
      TypeSig::Array { elem, rank, .. } => {
        format!("{}[{}]", self.sig_name(elem), ",".repeat(rank.saturating_sub(1) as usize))
      },
      TypeSig::ModReqd { modifier, next } => {
        format!("{} modreq({})", self.sig_name(next), self.full_name(*modifier))
      },
      TypeSig::ModOpt { modifier, next } => {
        format!("{} modopt({})", self.sig_name(next), self.full_name(*modifier))
      },
      primitive => primitive.primitive_name().unwrap_or("?").to_string(),
    }
  }

  /// `ret(param,param)`
  pub fn method_sig_name(
    &self,
    sig: &MethodSig,
  ) -> String {
    let params: Vec<String> = sig.params.iter().map(|p| self.sig_name(p)).collect();
    format!("{}({})", self.sig_name(&sig.ret), params.join(","))
  }
}
