use serde::{Deserialize, Serialize};

use crate::body::{MethodBody, MethodRef};
use crate::sig::TypeSig;
use crate::{FieldDefId, MethodDefId, TypeDefId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Variance {
  #[default]
  NonVariant,
  Covariant,
  Contravariant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericParam {
  pub name: String,
  #[serde(default)]
  pub variance: Variance,
}

impl GenericParam {
  pub fn new(name: &str) -> Self {
    Self {
      name: name.to_string(),
      variance: Variance::NonVariant,
    }
  }

  pub fn with_variance(
    name: &str,
    variance: Variance,
  ) -> Self {
    Self {
      name: name.to_string(),
      variance,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TypeFlags {
  #[serde(default, rename = "interface")]
  pub is_interface: bool,
  #[serde(default, rename = "abstract")]
  pub is_abstract: bool,
  #[serde(default, rename = "sealed")]
  pub is_sealed: bool,
  #[serde(default, rename = "value_type")]
  pub is_value_type: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDef {
  #[serde(default)]
  pub namespace: String,
  pub name: String,
  #[serde(default)]
  pub flags: TypeFlags,
  #[serde(default)]
  pub base: Option<TypeSig>,
  #[serde(default)]
  pub interfaces: Vec<TypeSig>,
  #[serde(default)]
  pub generic_params: Vec<GenericParam>,
  #[serde(default)]
  pub fields: Vec<FieldDefId>,
  #[serde(default)]
  pub methods: Vec<MethodDefId>,
  /// Source-version tag of the input this definition was read from.
  #[serde(default)]
  pub version: u32,
}

impl TypeDef {
  pub fn new(
    namespace: &str,
    name: &str,
  ) -> Self {
    Self {
      namespace: namespace.to_string(),
      name: name.to_string(),
      flags: TypeFlags::default(),
      base: None,
      interfaces: Vec::new(),
      generic_params: Vec::new(),
      fields: Vec::new(),
      methods: Vec::new(),
      version: 0,
    }
  }

  pub fn full_name(&self) -> String {
    if self.namespace.is_empty() {
      self.name.clone()
    } else {
      format!("{}.{}", self.namespace, self.name)
    }
  }

  pub fn is_interface(&self) -> bool {
    self.flags.is_interface
  }

  pub fn is_abstract(&self) -> bool {
    self.flags.is_abstract || self.flags.is_interface
  }

  pub fn is_value_type(&self) -> bool {
    self.flags.is_value_type
  }

  pub fn is_generic(&self) -> bool {
    !self.generic_params.is_empty()
  }

  pub fn has_variance(&self) -> bool {
    self.generic_params.iter().any(|p| p.variance != Variance::NonVariant)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MethodFlags {
  #[serde(default, rename = "static")]
  pub is_static: bool,
  #[serde(default, rename = "virtual")]
  pub is_virtual: bool,
  #[serde(default, rename = "abstract")]
  pub is_abstract: bool,
  #[serde(default)]
  pub new_slot: bool,
  #[serde(default)]
  pub special_name: bool,
  #[serde(default)]
  pub rt_special_name: bool,
}

impl MethodFlags {
  pub fn instance() -> Self {
    Self::default()
  }

  pub fn static_method() -> Self {
    Self {
      is_static: true,
      ..Self::default()
    }
  }

  /// `virtual newslot`: introduces a slot.
  pub fn virtual_new_slot() -> Self {
    Self {
      is_virtual: true,
      new_slot: true,
      ..Self::default()
    }
  }

  /// `virtual` without `newslot`: overrides an inherited slot.
  pub fn virtual_reuse_slot() -> Self {
    Self {
      is_virtual: true,
      ..Self::default()
    }
  }

  pub fn abstract_new_slot() -> Self {
    Self {
      is_virtual: true,
      is_abstract: true,
      new_slot: true,
      ..Self::default()
    }
  }

  pub fn ctor() -> Self {
    Self {
      special_name: true,
      rt_special_name: true,
      ..Self::default()
    }
  }

  pub fn cctor() -> Self {
    Self {
      is_static: true,
      special_name: true,
      rt_special_name: true,
      ..Self::default()
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodSig {
  #[serde(default)]
  pub has_this: bool,
  #[serde(default)]
  pub call_conv: u8,
  pub ret: TypeSig,
  #[serde(default)]
  pub params: Vec<TypeSig>,
}

impl MethodSig {
  pub fn instance(
    ret: TypeSig,
    params: Vec<TypeSig>,
  ) -> Self {
    Self {
      has_this: true,
      call_conv: 0,
      ret,
      params,
    }
  }

  pub fn static_sig(
    ret: TypeSig,
    params: Vec<TypeSig>,
  ) -> Self {
    Self {
      has_this: false,
      call_conv: 0,
      ret,
      params,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodDef {
  pub name: String,
  pub owner: TypeDefId,
  #[serde(default)]
  pub flags: MethodFlags,
  #[serde(default)]
  pub generic_params: Vec<GenericParam>,
  pub sig: MethodSig,
  /// Explicit override targets (`.override`).
  #[serde(default)]
  pub overrides: Vec<MethodRef>,
  #[serde(default)]
  pub body: Option<MethodBody>,
}

impl MethodDef {
  pub fn is_static(&self) -> bool {
    self.flags.is_static
  }

  pub fn is_virtual(&self) -> bool {
    self.flags.is_virtual
  }

  pub fn is_abstract(&self) -> bool {
    self.flags.is_abstract
  }

  pub fn is_new_slot(&self) -> bool {
    self.flags.new_slot
  }

  pub fn is_reuse_slot(&self) -> bool {
    self.flags.is_virtual && !self.flags.new_slot
  }

  pub fn is_ctor(&self) -> bool {
    !self.flags.is_static && self.flags.rt_special_name && self.name == ".ctor"
  }

  pub fn is_cctor(&self) -> bool {
    self.flags.is_static && self.flags.rt_special_name && self.name == ".cctor"
  }

  pub fn has_overrides(&self) -> bool {
    !self.overrides.is_empty()
  }

  pub fn has_body(&self) -> bool {
    self.body.is_some()
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
  pub name: String,
  pub owner: TypeDefId,
  #[serde(default)]
  pub is_static: bool,
  pub field_type: TypeSig,
}
