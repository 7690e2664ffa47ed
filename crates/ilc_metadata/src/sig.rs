use serde::{Deserialize, Serialize};

use crate::{MethodDefId, TypeDefId};

/// A type signature as it appears in member signatures and instruction operands.
///
/// Equality is structural. Generic placeholders remember the definition that owns
/// them, so a substitution context only rewrites its own placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeSig {
  Void,
  Boolean,
  Char,
  I1,
  U1,
  I2,
  U2,
  I4,
  U4,
  I8,
  U8,
  R4,
  R8,
  I,
  U,
  TypedByRef,
  Class(TypeDefId),
  ValueType(TypeDefId),
  GenericInst {
    generic: TypeDefId,
    #[serde(default)]
    value_type: bool,
    args: Vec<TypeSig>,
  },
  /// Type-level placeholder `!index` of `owner`.
  Var {
    owner: TypeDefId,
    index: u32,
  },
  /// Method-level placeholder `!!index`. `owner: None` is the detached form used by signature keys.
  MVar {
    owner: Option<MethodDefId>,
    index: u32,
  },
  Ptr(Box<TypeSig>),
  ByRef(Box<TypeSig>),
  Pinned(Box<TypeSig>),
  SZArray(Box<TypeSig>),
  Array {
    elem: Box<TypeSig>,
    rank: u32,
    #[serde(default)]
    sizes: Vec<u32>,
    #[serde(default)]
    lower_bounds: Vec<i32>,
  },
  ModReqd {
    modifier: TypeDefId,
    next: Box<TypeSig>,
  },
  ModOpt {
    modifier: TypeDefId,
    next: Box<TypeSig>,
  },
}

impl TypeSig {
  pub fn var(
    owner: TypeDefId,
    index: u32,
  ) -> Self {
    TypeSig::Var { owner, index }
  }

  pub fn mvar(
    owner: MethodDefId,
    index: u32,
  ) -> Self {
    TypeSig::MVar {
      owner: Some(owner),
      index,
    }
  }

  pub fn generic(
    generic: TypeDefId,
    args: Vec<TypeSig>,
  ) -> Self {
    TypeSig::GenericInst {
      generic,
      value_type: false,
      args,
    }
  }

  pub fn sz_array(elem: TypeSig) -> Self {
    TypeSig::SZArray(Box::new(elem))
  }

  pub fn by_ref(inner: TypeSig) -> Self {
    TypeSig::ByRef(Box::new(inner))
  }

  pub fn is_primitive(&self) -> bool {
    matches!(
      self,
      TypeSig::Void
        | TypeSig::Boolean
        | TypeSig::Char
        | TypeSig::I1
        | TypeSig::U1
        | TypeSig::I2
        | TypeSig::U2
        | TypeSig::I4
        | TypeSig::U4
        | TypeSig::I8
        | TypeSig::U8
        | TypeSig::R4
        | TypeSig::R8
        | TypeSig::I
        | TypeSig::U
        | TypeSig::TypedByRef
    )
  }

  pub fn is_value_type(&self) -> bool {
    match self.strip_modifiers() {
      TypeSig::Void => false,
      TypeSig::ValueType(_) => true,
      TypeSig::GenericInst { value_type, .. } => *value_type,
      sig => sig.is_primitive(),
    }
  }

  pub fn is_pointer_like(&self) -> bool {
    matches!(self.strip_modifiers(), TypeSig::Ptr(_) | TypeSig::ByRef(_))
  }

  pub fn is_array(&self) -> bool {
    matches!(self.strip_modifiers(), TypeSig::SZArray(_) | TypeSig::Array { .. })
  }

  pub fn is_placeholder(&self) -> bool {
    matches!(self, TypeSig::Var { .. } | TypeSig::MVar { .. })
  }

  /// Skips custom modifiers and pinning, which never affect identity of the underlying type.
  pub fn strip_modifiers(&self) -> &TypeSig {
    match self {
      TypeSig::ModReqd { next, .. } | TypeSig::ModOpt { next, .. } | TypeSig::Pinned(next) => next.strip_modifiers(),
      sig => sig,
    }
  }

  /// Definition named by a class, value-type or generic-instance signature.
  pub fn type_def(&self) -> Option<TypeDefId> {
    match self.strip_modifiers() {
      TypeSig::Class(def) | TypeSig::ValueType(def) => Some(*def),
      TypeSig::GenericInst { generic, .. } => Some(*generic),
      _ => None,
    }
  }

  pub fn generic_args(&self) -> &[TypeSig] {
    match self.strip_modifiers() {
      TypeSig::GenericInst { args, .. } => args,
      _ => &[],
    }
  }

  pub fn element(&self) -> Option<&TypeSig> {
    match self {
      TypeSig::Ptr(inner)
      | TypeSig::ByRef(inner)
      | TypeSig::Pinned(inner)
      | TypeSig::SZArray(inner)
      | TypeSig::Array { elem: inner, .. }
      | TypeSig::ModReqd { next: inner, .. }
      | TypeSig::ModOpt { next: inner, .. } => Some(inner),
      _ => None,
    }
  }

  pub fn has_placeholders(&self) -> bool {
    match self {
      TypeSig::Var { .. } | TypeSig::MVar { .. } => true,
      TypeSig::GenericInst { args, .. } => args.iter().any(TypeSig::has_placeholders),
      sig => sig.element().map(TypeSig::has_placeholders).unwrap_or(false),
    }
  }

  /// Visits this signature and every nested one, outermost first.
  pub fn walk(
    &self,
    visit: &mut dyn FnMut(&TypeSig),
  ) {
    visit(self);
    match self {
      TypeSig::GenericInst { args, .. } => {
        for arg in args {
          arg.walk(visit);
        }
      },
      sig => {
        if let Some(inner) = sig.element() {
          inner.walk(visit);
        }
      },
    }
  }

  /// Rewrites every method placeholder to the detached form.
  pub fn detach_method_vars(&self) -> TypeSig {
    match self {
      TypeSig::MVar { index, .. } => TypeSig::MVar {
        owner: None,
        index: *index,
      },
      TypeSig::GenericInst {
        generic,
        value_type,
        args,
      } => TypeSig::GenericInst {
        generic: *generic,
        value_type: *value_type,
        args: args.iter().map(TypeSig::detach_method_vars).collect(),
      },
      TypeSig::Ptr(inner) => TypeSig::Ptr(Box::new(inner.detach_method_vars())),
      TypeSig::ByRef(inner) => TypeSig::ByRef(Box::new(inner.detach_method_vars())),
      TypeSig::Pinned(inner) => TypeSig::Pinned(Box::new(inner.detach_method_vars())),
      TypeSig::SZArray(inner) => TypeSig::SZArray(Box::new(inner.detach_method_vars())),
      TypeSig::Array {
        elem,
        rank,
        sizes,
        lower_bounds,
      } => TypeSig::Array {
        elem: Box::new(elem.detach_method_vars()),
        rank: *rank,
        sizes: sizes.clone(),
        lower_bounds: lower_bounds.clone(),
      },
      TypeSig::ModReqd { modifier, next } => TypeSig::ModReqd {
        modifier: *modifier,
        next: Box::new(next.detach_method_vars()),
      },
      TypeSig::ModOpt { modifier, next } => TypeSig::ModOpt {
        modifier: *modifier,
        next: Box::new(next.detach_method_vars()),
      },
      sig => sig.clone(),
    }
  }

  pub fn primitive_name(&self) -> Option<&'static str> {
    let name = match self {
      TypeSig::Void => "void",
      TypeSig::Boolean => "bool",
      TypeSig::Char => "char",
      TypeSig::I1 => "int8",
      TypeSig::U1 => "uint8",
      TypeSig::I2 => "int16",
      TypeSig::U2 => "uint16",
      TypeSig::I4 => "int32",
      TypeSig::U4 => "uint32",
      TypeSig::I8 => "int64",
      TypeSig::U8 => "uint64",
      TypeSig::R4 => "float32",
      TypeSig::R8 => "float64",
      TypeSig::I => "native int",
      TypeSig::U => "native uint",
      TypeSig::TypedByRef => "typedref",
      _ => return None,
    };
    Some(name)
  }
}
