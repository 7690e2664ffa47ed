//! Concrete type, method and field instantiations.

use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use ilc_metadata::{FieldDefId, HandlerKind, Id, Metadata, MethodDefId, OpCode, TypeDefId, TypeSig};

use crate::subst::{substitute_all, GenericContext};
use crate::vtable::VirtualTable;

pub type TypeInstanceId = Id<TypeInstance>;
pub type MethodInstanceId = Id<MethodInstance>;
pub type FieldInstanceId = Id<FieldInstance>;

/// A definition together with its generic arguments.
///
/// The arguments may still contain placeholders: open keys (a definition over its
/// own placeholders) address the generic virtual tables that concrete ones are
/// expanded from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeKey {
  pub def: TypeDefId,
  pub args: Vec<TypeSig>,
}

impl TypeKey {
  pub fn new(
    def: TypeDefId,
    args: Vec<TypeSig>,
  ) -> Self {
    Self { def, args }
  }

  /// `def` over its own placeholders.
  pub fn open(
    metadata: &Metadata,
    def: TypeDefId,
  ) -> Self {
    Self {
      def,
      args: metadata.identity_args(def),
    }
  }

  /// Key for a class, value-type, generic-instance or single-dimension array signature.
  ///
  /// `T[]` maps onto the array prototype instantiated over `T` when the model names one.
  /// Primitives, pointers, placeholders and multi-dimensional arrays have no key.
  pub fn from_sig(
    metadata: &Metadata,
    sig: &TypeSig,
  ) -> Option<Self> {
    match sig.strip_modifiers() {
      TypeSig::Class(def) | TypeSig::ValueType(def) => Some(Self::new(*def, Vec::new())),
      TypeSig::GenericInst { generic, args, .. } => Some(Self::new(*generic, args.clone())),
      TypeSig::SZArray(elem) => metadata.corlib.array.map(|array| Self::new(array, vec![(**elem).clone()])),
      _ => None,
    }
  }

  pub fn to_sig(
    &self,
    metadata: &Metadata,
  ) -> TypeSig {
    let value_type = metadata.type_def(self.def).is_value_type();
    if !self.args.is_empty() {
      TypeSig::GenericInst {
        generic: self.def,
        value_type,
        args: self.args.clone(),
      }
    } else if value_type {
      TypeSig::ValueType(self.def)
    } else {
      TypeSig::Class(self.def)
    }
  }

  /// Binds the definition's own placeholders to this key's arguments.
  pub fn context(&self) -> GenericContext<'_> {
    GenericContext::for_type(self.def, &self.args)
  }

  pub fn substituted(
    &self,
    ctx: &GenericContext,
  ) -> Self {
    Self {
      def: self.def,
      args: substitute_all(&self.args, ctx),
    }
  }

  pub fn is_concrete(&self) -> bool {
    !self.args.iter().any(TypeSig::has_placeholders)
  }

  pub fn display(
    &self,
    metadata: &Metadata,
  ) -> String {
    metadata.sig_name(&self.to_sig(metadata))
  }
}

/// Interning identity of a type instance: the same key loaded from inputs of different
/// versions yields distinct instances.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeIdentity {
  pub key: TypeKey,
  pub version: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodIdentity {
  pub owner: TypeInstanceId,
  pub def: MethodDefId,
  pub args: Vec<TypeSig>,
}

#[derive(Debug, Clone)]
pub struct TypeInstance {
  pub key: TypeKey,
  pub version: u32,
  pub base: Option<TypeInstanceId>,
  pub interfaces: Vec<TypeInstanceId>,
  /// Synthetic supertypes added by variance linking.
  pub variance_bases: IndexSet<TypeInstanceId>,
  /// Every known transitive subtype, ordinary and variance-derived.
  pub derived: IndexSet<TypeInstanceId>,
  pub fields: IndexMap<FieldDefId, FieldInstanceId>,
  pub methods: Vec<MethodInstanceId>,
  pub is_instantiated: bool,
  pub cctor_generated: bool,
  pub cctor: Option<MethodInstanceId>,
  pub finalizer_generated: bool,
  pub finalizer: Option<MethodInstanceId>,
  pub vtable: Option<Rc<VirtualTable>>,
}

impl TypeInstance {
  pub fn new(
    key: TypeKey,
    version: u32,
  ) -> Self {
    Self {
      key,
      version,
      base: None,
      interfaces: Vec::new(),
      variance_bases: IndexSet::new(),
      derived: IndexSet::new(),
      fields: IndexMap::new(),
      methods: Vec::new(),
      is_instantiated: false,
      cctor_generated: false,
      cctor: None,
      finalizer_generated: false,
      finalizer: None,
      vtable: None,
    }
  }

  pub fn def(&self) -> TypeDefId {
    self.key.def
  }

  pub fn args(&self) -> &[TypeSig] {
    &self.key.args
  }

  /// Direct supertypes: base, declared interfaces, then variance links.
  pub fn supertypes(&self) -> impl Iterator<Item = TypeInstanceId> + '_ {
    self
      .base
      .iter()
      .copied()
      .chain(self.interfaces.iter().copied())
      .chain(self.variance_bases.iter().copied())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
  Unqueued,
  Queued,
  Processed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedOperand {
  None,
  Int32(i32),
  Int64(i64),
  Float(f64),
  String(String),
  Local(u16),
  Arg(u16),
  Branch(usize),
  Switch(Vec<usize>),
  Method(MethodInstanceId),
  Field(FieldInstanceId),
  Type(TypeInstanceId),
  /// Concrete signature without an instance of its own (primitives, pointers).
  Sig(TypeSig),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedInstruction {
  pub opcode: OpCode,
  pub operand: ResolvedOperand,
  /// Some branch or handler lands on this instruction.
  pub is_target: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedHandler {
  pub kind: HandlerKind,
  pub try_start: usize,
  pub try_end: usize,
  pub handler_start: usize,
  pub handler_end: usize,
  pub filter_start: Option<usize>,
  pub catch_type: Option<TypeInstanceId>,
}

#[derive(Debug, Clone)]
pub struct MethodInstance {
  pub owner: TypeInstanceId,
  pub def: MethodDefId,
  pub args: Vec<TypeSig>,
  pub ret: TypeSig,
  /// Substituted parameters, `this` first for instance methods.
  pub params: Vec<TypeSig>,
  pub locals: Vec<TypeSig>,
  /// Implementations reached through dispatch on this method.
  pub override_impls: IndexSet<MethodInstanceId>,
  /// Implementation per constructed receiver type.
  pub dispatch_targets: IndexMap<TypeInstanceId, MethodInstanceId>,
  pub state: ProcessState,
  /// Only reachable through virtual dispatch; the body is not needed.
  pub virtual_only: bool,
  /// Called, constructed through or loaded directly at least once.
  pub direct_use: bool,
  pub instructions: Vec<ResolvedInstruction>,
  pub handlers: Vec<ResolvedHandler>,
}

impl MethodInstance {
  pub fn has_body(&self) -> bool {
    self.state == ProcessState::Processed && !self.instructions.is_empty()
  }
}

#[derive(Debug, Clone)]
pub struct FieldInstance {
  pub owner: TypeInstanceId,
  pub def: FieldDefId,
  pub field_type: TypeSig,
  pub is_static: bool,
}
