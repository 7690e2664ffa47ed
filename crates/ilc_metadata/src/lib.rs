//! Pre-parsed input model consumed by the translator.
//!
//! Definitions live in arenas addressed by [`Id`]; signatures refer to definitions
//! by handle only, so the model can be shared read-only by every later stage.

use core::marker::PhantomData;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub mod body;
pub mod builder;
pub mod def;
pub mod model;
pub mod sig;
mod validate;

pub use body::{ExceptionHandler, FieldRef, HandlerKind, Instruction, MethodBody, MethodRef, OpCode, Operand};
pub use builder::MetadataBuilder;
pub use def::{FieldDef, GenericParam, MethodDef, MethodFlags, MethodSig, TypeDef, TypeFlags, Variance};
pub use model::{CoreTypes, Metadata};
pub use sig::TypeSig;

pub type TypeDefId = Id<TypeDef>;
pub type MethodDefId = Id<MethodDef>;
pub type FieldDefId = Id<FieldDef>;

#[repr(transparent)]
pub struct Id<T>(pub u32, PhantomData<fn() -> T>);

impl<T> Id<T> {
  pub fn new(index: u32) -> Self {
    Id(index, PhantomData)
  }

  pub fn index(&self) -> u32 {
    self.0
  }
}

impl<T> Clone for Id<T> {
  fn clone(&self) -> Self {
    *self
  }
}

impl<T> Copy for Id<T> {}

impl<T> PartialEq for Id<T> {
  fn eq(
    &self,
    other: &Self,
  ) -> bool {
    self.0 == other.0
  }
}

impl<T> Eq for Id<T> {}

impl<T> PartialOrd for Id<T> {
  fn partial_cmp(
    &self,
    other: &Self,
  ) -> Option<std::cmp::Ordering> {
    Some(self.cmp(other))
  }
}

impl<T> Ord for Id<T> {
  fn cmp(
    &self,
    other: &Self,
  ) -> std::cmp::Ordering {
    self.0.cmp(&other.0)
  }
}

impl<T> Hash for Id<T> {
  fn hash<H: Hasher>(
    &self,
    state: &mut H,
  ) {
    self.0.hash(state);
  }
}

impl<T> fmt::Debug for Id<T> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

impl<T> Serialize for Id<T> {
  fn serialize<S: Serializer>(
    &self,
    serializer: S,
  ) -> Result<S::Ok, S::Error> {
    serializer.serialize_u32(self.0)
  }
}

impl<'de, T> Deserialize<'de> for Id<T> {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    u32::deserialize(deserializer).map(Id::new)
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Store<T> {
  data: Vec<T>,
}

impl<T> Default for Store<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> Store<T> {
  pub fn new() -> Self {
    Self { data: Vec::new() }
  }

  pub fn alloc(
    &mut self,
    v: T,
  ) -> Id<T> {
    let id = Id::new(self.data.len() as u32);
    self.data.push(v);
    id
  }

  pub fn get(
    &self,
    id: &Id<T>,
  ) -> &T {
    &self.data[id.0 as usize]
  }

  pub fn get_mut(
    &mut self,
    id: Id<T>,
  ) -> &mut T {
    &mut self.data[id.0 as usize]
  }

  pub fn try_get(
    &self,
    id: &Id<T>,
  ) -> Option<&T> {
    self.data.get(id.0 as usize)
  }

  pub fn contains(
    &self,
    id: &Id<T>,
  ) -> bool {
    (id.0 as usize) < self.data.len()
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  /// Iterates in allocation order.
  pub fn iter(&self) -> impl Iterator<Item = (Id<T>, &T)> {
    self.data.iter().enumerate().map(|(i, v)| (Id::new(i as u32), v))
  }

  pub fn ids(&self) -> impl Iterator<Item = Id<T>> {
    (0..self.data.len() as u32).map(Id::new)
  }
}
