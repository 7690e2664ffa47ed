//! Assignment compatibility for instantiations of variant generic definitions.

use std::collections::{HashSet, VecDeque};

use indexmap::IndexMap;
use ilc_metadata::{Metadata, TypeDefId, TypeSig, Variance};

use crate::instance::TypeInstanceId;
use crate::subst::{substitute, GenericContext};

const MAX_SUPERTYPE_WALK: usize = 256;

/// Whether a value of type `derived` can be stored where `base` is expected.
///
/// Value types and pointers are only compatible with themselves. The root object type
/// accepts every reference type. Arrays are covariant in reference element types.
pub fn is_assignable(
  metadata: &Metadata,
  base: &TypeSig,
  derived: &TypeSig,
) -> bool {
  let base = base.strip_modifiers();
  let derived = derived.strip_modifiers();
  if base == derived {
    return true;
  }
  if [base, derived]
    .iter()
    .any(|s| s.is_value_type() || s.is_pointer_like() || s.is_placeholder() || *s == &TypeSig::Void)
  {
    return false;
  }

  match (base, derived) {
    (TypeSig::SZArray(b), TypeSig::SZArray(d)) => is_assignable(metadata, b, d),
    (
      TypeSig::Array {
        elem: b, rank: base_rank, ..
      },
      TypeSig::Array {
        elem: d, rank: derived_rank, ..
      },
    ) => base_rank == derived_rank && is_assignable(metadata, b, d),
    _ if is_root(metadata, base) => true,
    _ => reaches(metadata, base, derived),
  }
}

/// Whether `derived_args` instantiate `def` compatibly with `base_args` under the
/// definition's declared variance.
pub fn variance_compatible(
  metadata: &Metadata,
  def: TypeDefId,
  base_args: &[TypeSig],
  derived_args: &[TypeSig],
) -> bool {
  let params = &metadata.type_def(def).generic_params;
  if params.len() != base_args.len() || params.len() != derived_args.len() {
    return false;
  }

  params
    .iter()
    .zip(base_args.iter().zip(derived_args))
    .all(|(param, (b, d))| match param.variance {
      Variance::NonVariant => b == d,
      Variance::Covariant => is_assignable(metadata, b, d),
      Variance::Contravariant => is_assignable(metadata, d, b),
    })
}

fn is_root(
  metadata: &Metadata,
  sig: &TypeSig,
) -> bool {
  matches!(sig, TypeSig::Class(def) if metadata.is_root(*def))
}

fn direct_supertypes(
  metadata: &Metadata,
  sig: &TypeSig,
) -> Vec<TypeSig> {
  let Some(def) = sig.type_def() else {
    return Vec::new();
  };
  let type_def = metadata.type_def(def);
  let ctx = GenericContext::for_type(def, sig.generic_args());

  type_def
    .base
    .iter()
    .chain(type_def.interfaces.iter())
    .map(|s| substitute(s, &ctx).into_owned())
    .collect()
}

/// Breadth-first walk over the supertypes of `derived`, looking for `base` itself or a
/// variance-compatible instantiation of its definition.
fn reaches(
  metadata: &Metadata,
  base: &TypeSig,
  derived: &TypeSig,
) -> bool {
  let Some(target) = base.type_def() else {
    return false;
  };
  let variant = metadata.is_variant(target);

  let mut seen = HashSet::new();
  let mut queue = VecDeque::from([derived.clone()]);
  while let Some(candidate) = queue.pop_front() {
    if seen.len() > MAX_SUPERTYPE_WALK {
      return false;
    }
    if !seen.insert(candidate.clone()) {
      continue;
    }

    if candidate == *base {
      return true;
    }
    if variant
      && candidate.type_def() == Some(target)
      && variance_compatible(metadata, target, base.generic_args(), candidate.generic_args())
    {
      return true;
    }
    queue.extend(direct_supertypes(metadata, &candidate));
  }
  false
}

/// Instances of variant definitions, grouped by definition, with a record of which
/// pairs have already been compared.
#[derive(Debug, Default)]
pub struct VarianceGroups {
  groups: IndexMap<TypeDefId, Vec<TypeInstanceId>>,
  paired: IndexMap<TypeDefId, usize>,
}

impl VarianceGroups {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register(
    &mut self,
    def: TypeDefId,
    instance: TypeInstanceId,
  ) {
    self.groups.entry(def).or_default().push(instance);
  }

  pub fn group(
    &self,
    def: TypeDefId,
  ) -> &[TypeInstanceId] {
    self.groups.get(&def).map(Vec::as_slice).unwrap_or(&[])
  }

  /// Every pair that involves a member registered since the previous call.
  ///
  /// Compatibility depends only on the signatures, so a pair never needs a second look.
  pub fn take_new_pairs(&mut self) -> Vec<(TypeDefId, TypeInstanceId, TypeInstanceId)> {
    let mut pairs = Vec::new();
    for (def, members) in &self.groups {
      let done = self.paired.get(def).copied().unwrap_or(0);
      for later in done..members.len() {
        for earlier in 0..later {
          pairs.push((*def, members[earlier], members[later]));
        }
      }
      self.paired.insert(*def, members.len());
    }
    pairs
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use ilc_metadata::{GenericParam, Id, MetadataBuilder};

  struct World {
    metadata: Metadata,
    object: TypeDefId,
    string: TypeDefId,
    source: TypeDefId,
    sink: TypeDefId,
  }

  fn world() -> World {
    let mut b = MetadataBuilder::new("variance");
    let object = b.class("System", "Object", None);
    let string = b.class("System", "String", Some(TypeSig::Class(object)));
    let source = b.interface("Demo", "ISource`1");
    b.set_generic_params(source, vec![GenericParam::with_variance("T", Variance::Covariant)]);
    let sink = b.interface("Demo", "ISink`1");
    b.set_generic_params(sink, vec![GenericParam::with_variance("T", Variance::Contravariant)]);
    b.set_object(object);
    World {
      metadata: b.finish().unwrap(),
      object,
      string,
      source,
      sink,
    }
  }

  #[test]
  fn covariance_follows_the_argument_direction() {
    let w = world();
    let of_object = TypeSig::generic(w.source, vec![TypeSig::Class(w.object)]);
    let of_string = TypeSig::generic(w.source, vec![TypeSig::Class(w.string)]);

    assert!(is_assignable(&w.metadata, &of_object, &of_string));
    assert!(!is_assignable(&w.metadata, &of_string, &of_object));
  }

  #[test]
  fn contravariance_reverses_it() {
    let w = world();
    let of_object = TypeSig::generic(w.sink, vec![TypeSig::Class(w.object)]);
    let of_string = TypeSig::generic(w.sink, vec![TypeSig::Class(w.string)]);

    assert!(is_assignable(&w.metadata, &of_string, &of_object));
    assert!(!is_assignable(&w.metadata, &of_object, &of_string));
  }

  #[test]
  fn value_type_arguments_never_vary() {
    let w = world();
    let of_object = TypeSig::generic(w.source, vec![TypeSig::Class(w.object)]);
    let of_int = TypeSig::generic(w.source, vec![TypeSig::I4]);

    assert!(!is_assignable(&w.metadata, &of_object, &of_int));
    assert!(!is_assignable(&w.metadata, &TypeSig::Class(w.object), &TypeSig::I4));
    assert!(is_assignable(&w.metadata, &TypeSig::Class(w.object), &of_int));
  }

  #[test]
  fn new_pairs_are_reported_once() {
    let mut groups = VarianceGroups::new();
    let def = Id::new(1);
    groups.register(def, Id::new(0));
    groups.register(def, Id::new(1));
    assert_eq!(groups.take_new_pairs(), vec![(def, Id::new(0), Id::new(1))]);

    groups.register(def, Id::new(2));
    assert_eq!(
      groups.take_new_pairs(),
      vec![(def, Id::new(0), Id::new(2)), (def, Id::new(1), Id::new(2))]
    );
    assert!(groups.take_new_pairs().is_empty());
  }
}
