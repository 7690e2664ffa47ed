//! Generic substitution over type signatures.

use std::borrow::Cow;

use ilc_metadata::{MethodDefId, MethodSig, TypeDefId, TypeSig};

/// Binds the placeholders of one type definition and, optionally, one method definition.
///
/// Placeholders owned by any other definition are left untouched, so a context can
/// be applied to signatures that mention foreign placeholders without corrupting them.
#[derive(Debug, Clone, Copy)]
pub struct GenericContext<'a> {
  pub type_def: Option<TypeDefId>,
  pub type_args: &'a [TypeSig],
  pub method_def: Option<MethodDefId>,
  pub method_args: &'a [TypeSig],
}

impl<'a> GenericContext<'a> {
  pub fn empty() -> Self {
    Self {
      type_def: None,
      type_args: &[],
      method_def: None,
      method_args: &[],
    }
  }

  pub fn for_type(
    type_def: TypeDefId,
    type_args: &'a [TypeSig],
  ) -> Self {
    Self {
      type_def: Some(type_def),
      type_args,
      method_def: None,
      method_args: &[],
    }
  }

  pub fn for_method(
    type_def: TypeDefId,
    type_args: &'a [TypeSig],
    method_def: MethodDefId,
    method_args: &'a [TypeSig],
  ) -> Self {
    Self {
      type_def: Some(type_def),
      type_args,
      method_def: Some(method_def),
      method_args,
    }
  }

  pub fn is_empty(&self) -> bool {
    self.type_args.is_empty() && self.method_args.is_empty()
  }

  /// The argument bound to `placeholder`, if this context owns it.
  fn binding(
    &self,
    placeholder: &TypeSig,
  ) -> Option<&'a TypeSig> {
    match placeholder {
      TypeSig::Var { owner, index } if self.type_def == Some(*owner) => self.type_args.get(*index as usize),
      TypeSig::MVar {
        owner: Some(owner),
        index,
      } if self.method_def == Some(*owner) => self.method_args.get(*index as usize),
      _ => None,
    }
  }

  /// Whether substituting `sig` in this context would change it.
  pub fn rewrites(
    &self,
    sig: &TypeSig,
  ) -> bool {
    if self.is_empty() {
      return false;
    }

    match sig {
      TypeSig::Var { .. } | TypeSig::MVar { .. } => self.binding(sig).is_some(),
      TypeSig::GenericInst { args, .. } => args.iter().any(|a| self.rewrites(a)),
      sig => sig.element().map(|inner| self.rewrites(inner)).unwrap_or(false),
    }
  }
}

/// Replaces every placeholder bound by `ctx`.
///
/// Returns the input unchanged (borrowed) when nothing in it is bound by the context.
/// Array rank, sizes and lower bounds as well as custom modifiers are carried over.
pub fn substitute<'s>(
  sig: &'s TypeSig,
  ctx: &GenericContext,
) -> Cow<'s, TypeSig> {
  if !ctx.rewrites(sig) {
    return Cow::Borrowed(sig);
  }
  Cow::Owned(rewrite(sig, ctx))
}

fn rewrite(
  sig: &TypeSig,
  ctx: &GenericContext,
) -> TypeSig {
  let boxed = |inner: &TypeSig| Box::new(substitute(inner, ctx).into_owned());

  match sig {
    TypeSig::Var { .. } | TypeSig::MVar { .. } => match ctx.binding(sig) {
      Some(bound) => bound.clone(),
      None => sig.clone(),
    },
    TypeSig::GenericInst {
      generic,
      value_type,
      args,
    } => TypeSig::GenericInst {
      generic: *generic,
      value_type: *value_type,
      args: substitute_all(args, ctx),
    },
    TypeSig::Ptr(inner) => TypeSig::Ptr(boxed(inner)),
    TypeSig::ByRef(inner) => TypeSig::ByRef(boxed(inner)),
    TypeSig::Pinned(inner) => TypeSig::Pinned(boxed(inner)),
    TypeSig::SZArray(inner) => TypeSig::SZArray(boxed(inner)),
    TypeSig::Array {
      elem,
      rank,
      sizes,
      lower_bounds,
    } => TypeSig::Array {
      elem: boxed(elem),
      rank: *rank,
      sizes: sizes.clone(),
      lower_bounds: lower_bounds.clone(),
    },
    TypeSig::ModReqd { modifier, next } => TypeSig::ModReqd {
      modifier: *modifier,
      next: boxed(next),
    },
    TypeSig::ModOpt { modifier, next } => TypeSig::ModOpt {
      modifier: *modifier,
      next: boxed(next),
    },
    sig => sig.clone(),
  }
}

pub fn substitute_all(
  sigs: &[TypeSig],
  ctx: &GenericContext,
) -> Vec<TypeSig> {
  sigs.iter().map(|s| substitute(s, ctx).into_owned()).collect()
}

pub fn substitute_method_sig(
  sig: &MethodSig,
  ctx: &GenericContext,
) -> MethodSig {
  MethodSig {
    has_this: sig.has_this,
    call_conv: sig.call_conv,
    ret: substitute(&sig.ret, ctx).into_owned(),
    params: substitute_all(&sig.params, ctx),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use ilc_metadata::Id;

  #[test]
  fn unrelated_signatures_are_borrowed() {
    let list = Id::new(1);
    let other = Id::new(2);
    let args = [TypeSig::I4];
    let ctx = GenericContext::for_type(list, &args);

    let sig = TypeSig::sz_array(TypeSig::var(other, 0));
    assert!(matches!(substitute(&sig, &ctx), Cow::Borrowed(_)));
    assert!(matches!(substitute(&TypeSig::R8, &ctx), Cow::Borrowed(_)));
  }

  #[test]
  fn replaces_only_owned_placeholders() {
    let pair = Id::new(1);
    let foreign = Id::new(7);
    let method = Id::new(3);
    let type_args = [TypeSig::I4, TypeSig::Class(Id::new(0))];
    let method_args = [TypeSig::R8];
    let ctx = GenericContext::for_method(pair, &type_args, method, &method_args);

    let sig = TypeSig::generic(
      Id::new(5),
      vec![
        TypeSig::var(pair, 1),
        TypeSig::mvar(method, 0),
        TypeSig::var(foreign, 0),
        TypeSig::MVar { owner: None, index: 0 },
      ],
    );

    assert_eq!(
      substitute(&sig, &ctx).into_owned(),
      TypeSig::generic(
        Id::new(5),
        vec![
          TypeSig::Class(Id::new(0)),
          TypeSig::R8,
          TypeSig::var(foreign, 0),
          TypeSig::MVar { owner: None, index: 0 },
        ],
      )
    );
  }

  #[test]
  fn keeps_array_shape_and_modifiers() {
    let owner = Id::new(1);
    let args = [TypeSig::U2];
    let ctx = GenericContext::for_type(owner, &args);
    let sig = TypeSig::ModOpt {
      modifier: Id::new(9),
      next: Box::new(TypeSig::Array {
        elem: Box::new(TypeSig::var(owner, 0)),
        rank: 3,
        sizes: vec![2, 4],
        lower_bounds: vec![0, -1],
      }),
    };

    let expected = TypeSig::ModOpt {
      modifier: Id::new(9),
      next: Box::new(TypeSig::Array {
        elem: Box::new(TypeSig::U2),
        rank: 3,
        sizes: vec![2, 4],
        lower_bounds: vec![0, -1],
      }),
    };
    assert_eq!(substitute(&sig, &ctx).into_owned(), expected);
  }
}
