use ilc_metadata::{Metadata, MethodDefId, TypeSig};

use crate::subst::{substitute, substitute_all, GenericContext};

/// Normalized method signature used to match slots across a hierarchy.
///
/// Method placeholders are detached from their defining method, so `M<T>(T)` declared
/// in a base and in a derived type produce equal keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignatureKey {
  pub name: String,
  pub call_conv: u8,
  pub generic_arity: u32,
  pub ret: TypeSig,
  pub params: Vec<TypeSig>,
}

impl SignatureKey {
  /// Key of `method` with its declaring type's placeholders substituted through `ctx`.
  pub fn of_method(
    metadata: &Metadata,
    method: MethodDefId,
    ctx: &GenericContext,
  ) -> Self {
    let def = metadata.method(method);
    Self {
      name: def.name.clone(),
      call_conv: def.sig.call_conv,
      generic_arity: def.generic_params.len() as u32,
      ret: substitute(&def.sig.ret, ctx).detach_method_vars(),
      params: def
        .sig
        .params
        .iter()
        .map(|p| substitute(p, ctx).detach_method_vars())
        .collect(),
    }
  }

  pub fn substituted(
    &self,
    ctx: &GenericContext,
  ) -> Self {
    Self {
      name: self.name.clone(),
      call_conv: self.call_conv,
      generic_arity: self.generic_arity,
      ret: substitute(&self.ret, ctx).into_owned(),
      params: substitute_all(&self.params, ctx),
    }
  }

  /// `Name<2>(int32,T) -> void`
  pub fn display(
    &self,
    metadata: &Metadata,
  ) -> String {
    let params: Vec<String> = self.params.iter().map(|p| metadata.sig_name(p)).collect();
    let arity = if self.generic_arity > 0 {
      format!("<{}>", self.generic_arity)
    } else {
      String::new()
    };
    format!(
      "{}{}({}) -> {}",
      self.name,
      arity,
      params.join(","),
      metadata.sig_name(&self.ret)
    )
  }
}
