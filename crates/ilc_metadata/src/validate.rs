use ilc_diagnostics::message::DiagnosticMessage;

use crate::body::{FieldRef, MethodBody, MethodRef, Operand};
use crate::def::MethodSig;
use crate::model::Metadata;
use crate::sig::TypeSig;
use crate::{Id, Store};

fn check_handle<T>(
  store: &Store<T>,
  id: &Id<T>,
  kind: &'static str,
  referrer: &str,
) -> Result<(), DiagnosticMessage> {
  if store.contains(id) {
    Ok(())
  } else {
    Err(DiagnosticMessage::DanglingHandle {
      kind,
      index: id.index(),
      referrer: referrer.to_string(),
    })
  }
}

impl Metadata {
  /// Checks that every handle, placeholder and branch target in the model points somewhere valid.
  ///
  /// After this succeeds, handle lookups in later stages cannot go out of range.
  pub fn validate(&self) -> Result<(), DiagnosticMessage> {
    for (_, def) in self.types.iter() {
      let referrer = def.full_name();
      for field in &def.fields {
        check_handle(&self.fields, field, "field", &referrer)?;
      }
      for method in &def.methods {
        check_handle(&self.methods, method, "method", &referrer)?;
      }
      if let Some(base) = &def.base {
        self.check_sig(base, &referrer)?;
      }
      for interface in &def.interfaces {
        self.check_sig(interface, &referrer)?;
      }
    }

    for (_, method) in self.methods.iter() {
      check_handle(&self.types, &method.owner, "type", &method.name)?;
      let referrer = format!("{}::{}", self.full_name(method.owner), method.name);

      self.check_method_sig(&method.sig, &referrer)?;
      for target in &method.overrides {
        self.check_method_ref(target, &referrer)?;
      }
      if let Some(body) = &method.body {
        self.check_body(body, &referrer)?;
      }
    }

    for (_, field) in self.fields.iter() {
      check_handle(&self.types, &field.owner, "type", &field.name)?;
      let referrer = format!("{}::{}", self.full_name(field.owner), field.name);
      self.check_sig(&field.field_type, &referrer)?;
    }

    for def in [self.corlib.object, self.corlib.string, self.corlib.array].iter().flatten() {
      check_handle(&self.types, def, "type", "core library settings")?;
    }

    Ok(())
  }

  fn check_sig(
    &self,
    sig: &TypeSig,
    referrer: &str,
  ) -> Result<(), DiagnosticMessage> {
    match sig {
      TypeSig::Class(def) | TypeSig::ValueType(def) => check_handle(&self.types, def, "type", referrer),
      TypeSig::GenericInst { generic, args, .. } => {
        check_handle(&self.types, generic, "type", referrer)?;
        let expected = self.type_def(*generic).generic_params.len();
        if expected != args.len() {
          return Err(DiagnosticMessage::GenericArityMismatch {
            definition: self.full_name(*generic),
            expected,
            got: args.len(),
          });
        }
        for arg in args {
          self.check_sig(arg, referrer)?;
        }
        Ok(())
      },
      TypeSig::Var { owner, index } => {
        check_handle(&self.types, owner, "type", referrer)?;
        let arity = self.type_def(*owner).generic_params.len();
        if *index as usize >= arity {
          return Err(DiagnosticMessage::PlaceholderOutOfRange {
            placeholder: format!("!{}", index),
            arity,
            referrer: referrer.to_string(),
          });
        }
        Ok(())
      },
      TypeSig::MVar { owner, index } => {
        let Some(owner) = owner else {
          return Ok(());
        };
        check_handle(&self.methods, owner, "method", referrer)?;
        let arity = self.method(*owner).generic_params.len();
        if *index as usize >= arity {
          return Err(DiagnosticMessage::PlaceholderOutOfRange {
            placeholder: format!("!!{}", index),
            arity,
            referrer: referrer.to_string(),
          });
        }
        Ok(())
      },
      TypeSig::ModReqd { modifier, next } | TypeSig::ModOpt { modifier, next } => {
        check_handle(&self.types, modifier, "type", referrer)?;
        self.check_sig(next, referrer)
      },
      sig => match sig.element() {
        Some(inner) => self.check_sig(inner, referrer),
        None => Ok(()),
      },
    }
  }

  fn check_method_sig(
    &self,
    sig: &MethodSig,
    referrer: &str,
  ) -> Result<(), DiagnosticMessage> {
    self.check_sig(&sig.ret, referrer)?;
    for param in &sig.params {
      self.check_sig(param, referrer)?;
    }
    Ok(())
  }

  fn check_method_ref(
    &self,
    method: &MethodRef,
    referrer: &str,
  ) -> Result<(), DiagnosticMessage> {
    match method {
      MethodRef::Def(id) => check_handle(&self.methods, id, "method", referrer),
      MethodRef::Member { parent, sig, .. } => {
        self.check_sig(parent, referrer)?;
        self.check_method_sig(sig, referrer)
      },
      MethodRef::Spec { method, args } => {
        self.check_method_ref(method, referrer)?;
        for arg in args {
          self.check_sig(arg, referrer)?;
        }
        Ok(())
      },
    }
  }

  fn check_body(
    &self,
    body: &MethodBody,
    referrer: &str,
  ) -> Result<(), DiagnosticMessage> {
    let count = body.instructions.len();
    let out_of_range = |instruction: usize, target: usize| DiagnosticMessage::BranchOutOfRange {
      method: referrer.to_string(),
      instruction,
      target,
    };

    for local in &body.locals {
      self.check_sig(local, referrer)?;
    }

    for (index, instr) in body.instructions.iter().enumerate() {
      match &instr.operand {
        Operand::Method(method) => self.check_method_ref(method, referrer)?,
        Operand::Field(FieldRef::Def(id)) => check_handle(&self.fields, id, "field", referrer)?,
        Operand::Field(FieldRef::Member { parent, .. }) => self.check_sig(parent, referrer)?,
        Operand::Type(sig) => self.check_sig(sig, referrer)?,
        _ => {},
      }

      for target in instr.branch_targets() {
        if target >= count {
          return Err(out_of_range(index, target));
        }
      }
    }

    for handler in &body.handlers {
      let bounds = [handler.try_start, handler.try_end, handler.handler_start, handler.handler_end];
      if let Some(bad) = bounds.iter().copied().find(|b| *b > count) {
        return Err(out_of_range(handler.try_start, bad));
      }
      if let Some(filter) = handler.filter_start {
        if filter >= count {
          return Err(out_of_range(handler.try_start, filter));
        }
      }
      if let Some(catch_type) = &handler.catch_type {
        self.check_sig(catch_type, referrer)?;
      }
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use crate::body::{Instruction, OpCode, Operand};
  use crate::builder::MetadataBuilder;
  use crate::def::{GenericParam, MethodFlags, MethodSig};
  use crate::sig::TypeSig;
  use crate::Id;
  use ilc_diagnostics::message::DiagnosticMessage;

  #[test]
  fn rejects_dangling_type_handles() {
    let mut b = MetadataBuilder::new("dangling");
    b.class("Demo", "Broken", Some(TypeSig::Class(Id::new(42))));

    let err = b.finish().unwrap_err();
    assert!(matches!(err, DiagnosticMessage::DanglingHandle { kind: "type", index: 42, .. }));
  }

  #[test]
  fn rejects_placeholders_beyond_the_owner_arity() {
    let mut b = MetadataBuilder::new("arity");
    let object = b.class("System", "Object", None);
    let boxed = b.class("Demo", "Box`1", Some(TypeSig::Class(object)));
    b.set_generic_params(boxed, vec![GenericParam::new("T")]);
    b.field(boxed, "second", false, TypeSig::var(boxed, 1));

    let err = b.finish().unwrap_err();
    assert_eq!(err.code(), "IL0004");
  }

  #[test]
  fn rejects_branches_outside_the_body() {
    let mut b = MetadataBuilder::new("branch");
    let object = b.class("System", "Object", None);
    let main = b.method(
      object,
      "Main",
      MethodFlags::static_method(),
      MethodSig::static_sig(TypeSig::Void, vec![]),
    );
    b.set_body(
      main,
      vec![
        Instruction::new(OpCode::Br, Operand::Branch(5)),
        Instruction::simple(OpCode::Ret),
      ],
    );

    let err = b.finish().unwrap_err();
    assert!(matches!(
      err,
      DiagnosticMessage::BranchOutOfRange {
        instruction: 0,
        target: 5,
        ..
      }
    ));
  }
}
