//! Instruction operand resolution for method bodies.

use ilc_config::DebugTrace;
use ilc_diagnostics::message::DiagnosticMessage;
use ilc_log::trace_dbg;
use ilc_metadata::{FieldRef, Instruction, MethodDefId, MethodRef, MethodSig, OpCode, Operand, TypeSig};

use crate::instance::{
  FieldInstanceId, MethodInstanceId, ResolvedHandler, ResolvedInstruction, ResolvedOperand, TypeInstanceId, TypeKey,
};
use crate::resolver::Resolver;
use crate::subst::{substitute, substitute_all, GenericContext};

impl Resolver {
  /// Substitutes and interns every operand of the body of `id`.
  pub(crate) fn process_method(
    &mut self,
    id: MethodInstanceId,
  ) -> Result<(), DiagnosticMessage> {
    let metadata = self.metadata.clone();
    let (owner, def, args) = {
      let method = self.store.method_instance(id);
      (method.owner, method.def, method.args.clone())
    };
    let Some(body) = &metadata.method(def).body else {
      return Ok(());
    };

    let owner_key = self.store.type_instance(owner).key.clone();
    let ctx = GenericContext::for_method(owner_key.def, &owner_key.args, def, &args);
    let referrer = self.method_name(id);

    let mut targets = vec![false; body.instructions.len()];
    let handler_starts = body
      .handlers
      .iter()
      .flat_map(|h| [Some(h.try_start), Some(h.handler_start), h.filter_start])
      .flatten();
    let branch_targets = body.instructions.iter().flat_map(Instruction::branch_targets);
    for target in branch_targets.chain(handler_starts) {
      if let Some(flag) = targets.get_mut(target) {
        *flag = true;
      }
    }

    let mut instructions = Vec::with_capacity(body.instructions.len());
    for (instr, is_target) in body.instructions.iter().zip(targets) {
      let (opcode, operand) = self.resolve_instruction(instr, &ctx, &referrer)?;
      instructions.push(ResolvedInstruction {
        opcode,
        operand,
        is_target,
      });
    }

    let mut locals = Vec::with_capacity(body.locals.len());
    for local in &body.locals {
      let local = substitute(local, &ctx).into_owned();
      self.intern_layout(&local, &referrer)?;
      locals.push(local);
    }

    let mut handlers = Vec::with_capacity(body.handlers.len());
    for handler in &body.handlers {
      let catch_type = match &handler.catch_type {
        Some(sig) => Some(self.intern_required(&substitute(sig, &ctx), &referrer)?),
        None => None,
      };
      handlers.push(ResolvedHandler {
        kind: handler.kind,
        try_start: handler.try_start,
        try_end: handler.try_end,
        handler_start: handler.handler_start,
        handler_end: handler.handler_end,
        filter_start: handler.filter_start,
        catch_type,
      });
    }

    trace_dbg!(
      &self.config,
      DebugTrace::Resolve,
      "processed {} ({} instructions)",
      referrer,
      instructions.len()
    );

    let method = self.store.method_mut(id);
    method.instructions = instructions;
    method.locals = locals;
    method.handlers = handlers;
    Ok(())
  }

  fn resolve_instruction(
    &mut self,
    instr: &Instruction,
    ctx: &GenericContext,
    referrer: &str,
  ) -> Result<(OpCode, ResolvedOperand), DiagnosticMessage> {
    let opcode = instr.opcode;
    let operand = match &instr.operand {
      Operand::None => ResolvedOperand::None,
      Operand::Int32(value) => ResolvedOperand::Int32(*value),
      Operand::Int64(value) => ResolvedOperand::Int64(*value),
      Operand::Float(value) => ResolvedOperand::Float(value.0),
      Operand::String(value) => {
        if opcode == OpCode::Ldstr {
          self.mark_string_literal()?;
        }
        ResolvedOperand::String(value.clone())
      },
      Operand::Local(index) => ResolvedOperand::Local(*index),
      Operand::Arg(index) => ResolvedOperand::Arg(*index),
      Operand::Branch(target) => ResolvedOperand::Branch(*target),
      Operand::Switch(targets) => ResolvedOperand::Switch(targets.clone()),
      Operand::Method(method) => return self.resolve_call(opcode, method, ctx, referrer),
      Operand::Field(field) => {
        let id = self.resolve_field_ref(field, ctx, referrer)?;
        let field = self.store.field_instance(id);
        if field.is_static {
          let owner = field.owner;
          self.ensure_cctor(owner)?;
        }
        ResolvedOperand::Field(id)
      },
      Operand::Type(sig) => self.resolve_type_operand(opcode, sig, ctx, referrer)?,
    };
    Ok((opcode, operand))
  }

  fn mark_string_literal(&mut self) -> Result<(), DiagnosticMessage> {
    if let Some(string) = self.metadata.corlib.string {
      let ty = self.intern_type(TypeKey::new(string, Vec::new()))?;
      self.mark_instantiated(ty)?;
    }
    Ok(())
  }

  fn resolve_type_operand(
    &mut self,
    opcode: OpCode,
    sig: &TypeSig,
    ctx: &GenericContext,
    referrer: &str,
  ) -> Result<ResolvedOperand, DiagnosticMessage> {
    let sig = substitute(sig, ctx).into_owned();

    if opcode == OpCode::Newarr {
      if let Some(array) = self.intern_type_sig(&TypeSig::sz_array(sig.clone()), referrer)? {
        self.mark_instantiated(array)?;
      }
    }

    Ok(match self.intern_type_sig(&sig, referrer)? {
      Some(ty) => {
        // Unboxing, type tests and constrained calls all see the boxed form of a value type.
        let boxed_use = matches!(
          opcode,
          OpCode::Unbox | OpCode::UnboxAny | OpCode::Isinst | OpCode::Castclass | OpCode::Constrained
        );
        let is_value_type = self.metadata.type_def(self.store.type_instance(ty).def()).is_value_type();
        if opcode == OpCode::Box || (boxed_use && is_value_type) {
          self.mark_instantiated(ty)?;
        }
        ResolvedOperand::Type(ty)
      },
      None => ResolvedOperand::Sig(sig),
    })
  }

  /// Resolves a call-like operand and decides between direct use and deferred dispatch.
  ///
  /// `callvirt` and `ldvirtftn` on non-virtual targets become their direct forms.
  fn resolve_call(
    &mut self,
    opcode: OpCode,
    method: &MethodRef,
    ctx: &GenericContext,
    referrer: &str,
  ) -> Result<(OpCode, ResolvedOperand), DiagnosticMessage> {
    let target = self.resolve_method_ref(method, ctx, referrer)?;
    let (owner, def) = {
      let instance = self.store.method_instance(target);
      (instance.owner, instance.def)
    };
    let metadata = self.metadata.clone();
    let method_def = metadata.method(def);

    let (opcode, target) = match opcode {
      OpCode::Callvirt | OpCode::Ldvirtftn if method_def.is_virtual() => {
        self.add_dispatch_entry(target);
        (opcode, target)
      },
      OpCode::Callvirt => {
        self.mark_direct(target);
        (OpCode::Call, target)
      },
      OpCode::Ldvirtftn => {
        self.mark_direct(target);
        (OpCode::Ldftn, target)
      },
      OpCode::Newobj => {
        self.mark_instantiated(owner)?;
        self.mark_direct(target);
        (opcode, target)
      },
      _ => {
        let target = self.redirect_same_type(target)?;
        self.mark_direct(target);
        (opcode, target)
      },
    };

    if method_def.is_static() {
      self.ensure_cctor(owner)?;
    }
    Ok((opcode, ResolvedOperand::Method(target)))
  }

  /// A direct call to a virtual method that a sibling in the same type explicitly
  /// overrides lands on the sibling.
  fn redirect_same_type(
    &mut self,
    target: MethodInstanceId,
  ) -> Result<MethodInstanceId, DiagnosticMessage> {
    let (owner, def, args) = {
      let instance = self.store.method_instance(target);
      (instance.owner, instance.def, instance.args.clone())
    };
    let metadata = self.metadata.clone();
    let owner_def = metadata.type_def(self.store.type_instance(owner).def());
    let has_explicit = owner_def.methods.iter().any(|m| metadata.method(*m).has_overrides());
    if !metadata.method(def).is_virtual() || owner_def.is_interface() || !has_explicit {
      return Ok(target);
    }

    let table = self.vtable_of(owner)?;
    match table.same_type_replacement(def).cloned() {
      Some(replacement) => {
        let ty = self.intern_type(replacement.ty)?;
        self.intern_method(ty, replacement.method, args)
      },
      None => Ok(target),
    }
  }

  pub(crate) fn resolve_method_ref(
    &mut self,
    method: &MethodRef,
    ctx: &GenericContext,
    referrer: &str,
  ) -> Result<MethodInstanceId, DiagnosticMessage> {
    match method {
      MethodRef::Spec { method, args } => {
        let args = substitute_all(args, ctx);
        self.resolve_method_with(method, ctx, args, referrer)
      },
      method => self.resolve_method_with(method, ctx, Vec::new(), referrer),
    }
  }

  fn resolve_method_with(
    &mut self,
    method: &MethodRef,
    ctx: &GenericContext,
    method_args: Vec<TypeSig>,
    referrer: &str,
  ) -> Result<MethodInstanceId, DiagnosticMessage> {
    let metadata = self.metadata.clone();
    match method {
      MethodRef::Def(def) => {
        let parent = metadata.self_sig(metadata.method(*def).owner);
        let owner = self.intern_required(&substitute(&parent, ctx), referrer)?;
        self.intern_method(owner, *def, method_args)
      },
      MethodRef::Member { parent, name, sig } => {
        let parent = substitute(parent, ctx);
        let start = self.intern_required(&parent, referrer)?;
        let (owner, def) = self
          .find_member_method(start, name, sig)
          .ok_or_else(|| DiagnosticMessage::UnresolvedMethod {
            parent: metadata.sig_name(&parent),
            name: name.clone(),
            signature: metadata.method_sig_name(sig),
            referrer: referrer.to_string(),
          })?;
        self.intern_method(owner, def, method_args)
      },
      MethodRef::Spec { method, .. } => Err(DiagnosticMessage::UnresolvedMethod {
        parent: "<generic instantiation>".to_string(),
        name: format!("{:?}", method),
        signature: "nested instantiation".to_string(),
        referrer: referrer.to_string(),
      }),
    }
  }

  /// Looks `name` up in `start` and then its base chain.
  fn find_member_method(
    &self,
    start: TypeInstanceId,
    name: &str,
    sig: &MethodSig,
  ) -> Option<(TypeInstanceId, MethodDefId)> {
    let mut current = Some(start);
    while let Some(ty) = current {
      let instance = self.store.type_instance(ty);
      let found = self.metadata.type_def(instance.def()).methods.iter().copied().find(|m| {
        let method = self.metadata.method(*m);
        method.name == name && same_signature(&method.sig, sig)
      });
      if let Some(method) = found {
        return Some((ty, method));
      }
      current = instance.base;
    }
    None
  }

  pub(crate) fn resolve_field_ref(
    &mut self,
    field: &FieldRef,
    ctx: &GenericContext,
    referrer: &str,
  ) -> Result<FieldInstanceId, DiagnosticMessage> {
    let metadata = self.metadata.clone();
    match field {
      FieldRef::Def(def) => {
        let parent = metadata.self_sig(metadata.field(*def).owner);
        let owner = self.intern_required(&substitute(&parent, ctx), referrer)?;
        self.intern_field(owner, *def)
      },
      FieldRef::Member { parent, name } => {
        let parent = substitute(parent, ctx);
        let mut current = Some(self.intern_required(&parent, referrer)?);
        while let Some(ty) = current {
          let instance = self.store.type_instance(ty);
          if let Some(def) = metadata.find_field(instance.def(), name) {
            return self.intern_field(ty, def);
          }
          current = instance.base;
        }
        Err(DiagnosticMessage::UnresolvedField {
          parent: metadata.sig_name(&parent),
          name: name.clone(),
          referrer: referrer.to_string(),
        })
      },
    }
  }
}

/// Signatures match when they agree after method placeholders are detached.
fn same_signature(
  declared: &MethodSig,
  referenced: &MethodSig,
) -> bool {
  declared.call_conv == referenced.call_conv
    && declared.params.len() == referenced.params.len()
    && declared.ret.detach_method_vars() == referenced.ret.detach_method_vars()
    && declared
      .params
      .iter()
      .zip(&referenced.params)
      .all(|(a, b)| a.detach_method_vars() == b.detach_method_vars())
}
