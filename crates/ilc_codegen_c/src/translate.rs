//! Method bodies to C statements.
//!
//! The evaluation stack is tracked symbolically: pushes build C expressions and only
//! side effects (calls, allocations, stores) become statements. Values still on the
//! stack when control flow merges are spilled into per-depth slot variables.

use std::collections::HashMap;
use std::fmt::Write;

use indexmap::IndexSet;
use ilc_metadata::{HandlerKind, OpCode, TypeSig};
use ilc_mono::{
  FieldInstanceId, MethodInstance, MethodInstanceId, ResolvedInstruction, ResolvedOperand, Resolver, TypeInstanceId,
};

use crate::naming::{sig_instances, NameTable, TypeShape};

/// Everything a translator may consult.
pub struct TranslateContext<'a> {
  pub resolver: &'a Resolver,
  pub names: &'a NameTable,
}

/// Function body text (without the surrounding braces) and the types it needs
/// complete declarations of.
#[derive(Debug, Default, Clone)]
pub struct TranslatedBody {
  pub code: String,
  pub deps: IndexSet<TypeInstanceId>,
}

/// Turns the resolved instruction stream of one method into C statements.
pub trait BodyTranslator {
  fn translate(
    &self,
    ctx: &TranslateContext,
    method: MethodInstanceId,
  ) -> TranslatedBody;
}

/// Stack-simulating translator covering control flow, calls, object creation,
/// field access, locals and arguments, constants and arithmetic.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultTranslator;

impl BodyTranslator for DefaultTranslator {
  fn translate(
    &self,
    ctx: &TranslateContext,
    method: MethodInstanceId,
  ) -> TranslatedBody {
    BodyWriter::new(ctx, method).run()
  }
}

#[derive(Debug, Clone, PartialEq)]
struct StackValue {
  expr: String,
  ty: String,
}

impl StackValue {
  fn new(
    expr: impl Into<String>,
    ty: impl Into<String>,
  ) -> Self {
    Self {
      expr: expr.into(),
      ty: ty.into(),
    }
  }
}

struct BodyWriter<'a> {
  ctx: &'a TranslateContext<'a>,
  id: MethodInstanceId,
  method: &'a MethodInstance,
  stack: Vec<StackValue>,
  /// Declared temporaries, `(type, name)`.
  temps: Vec<(String, String)>,
  /// Spill slot type per stack depth.
  slots: Vec<String>,
  entry_stacks: HashMap<usize, Vec<StackValue>>,
  lines: Vec<String>,
  deps: IndexSet<TypeInstanceId>,
  reachable: bool,
}

impl<'a> BodyWriter<'a> {
  fn new(
    ctx: &'a TranslateContext<'a>,
    id: MethodInstanceId,
  ) -> Self {
    Self {
      ctx,
      id,
      method: ctx.resolver.store().method_instance(id),
      stack: Vec::new(),
      temps: Vec::new(),
      slots: Vec::new(),
      entry_stacks: HashMap::new(),
      lines: Vec::new(),
      deps: IndexSet::new(),
      reachable: true,
    }
  }

  fn run(mut self) -> TranslatedBody {
    let method = self.method;
    for (index, instr) in method.instructions.iter().enumerate() {
      self.enter_handlers(index);
      if instr.is_target {
        self.enter_label(index);
      }
      self.instruction(instr);
    }

    let mut code = String::new();
    for (ty, name) in &self.temps {
      writeln!(code, "  {} {};", ty, name).unwrap();
    }
    for (index, local) in method.locals.iter().enumerate() {
      let ty = self.c_type(local);
      writeln!(code, "  {} loc{};", ty, index).unwrap();
    }
    for index in 0..method.locals.len() {
      writeln!(code, "  memset(&loc{0}, 0, sizeof(loc{0}));", index).unwrap();
    }
    for line in &self.lines {
      writeln!(code, "{}", line).unwrap();
    }

    TranslatedBody { code, deps: self.deps }
  }

  // #region Control flow

  fn enter_handlers(
    &mut self,
    index: usize,
  ) {
    let method = self.method;
    for handler in &method.handlers {
      if handler.try_start == index {
        self.comment("try");
      }
      if handler.filter_start == Some(index) {
        self.comment("filter");
        self.begin_catch();
      }
      if handler.handler_start != index {
        continue;
      }
      match handler.kind {
        HandlerKind::Catch => {
          let name = handler
            .catch_type
            .map(|ty| self.ctx.resolver.type_name(ty))
            .unwrap_or_default();
          self.comment(&format!("catch {}", name));
          self.begin_catch();
        },
        HandlerKind::Filter => {
          self.comment("filtered catch");
          self.begin_catch();
        },
        HandlerKind::Finally => self.comment("finally"),
        HandlerKind::Fault => self.comment("fault"),
      }
    }
  }

  /// Catch and filter blocks start with the exception object on the stack.
  fn begin_catch(&mut self) {
    let ty = self.ctx.names.object_type();
    self.stack = vec![StackValue::new(format!("({})il2c_current_exception()", ty), ty)];
    self.entry_stacks.clear();
    self.reachable = true;
  }

  fn enter_label(
    &mut self,
    index: usize,
  ) {
    if self.reachable {
      self.spill();
      self.entry_stacks.entry(index).or_insert_with(|| self.stack.clone());
    } else if let Some(stack) = self.entry_stacks.get(&index) {
      self.stack = stack.clone();
    }
    self.lines.push(format!("L{}:;", index));
    self.reachable = true;
  }

  /// Moves every stack value into its depth's slot variable.
  fn spill(&mut self) {
    for depth in 0..self.stack.len() {
      let slot = format!("s{}", depth);
      if depth == self.slots.len() {
        let ty = self.stack[depth].ty.clone();
        self.temps.push((ty.clone(), slot.clone()));
        self.slots.push(ty);
      }
      let value = self.stack[depth].clone();
      if value.expr != slot {
        let expr = coerce(&value, &self.slots[depth]);
        self.stmt(format!("{} = {};", slot, expr));
      }
      self.stack[depth] = StackValue::new(slot, self.slots[depth].clone());
    }
  }

  fn branch_to(
    &mut self,
    target: usize,
  ) {
    self.spill();
    self.entry_stacks.entry(target).or_insert_with(|| self.stack.clone());
  }

  fn end_block(&mut self) {
    self.stack.clear();
    self.reachable = false;
  }

  // #endregion Control flow

  fn instruction(
    &mut self,
    instr: &ResolvedInstruction,
  ) {
    use ResolvedOperand as O;

    match (instr.opcode, &instr.operand) {
      (OpCode::Nop, _) => {},

      (OpCode::Ldarg, O::Arg(index)) => {
        let ty = self.param_type(*index);
        self.push(format!("arg{}", index), ty);
      },
      (OpCode::Ldarga, O::Arg(index)) => {
        let ty = self.param_type(*index);
        self.push(format!("&arg{}", index), format!("{}*", ty));
      },
      (OpCode::Starg, O::Arg(index)) => {
        let ty = self.param_type(*index);
        let value = self.pop();
        self.stmt(format!("arg{} = {};", index, coerce(&value, &ty)));
      },
      (OpCode::Ldloc, O::Local(index)) => {
        let ty = self.local_type(*index);
        self.push(format!("loc{}", index), ty);
      },
      (OpCode::Ldloca, O::Local(index)) => {
        let ty = self.local_type(*index);
        self.push(format!("&loc{}", index), format!("{}*", ty));
      },
      (OpCode::Stloc, O::Local(index)) => {
        let ty = self.local_type(*index);
        let value = self.pop();
        self.stmt(format!("loc{} = {};", index, coerce(&value, &ty)));
      },

      (OpCode::Ldnull, _) => self.push("NULL", "void*"),
      (OpCode::LdcI4, O::Int32(value)) => self.push(int32_literal(*value), "int32_t"),
      (OpCode::LdcI8, O::Int64(value)) => self.push(int64_literal(*value), "int64_t"),
      (OpCode::LdcR8, O::Float(value)) => self.push(float_literal(*value), "double"),
      (OpCode::Ldstr, O::String(value)) => {
        let ty = match self.ctx.resolver.metadata().corlib.string {
          Some(string) => self.c_type(&TypeSig::Class(string)),
          None => "void*".to_string(),
        };
        let temp = self.temp(&ty);
        self.stmt(format!("{} = ({})il2c_new_string({});", temp, ty, string_literal(value)));
        self.push(temp, ty);
      },

      (OpCode::Dup, _) => {
        let value = self.pop();
        let value = if is_simple(&value.expr) {
          value
        } else {
          let temp = self.temp(&value.ty);
          self.stmt(format!("{} = {};", temp, value.expr));
          StackValue::new(temp, value.ty)
        };
        self.stack.push(value.clone());
        self.stack.push(value);
      },
      (OpCode::Pop, _) => {
        self.pop();
      },

      (OpCode::Call, O::Method(target)) => {
        let name = self.ctx.names.method_name(*target).to_string();
        self.call(*target, name);
      },
      (OpCode::Callvirt, O::Method(target)) => {
        let name = self
          .ctx
          .names
          .dispatcher_name(*target)
          .unwrap_or_else(|| self.ctx.names.method_name(*target))
          .to_string();
        self.call(*target, name);
      },
      (OpCode::Newobj, O::Method(ctor)) => self.newobj(*ctor),
      (OpCode::Ldftn, O::Method(target)) => {
        self.note_method(*target);
        let name = self.ctx.names.method_name(*target);
        self.push(format!("(void*)&{}", name), "void*");
      },
      (OpCode::Ldvirtftn, O::Method(target)) => {
        self.pop();
        self.note_method(*target);
        let name = self
          .ctx
          .names
          .dispatcher_name(*target)
          .unwrap_or_else(|| self.ctx.names.method_name(*target));
        self.push(format!("(void*)&{}", name), "void*");
      },

      (OpCode::Ret, _) => {
        let method = self.method;
        if method.ret == TypeSig::Void {
          self.stmt("return;".to_string());
        } else {
          let ty = self.c_type(&method.ret);
          let value = self.pop();
          self.stmt(format!("return {};", coerce(&value, &ty)));
        }
        self.end_block();
      },
      (OpCode::Throw, _) => {
        let value = self.pop();
        self.stmt(format!("il2c_throw({});", value.expr));
        self.end_block();
      },
      (OpCode::Rethrow, _) => {
        self.stmt("il2c_rethrow();".to_string());
        self.end_block();
      },
      (OpCode::Endfinally, _) => {
        self.comment("endfinally");
        self.end_block();
      },

      (OpCode::Br, O::Branch(target)) => {
        self.branch_to(*target);
        self.stmt(format!("goto L{};", target));
        self.end_block();
      },
      (OpCode::Leave, O::Branch(target)) => {
        self.stack.clear();
        self.entry_stacks.entry(*target).or_default();
        self.stmt(format!("goto L{};", target));
        self.end_block();
      },
      (OpCode::Brtrue | OpCode::Brfalse, O::Branch(target)) => {
        let value = self.pop();
        let condition = if instr.opcode == OpCode::Brtrue {
          value.expr
        } else {
          format!("!({})", value.expr)
        };
        self.branch_to(*target);
        self.stmt(format!("if ({}) goto L{};", condition, target));
      },
      (OpCode::Beq | OpCode::Bne | OpCode::Blt | OpCode::Ble | OpCode::Bgt | OpCode::Bge, O::Branch(target)) => {
        let right = self.pop();
        let left = self.pop();
        let op = comparison_operator(instr.opcode);
        self.branch_to(*target);
        self.stmt(format!("if ({} {} {}) goto L{};", left.expr, op, right.expr, target));
      },
      (OpCode::Switch, O::Switch(targets)) => {
        let value = self.pop();
        for target in targets {
          self.branch_to(*target);
        }
        self.stmt(format!("switch ({})", value.expr));
        self.stmt("{".to_string());
        for (case, target) in targets.iter().enumerate() {
          self.stmt(format!("  case {}: goto L{};", case, target));
        }
        self.stmt("}".to_string());
      },

      (
        OpCode::Add
        | OpCode::Sub
        | OpCode::Mul
        | OpCode::Div
        | OpCode::Rem
        | OpCode::And
        | OpCode::Or
        | OpCode::Xor
        | OpCode::Shl
        | OpCode::Shr,
        _,
      ) => {
        let right = self.pop();
        let left = self.pop();
        let op = arithmetic_operator(instr.opcode);
        self.push(format!("({} {} {})", left.expr, op, right.expr), left.ty);
      },
      (OpCode::Neg | OpCode::Not, _) => {
        let value = self.pop();
        let op = if instr.opcode == OpCode::Neg { "-" } else { "~" };
        self.push(format!("({}{})", op, value.expr), value.ty);
      },
      (OpCode::Ceq | OpCode::Cgt | OpCode::Clt, _) => {
        let right = self.pop();
        let left = self.pop();
        let op = match instr.opcode {
          OpCode::Ceq => "==",
          OpCode::Cgt => ">",
          _ => "<",
        };
        self.push(format!("({} {} {})", left.expr, op, right.expr), "int32_t");
      },
      (OpCode::ConvI4 | OpCode::ConvI8 | OpCode::ConvR8, _) => {
        let value = self.pop();
        let ty = match instr.opcode {
          OpCode::ConvI4 => "int32_t",
          OpCode::ConvI8 => "int64_t",
          _ => "double",
        };
        self.push(format!("(({})({}))", ty, value.expr), ty);
      },

      (OpCode::Ldfld, O::Field(field)) => {
        let object = self.pop();
        let access = self.field_access(&object, *field);
        let ty = self.field_type(*field);
        self.push(access, ty);
      },
      (OpCode::Ldflda, O::Field(field)) => {
        let object = self.pop();
        let access = self.field_access(&object, *field);
        let ty = self.field_type(*field);
        self.push(format!("&{}", access), format!("{}*", ty));
      },
      (OpCode::Stfld, O::Field(field)) => {
        let value = self.pop();
        let object = self.pop();
        let access = self.field_access(&object, *field);
        let ty = self.field_type(*field);
        self.stmt(format!("{} = {};", access, coerce(&value, &ty)));
      },
      (OpCode::Ldsfld, O::Field(field)) => {
        let global = self.static_field(*field);
        let ty = self.field_type(*field);
        self.push(global, ty);
      },
      (OpCode::Ldsflda, O::Field(field)) => {
        let global = self.static_field(*field);
        let ty = self.field_type(*field);
        self.push(format!("&{}", global), format!("{}*", ty));
      },
      (OpCode::Stsfld, O::Field(field)) => {
        let value = self.pop();
        let global = self.static_field(*field);
        let ty = self.field_type(*field);
        self.stmt(format!("{} = {};", global, coerce(&value, &ty)));
      },

      (OpCode::Box, operand @ (O::Type(_) | O::Sig(_))) => {
        let value = self.pop();
        let sig = self.operand_sig(operand);
        if !sig.is_value_type() {
          self.stack.push(value);
          return;
        }
        let ty = self.c_type(&sig);
        let type_id = self.type_id_of(operand);
        let holder = self.temp(&ty);
        self.stmt(format!("{} = {};", holder, value.expr));
        let object = self.ctx.names.object_type();
        let boxed = self.temp(&object);
        self.stmt(format!(
          "{} = ({})il2c_box(&{}, sizeof({}), {});",
          boxed, object, holder, holder, type_id
        ));
        self.push(boxed, object);
      },
      (OpCode::Unbox, operand @ (O::Type(_) | O::Sig(_))) => {
        let value = self.pop();
        let ty = self.c_type(&self.operand_sig(operand));
        self.push(format!("(({}*)il2c_unbox({}))", ty, value.expr), format!("{}*", ty));
      },
      (OpCode::UnboxAny, operand @ (O::Type(_) | O::Sig(_))) => {
        let value = self.pop();
        let sig = self.operand_sig(operand);
        let ty = self.c_type(&sig);
        if sig.is_value_type() {
          self.push(format!("(*({}*)il2c_unbox({}))", ty, value.expr), ty);
        } else {
          self.push(format!("(({})({}))", ty, value.expr), ty);
        }
      },
      (OpCode::Isinst | OpCode::Castclass, operand @ (O::Type(_) | O::Sig(_))) => {
        let value = self.pop();
        let ty = self.c_type(&self.operand_sig(operand));
        let check = if instr.opcode == OpCode::Isinst {
          "il2c_isinst"
        } else {
          "il2c_castclass"
        };
        let type_id = self.type_id_of(operand);
        self.push(format!("(({}){}({}, {}))", ty, check, value.expr, type_id), ty);
      },

      (OpCode::Newarr, operand @ (O::Type(_) | O::Sig(_))) => {
        let count = self.pop();
        let elem = self.operand_sig(operand);
        let elem_ty = self.c_type(&elem);
        let array_ty = self.c_type(&TypeSig::sz_array(elem));
        let temp = self.temp(&array_ty);
        self.stmt(format!(
          "{} = ({})il2c_new_array(sizeof({}), {});",
          temp, array_ty, elem_ty, count.expr
        ));
        self.push(temp, array_ty);
      },
      (OpCode::Ldlen, _) => {
        let array = self.pop();
        self.push(format!("il2c_array_length({})", array.expr), "intptr_t");
      },
      (OpCode::Ldelem | OpCode::Ldelema, operand @ (O::Type(_) | O::Sig(_))) => {
        let index = self.pop();
        let array = self.pop();
        let ty = self.c_type(&self.operand_sig(operand));
        let element = format!("(({}*)il2c_array_data({}))[{}]", ty, array.expr, index.expr);
        if instr.opcode == OpCode::Ldelem {
          self.push(element, ty);
        } else {
          self.push(format!("&{}", element), format!("{}*", ty));
        }
      },
      (OpCode::Stelem, operand @ (O::Type(_) | O::Sig(_))) => {
        let value = self.pop();
        let index = self.pop();
        let array = self.pop();
        let ty = self.c_type(&self.operand_sig(operand));
        self.stmt(format!(
          "(({}*)il2c_array_data({}))[{}] = {};",
          ty,
          array.expr,
          index.expr,
          coerce(&value, &ty)
        ));
      },
      (OpCode::Initobj, operand @ (O::Type(_) | O::Sig(_))) => {
        let address = self.pop();
        let ty = self.c_type(&self.operand_sig(operand));
        self.stmt(format!("memset({}, 0, sizeof({}));", address.expr, ty));
      },
      (OpCode::Sizeof, operand @ (O::Type(_) | O::Sig(_))) => {
        let ty = self.c_type(&self.operand_sig(operand));
        self.push(format!("((int32_t)sizeof({}))", ty), "int32_t");
      },
      (OpCode::Ldtoken, _) => {
        self.comment("ldtoken");
        self.push("NULL", "void*");
      },

      (opcode, _) => self.comment(opcode.mnemonic()),
    }
  }

  // #region Calls

  fn call(
    &mut self,
    target: MethodInstanceId,
    name: String,
  ) {
    let ctx = self.ctx;
    let callee = ctx.resolver.store().method_instance(target);
    self.note_method(target);
    if ctx.resolver.metadata().method(callee.def).is_static() {
      self.run_cctor(callee.owner);
    }

    let args = self.pop_args(&callee.params);
    let call = format!("{}({})", name, args.join(", "));
    if callee.ret == TypeSig::Void {
      self.stmt(format!("{};", call));
    } else {
      let ty = self.c_type(&callee.ret);
      let temp = self.temp(&ty);
      self.stmt(format!("{} = {};", temp, call));
      self.push(temp, ty);
    }
  }

  fn newobj(
    &mut self,
    ctor: MethodInstanceId,
  ) {
    let ctx = self.ctx;
    let callee = ctx.resolver.store().method_instance(ctor);
    let owner = callee.owner;
    self.note_method(ctor);

    let args = self.pop_args(callee.params.get(1..).unwrap_or_default());
    let ty = ctx.names.instance_type(owner);
    let temp = self.temp(&ty);
    let name = ctx.names.method_name(ctor);

    let this = if ctx.names.shape(owner) == TypeShape::Struct {
      self.stmt(format!("memset(&{0}, 0, sizeof({0}));", temp));
      format!("&{}", temp)
    } else {
      self.stmt(format!(
        "{} = ({})il2c_new(sizeof({}), {});",
        temp,
        ty,
        ctx.names.struct_tag(owner),
        ctx.names.type_id_macro(owner)
      ));
      temp.clone()
    };

    let mut all = vec![this];
    all.extend(args);
    self.stmt(format!("{}({});", name, all.join(", ")));
    self.push(temp, ty);
  }

  /// Pops one value per parameter, coerced to the parameter's C type.
  fn pop_args(
    &mut self,
    params: &[TypeSig],
  ) -> Vec<String> {
    let mut args: Vec<String> = params
      .iter()
      .rev()
      .map(|param| {
        let ty = self.c_type(param);
        let value = self.pop();
        coerce(&value, &ty)
      })
      .collect();
    args.reverse();
    args
  }

  fn note_method(
    &mut self,
    target: MethodInstanceId,
  ) {
    let owner = self.ctx.resolver.store().method_instance(target).owner;
    self.deps.insert(owner);
  }

  /// Runs the static constructor of `owner` on first use.
  fn run_cctor(
    &mut self,
    owner: TypeInstanceId,
  ) {
    let Some(cctor) = self.ctx.resolver.store().type_instance(owner).cctor else {
      return;
    };
    if cctor == self.id {
      return;
    }
    self.deps.insert(owner);
    let flag = self.ctx.names.cctor_flag(owner);
    let name = self.ctx.names.method_name(cctor);
    self.stmt(format!("if (!{0}) {{ {0} = 1; {1}(); }}", flag, name));
  }

  // #endregion Calls

  // #region Fields

  fn field_access(
    &mut self,
    object: &StackValue,
    field: FieldInstanceId,
  ) -> String {
    let instance = self.ctx.resolver.store().field_instance(field);
    let owner = instance.owner;
    self.deps.insert(owner);
    let member = self.ctx.names.field_name(field);

    if self.ctx.names.shape(owner) == TypeShape::Struct {
      if object.ty.ends_with('*') {
        format!("({})->{}", object.expr, member)
      } else {
        format!("({}).{}", object.expr, member)
      }
    } else {
      let pointer = self.ctx.names.instance_type(owner);
      format!("(({})({}))->{}", pointer, object.expr, member)
    }
  }

  fn static_field(
    &mut self,
    field: FieldInstanceId,
  ) -> String {
    let owner = self.ctx.resolver.store().field_instance(field).owner;
    self.deps.insert(owner);
    self.run_cctor(owner);
    self.ctx.names.field_name(field).to_string()
  }

  fn field_type(
    &mut self,
    field: FieldInstanceId,
  ) -> String {
    let ctx = self.ctx;
    self.c_type(&ctx.resolver.store().field_instance(field).field_type)
  }

  // #endregion Fields

  // #region Helpers

  fn c_type(
    &mut self,
    sig: &TypeSig,
  ) -> String {
    self.deps.extend(sig_instances(self.ctx.resolver, sig));
    self.ctx.names.c_type(self.ctx.resolver, sig)
  }

  fn operand_sig(
    &self,
    operand: &ResolvedOperand,
  ) -> TypeSig {
    match operand {
      ResolvedOperand::Type(ty) => {
        let resolver = self.ctx.resolver;
        resolver.store().type_instance(*ty).key.to_sig(resolver.metadata())
      },
      ResolvedOperand::Sig(sig) => sig.clone(),
      _ => TypeSig::Void,
    }
  }

  fn type_id_of(
    &mut self,
    operand: &ResolvedOperand,
  ) -> String {
    match operand {
      ResolvedOperand::Type(ty) if self.ctx.names.type_id(*ty).is_some() => {
        self.deps.insert(*ty);
        self.ctx.names.type_id_macro(*ty)
      },
      _ => "0".to_string(),
    }
  }

  fn param_type(
    &mut self,
    index: u16,
  ) -> String {
    let method = self.method;
    match method.params.get(index as usize) {
      Some(sig) => self.c_type(sig),
      None => "void*".to_string(),
    }
  }

  fn local_type(
    &mut self,
    index: u16,
  ) -> String {
    let method = self.method;
    match method.locals.get(index as usize) {
      Some(sig) => self.c_type(sig),
      None => "void*".to_string(),
    }
  }

  fn temp(
    &mut self,
    ty: &str,
  ) -> String {
    let name = format!("t{}", self.temps.len());
    self.temps.push((ty.to_string(), name.clone()));
    name
  }

  fn push(
    &mut self,
    expr: impl Into<String>,
    ty: impl Into<String>,
  ) {
    self.stack.push(StackValue::new(expr, ty));
  }

  /// Underflow only happens on malformed bodies; the placeholder keeps the output well formed.
  fn pop(&mut self) -> StackValue {
    self.stack.pop().unwrap_or_else(|| StackValue::new("0", "intptr_t"))
  }

  fn stmt(
    &mut self,
    line: String,
  ) {
    self.lines.push(format!("  {}", line));
  }

  fn comment(
    &mut self,
    text: &str,
  ) {
    self.lines.push(format!("  /* {} */", text));
  }

  // #endregion Helpers
}

/// Casts pointers whose spelling differs; other values pass through.
fn coerce(
  value: &StackValue,
  ty: &str,
) -> String {
  if value.ty == ty || !ty.ends_with('*') {
    value.expr.clone()
  } else {
    format!("({})({})", ty, value.expr)
  }
}

fn is_simple(expr: &str) -> bool {
  expr.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn arithmetic_operator(opcode: OpCode) -> &'static str {
  match opcode {
    OpCode::Add => "+",
    OpCode::Sub => "-",
    OpCode::Mul => "*",
    OpCode::Div => "/",
    OpCode::Rem => "%",
    OpCode::And => "&",
    OpCode::Or => "|",
    OpCode::Xor => "^",
    OpCode::Shl => "<<",
    _ => ">>",
  }
}

fn comparison_operator(opcode: OpCode) -> &'static str {
  match opcode {
    OpCode::Beq => "==",
    OpCode::Bne => "!=",
    OpCode::Blt => "<",
    OpCode::Ble => "<=",
    OpCode::Bgt => ">",
    _ => ">=",
  }
}

pub(crate) fn int32_literal(value: i32) -> String {
  if value == i32::MIN {
    "(-2147483647 - 1)".to_string()
  } else {
    value.to_string()
  }
}

pub(crate) fn int64_literal(value: i64) -> String {
  if value == i64::MIN {
    "(-9223372036854775807LL - 1)".to_string()
  } else {
    format!("{}LL", value)
  }
}

pub(crate) fn float_literal(value: f64) -> String {
  if value.is_nan() {
    "(0.0 / 0.0)".to_string()
  } else if value == f64::INFINITY {
    "(1.0 / 0.0)".to_string()
  } else if value == f64::NEG_INFINITY {
    "(-1.0 / 0.0)".to_string()
  } else {
    let text = format!("{:?}", value);
    if text.contains(['.', 'e', 'E']) {
      text
    } else {
      format!("{}.0", text)
    }
  }
}

/// UTF-8 C string literal; non-printable bytes become three-digit octal escapes.
pub(crate) fn string_literal(value: &str) -> String {
  let mut out = String::from("\"");
  for byte in value.bytes() {
    match byte {
      b'"' => out.push_str("\\\""),
      b'\\' => out.push_str("\\\\"),
      b'?' => out.push_str("\\?"),
      0x20..=0x7e => out.push(byte as char),
      _ => write!(out, "\\{:03o}", byte).unwrap(),
    }
  }
  out.push('"');
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn extreme_integers_stay_valid_c() {
    assert_eq!(int32_literal(i32::MIN), "(-2147483647 - 1)");
    assert_eq!(int32_literal(-5), "-5");
    assert_eq!(int64_literal(7), "7LL");
    assert_eq!(int64_literal(i64::MIN), "(-9223372036854775807LL - 1)");
  }

  #[test]
  fn floats_always_carry_a_fraction_or_exponent() {
    assert_eq!(float_literal(2.0), "2.0");
    assert_eq!(float_literal(0.5), "0.5");
    assert_eq!(float_literal(1e-7), "1e-7");
    assert_eq!(float_literal(f64::NAN), "(0.0 / 0.0)");
    assert_eq!(float_literal(f64::NEG_INFINITY), "(-1.0 / 0.0)");
  }

  #[test]
  fn string_literals_escape_quotes_and_non_ascii() {
    assert_eq!(string_literal("say \"hi\"\n"), "\"say \\\"hi\\\"\\012\"");
    assert_eq!(string_literal("é"), "\"\\303\\251\"");
    assert_eq!(string_literal("??="), "\"\\?\\?=\"");
  }

  #[test]
  fn coerce_casts_only_mismatched_pointers() {
    let derived = StackValue::new("t0", "struct cls_Derived*");
    assert_eq!(coerce(&derived, "struct cls_Derived*"), "t0");
    assert_eq!(coerce(&derived, "struct cls_Base*"), "(struct cls_Base*)(t0)");
    assert_eq!(coerce(&StackValue::new("1", "int32_t"), "int64_t"), "1");
  }
}
