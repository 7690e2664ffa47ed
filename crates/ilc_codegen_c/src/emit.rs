use std::fmt::Write;

use indexmap::{IndexMap, IndexSet};
use ilc_config::DebugTrace;
use ilc_log::trace_dbg;
use ilc_metadata::TypeSig;
use ilc_mono::{MethodInstance, MethodInstanceId, ProcessState, Resolver, TypeInstanceId};

use crate::naming::{declared_fields, sig_instances, NameTable, TypeShape};
use crate::translate::{BodyTranslator, TranslateContext};

/// Generated text of one type instance before packing.
#[derive(Debug, Clone)]
pub struct TypeUnit {
  pub ty: TypeInstanceId,
  pub name: String,
  pub decl_code: String,
  pub impl_code: String,
  /// Types whose declarations must precede this one.
  pub decl_deps: IndexSet<TypeInstanceId>,
  /// Types whose declarations the definitions need.
  pub impl_deps: IndexSet<TypeInstanceId>,
}

impl TypeUnit {
  fn new(
    ty: TypeInstanceId,
    name: String,
  ) -> Self {
    Self {
      ty,
      name,
      decl_code: String::new(),
      impl_code: String::new(),
      decl_deps: IndexSet::new(),
      impl_deps: IndexSet::new(),
    }
  }
}

/// Process-wide function resetting static fields and static constructor flags.
#[derive(Debug, Clone, Default)]
pub struct StaticInit {
  pub decl_code: String,
  pub impl_code: String,
  pub deps: IndexSet<TypeInstanceId>,
}

pub const STATIC_INIT_NAME: &str = "il2c_static_init";

/// C code emitter for a resolved program.
pub struct CEmitter<'a> {
  resolver: &'a Resolver,
  names: &'a NameTable,
  translator: &'a dyn BodyTranslator,
  static_lines: Vec<String>,
  static_deps: IndexSet<TypeInstanceId>,
}

impl<'a> CEmitter<'a> {
  pub fn new(
    resolver: &'a Resolver,
    names: &'a NameTable,
    translator: &'a dyn BodyTranslator,
  ) -> Self {
    Self {
      resolver,
      names,
      translator,
      static_lines: Vec::new(),
      static_deps: IndexSet::new(),
    }
  }

  /// One [`TypeUnit`] per type instance, root type first, plus the static initializer.
  pub fn emit(mut self) -> (Vec<TypeUnit>, StaticInit) {
    let names = self.names;
    let mut units = Vec::with_capacity(names.order().len());
    for id in names.order() {
      let unit = self.emit_type(*id);
      trace_dbg!(
        self.resolver.config(),
        DebugTrace::Codegen,
        "emitted {} ({} decl bytes, {} impl bytes)",
        unit.name,
        unit.decl_code.len(),
        unit.impl_code.len()
      );
      units.push(unit);
    }

    let init = self.emit_static_init();
    (units, init)
  }

  fn emit_type(
    &mut self,
    id: TypeInstanceId,
  ) -> TypeUnit {
    let mut unit = TypeUnit::new(id, self.resolver.type_name(id));
    let mut forward = IndexSet::new();
    let mut decl = String::new();

    if let Some(type_id) = self.names.type_id(id) {
      writeln!(decl, "#define {} {}", self.names.type_id_macro(id), type_id).unwrap();
    }

    match self.names.shape(id) {
      TypeShape::Class => self.emit_class_struct(id, &mut decl, &mut unit, &mut forward),
      TypeShape::Struct => self.emit_value_struct(id, &mut decl, &mut unit, &mut forward),
      TypeShape::Interface => {},
    }

    self.emit_statics(id, &mut decl, &mut unit, &mut forward);
    self.emit_methods(id, &mut decl, &mut unit, &mut forward);

    let mut header = String::new();
    writeln!(header, "/* {} */", unit.name).unwrap();
    for tag in &forward {
      writeln!(header, "{};", tag).unwrap();
    }
    header.push_str(&decl);
    unit.decl_code = header;
    unit.decl_deps.shift_remove(&id);
    unit.impl_deps.shift_remove(&id);
    unit
  }

  // #region Layout

  fn emit_class_struct(
    &self,
    id: TypeInstanceId,
    decl: &mut String,
    unit: &mut TypeUnit,
    forward: &mut IndexSet<String>,
  ) {
    let ty = self.resolver.store().type_instance(id);
    writeln!(decl, "{}", self.names.struct_tag(id)).unwrap();
    writeln!(decl, "{{").unwrap();

    match ty.base.filter(|base| self.names.shape(*base) == TypeShape::Class) {
      Some(base) => {
        writeln!(decl, "  {} base;", self.names.struct_tag(base)).unwrap();
        unit.decl_deps.insert(base);
      },
      None => writeln!(decl, "  uint32_t type_id;").unwrap(),
    }
    self.emit_instance_fields(id, decl, unit, forward);

    writeln!(decl, "}};").unwrap();
  }

  fn emit_value_struct(
    &self,
    id: TypeInstanceId,
    decl: &mut String,
    unit: &mut TypeUnit,
    forward: &mut IndexSet<String>,
  ) {
    writeln!(decl, "{}", self.names.struct_tag(id)).unwrap();
    writeln!(decl, "{{").unwrap();
    if !self.emit_instance_fields(id, decl, unit, forward) {
      writeln!(decl, "  uint8_t unused;").unwrap();
    }
    writeln!(decl, "}};").unwrap();
  }

  /// Returns whether any field was written.
  fn emit_instance_fields(
    &self,
    id: TypeInstanceId,
    decl: &mut String,
    unit: &mut TypeUnit,
    forward: &mut IndexSet<String>,
  ) -> bool {
    let mut any = false;
    for field in declared_fields(self.resolver, id) {
      let instance = self.resolver.store().field_instance(field);
      if instance.is_static {
        continue;
      }
      let ty = self.declared_type(&instance.field_type, unit, forward);
      writeln!(decl, "  {} {};", ty, self.names.field_name(field)).unwrap();
      any = true;
    }
    any
  }

  fn emit_statics(
    &mut self,
    id: TypeInstanceId,
    decl: &mut String,
    unit: &mut TypeUnit,
    forward: &mut IndexSet<String>,
  ) {
    let ty = self.resolver.store().type_instance(id);
    for field in declared_fields(self.resolver, id) {
      let instance = self.resolver.store().field_instance(field);
      if !instance.is_static {
        continue;
      }
      let c_type = self.declared_type(&instance.field_type, unit, forward);
      let global = self.names.field_name(field);
      writeln!(decl, "extern {} {};", c_type, global).unwrap();
      writeln!(unit.impl_code, "{} {};", c_type, global).unwrap();
      self.static_lines.push(format!("memset(&{0}, 0, sizeof({0}));", global));
      self.static_deps.insert(id);
    }

    if ty.cctor.is_some() {
      let flag = self.names.cctor_flag(id);
      writeln!(decl, "extern uint8_t {};", flag).unwrap();
      writeln!(unit.impl_code, "uint8_t {};", flag).unwrap();
      self.static_lines.push(format!("{} = 0;", flag));
      self.static_deps.insert(id);
    }
  }

  /// C spelling of `sig` in a declaration, recording what the declaration needs.
  ///
  /// Value types used by value need their full declaration; everything reached
  /// through a pointer only needs a forward declaration of its tag.
  fn declared_type(
    &self,
    sig: &TypeSig,
    unit: &mut TypeUnit,
    forward: &mut IndexSet<String>,
  ) -> String {
    let by_value = !sig.is_pointer_like();
    for ty in sig_instances(self.resolver, sig) {
      match self.names.shape(ty) {
        TypeShape::Struct if by_value => {
          unit.decl_deps.insert(ty);
        },
        TypeShape::Interface => {
          if let Some(root) = self.names.root() {
            forward.insert(self.names.struct_tag(root));
          }
        },
        _ => {
          forward.insert(self.names.struct_tag(ty));
        },
      }
    }
    self.names.c_type(self.resolver, sig)
  }

  // #endregion Layout

  // #region Methods

  fn emit_methods(
    &self,
    id: TypeInstanceId,
    decl: &mut String,
    unit: &mut TypeUnit,
    forward: &mut IndexSet<String>,
  ) {
    let ctx = TranslateContext {
      resolver: self.resolver,
      names: self.names,
    };

    for method_id in self.resolver.methods_of(id) {
      let method = self.resolver.store().method_instance(*method_id);

      if method.has_body() {
        let prototype = self.prototype(self.names.method_name(*method_id), method, unit, forward);
        writeln!(decl, "{};", prototype).unwrap();

        let body = self.translator.translate(&ctx, *method_id);
        unit.impl_deps.extend(body.deps);
        writeln!(unit.impl_code).unwrap();
        writeln!(unit.impl_code, "{}", prototype).unwrap();
        writeln!(unit.impl_code, "{{").unwrap();
        unit.impl_code.push_str(&body.code);
        writeln!(unit.impl_code, "}}").unwrap();
      } else if method.state == ProcessState::Processed && !method.virtual_only {
        // Bodiless and called directly: supplied by the runtime.
        let prototype = self.prototype(self.names.method_name(*method_id), method, unit, forward);
        writeln!(decl, "{};", prototype).unwrap();
      }

      if let Some(dispatcher) = self.names.dispatcher_name(*method_id) {
        let prototype = self.prototype(dispatcher, method, unit, forward);
        writeln!(decl, "{};", prototype).unwrap();
        self.emit_dispatcher(&prototype, method, unit);
      }
    }
  }

  fn prototype(
    &self,
    name: &str,
    method: &MethodInstance,
    unit: &mut TypeUnit,
    forward: &mut IndexSet<String>,
  ) -> String {
    let ret = self.declared_type(&method.ret, unit, forward);
    let params: Vec<String> = method
      .params
      .iter()
      .enumerate()
      .map(|(index, param)| format!("{} arg{}", self.declared_type(param, unit, forward), index))
      .collect();
    let params = if params.is_empty() {
      "void".to_string()
    } else {
      params.join(", ")
    };
    format!("{} {}({})", ret, name, params)
  }

  /// Switch on the receiver's `type_id` over every constructed receiver type.
  fn emit_dispatcher(
    &self,
    prototype: &str,
    entry: &MethodInstance,
    unit: &mut TypeUnit,
  ) {
    let mut groups: IndexMap<MethodInstanceId, Vec<TypeInstanceId>> = IndexMap::new();
    for (receiver, implementation) in &entry.dispatch_targets {
      if self.names.type_id(*receiver).is_some() {
        groups.entry(*implementation).or_default().push(*receiver);
      }
    }

    let code = &mut unit.impl_code;
    writeln!(code).unwrap();
    writeln!(code, "{}", prototype).unwrap();
    writeln!(code, "{{").unwrap();
    if entry.params.is_empty() {
      // Static members never dispatch on a receiver.
      writeln!(code, "  il2c_unreachable();").unwrap();
      writeln!(code, "}}").unwrap();
      return;
    }
    writeln!(code, "  switch (IL2C_TYPE_ID(arg0))").unwrap();
    writeln!(code, "  {{").unwrap();

    let mut deps = Vec::new();
    for (implementation, receivers) in &groups {
      for receiver in receivers {
        writeln!(code, "    case {}:", self.names.type_id_macro(*receiver)).unwrap();
        deps.push(*receiver);
      }

      let target = self.resolver.store().method_instance(*implementation);
      deps.push(target.owner);
      let args: Vec<String> = target
        .params
        .iter()
        .enumerate()
        .map(|(index, param)| {
          let wanted = self.names.c_type(self.resolver, param);
          let given = entry
            .params
            .get(index)
            .map(|p| self.names.c_type(self.resolver, p))
            .unwrap_or_default();
          if wanted == given || !wanted.ends_with('*') {
            format!("arg{}", index)
          } else {
            format!("({})arg{}", wanted, index)
          }
        })
        .collect();
      let call = format!("{}({})", self.names.method_name(*implementation), args.join(", "));
      if entry.ret == TypeSig::Void {
        writeln!(code, "      {};", call).unwrap();
        writeln!(code, "      return;").unwrap();
      } else {
        writeln!(code, "      return {};", call).unwrap();
      }
    }

    writeln!(code, "    default:").unwrap();
    writeln!(code, "      il2c_unreachable();").unwrap();
    writeln!(code, "  }}").unwrap();
    writeln!(code, "}}").unwrap();
    unit.impl_deps.extend(deps);
  }

  // #endregion Methods

  fn emit_static_init(&mut self) -> StaticInit {
    let mut init = StaticInit::default();
    writeln!(init.decl_code, "void {}(void);", STATIC_INIT_NAME).unwrap();

    writeln!(init.impl_code).unwrap();
    writeln!(init.impl_code, "void {}(void)", STATIC_INIT_NAME).unwrap();
    writeln!(init.impl_code, "{{").unwrap();
    for line in &self.static_lines {
      writeln!(init.impl_code, "  {}", line).unwrap();
    }
    writeln!(init.impl_code, "}}").unwrap();

    init.deps = std::mem::take(&mut self.static_deps);
    init
  }
}
