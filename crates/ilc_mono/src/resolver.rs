//! Worklist-driven resolution of everything reachable from the entry points.

use std::collections::{HashSet, VecDeque};
use std::rc::Rc;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use ilc_config::{DebugTrace, IlcConfig};
use ilc_diagnostics::message::DiagnosticMessage;
use ilc_log::{log_dbg, phase_log, trace_dbg};
use ilc_metadata::{FieldDefId, Metadata, MethodDefId, TypeDefId, TypeSig};

use crate::instance::{
  FieldInstance, FieldInstanceId, MethodIdentity, MethodInstance, MethodInstanceId, ProcessState, TypeIdentity,
  TypeInstance, TypeInstanceId, TypeKey,
};
use crate::intern::InstanceStore;
use crate::subst::{substitute, substitute_all, GenericContext};
use crate::variance::{variance_compatible, VarianceGroups};
use crate::vtable::{SlotEntry, VTableBuilder, VirtualTable};

/// Drives discovery, virtual table construction and dispatch resolution to a fixpoint.
pub struct Resolver {
  pub(crate) metadata: Rc<Metadata>,
  pub(crate) config: Arc<IlcConfig>,
  pub(crate) store: InstanceStore,
  vtables: VTableBuilder,
  queue: VecDeque<MethodInstanceId>,
  pub(crate) dispatch_entries: IndexSet<MethodInstanceId>,
  pub(crate) resolved_dispatch: HashSet<(MethodInstanceId, TypeInstanceId)>,
  variance: VarianceGroups,
  acyclic: HashSet<TypeDefId>,
  entry_points: Vec<MethodInstanceId>,
  pub(crate) warnings: Vec<DiagnosticMessage>,
  rounds: usize,
}

impl Resolver {
  pub fn new(
    metadata: Rc<Metadata>,
    config: Arc<IlcConfig>,
  ) -> Self {
    Self {
      vtables: VTableBuilder::new(config.clone()),
      metadata,
      config,
      store: InstanceStore::new(),
      queue: VecDeque::new(),
      dispatch_entries: IndexSet::new(),
      resolved_dispatch: HashSet::new(),
      variance: VarianceGroups::new(),
      acyclic: HashSet::new(),
      entry_points: Vec::new(),
      warnings: Vec::new(),
      rounds: 0,
    }
  }

  pub fn metadata(&self) -> &Metadata {
    &self.metadata
  }

  pub fn config(&self) -> &IlcConfig {
    &self.config
  }

  pub fn store(&self) -> &InstanceStore {
    &self.store
  }

  pub fn entry_points(&self) -> &[MethodInstanceId] {
    &self.entry_points
  }

  /// Non-fatal problems found so far, in discovery order.
  pub fn diagnostics(&self) -> &[DiagnosticMessage] {
    &self.warnings
  }

  /// Number of drain/variance/dispatch rounds the last [`Resolver::process`] took.
  pub fn rounds(&self) -> usize {
    self.rounds
  }

  /// Methods reached only through virtual calls so far.
  pub fn dispatch_entries(&self) -> impl Iterator<Item = MethodInstanceId> + '_ {
    self.dispatch_entries.iter().copied()
  }

  pub fn add_entry_point(
    &mut self,
    method: MethodDefId,
  ) -> Result<MethodInstanceId, DiagnosticMessage> {
    let metadata = self.metadata.clone();
    self.check_entry_handle(method)?;
    let def = metadata.method(method);
    if metadata.type_def(def.owner).is_generic() || !def.generic_params.is_empty() {
      return Err(DiagnosticMessage::InvalidEntryPoint {
        name: metadata.method_name(method),
        reason: "generic entry points need explicit type arguments".to_string(),
      });
    }
    self.add_generic_entry_point(method, Vec::new(), Vec::new())
  }

  /// Seeds the worklist with an explicit instantiation of `method`.
  pub fn add_generic_entry_point(
    &mut self,
    method: MethodDefId,
    type_args: Vec<TypeSig>,
    method_args: Vec<TypeSig>,
  ) -> Result<MethodInstanceId, DiagnosticMessage> {
    self.check_entry_handle(method)?;
    let owner_def = self.metadata.method(method).owner;
    let owner = self.intern_type(TypeKey::new(owner_def, type_args))?;
    let id = self.intern_method(owner, method, method_args)?;
    self.mark_direct(id);
    if !self.entry_points.contains(&id) {
      self.entry_points.push(id);
      log_dbg!(&self.config, "entry point {}", self.method_name(id));
    }
    Ok(id)
  }

  /// Handles come from the caller and may not belong to the loaded model.
  fn check_entry_handle(
    &self,
    method: MethodDefId,
  ) -> Result<(), DiagnosticMessage> {
    if self.metadata.methods.contains(&method) {
      return Ok(());
    }
    Err(DiagnosticMessage::InvalidEntryPoint {
      name: format!("#{}", method.index()),
      reason: "no such method in the loaded model".to_string(),
    })
  }

  /// Adds every overload named by `Namespace.Type::method`.
  pub fn add_entry_by_name(
    &mut self,
    name: &str,
  ) -> Result<Vec<MethodInstanceId>, DiagnosticMessage> {
    let invalid = |reason: &str| DiagnosticMessage::InvalidEntryPoint {
      name: name.to_string(),
      reason: reason.to_string(),
    };

    let (type_name, method_name) = name
      .rsplit_once("::")
      .ok_or_else(|| invalid("expected `Namespace.Type::method`"))?;
    let metadata = self.metadata.clone();
    let owner = metadata.find_type(type_name).ok_or_else(|| invalid("no such type"))?;
    let methods = metadata.find_methods(owner, method_name);
    if methods.is_empty() {
      return Err(invalid("no such method"));
    }

    methods.into_iter().map(|m| self.add_entry_point(m)).collect()
  }

  /// Runs rounds of drain, variance linking and dispatch until none of them finds new work.
  pub fn process(&mut self) -> Result<(), DiagnosticMessage> {
    phase_log!(&self.config, "Resolving from {} entry points", self.entry_points.len());

    self.rounds = 0;
    loop {
      self.rounds += 1;
      let processed = self.drain_queue()?;
      let linked = self.link_variance();
      let dispatched = self.resolve_dispatches()?;
      trace_dbg!(
        &self.config,
        DebugTrace::Resolve,
        "round {}: {} bodies, {} variance links, {} dispatch targets",
        self.rounds,
        processed,
        linked,
        dispatched
      );

      if self.queue.is_empty() && linked == 0 && dispatched == 0 {
        break;
      }
    }

    log_dbg!(
      &self.config,
      "resolved {} types, {} methods, {} fields in {} rounds",
      self.store.type_count(),
      self.store.method_count(),
      self.store.field_count(),
      self.rounds
    );
    Ok(())
  }

  fn drain_queue(&mut self) -> Result<usize, DiagnosticMessage> {
    let mut processed = 0;
    while let Some(id) = self.queue.pop_front() {
      let method = self.store.method_mut(id);
      if method.state == ProcessState::Processed {
        continue;
      }
      if method.virtual_only {
        method.state = ProcessState::Unqueued;
        continue;
      }

      method.state = ProcessState::Processed;
      self.process_method(id)?;
      processed += 1;
    }
    Ok(processed)
  }

  /// Queues `id` for body processing and clears any virtual-only mark.
  pub(crate) fn mark_direct(
    &mut self,
    id: MethodInstanceId,
  ) {
    let method = self.store.method_mut(id);
    method.direct_use = true;
    method.virtual_only = false;
    if method.state == ProcessState::Unqueued {
      method.state = ProcessState::Queued;
      self.queue.push_back(id);
    }
  }

  pub(crate) fn add_dispatch_entry(
    &mut self,
    id: MethodInstanceId,
  ) {
    let method = self.store.method_mut(id);
    if !method.direct_use && method.state != ProcessState::Processed {
      method.virtual_only = true;
    }
    if self.dispatch_entries.insert(id) {
      trace_dbg!(&self.config, DebugTrace::Dispatch, "virtual call to {}", self.method_name(id));
    }
  }

  // #region Interning

  /// Canonical instance for `key`, expanding base and interfaces on first sight.
  pub fn intern_type(
    &mut self,
    key: TypeKey,
  ) -> Result<TypeInstanceId, DiagnosticMessage> {
    let metadata = self.metadata.clone();
    let type_def = metadata.type_def(key.def);
    let identity = TypeIdentity {
      key,
      version: type_def.version,
    };
    if let Some(id) = self.store.lookup_type(&identity) {
      return Ok(id);
    }

    let key = identity.key.clone();
    let name = key.display(&metadata);
    if type_def.generic_params.len() != key.args.len() {
      return Err(DiagnosticMessage::GenericArityMismatch {
        definition: type_def.full_name(),
        expected: type_def.generic_params.len(),
        got: key.args.len(),
      });
    }
    if let Some(placeholder) = first_placeholder(&key.args) {
      return Err(DiagnosticMessage::UnboundPlaceholder {
        placeholder: metadata.sig_name(&placeholder),
        referrer: name,
      });
    }
    self.check_acyclic(key.def)?;

    let id = self.store.insert_type(identity, TypeInstance::new(key.clone(), type_def.version));
    trace_dbg!(&self.config, DebugTrace::Resolve, "interned type {}", name);

    let ctx = key.context();
    if let Some(base) = &type_def.base {
      let base = substitute(base, &ctx);
      let base_id = self.intern_required(&base, &name)?;
      self.store.type_mut(id).base = Some(base_id);
    }
    for interface in &type_def.interfaces {
      let interface = substitute(interface, &ctx);
      let interface_id = self.intern_required(&interface, &name)?;
      self.store.type_mut(id).interfaces.push(interface_id);
    }

    if type_def.has_variance() {
      self.variance.register(key.def, id);
    }
    self.register_subtype(id);
    Ok(id)
  }

  /// Instance for a concrete signature; `None` for signatures without one (primitives,
  /// pointers, multi-dimensional arrays).
  pub fn intern_type_sig(
    &mut self,
    sig: &TypeSig,
    referrer: &str,
  ) -> Result<Option<TypeInstanceId>, DiagnosticMessage> {
    if let Some(placeholder) = first_placeholder(std::slice::from_ref(sig)) {
      return Err(DiagnosticMessage::UnboundPlaceholder {
        placeholder: self.metadata.sig_name(&placeholder),
        referrer: referrer.to_string(),
      });
    }
    match TypeKey::from_sig(&self.metadata, sig) {
      Some(key) => self.intern_type(key).map(Some),
      None => Ok(None),
    }
  }

  pub(crate) fn intern_required(
    &mut self,
    sig: &TypeSig,
    referrer: &str,
  ) -> Result<TypeInstanceId, DiagnosticMessage> {
    self
      .intern_type_sig(sig, referrer)?
      .ok_or_else(|| DiagnosticMessage::UnresolvedType {
        reference: self.metadata.sig_name(sig),
        referrer: referrer.to_string(),
      })
  }

  /// Value types are laid out inline, so their declarations must exist wherever they appear.
  pub(crate) fn intern_layout(
    &mut self,
    sig: &TypeSig,
    referrer: &str,
  ) -> Result<(), DiagnosticMessage> {
    let sig = sig.strip_modifiers();
    if sig.is_value_type() && sig.type_def().is_some() {
      self.intern_type_sig(sig, referrer)?;
    }
    Ok(())
  }

  /// Canonical instance of `def` owned by `owner` with method arguments `args`.
  ///
  /// A new instance gets its signature substituted and is queued for processing.
  pub fn intern_method(
    &mut self,
    owner: TypeInstanceId,
    def: MethodDefId,
    args: Vec<TypeSig>,
  ) -> Result<MethodInstanceId, DiagnosticMessage> {
    let identity = MethodIdentity { owner, def, args };
    if let Some(id) = self.store.lookup_method(&identity) {
      return Ok(id);
    }

    let metadata = self.metadata.clone();
    let method = metadata.method(def);
    let referrer = metadata.method_name(def);
    if method.generic_params.len() != identity.args.len() {
      return Err(DiagnosticMessage::GenericArityMismatch {
        definition: referrer,
        expected: method.generic_params.len(),
        got: identity.args.len(),
      });
    }
    if let Some(placeholder) = first_placeholder(&identity.args) {
      return Err(DiagnosticMessage::UnboundPlaceholder {
        placeholder: metadata.sig_name(&placeholder),
        referrer,
      });
    }

    let owner_key = self.store.type_instance(owner).key.clone();
    let args = identity.args.clone();
    let ctx = GenericContext::for_method(owner_key.def, &owner_key.args, def, &args);
    let ret = substitute(&method.sig.ret, &ctx).into_owned();
    let mut params = Vec::with_capacity(method.sig.params.len() + 1);
    if !method.is_static() {
      let this = owner_key.to_sig(&metadata);
      params.push(if this.is_value_type() { TypeSig::by_ref(this) } else { this });
    }
    params.extend(substitute_all(&method.sig.params, &ctx));

    for sig in std::iter::once(&ret).chain(params.iter()) {
      self.intern_layout(sig, &referrer)?;
    }

    let id = self.store.insert_method(
      identity,
      MethodInstance {
        owner,
        def,
        args,
        ret,
        params,
        locals: Vec::new(),
        override_impls: IndexSet::new(),
        dispatch_targets: IndexMap::new(),
        state: ProcessState::Queued,
        virtual_only: false,
        direct_use: false,
        instructions: Vec::new(),
        handlers: Vec::new(),
      },
    );
    self.store.type_mut(owner).methods.push(id);
    self.queue.push_back(id);
    trace_dbg!(&self.config, DebugTrace::Resolve, "interned method {}", self.method_name(id));
    Ok(id)
  }

  pub fn intern_field(
    &mut self,
    owner: TypeInstanceId,
    def: FieldDefId,
  ) -> Result<FieldInstanceId, DiagnosticMessage> {
    if let Some(id) = self.store.lookup_field(owner, def) {
      return Ok(id);
    }

    let metadata = self.metadata.clone();
    let field = metadata.field(def);
    let owner_key = self.store.type_instance(owner).key.clone();
    let field_type = substitute(&field.field_type, &owner_key.context()).into_owned();
    self.intern_layout(&field_type, &metadata.field_name(def))?;

    let id = self.store.insert_field(FieldInstance {
      owner,
      def,
      field_type,
      is_static: field.is_static,
    });
    self.store.type_mut(owner).fields.insert(def, id);
    Ok(id)
  }

  fn check_acyclic(
    &mut self,
    def: TypeDefId,
  ) -> Result<(), DiagnosticMessage> {
    let mut visiting = Vec::new();
    if has_cycle(&self.metadata, def, &mut visiting, &mut self.acyclic) {
      return Err(DiagnosticMessage::CyclicInheritance {
        type_name: self.metadata.full_name(def),
      });
    }
    Ok(())
  }

  /// Adds `id` to the subtype set of every transitive supertype.
  fn register_subtype(
    &mut self,
    id: TypeInstanceId,
  ) {
    for ancestor in self.ancestors(id) {
      self.store.type_mut(ancestor).derived.insert(id);
    }
  }

  /// Transitive supertypes of `id`, including variance links, excluding `id` itself.
  pub fn ancestors(
    &self,
    id: TypeInstanceId,
  ) -> IndexSet<TypeInstanceId> {
    let mut out = IndexSet::new();
    let mut stack: Vec<TypeInstanceId> = self.store.type_instance(id).supertypes().collect();
    while let Some(ty) = stack.pop() {
      if ty != id && out.insert(ty) {
        stack.extend(self.store.type_instance(ty).supertypes());
      }
    }
    out
  }

  pub fn is_derived_from(
    &self,
    derived: TypeInstanceId,
    base: TypeInstanceId,
  ) -> bool {
    self.store.type_instance(base).derived.contains(&derived)
  }

  // #endregion Interning

  // #region Variance

  fn link_variance(&mut self) -> usize {
    let metadata = self.metadata.clone();
    let mut linked = 0;
    for (def, first, second) in self.variance.take_new_pairs() {
      let first_args = self.store.type_instance(first).key.args.clone();
      let second_args = self.store.type_instance(second).key.args.clone();

      let link = if variance_compatible(&metadata, def, &first_args, &second_args) {
        Some((second, first))
      } else if variance_compatible(&metadata, def, &second_args, &first_args) {
        Some((first, second))
      } else {
        None
      };

      if let Some((derived, base)) = link {
        self.add_variance_link(derived, base);
        linked += 1;
        trace_dbg!(
          &self.config,
          DebugTrace::Variance,
          "{} is assignable to {}",
          self.type_name(derived),
          self.type_name(base)
        );
      }
    }
    linked
  }

  fn add_variance_link(
    &mut self,
    derived: TypeInstanceId,
    base: TypeInstanceId,
  ) {
    self.store.type_mut(derived).variance_bases.insert(base);

    let mut subtypes = vec![derived];
    subtypes.extend(self.store.type_instance(derived).derived.iter().copied());
    let mut supertypes = IndexSet::from([base]);
    supertypes.extend(self.ancestors(base));

    for ancestor in supertypes {
      for subtype in &subtypes {
        if ancestor != *subtype {
          self.store.type_mut(ancestor).derived.insert(*subtype);
        }
      }
    }
  }

  // #endregion Variance

  // #region Lifecycle

  pub fn vtable_of(
    &mut self,
    ty: TypeInstanceId,
  ) -> Result<Rc<VirtualTable>, DiagnosticMessage> {
    if let Some(table) = &self.store.type_instance(ty).vtable {
      return Ok(table.clone());
    }

    let key = self.store.type_instance(ty).key.clone();
    let table = self.vtables.resolve(&self.metadata, &key)?;
    self.store.type_mut(ty).vtable = Some(table.clone());
    Ok(table)
  }

  /// Marks `ty` as constructed, which makes it a dispatch candidate and pulls in its
  /// static constructor and finalizer.
  pub(crate) fn mark_instantiated(
    &mut self,
    ty: TypeInstanceId,
  ) -> Result<(), DiagnosticMessage> {
    let instance = self.store.type_mut(ty);
    if instance.is_instantiated {
      return Ok(());
    }
    instance.is_instantiated = true;
    let def = instance.def();
    trace_dbg!(&self.config, DebugTrace::Resolve, "instantiated {}", self.type_name(ty));

    if !self.metadata.type_def(def).is_interface() {
      self.vtable_of(ty)?;
    }
    self.ensure_cctor(ty)?;
    self.ensure_finalizer(ty)
  }

  pub(crate) fn ensure_cctor(
    &mut self,
    ty: TypeInstanceId,
  ) -> Result<(), DiagnosticMessage> {
    let instance = self.store.type_mut(ty);
    if instance.cctor_generated {
      return Ok(());
    }
    instance.cctor_generated = true;
    let def = instance.def();

    let metadata = self.metadata.clone();
    let cctor = metadata
      .type_def(def)
      .methods
      .iter()
      .copied()
      .find(|m| metadata.method(*m).is_cctor());
    if let Some(cctor) = cctor {
      let id = self.intern_method(ty, cctor, Vec::new())?;
      self.mark_direct(id);
      self.store.type_mut(ty).cctor = Some(id);
    }
    Ok(())
  }

  /// Resolves the override of the root type's `Finalize` slot, ignoring the root's own.
  fn ensure_finalizer(
    &mut self,
    ty: TypeInstanceId,
  ) -> Result<(), DiagnosticMessage> {
    let instance = self.store.type_mut(ty);
    if instance.finalizer_generated {
      return Ok(());
    }
    instance.finalizer_generated = true;
    let def = instance.def();

    let metadata = self.metadata.clone();
    let type_def = metadata.type_def(def);
    if type_def.is_value_type() || type_def.is_interface() {
      return Ok(());
    }
    let Some(root) = metadata.root_type() else {
      return Ok(());
    };
    let finalize = metadata.find_methods(root, "Finalize").into_iter().find(|m| {
      let method = metadata.method(*m);
      method.is_virtual() && !method.is_static() && method.sig.params.is_empty()
    });
    let Some(finalize) = finalize else {
      return Ok(());
    };

    let table = self.vtable_of(ty)?;
    let entry = SlotEntry::new(TypeKey::new(root, Vec::new()), finalize);
    let Some(implementation) = table.implementation_of(&entry).cloned() else {
      return Ok(());
    };
    if implementation.ty.def == root {
      return Ok(());
    }

    let owner = self.intern_type(implementation.ty)?;
    let id = self.intern_method(owner, implementation.method, Vec::new())?;
    self.mark_direct(id);
    self.store.type_mut(ty).finalizer = Some(id);
    Ok(())
  }

  // #endregion Lifecycle

  pub fn root_type(&self) -> Option<TypeInstanceId> {
    let root = self.metadata.root_type()?;
    self.store.types().find(|(_, t)| t.def() == root).map(|(id, _)| id)
  }

  pub fn type_name(
    &self,
    id: TypeInstanceId,
  ) -> String {
    self.store.type_instance(id).key.display(&self.metadata)
  }

  /// `Namespace.Type<args>::Name<margs>`
  pub fn method_name(
    &self,
    id: MethodInstanceId,
  ) -> String {
    let method = self.store.method_instance(id);
    let name = format!("{}::{}", self.type_name(method.owner), self.metadata.method(method.def).name);
    if method.args.is_empty() {
      name
    } else {
      let args: Vec<String> = method.args.iter().map(|a| self.metadata.sig_name(a)).collect();
      format!("{}<{}>", name, args.join(","))
    }
  }

  pub fn field_name(
    &self,
    id: FieldInstanceId,
  ) -> String {
    let field = self.store.field_instance(id);
    format!("{}::{}", self.type_name(field.owner), self.metadata.field(field.def).name)
  }

  pub fn methods_of(
    &self,
    ty: TypeInstanceId,
  ) -> &[MethodInstanceId] {
    &self.store.type_instance(ty).methods
  }

  pub fn fields_of(
    &self,
    ty: TypeInstanceId,
  ) -> Vec<FieldInstanceId> {
    self.store.type_instance(ty).fields.values().copied().collect()
  }

  pub(crate) fn variance_match(
    &self,
    table: &VirtualTable,
    declaring: &TypeKey,
    method: MethodDefId,
  ) -> Option<Option<SlotEntry>> {
    if !self.metadata.is_variant(declaring.def) {
      return None;
    }
    table
      .dispatch
      .iter()
      .find(|(entry, _)| {
        entry.method == method
          && entry.ty.def == declaring.def
          && variance_compatible(&self.metadata, declaring.def, &declaring.args, &entry.ty.args)
      })
      .map(|(_, bound)| bound.clone())
  }
}

fn first_placeholder(sigs: &[TypeSig]) -> Option<TypeSig> {
  let mut found = None;
  for sig in sigs {
    sig.walk(&mut |s| {
      if found.is_none() && s.is_placeholder() {
        found = Some(s.clone());
      }
    });
  }
  found
}

/// Depth-first search over base and interface definitions.
fn has_cycle(
  metadata: &Metadata,
  def: TypeDefId,
  visiting: &mut Vec<TypeDefId>,
  done: &mut HashSet<TypeDefId>,
) -> bool {
  if done.contains(&def) {
    return false;
  }
  if visiting.contains(&def) {
    return true;
  }

  visiting.push(def);
  let type_def = metadata.type_def(def);
  for parent in type_def.base.iter().chain(type_def.interfaces.iter()) {
    if let Some(parent) = parent.type_def() {
      if has_cycle(metadata, parent, visiting, done) {
        return true;
      }
    }
  }
  visiting.pop();
  done.insert(def);
  false
}
