//! Virtual table construction.
//!
//! Every class gets a table of slots keyed by [`SignatureKey`]. A slot gathers the
//! entries (declaring type plus method) that dispatch through it and the entry that
//! implements it. Tables are built once per open definition and expanded for each
//! concrete instantiation by substitution, so `Pair<int32,string>` always has exactly
//! the shape of `Pair<T,U>` with the arguments written in.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use ilc_config::{DebugTrace, IlcConfig};
use ilc_diagnostics::message::DiagnosticMessage;
use ilc_log::trace_dbg;
use ilc_metadata::{Metadata, MethodDefId, MethodRef, TypeDefId, TypeSig};

use crate::instance::TypeKey;
use crate::sig_key::SignatureKey;
use crate::subst::{substitute, GenericContext};

const MAX_INTERFACE_DEPTH: usize = 64;

/// A method as seen through one declaring type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotEntry {
  pub ty: TypeKey,
  pub method: MethodDefId,
}

impl SlotEntry {
  pub fn new(
    ty: TypeKey,
    method: MethodDefId,
  ) -> Self {
    Self { ty, method }
  }

  fn substituted(
    &self,
    ctx: &GenericContext,
  ) -> Self {
    Self {
      ty: self.ty.substituted(ctx),
      method: self.method,
    }
  }

  pub fn display(
    &self,
    metadata: &Metadata,
  ) -> String {
    format!("{}::{}", self.ty.display(metadata), metadata.method(self.method).name)
  }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VirtualSlot {
  pub entries: IndexSet<SlotEntry>,
  /// Entry that introduced the slot.
  pub new_slot_entry: Option<SlotEntry>,
  /// `None` while the slot is abstract.
  pub implementation: Option<SlotEntry>,
}

impl VirtualSlot {
  fn introduced(
    entry: SlotEntry,
    implementation: Option<SlotEntry>,
  ) -> Self {
    let mut entries = IndexSet::new();
    entries.insert(entry.clone());
    Self {
      entries,
      new_slot_entry: Some(entry),
      implementation,
    }
  }

  fn substituted(
    &self,
    ctx: &GenericContext,
  ) -> Self {
    Self {
      entries: self.entries.iter().map(|e| e.substituted(ctx)).collect(),
      new_slot_entry: self.new_slot_entry.as_ref().map(|e| e.substituted(ctx)),
      implementation: self.implementation.as_ref().map(|e| e.substituted(ctx)),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VirtualTable {
  pub owner: TypeKey,
  pub is_interface: bool,
  pub slots: IndexMap<SignatureKey, VirtualSlot>,
  /// Every entry ever seen in this hierarchy, mapped to its implementation. Entries of
  /// slots hidden by a `newslot` redeclaration keep the binding they had when hidden.
  pub dispatch: IndexMap<SlotEntry, Option<SlotEntry>>,
  /// Class methods bound by `.override` to a method of this type or a base. Interface
  /// targets are not recorded here: they join the implementing method's slot.
  pub explicit_overrides: IndexMap<SlotEntry, SlotEntry>,
  /// Own methods that a method of the same type explicitly overrides; direct calls to
  /// them are redirected.
  pub same_type_replace: IndexMap<MethodDefId, SlotEntry>,
  /// Entries still without implementation, retried when a subtype adds methods.
  pub pending: IndexMap<SignatureKey, IndexSet<SlotEntry>>,
}

impl VirtualTable {
  fn empty(
    owner: TypeKey,
    is_interface: bool,
  ) -> Self {
    Self {
      owner,
      is_interface,
      slots: IndexMap::new(),
      dispatch: IndexMap::new(),
      explicit_overrides: IndexMap::new(),
      same_type_replace: IndexMap::new(),
      pending: IndexMap::new(),
    }
  }

  /// Binding of `entry`: `None` if the hierarchy never saw it, `Some(None)` if it is abstract.
  pub fn query(
    &self,
    entry: &SlotEntry,
  ) -> Option<Option<&SlotEntry>> {
    self.dispatch.get(entry).map(Option::as_ref)
  }

  pub fn implementation_of(
    &self,
    entry: &SlotEntry,
  ) -> Option<&SlotEntry> {
    self.dispatch.get(entry).and_then(Option::as_ref)
  }

  pub fn same_type_replacement(
    &self,
    method: MethodDefId,
  ) -> Option<&SlotEntry> {
    self.same_type_replace.get(&method)
  }

  pub fn slot(
    &self,
    key: &SignatureKey,
  ) -> Option<&VirtualSlot> {
    self.slots.get(key)
  }

  pub fn is_complete(&self) -> bool {
    self.dispatch.values().all(Option::is_some)
  }

  /// Rewrites this open table for the instantiation `key` of the same definition.
  ///
  /// Interface slots that collide after substitution are merged; for classes the later
  /// slot wins. Colliding dispatch entries keep the implementation declared in the
  /// more derived type.
  pub fn instantiate(
    &self,
    metadata: &Metadata,
    key: &TypeKey,
  ) -> VirtualTable {
    let ctx = key.context();
    let mut table = VirtualTable::empty(key.clone(), self.is_interface);

    for (sig, slot) in &self.slots {
      let sig = sig.substituted(&ctx);
      let slot = slot.substituted(&ctx);
      match table.slots.get_mut(&sig) {
        Some(existing) if self.is_interface => {
          existing.entries.extend(slot.entries);
          if existing.implementation.is_none() {
            existing.implementation = slot.implementation;
          }
        },
        Some(existing) => *existing = slot,
        None => {
          table.slots.insert(sig, slot);
        },
      }
    }

    for (entry, implementation) in &self.dispatch {
      let entry = entry.substituted(&ctx);
      let implementation = implementation.as_ref().map(|i| i.substituted(&ctx));
      let replace = match table.dispatch.get(&entry) {
        None => true,
        Some(current) => prefers(metadata, current.as_ref(), implementation.as_ref()),
      };
      if replace {
        table.dispatch.insert(entry, implementation);
      }
    }

    for (target, implementation) in &self.explicit_overrides {
      table
        .explicit_overrides
        .insert(target.substituted(&ctx), implementation.substituted(&ctx));
    }
    for (method, implementation) in &self.same_type_replace {
      table.same_type_replace.insert(*method, implementation.substituted(&ctx));
    }
    for (sig, entries) in &self.pending {
      table
        .pending
        .entry(sig.substituted(&ctx))
        .or_default()
        .extend(entries.iter().map(|e| e.substituted(&ctx)));
    }

    table
  }
}

/// Whether `candidate` should replace `current` as the implementation of a collided entry.
fn prefers(
  metadata: &Metadata,
  current: Option<&SlotEntry>,
  candidate: Option<&SlotEntry>,
) -> bool {
  match (current, candidate) {
    (_, None) => false,
    (None, Some(_)) => true,
    (Some(current), Some(candidate)) => metadata.is_base_def(current.ty.def, candidate.ty.def),
  }
}

fn implementation(
  metadata: &Metadata,
  entry: &SlotEntry,
) -> Option<SlotEntry> {
  if metadata.method(entry.method).is_abstract() {
    None
  } else {
    Some(entry.clone())
  }
}

/// Detaches `entry` from every slot, dropping slots left without entries.
fn remove_slot_entry(
  slots: &mut IndexMap<SignatureKey, VirtualSlot>,
  entry: &SlotEntry,
) {
  for slot in slots.values_mut() {
    slot.entries.shift_remove(entry);
  }
  slots.retain(|_, slot| !slot.entries.is_empty());
}

fn describe_ref(
  metadata: &Metadata,
  method: &MethodRef,
) -> String {
  match method {
    MethodRef::Def(id) => metadata.method_name(*id),
    MethodRef::Member { parent, name, .. } => format!("{}::{}", metadata.sig_name(parent), name),
    MethodRef::Spec { method, .. } => describe_ref(metadata, method),
  }
}

/// `def` followed by its base chain, every key written in `def`'s own placeholders.
pub fn base_chain(
  metadata: &Metadata,
  def: TypeDefId,
) -> Vec<TypeKey> {
  let mut chain = vec![TypeKey::open(metadata, def)];
  while chain.len() <= metadata.types.len() {
    let Some(current) = chain.last() else {
      break;
    };
    let Some(base) = &metadata.type_def(current.def).base else {
      break;
    };
    let base = substitute(base, &current.context()).into_owned();
    let Some(key) = TypeKey::from_sig(metadata, &base) else {
      break;
    };
    chain.push(key);
  }
  chain
}

/// The interfaces `def` declares plus everything they extend, in discovery order.
pub fn interface_closure(
  metadata: &Metadata,
  def: TypeDefId,
) -> Result<IndexSet<TypeKey>, DiagnosticMessage> {
  let mut out = IndexSet::new();
  for interface in &metadata.type_def(def).interfaces {
    collect_interface(metadata, interface, &mut out, 0)?;
  }
  Ok(out)
}

fn collect_interface(
  metadata: &Metadata,
  sig: &TypeSig,
  out: &mut IndexSet<TypeKey>,
  depth: usize,
) -> Result<(), DiagnosticMessage> {
  if depth > MAX_INTERFACE_DEPTH {
    return Err(DiagnosticMessage::CyclicInheritance {
      type_name: metadata.sig_name(sig),
    });
  }

  let key = TypeKey::from_sig(metadata, sig).ok_or_else(|| DiagnosticMessage::UnresolvedType {
    reference: metadata.sig_name(sig),
    referrer: "interface list".to_string(),
  })?;
  if !out.insert(key.clone()) {
    return Ok(());
  }

  let ctx = key.context();
  for parent in &metadata.type_def(key.def).interfaces {
    let parent = substitute(parent, &ctx);
    collect_interface(metadata, &parent, out, depth + 1)?;
  }
  Ok(())
}

enum TableState {
  Building,
  Built(Rc<VirtualTable>),
}

/// Builds and caches virtual tables by type key.
pub struct VTableBuilder {
  config: Arc<IlcConfig>,
  tables: HashMap<TypeKey, TableState>,
}

impl VTableBuilder {
  pub fn new(config: Arc<IlcConfig>) -> Self {
    Self {
      config,
      tables: HashMap::new(),
    }
  }

  pub fn cached(
    &self,
    key: &TypeKey,
  ) -> Option<Rc<VirtualTable>> {
    match self.tables.get(key) {
      Some(TableState::Built(table)) => Some(table.clone()),
      _ => None,
    }
  }

  pub fn built_count(&self) -> usize {
    self
      .tables
      .values()
      .filter(|state| matches!(state, TableState::Built(_)))
      .count()
  }

  /// Table for `key`, building the open table of its definition first when needed.
  ///
  /// Asking for a table while it is being built means the base chain loops back onto
  /// itself, which is reported as cyclic inheritance.
  pub fn resolve(
    &mut self,
    metadata: &Metadata,
    key: &TypeKey,
  ) -> Result<Rc<VirtualTable>, DiagnosticMessage> {
    match self.tables.get(key) {
      Some(TableState::Built(table)) => return Ok(table.clone()),
      Some(TableState::Building) => {
        return Err(DiagnosticMessage::CyclicInheritance {
          type_name: key.display(metadata),
        });
      },
      None => {},
    }

    let type_def = metadata.type_def(key.def);
    if type_def.generic_params.len() != key.args.len() {
      return Err(DiagnosticMessage::GenericArityMismatch {
        definition: type_def.full_name(),
        expected: type_def.generic_params.len(),
        got: key.args.len(),
      });
    }

    let open = TypeKey::open(metadata, key.def);
    let table = if *key == open {
      self.tables.insert(key.clone(), TableState::Building);
      let table = if type_def.is_interface() {
        build_interface(metadata, key.def)
      } else {
        self.build_class(metadata, key.def)?
      };
      trace_dbg!(
        &self.config,
        DebugTrace::VTable,
        "built table for {} ({} slots, {} entries)",
        key.display(metadata),
        table.slots.len(),
        table.dispatch.len()
      );
      table
    } else {
      let generic = self.resolve(metadata, &open)?;
      trace_dbg!(
        &self.config,
        DebugTrace::VTable,
        "expanding {} into {}",
        open.display(metadata),
        key.display(metadata)
      );
      generic.instantiate(metadata, key)
    };

    let table = Rc::new(table);
    self.tables.insert(key.clone(), TableState::Built(table.clone()));
    Ok(table)
  }

  fn build_class(
    &mut self,
    metadata: &Metadata,
    def: TypeDefId,
  ) -> Result<VirtualTable, DiagnosticMessage> {
    let type_def = metadata.type_def(def);
    let type_name = type_def.full_name();
    let owner = TypeKey::open(metadata, def);
    let open_ctx = GenericContext::empty();

    let mut table = match &type_def.base {
      Some(base) => {
        let base_key = TypeKey::from_sig(metadata, base).ok_or_else(|| DiagnosticMessage::UnresolvedType {
          reference: metadata.sig_name(base),
          referrer: type_name.clone(),
        })?;
        let mut table = (*self.resolve(metadata, &base_key)?).clone();
        table.owner = owner.clone();
        table.is_interface = false;
        table.same_type_replace.clear();
        table
      },
      None => VirtualTable::empty(owner.clone(), false),
    };
    let introduces_all = type_def.base.is_none();

    let mut explicit = Vec::new();
    let mut reuse = Vec::new();
    let mut fresh = Vec::new();
    for &m in &type_def.methods {
      let method = metadata.method(m);
      if method.is_static() || method.is_ctor() {
        continue;
      }
      if method.has_overrides() {
        explicit.push(m);
      }
      let key = SignatureKey::of_method(metadata, m, &open_ctx);
      // A reuse-slot method with explicit targets still binds them when the base has no slot.
      let orphaned = method.has_overrides() && !table.slots.contains_key(&key);
      if method.is_reuse_slot() && !introduces_all && !orphaned {
        reuse.push((m, key));
      } else {
        fresh.push((m, key));
      }
    }

    // Slots whose entries get (re)bound by this type.
    let mut touched = IndexSet::new();
    let mut own_keys = IndexSet::new();
    for (m, key) in reuse {
      let entry = SlotEntry::new(owner.clone(), m);
      let Some(slot) = table.slots.get_mut(&key) else {
        return Err(DiagnosticMessage::MissingReuseSlot {
          type_name,
          method: metadata.method(m).name.clone(),
          signature: key.display(metadata),
        });
      };
      slot.implementation = implementation(metadata, &entry);
      slot.entries.insert(entry);
      own_keys.insert(key);
    }

    for (m, key) in fresh {
      let entry = SlotEntry::new(owner.clone(), m);
      let slot = VirtualSlot::introduced(entry.clone(), implementation(metadata, &entry));
      table.slots.insert(key.clone(), slot);
      own_keys.insert(key);
    }
    touched.extend(own_keys.iter().cloned());

    for (key, entries) in std::mem::take(&mut table.pending) {
      table.slots.entry(key.clone()).or_default().entries.extend(entries);
      touched.insert(key);
    }

    let interfaces = interface_closure(metadata, def)?;
    let related: Vec<TypeKey> = base_chain(metadata, def).into_iter().chain(interfaces.iter().cloned()).collect();

    let mut targets = IndexSet::new();
    let mut class_targets = Vec::new();
    for &m in &explicit {
      let method = metadata.method(m);
      if !method.is_virtual() {
        return Err(DiagnosticMessage::OverridesOnNonVirtual {
          type_name,
          method: method.name.clone(),
        });
      }
      let own_key = SignatureKey::of_method(metadata, m, &open_ctx);

      for target_ref in &method.overrides {
        let target = resolve_override_target(metadata, &related, m, target_ref)?;
        let target_def = metadata.method(target.method);
        if !target_def.is_virtual() {
          return Err(DiagnosticMessage::OverrideTargetNotVirtual {
            type_name,
            method: method.name.clone(),
            target: target.display(metadata),
          });
        }
        if !targets.insert(target.clone()) || (target.ty == owner && target_def.has_overrides()) {
          return Err(DiagnosticMessage::DuplicateOverrideTarget {
            type_name,
            target: target.display(metadata),
          });
        }

        let implementation = SlotEntry::new(owner.clone(), m);
        if metadata.type_def(target.ty.def).is_interface() {
          // The interface entry follows the implementing method's slot from here on.
          remove_slot_entry(&mut table.slots, &target);
          table.explicit_overrides.shift_remove(&target);
          table.slots.entry(own_key.clone()).or_default().entries.insert(target);
          touched.insert(own_key.clone());
          continue;
        }
        if target.ty == owner {
          table.same_type_replace.insert(target.method, implementation.clone());
        }
        table.explicit_overrides.insert(target.clone(), implementation.clone());
        class_targets.push((target, implementation));
      }
    }

    for interface in &interfaces {
      let menu = self.resolve(metadata, interface)?;
      for (key, slot) in &menu.slots {
        for entry in &slot.entries {
          if targets.contains(entry) {
            continue;
          }
          let redeclared = own_keys.contains(key);
          let bound = matches!(table.dispatch.get(entry), Some(Some(_)));
          if bound && !redeclared {
            continue;
          }
          if redeclared {
            table.explicit_overrides.shift_remove(entry);
            remove_slot_entry(&mut table.slots, entry);
          }
          table.slots.entry(key.clone()).or_default().entries.insert(entry.clone());
          touched.insert(key.clone());
        }
      }
    }

    for key in &touched {
      if let Some(slot) = table.slots.get(key) {
        for entry in &slot.entries {
          table.dispatch.insert(entry.clone(), slot.implementation.clone());
        }
      }
    }
    for (target, implementation) in class_targets {
      table.dispatch.insert(target, Some(implementation));
    }

    table.pending.clear();
    for (key, slot) in &table.slots {
      let unbound: IndexSet<SlotEntry> = slot
        .entries
        .iter()
        .filter(|e| !matches!(table.dispatch.get(*e), Some(Some(_))))
        .cloned()
        .collect();
      if !unbound.is_empty() {
        table.pending.insert(key.clone(), unbound);
      }
    }

    if !type_def.is_abstract() {
      if let Some((key, _)) = table.pending.first() {
        return Err(DiagnosticMessage::UnimplementedSlot {
          type_name,
          signature: key.display(metadata),
        });
      }
      if let Some((entry, _)) = table.dispatch.iter().find(|(_, imp)| imp.is_none()) {
        return Err(DiagnosticMessage::UnimplementedSlot {
          type_name,
          signature: entry.display(metadata),
        });
      }
    }

    Ok(table)
  }
}

fn build_interface(
  metadata: &Metadata,
  def: TypeDefId,
) -> VirtualTable {
  let owner = TypeKey::open(metadata, def);
  let open_ctx = GenericContext::empty();
  let mut table = VirtualTable::empty(owner.clone(), true);

  for &m in &metadata.type_def(def).methods {
    if metadata.method(m).is_static() {
      continue;
    }
    let key = SignatureKey::of_method(metadata, m, &open_ctx);
    let entry = SlotEntry::new(owner.clone(), m);
    let bound = implementation(metadata, &entry);

    let slot = table.slots.entry(key).or_default();
    slot.entries.insert(entry.clone());
    if slot.new_slot_entry.is_none() {
      slot.new_slot_entry = Some(entry.clone());
    }
    if slot.implementation.is_none() {
      slot.implementation = bound.clone();
    }
    table.dispatch.insert(entry, bound);
  }

  table
}

/// Finds the entry an explicit override names. It must belong to the overriding type,
/// one of its bases, or one of its interfaces.
fn resolve_override_target(
  metadata: &Metadata,
  related: &[TypeKey],
  method: MethodDefId,
  target: &MethodRef,
) -> Result<SlotEntry, DiagnosticMessage> {
  let method_def = metadata.method(method);
  let illegal = || DiagnosticMessage::IllegalOverrideTarget {
    type_name: metadata.full_name(method_def.owner),
    method: method_def.name.clone(),
    target: describe_ref(metadata, target),
  };

  match target {
    MethodRef::Def(id) => {
      let target_owner = metadata.method(*id).owner;
      let ty = related.iter().find(|k| k.def == target_owner).ok_or_else(illegal)?;
      Ok(SlotEntry::new(ty.clone(), *id))
    },
    MethodRef::Member { parent, name, sig } => {
      let ty = TypeKey::from_sig(metadata, parent)
        .filter(|k| related.contains(k))
        .ok_or_else(illegal)?;
      let id = metadata.find_method_by_sig(ty.def, name, sig).ok_or_else(illegal)?;
      Ok(SlotEntry::new(ty, id))
    },
    MethodRef::Spec { .. } => Err(illegal()),
  }
}
