//! Deferred resolution of virtual call targets.

use ilc_config::DebugTrace;
use ilc_diagnostics::message::DiagnosticMessage;
use ilc_log::{phase_warn, trace_dbg};

use crate::instance::{MethodInstanceId, TypeInstanceId};
use crate::resolver::Resolver;
use crate::vtable::SlotEntry;

impl Resolver {
  /// Binds every dispatch entry against every constructed subtype not seen before.
  ///
  /// Returns the number of newly bound (entry, type) pairs.
  pub(crate) fn resolve_dispatches(&mut self) -> Result<usize, DiagnosticMessage> {
    let mut resolved = 0;
    let entries: Vec<MethodInstanceId> = self.dispatch_entries.iter().copied().collect();

    for entry in entries {
      let declaring = self.store.method_instance(entry).owner;
      let candidates: Vec<TypeInstanceId> = std::iter::once(declaring)
        .chain(self.store.type_instance(declaring).derived.iter().copied())
        .filter(|ty| self.store.type_instance(*ty).is_instantiated)
        .collect();

      for ty in candidates {
        if !self.resolved_dispatch.insert((entry, ty)) {
          continue;
        }
        let Some(implementation) = self.dispatch_target(entry, ty)? else {
          continue;
        };

        let method = self.store.method_mut(entry);
        method.override_impls.insert(implementation);
        method.dispatch_targets.insert(ty, implementation);
        self.mark_direct(implementation);
        resolved += 1;
        trace_dbg!(
          &self.config,
          DebugTrace::Dispatch,
          "{} on {} -> {}",
          self.method_name(entry),
          self.type_name(ty),
          self.method_name(implementation)
        );
      }
    }

    Ok(resolved)
  }

  /// Implementation of `entry` for a receiver of type `ty`.
  ///
  /// Falls back to a variance-compatible instantiation of the entry's declaring type.
  /// An entry the table has never seen is a warning when the two types come from
  /// different input versions and an error otherwise.
  fn dispatch_target(
    &mut self,
    entry: MethodInstanceId,
    ty: TypeInstanceId,
  ) -> Result<Option<MethodInstanceId>, DiagnosticMessage> {
    let (declaring, def, args) = {
      let method = self.store.method_instance(entry);
      (method.owner, method.def, method.args.clone())
    };
    let declaring_key = self.store.type_instance(declaring).key.clone();
    if self.metadata.type_def(self.store.type_instance(ty).def()).is_interface() {
      return Ok(None);
    }

    let table = self.vtable_of(ty)?;
    let slot = SlotEntry::new(declaring_key.clone(), def);
    let bound = match table.query(&slot) {
      Some(bound) => Some(bound.cloned()),
      None => self.variance_match(&table, &declaring_key, def),
    };

    match bound {
      Some(Some(implementation)) => {
        let owner = self.intern_type(implementation.ty)?;
        self.intern_method(owner, implementation.method, args).map(Some)
      },
      Some(None) => Ok(None),
      None => {
        let type_version = self.store.type_instance(ty).version;
        let entry_version = self.store.type_instance(declaring).version;
        let method = self.metadata.method(def).name.clone();
        if type_version == entry_version {
          return Err(DiagnosticMessage::UnresolvedDispatch {
            type_name: self.type_name(ty),
            entry_type: self.type_name(declaring),
            method,
          });
        }

        let warning = DiagnosticMessage::VersionMismatch {
          type_name: self.type_name(ty),
          type_version,
          entry_type: self.type_name(declaring),
          entry_version,
          method,
        };
        phase_warn!(&self.config, "{}", warning);
        self.warnings.push(warning);
        Ok(None)
      },
    }
  }
}
