//! Monomorphization and virtual dispatch resolution.
//!
//! Starting from a set of entry methods, the [`Resolver`] discovers every concrete
//! type, method and field instantiation reachable through instruction operands,
//! builds virtual tables for the types that are actually constructed, and resolves
//! every virtual call to the set of implementations it can reach.
//!
//! ## Algorithm Overview
//!
//! 1. **Drain**: pop a method instance, substitute its body's operands in the
//!    method's generic context and intern whatever they name. Direct calls are
//!    queued; virtual calls become deferred dispatch entries.
//! 2. **Variance**: link instantiations of variant generic definitions whose
//!    arguments are assignment compatible.
//! 3. **Dispatch**: for every dispatch entry and every constructed subtype of its
//!    declaring type, look the implementation up in the subtype's virtual table
//!    and queue it.
//!
//! The loop repeats until a full round produces no new work.

pub mod dump;
pub mod instance;
pub mod intern;
pub mod sig_key;
pub mod subst;
pub mod variance;
pub mod vtable;

mod dispatch;
mod operand;
mod resolver;

pub use instance::{
  FieldInstance, FieldInstanceId, MethodInstance, MethodInstanceId, ProcessState, ResolvedHandler, ResolvedInstruction,
  ResolvedOperand, TypeInstance, TypeInstanceId, TypeKey,
};
pub use intern::InstanceStore;
pub use resolver::Resolver;
pub use sig_key::SignatureKey;
pub use subst::{substitute, GenericContext};
pub use vtable::{SlotEntry, VTableBuilder, VirtualSlot, VirtualTable};
