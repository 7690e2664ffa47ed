use std::fmt;

use super::diagnostic_report::{Diagnostic, Severity};

#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticMessage {
  // #region Input
  LoadFailed {
    path: String,
    reason: String,
  },
  MalformedMetadata {
    reason: String,
  },
  DanglingHandle {
    kind: &'static str,
    index: u32,
    referrer: String,
  },
  PlaceholderOutOfRange {
    placeholder: String,
    arity: usize,
    referrer: String,
  },
  BranchOutOfRange {
    method: String,
    instruction: usize,
    target: usize,
  },
  // #endregion Input
  // #region References
  UnresolvedType {
    reference: String,
    referrer: String,
  },
  UnresolvedMethod {
    parent: String,
    name: String,
    signature: String,
    referrer: String,
  },
  UnresolvedField {
    parent: String,
    name: String,
    referrer: String,
  },
  GenericArityMismatch {
    definition: String,
    expected: usize,
    got: usize,
  },
  UnboundPlaceholder {
    placeholder: String,
    referrer: String,
  },
  InvalidEntryPoint {
    name: String,
    reason: String,
  },
  // #endregion References
  // #region VirtualTables
  UnimplementedSlot {
    type_name: String,
    signature: String,
  },
  MissingReuseSlot {
    type_name: String,
    method: String,
    signature: String,
  },
  IllegalOverrideTarget {
    type_name: String,
    method: String,
    target: String,
  },
  OverrideTargetNotVirtual {
    type_name: String,
    method: String,
    target: String,
  },
  DuplicateOverrideTarget {
    type_name: String,
    target: String,
  },
  OverridesOnNonVirtual {
    type_name: String,
    method: String,
  },
  CyclicInheritance {
    type_name: String,
  },
  // #endregion VirtualTables
  // #region Dispatch
  UnresolvedDispatch {
    type_name: String,
    entry_type: String,
    method: String,
  },
  VersionMismatch {
    type_name: String,
    type_version: u32,
    entry_type: String,
    entry_version: u32,
    method: String,
  },
  // #endregion Dispatch
  WriteFailed {
    path: String,
    reason: String,
  },
}

impl fmt::Display for DiagnosticMessage {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      DiagnosticMessage::LoadFailed { path, reason } => write!(f, "Failed to load '{}': {}", path, reason),
      DiagnosticMessage::MalformedMetadata { reason } => write!(f, "Malformed metadata: {}", reason),
      DiagnosticMessage::DanglingHandle { kind, index, .. } => {
        write!(f, "Dangling {} handle #{}", kind, index)
      },
      DiagnosticMessage::PlaceholderOutOfRange { placeholder, arity, .. } => {
        write!(f, "Generic placeholder '{}' is out of range for an owner with {} parameters", placeholder, arity)
      },
      DiagnosticMessage::BranchOutOfRange {
        method,
        instruction,
        target,
      } => write!(
        f,
        "Branch at instruction {} of '{}' targets {} which is outside the body",
        instruction, method, target
      ),

      DiagnosticMessage::UnresolvedType { reference, .. } => write!(f, "Cannot resolve type '{}'", reference),
      DiagnosticMessage::UnresolvedMethod {
        parent, name, signature, ..
      } => write!(f, "Cannot resolve method '{}::{}' with signature {}", parent, name, signature),
      DiagnosticMessage::UnresolvedField { parent, name, .. } => {
        write!(f, "Cannot resolve field '{}::{}'", parent, name)
      },
      DiagnosticMessage::GenericArityMismatch {
        definition,
        expected,
        got,
      } => write!(
        f,
        "'{}' expects {} generic arguments, but got {}",
        definition, expected, got
      ),
      DiagnosticMessage::UnboundPlaceholder { placeholder, .. } => {
        write!(f, "Generic placeholder '{}' has no binding in a concrete context", placeholder)
      },
      DiagnosticMessage::InvalidEntryPoint { name, reason } => write!(f, "Invalid entry point '{}': {}", name, reason),

      DiagnosticMessage::UnimplementedSlot { type_name, signature } => {
        write!(f, "Concrete type '{}' does not implement '{}'", type_name, signature)
      },
      DiagnosticMessage::MissingReuseSlot { type_name, method, .. } => {
        write!(f, "'{}::{}' overrides a slot that no base type declares", type_name, method)
      },
      DiagnosticMessage::IllegalOverrideTarget { type_name, target, .. } => {
        write!(f, "Illegal explicit override target '{}' in '{}'", target, type_name)
      },
      DiagnosticMessage::OverrideTargetNotVirtual { type_name, target, .. } => {
        write!(f, "Explicit override target '{}' in '{}' must be virtual", target, type_name)
      },
      DiagnosticMessage::DuplicateOverrideTarget { type_name, target } => {
        write!(f, "'{}' has already been overridden in '{}'", target, type_name)
      },
      DiagnosticMessage::OverridesOnNonVirtual { type_name, method } => {
        write!(f, "'{}::{}' declares explicit overrides but is not virtual", type_name, method)
      },
      DiagnosticMessage::CyclicInheritance { type_name } => write!(f, "'{}' inherits from itself", type_name),

      DiagnosticMessage::UnresolvedDispatch {
        type_name,
        entry_type,
        method,
      } => write!(
        f,
        "No implementation of '{}::{}' in instantiated type '{}'",
        entry_type, method, type_name
      ),
      DiagnosticMessage::VersionMismatch {
        type_name, entry_type, method, ..
      } => write!(
        f,
        "Skipping '{}::{}' on '{}': definitions come from different input versions",
        entry_type, method, type_name
      ),
      DiagnosticMessage::WriteFailed { path, reason } => write!(f, "Failed to write '{}': {}", path, reason),
    }
  }
}

impl DiagnosticMessage {
  pub fn code(&self) -> String {
    match self {
      DiagnosticMessage::LoadFailed { .. } => "IL0001",
      DiagnosticMessage::MalformedMetadata { .. } => "IL0002",
      DiagnosticMessage::DanglingHandle { .. } => "IL0003",
      DiagnosticMessage::PlaceholderOutOfRange { .. } => "IL0004",
      DiagnosticMessage::BranchOutOfRange { .. } => "IL0005",
      DiagnosticMessage::UnresolvedType { .. } => "IL0010",
      DiagnosticMessage::UnresolvedMethod { .. } => "IL0011",
      DiagnosticMessage::UnresolvedField { .. } => "IL0012",
      DiagnosticMessage::GenericArityMismatch { .. } => "IL0013",
      DiagnosticMessage::UnboundPlaceholder { .. } => "IL0014",
      DiagnosticMessage::InvalidEntryPoint { .. } => "IL0015",
      DiagnosticMessage::UnimplementedSlot { .. } => "IL0020",
      DiagnosticMessage::MissingReuseSlot { .. } => "IL0021",
      DiagnosticMessage::IllegalOverrideTarget { .. } => "IL0022",
      DiagnosticMessage::OverrideTargetNotVirtual { .. } => "IL0023",
      DiagnosticMessage::DuplicateOverrideTarget { .. } => "IL0024",
      DiagnosticMessage::OverridesOnNonVirtual { .. } => "IL0025",
      DiagnosticMessage::CyclicInheritance { .. } => "IL0026",
      DiagnosticMessage::UnresolvedDispatch { .. } => "IL0030",
      DiagnosticMessage::VersionMismatch { .. } => "IL0031",
      DiagnosticMessage::WriteFailed { .. } => "IL0040",
    }
    .to_string()
  }

  pub fn level(&self) -> Severity {
    match self {
      DiagnosticMessage::VersionMismatch { .. } => Severity::Warning,
      _ => Severity::Error,
    }
  }

  pub fn is_fatal(&self) -> bool {
    self.level() == Severity::Error
  }

  /// Identifying context attached to the report as notes.
  fn context(&self) -> Vec<String> {
    match self {
      DiagnosticMessage::DanglingHandle { referrer, .. }
      | DiagnosticMessage::PlaceholderOutOfRange { referrer, .. }
      | DiagnosticMessage::UnresolvedType { referrer, .. }
      | DiagnosticMessage::UnresolvedMethod { referrer, .. }
      | DiagnosticMessage::UnresolvedField { referrer, .. }
      | DiagnosticMessage::UnboundPlaceholder { referrer, .. } => vec![format!("referenced from {}", referrer)],
      DiagnosticMessage::MissingReuseSlot { signature, .. } => vec![format!("signature: {}", signature)],
      DiagnosticMessage::IllegalOverrideTarget { method, .. } | DiagnosticMessage::OverrideTargetNotVirtual { method, .. } => {
        vec![format!("overriding method: {}", method)]
      },
      DiagnosticMessage::VersionMismatch {
        type_version,
        entry_version,
        ..
      } => vec![format!(
        "instantiated type has version {}, dispatch entry has version {}",
        type_version, entry_version
      )],
      _ => vec![],
    }
  }

  pub fn report(&self) -> Diagnostic {
    self.report_with_severity(self.level())
  }

  pub fn report_with_severity(
    &self,
    severity: Severity,
  ) -> Diagnostic {
    let mut diagnostic = Diagnostic::new(severity, self.to_string(), self.code());
    for note in self.context() {
      diagnostic = diagnostic.with_note(note);
    }
    diagnostic
  }
}
