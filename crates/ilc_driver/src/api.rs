//! Embeddable translation API.
//!
//! [`Compiler`] wraps one resolution engine over one loaded metadata model. It
//! never prints diagnostics and never writes files; the pipeline module layers
//! rendering, dumps and output on top of it.

use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use ilc_codegen_c::{BodyTranslator, CompileUnit, DefaultTranslator};
use ilc_config::IlcConfig;
use ilc_diagnostics::message::DiagnosticMessage;
use ilc_metadata::{Metadata, MethodDefId};
use ilc_mono::{FieldInstanceId, MethodInstanceId, ResolvedInstruction, Resolver, TypeInstanceId};

pub struct Compiler {
  config: Arc<IlcConfig>,
  metadata: Option<Rc<Metadata>>,
  resolver: Option<Resolver>,
  translator: Box<dyn BodyTranslator>,
}

impl Compiler {
  pub fn new(config: Arc<IlcConfig>) -> Self {
    Self {
      config,
      metadata: None,
      resolver: None,
      translator: Box::new(DefaultTranslator),
    }
  }

  /// Replaces the instruction-to-statement translator used by [`Compiler::generate`].
  pub fn with_translator(
    mut self,
    translator: Box<dyn BodyTranslator>,
  ) -> Self {
    self.translator = translator;
    self
  }

  pub fn config(&self) -> &IlcConfig {
    &self.config
  }

  /// Validates `metadata` and makes it the input of a fresh engine.
  ///
  /// Any previous model, entry points and results are dropped, even when validation fails.
  pub fn load(
    &mut self,
    metadata: Metadata,
  ) -> Result<(), DiagnosticMessage> {
    self.metadata = None;
    self.resolver = None;
    metadata.validate()?;

    let metadata = Rc::new(metadata);
    self.resolver = Some(Resolver::new(metadata.clone(), self.config.clone()));
    self.metadata = Some(metadata);
    Ok(())
  }

  pub fn load_json(
    &mut self,
    text: &str,
  ) -> Result<(), DiagnosticMessage> {
    self.load(Metadata::from_json(text)?)
  }

  pub fn load_file(
    &mut self,
    path: &Path,
  ) -> Result<(), DiagnosticMessage> {
    self.load(Metadata::load(path)?)
  }

  /// Drops every entry point and result while keeping the loaded model.
  pub fn reset(&mut self) {
    self.resolver = self
      .metadata
      .as_ref()
      .map(|metadata| Resolver::new(metadata.clone(), self.config.clone()));
  }

  pub fn is_loaded(&self) -> bool {
    self.resolver.is_some()
  }

  pub fn metadata(&self) -> Option<&Metadata> {
    self.metadata.as_deref()
  }

  pub fn resolver(&self) -> Option<&Resolver> {
    self.resolver.as_ref()
  }

  pub fn add_entry_point(
    &mut self,
    method: MethodDefId,
  ) -> Result<MethodInstanceId, DiagnosticMessage> {
    let name = format!("#{}", method.index());
    self.loaded_mut(&name)?.add_entry_point(method)
  }

  /// Adds every overload named by `Namespace.Type::method`.
  pub fn add_entry_by_name(
    &mut self,
    name: &str,
  ) -> Result<Vec<MethodInstanceId>, DiagnosticMessage> {
    self.loaded_mut(name)?.add_entry_by_name(name)
  }

  pub fn process(&mut self) -> Result<(), DiagnosticMessage> {
    self.loaded_mut("<process>")?.process()
  }

  /// Every reachable type instance, in discovery order.
  pub fn types(&self) -> Vec<TypeInstanceId> {
    match &self.resolver {
      Some(resolver) => resolver.store().types().map(|(id, _)| id).collect(),
      None => Vec::new(),
    }
  }

  pub fn fields_of(
    &self,
    ty: TypeInstanceId,
  ) -> Vec<FieldInstanceId> {
    match &self.resolver {
      Some(resolver) => resolver.fields_of(ty),
      None => Vec::new(),
    }
  }

  pub fn methods_of(
    &self,
    ty: TypeInstanceId,
  ) -> &[MethodInstanceId] {
    match &self.resolver {
      Some(resolver) => resolver.methods_of(ty),
      None => &[],
    }
  }

  /// Resolved instruction stream of a processed method; empty for bodiless or unprocessed ones.
  pub fn instructions_of(
    &self,
    method: MethodInstanceId,
  ) -> &[ResolvedInstruction] {
    match &self.resolver {
      Some(resolver) => &resolver.store().method_instance(method).instructions,
      None => &[],
    }
  }

  pub fn generate(&self) -> Vec<CompileUnit> {
    match &self.resolver {
      Some(resolver) => ilc_codegen_c::generate(resolver, self.translator.as_ref()),
      None => Vec::new(),
    }
  }

  /// Non-fatal problems the last run found.
  pub fn diagnostics(&self) -> &[DiagnosticMessage] {
    match &self.resolver {
      Some(resolver) => resolver.diagnostics(),
      None => &[],
    }
  }

  fn loaded_mut(
    &mut self,
    name: &str,
  ) -> Result<&mut Resolver, DiagnosticMessage> {
    self.resolver.as_mut().ok_or_else(|| DiagnosticMessage::InvalidEntryPoint {
      name: name.to_string(),
      reason: "no metadata loaded".to_string(),
    })
  }
}
