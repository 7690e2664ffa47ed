use std::path::Path;

use serde::{Deserialize, Serialize};

/// Header to include in generated C code with style info
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CHeader {
  /// The path/name of the header
  pub path: String,
  /// true = #include "...", false = #include <...>
  pub quoted: bool,
}

impl CHeader {
  pub fn quoted(path: &str) -> Self {
    Self {
      path: path.to_string(),
      quoted: true,
    }
  }

  pub fn system(path: &str) -> Self {
    Self {
      path: path.to_string(),
      quoted: false,
    }
  }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum DumpKind {
  Types,
  Methods,
  VTables,
  Units,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum DebugTrace {
  Loader,
  Resolve,
  VTable,
  Variance,
  Dispatch,
  Codegen,
  Packer,
}

/// Controls the verbosity level of CLI output.
///
/// - `Quiet`: No output except errors
/// - `Detailed`: Structured progress output (default)
/// - `Verbose`: Detailed output with internal phases
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum OutputLevel {
  Quiet,
  #[default]
  Detailed,
  Verbose,
}

/// Size thresholds used by the unit packer.
///
/// A bucket is closed as soon as its declaration text exceeds `decl_threshold`
/// bytes or its definition text exceeds `impl_threshold` bytes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitLimits {
  #[serde(default = "UnitLimits::default_decl_threshold")]
  pub decl_threshold: usize,
  #[serde(default = "UnitLimits::default_impl_threshold")]
  pub impl_threshold: usize,
}

impl UnitLimits {
  fn default_decl_threshold() -> usize {
    30000
  }

  fn default_impl_threshold() -> usize {
    100000
  }
}

impl Default for UnitLimits {
  fn default() -> Self {
    Self {
      decl_threshold: Self::default_decl_threshold(),
      impl_threshold: Self::default_impl_threshold(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IlcProjectBuildConfig {
  /// Path to the metadata model (JSON)
  pub input: String,
  /// Entry points, `Namespace.Type::method`
  #[serde(default)]
  pub entries: Vec<String>,
  #[serde(default = "IlcProjectBuildConfig::default_output_dir")]
  pub output_dir: String,
}

impl IlcProjectBuildConfig {
  fn default_output_dir() -> String {
    "build".to_string()
  }
}

/// Project manifest read from `ilc.toml`.
///
/// ```toml
/// name = "hello"
///
/// [build]
/// input = "hello.json"
/// entries = ["Hello.Program::Main"]
/// output_dir = "build"
///
/// [units]
/// decl_threshold = 30000
/// impl_threshold = 100000
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IlcProjectConfig {
  pub name: String,
  #[serde(default)]
  pub version: String,
  pub build: IlcProjectBuildConfig,
  #[serde(default)]
  pub units: UnitLimits,
}

impl IlcProjectConfig {
  pub fn from_toml(content: &str) -> Result<Self, String> {
    toml::from_str(content).map_err(|e| e.to_string())
  }

  /// Reads `ilc.toml` from `dir` if present.
  pub fn load_from_dir(dir: &Path) -> Result<Option<Self>, String> {
    let path = dir.join("ilc.toml");
    if !path.exists() {
      return Ok(None);
    }

    let content = std::fs::read_to_string(&path).map_err(|e| format!("{}: {}", path.display(), e))?;
    Self::from_toml(&content).map(Some)
  }
}

#[derive(Debug, Clone, Default)]
pub struct IlcBuildConfig {
  pub input: Option<String>,
  pub entries: Vec<String>,
  pub output_dir: String,
  pub dump: Vec<DumpKind>,
  pub dump_dir: Option<String>,
  pub check_mode: bool,
}

impl IlcBuildConfig {
  pub fn new(
    input: Option<String>,
    entries: Vec<String>,
    output_dir: String,
    dump: Vec<DumpKind>,
    dump_dir: Option<String>,
    check_mode: bool,
  ) -> Self {
    Self {
      input,
      entries,
      output_dir,
      dump,
      dump_dir,
      check_mode,
    }
  }
}

#[derive(Debug, Clone, Default)]
pub struct IlcConfig {
  pub project_config: Option<IlcProjectConfig>,
  pub build_config: Option<IlcBuildConfig>,
  pub debug: bool,
  pub debug_trace: Vec<DebugTrace>,
  pub quiet: bool,
  pub verbose: u8,
  pub output_level: OutputLevel,
  pub units: UnitLimits,
  /// Extra headers included by every generated unit
  pub headers: Vec<CHeader>,
}

impl IlcConfig {
  pub fn new_basic(
    debug: bool,
    debug_trace: Vec<DebugTrace>,
    quiet: bool,
    verbose: u8,
  ) -> Self {
    let output_level = if quiet {
      OutputLevel::Quiet
    } else if verbose > 0 {
      OutputLevel::Verbose
    } else {
      OutputLevel::Detailed
    };

    Self {
      debug,
      debug_trace,
      quiet,
      verbose,
      output_level,
      ..Self::default()
    }
  }

  /// Silent configuration, handy for embedding and tests.
  pub fn quiet() -> Self {
    Self::new_basic(false, Vec::new(), true, 0)
  }

  pub fn dump_requested(
    &self,
    kind: DumpKind,
  ) -> bool {
    self
      .build_config
      .as_ref()
      .map(|bc| bc.dump.contains(&kind))
      .unwrap_or(false)
  }
}
