use clap::{ColorChoice, Parser, Subcommand, ValueEnum};
use ilc_config::{DebugTrace, DumpKind};

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum DumpKindCli {
  /// Dump reachable type instances
  Types,
  /// Dump method instances and their dispatch targets
  Methods,
  /// Dump virtual tables
  Vtables,
  /// Dump compile unit layout
  Units,
}

impl From<DumpKindCli> for DumpKind {
  fn from(value: DumpKindCli) -> DumpKind {
    match value {
      DumpKindCli::Types => DumpKind::Types,
      DumpKindCli::Methods => DumpKind::Methods,
      DumpKindCli::Vtables => DumpKind::VTables,
      DumpKindCli::Units => DumpKind::Units,
    }
  }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum DebugTraceCli {
  Loader,
  Resolve,
  Vtable,
  Variance,
  Dispatch,
  Codegen,
  Packer,
}

impl From<DebugTraceCli> for DebugTrace {
  fn from(value: DebugTraceCli) -> DebugTrace {
    match value {
      DebugTraceCli::Loader => DebugTrace::Loader,
      DebugTraceCli::Resolve => DebugTrace::Resolve,
      DebugTraceCli::Vtable => DebugTrace::VTable,
      DebugTraceCli::Variance => DebugTrace::Variance,
      DebugTraceCli::Dispatch => DebugTrace::Dispatch,
      DebugTraceCli::Codegen => DebugTrace::Codegen,
      DebugTraceCli::Packer => DebugTrace::Packer,
    }
  }
}

#[derive(Parser, Debug, Clone, PartialEq)]
pub struct BuildCommand {
  /// Metadata model (JSON) or nothing for project mode
  pub input: Option<String>,

  /// Entry point, `Namespace.Type::method` (can be repeated)
  #[arg(short, long = "entry", action = clap::ArgAction::Append)]
  pub entries: Vec<String>,

  /// Output directory
  #[arg(short = 'o', long)]
  pub output_dir: Option<String>,

  /// Declaration bytes per unit before a new one is started
  #[arg(long)]
  pub decl_threshold: Option<usize>,

  /// Definition bytes per unit before a new one is started
  #[arg(long)]
  pub impl_threshold: Option<usize>,

  /// Extra header included by every unit (`<name>` for system headers)
  #[arg(long = "include", action = clap::ArgAction::Append)]
  pub includes: Vec<String>,
}

#[derive(Parser, Debug, Clone, PartialEq)]
pub struct CheckCommand {
  /// Metadata model (JSON) or nothing for project mode
  pub input: Option<String>,

  /// Entry point, `Namespace.Type::method` (can be repeated)
  #[arg(short, long = "entry", action = clap::ArgAction::Append)]
  pub entries: Vec<String>,
}

#[derive(Subcommand, Clone, PartialEq)]
pub enum SubCommand {
  /// Translate a metadata model to C
  Build(BuildCommand),
  /// Resolve and generate without writing output
  Check(CheckCommand),
}

#[derive(Parser)]
#[command(author, version, about = "IL to C ahead-of-time translator", long_about = None)]
#[command(propagate_version = true)]
#[command(color = ColorChoice::Always)]
pub struct Cli {
  #[command(subcommand)]
  pub subcommand: SubCommand,

  /// Dump internal translator state
  #[arg(long, value_enum, action = clap::ArgAction::Append, global = true)]
  pub dump: Vec<DumpKindCli>,

  /// Write dumps to this directory (otherwise stdout)
  #[arg(long, global = true)]
  pub dump_dir: Option<String>,

  /// Enable internal debug mode
  #[arg(long, default_value = "false", global = true)]
  pub debug: bool,

  /// Enable debug tracing for subsystems
  #[arg(long, value_enum, action = clap::ArgAction::Append, global = true)]
  pub debug_trace: Vec<DebugTraceCli>,

  /// Don't print any output
  #[arg(long, short = 'q', default_value = "false", global = true)]
  pub quiet: bool,

  /// Use verbose output
  #[arg(long, short, action = clap::ArgAction::Count, global = true)]
  pub verbose: u8,
}
