mod cli;

use std::sync::Arc;

use clap::Parser as ClapParser;
use colored::*;
use ilc_config::{CHeader, IlcBuildConfig, IlcConfig, IlcProjectConfig};
use ilc_driver::{check_file, compile_file};

use cli::{Cli, SubCommand};

fn load_project_config() -> Option<IlcProjectConfig> {
  let dir = match std::env::current_dir() {
    Ok(dir) => dir,
    Err(_) => return None,
  };

  match IlcProjectConfig::load_from_dir(&dir) {
    Ok(config) => config,
    Err(e) => {
      eprintln!("{} Invalid ilc.toml: {}", "Error:".red().bold(), e);
      std::process::exit(1);
    },
  }
}

fn parse_header(include: &str) -> CHeader {
  match include.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
    Some(path) => CHeader::system(path),
    None => CHeader::quoted(include),
  }
}

fn resolve_input(
  input: &Option<String>,
  project: &Option<IlcProjectConfig>,
) -> String {
  if let Some(input) = input {
    return input.clone();
  }

  if let Some(project) = project {
    return project.build.input.clone();
  }

  eprintln!("{} No input given and no ilc.toml in the current directory.", "Error:".red().bold());
  eprintln!("For more information, run `ilc --help`");
  std::process::exit(1);
}

fn parse_cli_to_config(cli: &Cli) -> Arc<IlcConfig> {
  let mut config = IlcConfig::new_basic(
    cli.debug,
    cli.debug_trace.iter().copied().map(Into::into).collect(),
    cli.quiet,
    cli.verbose,
  );

  let project = load_project_config();
  if let Some(project) = &project {
    config.units = project.units;
  }

  let dump = cli.dump.iter().copied().map(Into::into).collect();

  match &cli.subcommand {
    SubCommand::Build(build) => {
      let input = resolve_input(&build.input, &project);
      let output_dir = build
        .output_dir
        .clone()
        .or_else(|| project.as_ref().map(|p| p.build.output_dir.clone()))
        .unwrap_or_else(|| "build".to_string());

      if let Some(threshold) = build.decl_threshold {
        config.units.decl_threshold = threshold;
      }
      if let Some(threshold) = build.impl_threshold {
        config.units.impl_threshold = threshold;
      }
      config.headers = build.includes.iter().map(|i| parse_header(i)).collect();

      config.build_config = Some(IlcBuildConfig::new(
        Some(input),
        build.entries.clone(),
        output_dir,
        dump,
        cli.dump_dir.clone(),
        false,
      ));
    },
    SubCommand::Check(check) => {
      let input = resolve_input(&check.input, &project);
      config.build_config = Some(IlcBuildConfig::new(
        Some(input),
        check.entries.clone(),
        String::new(),
        dump,
        cli.dump_dir.clone(),
        true,
      ));
    },
  }

  config.project_config = project;
  Arc::new(config)
}

fn main() {
  let cli = Cli::parse();

  let config = parse_cli_to_config(&cli);
  let Some(build_config) = config.build_config.clone() else {
    return;
  };
  let input = build_config.input.unwrap_or_default();

  let result = if build_config.check_mode {
    check_file(config, &input)
  } else {
    compile_file(config, &input)
  };

  if result.is_err() {
    std::process::exit(1);
  }
}
