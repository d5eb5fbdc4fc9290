//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and sets up logging
//! - loads templates and targets
//! - runs the redshift fit
//! - prints reports and writes result files

use clap::Parser;

use crate::cli::{Cli, Command, InspectArgs, RunArgs, SimulateArgs, TemplatesArgs};
use crate::domain::ZfindConfig;
use crate::error::ZfindError;
use crate::templates::TemplateLocator;

pub mod pipeline;

use pipeline::RunConfig;

/// Entry point for the `rrz` binary.
pub fn run() -> Result<(), ZfindError> {
    let cli = Cli::parse();
    crate::logging::init_logging(cli.verbosity());

    match cli.command {
        Command::Run(args) => handle_run(args),
        Command::Templates(args) => handle_templates(args),
        Command::Inspect(args) => handle_inspect(args),
        Command::Simulate(args) => handle_simulate(args),
    }
}

fn handle_run(args: RunArgs) -> Result<(), ZfindError> {
    let config = run_config_from_args(&args, TemplateLocator::from_env());
    let run = pipeline::run_zfind(&config)?;

    println!("{}", crate::report::format_candidates(&run.output.candidates));
    println!("{}", crate::report::format_zbest(&run.zbest));
    Ok(())
}

fn handle_templates(args: TemplatesArgs) -> Result<(), ZfindError> {
    let locator = TemplateLocator::from_env().or_explicit(args.template_dir);
    let listing = pipeline::list_templates(&locator)?;
    println!("{}", crate::report::format_templates(&listing));
    Ok(())
}

fn handle_inspect(args: InspectArgs) -> Result<(), ZfindError> {
    let (summary, scans) = crate::io::read_zscan(&args.file)?;
    match args.target {
        Some(id) => {
            let per_template = scans.target(id).ok_or_else(|| {
                ZfindError::NotFound(format!("target {id} not in '{}'", args.file.display()))
            })?;
            println!("{}", crate::report::format_target_scans(id, per_template));
        }
        None => println!("{}", crate::report::format_zbest(&summary)),
    }
    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<(), ZfindError> {
    let locator = TemplateLocator::from_env().or_explicit(args.template_dir.clone());
    let templates = crate::templates::load_many(None, &locator)?;
    let sim = crate::data::simulate_targets(&templates, args.count, args.seed, args.snr)?;
    crate::io::write_targets_json(&args.output, &sim.targets)?;
    println!("{}", crate::report::format_truth(&sim.truth));
    Ok(())
}

/// Resolve run settings from CLI arguments on top of a template locator.
pub fn run_config_from_args(args: &RunArgs, locator: TemplateLocator) -> RunConfig {
    RunConfig {
        targets: args.targets.clone(),
        templates: (!args.templates.is_empty()).then(|| args.templates.clone()),
        locator: locator.or_explicit(args.template_dir.clone()),
        zfind: ZfindConfig {
            ncpu: args.ncpu,
            nminima: args.nminima,
        },
        output: args.output.clone(),
        overwrite: args.overwrite,
        export_candidates: args.export_candidates.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn run_config_prefers_explicit_template_dir() {
        let cli = Cli::parse_from([
            "rrz",
            "run",
            "--targets",
            "t.json",
            "--template-dir",
            "/data/templates",
            "--nminima",
            "5",
            "-o",
            "out.rrz",
        ]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        let config = run_config_from_args(&args, TemplateLocator::with_dir("/elsewhere"));
        assert_eq!(config.locator.resolve_dir().unwrap(), PathBuf::from("/data/templates"));
        assert_eq!(config.templates, None);
        assert_eq!(config.zfind.nminima, 5);
        assert_eq!(config.zfind.ncpu, None);
    }
}
