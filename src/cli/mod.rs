//! Command-line parsing for the `rrz` redshift fitter.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! fitting and storage code; `app` turns these structs into run settings.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "rrz", version, about = "Template-based redshift fitting")]
pub struct Cli {
    /// More log output (repeatable).
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors.
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// `-q` = -1, default 0, each `-v` adds 1.
    pub fn verbosity(&self) -> i8 {
        if self.quiet {
            -1
        } else {
            i8::try_from(self.verbose).unwrap_or(i8::MAX)
        }
    }
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit targets against templates and write the scan results.
    Run(RunArgs),
    /// List the templates that would be used.
    Templates(TemplatesArgs),
    /// Print the summary (or one target's scans) of a result file.
    Inspect(InspectArgs),
    /// Generate synthetic targets from the templates.
    Simulate(SimulateArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct RunArgs {
    /// Targets JSON file.
    #[arg(long, value_name = "JSON")]
    pub targets: PathBuf,

    /// Template file or name (repeatable); defaults to every discovered template.
    #[arg(long = "template", value_name = "FILE")]
    pub templates: Vec<PathBuf>,

    /// Template directory (overrides $RR_TEMPLATE_DIR).
    #[arg(long, value_name = "DIR")]
    pub template_dir: Option<PathBuf>,

    /// Worker threads (default: half the available cores).
    #[arg(long)]
    pub ncpu: Option<usize>,

    /// Candidates kept per spectral type per target.
    #[arg(long, default_value_t = 3)]
    pub nminima: usize,

    /// Result file.
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: PathBuf,

    /// Replace the result file instead of updating it.
    #[arg(long)]
    pub overwrite: bool,

    /// Also write the ranked candidates to CSV.
    #[arg(long = "export-candidates", value_name = "CSV")]
    pub export_candidates: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct TemplatesArgs {
    /// Template directory (overrides $RR_TEMPLATE_DIR).
    #[arg(long, value_name = "DIR")]
    pub template_dir: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct InspectArgs {
    /// Result file written by `rrz run`.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Show the per-template scans of one target.
    #[arg(long, allow_negative_numbers = true)]
    pub target: Option<i64>,
}

#[derive(Debug, Parser, Clone)]
pub struct SimulateArgs {
    /// Targets JSON file to write.
    #[arg(short = 'o', long, value_name = "JSON")]
    pub output: PathBuf,

    /// Number of targets.
    #[arg(short = 'n', long, default_value_t = 10)]
    pub count: usize,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Median signal-to-noise per pixel.
    #[arg(long, default_value_t = 5.0)]
    pub snr: f64,

    /// Template directory (overrides $RR_TEMPLATE_DIR).
    #[arg(long, value_name = "DIR")]
    pub template_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_with_repeated_templates() {
        let cli = Cli::parse_from([
            "rrz",
            "-v",
            "run",
            "--targets",
            "t.json",
            "--template",
            "rrtemplate-galaxy.fits",
            "--template",
            "rrtemplate-star-K.fits",
            "--ncpu",
            "4",
            "-o",
            "out.rrz",
        ]);
        assert_eq!(cli.verbosity(), 1);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.templates.len(), 2);
        assert_eq!(args.ncpu, Some(4));
        assert_eq!(args.nminima, 3);
        assert!(!args.overwrite);
    }

    #[test]
    fn quiet_lowers_verbosity() {
        let cli = Cli::parse_from(["rrz", "inspect", "out.rrz", "-q", "--target", "-7"]);
        assert_eq!(cli.verbosity(), -1);
        let Command::Inspect(args) = cli.command else {
            panic!("expected inspect");
        };
        assert_eq!(args.target, Some(-7));
    }
}
