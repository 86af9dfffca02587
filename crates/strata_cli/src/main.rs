//! Strata CLI: the command-line front end of the plane-assignment optimizer.
//!
//! Provides `strata optimize` to reorder plane slots and write new packing and
//! placement records, `strata spread` to report the current cost of a design,
//! and `strata check` to validate that the records agree with each other.

#![warn(missing_docs)]

mod check;
mod optimize;
mod pipeline;
mod spread;

use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand, ValueEnum};
use strata_diagnostics::diagnostic::FATAL;
use strata_diagnostics::{Diagnostic, DiagnosticRenderer, Locus, TerminalRenderer};
use strata_planes::PlaneError;

/// Strata: plane-assignment optimizer for stacked FPGA logic sites.
#[derive(Parser, Debug)]
#[command(name = "strata", version, about = "Strata plane-assignment optimizer")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Show diagnostic notes and per-net detail.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Control colored output.
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Path to a `strata.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Optimize plane assignment and write rewritten records.
    Optimize(OptimizeArgs),
    /// Report the plane spread of a design without changing it.
    Spread(DesignArgs),
    /// Validate packing, placement, and nets against each other.
    Check(DesignArgs),
}

/// Input records shared by every subcommand.
#[derive(Args, Debug)]
pub struct DesignArgs {
    /// Packing record (JSON).
    #[arg(long)]
    pub packing: PathBuf,

    /// Placement record (JSON).
    #[arg(long)]
    pub placement: PathBuf,

    /// Net table (JSON).
    #[arg(long)]
    pub nets: PathBuf,

    /// External Steiner program and its arguments, whitespace-separated.
    #[arg(long = "steiner-cmd")]
    pub steiner_cmd: Option<String>,

    /// Plane slots per logic site, overriding `planes.max_plane`.
    #[arg(long = "max-plane")]
    pub max_plane: Option<u8>,

    /// Output format for diagnostics and reports.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Arguments for the `strata optimize` subcommand.
#[derive(Args, Debug)]
pub struct OptimizeArgs {
    /// Input records.
    #[command(flatten)]
    pub design: DesignArgs,

    /// Refinement passes in order (e.g. `--passes partition,relaxation`).
    #[arg(long, value_delimiter = ',')]
    pub passes: Option<Vec<String>>,

    /// Skip refinement and only realize the loaded assignment.
    #[arg(long, conflicts_with = "passes")]
    pub no_refine: bool,

    /// Where to write the rewritten packing record.
    #[arg(long)]
    pub out_packing: PathBuf,

    /// Where to write the rewritten placement record.
    #[arg(long)]
    pub out_placement: PathBuf,
}

/// Controls whether colored output is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Detect from terminal capabilities.
    Auto,
    /// Always produce colored output.
    Always,
    /// Never produce colored output.
    Never,
}

/// Diagnostic output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print notes and per-net detail.
    pub verbose: bool,
    /// Whether to use colored output.
    pub color: bool,
    /// Optional path to a configuration file.
    pub config: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    let color = match cli.color {
        ColorChoice::Auto => {
            std::env::var_os("NO_COLOR").is_none() && std::env::var_os("TERM").is_some()
        }
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        color,
        config: cli.config,
    };

    let result = match cli.command {
        Command::Optimize(ref args) => optimize::run(args, &global),
        Command::Spread(ref args) => spread::run(args, &global),
        Command::Check(ref args) => check::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            let renderer = TerminalRenderer::new(global.color);
            eprint!("{}", renderer.render(&fatal(e.as_ref())));
            process::exit(1);
        }
    }
}

/// Wraps a command failure as a fatal diagnostic, keeping the optimizer's locus.
fn fatal(error: &(dyn std::error::Error + 'static)) -> Diagnostic {
    let locus = error
        .downcast_ref::<PlaneError>()
        .map(PlaneError::locus)
        .unwrap_or(Locus::Design);
    Diagnostic::error(FATAL, error.to_string(), locus)
}
