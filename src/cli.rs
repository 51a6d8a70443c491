//! CLI struct definitions for the archgate command-line interface.
//!
//! All clap-derived types live here. Dispatch logic lives in `lib.rs`.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "archgate",
    version = env!("CARGO_PKG_VERSION"),
    about = "Architecture graph and correction governance: validate a project against its layer contract, classify check failures, and police correction budgets."
)]
pub(crate) struct Cli {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

#[derive(clap::Args, Debug)]
pub(crate) struct ProjectArgs {
    /// Project root (defaults to the current working directory).
    #[clap(long)]
    pub root: Option<PathBuf>,
    /// Contract file (TOML or JSON). Defaults to `.archgate/contract.toml`, then the built-in contract.
    #[clap(long)]
    pub contract: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub(crate) struct ValidateCli {
    #[clap(flatten)]
    pub project: ProjectArgs,
    /// Output format.
    #[clap(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(clap::Args, Debug)]
pub(crate) struct ClassifyCli {
    /// JSON file holding an array of check results.
    #[clap(long)]
    pub checks: PathBuf,
    #[clap(flatten)]
    pub project: ProjectArgs,
    /// Output format.
    #[clap(long, value_enum, default_value = "json")]
    pub format: OutputFormat,
}

#[derive(clap::Args, Debug)]
pub(crate) struct ConstraintCli {
    /// Correction intent (unrecognized names resolve to `unknown`).
    #[clap(long)]
    pub intent: String,
    /// Global cap on files per step (overrides ARCHGATE_MAX_FILES_PER_STEP).
    #[clap(long)]
    pub max_files: Option<usize>,
    /// Global cap on total diff bytes (overrides ARCHGATE_MAX_TOTAL_DIFF_BYTES).
    #[clap(long)]
    pub max_diff_bytes: Option<usize>,
}

#[derive(clap::Args, Debug)]
pub(crate) struct VerifyCorrectionCli {
    /// JSON file holding one correction step evaluation.
    #[clap(long)]
    pub step: PathBuf,
    /// Output format.
    #[clap(long, value_enum, default_value = "json")]
    pub format: OutputFormat,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Run the graph builder and every validator; exit 1 on blocking violations
    Validate(ValidateCli),
    /// Print the architecture graph as JSON
    Graph(ProjectArgs),
    /// Classify check results into typed failure clusters
    Classify(ClassifyCli),
    /// Derive the edit-budget constraint for a correction intent
    Constraint(ConstraintCli),
    /// Verify a correction step against its declared constraint; exit 1 when not ok
    VerifyCorrection(VerifyCorrectionCli),
    /// List registered validators
    Validators,
}
