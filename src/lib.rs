//! archgate: architecture graph and correction governance.
//!
//! **archgate decides whether a codebase conforms to its layer contract, turns
//! raw tool failures into typed diagnosis, and bounds what a repair agent may
//! change.** It never edits the tree and never runs the code it inspects.
//!
//! # Core Principles
//!
//! - **Read-only**: validation walks and reads the tree, nothing else
//! - **Deterministic**: same tree and contract, byte-identical report
//! - **Explicit contract**: the architecture contract is a value passed to every call
//! - **Closed vocabulary**: every rule id is a constant; adding one is a contract change
//!
//! # Pipeline
//!
//! source tree → graph → merged violations → check results → failure clusters
//! → correction intent → constraint → compliance verdict
//!
//! # Examples
//!
//! ```bash
//! # Validate the project in the current directory
//! archgate validate
//!
//! # Classify a set of check results
//! archgate classify --checks checks.json
//!
//! # Edit budget for a boot failure
//! archgate constraint --intent runtime_boot
//!
//! # Verify a finished correction step
//! archgate verify-correction --step step.json
//! ```
//!
//! # Crate Structure
//!
//! - [`core`]: contract, classifier, resolver, graph, union, failure and correction engines
//! - [`plugins`]: validators joined by the union (structure, ast, security, test contract)

pub mod core;
pub mod plugins;
pub mod subsystems;

mod cli;

use crate::cli::{Cli, Command, OutputFormat, ProjectArgs};
use crate::core::{
    contract::{self, ArchitectureContract},
    correction::{self, CorrectionCaps, CorrectionIntent, CorrectionStepEvaluation},
    error::ArchgateError,
    failure::{self, CheckResult},
    graph, output,
    validate::{self, ValidationReport},
};

use clap::Parser;
use colored::Colorize;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Longest violation message shown per line in text output.
const TEXT_MESSAGE_CHARS: usize = 160;

fn project_root(args: &ProjectArgs) -> Result<PathBuf, ArchgateError> {
    match &args.root {
        Some(root) if !root.is_dir() => Err(ArchgateError::NotFound(format!(
            "project root {}",
            root.display()
        ))),
        Some(root) => Ok(root.clone()),
        None => Ok(std::env::current_dir()?),
    }
}

fn load_project(args: &ProjectArgs) -> Result<(PathBuf, ArchitectureContract), ArchgateError> {
    let root = project_root(args)?;
    let contract = contract::load_contract(&root, args.contract.as_deref())?;
    Ok((root, contract))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ArchgateError> {
    if !path.is_file() {
        return Err(ArchgateError::NotFound(format!("{}", path.display())));
    }
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), ArchgateError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_validation_text(report: &ValidationReport) {
    let headline = report.summary_line();
    if report.ok {
        println!("{} {}", "✓".bright_green(), headline.bright_white());
    } else {
        println!("{} {}", "✗".bright_red(), headline.bright_white());
    }
    println!(
        "  {} nodes, {} edges, {} cycle(s)",
        report.graph.nodes, report.graph.edges, report.graph.cycles
    );
    for v in &report.violations {
        let severity = if v.severity.is_blocking() {
            v.severity.to_string().bright_red()
        } else {
            v.severity.to_string().bright_yellow()
        };
        let location = match &v.target {
            Some(target) => format!("{} -> {}", v.file, target),
            None => v.file.clone(),
        };
        println!(
            "  {} {} {}: {}",
            severity,
            v.rule_id.bright_white(),
            location,
            output::compact_line(&v.message, TEXT_MESSAGE_CHARS)
        );
    }
}

fn print_profile_text(profile: &failure::FailureClassificationProfile, checks: &[CheckResult]) {
    let reason = profile
        .reason
        .map(|r| format!("{:?}", r).to_lowercase())
        .unwrap_or_else(|| "none".to_string());
    println!(
        "{} reason={} autoCorrect={} collapse={} blocking={}",
        "▸".bright_yellow(),
        reason,
        profile.should_auto_correct,
        profile.architecture_collapse,
        profile.blocking_count
    );
    for cluster in &profile.clusters {
        println!("  {} {}", "●".bright_green(), cluster.describe());
    }
    let failed: Vec<String> = checks
        .iter()
        .filter(|c| c.failed())
        .map(|c| format!("{}: {}", c.id, c.raw_output()))
        .collect();
    if !failed.is_empty() {
        println!("  failed: {}", output::preview_messages(&failed, 3, 120));
    }
}

/// Parse the command line and dispatch. The returned exit code is non-zero
/// when validation finds blocking violations or a correction step fails policy.
pub fn run() -> Result<ExitCode, ArchgateError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Validate(validate_cli) => {
            let (root, contract) = load_project(&validate_cli.project)?;
            let report = validate::validate_project(&root, &contract)?;
            match validate_cli.format {
                OutputFormat::Json => print_json(&report)?,
                OutputFormat::Text => print_validation_text(&report),
            }
            if report.ok {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(1))
            }
        }
        Command::Graph(project) => {
            let (root, contract) = load_project(&project)?;
            let graph = graph::build_graph(&root, &contract)?;
            print_json(&graph.to_json())?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Classify(classify_cli) => {
            let contract = match (&classify_cli.project.root, &classify_cli.project.contract) {
                (None, None) => ArchitectureContract::default(),
                _ => load_project(&classify_cli.project)?.1,
            };
            let checks: Vec<CheckResult> = read_json(&classify_cli.checks)?;
            let profile = failure::classify_failures(&checks, &contract);
            match classify_cli.format {
                OutputFormat::Json => print_json(&profile)?,
                OutputFormat::Text => print_profile_text(&profile, &checks),
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Constraint(constraint_cli) => {
            let env_caps = CorrectionCaps::from_env();
            let caps = CorrectionCaps {
                max_files_per_step: constraint_cli
                    .max_files
                    .unwrap_or(env_caps.max_files_per_step),
                max_total_diff_bytes: constraint_cli
                    .max_diff_bytes
                    .unwrap_or(env_caps.max_total_diff_bytes),
            };
            let intent = CorrectionIntent::parse(&constraint_cli.intent);
            print_json(&correction::derive_constraint(intent, &caps))?;
            Ok(ExitCode::SUCCESS)
        }
        Command::VerifyCorrection(verify_cli) => {
            let step: CorrectionStepEvaluation = read_json(&verify_cli.step)?;
            let result = correction::evaluate_correction_step(&step);
            match verify_cli.format {
                OutputFormat::Json => print_json(&result)?,
                OutputFormat::Text => {
                    let mark = if result.ok {
                        "✓".bright_green()
                    } else {
                        "✗".bright_red()
                    };
                    println!("{} {}", mark, result.summary);
                    for v in &result.violations {
                        println!("  {:?} {}: {}", v.severity, v.rule_id, v.message);
                    }
                }
            }
            if result.ok {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(1))
            }
        }
        Command::Validators => {
            for id in subsystems::validator_ids() {
                println!("{}", id);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
