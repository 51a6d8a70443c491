//! Validator union.
//!
//! Runs the graph builder and every registered validator against one project
//! root, merges their violations and applies one global sort.
//!
//! - **Read-only**: no validator writes to the tree.
//! - **Deterministic**: same tree and contract, byte-identical report.
//! - **Independent**: validators share no mutable state, so they run in parallel.

use crate::core::contract::ArchitectureContract;
use crate::core::error::ArchgateError;
use crate::core::failure::{CheckDetails, CheckResult, CheckStatus};
use crate::core::graph::{self, GraphSummary};
use crate::core::violation::{self, Violation};
use crate::subsystems;
use rayon::prelude::*;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Instant;

/// One independently scoped scan over a project root.
pub trait Validator: Send + Sync {
    fn id(&self) -> &'static str;

    fn scan(
        &self,
        project_root: &Path,
        contract: &ArchitectureContract,
    ) -> Result<Vec<Violation>, ArchgateError>;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub ok: bool,
    pub blocking_count: usize,
    pub warning_count: usize,
    pub contract_version: String,
    pub graph: GraphSummary,
    pub cycles: Vec<Vec<String>>,
    pub violations: Vec<Violation>,
    /// SHA-256 over the serialized sorted violations.
    pub fingerprint: String,
}

impl ValidationReport {
    /// The report as the `architecture` check consumed by the failure classifier.
    pub fn as_check_result(&self) -> CheckResult {
        CheckResult {
            id: "architecture".to_string(),
            status: if self.ok {
                CheckStatus::Pass
            } else {
                CheckStatus::Fail
            },
            message: Some(self.summary_line()),
            details: Some(CheckDetails {
                violations: self.violations.clone(),
                blocking_count: Some(self.blocking_count),
                ..CheckDetails::default()
            }),
        }
    }

    pub fn summary_line(&self) -> String {
        if self.ok {
            format!(
                "architecture validation passed ({} warning(s))",
                self.warning_count
            )
        } else {
            format!(
                "architecture validation failed: {} blocking, {} warning(s)",
                self.blocking_count, self.warning_count
            )
        }
    }
}

fn fingerprint(violations: &[Violation]) -> Result<String, ArchgateError> {
    let bytes = serde_json::to_vec(violations)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

fn trace_enabled() -> bool {
    std::env::var("ARCHGATE_VALIDATE_TRACE").ok().as_deref() == Some("1")
}

/// Run `validators` alone (no graph) and return their merged, sorted output.
pub fn run_validators(
    project_root: &Path,
    contract: &ArchitectureContract,
    validators: &[&dyn Validator],
) -> Result<Vec<Violation>, ArchgateError> {
    let trace = trace_enabled();
    let outputs: Vec<Result<Vec<Violation>, ArchgateError>> = validators
        .par_iter()
        .map(|v| {
            let started = Instant::now();
            let out = v.scan(project_root, contract);
            if trace {
                tracing::info!(
                    validator = v.id(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    violations = out.as_ref().map(|o| o.len()).unwrap_or(0),
                    "validator finished"
                );
            }
            out
        })
        .collect();

    let mut merged = Vec::new();
    for out in outputs {
        merged.extend(out?);
    }
    violation::sort_violations(&mut merged);
    Ok(merged)
}

/// Full validation pass: graph builder plus every registered validator.
pub fn validate_project(
    project_root: &Path,
    contract: &ArchitectureContract,
) -> Result<ValidationReport, ArchgateError> {
    let graph = graph::build_graph(project_root, contract)?;
    let registered = subsystems::validators();

    let mut violations = run_validators(project_root, contract, &registered)?;
    violations.extend(graph.violations.iter().cloned());
    violation::sort_violations(&mut violations);

    let blocking_count = violation::blocking_count(&violations);
    let warning_count = violation::warning_count(&violations);
    let report = ValidationReport {
        ok: blocking_count == 0,
        blocking_count,
        warning_count,
        contract_version: contract.version.clone(),
        graph: graph.summary(),
        cycles: graph.cycles.clone(),
        fingerprint: fingerprint(&violations)?,
        violations,
    };

    if report.ok {
        tracing::info!(warnings = warning_count, "architecture validation passed");
    } else {
        tracing::warn!(
            blocking = blocking_count,
            warnings = warning_count,
            "architecture validation failed"
        );
    }
    Ok(report)
}
