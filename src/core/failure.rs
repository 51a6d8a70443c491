//! Failure classifier.
//!
//! Turns a set of named check results into an ordered list of typed failure
//! clusters plus an auto-correction verdict for the correction planner.
//!
//! Output is a pure function of the input: identical check results always
//! produce a structurally identical profile, array order included.

use crate::core::contract::ArchitectureContract;
use crate::core::layers::classify_path;
use crate::core::signals;
use crate::core::violation::{Severity, Violation, rules};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Distinct structural signal types needed before the architecture is
/// treated as collapsed. Policy constant: changing it needs product sign-off.
pub const ARCHITECTURE_COLLAPSE_MIN_SIGNALS: usize = 2;

pub const CHECK_ARCHITECTURE: &str = "architecture";
pub const CHECK_TYPECHECK: &str = "typecheck";
pub const CHECK_BUILD: &str = "build";
pub const CHECK_TESTS: &str = "tests";
pub const CHECK_BOOT: &str = "boot";

const RECOGNIZED_CHECKS: &[&str] = &[
    CHECK_ARCHITECTURE,
    CHECK_TYPECHECK,
    CHECK_BUILD,
    CHECK_TESTS,
    CHECK_BOOT,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Fail,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckDetails {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<Violation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocking_count: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub id: String,
    pub status: CheckStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<CheckDetails>,
}

impl CheckResult {
    pub fn failed(&self) -> bool {
        self.status == CheckStatus::Fail
    }

    /// `message`, `stderr` and `logs` joined, for text-signal scraping.
    pub fn raw_output(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(m) = self.message.as_deref() {
            parts.push(m);
        }
        if let Some(d) = &self.details {
            parts.extend(d.stderr.as_deref());
            parts.extend(d.logs.as_deref());
        }
        parts.join("\n")
    }

    pub fn violations(&self) -> &[Violation] {
        self.details
            .as_ref()
            .map(|d| d.violations.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerEdge {
    pub file: String,
    pub source_layer: String,
    pub target_layer: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum FailureCluster {
    ArchitectureContract {
        modules: Vec<String>,
        missing_layers: Vec<String>,
        unknown_layer_files: Vec<String>,
    },
    LayerBoundaryViolation {
        files: Vec<String>,
        edges: Vec<LayerEdge>,
    },
    ImportResolutionError {
        files: Vec<String>,
        imports: Vec<String>,
    },
    DependencyCycle {
        cycles: Vec<String>,
    },
    RuntimeMiddlewareApi {
        message: String,
    },
    TestContractGap {
        modules: Vec<String>,
    },
    TypecheckFailure,
    BuildFailure,
    TestFailure,
}

impl FailureCluster {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ArchitectureContract { .. } => "architecture_contract",
            Self::LayerBoundaryViolation { .. } => "layer_boundary_violation",
            Self::ImportResolutionError { .. } => "import_resolution_error",
            Self::DependencyCycle { .. } => "dependency_cycle",
            Self::RuntimeMiddlewareApi { .. } => "runtime_middleware_api",
            Self::TestContractGap { .. } => "test_contract_gap",
            Self::TypecheckFailure => "typecheck_failure",
            Self::BuildFailure => "build_failure",
            Self::TestFailure => "test_failure",
        }
    }

    /// One-line human summary for planner prompts and CLI output.
    pub fn describe(&self) -> String {
        match self {
            Self::ArchitectureContract {
                modules,
                missing_layers,
                unknown_layer_files,
            } => format!(
                "architecture contract: modules [{}], missing layers [{}], {} file(s) in unknown layers",
                modules.join(", "),
                missing_layers.join(", "),
                unknown_layer_files.len()
            ),
            Self::LayerBoundaryViolation { files, edges } => format!(
                "layer boundary: {} edge(s) across {} file(s)",
                edges.len(),
                files.len()
            ),
            Self::ImportResolutionError { files, imports } => format!(
                "import resolution: [{}] from {} file(s)",
                imports.join(", "),
                files.len()
            ),
            Self::DependencyCycle { cycles } => format!("dependency cycles: {}", cycles.len()),
            Self::RuntimeMiddlewareApi { message } => format!("runtime middleware api: {}", message),
            Self::TestContractGap { modules } => {
                format!("test contract gap: [{}]", modules.join(", "))
            }
            Self::TypecheckFailure | Self::BuildFailure | Self::TestFailure => {
                self.kind().replace('_', " ")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureReason {
    Architecture,
    Typecheck,
    Build,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureClassificationProfile {
    pub should_auto_correct: bool,
    pub clusters: Vec<FailureCluster>,
    pub architecture_collapse: bool,
    pub reason: Option<FailureReason>,
    pub blocking_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture_modules: Option<Vec<String>>,
}

impl FailureClassificationProfile {
    pub fn zero() -> Self {
        Self {
            should_auto_correct: false,
            clusters: Vec::new(),
            architecture_collapse: false,
            reason: None,
            blocking_count: 0,
            architecture_modules: None,
        }
    }
}

fn last_segment(path: &str) -> String {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
        .to_string()
}

fn dedup_in_order(items: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    items
        .into_iter()
        .filter(|i| seen.insert(i.clone()))
        .collect()
}

#[derive(Default)]
struct ArchitectureEvidence {
    modules: BTreeSet<String>,
    missing_layers: BTreeSet<String>,
    unknown_layer_files: BTreeSet<String>,
    structural_signals: BTreeSet<String>,
}

impl ArchitectureEvidence {
    fn collect(violations: &[Violation], contract: &ArchitectureContract) -> Self {
        let mut ev = Self::default();
        for v in violations {
            if v.rule_id.starts_with(rules::MISSING_LAYER_FAMILY) {
                let layer = v.target_or_empty().to_string();
                ev.modules.insert(last_segment(&v.file));
                ev.structural_signals.insert(format!("missing_layer:{layer}"));
                if !layer.is_empty() {
                    ev.missing_layers.insert(layer);
                }
            } else if v.rule_id.starts_with(rules::UNKNOWN_LAYER_FAMILY) {
                if let Some(module) = classify_path(&v.file, contract).module() {
                    ev.modules.insert(module.to_string());
                }
                ev.unknown_layer_files.insert(v.file.clone());
                ev.structural_signals.insert(v.rule_id.clone());
            }
        }
        ev
    }

    fn is_empty(&self) -> bool {
        self.structural_signals.is_empty()
    }

    fn collapsed(&self) -> bool {
        self.structural_signals.len() >= ARCHITECTURE_COLLAPSE_MIN_SIGNALS
    }
}

fn layer_boundary_cluster(
    violations: &[Violation],
    contract: &ArchitectureContract,
) -> Option<FailureCluster> {
    let matrix: Vec<&Violation> = violations
        .iter()
        .filter(|v| v.rule_id == rules::ARCH_LAYER_MATRIX)
        .collect();
    if matrix.is_empty() {
        return None;
    }
    let files: BTreeSet<String> = matrix.iter().map(|v| v.file.clone()).collect();
    let edges = matrix
        .iter()
        .map(|v| {
            let layer_of = |path: &str| {
                classify_path(path, contract)
                    .layer()
                    .unwrap_or("unknown")
                    .to_string()
            };
            LayerEdge {
                file: v.file.clone(),
                source_layer: layer_of(&v.file),
                target_layer: layer_of(v.target_or_empty()),
                target: v.target_or_empty().to_string(),
            }
        })
        .collect();
    Some(FailureCluster::LayerBoundaryViolation {
        files: files.into_iter().collect(),
        edges,
    })
}

fn import_resolution_cluster(
    violations: &[Violation],
    raw_outputs: &[String],
) -> Option<FailureCluster> {
    let mut files = BTreeSet::new();
    let mut imports = BTreeSet::new();
    for v in violations
        .iter()
        .filter(|v| v.rule_id == rules::IMPORT_MISSING_TARGET)
    {
        files.insert(v.file.clone());
        if let Some(target) = &v.target {
            imports.insert(target.clone());
        }
    }
    for raw in raw_outputs {
        for hit in signals::module_not_found(raw) {
            if let Some(file) = hit.file {
                files.insert(file);
            }
            imports.insert(hit.import);
        }
    }
    if files.is_empty() && imports.is_empty() {
        return None;
    }
    Some(FailureCluster::ImportResolutionError {
        files: files.into_iter().collect(),
        imports: imports.into_iter().collect(),
    })
}

fn cycle_cluster(violations: &[Violation]) -> Option<FailureCluster> {
    let cycles: Vec<String> = violations
        .iter()
        .filter(|v| v.rule_id == rules::GRAPH_CYCLE)
        .map(|v| match &v.target {
            Some(rendered) => rendered.clone(),
            None => v
                .message
                .strip_prefix("Dependency cycle detected: ")
                .unwrap_or(&v.message)
                .to_string(),
        })
        .collect();
    if cycles.is_empty() {
        return None;
    }
    Some(FailureCluster::DependencyCycle {
        cycles: dedup_in_order(cycles),
    })
}

fn test_contract_cluster(violations: &[Violation]) -> Option<FailureCluster> {
    let modules: BTreeSet<String> = violations
        .iter()
        .filter(|v| v.rule_id.starts_with(rules::TEST_CONTRACT_FAMILY))
        .map(|v| {
            v.target
                .clone()
                .unwrap_or_else(|| last_segment(&v.file))
        })
        .collect();
    if modules.is_empty() {
        return None;
    }
    Some(FailureCluster::TestContractGap {
        modules: modules.into_iter().collect(),
    })
}

fn architecture_blocking(check: &CheckResult) -> usize {
    if let Some(count) = check.details.as_ref().and_then(|d| d.blocking_count) {
        return count.max(1);
    }
    let errors = check
        .violations()
        .iter()
        .filter(|v| v.severity == Severity::Error)
        .count();
    errors.max(1)
}

/// Classify `checks` into the profile consumed by the correction planner.
pub fn classify_failures(
    checks: &[CheckResult],
    contract: &ArchitectureContract,
) -> FailureClassificationProfile {
    let failed = |id: &str| checks.iter().find(|c| c.id == id && c.failed());
    let any_recognized_failure = checks
        .iter()
        .any(|c| c.failed() && RECOGNIZED_CHECKS.contains(&c.id.as_str()));
    if !any_recognized_failure {
        return FailureClassificationProfile::zero();
    }

    let architecture = failed(CHECK_ARCHITECTURE);
    let typecheck = failed(CHECK_TYPECHECK);
    let build = failed(CHECK_BUILD);
    let tests = failed(CHECK_TESTS);
    let boot = failed(CHECK_BOOT);

    let blocking_count = architecture.map(architecture_blocking).unwrap_or(0)
        + [typecheck, build, tests, boot]
            .iter()
            .filter(|c| c.is_some())
            .count();

    let reason = if architecture.is_some() {
        Some(FailureReason::Architecture)
    } else if typecheck.is_some() {
        Some(FailureReason::Typecheck)
    } else if build.is_some() {
        Some(FailureReason::Build)
    } else {
        None
    };

    let Some(reason) = reason else {
        tracing::debug!(
            blocking = blocking_count,
            "no auto-correctable failure reason"
        );
        return FailureClassificationProfile {
            blocking_count,
            ..FailureClassificationProfile::zero()
        };
    };

    let violations: &[Violation] = architecture.map(|c| c.violations()).unwrap_or(&[]);
    let raw_outputs: Vec<String> = [build, tests, boot]
        .iter()
        .flatten()
        .map(|c| c.raw_output())
        .collect();
    let runtime_outputs: Vec<String> = [tests, boot]
        .iter()
        .flatten()
        .map(|c| c.raw_output())
        .collect();

    let mut clusters = Vec::new();
    let evidence = ArchitectureEvidence::collect(violations, contract);
    let architecture_collapse = evidence.collapsed();
    let mut architecture_modules = None;
    if !evidence.is_empty() {
        let modules: Vec<String> = evidence.modules.into_iter().collect();
        architecture_modules = Some(modules.clone());
        clusters.push(FailureCluster::ArchitectureContract {
            modules,
            missing_layers: evidence.missing_layers.into_iter().collect(),
            unknown_layer_files: evidence.unknown_layer_files.into_iter().collect(),
        });
    }
    clusters.extend(layer_boundary_cluster(violations, contract));
    clusters.extend(import_resolution_cluster(violations, &raw_outputs));
    clusters.extend(cycle_cluster(violations));
    if let Some(message) = runtime_outputs
        .iter()
        .find_map(|raw| signals::middleware_api_error(raw))
    {
        clusters.push(FailureCluster::RuntimeMiddlewareApi { message });
    }
    clusters.extend(test_contract_cluster(violations));
    if typecheck.is_some() {
        clusters.push(FailureCluster::TypecheckFailure);
    }
    if build.is_some() {
        clusters.push(FailureCluster::BuildFailure);
    }
    if tests.is_some() {
        clusters.push(FailureCluster::TestFailure);
    }

    tracing::debug!(
        reason = ?reason,
        clusters = clusters.len(),
        collapse = architecture_collapse,
        blocking = blocking_count,
        "classified check failures"
    );

    FailureClassificationProfile {
        should_auto_correct: true,
        clusters,
        architecture_collapse,
        reason: Some(reason),
        blocking_count,
        architecture_modules,
    }
}
