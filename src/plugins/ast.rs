//! Pattern-based source rules.
//!
//! Line and import level heuristics over production files. They look at the
//! layer a file lives in and flag couplings the layer should not have.

use crate::core::contract::ArchitectureContract;
use crate::core::error::ArchgateError;
use crate::core::graph;
use crate::core::layers::classify_path;
use crate::core::resolve::{ImportKind, extract_imports};
use crate::core::validate::Validator;
use crate::core::violation::{Violation, rules};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

const HTTP_FRAMEWORKS: &[&str] = &["express", "fastify", "koa", "@nestjs/common", "hono"];
const HTTP_FREE_LAYERS: &[&str] = &["service", "repository"];

static HANDLER_ACCESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:req\.(?:body|params|query|headers)|res\.(?:status|json|send|redirect)\s*\()")
        .unwrap()
});
static CONSOLE_LOG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bconsole\.log\s*\(").unwrap());

pub struct AstPatternValidator;

/// True when `specifier` names `package` or a path inside it.
pub fn imports_package(specifier: &str, package: &str) -> bool {
    specifier == package
        || specifier
            .strip_prefix(package)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn persistence_violation(
    rel: &str,
    layer: &str,
    imports: &[String],
    contract: &ArchitectureContract,
) -> Option<Violation> {
    if !contract.persistence_free_layers.iter().any(|l| l == layer) {
        return None;
    }
    let hit = imports.iter().find(|spec| {
        ImportKind::of(spec) == ImportKind::NonRelative
            && contract
                .persistence_packages
                .iter()
                .any(|pkg| imports_package(spec, pkg))
    })?;
    Some(
        Violation::error(
            rules::AST_PERSISTENCE_IN_LAYER,
            rel.to_string(),
            format!(
                "Layer '{}' imports persistence package '{}'; data access belongs in the repository layer",
                layer, hit
            ),
        )
        .with_target(hit.clone()),
    )
}

fn http_violation(rel: &str, layer: &str, source: &str, imports: &[String]) -> Option<Violation> {
    if !HTTP_FREE_LAYERS.contains(&layer) {
        return None;
    }
    let evidence = imports
        .iter()
        .find(|spec| HTTP_FRAMEWORKS.iter().any(|fw| imports_package(spec, fw)))
        .cloned()
        .or_else(|| HANDLER_ACCESS.find(source).map(|m| m.as_str().to_string()))?;
    Some(
        Violation::warning(
            rules::AST_HTTP_IN_SERVICE,
            rel.to_string(),
            format!(
                "Layer '{}' is coupled to HTTP handling ({}); keep request/response types in controllers",
                layer, evidence
            ),
        )
        .with_target(evidence),
    )
}

fn console_violation(rel: &str, source: &str) -> Option<Violation> {
    let lines: Vec<usize> = source
        .lines()
        .enumerate()
        .filter(|(_, line)| CONSOLE_LOG.is_match(line))
        .map(|(i, _)| i + 1)
        .collect();
    let first = *lines.first()?;
    Some(Violation::warning(
        rules::AST_CONSOLE_LOG,
        rel.to_string(),
        format!(
            "console.log used {} time(s), first at line {}; use the project logger",
            lines.len(),
            first
        ),
    ))
}

impl Validator for AstPatternValidator {
    fn id(&self) -> &'static str {
        "ast"
    }

    fn scan(
        &self,
        project_root: &Path,
        contract: &ArchitectureContract,
    ) -> Result<Vec<Violation>, ArchgateError> {
        let mut violations = Vec::new();
        for (path, rel) in graph::production_files(project_root, contract)? {
            let Some(source) = graph::read_source(&path)? else {
                continue;
            };
            let imports = extract_imports(&source);
            let class = classify_path(&rel, contract);

            if let Some(layer) = class.layer() {
                violations.extend(persistence_violation(&rel, layer, &imports, contract));
                violations.extend(http_violation(&rel, layer, &source, &imports));
            }
            violations.extend(console_violation(&rel, &source));
        }
        Ok(violations)
    }
}
