//! Per-module test contract: every module ships at least one test file, and
//! every test file declares at least one test case.

use crate::core::contract::ArchitectureContract;
use crate::core::error::ArchgateError;
use crate::core::graph;
use crate::core::validate::Validator;
use crate::core::violation::{Violation, rules};
use crate::plugins::structure;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Root-level directory that may hold per-module test folders.
const ROOT_TEST_DIR: &str = "tests";

static TEST_CASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:it|test)(?:\.(?:each|only|concurrent))?\s*\(").unwrap());

pub struct TestContractValidator;

pub fn declares_test_case(source: &str) -> bool {
    TEST_CASE.is_match(source)
}

fn test_files_in(dir: &Path) -> Result<Vec<PathBuf>, ArchgateError> {
    let mut files: Vec<PathBuf> = graph::collect_tree_files(dir)?
        .into_iter()
        .filter(|p| graph::is_code_file(p) && graph::is_test_file(p))
        .collect();
    files.sort();
    Ok(files)
}

impl Validator for TestContractValidator {
    fn id(&self) -> &'static str {
        "test_contract"
    }

    fn scan(
        &self,
        project_root: &Path,
        contract: &ArchitectureContract,
    ) -> Result<Vec<Violation>, ArchgateError> {
        let mut violations = Vec::new();
        for (module, dir) in structure::module_dirs(project_root, contract)? {
            let mut tests = test_files_in(&dir)?;
            tests.extend(test_files_in(&project_root.join(ROOT_TEST_DIR).join(&module))?);

            if tests.is_empty() {
                violations.push(
                    Violation::error(
                        rules::TEST_CONTRACT_MISSING,
                        structure::module_rel_path(contract, &module),
                        format!("Module '{}' has no test files", module),
                    )
                    .with_target(module.clone()),
                );
                continue;
            }

            for path in tests {
                let Some(source) = graph::read_source(&path)? else {
                    continue;
                };
                if !declares_test_case(&source) {
                    violations.push(
                        Violation::warning(
                            rules::TEST_CONTRACT_EMPTY,
                            graph::relative_path(project_root, &path),
                            format!("Test file for module '{}' declares no test cases", module),
                        )
                        .with_target(module.clone()),
                    );
                }
            }
        }
        Ok(violations)
    }
}
