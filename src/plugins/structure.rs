//! Structural layout validator: source root presence and the canonical
//! per-module layer directories.

use crate::core::contract::ArchitectureContract;
use crate::core::error::ArchgateError;
use crate::core::graph;
use crate::core::validate::Validator;
use crate::core::violation::{Violation, rules};
use std::fs;
use std::path::{Path, PathBuf};

pub struct StructureValidator;

/// Module directories under `<sourceRoot>/<moduleContainer>`, sorted by name.
pub fn module_dirs(
    project_root: &Path,
    contract: &ArchitectureContract,
) -> Result<Vec<(String, PathBuf)>, ArchgateError> {
    let container = project_root
        .join(&contract.source_root)
        .join(&contract.module_container);
    let entries = match fs::read_dir(&container) {
        Ok(entries) => entries,
        Err(e) if graph::is_skippable(&e) => {
            return Ok(Vec::new());
        }
        Err(e) => return Err(ArchgateError::IoError(e)),
    };

    let mut modules = Vec::new();
    for entry in entries {
        let entry = entry.map_err(ArchgateError::IoError)?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if path.is_dir() && !name.starts_with('.') {
            modules.push((name, path));
        }
    }
    modules.sort();
    Ok(modules)
}

pub fn module_rel_path(contract: &ArchitectureContract, module: &str) -> String {
    format!(
        "{}/{}/{}",
        contract.source_root, contract.module_container, module
    )
}

impl Validator for StructureValidator {
    fn id(&self) -> &'static str {
        "structure"
    }

    fn scan(
        &self,
        project_root: &Path,
        contract: &ArchitectureContract,
    ) -> Result<Vec<Violation>, ArchgateError> {
        let mut violations = Vec::new();
        if !project_root.join(&contract.source_root).is_dir() {
            violations.push(Violation::error(
                rules::STRUCTURE_SOURCE_ROOT_MISSING,
                contract.source_root.clone(),
                format!(
                    "Source root '{}' does not exist; nothing can be validated",
                    contract.source_root
                ),
            ));
            return Ok(violations);
        }

        for (module, dir) in module_dirs(project_root, contract)? {
            let rel = module_rel_path(contract, &module);
            for layer in &contract.required_module_layers {
                if !dir.join(layer).is_dir() {
                    violations.push(
                        Violation::error(
                            rules::STRUCTURE_MODULE_MISSING_LAYER,
                            rel.clone(),
                            format!("Module '{}' is missing required layer '{}'", module, layer),
                        )
                        .with_target(layer.clone()),
                    );
                }
            }

            let has_code = graph::collect_tree_files(&dir)?
                .iter()
                .any(|p| graph::is_code_file(p));
            if !has_code {
                violations.push(Violation::warning(
                    rules::STRUCTURE_MODULE_EMPTY,
                    rel,
                    format!("Module '{}' contains no source files", module),
                ));
            }
        }
        Ok(violations)
    }
}
