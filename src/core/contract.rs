//! Architecture contract: the read-only configuration every check is a pure
//! function of.
//!
//! The contract is a plain value. Callers load it once and pass it by
//! reference into graph building, validation and classification, so two
//! contract versions can be evaluated side by side.

use crate::core::error::ArchgateError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONTRACT_SCHEMA_VERSION: &str = "1.0.0";
pub const CONTRACT_OVERRIDE_REL_PATH: &str = ".archgate/contract.toml";
const SUPPORTED_MAJOR_VERSION: &str = "1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArchitectureContract {
    pub version: String,
    pub source_root: String,
    pub module_container: String,
    pub recognized_layers: Vec<String>,
    pub required_module_layers: Vec<String>,
    pub layer_matrix: BTreeMap<String, Vec<String>>,
    pub cross_module_layers: Vec<String>,
    pub allowed_top_level_dirs: Vec<String>,
    pub allowed_alias_prefixes: Vec<String>,
    pub persistence_packages: Vec<String>,
    pub persistence_free_layers: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for ArchitectureContract {
    fn default() -> Self {
        let recognized = [
            "routes",
            "controller",
            "service",
            "repository",
            "model",
            "validation",
            "db",
            "middleware",
            "config",
            "lib",
            "tests",
        ];

        let mut layer_matrix = BTreeMap::new();
        let mut allow = |from: &str, to: &[&str]| {
            layer_matrix.insert(from.to_string(), strings(to));
        };
        allow(
            "routes",
            &["controller", "middleware", "validation", "config", "lib"],
        );
        allow(
            "controller",
            &["service", "validation", "model", "config", "lib"],
        );
        allow("service", &["repository", "model", "config", "lib"]);
        allow("repository", &["db", "model", "config", "lib"]);
        allow("model", &["lib"]);
        allow("validation", &["model", "lib"]);
        allow("db", &["config", "lib"]);
        allow("middleware", &["service", "config", "lib"]);
        allow("config", &["lib"]);
        allow("lib", &["config"]);
        // Test files never become graph nodes; the `tests` layer only keeps
        // `<module>/tests/` directories from classifying as unknown layers.
        allow("tests", &recognized);

        Self {
            version: CONTRACT_SCHEMA_VERSION.to_string(),
            source_root: "src".to_string(),
            module_container: "modules".to_string(),
            recognized_layers: strings(&recognized),
            required_module_layers: strings(&[
                "routes",
                "controller",
                "service",
                "repository",
                "model",
                "validation",
            ]),
            layer_matrix,
            cross_module_layers: strings(&["service", "model"]),
            allowed_top_level_dirs: strings(&["types", "utils", "generated", "__tests__"]),
            allowed_alias_prefixes: Vec::new(),
            persistence_packages: strings(&[
                "@prisma/client",
                "prisma",
                "pg",
                "mysql2",
                "mongoose",
                "typeorm",
                "sequelize",
                "knex",
                "better-sqlite3",
                "redis",
                "ioredis",
            ]),
            persistence_free_layers: strings(&["routes", "controller", "middleware", "validation"]),
        }
    }
}

impl ArchitectureContract {
    pub fn is_recognized_layer(&self, name: &str) -> bool {
        self.recognized_layers.iter().any(|l| l == name)
    }

    /// Same-layer imports are always allowed; anything missing from the
    /// matrix is denied.
    pub fn layer_may_import(&self, from: &str, to: &str) -> bool {
        if from == to {
            return true;
        }
        self.layer_matrix
            .get(from)
            .is_some_and(|allowed| allowed.iter().any(|l| l == to))
    }

    pub fn is_cross_module_surface(&self, layer: Option<&str>) -> bool {
        layer.is_some_and(|l| self.cross_module_layers.iter().any(|c| c == l))
    }

    pub fn is_allowed_top_level_dir(&self, name: &str) -> bool {
        self.allowed_top_level_dirs.iter().any(|d| d == name)
    }

    pub fn validate(&self) -> Result<(), ArchgateError> {
        let major = self.version.split('.').next().unwrap_or("");
        if major != SUPPORTED_MAJOR_VERSION {
            return Err(ArchgateError::ContractError(format!(
                "CONTRACT_VERSION_UNSUPPORTED: actual={} expected={}.x",
                self.version, SUPPORTED_MAJOR_VERSION
            )));
        }
        if self.source_root.trim().is_empty() || self.source_root.contains('/') {
            return Err(ArchgateError::ContractError(
                "CONTRACT_SOURCE_ROOT_INVALID: sourceRoot must be a single directory name".into(),
            ));
        }
        if self.module_container.trim().is_empty() || self.module_container.contains('/') {
            return Err(ArchgateError::ContractError(
                "CONTRACT_MODULE_CONTAINER_INVALID: moduleContainer must be a single directory name"
                    .into(),
            ));
        }
        if self.recognized_layers.is_empty() {
            return Err(ArchgateError::ContractError(
                "CONTRACT_LAYERS_EMPTY: recognizedLayers must not be empty".into(),
            ));
        }

        let mut unknown = Vec::new();
        for (from, targets) in &self.layer_matrix {
            if !self.is_recognized_layer(from) {
                unknown.push(format!("layerMatrix.{from}"));
            }
            for to in targets {
                if !self.is_recognized_layer(to) {
                    unknown.push(format!("layerMatrix.{from}[{to}]"));
                }
            }
        }
        for layer in self
            .required_module_layers
            .iter()
            .chain(self.cross_module_layers.iter())
            .chain(self.persistence_free_layers.iter())
        {
            if !self.is_recognized_layer(layer) {
                unknown.push(layer.clone());
            }
        }
        if !unknown.is_empty() {
            return Err(ArchgateError::ContractError(format!(
                "CONTRACT_UNKNOWN_LAYER: {}",
                unknown.join(", ")
            )));
        }
        Ok(())
    }
}

fn parse_contract(path: &Path, raw: &str) -> Result<ArchitectureContract, ArchgateError> {
    let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
    if is_json {
        serde_json::from_str(raw)
            .map_err(|e| ArchgateError::ContractError(format!("CONTRACT_INVALID: {}", e)))
    } else {
        toml::from_str(raw)
            .map_err(|e| ArchgateError::ContractError(format!("CONTRACT_INVALID: {}", e)))
    }
}

/// Resolve the contract for a project: an explicit file wins, then the
/// project override, then the built-in default.
pub fn load_contract(
    project_root: &Path,
    explicit: Option<&Path>,
) -> Result<ArchitectureContract, ArchgateError> {
    let candidate: Option<PathBuf> = match explicit {
        Some(p) if !p.exists() => {
            return Err(ArchgateError::NotFound(format!(
                "contract file {}",
                p.display()
            )));
        }
        Some(p) => Some(p.to_path_buf()),
        None => Some(project_root.join(CONTRACT_OVERRIDE_REL_PATH)).filter(|p| p.exists()),
    };

    let contract = match candidate {
        Some(path) => {
            let raw = fs::read_to_string(&path).map_err(ArchgateError::IoError)?;
            let parsed = parse_contract(&path, &raw)?;
            tracing::debug!(path = %path.display(), version = %parsed.version, "loaded architecture contract");
            parsed
        }
        None => ArchitectureContract::default(),
    };
    contract.validate()?;
    Ok(contract)
}
