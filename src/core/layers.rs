//! Path/layer classification.
//!
//! Maps a project-relative path onto the contract's module/layer structure.
//! Pure and total: every input yields exactly one [`PathClass`].

use crate::core::contract::ArchitectureContract;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PathClass {
    /// Not under the source root.
    OutOfScope,
    /// `src/<container>/<module>/<layer>/...`
    ModuleLayer { module: String, layer: String },
    /// A file directly inside a module directory, or the module directory itself.
    ModuleOnly { module: String },
    /// `src/<container>/<module>/<segment>/...` with an unrecognized segment.
    UnknownModuleLayer { module: String, segment: String },
    /// `src/<layer>/...` outside the module container.
    LayerOnly { layer: String },
    /// Top-level file or allowed non-module directory.
    Benign,
    /// `src/<segment>/...` that is neither a layer nor an allowed directory.
    UnknownTopLevel { segment: String },
}

impl PathClass {
    pub fn module(&self) -> Option<&str> {
        match self {
            Self::ModuleLayer { module, .. }
            | Self::ModuleOnly { module }
            | Self::UnknownModuleLayer { module, .. } => Some(module),
            _ => None,
        }
    }

    pub fn layer(&self) -> Option<&str> {
        match self {
            Self::ModuleLayer { layer, .. } | Self::LayerOnly { layer } => Some(layer),
            _ => None,
        }
    }

    pub fn unknown_layer(&self) -> Option<&str> {
        match self {
            Self::UnknownModuleLayer { segment, .. } | Self::UnknownTopLevel { segment } => {
                Some(segment)
            }
            _ => None,
        }
    }
}

/// Forward slashes, no leading `./` or `/`, no empty or `.` segments.
pub fn normalize_rel_path(path: &str) -> String {
    path.replace('\\', "/")
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect::<Vec<_>>()
        .join("/")
}

fn looks_like_file(segment: &str) -> bool {
    segment.contains('.')
}

pub fn classify_path(relative_path: &str, contract: &ArchitectureContract) -> PathClass {
    let normalized = normalize_rel_path(relative_path);
    let segments: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();

    match segments.as_slice() {
        [root, rest @ ..] if *root == contract.source_root => classify_in_root(rest, contract),
        _ => PathClass::OutOfScope,
    }
}

fn classify_in_root(rest: &[&str], contract: &ArchitectureContract) -> PathClass {
    match rest {
        [] => PathClass::OutOfScope,
        [container] if *container == contract.module_container => PathClass::OutOfScope,
        [container, file] if *container == contract.module_container && looks_like_file(file) => {
            PathClass::OutOfScope
        }
        [container, module, tail @ ..] if *container == contract.module_container => {
            let module = module.to_string();
            match tail {
                [] => PathClass::ModuleOnly { module },
                [file] if looks_like_file(file) => PathClass::ModuleOnly { module },
                [segment, ..] if contract.is_recognized_layer(segment) => PathClass::ModuleLayer {
                    module,
                    layer: segment.to_string(),
                },
                [segment, ..] => PathClass::UnknownModuleLayer {
                    module,
                    segment: segment.to_string(),
                },
            }
        }
        [first, ..] if contract.is_recognized_layer(first) => PathClass::LayerOnly {
            layer: first.to_string(),
        },
        [first, ..] if looks_like_file(first) || contract.is_allowed_top_level_dir(first) => {
            PathClass::Benign
        }
        [first, ..] => PathClass::UnknownTopLevel {
            segment: first.to_string(),
        },
    }
}
