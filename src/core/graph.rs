//! Import-graph builder.
//!
//! Scans production source files under the contract's source root, resolves
//! every import into an edge over an index-keyed node arena, and checks the
//! result against the layer matrix, module isolation and cycle rules.
//!
//! Determinism: files are sorted before any processing and the violation
//! list is sorted by `(ruleId, file, target)`, so two builds over an
//! unchanged tree serialize byte-identically.

use crate::core::contract::ArchitectureContract;
use crate::core::error::ArchgateError;
use crate::core::layers::{PathClass, classify_path};
use crate::core::resolve::{self, FileSet, ImportKind, SOURCE_EXTENSIONS};
use crate::core::violation::{Violation, rules, sort_violations};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeSet, VecDeque};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Directories never descended into.
pub const SKIPPED_DIRS: &[&str] = &[
    "node_modules",
    "dist",
    "build",
    "coverage",
    "out",
    "target",
];

/// Directories whose files are tests, not production code.
const TEST_DIRS: &[&str] = &["__tests__", "tests"];

pub const ALIAS_CONFIG_FILES: &[&str] = &["tsconfig.json", "tsconfig.base.json", "jsconfig.json"];

/// Specifier prefixes that always denote project-internal aliases.
const INTERNAL_ALIAS_PREFIXES: &[&str] = &["@/", "~/", "#/"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: PathBuf,
    pub relative_path: String,
    pub module_name: Option<String>,
    pub layer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unknown_layer: Option<String>,
    #[serde(skip)]
    pub class: PathClass,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub import_specifier: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ArchitectureGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub cycles: Vec<Vec<String>>,
    pub violations: Vec<Violation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSummary {
    pub nodes: usize,
    pub edges: usize,
    pub cycles: usize,
}

impl ArchitectureGraph {
    pub fn node(&self, id: NodeId) -> &GraphNode {
        &self.nodes[id.0]
    }

    pub fn summary(&self) -> GraphSummary {
        GraphSummary {
            nodes: self.nodes.len(),
            edges: self.edges.len(),
            cycles: self.cycles.len(),
        }
    }

    /// JSON view with edges rendered as relative paths instead of indices.
    pub fn to_json(&self) -> Value {
        let edges: Vec<Value> = self
            .edges
            .iter()
            .map(|e| {
                serde_json::json!({
                    "from": self.node(e.from).relative_path,
                    "to": self.node(e.to).relative_path,
                    "importSpecifier": e.import_specifier,
                })
            })
            .collect();
        serde_json::json!({
            "nodes": self.nodes,
            "edges": edges,
            "cycles": self.cycles,
            "violations": self.violations,
        })
    }

    /// Sorted, deduplicated successor lists keyed by node index.
    fn adjacency(&self) -> Vec<Vec<usize>> {
        let mut adj = vec![Vec::new(); self.nodes.len()];
        for e in &self.edges {
            adj[e.from.0].push(e.to.0);
        }
        for succ in adj.iter_mut() {
            succ.sort_unstable();
            succ.dedup();
        }
        adj
    }
}

pub fn is_code_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SOURCE_EXTENSIONS.contains(&e))
}

pub fn is_test_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    name.contains(".test.") || name.contains(".spec.")
}

fn is_declaration_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    name.ends_with(".d.ts") || name.ends_with(".d.mts") || name.ends_with(".d.cts")
}

fn under_test_dir(rel: &str) -> bool {
    rel.split('/').any(|seg| TEST_DIRS.contains(&seg))
}

/// Recoverable scan errors are skipped; anything else propagates.
pub fn is_skippable(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied
    )
}

/// Read a text file for scanning. `None` when the file vanished, is not
/// readable or is not UTF-8; every other I/O failure propagates.
pub fn read_source(path: &Path) -> Result<Option<String>, ArchgateError> {
    match fs::read_to_string(path) {
        Ok(s) => Ok(Some(s)),
        Err(e) if is_skippable(&e) || e.kind() == io::ErrorKind::InvalidData => {
            tracing::debug!(file = %path.display(), error = %e, "skipping unreadable file");
            Ok(None)
        }
        Err(e) => Err(ArchgateError::IoError(e)),
    }
}

/// Every file below `dir`, skipping dependency/build/dot directories.
/// Returned in walk order; callers sort.
pub fn collect_tree_files(dir: &Path) -> Result<Vec<PathBuf>, ArchgateError> {
    fn recurse(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), ArchgateError> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if is_skippable(&e) => {
                tracing::debug!(dir = %dir.display(), error = %e, "skipping unreadable directory");
                return Ok(());
            }
            Err(e) => return Err(ArchgateError::IoError(e)),
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if is_skippable(&e) => continue,
                Err(e) => return Err(ArchgateError::IoError(e)),
            };
            let path = entry.path();
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if path.is_dir() {
                if name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref()) {
                    continue;
                }
                recurse(&path, out)?;
            } else if path.is_file() {
                out.push(path);
            }
        }
        Ok(())
    }

    let mut out = Vec::new();
    recurse(dir, &mut out)?;
    Ok(out)
}

/// Project-relative path with forward slashes.
pub fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Production code files under the source root, sorted by relative path.
pub fn production_files(
    project_root: &Path,
    contract: &ArchitectureContract,
) -> Result<Vec<(PathBuf, String)>, ArchgateError> {
    let src = project_root.join(&contract.source_root);
    Ok(select_production(project_root, collect_tree_files(&src)?))
}

fn select_production(project_root: &Path, tree: Vec<PathBuf>) -> Vec<(PathBuf, String)> {
    let mut files: Vec<(PathBuf, String)> = tree
        .into_iter()
        .filter(|p| is_code_file(p) && !is_test_file(p) && !is_declaration_file(p))
        .map(|p| {
            let rel = relative_path(project_root, &p);
            (p, rel)
        })
        .filter(|(_, rel)| !under_test_dir(rel))
        .collect();
    files.sort_by(|a, b| a.1.cmp(&b.1));
    files
}

/// Strip `//` and `/* */` comments and trailing commas from JSON-with-comments
/// text, leaving string literals untouched.
pub fn strip_jsonc(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    let mut in_string = false;
    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if c == '\\' {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            _ => out.push(c),
        }
    }

    // Trailing commas before a closing bracket.
    let mut cleaned = String::with_capacity(out.len());
    let bytes: Vec<char> = out.chars().collect();
    let mut in_string = false;
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if in_string {
            cleaned.push(c);
            if c == '\\' && i + 1 < bytes.len() {
                cleaned.push(bytes[i + 1]);
                i += 2;
                continue;
            }
            if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        if c == '"' {
            in_string = true;
        }
        if c == ',' {
            let next = bytes[i + 1..].iter().find(|ch| !ch.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                i += 1;
                continue;
            }
        }
        cleaned.push(c);
        i += 1;
    }
    cleaned
}

/// Path-alias declarations found in one compiler configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasConfig {
    pub file: String,
    pub base_url: Option<String>,
    pub alias_prefixes: Vec<String>,
}

impl AliasConfig {
    pub fn declares_aliases(&self) -> bool {
        !self.alias_prefixes.is_empty()
            || self
                .base_url
                .as_deref()
                .is_some_and(|b| !matches!(b.trim(), "." | "./" | ""))
    }
}

/// Read alias declarations from the root compiler configs. Unparseable
/// configs are skipped.
pub fn read_alias_configs(project_root: &Path) -> Result<Vec<AliasConfig>, ArchgateError> {
    let mut configs = Vec::new();
    for name in ALIAS_CONFIG_FILES {
        let path = project_root.join(name);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if is_skippable(&e) => continue,
            Err(e) => return Err(ArchgateError::IoError(e)),
        };
        let parsed: Value = match serde_json::from_str(&strip_jsonc(&raw)) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(file = %name, error = %e, "ignoring unparseable compiler config");
                continue;
            }
        };
        let options = parsed.get("compilerOptions");
        let base_url = options
            .and_then(|o| o.get("baseUrl"))
            .and_then(|b| b.as_str())
            .map(|b| b.to_string());
        let mut alias_prefixes: Vec<String> = options
            .and_then(|o| o.get("paths"))
            .and_then(|p| p.as_object())
            .map(|paths| {
                paths
                    .keys()
                    .map(|k| k.trim_end_matches('*').to_string())
                    .filter(|k| !k.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        alias_prefixes.sort();
        alias_prefixes.dedup();
        configs.push(AliasConfig {
            file: name.to_string(),
            base_url,
            alias_prefixes,
        });
    }
    Ok(configs)
}

/// Decides which non-relative specifiers name project code rather than an
/// installed package.
struct InternalSpecifiers<'a> {
    contract: &'a ArchitectureContract,
    declared_aliases: Vec<String>,
    top_level_dirs: FxHashSet<String>,
}

impl InternalSpecifiers<'_> {
    fn is_internal(&self, specifier: &str) -> bool {
        if INTERNAL_ALIAS_PREFIXES
            .iter()
            .any(|p| specifier.starts_with(p))
        {
            return true;
        }
        if specifier.starts_with(&format!("{}/", self.contract.source_root)) {
            return true;
        }
        if self.declared_aliases.iter().any(|alias| {
            specifier == alias.trim_end_matches('/') || specifier.starts_with(alias.as_str())
        }) {
            return true;
        }
        let first = specifier.split('/').next().unwrap_or("");
        !first.starts_with('@') && self.top_level_dirs.contains(first)
    }

    fn is_allowed(&self, specifier: &str) -> bool {
        self.contract
            .allowed_alias_prefixes
            .iter()
            .any(|p| !p.is_empty() && specifier.starts_with(p.as_str()))
    }
}

fn make_node(path: PathBuf, rel: String, contract: &ArchitectureContract) -> GraphNode {
    let class = classify_path(&rel, contract);
    GraphNode {
        id: path,
        module_name: class.module().map(|m| m.to_string()),
        layer: class.layer().map(|l| l.to_string()),
        unknown_layer: class.unknown_layer().map(|l| l.to_string()),
        relative_path: rel,
        class,
    }
}

fn unknown_layer_violation(node: &GraphNode) -> Option<Violation> {
    match &node.class {
        PathClass::UnknownModuleLayer { module, segment } => Some(
            Violation::error(
                rules::ARCH_UNKNOWN_LAYER,
                node.relative_path.clone(),
                format!(
                    "Module '{}' contains unrecognized layer directory '{}'",
                    module, segment
                ),
            )
            .with_target(segment.clone()),
        ),
        PathClass::UnknownTopLevel { segment } => Some(
            Violation::error(
                rules::ARCH_UNKNOWN_TOP_LEVEL,
                node.relative_path.clone(),
                format!(
                    "Top-level source directory '{}' is neither a recognized layer nor an allowed directory",
                    segment
                ),
            )
            .with_target(segment.clone()),
        ),
        _ => None,
    }
}

fn edge_violations(
    source: &GraphNode,
    target: &GraphNode,
    contract: &ArchitectureContract,
) -> Vec<Violation> {
    let mut out = Vec::new();
    if let (Some(from), Some(to)) = (source.layer.as_deref(), target.layer.as_deref())
        && !contract.layer_may_import(from, to)
    {
        out.push(
            Violation::error(
                rules::ARCH_LAYER_MATRIX,
                source.relative_path.clone(),
                format!(
                    "Layer '{}' may not import layer '{}' ({} -> {})",
                    from, to, from, to
                ),
            )
            .with_target(target.relative_path.clone()),
        );
    }

    if let (Some(from_mod), Some(to_mod)) =
        (source.module_name.as_deref(), target.module_name.as_deref())
    {
        let public_surface = matches!(target.class, PathClass::ModuleOnly { .. })
            || contract.is_cross_module_surface(target.layer.as_deref());
        if from_mod != to_mod && !public_surface {
            out.push(
                Violation::error(
                    rules::ARCH_MODULE_ISOLATION,
                    source.relative_path.clone(),
                    format!(
                        "Module '{}' reaches into module '{}' outside its public surface ({})",
                        from_mod,
                        to_mod,
                        target.layer.as_deref().unwrap_or("unlayered")
                    ),
                )
                .with_target(target.relative_path.clone()),
            );
        }
    }
    out
}

/// Build the import graph for `project_root`.
pub fn build_graph(
    project_root: &Path,
    contract: &ArchitectureContract,
) -> Result<ArchitectureGraph, ArchgateError> {
    let src = project_root.join(&contract.source_root);
    if !src.is_dir() {
        tracing::debug!(root = %project_root.display(), "source root missing, empty graph");
        return Ok(ArchitectureGraph::default());
    }

    let mut tree = collect_tree_files(&src)?;
    tree.sort();
    // Relative imports may reach files outside the source root (package.json, prisma/).
    let file_set = FileSet::new(collect_tree_files(project_root)?);
    let top_level_dirs: FxHashSet<String> = tree
        .iter()
        .filter_map(|p| {
            let rel = p.strip_prefix(&src).ok()?;
            let mut parts = rel.components();
            let first = parts.next()?;
            parts.next()?;
            Some(first.as_os_str().to_string_lossy().to_string())
        })
        .collect();

    let mut violations = Vec::new();
    let alias_configs = read_alias_configs(project_root)?;
    let mut declared_aliases = Vec::new();
    for cfg in &alias_configs {
        if cfg.declares_aliases() {
            violations.push(Violation::error(
                rules::IMPORT_PATH_ALIAS_CONFIG,
                cfg.file.clone(),
                format!(
                    "Compiler config declares path aliases or a non-default baseUrl (baseUrl={}, paths=[{}]); imports must stay relative",
                    cfg.base_url.as_deref().unwrap_or("-"),
                    cfg.alias_prefixes.join(", ")
                ),
            ));
        }
        declared_aliases.extend(cfg.alias_prefixes.iter().cloned());
    }
    let internal = InternalSpecifiers {
        contract,
        declared_aliases,
        top_level_dirs,
    };

    let files = select_production(project_root, tree);
    let mut graph = ArchitectureGraph::default();
    let mut index: FxHashMap<PathBuf, NodeId> = FxHashMap::default();
    for (path, rel) in files {
        let id = NodeId(graph.nodes.len());
        index.insert(resolve::normalize_path(&path), id);
        graph.nodes.push(make_node(path, rel, contract));
    }

    violations.extend(graph.nodes.iter().filter_map(unknown_layer_violation));

    for from in 0..graph.nodes.len() {
        let node = &graph.nodes[from];
        let Some(source) = read_source(&node.id)? else {
            continue;
        };

        for specifier in resolve::extract_imports(&source) {
            match ImportKind::of(&specifier) {
                ImportKind::NonRelative => {
                    if internal.is_internal(&specifier) && !internal.is_allowed(&specifier) {
                        violations.push(
                            Violation::error(
                                rules::IMPORT_NON_RELATIVE,
                                node.relative_path.clone(),
                                format!(
                                    "Non-relative import '{}' of project code; use a relative path",
                                    specifier
                                ),
                            )
                            .with_target(specifier),
                        );
                    }
                }
                ImportKind::Relative => {
                    match resolve::resolve_import(&node.id, &specifier, &file_set) {
                        None => violations.push(
                            Violation::error(
                                rules::IMPORT_MISSING_TARGET,
                                node.relative_path.clone(),
                                format!("Import '{}' does not resolve to a file", specifier),
                            )
                            .with_target(specifier),
                        ),
                        Some(resolved) => {
                            // Targets that are not production code (json, tests) carry no edge.
                            if let Some(&to) = index.get(&resolved) {
                                violations.extend(edge_violations(
                                    node,
                                    &graph.nodes[to.0],
                                    contract,
                                ));
                                graph.edges.push(GraphEdge {
                                    from: NodeId(from),
                                    to,
                                    import_specifier: specifier,
                                });
                            }
                        }
                    }
                }
            }
        }
    }

    let adjacency = graph.adjacency();
    // (rendered path, component members the path does not visit)
    let mut cycles: Vec<(Vec<String>, Vec<String>)> = Vec::new();
    for scc in strongly_connected_components(&adjacency) {
        let is_cycle = scc.len() > 1 || adjacency[scc[0]].contains(&scc[0]);
        if is_cycle {
            let path = render_cycle(&graph, &adjacency, &scc);
            let mut rest: Vec<String> = scc
                .iter()
                .map(|&i| graph.nodes[i].relative_path.clone())
                .filter(|p| !path.contains(p))
                .collect();
            rest.sort();
            cycles.push((path, rest));
        }
    }
    cycles.sort();
    for (cycle, rest) in &cycles {
        let rendered = cycle.join(" -> ");
        let mut message = format!("Dependency cycle detected: {}", rendered);
        if !rest.is_empty() {
            message.push_str(&format!(" (component also includes {})", rest.join(", ")));
        }
        violations.push(
            Violation::error(rules::GRAPH_CYCLE, cycle[0].clone(), message).with_target(rendered),
        );
    }
    graph.cycles = cycles.into_iter().map(|(path, _)| path).collect();

    sort_violations(&mut violations);
    graph.violations = violations;

    tracing::debug!(
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        cycles = graph.cycles.len(),
        violations = graph.violations.len(),
        "built import graph"
    );
    Ok(graph)
}

/// Tarjan's strongly-connected components, iterative so deep import chains
/// cannot exhaust the call stack. Each component is returned sorted.
pub fn strongly_connected_components(adjacency: &[Vec<usize>]) -> Vec<Vec<usize>> {
    const UNVISITED: usize = usize::MAX;
    let n = adjacency.len();
    let mut index = vec![UNVISITED; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut sccs: Vec<Vec<usize>> = Vec::new();
    let mut counter = 0usize;

    for start in 0..n {
        if index[start] != UNVISITED {
            continue;
        }
        // (node, next successor position)
        let mut work: Vec<(usize, usize)> = vec![(start, 0)];
        index[start] = counter;
        lowlink[start] = counter;
        counter += 1;
        stack.push(start);
        on_stack[start] = true;

        while let Some(top) = work.last_mut() {
            let v = top.0;
            if top.1 < adjacency[v].len() {
                let w = adjacency[v][top.1];
                top.1 += 1;
                if index[w] == UNVISITED {
                    index[w] = counter;
                    lowlink[w] = counter;
                    counter += 1;
                    stack.push(w);
                    on_stack[w] = true;
                    work.push((w, 0));
                } else if on_stack[w] {
                    lowlink[v] = lowlink[v].min(index[w]);
                }
                continue;
            }

            work.pop();
            if let Some(&(parent, _)) = work.last() {
                lowlink[parent] = lowlink[parent].min(lowlink[v]);
            }
            if lowlink[v] == index[v] {
                let mut scc = Vec::new();
                while let Some(w) = stack.pop() {
                    on_stack[w] = false;
                    scc.push(w);
                    if w == v {
                        break;
                    }
                }
                scc.sort_unstable();
                sccs.push(scc);
            }
        }
    }
    sccs
}

/// Render a component as a closed path starting at its lexicographically
/// smallest member and following edge direction. Branchy components render
/// one elementary cycle; members off that path are not listed here.
fn render_cycle(graph: &ArchitectureGraph, adjacency: &[Vec<usize>], scc: &[usize]) -> Vec<String> {
    let name = |i: usize| graph.nodes[i].relative_path.clone();
    let members: BTreeSet<usize> = scc.iter().copied().collect();
    let start = scc
        .iter()
        .copied()
        .min_by(|a, b| graph.nodes[*a].relative_path.cmp(&graph.nodes[*b].relative_path))
        .unwrap_or(scc[0]);

    // Successors inside the component, ordered by path.
    let successors = |v: usize| -> Vec<usize> {
        let mut succ: Vec<usize> = adjacency[v]
            .iter()
            .copied()
            .filter(|w| members.contains(w))
            .collect();
        succ.sort_by(|a, b| graph.nodes[*a].relative_path.cmp(&graph.nodes[*b].relative_path));
        succ
    };

    let mut path = vec![start];
    let mut visited: FxHashSet<usize> = FxHashSet::default();
    visited.insert(start);
    let mut current = start;
    loop {
        let succ = successors(current);
        if let Some(&next) = succ.iter().find(|w| !visited.contains(*w)) {
            visited.insert(next);
            path.push(next);
            current = next;
            continue;
        }
        if succ.contains(&start) {
            path.push(start);
            break;
        }
        // Dead end inside the component: take the shortest way back.
        path.extend(shortest_path_back(current, start, &successors));
        break;
    }
    path.into_iter().map(name).collect()
}

/// BFS from `from` to `to`, excluding `from` itself from the returned path.
fn shortest_path_back(
    from: usize,
    to: usize,
    successors: &dyn Fn(usize) -> Vec<usize>,
) -> Vec<usize> {
    let mut prev: FxHashMap<usize, usize> = FxHashMap::default();
    let mut queue = VecDeque::from([from]);
    let mut seen: FxHashSet<usize> = FxHashSet::default();
    seen.insert(from);
    while let Some(v) = queue.pop_front() {
        for w in successors(v) {
            if w == to {
                let mut path = vec![to];
                let mut cur = v;
                while cur != from {
                    path.push(cur);
                    cur = prev[&cur];
                }
                path.reverse();
                return path;
            }
            if seen.insert(w) {
                prev.insert(w, v);
                queue.push_back(w);
            }
        }
    }
    vec![to]
}
