//! The project walker: discovery, import resolution and the conversion
//! pipeline.
//!
//! One [`RepositoryConverter`] run owns everything it touches. It discovers
//! the notebooks under a root path, scans them, resolves notebook-to-
//! notebook imports into a dependency graph, synthesizes one script per
//! affected notebook and emits one document per entry point. Any failure
//! aborts the run before a single document lands in the output directory;
//! documents are staged under hidden temporary names and renamed into
//! place only after every one of them rendered and wrote cleanly.

use crate::cwl::CwlDocument;
use crate::cwl::emit::{self, DataEdge};
use crate::error::{ConversionError, ScanError};
use crate::notebook::{
    AnnotationScanner, ImportKind, ImportStatement, Notebook, NotebookScan, SourceLocation,
    load_notebook,
};
use crate::synthesize::synthesize_script;
use ahash::{AHashMap, AHashSet};
use petgraph::algo::tarjan_scc;
use petgraph::graph::DiGraph;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

/// One discovered notebook with everything later stages derived from it.
///
/// Units are immutable once scanned; the synthesized script is filled in
/// right before emission and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct NotebookUnit {
    /// Canonical path of the notebook file.
    pub path: PathBuf,
    /// Unique document and step id, derived from the file stem and
    /// qualified with the relative path when stems collide.
    pub id: String,
    pub notebook: Notebook,
    pub scan: NotebookScan,
    pub script: String,
}

/// What a conversion run produced.
#[derive(Debug, Clone, Default)]
pub struct ConversionReport {
    /// Final paths of the written documents, one per entry point, in
    /// entry-point order.
    pub documents: Vec<PathBuf>,
}

/// Converts every notebook reachable from a root path into workflow
/// documents inside an existing output directory.
///
/// ```no_run
/// use nb2cwl::project::RepositoryConverter;
///
/// let report = RepositoryConverter::new("./project", "./out").convert()?;
/// for path in &report.documents {
///     println!("wrote {}", path.display());
/// }
/// # Ok::<(), nb2cwl::error::ConversionError>(())
/// ```
pub struct RepositoryConverter {
    root: PathBuf,
    output_dir: PathBuf,
    entry_points: Vec<PathBuf>,
}

impl RepositoryConverter {
    /// `root` may be a directory tree or a single notebook file;
    /// `output_dir` must already exist when [`convert`](Self::convert)
    /// runs.
    pub fn new(root: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            output_dir: output_dir.into(),
            entry_points: Vec::new(),
        }
    }

    /// Restricts emission to the given notebooks instead of the default
    /// rule (every notebook no other notebook imports). Paths are taken
    /// relative to the root unless absolute.
    pub fn with_entry_points(mut self, entry_points: Vec<PathBuf>) -> Self {
        self.entry_points = entry_points;
        self
    }

    /// Runs the conversion. Either every expected document is written, or
    /// the output directory is left untouched.
    pub fn convert(&self) -> Result<ConversionReport, ConversionError> {
        if !self.output_dir.is_dir() {
            return Err(ConversionError::OutputDirectory {
                path: self.output_dir.clone(),
            });
        }
        let root = fs::canonicalize(&self.root).map_err(|err| ConversionError::Io {
            path: self.root.clone(),
            message: err.to_string(),
        })?;
        let root_dir = if root.is_file() {
            root.parent().map(Path::to_path_buf).unwrap_or_else(|| root.clone())
        } else {
            root.clone()
        };
        debug!(root = %root.display(), "converting project");

        let paths = discover_notebooks(&root)?;
        if paths.is_empty() {
            warn!(root = %root.display(), "no notebooks discovered under project root");
            return Ok(ConversionReport::default());
        }
        let mut units = load_units(&paths, &root_dir)?;
        info!(notebooks = units.len(), "scanned notebooks");

        let index_by_path: AHashMap<PathBuf, usize> = units
            .iter()
            .enumerate()
            .map(|(index, unit)| (unit.path.clone(), index))
            .collect();
        let resolution = resolve_imports(&units, &root_dir, &index_by_path)?;
        check_cycles(&units, &resolution.depends_on)?;

        let entries = self.select_entries(&units, &resolution.depends_on, &index_by_path, &root_dir)?;
        let mut affected: AHashSet<usize> = AHashSet::new();
        for &entry in &entries {
            affected.extend(dependency_closure(&resolution.depends_on, entry));
        }
        for index in 0..units.len() {
            if !affected.contains(&index) {
                continue;
            }
            let unit = &units[index];
            let script =
                synthesize_script(&unit.notebook, &unit.scan, &resolution.suppressed[index])
                    .map_err(|source| ConversionError::Synthesis {
                        path: unit.path.clone(),
                        source,
                    })?;
            units[index].script = script;
        }

        let mut rendered: Vec<(String, String)> = Vec::new();
        for &entry in &entries {
            let closure = dependency_closure(&resolution.depends_on, entry);
            let document = if closure.len() == 1 {
                CwlDocument::Tool(emit::tool_document(&units[entry]))
            } else {
                let order = topological_order(&units, &resolution.depends_on, &closure);
                CwlDocument::Workflow(emit::workflow_document(
                    entry,
                    &order,
                    &units,
                    &resolution.edges,
                )?)
            };
            let file_name = format!("{}.cwl", units[entry].id);
            let yaml = document
                .to_yaml()
                .map_err(|err| ConversionError::Render {
                    path: self.output_dir.join(&file_name),
                    message: err.to_string(),
                })?;
            rendered.push((file_name, yaml));
        }

        let documents = self.publish(&rendered)?;
        info!(documents = documents.len(), "conversion complete");
        Ok(ConversionReport { documents })
    }

    fn select_entries(
        &self,
        units: &[NotebookUnit],
        depends_on: &[AHashSet<usize>],
        index_by_path: &AHashMap<PathBuf, usize>,
        root_dir: &Path,
    ) -> Result<Vec<usize>, ConversionError> {
        if self.entry_points.is_empty() {
            let imported: AHashSet<usize> = depends_on.iter().flatten().copied().collect();
            return Ok((0..units.len())
                .filter(|index| !imported.contains(index))
                .collect());
        }
        let mut selected = Vec::new();
        let mut seen: AHashSet<usize> = AHashSet::new();
        for entry in &self.entry_points {
            let absolute = if entry.is_absolute() {
                entry.clone()
            } else {
                root_dir.join(entry)
            };
            let canonical = fs::canonicalize(&absolute)
                .map_err(|_| ConversionError::UnknownEntryPoint { path: entry.clone() })?;
            let Some(&index) = index_by_path.get(&canonical) else {
                return Err(ConversionError::UnknownEntryPoint { path: entry.clone() });
            };
            if seen.insert(index) {
                selected.push(index);
            }
        }
        Ok(selected)
    }

    /// Stages every document under a hidden temporary name, then renames
    /// them into place. Any failure removes all staged and already
    /// published files of this run.
    fn publish(&self, rendered: &[(String, String)]) -> Result<Vec<PathBuf>, ConversionError> {
        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::new();
        for (file_name, text) in rendered {
            let temp = self.output_dir.join(format!(".{file_name}.tmp"));
            let target = self.output_dir.join(file_name);
            staged.push((temp.clone(), target));
            if let Err(err) = fs::write(&temp, text) {
                discard(staged.iter().map(|(temp, _)| temp));
                return Err(ConversionError::Io {
                    path: temp,
                    message: err.to_string(),
                });
            }
        }
        let mut published: Vec<PathBuf> = Vec::new();
        for (position, (temp, target)) in staged.iter().enumerate() {
            if let Err(err) = fs::rename(temp, target) {
                discard(staged[position..].iter().map(|(temp, _)| temp));
                discard(published.iter());
                return Err(ConversionError::Io {
                    path: target.clone(),
                    message: err.to_string(),
                });
            }
            debug!(document = %target.display(), "wrote document");
            published.push(target.clone());
        }
        Ok(published)
    }
}

fn discard<'a>(paths: impl Iterator<Item = &'a PathBuf>) {
    for path in paths {
        let _ = fs::remove_file(path);
    }
}

/// All notebook files under `root` in lexical path order, or just `root`
/// when it is a file. Hidden files and directories (checkpoints and the
/// like) are skipped.
fn discover_notebooks(root: &Path) -> Result<Vec<PathBuf>, ConversionError> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    let mut paths = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !is_hidden(entry))
    {
        let entry = entry.map_err(|err| ConversionError::Io {
            path: err
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| root.to_path_buf()),
            message: err.to_string(),
        })?;
        if entry.file_type().is_file()
            && entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == "ipynb")
        {
            paths.push(entry.into_path());
        }
    }
    paths.sort();
    Ok(paths)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

fn load_units(paths: &[PathBuf], root_dir: &Path) -> Result<Vec<NotebookUnit>, ConversionError> {
    let scanner = AnnotationScanner::new();
    let ids = assign_ids(paths, root_dir);
    let mut units = Vec::with_capacity(paths.len());
    for (path, id) in paths.iter().zip(ids) {
        let notebook = load_notebook(path)?;
        let scan = scanner.scan(&notebook).map_err(|err| match err {
            ScanError::Annotation(source) => ConversionError::Annotation {
                path: path.clone(),
                source,
            },
            ScanError::UnsupportedType(source) => ConversionError::UnsupportedType {
                path: path.clone(),
                source,
            },
        })?;
        units.push(NotebookUnit {
            path: path.clone(),
            id,
            notebook,
            scan,
            script: String::new(),
        });
    }
    Ok(units)
}

/// Assigns a unique document id per path: the file stem when unambiguous,
/// otherwise the root-relative path with separators folded.
fn assign_ids(paths: &[PathBuf], root_dir: &Path) -> Vec<String> {
    let mut stem_counts: AHashMap<String, usize> = AHashMap::new();
    let stems: Vec<String> = paths
        .iter()
        .map(|path| {
            let stem = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| "notebook".to_string());
            *stem_counts.entry(stem.clone()).or_insert(0) += 1;
            stem
        })
        .collect();
    let mut used: AHashSet<String> = AHashSet::new();
    paths
        .iter()
        .zip(stems)
        .map(|(path, stem)| {
            let base = if stem_counts.get(&stem).copied().unwrap_or(0) > 1 {
                let relative = path.strip_prefix(root_dir).unwrap_or(path);
                sanitize_id(&relative.with_extension("").to_string_lossy())
            } else {
                sanitize_id(&stem)
            };
            let mut id = base.clone();
            let mut serial = 2;
            while !used.insert(id.clone()) {
                id = format!("{base}_{serial}");
                serial += 1;
            }
            id
        })
        .collect()
}

fn sanitize_id(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

struct Resolution {
    edges: Vec<DataEdge>,
    /// Per unit, the set of units it imports.
    depends_on: Vec<AHashSet<usize>>,
    /// Per unit, locations of import statements to drop during synthesis.
    suppressed: Vec<AHashSet<SourceLocation>>,
}

/// Resolves every import statement against the discovered notebooks.
///
/// Imports that do not point at a discovered notebook are ordinary Python
/// and pass through untouched. Imports that do must name specific symbols,
/// and each symbol must bind one declared output of the imported notebook
/// to one declared input of the importer.
fn resolve_imports(
    units: &[NotebookUnit],
    root_dir: &Path,
    index_by_path: &AHashMap<PathBuf, usize>,
) -> Result<Resolution, ConversionError> {
    let mut edges: Vec<DataEdge> = Vec::new();
    let mut depends_on: Vec<AHashSet<usize>> = vec![AHashSet::new(); units.len()];
    let mut suppressed: Vec<AHashSet<SourceLocation>> = vec![AHashSet::new(); units.len()];
    let mut bound: AHashSet<(usize, String)> = AHashSet::new();

    for (importer, unit) in units.iter().enumerate() {
        let importer_dir = unit
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| root_dir.to_path_buf());
        let unresolved = |import: &ImportStatement, reason: String| {
            ConversionError::UnresolvedImport {
                importer: unit.path.clone(),
                module: import.module.clone(),
                location: import.location,
                reason,
            }
        };
        for import in &unit.scan.imports {
            let Some(imported) =
                resolve_module(index_by_path, root_dir, &importer_dir, &import.module)
            else {
                // `from <package> import name` may still name sibling notebooks.
                if import.module.chars().all(|c| c == '.') {
                    if let ImportKind::Symbols(symbols) = &import.kind {
                        let base = relative_base(&importer_dir, &import.module);
                        for symbol in symbols {
                            let candidate = base
                                .as_ref()
                                .map(|dir| dir.join(format!("{}.ipynb", symbol.name)));
                            if candidate.is_some_and(|path| index_by_path.contains_key(&path)) {
                                return Err(unresolved(
                                    import,
                                    format!(
                                        "notebook module '{}' must be imported with 'from {} import <output>'",
                                        symbol.name, symbol.name
                                    ),
                                ));
                            }
                        }
                    }
                }
                continue;
            };
            suppressed[importer].insert(import.location);
            depends_on[importer].insert(imported);
            debug!(
                importer = %unit.path.display(),
                imported = %units[imported].path.display(),
                "resolved notebook import"
            );
            match &import.kind {
                ImportKind::Module => {
                    return Err(unresolved(
                        import,
                        "whole-module imports of notebooks cannot be wired; import specific outputs with 'from ... import ...'".to_string(),
                    ));
                }
                ImportKind::Star => {
                    return Err(unresolved(
                        import,
                        "star imports of notebooks cannot be wired to ports".to_string(),
                    ));
                }
                ImportKind::Symbols(symbols) => {
                    for symbol in symbols {
                        let source_ok = units[imported]
                            .scan
                            .outputs()
                            .any(|output| output.name == symbol.name);
                        if !source_ok {
                            return Err(unresolved(
                                import,
                                format!(
                                    "'{}' is not a declared output of '{}'",
                                    symbol.name,
                                    units[imported].path.display()
                                ),
                            ));
                        }
                        let local = symbol.local_name().to_string();
                        let target_ok = unit.scan.inputs().any(|input| input.name == local);
                        if !target_ok {
                            return Err(unresolved(
                                import,
                                format!(
                                    "'{local}' is not a declared input of the importing notebook"
                                ),
                            ));
                        }
                        if !bound.insert((importer, local.clone())) {
                            return Err(unresolved(
                                import,
                                format!("input '{local}' is bound by more than one import"),
                            ));
                        }
                        edges.push(DataEdge {
                            source: imported,
                            source_port: symbol.name.clone(),
                            target: importer,
                            target_port: local,
                        });
                    }
                }
            }
        }
    }
    Ok(Resolution {
        edges,
        depends_on,
        suppressed,
    })
}

/// Directory a relative import's leading dots resolve against, or `None`
/// when they walk above the filesystem root.
fn relative_base(importer_dir: &Path, module: &str) -> Option<PathBuf> {
    let mut base = importer_dir.to_path_buf();
    for _ in 1..module.chars().take_while(|c| *c == '.').count() {
        base = base.parent()?.to_path_buf();
    }
    Some(base)
}

/// Maps a dotted module path to a discovered notebook, trying the
/// importer's directory before the project root for plain imports.
fn resolve_module(
    index_by_path: &AHashMap<PathBuf, usize>,
    root_dir: &Path,
    importer_dir: &Path,
    module: &str,
) -> Option<usize> {
    let dots = module.chars().take_while(|c| *c == '.').count();
    let rest = &module[dots..];
    if rest.is_empty() {
        return None;
    }
    let relative: PathBuf = format!("{}.ipynb", rest.split('.').collect::<Vec<_>>().join("/")).into();
    let candidates: Vec<PathBuf> = if dots > 0 {
        match relative_base(importer_dir, module) {
            Some(base) => vec![base.join(&relative)],
            None => Vec::new(),
        }
    } else {
        vec![importer_dir.join(&relative), root_dir.join(&relative)]
    };
    candidates
        .into_iter()
        .find_map(|candidate| index_by_path.get(&candidate).copied())
}

/// Rejects self-imports and larger import cycles before anything is
/// synthesized or written.
fn check_cycles(
    units: &[NotebookUnit],
    depends_on: &[AHashSet<usize>],
) -> Result<(), ConversionError> {
    for (index, deps) in depends_on.iter().enumerate() {
        if deps.contains(&index) {
            let path = units[index].path.clone();
            return Err(ConversionError::CyclicImport {
                cycle: vec![path.clone(), path],
            });
        }
    }
    let mut graph = DiGraph::<(), ()>::new();
    let nodes: Vec<_> = (0..units.len()).map(|_| graph.add_node(())).collect();
    for (importer, deps) in depends_on.iter().enumerate() {
        for &imported in deps {
            graph.add_edge(nodes[importer], nodes[imported], ());
        }
    }
    for component in tarjan_scc(&graph) {
        if component.len() > 1 {
            let mut cycle: Vec<PathBuf> = component
                .iter()
                .map(|node| units[node.index()].path.clone())
                .collect();
            cycle.sort();
            let first = cycle[0].clone();
            cycle.push(first);
            return Err(ConversionError::CyclicImport { cycle });
        }
    }
    Ok(())
}

/// The entry point plus everything it transitively imports.
fn dependency_closure(depends_on: &[AHashSet<usize>], entry: usize) -> AHashSet<usize> {
    let mut members = AHashSet::new();
    let mut stack = vec![entry];
    while let Some(index) = stack.pop() {
        if members.insert(index) {
            stack.extend(depends_on[index].iter().copied());
        }
    }
    members
}

/// Orders closure members dependencies-first, ties broken by lexical path
/// order so repeated runs emit identical documents.
fn topological_order(
    units: &[NotebookUnit],
    depends_on: &[AHashSet<usize>],
    members: &AHashSet<usize>,
) -> Vec<usize> {
    let mut order = Vec::with_capacity(members.len());
    let mut emitted: AHashSet<usize> = AHashSet::new();
    while order.len() < members.len() {
        let next = members
            .iter()
            .copied()
            .filter(|index| !emitted.contains(index))
            .filter(|index| {
                depends_on[*index]
                    .iter()
                    .all(|dep| !members.contains(dep) || emitted.contains(dep))
            })
            .min_by(|a, b| units[*a].path.cmp(&units[*b].path));
        match next {
            Some(index) => {
                emitted.insert(index);
                order.push(index);
            }
            // Unreachable once cycles are rejected.
            None => break,
        }
    }
    order
}
