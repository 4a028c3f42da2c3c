//! The notebook document model and the static annotation scan.
//!
//! A [`Notebook`] is the in-memory form of an `.ipynb` file: an ordered list
//! of cells with their source text. [`load_notebook`] and [`parse_notebook`]
//! build one from JSON; [`AnnotationScanner`] then walks the code cells and
//! extracts the annotated bindings and import statements that drive
//! synthesis and workflow assembly. Nothing in this module executes
//! notebook code.

mod raw;
mod scan;

pub use raw::{load_notebook, parse_notebook};
pub use scan::{AnnotationScanner, NotebookScan};
pub(crate) use scan::TripleQuoteTracker;

use crate::cwl::types::{CwlType, Role};
use std::fmt;

/// Position of a statement inside a notebook, counted 1-based over all
/// cells and over the lines of a cell. Ordering follows textual order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceLocation {
    pub cell: usize,
    pub line: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell {}, line {}", self.cell, self.line)
    }
}

/// The nbformat cell kinds; only code cells carry scannable statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Code,
    Markdown,
    Raw,
}

/// One notebook cell with its source joined into a single string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub kind: CellKind,
    pub source: String,
}

impl Cell {
    pub fn is_code(&self) -> bool {
        self.kind == CellKind::Code
    }

    pub fn lines(&self) -> std::str::Lines<'_> {
        self.source.lines()
    }
}

/// A parsed notebook, named after its file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notebook {
    /// File name without directories, e.g. `analysis.ipynb`.
    pub name: String,
    pub cells: Vec<Cell>,
}

impl Notebook {
    /// Iterates the code cells with their 1-based cell index.
    pub fn code_cells(&self) -> impl Iterator<Item = (usize, &Cell)> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.is_code())
            .map(|(index, cell)| (index + 1, cell))
    }
}

/// A top-level variable bound to an annotation marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedVariable {
    pub name: String,
    pub role: Role,
    pub ty: CwlType,
    /// Output variable holds the file content to write rather than a path.
    pub dump: bool,
    pub location: SourceLocation,
    /// Verbatim right-hand side of the binding.
    pub initializer: String,
}

/// A top-level import statement found during the scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportStatement {
    /// Dotted module path as written, leading dots preserved for relative
    /// imports.
    pub module: String,
    pub kind: ImportKind,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportKind {
    /// `import module` or `import module as alias`.
    Module,
    /// `from module import *`.
    Star,
    /// `from module import a, b as c`.
    Symbols(Vec<ImportedSymbol>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedSymbol {
    pub name: String,
    pub alias: Option<String>,
}

impl ImportedSymbol {
    /// The name the symbol is bound to in the importing notebook.
    pub fn local_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}
