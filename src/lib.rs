//! # nb2cwl - Notebook to Workflow Transpiler
//!
//! **nb2cwl** turns annotated Jupyter notebooks into Common Workflow
//! Language (CWL) v1.1 documents that a workflow engine such as `cwltool`
//! can execute without any interactive runtime. Conversion is entirely
//! static: notebook code is scanned and rewritten, never executed.
//!
//! ## Core Workflow
//!
//! 1. **Annotate**: in the notebook, mark each workflow input and output
//!    with a type annotation from the `ipython2cwl` marker vocabulary,
//!    e.g. `datafilename: CWLFilePathInput = 'data.yaml'`.
//! 2. **Convert**: point a [`project::RepositoryConverter`] at the
//!    notebook (or a directory of notebooks) and an existing output
//!    directory. The converter discovers every notebook, scans the
//!    annotations, resolves notebook-to-notebook imports into a
//!    dependency graph and synthesizes one parameter-driven Python script
//!    per notebook.
//! 3. **Emit**: each entry point (a notebook no other notebook imports)
//!    becomes one `.cwl` document. A notebook without imports yields a
//!    `CommandLineTool`; a notebook importing others yields a `Workflow`
//!    whose steps embed the tools and wire imported outputs to the
//!    importer's inputs.
//! 4. **Run**: hand the emitted document plus concrete input values to
//!    the workflow engine.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nb2cwl::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let report = RepositoryConverter::new("./notebooks", "./cwl")
//!         .convert()?;
//!     for document in &report.documents {
//!         println!("wrote {}", document.display());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Annotation Markers
//!
//! Inputs: `CWLFilePathInput` (`File`), `CWLStringInput` (`string`),
//! `CWLIntInput` (`int`), `CWLBooleanInput` (`boolean`), plus the
//! `List[...]` forms of the first three (`File[]`, `string[]`, `int[]`).
//! Outputs: `CWLFilePathOutput` (a `File` collected from the path the
//! variable holds) and `CWLDumpableFile` (a `File` whose content is the
//! variable's value). A marker must annotate a plain top-level variable
//! binding with an initializer; anything else in the marker namespace is
//! rejected with a precise source location.
//!
//! ## Process Boundary
//!
//! Synthesized scripts take their inputs as positional CLI arguments in
//! declaration order and materialize each output in the working directory
//! as a file named exactly after its variable. The encoding convention
//! per type lives in [`cwl::types`] and is shared verbatim between the
//! generated Python and the emitted documents.

pub mod cwl;
pub mod error;
pub mod notebook;
pub mod prelude;
pub mod project;
pub mod synthesize;
