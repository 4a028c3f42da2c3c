//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types from the nb2cwl
//! crate. Import this module to get access to the core functionality
//! without having to import each type individually.
//!
//! # Example
//!
//! ```rust,no_run
//! use nb2cwl::prelude::*;
//!
//! # fn run_example() -> Result<()> {
//! let report = RepositoryConverter::new("./notebooks", "./cwl")
//!     .with_entry_points(vec!["analysis.ipynb".into()])
//!     .convert()?;
//! println!("{} documents written", report.documents.len());
//! # Ok(())
//! # }
//! ```

// Conversion pipeline
pub use crate::project::{ConversionReport, NotebookUnit, RepositoryConverter};

// Notebook model and scanning
pub use crate::notebook::{AnnotatedVariable, AnnotationScanner, Notebook, NotebookScan};

// CWL documents and the type table
pub use crate::cwl::types::{CwlType, CwlValue, Role};
pub use crate::cwl::{CommandLineTool, CwlDocument, Workflow};

// Error types
pub use crate::error::{AnnotationError, ConversionError, SynthesisError};

// Standard library re-exports commonly used with this crate
pub use std::path::{Path, PathBuf};

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
