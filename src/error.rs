use crate::cwl::types::CwlType;
use crate::notebook::SourceLocation;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while scanning a notebook's cells for annotated variables.
#[derive(Error, Debug, Clone)]
pub enum AnnotationError {
    #[error("malformed annotation marker '{marker}' at {location}")]
    MalformedMarker {
        marker: String,
        location: SourceLocation,
    },

    #[error("annotated variable '{name}' at {location} has no initializer")]
    MissingInitializer {
        name: String,
        location: SourceLocation,
    },

    #[error("annotated binding at {location} must target a plain variable, found '{target}'")]
    ComplexTarget {
        target: String,
        location: SourceLocation,
    },

    #[error("initializer of '{name}' at {location} does not terminate on the binding line")]
    UnterminatedBinding {
        name: String,
        location: SourceLocation,
    },

    #[error("variable '{name}' at {location} was already declared at {previous}")]
    DuplicateVariable {
        name: String,
        location: SourceLocation,
        previous: SourceLocation,
    },

    #[error(
        "variable '{name}' at {location} is declared as both an input and an output (other declaration at {previous})"
    )]
    RoleConflict {
        name: String,
        location: SourceLocation,
        previous: SourceLocation,
    },
}

/// Raised when a marker inside the annotation namespace has no entry in the
/// type mapping table.
#[derive(Error, Debug, Clone)]
#[error("annotation marker '{marker}' at {location} has no CWL type mapping")]
pub struct UnsupportedTypeError {
    pub marker: String,
    pub location: SourceLocation,
}

/// Umbrella for the two failure classes the scanner can hit on one cell.
#[derive(Error, Debug, Clone)]
pub enum ScanError {
    #[error(transparent)]
    Annotation(#[from] AnnotationError),

    #[error(transparent)]
    UnsupportedType(#[from] UnsupportedTypeError),
}

/// Errors raised by the reference codec when decoding an argument token.
#[derive(Error, Debug, Clone)]
pub enum ValueDecodeError {
    #[error("token '{token}' is not a valid integer")]
    InvalidInteger { token: String },

    #[error("token '{token}' is not a boolean; expected 'true' or 'false'")]
    InvalidBoolean { token: String },
}

/// Errors raised while rewriting a notebook into a linear script.
#[derive(Error, Debug, Clone)]
pub enum SynthesisError {
    #[error(
        "output '{output}' at {output_location} references input '{input}' declared later at {input_location}; execution order must match textual order"
    )]
    ForwardReference {
        output: String,
        input: String,
        output_location: SourceLocation,
        input_location: SourceLocation,
    },
}

/// Raised when a data edge would connect two ports of different CWL types.
#[derive(Error, Debug, Clone)]
#[error(
    "type mismatch on data edge {source_step}/{source_port} ({source_type}) -> {target_step}/{target_port} ({target_type})"
)]
pub struct TypeMismatchError {
    pub source_step: String,
    pub source_port: String,
    pub source_type: CwlType,
    pub target_step: String,
    pub target_port: String,
    pub target_type: CwlType,
}

/// Top-level error for a conversion run. Every failure is fatal for the run
/// and is raised before any document reaches the output directory.
#[derive(Error, Debug, Clone)]
pub enum ConversionError {
    #[error("{}: {source}", .path.display())]
    Annotation {
        path: PathBuf,
        source: AnnotationError,
    },

    #[error("{}: {source}", .path.display())]
    UnsupportedType {
        path: PathBuf,
        source: UnsupportedTypeError,
    },

    #[error("{}: {source}", .path.display())]
    Synthesis {
        path: PathBuf,
        source: SynthesisError,
    },

    #[error(transparent)]
    TypeMismatch(#[from] TypeMismatchError),

    #[error("cyclic notebook imports: {}", format_cycle(.cycle))]
    CyclicImport { cycle: Vec<PathBuf> },

    #[error("{}: cannot resolve import of '{module}' at {location}: {reason}", .importer.display())]
    UnresolvedImport {
        importer: PathBuf,
        module: String,
        location: SourceLocation,
        reason: String,
    },

    #[error("output directory '{}' does not exist", .path.display())]
    OutputDirectory { path: PathBuf },

    #[error("'{}' is not a valid notebook: {message}", .path.display())]
    NotebookParse { path: PathBuf, message: String },

    #[error("failed to render '{}': {message}", .path.display())]
    Render { path: PathBuf, message: String },

    #[error("i/o failure on '{}': {message}", .path.display())]
    Io { path: PathBuf, message: String },

    #[error("selected entry point '{}' was not discovered under the project root", .path.display())]
    UnknownEntryPoint { path: PathBuf },
}

fn format_cycle(cycle: &[PathBuf]) -> String {
    cycle
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}
