//! Rewrites a scanned notebook into a parameter-driven Python script.
//!
//! The script is the notebook's code cells in document order with four
//! rewrites applied. Annotated input bindings become positional `sys.argv`
//! reads, numbered by declaration order. Annotated output bindings drop
//! their annotation and keep their initializer. Imports of the annotation
//! classes and imports the caller resolved to other notebooks are removed,
//! since those values arrive through the CLI instead. An epilogue finally
//! materializes every output in the working directory as a file named
//! exactly after its variable, which is what the emitted documents glob
//! for.
//!
//! Line magics (`%`) and shell escapes (`!`) at column 0 are dropped, and a
//! cell opening with a `%%` cell magic is not Python at all and is dropped
//! whole. Lines inside a triple-quoted string are string content and are
//! carried verbatim.

use crate::cwl::types::{ANNOTATION_NAMESPACE, Role};
use crate::error::SynthesisError;
use crate::notebook::{
    AnnotatedVariable, Cell, Notebook, NotebookScan, SourceLocation, TripleQuoteTracker,
};
use ahash::{AHashMap, AHashSet};
use itertools::Itertools;

/// Synthesizes the script for `notebook`.
///
/// `suppressed_imports` holds the locations of import statements that
/// resolve to other notebooks of the project; the caller owns that
/// resolution. Fails when an output initializer references an input that is
/// only declared further down, because the linear script would read an
/// unbound name.
pub fn synthesize_script(
    notebook: &Notebook,
    scan: &NotebookScan,
    suppressed_imports: &AHashSet<SourceLocation>,
) -> Result<String, SynthesisError> {
    check_forward_references(scan)?;

    let mut replacements: AHashMap<SourceLocation, String> = AHashMap::new();
    let mut position = 0usize;
    for variable in &scan.variables {
        let line = match variable.role {
            Role::Input => {
                position += 1;
                format!(
                    "{} = {}",
                    variable.name,
                    variable.ty.python_reader(position)
                )
            }
            Role::Output => format!("{} = {}", variable.name, variable.initializer),
        };
        replacements.insert(variable.location, line);
    }
    let dropped: AHashSet<SourceLocation> = scan
        .imports
        .iter()
        .filter(|import| {
            suppressed_imports.contains(&import.location) || is_annotation_import(&import.module)
        })
        .map(|import| import.location)
        .collect();

    let has_inputs = scan.inputs().next().is_some();
    let has_outputs = scan.outputs().next().is_some();
    let mut prologue = vec![format!("# Script generated from {}.", notebook.name)];
    if has_inputs {
        prologue.push("import sys".to_string());
    }
    if has_outputs {
        prologue.push("from pathlib import Path".to_string());
    }

    let mut sections: Vec<Vec<String>> = vec![prologue];
    for (cell_index, cell) in notebook.code_cells() {
        if is_cell_magic(cell) {
            continue;
        }
        let mut body: Vec<String> = Vec::new();
        let mut strings = TripleQuoteTracker::default();
        for (line_index, line) in cell.lines().enumerate() {
            let location = SourceLocation {
                cell: cell_index,
                line: line_index + 1,
            };
            let string_content = strings.consume(line);
            if dropped.contains(&location) {
                continue;
            }
            if !string_content && (line.starts_with('%') || line.starts_with('!')) {
                continue;
            }
            match replacements.get(&location) {
                Some(replacement) => body.push(replacement.clone()),
                None => body.push(line.to_string()),
            }
        }
        trim_blank_edges(&mut body);
        if !body.is_empty() {
            sections.push(body);
        }
    }
    if has_outputs {
        sections.push(scan.outputs().map(materialize_line).collect());
    }

    let mut script = sections
        .iter()
        .map(|section| section.join("\n"))
        .join("\n\n");
    script.push('\n');
    Ok(script)
}

/// The epilogue statement that materializes one output file.
fn materialize_line(variable: &AnnotatedVariable) -> String {
    if variable.dump {
        format!("Path('{0}').write_text(str({0}))", variable.name)
    } else {
        format!(
            "Path('{0}').write_bytes(Path(str({0})).read_bytes())",
            variable.name
        )
    }
}

fn check_forward_references(scan: &NotebookScan) -> Result<(), SynthesisError> {
    for output in scan.outputs() {
        for name in referenced_names(&output.initializer) {
            if let Some(input) = scan.inputs().find(|input| input.name == name) {
                if input.location > output.location {
                    return Err(SynthesisError::ForwardReference {
                        output: output.name.clone(),
                        input: input.name.clone(),
                        output_location: output.location,
                        input_location: input.location,
                    });
                }
            }
        }
    }
    Ok(())
}

/// Identifiers appearing in `text` outside string literals.
fn referenced_names(text: &str) -> AHashSet<String> {
    let mut cleaned = String::with_capacity(text.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in text.chars() {
        if let Some(open) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == open {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => {
                quote = Some(c);
                cleaned.push(' ');
            }
            _ => cleaned.push(c),
        }
    }
    cleaned
        .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .filter(|word| !word.is_empty() && !word.starts_with(|c: char| c.is_ascii_digit()))
        .map(str::to_string)
        .collect()
}

fn is_annotation_import(module: &str) -> bool {
    match module.strip_prefix(ANNOTATION_NAMESPACE) {
        Some(rest) => rest.is_empty() || rest.starts_with('.'),
        None => false,
    }
}

fn is_cell_magic(cell: &Cell) -> bool {
    cell.lines()
        .find(|line| !line.trim().is_empty())
        .is_some_and(|line| line.starts_with("%%"))
}

fn trim_blank_edges(lines: &mut Vec<String>) {
    while lines.first().is_some_and(|line| line.trim().is_empty()) {
        lines.remove(0);
    }
    while lines.last().is_some_and(|line| line.trim().is_empty()) {
        lines.pop();
    }
}
