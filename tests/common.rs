//! Common test utilities for building notebooks and project trees.
use nb2cwl::notebook::{self, Notebook, NotebookScan};
use nb2cwl::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Builds nbformat 4 JSON from `(cell_type, source)` pairs, source given
/// as one string.
#[allow(dead_code)]
pub fn notebook_json(cells: &[(&str, &str)]) -> String {
    let cells: Vec<serde_json::Value> = cells
        .iter()
        .map(|(kind, source)| {
            serde_json::json!({
                "cell_type": kind,
                "metadata": {},
                "execution_count": null,
                "outputs": [],
                "source": source,
            })
        })
        .collect();
    serde_json::json!({
        "cells": cells,
        "metadata": {},
        "nbformat": 4,
        "nbformat_minor": 2,
    })
    .to_string()
}

/// Builds a single-code-cell notebook whose source uses the nbformat
/// list-of-lines layout (trailing newlines included).
#[allow(dead_code)]
pub fn notebook_json_with_line_source(lines: &[&str]) -> String {
    serde_json::json!({
        "cells": [{
            "cell_type": "code",
            "metadata": {},
            "execution_count": null,
            "outputs": [],
            "source": lines,
        }],
        "metadata": {},
        "nbformat": 4,
        "nbformat_minor": 2,
    })
    .to_string()
}

/// Parses notebook JSON under the given file name.
#[allow(dead_code)]
pub fn parse(name: &str, json: &str) -> Notebook {
    notebook::parse_notebook(Path::new(name), json).expect("Failed to parse notebook JSON")
}

/// Parses and scans a notebook in one go.
#[allow(dead_code)]
pub fn scan(name: &str, json: &str) -> NotebookScan {
    AnnotationScanner::new()
        .scan(&parse(name, json))
        .expect("Failed to scan notebook")
}

/// Writes the given `(relative path, notebook JSON)` pairs into a fresh
/// temporary project root.
#[allow(dead_code)]
pub fn project_with(files: &[(&str, String)]) -> TempDir {
    let dir = tempfile::tempdir().expect("Failed to create project dir");
    for (relative, json) in files {
        let path = dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create notebook directory");
        }
        fs::write(&path, json).expect("Failed to write notebook");
    }
    dir
}

/// A leaf notebook shaped like the shipped example: it reads a data file,
/// bumps its first entry and joins a list of messages.
#[allow(dead_code)]
pub fn leaf_example_json() -> String {
    notebook_json(&[
        ("markdown", "# Example pipeline step"),
        (
            "code",
            "from ipython2cwl.iotypes import CWLFilePathInput, CWLStringInput, CWLFilePathOutput, CWLDumpableFile\nfrom typing import List",
        ),
        (
            "code",
            "datafilename: CWLFilePathInput = 'data.yaml'\nmessages: List[CWLStringInput] = ['hello', 'test', '!!!']",
        ),
        (
            "code",
            "with open(datafilename) as stream:\n    lines = stream.readlines()\nlines[0] = 'entry1: 2\\n'",
        ),
        (
            "code",
            "results_filename: CWLFilePathOutput = 'results.yaml'\nwith open(results_filename, 'w') as stream:\n    stream.writelines(lines)\nmessages_outputs: CWLDumpableFile = ' '.join(messages)",
        ),
    ])
}

/// The dependency side of the composite example: produces one file
/// output and takes no inputs.
#[allow(dead_code)]
pub fn imported_example_json() -> String {
    notebook_json(&[
        (
            "code",
            "from ipython2cwl.iotypes import CWLFilePathOutput",
        ),
        (
            "code",
            "resultsFilename: CWLFilePathOutput = 'results.txt'\nwith open(resultsFilename, 'w') as stream:\n    stream.write('entry1: 1\\n')",
        ),
    ])
}

/// The entry side of the composite example: wires the imported
/// `resultsFilename` into its own `datafilename` input.
#[allow(dead_code)]
pub fn importer_example_json() -> String {
    notebook_json(&[
        (
            "code",
            "from ipython2cwl.iotypes import CWLFilePathInput, CWLStringInput, CWLFilePathOutput\nfrom typing import List",
        ),
        (
            "code",
            "from example1_import import resultsFilename as datafilename",
        ),
        (
            "code",
            "datafilename: CWLFilePathInput = 'results.txt'\nmessages: List[CWLStringInput] = ['hello', 'world']",
        ),
        (
            "code",
            "final_results: CWLFilePathOutput = 'final.txt'\nwith open(datafilename) as stream:\n    content = stream.read()\nwith open(final_results, 'w') as stream:\n    stream.write(content + ' '.join(messages))",
        ),
    ])
}
