//! Deserialization of the on-disk nbformat JSON into the document model.

use super::{Cell, CellKind, Notebook};
use crate::error::ConversionError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct RawNotebook {
    #[serde(default)]
    nbformat: Option<u64>,
    cells: Vec<RawCell>,
}

#[derive(Debug, Deserialize)]
struct RawCell {
    cell_type: String,
    source: RawSource,
}

/// nbformat stores cell source either as a list of lines with their
/// trailing newlines or as a single string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawSource {
    Lines(Vec<String>),
    Text(String),
}

impl RawSource {
    fn into_text(self) -> String {
        match self {
            RawSource::Lines(lines) => lines.concat(),
            RawSource::Text(text) => text,
        }
    }
}

/// Reads and parses the notebook at `path`.
pub fn load_notebook(path: &Path) -> Result<Notebook, ConversionError> {
    let json = fs::read_to_string(path).map_err(|err| ConversionError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    parse_notebook(path, &json)
}

/// Parses notebook JSON; `path` names the notebook and scopes errors.
///
/// Only nbformat 4.x layouts are accepted. Cell kinds other than `code`,
/// `markdown` and `raw` are kept as raw cells and ignored downstream.
pub fn parse_notebook(path: &Path, json: &str) -> Result<Notebook, ConversionError> {
    let parse_error = |message: String| ConversionError::NotebookParse {
        path: path.to_path_buf(),
        message,
    };
    let raw: RawNotebook = serde_json::from_str(json).map_err(|err| parse_error(err.to_string()))?;
    if let Some(version) = raw.nbformat {
        if version < 4 {
            return Err(parse_error(format!(
                "unsupported nbformat {version}, expected 4 or newer"
            )));
        }
    }
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let cells = raw
        .cells
        .into_iter()
        .map(|cell| Cell {
            kind: match cell.cell_type.as_str() {
                "code" => CellKind::Code,
                "markdown" => CellKind::Markdown,
                _ => CellKind::Raw,
            },
            source: cell.source.into_text(),
        })
        .collect();
    Ok(Notebook { name, cells })
}
