//! Line-level static scan of code cells.
//!
//! The scan is purely textual and looks only at column-0 statements, so
//! bindings and imports nested inside function bodies, loops or
//! conditionals pass through as ordinary script code. Lines inside a
//! triple-quoted string are content, not statements, and are never
//! matched. An annotated binding must complete on its own line; multi-line
//! initializers are rejected rather than silently truncated.

use super::{
    AnnotatedVariable, ImportKind, ImportStatement, ImportedSymbol, Notebook, SourceLocation,
};
use crate::cwl::types::{self, Role};
use crate::error::{AnnotationError, ScanError, UnsupportedTypeError};
use ahash::AHashMap;
use regex::Regex;

/// Everything the scan extracted from one notebook.
#[derive(Debug, Clone, Default)]
pub struct NotebookScan {
    pub variables: Vec<AnnotatedVariable>,
    pub imports: Vec<ImportStatement>,
}

impl NotebookScan {
    pub fn inputs(&self) -> impl Iterator<Item = &AnnotatedVariable> {
        self.variables
            .iter()
            .filter(|variable| variable.role == Role::Input)
    }

    pub fn outputs(&self) -> impl Iterator<Item = &AnnotatedVariable> {
        self.variables
            .iter()
            .filter(|variable| variable.role == Role::Output)
    }
}

/// First word of statements that can legally carry a colon without being an
/// annotated assignment. Lines opening with one of these are never bindings.
const STATEMENT_KEYWORDS: &[&str] = &[
    "assert", "async", "await", "break", "case", "class", "continue", "def", "del", "elif", "else",
    "except", "finally", "for", "from", "global", "if", "import", "lambda", "match", "nonlocal",
    "pass", "raise", "return", "try", "while", "with", "yield",
];

/// Extracts annotated bindings and import statements from code cells.
pub struct AnnotationScanner {
    binding: Regex,
    annotated: Regex,
    well_formed: Regex,
    import_stmt: Regex,
    from_import: Regex,
}

impl AnnotationScanner {
    pub fn new() -> Self {
        let compile = |pattern: &str| Regex::new(pattern).expect("scanner pattern compiles");
        Self {
            binding: compile(
                r"^(?P<name>[A-Za-z_][A-Za-z0-9_]*)\s*:\s*(?P<ann>[^=]+?)\s*(?:=\s*(?P<init>.*))?$",
            ),
            annotated: compile(r"^(?P<target>[^\s=#][^=:#]*?)\s*:\s*(?P<ann>[^=]+?)\s*(?:=.*)?$"),
            well_formed: compile(r"^(?:CWL[A-Za-z0-9_]*|List\[CWL[A-Za-z0-9_]*\])$"),
            import_stmt: compile(r"^import\s+(?P<rest>.+)$"),
            from_import: compile(
                r"^from\s+(?P<module>\.*[A-Za-z_][A-Za-z0-9_.]*|\.+)\s+import\s+(?P<what>.+)$",
            ),
        }
    }

    /// Scans all code cells of `notebook` in document order.
    ///
    /// Declarations are validated as they appear: a name may carry at most
    /// one annotation across the whole notebook, and a marker that belongs
    /// to the annotation namespace must be well formed and known to the
    /// type table.
    pub fn scan(&self, notebook: &Notebook) -> Result<NotebookScan, ScanError> {
        let mut scan = NotebookScan::default();
        let mut declared: AHashMap<String, (Role, SourceLocation)> = AHashMap::new();
        for (cell_index, cell) in notebook.code_cells() {
            let mut strings = TripleQuoteTracker::default();
            for (line_index, line) in cell.lines().enumerate() {
                let location = SourceLocation {
                    cell: cell_index,
                    line: line_index + 1,
                };
                if strings.consume(line) {
                    continue;
                }
                if line.is_empty() || line.starts_with(|c: char| c.is_whitespace()) {
                    continue;
                }
                if let Some(imports) = self.match_import(line, location) {
                    scan.imports.extend(imports);
                    continue;
                }
                if let Some(variable) = self.match_binding(line, location)? {
                    if let Some((role, previous)) = declared.get(&variable.name) {
                        let error = if *role == variable.role {
                            AnnotationError::DuplicateVariable {
                                name: variable.name,
                                location,
                                previous: *previous,
                            }
                        } else {
                            AnnotationError::RoleConflict {
                                name: variable.name,
                                location,
                                previous: *previous,
                            }
                        };
                        return Err(error.into());
                    }
                    declared.insert(variable.name.clone(), (variable.role, location));
                    scan.variables.push(variable);
                }
            }
        }
        Ok(scan)
    }

    fn match_binding(
        &self,
        line: &str,
        location: SourceLocation,
    ) -> Result<Option<AnnotatedVariable>, ScanError> {
        if let Some(caps) = self.binding.captures(line) {
            let annotation = types::normalize_marker(&caps["ann"]);
            if !types::is_annotation_marker(&annotation) {
                return Ok(None);
            }
            if !self.well_formed.is_match(&annotation) {
                return Err(AnnotationError::MalformedMarker {
                    marker: annotation,
                    location,
                }
                .into());
            }
            let Some(binding) = types::lookup_marker(&annotation) else {
                return Err(UnsupportedTypeError {
                    marker: annotation,
                    location,
                }
                .into());
            };
            let name = caps["name"].to_string();
            let initializer = caps
                .name("init")
                .map(|init| strip_trailing_comment(init.as_str()).trim().to_string())
                .unwrap_or_default();
            if initializer.is_empty() {
                return Err(AnnotationError::MissingInitializer { name, location }.into());
            }
            if is_unterminated(&initializer) {
                return Err(AnnotationError::UnterminatedBinding { name, location }.into());
            }
            return Ok(Some(AnnotatedVariable {
                name,
                role: binding.role,
                ty: binding.ty,
                dump: binding.dump,
                location,
                initializer,
            }));
        }
        if let Some(head) = line.split_whitespace().next() {
            if STATEMENT_KEYWORDS.contains(&head.trim_end_matches(':')) {
                return Ok(None);
            }
        }
        // Annotated assignment whose target is not a plain name.
        if let Some(caps) = self.annotated.captures(line) {
            let annotation = types::normalize_marker(&caps["ann"]);
            if types::is_annotation_marker(&annotation) {
                return Err(AnnotationError::ComplexTarget {
                    target: caps["target"].trim().to_string(),
                    location,
                }
                .into());
            }
        }
        Ok(None)
    }

    /// Recognizes single-line import statements. `import a, b` yields one
    /// statement per module. Lines that look import-like but do not parse
    /// cleanly are left to pass through as plain code.
    fn match_import(&self, line: &str, location: SourceLocation) -> Option<Vec<ImportStatement>> {
        let statement = strip_trailing_comment(line).trim_end();
        if let Some(caps) = self.from_import.captures(statement) {
            let module = caps["module"].to_string();
            let what = caps["what"].trim();
            let what = what
                .strip_prefix('(')
                .and_then(|inner| inner.strip_suffix(')'))
                .map(str::trim)
                .unwrap_or(what);
            let kind = if what == "*" {
                ImportKind::Star
            } else {
                let mut symbols = Vec::new();
                for item in what.split(',') {
                    let item = item.trim();
                    if item.is_empty() {
                        continue;
                    }
                    symbols.push(parse_symbol(item)?);
                }
                ImportKind::Symbols(symbols)
            };
            return Some(vec![ImportStatement {
                module,
                kind,
                location,
            }]);
        }
        if let Some(caps) = self.import_stmt.captures(statement) {
            let mut statements = Vec::new();
            for item in caps["rest"].split(',') {
                let item = item.trim();
                if item.is_empty() {
                    continue;
                }
                let (module, _alias) = split_alias(item)?;
                if !is_module_path(module) {
                    return None;
                }
                statements.push(ImportStatement {
                    module: module.to_string(),
                    kind: ImportKind::Module,
                    location,
                });
            }
            return Some(statements);
        }
        None
    }
}

impl Default for AnnotationScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks triple-quoted strings across the lines of one cell. A line that
/// begins inside one is string content, not a statement, and must not be
/// scanned or rewritten.
#[derive(Debug, Default)]
pub(crate) struct TripleQuoteTracker {
    open: Option<u8>,
}

impl TripleQuoteTracker {
    /// Advances the state over one line. Returns true when the line began
    /// inside a triple-quoted string. Quote delimiters are ASCII, so the
    /// walk is byte-wise.
    pub(crate) fn consume(&mut self, line: &str) -> bool {
        let began_inside = self.open.is_some();
        let bytes = line.as_bytes();
        let mut index = 0;
        let mut single: Option<u8> = None;
        while index < bytes.len() {
            let byte = bytes[index];
            if let Some(open) = self.open {
                if byte == b'\\' {
                    index += 2;
                } else if byte == open
                    && bytes.get(index + 1) == Some(&open)
                    && bytes.get(index + 2) == Some(&open)
                {
                    self.open = None;
                    index += 3;
                } else {
                    index += 1;
                }
                continue;
            }
            if let Some(open) = single {
                if byte == b'\\' {
                    index += 2;
                } else {
                    if byte == open {
                        single = None;
                    }
                    index += 1;
                }
                continue;
            }
            match byte {
                b'#' => break,
                b'\'' | b'"' => {
                    if bytes.get(index + 1) == Some(&byte) && bytes.get(index + 2) == Some(&byte) {
                        self.open = Some(byte);
                        index += 3;
                    } else {
                        single = Some(byte);
                        index += 1;
                    }
                }
                _ => index += 1,
            }
        }
        began_inside
    }
}

/// Truncates `text` at the first `#` that is not inside a string literal.
fn strip_trailing_comment(text: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (index, c) in text.char_indices() {
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
            '\'' | '"' => quote = Some(c),
            '#' => return &text[..index],
            _ => {}
        }
    }
    text
}

/// True when the initializer opens a bracket or string it never closes, or
/// ends in a line continuation.
fn is_unterminated(initializer: &str) -> bool {
    let mut depth: i64 = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in initializer.chars() {
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
            '\'' | '"' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            _ => {}
        }
    }
    depth > 0 || quote.is_some() || initializer.trim_end().ends_with('\\')
}

fn split_alias(item: &str) -> Option<(&str, Option<&str>)> {
    let mut parts = item.split_whitespace();
    let name = parts.next()?;
    match (parts.next(), parts.next(), parts.next()) {
        (None, _, _) => Some((name, None)),
        (Some("as"), Some(alias), None) => Some((name, Some(alias))),
        _ => None,
    }
}

fn parse_symbol(item: &str) -> Option<ImportedSymbol> {
    let (name, alias) = split_alias(item)?;
    if !is_identifier(name) {
        return None;
    }
    if let Some(alias) = alias {
        if !is_identifier(alias) {
            return None;
        }
    }
    Some(ImportedSymbol {
        name: name.to_string(),
        alias: alias.map(str::to_string),
    })
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some(first) if first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_module_path(text: &str) -> bool {
    !text.is_empty()
        && text
            .split('.')
            .all(|segment| segment.is_empty() || is_identifier(segment))
}
