//! The type mapping table and the process-boundary value convention.
//!
//! Every recognized annotation marker maps to exactly one [`CwlType`] through
//! a closed table; adding a type means one table entry plus one encode/decode
//! routine pair. The synthesized script and the emitted document never
//! cross-check each other at runtime, so the convention here is normative:
//!
//! - Inputs arrive as positional CLI tokens, one per input, in declared order.
//! - `string`/`File` tokens carry the value or path verbatim.
//! - `int` tokens are canonical base-10.
//! - `boolean` tokens are exactly `true` or `false`.
//! - Array tokens join their items with `\n` (one value per line); the empty
//!   token is the empty array, so items must not contain newlines and a
//!   one-element array holding the empty string is not representable.
//! - Each output is materialized in the step working directory as a file
//!   named exactly after the variable.
//!
//! [`CwlValue`] is the Rust reference codec for that convention; the Python
//! reader expressions injected into synthesized scripts implement the same
//! rules and must stay bit-compatible with it.

use crate::error::ValueDecodeError;
use itertools::Itertools;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::fmt;

/// Whether an annotated variable is a workflow input or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Input,
    Output,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Input => write!(f, "input"),
            Role::Output => write!(f, "output"),
        }
    }
}

/// The declarative type vocabulary of the target CWL schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CwlType {
    File,
    String,
    Integer,
    Boolean,
    StringArray,
    IntegerArray,
    FileArray,
}

impl CwlType {
    /// The CWL type name written into emitted documents.
    pub fn cwl_name(&self) -> &'static str {
        match self {
            CwlType::File => "File",
            CwlType::String => "string",
            CwlType::Integer => "int",
            CwlType::Boolean => "boolean",
            CwlType::StringArray => "string[]",
            CwlType::IntegerArray => "int[]",
            CwlType::FileArray => "File[]",
        }
    }

    /// Parses a CWL type name as written in documents.
    pub fn from_name(name: &str) -> Option<Self> {
        let ty = match name {
            "File" => CwlType::File,
            "string" => CwlType::String,
            "int" => CwlType::Integer,
            "boolean" => CwlType::Boolean,
            "string[]" => CwlType::StringArray,
            "int[]" => CwlType::IntegerArray,
            "File[]" => CwlType::FileArray,
            _ => return None,
        };
        Some(ty)
    }

    pub fn is_array(&self) -> bool {
        matches!(
            self,
            CwlType::StringArray | CwlType::IntegerArray | CwlType::FileArray
        )
    }

    /// Separator the engine uses to join array items into one CLI token.
    pub fn item_separator(&self) -> Option<&'static str> {
        if self.is_array() { Some("\n") } else { None }
    }

    /// Decodes one CLI token into a value of this type (reference codec).
    pub fn decode(&self, token: &str) -> Result<CwlValue, ValueDecodeError> {
        let parse_int = |t: &str| {
            t.parse::<i64>()
                .map_err(|_| ValueDecodeError::InvalidInteger {
                    token: t.to_string(),
                })
        };
        let split = |t: &str| -> Vec<String> {
            if t.is_empty() {
                Vec::new()
            } else {
                t.split('\n').map(str::to_owned).collect()
            }
        };
        match self {
            CwlType::File => Ok(CwlValue::File(token.to_owned())),
            CwlType::String => Ok(CwlValue::String(token.to_owned())),
            CwlType::Integer => Ok(CwlValue::Integer(parse_int(token)?)),
            CwlType::Boolean => match token {
                "true" => Ok(CwlValue::Boolean(true)),
                "false" => Ok(CwlValue::Boolean(false)),
                _ => Err(ValueDecodeError::InvalidBoolean {
                    token: token.to_owned(),
                }),
            },
            CwlType::StringArray => Ok(CwlValue::StringArray(split(token))),
            CwlType::FileArray => Ok(CwlValue::FileArray(split(token))),
            CwlType::IntegerArray => split(token)
                .iter()
                .map(|item| parse_int(item))
                .collect::<Result<Vec<_>, _>>()
                .map(CwlValue::IntegerArray),
        }
    }

    /// The Python expression a synthesized script uses to decode the
    /// positional argument at `position`. Mirrors [`CwlType::decode`].
    pub fn python_reader(&self, position: usize) -> String {
        match self {
            CwlType::File | CwlType::String => format!("sys.argv[{position}]"),
            CwlType::Integer => format!("int(sys.argv[{position}])"),
            CwlType::Boolean => format!("sys.argv[{position}] == 'true'"),
            CwlType::StringArray | CwlType::FileArray => {
                format!("sys.argv[{position}].split('\\n') if sys.argv[{position}] else []")
            }
            CwlType::IntegerArray => format!(
                "[int(x) for x in (sys.argv[{position}].split('\\n') if sys.argv[{position}] else [])]"
            ),
        }
    }
}

impl fmt::Display for CwlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cwl_name())
    }
}

impl Serialize for CwlType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.cwl_name())
    }
}

impl<'de> Deserialize<'de> for CwlType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        CwlType::from_name(&name)
            .ok_or_else(|| de::Error::custom(format!("unknown CWL type '{name}'")))
    }
}

/// A workflow value on the Rust side of the process boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CwlValue {
    File(String),
    String(String),
    Integer(i64),
    Boolean(bool),
    StringArray(Vec<String>),
    IntegerArray(Vec<i64>),
    FileArray(Vec<String>),
}

impl CwlValue {
    pub fn cwl_type(&self) -> CwlType {
        match self {
            CwlValue::File(_) => CwlType::File,
            CwlValue::String(_) => CwlType::String,
            CwlValue::Integer(_) => CwlType::Integer,
            CwlValue::Boolean(_) => CwlType::Boolean,
            CwlValue::StringArray(_) => CwlType::StringArray,
            CwlValue::IntegerArray(_) => CwlType::IntegerArray,
            CwlValue::FileArray(_) => CwlType::FileArray,
        }
    }

    /// Encodes this value as the single CLI token the engine passes.
    pub fn encode(&self) -> String {
        match self {
            CwlValue::File(path) => path.clone(),
            CwlValue::String(value) => value.clone(),
            CwlValue::Integer(value) => value.to_string(),
            CwlValue::Boolean(true) => "true".to_string(),
            CwlValue::Boolean(false) => "false".to_string(),
            CwlValue::StringArray(items) | CwlValue::FileArray(items) => items.iter().join("\n"),
            CwlValue::IntegerArray(items) => items.iter().join("\n"),
        }
    }
}

/// How an annotation marker behaves: the role and type it declares, and for
/// outputs whether the variable holds the file content rather than its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerBinding {
    pub role: Role,
    pub ty: CwlType,
    pub dump: bool,
}

const fn binding(role: Role, ty: CwlType, dump: bool) -> MarkerBinding {
    MarkerBinding { role, ty, dump }
}

/// The closed marker vocabulary. Compatible with the `ipython2cwl` annotation
/// classes researchers already use in notebooks.
const MARKER_TABLE: &[(&str, MarkerBinding)] = &[
    ("CWLFilePathInput", binding(Role::Input, CwlType::File, false)),
    ("CWLStringInput", binding(Role::Input, CwlType::String, false)),
    ("CWLIntInput", binding(Role::Input, CwlType::Integer, false)),
    ("CWLBooleanInput", binding(Role::Input, CwlType::Boolean, false)),
    (
        "List[CWLFilePathInput]",
        binding(Role::Input, CwlType::FileArray, false),
    ),
    (
        "List[CWLStringInput]",
        binding(Role::Input, CwlType::StringArray, false),
    ),
    (
        "List[CWLIntInput]",
        binding(Role::Input, CwlType::IntegerArray, false),
    ),
    (
        "CWLFilePathOutput",
        binding(Role::Output, CwlType::File, false),
    ),
    ("CWLDumpableFile", binding(Role::Output, CwlType::File, true)),
];

/// Module prefix of the annotation classes; imports of it are dropped during
/// synthesis because the classes do not exist in the batch runtime.
pub const ANNOTATION_NAMESPACE: &str = "ipython2cwl";

/// Normalizes an annotation expression to its table spelling: surrounding
/// quotes stripped, whitespace removed, `list[…]`/`typing.List[…]` folded to
/// `List[…]`, qualified marker names reduced to their bare form.
pub fn normalize_marker(raw: &str) -> String {
    let mut text = raw.trim().to_string();
    for quote in ['\'', '"'] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            text = text[1..text.len() - 1].to_string();
        }
    }
    text.retain(|c| !c.is_whitespace());
    text = text
        .replace("ipython2cwl.iotypes.", "")
        .replace("typing.", "");
    if let Some(rest) = text.strip_prefix("list[") {
        text = format!("List[{rest}");
    }
    text
}

/// True when a normalized annotation belongs to the marker namespace and is
/// therefore the scanner's business rather than ordinary code.
pub fn is_annotation_marker(normalized: &str) -> bool {
    normalized.starts_with("CWL") || normalized.starts_with("List[CWL")
}

/// Looks up a normalized marker in the mapping table.
pub fn lookup_marker(normalized: &str) -> Option<MarkerBinding> {
    MARKER_TABLE
        .iter()
        .find(|(name, _)| *name == normalized)
        .map(|(_, b)| *b)
}
