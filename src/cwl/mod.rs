//! The CWL v1.1 document model and its YAML rendering.
//!
//! Documents are plain serde structs rendered with `serde_yaml`. Field
//! order is fixed by the struct definitions and every collection is an
//! array rather than a map, so declaration order stays visible and
//! rendering the same project twice yields byte-identical text. Each
//! step's tool is embedded inline under `run`, keeping one self-contained
//! document per entry point.

pub mod emit;
pub mod types;

use serde::{Deserialize, Serialize};
use types::CwlType;

pub const CWL_VERSION: &str = "v1.1";
pub const TOOL_CLASS: &str = "CommandLineTool";
pub const WORKFLOW_CLASS: &str = "Workflow";

/// Either document form an entry point can produce. Untagged so reading a
/// document back picks the shape from its structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CwlDocument {
    Tool(CommandLineTool),
    Workflow(Workflow),
}

impl CwlDocument {
    pub fn id(&self) -> &str {
        match self {
            CwlDocument::Tool(tool) => &tool.id,
            CwlDocument::Workflow(workflow) => &workflow.id,
        }
    }

    /// Renders the document as YAML text.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

/// A single-step tool description invoking one synthesized script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandLineTool {
    #[serde(rename = "cwlVersion")]
    pub cwl_version: String,
    pub class: String,
    pub id: String,
    #[serde(rename = "baseCommand")]
    pub base_command: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<Requirement>,
    pub inputs: Vec<ToolInput>,
    pub outputs: Vec<ToolOutput>,
}

/// Tool requirements: staging of the synthesized script, plus expression
/// support whenever a binding carries a `valueFrom`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "class")]
pub enum Requirement {
    InitialWorkDirRequirement { listing: Vec<Dirent> },
    InlineJavascriptRequirement,
}

/// One file staged into the step working directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dirent {
    pub entryname: String,
    pub entry: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInput {
    pub id: String,
    #[serde(rename = "type")]
    pub ty: CwlType,
    #[serde(rename = "inputBinding")]
    pub input_binding: InputBinding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputBinding {
    pub position: usize,
    #[serde(
        rename = "itemSeparator",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub item_separator: Option<String>,
    #[serde(rename = "valueFrom", default, skip_serializing_if = "Option::is_none")]
    pub value_from: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub id: String,
    #[serde(rename = "type")]
    pub ty: CwlType,
    #[serde(rename = "outputBinding")]
    pub output_binding: OutputBinding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputBinding {
    pub glob: String,
}

/// A multi-step document wiring one entry-point notebook to the notebooks
/// it imports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(rename = "cwlVersion")]
    pub cwl_version: String,
    pub class: String,
    pub id: String,
    pub inputs: Vec<WorkflowInput>,
    pub outputs: Vec<WorkflowOutput>,
    pub steps: Vec<WorkflowStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInput {
    pub id: String,
    #[serde(rename = "type")]
    pub ty: CwlType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowOutput {
    pub id: String,
    #[serde(rename = "type")]
    pub ty: CwlType,
    #[serde(rename = "outputSource")]
    pub output_source: String,
}

/// One workflow step; `inputs` sources are either a workflow input id or a
/// `step/port` reference into another step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: String,
    #[serde(rename = "in")]
    pub inputs: Vec<StepInput>,
    #[serde(rename = "out")]
    pub outputs: Vec<String>,
    pub run: CommandLineTool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepInput {
    pub id: String,
    pub source: String,
}
