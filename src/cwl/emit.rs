//! Document assembly: one tool description per notebook, one workflow per
//! entry point that imports other notebooks.
//!
//! Assembly is purely structural. It looks at declared port names and
//! types, never at values, and the synthesized script rides along as an
//! opaque staged file.

use super::types::{CwlType, Role};
use super::{
    CWL_VERSION, CommandLineTool, Dirent, InputBinding, OutputBinding, Requirement, StepInput,
    TOOL_CLASS, ToolInput, ToolOutput, WORKFLOW_CLASS, Workflow, WorkflowInput, WorkflowOutput,
    WorkflowStep,
};
use crate::error::TypeMismatchError;
use crate::project::NotebookUnit;
use ahash::{AHashMap, AHashSet};

/// A resolved import binding: `target`'s input port is fed by `source`'s
/// output port. Indices refer to the walker's unit list, and ports must
/// exist on their units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataEdge {
    pub source: usize,
    pub source_port: String,
    pub target: usize,
    pub target_port: String,
}

/// Builds the single-step document for one notebook.
///
/// Inputs are numbered positionally in declaration order to match the
/// `sys.argv` reads of the synthesized script; each output is collected by
/// globbing the file the script materialized under the variable name.
pub fn tool_document(unit: &NotebookUnit) -> CommandLineTool {
    let script_name = format!("{}.py", unit.id);
    let inputs: Vec<ToolInput> = unit
        .scan
        .inputs()
        .enumerate()
        .map(|(index, variable)| ToolInput {
            id: variable.name.clone(),
            ty: variable.ty,
            input_binding: InputBinding {
                position: index + 1,
                item_separator: variable.ty.item_separator().map(str::to_string),
                value_from: token_guard(variable.ty),
            },
        })
        .collect();
    let mut requirements = vec![Requirement::InitialWorkDirRequirement {
        listing: vec![Dirent {
            entryname: script_name.clone(),
            entry: escape_expressions(&unit.script),
        }],
    }];
    if inputs
        .iter()
        .any(|input| input.input_binding.value_from.is_some())
    {
        requirements.push(Requirement::InlineJavascriptRequirement);
    }
    CommandLineTool {
        cwl_version: CWL_VERSION.to_string(),
        class: TOOL_CLASS.to_string(),
        id: unit.id.clone(),
        base_command: vec!["python3".to_string(), script_name],
        requirements,
        inputs,
        outputs: unit
            .scan
            .outputs()
            .map(|variable| ToolOutput {
                id: variable.name.clone(),
                ty: variable.ty,
                output_binding: OutputBinding {
                    glob: variable.name.clone(),
                },
            })
            .collect(),
    }
}

/// Every input must contribute exactly one command-line token, in position.
/// Plain binding rules give a prefix-less boolean no token at all and an
/// empty array none despite its separator, so those types bind through an
/// expression producing the token in the script's encoding.
fn token_guard(ty: CwlType) -> Option<String> {
    if ty == CwlType::Boolean {
        Some("$(self ? 'true' : 'false')".to_string())
    } else if ty.is_array() {
        Some("$(self.length == 0 ? '' : self)".to_string())
    } else {
        None
    }
}

/// Builds the composite document for the entry point `entry`.
///
/// `order` lists the unit indices of the entry's dependency closure with
/// dependencies first; steps are emitted in that order. Inputs satisfied
/// by an edge stay internal to the document. Every other step input
/// surfaces as a document-level input, the entry's ports claiming their
/// bare names first and colliding names qualified with their step id.
/// Document outputs are exactly the entry's own outputs.
pub fn workflow_document(
    entry: usize,
    order: &[usize],
    units: &[NotebookUnit],
    edges: &[DataEdge],
) -> Result<Workflow, TypeMismatchError> {
    check_edge_types(units, edges)?;

    let mut feeds: AHashMap<(usize, &str), &DataEdge> = AHashMap::new();
    for edge in edges {
        feeds.insert((edge.target, edge.target_port.as_str()), edge);
    }

    let mut taken: AHashSet<String> = AHashSet::new();
    let mut exposed: AHashMap<(usize, String), String> = AHashMap::new();
    let mut inputs: Vec<WorkflowInput> = Vec::new();
    let naming_order =
        std::iter::once(entry).chain(order.iter().copied().filter(|index| *index != entry));
    for index in naming_order {
        let unit = &units[index];
        for variable in unit.scan.inputs() {
            if feeds.contains_key(&(index, variable.name.as_str())) {
                continue;
            }
            let id = free_name(&mut taken, &unit.id, &variable.name);
            exposed.insert((index, variable.name.clone()), id.clone());
            inputs.push(WorkflowInput {
                id,
                ty: variable.ty,
            });
        }
    }

    let entry_unit = &units[entry];
    let outputs = entry_unit
        .scan
        .outputs()
        .map(|variable| WorkflowOutput {
            id: variable.name.clone(),
            ty: variable.ty,
            output_source: format!("{}/{}", entry_unit.id, variable.name),
        })
        .collect();

    let steps = order
        .iter()
        .map(|&index| {
            let unit = &units[index];
            let step_inputs = unit
                .scan
                .inputs()
                .map(|variable| {
                    let source = match feeds.get(&(index, variable.name.as_str())) {
                        Some(edge) => {
                            format!("{}/{}", units[edge.source].id, edge.source_port)
                        }
                        None => exposed
                            .get(&(index, variable.name.clone()))
                            .cloned()
                            .unwrap_or_else(|| variable.name.clone()),
                    };
                    StepInput {
                        id: variable.name.clone(),
                        source,
                    }
                })
                .collect();
            WorkflowStep {
                id: unit.id.clone(),
                inputs: step_inputs,
                outputs: unit
                    .scan
                    .outputs()
                    .map(|variable| variable.name.clone())
                    .collect(),
                run: tool_document(unit),
            }
        })
        .collect();

    Ok(Workflow {
        cwl_version: CWL_VERSION.to_string(),
        class: WORKFLOW_CLASS.to_string(),
        id: entry_unit.id.clone(),
        inputs,
        outputs,
        steps,
    })
}

fn check_edge_types(units: &[NotebookUnit], edges: &[DataEdge]) -> Result<(), TypeMismatchError> {
    for edge in edges {
        let source = port_type(&units[edge.source], Role::Output, &edge.source_port);
        let target = port_type(&units[edge.target], Role::Input, &edge.target_port);
        if let (Some(source_type), Some(target_type)) = (source, target) {
            if source_type != target_type {
                return Err(TypeMismatchError {
                    source_step: units[edge.source].id.clone(),
                    source_port: edge.source_port.clone(),
                    source_type,
                    target_step: units[edge.target].id.clone(),
                    target_port: edge.target_port.clone(),
                    target_type,
                });
            }
        }
    }
    Ok(())
}

fn port_type(unit: &NotebookUnit, role: Role, name: &str) -> Option<CwlType> {
    unit.scan
        .variables
        .iter()
        .find(|variable| variable.role == role && variable.name == name)
        .map(|variable| variable.ty)
}

/// Picks the first free document-level name for a step input.
fn free_name(taken: &mut AHashSet<String>, step_id: &str, port: &str) -> String {
    let mut candidate = port.to_string();
    if taken.contains(&candidate) {
        candidate = format!("{step_id}_{port}");
    }
    let mut serial = 2;
    while taken.contains(&candidate) {
        candidate = format!("{step_id}_{port}_{serial}");
        serial += 1;
    }
    taken.insert(candidate.clone());
    candidate
}

/// The target schema reads `$(...)` and `${...}` in staged file content as
/// expressions; escape them so script text passes through literally.
fn escape_expressions(script: &str) -> String {
    script.replace("$(", "\\$(").replace("${", "\\${")
}
