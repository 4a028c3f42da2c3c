//! Document assembly tests: tool descriptions, workflow wiring and YAML.
mod common;

use ahash::AHashSet;
use common::*;
use nb2cwl::cwl::emit::{DataEdge, tool_document, workflow_document};
use nb2cwl::cwl::{CwlDocument, Requirement};
use nb2cwl::prelude::*;
use nb2cwl::synthesize::synthesize_script;

/// Builds a standalone unit the way the walker would, minus the directory
/// walk.
fn unit(id: &str, json: &str) -> NotebookUnit {
    let name = format!("{id}.ipynb");
    let notebook = parse(&name, json);
    let scan = AnnotationScanner::new()
        .scan(&notebook)
        .expect("Failed to scan notebook");
    let script = synthesize_script(&notebook, &scan, &AHashSet::new())
        .expect("Failed to synthesize script");
    NotebookUnit {
        path: PathBuf::from(name),
        id: id.to_string(),
        notebook,
        scan,
        script,
    }
}

#[test]
fn test_tool_ports_mirror_the_scan() {
    let unit = unit("example1", &leaf_example_json());
    let tool = tool_document(&unit);

    assert_eq!(tool.id, "example1");
    assert_eq!(tool.class, "CommandLineTool");
    assert_eq!(tool.cwl_version, "v1.1");
    assert_eq!(tool.base_command, vec!["python3", "example1.py"]);

    assert_eq!(tool.inputs.len(), 2);
    assert_eq!(tool.inputs[0].id, "datafilename");
    assert_eq!(tool.inputs[0].ty, CwlType::File);
    assert_eq!(tool.inputs[0].input_binding.position, 1);
    assert_eq!(tool.inputs[0].input_binding.item_separator, None);
    assert_eq!(tool.inputs[1].id, "messages");
    assert_eq!(tool.inputs[1].ty, CwlType::StringArray);
    assert_eq!(tool.inputs[1].input_binding.position, 2);
    assert_eq!(
        tool.inputs[1].input_binding.item_separator.as_deref(),
        Some("\n")
    );

    assert_eq!(tool.outputs.len(), 2);
    assert_eq!(tool.outputs[0].id, "results_filename");
    assert_eq!(tool.outputs[0].output_binding.glob, "results_filename");
    assert_eq!(tool.outputs[1].id, "messages_outputs");
    assert_eq!(tool.outputs[1].ty, CwlType::File);

    let Requirement::InitialWorkDirRequirement { listing } = &tool.requirements[0] else {
        panic!("staged script requirement must come first");
    };
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].entryname, "example1.py");
    assert!(listing[0].entry.contains("datafilename = sys.argv[1]"));
}

#[test]
fn test_every_scanned_port_appears_in_the_tool() {
    let json = notebook_json(&[(
        "code",
        "input_file: CWLFilePathInput = 'data.csv'\n\
         message: CWLStringInput = 'hello'\n\
         count: CWLIntInput = 3\n\
         verbose: CWLBooleanInput = False\n\
         input_files: List[CWLFilePathInput] = ['a.csv']\n\
         messages: List[CWLStringInput] = ['x']\n\
         counts: List[CWLIntInput] = [1]\n\
         report: CWLFilePathOutput = 'report.txt'\n\
         summary: CWLDumpableFile = 'done'",
    )]);
    let unit = unit("wide", &json);
    let tool = tool_document(&unit);

    assert_eq!(tool.inputs.len(), unit.scan.inputs().count());
    assert_eq!(tool.outputs.len(), unit.scan.outputs().count());
    for (index, input) in tool.inputs.iter().enumerate() {
        assert_eq!(input.input_binding.position, index + 1);
        assert_eq!(
            input.input_binding.item_separator.is_some(),
            input.ty.is_array(),
            "separator of {}",
            input.id
        );
        assert_eq!(
            input.input_binding.value_from.is_some(),
            input.ty == CwlType::Boolean || input.ty.is_array(),
            "token guard of {}",
            input.id
        );
    }
    for output in &tool.outputs {
        assert_eq!(output.output_binding.glob, output.id);
    }
}

#[test]
fn test_boolean_and_array_bindings_always_yield_a_token() {
    let json = notebook_json(&[(
        "code",
        "flag: CWLBooleanInput = True\n\
         name: CWLStringInput = 'x'\n\
         messages: List[CWLStringInput] = []",
    )]);
    let tool = tool_document(&unit("guarded", &json));

    assert_eq!(
        tool.inputs[0].input_binding.value_from.as_deref(),
        Some("$(self ? 'true' : 'false')")
    );
    assert_eq!(tool.inputs[1].input_binding.value_from, None);
    assert_eq!(
        tool.inputs[2].input_binding.value_from.as_deref(),
        Some("$(self.length == 0 ? '' : self)")
    );
    assert_eq!(
        tool.inputs[2].input_binding.item_separator.as_deref(),
        Some("\n")
    );
    assert!(
        tool.requirements
            .iter()
            .any(|requirement| matches!(requirement, Requirement::InlineJavascriptRequirement))
    );

    // Scalar-only tools need no expression support.
    let json = notebook_json(&[("code", "name: CWLStringInput = 'x'")]);
    let tool = tool_document(&unit("plain_ports", &json));
    assert_eq!(tool.inputs[0].input_binding.value_from, None);
    assert_eq!(tool.requirements.len(), 1);
}

#[test]
fn test_notebook_without_annotations_yields_empty_port_lists() {
    let json = notebook_json(&[("code", "print('no ports here')")]);
    let unit = unit("plain", &json);
    let tool = tool_document(&unit);
    assert!(tool.inputs.is_empty());
    assert!(tool.outputs.is_empty());
    let Requirement::InitialWorkDirRequirement { listing } = &tool.requirements[0] else {
        panic!("staged script requirement must come first");
    };
    assert!(listing[0].entry.contains("print('no ports here')"));
}

#[test]
fn test_staged_script_escapes_engine_expressions() {
    let json = notebook_json(&[(
        "code",
        "cwd: CWLStringInput = 'x'\nprint('$(pwd)')\nprint('${HOME}')",
    )]);
    let unit = unit("escape", &json);
    let tool = tool_document(&unit);
    let Requirement::InitialWorkDirRequirement { listing } = &tool.requirements[0] else {
        panic!("staged script requirement must come first");
    };
    assert!(listing[0].entry.contains("\\$(pwd)"));
    assert!(listing[0].entry.contains("\\${HOME}"));
    assert_eq!(listing[0].entry.matches("$(pwd)").count(), 1);
}

#[test]
fn test_workflow_wires_imported_outputs() {
    let units = vec![
        unit("example1_import", &imported_example_json()),
        unit("example1", &importer_example_json()),
    ];
    let edges = vec![DataEdge {
        source: 0,
        source_port: "resultsFilename".to_string(),
        target: 1,
        target_port: "datafilename".to_string(),
    }];
    let workflow =
        workflow_document(1, &[0, 1], &units, &edges).expect("Failed to assemble workflow");

    assert_eq!(workflow.id, "example1");
    assert_eq!(workflow.class, "Workflow");

    let step_ids: Vec<&str> = workflow.steps.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(step_ids, vec!["example1_import", "example1"]);

    // The fed input stays internal; only the free input surfaces.
    let input_ids: Vec<&str> = workflow.inputs.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(input_ids, vec!["messages"]);
    assert_eq!(workflow.inputs[0].ty, CwlType::StringArray);

    let entry_step = &workflow.steps[1];
    let sources: Vec<(&str, &str)> = entry_step
        .inputs
        .iter()
        .map(|i| (i.id.as_str(), i.source.as_str()))
        .collect();
    assert_eq!(
        sources,
        vec![
            ("datafilename", "example1_import/resultsFilename"),
            ("messages", "messages"),
        ]
    );

    assert_eq!(workflow.steps[0].outputs, vec!["resultsFilename"]);
    assert_eq!(workflow.steps[0].run.id, "example1_import");

    assert_eq!(workflow.outputs.len(), 1);
    assert_eq!(workflow.outputs[0].id, "final_results");
    assert_eq!(workflow.outputs[0].output_source, "example1/final_results");
}

#[test]
fn test_colliding_dependency_inputs_get_qualified_names() {
    let prep = notebook_json(&[(
        "code",
        "config: CWLFilePathInput = 'cfg.yaml'\ntable: CWLFilePathOutput = 'table.csv'",
    )]);
    let main = notebook_json(&[(
        "code",
        "table: CWLFilePathInput = 'table.csv'\n\
         config: CWLFilePathInput = 'cfg.yaml'\n\
         result: CWLFilePathOutput = 'r.txt'",
    )]);
    let units = vec![unit("prep", &prep), unit("main", &main)];
    let edges = vec![DataEdge {
        source: 0,
        source_port: "table".to_string(),
        target: 1,
        target_port: "table".to_string(),
    }];
    let workflow =
        workflow_document(1, &[0, 1], &units, &edges).expect("Failed to assemble workflow");

    // The entry claims the bare name; the dependency's collides and is
    // qualified with its step id.
    let input_ids: Vec<&str> = workflow.inputs.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(input_ids, vec!["config", "prep_config"]);

    assert_eq!(workflow.steps[0].inputs[0].id, "config");
    assert_eq!(workflow.steps[0].inputs[0].source, "prep_config");
    let entry_sources: Vec<&str> = workflow.steps[1]
        .inputs
        .iter()
        .map(|i| i.source.as_str())
        .collect();
    assert_eq!(entry_sources, vec!["prep/table", "config"]);

    // Dependency outputs never surface at the document level.
    assert_eq!(workflow.outputs.len(), 1);
    assert_eq!(workflow.outputs[0].id, "result");
}

#[test]
fn test_workflow_rejects_type_mismatched_edges() {
    let producer = notebook_json(&[("code", "payload: CWLFilePathOutput = 'p.txt'")]);
    let consumer = notebook_json(&[(
        "code",
        "payload: List[CWLStringInput] = ['x']\nout: CWLFilePathOutput = 'o.txt'",
    )]);
    let units = vec![unit("a", &producer), unit("b", &consumer)];
    let edges = vec![DataEdge {
        source: 0,
        source_port: "payload".to_string(),
        target: 1,
        target_port: "payload".to_string(),
    }];
    let err = workflow_document(1, &[0, 1], &units, &edges)
        .expect_err("mismatched edge should fail");
    assert_eq!(err.source_type, CwlType::File);
    assert_eq!(err.target_type, CwlType::StringArray);
    assert!(err.to_string().contains("type mismatch"));
    assert!(err.to_string().contains("a/payload"));
}

#[test]
fn test_documents_round_trip_through_yaml() {
    let leaf = unit("example1", &leaf_example_json());
    let tool = CwlDocument::Tool(tool_document(&leaf));
    let yaml = tool.to_yaml().expect("Failed to render tool YAML");
    assert!(yaml.contains("cwlVersion: v1.1"));
    assert!(yaml.contains("class: CommandLineTool"));
    let parsed: CwlDocument = serde_yaml::from_str(&yaml).expect("Failed to parse tool YAML");
    assert_eq!(parsed, tool);
    assert!(matches!(parsed, CwlDocument::Tool(_)));

    let units = vec![
        unit("example1_import", &imported_example_json()),
        unit("example1", &importer_example_json()),
    ];
    let edges = vec![DataEdge {
        source: 0,
        source_port: "resultsFilename".to_string(),
        target: 1,
        target_port: "datafilename".to_string(),
    }];
    let workflow = CwlDocument::Workflow(
        workflow_document(1, &[0, 1], &units, &edges).expect("Failed to assemble workflow"),
    );
    let yaml = workflow.to_yaml().expect("Failed to render workflow YAML");
    assert!(yaml.contains("class: Workflow"));
    assert!(yaml.contains("outputSource: example1/final_results"));
    let parsed: CwlDocument = serde_yaml::from_str(&yaml).expect("Failed to parse workflow YAML");
    assert_eq!(parsed, workflow);
    assert!(matches!(parsed, CwlDocument::Workflow(_)));
}
