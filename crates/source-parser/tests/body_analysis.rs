use pretty_assertions::assert_eq;
use unitsplit_source_parser::{BodyAnalysis, SourceParser};

fn analyze(body: &str) -> BodyAnalysis {
    SourceParser::new().unwrap().analyze_body(body).unwrap()
}

fn names(body: &str) -> Vec<String> {
    analyze(body)
        .references
        .into_iter()
        .map(|r| r.name)
        .collect()
}

#[test]
fn parameters_and_locals_shadow() {
    let body = "def f(Base, *args, **kwargs):\n    Helper = 1\n    return Base, Helper, Other\n";
    assert_eq!(names(body), vec!["Other"]);
}

#[test]
fn default_values_and_annotations_read_enclosing_scope() {
    let body = "def f(x: Config = DEFAULT) -> Result:\n    return x\n";
    assert_eq!(names(body), vec!["Config", "DEFAULT", "Result"]);
}

#[test]
fn attribute_heads_only() {
    let body = "def f():\n    return Registry.items.get(key=Base)\n";
    assert_eq!(names(body), vec!["Registry", "Base"]);
}

#[test]
fn comprehension_and_lambda_scopes() {
    let body = "def f(items):\n    ok = [Item for Item in items if Check(Item)]\n    pick = lambda Base: Base\n    return ok, pick\n";
    assert_eq!(names(body), vec!["Check"]);
}

#[test]
fn class_body_does_not_shadow_methods() {
    let body = "class A:\n    Helper = 1\n\n    def m(self):\n        return Helper\n";
    assert_eq!(names(body), vec!["Helper"]);
}

#[test]
fn except_alias_is_bound() {
    let body = "def f():\n    try:\n        work()\n    except LoadError as Base:\n        return Base\n";
    assert_eq!(names(body), vec!["work", "LoadError"]);
}

#[test]
fn global_assignment_is_a_write() {
    let body = "def bump():\n    global COUNTER, state\n    COUNTER += 1\n    state = Machine()\n";
    let analysis = analyze(body);
    let refs: Vec<(String, bool)> = analysis
        .references
        .iter()
        .map(|r| (r.name.clone(), r.write))
        .collect();
    assert_eq!(
        refs,
        vec![
            ("COUNTER".to_string(), true),
            ("state".to_string(), true),
            ("Machine".to_string(), false),
        ]
    );
    assert!(analysis.global_writes().contains("state"));
}

#[test]
fn fstring_interpolation_is_read() {
    let body = "def f():\n    return f\"{Settings.name}!\"\n";
    assert_eq!(names(body), vec!["Settings"]);
}

#[test]
fn reference_ranges_point_at_names() {
    let body = "def f():\n    return Base() + Base.count\n";
    let analysis = analyze(body);
    assert_eq!(analysis.references.len(), 2);
    for reference in &analysis.references {
        assert_eq!(&body[reference.start_byte..reference.end_byte], "Base");
    }
}

#[test]
fn local_imports_are_found_in_functions_and_methods() {
    let body = "class A:\n    def m(self):\n        import json\n        return json.dumps({})\n\n    def n(self):\n        import os\n";
    let analysis = analyze(body);
    assert_eq!(analysis.local_imports.len(), 1);

    let import = &analysis.local_imports[0];
    assert_eq!(&body[import.start_byte..import.end_byte], "        import json\n");
    assert_eq!(import.decls[0].module, "json");
    // `json` is bound by the import, so it is not a free reference
    assert!(analysis.free_names().is_empty());
}

#[test]
fn import_only_body_keeps_its_last_import() {
    let body = "def setup():\n    import os\n    import sys\n";
    let analysis = analyze(body);
    assert_eq!(analysis.local_imports.len(), 1);

    let import = &analysis.local_imports[0];
    assert_eq!(&body[import.start_byte..import.end_byte], "    import os\n");
}

#[test]
fn nested_conditional_imports_stay() {
    let body = "def f():\n    try:\n        import yaml\n    except ImportError:\n        yaml = None\n    return yaml\n";
    let analysis = analyze(body);
    assert!(analysis.local_imports.is_empty());
    assert_eq!(names(body), vec!["ImportError"]);
}
