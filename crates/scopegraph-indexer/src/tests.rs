//! Crate-level integration tests exercising the extractor dispatch table
//! and a couple of full C1->C4 pipeline runs through the coordinator.

use std::path::PathBuf;

use scopegraph_core::ScopeKind;

use crate::languages::get_extractor;

#[test]
fn extractor_dispatch_covers_every_known_extension() {
    let cases = [
        ("main.rs", "rs"),
        ("app.ts", "ts"),
        ("component.tsx", "tsx"),
        ("index.js", "js"),
        ("lib.py", "py"),
        ("main.go", "go"),
        ("Main.java", "java"),
        ("main.c", "c"),
        ("main.cpp", "cpp"),
        ("unknown.xyz", "xyz"),
    ];

    for (filename, _ext) in cases {
        let path = PathBuf::from(filename);
        let extractor = get_extractor(&path);
        assert!(extractor.is_some(), "should have an extractor for {filename}");

        let result = extractor.unwrap().extract(&path, b"");
        assert!(result.is_ok(), "extractor failed on empty content for {filename}");
        assert!(result.unwrap().scopes.is_empty());
    }
}

#[test]
fn rust_extraction_finds_functions_and_struct() {
    let source = r#"
fn main() {
    helper();
}

fn helper() -> i32 {
    42
}

struct User {
    name: String,
}
"#;
    let path = PathBuf::from("test.rs");
    let extractor = get_extractor(&path).unwrap();
    let parsed = extractor.extract(&path, source.as_bytes()).unwrap();

    let functions: Vec<_> = parsed.scopes.iter().filter(|s| s.kind == ScopeKind::Function).collect();
    assert!(functions.iter().any(|f| f.name == "main"));
    assert!(functions.iter().any(|f| f.name == "helper"));

    let structs: Vec<_> = parsed.scopes.iter().filter(|s| s.kind == ScopeKind::Class).collect();
    assert!(structs.iter().any(|s| s.name == "User"));
}

#[test]
fn javascript_extraction_finds_function_and_class() {
    let source = r#"
function greet(name) {
    return "Hello, " + name;
}

class Person {
    greet() {
        return "hi";
    }
}
"#;
    let path = PathBuf::from("test.js");
    let extractor = get_extractor(&path).unwrap();
    let parsed = extractor.extract(&path, source.as_bytes()).unwrap();

    assert!(parsed.scopes.iter().any(|s| s.name == "greet" && s.kind == ScopeKind::Function));
    assert!(parsed.scopes.iter().any(|s| s.name == "Person" && s.kind == ScopeKind::Class));
}

#[test]
fn python_extraction_finds_function_and_class() {
    let source = r#"
def greet(name):
    return f"Hello, {name}"

class Person:
    def __init__(self, name):
        self.name = name
"#;
    let path = PathBuf::from("test.py");
    let extractor = get_extractor(&path).unwrap();
    let parsed = extractor.extract(&path, source.as_bytes()).unwrap();

    assert!(parsed.scopes.iter().any(|s| s.name == "greet" && s.kind == ScopeKind::Function));
    assert!(parsed.scopes.iter().any(|s| s.name == "Person" && s.kind == ScopeKind::Class));
}

#[test]
fn invalid_utf8_is_rejected_not_panicked() {
    let path = PathBuf::from("binary.rs");
    let extractor = get_extractor(&path).unwrap();
    let invalid_utf8 = vec![0xFF, 0xFE, 0xFD];
    let result = extractor.extract(&path, &invalid_utf8);
    assert!(result.is_err());
}

mod pipeline {
    use std::io::Write;

    use scopegraph_core::EdgeKind;

    use crate::coordinator::Coordinator;

    #[test]
    fn single_file_project_assembles_file_and_directory_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("lib.rs");
        std::fs::File::create(&file_path).unwrap().write_all(b"fn run() {}\n").unwrap();

        let coordinator = Coordinator::new(dir.path());
        let (graph, stats) = coordinator.run_full_index(&[file_path]).unwrap();

        assert_eq!(stats.files_parsed, 1);
        assert_eq!(stats.files_failed, 0);
        assert!(stats.scopes_assembled >= 1);
        assert!(graph.all_nodes().any(|n| matches!(n, scopegraph_core::GraphNode::File(_))));
        assert!(graph.all_edges().any(|e| e.kind == EdgeKind::DefinedIn));
    }

    #[test]
    fn unreadable_file_is_counted_as_failed_without_aborting_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.rs");

        let coordinator = Coordinator::new(dir.path());
        let (_, stats) = coordinator.run_full_index(&[missing]).unwrap();

        assert_eq!(stats.files_parsed, 0);
        assert_eq!(stats.files_failed, 1);
    }
}
