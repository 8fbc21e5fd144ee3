//! Rust language extractor using tree-sitter.

use std::path::{Path, PathBuf};

use anyhow::Result;
use scopegraph_core::{Language, Parameter, ScopeKind};
use tree_sitter::{Node, Point};

use crate::extractor::{IdentifierReference, ImportReference, LanguageExtractor, ParsedFile, ReferenceKind, ScopeInfo};
use crate::parser_pool::{FileType, ParseRequest, ParserPool};

pub struct RustExtractor {
    parser_pool: ParserPool,
}

impl RustExtractor {
    pub fn new(parser_pool: ParserPool) -> Self {
        Self { parser_pool }
    }

    fn point_to_u32(point: Point) -> u32 {
        point.row as u32 + 1
    }

    fn text<'a>(node: Node, source: &'a [u8]) -> &'a str {
        node.utf8_text(source).unwrap_or_default()
    }

    fn extract_parameters(node: Node, source: &[u8]) -> Vec<Parameter> {
        let Some(params) = node.child_by_field_name("parameters") else { return vec![] };
        let mut out = Vec::new();
        let mut cursor = params.walk();
        for child in params.children(&mut cursor) {
            if child.kind() != "parameter" {
                continue;
            }
            let name = child
                .child_by_field_name("pattern")
                .map(|n| Self::text(n, source).to_string())
                .unwrap_or_default();
            let param_type = child.child_by_field_name("type").map(|n| Self::text(n, source).to_string());
            out.push(Parameter { name, param_type, default: None });
        }
        out
    }

    fn identifier_references(body: Node, source: &[u8]) -> Vec<IdentifierReference> {
        let mut refs = Vec::new();
        collect_calls(body, source, &mut refs);
        refs
    }
}

fn collect_calls(node: Node, source: &[u8], refs: &mut Vec<IdentifierReference>) {
    if node.kind() == "call_expression" {
        if let Some(function) = node.child_by_field_name("function") {
            let identifier = match function.kind() {
                "identifier" => Some(function.utf8_text(source).unwrap_or_default().to_string()),
                "field_expression" => function
                    .child_by_field_name("field")
                    .map(|f| f.utf8_text(source).unwrap_or_default().to_string()),
                "scoped_identifier" => function
                    .child_by_field_name("name")
                    .map(|f| f.utf8_text(source).unwrap_or_default().to_string()),
                _ => None,
            };
            if let Some(identifier) = identifier {
                let point = function.start_position();
                refs.push(IdentifierReference {
                    identifier,
                    line: RustExtractor::point_to_u32(point),
                    column: point.column as u32,
                    context: node.utf8_text(source).ok().map(|s| s.to_string()),
                    kind: ReferenceKind::LocalScope,
                    target_scope: None,
                    source: None,
                });
            }
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_calls(child, source, refs);
    }
}

impl LanguageExtractor for RustExtractor {
    fn extract(&self, path: &Path, content: &[u8]) -> Result<ParsedFile> {
        let source_code = std::str::from_utf8(content)?;
        let request = ParseRequest {
            file_type: FileType::Rust,
            content: source_code.to_string(),
            path: path.to_path_buf(),
        };
        let parse_result = self.parser_pool.parse_blocking(request)?;
        let tree = parse_result.tree;
        let source = source_code.as_bytes();

        let mut scopes = Vec::new();
        let mut imports = Vec::new();
        visit_item(tree.root_node(), source, path, None, &mut scopes, &mut imports);

        for scope in &mut scopes {
            scope.import_references = imports.clone();
        }

        Ok(ParsedFile { path: path.to_path_buf(), language: Language::Rust, scopes })
    }
}

fn visit_item(
    node: Node,
    source: &[u8],
    path: &Path,
    parent: Option<&str>,
    scopes: &mut Vec<ScopeInfo>,
    imports: &mut Vec<ImportReference>,
) {
    match node.kind() {
        "function_item" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = RustExtractor::text(name_node, source).to_string();
                let body = node.child_by_field_name("body");
                let identifier_references = body.map(|b| RustExtractor::identifier_references(b, source)).unwrap_or_default();
                let return_type = node.child_by_field_name("return_type").map(|n| RustExtractor::text(n, source).to_string());
                scopes.push(ScopeInfo {
                    name: name.clone(),
                    kind: ScopeKind::Function,
                    file_path: path.to_path_buf(),
                    start_line: RustExtractor::point_to_u32(node.start_position()),
                    end_line: RustExtractor::point_to_u32(node.end_position()),
                    content: RustExtractor::text(node, source).to_string(),
                    signature: Some(format!("fn {}({:?})", name, RustExtractor::extract_parameters(node, source))),
                    parent: parent.map(str::to_string),
                    return_type,
                    parameters: RustExtractor::extract_parameters(node, source),
                    decorators: vec![],
                    docstring: None,
                    heritage_clauses: vec![],
                    generics: vec![],
                    extends: None,
                    implements: vec![],
                    identifier_references,
                    import_references: vec![],
                });
            }
        }
        "struct_item" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = RustExtractor::text(name_node, source).to_string();
                scopes.push(ScopeInfo {
                    name,
                    kind: ScopeKind::Class,
                    file_path: path.to_path_buf(),
                    start_line: RustExtractor::point_to_u32(node.start_position()),
                    end_line: RustExtractor::point_to_u32(node.end_position()),
                    content: RustExtractor::text(node, source).to_string(),
                    signature: Some(RustExtractor::text(node, source).lines().next().unwrap_or_default().to_string()),
                    parent: parent.map(str::to_string),
                    return_type: None,
                    parameters: vec![],
                    decorators: vec![],
                    docstring: None,
                    heritage_clauses: vec![],
                    generics: vec![],
                    extends: None,
                    implements: vec![],
                    identifier_references: vec![],
                    import_references: vec![],
                });
            }
        }
        "trait_item" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = RustExtractor::text(name_node, source).to_string();
                scopes.push(ScopeInfo {
                    name,
                    kind: ScopeKind::Interface,
                    file_path: path.to_path_buf(),
                    start_line: RustExtractor::point_to_u32(node.start_position()),
                    end_line: RustExtractor::point_to_u32(node.end_position()),
                    content: RustExtractor::text(node, source).to_string(),
                    signature: Some(RustExtractor::text(node, source).lines().next().unwrap_or_default().to_string()),
                    parent: parent.map(str::to_string),
                    return_type: None,
                    parameters: vec![],
                    decorators: vec![],
                    docstring: None,
                    heritage_clauses: vec![],
                    generics: vec![],
                    extends: None,
                    implements: vec![],
                    identifier_references: vec![],
                    import_references: vec![],
                });
            }
        }
        "type_item" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = RustExtractor::text(name_node, source).to_string();
                scopes.push(ScopeInfo {
                    name,
                    kind: ScopeKind::Type,
                    file_path: path.to_path_buf(),
                    start_line: RustExtractor::point_to_u32(node.start_position()),
                    end_line: RustExtractor::point_to_u32(node.end_position()),
                    content: RustExtractor::text(node, source).to_string(),
                    signature: Some(RustExtractor::text(node, source).to_string()),
                    parent: parent.map(str::to_string),
                    return_type: None,
                    parameters: vec![],
                    decorators: vec![],
                    docstring: None,
                    heritage_clauses: vec![],
                    generics: vec![],
                    extends: None,
                    implements: vec![],
                    identifier_references: vec![],
                    import_references: vec![],
                });
            }
        }
        "const_item" | "static_item" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = RustExtractor::text(name_node, source).to_string();
                scopes.push(ScopeInfo {
                    name,
                    kind: ScopeKind::Constant,
                    file_path: path.to_path_buf(),
                    start_line: RustExtractor::point_to_u32(node.start_position()),
                    end_line: RustExtractor::point_to_u32(node.end_position()),
                    content: RustExtractor::text(node, source).to_string(),
                    signature: Some(RustExtractor::text(node, source).to_string()),
                    parent: parent.map(str::to_string),
                    return_type: None,
                    parameters: vec![],
                    decorators: vec![],
                    docstring: None,
                    heritage_clauses: vec![],
                    generics: vec![],
                    extends: None,
                    implements: vec![],
                    identifier_references: vec![],
                    import_references: vec![],
                });
            }
        }
        "impl_item" => {
            let type_name = node.child_by_field_name("type").map(|n| RustExtractor::text(n, source).to_string());
            let trait_name = node.child_by_field_name("trait").map(|n| RustExtractor::text(n, source).to_string());
            if let (Some(type_name), Some(trait_name)) = (type_name.clone(), trait_name) {
                // impl Trait for Type — carried as a heritage clause on the
                // type's own scope rather than a distinct synthetic scope.
                if let Some(target) = scopes.iter_mut().find(|s| s.name == type_name) {
                    target.implements.push(trait_name);
                }
            }
            if let Some(body) = node.child_by_field_name("body") {
                let mut cursor = body.walk();
                for child in body.children(&mut cursor) {
                    visit_item(child, source, path, type_name.as_deref(), scopes, imports);
                }
            }
            return;
        }
        "use_declaration" => {
            collect_use_paths(node, source, String::new(), imports);
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        visit_item(child, source, path, parent, scopes, imports);
    }
}

fn collect_use_paths(node: Node, source: &[u8], prefix: String, imports: &mut Vec<ImportReference>) {
    match node.kind() {
        "use_declaration" => {
            if let Some(arg) = node.child_by_field_name("argument") {
                collect_use_paths(arg, source, prefix, imports);
            }
        }
        "scoped_identifier" => {
            let path_part = node.child_by_field_name("path").map(|n| RustExtractor::text(n, source).to_string());
            let name_part = node.child_by_field_name("name").map(|n| RustExtractor::text(n, source).to_string());
            let source_path = path_part.unwrap_or_default();
            if let Some(name) = name_part {
                imports.push(ImportReference {
                    source: source_path,
                    imported: name,
                    alias: None,
                    is_local: prefix.starts_with("crate") || prefix.starts_with("self") || prefix.starts_with("super"),
                });
            }
        }
        "identifier" => {
            imports.push(ImportReference {
                source: prefix,
                imported: RustExtractor::text(node, source).to_string(),
                alias: None,
                is_local: false,
            });
        }
        "use_as_clause" => {
            let path_node = node.child_by_field_name("path");
            let alias_node = node.child_by_field_name("alias");
            if let (Some(path_node), Some(alias_node)) = (path_node, alias_node) {
                imports.push(ImportReference {
                    source: String::new(),
                    imported: RustExtractor::text(path_node, source).to_string(),
                    alias: Some(RustExtractor::text(alias_node, source).to_string()),
                    is_local: false,
                });
            }
        }
        "use_list" => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                collect_use_paths(child, source, prefix.clone(), imports);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser_pool::create_parser_pool;

    #[test]
    fn extracts_function_and_struct_scopes() {
        let extractor = RustExtractor::new(create_parser_pool());
        let source = r#"
struct Widget {
    id: u32,
}

fn render(widget: &Widget) -> bool {
    widget.id > 0
}
"#;
        let parsed = extractor.extract(Path::new("a.rs"), source.as_bytes()).unwrap();
        let names: Vec<_> = parsed.scopes.iter().map(|s| s.name.as_str()).collect();
        assert!(names.contains(&"Widget"));
        assert!(names.contains(&"render"));
    }

    #[test]
    fn impl_trait_for_records_heritage_on_the_type() {
        let extractor = RustExtractor::new(create_parser_pool());
        let source = r#"
struct Adapter;
trait SourceAdapter {}
impl SourceAdapter for Adapter {}
"#;
        let parsed = extractor.extract(Path::new("a.rs"), source.as_bytes()).unwrap();
        let adapter = parsed.scopes.iter().find(|s| s.name == "Adapter").unwrap();
        assert_eq!(adapter.implements, vec!["SourceAdapter".to_string()]);
    }
}
