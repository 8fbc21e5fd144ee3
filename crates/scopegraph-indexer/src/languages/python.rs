//! Python language extractor using tree-sitter.

use std::path::Path;

use anyhow::Result;
use scopegraph_core::{Language, ScopeKind};
use tree_sitter::{Node, Point};

use crate::extractor::{ImportReference, LanguageExtractor, ParsedFile, ScopeInfo};
use crate::parser_pool::{FileType, ParseRequest, ParserPool};

pub struct PythonExtractor {
    parser_pool: ParserPool,
}

impl PythonExtractor {
    pub fn new(parser_pool: ParserPool) -> Self {
        Self { parser_pool }
    }

    fn point_to_u32(point: Point) -> u32 {
        point.row as u32 + 1
    }

    fn text<'a>(node: Node, source: &'a [u8]) -> &'a str {
        node.utf8_text(source).unwrap_or_default()
    }
}

impl LanguageExtractor for PythonExtractor {
    fn extract(&self, path: &Path, content: &[u8]) -> Result<ParsedFile> {
        let source_code = std::str::from_utf8(content)?;
        let request = ParseRequest {
            file_type: FileType::Python,
            content: source_code.to_string(),
            path: path.to_path_buf(),
        };
        let parse_result = self.parser_pool.parse_blocking(request)?;
        let tree = parse_result.tree;
        let source = source_code.as_bytes();

        let mut scopes = Vec::new();
        let mut imports = Vec::new();
        visit(tree.root_node(), source, path, None, false, &mut scopes, &mut imports);
        for scope in &mut scopes {
            scope.import_references = imports.clone();
        }

        Ok(ParsedFile { path: path.to_path_buf(), language: Language::Python, scopes })
    }
}

fn visit(
    node: Node,
    source: &[u8],
    path: &Path,
    parent: Option<&str>,
    in_class: bool,
    scopes: &mut Vec<ScopeInfo>,
    imports: &mut Vec<ImportReference>,
) {
    match node.kind() {
        "function_definition" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = PythonExtractor::text(name_node, source).to_string();
                scopes.push(ScopeInfo {
                    name: name.clone(),
                    kind: if in_class { ScopeKind::Method } else { ScopeKind::Function },
                    file_path: path.to_path_buf(),
                    start_line: PythonExtractor::point_to_u32(node.start_position()),
                    end_line: PythonExtractor::point_to_u32(node.end_position()),
                    content: PythonExtractor::text(node, source).to_string(),
                    signature: Some(format!("def {}(...)", name)),
                    parent: parent.map(str::to_string),
                    return_type: node.child_by_field_name("return_type").map(|n| PythonExtractor::text(n, source).to_string()),
                    parameters: vec![],
                    decorators: decorators(node, source),
                    docstring: None,
                    heritage_clauses: vec![],
                    generics: vec![],
                    extends: None,
                    implements: vec![],
                    identifier_references: vec![],
                    import_references: vec![],
                });
            }
            return;
        }
        "class_definition" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = PythonExtractor::text(name_node, source).to_string();
                scopes.push(ScopeInfo {
                    name: name.clone(),
                    kind: ScopeKind::Class,
                    file_path: path.to_path_buf(),
                    start_line: PythonExtractor::point_to_u32(node.start_position()),
                    end_line: PythonExtractor::point_to_u32(node.end_position()),
                    content: PythonExtractor::text(node, source).to_string(),
                    signature: Some(format!("class {}", name)),
                    parent: parent.map(str::to_string),
                    return_type: None,
                    parameters: vec![],
                    decorators: decorators(node, source),
                    docstring: None,
                    heritage_clauses: vec![],
                    generics: vec![],
                    extends: None,
                    implements: vec![],
                    identifier_references: vec![],
                    import_references: vec![],
                });
                if let Some(body) = node.child_by_field_name("body") {
                    let mut cursor = body.walk();
                    for child in body.children(&mut cursor) {
                        visit(child, source, path, Some(&name), true, scopes, imports);
                    }
                }
            }
            return;
        }
        "import_statement" => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if child.kind() == "dotted_name" {
                    imports.push(ImportReference {
                        source: PythonExtractor::text(child, source).to_string(),
                        imported: "*".to_string(),
                        alias: None,
                        is_local: false,
                    });
                }
            }
        }
        "import_from_statement" => {
            if let Some(module_node) = node.child_by_field_name("module_name") {
                let module = PythonExtractor::text(module_node, source).to_string();
                let is_local = module.starts_with('.');
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    if child.kind() == "dotted_name" && child != module_node {
                        imports.push(ImportReference {
                            source: module.clone(),
                            imported: PythonExtractor::text(child, source).to_string(),
                            alias: None,
                            is_local,
                        });
                    }
                }
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        visit(child, source, path, parent, in_class, scopes, imports);
    }
}

fn decorators(node: Node, source: &[u8]) -> Vec<String> {
    let mut out = Vec::new();
    let Some(parent) = node.parent() else { return out };
    if parent.kind() != "decorated_definition" {
        return out;
    }
    let mut cursor = parent.walk();
    for child in parent.children(&mut cursor) {
        if child.kind() == "decorator" {
            out.push(PythonExtractor::text(child, source).trim_start_matches('@').to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser_pool::create_parser_pool;

    #[test]
    fn extracts_module_function_and_class_method() {
        let extractor = PythonExtractor::new(create_parser_pool());
        let source = r#"
class Widget:
    def render(self):
        return True

def main():
    pass
"#;
        let parsed = extractor.extract(Path::new("a.py"), source.as_bytes()).unwrap();
        assert!(parsed.scopes.iter().any(|s| s.name == "Widget" && s.kind == ScopeKind::Class));
        assert!(parsed.scopes.iter().any(|s| s.name == "render" && s.kind == ScopeKind::Method));
        assert!(parsed.scopes.iter().any(|s| s.name == "main" && s.kind == ScopeKind::Function));
    }
}
