//! Go language extractor using tree-sitter.

use std::path::Path;

use anyhow::Result;
use scopegraph_core::{Language, ScopeKind};
use tree_sitter::{Node, Point};

use crate::extractor::{ImportReference, LanguageExtractor, ParsedFile, ScopeInfo};
use crate::parser_pool::{FileType, ParseRequest, ParserPool};

pub struct GoExtractor {
    parser_pool: ParserPool,
}

impl GoExtractor {
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

impl LanguageExtractor for GoExtractor {
    fn extract(&self, path: &Path, content: &[u8]) -> Result<ParsedFile> {
        let source_code = std::str::from_utf8(content)?;
        let request = ParseRequest {
            file_type: FileType::Go,
            content: source_code.to_string(),
            path: path.to_path_buf(),
        };
        let parse_result = self.parser_pool.parse_blocking(request)?;
        let tree = parse_result.tree;
        let source = source_code.as_bytes();

        let mut scopes = Vec::new();
        let mut imports = Vec::new();
        visit(tree.root_node(), source, path, &mut scopes, &mut imports);
        for scope in &mut scopes {
            scope.import_references = imports.clone();
        }

        Ok(ParsedFile { path: path.to_path_buf(), language: Language::Go, scopes })
    }
}

fn visit(node: Node, source: &[u8], path: &Path, scopes: &mut Vec<ScopeInfo>, imports: &mut Vec<ImportReference>) {
    match node.kind() {
        "function_declaration" | "method_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = GoExtractor::text(name_node, source).to_string();
                let kind = if node.kind() == "method_declaration" { ScopeKind::Method } else { ScopeKind::Function };
                let parent = node
                    .child_by_field_name("receiver")
                    .and_then(|r| r.named_child(0))
                    .map(|n| GoExtractor::text(n, source).trim_start_matches('*').to_string());
                scopes.push(ScopeInfo {
                    name: name.clone(),
                    kind,
                    file_path: path.to_path_buf(),
                    start_line: GoExtractor::point_to_u32(node.start_position()),
                    end_line: GoExtractor::point_to_u32(node.end_position()),
                    content: GoExtractor::text(node, source).to_string(),
                    signature: Some(format!("func {}(...)", name)),
                    parent,
                    return_type: node.child_by_field_name("result").map(|n| GoExtractor::text(n, source).to_string()),
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
        "type_declaration" => {
            let mut cursor = node.walk();
            for spec in node.children(&mut cursor) {
                if spec.kind() != "type_spec" {
                    continue;
                }
                let Some(name_node) = spec.child_by_field_name("name") else { continue };
                let name = GoExtractor::text(name_node, source).to_string();
                let is_struct = spec
                    .child_by_field_name("type")
                    .map(|t| t.kind() == "struct_type")
                    .unwrap_or(false);
                let is_interface = spec
                    .child_by_field_name("type")
                    .map(|t| t.kind() == "interface_type")
                    .unwrap_or(false);
                let kind = if is_interface {
                    ScopeKind::Interface
                } else if is_struct {
                    ScopeKind::Class
                } else {
                    ScopeKind::Type
                };
                scopes.push(ScopeInfo {
                    name: name.clone(),
                    kind,
                    file_path: path.to_path_buf(),
                    start_line: GoExtractor::point_to_u32(spec.start_position()),
                    end_line: GoExtractor::point_to_u32(spec.end_position()),
                    content: GoExtractor::text(spec, source).to_string(),
                    signature: Some(format!("type {}", name)),
                    parent: None,
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
        "import_spec" => {
            if let Some(path_node) = node.child_by_field_name("path") {
                let module = GoExtractor::text(path_node, source).trim_matches('"').to_string();
                imports.push(ImportReference { source: module, imported: "*".to_string(), alias: None, is_local: false });
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        visit(child, source, path, scopes, imports);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser_pool::create_parser_pool;

    #[test]
    fn extracts_function_method_and_struct() {
        let extractor = GoExtractor::new(create_parser_pool());
        let source = r#"
package main

type Widget struct {
	ID int
}

func (w *Widget) Render() bool {
	return w.ID > 0
}

func main() {}
"#;
        let parsed = extractor.extract(Path::new("a.go"), source.as_bytes()).unwrap();
        assert!(parsed.scopes.iter().any(|s| s.name == "Widget" && s.kind == ScopeKind::Class));
        assert!(parsed.scopes.iter().any(|s| s.name == "Render" && s.kind == ScopeKind::Method));
        assert!(parsed.scopes.iter().any(|s| s.name == "main" && s.kind == ScopeKind::Function));
    }
}
