//! JavaScript language extractor using tree-sitter.

use std::path::Path;

use anyhow::Result;
use scopegraph_core::{Language, ScopeKind};
use tree_sitter::{Node, Point};

use crate::extractor::{ImportReference, LanguageExtractor, ParsedFile, ScopeInfo};
use crate::parser_pool::{FileType, ParseRequest, ParserPool};

pub struct JavaScriptExtractor {
    parser_pool: ParserPool,
}

impl JavaScriptExtractor {
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

impl LanguageExtractor for JavaScriptExtractor {
    fn extract(&self, path: &Path, content: &[u8]) -> Result<ParsedFile> {
        let source_code = std::str::from_utf8(content)?;
        let request = ParseRequest {
            file_type: FileType::JavaScript,
            content: source_code.to_string(),
            path: path.to_path_buf(),
        };
        let parse_result = self.parser_pool.parse_blocking(request)?;
        let tree = parse_result.tree;
        let source = source_code.as_bytes();

        let mut scopes = Vec::new();
        let mut imports = Vec::new();
        visit(tree.root_node(), source, path, None, &mut scopes, &mut imports);
        for scope in &mut scopes {
            scope.import_references = imports.clone();
        }

        Ok(ParsedFile { path: path.to_path_buf(), language: Language::JavaScript, scopes })
    }
}

fn visit(
    node: Node,
    source: &[u8],
    path: &Path,
    parent: Option<&str>,
    scopes: &mut Vec<ScopeInfo>,
    imports: &mut Vec<ImportReference>,
) {
    match node.kind() {
        "function_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = JavaScriptExtractor::text(name_node, source).to_string();
                scopes.push(make_scope(node, source, path, &name, ScopeKind::Function, parent));
            }
            return;
        }
        "class_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = JavaScriptExtractor::text(name_node, source).to_string();
                scopes.push(make_scope(node, source, path, &name, ScopeKind::Class, parent));
                if let Some(body) = node.child_by_field_name("body") {
                    let mut cursor = body.walk();
                    for child in body.children(&mut cursor) {
                        if child.kind() == "method_definition" {
                            if let Some(method_name) = child.child_by_field_name("name") {
                                let method_name = JavaScriptExtractor::text(method_name, source).to_string();
                                scopes.push(make_scope(child, source, path, &method_name, ScopeKind::Method, Some(&name)));
                            }
                        }
                    }
                }
            }
            return;
        }
        "import_statement" => {
            if let Some(source_node) = node.child_by_field_name("source") {
                let module = JavaScriptExtractor::text(source_node, source).trim_matches(|c| c == '\'' || c == '"').to_string();
                let is_local = module.starts_with('.');
                imports.push(ImportReference { source: module, imported: "*".to_string(), alias: None, is_local });
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        visit(child, source, path, parent, scopes, imports);
    }
}

fn make_scope(node: Node, source: &[u8], path: &Path, name: &str, kind: ScopeKind, parent: Option<&str>) -> ScopeInfo {
    ScopeInfo {
        name: name.to_string(),
        kind,
        file_path: path.to_path_buf(),
        start_line: JavaScriptExtractor::point_to_u32(node.start_position()),
        end_line: JavaScriptExtractor::point_to_u32(node.end_position()),
        content: JavaScriptExtractor::text(node, source).to_string(),
        signature: Some(format!("{} {}", if kind == ScopeKind::Class { "class" } else { "function" }, name)),
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
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser_pool::create_parser_pool;

    #[test]
    fn extracts_class_method_and_function() {
        let extractor = JavaScriptExtractor::new(create_parser_pool());
        let source = r#"
class UserService {
    loadUsers() {
        return [];
    }
}

function main() {}
"#;
        let parsed = extractor.extract(Path::new("a.js"), source.as_bytes()).unwrap();
        assert!(parsed.scopes.iter().any(|s| s.name == "UserService" && s.kind == ScopeKind::Class));
        assert!(parsed.scopes.iter().any(|s| s.name == "loadUsers" && s.kind == ScopeKind::Method));
        assert!(parsed.scopes.iter().any(|s| s.name == "main" && s.kind == ScopeKind::Function));
    }
}
